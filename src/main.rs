use std::sync::Arc;

use poise::serenity_prelude as serenity;
use tokio::sync::mpsc;

use handlers::{IncomingMessage, Moderators};

#[derive(Clone)]
struct Data {
    queue: mpsc::Sender<IncomingMessage>,
    moderators: Arc<Moderators>,
}

type Error = Box<dyn std::error::Error + Send + Sync>;

mod cli;
mod commands;
mod config;
mod constants;
mod error;
mod handlers;
mod init;
mod models;
mod store;
mod telemetry;

/// forwards chat messages to the receive loop; all command handling happens there.
#[tracing::instrument(skip_all)]
async fn event_handler(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let serenity::FullEvent::Message { new_message } = event {
        if new_message.author.bot {
            return Ok(());
        }

        data.queue
            .send(data.moderators.incoming(new_message))
            .await
            .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when queueing message"))?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    init::init().await
}
