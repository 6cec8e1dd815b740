use std::sync::Arc;

use poise::serenity_prelude::{self as serenity, Client, ClientBuilder};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::{
    cli,
    commands::quote::QuoteDispatcher,
    config::{Config, Mode},
    constants::{version::get_version, QUEUE_CAPACITY},
    event_handler,
    handlers::{self, IncomingMessage, Moderators},
    store::QuoteStore,
    telemetry, Data,
};

async fn init_store(config: &Config) -> anyhow::Result<Arc<QuoteStore>> {
    let store = QuoteStore::connect(&config.database_url, config.max_connections).await?;

    match store.count().await {
        Ok(count) => tracing::info!(count, "quote database ready."),
        Err(e) => tracing::warn!(err = ?e, "could not count quotes at startup"),
    }

    Ok(Arc::new(store))
}

fn init_moderators(config: &Config) -> Moderators {
    if config.moderator_ids.is_empty() && config.moderator_role_ids.is_empty() {
        tracing::warn!("no moderators configured. delete / edit / author will be refused for everyone.");
    }

    Moderators {
        user_ids: config.moderator_ids.clone(),
        role_ids: config.moderator_role_ids.clone(),
    }
}

async fn init_discord_client(token: &str, data: Data) -> anyhow::Result<Client> {
    let intents =
        serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::MESSAGE_CONTENT;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(|_ctx, ready, _framework| {
            Box::pin(
                async move {
                    tracing::info!(user = %ready.user.name, "connected to discord!");

                    Ok(data)
                }
                .in_current_span(),
            )
        })
        .build();

    let client = ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    Ok(client)
}

async fn run_discord(config: &Config, dispatcher: Arc<QuoteDispatcher>) -> anyhow::Result<()> {
    let Some(token) = config.discord_token.as_deref() else {
        anyhow::bail!("missing DISCORD_TOKEN");
    };

    let (queue, receiver) = mpsc::channel::<IncomingMessage>(QUEUE_CAPACITY);

    let data = Data {
        queue,
        moderators: Arc::new(init_moderators(config)),
    };

    let mut client = init_discord_client(token, data).await?;

    tokio::spawn(
        handlers::message_loop(client.http.clone(), dispatcher, receiver).in_current_span(),
    );

    let shard_manager = client.shard_manager.clone();

    tracing::info!("finished initializing!");

    tokio::select! {
        result = client.start() => {
            result.inspect_err(|e| tracing::error!(err = ?e, "discord client stopped with an error"))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down...");
            shard_manager.shutdown_all().await;
        }
    }

    Ok(())
}

pub async fn init() -> anyhow::Result<()> {
    telemetry::init_telemetry().map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(version = %get_version(), "initializing... please wait warmly.");

    let config = Config::load()?;
    let store = init_store(&config).await?;
    let dispatcher = Arc::new(QuoteDispatcher::new(
        store,
        config.prefix.clone(),
        config.command_timeout,
    ));

    let result = match config.mode {
        Mode::Cli => cli::run(dispatcher.clone()).await,
        Mode::Discord => run_discord(&config, dispatcher.clone()).await,
    };

    dispatcher.store().close().await;

    result
}
