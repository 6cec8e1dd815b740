use std::sync::Arc;

use poise::serenity_prelude::{ChannelId, CreateAllowedMentions, CreateMessage, Http, Message};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::commands::quote::QuoteDispatcher;

/// a chat line handed from the discord event handler to the receive loop.
#[derive(Clone, Debug)]
pub struct IncomingMessage {
    pub channel_id: ChannelId,
    pub author: String,
    pub content: String,
    pub privileged: bool,
}

/// who may run delete / edit / author.
#[derive(Clone, Debug, Default)]
pub struct Moderators {
    pub user_ids: Vec<u64>,
    pub role_ids: Vec<u64>,
}

impl Moderators {
    pub fn is_moderator(&self, user_id: u64, role_ids: impl IntoIterator<Item = u64>) -> bool {
        self.user_ids.contains(&user_id)
            || role_ids
                .into_iter()
                .any(|role_id| self.role_ids.contains(&role_id))
    }

    pub fn incoming(&self, message: &Message) -> IncomingMessage {
        let roles = message
            .member
            .as_ref()
            .map(|member| member.roles.iter().map(|role| role.get()).collect::<Vec<u64>>())
            .unwrap_or_default();

        let author = message
            .member
            .as_ref()
            .and_then(|member| member.nick.clone())
            .unwrap_or_else(|| message.author.display_name().to_string());

        IncomingMessage {
            channel_id: message.channel_id,
            author,
            content: message.content.clone(),
            privileged: self.is_moderator(message.author.id.get(), roles),
        }
    }
}

/// drains the queue, handling each message on its own task.
pub async fn message_loop(
    http: Arc<Http>,
    dispatcher: Arc<QuoteDispatcher>,
    mut queue: mpsc::Receiver<IncomingMessage>,
) {
    while let Some(message) = queue.recv().await {
        let http = http.clone();
        let dispatcher = dispatcher.clone();

        tokio::spawn(
            async move {
                let channel_id = message.channel_id;

                if let Err(e) = quote_handler(&http, &dispatcher, message).await {
                    tracing::error!(err = ?e, %channel_id, "an error occurred when sending reply");
                }
            }
            .in_current_span(),
        );
    }

    tracing::info!("message queue closed, stopping receive loop.");
}

#[tracing::instrument(skip_all, fields(channel = %message.channel_id, author = %message.author))]
pub async fn quote_handler(
    http: &Http,
    dispatcher: &QuoteDispatcher,
    message: IncomingMessage,
) -> anyhow::Result<()> {
    let replies = dispatcher
        .handle(&message.content, &message.author, message.privileged)
        .await;

    for reply in replies {
        message
            .channel_id
            .send_message(
                http,
                CreateMessage::default()
                    .allowed_mentions(CreateAllowedMentions::new())
                    .content(reply),
            )
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moderator_by_user_id() {
        let moderators = Moderators {
            user_ids: vec![10, 20],
            role_ids: vec![],
        };

        assert!(moderators.is_moderator(10, []));
        assert!(!moderators.is_moderator(30, []));
    }

    #[test]
    fn test_moderator_by_role() {
        let moderators = Moderators {
            user_ids: vec![],
            role_ids: vec![7],
        };

        assert!(moderators.is_moderator(1, [3, 7]));
        assert!(!moderators.is_moderator(1, [3, 4]));
    }

    #[test]
    fn test_nobody_is_moderator_by_default() {
        assert!(!Moderators::default().is_moderator(1, [1]));
    }
}
