use std::{future::Future, sync::Arc, time::Duration};

use crate::{
    commands::{
        format::{format_count, format_list, format_quote, help_text},
        parse::{tokenize, Command, Verb},
    },
    constants::LIST_LIMIT,
    error::{QuoteError, QuoteResult},
    store::QuoteStore,
};

pub static REFUSAL: &str = "Sorry, only moderators can do that.";
pub static STORAGE_FAILURE: &str =
    "Something went wrong while talking to the quote database. Please try again later.";

/// turns `<prefix> <verb> <args>` lines into store calls and reply lines.
///
/// holds no per-caller state; the privilege flag comes with every call.
pub struct QuoteDispatcher {
    store: Arc<QuoteStore>,
    prefix: String,
    timeout: Duration,
}

impl QuoteDispatcher {
    pub fn new(store: Arc<QuoteStore>, prefix: impl Into<String>, timeout: Duration) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            timeout,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn store(&self) -> &QuoteStore {
        &self.store
    }

    /// handles one line of chat. lines not addressed to the prefix produce no replies.
    #[tracing::instrument(skip(self))]
    pub async fn handle(&self, line: &str, caller: &str, privileged: bool) -> Vec<String> {
        let Some(invocation) = tokenize(line, &self.prefix) else {
            return vec![];
        };

        let verb = invocation.verb;

        if verb.is_privileged() && !privileged {
            tracing::info!(caller, ?verb, "refused privileged command");
            return vec![self.render_error(verb, None, QuoteError::Unauthorized)];
        }

        let command = match invocation.into_command(caller) {
            Ok(command) => command,
            Err(e) => return vec![self.render_error(verb, None, e)],
        };

        let target = command_id(&command);

        match self.execute(command).await {
            Ok(reply) => vec![reply],
            Err(e) => vec![self.render_error(verb, target, e)],
        }
    }

    async fn execute(&self, command: Command) -> QuoteResult<String> {
        let reply = match command {
            Command::Help => help_text(&self.prefix),
            Command::Random => format_quote(&self.bounded(self.store.random()).await?),
            Command::Add { text, author } => {
                let id = self.bounded(self.store.add(&text, &author)).await?;
                tracing::info!(id, author = %author, "added quote");
                format!("Quote added with ID #{id}.")
            }
            Command::Search(term) => {
                let results = self.bounded(self.store.search(&term)).await?;
                results
                    .first()
                    .map(format_quote)
                    .ok_or_else(QuoteError::no_quotes)?
            }
            Command::Get(id) => format_quote(&self.bounded(self.store.get_by_id(id)).await?),
            Command::List => format_list(&self.bounded(self.store.list_first(LIST_LIMIT)).await?),
            Command::Latest => format_quote(&self.bounded(self.store.latest()).await?),
            Command::Count => format_count(self.bounded(self.store.count()).await?),
            Command::Delete(id) => {
                self.bounded(self.store.delete(id)).await?;
                tracing::info!(id, "deleted quote");
                format!("Quote #{id} deleted.")
            }
            Command::Edit { id, text } => {
                self.bounded(self.store.update_text(id, &text)).await?;
                format!("Quote #{id} updated.")
            }
            Command::Author { id, author } => {
                self.bounded(self.store.update_author(id, &author)).await?;
                format!("Author of quote #{id} updated.")
            }
        };

        Ok(reply)
    }

    /// runs a store call under the command timeout. dropping the call on timeout is safe since
    /// every write is a single autocommit statement.
    async fn bounded<T>(&self, call: impl Future<Output = QuoteResult<T>>) -> QuoteResult<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| QuoteError::TimedOut)?
    }

    fn render_error(&self, verb: Verb, target: Option<i64>, err: QuoteError) -> String {
        match err {
            QuoteError::Validation(msg) => format!("{msg}. {}", verb.usage(&self.prefix)),
            QuoteError::Unauthorized => REFUSAL.to_string(),
            QuoteError::NotFound(_) => not_found_message(verb, target, &self.prefix),
            e => {
                tracing::error!(err = ?e, ?verb, "an error occurred when running quote command");
                STORAGE_FAILURE.to_string()
            }
        }
    }
}

fn command_id(command: &Command) -> Option<i64> {
    match command {
        Command::Get(id) | Command::Delete(id) => Some(*id),
        Command::Edit { id, .. } | Command::Author { id, .. } => Some(*id),
        _ => None,
    }
}

fn not_found_message(verb: Verb, target: Option<i64>, prefix: &str) -> String {
    if let Some(id) = target {
        return format!("No quote with ID #{id} found.");
    }

    match verb {
        Verb::Random => format!("No quotes have been added yet. Try {prefix} add to add one!"),
        Verb::Search => "No matching quotes found.".to_string(),
        Verb::List => "No quotes found.".to_string(),
        _ => "No quotes have been added yet.".to_string(),
    }
}
