use thiserror::Error;

/// Errors produced by the quote store and the command dispatcher.
#[derive(Error, Debug)]
pub enum QuoteError {
    /// Malformed or empty user input.
    #[error("{0}")]
    Validation(String),

    /// Nothing matched the request.
    #[error("{0}")]
    NotFound(String),

    /// The underlying database failed.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// A stored row could not be decoded.
    #[error("quote #{id} has an unreadable timestamp: {value:?}")]
    CorruptRow { id: i64, value: String },

    /// The storage call did not finish within the command timeout.
    #[error("storage call timed out")]
    TimedOut,

    /// A privileged command was issued by an unprivileged caller.
    #[error("caller is not allowed to run this command")]
    Unauthorized,
}

impl QuoteError {
    pub fn no_quotes() -> Self {
        Self::NotFound("no quotes available".to_string())
    }

    pub fn no_such_id(id: i64) -> Self {
        Self::NotFound(format!("no quote with id {id} found"))
    }
}

pub type QuoteResult<T> = Result<T, QuoteError>;
