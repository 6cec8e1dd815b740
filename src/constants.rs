use std::time::Duration;

use time::{format_description::BorrowedFormatItem, macros::format_description};

pub mod version;

pub static DEFAULT_PREFIX: &str = "!quote";
pub static DEFAULT_DATABASE_URL: &str = "sqlite://quotes.db";
pub static DEFAULT_CONFIG_PATH: &str = "quotebot.config.json";
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// how many quotes `list` shows in a single reply.
pub const LIST_LIMIT: usize = 5;
pub static LIST_SEPARATOR: &str = " | ";

pub const SQLITE_DATETIME: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
pub const ISO_NAIVE_DATETIME: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// pending chat messages held between the discord event handler and the receive loop.
pub const QUEUE_CAPACITY: usize = 256;
