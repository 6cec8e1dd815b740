use crate::{
    constants::{LIST_LIMIT, LIST_SEPARATOR},
    models::quotes::Quote,
};

pub fn format_quote(quote: &Quote) -> String {
    format!("#{}: \"{}\" - {}", quote.id, quote.text, quote.author)
}

/// the first [`LIST_LIMIT`] quotes on a single line.
pub fn format_list(quotes: &[Quote]) -> String {
    quotes
        .iter()
        .take(LIST_LIMIT)
        .map(format_quote)
        .collect::<Vec<String>>()
        .join(LIST_SEPARATOR)
}

pub fn pluralize<'a>(singular: &'a str, plural: &'a str, count: i64) -> &'a str {
    if count == 1 {
        singular
    } else {
        plural
    }
}

pub fn format_count(count: i64) -> String {
    if count == 0 {
        return "No quotes have been added yet.".to_string();
    }

    format!(
        "There {} {} {} saved.",
        pluralize("is", "are", count),
        count,
        pluralize("quote", "quotes", count)
    )
}

pub fn help_text(prefix: &str) -> String {
    [
        "Usage:".to_string(),
        format!("{prefix} - Return a random quote."),
        format!("{prefix} add <quote> - Add a new quote (author will be the sender)."),
        format!("{prefix} add <author> | <quote> - Add a quote for another author."),
        format!("{prefix} search <term> - Search for a quote."),
        format!("{prefix} get <id> - Get a specific quote by ID."),
        format!("{prefix} list - List the first {LIST_LIMIT} quotes."),
        format!("{prefix} latest - Show the most recently added quote."),
        format!("{prefix} count - Show how many quotes are stored."),
        format!("{prefix} delete <id> - Delete a quote (moderator only)."),
        format!("{prefix} edit <id> | <quote> - Replace a quote's text (moderator only)."),
        format!("{prefix} author <id> <author> - Change a quote's author (moderator only)."),
        format!("{prefix} help - Show this help message."),
    ]
    .join("\n")
}
