use crate::error::{QuoteError, QuoteResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Random,
    Help,
    Add,
    Search,
    Get,
    List,
    Latest,
    Count,
    Delete,
    Edit,
    Author,
}

impl Verb {
    /// unknown verbs fall back to help.
    fn from_token(token: &str) -> Self {
        match token.to_lowercase().as_str() {
            "add" => Self::Add,
            "search" => Self::Search,
            "get" => Self::Get,
            "list" => Self::List,
            "latest" => Self::Latest,
            "count" => Self::Count,
            "delete" => Self::Delete,
            "edit" => Self::Edit,
            "author" => Self::Author,
            _ => Self::Help,
        }
    }

    pub fn is_privileged(self) -> bool {
        matches!(self, Self::Delete | Self::Edit | Self::Author)
    }

    pub fn usage(self, prefix: &str) -> String {
        match self {
            Self::Add => format!("Usage: {prefix} add <quote text>"),
            Self::Search => format!("Usage: {prefix} search <term>"),
            Self::Get => format!("Usage: {prefix} get <id>"),
            Self::Delete => format!("Usage: {prefix} delete <id>"),
            Self::Edit => format!("Usage: {prefix} edit <id> | <quote text>"),
            Self::Author => format!("Usage: {prefix} author <id> <author>"),
            _ => format!("Usage: {prefix} help"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Random,
    Help,
    Add { text: String, author: String },
    Search(String),
    Get(i64),
    List,
    Latest,
    Count,
    Delete(i64),
    Edit { id: i64, text: String },
    Author { id: i64, author: String },
}

/// a command line split into its verb and remaining tokens.
#[derive(Debug)]
pub struct Invocation<'a> {
    pub verb: Verb,
    args: Vec<&'a str>,
}

/// splits `line` into an [`Invocation`], or `None` when it is not addressed to `prefix`.
pub fn tokenize<'a>(line: &'a str, prefix: &str) -> Option<Invocation<'a>> {
    let mut tokens = line.split_whitespace();

    if tokens.next()? != prefix {
        return None;
    }

    let verb = match tokens.next() {
        Some(token) => Verb::from_token(token),
        None => Verb::Random,
    };

    Some(Invocation {
        verb,
        args: tokens.collect(),
    })
}

impl Invocation<'_> {
    /// turns the arguments into a [`Command`]. `caller` is the default author for `add`.
    pub fn into_command(self, caller: &str) -> QuoteResult<Command> {
        let command = match self.verb {
            Verb::Random => Command::Random,
            Verb::Help => Command::Help,
            Verb::List => Command::List,
            Verb::Latest => Command::Latest,
            Verb::Count => Command::Count,
            Verb::Add => {
                let rest = self.rest(0).ok_or_else(missing_argument)?;
                let (author, text) = split_author(&rest, caller);

                Command::Add { text, author }
            }
            Verb::Search => Command::Search(self.rest(0).ok_or_else(missing_argument)?),
            Verb::Get => Command::Get(self.id_at(0)?),
            Verb::Delete => Command::Delete(self.id_at(0)?),
            Verb::Edit => {
                let rest = self.rest(0).ok_or_else(missing_argument)?;

                // the id ends at the first space or pipe; one separating pipe is optional.
                let (id, text) = rest
                    .split_once([' ', '|'])
                    .unwrap_or((rest.as_str(), ""));
                let text = text.trim_start();
                let text = text.strip_prefix('|').unwrap_or(text).trim();

                Command::Edit {
                    id: parse_id(id)?,
                    text: text.to_string(),
                }
            }
            Verb::Author => Command::Author {
                id: self.id_at(0)?,
                author: self.rest(1).ok_or_else(missing_argument)?,
            },
        };

        Ok(command)
    }

    /// the arguments from `start` on, re-joined with single spaces.
    fn rest(&self, start: usize) -> Option<String> {
        let args = self.args.get(start..)?;

        if args.is_empty() {
            return None;
        }

        Some(args.join(" "))
    }

    fn id_at(&self, idx: usize) -> QuoteResult<i64> {
        let token = self.args.get(idx).ok_or_else(missing_argument)?;
        parse_id(token)
    }
}

fn missing_argument() -> QuoteError {
    QuoteError::Validation("Missing argument".to_string())
}

fn parse_id(token: &str) -> QuoteResult<i64> {
    token
        .trim()
        .parse::<i64>()
        .map_err(|_| QuoteError::Validation("Invalid quote ID".to_string()))
}

/// `<author> | <text>` names the author explicitly. an empty author part, or no pipe at all,
/// attributes the quote to `caller`.
fn split_author(body: &str, caller: &str) -> (String, String) {
    match body.split_once('|') {
        Some((author, text)) => {
            let author = author.trim();
            let author = if author.is_empty() { caller } else { author };

            (author.to_string(), text.trim().to_string())
        }
        None => (caller.to_string(), body.trim().to_string()),
    }
}
