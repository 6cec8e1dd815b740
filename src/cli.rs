use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::commands::quote::QuoteDispatcher;

/// caller name used for quotes added from the terminal.
pub static CLI_CALLER: &str = "CLI";

/// reads commands from stdin until `exit` or end of input.
///
/// the terminal operator is always privileged. lines may omit the prefix, so `count` works
/// the same as `!quote count`.
pub async fn run(dispatcher: Arc<QuoteDispatcher>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    stdout
        .write_all(
            b"enter a command (random, add, search, get, list, latest, count, delete, edit, author, help, exit):\n",
        )
        .await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("exit") {
            break;
        }

        let command = to_command_line(line, dispatcher.prefix());

        for reply in dispatcher.handle(&command, CLI_CALLER, true).await {
            stdout.write_all(reply.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }

        stdout.flush().await?;
    }

    tracing::info!("terminal session ended.");
    Ok(())
}

/// prepends the prefix unless the line already carries it. `random` maps to the bare prefix.
pub fn to_command_line(line: &str, prefix: &str) -> String {
    let line = line.trim();

    if line.split_whitespace().next() == Some(prefix) {
        return line.to_string();
    }

    if line.eq_ignore_ascii_case("random") {
        return prefix.to_string();
    }

    format!("{prefix} {line}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorthand_gets_prefix() {
        assert_eq!(to_command_line("count", "!quote"), "!quote count");
        assert_eq!(to_command_line(" get 4 ", "!quote"), "!quote get 4");
    }

    #[test]
    fn test_prefixed_line_is_kept() {
        assert_eq!(to_command_line("!quote add hi", "!quote"), "!quote add hi");
    }

    #[test]
    fn test_random_maps_to_bare_prefix() {
        assert_eq!(to_command_line("RANDOM", "!quote"), "!quote");
    }
}
