use std::{path::Path, str::FromStr, time::Duration};

use anyhow::{bail, Context as _};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONFIG_PATH, DEFAULT_DATABASE_URL, DEFAULT_MAX_CONNECTIONS,
    DEFAULT_PREFIX,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Discord,
    Cli,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "discord" => Ok(Self::Discord),
            "cli" | "terminal" => Ok(Self::Cli),
            other => bail!("unknown mode {other:?}, expected \"discord\" or \"cli\""),
        }
    }
}

/// one layer of settings. unset fields leave lower layers alone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub mode: Option<String>,
    pub database_url: Option<String>,
    pub prefix: Option<String>,
    pub command_timeout_secs: Option<u64>,
    pub max_connections: Option<u32>,
    pub discord_token: Option<String>,
    pub moderator_ids: Option<Vec<u64>>,
    pub moderator_role_ids: Option<Vec<u64>>,
}

impl ConfigLayer {
    /// reads a json config file. a missing file is an empty layer.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading config file {}", path.display()))
            }
        };

        serde_json::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    /// builds a layer from environment-style lookups. blank values count as unset.
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Ok(Self {
            mode: get("QUOTE_MODE"),
            database_url: get("DATABASE_URL"),
            prefix: get("QUOTE_PREFIX"),
            command_timeout_secs: get("QUOTE_COMMAND_TIMEOUT_SECS")
                .map(|v| v.parse::<u64>())
                .transpose()
                .context("QUOTE_COMMAND_TIMEOUT_SECS must be a whole number of seconds")?,
            max_connections: get("QUOTE_DB_MAX_CONNECTIONS")
                .map(|v| v.parse::<u32>())
                .transpose()
                .context("QUOTE_DB_MAX_CONNECTIONS must be a positive integer")?,
            discord_token: get("DISCORD_TOKEN"),
            moderator_ids: get("QUOTE_MODERATOR_IDS")
                .map(|v| parse_id_list(&v))
                .transpose()
                .context("QUOTE_MODERATOR_IDS must be a comma-separated list of ids")?,
            moderator_role_ids: get("QUOTE_MODERATOR_ROLE_IDS")
                .map(|v| parse_id_list(&v))
                .transpose()
                .context("QUOTE_MODERATOR_ROLE_IDS must be a comma-separated list of ids")?,
        })
    }

    /// overlays `other` on top of `self`.
    pub fn merge(self, other: Self) -> Self {
        let non_blank = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        Self {
            mode: non_blank(other.mode).or(self.mode),
            database_url: non_blank(other.database_url).or(self.database_url),
            prefix: non_blank(other.prefix).or(self.prefix),
            command_timeout_secs: other.command_timeout_secs.or(self.command_timeout_secs),
            max_connections: other.max_connections.or(self.max_connections),
            discord_token: non_blank(other.discord_token).or(self.discord_token),
            moderator_ids: other.moderator_ids.or(self.moderator_ids),
            moderator_role_ids: other.moderator_role_ids.or(self.moderator_role_ids),
        }
    }
}

fn parse_id_list(value: &str) -> Result<Vec<u64>, std::num::ParseIntError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::parse)
        .collect()
}

/// resolved runtime settings.
#[derive(Clone, Debug)]
pub struct Config {
    pub mode: Mode,
    pub database_url: String,
    pub prefix: String,
    pub command_timeout: Duration,
    pub max_connections: u32,
    pub discord_token: Option<String>,
    pub moderator_ids: Vec<u64>,
    pub moderator_role_ids: Vec<u64>,
}

impl Config {
    /// defaults, then the json file named by `QUOTE_CONFIG`, then the environment.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("QUOTE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let file = ConfigLayer::from_file(Path::new(&path))?;
        let env = ConfigLayer::from_env(|key| std::env::var(key).ok())?;

        Self::resolve(file.merge(env))
    }

    pub fn resolve(layer: ConfigLayer) -> anyhow::Result<Self> {
        let mode = match layer.mode {
            Some(mode) => mode.parse()?,
            None => Mode::default(),
        };

        let prefix = layer.prefix.unwrap_or_else(|| DEFAULT_PREFIX.to_string());

        if prefix.split_whitespace().count() != 1 {
            bail!("command prefix must be a single word, got {prefix:?}");
        }

        if mode == Mode::Discord && layer.discord_token.is_none() {
            bail!("missing DISCORD_TOKEN (required in discord mode)");
        }

        Ok(Self {
            mode,
            database_url: layer
                .database_url
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            prefix,
            command_timeout: layer
                .command_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_COMMAND_TIMEOUT),
            max_connections: layer.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS),
            discord_token: layer.discord_token,
            moderator_ids: layer.moderator_ids.unwrap_or_default(),
            moderator_role_ids: layer.moderator_role_ids.unwrap_or_default(),
        })
    }
}
