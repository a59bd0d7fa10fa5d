use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    domain::{ChatId, MessageId},
    errors::Error,
    Result,
};

pub const DEFAULT_BATCH_SIZE: u32 = 1000;
pub const DEFAULT_SLEEP_TIME: Duration = Duration::from_secs(1200);
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_CURSOR_FILE: &str = "forwarder_data.json";
pub const DEFAULT_SOURCE_PROBE_LIMIT: u32 = 10_000;

/// Typed configuration for the forwarder.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub telegram_allowed_users: Vec<i64>,

    // Durable state
    pub cursor_file: PathBuf,

    // Job presets (all can be changed later via commands)
    pub source_chat_id: Option<ChatId>,
    pub destination_chat_id: Option<ChatId>,
    pub start_message_id: Option<MessageId>,
    pub batch_size: u32,
    pub sleep_time: Duration,
    pub delay_between_messages: Duration,

    // Telegram source iteration
    pub source_probe_limit: u32,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the process env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_bot_token = lookup("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        let telegram_allowed_users = parse_csv_i64(lookup("TELEGRAM_ALLOWED_USERS"));

        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        if telegram_allowed_users.is_empty() {
            return Err(Error::Config(
                "TELEGRAM_ALLOWED_USERS environment variable is required".to_string(),
            ));
        }

        let cursor_file = PathBuf::from(
            lookup("CURSOR_FILE")
                .and_then(non_empty)
                .unwrap_or_else(|| DEFAULT_CURSOR_FILE.to_string()),
        );

        let source_chat_id = parse_opt::<i64>(&lookup, "SOURCE_CHAT_ID")?.map(ChatId);
        let destination_chat_id = parse_opt::<i64>(&lookup, "DESTINATION_CHAT_ID")?.map(ChatId);
        let start_message_id = parse_opt::<i32>(&lookup, "START_MESSAGE_ID")?.map(MessageId);

        let batch_size = parse_opt::<u32>(&lookup, "FORWARD_BATCH_SIZE")?.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(Error::Config(
                "FORWARD_BATCH_SIZE must be a positive integer".to_string(),
            ));
        }
        let sleep_time = parse_opt::<u64>(&lookup, "FORWARD_SLEEP_TIME")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SLEEP_TIME);
        let delay_between_messages = parse_opt::<u64>(&lookup, "FORWARD_DELAY")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_DELAY);

        let source_probe_limit = parse_opt::<u32>(&lookup, "SOURCE_PROBE_LIMIT")?
            .unwrap_or(DEFAULT_SOURCE_PROBE_LIMIT);

        Ok(Self {
            telegram_bot_token,
            telegram_allowed_users,
            cursor_file,
            source_chat_id,
            destination_chat_id,
            start_message_id,
            batch_size,
            sleep_time,
            delay_between_messages,
            source_probe_limit,
        })
    }
}

fn parse_opt<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = lookup(key).and_then(non_empty) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} has an invalid value: {raw}")))
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, unquote(v.trim()));
    }
}

fn unquote(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
