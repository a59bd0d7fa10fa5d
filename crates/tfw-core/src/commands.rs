//! Parsing of the forwarder's text command surface.
//!
//! One command per line: `/name[@bot] [argument]`. Setters take exactly one
//! integer argument; a missing or malformed argument yields a usage message and
//! no state change.

use std::time::Duration;

use crate::{
    domain::{ChatId, MessageId},
    job::JobField,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Set(JobField),
    ListChats,
    Forward,
    Stop,
    Resume,
    Stats,
    /// A known setter whose argument was missing or malformed.
    Usage(&'static str),
    Unknown(String),
}

/// Split `/cmd@botname rest...` into a lowercase command name and the rest.
pub fn split_command(text: &str) -> (String, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let (cmd, arg) = split_command(text);
        let arg = arg.split_whitespace().next().unwrap_or("");

        match cmd.as_str() {
            "start" | "help" => Command::Help,
            "setsource" => setter(arg, "Usage: /setsource <source_chat_id>", |v: i64| {
                Some(JobField::Source(ChatId(v)))
            }),
            "setdest" => setter(arg, "Usage: /setdest <destination_channel_id>", |v: i64| {
                Some(JobField::Destination(ChatId(v)))
            }),
            "setstartid" => setter(arg, "Usage: /setstartid <start_message_id>", |v: i32| {
                Some(JobField::StartCursor(MessageId(v)))
            }),
            "setbatchsize" => setter(arg, "Usage: /setbatchsize <batch_size>", |v: u32| {
                (v > 0).then_some(JobField::BatchSize(v))
            }),
            "setsleeptime" => setter(
                arg,
                "Usage: /setsleeptime <sleep_time_in_seconds>",
                |v: u64| Some(JobField::Cooldown(Duration::from_secs(v))),
            ),
            "setdelay" => setter(
                arg,
                "Usage: /setdelay <delay_between_messages_in_seconds>",
                |v: u64| Some(JobField::InterMessageDelay(Duration::from_secs(v))),
            ),
            "listchats" => Command::ListChats,
            "forward" => Command::Forward,
            "stop" => Command::Stop,
            "resume" => Command::Resume,
            "stats" => Command::Stats,
            _ => Command::Unknown(cmd),
        }
    }
}

fn setter<T: std::str::FromStr>(
    arg: &str,
    usage: &'static str,
    build: impl FnOnce(T) -> Option<JobField>,
) -> Command {
    arg.parse::<T>()
        .ok()
        .and_then(build)
        .map(Command::Set)
        .unwrap_or(Command::Usage(usage))
}

/// Human confirmation for a successful setter.
pub fn describe_field(field: &JobField) -> String {
    match field {
        JobField::Source(id) => format!("Source chat ID set to: {id}"),
        JobField::Destination(id) => format!("Destination channel ID set to: {id}"),
        JobField::StartCursor(id) => format!("Start message ID set to: {id}"),
        JobField::BatchSize(n) => format!("Batch size set to: {n}"),
        JobField::Cooldown(d) => format!("Sleep time set to: {} seconds", d.as_secs()),
        JobField::InterMessageDelay(d) => {
            format!("Delay between messages set to: {} seconds", d.as_secs())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_slash_and_bot_suffix() {
        assert_eq!(
            split_command("/SetSource@fwd_bot  -100123 extra"),
            ("setsource".to_string(), "-100123 extra".to_string())
        );
        assert_eq!(split_command("/stats"), ("stats".to_string(), String::new()));
    }

    #[test]
    fn parses_setters() {
        assert_eq!(
            Command::parse("/setsource -1001"),
            Command::Set(JobField::Source(ChatId(-1001)))
        );
        assert_eq!(
            Command::parse("/setdest -1002"),
            Command::Set(JobField::Destination(ChatId(-1002)))
        );
        assert_eq!(
            Command::parse("/setstartid 77"),
            Command::Set(JobField::StartCursor(MessageId(77)))
        );
        assert_eq!(
            Command::parse("/setbatchsize 50"),
            Command::Set(JobField::BatchSize(50))
        );
        assert_eq!(
            Command::parse("/setsleeptime 600"),
            Command::Set(JobField::Cooldown(Duration::from_secs(600)))
        );
        assert_eq!(
            Command::parse("/setdelay 0"),
            Command::Set(JobField::InterMessageDelay(Duration::ZERO))
        );
    }

    #[test]
    fn malformed_or_missing_arguments_yield_usage() {
        assert_eq!(
            Command::parse("/setsource"),
            Command::Usage("Usage: /setsource <source_chat_id>")
        );
        assert_eq!(
            Command::parse("/setdest abc"),
            Command::Usage("Usage: /setdest <destination_channel_id>")
        );
        assert_eq!(
            Command::parse("/setbatchsize 0"),
            Command::Usage("Usage: /setbatchsize <batch_size>")
        );
        assert_eq!(
            Command::parse("/setdelay -1"),
            Command::Usage("Usage: /setdelay <delay_between_messages_in_seconds>")
        );
    }

    #[test]
    fn parses_actions_and_unknowns() {
        assert_eq!(Command::parse("/forward"), Command::Forward);
        assert_eq!(Command::parse("/resume"), Command::Resume);
        assert_eq!(Command::parse("/stop"), Command::Stop);
        assert_eq!(Command::parse("/stats"), Command::Stats);
        assert_eq!(Command::parse("/listchats"), Command::ListChats);
        assert_eq!(Command::parse("/start"), Command::Help);
        assert_eq!(Command::parse("/frobnicate"), Command::Unknown("frobnicate".to_string()));
    }

    #[test]
    fn confirmations_read_naturally() {
        assert_eq!(
            describe_field(&JobField::Cooldown(Duration::from_secs(60))),
            "Sleep time set to: 60 seconds"
        );
        assert_eq!(
            describe_field(&JobField::Source(ChatId(-5))),
            "Source chat ID set to: -5"
        );
    }
}
