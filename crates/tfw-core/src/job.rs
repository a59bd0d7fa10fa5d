use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{
    config::Config,
    domain::{ChatId, MessageId},
    errors::Error,
    pacing::PacingSettings,
    Result,
};

/// Job lifecycle as seen by commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Idle,
    Running,
    StopRequested,
    Stopped,
}

impl JobStatus {
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Running | JobStatus::StopRequested)
    }

    pub fn label(self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Running => "running",
            JobStatus::StopRequested => "stopping",
            JobStatus::Stopped => "stopped",
        }
    }
}

/// Operator-controlled job configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwardSettings {
    pub source: Option<ChatId>,
    pub destination: Option<ChatId>,
    pub start_cursor: Option<MessageId>,
    pub batch_size: u32,
    pub cooldown: Duration,
    pub inter_message_delay: Duration,
}

impl Default for ForwardSettings {
    fn default() -> Self {
        Self {
            source: None,
            destination: None,
            start_cursor: None,
            batch_size: crate::config::DEFAULT_BATCH_SIZE,
            cooldown: crate::config::DEFAULT_SLEEP_TIME,
            inter_message_delay: crate::config::DEFAULT_DELAY,
        }
    }
}

impl ForwardSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            source: cfg.source_chat_id,
            destination: cfg.destination_chat_id,
            start_cursor: cfg.start_message_id,
            batch_size: cfg.batch_size,
            cooldown: cfg.sleep_time,
            inter_message_delay: cfg.delay_between_messages,
        }
    }

    pub fn pacing(&self) -> PacingSettings {
        PacingSettings {
            batch_size: self.batch_size,
            cooldown: self.cooldown,
            inter_message_delay: self.inter_message_delay,
        }
    }

    pub fn apply(&mut self, field: JobField) -> Result<()> {
        match field {
            JobField::Source(id) => self.source = Some(id),
            JobField::Destination(id) => self.destination = Some(id),
            JobField::StartCursor(id) => self.start_cursor = Some(id),
            JobField::BatchSize(0) => {
                return Err(Error::Config(
                    "batch size must be a positive integer".to_string(),
                ))
            }
            JobField::BatchSize(n) => self.batch_size = n,
            JobField::Cooldown(d) => self.cooldown = d,
            JobField::InterMessageDelay(d) => self.inter_message_delay = d,
        }
        Ok(())
    }
}

/// One configurable job field with its new value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobField {
    Source(ChatId),
    Destination(ChatId),
    StartCursor(MessageId),
    BatchSize(u32),
    Cooldown(Duration),
    InterMessageDelay(Duration),
}

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The source sequence was exhausted.
    Completed,
    /// A stop request was observed between messages.
    Stopped,
    /// The source sequence faulted; the next run restarts from the cursor.
    Aborted(String),
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub forwarded: u64,
    /// Messages dropped after a non-rate-limit failure, in attempt order.
    pub skipped: Vec<MessageId>,
    pub rate_limit_waits: u32,
    pub total_forwarded: u64,
    pub last_forwarded_id: Option<MessageId>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub persist_error: Option<String>,
}

impl RunSummary {
    pub fn elapsed_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds().max(0)
    }
}

/// Point-in-time view of the job for `stats`.
#[derive(Clone, Debug)]
pub struct JobSnapshot {
    pub active: bool,
    pub status: JobStatus,
    pub total_forwarded: u64,
    pub last_forwarded_id: Option<MessageId>,
    pub settings: ForwardSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_updates_fields_and_rejects_zero_batch() {
        let mut s = ForwardSettings::default();
        s.apply(JobField::Source(ChatId(-1))).unwrap();
        s.apply(JobField::Destination(ChatId(-2))).unwrap();
        s.apply(JobField::Cooldown(Duration::from_secs(5))).unwrap();
        assert_eq!(s.source, Some(ChatId(-1)));
        assert_eq!(s.destination, Some(ChatId(-2)));
        assert_eq!(s.pacing().cooldown, Duration::from_secs(5));

        let before = s.clone();
        assert!(matches!(s.apply(JobField::BatchSize(0)), Err(Error::Config(_))));
        assert_eq!(s, before);
    }

    #[test]
    fn only_running_states_are_active() {
        assert!(JobStatus::Running.is_active());
        assert!(JobStatus::StopRequested.is_active());
        assert!(!JobStatus::Idle.is_active());
        assert!(!JobStatus::Stopped.is_active());
    }
}
