//! Wait decisions applied after every delivery attempt.

use std::time::Duration;

/// Pacing knobs. Read fresh on every decision so changes apply mid-run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacingSettings {
    /// Consecutive successes before the long cooldown.
    pub batch_size: u32,
    /// Wait after a full batch.
    pub cooldown: Duration,
    /// Wait after every other success.
    pub inter_message_delay: Duration,
}

/// What the run loop should do before its next attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pause {
    None,
    InterMessage(Duration),
    BatchCooldown(Duration),
    RateLimit(Duration),
}

impl Pause {
    pub fn duration(self) -> Duration {
        match self {
            Pause::None => Duration::ZERO,
            Pause::InterMessage(d) | Pause::BatchCooldown(d) | Pause::RateLimit(d) => d,
        }
    }
}

/// Counts consecutive successes since the last cooldown or rate-limit wait.
#[derive(Debug, Default)]
pub struct BatchPacer {
    batch_count: u32,
}

impl BatchPacer {
    pub fn batch_count(&self) -> u32 {
        self.batch_count
    }

    pub fn on_success(&mut self, settings: &PacingSettings) -> Pause {
        self.batch_count += 1;
        if self.batch_count >= settings.batch_size.max(1) {
            self.batch_count = 0;
            return Pause::BatchCooldown(settings.cooldown);
        }
        Pause::InterMessage(settings.inter_message_delay)
    }

    /// The server told us exactly how long to wait; honor it verbatim.
    pub fn on_rate_limited(&mut self, wait: Duration) -> Pause {
        self.batch_count = 0;
        Pause::RateLimit(wait)
    }

    /// A skipped message neither counts toward the batch nor resets it.
    pub fn on_skipped(&mut self) -> Pause {
        Pause::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(batch_size: u32) -> PacingSettings {
        PacingSettings {
            batch_size,
            cooldown: Duration::from_secs(1200),
            inter_message_delay: Duration::from_secs(1),
        }
    }

    #[test]
    fn cooldown_fires_once_per_full_batch() {
        let s = settings(3);
        let mut pacer = BatchPacer::default();

        let pauses: Vec<Pause> = (0..7).map(|_| pacer.on_success(&s)).collect();
        assert_eq!(
            pauses,
            vec![
                Pause::InterMessage(Duration::from_secs(1)),
                Pause::InterMessage(Duration::from_secs(1)),
                Pause::BatchCooldown(Duration::from_secs(1200)),
                Pause::InterMessage(Duration::from_secs(1)),
                Pause::InterMessage(Duration::from_secs(1)),
                Pause::BatchCooldown(Duration::from_secs(1200)),
                Pause::InterMessage(Duration::from_secs(1)),
            ]
        );
        assert_eq!(pacer.batch_count(), 1);
    }

    #[test]
    fn rate_limit_resets_the_batch() {
        let s = settings(3);
        let mut pacer = BatchPacer::default();
        pacer.on_success(&s);
        pacer.on_success(&s);

        assert_eq!(
            pacer.on_rate_limited(Duration::from_secs(3)),
            Pause::RateLimit(Duration::from_secs(3))
        );
        assert_eq!(pacer.batch_count(), 0);

        // A full batch is needed again before the next cooldown.
        assert!(matches!(pacer.on_success(&s), Pause::InterMessage(_)));
        assert!(matches!(pacer.on_success(&s), Pause::InterMessage(_)));
        assert!(matches!(pacer.on_success(&s), Pause::BatchCooldown(_)));
    }

    #[test]
    fn skip_keeps_the_batch_count() {
        let s = settings(2);
        let mut pacer = BatchPacer::default();
        pacer.on_success(&s);
        assert_eq!(pacer.on_skipped(), Pause::None);
        assert_eq!(pacer.batch_count(), 1);
        assert!(matches!(pacer.on_success(&s), Pause::BatchCooldown(_)));
    }

    #[test]
    fn shrinking_batch_size_mid_run_triggers_cooldown_immediately() {
        let mut pacer = BatchPacer::default();
        pacer.on_success(&settings(10));
        pacer.on_success(&settings(10));
        pacer.on_success(&settings(10));
        assert!(matches!(pacer.on_success(&settings(2)), Pause::BatchCooldown(_)));
        assert_eq!(pacer.batch_count(), 0);
    }
}
