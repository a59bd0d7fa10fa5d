//! The forwarding job: a single process-wide run loop with cooperative stop.
//!
//! - `start` forwards from the configured start id (or the cursor)
//! - `resume` forwards from the persisted cursor only
//! - `stop` is observed between messages; a send in flight always completes
//! - the cursor file is written when a run ends and on every `stop`

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    cursor::CursorStore,
    domain::{ChatId, MessageId},
    errors::Error,
    job::{ForwardSettings, JobField, JobSnapshot, JobStatus, RunOutcome, RunSummary},
    messaging::port::MessagingPort,
    pacing::{BatchPacer, PacingSettings, Pause},
    source::OrderedSource,
    transport::{ChatSummary, DeliveryError, ForwardTransport, SourceMessage},
    Result,
};

#[derive(Debug)]
struct JobState {
    settings: ForwardSettings,
    status: JobStatus,
    total_forwarded: u64,
    last_forwarded_id: Option<MessageId>,
    cancel: Option<CancellationToken>,
}

/// Everything a run needs that is fixed at start.
struct RunPlan {
    source: ChatId,
    destination: ChatId,
    after: Option<MessageId>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct RunCounters {
    forwarded: u64,
    skipped: Vec<MessageId>,
    rate_limit_waits: u32,
}

pub struct ForwardingController {
    transport: Arc<dyn ForwardTransport>,
    cursor: CursorStore,
    // Held across reading the cursor and writing it out.
    persist: Mutex<()>,
    state: Mutex<JobState>,
}

impl ForwardingController {
    /// Build the controller and read the persisted cursor once.
    pub fn new(
        settings: ForwardSettings,
        transport: Arc<dyn ForwardTransport>,
        cursor: CursorStore,
    ) -> Result<Self> {
        let last_forwarded_id = cursor.load()?;
        if let Some(id) = last_forwarded_id {
            info!(last_message_id = id.0, path = %cursor.path().display(), "loaded cursor");
        }

        Ok(Self {
            transport,
            cursor,
            persist: Mutex::new(()),
            state: Mutex::new(JobState {
                settings,
                status: JobStatus::Idle,
                total_forwarded: 0,
                last_forwarded_id,
                cancel: None,
            }),
        })
    }

    pub async fn configure(&self, field: JobField) -> Result<()> {
        let mut st = self.state.lock().await;
        st.settings.apply(field)?;
        debug!(?field, "job field updated");
        Ok(())
    }

    pub async fn status(&self) -> JobSnapshot {
        let st = self.state.lock().await;
        JobSnapshot {
            active: st.status.is_active(),
            status: st.status,
            total_forwarded: st.total_forwarded,
            last_forwarded_id: st.last_forwarded_id,
            settings: st.settings.clone(),
        }
    }

    pub async fn list_chats(&self) -> Result<Vec<ChatSummary>> {
        self.transport.list_chats().await
    }

    /// Forward from the configured start id, falling back to the cursor.
    ///
    /// Progress notices go to `chat_id`. Returns once the source is exhausted,
    /// a stop is observed, or the source faults.
    pub async fn start(
        &self,
        chat_id: ChatId,
        messenger: Arc<dyn MessagingPort>,
    ) -> Result<RunSummary> {
        let plan = self
            .begin_run(|settings, last| Ok(settings.start_cursor.or(last)))
            .await?;
        Ok(self.run(plan, chat_id, messenger).await)
    }

    /// Forward strictly after the persisted cursor.
    pub async fn resume(
        &self,
        chat_id: ChatId,
        messenger: Arc<dyn MessagingPort>,
    ) -> Result<RunSummary> {
        let plan = self
            .begin_run(|_, last| last.map(Some).ok_or(Error::NoCursor))
            .await?;
        Ok(self.run(plan, chat_id, messenger).await)
    }

    /// Request a cooperative stop and persist the cursor.
    ///
    /// Returns whether a running job was signalled. The cursor is saved either
    /// way; a save failure leaves the in-memory cursor untouched.
    pub async fn stop(&self) -> Result<bool> {
        let signalled = {
            let mut st = self.state.lock().await;
            if st.status == JobStatus::Running {
                st.status = JobStatus::StopRequested;
                if let Some(tok) = &st.cancel {
                    tok.cancel();
                }
                true
            } else {
                false
            }
        };
        if signalled {
            info!("stop requested");
        }

        self.persist_cursor().await?;
        Ok(signalled)
    }

    async fn begin_run(
        &self,
        pick_after: impl FnOnce(&ForwardSettings, Option<MessageId>) -> Result<Option<MessageId>>,
    ) -> Result<RunPlan> {
        let mut st = self.state.lock().await;
        if st.status.is_active() {
            return Err(Error::AlreadyRunning);
        }
        let (Some(source), Some(destination)) = (st.settings.source, st.settings.destination)
        else {
            return Err(Error::Config(
                "source and destination chat ids must both be set".to_string(),
            ));
        };
        let after = pick_after(&st.settings, st.last_forwarded_id)?;

        let cancel = CancellationToken::new();
        st.status = JobStatus::Running;
        st.cancel = Some(cancel.clone());

        Ok(RunPlan {
            source,
            destination,
            after,
            cancel,
        })
    }

    async fn run(
        &self,
        plan: RunPlan,
        chat_id: ChatId,
        messenger: Arc<dyn MessagingPort>,
    ) -> RunSummary {
        let started_at = Utc::now();
        info!(
            source = plan.source.0,
            destination = plan.destination.0,
            after = plan.after.map(|id| id.0),
            "forwarding started"
        );
        let _ = messenger
            .send_html(chat_id, "Forwarding process started.")
            .await;

        let mut counters = RunCounters::default();
        let outcome = self
            .drive(&plan, &mut counters, chat_id, messenger.as_ref())
            .await;

        let (total_forwarded, last_forwarded_id) = {
            let mut st = self.state.lock().await;
            st.status = match outcome {
                RunOutcome::Stopped => JobStatus::Stopped,
                _ => JobStatus::Idle,
            };
            st.cancel = None;
            (st.total_forwarded, st.last_forwarded_id)
        };

        let persist_error = match self.persist_cursor().await {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, "cursor not saved; will retry on next stop");
                Some(e.to_string())
            }
        };

        if outcome == RunOutcome::Stopped {
            let _ = messenger
                .send_html(chat_id, "Forwarding process stopped.")
                .await;
        }

        info!(
            outcome = ?outcome,
            forwarded = counters.forwarded,
            skipped = counters.skipped.len(),
            total_forwarded,
            "forwarding finished"
        );

        RunSummary {
            outcome,
            forwarded: counters.forwarded,
            skipped: counters.skipped,
            rate_limit_waits: counters.rate_limit_waits,
            total_forwarded,
            last_forwarded_id,
            started_at,
            finished_at: Utc::now(),
            persist_error,
        }
    }

    async fn drive(
        &self,
        plan: &RunPlan,
        counters: &mut RunCounters,
        chat_id: ChatId,
        messenger: &dyn MessagingPort,
    ) -> RunOutcome {
        let mut source =
            match OrderedSource::open(self.transport.as_ref(), plan.source, plan.after).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "failed to open source");
                    return RunOutcome::Aborted(e.to_string());
                }
            };

        let mut pacer = BatchPacer::default();
        // Set after a rate-limit wait so the same message is attempted again.
        let mut retry: Option<SourceMessage> = None;

        loop {
            if plan.cancel.is_cancelled() {
                return RunOutcome::Stopped;
            }

            let message = match retry.take() {
                Some(m) => m,
                None => match source.next().await {
                    Ok(Some(m)) => m,
                    Ok(None) => return RunOutcome::Completed,
                    Err(e) => {
                        warn!(error = %e, "source sequence failed");
                        return RunOutcome::Aborted(e.to_string());
                    }
                },
            };

            let pause = match self.transport.send(plan.destination, &message).await {
                Ok(()) => {
                    counters.forwarded += 1;
                    let pacing = self.record_delivery(message.id).await;
                    debug!(id = message.id.0, "forwarded");
                    pacer.on_success(&pacing)
                }
                Err(DeliveryError::RateLimited { wait }) => {
                    counters.rate_limit_waits += 1;
                    warn!(id = message.id.0, wait_secs = wait.as_secs(), "rate limited");
                    let _ = messenger
                        .send_html(
                            chat_id,
                            &format!("Rate limit reached. Waiting for {} seconds.", wait.as_secs()),
                        )
                        .await;
                    retry = Some(message);
                    pacer.on_rate_limited(wait)
                }
                Err(DeliveryError::Transient(reason)) => {
                    // Skipped for good: no retry and no record in the cursor.
                    warn!(id = message.id.0, %reason, "skipping message");
                    counters.skipped.push(message.id);
                    pacer.on_skipped()
                }
            };

            if let Pause::BatchCooldown(d) = pause {
                info!(secs = d.as_secs(), "batch complete, cooling down");
            }
            wait_or_cancel(pause.duration(), &plan.cancel).await;
        }
    }

    /// Count a confirmed delivery and return the pacing knobs as they are now.
    async fn record_delivery(&self, id: MessageId) -> PacingSettings {
        let mut st = self.state.lock().await;
        st.total_forwarded += 1;
        st.last_forwarded_id = Some(st.last_forwarded_id.map_or(id, |prev| prev.max(id)));
        st.settings.pacing()
    }

    /// Save the in-memory cursor. Concurrent callers write in turn, so the file
    /// never moves back to an id read before a later delivery.
    async fn persist_cursor(&self) -> Result<()> {
        let _write = self.persist.lock().await;
        let last = self.state.lock().await.last_forwarded_id;
        self.cursor.save(last)
    }
}

/// Sleep for `d`, returning early when a stop is requested.
async fn wait_or_cancel(d: Duration, cancel: &CancellationToken) {
    if d.is_zero() {
        return;
    }
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = sleep(d) => {}
    }
}
