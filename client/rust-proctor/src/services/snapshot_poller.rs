use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::api::AssessmentApi;
use crate::metrics::SNAPSHOT_POLLS_TOTAL;
use crate::models::SessionSnapshot;

/// Periodically fetches the server view of a session and publishes the latest
/// snapshot. Consumers only see a stream of snapshots, so a push transport
/// can replace the polling without changing them.
pub struct SnapshotPoller {
    api: Arc<dyn AssessmentApi>,
    period: Duration,
}

/// Stops the poll loop when dropped.
pub struct PollerHandle {
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl SnapshotPoller {
    pub fn new(api: Arc<dyn AssessmentApi>, period: Duration) -> Self {
        Self { api, period }
    }

    pub fn spawn(
        self,
        session_id: String,
    ) -> (watch::Receiver<Option<SessionSnapshot>>, PollerHandle) {
        let (tx, rx) = watch::channel(None);

        let task = tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                "Polling session {} every {}s",
                session_id,
                self.period.as_secs()
            );

            loop {
                ticker.tick().await;

                match self.api.get_assessment_session(&session_id).await {
                    Ok(snapshot) => {
                        SNAPSHOT_POLLS_TOTAL.with_label_values(&["success"]).inc();
                        let terminal = snapshot.status.is_terminal();
                        tx.send_if_modified(|current| {
                            if current.as_ref() == Some(&snapshot) {
                                false
                            } else {
                                *current = Some(snapshot);
                                true
                            }
                        });
                        if terminal {
                            tracing::info!("Session {} reached a terminal status", session_id);
                            break;
                        }
                    }
                    Err(e) => {
                        SNAPSHOT_POLLS_TOTAL.with_label_values(&["error"]).inc();
                        tracing::warn!("Snapshot poll for session {} failed: {}", session_id, e);
                    }
                }

                if tx.is_closed() {
                    break;
                }
            }
        });

        (rx, PollerHandle { task })
    }
}
