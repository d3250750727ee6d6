//! Background loops owned by an in-progress session: the countdown ticker and
//! the liveness heartbeat. Both hold only a weak reference to the coordinator
//! and are aborted when the session runtime is torn down.

use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

use super::session_service::{CoordinatorInner, TickOutcome};
use crate::errors::CoordinatorError;
use crate::metrics::HEARTBEATS_TOTAL;

pub(crate) fn spawn_ticker(inner: Weak<CoordinatorInner>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let Some(inner) = inner.upgrade() else {
                break;
            };

            match inner.on_tick(Instant::now()) {
                TickOutcome::Continue => {}
                TickOutcome::Stop => break,
                TickOutcome::Expired => {
                    if inner.claim_auto_submit() {
                        // Runs outside the session runtime so teardown cannot cancel it midway.
                        tokio::spawn(inner.auto_submit());
                    }
                    break;
                }
            }
        }

        tracing::debug!("Session ticker stopped");
    })
}

pub(crate) fn spawn_heartbeat(inner: Weak<CoordinatorInner>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(inner) = inner.upgrade() else {
                break;
            };
            let Some((session_id, request)) = inner.heartbeat_payload(Instant::now()) else {
                break;
            };
            let api = inner.api();
            drop(inner);

            match api.session_heartbeat(&session_id, &request).await {
                Ok(()) => {
                    HEARTBEATS_TOTAL.with_label_values(&["success"]).inc();
                    tracing::debug!(
                        "Heartbeat sent: session={}, active={}, elapsed={}s",
                        session_id,
                        request.is_active,
                        request.metadata.elapsed_seconds
                    );
                }
                Err(e) => {
                    HEARTBEATS_TOTAL.with_label_values(&["error"]).inc();
                    let err = CoordinatorError::Heartbeat(e);
                    tracing::warn!("Session {}: {}", session_id, err);
                }
            }
        }

        tracing::debug!("Session heartbeat stopped");
    })
}
