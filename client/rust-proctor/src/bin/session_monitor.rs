//! Watches one assessment session from the server side and logs every change
//! until it reaches a terminal status. Usage: `session-monitor <session-id>`.

use std::sync::Arc;

use anyhow::Context;
use assessment_proctor::{
    config::Config, metrics::render_metrics, telemetry::init_tracing, AssessmentApi,
    HttpAssessmentApi, SnapshotPoller,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _telemetry = init_tracing("assessment-proctor-monitor")?;

    let session_id = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("APP_MONITOR_SESSION_ID").ok())
        .context("usage: session-monitor <session-id>")?;

    let config = Config::load().context("Failed to load configuration")?;
    let api: Arc<dyn AssessmentApi> = Arc::new(HttpAssessmentApi::new(&config)?);

    let poller = SnapshotPoller::new(api, config.snapshot_poll_interval());
    let (mut snapshots, handle) = poller.spawn(session_id.clone());

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    tracing::info!(
                        "Session {}: status={:?}, answered={}, security_events={}, risk={:?}",
                        snapshot.session_id,
                        snapshot.status,
                        snapshot.answered_count,
                        snapshot.security_event_count,
                        snapshot.risk_score
                    );
                    if snapshot.status.is_terminal() {
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping monitor for session {}", session_id);
                break;
            }
        }
    }

    drop(handle);

    match render_metrics() {
        Ok(text) => tracing::debug!("Final metrics:\n{}", text),
        Err(e) => tracing::warn!("Failed to render metrics: {}", e),
    }

    Ok(())
}
