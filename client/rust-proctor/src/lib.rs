//! Client-side coordinator for proctored assessment sessions.
//!
//! A [`SessionCoordinator`] drives one attempt in one tab: it starts the
//! session against the assessment API, keeps the countdown and heartbeat
//! running, turns browser signals into security reports, stages answers, and
//! submits exactly once when the learner confirms or the time limit is hit.

pub mod api;
pub mod browser;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod services;
pub mod telemetry;
pub mod utils;

pub use api::{AssessmentApi, HttpAssessmentApi};
pub use browser::{BrowserEvent, BrowserHost, EventDisposition, EventKind, KeyCombo};
pub use config::Config;
pub use errors::{ApiError, CoordinatorError};
pub use services::session_service::SessionCoordinator;
pub use services::snapshot_poller::SnapshotPoller;
pub use services::AppState;
