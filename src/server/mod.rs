// src/server/mod.rs

//! HTTP layer.
//!
//! This module contains:
//! - `api_error` → JSON error envelope
//! - `auth`      → staff bearer-token extractor
//! - `cron`      → the monthly sweeps and their endpoints
//! - `handlers`  → shared state and the email endpoints
//! - `logging`   → request logging middleware and account audit events
//! - `routes`    → router builder
//! - `tasks`     → deferred work tracker
//! - `users`     → user administration endpoints

pub mod api_error;
pub mod auth;
pub mod cron;
pub mod handlers;
pub mod logging;
pub mod routes;
pub mod tasks;
pub mod users;

pub use api_error::{ApiError, ErrorCode};
pub use auth::{Role, StaffUser};
pub use cron::{
    deactivate_overdue_account, schedule_overdue_deactivations, schedule_payment_reminders,
    SweepOutcome, SweepResponse,
};
pub use handlers::{Acknowledgement, AppState};
pub use routes::build_router;
pub use tasks::BackgroundTasks;
