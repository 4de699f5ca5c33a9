//! Aurora Mentis - the ADE Academy payments and notifications backend
//!
//! # Features
//!
//! - `server` - HTTP API (handlers, auth, routing). Enabled by default.
//! - `background-jobs` - Monthly reminder and deactivation sweeps on a cron
//!   schedule. Enabled by default.
//!
//! Without features the crate still provides the account model, the overdue
//! selector, the email formatter and the mail dispatcher.

// Core modules (always available)
pub mod accounts;
pub mod config;
pub mod errors;
pub mod formatter;
pub mod notifications;
pub mod selector;
pub mod validation;

// External collaborators
pub mod firebase;
pub mod identity;
pub mod mailer;
pub mod store;

// In-memory collaborators for tests and local runs
pub mod sim;

// Server-related modules (requires "server" feature)
#[cfg(feature = "server")]
#[path = "server/mod.rs"]
pub mod server;

// Scheduled sweeps (requires "background-jobs" feature)
#[cfg(feature = "background-jobs")]
pub mod jobs;
