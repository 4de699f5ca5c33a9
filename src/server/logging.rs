//! Request logging middleware and account audit events.
//!
//! Every request gets a unique id, echoed in the `X-Request-Id` response header,
//! and a span carrying method and path so the handler's own log lines can be
//! correlated with the completion line.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, Response},
    middleware::Next,
};
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Account lifecycle events worth an audit line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountEvent {
    /// Payment reminder dispatched by the monthly sweep
    Reminded,
    /// Disabled and marked inactive for unpaid debt
    Deactivated,
    /// Identity record was missing during deactivation
    IdentityMissing,
    /// An operator enabled the account
    Enabled,
    /// An operator disabled the account
    Disabled,
    /// An operator deleted the identity record
    Deleted,
}

impl std::fmt::Display for AccountEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AccountEvent::Reminded => "reminded",
            AccountEvent::Deactivated => "deactivated",
            AccountEvent::IdentityMissing => "identity_missing",
            AccountEvent::Enabled => "enabled",
            AccountEvent::Disabled => "disabled",
            AccountEvent::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

/// Log an account lifecycle event.
///
/// * `event` - What happened
/// * `account_id` - Student id or identity uid
/// * `details` - Optional free-form context
pub fn log_account_event(event: AccountEvent, account_id: &str, details: Option<&str>) {
    let span = info_span!(
        "account_event",
        event = %event,
        account_id = %account_id,
    );
    let _enter = span.enter();

    match event {
        AccountEvent::IdentityMissing => {
            if let Some(d) = details {
                warn!(reason = %d, "Account event occurred");
            } else {
                warn!("Account event occurred");
            }
        }
        _ => {
            if let Some(d) = details {
                info!(details = %d, "Account event occurred");
            } else {
                info!("Account event occurred");
            }
        }
    }
}

/// Header name for the request ID.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Logging middleware that tracks request timing and generates request IDs.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response<Body> {
    let request_id = generate_request_id();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    let start = Instant::now();

    let response = async move {
        info!("Started processing request");
        next.run(request).await
    }
    .instrument(span.clone())
    .await;

    let duration = start.elapsed();
    let status = response.status();

    let _enter = span.enter();
    info!(
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        "Request completed"
    );

    let (mut parts, body) = response.into_parts();
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        parts.headers.insert(REQUEST_ID_HEADER, header_value);
    }

    Response::from_parts(parts, body)
}

/// Health check response structure.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    /// Deferred units still running
    pub pending_tasks: usize,
}

impl HealthResponse {
    pub fn healthy(pending_tasks: usize) -> Self {
        Self {
            status: "healthy".to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            pending_tasks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_is_valid_uuid() {
        let id = generate_request_id();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn health_response_names_service() {
        let health = HealthResponse::healthy(2);
        assert_eq!(health.status, "healthy");
        assert_eq!(health.service, "aurora-mentis");
        assert_eq!(health.pending_tasks, 2);
    }

    #[test]
    fn event_names() {
        assert_eq!(AccountEvent::IdentityMissing.to_string(), "identity_missing");
        assert_eq!(AccountEvent::Deactivated.to_string(), "deactivated");
    }
}
