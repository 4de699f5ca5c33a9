use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::server::cron::{deactivate_overdue_users_handler, send_payment_reminders_handler};
use crate::server::handlers::{
    health_handler, index_handler, send_payment_notification_handler,
    send_platform_assignment_handler, send_scholarship_notification_handler, AppState,
};
use crate::server::logging::request_logging_middleware;
use crate::server::users::{delete_user_handler, update_user_status_handler};

/// CORS for the frontend: listed origins only, with credentials.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring unusable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
}

/// Build the application router.
///
/// # Routes
///
/// ## Emails
/// - `POST /emails/send-payment-notification`
/// - `POST /emails/send-scholarship-notification`
/// - `POST /emails/send-platform-assignment`
///
/// ## Sweeps
/// - `POST /cron/send-payment-reminders`
/// - `POST /cron/deactivate-overdue-users`
///
/// ## Users (admin or cashier)
/// - `PATCH /users/{uid}/status`
/// - `DELETE /users/{uid}`
///
/// ## Operational
/// - `GET /`
/// - `GET /health`
pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route(
            "/emails/send-payment-notification",
            post(send_payment_notification_handler),
        )
        .route(
            "/emails/send-scholarship-notification",
            post(send_scholarship_notification_handler),
        )
        .route(
            "/emails/send-platform-assignment",
            post(send_platform_assignment_handler),
        )
        .route(
            "/cron/send-payment-reminders",
            post(send_payment_reminders_handler),
        )
        .route(
            "/cron/deactivate-overdue-users",
            post(deactivate_overdue_users_handler),
        )
        .route("/users/:uid/status", patch(update_user_status_handler))
        .route("/users/:uid", delete(delete_user_handler))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}
