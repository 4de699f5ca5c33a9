//! Shared state and the direct-payload email handlers.
//!
//! Each handler validates its payload into a [`Notification`] and schedules the
//! send as a deferred unit. A validation failure is a 400 and nothing is
//! scheduled; a 202 only means the email was queued.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AcademyResult;
use crate::formatter::Formatter;
use crate::identity::IdentityProvider;
use crate::mailer::Mailer;
use crate::notifications::{Notification, PaymentConfirmed, PlatformsAssigned, ScholarshipGranted};
use crate::server::api_error::ApiError;
use crate::server::logging::HealthResponse;
use crate::server::tasks::BackgroundTasks;
use crate::sim::SimBackend;
use crate::store::AcademyStore;

/// Dependencies shared by every handler, built once at start-up.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AcademyStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub mailer: Mailer,
    pub tasks: BackgroundTasks,
    /// Timezone that decides what "today" is for the overdue check
    pub timezone: Tz,
}

impl AppState {
    pub fn new(
        store: Arc<dyn AcademyStore>,
        identity: Arc<dyn IdentityProvider>,
        mailer: Mailer,
        timezone: Tz,
    ) -> Self {
        Self {
            store,
            identity,
            mailer,
            tasks: BackgroundTasks::new(),
            timezone,
        }
    }

    /// State wired to in-memory collaborators.
    pub fn simulated(sim: &SimBackend) -> AcademyResult<Self> {
        let mailer = Mailer::new(
            sim.transport.clone(),
            Formatter::new("ADE Academy", "957-018-079")?,
            "pagos@ade.example.com",
        );
        Ok(Self::new(
            sim.store.clone(),
            sim.identity.clone(),
            mailer,
            chrono_tz::America::Lima,
        ))
    }

    /// Queue `notification` for formatting and delivery.
    pub fn schedule_notification(&self, notification: Notification) {
        let mailer = self.mailer.clone();
        self.tasks.spawn(notification.kind(), async move {
            mailer.notify(&notification).await;
        });
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("mailer", &self.mailer)
            .field("tasks", &self.tasks)
            .field("timezone", &self.timezone)
            .finish_non_exhaustive()
    }
}

/// `{"message": "..."}` acknowledgement body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub message: String,
}

impl Acknowledgement {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

type Accepted = (StatusCode, Json<Acknowledgement>);

fn accept<T>(
    state: &AppState,
    payload: Result<Json<T>, JsonRejection>,
    message: &str,
) -> Result<Accepted, ApiError>
where
    Notification: TryFrom<T, Error = crate::validation::ValidationError>,
{
    let Json(payload) = payload?;
    let notification = Notification::try_from(payload)?;

    info!(
        kind = notification.kind(),
        student_email = %notification.recipient().student_email,
        "Scheduling notification"
    );
    state.schedule_notification(notification);

    Ok((StatusCode::ACCEPTED, Json(Acknowledgement::new(message))))
}

/// `POST /emails/send-payment-notification`
pub async fn send_payment_notification_handler(
    State(state): State<AppState>,
    payload: Result<Json<PaymentConfirmed>, JsonRejection>,
) -> Result<Accepted, ApiError> {
    accept(
        &state,
        payload,
        "La notificación de pago ha sido programada para envío.",
    )
}

/// `POST /emails/send-scholarship-notification`
pub async fn send_scholarship_notification_handler(
    State(state): State<AppState>,
    payload: Result<Json<ScholarshipGranted>, JsonRejection>,
) -> Result<Accepted, ApiError> {
    accept(
        &state,
        payload,
        "La notificación de beca ha sido programada para envío.",
    )
}

/// `POST /emails/send-platform-assignment`
pub async fn send_platform_assignment_handler(
    State(state): State<AppState>,
    payload: Result<Json<PlatformsAssigned>, JsonRejection>,
) -> Result<Accepted, ApiError> {
    accept(
        &state,
        payload,
        "La notificación de plataformas ha sido programada para envío.",
    )
}

/// `GET /`
pub async fn index_handler() -> Json<Acknowledgement> {
    Json(Acknowledgement::new(
        "Welcome to Aurora Mentis API. The system is running.",
    ))
}

/// `GET /health`
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.tasks.len()))
}
