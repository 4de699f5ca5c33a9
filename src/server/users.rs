//! User administration: enable/disable and delete identity records.
//!
//! Both endpoints require a [`StaffUser`].

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::accounts::Account;
use crate::errors::AcademyError;
use crate::notifications::{AccountStatusChanged, Notification, Recipient, StatusChange};
use crate::server::api_error::ApiError;
use crate::server::auth::StaffUser;
use crate::server::handlers::{Acknowledgement, AppState};
use crate::server::logging::{log_account_event, AccountEvent};

/// Body of `PATCH /users/{uid}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub is_disabled: bool,
}

/// `PATCH /users/{uid}/status`
///
/// Sets the identity provider's disabled flag. When a student record shares the
/// uid, the student is told about the change.
pub async fn update_user_status_handler(
    State(state): State<AppState>,
    staff: StaffUser,
    Path(uid): Path<String>,
    payload: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<Json<Acknowledgement>, ApiError> {
    let Json(request) = payload?;

    state.identity.set_disabled(&uid, request.is_disabled).await?;

    let (event, status_text) = if request.is_disabled {
        (AccountEvent::Disabled, "desactivado")
    } else {
        (AccountEvent::Enabled, "activado")
    };
    log_account_event(event, &uid, Some(&staff.actor()));

    notify_status_change(&state, &uid, StatusChange::from_disabled(request.is_disabled)).await;

    Ok(Json(Acknowledgement::new(format!(
        "Usuario {status_text} correctamente."
    ))))
}

async fn notify_status_change(state: &AppState, uid: &str, status: StatusChange) {
    let doc = match state.store.get_student(uid).await {
        Ok(Some(doc)) => doc,
        Ok(None) => return,
        Err(e) => {
            warn!(uid = %uid, error = %e, "Cannot load student for status notification");
            return;
        }
    };

    let account = match Account::from_document(&doc.id, doc.data) {
        Ok(account) => account,
        Err(e) => {
            warn!(uid = %uid, error = %e, "Skipping status notification for malformed student");
            return;
        }
    };

    let changed = AccountStatusChanged {
        recipient: Recipient::for_account(&account),
        status,
    };
    match Notification::try_from(changed) {
        Ok(notification) => state.schedule_notification(notification),
        Err(e) => warn!(uid = %uid, error = %e, "Skipping status notification"),
    }
}

/// `DELETE /users/{uid}`
///
/// Deleting a user that does not exist is reported as success.
pub async fn delete_user_handler(
    State(state): State<AppState>,
    staff: StaffUser,
    Path(uid): Path<String>,
) -> Result<Json<Acknowledgement>, ApiError> {
    match state.identity.delete_user(&uid).await {
        Ok(()) => {
            log_account_event(AccountEvent::Deleted, &uid, Some(&staff.actor()));
            Ok(Json(Acknowledgement::new(
                "Usuario eliminado de Authentication correctamente.",
            )))
        }
        Err(AcademyError::UserNotFound(_)) => {
            warn!(uid = %uid, "User to delete was not found in Authentication");
            Ok(Json(Acknowledgement::new(
                "Usuario no encontrado en Authentication, pero la operación continúa.",
            )))
        }
        Err(e) => Err(e.into()),
    }
}
