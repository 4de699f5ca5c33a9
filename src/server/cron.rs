//! The two monthly sweeps and their HTTP triggers.
//!
//! Both sweeps run the overdue selector and fan out one deferred unit per
//! account. They are called by the HTTP endpoints below and, in-process, by the
//! job scheduler.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::accounts::{Account, AccountStatus};
use crate::errors::AcademyError;
use crate::identity::IdentityProvider;
use crate::mailer::Mailer;
use crate::notifications::{AccountDeactivated, Notification, PaymentReminder};
use crate::selector::select_overdue;
use crate::server::handlers::AppState;
use crate::server::logging::{log_account_event, AccountEvent};
use crate::store::AcademyStore;

/// Body returned by both sweep endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResponse {
    pub message: String,
    /// Deferred units scheduled by this run
    pub scheduled: usize,
}

/// Result of one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Overdue accounts found by the selector
    pub selected: usize,
    /// Deferred units actually scheduled
    pub scheduled: usize,
}

impl SweepOutcome {
    pub fn skipped(&self) -> usize {
        self.selected - self.scheduled
    }
}

/// Schedule a payment reminder for every overdue account whose reminder can be
/// built.
pub async fn schedule_payment_reminders(state: &AppState) -> SweepOutcome {
    info!("Starting payment reminder sweep");
    let overdue = select_overdue(state.store.as_ref(), state.timezone).await;

    let mut scheduled = 0;
    for account in &overdue {
        // Overdue accounts always carry a due date.
        let Some(reminder) = PaymentReminder::for_account(account) else {
            continue;
        };
        match Notification::try_from(reminder) {
            Ok(notification) => {
                state.schedule_notification(notification);
                log_account_event(AccountEvent::Reminded, &account.id, None);
                scheduled += 1;
            }
            Err(e) => {
                warn!(student_id = %account.id, error = %e, "Cannot build payment reminder");
            }
        }
    }

    let outcome = SweepOutcome {
        selected: overdue.len(),
        scheduled,
    };
    info!(
        selected = outcome.selected,
        scheduled = outcome.scheduled,
        "Payment reminder sweep finished"
    );
    outcome
}

/// Schedule deactivation of every overdue account.
pub async fn schedule_overdue_deactivations(state: &AppState) -> SweepOutcome {
    info!("Starting overdue deactivation sweep");
    let overdue = select_overdue(state.store.as_ref(), state.timezone).await;
    let outcome = SweepOutcome {
        selected: overdue.len(),
        scheduled: overdue.len(),
    };

    for account in overdue {
        let store = state.store.clone();
        let identity = state.identity.clone();
        let mailer = state.mailer.clone();
        state.tasks.spawn("deactivate_overdue_account", async move {
            deactivate_overdue_account(store.as_ref(), identity.as_ref(), &mailer, &account).await;
        });
    }

    info!(scheduled = outcome.scheduled, "Overdue deactivation sweep finished");
    outcome
}

/// Disable, mark inactive, then notify. Returns whether the account ended up
/// inactive.
///
/// A missing identity record does not stop the unit. Any other identity or
/// store failure ends it before the next step; the notice is best-effort and
/// never undoes the first two steps.
pub async fn deactivate_overdue_account(
    store: &dyn AcademyStore,
    identity: &dyn IdentityProvider,
    mailer: &Mailer,
    account: &Account,
) -> bool {
    match identity.disable_by_email(&account.email).await {
        Ok(uid) => debug!(student_id = %account.id, uid = %uid, "Identity disabled"),
        Err(AcademyError::UserNotFound(_)) => {
            log_account_event(
                AccountEvent::IdentityMissing,
                &account.id,
                Some(&account.email),
            );
        }
        Err(e) => {
            error!(student_id = %account.id, error = %e, "Failed to disable identity");
            return false;
        }
    }

    if let Err(e) = store
        .set_student_status(&account.id, AccountStatus::Inactive)
        .await
    {
        error!(student_id = %account.id, error = %e, "Failed to mark student inactive");
        return false;
    }
    log_account_event(
        AccountEvent::Deactivated,
        &account.id,
        Some(&format!("debt {:.2}", account.debt)),
    );

    match Notification::try_from(AccountDeactivated::for_account(account)) {
        Ok(notification) => mailer.notify(&notification).await,
        Err(e) => {
            warn!(student_id = %account.id, error = %e, "Skipping deactivation notice");
        }
    }

    true
}

/// `POST /cron/send-payment-reminders`
pub async fn send_payment_reminders_handler(State(state): State<AppState>) -> Json<SweepResponse> {
    let outcome = schedule_payment_reminders(&state).await;
    let message = match (outcome.selected, outcome.skipped()) {
        (0, _) => "No hay estudiantes con pagos vencidos.".to_string(),
        (_, 0) => format!(
            "Se programó el envío de {} recordatorios de pago.",
            outcome.scheduled
        ),
        (_, skipped) => format!(
            "Se programó el envío de {} recordatorios de pago; {skipped} estudiantes con pagos \
             vencidos se omitieron por datos de contacto inválidos.",
            outcome.scheduled
        ),
    };
    Json(SweepResponse {
        message,
        scheduled: outcome.scheduled,
    })
}

/// `POST /cron/deactivate-overdue-users`
pub async fn deactivate_overdue_users_handler(
    State(state): State<AppState>,
) -> Json<SweepResponse> {
    let outcome = schedule_overdue_deactivations(&state).await;
    let message = if outcome.selected == 0 {
        "No hay usuarios morosos para desactivar.".to_string()
    } else {
        format!(
            "Se programó la desactivación y notificación para {} usuarios morosos.",
            outcome.scheduled
        )
    };
    Json(SweepResponse {
        message,
        scheduled: outcome.scheduled,
    })
}
