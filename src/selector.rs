//! Overdue-account selection.
//!
//! Both monthly sweeps start here. Selection never fails: a store error yields an
//! empty list and a malformed record is skipped, each with a log line, so a bad
//! document cannot stop the sweep for everyone else.

use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::{debug, error, info, warn};

use crate::accounts::{today_in, Account};
use crate::store::AcademyStore;

/// Overdue accounts as of today in `tz`.
pub async fn select_overdue(store: &dyn AcademyStore, tz: Tz) -> Vec<Account> {
    select_overdue_on(store, today_in(tz)).await
}

/// Overdue accounts as of `today`, in the store's iteration order.
pub async fn select_overdue_on(store: &dyn AcademyStore, today: NaiveDate) -> Vec<Account> {
    let documents = match store.list_active_students().await {
        Ok(docs) => docs,
        Err(e) => {
            error!(error = %e, "Error fetching active students");
            return Vec::new();
        }
    };

    let scanned = documents.len();
    let mut overdue = Vec::new();

    for doc in documents {
        let account = match Account::from_document(&doc.id, doc.data) {
            Ok(account) => account,
            Err(e) => {
                warn!(student_id = %doc.id, error = %e, "Skipping malformed student record");
                continue;
            }
        };

        if account.is_overdue(today) {
            debug!(student_id = %account.id, debt = account.debt, "Student is overdue");
            overdue.push(account);
        }
    }

    info!(
        scanned,
        overdue = overdue.len(),
        today = %today,
        "Overdue selection finished"
    );

    overdue
}
