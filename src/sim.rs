//! In-memory stand-ins for the external collaborators.
//!
//! Used by the test suites and handy for running the server locally without a
//! Firebase project or an SMTP relay.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::accounts::AccountStatus;
use crate::errors::{AcademyError, AcademyResult};
use crate::identity::{IdentityProvider, VerifiedToken};
use crate::mailer::{MailTransport, OutgoingMail};
use crate::store::{AcademyStore, StoredDocument};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Document store kept in memory. Insertion order is preserved.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    students: Mutex<Vec<StoredDocument>>,
    roles: Mutex<HashMap<String, String>>,
    fail_queries: Mutex<bool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_student(&self, id: &str, data: serde_json::Value) {
        let mut students = lock(&self.students);
        students.retain(|d| d.id != id);
        students.push(StoredDocument {
            id: id.to_string(),
            data,
        });
    }

    pub fn set_role(&self, uid: &str, role: &str) {
        lock(&self.roles).insert(uid.to_string(), role.to_string());
    }

    /// Make every subsequent `list_active_students` call fail.
    pub fn fail_queries(&self, fail: bool) {
        *lock(&self.fail_queries) = fail;
    }

    /// The stored `status` string of a student.
    pub fn student_status(&self, id: &str) -> Option<String> {
        lock(&self.students)
            .iter()
            .find(|d| d.id == id)
            .and_then(|d| d.data.get("status"))
            .and_then(|s| s.as_str())
            .map(str::to_string)
    }
}

#[async_trait]
impl AcademyStore for InMemoryStore {
    async fn list_active_students(&self) -> AcademyResult<Vec<StoredDocument>> {
        if *lock(&self.fail_queries) {
            return Err(AcademyError::StoreError("simulated query failure".into()));
        }
        Ok(lock(&self.students)
            .iter()
            .filter(|d| d.data.get("status").and_then(|s| s.as_str()) == Some("active"))
            .cloned()
            .collect())
    }

    async fn get_student(&self, student_id: &str) -> AcademyResult<Option<StoredDocument>> {
        Ok(lock(&self.students)
            .iter()
            .find(|d| d.id == student_id)
            .cloned())
    }

    async fn set_student_status(
        &self,
        student_id: &str,
        status: AccountStatus,
    ) -> AcademyResult<()> {
        let mut students = lock(&self.students);
        let doc = students
            .iter_mut()
            .find(|d| d.id == student_id)
            .ok_or_else(|| AcademyError::StoreError(format!("no student '{student_id}'")))?;
        doc.data["status"] = serde_json::Value::String(status.as_str().to_string());
        Ok(())
    }

    async fn get_user_role(&self, uid: &str) -> AcademyResult<Option<String>> {
        Ok(lock(&self.roles).get(uid).cloned())
    }
}

/// A user known to [`FakeIdentity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeUser {
    pub uid: String,
    pub email: String,
    pub disabled: bool,
}

/// Identity provider kept in memory. Tokens are registered explicitly.
#[derive(Debug, Default)]
pub struct FakeIdentity {
    users: Mutex<Vec<FakeUser>>,
    tokens: Mutex<HashMap<String, String>>,
}

impl FakeIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, uid: &str, email: &str) {
        lock(&self.users).push(FakeUser {
            uid: uid.to_string(),
            email: email.to_string(),
            disabled: false,
        });
    }

    /// Accept `token` as a valid ID token for `uid`.
    pub fn issue_token(&self, token: &str, uid: &str) {
        lock(&self.tokens).insert(token.to_string(), uid.to_string());
    }

    pub fn user(&self, uid: &str) -> Option<FakeUser> {
        lock(&self.users).iter().find(|u| u.uid == uid).cloned()
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn verify_id_token(&self, token: &str) -> AcademyResult<VerifiedToken> {
        let uid = lock(&self.tokens)
            .get(token)
            .cloned()
            .ok_or_else(|| AcademyError::InvalidToken("unknown token".into()))?;
        let email = self.user(&uid).map(|u| u.email);
        Ok(VerifiedToken { uid, email })
    }

    async fn uid_for_email(&self, email: &str) -> AcademyResult<String> {
        lock(&self.users)
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .map(|u| u.uid.clone())
            .ok_or_else(|| AcademyError::UserNotFound(email.to_string()))
    }

    async fn set_disabled(&self, uid: &str, disabled: bool) -> AcademyResult<()> {
        let mut users = lock(&self.users);
        let user = users
            .iter_mut()
            .find(|u| u.uid == uid)
            .ok_or_else(|| AcademyError::UserNotFound(uid.to_string()))?;
        user.disabled = disabled;
        Ok(())
    }

    async fn delete_user(&self, uid: &str) -> AcademyResult<()> {
        let mut users = lock(&self.users);
        let before = users.len();
        users.retain(|u| u.uid != uid);
        if users.len() == before {
            return Err(AcademyError::UserNotFound(uid.to_string()));
        }
        Ok(())
    }
}

/// Mail transport that records what it was asked to send.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutgoingMail>>,
    attempts: Mutex<usize>,
    fail: bool,
}

impl RecordingTransport {
    /// A transport whose every send fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Successfully delivered messages.
    pub fn sent(&self) -> Vec<OutgoingMail> {
        lock(&self.sent).clone()
    }

    /// Number of send calls, successful or not.
    pub fn attempts(&self) -> usize {
        *lock(&self.attempts)
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, mail: OutgoingMail) -> AcademyResult<()> {
        *lock(&self.attempts) += 1;
        if self.fail {
            return Err(AcademyError::MailError("simulated SMTP failure".into()));
        }
        lock(&self.sent).push(mail);
        Ok(())
    }
}

/// Shared handles to a full set of simulated collaborators.
#[derive(Debug, Clone, Default)]
pub struct SimBackend {
    pub store: Arc<InMemoryStore>,
    pub identity: Arc<FakeIdentity>,
    pub transport: Arc<RecordingTransport>,
}

impl SimBackend {
    pub fn new() -> Self {
        Self::default()
    }
}
