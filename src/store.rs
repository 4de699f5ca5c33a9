//! The document store holding the `students` and `users` collections.

use async_trait::async_trait;

use crate::accounts::AccountStatus;
use crate::errors::AcademyResult;

/// Collection holding one document per student account.
pub const STUDENTS_COLLECTION: &str = "students";
/// Collection holding one `{role}` document per staff user, keyed by identity uid.
pub const USERS_COLLECTION: &str = "users";

/// A raw document: its id and its body decoded to plain JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: serde_json::Value,
}

/// Access to the academy's document store.
///
/// The only write this service performs is flipping a student's `status`.
#[async_trait]
pub trait AcademyStore: Send + Sync {
    /// Every student document whose `status` is `active`, in the store's order.
    async fn list_active_students(&self) -> AcademyResult<Vec<StoredDocument>>;

    /// A single student document, or `None` if it does not exist.
    async fn get_student(&self, student_id: &str) -> AcademyResult<Option<StoredDocument>>;

    /// Overwrite the `status` field of a student document.
    async fn set_student_status(&self, student_id: &str, status: AccountStatus)
        -> AcademyResult<()>;

    /// The `role` field of `users/{uid}`, or `None` if there is no such document.
    async fn get_user_role(&self, uid: &str) -> AcademyResult<Option<String>>;
}
