//! The external identity provider: token verification and account enable/disable/delete.

use async_trait::async_trait;

use crate::errors::AcademyResult;

/// Claims taken from a verified ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    /// The user's uid (`sub` claim).
    pub uid: String,
    pub email: Option<String>,
}

/// Operations this service needs from the identity provider.
///
/// Implementations report a missing user as
/// [`AcademyError::UserNotFound`](crate::errors::AcademyError::UserNotFound) so
/// callers can treat it as benign where that makes sense.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a bearer ID token. Failures are
    /// [`AcademyError::InvalidToken`](crate::errors::AcademyError::InvalidToken).
    async fn verify_id_token(&self, token: &str) -> AcademyResult<VerifiedToken>;

    /// Resolve an email address to a uid.
    async fn uid_for_email(&self, email: &str) -> AcademyResult<String>;

    /// Set or clear the disabled flag on a user.
    async fn set_disabled(&self, uid: &str, disabled: bool) -> AcademyResult<()>;

    /// Permanently delete a user.
    async fn delete_user(&self, uid: &str) -> AcademyResult<()>;

    /// Disable the user registered under `email`.
    async fn disable_by_email(&self, email: &str) -> AcademyResult<String> {
        let uid = self.uid_for_email(email).await?;
        self.set_disabled(&uid, true).await?;
        Ok(uid)
    }
}
