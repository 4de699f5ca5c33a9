use thiserror::Error;

/// Errors raised by the library layers (configuration, external services, mail).
///
/// Handlers convert these into [`ApiError`](crate::server::api_error::ApiError)
/// responses; background work only ever logs them.
#[derive(Debug, Error)]
pub enum AcademyError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("document store error: {0}")]
    StoreError(String),

    #[error("identity provider error: {0}")]
    IdentityError(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("invalid identity token: {0}")]
    InvalidToken(String),

    #[error("mail error: {0}")]
    MailError(String),
}

pub type AcademyResult<T> = Result<T, AcademyError>;
