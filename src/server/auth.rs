//! Staff authentication for the user administration endpoints.
//!
//! The caller sends a Firebase ID token as `Authorization: Bearer <token>`. The
//! token is verified by the identity provider and its subject must own a
//! `users/{uid}` document whose `role` is a staff role.
//!
//! ```rust,ignore
//! async fn handler(staff: StaffUser) -> impl IntoResponse {
//!     format!("Hello, {}!", staff.uid)
//! }
//! ```

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::{debug, warn};

use crate::errors::AcademyError;
use crate::server::api_error::{ApiError, ErrorCode};
use crate::server::handlers::AppState;

/// Roles allowed to manage users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Cashier,
}

impl Role {
    /// Parse a stored role. `caja` is the legacy spelling of cashier.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "cashier" | "caja" => Some(Role::Cashier),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Cashier => "cashier",
        }
    }
}

/// An authenticated staff member.
#[derive(Debug, Clone)]
pub struct StaffUser {
    pub uid: String,
    pub email: Option<String>,
    pub role: Role,
}

impl StaffUser {
    /// Who performed an administrative change, for the audit line.
    pub fn actor(&self) -> String {
        match &self.email {
            Some(email) => format!("by {} {} <{}>", self.role.as_str(), self.uid, email),
            None => format!("by {} {}", self.role.as_str(), self.uid),
        }
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| ApiError::new(ErrorCode::MissingToken))?
        .to_str()
        .map_err(|_| ApiError::new(ErrorCode::InvalidHeader))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::new(ErrorCode::InvalidHeader))
}

#[async_trait]
impl FromRequestParts<AppState> for StaffUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let verified = state.identity.verify_id_token(token).await.map_err(|e| {
            match &e {
                AcademyError::InvalidToken(_) => debug!(error = %e, "Rejected bearer token"),
                _ => warn!(error = %e, "Could not verify bearer token"),
            }
            ApiError::new(ErrorCode::InvalidToken)
        })?;

        let role = state.store.get_user_role(&verified.uid).await?;
        let Some(role) = role.as_deref().and_then(Role::parse) else {
            warn!(uid = %verified.uid, role = ?role, "Caller lacks a staff role");
            return Err(ApiError::forbidden(
                "Admin or cashier role required for this operation",
            ));
        };

        Ok(StaffUser {
            uid: verified.uid,
            email: verified.email,
            role,
        })
    }
}
