//! Service-account credentials and OAuth2 access tokens.
//!
//! Access tokens are minted with the JWT-bearer grant: an RS256 assertion signed
//! with the service account's private key is exchanged at the token endpoint.
//! Tokens are cached until shortly before they expire.

use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::{AcademyError, AcademyResult};

/// OAuth scope covering Firestore and Identity Toolkit.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// The fields of a service-account key file this service uses.
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccount {
    pub fn from_file(path: impl AsRef<Path>) -> AcademyResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AcademyError::ConfigError(format!(
                "cannot read service account key '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> AcademyResult<Self> {
        let account: ServiceAccount = serde_json::from_str(raw)
            .map_err(|e| AcademyError::ConfigError(format!("invalid service account key: {e}")))?;
        if account.project_id.is_empty() || account.client_email.is_empty() {
            return Err(AcademyError::ConfigError(
                "service account key lacks project_id or client_email".to_string(),
            ));
        }
        Ok(account)
    }
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Hands out bearer tokens for the Google REST APIs.
pub struct TokenSource {
    account: ServiceAccount,
    key: EncodingKey,
    http: Client,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(account: ServiceAccount, http: Client) -> AcademyResult<Self> {
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes()).map_err(|e| {
            AcademyError::ConfigError(format!("invalid service account private key: {e}"))
        })?;
        Ok(Self {
            account,
            key,
            http,
            cached: RwLock::new(None),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.account.project_id
    }

    /// A valid access token, minting a new one when the cached one is about to expire.
    pub async fn access_token(&self) -> AcademyResult<String> {
        if let Some(token) = self.cached.read().await.as_ref() {
            if token.expires_at > Instant::now() + REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    fn assertion(&self) -> AcademyResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AcademyError::IdentityError(format!("system time error: {e}")))?
            .as_secs();

        let claims = AssertionClaims {
            iss: &self.account.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &self.account.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| AcademyError::IdentityError(format!("failed to sign assertion: {e}")))
    }

    async fn fetch(&self) -> AcademyResult<CachedToken> {
        let assertion = self.assertion()?;

        let resp = self
            .http
            .post(&self.account.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AcademyError::IdentityError(format!(
                "token exchange failed with HTTP status {}",
                resp.status()
            )));
        }

        let body: TokenResponse = resp.json().await.map_err(|e| {
            AcademyError::IdentityError(format!("failed to parse token response: {e}"))
        })?;

        debug!(expires_in = body.expires_in, "Minted access token");

        Ok(CachedToken {
            value: body.access_token,
            expires_at: Instant::now() + Duration::from_secs(body.expires_in),
        })
    }
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSource")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}
