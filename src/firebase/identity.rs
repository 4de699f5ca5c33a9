//! Firebase Authentication client implementing [`IdentityProvider`].
//!
//! ID tokens are verified locally against Google's published JWK set; user
//! management goes through the Identity Toolkit REST API.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::credentials::TokenSource;
use crate::config::FirebaseConfig;
use crate::errors::{AcademyError, AcademyResult};
use crate::identity::{IdentityProvider, VerifiedToken};

const JWKS_TTL: Duration = Duration::from_secs(3600);
/// A key set younger than this is not refetched for an unknown key id.
const JWKS_MIN_REFRESH: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
struct LookupUser {
    #[serde(rename = "localId")]
    local_id: String,
}

/// Identity Toolkit error codes come as the message, sometimes with a suffix
/// (`"USER_NOT_FOUND : ..."`).
fn error_code(body: &Value) -> Option<&str> {
    body.pointer("/error/message")
        .and_then(Value::as_str)
        .map(|m| m.split([' ', ':']).next().unwrap_or(m))
}

/// Firebase Authentication for one project.
pub struct FirebaseIdentity {
    http: Client,
    tokens: Arc<TokenSource>,
    accounts_url: String,
    jwks_url: String,
    validation: Validation,
    jwks: RwLock<Option<(JwkSet, Instant)>>,
}

impl FirebaseIdentity {
    pub fn new(http: Client, tokens: Arc<TokenSource>, config: &FirebaseConfig) -> Self {
        let project_id = tokens.project_id().to_string();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[format!("https://securetoken.google.com/{project_id}")]);
        validation.set_audience(&[&project_id]);
        validation.validate_exp = true;

        Self {
            accounts_url: format!(
                "{}/projects/{project_id}/accounts",
                config.identity_base_url.trim_end_matches('/')
            ),
            jwks_url: config.jwks_url.clone(),
            http,
            tokens,
            validation,
            jwks: RwLock::new(None),
        }
    }

    async fn fetch_jwks(&self) -> AcademyResult<JwkSet> {
        let resp = self.http.get(&self.jwks_url).send().await?;
        if !resp.status().is_success() {
            return Err(AcademyError::IdentityError(format!(
                "fetching signing keys failed with HTTP status {}",
                resp.status()
            )));
        }
        let set: JwkSet = resp.json().await.map_err(|e| {
            AcademyError::IdentityError(format!("failed to parse signing keys: {e}"))
        })?;
        debug!(keys = set.keys.len(), "Fetched identity signing keys");
        Ok(set)
    }

    /// Decoding key for `kid`, refreshing the cached key set when it is stale or
    /// does not know the key. A freshly fetched set is not refetched for unknown ids.
    async fn decoding_key(&self, kid: &str) -> AcademyResult<DecodingKey> {
        if let Some((set, fetched_at)) = self.jwks.read().await.as_ref() {
            let age = fetched_at.elapsed();
            if age < JWKS_TTL {
                match set.find(kid) {
                    Some(jwk) => {
                        return DecodingKey::from_jwk(jwk)
                            .map_err(|e| AcademyError::InvalidToken(e.to_string()));
                    }
                    None if age < JWKS_MIN_REFRESH => {
                        return Err(AcademyError::InvalidToken(format!(
                            "unknown signing key '{kid}'"
                        )));
                    }
                    None => {}
                }
            }
        }

        let set = self.fetch_jwks().await?;
        let key = set
            .find(kid)
            .map(DecodingKey::from_jwk)
            .transpose()
            .map_err(|e| AcademyError::InvalidToken(e.to_string()))?;
        *self.jwks.write().await = Some((set, Instant::now()));

        key.ok_or_else(|| AcademyError::InvalidToken(format!("unknown signing key '{kid}'")))
    }

    async fn call(&self, method: &str, body: Value) -> AcademyResult<Value> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .post(format!("{}:{method}", self.accounts_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let payload: Value = resp.json().await.unwrap_or(Value::Null);

        if status.is_success() {
            return Ok(payload);
        }

        match error_code(&payload) {
            Some("USER_NOT_FOUND") => Err(AcademyError::UserNotFound(
                body.get("localId")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            )),
            code => Err(AcademyError::IdentityError(format!(
                "accounts:{method} failed with HTTP status {status} ({})",
                code.unwrap_or("no error code")
            ))),
        }
    }
}

impl std::fmt::Debug for FirebaseIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseIdentity")
            .field("accounts_url", &self.accounts_url)
            .field("jwks_url", &self.jwks_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn verify_id_token(&self, token: &str) -> AcademyResult<VerifiedToken> {
        let header =
            decode_header(token).map_err(|e| AcademyError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AcademyError::InvalidToken("token has no key id".to_string()))?;

        let key = self.decoding_key(&kid).await?;
        let data = decode::<IdTokenClaims>(token, &key, &self.validation).map_err(|e| {
            warn!(error = %e, "Rejected identity token");
            AcademyError::InvalidToken(e.to_string())
        })?;

        if data.claims.sub.is_empty() {
            return Err(AcademyError::InvalidToken("token has no subject".to_string()));
        }

        Ok(VerifiedToken {
            uid: data.claims.sub,
            email: data.claims.email,
        })
    }

    async fn uid_for_email(&self, email: &str) -> AcademyResult<String> {
        let payload = self.call("lookup", json!({ "email": [email] })).await?;
        let lookup: LookupResponse = serde_json::from_value(payload).map_err(|e| {
            AcademyError::IdentityError(format!("failed to parse lookup response: {e}"))
        })?;
        lookup
            .users
            .into_iter()
            .next()
            .map(|u| u.local_id)
            .ok_or_else(|| AcademyError::UserNotFound(email.to_string()))
    }

    async fn set_disabled(&self, uid: &str, disabled: bool) -> AcademyResult<()> {
        self.call("update", json!({ "localId": uid, "disableUser": disabled }))
            .await?;
        Ok(())
    }

    async fn delete_user(&self, uid: &str) -> AcademyResult<()> {
        self.call("delete", json!({ "localId": uid })).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firebase::credentials::ServiceAccount;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};

    #[test]
    fn error_code_strips_suffix() {
        let body = json!({ "error": { "code": 400, "message": "USER_NOT_FOUND : no user" } });
        assert_eq!(error_code(&body), Some("USER_NOT_FOUND"));
    }

    #[test]
    fn error_code_plain() {
        let body = json!({ "error": { "message": "INVALID_ID_TOKEN" } });
        assert_eq!(error_code(&body), Some("INVALID_ID_TOKEN"));
        assert_eq!(error_code(&Value::Null), None);
    }

    #[test]
    fn lookup_without_users_is_empty() {
        let lookup: LookupResponse = serde_json::from_value(json!({ "kind": "x" })).unwrap();
        assert!(lookup.users.is_empty());
    }

    const PROJECT: &str = "ade-academy";
    const TEST_KEY: &str = include_str!("testdata/id_token_key.pem");
    const TEST_JWKS: &str = include_str!("testdata/id_token_jwks.json");

    async fn identity_with_cached_keys() -> FirebaseIdentity {
        let raw = json!({
            "project_id": PROJECT,
            "client_email": "backend@ade-academy.iam.gserviceaccount.com",
            "private_key": TEST_KEY,
        })
        .to_string();
        let account = ServiceAccount::from_json(&raw).unwrap();
        let tokens = Arc::new(TokenSource::new(account, Client::new()).unwrap());
        let identity = FirebaseIdentity::new(Client::new(), tokens, &FirebaseConfig::default());

        let set: JwkSet = serde_json::from_str(TEST_JWKS).unwrap();
        *identity.jwks.write().await = Some((set, Instant::now()));
        identity
    }

    fn sign(kid: &str, claims: Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        let key = EncodingKey::from_rsa_pem(TEST_KEY.as_bytes()).unwrap();
        encode(&header, &claims, &key).unwrap()
    }

    fn claims(iss: &str, aud: &str, sub: &str, exp_offset: i64) -> Value {
        let now = Utc::now().timestamp();
        json!({
            "iss": iss,
            "aud": aud,
            "sub": sub,
            "email": "admin@ade.example.com",
            "iat": now - 10,
            "exp": now + exp_offset,
        })
    }

    fn issuer() -> String {
        format!("https://securetoken.google.com/{PROJECT}")
    }

    #[tokio::test]
    async fn valid_token_yields_uid_and_email() {
        let identity = identity_with_cached_keys().await;
        let token = sign("test-key", claims(&issuer(), PROJECT, "staff-1", 3600));

        let verified = identity.verify_id_token(&token).await.unwrap();
        assert_eq!(verified.uid, "staff-1");
        assert_eq!(verified.email.as_deref(), Some("admin@ade.example.com"));
    }

    #[tokio::test]
    async fn wrong_issuer_is_rejected() {
        let identity = identity_with_cached_keys().await;
        let token = sign(
            "test-key",
            claims("https://securetoken.google.com/other-project", PROJECT, "staff-1", 3600),
        );

        assert!(matches!(
            identity.verify_id_token(&token).await,
            Err(AcademyError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn wrong_audience_is_rejected() {
        let identity = identity_with_cached_keys().await;
        let token = sign("test-key", claims(&issuer(), "other-project", "staff-1", 3600));

        assert!(matches!(
            identity.verify_id_token(&token).await,
            Err(AcademyError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let identity = identity_with_cached_keys().await;
        let token = sign("test-key", claims(&issuer(), PROJECT, "staff-1", -3600));

        assert!(matches!(
            identity.verify_id_token(&token).await,
            Err(AcademyError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn unknown_key_id_is_rejected_without_refetch() {
        let identity = identity_with_cached_keys().await;
        let token = sign("rotated-away", claims(&issuer(), PROJECT, "staff-1", 3600));

        assert!(matches!(
            identity.verify_id_token(&token).await,
            Err(AcademyError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn empty_subject_is_rejected() {
        let identity = identity_with_cached_keys().await;
        let token = sign("test-key", claims(&issuer(), PROJECT, "", 3600));

        assert!(matches!(
            identity.verify_id_token(&token).await,
            Err(AcademyError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let identity = identity_with_cached_keys().await;
        assert!(matches!(
            identity.verify_id_token("not-a-jwt").await,
            Err(AcademyError::InvalidToken(_))
        ));
    }
}
