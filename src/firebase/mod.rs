//! Firebase-backed implementations of the store and identity provider.
//!
//! - `credentials` → service-account key and OAuth2 access tokens
//! - `firestore`   → [`AcademyStore`](crate::store::AcademyStore) over Firestore REST
//! - `identity`    → [`IdentityProvider`](crate::identity::IdentityProvider) over Identity Toolkit
//! - `values`      → Firestore typed values to plain JSON

pub mod credentials;
pub mod firestore;
pub mod identity;
pub mod values;

use std::sync::Arc;

use reqwest::Client;

pub use credentials::{ServiceAccount, TokenSource};
pub use firestore::FirestoreStore;
pub use identity::FirebaseIdentity;

use crate::config::FirebaseConfig;
use crate::errors::AcademyResult;

/// Build both clients from the configured service-account key. They share one
/// HTTP client and one token cache.
pub fn connect(config: &FirebaseConfig) -> AcademyResult<(FirestoreStore, FirebaseIdentity)> {
    let account = ServiceAccount::from_file(&config.credentials_path)?;
    let http = Client::new();
    let tokens = Arc::new(TokenSource::new(account, http.clone())?);

    Ok((
        FirestoreStore::new(http.clone(), tokens.clone(), config),
        FirebaseIdentity::new(http, tokens, config),
    ))
}
