//! Firestore REST client implementing [`AcademyStore`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::credentials::TokenSource;
use super::values::{decode_fields, string_value};
use crate::accounts::AccountStatus;
use crate::config::FirebaseConfig;
use crate::errors::{AcademyError, AcademyResult};
use crate::store::{AcademyStore, StoredDocument, STUDENTS_COLLECTION, USERS_COLLECTION};

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl Document {
    fn into_stored(self) -> StoredDocument {
        let id = self.name.rsplit('/').next().unwrap_or_default().to_string();
        StoredDocument {
            id,
            data: decode_fields(&self.fields),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    document: Option<Document>,
}

/// Store backed by the project's default Firestore database.
#[derive(Debug, Clone)]
pub struct FirestoreStore {
    http: Client,
    tokens: Arc<TokenSource>,
    documents_url: String,
}

impl FirestoreStore {
    pub fn new(http: Client, tokens: Arc<TokenSource>, config: &FirebaseConfig) -> Self {
        let documents_url = format!(
            "{}/projects/{}/databases/(default)/documents",
            config.firestore_base_url.trim_end_matches('/'),
            tokens.project_id()
        );
        Self {
            http,
            tokens,
            documents_url,
        }
    }

    async fn get_document(&self, collection: &str, id: &str) -> AcademyResult<Option<Document>> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .get(format!("{}/{collection}/{id}", self.documents_url))
            .bearer_auth(token)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(AcademyError::StoreError(format!(
                "reading {collection}/{id} failed with HTTP status {}",
                resp.status()
            )));
        }

        let doc: Document = resp.json().await.map_err(|e| {
            AcademyError::StoreError(format!("failed to parse {collection}/{id}: {e}"))
        })?;
        Ok(Some(doc))
    }
}

#[async_trait]
impl AcademyStore for FirestoreStore {
    async fn list_active_students(&self) -> AcademyResult<Vec<StoredDocument>> {
        let query = json!({
            "structuredQuery": {
                "from": [{ "collectionId": STUDENTS_COLLECTION }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": "status" },
                        "op": "EQUAL",
                        "value": string_value(AccountStatus::Active.as_str())
                    }
                }
            }
        });

        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .post(format!("{}:runQuery", self.documents_url))
            .bearer_auth(token)
            .json(&query)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AcademyError::StoreError(format!(
                "student query failed with HTTP status {}",
                resp.status()
            )));
        }

        let results: Vec<QueryResult> = resp
            .json()
            .await
            .map_err(|e| AcademyError::StoreError(format!("failed to parse query results: {e}")))?;

        let docs: Vec<StoredDocument> = results
            .into_iter()
            .filter_map(|r| r.document)
            .map(Document::into_stored)
            .collect();

        debug!(count = docs.len(), "Fetched active students");
        Ok(docs)
    }

    async fn get_student(&self, student_id: &str) -> AcademyResult<Option<StoredDocument>> {
        Ok(self
            .get_document(STUDENTS_COLLECTION, student_id)
            .await?
            .map(Document::into_stored))
    }

    async fn set_student_status(
        &self,
        student_id: &str,
        status: AccountStatus,
    ) -> AcademyResult<()> {
        let body = json!({ "fields": { "status": string_value(status.as_str()) } });

        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .patch(format!(
                "{}/{STUDENTS_COLLECTION}/{student_id}",
                self.documents_url
            ))
            .query(&[
                ("updateMask.fieldPaths", "status"),
                ("currentDocument.exists", "true"),
            ])
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AcademyError::StoreError(format!(
                "updating status of {student_id} failed with HTTP status {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn get_user_role(&self, uid: &str) -> AcademyResult<Option<String>> {
        let Some(doc) = self.get_document(USERS_COLLECTION, uid).await? else {
            return Ok(None);
        };
        let data = doc.into_stored().data;
        Ok(data.get("role").and_then(Value::as_str).map(str::to_string))
    }
}
