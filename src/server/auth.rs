//! Caller identity.
//!
//! Bearer API keys issued by `habit-sync-admin` stand in for the identity
//! provider. A request whose key checks out carries a [`Caller`] in its
//! extensions; any other request continues without one and every procedure
//! rejects it as unauthenticated.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;

use super::storage::{validate_segment, StoreError};
use crate::config::ApiKeyEntry;

/// Verified caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub uid: String,
}

impl Caller {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }
}

/// API key store - maps key -> Caller
#[derive(Debug, Clone, Default)]
pub struct ApiKeyStore {
    keys: HashMap<String, Caller>,
}

impl ApiKeyStore {
    pub fn from_entries(entries: &[ApiKeyEntry]) -> Self {
        let keys: HashMap<String, Caller> = entries
            .iter()
            .map(|entry| (entry.key.clone(), Caller::new(entry.user_id.clone())))
            .collect();

        if keys.is_empty() {
            tracing::warn!("No API keys loaded - all procedure calls will be unauthenticated");
        } else {
            tracing::info!("Loaded {} API key(s)", keys.len());
        }

        Self { keys }
    }

    /// Validate an API key and return the associated caller
    pub fn validate(&self, key: &str) -> Option<Caller> {
        self.keys.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves the caller from the bearer key, if any.
pub async fn resolve_caller(
    State(api_keys): State<Arc<ApiKeyStore>>,
    mut request: Request,
    next: Next,
) -> Response {
    let caller = match bearer_token(request.headers()) {
        Some(key) => {
            let caller = api_keys.validate(key);
            if caller.is_none() {
                tracing::debug!("Rejected unknown API key");
            }
            caller
        }
        None => None,
    };

    if let Some(caller) = caller {
        request.extensions_mut().insert(caller);
    }
    next.run(request).await
}

/// Generates a new API key.
///
/// Returns 32 random bytes encoded as base64url (no padding).
pub fn generate_api_key() -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Issues a fresh key for `user_id`.
///
/// The user id becomes a document path segment, so ids the store would
/// refuse are rejected here instead of on every later call.
pub fn issue_api_key(user_id: &str) -> Result<ApiKeyEntry, StoreError> {
    validate_segment(user_id)?;
    Ok(ApiKeyEntry {
        key: generate_api_key(),
        user_id: user_id.to_string(),
    })
}
