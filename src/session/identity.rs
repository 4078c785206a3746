//! Caller identity
//!
//! Requests are verified before any stream is opened. The default provider
//! maps bearer tokens to user ids from a static table.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{ChatError, ChatResult};

/// Verified caller identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Credentials presented with a request
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub bearer_token: Option<String>,
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
        }
    }

    /// Parse an `Authorization` header value (`Bearer <token>`)
    pub fn from_authorization(header: Option<&str>) -> Self {
        let bearer_token = header
            .and_then(|value| {
                let (scheme, token) = value.trim().split_once(' ')?;
                scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
            })
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        Self { bearer_token }
    }
}

/// Verifies who is calling
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve credentials to a user, or fail with `ChatError::Unauthenticated`
    async fn verify(&self, credentials: &Credentials) -> ChatResult<UserId>;
}

/// Bearer-token table loaded from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticTokenIdentity {
    tokens: HashMap<String, UserId>,
}

impl StaticTokenIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `token=user` pairs separated by commas
    pub fn from_pairs(pairs: &str) -> ChatResult<Self> {
        let mut identity = Self::new();
        for pair in pairs.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (token, user) = pair.split_once('=').ok_or_else(|| {
                ChatError::InvalidConfig(format!("Expected token=user, got '{}'", pair))
            })?;
            let (token, user) = (token.trim(), user.trim());
            if token.is_empty() || user.is_empty() {
                return Err(ChatError::InvalidConfig(format!(
                    "Empty token or user in '{}'",
                    pair
                )));
            }
            identity = identity.with_token(token, user);
        }
        Ok(identity)
    }

    pub fn with_token(mut self, token: impl Into<String>, user: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), UserId::new(user));
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenIdentity {
    async fn verify(&self, credentials: &Credentials) -> ChatResult<UserId> {
        let token = credentials
            .bearer_token
            .as_deref()
            .ok_or_else(|| ChatError::Unauthenticated("Missing bearer token".into()))?;

        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| ChatError::Unauthenticated("Unknown token".into()))
    }
}
