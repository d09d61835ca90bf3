//! Access token sources.
//!
//! Credential resolution is not this crate's concern; the client only asks
//! a [`TokenProvider`] for a bearer token before each request.

use crate::error::GraphResult;
use async_trait::async_trait;

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a bearer token valid for Microsoft Graph.
    async fn token(&self) -> GraphResult<String>;
}

/// A fixed token, e.g. from the environment or a test.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StaticToken").field(&"[REDACTED]").finish()
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> GraphResult<String> {
        Ok(self.0.clone())
    }
}
