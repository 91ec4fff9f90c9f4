use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::clients::token::TokenClient;
use crate::error::DependencyError;

/// A person as known by the national registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityRecord {
    pub id: String,
    pub kind: String,
}

/// Per-key answer from the registry. Either an identity or an error message,
/// never both; an unknown person comes back with `identity` unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityLookup {
    #[serde(default)]
    pub identity: Option<IdentityRecord>,
    #[serde(default)]
    pub error: Option<String>,
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolves a batch of natural keys in one round trip. The result maps
    /// each requested key to its lookup outcome.
    async fn resolve(
        &self,
        natural_keys: &[String],
        tracking_id: &str,
    ) -> Result<HashMap<String, IdentityLookup>, DependencyError>;
}

#[derive(Serialize)]
struct ResolveRequest<'a> {
    natural_keys: &'a [String],
    tracking_id: &'a str,
}

pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenClient>,
    caller_id: String,
}

impl IdentityClient {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        tokens: Arc<TokenClient>,
        caller_id: String,
    ) -> IdentityClient {
        IdentityClient {
            http,
            base_url,
            tokens,
            caller_id,
        }
    }
}

#[async_trait]
impl IdentityResolver for IdentityClient {
    async fn resolve(
        &self,
        natural_keys: &[String],
        tracking_id: &str,
    ) -> Result<HashMap<String, IdentityLookup>, DependencyError> {
        let token = self.tokens.bearer_token().await?;
        let response = self
            .http
            .post(format!("{}/v1/identities/resolve", self.base_url))
            .bearer_auth(token)
            .header("Caller-Id", &self.caller_id)
            .header("Tracking-Id", tracking_id)
            .json(&ResolveRequest {
                natural_keys,
                tracking_id,
            })
            .send()
            .await
            .map_err(|source| DependencyError::Request {
                call: "resolve_identities",
                source,
            })?;
        if !response.status().is_success() {
            return Err(DependencyError::Status {
                call: "resolve_identities",
                status: response.status(),
            });
        }
        response
            .json()
            .await
            .map_err(|source| DependencyError::Decode {
                call: "resolve_identities",
                source,
            })
    }
}
