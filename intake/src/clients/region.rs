use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::clients::token::TokenClient;
use crate::error::DependencyError;

/// Lookups used to find the office responsible for a manual task: first the
/// patient's geography, then the office covering that geography. A miss at
/// either step is an ordinary answer, not an error.
#[async_trait]
pub trait RegionDirectory: Send + Sync {
    async fn geography_for(
        &self,
        natural_key: &str,
        tracking_id: &str,
    ) -> Result<Option<String>, DependencyError>;

    async fn office_for(&self, geography: &str) -> Result<Option<String>, DependencyError>;
}

#[derive(Deserialize)]
struct GeographyResponse {
    #[serde(default)]
    geography: Option<String>,
}

#[derive(Deserialize)]
struct OfficeResponse {
    #[serde(default)]
    office_id: Option<String>,
}

pub struct RegionDirectoryClient {
    http: reqwest::Client,
    geography_url: String,
    office_url: String,
    tokens: Arc<TokenClient>,
    caller_id: String,
}

impl RegionDirectoryClient {
    pub fn new(
        http: reqwest::Client,
        geography_url: String,
        office_url: String,
        tokens: Arc<TokenClient>,
        caller_id: String,
    ) -> RegionDirectoryClient {
        RegionDirectoryClient {
            http,
            geography_url,
            office_url,
            tokens,
            caller_id,
        }
    }
}

#[async_trait]
impl RegionDirectory for RegionDirectoryClient {
    async fn geography_for(
        &self,
        natural_key: &str,
        tracking_id: &str,
    ) -> Result<Option<String>, DependencyError> {
        let token = self.tokens.bearer_token().await?;
        let response = self
            .http
            .get(format!("{}/v1/persons/geography", self.geography_url))
            .query(&[("natural_key", natural_key)])
            .bearer_auth(token)
            .header("Caller-Id", &self.caller_id)
            .header("Tracking-Id", tracking_id)
            .send()
            .await
            .map_err(|source| DependencyError::Request {
                call: "geography_lookup",
                source,
            })?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(DependencyError::Status {
                call: "geography_lookup",
                status: response.status(),
            });
        }
        let body: GeographyResponse =
            response
                .json()
                .await
                .map_err(|source| DependencyError::Decode {
                    call: "geography_lookup",
                    source,
                })?;
        Ok(body.geography)
    }

    async fn office_for(&self, geography: &str) -> Result<Option<String>, DependencyError> {
        let response = self
            .http
            .get(format!(
                "{}/v1/offices/by-geography/{geography}",
                self.office_url
            ))
            .send()
            .await
            .map_err(|source| DependencyError::Request {
                call: "office_lookup",
                source,
            })?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(DependencyError::Status {
                call: "office_lookup",
                status: response.status(),
            });
        }
        let body: OfficeResponse =
            response
                .json()
                .await
                .map_err(|source| DependencyError::Decode {
                    call: "office_lookup",
                    source,
                })?;
        Ok(body.office_id)
    }
}
