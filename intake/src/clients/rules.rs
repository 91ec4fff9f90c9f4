use async_trait::async_trait;

use crate::error::DependencyError;
use crate::record::{CaseRecord, ValidationResult};

#[async_trait]
pub trait RuleValidator: Send + Sync {
    async fn validate(&self, record: &CaseRecord) -> Result<ValidationResult, DependencyError>;
}

/// Client for the rule service that decides whether an attestation can be
/// processed automatically.
pub struct RuleValidatorClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl RuleValidatorClient {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        username: String,
        password: String,
    ) -> RuleValidatorClient {
        RuleValidatorClient {
            http,
            base_url,
            username,
            password,
        }
    }
}

#[async_trait]
impl RuleValidator for RuleValidatorClient {
    async fn validate(&self, record: &CaseRecord) -> Result<ValidationResult, DependencyError> {
        let response = self
            .http
            .post(format!("{}/v1/rules/validate", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .json(record)
            .send()
            .await
            .map_err(|source| DependencyError::Request {
                call: "rule_validation",
                source,
            })?;
        if !response.status().is_success() {
            return Err(DependencyError::Status {
                call: "rule_validation",
                status: response.status(),
            });
        }
        response
            .json()
            .await
            .map_err(|source| DependencyError::Decode {
                call: "rule_validation",
                source,
            })
    }
}
