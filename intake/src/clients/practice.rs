use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DependencyError;

/// A practice registration from the provider directory. Validity bounds are
/// optional; an open end means the registration has not been closed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderPractice {
    pub practice_id: String,
    pub name: String,
    pub active: bool,
    #[serde(default)]
    pub valid_from: Option<NaiveDate>,
    #[serde(default)]
    pub valid_to: Option<NaiveDate>,
}

#[async_trait]
pub trait PracticeDirectory: Send + Sync {
    /// All practice registrations for a practitioner, unfiltered.
    async fn practices_for(
        &self,
        natural_key: &str,
    ) -> Result<Vec<ProviderPractice>, DependencyError>;
}

pub struct PracticeDirectoryClient {
    http: reqwest::Client,
    base_url: String,
}

impl PracticeDirectoryClient {
    pub fn new(http: reqwest::Client, base_url: String) -> PracticeDirectoryClient {
        PracticeDirectoryClient { http, base_url }
    }
}

#[async_trait]
impl PracticeDirectory for PracticeDirectoryClient {
    async fn practices_for(
        &self,
        natural_key: &str,
    ) -> Result<Vec<ProviderPractice>, DependencyError> {
        let response = self
            .http
            .get(format!("{}/v1/practices", self.base_url))
            .query(&[("practitioner", natural_key)])
            .send()
            .await
            .map_err(|source| DependencyError::Request {
                call: "practice_lookup",
                source,
            })?;
        if !response.status().is_success() {
            return Err(DependencyError::Status {
                call: "practice_lookup",
                status: response.status(),
            });
        }
        response
            .json()
            .await
            .map_err(|source| DependencyError::Decode {
                call: "practice_lookup",
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn lists_practice_registrations() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET")
                .path("/v1/practices")
                .query_param("practitioner", "02027054321");
            then.status(200).json_body(json!([
                {
                    "practice_id": "pr-1",
                    "name": "Acme Clinic",
                    "active": true,
                    "valid_from": "2020-01-01"
                },
                {"practice_id": "pr-2", "name": "Old Practice", "active": false}
            ]));
        });

        let directory =
            PracticeDirectoryClient::new(reqwest::Client::new(), server.base_url());
        let practices = directory.practices_for("02027054321").await.unwrap();

        mock.assert_hits(1);
        assert_eq!(practices.len(), 2);
        assert_eq!(practices[0].name, "Acme Clinic");
        assert_eq!(
            practices[0].valid_from,
            Some(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
        );
        assert_eq!(practices[0].valid_to, None);
        assert!(!practices[1].active);
    }

    #[tokio::test]
    async fn unknown_practitioners_have_no_registrations() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/v1/practices");
            then.status(200).json_body(json!([]));
        });

        let directory =
            PracticeDirectoryClient::new(reqwest::Client::new(), server.base_url());
        let practices = directory.practices_for("02027054321").await.unwrap();
        assert!(practices.is_empty());
    }
}
