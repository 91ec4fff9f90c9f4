use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::DependencyError;

// Renew ahead of expiry so in-flight requests never carry a token that dies
// while the upstream still holds them.
const RENEWAL_MARGIN_SECS: i64 = 600;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Client-credentials token fetcher with an in-memory cache. The identity and
/// geography services authenticate with tokens from here.
pub struct TokenClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenClient {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        username: String,
        password: String,
    ) -> TokenClient {
        TokenClient {
            http,
            base_url,
            username,
            password,
            cached: Mutex::new(None),
        }
    }

    pub async fn bearer_token(&self) -> Result<String, DependencyError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(RENEWAL_MARGIN_SECS) > Utc::now() {
                return Ok(token.access_token.clone());
            }
        }

        let response = self
            .http
            .get(format!("{}/token", self.base_url))
            .query(&[("grant_type", "client_credentials")])
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|source| DependencyError::Request {
                call: "fetch_token",
                source,
            })?;
        if !response.status().is_success() {
            return Err(DependencyError::Status {
                call: "fetch_token",
                status: response.status(),
            });
        }
        let token: TokenResponse =
            response
                .json()
                .await
                .map_err(|source| DependencyError::Decode {
                    call: "fetch_token",
                    source,
                })?;

        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        });
        Ok(access_token)
    }
}
