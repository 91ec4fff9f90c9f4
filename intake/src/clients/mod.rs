use std::time::Duration;

use reqwest::header;

pub mod identity;
pub mod practice;
pub mod region;
pub mod rules;
pub mod token;

/// One shared client configuration for every upstream call.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );

    reqwest::Client::builder()
        .default_headers(headers)
        .user_agent("Attestation Intake")
        .timeout(timeout)
        .build()
}
