use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use super::traits::EpgFetcher;
use crate::errors::FetchError;
use crate::models::DateRange;

pub const FORM_DATE_FROM: &str = "export-date-from";
pub const FORM_DATE_TO: &str = "export-date-to";

/// HTTP client for the Movistar+ guide export
pub struct MovistarClient {
    client: Client,
    url: String,
}

impl MovistarClient {
    /// Client with only a connection timeout; the export can take a while to stream
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Use a preconfigured client, e.g. one with custom proxy settings
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl EpgFetcher for MovistarClient {
    async fn fetch_epg(&self, range: &DateRange) -> Result<String, FetchError> {
        let form = [
            (FORM_DATE_FROM, range.start.format("%Y-%m-%d").to_string()),
            (FORM_DATE_TO, range.end.format("%Y-%m-%d").to_string()),
        ];
        info!(
            "Requesting EPG export {} to {} from {}",
            range.start, range.end, self.url
        );

        let response = self.client.post(&self.url).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyResponse {
                url: self.url.clone(),
            });
        }
        debug!("Received {} bytes from {}", body.len(), self.url);
        Ok(body)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
