// In crates/quote-source/src/http.rs

use crate::{Error, QuoteSource, Result, parse_snapshot};
use async_trait::async_trait;
use core_types::QuoteSnapshot;
use std::time::Duration;

/// Fetches the snapshot JSON shape from an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpQuoteSource {
    http_client: reqwest::Client,
    url: String,
}

impl HttpQuoteSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::ClientBuildError(e.to_string()))?;
        Ok(Self {
            http_client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self) -> Result<QuoteSnapshot> {
        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .map_err(Error::RequestFailed)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus(status.as_u16()));
        }

        let text = response.text().await.map_err(Error::RequestFailed)?;
        parse_snapshot(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_endpoint_fails_the_request() {
        // Nothing listens on the discard port locally.
        let source = HttpQuoteSource::new("http://127.0.0.1:9/quotes", Duration::from_millis(500)).unwrap();
        assert!(matches!(source.fetch().await, Err(Error::RequestFailed(_))));
    }
}
