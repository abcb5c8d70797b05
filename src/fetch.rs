//! HTTP implementation of [`Fetcher`].
//!
//! The body is buffered in memory and written in one go; nothing is streamed
//! to disk, and a failed request never creates the destination file.

use std::path::Path;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, info, instrument, warn};

use crate::model::FetchReport;
use crate::traits::{FetchError, Fetcher};

/// Downloads with a single GET through `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    check_status: bool,
}

impl HttpFetcher {
    /// Creates a fetcher with a default client.
    ///
    /// Non-success statuses are rejected unless disabled with
    /// [`HttpFetcher::with_status_check`].
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            check_status: true,
        }
    }

    /// When `false`, any response body is written as-is regardless of status.
    pub fn with_status_check(mut self, check: bool) -> Self {
        self.check_status = check;
        self
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self, destination), fields(destination = %destination.display()))]
    async fn download(&self, source: &str, destination: &Path) -> Result<FetchReport, FetchError> {
        let url = Url::parse(source).map_err(|e| FetchError::InvalidUrl {
            url: source.to_string(),
            reason: e.to_string(),
        })?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), "Response received");

        if !status.is_success() {
            if self.check_status {
                return Err(FetchError::Status {
                    url: source.to_string(),
                    status: status.as_u16(),
                });
            }
            warn!(
                status = status.as_u16(),
                "Writing body of unsuccessful response"
            );
        }

        let body = response.bytes().await?;

        tokio::fs::write(destination, &body)
            .await
            .map_err(|source| FetchError::Io {
                path: destination.to_path_buf(),
                source,
            })?;

        info!(bytes = body.len(), "Download written");

        Ok(FetchReport {
            url: source.to_string(),
            destination: destination.to_path_buf(),
            status: status.as_u16(),
            bytes: body.len() as u64,
        })
    }

    fn stage_name(&self) -> &'static str {
        "fetch"
    }
}
