// src/fetcher.rs

use crate::config::RetrieverConfig;
use crate::error::NilaOidcError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

/// Retrieves the raw text of a document, such as a discovery document or a key set.
///
/// The resolver only ever sees this capability, so any transport (HTTP, files,
/// an in-memory fixture) can stand behind it.
#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    /// Returns the text found at `address`.
    ///
    /// Implementations should stop and return [`NilaOidcError::Cancelled`] once
    /// `cancel` fires.
    async fn get_document(&self, address: &str, cancel: &CancellationToken) -> Result<String, NilaOidcError>;
}

/// Fetches documents over HTTP(S) with `reqwest`.
#[derive(Clone)]
pub struct HttpDocumentRetriever {
    http_client: reqwest::Client,
    config: RetrieverConfig,
}

impl HttpDocumentRetriever {
    /// Creates a retriever with default settings (HTTPS required).
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new(), RetrieverConfig::default())
    }

    /// Creates a retriever around an existing client, e.g. one shared by the application.
    pub fn with_client(http_client: reqwest::Client, config: RetrieverConfig) -> Self {
        Self { http_client, config }
    }

    /// Builds a dedicated client from `config`.
    pub fn from_config(config: RetrieverConfig) -> Result<Self, NilaOidcError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { http_client, config })
    }

    /// The settings this retriever enforces.
    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    fn parse_address(&self, address: &str) -> Result<Url, NilaOidcError> {
        if address.trim().is_empty() {
            return Err(NilaOidcError::InvalidArgument("address".to_string()));
        }
        let url = Url::parse(address).map_err(|e| NilaOidcError::InvalidUrl(format!("{address}: {e}")))?;
        if self.config.require_https && url.scheme() != "https" {
            return Err(NilaOidcError::InvalidConfiguration(format!(
                "HTTPS is required but the address is '{address}'"
            )));
        }
        Ok(url)
    }

    async fn fetch(&self, url: Url) -> Result<String, NilaOidcError> {
        let mut response = self
            .http_client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, self.config.user_agent.as_str())
            .timeout(self.config.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NilaOidcError::Transport(format!("{url} returned HTTP {status}")));
        }

        let limit = self.config.max_response_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(NilaOidcError::Transport(format!("{url} response exceeds {limit} bytes")));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(NilaOidcError::Transport(format!("{url} response exceeds {limit} bytes")));
            }
            body.extend_from_slice(&chunk);
        }

        String::from_utf8(body).map_err(|_| NilaOidcError::Transport(format!("{url} response is not valid UTF-8")))
    }
}

impl Default for HttpDocumentRetriever {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentRetriever for HttpDocumentRetriever {
    #[instrument(skip(self, cancel), err)]
    async fn get_document(&self, address: &str, cancel: &CancellationToken) -> Result<String, NilaOidcError> {
        let url = self.parse_address(address)?;
        debug!("Fetching document from: {}", url);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(NilaOidcError::Cancelled),
            result = self.fetch(url) => result,
        }
    }
}

/// Fetches `http(s)://` addresses over the network and reads anything else from the local file system.
///
/// HTTPS is not enforced, which makes this the retriever for development
/// setups and for providers whose metadata ships as a file.
#[derive(Clone)]
pub struct GenericDocumentRetriever {
    http: HttpDocumentRetriever,
}

impl GenericDocumentRetriever {
    pub fn new() -> Self {
        let config = RetrieverConfig {
            require_https: false,
            ..RetrieverConfig::default()
        };
        Self {
            http: HttpDocumentRetriever::with_client(reqwest::Client::new(), config),
        }
    }
}

impl Default for GenericDocumentRetriever {
    fn default() -> Self {
        Self::new()
    }
}

fn is_http_address(address: &str) -> bool {
    Url::parse(address)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[async_trait]
impl DocumentRetriever for GenericDocumentRetriever {
    #[instrument(skip(self, cancel), err)]
    async fn get_document(&self, address: &str, cancel: &CancellationToken) -> Result<String, NilaOidcError> {
        if address.trim().is_empty() {
            return Err(NilaOidcError::InvalidArgument("address".to_string()));
        }
        if is_http_address(address) {
            return self.http.get_document(address, cancel).await;
        }

        debug!("Reading document from file: {}", address);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(NilaOidcError::Cancelled),
            result = tokio::fs::read_to_string(address) => {
                result.map_err(|e| NilaOidcError::Transport(format!("unable to read '{address}': {e}")))
            }
        }
    }
}
