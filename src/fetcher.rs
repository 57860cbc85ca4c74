use anyhow::{Context, Result};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::FetchError;
use crate::signal::Signal;

const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of one fetch. Exactly one is emitted per accepted `fetch` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Succeeded(String),
    Failed,
}

/// One-shot text downloads that never block the caller.
#[derive(Clone)]
pub struct AsyncFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
    outcomes: Signal<FetchOutcome>,
}

impl AsyncFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("normcap/", env!("CARGO_PKG_VERSION")))
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            outcomes: Signal::new(),
        })
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Subscribe before calling [`fetch`](Self::fetch) to observe its outcome.
    pub fn subscribe(&self) -> broadcast::Receiver<FetchOutcome> {
        self.outcomes.subscribe()
    }

    /// Start downloading `url`. Must be called from within a tokio runtime.
    ///
    /// Returns immediately. Only `http`/`https` urls are accepted; anything
    /// else fails here without scheduling any work. The returned handle
    /// resolves once the outcome has been emitted; awaiting it is optional.
    pub fn fetch(&self, url: &str) -> Result<JoinHandle<()>, FetchError> {
        debug!("Download {}", url);
        validate_url(url)?;

        let this = self.clone();
        let url = url.to_string();
        let worker = tokio::spawn(async move { this.download(&url).await });

        let outcomes = self.outcomes.clone();
        Ok(tokio::spawn(async move {
            let outcome = match worker.await {
                Ok(Ok(text)) => FetchOutcome::Succeeded(text),
                Ok(Err(e)) => {
                    error!("Download failed due to {:#}", e);
                    FetchOutcome::Failed
                }
                Err(e) => {
                    error!("Download worker aborted: {}", e);
                    FetchOutcome::Failed
                }
            };
            outcomes.emit(outcome);
        }))
    }

    async fn download(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to start download")?;

        if !response.status().is_success() {
            anyhow::bail!("Download failed with status: {}", response.status());
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Failed to read chunk")?;
            if body.len() + chunk.len() > self.max_body_bytes {
                anyhow::bail!("Response exceeds {} bytes", self.max_body_bytes);
            }
            body.extend_from_slice(&chunk);
        }

        Ok(decode_lossy(&body))
    }
}

/// Accept only urls starting with "http", ignoring case.
pub fn validate_url(url: &str) -> Result<(), FetchError> {
    let allowed = url
        .get(..4)
        .map(|scheme| scheme.eq_ignore_ascii_case("http"))
        .unwrap_or(false);

    if allowed {
        Ok(())
    } else {
        Err(FetchError::InvalidUrl(url.to_string()))
    }
}

/// Decode UTF-8, dropping invalid byte sequences instead of replacing them.
pub fn decode_lossy(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}
