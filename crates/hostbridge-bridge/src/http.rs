use std::time::Duration;

use hostbridge_codec::{decode, RequestFrame, Value};
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::adapter::{Bridge, BridgeFuture};
use crate::error::{BridgeError, Result};

const OCTET_STREAM: &str = "application/octet-stream";

/// Settings for [`HttpBridge`].
#[derive(Debug, Clone)]
pub struct HttpBridgeConfig {
    /// Base URL of the host, e.g. `http://127.0.0.1:9000`.
    pub base_url: String,
    /// Path requests are posted to.
    pub call_path: String,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl HttpBridgeConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            call_path: "/call".to_string(),
            timeout: None,
        }
    }

    pub fn with_call_path(mut self, path: impl Into<String>) -> Self {
        self.call_path = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Full URL requests are posted to.
    pub fn call_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.call_path.starts_with('/') {
            format!("{base}{}", self.call_path)
        } else {
            format!("{base}/{}", self.call_path)
        }
    }
}

/// Bridge that posts each request frame as an HTTP body.
///
/// The transport already pairs every response with its request, so no
/// correlation id is added.
#[derive(Debug, Clone)]
pub struct HttpBridge {
    client: reqwest::Client,
    url: String,
}

impl HttpBridge {
    pub fn new(config: HttpBridgeConfig) -> Result<Self> {
        let mut builder =
            reqwest::Client::builder().user_agent(concat!("hostbridge/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            url: config.call_url(),
        })
    }

    /// Build on an existing client (shared connection pool).
    pub fn with_client(client: reqwest::Client, config: &HttpBridgeConfig) -> Self {
        Self {
            client,
            url: config.call_url(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Bridge for HttpBridge {
    fn call(&self, request: RequestFrame) -> BridgeFuture<'_, Vec<Value>> {
        Box::pin(async move {
            let body = request.encode()?;
            let response = self
                .client
                .post(&self.url)
                .header(CONTENT_TYPE, OCTET_STREAM)
                .body(body)
                .send()
                .await
                .map_err(|err| BridgeError::Transport(err.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                debug!(status = %status, opcode = request.opcode, "host rejected request");
                return Err(BridgeError::Transport(format!(
                    "host responded with {status}"
                )));
            }

            let reply = response
                .bytes()
                .await
                .map_err(|err| BridgeError::Transport(err.to_string()))?;
            Ok(decode(&reply)?)
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
