use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use hostbridge_codec::{encode_correlated, split_correlated, RequestFrame, Value};
use tracing::{trace, warn};

use crate::adapter::{Bridge, BridgeFuture};
use crate::error::{BridgeError, Result};
use crate::registry::CorrelationRegistry;

/// Error returned when a frame could not be handed to the host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct PostError(pub String);

impl From<String> for PostError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for PostError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// One-way binary message channel to the host.
///
/// Replies come back separately through [`PostedBridge::on_reply`].
pub trait Poster: Send + Sync {
    fn post(&self, frame: Bytes) -> std::result::Result<(), PostError>;
}

impl<F> Poster for F
where
    F: Fn(Bytes) -> std::result::Result<(), PostError> + Send + Sync,
{
    fn post(&self, frame: Bytes) -> std::result::Result<(), PostError> {
        self(frame)
    }
}

/// One-way text message channel, as exposed by webview message handlers.
pub trait TextPoster: Send + Sync {
    fn post_text(&self, text: &str) -> std::result::Result<(), PostError>;
}

impl<F> TextPoster for F
where
    F: Fn(&str) -> std::result::Result<(), PostError> + Send + Sync,
{
    fn post_text(&self, text: &str) -> std::result::Result<(), PostError> {
        self(text)
    }
}

/// Adapts a text channel by base64-encoding every frame.
#[derive(Debug)]
pub struct Base64Poster<T>(pub T);

impl<T: TextPoster> Poster for Base64Poster<T> {
    fn post(&self, frame: Bytes) -> std::result::Result<(), PostError> {
        self.0.post_text(&STANDARD.encode(&frame))
    }
}

/// Bridge over a fire-and-forget channel with out-of-band replies.
///
/// Each request is prefixed with a correlation id from the shared
/// [`CorrelationRegistry`]. The host echoes the id in front of its reply,
/// which the embedder feeds to [`on_reply`](Self::on_reply).
pub struct PostedBridge<P> {
    poster: P,
    registry: Arc<CorrelationRegistry>,
}

impl<P: Poster> PostedBridge<P> {
    pub fn new(poster: P) -> Self {
        Self::with_registry(poster, Arc::new(CorrelationRegistry::new()))
    }

    pub fn with_registry(poster: P, registry: Arc<CorrelationRegistry>) -> Self {
        Self { poster, registry }
    }

    pub fn registry(&self) -> &Arc<CorrelationRegistry> {
        &self.registry
    }

    /// Handle a correlated reply `[id][values...]` from the host.
    ///
    /// Returns whether a pending request was resolved.
    pub fn on_reply(&self, reply: &[u8]) -> bool {
        resolve_correlated(&self.registry, reply)
    }

    /// Handle a base64-encoded correlated reply.
    pub fn on_reply_base64(&self, text: &str) -> Result<bool> {
        resolve_correlated_base64(&self.registry, text)
    }
}

/// Strip the correlation id off `reply` and resolve the matching request.
pub fn resolve_correlated(registry: &CorrelationRegistry, reply: &[u8]) -> bool {
    match split_correlated(reply) {
        Ok((id, message)) => registry.resolve(id, message),
        Err(err) => {
            warn!(%err, "dropping malformed reply");
            false
        }
    }
}

/// Base64 variant of [`resolve_correlated`] for text-only channels.
pub fn resolve_correlated_base64(registry: &CorrelationRegistry, text: &str) -> Result<bool> {
    let reply = STANDARD.decode(text.trim())?;
    Ok(resolve_correlated(registry, &reply))
}

impl<P: Poster> Bridge for PostedBridge<P> {
    fn call(&self, request: RequestFrame) -> BridgeFuture<'_, Vec<Value>> {
        Box::pin(async move {
            let (id, reply) = self.registry.register_waiter()?;

            let frame = match encode_correlated(id, &request) {
                Ok(frame) => frame,
                Err(err) => {
                    self.registry.release(id);
                    return Err(err.into());
                }
            };

            trace!(id, opcode = request.opcode, len = frame.len(), "posting request");
            if let Err(err) = self.poster.post(frame) {
                self.registry.release(id);
                return Err(BridgeError::Transport(err.0));
            }

            reply.await.map_err(|_| BridgeError::Abandoned(id))?
        })
    }

    fn name(&self) -> &'static str {
        "posted"
    }
}

impl<P> std::fmt::Debug for PostedBridge<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostedBridge")
            .field("registry", &self.registry)
            .finish()
    }
}
