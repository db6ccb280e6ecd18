use hostbridge_codec::{decode, RequestFrame, Value};
use tracing::trace;

use crate::adapter::{Bridge, BridgeFuture};
use crate::error::BridgeError;

/// Error returned by an in-process host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HostError(pub String);

impl From<String> for HostError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HostError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// A host reachable by a plain function call.
///
/// Receives the encoded request frame and returns the encoded reply message.
pub trait Host: Send + Sync {
    fn call(&self, request: &[u8]) -> Result<Vec<u8>, HostError>;
}

impl<F> Host for F
where
    F: Fn(&[u8]) -> Result<Vec<u8>, HostError> + Send + Sync,
{
    fn call(&self, request: &[u8]) -> Result<Vec<u8>, HostError> {
        self(request)
    }
}

/// Bridge that calls the host in-process and decodes its return value at once.
#[derive(Debug)]
pub struct DirectBridge<H> {
    host: H,
}

impl<H: Host> DirectBridge<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }
}

impl<H: Host> Bridge for DirectBridge<H> {
    fn call(&self, request: RequestFrame) -> BridgeFuture<'_, Vec<Value>> {
        Box::pin(async move {
            let frame = request.encode()?;
            trace!(opcode = request.opcode, len = frame.len(), "direct call");
            let reply = self
                .host
                .call(&frame)
                .map_err(|err| BridgeError::Host(err.0))?;
            Ok(decode(&reply)?)
        })
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}
