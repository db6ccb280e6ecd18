use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use hostbridge_codec::{RequestFrame, Value};

use crate::error::Result;

/// Boxed future returned by bridge operations.
pub type BridgeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A way of getting a request frame to the host and its reply back.
///
/// Every transport, whether synchronous or fully asynchronous, is driven
/// through the same asynchronous contract.
pub trait Bridge: Send + Sync {
    /// Deliver `request` and resolve with the decoded reply.
    fn call(&self, request: RequestFrame) -> BridgeFuture<'_, Vec<Value>>;

    /// Short transport name for logs.
    fn name(&self) -> &'static str;

    /// Send `opcode` with `args`.
    fn send(&self, opcode: u8, args: Vec<Value>) -> BridgeFuture<'_, Vec<Value>> {
        self.call(RequestFrame::new(opcode, args))
    }
}

impl<B: Bridge + ?Sized> Bridge for Arc<B> {
    fn call(&self, request: RequestFrame) -> BridgeFuture<'_, Vec<Value>> {
        (**self).call(request)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<B: Bridge + ?Sized> Bridge for Box<B> {
    fn call(&self, request: RequestFrame) -> BridgeFuture<'_, Vec<Value>> {
        (**self).call(request)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Send a request and run the caller's transform over the decoded reply.
///
/// See [`crate::transform`] for the common transforms.
pub async fn send_with<B, T, F>(bridge: &B, opcode: u8, args: Vec<Value>, transform: F) -> Result<T>
where
    B: Bridge + ?Sized,
    F: FnOnce(Vec<Value>) -> Result<T>,
{
    let values = bridge.send(opcode, args).await?;
    transform(values)
}
