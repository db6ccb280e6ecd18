//! Request/reply correlation and push fan-out between a guest and its host.
//!
//! A guest talks to its host through a [`Bridge`]. Three transports ship
//! with the crate:
//! - [`DirectBridge`]: the host is a function in the same process
//! - [`HttpBridge`]: each request is an HTTP POST, each reply its body
//! - [`PostedBridge`]: requests are posted one way and replies arrive later
//!   through a separate callback, matched by a correlation id
//!
//! Unsolicited host messages go through the [`NotificationBus`].
//! [`TransportManager`] ties a bridge, its registry and a bus together.

pub mod adapter;
pub mod direct;
pub mod error;
pub mod http;
pub mod manager;
pub mod notify;
pub mod posted;
pub mod push;
pub mod registry;
pub mod transform;

pub use adapter::{send_with, Bridge, BridgeFuture};
pub use direct::{DirectBridge, Host, HostError};
pub use error::{BridgeError, Result};
pub use http::{HttpBridge, HttpBridgeConfig};
pub use manager::TransportManager;
pub use notify::{Listener, ListenerId, NotificationBus};
pub use posted::{
    resolve_correlated, resolve_correlated_base64, Base64Poster, PostError, PostedBridge, Poster,
    TextPoster,
};
pub use push::PushEnvelope;
pub use registry::{
    CorrelationRegistry, RegistryConfig, ReplyReceiver, Resolver, DEFAULT_MAX_PENDING,
};
