//! Message transport core for host/guest bridges.
//!
//! hostbridge moves tagged values between a guest and a native host: a
//! self-describing codec, request/reply bridges over direct calls, HTTP or
//! fire-and-forget posting, typed push notifications, and named pub/sub
//! relay channels over persistent sockets.
//!
//! # Crate Structure
//!
//! - [`codec`]: Tagged-value wire format and blocking value reader/writer
//! - [`transport`]: TCP and Unix socket endpoints, listeners and streams
//! - [`bridge`]: Bridge adapters, correlation registry and notification bus (behind `bridge` feature)
//! - [`channel`]: Pub/sub relay channels (behind `channel` feature)

/// Re-export codec types.
pub mod codec {
    pub use hostbridge_codec::*;
}

/// Re-export transport types.
pub mod transport {
    pub use hostbridge_transport::*;
}

/// Re-export bridge types (requires `bridge` feature).
#[cfg(feature = "bridge")]
pub mod bridge {
    pub use hostbridge_bridge::*;
}

/// Re-export channel types (requires `channel` feature).
#[cfg(feature = "channel")]
pub mod channel {
    pub use hostbridge_channel::*;
}
