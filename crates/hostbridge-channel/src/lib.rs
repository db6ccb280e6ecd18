//! Named publish/subscribe relay channels over persistent sockets.
//!
//! A client connects and sends one text value naming a channel. From then
//! on every tagged value it sends is relayed to all members of that
//! channel, the sender included. Raw channels relay bytes without value
//! framing.
//!
//! [`Connection`] holds the per-socket reassembly state and can be driven
//! without any I/O. [`ChannelServer`] runs it over real sockets, one thread
//! per connection.

pub mod channel;
pub mod client;
pub mod connection;
pub mod error;
pub mod server;

pub use channel::{Channel, ChannelListener, ChannelRegistry, ListenerId, MemberId, Relayed};
pub use client::{ChannelClient, ChannelReceiver, ChannelSender};
pub use connection::{
    ChannelMode, Connection, ConnectionState, Step, DEFAULT_MAX_HANDSHAKE_PAYLOAD,
};
pub use error::{ChannelError, Result};
pub use server::{ChannelServer, ServerConfig, ShutdownHandle};
