//! Blocking socket transport for hostbridge.
//!
//! Provides a unified interface over:
//! - TCP (all platforms)
//! - Unix domain sockets (Linux/macOS)
//!
//! This is the lowest layer of the stream channel stack. Everything else
//! reads and writes through the [`IpcStream`] type provided here.

pub mod endpoint;
pub mod error;
pub mod listener;
pub mod tcp;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use listener::{connect, IpcListener};
pub use tcp::TcpSocket;
pub use traits::IpcStream;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
