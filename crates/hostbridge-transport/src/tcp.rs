use std::net::{SocketAddr, TcpListener, TcpStream};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::IpcStream;

/// TCP listener.
pub struct TcpSocket {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpSocket {
    /// Bind and listen on `host:port`. Port 0 picks a free port.
    pub fn bind(addr: &str) -> Result<Self> {
        let bind_err = |source| TransportError::Bind {
            endpoint: format!("tcp://{addr}"),
            source,
        };
        let listener = TcpListener::bind(addr).map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        info!(%local_addr, "listening on tcp");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<IpcStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        Ok(IpcStream::from_tcp(stream))
    }

    /// Connect to a listening TCP socket (blocking).
    pub fn connect(addr: &str) -> Result<IpcStream> {
        let stream = TcpStream::connect(addr).map_err(|source| TransportError::Connect {
            endpoint: format!("tcp://{addr}"),
            source,
        })?;
        debug!(%addr, "connected over tcp");
        Ok(IpcStream::from_tcp(stream))
    }

    /// The bound address, with the resolved port.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
