use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::tcp::TcpSocket;
use crate::traits::IpcStream;

#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// A bound listener for any supported [`Endpoint`].
pub enum IpcListener {
    Tcp(TcpSocket),
    #[cfg(unix)]
    Unix(UnixDomainSocket),
}

impl IpcListener {
    /// Bind a listener for the endpoint.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp(addr) => Ok(IpcListener::Tcp(TcpSocket::bind(addr)?)),
            #[cfg(unix)]
            Endpoint::Unix(path) => Ok(IpcListener::Unix(UnixDomainSocket::bind(path)?)),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(crate::error::TransportError::Unsupported("unix")),
        }
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<IpcStream> {
        match self {
            IpcListener::Tcp(socket) => socket.accept(),
            #[cfg(unix)]
            IpcListener::Unix(socket) => socket.accept(),
        }
    }

    /// The endpoint clients should connect to. For TCP binds on port 0 this
    /// carries the port the OS picked.
    pub fn local_endpoint(&self) -> Endpoint {
        match self {
            IpcListener::Tcp(socket) => Endpoint::Tcp(socket.local_addr().to_string()),
            #[cfg(unix)]
            IpcListener::Unix(socket) => Endpoint::unix(socket.path()),
        }
    }
}

/// Connect to a listening endpoint (blocking).
pub fn connect(endpoint: &Endpoint) -> Result<IpcStream> {
    match endpoint {
        Endpoint::Tcp(addr) => TcpSocket::connect(addr),
        #[cfg(unix)]
        Endpoint::Unix(path) => UnixDomainSocket::connect(path),
        #[cfg(not(unix))]
        Endpoint::Unix(_) => Err(crate::error::TransportError::Unsupported("unix")),
    }
}

impl std::fmt::Debug for IpcListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcListener")
            .field("endpoint", &self.local_endpoint())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    fn echo_once(listener: IpcListener) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            let mut stream = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&buf).unwrap();
        })
    }

    #[test]
    fn tcp_endpoint_roundtrip() {
        let listener = IpcListener::bind(&"127.0.0.1:0".parse().unwrap()).unwrap();
        let endpoint = listener.local_endpoint();
        assert!(matches!(endpoint, Endpoint::Tcp(ref addr) if !addr.ends_with(":0")));

        let server = echo_once(listener);
        let mut client = connect(&endpoint).unwrap();
        client.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        server.join().unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn unix_endpoint_roundtrip() {
        let dir =
            std::env::temp_dir().join(format!("hostbridge-listener-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let endpoint = Endpoint::unix(dir.join("l.sock"));

        let listener = IpcListener::bind(&endpoint).unwrap();
        assert_eq!(listener.local_endpoint(), endpoint);

        let server = echo_once(listener);
        let mut client = connect(&endpoint).unwrap();
        client.write_all(b"pong").unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"pong");
        server.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }
}
