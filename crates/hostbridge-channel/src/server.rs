use std::io::{ErrorKind, Read};
use std::net::Shutdown;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hostbridge_codec::{CodecConfig, DEFAULT_MAX_PAYLOAD};
use hostbridge_transport::{connect, Endpoint, IpcListener, IpcStream};
use tracing::{debug, info, warn};

use crate::channel::{Channel, ChannelRegistry, MemberId, Relayed};
use crate::connection::{ChannelMode, Connection, Step, DEFAULT_MAX_HANDSHAKE_PAYLOAD};
use crate::error::{ChannelError, Result};

const READ_CHUNK_SIZE: usize = 8 * 1024;
const ACCEPT_BACKOFF_START: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Limits and timeouts for relay connections.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum size of the channel-name handshake value. Default: 16 KiB.
    pub max_handshake_payload: usize,
    /// Maximum size of one relayed data frame. Default: 16 MiB.
    pub max_payload_size: usize,
    /// How long a new connection may take to send its handshake.
    pub handshake_timeout: Option<Duration>,
    /// Write timeout when relaying to a member. A member that cannot keep up
    /// is dropped.
    pub write_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_handshake_payload: DEFAULT_MAX_HANDSHAKE_PAYLOAD,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            handshake_timeout: Some(Duration::from_secs(5)),
            write_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl ServerConfig {
    pub fn with_max_payload_size(mut self, max: usize) -> Self {
        self.max_payload_size = max;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    fn writer_config(&self) -> CodecConfig {
        CodecConfig {
            max_payload_size: self.max_payload_size,
            read_timeout: None,
            write_timeout: self.write_timeout,
        }
    }
}

/// Stops a running [`ChannelServer::serve`] loop from another thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    endpoint: Endpoint,
}

impl ShutdownHandle {
    /// Request shutdown and wake the accept loop.
    pub fn shutdown(&self) {
        if self.flag.swap(true, Ordering::SeqCst) {
            return;
        }
        // Unblock a pending accept; failure means the listener is already gone.
        if let Err(err) = connect(&self.endpoint) {
            debug!(%err, "shutdown wake-up connect failed");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Accepts connections and relays frames between members of named channels.
///
/// Each connection is served on its own thread. Channels must be created
/// before clients can join them.
pub struct ChannelServer {
    listener: IpcListener,
    channels: Arc<ChannelRegistry>,
    config: ServerConfig,
    next_member_id: AtomicU64,
    shutdown: Arc<AtomicBool>,
}

impl ChannelServer {
    /// Bind to an endpoint with the default configuration.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        Self::bind_with_config(endpoint, ServerConfig::default())
    }

    pub fn bind_with_config(endpoint: &Endpoint, config: ServerConfig) -> Result<Self> {
        let listener = IpcListener::bind(endpoint)?;
        info!(endpoint = %listener.local_endpoint(), "relay listening");
        Ok(Self {
            listener,
            channels: Arc::new(ChannelRegistry::with_writer_config(config.writer_config())),
            config,
            next_member_id: AtomicU64::new(1),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Create a framed channel.
    pub fn create_channel(&self, name: impl Into<String>) -> Result<Arc<Channel>> {
        self.channels.create(name, ChannelMode::Framed)
    }

    /// Create a channel that relays bytes without value framing.
    pub fn create_raw_channel(&self, name: impl Into<String>) -> Result<Arc<Channel>> {
        self.channels.create(name, ChannelMode::Raw)
    }

    /// Tear a channel down, disconnecting its members.
    pub fn remove_channel(&self, name: &str) -> bool {
        self.channels.remove(name).is_some()
    }

    pub fn channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.get(name)
    }

    pub fn channels(&self) -> &Arc<ChannelRegistry> {
        &self.channels
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The endpoint clients should connect to.
    pub fn local_endpoint(&self) -> Endpoint {
        self.listener.local_endpoint()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
            endpoint: self.listener.local_endpoint(),
        }
    }

    /// Accept the next connection and serve it on a new thread.
    pub fn accept(&self) -> Result<JoinHandle<()>> {
        let stream = self.listener.accept()?;
        let id = self.next_member_id.fetch_add(1, Ordering::Relaxed);
        debug!(member = id, peer = %stream.peer_label(), "connection accepted");

        let channels = Arc::clone(&self.channels);
        let config = self.config.clone();
        let handle = thread::Builder::new()
            .name(format!("relay-conn-{id}"))
            .spawn(move || {
                if let Err(err) = serve_connection(id, stream, &channels, &config) {
                    debug!(member = id, %err, "connection ended with error");
                }
            })
            .map_err(hostbridge_transport::TransportError::Io)?;
        Ok(handle)
    }

    /// Accept connections until [`ShutdownHandle::shutdown`] is called.
    ///
    /// Accept errors are logged and do not stop the loop. Consecutive failures
    /// (e.g. out of file descriptors) back off up to one second.
    pub fn serve(&self) -> Result<()> {
        let mut failures = 0u32;
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.accept() {
                Ok(_) => failures = 0,
                Err(err) => {
                    failures = failures.saturating_add(1);
                    let delay = accept_backoff(failures);
                    warn!(%err, failures, delay_ms = delay.as_millis() as u64, "accept failed");
                    thread::sleep(delay);
                }
            }
        }
        info!("relay stopped");
        Ok(())
    }
}

impl std::fmt::Debug for ChannelServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelServer")
            .field("listener", &self.listener)
            .field("channels", &self.channels.names())
            .finish()
    }
}

/// Delay after the `failures`-th consecutive accept error.
fn accept_backoff(failures: u32) -> Duration {
    let shift = failures.saturating_sub(1).min(16);
    ACCEPT_BACKOFF_START
        .saturating_mul(1 << shift)
        .min(ACCEPT_BACKOFF_MAX)
}

/// Drive one connection from handshake to close.
fn serve_connection(
    id: MemberId,
    mut stream: IpcStream,
    channels: &ChannelRegistry,
    config: &ServerConfig,
) -> Result<()> {
    let peer = stream.peer_label();
    stream.set_read_timeout(config.handshake_timeout)?;

    let mut conn = Connection::with_limits(config.max_handshake_payload, config.max_payload_size);
    let mut joined: Option<Arc<Channel>> = None;
    let result = relay(id, &mut stream, &mut conn, &mut joined, channels, &peer);

    if let Some(channel) = &joined {
        channel.leave(id);
    }
    conn.close();
    if let Err(err) = stream.shutdown(Shutdown::Both) {
        debug!(member = id, %err, "shutdown after close failed");
    }
    result
}

fn relay(
    id: MemberId,
    stream: &mut IpcStream,
    conn: &mut Connection,
    joined: &mut Option<Arc<Channel>>,
    channels: &ChannelRegistry,
    peer: &str,
) -> Result<()> {
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let read = match stream.read(&mut chunk) {
            Ok(0) => {
                debug!(member = id, peer, "connection closed");
                return Ok(());
            }
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(hostbridge_transport::TransportError::Io(err).into()),
        };
        conn.extend(&chunk[..read]);

        loop {
            let mut requested = None;
            let step = conn.advance(|name| {
                let channel = channels.get(name)?;
                let mode = channel.mode();
                requested = Some(channel);
                Some(mode)
            });

            let step = match step {
                Ok(Some(step)) => step,
                Ok(None) => break,
                Err(err) => {
                    warn!(member = id, peer, %err, "closing connection after protocol error");
                    return Err(err);
                }
            };

            match step {
                Step::Joined { channel: name } => {
                    let Some(channel) = requested else {
                        continue;
                    };
                    match channel.join(id, stream.try_clone()?) {
                        Ok(()) => {}
                        Err(ChannelError::UnknownChannel(_)) => {
                            warn!(member = id, peer, channel = %name, "channel removed during join");
                            return Ok(());
                        }
                        Err(err) => return Err(err),
                    }
                    stream.set_read_timeout(None)?;
                    info!(member = id, peer, channel = %name, "connection joined channel");
                    *joined = Some(channel);
                }
                Step::Rejected(name) => {
                    warn!(member = id, peer, channel = %name, "connection asked for unknown channel");
                    return Ok(());
                }
                Step::Frame { wire, value } => {
                    if let Some(channel) = joined.as_ref() {
                        channel.broadcast(&wire);
                        channel.notify(id, Relayed::Frame(&value));
                    }
                }
                Step::Raw(bytes) => {
                    if let Some(channel) = joined.as_ref() {
                        channel.broadcast(&bytes);
                        channel.notify(id, Relayed::Raw(&bytes));
                    }
                }
            }
        }
    }
}
