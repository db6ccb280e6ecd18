//! Named channels and the registry that owns them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::Shutdown;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use hostbridge_codec::{encode, CodecConfig, Value, ValueWriter};
use hostbridge_transport::IpcStream;
use tracing::{debug, info, trace, warn};

use crate::connection::ChannelMode;
use crate::error::{ChannelError, Result};

/// Identifier of a connection joined to a channel.
pub type MemberId = u64;

/// A message relayed through a channel, as seen by server-side listeners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Relayed<'a> {
    /// A data frame on a framed channel.
    Frame(&'a Value),
    /// A chunk of bytes on a raw channel.
    Raw(&'a [u8]),
}

/// Server-side callback invoked for every relayed message.
pub type ChannelListener = Arc<dyn Fn(MemberId, Relayed<'_>) + Send + Sync>;

/// A joined connection. `control` is a clone of the writer's stream used to
/// shut it down without waiting on a write in progress.
struct Member {
    writer: Mutex<ValueWriter<IpcStream>>,
    control: IpcStream,
}

impl Member {
    fn shutdown(&self, channel: &str, id: MemberId) {
        if let Err(err) = self.control.shutdown(Shutdown::Both) {
            debug!(channel, member = id, %err, "member shutdown failed");
        }
    }
}

/// Handle returned by [`Channel::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// A named many-to-many relay group.
///
/// Every message received from a member is written to all current members,
/// including the one that sent it. Members whose socket fails a write,
/// including an expired write timeout, are dropped. Writes happen outside the
/// member map lock, so a stalled member never blocks `join` or `leave`.
pub struct Channel {
    name: String,
    mode: ChannelMode,
    members: Mutex<BTreeMap<MemberId, Arc<Member>>>,
    closed: AtomicBool,
    listeners: RwLock<BTreeMap<ListenerId, ChannelListener>>,
    next_listener: AtomicU64,
    writer_config: CodecConfig,
}

impl Channel {
    fn new(name: String, mode: ChannelMode, writer_config: CodecConfig) -> Self {
        Self {
            name,
            mode,
            members: Mutex::new(BTreeMap::new()),
            closed: AtomicBool::new(false),
            listeners: RwLock::new(BTreeMap::new()),
            next_listener: AtomicU64::new(1),
            writer_config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    /// Add a connection. `stream` is the write half used for relaying.
    ///
    /// Fails with [`ChannelError::UnknownChannel`] once the channel is closed.
    pub fn join(&self, id: MemberId, stream: IpcStream) -> Result<()> {
        let control = stream.try_clone()?;
        let member = Arc::new(Member {
            writer: Mutex::new(ValueWriter::with_config_ipc(stream, self.writer_config.clone())?),
            control,
        });

        let previous = {
            let mut members = self
                .members
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if self.closed.load(Ordering::SeqCst) {
                drop(members);
                member.shutdown(&self.name, id);
                return Err(ChannelError::UnknownChannel(self.name.clone()));
            }
            members.insert(id, member)
        };
        if let Some(previous) = previous {
            previous.shutdown(&self.name, id);
        }
        debug!(channel = %self.name, member = id, "member joined");
        Ok(())
    }

    /// Remove a connection. Returns whether it was a member.
    pub fn leave(&self, id: MemberId) -> bool {
        let removed = self
            .members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        match removed {
            Some(member) => {
                member.shutdown(&self.name, id);
                debug!(channel = %self.name, member = id, "member left");
                true
            }
            None => false,
        }
    }

    /// Write `wire` to every current member.
    ///
    /// Returns the number of members that received it.
    pub fn broadcast(&self, wire: &[u8]) -> usize {
        let snapshot: Vec<(MemberId, Arc<Member>)> = self
            .members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, member)| (*id, Arc::clone(member)))
            .collect();

        let mut delivered = 0;
        for (id, member) in snapshot {
            let result = member
                .writer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .write_raw(wire);
            match result {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(channel = %self.name, member = id, %err, "dropping member after failed write");
                    self.drop_member(id, &member);
                }
            }
        }

        trace!(channel = %self.name, len = wire.len(), delivered, "broadcast");
        delivered
    }

    /// Remove `member` unless `id` has been rejoined by another connection since.
    fn drop_member(&self, id: MemberId, member: &Arc<Member>) {
        let mut members = self
            .members
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if members.get(&id).is_some_and(|current| Arc::ptr_eq(current, member)) {
            members.remove(&id);
        }
        drop(members);
        member.shutdown(&self.name, id);
    }

    /// Broadcast a server-originated value.
    pub fn send(&self, value: &Value) -> Result<usize> {
        let wire = encode(std::slice::from_ref(value))?;
        Ok(self.broadcast(&wire))
    }

    /// Register a listener for every message relayed through this channel.
    pub fn on<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(MemberId, Relayed<'_>) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(listener));
        id
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    /// Invoke every listener with a relayed message.
    ///
    /// Listeners run outside of the listener lock and may call `on`/`off`.
    pub fn notify(&self, from: MemberId, message: Relayed<'_>) {
        let listeners: Vec<ChannelListener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for listener in listeners {
            listener(from, message);
        }
    }

    pub fn member_count(&self) -> usize {
        self.members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn member_ids(&self) -> Vec<MemberId> {
        self.members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// Disconnect every member. Later joins are refused.
    pub fn close(&self) {
        let members = {
            let mut members = self
                .members
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            self.closed.store(true, Ordering::SeqCst);
            std::mem::take(&mut *members)
        };
        for (id, member) in members {
            member.shutdown(&self.name, id);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("members", &self.member_count())
            .finish()
    }
}

/// Name to channel map shared by a server and its connection threads.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: RwLock<HashMap<String, Arc<Channel>>>,
    writer_config: CodecConfig,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` for the writers of every member that joins.
    pub fn with_writer_config(config: CodecConfig) -> Self {
        Self {
            channels: RwLock::default(),
            writer_config: config,
        }
    }

    /// Create a channel. Connections can join it from now on.
    pub fn create(&self, name: impl Into<String>, mode: ChannelMode) -> Result<Arc<Channel>> {
        let name = name.into();
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if channels.contains_key(&name) {
            return Err(ChannelError::ChannelExists(name));
        }

        let channel = Arc::new(Channel::new(
            name.clone(),
            mode,
            self.writer_config.clone(),
        ));
        channels.insert(name.clone(), Arc::clone(&channel));
        info!(channel = %name, mode = mode.name(), "channel created");
        Ok(channel)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Tear a channel down and disconnect its members.
    pub fn remove(&self, name: &str) -> Option<Arc<Channel>> {
        let channel = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)?;
        channel.close();
        info!(channel = %name, "channel removed");
        Some(channel)
    }

    /// Registered channel names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Read;
    use std::os::unix::net::UnixStream;
    use std::sync::{mpsc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    use hostbridge_codec::ValueReader;

    use super::*;

    fn pair() -> (IpcStream, ValueReader<IpcStream>) {
        let (a, b) = UnixStream::pair().expect("socket pair should open");
        (IpcStream::from_unix(a), ValueReader::new(IpcStream::from_unix(b)))
    }

    #[test]
    fn broadcast_reaches_every_member() {
        let registry = ChannelRegistry::new();
        let channel = registry.create("c", ChannelMode::Framed).unwrap();

        let (a, mut a_rx) = pair();
        let (b, mut b_rx) = pair();
        channel.join(1, a).unwrap();
        channel.join(2, b).unwrap();

        assert_eq!(channel.send(&Value::from("hi")).unwrap(), 2);
        assert_eq!(a_rx.read_value().unwrap(), Value::from("hi"));
        assert_eq!(b_rx.read_value().unwrap(), Value::from("hi"));
    }

    #[test]
    fn failed_member_is_dropped() {
        let channel = ChannelRegistry::new()
            .create("c", ChannelMode::Framed)
            .unwrap();

        let (a, a_rx) = pair();
        let (b, mut b_rx) = pair();
        channel.join(1, a).unwrap();
        channel.join(2, b).unwrap();
        drop(a_rx);

        // The first write to a closed peer may still succeed.
        let mut delivered = channel.send(&Value::from(1)).unwrap();
        if delivered == 2 {
            delivered = channel.send(&Value::from(2)).unwrap();
        }
        assert_eq!(delivered, 1);
        assert_eq!(channel.member_ids(), vec![2]);
        assert_eq!(b_rx.read_value().unwrap(), Value::from(1));
    }

    #[test]
    fn stalled_member_is_dropped_after_write_timeout() {
        let registry = ChannelRegistry::with_writer_config(CodecConfig {
            write_timeout: Some(Duration::from_millis(100)),
            ..CodecConfig::default()
        });
        let channel = registry.create("c", ChannelMode::Raw).unwrap();
        // Kept open and never read.
        let (stalled, _stalled_rx) = pair();
        channel.join(1, stalled).unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let broadcaster = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                let delivered = channel.broadcast(&vec![0u8; 8 * 1024 * 1024]);
                done_tx.send(delivered).unwrap();
            })
        };

        let delivered = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("broadcast should give up on a stalled member");
        broadcaster.join().unwrap();
        assert_eq!(delivered, 0);
        assert!(channel.member_ids().is_empty());
    }

    #[test]
    fn membership_changes_while_a_write_is_stalled() {
        let registry = ChannelRegistry::with_writer_config(CodecConfig {
            write_timeout: Some(Duration::from_secs(2)),
            ..CodecConfig::default()
        });
        let channel = registry.create("c", ChannelMode::Raw).unwrap();
        let (stalled, _stalled_rx) = pair();
        channel.join(1, stalled).unwrap();

        let broadcaster = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || channel.broadcast(&vec![0u8; 8 * 1024 * 1024]))
        };
        thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        let (b, _b_rx) = pair();
        channel.join(2, b).unwrap();
        assert!(channel.member_ids().contains(&2));
        assert!(channel.leave(1));
        assert!(started.elapsed() < Duration::from_secs(1));

        broadcaster.join().unwrap();
        assert_eq!(channel.member_ids(), vec![2]);
    }

    #[test]
    fn closed_channel_refuses_joins() {
        let registry = ChannelRegistry::new();
        let channel = registry.create("c", ChannelMode::Framed).unwrap();
        assert!(registry.remove("c").is_some());
        assert!(channel.is_closed());

        let (a, mut a_rx) = pair();
        assert!(matches!(
            channel.join(1, a),
            Err(ChannelError::UnknownChannel(name)) if name == "c"
        ));
        assert_eq!(channel.member_count(), 0);

        let mut buf = [0u8; 1];
        assert_eq!(a_rx.get_mut().read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn leave_shuts_member_down() {
        let channel = ChannelRegistry::new()
            .create("c", ChannelMode::Raw)
            .unwrap();
        let (a, mut a_rx) = pair();
        channel.join(7, a).unwrap();

        assert!(channel.leave(7));
        assert!(!channel.leave(7));
        assert_eq!(channel.member_count(), 0);

        let mut buf = [0u8; 1];
        assert_eq!(a_rx.get_mut().read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn listeners_see_relayed_messages() {
        let channel = ChannelRegistry::new()
            .create("c", ChannelMode::Framed)
            .unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let id = {
            let seen = Arc::clone(&seen);
            channel.on(move |from, message| {
                if let Relayed::Frame(value) = message {
                    seen.lock().unwrap().push((from, value.clone()));
                }
            })
        };

        channel.notify(3, Relayed::Frame(&Value::from("x")));
        assert!(channel.off(id));
        channel.notify(3, Relayed::Frame(&Value::from("y")));

        assert_eq!(*seen.lock().unwrap(), vec![(3, Value::from("x"))]);
    }

    #[test]
    fn registry_rejects_duplicates_and_removes() {
        let registry = ChannelRegistry::new();
        registry.create("b", ChannelMode::Framed).unwrap();
        registry.create("a", ChannelMode::Raw).unwrap();
        assert!(matches!(
            registry.create("a", ChannelMode::Framed),
            Err(ChannelError::ChannelExists(name)) if name == "a"
        ));
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.get("a").unwrap().mode(), ChannelMode::Raw);

        let (a, mut a_rx) = pair();
        registry.get("b").unwrap().join(1, a).unwrap();
        assert!(registry.remove("b").is_some());
        assert!(registry.get("b").is_none());
        assert_eq!(registry.len(), 1);

        let mut buf = [0u8; 1];
        assert_eq!(a_rx.get_mut().read(&mut buf).unwrap(), 0);
    }
}
