use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use hostbridge_channel::{ChannelClient, ChannelError, ChannelServer, Relayed, ShutdownHandle};
use hostbridge_codec::{encode, Value};
use hostbridge_transport::Endpoint;

const TIMEOUT: Duration = Duration::from_secs(5);

struct Running {
    server: Arc<ChannelServer>,
    shutdown: ShutdownHandle,
    serving: Option<thread::JoinHandle<()>>,
}

impl Running {
    fn start(endpoint: &Endpoint, framed: &[&str], raw: &[&str]) -> Self {
        let server = ChannelServer::bind(endpoint).expect("server should bind");
        for name in framed {
            server.create_channel(*name).expect("channel should be created");
        }
        for name in raw {
            server.create_raw_channel(*name).expect("channel should be created");
        }
        let server = Arc::new(server);
        let shutdown = server.shutdown_handle();
        let serving = {
            let server = Arc::clone(&server);
            thread::spawn(move || server.serve().expect("serve should return ok"))
        };
        Self {
            server,
            shutdown,
            serving: Some(serving),
        }
    }

    fn tcp(framed: &[&str], raw: &[&str]) -> Self {
        Self::start(&Endpoint::tcp("127.0.0.1:0"), framed, raw)
    }

    fn join(&self, channel: &str) -> ChannelClient {
        let client = ChannelClient::connect(&self.server.local_endpoint(), channel)
            .expect("client should connect");
        client
            .set_read_timeout(Some(TIMEOUT))
            .expect("timeout should apply");
        client
    }

    fn wait_for_members(&self, channel: &str, count: usize) {
        let channel = self.server.channel(channel).expect("channel should exist");
        let deadline = Instant::now() + TIMEOUT;
        while channel.member_count() != count {
            assert!(Instant::now() < deadline, "timed out waiting for {count} members");
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.shutdown.shutdown();
        if let Some(serving) = self.serving.take() {
            let _ = serving.join();
        }
    }
}

#[test]
fn unknown_channel_is_rejected_and_server_keeps_serving() {
    let relay = Running::tcp(&["c"], &[]);

    let mut stranger = relay.join("missing");
    assert!(matches!(
        stranger.recv(),
        Err(ChannelError::Disconnected(name)) if name == "missing"
    ));

    let mut member = relay.join("c");
    member.send(&Value::from("still here")).unwrap();
    assert_eq!(member.recv().unwrap(), Value::from("still here"));
}

#[test]
fn broadcast_reaches_sender_and_other_members() {
    let relay = Running::tcp(&["c"], &[]);
    let mut a = relay.join("c");
    let mut b = relay.join("c");
    relay.wait_for_members("c", 2);

    let sent = [Value::from("ok"), Value::from(42), Value::from(true), Value::Absent];
    for value in &sent {
        a.send(value).unwrap();
    }

    for value in &sent {
        assert_eq!(&a.recv().unwrap(), value);
        assert_eq!(&b.recv().unwrap(), value);
    }
}

#[test]
fn frames_split_across_writes_are_reassembled() {
    let relay = Running::tcp(&["c"], &[]);
    let mut a = relay.join("c");
    relay.wait_for_members("c", 1);

    let wire = encode(&[Value::from("split"), Value::from(vec![9u8; 300])]).unwrap();
    for piece in wire.chunks(7) {
        a.send_raw(piece).unwrap();
        thread::sleep(Duration::from_millis(1));
    }

    assert_eq!(a.recv().unwrap(), Value::from("split"));
    assert_eq!(a.recv().unwrap(), Value::from(vec![9u8; 300]));
}

#[test]
fn raw_channel_relays_bytes() {
    let relay = Running::tcp(&[], &["pipe"]);
    let mut a = relay.join("pipe");
    let mut b = relay.join("pipe");
    relay.wait_for_members("pipe", 2);

    a.send_raw(b"not a tagged value").unwrap();

    for client in [&mut a, &mut b] {
        let mut got = Vec::new();
        while got.len() < 18 {
            got.extend_from_slice(&client.recv_raw().unwrap());
        }
        assert_eq!(got, b"not a tagged value");
    }
}

#[test]
fn listeners_see_frames_and_members_leave_on_disconnect() {
    let relay = Running::tcp(&["c"], &[]);
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    relay.server.channel("c").unwrap().on(move |_, message| {
        if let Relayed::Frame(value) = message {
            let _ = tx.lock().unwrap().send(value.clone());
        }
    });

    let mut a = relay.join("c");
    a.send(&Value::from(7)).unwrap();
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Value::from(7));

    drop(a);
    relay.wait_for_members("c", 0);
    assert!(relay.server.channel("c").is_some());
}

#[test]
fn server_side_send_and_channel_removal() {
    let relay = Running::tcp(&["news"], &[]);
    let (sender, receiver) = relay.join("news").into_split();
    relay.wait_for_members("news", 1);

    let delivered = relay
        .server
        .channel("news")
        .unwrap()
        .send(&Value::from("headline"))
        .unwrap();
    assert_eq!(delivered, 1);

    let mut receiver = receiver;
    assert_eq!(receiver.next().unwrap().unwrap(), Value::from("headline"));

    assert!(relay.server.remove_channel("news"));
    assert!(receiver.next().is_none());
    assert_eq!(sender.channel(), "news");
}

#[cfg(unix)]
#[test]
fn relays_over_unix_socket() {
    let dir = std::env::temp_dir().join(format!(
        "hostbridge-relay-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    let endpoint = Endpoint::unix(dir.join("relay.sock"));

    {
        let relay = Running::start(&endpoint, &["c"], &[]);
        let mut a = relay.join("c");
        a.send(&Value::from("over uds")).unwrap();
        assert_eq!(a.recv().unwrap(), Value::from("over uds"));
    }

    let _ = std::fs::remove_dir_all(&dir);
}
