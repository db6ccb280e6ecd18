use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use hostbridge_bridge::{
    transform, Bridge, BridgeError, HttpBridge, HttpBridgeConfig, TransportManager,
};
use hostbridge_codec::{encode, RequestFrame, Value};
use wiremock::matchers::{body_bytes, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn bridge_for(server: &MockServer) -> HttpBridge {
    HttpBridge::new(HttpBridgeConfig::new(server.uri()).with_timeout(Duration::from_secs(5)))
        .unwrap()
}

#[tokio::test]
async fn posts_request_frame_and_decodes_reply() {
    let server = MockServer::start().await;
    let request = RequestFrame::new(1, vec![Value::from("/tmp/file.txt")]);
    let reply = encode(&[Value::from(vec![1u8, 2, 3])]).unwrap();

    Mock::given(method("POST"))
        .and(path("/call"))
        .and(header("content-type", "application/octet-stream"))
        .and(body_bytes(request.encode().unwrap().to_vec()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(reply.to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let bridge = bridge_for(&server);
    let values = bridge.call(request).await.unwrap();
    assert_eq!(values, vec![Value::from(vec![1u8, 2, 3])]);
}

#[tokio::test]
async fn empty_body_is_an_empty_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let values = bridge_for(&server).send(3, Vec::new()).await.unwrap();
    assert!(values.is_empty());
}

#[tokio::test]
async fn non_success_status_is_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/call"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = bridge_for(&server).send(2, Vec::new()).await.unwrap_err();
    assert!(matches!(err, BridgeError::Transport(msg) if msg.contains("500")));
}

#[tokio::test]
async fn unreachable_host_is_transport_failure() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let bridge = HttpBridge::new(HttpBridgeConfig::new(uri)).unwrap();
    let err = bridge.send(2, Vec::new()).await.unwrap_err();
    assert!(matches!(err, BridgeError::Transport(_)));
}

/// Serve one request whose reply promises more body than it sends.
fn truncated_body_host() -> (String, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let host = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
        }
        stream
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 64\r\n\r\n\x02\x00\x00")
            .unwrap();
    });
    (format!("http://{addr}"), host)
}

#[tokio::test]
async fn truncated_reply_body_is_transport_failure() {
    let (uri, host) = truncated_body_host();
    let bridge =
        HttpBridge::new(HttpBridgeConfig::new(uri).with_timeout(Duration::from_secs(5))).unwrap();

    let err = bridge.send(4, Vec::new()).await.unwrap_err();
    assert!(matches!(err, BridgeError::Transport(_)), "{err:?}");
    host.join().unwrap();
}

#[tokio::test]
async fn manager_over_http_with_json_transform() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(encode(&[Value::from(r#"{"ok":true}"#)]).unwrap().to_vec()),
        )
        .mount(&server)
        .await;

    let manager =
        TransportManager::http(HttpBridgeConfig::new(server.uri()).with_call_path("/rpc")).unwrap();
    let parsed: serde_json::Value = manager.send_with(50, Vec::new(), transform::json).await.unwrap();
    assert_eq!(parsed, serde_json::json!({"ok": true}));
    assert_eq!(manager.transport_name(), "http");
}
