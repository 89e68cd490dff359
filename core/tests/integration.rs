//! End-to-end exercise of `NetworkService` over real HTTP.
//!
//! # Design
//! Starts the mock server on a random port, then drives every executor
//! operation through `UreqTransport`. Completions are delivered on a
//! `MainQueue` thread, so the test also sees which thread each result lands
//! on.

use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, BufReader, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use mock_server::Item;
use net_service::{MainQueue, NetworkError, NetworkService, TransportConfig, UreqTransport};
use serde::de::DeserializeOwned;

const MAIN_THREAD: &str = "net-main";
const TIMEOUT: Duration = Duration::from_secs(10);

type Service = NetworkService<UreqTransport, MainQueue>;

fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

/// Serve one connection with `reply` written verbatim after the request head.
fn start_raw_responder(reply: Vec<u8>) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
            line.clear();
        }
        let mut stream = reader.into_inner();
        // The client may hang up early on a bad reply.
        let _ = stream.write_all(&reply);
        let _ = stream.flush();
    });

    format!("http://{addr}")
}

fn transport_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap()
}

fn service(config: &TransportConfig, runtime: &tokio::runtime::Runtime) -> Service {
    let (queue, _main) = MainQueue::spawn(MAIN_THREAD).unwrap();
    NetworkService::with_ureq(config, runtime.handle().clone(), queue)
}

fn config() -> TransportConfig {
    TransportConfig {
        timeout: Some(TIMEOUT),
        user_agent: Some("net-service-tests".to_string()),
        max_body_bytes: None,
    }
}

type Delivered<T> = (Result<T, NetworkError>, Option<String>);

fn wait<T>(rx: mpsc::Receiver<Delivered<T>>) -> Delivered<T> {
    rx.recv_timeout(TIMEOUT).expect("completion was not delivered")
}

fn get<T: DeserializeOwned + Send + 'static>(
    service: &Service,
    url: &str,
    headers: Option<&HashMap<String, String>>,
) -> Delivered<T> {
    let (tx, rx) = mpsc::channel();
    service.fetch_typed(url, headers, move |r| {
        tx.send((r, thread::current().name().map(str::to_string))).unwrap();
    });
    wait(rx)
}

fn post<T: DeserializeOwned + Send + 'static>(
    service: &Service,
    url: &str,
    body: &serde_json::Value,
) -> Delivered<T> {
    let (tx, rx) = mpsc::channel();
    service.post_typed(url, body, None, move |r| {
        tx.send((r, thread::current().name().map(str::to_string))).unwrap();
    });
    wait(rx)
}

fn raw(service: &Service, url: &str) -> Delivered<Bytes> {
    let (tx, rx) = mpsc::channel();
    service.fetch_raw(url, None, move |r| {
        tx.send((r, thread::current().name().map(str::to_string))).unwrap();
    });
    wait(rx)
}

#[test]
fn operations_against_live_server() {
    let base = start_server();
    let runtime = transport_runtime();
    let service = service(&config(), &runtime);

    // Step 1: typed GET of the seeded catalog, delivered on the main thread.
    let (items, thread) = get::<Vec<Item>>(&service, &format!("{base}/items"), None);
    let items = items.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].name, "lamp");
    assert_eq!(thread.as_deref(), Some(MAIN_THREAD));

    // Step 2: typed POST creates an item (201 is in the success range).
    let body = serde_json::json!({"name": "chair", "price_cents": 4500});
    let (created, _) = post::<Item>(&service, &format!("{base}/items"), &body);
    let created = created.unwrap();
    assert_eq!(created.name, "chair");

    // Step 3: read it back.
    let (fetched, _) = get::<Item>(&service, &format!("{base}/items/{}", created.id), None);
    assert_eq!(fetched.unwrap(), created);

    // Step 4: echo round trip of an arbitrary JSON document.
    let doc = serde_json::json!({"nested": {"list": [1, 2.5, "three", null]}, "flag": true});
    let (echoed, _) = post::<serde_json::Value>(&service, &format!("{base}/echo"), &doc);
    assert_eq!(echoed.unwrap(), doc);

    // Step 5: caller headers and the configured user agent reach the server.
    let headers = HashMap::from([("X-Test".to_string(), "abc".to_string())]);
    let (seen, _) = get::<BTreeMap<String, String>>(&service, &format!("{base}/headers"), Some(&headers));
    let seen = seen.unwrap();
    assert_eq!(seen.get("x-test").map(String::as_str), Some("abc"));
    assert_eq!(seen.get("user-agent").map(String::as_str), Some("net-service-tests"));

    // Step 6: raw bytes pass through untouched.
    let (bytes, thread) = raw(&service, &format!("{base}/bytes/300"));
    let bytes = bytes.unwrap();
    assert_eq!(bytes.len(), 300);
    assert!(bytes.iter().enumerate().all(|(i, b)| *b == i as u8));
    assert_eq!(thread.as_deref(), Some(MAIN_THREAD));

    // Step 7: an empty 200 body is fine raw, a decode error typed.
    let (empty, _) = raw(&service, &format!("{base}/empty"));
    assert!(empty.unwrap().is_empty());
    let (typed, _) = get::<serde_json::Value>(&service, &format!("{base}/empty"), None);
    assert!(matches!(typed, Err(NetworkError::DecodeError)));

    // Step 8: error statuses come back exactly, off the main thread.
    for code in [400u16, 404, 418, 500, 503] {
        let (result, thread) = get::<serde_json::Value>(&service, &format!("{base}/status/{code}"), None);
        assert_eq!(result.unwrap_err().status_code(), Some(code));
        assert_ne!(thread.as_deref(), Some(MAIN_THREAD));
    }

    // Step 9: unknown item.
    let missing = format!("{base}/items/00000000-0000-0000-0000-000000000000");
    let (result, _) = get::<Item>(&service, &missing, None);
    assert!(matches!(result, Err(NetworkError::WrongStatusCode(404))));

    // Step 10: a JSON body of the wrong shape is a decode error.
    let (result, _) = get::<Item>(&service, &format!("{base}/items"), None);
    assert!(matches!(result, Err(NetworkError::DecodeError)));
}

#[test]
fn refused_connection_is_transport_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let runtime = transport_runtime();
    let service = service(&config(), &runtime);

    let (result, thread) = get::<serde_json::Value>(&service, &format!("http://{addr}/items"), None);
    let Err(NetworkError::Transport(err)) = result else {
        panic!("expected a transport error");
    };
    assert!(!err.to_string().is_empty());
    assert_ne!(thread.as_deref(), Some(MAIN_THREAD));
}

#[test]
fn transport_config_from_env_builds_working_service() {
    let base = start_server();
    let runtime = transport_runtime();
    let service = service(&TransportConfig::from_env(), &runtime);

    let (items, _) = get::<Vec<Item>>(&service, &format!("{base}/items"), None);
    assert_eq!(items.unwrap().len(), 2);
}

#[test]
fn raw_body_larger_than_ureq_default_limit() {
    const LEN: usize = 12 * 1024 * 1024;
    let mut reply = format!("HTTP/1.1 200 OK\r\nContent-Length: {LEN}\r\nConnection: close\r\n\r\n")
        .into_bytes();
    reply.extend((0..LEN).map(|i| (i % 251) as u8));
    let base = start_raw_responder(reply);
    let runtime = transport_runtime();
    let service = service(&config(), &runtime);

    let (bytes, _) = raw(&service, &format!("{base}/large"));
    let bytes = bytes.unwrap();
    assert_eq!(bytes.len(), LEN);
    assert_eq!(bytes[LEN - 1], ((LEN - 1) % 251) as u8);
}

#[test]
fn configured_body_limit_is_a_transport_error() {
    let reply = b"HTTP/1.1 200 OK\r\nContent-Length: 64\r\nConnection: close\r\n\r\n"
        .iter()
        .copied()
        .chain([7u8; 64])
        .collect();
    let base = start_raw_responder(reply);
    let runtime = transport_runtime();
    let capped = TransportConfig {
        max_body_bytes: Some(16),
        ..config()
    };
    let service = service(&capped, &runtime);

    let (result, _) = raw(&service, &format!("{base}/capped"));
    assert!(matches!(result, Err(NetworkError::Transport(_))));
}

#[test]
fn non_http_reply_is_wrong_response() {
    let base = start_raw_responder(b"HELLO THIS IS NOT HTTP\r\n\r\n".to_vec());
    let runtime = transport_runtime();
    let service = service(&config(), &runtime);

    let (result, thread) = get::<serde_json::Value>(&service, &format!("{base}/items"), None);
    assert!(matches!(result, Err(NetworkError::WrongResponse)));
    assert_ne!(thread.as_deref(), Some(MAIN_THREAD));
}
