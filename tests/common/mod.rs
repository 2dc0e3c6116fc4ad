//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use minitrue::config::ListenerConfig;
use minitrue::http::{ProxyFactory, ProxyServer};
use minitrue::lifecycle::Shutdown;
use minitrue::net::Listener;

pub const NEWS: &str = "Chocolate rations have been decreased to 20g per week.";
pub const BOOK: &str = "Chapter I: Ignorance is Strength\n\n\
Throughout recorded time there have been three kinds of people in the world.";

/// A request as seen by the fake target.
#[derive(Debug, Default)]
struct Received {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Received {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<Received> {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    let head_end = loop {
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        raw.extend_from_slice(&buf[..n]);
        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&raw[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();

    let mut received = Received {
        method,
        path,
        headers,
        body: raw[head_end + 4..].to_vec(),
    };
    let length: usize = received
        .header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    while received.body.len() < length {
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            break;
        }
        received.body.extend_from_slice(&buf[..n]);
    }
    Some(received)
}

fn respond(status: &str, headers: &[(&str, String)], body: &[u8]) -> Vec<u8> {
    respond_with_length(status, headers, body, body.len())
}

fn respond_with_length(status: &str, headers: &[(&str, String)], body: &[u8], length: usize) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n", status, length);
    for (name, value) in headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str("\r\n");
    let mut out = out.into_bytes();
    out.extend_from_slice(body);
    out
}

/// Start the fake target server.
///
/// - `/news`: [`NEWS`], `Content-Language: oldspeak` if the request's
///   `Accept-Language` mentions oldspeak, otherwise `newspeak`
/// - `/book`: [`BOOK`]
/// - any path ending in `/echo`: the received request line, headers and body
/// - `/slow`: [`NEWS`] after half a second
/// - `/truncated`: announces 100 bytes, sends 10, then closes
/// - anything else: 404
///
/// `HEAD` requests get the same headers with the body left off.
pub async fn start_target() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                let path = request.path.split('?').next().unwrap_or("").to_string();
                let response = match path.as_str() {
                    "/news" | "/slow" => {
                        if path == "/slow" {
                            tokio::time::sleep(Duration::from_millis(500)).await;
                        }
                        let language = if request
                            .header("accept-language")
                            .is_some_and(|v| v.contains("oldspeak"))
                        {
                            "oldspeak"
                        } else {
                            "newspeak"
                        };
                        respond(
                            "200 OK",
                            &[("Content-Language", language.to_string())],
                            NEWS.as_bytes(),
                        )
                    }
                    "/book" => respond("200 OK", &[], BOOK.as_bytes()),
                    "/truncated" => respond_with_length("200 OK", &[], b"Big Brother", 100),
                    echo if echo.ends_with("/echo") => {
                        let mut body = format!("{} {}\n", request.method, request.path);
                        for (name, value) in &request.headers {
                            body.push_str(&format!("{}: {}\n", name.to_ascii_lowercase(), value));
                        }
                        body.push('\n');
                        let mut body = body.into_bytes();
                        body.extend_from_slice(&request.body);
                        respond("200 OK", &[], &body)
                    }
                    _ => respond("404 Not Found", &[], b"Not Found"),
                };
                let response = if request.method == "HEAD" {
                    head_only(response)
                } else {
                    response
                };
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

fn head_only(mut response: Vec<u8>) -> Vec<u8> {
    if let Some(pos) = response.windows(4).position(|w| w == b"\r\n\r\n") {
        response.truncate(pos + 4);
    }
    response
}

/// What a stalled target has seen on its one connection.
#[derive(Debug, PartialEq, Eq)]
pub enum StallEvent {
    /// The request head arrived and part of a response was written.
    Requested,
    /// The proxy closed the upstream connection.
    Closed,
}

/// Start a target that answers with a partial body and never finishes it.
///
/// Reports on the returned channel when a request arrives and when the
/// proxy hangs up.
pub async fn start_stalled_target() -> (SocketAddr, mpsc::UnboundedReceiver<StallEvent>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (events, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        if read_request(&mut socket).await.is_none() {
            return;
        }
        let partial = respond_with_length("200 OK", &[], b"We are the dead", 1000);
        if socket.write_all(&partial).await.is_err() {
            return;
        }
        let _ = events.send(StallEvent::Requested);

        let mut buf = [0u8; 1024];
        loop {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => continue,
            }
        }
        let _ = events.send(StallEvent::Closed);
    });

    (addr, rx)
}

/// A running proxy.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub server: Arc<ProxyServer>,
    shutdown: Shutdown,
}

impl TestProxy {
    /// Client that sends every `http://` request through this proxy.
    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .proxy(reqwest::Proxy::http(format!("http://{}", self.addr)).unwrap())
            .pool_max_idle_per_host(0)
            .build()
            .unwrap()
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a proxy on an ephemeral port.
pub async fn start_proxy(factory: ProxyFactory) -> TestProxy {
    let listener = Listener::bind(&ListenerConfig {
        bind_address: "127.0.0.1:0".into(),
        max_connections: 64,
    })
    .await
    .unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = Arc::new(ProxyServer::new(Arc::new(factory), Duration::from_secs(1)));
    let running = Arc::clone(&server);
    let stopped = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = running.run(listener, stopped).await;
    });

    TestProxy {
        addr,
        server,
        shutdown,
    }
}

/// Direct client that bypasses any proxy.
pub fn direct_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

/// Write a raw request to the proxy and return everything it sends back.
pub async fn raw_exchange(proxy: SocketAddr, request: &str) -> String {
    let mut socket = TcpStream::connect(proxy).await.unwrap();
    socket.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), socket.read_to_end(&mut response))
        .await
        .expect("proxy did not close the connection")
        .unwrap();
    String::from_utf8_lossy(&response).to_string()
}
