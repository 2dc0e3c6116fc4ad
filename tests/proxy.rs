//! End-to-end relay tests against a fake target server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, StatusCode};
use tokio::io::AsyncWriteExt;

use futures_util::future::BoxFuture;
use tokio::net::TcpStream;

use minitrue::hooks::rules::ReplaceBody;
use minitrue::hooks::{async_mangler_fn, mangler_fn, HookError, OrderedAll, Shared, UnorderedAll};
use minitrue::http::{InboundRequest, ProxyFactory, ResponseRecord};
use minitrue::relay::{connect_within, Connector};
use minitrue::RelayError;

mod common;

#[tokio::test]
async fn identity_round_trip_matches_direct_request() {
    let target = common::start_target().await;
    let proxy = common::start_proxy(ProxyFactory::builder().build()).await;
    let url = format!("http://{}/news", target);

    let direct = common::direct_client()
        .get(&url)
        .header("Accept-Language", "oldspeak")
        .send()
        .await
        .unwrap();
    let proxied = proxy
        .client()
        .get(&url)
        .header("Accept-Language", "oldspeak")
        .send()
        .await
        .unwrap();

    assert_eq!(proxied.status(), direct.status());
    assert_eq!(
        proxied.headers()["content-language"],
        direct.headers()["content-language"]
    );
    assert_eq!(proxied.bytes().await.unwrap(), direct.bytes().await.unwrap());
}

#[tokio::test]
async fn upstream_status_is_relayed() {
    let target = common::start_target().await;
    let proxy = common::start_proxy(ProxyFactory::builder().build()).await;

    let res = proxy
        .client()
        .get(format!("http://{}/missing", target))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn request_mangler_edits_are_seen_upstream() {
    let target = common::start_target().await;
    let factory = ProxyFactory::builder()
        .request_mangler(mangler_fn("newspeak", |request: &mut InboundRequest| {
            if request.headers.get("accept-language").is_some_and(|v| v == "oldspeak") {
                request
                    .headers
                    .insert("accept-language", HeaderValue::from_static("newspeak"));
            }
            Ok(())
        }))
        .build();
    let proxy = common::start_proxy(factory).await;

    let body = proxy
        .client()
        .get(format!("http://{}/echo", target))
        .header("Accept-Language", "oldspeak")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("accept-language: newspeak"), "{}", body);
    assert!(!body.contains("oldspeak"));
    assert!(body.contains("connection: close"));
    assert!(body.starts_with("GET /echo\n"));
}

#[tokio::test]
async fn mangled_request_body_is_reframed() {
    let target = common::start_target().await;
    let factory = ProxyFactory::builder()
        .request_mangler(ReplaceBody::new("war", "peace and harmony"))
        .build();
    let proxy = common::start_proxy(factory).await;

    let body = proxy
        .client()
        .post(format!("http://{}/echo", target))
        .body("war is peace")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("content-length: 26"), "{}", body);
    assert!(body.ends_with("\n\npeace and harmony is peace"));
}

#[tokio::test]
async fn response_mangler_rewrites_body() {
    let target = common::start_target().await;
    let factory = ProxyFactory::builder()
        .response_mangler(ReplaceBody::new("decreased", "increased"))
        .build();
    let proxy = common::start_proxy(factory).await;

    let res = proxy
        .client()
        .get(format!("http://{}/news", target))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["connection"], "close");
    let body = res.text().await.unwrap();

    assert!(body.contains("increased"));
    assert!(!body.contains("decreased"));
}

#[tokio::test]
async fn resized_response_gets_new_content_length() {
    let target = common::start_target().await;
    let factory = ProxyFactory::builder()
        .response_mangler(async_mangler_fn("ration-boost", |record: Shared<ResponseRecord>| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let mut record = record.lock();
            record.body.replace_all(b"20g", b"twenty-five grams");
            record
                .headers
                .insert("x-ministry", HeaderValue::from_static("plenty"));
            Ok(())
        }))
        .build();
    let proxy = common::start_proxy(factory).await;

    let res = proxy
        .client()
        .get(format!("http://{}/news", target))
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-ministry"], "plenty");
    let length: usize = res.headers()["content-length"].to_str().unwrap().parse().unwrap();
    let body = res.text().await.unwrap();

    assert_eq!(body, "Chocolate rations have been decreased to twenty-five grams per week.");
    assert_eq!(length, body.len());
}

#[tokio::test]
async fn ordered_pipeline_sees_earlier_edits() {
    let target = common::start_target().await;
    let set_x = mangler_fn("set-x", |record: &mut ResponseRecord| {
        record.headers.insert("x", HeaderValue::from_static("1"));
        Ok(())
    });
    let copy_x = mangler_fn("copy-x", |record: &mut ResponseRecord| {
        let value = record
            .headers
            .get("x")
            .cloned()
            .unwrap_or(HeaderValue::from_static("none"));
        record.headers.insert("y", value);
        Ok(())
    });
    let factory = ProxyFactory::builder()
        .response_mangler(OrderedAll::<ResponseRecord>::new().part(set_x).part(copy_x))
        .build();
    let proxy = common::start_proxy(factory).await;

    let res = proxy
        .client()
        .get(format!("http://{}/book", target))
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["y"], "1");
    assert_eq!(res.text().await.unwrap(), common::BOOK);
}

#[tokio::test]
async fn unordered_pipeline_runs_every_part() {
    let target = common::start_target().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let mut pipeline = UnorderedAll::<ResponseRecord>::new();
    for _ in 0..3 {
        let calls = Arc::clone(&calls);
        pipeline = pipeline.part(mangler_fn("count", move |_: &mut ResponseRecord| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
    }
    let proxy = common::start_proxy(ProxyFactory::builder().response_mangler(pipeline).build()).await;

    let res = proxy
        .client()
        .get(format!("http://{}/news", target))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn unsupported_scheme_is_bad_gateway() {
    let proxy = common::start_proxy(ProxyFactory::builder().build()).await;

    let response = common::raw_exchange(
        proxy.addr,
        "GET ftp://127.0.0.1/file HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 502"), "{}", response);
    assert!(response.to_ascii_lowercase().contains("connection: close"));
}

#[tokio::test]
async fn connect_tunnels_are_refused() {
    let proxy = common::start_proxy(ProxyFactory::builder().build()).await;

    let response = common::raw_exchange(
        proxy.addr,
        "CONNECT 127.0.0.1:443 HTTP/1.1\r\nHost: 127.0.0.1:443\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 501"), "{}", response);
}

#[tokio::test]
async fn refused_upstream_is_bad_gateway() {
    let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = closed.local_addr().unwrap().port();
    drop(closed);

    let proxy = common::start_proxy(ProxyFactory::builder().build()).await;
    let res = proxy
        .client()
        .get(format!("http://127.0.0.1:{}/news", port))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn hook_failure_only_affects_its_request() {
    let target = common::start_target().await;
    let factory = ProxyFactory::builder()
        .request_mangler(mangler_fn("thought-police", |request: &mut InboundRequest| {
            if request.url.path() == "/book" {
                return Err(HookError::failed("thought-police", "forbidden book"));
            }
            Ok(())
        }))
        .build();
    let proxy = common::start_proxy(factory).await;
    let client = proxy.client();

    let res = client
        .get(format!("http://{}/book", target))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let res = client
        .get(format!("http://{}/news", target))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), common::NEWS);
}

#[tokio::test]
async fn client_disconnect_leaves_proxy_serving() {
    let target = common::start_target().await;
    let factory = ProxyFactory::builder()
        .response_mangler(ReplaceBody::new("decreased", "increased"))
        .build();
    let proxy = common::start_proxy(factory).await;

    let mut socket = tokio::net::TcpStream::connect(proxy.addr).await.unwrap();
    socket
        .write_all(format!("GET http://{}/slow HTTP/1.1\r\nHost: {}\r\n\r\n", target, target).as_bytes())
        .await
        .unwrap();
    drop(socket);

    let res = proxy
        .client()
        .get(format!("http://{}/news", target))
        .send()
        .await
        .unwrap();
    assert!(res.text().await.unwrap().contains("increased"));

    let tracker = proxy.server.tracker().clone();
    assert!(tracker.wait_for_idle(Duration::from_secs(3)).await);
}

#[tokio::test]
async fn request_target_is_forwarded_verbatim() {
    let target = common::start_target().await;
    let proxy = common::start_proxy(ProxyFactory::builder().build()).await;

    let response = common::raw_exchange(
        proxy.addr,
        &format!(
            "GET http://{0}/x/../echo?q=%7e HTTP/1.1\r\nHost: {0}\r\n\r\n",
            target
        ),
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
    assert!(response.contains("\r\n\r\nGET /x/../echo?q=%7e\n"), "{}", response);
}

#[tokio::test]
async fn truncated_upstream_body_is_bad_gateway() {
    let target = common::start_target().await;
    let factory = ProxyFactory::builder()
        .response_mangler(ReplaceBody::new("Big", "Little"))
        .build();
    let proxy = common::start_proxy(factory).await;

    let res = proxy
        .client()
        .get(format!("http://{}/truncated", target))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert!(res.text().await.unwrap().starts_with("upstream body error"));
}

#[tokio::test]
async fn oversized_upstream_response_is_bad_gateway() {
    let target = common::start_target().await;
    let factory = ProxyFactory::builder()
        .response_mangler(ReplaceBody::new("decreased", "increased"))
        .max_body_bytes(16)
        .build();
    let proxy = common::start_proxy(factory).await;

    let res = proxy
        .client()
        .get(format!("http://{}/news", target))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn head_response_keeps_upstream_length() {
    let target = common::start_target().await;
    let factory = ProxyFactory::builder()
        .response_mangler(ReplaceBody::new("decreased", "increased"))
        .build();
    let proxy = common::start_proxy(factory).await;

    let res = proxy
        .client()
        .head(format!("http://{}/news", target))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()["content-length"],
        common::NEWS.len().to_string().as_str()
    );
    assert!(res.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn client_disconnect_aborts_upstream() {
    let (target, mut events) = common::start_stalled_target().await;
    let factory = ProxyFactory::builder()
        .response_mangler(ReplaceBody::new("dead", "living"))
        .build();
    let proxy = common::start_proxy(factory).await;

    let mut socket = TcpStream::connect(proxy.addr).await.unwrap();
    socket
        .write_all(format!("GET http://{0}/stall HTTP/1.1\r\nHost: {0}\r\n\r\n", target).as_bytes())
        .await
        .unwrap();

    let seen = tokio::time::timeout(Duration::from_secs(3), events.recv()).await.unwrap();
    assert_eq!(seen, Some(common::StallEvent::Requested));
    drop(socket);

    let seen = tokio::time::timeout(Duration::from_secs(3), events.recv())
        .await
        .expect("upstream connection was left open");
    assert_eq!(seen, Some(common::StallEvent::Closed));

    let tracker = proxy.server.tracker().clone();
    assert!(tracker.wait_for_idle(Duration::from_secs(3)).await);
}

/// Connector whose connect never completes.
struct Blackhole {
    deadline: Duration,
}

impl Connector for Blackhole {
    fn default_port(&self) -> u16 {
        80
    }

    fn connect<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, Result<TcpStream, RelayError>> {
        Box::pin(connect_within(
            self.deadline,
            host,
            port,
            std::future::pending::<std::io::Result<TcpStream>>(),
        ))
    }
}

#[tokio::test]
async fn connect_timeout_is_gateway_timeout() {
    let factory = ProxyFactory::builder()
        .scheme(
            "http",
            Blackhole {
                deadline: Duration::from_millis(50),
            },
        )
        .build();
    let proxy = common::start_proxy(factory).await;

    let started = std::time::Instant::now();
    let res = proxy
        .client()
        .get("http://ministry.example/news")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(res.headers()["connection"], "close");
    assert!(started.elapsed() < Duration::from_secs(3));
}
