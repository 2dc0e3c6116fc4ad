//! Misdirection through a running proxy, with log capture.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use minitrue::hooks::misdirector_fn;
use minitrue::http::{ParsedUrl, ProxyFactory};
use minitrue::misdirection::{restrict_to_hostnames, restrict_to_paths};
use minitrue::observability::logging::MISDIRECTION_TARGET;

mod common;

/// Collects misdirection log lines for the whole test binary.
struct Capture;

struct Message(String);

impl Visit for Message {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}

impl<S: Subscriber> Layer<S> for Capture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target() == MISDIRECTION_TARGET {
            let mut message = Message(String::new());
            event.record(&mut message);
            lines().lock().unwrap().push(message.0);
        }
    }
}

fn lines() -> &'static Mutex<Vec<String>> {
    static LINES: OnceLock<Mutex<Vec<String>>> = OnceLock::new();
    LINES.get_or_init(|| {
        tracing_subscriber::registry().with(Capture).init();
        Mutex::new(Vec::new())
    })
}

/// Captured lines mentioning `needle`.
fn logged(needle: &str) -> Vec<String> {
    lines()
        .lock()
        .unwrap()
        .iter()
        .filter(|line| line.contains(needle))
        .cloned()
        .collect()
}

fn book_to_news() -> impl minitrue::Misdirector {
    restrict_to_paths(
        ["/book"],
        misdirector_fn("book-to-news", |url: &ParsedUrl| Some(url.with_path("/news"))),
    )
}

#[tokio::test]
async fn book_is_misdirected_to_news() {
    lines();
    let target = common::start_target().await;
    let proxy = common::start_proxy(ProxyFactory::builder().misdirector(book_to_news()).build()).await;

    let body = proxy
        .client()
        .get(format!("http://{}/book", target))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, common::NEWS);

    let expected = format!("Misdirecting http://{0}/book to http://{0}/news", target);
    assert_eq!(logged(&target.to_string()), vec![expected]);
}

#[tokio::test]
async fn other_paths_are_untouched_and_unlogged() {
    lines();
    let target = common::start_target().await;
    let proxy = common::start_proxy(ProxyFactory::builder().misdirector(book_to_news()).build()).await;

    let res = proxy
        .client()
        .get(format!("http://{}/other", target))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    assert!(logged(&target.to_string()).is_empty());
}

#[tokio::test]
async fn unchanged_result_is_not_logged() {
    lines();
    let target = common::start_target().await;
    let same = misdirector_fn("same", |url: &ParsedUrl| Some(url.clone()));
    let proxy = common::start_proxy(ProxyFactory::builder().misdirector(same).build()).await;

    let res = proxy
        .client()
        .get(format!("http://{}/book", target))
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), common::BOOK);
    assert!(logged(&target.to_string()).is_empty());
}

#[tokio::test]
async fn hostname_filter_skips_other_hosts() {
    let target = common::start_target().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let misdirector = restrict_to_hostnames(
        ["a.example"],
        misdirector_fn("counted", move |url: &ParsedUrl| {
            counted.fetch_add(1, Ordering::SeqCst);
            Some(url.with_path("/news"))
        }),
    );
    let proxy = common::start_proxy(ProxyFactory::builder().misdirector(misdirector).build()).await;

    let body = proxy
        .client()
        .get(format!("http://{}/book", target))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, common::BOOK);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
