//! Manglers built from configuration rules.

use axum::http::{HeaderName, HeaderValue, StatusCode};
use futures_util::future::{self, BoxFuture};

use crate::http::{HttpMessage, ResponseRecord};

use super::{HookError, HookResult, Mangler, Shared};

/// Sets headers, replacing any existing values.
#[derive(Debug, Clone)]
pub struct SetHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SetHeaders {
    pub fn new(headers: Vec<(HeaderName, HeaderValue)>) -> Self {
        Self { headers }
    }
}

impl<M: HttpMessage> Mangler<M> for SetHeaders {
    fn mangle(&self, target: Shared<M>) -> BoxFuture<'_, HookResult> {
        target.with(|message| {
            let headers = message.headers_mut();
            for (name, value) in &self.headers {
                headers.insert(name.clone(), value.clone());
            }
        });
        Box::pin(future::ready(Ok(())))
    }

    fn name(&self) -> &str {
        "set-headers"
    }
}

/// Removes every value of the listed headers.
#[derive(Debug, Clone)]
pub struct RemoveHeaders {
    names: Vec<HeaderName>,
}

impl RemoveHeaders {
    pub fn new(names: Vec<HeaderName>) -> Self {
        Self { names }
    }
}

impl<M: HttpMessage> Mangler<M> for RemoveHeaders {
    fn mangle(&self, target: Shared<M>) -> BoxFuture<'_, HookResult> {
        target.with(|message| {
            let headers = message.headers_mut();
            for name in &self.names {
                headers.remove(name);
            }
        });
        Box::pin(future::ready(Ok(())))
    }

    fn name(&self) -> &str {
        "remove-headers"
    }
}

/// Replaces a byte string in the body, optionally only for URLs whose path
/// contains a given fragment.
#[derive(Debug, Clone)]
pub struct ReplaceBody {
    find: Vec<u8>,
    replace: Vec<u8>,
    path_contains: Option<String>,
}

impl ReplaceBody {
    pub fn new(find: impl Into<Vec<u8>>, replace: impl Into<Vec<u8>>) -> Self {
        Self {
            find: find.into(),
            replace: replace.into(),
            path_contains: None,
        }
    }

    /// Only apply to messages whose URL path contains `fragment`.
    pub fn when_path_contains(mut self, fragment: impl Into<String>) -> Self {
        self.path_contains = Some(fragment.into());
        self
    }
}

impl<M: HttpMessage> Mangler<M> for ReplaceBody {
    fn mangle(&self, target: Shared<M>) -> BoxFuture<'_, HookResult> {
        target.with(|message| {
            let applies = self
                .path_contains
                .as_deref()
                .map_or(true, |fragment| message.url().path().contains(fragment));
            if applies {
                let count = message.body_mut().replace_all(&self.find, &self.replace);
                tracing::trace!(count, "Body replacements applied");
            }
        });
        Box::pin(future::ready(Ok(())))
    }

    fn name(&self) -> &str {
        "replace-body"
    }
}

/// Overrides the response status.
#[derive(Debug, Clone, Copy)]
pub struct SetStatus(pub StatusCode);

impl SetStatus {
    pub fn from_u16(code: u16) -> Result<Self, HookError> {
        StatusCode::from_u16(code)
            .map(SetStatus)
            .map_err(|e| HookError::failed("set-status", e.to_string()))
    }
}

impl Mangler<ResponseRecord> for SetStatus {
    fn mangle(&self, target: Shared<ResponseRecord>) -> BoxFuture<'_, HookResult> {
        target.lock().status = self.0;
        Box::pin(future::ready(Ok(())))
    }

    fn name(&self) -> &str {
        "set-status"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{InboundRequest, ParsedUrl};
    use axum::http::{HeaderMap, Method};

    fn news_record(body: &str) -> Shared<ResponseRecord> {
        let mut record = ResponseRecord::new(
            Method::GET,
            ParsedUrl::parse("http://a.example/news").unwrap(),
            StatusCode::OK,
            HeaderMap::new(),
        );
        record.body.append(body.as_bytes());
        Shared::new(record)
    }

    #[tokio::test]
    async fn set_headers_overrides_request_values() {
        let mut request = InboundRequest::new(
            Method::GET,
            ParsedUrl::parse("http://a.example/news").unwrap(),
        );
        request
            .headers
            .append("accept-language", HeaderValue::from_static("oldspeak"));
        request
            .headers
            .append("accept-language", HeaderValue::from_static("en"));

        let rule = SetHeaders::new(vec![(
            HeaderName::from_static("accept-language"),
            HeaderValue::from_static("newspeak"),
        )]);
        let shared = Shared::new(request);
        rule.mangle(shared.clone()).await.unwrap();

        let request = shared.into_inner().unwrap();
        let values: Vec<_> = request.headers.get_all("accept-language").iter().collect();
        assert_eq!(values, vec!["newspeak"]);
    }

    #[tokio::test]
    async fn remove_headers_drops_all_values() {
        let record = news_record("");
        record
            .lock()
            .headers
            .append("set-cookie", HeaderValue::from_static("a=1"));
        let rule = RemoveHeaders::new(vec![HeaderName::from_static("set-cookie")]);
        rule.mangle(record.clone()).await.unwrap();
        assert!(record.lock().headers.is_empty());
    }

    #[tokio::test]
    async fn replace_body_honours_path_filter() {
        let rule = ReplaceBody::new("decreased", "increased").when_path_contains("news");
        let record = news_record("rations decreased");
        rule.mangle(record.clone()).await.unwrap();
        assert_eq!(record.lock().body.text(), "rations increased");

        let other = ReplaceBody::new("decreased", "increased").when_path_contains("book");
        let record = news_record("rations decreased");
        other.mangle(record.clone()).await.unwrap();
        assert_eq!(record.lock().body.text(), "rations decreased");
    }

    #[tokio::test]
    async fn set_status_rewrites_status() {
        let record = news_record("");
        SetStatus::from_u16(203)
            .unwrap()
            .mangle(record.clone())
            .await
            .unwrap();
        assert_eq!(record.lock().status, StatusCode::NON_AUTHORITATIVE_INFORMATION);
        assert!(SetStatus::from_u16(42).is_err());
    }
}
