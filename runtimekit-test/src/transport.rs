//! Scripted in-memory transport

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode};
use parking_lot::Mutex;
use runtimekit::{Transport, TransportError, TransportResponse};

/// Runtime API endpoint a request was addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    NextInvocation,
    Response,
    InvocationError,
    InitError,
}

impl Route {
    /// Classify a request path by its suffix
    pub fn of(path: &str) -> Self {
        if path.ends_with("/runtime/invocation/next") {
            Self::NextInvocation
        } else if path.ends_with("/runtime/init/error") {
            Self::InitError
        } else if path.ends_with("/error") {
            Self::InvocationError
        } else {
            Self::Response
        }
    }
}

/// Request as seen by the transport
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn route(&self) -> Route {
        Route::of(&self.url)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or_default()
    }
}

type Responder = Box<dyn Fn(&RecordedRequest) -> Result<TransportResponse, TransportError> + Send + Sync>;

#[derive(Default)]
struct Inner {
    responders: Mutex<HashMap<Route, Responder>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Transport that answers from per-route scripts.
///
/// Clones share the script and the request log, so a test can keep a
/// handle while the runtime owns another. Routes without a script are
/// answered with an empty `202 Accepted`.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Inner>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `route` with a custom responder
    #[must_use]
    pub fn on<F>(self, route: Route, responder: F) -> Self
    where
        F: Fn(&RecordedRequest) -> Result<TransportResponse, TransportError> + Send + Sync + 'static,
    {
        self.inner.responders.lock().insert(route, Box::new(responder));
        self
    }

    /// Serve the same event for every `/next` poll
    #[must_use]
    pub fn with_event(self, request_id: &str, payload: &str) -> Self {
        let headers = event_headers(&[("Lambda-Runtime-Aws-Request-Id", request_id)]);
        let payload = Bytes::from(payload.to_string());
        self.on(Route::NextInvocation, move |_| {
            Ok(TransportResponse::new(StatusCode::OK, headers.clone(), payload.clone()))
        })
    }

    /// Serve an event with arbitrary Runtime API headers
    #[must_use]
    pub fn with_event_headers(self, header_pairs: &[(&str, &str)], payload: &str) -> Self {
        let headers = event_headers(header_pairs);
        let payload = Bytes::from(payload.to_string());
        self.on(Route::NextInvocation, move |_| {
            Ok(TransportResponse::new(StatusCode::OK, headers.clone(), payload.clone()))
        })
    }

    /// Fail to send any request to `route`
    #[must_use]
    pub fn failing(self, route: Route, message: &str) -> Self {
        let message = message.to_string();
        self.on(route, move |_| Err(TransportError::other(message.clone())))
    }

    /// Accept the request but fail while the body is read
    #[must_use]
    pub fn failing_body(self, route: Route, message: &str) -> Self {
        let message = message.to_string();
        self.on(route, move |_| {
            let body = stream::iter([Err(TransportError::other(message.clone()))]).boxed();
            Ok(TransportResponse::from_stream(StatusCode::OK, HeaderMap::new(), body))
        })
    }

    /// Every request sent so far, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.requests.lock().clone()
    }

    pub fn requests_to(&self, route: Route) -> Vec<RecordedRequest> {
        self.inner
            .requests
            .lock()
            .iter()
            .filter(|r| r.route() == route)
            .cloned()
            .collect()
    }

    /// Body of the last request if it went to a `/response` endpoint
    pub fn last_response_body(&self) -> Option<String> {
        self.inner
            .requests
            .lock()
            .last()
            .filter(|r| r.route() == Route::Response)
            .map(|r| r.body_str().to_string())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request<Bytes>) -> Result<TransportResponse, TransportError> {
        let (parts, body) = request.into_parts();
        let recorded = RecordedRequest {
            method: parts.method,
            url: parts.uri.to_string(),
            headers: parts.headers,
            body,
        };
        self.inner.requests.lock().push(recorded.clone());

        let responders = self.inner.responders.lock();
        match responders.get(&recorded.route()) {
            Some(responder) => responder(&recorded),
            None => Ok(TransportResponse::new(
                StatusCode::ACCEPTED,
                HeaderMap::new(),
                Bytes::new(),
            )),
        }
    }
}

fn event_headers(pairs: &[(&str, &str)]) -> HeaderMap {
    pairs
        .iter()
        .filter_map(|(name, value)| {
            let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
            let value = HeaderValue::from_bytes(value.as_bytes()).ok()?;
            Some((name, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_classification() {
        assert_eq!(
            Route::of("http://api/2018-06-01/runtime/invocation/next"),
            Route::NextInvocation
        );
        assert_eq!(
            Route::of("http://api/2018-06-01/runtime/invocation/abc/response"),
            Route::Response
        );
        assert_eq!(
            Route::of("http://api/2018-06-01/runtime/invocation/abc/error"),
            Route::InvocationError
        );
        assert_eq!(Route::of("http://api/2018-06-01/runtime/init/error"), Route::InitError);
    }

    #[tokio::test]
    async fn test_unscripted_route_is_accepted_and_recorded() {
        let transport = MockTransport::new();
        let request = Request::post("http://api/2018-06-01/runtime/init/error")
            .body(Bytes::from("{}"))
            .unwrap();

        let response = transport.send(request).await.unwrap();

        assert_eq!(response.status, StatusCode::ACCEPTED);
        assert_eq!(transport.requests_to(Route::InitError).len(), 1);
        assert_eq!(transport.requests()[0].body_str(), "{}");
    }

    #[tokio::test]
    async fn test_with_event_sets_request_id_header() {
        let transport = MockTransport::new().with_event("req-1", r#"{"key1":"value1"}"#);
        let request = Request::get("http://api/2018-06-01/runtime/invocation/next")
            .body(Bytes::new())
            .unwrap();

        let response = transport.send(request).await.unwrap();

        assert_eq!(
            response.headers.get("lambda-runtime-aws-request-id").unwrap(),
            "req-1"
        );
        assert_eq!(response.bytes().await.unwrap(), Bytes::from(r#"{"key1":"value1"}"#));
    }
}
