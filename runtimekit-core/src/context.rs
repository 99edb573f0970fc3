//! Per-invocation context

use http::HeaderMap;
use serde::Serialize;

use crate::endpoints::headers;
use crate::environment::RuntimeEnvironment;

/// Context handed to the handler for a single event.
///
/// Built from the headers of the `/next` response and discarded once the
/// event has been acknowledged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvocationContext {
    /// Request ID identifying the invocation, e.g. `8476a536-e9f4-11e8-9739-2dfe598c3fcd`
    pub request_id: String,
    /// Function timeout as Unix time in milliseconds, e.g. `1542409706888`
    pub deadline_ms: String,
    /// ARN of the function, version or alias that was invoked
    pub invoked_function_arn: String,
    /// X-Ray tracing header
    pub trace_id: String,
    /// Client application data for invocations from the AWS Mobile SDK
    pub client_context: String,
    /// Cognito identity data for invocations from the AWS Mobile SDK
    pub cognito_identity: String,
    pub env: RuntimeEnvironment,
}

impl InvocationContext {
    /// Build a context from the `/next` response headers.
    ///
    /// Missing or non-UTF-8 headers are left empty.
    pub fn from_headers(env: &RuntimeEnvironment, header_map: &HeaderMap) -> Self {
        Self {
            request_id: header_value(header_map, headers::REQUEST_ID),
            deadline_ms: header_value(header_map, headers::DEADLINE_MS),
            invoked_function_arn: header_value(header_map, headers::INVOKED_FUNCTION_ARN),
            trace_id: header_value(header_map, headers::TRACE_ID),
            client_context: header_value(header_map, headers::CLIENT_CONTEXT),
            cognito_identity: header_value(header_map, headers::COGNITO_IDENTITY),
            env: env.clone(),
        }
    }

    /// Deadline as milliseconds since the epoch, if the header was numeric
    pub fn deadline(&self) -> Option<i64> {
        self.deadline_ms.trim().parse().ok()
    }

    /// Milliseconds left before the deadline, zero once it has passed
    pub fn remaining_time_millis(&self) -> Option<i64> {
        let now = chrono::Utc::now().timestamp_millis();
        self.deadline().map(|deadline| (deadline - now).max(0))
    }
}

fn header_value(header_map: &HeaderMap, name: &str) -> String {
    header_map
        .get(name)
        .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderName, HeaderValue};

    fn sample_headers() -> HeaderMap {
        [
            (headers::REQUEST_ID, "8476a536-e9f4-11e8-9739-2dfe598c3fcd"),
            (headers::DEADLINE_MS, "1542409706888"),
            (
                headers::INVOKED_FUNCTION_ARN,
                "arn:aws:lambda:us-east-2:123456789012:function:custom-runtime",
            ),
            (
                headers::TRACE_ID,
                "Root=1-5bef4de7-ad49b0e87f6ef6c87fc2e700;Parent=9a9197af755a6419;Sampled=1",
            ),
            (headers::CLIENT_CONTEXT, r#"{"client":{}}"#),
            (headers::COGNITO_IDENTITY, r#"{"cognitoIdentityId":"x"}"#),
        ]
        .into_iter()
        .map(|(name, value)| {
            (
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_static(value),
            )
        })
        .collect()
    }

    #[test]
    fn test_from_headers_extracts_all_fields() {
        let env = RuntimeEnvironment::new("127.0.0.1:9001", "/var/task", "handler.sh");
        let ctx = InvocationContext::from_headers(&env, &sample_headers());

        assert_eq!(ctx.request_id, "8476a536-e9f4-11e8-9739-2dfe598c3fcd");
        assert_eq!(ctx.deadline_ms, "1542409706888");
        assert_eq!(
            ctx.invoked_function_arn,
            "arn:aws:lambda:us-east-2:123456789012:function:custom-runtime"
        );
        assert!(ctx.trace_id.starts_with("Root=1-5bef4de7"));
        assert_eq!(ctx.client_context, r#"{"client":{}}"#);
        assert_eq!(ctx.cognito_identity, r#"{"cognitoIdentityId":"x"}"#);
        assert_eq!(ctx.env, env);
    }

    #[test]
    fn test_missing_headers_are_empty() {
        let ctx = InvocationContext::from_headers(&RuntimeEnvironment::default(), &HeaderMap::new());
        assert!(ctx.request_id.is_empty());
        assert!(ctx.trace_id.is_empty());
        assert_eq!(ctx.deadline(), None);
        assert_eq!(ctx.remaining_time_millis(), None);
    }

    #[test]
    fn test_utf8_header_is_kept() {
        let mut header_map = HeaderMap::new();
        header_map.insert(
            HeaderName::from_bytes(headers::COGNITO_IDENTITY.as_bytes()).unwrap(),
            HeaderValue::from_bytes(r#"{"name":"José"}"#.as_bytes()).unwrap(),
        );
        header_map.insert(
            HeaderName::from_bytes(headers::CLIENT_CONTEXT.as_bytes()).unwrap(),
            HeaderValue::from_bytes(b"\xff\xfe").unwrap(),
        );

        let ctx = InvocationContext::from_headers(&RuntimeEnvironment::default(), &header_map);

        assert_eq!(ctx.cognito_identity, r#"{"name":"José"}"#);
        assert!(ctx.client_context.is_empty());
    }

    #[test]
    fn test_remaining_time_saturates_at_zero() {
        let ctx = InvocationContext::from_headers(&RuntimeEnvironment::default(), &sample_headers());
        assert_eq!(ctx.deadline(), Some(1_542_409_706_888));
        assert_eq!(ctx.remaining_time_millis(), Some(0));
    }
}
