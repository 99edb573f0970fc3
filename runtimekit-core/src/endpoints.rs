//! Runtime API endpoints and header names

/// Header names used by the Runtime API
pub mod headers {
    pub const REQUEST_ID: &str = "Lambda-Runtime-Aws-Request-Id";
    pub const DEADLINE_MS: &str = "Lambda-Runtime-Deadline-Ms";
    pub const INVOKED_FUNCTION_ARN: &str = "Lambda-Runtime-Invoked-Function-Arn";
    pub const TRACE_ID: &str = "Lambda-Runtime-Trace-Id";
    pub const CLIENT_CONTEXT: &str = "Lambda-Runtime-Client-Context";
    pub const COGNITO_IDENTITY: &str = "Lambda-Runtime-Cognito-Identity";
    pub const FUNCTION_ERROR_TYPE: &str = "Lambda-Runtime-Function-Error-Type";
}

/// Process variable the X-Ray trace header is propagated through
pub const TRACE_ID_VAR: &str = "_X_AMZN_TRACE_ID";

/// Runtime API version prefix
pub const API_VERSION: &str = "2018-06-01";

/// URL builder for a control plane at `host:port`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: String,
}

impl Endpoints {
    pub fn new(runtime_api: impl Into<String>) -> Self {
        Self {
            base: runtime_api.into(),
        }
    }

    /// GET endpoint returning the next event
    pub fn next_invocation(&self) -> String {
        format!("http://{}/{}/runtime/invocation/next", self.base, API_VERSION)
    }

    pub fn invocation_response(&self, request_id: &str) -> String {
        format!(
            "http://{}/{}/runtime/invocation/{}/response",
            self.base, API_VERSION, request_id
        )
    }

    pub fn invocation_error(&self, request_id: &str) -> String {
        format!(
            "http://{}/{}/runtime/invocation/{}/error",
            self.base, API_VERSION, request_id
        )
    }

    pub fn init_error(&self) -> String {
        format!("http://{}/{}/runtime/init/error", self.base, API_VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_invocation_url() {
        let endpoints = Endpoints::new("unit-test-runtime-api");
        assert_eq!(
            endpoints.next_invocation(),
            "http://unit-test-runtime-api/2018-06-01/runtime/invocation/next"
        );
    }

    #[test]
    fn test_per_request_urls_include_request_id() {
        let endpoints = Endpoints::new("127.0.0.1:9001");
        assert_eq!(
            endpoints.invocation_response("8476a536"),
            "http://127.0.0.1:9001/2018-06-01/runtime/invocation/8476a536/response"
        );
        assert_eq!(
            endpoints.invocation_error("8476a536"),
            "http://127.0.0.1:9001/2018-06-01/runtime/invocation/8476a536/error"
        );
        assert_eq!(
            endpoints.init_error(),
            "http://127.0.0.1:9001/2018-06-01/runtime/init/error"
        );
    }
}
