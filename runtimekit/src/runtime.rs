//! Invocation loop controller
//!
//! Drives the Runtime API protocol: set the handler up, then repeatedly
//! fetch an event, dispatch it and acknowledge it, escalating any failure
//! to the control plane before returning it to the caller.

use bytes::Bytes;
use http::{header::CONTENT_TYPE, HeaderMap, Method, Request};
use runtimekit_core::{
    endpoints::{headers, TRACE_ID_VAR},
    Endpoints, InvocationContext, RuntimeEnvironment, RuntimeError,
};
use tracing::{debug, error, info, warn};

use crate::error::{ErrorClass, LoopError, TransportError, GET_EVENT_ERROR, SEND_RESPONSE_ERROR};
use crate::handler::Handler;
use crate::transport::{HttpTransport, Transport, TransportResponse};

/// How many events the loop processes before cleaning up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopBound {
    /// Poll until an error occurs
    #[default]
    Forever,
    /// Stop after this many acknowledged events; at least one is processed
    Iterations(u64),
}

impl LoopBound {
    fn is_exhausted(self, completed: u64) -> bool {
        match self {
            Self::Forever => false,
            Self::Iterations(limit) => completed >= limit,
        }
    }
}

/// AWS Lambda custom runtime driving a [`Handler`]
pub struct CustomRuntime<H, T = HttpTransport> {
    handler: H,
    transport: T,
    env: RuntimeEnvironment,
    endpoints: Endpoints,
    loop_bound: LoopBound,
}

impl<H: Handler> CustomRuntime<H, HttpTransport> {
    /// Runtime configured from `AWS_LAMBDA_RUNTIME_API`, `LAMBDA_TASK_ROOT`
    /// and `_HANDLER`
    pub fn from_env(handler: H) -> Self {
        Self::new(handler, HttpTransport::new(), RuntimeEnvironment::from_env())
    }
}

impl<H, T> CustomRuntime<H, T>
where
    H: Handler,
    T: Transport,
{
    pub fn new(handler: H, transport: T, env: RuntimeEnvironment) -> Self {
        let endpoints = Endpoints::new(env.runtime_api.clone());
        Self {
            handler,
            transport,
            env,
            endpoints,
            loop_bound: LoopBound::Forever,
        }
    }

    #[must_use]
    pub fn with_loop_bound(mut self, loop_bound: LoopBound) -> Self {
        self.loop_bound = loop_bound;
        self
    }

    pub fn env(&self) -> &RuntimeEnvironment {
        &self.env
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run the loop.
    ///
    /// Returns `Ok(())` only when a bounded loop finished; every error has
    /// already been reported to the control plane when it is returned.
    pub async fn run(&mut self) -> Result<(), LoopError> {
        info!(
            runtime_api = %self.env.runtime_api,
            handler = %self.env.handler,
            "Setting up handler"
        );

        if let Err(err) = self.handler.setup(&self.env).await {
            return Err(self.init_error(RuntimeError::wrap(err)).await);
        }

        let mut completed: u64 = 0;
        loop {
            let (event, header_map) = match self.next_event().await {
                Ok(next) => next,
                Err(cause) => return Err(self.init_error(cause).await),
            };

            propagate_trace_id(&header_map);
            let context = InvocationContext::from_headers(&self.env, &header_map);

            debug!(
                request_id = %context.request_id,
                deadline_ms = %context.deadline_ms,
                bytes = event.len(),
                "Dispatching invocation"
            );

            let output = match self.handler.invoke(event, &context).await {
                Ok(output) => output,
                Err(err) => {
                    return Err(self.invocation_error(&context, RuntimeError::wrap(err)).await)
                }
            };

            if let Err(cause) = self.send_response(&context, output.into_body()).await {
                return Err(self.invocation_error(&context, cause).await);
            }

            completed += 1;
            if self.loop_bound.is_exhausted(completed) {
                break;
            }
        }

        self.handler.cleanup(&self.env).await;
        info!(invocations = completed, "Runtime loop finished");

        Ok(())
    }

    async fn next_event(&self) -> Result<(Bytes, HeaderMap), RuntimeError> {
        let url = self.endpoints.next_invocation();
        debug!(url = %url, "Polling for next invocation");

        let response = self
            .send(Method::GET, &url, Bytes::new())
            .await
            .map_err(|e| RuntimeError::new(format!("failed to get event data: {e}"), GET_EVENT_ERROR))?;

        let header_map = response.headers.clone();
        let event = response.bytes().await.map_err(|e| {
            RuntimeError::new(format!("failed to read event data: {e}"), GET_EVENT_ERROR)
        })?;

        Ok((event, header_map))
    }

    async fn send_response(
        &self,
        context: &InvocationContext,
        body: Bytes,
    ) -> Result<(), RuntimeError> {
        let url = self.endpoints.invocation_response(&context.request_id);
        debug!(request_id = %context.request_id, bytes = body.len(), "Sending response");

        let response = self
            .send(Method::POST, &url, body)
            .await
            .map_err(send_response_error)?;

        if !response.status.is_success() {
            warn!(url = %url, status = %response.status, "Control plane rejected response");
        }

        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Bytes,
    ) -> Result<TransportResponse, TransportError> {
        let request = Request::builder().method(method).uri(url).body(body)?;
        self.transport.send(request).await
    }

    async fn init_error(&self, cause: RuntimeError) -> LoopError {
        let url = self.endpoints.init_error();
        self.report(url, ErrorClass::Initialization, cause).await
    }

    async fn invocation_error(&self, context: &InvocationContext, cause: RuntimeError) -> LoopError {
        let url = self.endpoints.invocation_error(&context.request_id);
        let class = ErrorClass::Invocation {
            request_id: context.request_id.clone(),
        };
        self.report(url, class, cause).await
    }

    /// Post `cause` to `url`. A failed post is logged and attached to the
    /// returned error, never substituted for the cause.
    async fn report(&self, url: String, class: ErrorClass, cause: RuntimeError) -> LoopError {
        error!(
            class = ?class,
            error_type = %cause.error_type,
            error = %cause.error_message,
            "Reporting runtime error"
        );

        let report_failure = self.post_error(&url, &cause).await.err();
        if let Some(e) = &report_failure {
            warn!(url = %url, error = %e, "Failed to report error to the control plane");
        }

        LoopError::new(class, cause, report_failure)
    }

    async fn post_error(&self, url: &str, cause: &RuntimeError) -> Result<(), TransportError> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(url)
            .header(headers::FUNCTION_ERROR_TYPE, cause.error_type.as_str())
            .header(CONTENT_TYPE, "application/json")
            .body(Bytes::from(cause.to_json()))?;

        let response = self.transport.send(request).await?;

        if !response.status.is_success() {
            warn!(url = %url, status = %response.status, "Control plane rejected error report");
        }

        Ok(())
    }
}

fn send_response_error(e: TransportError) -> RuntimeError {
    RuntimeError::new(format!("failed to send response data: {e}"), SEND_RESPONSE_ERROR)
}

/// Expose the X-Ray header to anything the handler spawns
fn propagate_trace_id(header_map: &HeaderMap) {
    let trace_id = header_map
        .get(headers::TRACE_ID)
        .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
        .unwrap_or_default();
    std::env::set_var(TRACE_ID_VAR, trace_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forever_is_never_exhausted() {
        assert!(!LoopBound::Forever.is_exhausted(u64::MAX));
    }

    #[test]
    fn test_iterations_bound() {
        assert!(!LoopBound::Iterations(2).is_exhausted(1));
        assert!(LoopBound::Iterations(2).is_exhausted(2));
        assert!(LoopBound::Iterations(0).is_exhausted(1));
    }
}
