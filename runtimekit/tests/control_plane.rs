//! End-to-end tests against a local Runtime API server
//!
//! These tests drive the real reqwest transport through full invocation
//! cycles.

use runtimekit::{CustomRuntime, HttpTransport, InvocationOutput, LoopBound, RuntimeEnvironment, RuntimeError};
use runtimekit_test::{ControlPlane, FnHandler, QueuedEvent};

fn env(control_plane: &ControlPlane) -> RuntimeEnvironment {
    RuntimeEnvironment::new(control_plane.runtime_api(), "/var/task", "function.handler")
}

#[tokio::test]
async fn test_echo_round_trip() {
    let control_plane = ControlPlane::start().await.unwrap();
    let request_id = control_plane.enqueue(QueuedEvent::new(r#"{"key1":"value1"}"#));

    let handler = FnHandler::new(|event, _| Ok(String::from_utf8(event.to_vec())?.into()));
    let mut runtime = CustomRuntime::new(handler, HttpTransport::new(), env(&control_plane))
        .with_loop_bound(LoopBound::Iterations(1));

    runtime.run().await.unwrap();

    let responses = control_plane.responses().await;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].request_id, request_id);
    assert_eq!(responses[0].body, r#"{"key1":"value1"}"#);
    assert!(control_plane.errors().await.is_empty());
}

#[tokio::test]
async fn test_multiple_events_are_processed_in_order() {
    let control_plane = ControlPlane::start().await.unwrap();
    let ids: Vec<String> = (0..3)
        .map(|i| control_plane.enqueue(QueuedEvent::new(format!(r#"{{"n":{i}}}"#))))
        .collect();

    let handler = FnHandler::new(|event, ctx| {
        let value: serde_json::Value = serde_json::from_slice(&event)?;
        Ok(InvocationOutput::json(&serde_json::json!({
            "request": ctx.request_id,
            "n": value["n"],
        }))?)
    });
    let calls = handler.calls();
    let mut runtime = CustomRuntime::new(handler, HttpTransport::new(), env(&control_plane))
        .with_loop_bound(LoopBound::Iterations(3));

    runtime.run().await.unwrap();

    let responses = control_plane.responses().await;
    let seen: Vec<&str> = responses.iter().map(|r| r.request_id.as_str()).collect();
    assert_eq!(seen, ids.iter().map(String::as_str).collect::<Vec<_>>());
    for (i, response) in responses.iter().enumerate() {
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["n"], i);
        assert_eq!(body["request"], ids[i].as_str());
    }
    assert_eq!(calls.cleanups(), 1);
}

#[tokio::test]
async fn test_context_carries_runtime_headers() {
    let control_plane = ControlPlane::start().await.unwrap();
    control_plane.enqueue(
        QueuedEvent::new("{}")
            .with_request_id("ctx-req")
            .with_client_context("client-blob")
            .with_cognito_identity("identity-blob"),
    );

    let handler = FnHandler::new(|_, _| Ok(().into()));
    let calls = handler.calls();
    let mut runtime = CustomRuntime::new(handler, HttpTransport::new(), env(&control_plane))
        .with_loop_bound(LoopBound::Iterations(1));

    runtime.run().await.unwrap();

    let ctx = &calls.contexts()[0];
    assert_eq!(ctx.request_id, "ctx-req");
    assert_eq!(ctx.client_context, "client-blob");
    assert_eq!(ctx.cognito_identity, "identity-blob");
    assert_eq!(
        ctx.invoked_function_arn,
        "arn:aws:lambda:us-east-1:000000000000:function:custom-runtime"
    );
    assert!(ctx.remaining_time_millis().is_some());
    assert_eq!(control_plane.responses().await[0].body, "null");
}

#[tokio::test]
async fn test_handler_error_reaches_control_plane() {
    let control_plane = ControlPlane::start().await.unwrap();
    let request_id = control_plane.enqueue(QueuedEvent::new("{}"));

    let handler = FnHandler::new(|_, _| {
        Err(Box::new(
            RuntimeError::new("division by zero", "Handler.Arithmetic").with_stack_trace(["calc.sh:12"]),
        ))
    });
    let calls = handler.calls();
    let mut runtime = CustomRuntime::new(handler, HttpTransport::new(), env(&control_plane));

    let err = runtime.run().await.unwrap_err();

    assert_eq!(err.to_string(), "division by zero");
    assert!(err.report_failure().is_none());
    let errors = control_plane.errors().await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].request_id.as_deref(), Some(request_id.as_str()));
    assert_eq!(errors[0].error_type.as_deref(), Some("Handler.Arithmetic"));
    let reported = errors[0].runtime_error().unwrap();
    assert_eq!(reported.stack_trace, vec!["calc.sh:12".to_string()]);
    assert!(control_plane.responses().await.is_empty());
    assert_eq!(calls.cleanups(), 0);
}

#[tokio::test]
async fn test_setup_error_reaches_init_endpoint() {
    let control_plane = ControlPlane::start().await.unwrap();

    let handler = FnHandler::new(|_, _| Ok("".into())).with_setup(|env| {
        Err(format!("handler {} not found", env.handler).into())
    });
    let mut runtime = CustomRuntime::new(handler, HttpTransport::new(), env(&control_plane));

    let err = runtime.run().await.unwrap_err();

    assert_eq!(err.to_string(), "handler function.handler not found");
    let init_errors = control_plane.init_errors().await;
    assert_eq!(init_errors.len(), 1);
    assert_eq!(init_errors[0].error_type.as_deref(), Some("Extension.UnknownReason"));
}

#[tokio::test]
async fn test_unreachable_control_plane_fails_poll() {
    // Bind and drop to get a port with nothing listening.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let env = RuntimeEnvironment::new(addr.to_string(), "/var/task", "function.handler");
    let handler = FnHandler::new(|_, _| Ok("".into()));
    let mut runtime = CustomRuntime::new(handler, HttpTransport::new(), env);

    let err = runtime.run().await.unwrap_err();

    assert!(err.is_initialization());
    assert_eq!(err.cause().error_type, "Initialize.GetEvent");
    assert!(err.report_failure().is_some());
}
