//! Closure-backed handler

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use runtimekit::{Handler, HandlerError, InvocationOutput};
use runtimekit_core::{InvocationContext, RuntimeEnvironment};

type SetupFn = Box<dyn FnMut(&RuntimeEnvironment) -> Result<(), HandlerError> + Send>;
type InvokeFn =
    Box<dyn FnMut(Bytes, &InvocationContext) -> Result<InvocationOutput, HandlerError> + Send>;

/// Record of the lifecycle calls a [`FnHandler`] received
#[derive(Debug, Default)]
pub struct HandlerCalls {
    setup: AtomicUsize,
    cleanup: AtomicUsize,
    contexts: Mutex<Vec<InvocationContext>>,
    events: Mutex<Vec<Bytes>>,
}

impl HandlerCalls {
    pub fn setups(&self) -> usize {
        self.setup.load(Ordering::SeqCst)
    }

    pub fn invocations(&self) -> usize {
        self.contexts.lock().len()
    }

    pub fn cleanups(&self) -> usize {
        self.cleanup.load(Ordering::SeqCst)
    }

    /// Contexts passed to `invoke`, in order
    pub fn contexts(&self) -> Vec<InvocationContext> {
        self.contexts.lock().clone()
    }

    pub fn events(&self) -> Vec<Bytes> {
        self.events.lock().clone()
    }
}

/// Handler whose `setup` and `invoke` are closures
pub struct FnHandler {
    setup: SetupFn,
    invoke: InvokeFn,
    calls: Arc<HandlerCalls>,
}

impl FnHandler {
    pub fn new<F>(invoke: F) -> Self
    where
        F: FnMut(Bytes, &InvocationContext) -> Result<InvocationOutput, HandlerError> + Send + 'static,
    {
        Self {
            setup: Box::new(|_| Ok(())),
            invoke: Box::new(invoke),
            calls: Arc::default(),
        }
    }

    #[must_use]
    pub fn with_setup<F>(mut self, setup: F) -> Self
    where
        F: FnMut(&RuntimeEnvironment) -> Result<(), HandlerError> + Send + 'static,
    {
        self.setup = Box::new(setup);
        self
    }

    /// Shared call record, usable after the handler moved into a runtime
    pub fn calls(&self) -> Arc<HandlerCalls> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Handler for FnHandler {
    async fn setup(&mut self, env: &RuntimeEnvironment) -> Result<(), HandlerError> {
        self.calls.setup.fetch_add(1, Ordering::SeqCst);
        (self.setup)(env)
    }

    async fn invoke(
        &mut self,
        event: Bytes,
        context: &InvocationContext,
    ) -> Result<InvocationOutput, HandlerError> {
        self.calls.contexts.lock().push(context.clone());
        self.calls.events.lock().push(event.clone());
        (self.invoke)(event, context)
    }

    async fn cleanup(&mut self, _env: &RuntimeEnvironment) {
        self.calls.cleanup.fetch_add(1, Ordering::SeqCst);
    }
}
