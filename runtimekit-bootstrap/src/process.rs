//! Handler that runs a program from the task root for every event
//!
//! The event is written to the program's stdin and its stdout, byte for
//! byte, becomes the response. The program inherits the runtime's environment, so it sees
//! `_X_AMZN_TRACE_ID` along with the per-event `LAMBDA_RUNTIME_*` variables.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use runtimekit::{
    Handler, HandlerError, InvocationContext, InvocationOutput, RuntimeEnvironment, RuntimeError,
};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ProcessConfig;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("handler not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("handler exited with {}", exit_description(.code))]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_description(code: &Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_string(), |code| format!("status {code}"))
}

impl From<ProcessError> for RuntimeError {
    fn from(err: ProcessError) -> Self {
        let error_type = match &err {
            ProcessError::NotFound(_) => "Setup.HandlerNotFound",
            ProcessError::Spawn { .. } => "Handler.SpawnFailed",
            ProcessError::NonZeroExit { .. } => "Handler.NonZeroExit",
            ProcessError::Io(_) => "Handler.Io",
        };
        let runtime_error = RuntimeError::new(err.to_string(), error_type);

        match err {
            ProcessError::NonZeroExit { stderr, .. } => runtime_error.with_stack_trace(stderr.lines()),
            _ => runtime_error,
        }
    }
}

fn handler_error(err: ProcessError) -> HandlerError {
    Box::new(RuntimeError::from(err))
}

/// Runs `$LAMBDA_TASK_ROOT/$_HANDLER` once per event
pub struct ProcessHandler {
    config: ProcessConfig,
    program: Option<PathBuf>,
}

impl ProcessHandler {
    pub fn new(config: ProcessConfig) -> Self {
        Self {
            config,
            program: None,
        }
    }

    fn resolve(env: &RuntimeEnvironment) -> PathBuf {
        Path::new(&env.task_root).join(&env.handler)
    }

    fn command(&self, program: &Path, context: &InvocationContext) -> Command {
        let mut command = match &self.config.interpreter {
            Some(interpreter) => {
                let mut command = Command::new(interpreter);
                command.arg(program);
                command
            }
            None => Command::new(program),
        };

        command
            .args(&self.config.args)
            .env("LAMBDA_RUNTIME_AWS_REQUEST_ID", &context.request_id)
            .env("LAMBDA_RUNTIME_DEADLINE_MS", &context.deadline_ms)
            .env("LAMBDA_RUNTIME_INVOKED_FUNCTION_ARN", &context.invoked_function_arn)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if !context.env.task_root.is_empty() {
            command.current_dir(&context.env.task_root);
        }

        command
    }

    async fn run(&self, event: Bytes, context: &InvocationContext) -> Result<Vec<u8>, ProcessError> {
        let program = self
            .program
            .clone()
            .unwrap_or_else(|| Self::resolve(&context.env));

        let mut child = self
            .command(&program, context)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.display().to_string(),
                source,
            })?;

        let stdin = child.stdin.take();
        let write_event = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(&event).await {
                // The program may exit without reading its input.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                result => result,
            }
        };

        let ((), output) = tokio::try_join!(write_event, child.wait_with_output())?;

        if !output.status.success() {
            return Err(ProcessError::NonZeroExit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl Handler for ProcessHandler {
    async fn setup(&mut self, env: &RuntimeEnvironment) -> Result<(), HandlerError> {
        let program = Self::resolve(env);
        if !program.is_file() {
            return Err(handler_error(ProcessError::NotFound(program)));
        }
        // The stored program path is absolute; PATH is never searched.
        let program = match tokio::fs::canonicalize(&program).await {
            Ok(canonical) => canonical,
            Err(_) => return Err(handler_error(ProcessError::NotFound(program))),
        };

        info!(program = %program.display(), "Handler program resolved");
        self.program = Some(program);
        Ok(())
    }

    async fn invoke(
        &mut self,
        event: Bytes,
        context: &InvocationContext,
    ) -> Result<InvocationOutput, HandlerError> {
        let stdout = self.run(event, context).await.map_err(handler_error)?;
        debug!(request_id = %context.request_id, bytes = stdout.len(), "Handler program finished");
        Ok(InvocationOutput::from(stdout))
    }

    async fn cleanup(&mut self, env: &RuntimeEnvironment) {
        info!(handler = %env.handler, "Handler cleaned up");
        self.program = None;
    }
}
