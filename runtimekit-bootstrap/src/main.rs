//! bootstrap - AWS Lambda custom runtime
//!
//! Polls the Runtime API and runs the configured handler program for every
//! event. Deployed as the `bootstrap` executable of a `provided` runtime.

mod config;
mod process;

use std::path::PathBuf;

use clap::Parser;
use runtimekit::{CustomRuntime, HttpTransport, LoopBound, RuntimeEnvironment};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::process::ProcessHandler;

#[derive(Parser, Debug)]
#[command(name = "bootstrap")]
#[command(about = "AWS Lambda custom runtime", long_about = None)]
struct Args {
    /// Runtime API address (host:port)
    #[arg(long, default_value = "", env = "AWS_LAMBDA_RUNTIME_API")]
    runtime_api: String,

    /// Directory containing the function code
    #[arg(long, default_value = "", env = "LAMBDA_TASK_ROOT")]
    task_root: String,

    /// Handler program, relative to the task root
    #[arg(long, default_value = "", env = "_HANDLER")]
    handler: String,

    /// Stop after this many events instead of polling forever
    #[arg(long, env = "RUNTIMEKIT_MAX_INVOCATIONS")]
    max_invocations: Option<u64>,

    /// Configuration file (defaults to runtimekit.toml if present)
    #[arg(long, env = "RUNTIMEKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUNTIMEKIT_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing; stdout is left to the handler program
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("bootstrap={0},runtimekit={0}", args.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load(args.config.as_deref())?;
    let env = RuntimeEnvironment::new(args.runtime_api, args.task_root, args.handler);
    let loop_bound = args
        .max_invocations
        .map_or(LoopBound::Forever, LoopBound::Iterations);

    info!("Starting bootstrap...");
    info!("  Runtime API: {}", env.runtime_api);
    info!("  Handler: {}/{}", env.task_root, env.handler);
    info!("  Loop: {:?}", loop_bound);

    let handler = ProcessHandler::new(config.process);
    let mut runtime =
        CustomRuntime::new(handler, HttpTransport::new(), env).with_loop_bound(loop_bound);

    if let Err(e) = runtime.run().await {
        error!(error = %e, "Runtime terminated");
        return Err(e.into());
    }

    Ok(())
}
