//! Shared plumbing for the rftp upload tool: tokio runtime bootstrap,
//! tracing setup, output configuration and upload progress accounting.

pub mod config;
pub mod progress;

pub use config::{OutputConfig, RuntimeConfig};

use anyhow::Context;

fn init_tracing(output: &OutputConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(output.level_directive()));
    let ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());
    // logs go to stderr so the terminal report on stdout stays parseable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_runtime(runtime: &RuntimeConfig) -> anyhow::Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    builder.build().context("failed to start the tokio runtime")
}

/// Sets up tracing and the tokio runtime, then drives the task future to
/// completion.
///
/// Returns the task's result on success. On failure the error is reported
/// via `tracing::error!` (unless quiet) and `None` is returned; the caller
/// decides the exit code.
pub fn run<F, Fut, R, E>(output: OutputConfig, runtime: RuntimeConfig, func: F) -> Option<R>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<R, E>>,
    E: std::fmt::Display,
{
    init_tracing(&output);
    let tokio_runtime = match build_runtime(&runtime) {
        Ok(tokio_runtime) => tokio_runtime,
        Err(error) => {
            if !output.quiet {
                tracing::error!("{:#}", error);
            }
            return None;
        }
    };
    match tokio_runtime.block_on(func()) {
        Ok(result) => Some(result),
        Err(error) => {
            if !output.quiet {
                tracing::error!("{}", error);
            }
            None
        }
    }
}
