mod cli;

use autostack::bootstrap::RunStatus;
use autostack::context::ExecContext;
use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let ctx = ExecContext::background();
    install_interrupt_handler(&ctx);

    match cli::dispatch(cli.global, cli.command, &ctx) {
        Ok(status) => {
            tracing::debug!(?status, "finished");
            ExitCode::from(status.exit_code())
        }
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            if ctx.is_cancelled() {
                ExitCode::from(RunStatus::Cancelled.exit_code())
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// Logs go to stderr. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("autostack={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Ctrl+C and SIGTERM cancel the root context; running engine commands are
/// interrupted at their next poll.
fn install_interrupt_handler(ctx: &ExecContext) {
    let cancelled = ctx.cancel_flag();
    if let Err(e) = ctrlc::set_handler(move || {
        cancelled.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!(error = %e, "failed to install Ctrl+C handler");
    }
}
