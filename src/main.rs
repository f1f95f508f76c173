use clap::Parser;
use mijia_exporter::app::{self, Options};
use std::panic::{self, PanicHookInfo};
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .init();
}

/// Flip `shutdown` on the first SIGINT or SIGTERM.
async fn wait_for_signal(mut interrupt: Signal, mut terminate: Signal, shutdown: watch::Sender<bool>) {
    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
    };
    info!(signal = name, "terminating");
    shutdown.send_replace(true);
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set up panic hook to ensure clean exit codes for process managers
    // (e.g., systemd) that monitor exit status
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    let options = Options::parse();
    init_logging(options.verbose);

    let signals = signal(SignalKind::interrupt()).and_then(|interrupt| {
        signal(SignalKind::terminate()).map(|terminate| (interrupt, terminate))
    });
    let (interrupt, terminate) = match signals {
        Ok(signals) => signals,
        Err(why) => {
            error!("cannot install signal handlers: {why}");
            std::process::exit(EXIT_ERROR);
        }
    };

    let (shutdown_tx, shutdown) = watch::channel(false);
    let signals = tokio::spawn(wait_for_signal(interrupt, terminate, shutdown_tx));

    let result = app::run(options, shutdown).await;
    signals.abort();

    match result {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(why) => {
            error!("{why}");
            std::process::exit(EXIT_ERROR);
        }
    }
}
