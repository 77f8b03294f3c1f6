//! echo-bench: loopback TCP echo round-trip benchmark
//!
//! Starts an echo server and a fleet of clients on one single-threaded
//! event loop, times a fixed number of small round-trips per connection and
//! prints the timing report to stdout.
//!
//! Modes:
//! - `echo`: TCP echo round-trips (default: 100 clients x 500 one-byte messages)
//! - `switch`: raw task hand-offs between two tasks
//!
//! Configuration via CLI arguments or TOML file. Logs go to stderr.

mod bench;
mod client;
mod config;
mod error;
mod server;
mod switch;
mod timer;

use bench::BenchConfig;
use config::{BenchMode, Config};
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!(
        mode = ?config.mode,
        listen = %config.listen,
        clients = config.clients,
        iterations = config.iterations,
        message_size = config.message_size,
        verify = config.verify,
        "Starting echo-bench"
    );

    // Server, clients and accept loop all share this one thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match config.mode {
        BenchMode::Echo => run_echo(&runtime, &config),
        BenchMode::Switch => run_switch(&runtime, &config),
    }
}

/// Run the TCP echo benchmark
fn run_echo(runtime: &Runtime, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let bench_config = BenchConfig::from(config);
    let mut stdout = std::io::stdout();
    let outcome = runtime.block_on(bench::run(&bench_config, &mut stdout))?;

    info!(
        addr = %outcome.addr,
        bytes_sent = outcome.clients.bytes_sent,
        bytes_received = outcome.clients.bytes_received,
        bytes_echoed = outcome.server.bytes_echoed,
        handlers_failed = outcome.server.failed,
        per_iteration_ns = outcome.report.per_iteration_ns,
        "Echo benchmark finished"
    );
    Ok(())
}

/// Run the task switching benchmark
fn run_switch(runtime: &Runtime, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    let outcome = runtime.block_on(switch::run(config.switch_iterations, &mut stdout))?;

    info!(
        handoffs = outcome.handoffs,
        per_switch_ns = outcome.report.per_iteration_ns,
        "Switch benchmark finished"
    );
    Ok(())
}
