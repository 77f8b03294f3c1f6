//! Echo benchmark orchestration.
//!
//! The run is strictly linear: bind and start the server, open every client
//! connection, start the timer, drive all clients concurrently, report, and
//! shut the server down. Any failure aborts the run.

use crate::client::{self, run_client, ClientStats};
use crate::config::Config;
use crate::error::BenchError;
use crate::server::{EchoServer, ServerSummary};
use crate::timer::{Report, TimeMeasure};
use std::io::Write;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Parameters of one echo benchmark run.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub listen: SocketAddr,
    pub backlog: i32,
    pub iterations: u64,
    pub clients: usize,
    pub message_size: usize,
    pub verify: bool,
}

impl From<&Config> for BenchConfig {
    fn from(config: &Config) -> Self {
        BenchConfig {
            listen: config.listen,
            backlog: config.backlog,
            iterations: config.iterations,
            clients: config.clients,
            message_size: config.message_size,
            verify: config.verify,
        }
    }
}

/// Everything observed during a completed run.
#[derive(Debug)]
pub struct BenchOutcome {
    /// Address the server actually bound
    pub addr: SocketAddr,
    pub report: Report,
    /// Sum over all clients
    pub clients: ClientStats,
    /// Server counters after shutdown
    pub server: ServerSummary,
}

/// Run the echo benchmark, writing the report to `out`.
pub async fn run<W: Write>(config: &BenchConfig, out: &mut W) -> Result<BenchOutcome, BenchError> {
    let total_iterations = config
        .iterations
        .checked_mul(config.clients as u64)
        .ok_or(BenchError::IterationOverflow)?;

    let server = EchoServer::bind(
        config.listen,
        config.backlog,
        config.iterations,
        config.message_size,
    )
    .map_err(|e| BenchError::Bind(config.listen, e))?
    .spawn();
    let addr = server.local_addr();

    let mut readers = Vec::with_capacity(config.clients);
    let mut writers = Vec::with_capacity(config.clients);
    for index in 0..config.clients {
        let stream = connect(addr)
            .await
            .map_err(|source| BenchError::Connect {
                index,
                addr,
                source,
            })?;
        let (reader, writer) = stream.into_split();
        readers.push(reader);
        writers.push(writer);
    }
    info!(
        clients = config.clients,
        iterations = config.iterations,
        message_size = config.message_size,
        "Connections open, starting measurement"
    );

    let measure = TimeMeasure::start();

    let payload = client::payload(config.message_size);
    let tasks: Vec<_> = readers
        .into_iter()
        .zip(writers)
        .map(|(reader, writer)| {
            tokio::spawn(run_client(
                reader,
                writer,
                config.iterations,
                payload.clone(),
                config.verify,
            ))
        })
        .collect();

    let mut totals = ClientStats::default();
    for (index, task) in tasks.into_iter().enumerate() {
        let stats = task
            .await
            .map_err(|source| BenchError::Join { index, source })?
            .map_err(|source| BenchError::Client { index, source })?;
        totals.bytes_sent += stats.bytes_sent;
        totals.bytes_received += stats.bytes_received;
    }

    let report = measure.finish(total_iterations)?;
    emit(&report, out)?;

    let server = server.shutdown().await.map_err(BenchError::Shutdown)?;
    debug!(
        accepted = server.accepted,
        completed = server.completed,
        failed = server.failed,
        "Server stopped"
    );

    Ok(BenchOutcome {
        addr,
        report,
        clients: totals,
        server,
    })
}

async fn connect(addr: SocketAddr) -> std::io::Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Write a report and flush so it is visible before shutdown work starts.
pub(crate) fn emit<W: Write>(report: &Report, out: &mut W) -> Result<(), BenchError> {
    write!(out, "{}", report)
        .and_then(|_| out.flush())
        .map_err(BenchError::Output)
}
