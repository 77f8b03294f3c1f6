//! Task switching benchmark.
//!
//! Two tasks on the same event loop take turns: the driver hands a token to
//! the peer and waits for it to come back. Each round trip is two switches.

use crate::bench::emit;
use crate::error::BenchError;
use crate::timer::{Report, TimeMeasure};
use std::io::Write;
use tokio::sync::mpsc;
use tracing::debug;

/// Result of a switch benchmark run.
#[derive(Debug)]
pub struct SwitchOutcome {
    pub report: Report,
    /// Tokens the peer received
    pub handoffs: u64,
}

/// Run `iterations` round trips between two tasks, writing the report to `out`.
pub async fn run<W: Write>(iterations: u64, out: &mut W) -> Result<SwitchOutcome, BenchError> {
    let switches = iterations
        .checked_mul(2)
        .ok_or(BenchError::IterationOverflow)?;

    let (ping_tx, mut ping_rx) = mpsc::channel::<()>(1);
    let (pong_tx, mut pong_rx) = mpsc::channel::<()>(1);

    let peer = tokio::spawn(async move {
        let mut handoffs = 0u64;
        while ping_rx.recv().await.is_some() {
            handoffs += 1;
            if pong_tx.send(()).await.is_err() {
                break;
            }
        }
        handoffs
    });

    let measure = TimeMeasure::start();
    for _ in 0..iterations {
        ping_tx
            .send(())
            .await
            .map_err(|_| BenchError::SwitchPeerGone)?;
        pong_rx.recv().await.ok_or(BenchError::SwitchPeerGone)?;
    }
    let report = measure.finish(switches)?;
    emit(&report, out)?;

    // Closing the channel ends the peer loop
    drop(ping_tx);
    let handoffs = peer.await.map_err(BenchError::SwitchPeer)?;
    debug!(handoffs, "Switch peer finished");

    Ok(SwitchOutcome { report, handoffs })
}
