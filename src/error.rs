//! Benchmark run errors.
//!
//! Every failure aborts the whole run; there is no partial report.

use crate::client::ClientError;
use crate::timer::TimerError;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use tokio::task::JoinError;

#[derive(Debug)]
pub enum BenchError {
    /// Listener could not be bound
    Bind(SocketAddr, io::Error),
    /// Opening client connection `index` failed
    Connect {
        index: usize,
        addr: SocketAddr,
        source: io::Error,
    },
    /// Client task `index` returned an error
    Client { index: usize, source: ClientError },
    /// Task `index` panicked or was cancelled
    Join { index: usize, source: JoinError },
    /// The switch benchmark peer went away before all hand-offs completed
    SwitchPeerGone,
    /// The switch benchmark peer panicked or was cancelled
    SwitchPeer(JoinError),
    /// Total iteration count does not fit in a `u64`
    IterationOverflow,
    /// Report could not be derived from the measurement
    Timer(TimerError),
    /// Writing the report failed
    Output(io::Error),
    /// Server accept loop could not be joined
    Shutdown(JoinError),
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchError::Bind(addr, e) => write!(f, "Failed to bind '{}': {}", addr, e),
            BenchError::Connect {
                index,
                addr,
                source,
            } => write!(
                f,
                "Failed to open connection {} to '{}': {}",
                index, addr, source
            ),
            BenchError::Client { index, source } => {
                write!(f, "Client {} failed: {}", index, source)
            }
            BenchError::Join { index, source } => {
                write!(f, "Task {} did not complete: {}", index, source)
            }
            BenchError::SwitchPeerGone => {
                write!(f, "Switch peer stopped before all hand-offs completed")
            }
            BenchError::SwitchPeer(e) => write!(f, "Switch peer did not complete: {}", e),
            BenchError::IterationOverflow => {
                write!(f, "Total iteration count overflows a 64-bit counter")
            }
            BenchError::Timer(e) => write!(f, "Failed to compute report: {}", e),
            BenchError::Output(e) => write!(f, "Failed to write report: {}", e),
            BenchError::Shutdown(e) => write!(f, "Failed to shut down server: {}", e),
        }
    }
}

impl std::error::Error for BenchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BenchError::Bind(_, e) => Some(e),
            BenchError::Connect { source, .. } => Some(source),
            BenchError::Client { source, .. } => Some(source),
            BenchError::Join { source, .. } => Some(source),
            BenchError::SwitchPeerGone => None,
            BenchError::SwitchPeer(e) => Some(e),
            BenchError::IterationOverflow => None,
            BenchError::Timer(e) => Some(e),
            BenchError::Output(e) => Some(e),
            BenchError::Shutdown(e) => Some(e),
        }
    }
}

impl From<TimerError> for BenchError {
    fn from(e: TimerError) -> Self {
        BenchError::Timer(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_and_source() {
        let addr: SocketAddr = "127.0.0.1:5530".parse().unwrap();
        let err = BenchError::Bind(
            addr,
            io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        );
        assert_eq!(
            err.to_string(),
            "Failed to bind '127.0.0.1:5530': address in use"
        );
        assert!(err.source().is_some());

        let err = BenchError::Client {
            index: 7,
            source: ClientError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "eof")),
        };
        assert_eq!(err.to_string(), "Client 7 failed: I/O error: eof");
    }

    #[tokio::test]
    async fn test_switch_peer_error_names_no_client() {
        let source = tokio::spawn(async {
            panic!("peer exploded");
        })
            .await
            .unwrap_err();
        let err = BenchError::SwitchPeer(source);

        let message = err.to_string();
        assert!(message.starts_with("Switch peer did not complete"));
        assert!(!message.contains("Task 0"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_timer_error_conversion() {
        let err: BenchError = TimerError::DivisionByZero.into();
        assert!(matches!(err, BenchError::Timer(TimerError::DivisionByZero)));
    }
}
