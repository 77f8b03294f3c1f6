//! Echo client: drives one connection through a fixed number of round-trips.

use bytes::{Bytes, BytesMut};
use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Byte value every client sends.
pub const PAYLOAD_BYTE: u8 = b'a';

/// Build the payload written on every round-trip.
pub fn payload(message_size: usize) -> Bytes {
    Bytes::from(vec![PAYLOAD_BYTE; message_size])
}

/// Bytes moved by a single client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Perform `iterations` cycles of write payload, flush, read a reply of the
/// same length.
///
/// With `verify` set, a reply that differs from the payload is an error.
pub async fn run_client<R, W>(
    mut reader: R,
    mut writer: W,
    iterations: u64,
    payload: Bytes,
    verify: bool,
) -> Result<ClientStats, ClientError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reply = BytesMut::zeroed(payload.len());
    let mut stats = ClientStats::default();

    for iteration in 0..iterations {
        writer.write_all(&payload).await?;
        writer.flush().await?;
        stats.bytes_sent += payload.len() as u64;

        reader.read_exact(&mut reply[..]).await?;
        stats.bytes_received += reply.len() as u64;

        if verify && reply[..] != payload[..] {
            return Err(ClientError::Mismatch {
                iteration,
                expected: payload,
                received: reply.freeze(),
            });
        }
    }

    Ok(stats)
}

/// Client task errors
#[derive(Debug)]
pub enum ClientError {
    Io(io::Error),
    Mismatch {
        iteration: u64,
        expected: Bytes,
        received: Bytes,
    },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Io(e) => write!(f, "I/O error: {}", e),
            ClientError::Mismatch {
                iteration,
                expected,
                received,
            } => write!(
                f,
                "echo mismatch on iteration {}: sent {:?}, received {:?}",
                iteration, expected, received
            ),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Io(e) => Some(e),
            ClientError::Mismatch { .. } => None,
        }
    }
}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self {
        ClientError::Io(e)
    }
}
