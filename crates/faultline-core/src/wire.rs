//! Wire protocol between driver and agent
//!
//! One TCP stream per host carries length-prefixed bincode frames: a `u32`
//! little-endian payload length followed by the payload. The exchange is
//! strictly request/ack:
//!
//! ```text
//! agent  -> driver  Ready { protocol_version }
//! driver -> agent   Fault(..)            agent -> driver  Ack | Failed { .. }
//! ...                                    agent -> driver  Ping (while idle)
//! driver            shutdown(write)      agent -> driver  Closed { unwind_error }
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::{FaultError, RemoteError};
use crate::fault::Fault;

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Bumped whenever a frame layout changes
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest payload accepted from the wire
pub const MAX_FRAME_LEN: usize = 1 << 20;

const HEADER_LEN: usize = 4;

// ----------------------------------------------------------------------------
// Frames
// ----------------------------------------------------------------------------

/// Frames sent from the driver to an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverFrame {
    /// Apply one fault and acknowledge it
    Fault(Fault),
}

/// Frames sent from an agent to the driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentFrame {
    /// First frame on every stream
    Ready { protocol_version: u32 },
    /// The last fault was applied and its reversal recorded
    Ack,
    /// Keepalive while waiting for the next request
    Ping,
    /// The last fault was rejected or failed; no more faults are accepted
    Failed { error: RemoteError },
    /// Final frame: every recorded reversal has been executed
    Closed { unwind_error: Option<RemoteError> },
}

// ----------------------------------------------------------------------------
// Codec
// ----------------------------------------------------------------------------

/// Serialize a frame with its length prefix
pub fn encode_frame<T: Serialize>(frame: &T) -> Result<Vec<u8>, FaultError> {
    let payload = bincode::serialize(frame)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(FaultError::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode one frame from the front of `data`.
///
/// Returns the frame and the number of bytes it occupied, or `None` when
/// `data` does not yet hold a complete frame.
pub fn decode_frame<T: DeserializeOwned>(data: &[u8]) -> Result<Option<(T, usize)>, FaultError> {
    if data.len() < HEADER_LEN {
        return Ok(None);
    }

    let len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if len > MAX_FRAME_LEN {
        return Err(FaultError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_LEN,
        });
    }
    if data.len() < HEADER_LEN + len {
        return Ok(None);
    }

    let frame = bincode::deserialize(&data[HEADER_LEN..HEADER_LEN + len])?;
    Ok(Some((frame, HEADER_LEN + len)))
}

/// Write one frame and flush it
pub async fn write_frame<W, T>(writer: &mut W, frame: &T) -> Result<(), FaultError>
where
    W: AsyncWrite + Unpin + ?Sized,
    T: Serialize,
{
    let bytes = encode_frame(frame)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

// ----------------------------------------------------------------------------
// Frame Reader
// ----------------------------------------------------------------------------

/// Buffered frame reader.
///
/// `next` is cancel-safe: bytes read before a cancellation stay buffered, so
/// it can sit in a `select!` next to a keepalive timer.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(1024),
        }
    }

    /// Read the next frame; `None` on a clean end of stream
    pub async fn next<T: DeserializeOwned>(&mut self) -> Result<Option<T>, FaultError> {
        loop {
            if let Some((frame, used)) = decode_frame(&self.buf)? {
                self.buf.drain(..used);
                return Ok(Some(frame));
            }

            if self.inner.read_buf(&mut self.buf).await? == 0 {
                return if self.buf.is_empty() {
                    Ok(None)
                } else {
                    Err(FaultError::TruncatedFrame {
                        buffered: self.buf.len(),
                    })
                };
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::fault::{Partition, PartitionMode};

    #[test]
    fn test_decode_needs_whole_frame() {
        let bytes = encode_frame(&AgentFrame::Ack).unwrap();

        assert!(decode_frame::<AgentFrame>(&bytes[..2]).unwrap().is_none());
        assert!(decode_frame::<AgentFrame>(&bytes[..bytes.len() - 1])
            .unwrap()
            .is_none());

        let (frame, used) = decode_frame::<AgentFrame>(&bytes).unwrap().unwrap();
        assert_eq!(frame, AgentFrame::Ack);
        assert_eq!(used, bytes.len());
    }

    #[test]
    fn test_oversized_length_rejected() {
        let mut bytes = ((MAX_FRAME_LEN + 1) as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0; 8]);

        match decode_frame::<AgentFrame>(&bytes) {
            Err(FaultError::FrameTooLarge { size, .. }) => assert_eq!(size, MAX_FRAME_LEN + 1),
            other => panic!("expected FrameTooLarge, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reader_splits_back_to_back_frames() {
        let (mut client, server) = tokio::io::duplex(4096);
        let fault = Fault::from(Partition::new("4", "10.0.0.9", PartitionMode::Drop));

        write_frame(&mut client, &DriverFrame::Fault(fault.clone())).await.unwrap();
        write_frame(&mut client, &DriverFrame::Fault(fault.clone())).await.unwrap();
        drop(client);

        let mut reader = FrameReader::new(server);
        assert_eq!(
            reader.next::<DriverFrame>().await.unwrap(),
            Some(DriverFrame::Fault(fault.clone()))
        );
        assert_eq!(
            reader.next::<DriverFrame>().await.unwrap(),
            Some(DriverFrame::Fault(fault))
        );
        assert_eq!(reader.next::<DriverFrame>().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reader_reports_truncation() {
        let (mut client, server) = tokio::io::duplex(4096);
        let bytes = encode_frame(&AgentFrame::Closed {
            unwind_error: Some(RemoteError {
                kind: ErrorKind::Unwind,
                message: "1 of 1 reversals failed".to_string(),
            }),
        })
        .unwrap();

        client.write_all(&bytes[..bytes.len() - 3]).await.unwrap();
        drop(client);

        let mut reader = FrameReader::new(server);
        let err = reader.next::<AgentFrame>().await.unwrap_err();
        assert!(matches!(err, FaultError::TruncatedFrame { .. }));
        assert!(err.is_transport());
    }
}
