//! Wire protocol between agent and master
//!
//! Every frame is a 4-byte big-endian body length followed by a MessagePack
//! body. The agent sends `Register` once after connecting; the master then
//! pushes `Event` frames. The agent may send an `Event` back as the answer to
//! a request/response style event.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::events::Event;

/// Largest body accepted on the wire
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// One message on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    /// Agent introduces itself with its role tag
    Register { identity: String },
    /// Event pushed by the master, or an answer from the agent
    Event(Event),
}

impl Frame {
    /// Short name for log lines
    pub fn name(&self) -> &'static str {
        match self {
            Frame::Register { .. } => "register",
            Frame::Event(_) => "event",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode frame: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("frame of {0} bytes exceeds the size limit")]
    TooLarge(usize),
}

/// Encode a frame including its length prefix
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, ProtocolError> {
    let body = rmp_serde::to_vec(frame)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::TooLarge(body.len()));
    }

    let mut buf = Vec::with_capacity(4 + body.len());
    buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Read the next frame
///
/// Returns `Ok(None)` when the peer closed the stream between frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    // EOF is only a clean close before the first header byte
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("stream closed after {} of 4 header bytes", filled),
            )
            .into());
        }
        filled += n;
    }
    let len = u32::from_be_bytes(header) as usize;

    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::TooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    Ok(Some(rmp_serde::from_slice(&body)?))
}

/// Write one frame and flush it
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_frame(frame)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_read_event_then_eof() {
        let frame = Frame::Event(Event::new(EventKind::SENSOR_DATA, vec![1, 2, 3]));
        let bytes = encode_frame(&frame).unwrap();

        let mut stream = Builder::new().read(&bytes).build();

        assert_eq!(read_frame(&mut stream).await.unwrap(), Some(frame));
        assert!(read_frame(&mut stream).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_split_across_packets() {
        let frame = Frame::Register {
            identity: "datalogger".into(),
        };
        let bytes = encode_frame(&frame).unwrap();
        let (head, tail) = bytes.split_at(3);

        let mut stream = Builder::new().read(head).read(tail).build();

        assert_eq!(read_frame(&mut stream).await.unwrap(), Some(frame));
    }

    #[tokio::test]
    async fn test_oversized_header_rejected() {
        let header = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes();
        let mut stream = Builder::new().read(&header).build();

        let err = read_frame(&mut stream).await.unwrap_err();
        assert!(matches!(err, ProtocolError::TooLarge(len) if len == MAX_FRAME_LEN + 1));
    }

    #[tokio::test]
    async fn test_garbage_body_is_decode_error() {
        let mut bytes = 2u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0xc1, 0xc1]);
        let mut stream = Builder::new().read(&bytes).build();

        let err = read_frame(&mut stream).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[tokio::test]
    async fn test_truncated_body_is_io_error() {
        let frame = Frame::Event(Event::new(EventKind::SENSOR_DATA, vec![9; 16]));
        let bytes = encode_frame(&frame).unwrap();
        let mut stream = Builder::new().read(&bytes[..bytes.len() - 4]).build();

        let err = read_frame(&mut stream).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Io(_)));
    }

    #[tokio::test]
    async fn test_truncated_header_is_io_error() {
        let mut stream = Builder::new().read(&[0, 0]).build();

        let err = read_frame(&mut stream).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Io(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_header_split_byte_by_byte() {
        let frame = Frame::Event(Event::new(EventKind::SENSOR_DATA, vec![7]));
        let bytes = encode_frame(&frame).unwrap();

        let mut stream = Builder::new()
            .read(&bytes[..1])
            .read(&bytes[1..2])
            .read(&bytes[2..])
            .build();

        assert_eq!(read_frame(&mut stream).await.unwrap(), Some(frame));
    }

    #[tokio::test]
    async fn test_write_frame_prefixes_length() {
        let frame = Frame::Register {
            identity: "datalogger".into(),
        };
        let expected = encode_frame(&frame).unwrap();
        let body_len = u32::from_be_bytes([expected[0], expected[1], expected[2], expected[3]]);
        assert_eq!(body_len as usize, expected.len() - 4);

        let mut stream = Builder::new().write(&expected).build();
        write_frame(&mut stream, &frame).await.unwrap();
    }
}
