//! Wire format for message framing.
//!
//! Each message is a single line of JSON terminated by `\n`.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::{ProtocolErrorKind, TrackingError};

/// Maximum frame size (1 MB by default, can be overridden).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1_048_576;

/// Read one newline-terminated frame.
///
/// Blank lines are skipped. A final frame without a trailing newline is
/// accepted. Returns `ConnectionClosed` on a clean EOF.
pub async fn read_frame<R>(reader: &mut R, max_size: usize) -> Result<Vec<u8>, TrackingError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut buf = Vec::new();
        // One extra byte for the terminator, one more to detect overflow
        let limit = max_size as u64 + 2;
        let read = (&mut *reader)
            .take(limit)
            .read_until(b'\n', &mut buf)
            .await?;

        if read == 0 {
            return Err(TrackingError::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed,
            });
        }

        let terminated = buf.last() == Some(&b'\n');
        if terminated {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }

        if buf.len() > max_size {
            return Err(TrackingError::Protocol {
                kind: ProtocolErrorKind::MessageTooLarge { max: max_size },
            });
        }

        if buf.iter().all(|b| b.is_ascii_whitespace()) {
            continue;
        }

        return Ok(buf);
    }
}

/// Write one frame followed by a newline.
pub async fn write_frame<W>(writer: &mut W, data: &[u8]) -> Result<(), TrackingError>
where
    W: AsyncWrite + Unpin,
{
    if data.contains(&b'\n') {
        return Err(TrackingError::Protocol {
            kind: ProtocolErrorKind::InvalidMessageFormat {
                message: "frame payload contains a newline".to_string(),
            },
        });
    }
    writer.write_all(data).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Read a frame with a timeout.
pub async fn read_frame_with_timeout<R>(
    reader: &mut R,
    max_size: usize,
    timeout_duration: Duration,
) -> Result<Vec<u8>, TrackingError>
where
    R: AsyncBufRead + Unpin,
{
    timeout(timeout_duration, read_frame(reader, max_size))
        .await
        .map_err(|_| TrackingError::Protocol {
            kind: ProtocolErrorKind::ConnectionTimeout,
        })?
}

/// Write a frame with a timeout.
pub async fn write_frame_with_timeout<W>(
    writer: &mut W,
    data: &[u8],
    timeout_duration: Duration,
) -> Result<(), TrackingError>
where
    W: AsyncWrite + Unpin,
{
    timeout(timeout_duration, write_frame(writer, data))
        .await
        .map_err(|_| TrackingError::Protocol {
            kind: ProtocolErrorKind::ConnectionTimeout,
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_write_then_read_frames() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, br#"{"a":1}"#).await.unwrap();
        write_frame(&mut buffer, br#"{"b":2}"#).await.unwrap();
        assert_eq!(buffer, b"{\"a\":1}\n{\"b\":2}\n");

        let mut reader = BufReader::new(Cursor::new(buffer));
        let first = read_frame(&mut reader, DEFAULT_MAX_FRAME_SIZE).await.unwrap();
        let second = read_frame(&mut reader, DEFAULT_MAX_FRAME_SIZE).await.unwrap();
        assert_eq!(first, br#"{"a":1}"#);
        assert_eq!(second, br#"{"b":2}"#);

        let eof = read_frame(&mut reader, DEFAULT_MAX_FRAME_SIZE).await;
        assert!(matches!(
            eof,
            Err(TrackingError::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed
            })
        ));
    }

    #[tokio::test]
    async fn test_blank_lines_and_crlf() {
        let mut reader = BufReader::new(Cursor::new(b"\n\r\n{}\r\n".to_vec()));
        let frame = read_frame(&mut reader, DEFAULT_MAX_FRAME_SIZE).await.unwrap();
        assert_eq!(frame, b"{}");
    }

    #[tokio::test]
    async fn test_frame_too_large() {
        let mut data = vec![b'x'; 100];
        data.push(b'\n');
        let mut reader = BufReader::new(Cursor::new(data));

        let result = read_frame(&mut reader, 10).await;
        assert!(matches!(
            result,
            Err(TrackingError::Protocol {
                kind: ProtocolErrorKind::MessageTooLarge { max: 10 }
            })
        ));
    }

    #[tokio::test]
    async fn test_write_rejects_embedded_newline() {
        let mut buffer = Vec::new();
        assert!(write_frame(&mut buffer, b"a\nb").await.is_err());
        assert!(buffer.is_empty());
    }
}
