//! Length-prefixed frame I/O.
//!
//! Frame on the wire: a 4-byte big-endian unsigned length `n`, followed by
//! `n` bytes of JSON-encoded [`super::Envelope`]. `n` larger than
//! [`super::MAX_FRAME_BYTES`] closes the connection rather than being read.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{Envelope, MAX_FRAME_BYTES};

#[derive(Debug)]
pub enum FrameError {
    /// The underlying socket returned an I/O error (includes clean EOF,
    /// reported as `UnexpectedEof`).
    Io(std::io::Error),
    /// The declared frame length exceeded [`MAX_FRAME_BYTES`].
    TooLarge(u32),
    /// The payload did not decode as a valid [`Envelope`].
    Decode(serde_json::Error),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::Io(e) => write!(f, "transport error: {e}"),
            FrameError::TooLarge(n) => {
                write!(f, "frame of {n} bytes exceeds max_frame_bytes={MAX_FRAME_BYTES}")
            }
            FrameError::Decode(e) => write!(f, "undecodable envelope: {e}"),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<std::io::Error> for FrameError {
    fn from(e: std::io::Error) -> Self {
        FrameError::Io(e)
    }
}

/// Reads one frame from `reader` and decodes it as an [`Envelope`].
///
/// A declared length greater than [`MAX_FRAME_BYTES`] is a protocol
/// violation: the caller should close the connection rather than attempt
/// to keep reading from it.
pub async fn read_frame<R>(reader: &mut R) -> Result<Envelope, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(FrameError::TooLarge(len));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;

    serde_json::from_slice(&payload).map_err(FrameError::Decode)
}

/// Encodes `env` and writes it as one frame to `writer`. Does not flush;
/// callers that need the bytes to reach the peer immediately should flush
/// afterwards.
pub async fn write_frame<W>(writer: &mut W, env: &Envelope) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(env).expect("Envelope is always JSON-serializable");
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge(u32::MAX))?;
    if len > MAX_FRAME_BYTES {
        return Err(FrameError::TooLarge(len));
    }
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    Ok(())
}
