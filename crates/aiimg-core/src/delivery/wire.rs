//! Push protocol framing. All integers are big-endian.
//!
//! ```text
//! client   -> receiver: "AIMG" | u8 version | u16 name_len | name | u64 payload_len | payload
//! receiver -> client:   u8 status | u32 msg_len | msg
//! ```
//!
//! Status 0 carries the stored path, status 1 a rejection reason.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAGIC: &[u8; 4] = b"AIMG";
pub const VERSION: u8 = 1;

/// Default receiver limit on a single payload (64 MiB).
pub const DEFAULT_MAX_PAYLOAD: u64 = 64 * 1024 * 1024;

/// Upper bound on a reply message.
pub const MAX_REPLY_LEN: u32 = 64 * 1024;

const MAX_NAME_LEN: usize = 255;
const STATUS_OK: u8 = 0;
const STATUS_REJECTED: u8 = 1;

/// Frame header preceding the payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushHeader {
    pub name: String,
    pub payload_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushReply {
    Stored { path: String },
    Rejected { reason: String },
}

/// Reject names that could escape the receiver's directory.
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("empty file name".to_string());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!("file name longer than {} bytes", MAX_NAME_LEN));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err("file name contains a path separator".to_string());
    }
    if name.contains("..") {
        return Err("file name contains '..'".to_string());
    }
    Ok(())
}

pub async fn write_header<W>(io: &mut W, header: &PushHeader) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let name_len = u16::try_from(header.name.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "file name too long"))?;

    io.write_all(MAGIC).await?;
    io.write_u8(VERSION).await?;
    io.write_u16(name_len).await?;
    io.write_all(header.name.as_bytes()).await?;
    io.write_u64(header.payload_len).await?;
    Ok(())
}

/// Write a complete push frame: header followed by `payload`.
pub async fn write_push<W>(io: &mut W, name: &str, payload: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let header = PushHeader { name: name.to_string(), payload_len: payload.len() as u64 };
    write_header(io, &header).await?;
    io.write_all(payload).await?;
    io.flush().await
}

/// Read and check the frame header. The payload is left unread.
pub async fn read_header<R>(io: &mut R) -> io::Result<PushHeader>
where
    R: AsyncRead + Unpin,
{
    let mut magic = [0u8; 4];
    io.read_exact(&mut magic).await?;
    if &magic != MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad magic"));
    }

    let version = io.read_u8().await?;
    if version != VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported protocol version {}", version),
        ));
    }

    let name_len = usize::from(io.read_u16().await?);
    let mut name = vec![0u8; name_len];
    io.read_exact(&mut name).await?;
    let name = String::from_utf8(name)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "file name is not UTF-8"))?;

    let payload_len = io.read_u64().await?;
    Ok(PushHeader { name, payload_len })
}

pub async fn write_reply<W>(io: &mut W, reply: &PushReply) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let (status, msg) = match reply {
        PushReply::Stored { path } => (STATUS_OK, path.as_str()),
        PushReply::Rejected { reason } => (STATUS_REJECTED, reason.as_str()),
    };
    let bytes = &msg.as_bytes()[..msg.len().min(MAX_REPLY_LEN as usize)];

    io.write_u8(status).await?;
    io.write_u32(bytes.len() as u32).await?;
    io.write_all(bytes).await?;
    io.flush().await
}

pub async fn read_reply<R>(io: &mut R) -> io::Result<PushReply>
where
    R: AsyncRead + Unpin,
{
    let status = io.read_u8().await?;
    let len = io.read_u32().await?;
    if len > MAX_REPLY_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "reply too large"));
    }

    let mut msg = vec![0u8; len as usize];
    io.read_exact(&mut msg).await?;
    let msg = String::from_utf8_lossy(&msg).into_owned();

    match status {
        STATUS_OK => Ok(PushReply::Stored { path: msg }),
        STATUS_REJECTED => Ok(PushReply::Rejected { reason: msg }),
        other => Err(io::Error::new(io::ErrorKind::InvalidData, format!("unknown status {}", other))),
    }
}
