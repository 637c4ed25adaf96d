use crate::errors::ProtocolError;
use anyhow::Result;
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Enum to represent every RESP frame type we speak. Requests arrive as an
/// `Array` of `BulkString`s; replies use whichever variant the command calls
/// for. `NullBulkString` is the `$-1\r\n` "no value" marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(String),
    Array(Vec<RespValue>),
    NullBulkString,
}

impl RespValue {
    /// Encode this value back into its wire form. Every variant encodes;
    /// there is no fallback frame.
    pub fn encode(&self) -> String {
        match self {
            RespValue::SimpleString(s) => format!("+{s}\r\n"),
            RespValue::Error(msg) => format!("-{msg}\r\n"),
            RespValue::Integer(n) => format!(":{n}\r\n"),
            RespValue::BulkString(s) => format!("${}\r\n{}\r\n", s.len(), s),
            RespValue::Array(items) => {
                let mut out = format!("*{}\r\n", items.len());
                for item in items {
                    out.push_str(&item.encode());
                }
                out
            }
            RespValue::NullBulkString => "$-1\r\n".to_string(),
        }
    }
}

/// Parse one frame from the front of `buf`, returning the value and how many
/// bytes it consumed. `Incomplete` asks the caller to buffer more bytes;
/// `Malformed` means the bytes can never become a valid frame.
pub fn parse_msg(buf: &[u8]) -> Result<(RespValue, usize), ProtocolError> {
    match buf.first() {
        Some(b'+') => parse_simple(buf),
        Some(b'-') => parse_error(buf),
        Some(b':') => parse_int(buf),
        Some(b'$') => parse_bulk(buf),
        Some(b'*') => parse_array(buf),
        Some(other) => Err(ProtocolError::Malformed(format!(
            "unknown type marker {:#04x}",
            other
        ))),
        None => Err(ProtocolError::Incomplete),
    }
}

/// Function used to parse a simple string acc to the RESP conventions.
fn parse_simple(buf: &[u8]) -> Result<(RespValue, usize), ProtocolError> {
    let end = find_crlf(&buf[1..]).ok_or(ProtocolError::Incomplete)?;
    let s = as_utf8(&buf[1..1 + end])?.to_owned();
    Ok((RespValue::SimpleString(s), 1 + end + 2))
}

/// Error frames carry the same shape as simple strings, only the marker
/// differs.
fn parse_error(buf: &[u8]) -> Result<(RespValue, usize), ProtocolError> {
    let (value, used) = parse_simple(buf)?;
    match value {
        RespValue::SimpleString(s) => Ok((RespValue::Error(s), used)),
        _ => unreachable!(),
    }
}

/// Function used to parse an integer frame. A leading '-' is accepted so
/// that replies like TTL -1/-2 round-trip through the codec.
fn parse_int(buf: &[u8]) -> Result<(RespValue, usize), ProtocolError> {
    let end = find_crlf(&buf[1..]).ok_or(ProtocolError::Incomplete)?;
    let n: i64 = as_utf8(&buf[1..1 + end])?
        .parse()
        .map_err(|_| ProtocolError::Malformed("invalid integer".into()))?;
    Ok((RespValue::Integer(n), 1 + end + 2))
}

/// Largest bulk payload we will accept, matching real Redis'
/// proto-max-bulk-len default. Anything bigger is a hostile length field,
/// not a request.
const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Largest element count for a request array, matching real Redis'
/// multibulk limit.
const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Function used to parse a bulk string in the RESP format, including the
/// `$-1\r\n` null marker.
fn parse_bulk(buf: &[u8]) -> Result<(RespValue, usize), ProtocolError> {
    let len_end = find_crlf(&buf[1..]).ok_or(ProtocolError::Incomplete)?;
    let len_str = as_utf8(&buf[1..1 + len_end])?;

    if len_str == "-1" {
        return Ok((RespValue::NullBulkString, 1 + len_end + 2));
    }

    let len: usize = len_str
        .parse()
        .map_err(|_| ProtocolError::Malformed("invalid bulk length".into()))?;
    if len > MAX_BULK_LEN {
        return Err(ProtocolError::Malformed("bulk length too large".into()));
    }
    let start = 1 + len_end + 2;
    let end = start
        .checked_add(len)
        .ok_or_else(|| ProtocolError::Malformed("bulk length too large".into()))?;
    if buf.len() < end + 2 {
        return Err(ProtocolError::Incomplete);
    }
    let s = as_utf8(&buf[start..end])?.to_owned();
    Ok((RespValue::BulkString(s), end + 2))
}

/// Function used to parse an array frame: the count line, then that many
/// recursively parsed elements. Fail-fast: the first element error aborts
/// the rest.
fn parse_array(buf: &[u8]) -> Result<(RespValue, usize), ProtocolError> {
    let len_end = find_crlf(&buf[1..]).ok_or(ProtocolError::Incomplete)?;
    let count: usize = as_utf8(&buf[1..1 + len_end])?
        .parse()
        .map_err(|_| ProtocolError::Malformed("invalid array length".into()))?;
    if count > MAX_ARRAY_LEN {
        return Err(ProtocolError::Malformed("array length too large".into()));
    }
    let mut consumed = 1 + len_end + 2;
    // The count is client-supplied, so only trust it for a small
    // pre-allocation; the vec grows as elements actually arrive.
    let mut items = Vec::with_capacity(count.min(64));

    for _ in 0..count {
        let (item, used) = parse_msg(&buf[consumed..])?;
        consumed += used;
        items.push(item);
    }
    Ok((RespValue::Array(items), consumed))
}

/// Function used to find the next crlf (\r\n) sequence, if any.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn as_utf8(bytes: &[u8]) -> Result<&str, ProtocolError> {
    std::str::from_utf8(bytes).map_err(|_| ProtocolError::Malformed("invalid utf-8".into()))
}

/// Struct owning one client connection plus its read buffer. Buffering per
/// connection is what makes pipelining and fragmented frames work: a read
/// may carry several complete frames, or only part of one.
pub struct RespHandler {
    stream: TcpStream,
    buffer: BytesMut,
}

impl RespHandler {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Read the next complete frame. Frames already sitting in the buffer
    /// are drained before the socket is touched again, so pipelined
    /// requests all get served in order. Returns `Ok(None)` on a clean
    /// disconnect between frames.
    pub async fn read_value(&mut self) -> Result<Option<RespValue>> {
        loop {
            if !self.buffer.is_empty() {
                match parse_msg(&self.buffer) {
                    Ok((value, used)) => {
                        self.buffer.advance(used);
                        return Ok(Some(value));
                    }
                    Err(ProtocolError::Incomplete) => {}
                    Err(e) => return Err(e.into()),
                }
            }

            let n = self.stream.read_buf(&mut self.buffer).await?;
            if n == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                // Peer went away mid-frame.
                anyhow::bail!("connection closed inside a frame");
            }
        }
    }

    pub async fn write_value(&mut self, value: RespValue) -> Result<()> {
        self.stream.write_all(value.encode().as_bytes()).await?;
        Ok(())
    }

    /// Drop whatever is left in the read buffer. Used after a malformed
    /// frame: the rest of the read cannot be trusted to start on a frame
    /// boundary.
    pub fn discard_input(&mut self) {
        self.buffer.clear();
    }
}
