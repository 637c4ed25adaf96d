use thiserror::Error;

/// Errors produced while decoding RESP frames from a byte buffer.
///
/// `Incomplete` means the buffer simply does not hold a whole frame yet and
/// the caller should read more bytes; only `Malformed` is a real protocol
/// violation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("incomplete frame")]
    Incomplete,
    #[error("malformed frame: {0}")]
    Malformed(String),
}

/// Request-scoped command failures. These are never fatal: the dispatcher
/// turns them into a RESP error reply and the connection stays open.
///
/// The `Display` text of each variant is the exact message that goes on the
/// wire after the `-` marker.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),
    #[error("ERR syntax error")]
    Syntax,
    #[error("ERR value is not an integer or out of range")]
    NotInteger,
    #[error("ERR unknown command '{name}' {args}")]
    Unknown { name: String, args: String },
}
