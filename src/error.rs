/*!
Error types for the stream API and the MRT decoder.

The two layers fail differently: [`ParserError`] is scoped to one archive file
and is absorbed by the stream (the owning reader is dropped and the stream
continues), while [`BgpStreamError`] is surfaced to the caller of
[`next_record`](crate::BgpStream::next_record).
*/
use crate::stream::StreamState;
use oneio::OneIoError;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::{error::Error, fmt, io};

/// Errors produced while decoding a single MRT archive file.
///
/// These are reader-scoped: the stream logs them, marks the reader as failed
/// and keeps serving records from the remaining files.
#[derive(Debug)]
pub enum ParserError {
    IoError(io::Error),
    EofError(io::Error),
    OneIoError(OneIoError),
    /// Reached end of file between records; the normal termination condition.
    EofExpected,
    ParseError(String),
    TruncatedMsg(String),
    Unsupported(String),
}

impl Error for ParserError {}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let message = match self {
            ParserError::IoError(e) => e.to_string(),
            ParserError::EofError(e) => e.to_string(),
            ParserError::OneIoError(e) => e.to_string(),
            ParserError::EofExpected => "reach end of file".to_string(),
            ParserError::ParseError(s) => s.to_owned(),
            ParserError::TruncatedMsg(s) => s.to_owned(),
            ParserError::Unsupported(s) => s.to_owned(),
        };
        write!(f, "Error: {}", message)
    }
}

impl From<io::Error> for ParserError {
    fn from(io_error: io::Error) -> Self {
        match io_error.kind() {
            ErrorKind::UnexpectedEof => ParserError::EofError(io_error),
            _ => ParserError::IoError(io_error),
        }
    }
}

impl From<OneIoError> for ParserError {
    fn from(error: OneIoError) -> Self {
        ParserError::OneIoError(error)
    }
}

/// Errors surfaced through the public stream API.
#[derive(Debug)]
pub enum BgpStreamError {
    /// Operation issued outside its permitted lifecycle state.
    InvalidState {
        op: &'static str,
        state: StreamState,
    },
    /// Filter value malformed or conflicting.
    InvalidFilter(String),
    /// `start()` called with no time interval configured.
    NoInterval,
    UnknownBackend(String),
    UnknownOption {
        backend: &'static str,
        option: String,
    },
    InvalidOptionValue {
        option: &'static str,
        value: String,
    },
    /// The data interface failed to open its resources.
    BackendStart(String),
    /// The data interface failed while enumerating archive files.
    BackendQuery(String),
    /// Cooperative cancellation; the stream stays ON and may be resumed.
    Interrupted,
}

impl Error for BgpStreamError {}

impl Display for BgpStreamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BgpStreamError::InvalidState { op, state } => {
                write!(f, "operation {} not allowed in state {}", op, state)
            }
            BgpStreamError::InvalidFilter(msg) => write!(f, "invalid filter: {}", msg),
            BgpStreamError::NoInterval => {
                write!(f, "no time interval configured; add one before start()")
            }
            BgpStreamError::UnknownBackend(name) => write!(f, "unknown data interface: {}", name),
            BgpStreamError::UnknownOption { backend, option } => {
                write!(f, "data interface {} has no option {}", backend, option)
            }
            BgpStreamError::InvalidOptionValue { option, value } => {
                write!(f, "invalid value for option {}: {}", option, value)
            }
            BgpStreamError::BackendStart(msg) => write!(f, "data interface start failed: {}", msg),
            BgpStreamError::BackendQuery(msg) => write!(f, "data interface query failed: {}", msg),
            BgpStreamError::Interrupted => write!(f, "stream interrupted"),
        }
    }
}
