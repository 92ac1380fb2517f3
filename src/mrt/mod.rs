/*!
Bounded MRT decoder feeding the stream pipeline.

The scanner chunks an archive file into raw records (header plus unparsed
body bytes), and [`RawMrtRecord::parse`] decodes the body lazily. Keeping the
wire bytes around lets emitted records expose the original encoding for
downstream re-encoding.

Decoding covers what the element model consumes: TABLE_DUMP v1,
TABLE_DUMP_V2 unicast RIBs (with ADD-PATH), and BGP4MP state changes and
messages. Record types outside that set parse to [`MrtMessage::Unsupported`]
and are skipped by the reader rather than treated as file corruption.
*/
pub mod attributes;
pub mod bgp4mp;
pub mod elementor;
pub mod header;
pub mod table_dump;
pub(crate) mod utils;

use crate::error::ParserError;
use bytes::{BufMut, Bytes, BytesMut};
use header::{parse_common_header_with_bytes, CommonHeader, EntryType};
use std::io::Read;

pub use bgp4mp::{Bgp4Mp, Bgp4MpMessage, Bgp4MpStateChange};
pub use elementor::Elementor;
pub use table_dump::{PeerIndexTable, TableDumpV2Message};

/// Upper bound on one MRT message body; headers claiming more are corrupt.
const MAX_MRT_MESSAGE_LEN: u32 = 16 * 1024 * 1024;

/// An MRT record chunked off the input but not yet decoded.
#[derive(Debug, Clone)]
pub struct RawMrtRecord {
    pub common_header: CommonHeader,
    pub header_bytes: Bytes,
    pub message_bytes: Bytes,
}

impl RawMrtRecord {
    pub fn parse(&self) -> Result<MrtRecord, ParserError> {
        let data: &[u8] = &self.message_bytes;
        let message = match self.common_header.entry_type {
            EntryType::TableDump => MrtMessage::TableDump(table_dump::parse_table_dump(
                self.common_header.entry_subtype,
                data,
            )?),
            EntryType::TableDumpV2 => {
                match table_dump::parse_table_dump_v2(self.common_header.entry_subtype, data) {
                    Ok(msg) => MrtMessage::TableDumpV2(msg),
                    Err(ParserError::Unsupported(_)) => MrtMessage::Unsupported,
                    Err(e) => return Err(e),
                }
            }
            EntryType::Bgp4Mp | EntryType::Bgp4MpEt => {
                MrtMessage::Bgp4Mp(bgp4mp::parse_bgp4mp(self.common_header.entry_subtype, data)?)
            }
            EntryType::Other(_) => MrtMessage::Unsupported,
        };

        Ok(MrtRecord {
            common_header: self.common_header,
            message,
        })
    }

    /// The complete record exactly as read from the wire.
    pub fn raw_bytes(&self) -> Bytes {
        let mut bytes = BytesMut::with_capacity(self.header_bytes.len() + self.message_bytes.len());
        bytes.put_slice(&self.header_bytes);
        bytes.put_slice(&self.message_bytes);
        bytes.freeze()
    }
}

/// A decoded MRT record.
#[derive(Debug, Clone)]
pub struct MrtRecord {
    pub common_header: CommonHeader,
    pub message: MrtMessage,
}

#[derive(Debug, Clone)]
pub enum MrtMessage {
    TableDump(table_dump::TableDumpMessage),
    TableDumpV2(TableDumpV2Message),
    Bgp4Mp(Bgp4Mp),
    /// A record type or subtype the stream does not consume.
    Unsupported,
}

/// Sequential scanner over the MRT records of one archive file.
///
/// The underlying reader comes from `oneio`, so local paths and URLs with
/// transparent gzip/bzip2 decompression are all handled the same way.
pub struct MrtScanner {
    reader: Box<dyn Read + Send>,
}

impl MrtScanner {
    pub fn open(path: &str) -> Result<MrtScanner, ParserError> {
        let reader = oneio::get_reader(path)?;
        Ok(MrtScanner { reader })
    }

    #[cfg(test)]
    pub(crate) fn from_reader(reader: Box<dyn Read + Send>) -> MrtScanner {
        MrtScanner { reader }
    }

    /// Chunk the next record off the input. `Ok(None)` is a clean end of
    /// file; an EOF mid-record is reported as truncation.
    pub fn next_record(&mut self) -> Result<Option<RawMrtRecord>, ParserError> {
        let parsed_header = match parse_common_header_with_bytes(&mut self.reader) {
            Ok(v) => v,
            Err(ParserError::EofError(e)) => {
                return match e.kind() == std::io::ErrorKind::UnexpectedEof {
                    true => Ok(None),
                    false => Err(ParserError::EofError(e)),
                }
            }
            Err(e) => return Err(e),
        };

        let common_header = parsed_header.header;
        if common_header.length > MAX_MRT_MESSAGE_LEN {
            return Err(ParserError::ParseError(format!(
                "MRT message too large: {} bytes",
                common_header.length
            )));
        }

        let mut buffer = BytesMut::zeroed(common_header.length as usize);
        self.reader
            .read_exact(&mut buffer)
            .map_err(|e| ParserError::TruncatedMsg(format!("truncated MRT record: {}", e)))?;

        Ok(Some(RawMrtRecord {
            common_header,
            header_bytes: parsed_header.raw_bytes,
            message_bytes: buffer.freeze(),
        }))
    }
}
