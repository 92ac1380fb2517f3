//! MRT common header parsing (RFC 6396 section 4.1).

use crate::error::ParserError;
use bytes::Bytes;
use std::io::Read;

/// MRT record type carried in the common header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    TableDump,
    TableDumpV2,
    Bgp4Mp,
    Bgp4MpEt,
    /// Any type the stream does not consume (OSPF, ISIS, ...). Records of
    /// these types are skipped, not treated as corruption.
    Other(u16),
}

impl From<u16> for EntryType {
    fn from(value: u16) -> Self {
        match value {
            12 => EntryType::TableDump,
            13 => EntryType::TableDumpV2,
            16 => EntryType::Bgp4Mp,
            17 => EntryType::Bgp4MpEt,
            v => EntryType::Other(v),
        }
    }
}

/// Parsed MRT common header.
///
/// `length` is the message body length: for `BGP4MP_ET` records the on-wire
/// length field includes the 4-byte microsecond timestamp, which is
/// subtracted here since the timestamp lives with the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonHeader {
    pub timestamp: u32,
    pub microsecond_timestamp: Option<u32>,
    pub entry_type: EntryType,
    pub entry_subtype: u16,
    pub length: u32,
}

pub(crate) struct ParsedHeader {
    pub header: CommonHeader,
    pub raw_bytes: Bytes,
}

/// Parse the common header, keeping the exact wire bytes alongside.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |             Type              |            Subtype            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             Length                            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                      Message... (variable)
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// `BGP4MP_ET` records carry an extra 32-bit microsecond timestamp between
/// the length field and the message.
pub(crate) fn parse_common_header_with_bytes<T: Read>(
    input: &mut T,
) -> Result<ParsedHeader, ParserError> {
    let mut base_bytes = [0u8; 12];
    input.read_exact(&mut base_bytes)?;

    let timestamp = u32::from_be_bytes(base_bytes[0..4].try_into().unwrap());
    let entry_type = EntryType::from(u16::from_be_bytes(base_bytes[4..6].try_into().unwrap()));
    let entry_subtype = u16::from_be_bytes(base_bytes[6..8].try_into().unwrap());
    let mut length = u32::from_be_bytes(base_bytes[8..12].try_into().unwrap());

    let (microsecond_timestamp, raw_bytes) = match entry_type {
        EntryType::Bgp4MpEt => {
            if length < 4 {
                return Err(ParserError::ParseError(
                    "invalid MRT header length for ET record: length < 4".to_string(),
                ));
            }
            length -= 4;
            let mut combined = [0u8; 16];
            combined[..12].copy_from_slice(&base_bytes);
            input.read_exact(&mut combined[12..])?;
            let microseconds = u32::from_be_bytes(combined[12..16].try_into().unwrap());
            (Some(microseconds), Bytes::copy_from_slice(&combined))
        }
        _ => (None, Bytes::copy_from_slice(&base_bytes)),
    };

    Ok(ParsedHeader {
        header: CommonHeader {
            timestamp,
            microsecond_timestamp,
            entry_type,
            entry_subtype,
            length,
        },
        raw_bytes,
    })
}
