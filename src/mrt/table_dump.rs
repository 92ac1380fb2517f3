//! TABLE_DUMP (v1) and TABLE_DUMP_V2 parsing (RFC 6396 sections 4.2/4.3,
//! RFC 8050 ADD-PATH variants).

use crate::elem::NetworkPrefix;
use crate::error::ParserError;
use crate::mrt::attributes::{parse_attributes, ParsedAttributes};
use crate::mrt::utils::{Afi, AsnLength, ReadUtils};
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use log::warn;
use std::net::IpAddr;

/// One TABLE_DUMP v1 record: a single RIB entry.
#[derive(Debug, Clone)]
pub struct TableDumpMessage {
    pub prefix: NetworkPrefix,
    pub peer_ip: IpAddr,
    pub peer_asn: u32,
    pub attributes: ParsedAttributes,
}

/// TABLE_DUMP v1 carries 2-byte ASNs only; the subtype selects the AFI.
pub(crate) fn parse_table_dump(sub_type: u16, mut data: &[u8]) -> Result<TableDumpMessage, ParserError> {
    let afi = match sub_type {
        1 => Afi::Ipv4,
        2 => Afi::Ipv6,
        _ => {
            return Err(ParserError::ParseError(format!(
                "invalid TABLE_DUMP subtype: {}",
                sub_type
            )))
        }
    };

    let _view_number = data.read_u16()?;
    let _sequence_number = data.read_u16()?;
    // v1 prefixes are a full-width address followed by the mask length
    let addr = data.read_address(afi)?;
    let mask = data.read_u8()?;
    let prefix = match addr {
        IpAddr::V4(a) => Ipv4Net::new(a, mask)
            .map(IpNet::V4)
            .map_err(|_| ParserError::ParseError(format!("invalid prefix length: {}", mask)))?,
        IpAddr::V6(a) => Ipv6Net::new(a, mask)
            .map(IpNet::V6)
            .map_err(|_| ParserError::ParseError(format!("invalid prefix length: {}", mask)))?,
    };
    let _status = data.read_u8()?;
    let _originated_time = data.read_u32()?;
    let peer_ip = data.read_address(afi)?;
    let peer_asn = data.read_asn(AsnLength::Bits16)?;
    let attribute_length = data.read_u16()? as usize;
    let attr_data = data.split_to(attribute_length)?;
    let attributes = parse_attributes(attr_data, AsnLength::Bits16, false, true)?;

    Ok(TableDumpMessage {
        prefix: NetworkPrefix::new(prefix, 0),
        peer_ip,
        peer_asn,
        attributes,
    })
}

#[derive(Debug, Clone)]
pub enum TableDumpV2Message {
    PeerIndexTable(PeerIndexTable),
    RibEntries(RibAfiEntries),
}

/// One collector peer from the peer index table.
#[derive(Debug, Clone, Copy)]
pub struct Peer {
    pub peer_ip: IpAddr,
    pub peer_asn: u32,
}

/// The peer index table heading every TABLE_DUMP_V2 RIB dump
/// (RFC 6396 section 4.3.1).
#[derive(Debug, Clone, Default)]
pub struct PeerIndexTable {
    peers: Vec<Peer>,
}

impl PeerIndexTable {
    pub fn peer_by_index(&self, index: u16) -> Option<&Peer> {
        self.peers.get(index as usize)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

const PEER_TYPE_AFI_IPV6: u8 = 0b0000_0001;
const PEER_TYPE_AS_32BIT: u8 = 0b0000_0010;

fn parse_peer_index_table(data: &mut &[u8]) -> Result<PeerIndexTable, ParserError> {
    let _collector_bgp_id = data.read_u32()?;
    let view_name_length = data.read_u16()?;
    data.advance(view_name_length as usize)?;

    let peer_count = data.read_u16()?;
    let mut peers = Vec::with_capacity(peer_count as usize);
    for _ in 0..peer_count {
        let peer_type = data.read_u8()?;
        let afi = match peer_type & PEER_TYPE_AFI_IPV6 != 0 {
            true => Afi::Ipv6,
            false => Afi::Ipv4,
        };
        let asn_len = match peer_type & PEER_TYPE_AS_32BIT != 0 {
            true => AsnLength::Bits32,
            false => AsnLength::Bits16,
        };
        let _peer_bgp_id = data.read_u32()?;
        let peer_ip = data.read_address(afi)?;
        let peer_asn = data.read_asn(asn_len)?;
        peers.push(Peer { peer_ip, peer_asn });
    }

    Ok(PeerIndexTable { peers })
}

/// The prefix-keyed entries of one TABLE_DUMP_V2 RIB record.
#[derive(Debug, Clone)]
pub struct RibAfiEntries {
    pub prefix: NetworkPrefix,
    pub entries: Vec<RibEntry>,
}

#[derive(Debug, Clone)]
pub struct RibEntry {
    pub peer_index: u16,
    pub attributes: ParsedAttributes,
}

const TDV2_PEER_INDEX_TABLE: u16 = 1;
const TDV2_RIB_IPV4_UNICAST: u16 = 2;
const TDV2_RIB_IPV6_UNICAST: u16 = 4;
const TDV2_RIB_IPV4_UNICAST_ADDPATH: u16 = 8;
const TDV2_RIB_IPV6_UNICAST_ADDPATH: u16 = 10;

pub(crate) fn parse_table_dump_v2(
    sub_type: u16,
    mut data: &[u8],
) -> Result<TableDumpV2Message, ParserError> {
    let (afi, add_path) = match sub_type {
        TDV2_PEER_INDEX_TABLE => {
            return parse_peer_index_table(&mut data).map(TableDumpV2Message::PeerIndexTable)
        }
        TDV2_RIB_IPV4_UNICAST => (Afi::Ipv4, false),
        TDV2_RIB_IPV6_UNICAST => (Afi::Ipv6, false),
        TDV2_RIB_IPV4_UNICAST_ADDPATH => (Afi::Ipv4, true),
        TDV2_RIB_IPV6_UNICAST_ADDPATH => (Afi::Ipv6, true),
        v => {
            return Err(ParserError::Unsupported(format!(
                "unsupported TABLE_DUMP_V2 subtype: {}",
                v
            )))
        }
    };

    let _sequence_number = data.read_u32()?;
    // the path identifier of add-path entries is encoded per entry, not here
    let prefix = data.read_nlri_prefix(afi, false)?;

    let entry_count = data.read_u16()?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        match parse_rib_entry(&mut data, add_path) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!("early break parsing RIB entries: {}", e);
                break;
            }
        }
    }

    Ok(TableDumpV2Message::RibEntries(RibAfiEntries {
        prefix,
        entries,
    }))
}

fn parse_rib_entry(data: &mut &[u8], add_path: bool) -> Result<RibEntry, ParserError> {
    data.require_n_remaining(8, "RIB entry header")?;
    let peer_index = data.read_u16()?;
    let _originated_time = data.read_u32()?;
    if add_path {
        let _path_id = data.read_u32()?;
    }
    let attribute_length = data.read_u16()? as usize;
    let attr_data = data.split_to(attribute_length)?;
    let attributes = parse_attributes(attr_data, AsnLength::Bits32, add_path, true)?;

    Ok(RibEntry {
        peer_index,
        attributes,
    })
}
