//! Condensed BGP path-attribute parsing.
//!
//! Only the attributes that feed [`BgpElem`](crate::elem::BgpElem) fields are
//! decoded; everything else is skipped with a debug log. Attribute-level
//! damage degrades to a partial result rather than failing the whole record,
//! since archived MRT data routinely carries malformed optional attributes.

use crate::elem::{AsPath, AsPathSegment, Community, NetworkPrefix, Origin};
use crate::error::ParserError;
use crate::mrt::utils::{Afi, AsnLength, ReadUtils};
use log::{debug, warn};
use std::net::IpAddr;

const ATTR_ORIGIN: u8 = 1;
const ATTR_AS_PATH: u8 = 2;
const ATTR_NEXT_HOP: u8 = 3;
const ATTR_MED: u8 = 4;
const ATTR_LOCAL_PREF: u8 = 5;
const ATTR_AGGREGATOR: u8 = 7;
const ATTR_COMMUNITIES: u8 = 8;
const ATTR_MP_REACH_NLRI: u8 = 14;
const ATTR_MP_UNREACH_NLRI: u8 = 15;
const ATTR_AS4_PATH: u8 = 17;

const ATTR_FLAG_EXTENDED: u8 = 0x10;

/// The subset of path attributes the element model consumes.
#[derive(Debug, Default, Clone)]
pub struct ParsedAttributes {
    pub as_path: Option<AsPath>,
    pub origin: Option<Origin>,
    pub next_hop: Option<IpAddr>,
    pub med: Option<u32>,
    pub local_pref: Option<u32>,
    pub communities: Option<Vec<Community>>,
    pub mp_announced: Vec<NetworkPrefix>,
    pub mp_withdrawn: Vec<NetworkPrefix>,
}

/// Parse the attribute section of an UPDATE message or RIB entry.
///
/// `in_rib` selects the abbreviated MP_REACH_NLRI encoding of RFC 6396
/// section 4.3.4 (next hop only, no AFI/SAFI or NLRI).
pub(crate) fn parse_attributes(
    mut data: &[u8],
    asn_len: AsnLength,
    add_path: bool,
    in_rib: bool,
) -> Result<ParsedAttributes, ParserError> {
    let mut parsed = ParsedAttributes::default();
    let mut as4_path: Option<AsPath> = None;
    let mut communities: Vec<Community> = vec![];

    while data.remaining() >= 3 {
        let flag = data.read_u8()?;
        let attr_type = data.read_u8()?;
        let attr_length = match flag & ATTR_FLAG_EXTENDED != 0 {
            false => data.read_u8()? as usize,
            true => data.read_u16()? as usize,
        };

        if data.remaining() < attr_length {
            warn!(
                "not enough bytes for attribute {}: want {}, have {}; stopping attribute parse",
                attr_type,
                attr_length,
                data.remaining()
            );
            break;
        }
        let mut attr_data = data.split_to(attr_length)?;

        let result = match attr_type {
            ATTR_ORIGIN => parse_origin(&mut attr_data).map(|v| parsed.origin = Some(v)),
            ATTR_AS_PATH => {
                parse_as_path(&mut attr_data, asn_len).map(|v| parsed.as_path = Some(v))
            }
            ATTR_AS4_PATH => {
                parse_as_path(&mut attr_data, AsnLength::Bits32).map(|v| as4_path = Some(v))
            }
            ATTR_NEXT_HOP => attr_data
                .read_ipv4_address()
                .map(|v| parsed.next_hop = Some(IpAddr::V4(v))),
            ATTR_MED => attr_data.read_u32().map(|v| parsed.med = Some(v)),
            ATTR_LOCAL_PREF => attr_data.read_u32().map(|v| parsed.local_pref = Some(v)),
            ATTR_AGGREGATOR => Ok(()), // recognized, not surfaced per element
            ATTR_COMMUNITIES => parse_communities(&mut attr_data, &mut communities),
            ATTR_MP_REACH_NLRI => parse_mp_reach(&mut attr_data, add_path, in_rib, &mut parsed),
            ATTR_MP_UNREACH_NLRI => parse_mp_unreach(&mut attr_data, add_path, &mut parsed),
            t => {
                debug!("skipping attribute type {} ({} bytes)", t, attr_length);
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!("error parsing attribute type {}: {}", attr_type, e);
        }
    }

    if !communities.is_empty() {
        parsed.communities = Some(communities);
    }

    // RFC 6793: a 4-byte AS4_PATH replaces the tail of the 2-byte AS_PATH
    if let Some(as4) = as4_path {
        parsed.as_path = Some(match &parsed.as_path {
            Some(path) => AsPath::merge_as4_path(path, &as4),
            None => as4,
        });
    }

    Ok(parsed)
}

fn parse_origin(data: &mut &[u8]) -> Result<Origin, ParserError> {
    match data.read_u8()? {
        0 => Ok(Origin::Igp),
        1 => Ok(Origin::Egp),
        2 => Ok(Origin::Incomplete),
        v => Err(ParserError::ParseError(format!(
            "unknown origin value: {}",
            v
        ))),
    }
}

const AS_PATH_SEGMENT_SET: u8 = 1;
const AS_PATH_SEGMENT_SEQUENCE: u8 = 2;

fn parse_as_path(data: &mut &[u8], asn_len: AsnLength) -> Result<AsPath, ParserError> {
    let mut segments = vec![];
    while data.remaining() >= 2 {
        let seg_type = data.read_u8()?;
        let count = data.read_u8()? as usize;
        let mut asns = Vec::with_capacity(count);
        for _ in 0..count {
            asns.push(data.read_asn(asn_len)?);
        }
        match seg_type {
            AS_PATH_SEGMENT_SET => segments.push(AsPathSegment::AsSet(asns)),
            AS_PATH_SEGMENT_SEQUENCE => segments.push(AsPathSegment::AsSequence(asns)),
            // confed segments (3, 4) are not propagated to collectors; treat
            // anything else as damage
            v => {
                return Err(ParserError::ParseError(format!(
                    "unknown AS path segment type: {}",
                    v
                )))
            }
        }
    }
    Ok(AsPath { segments })
}

fn parse_communities(
    data: &mut &[u8],
    communities: &mut Vec<Community>,
) -> Result<(), ParserError> {
    while data.remaining() >= 4 {
        let asn = data.read_u16()?;
        let value = data.read_u16()?;
        communities.push(Community { asn, value });
    }
    Ok(())
}

/// MP_REACH_NLRI (RFC 4760 section 3), or the next-hop-only form used inside
/// TABLE_DUMP_V2 RIB entries (RFC 6396 section 4.3.4).
fn parse_mp_reach(
    data: &mut &[u8],
    add_path: bool,
    in_rib: bool,
    parsed: &mut ParsedAttributes,
) -> Result<(), ParserError> {
    if in_rib {
        let next_hop_len = data.read_u8()? as usize;
        let mut next_hop_data = data.split_to(next_hop_len)?;
        parsed.next_hop = read_next_hop(&mut next_hop_data)?;
        return Ok(());
    }

    let afi = Afi::try_from(data.read_u16()?)?;
    let _safi = data.read_u8()?;
    let next_hop_len = data.read_u8()? as usize;
    let mut next_hop_data = data.split_to(next_hop_len)?;
    if parsed.next_hop.is_none() {
        parsed.next_hop = read_next_hop(&mut next_hop_data)?;
    }
    let _reserved = data.read_u8()?;

    while data.remaining() > 0 {
        parsed.mp_announced.push(data.read_nlri_prefix(afi, add_path)?);
    }
    Ok(())
}

fn parse_mp_unreach(
    data: &mut &[u8],
    add_path: bool,
    parsed: &mut ParsedAttributes,
) -> Result<(), ParserError> {
    let afi = Afi::try_from(data.read_u16()?)?;
    let _safi = data.read_u8()?;
    while data.remaining() > 0 {
        parsed.mp_withdrawn.push(data.read_nlri_prefix(afi, add_path)?);
    }
    Ok(())
}

/// Next hop field: 4 bytes IPv4, 16 bytes IPv6, 32 bytes IPv6 with a
/// link-local alternative (the global address is kept).
fn read_next_hop(data: &mut &[u8]) -> Result<Option<IpAddr>, ParserError> {
    match data.remaining() {
        0 => Ok(None),
        4 => Ok(Some(IpAddr::V4(data.read_ipv4_address()?))),
        16 | 32 => Ok(Some(IpAddr::V6(data.read_ipv6_address()?))),
        n => Err(ParserError::ParseError(format!(
            "unsupported next hop length: {}",
            n
        ))),
    }
}
