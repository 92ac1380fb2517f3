//! BGP4MP / BGP4MP_ET message parsing (RFC 6396 section 4.4, RFC 8050).

use crate::elem::PeerState;
use crate::error::ParserError;
use crate::mrt::attributes::{parse_attributes, ParsedAttributes};
use crate::mrt::utils::{Afi, AsnLength, ReadUtils};
use crate::elem::NetworkPrefix;
use log::warn;
use std::net::IpAddr;

/// BGP4MP subtypes, including the ADD-PATH variants from RFC 8050.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bgp4MpType {
    StateChange,
    Message,
    MessageAs4,
    StateChangeAs4,
    MessageLocal,
    MessageAs4Local,
    MessageAddpath,
    MessageAs4Addpath,
    MessageLocalAddpath,
    MessageLocalAs4Addpath,
}

impl TryFrom<u16> for Bgp4MpType {
    type Error = ParserError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Bgp4MpType::StateChange),
            1 => Ok(Bgp4MpType::Message),
            4 => Ok(Bgp4MpType::MessageAs4),
            5 => Ok(Bgp4MpType::StateChangeAs4),
            6 => Ok(Bgp4MpType::MessageLocal),
            7 => Ok(Bgp4MpType::MessageAs4Local),
            8 => Ok(Bgp4MpType::MessageAddpath),
            9 => Ok(Bgp4MpType::MessageAs4Addpath),
            10 => Ok(Bgp4MpType::MessageLocalAddpath),
            11 => Ok(Bgp4MpType::MessageLocalAs4Addpath),
            v => Err(ParserError::ParseError(format!(
                "unknown BGP4MP subtype: {}",
                v
            ))),
        }
    }
}

impl Bgp4MpType {
    fn asn_length(&self) -> AsnLength {
        match self {
            Bgp4MpType::MessageAs4
            | Bgp4MpType::StateChangeAs4
            | Bgp4MpType::MessageAs4Local
            | Bgp4MpType::MessageAs4Addpath
            | Bgp4MpType::MessageLocalAs4Addpath => AsnLength::Bits32,
            _ => AsnLength::Bits16,
        }
    }

    fn is_add_path(&self) -> bool {
        matches!(
            self,
            Bgp4MpType::MessageAddpath
                | Bgp4MpType::MessageAs4Addpath
                | Bgp4MpType::MessageLocalAddpath
                | Bgp4MpType::MessageLocalAs4Addpath
        )
    }
}

#[derive(Debug, Clone)]
pub enum Bgp4Mp {
    StateChange(Bgp4MpStateChange),
    Message(Bgp4MpMessage),
}

#[derive(Debug, Clone)]
pub struct Bgp4MpStateChange {
    pub peer_asn: u32,
    pub peer_ip: IpAddr,
    pub old_state: Option<PeerState>,
    pub new_state: Option<PeerState>,
}

/// One BGP message as observed on a collector session. Only UPDATE bodies
/// are decoded; the other message types carry no element-level information.
#[derive(Debug, Clone)]
pub struct Bgp4MpMessage {
    pub peer_asn: u32,
    pub peer_ip: IpAddr,
    pub update: Option<BgpUpdate>,
}

#[derive(Debug, Clone)]
pub struct BgpUpdate {
    pub withdrawn: Vec<NetworkPrefix>,
    pub announced: Vec<NetworkPrefix>,
    pub attributes: ParsedAttributes,
}

pub(crate) fn parse_bgp4mp(sub_type: u16, data: &[u8]) -> Result<Bgp4Mp, ParserError> {
    let msg_type = Bgp4MpType::try_from(sub_type)?;
    match msg_type {
        Bgp4MpType::StateChange | Bgp4MpType::StateChangeAs4 => {
            parse_state_change(data, msg_type.asn_length()).map(Bgp4Mp::StateChange)
        }
        _ => parse_message(data, msg_type).map(Bgp4Mp::Message),
    }
}

/// Common BGP4MP prologue: peer/local ASN, interface index, address family,
/// peer/local address.
fn parse_prologue(data: &mut &[u8], asn_len: AsnLength) -> Result<(u32, IpAddr), ParserError> {
    let peer_asn = data.read_asn(asn_len)?;
    let _local_asn = data.read_asn(asn_len)?;
    let _interface_index = data.read_u16()?;
    let afi = Afi::try_from(data.read_u16()?)?;
    let peer_ip = data.read_address(afi)?;
    let _local_ip = data.read_address(afi)?;
    Ok((peer_asn, peer_ip))
}

fn parse_state_change(
    mut data: &[u8],
    asn_len: AsnLength,
) -> Result<Bgp4MpStateChange, ParserError> {
    let (peer_asn, peer_ip) = parse_prologue(&mut data, asn_len)?;
    let old_state = PeerState::try_from(data.read_u16()?).ok();
    let new_state = PeerState::try_from(data.read_u16()?).ok();
    Ok(Bgp4MpStateChange {
        peer_asn,
        peer_ip,
        old_state,
        new_state,
    })
}

const BGP_MESSAGE_TYPE_UPDATE: u8 = 2;

fn parse_message(mut data: &[u8], msg_type: Bgp4MpType) -> Result<Bgp4MpMessage, ParserError> {
    let asn_len = msg_type.asn_length();
    let add_path = msg_type.is_add_path();
    let (peer_asn, peer_ip) = parse_prologue(&mut data, asn_len)?;

    // BGP message header: 16-byte marker, length, type
    data.require_n_remaining(19, "BGP message header")?;
    data.advance(16)?;
    let length = data.read_u16()?;
    if !(19..=4096).contains(&length) {
        return Err(ParserError::ParseError(format!(
            "invalid BGP message length: {}",
            length
        )));
    }
    let body_len = (length as usize - 19).min(data.remaining() - 1);
    let bgp_msg_type = data.read_u8()?;
    if data.remaining() != body_len {
        warn!(
            "BGP message length {} does not match available bytes {}",
            body_len,
            data.remaining()
        );
    }
    let mut body = data.split_to(body_len)?;

    let update = match bgp_msg_type {
        BGP_MESSAGE_TYPE_UPDATE => Some(parse_bgp_update(&mut body, asn_len, add_path)?),
        // OPEN, NOTIFICATION, KEEPALIVE: nothing element-level to extract
        _ => None,
    };

    Ok(Bgp4MpMessage {
        peer_asn,
        peer_ip,
        update,
    })
}

/// BGP UPDATE (RFC 4271 section 4.3): withdrawn routes, path attributes,
/// then IPv4 NLRI filling the remainder. IPv6 reachability travels in
/// MP_REACH/MP_UNREACH attributes.
fn parse_bgp_update(
    data: &mut &[u8],
    asn_len: AsnLength,
    add_path: bool,
) -> Result<BgpUpdate, ParserError> {
    let withdrawn_len = data.read_u16()? as usize;
    let mut withdrawn_data = data.split_to(withdrawn_len)?;
    let mut withdrawn = vec![];
    while withdrawn_data.remaining() > 0 {
        withdrawn.push(withdrawn_data.read_nlri_prefix(Afi::Ipv4, add_path)?);
    }

    let attr_len = data.read_u16()? as usize;
    let attr_data = data.split_to(attr_len)?;
    let attributes = parse_attributes(attr_data, asn_len, add_path, false)?;

    let mut announced = vec![];
    while data.remaining() > 0 {
        announced.push(data.read_nlri_prefix(Afi::Ipv4, add_path)?);
    }

    Ok(BgpUpdate {
        withdrawn,
        announced,
        attributes,
    })
}
