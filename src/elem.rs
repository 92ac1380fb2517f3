/*!
Per-prefix BGP element model.

Each MRT record may carry reachability information for many prefixes. The
stream breaks records down into [`BgpElem`] values, one self-contained piece
of BGP information per prefix (or per peer-state transition), so that
fine-grained filtering and downstream analysis can work per element.
*/
use ipnet::IpNet;
use itertools::Itertools;
use std::fmt::{Debug, Display, Formatter};
use std::net::IpAddr;
use std::str::FromStr;

/// Element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ElemType {
    /// An entry from a RIB table dump.
    Rib,
    /// An announced/reachable prefix.
    Announce,
    /// A withdrawn/unreachable prefix.
    Withdraw,
    /// A BGP session state transition on the collector.
    PeerState,
}

impl Display for ElemType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let c = match self {
            ElemType::Rib => "R",
            ElemType::Announce => "A",
            ElemType::Withdraw => "W",
            ElemType::PeerState => "S",
        };
        write!(f, "{}", c)
    }
}

/// BGP finite state machine states, as carried in BGP4MP state-change records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PeerState {
    Idle,
    Connect,
    Active,
    OpenSent,
    OpenConfirm,
    Established,
}

impl TryFrom<u16> for PeerState {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PeerState::Idle),
            2 => Ok(PeerState::Connect),
            3 => Ok(PeerState::Active),
            4 => Ok(PeerState::OpenSent),
            5 => Ok(PeerState::OpenConfirm),
            6 => Ok(PeerState::Established),
            v => Err(v),
        }
    }
}

impl Display for PeerState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", *self as u16 + 1)
    }
}

/// An IP prefix with optional ADD-PATH identifier.
#[derive(PartialEq, Eq, Clone, Copy, Hash)]
pub struct NetworkPrefix {
    pub prefix: IpNet,
    pub path_id: u32,
}

impl NetworkPrefix {
    pub fn new(prefix: IpNet, path_id: u32) -> NetworkPrefix {
        NetworkPrefix { prefix, path_id }
    }
}

impl Debug for NetworkPrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.path_id == 0 {
            write!(f, "{}", self.prefix)
        } else {
            write!(f, "{}#{}", self.prefix, self.path_id)
        }
    }
}

impl Display for NetworkPrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.prefix)
    }
}

impl FromStr for NetworkPrefix {
    type Err = ipnet::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let prefix = IpNet::from_str(s)?;
        Ok(NetworkPrefix { prefix, path_id: 0 })
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for NetworkPrefix {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// One segment of an AS path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AsPathSegment {
    AsSequence(Vec<u32>),
    AsSet(Vec<u32>),
}

/// An AS path: an ordered list of sequence and set segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AsPath {
    pub segments: Vec<AsPathSegment>,
}

impl AsPath {
    pub fn from_sequence(asns: Vec<u32>) -> AsPath {
        AsPath {
            segments: vec![AsPathSegment::AsSequence(asns)],
        }
    }

    /// Number of ASNs on the path, sets counted as one hop.
    pub fn route_len(&self) -> usize {
        self.segments
            .iter()
            .map(|seg| match seg {
                AsPathSegment::AsSequence(v) => v.len(),
                AsPathSegment::AsSet(_) => 1,
            })
            .sum()
    }

    /// The origin ASNs of the path (more than one when the origin is an AS set).
    pub fn origin_asns(&self) -> Option<Vec<u32>> {
        match self.segments.last()? {
            AsPathSegment::AsSequence(v) => v.last().map(|asn| vec![*asn]),
            AsPathSegment::AsSet(v) => Some(v.clone()),
        }
    }

    /// Merge an AS_PATH with its AS4_PATH counterpart (RFC 6793 section 4.2.3):
    /// the 4-byte path replaces the tail of the 2-byte path.
    pub fn merge_as4_path(as_path: &AsPath, as4_path: &AsPath) -> AsPath {
        let len = as_path.route_len();
        let len4 = as4_path.route_len();
        if len4 >= len {
            return as4_path.clone();
        }
        let mut asns: Vec<u32> = vec![];
        for seg in &as_path.segments {
            if let AsPathSegment::AsSequence(v) = seg {
                asns.extend(v);
            }
        }
        asns.truncate(len - len4);
        let mut merged = AsPath {
            segments: vec![AsPathSegment::AsSequence(asns)],
        };
        merged.segments.extend(as4_path.segments.clone());
        merged
    }
}

impl Display for AsPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let segs = self
            .segments
            .iter()
            .map(|seg| match seg {
                AsPathSegment::AsSequence(v) => v.iter().join(" "),
                AsPathSegment::AsSet(v) => format!("{{{}}}", v.iter().join(",")),
            })
            .join(" ");
        write!(f, "{}", segs)
    }
}

/// Path origin attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Origin {
    Igp,
    Egp,
    Incomplete,
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Origin::Igp => "IGP",
            Origin::Egp => "EGP",
            Origin::Incomplete => "INCOMPLETE",
        };
        write!(f, "{}", s)
    }
}

/// A plain BGP community value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Community {
    pub asn: u16,
    pub value: u16,
}

impl Display for Community {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.asn, self.value)
    }
}

/// One self-contained piece of BGP information about a single prefix (or a
/// peer state transition).
///
/// Duplicating shared attributes across the elements of one record costs
/// memory but keeps every element independently filterable and printable.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BgpElem {
    pub timestamp: u32,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub elem_type: ElemType,
    pub peer_ip: IpAddr,
    pub peer_asn: u32,
    /// Absent for peer-state elements.
    pub prefix: Option<NetworkPrefix>,
    pub next_hop: Option<IpAddr>,
    pub as_path: Option<AsPath>,
    pub origin: Option<Origin>,
    pub local_pref: Option<u32>,
    pub med: Option<u32>,
    pub communities: Option<Vec<Community>>,
    pub old_state: Option<PeerState>,
    pub new_state: Option<PeerState>,
}

impl Eq for BgpElem {}

impl Default for BgpElem {
    fn default() -> Self {
        BgpElem {
            timestamp: 0,
            elem_type: ElemType::Announce,
            peer_ip: IpAddr::from([0, 0, 0, 0]),
            peer_asn: 0,
            prefix: None,
            next_hop: None,
            as_path: None,
            origin: None,
            local_pref: None,
            med: None,
            communities: None,
            old_state: None,
            new_state: None,
        }
    }
}

struct OptionToStr<'a, T>(&'a Option<T>);

impl<T: Display> Display for OptionToStr<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            None => Ok(()),
            Some(x) => write!(f, "{}", x),
        }
    }
}

impl Display for BgpElem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let communities = match &self.communities {
            Some(v) => v.iter().join(" "),
            None => String::new(),
        };
        write!(
            f,
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.elem_type,
            self.timestamp,
            self.peer_ip,
            self.peer_asn,
            OptionToStr(&self.prefix),
            OptionToStr(&self.as_path),
            OptionToStr(&self.origin),
            OptionToStr(&self.next_hop),
            OptionToStr(&self.local_pref),
            OptionToStr(&self.med),
            communities,
        )
    }
}

impl BgpElem {
    pub fn is_announcement(&self) -> bool {
        self.elem_type == ElemType::Announce
    }

    /// The origin ASN, when the path ends in a single AS.
    pub fn origin_asn_opt(&self) -> Option<u32> {
        let origins = self.as_path.as_ref()?.origin_asns()?;
        (origins.len() == 1).then(|| origins[0])
    }
}
