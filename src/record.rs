/*!
The record value delivered to stream consumers.

A [`BgpStreamRecord`] corresponds to one MRT record from one archive file,
annotated with the collector/project it came from, its position within a RIB
dump, and the decoded per-prefix [`BgpElem`]s that survived fine filtering.
The original wire bytes are kept for downstream re-encoding.
*/
use crate::elem::BgpElem;
use bytes::Bytes;
use std::fmt::{Display, Formatter};

/// Archive dump type. `Rib` orders before `Updates` so that a RIB dump opens
/// before the updates covering the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DumpType {
    Rib,
    Updates,
}

impl DumpType {
    /// Parse a dump type from catalog notation (`ribs` / `updates`).
    pub fn from_catalog_str(s: &str) -> Option<DumpType> {
        match s {
            "ribs" | "rib" => Some(DumpType::Rib),
            "updates" | "update" => Some(DumpType::Updates),
            _ => None,
        }
    }
}

impl Display for DumpType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DumpType::Rib => write!(f, "ribs"),
            DumpType::Updates => write!(f, "updates"),
        }
    }
}

/// Where a record sits within its RIB dump. Updates records are `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DumpPosition {
    First,
    Middle,
    Last,
    Default,
}

/// One time-ordered record emitted by [`BgpStream`](crate::BgpStream).
#[derive(Debug, Clone)]
pub struct BgpStreamRecord {
    /// Record timestamp in POSIX seconds, taken from the MRT common header.
    pub timestamp: u32,
    pub collector: String,
    pub project: String,
    pub dump_type: DumpType,
    pub position: DumpPosition,
    /// Elements that passed fine filtering, in wire order.
    pub elems: Vec<BgpElem>,
    /// The original MRT record bytes (common header included).
    pub raw: Bytes,
}

impl Display for BgpStreamRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, elem) in self.elems.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}|{}|{}", elem, self.collector, self.project)?;
        }
        Ok(())
    }
}
