/*!
Stream filters.

A [`FilterSet`] bundles the caller's selection predicates and answers two
kinds of match queries:

- [`coarse_match`](FilterSet::coarse_match) decides per *file* whether an
  archive is worth opening at all. It runs before any decoding and is cheap.
- [`fine_match`](FilterSet::fine_match) decides per decoded *element* whether
  it is delivered. It runs after decoding and carries the expensive
  predicates (peer, prefix, AS path).

The split mirrors the two places filtering happens in the pipeline: the input
queue only ever sees files that passed the coarse check, and readers only
ever surface elements that passed the fine check.

Available filter kinds (string name -- value):

- `project` -- project name (e.g. `ris`, `routeviews`)
- `collector` -- collector name (e.g. `rrc00`)
- `record-type` -- dump file type, `ribs` or `updates`
- `peer-asn` -- peer AS number
- `prefix` (`-exact`, `-super`, `-any`) -- network prefix and match type
- `elem-type` -- `ribs`, `announcements`, `withdrawals` or `peerstates`
- `aspath` -- regular expression over the space-joined AS path
*/
use crate::elem::{BgpElem, ElemType};
use crate::error::BgpStreamError;
use crate::input::InputDescriptor;
use crate::record::DumpType;
use crate::time::{now, parse_duration, FOREVER};
use ipnet::IpNet;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// Nominal duration of one dump file, used to widen interval overlap checks
/// at the coarse stage. Over-admission here is corrected by fine matching.
const DUMP_FILE_SLACK: u32 = 3600;

/// Recognized filter kinds for [`FilterSet::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Project,
    Collector,
    RecordType,
    PeerAsn,
    Prefix,
    PrefixExact,
    PrefixSuper,
    PrefixAny,
    ElemType,
    AsPath,
}

impl FromStr for FilterKind {
    type Err = BgpStreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(FilterKind::Project),
            "collector" => Ok(FilterKind::Collector),
            "record-type" => Ok(FilterKind::RecordType),
            "peer-asn" => Ok(FilterKind::PeerAsn),
            "prefix" => Ok(FilterKind::Prefix),
            "prefix-exact" => Ok(FilterKind::PrefixExact),
            "prefix-super" => Ok(FilterKind::PrefixSuper),
            "prefix-any" => Ok(FilterKind::PrefixAny),
            "elem-type" => Ok(FilterKind::ElemType),
            "aspath" => Ok(FilterKind::AsPath),
            _ => Err(BgpStreamError::InvalidFilter(format!(
                "unknown filter kind: {}",
                s
            ))),
        }
    }
}

/// Containment direction for one prefix filter entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixMatch {
    Exact,
    /// Element prefix contains the filter prefix.
    IncludeSuper,
    /// Filter prefix contains the element prefix. This is the default: a
    /// filter on `10.0.0.0/8` matches every more-specific announcement.
    IncludeSub,
    IncludeSuperSub,
}

#[derive(Debug, Clone)]
struct PrefixFilter {
    prefix: IpNet,
    match_type: PrefixMatch,
}

/// A closed time interval; `end == FOREVER` means open-ended (live).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Interval {
    pub begin: u32,
    pub end: u32,
}

impl Interval {
    pub fn contains(&self, ts: u32) -> bool {
        ts >= self.begin && ts <= self.end
    }
}

/// The caller's selection predicates, attached to a stream before `start()`.
#[derive(Debug, Default)]
pub struct FilterSet {
    intervals: Vec<Interval>,
    projects: HashSet<String>,
    collectors: HashSet<String>,
    dump_types: HashSet<DumpType>,
    peer_asns: HashSet<u32>,
    prefixes: Vec<PrefixFilter>,
    elem_types: HashSet<ElemType>,
    as_path: Option<Regex>,
    /// At most one RIB per collector per this many seconds; 0 disables.
    rib_period: u32,
    /// Per collector, the file time of the last RIB admitted by the period rule.
    rib_admitted: HashMap<String, u32>,
    live: bool,
    frozen: bool,
}

impl FilterSet {
    pub fn new() -> FilterSet {
        FilterSet::default()
    }

    fn check_mutable(&self) -> Result<(), BgpStreamError> {
        if self.frozen {
            return Err(BgpStreamError::InvalidFilter(
                "filters are frozen after start()".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and store one predicate.
    pub fn add(&mut self, kind: FilterKind, value: &str) -> Result<(), BgpStreamError> {
        self.check_mutable()?;
        match kind {
            FilterKind::Project => {
                self.projects.insert(value.to_string());
            }
            FilterKind::Collector => {
                self.collectors.insert(value.to_string());
            }
            FilterKind::RecordType => {
                let dump_type = DumpType::from_catalog_str(value).ok_or_else(|| {
                    BgpStreamError::InvalidFilter(format!("unknown record type: {}", value))
                })?;
                self.dump_types.insert(dump_type);
            }
            FilterKind::PeerAsn => {
                let asn: u32 = value.parse().map_err(|_| {
                    BgpStreamError::InvalidFilter(format!("invalid peer ASN: {}", value))
                })?;
                self.peer_asns.insert(asn);
            }
            FilterKind::Prefix
            | FilterKind::PrefixExact
            | FilterKind::PrefixSuper
            | FilterKind::PrefixAny => {
                let prefix = IpNet::from_str(value).map_err(|_| {
                    BgpStreamError::InvalidFilter(format!("invalid prefix: {}", value))
                })?;
                let match_type = match kind {
                    FilterKind::Prefix => PrefixMatch::IncludeSub,
                    FilterKind::PrefixExact => PrefixMatch::Exact,
                    FilterKind::PrefixSuper => PrefixMatch::IncludeSuper,
                    _ => PrefixMatch::IncludeSuperSub,
                };
                self.prefixes.push(PrefixFilter { prefix, match_type });
            }
            FilterKind::ElemType => {
                let elem_type = match value {
                    "ribs" | "R" => ElemType::Rib,
                    "announcements" | "A" => ElemType::Announce,
                    "withdrawals" | "W" => ElemType::Withdraw,
                    "peerstates" | "S" => ElemType::PeerState,
                    _ => {
                        return Err(BgpStreamError::InvalidFilter(format!(
                            "unknown element type: {}",
                            value
                        )))
                    }
                };
                self.elem_types.insert(elem_type);
            }
            FilterKind::AsPath => {
                let re = Regex::new(value).map_err(|e| {
                    BgpStreamError::InvalidFilter(format!("invalid aspath regex: {}", e))
                })?;
                self.as_path = Some(re);
            }
        }
        Ok(())
    }

    /// Append a time interval. An open end also flags the stream as live.
    pub fn add_interval(&mut self, begin: u32, end: u32) -> Result<(), BgpStreamError> {
        self.check_mutable()?;
        if begin > end {
            return Err(BgpStreamError::InvalidFilter(format!(
                "interval begin {} after end {}",
                begin, end
            )));
        }
        if end == FOREVER {
            self.live = true;
        }
        self.intervals.push(Interval { begin, end });
        Ok(())
    }

    /// Add an interval covering the recent past: `[now - spec, now]`, or
    /// `[now - spec, FOREVER]` when `live` is set. The specifier matches
    /// `\d+[smhdw]?`, defaulting to seconds.
    pub fn add_recent_interval(&mut self, spec: &str, live: bool) -> Result<(), BgpStreamError> {
        let duration = parse_duration(spec)?;
        let end_time = now();
        let begin = end_time.saturating_sub(duration);
        let end = if live { FOREVER } else { end_time };
        self.add_interval(begin, end)
    }

    /// Emit at most one RIB dump per collector per `period` seconds.
    pub fn add_rib_period(&mut self, period: u32) -> Result<(), BgpStreamError> {
        self.check_mutable()?;
        self.rib_period = period;
        Ok(())
    }

    /// Validation run by `start()`: at least one interval must exist.
    pub fn validate(&self) -> Result<(), BgpStreamError> {
        if self.intervals.is_empty() {
            return Err(BgpStreamError::NoInterval);
        }
        Ok(())
    }

    /// Reject further mutation; called by `start()`.
    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Whether some interval is open-ended.
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Earliest begin over all intervals.
    pub(crate) fn min_begin(&self) -> u32 {
        self.intervals.iter().map(|i| i.begin).min().unwrap_or(0)
    }

    /// Latest end over all intervals (`FOREVER` when live).
    pub(crate) fn max_end(&self) -> u32 {
        self.intervals.iter().map(|i| i.end).max().unwrap_or(FOREVER)
    }

    pub(crate) fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    fn timestamp_in_intervals(&self, ts: u32) -> bool {
        self.intervals.iter().any(|i| i.contains(ts))
    }

    /// Collector names a SQL backend can push down into its query.
    pub fn collector_names(&self) -> impl Iterator<Item = &str> {
        self.collectors.iter().map(String::as_str)
    }

    /// Project names a SQL backend can push down into its query.
    pub fn project_names(&self) -> impl Iterator<Item = &str> {
        self.projects.iter().map(String::as_str)
    }

    /// Catalog notation of the record-type filter, if any.
    pub fn record_type_names(&self) -> Vec<&'static str> {
        self.dump_types
            .iter()
            .map(|t| match t {
                DumpType::Rib => "ribs",
                DumpType::Updates => "updates",
            })
            .collect()
    }

    /// Stateless subset of the coarse check, usable by backends while
    /// building query results: collector, project and record-type only.
    pub fn admits_file_meta(&self, input: &InputDescriptor) -> bool {
        (self.projects.is_empty() || self.projects.contains(&input.project))
            && (self.collectors.is_empty() || self.collectors.contains(&input.collector))
            && (self.dump_types.is_empty() || self.dump_types.contains(&input.dump_type))
    }

    /// Per-file match, applied to every descriptor a poll returns. Mutable
    /// because the RIB-period rule tracks the last admitted RIB per
    /// collector; a descriptor admitted here counts against the period
    /// window whether or not its reader later yields records.
    pub fn coarse_match(&mut self, input: &InputDescriptor) -> bool {
        // a dump file nominally covers [file_time, file_time + slack]
        let covers = self.intervals.iter().any(|i| {
            input.file_time <= i.end && input.file_time.saturating_add(DUMP_FILE_SLACK) >= i.begin
        });
        if !covers {
            return false;
        }

        if !self.admits_file_meta(input) {
            return false;
        }

        // elem-type filters imply file types: a RIB file can only yield RIB
        // elements, an updates file can never yield them
        if !self.elem_types.is_empty() {
            let possible = match input.dump_type {
                DumpType::Rib => self.elem_types.contains(&ElemType::Rib),
                DumpType::Updates => {
                    self.elem_types.contains(&ElemType::Announce)
                        || self.elem_types.contains(&ElemType::Withdraw)
                        || self.elem_types.contains(&ElemType::PeerState)
                }
            };
            if !possible {
                return false;
            }
        }

        if input.dump_type == DumpType::Rib && self.rib_period > 0 {
            match self.rib_admitted.get(&input.collector) {
                Some(last) if input.file_time < last.saturating_add(self.rib_period) => {
                    return false;
                }
                _ => {
                    self.rib_admitted
                        .insert(input.collector.clone(), input.file_time);
                }
            }
        }

        true
    }

    /// Per-element match, applied after decoding.
    pub fn fine_match(&self, elem: &BgpElem) -> bool {
        if !self.timestamp_in_intervals(elem.timestamp) {
            return false;
        }

        if !self.elem_types.is_empty() && !self.elem_types.contains(&elem.elem_type) {
            return false;
        }

        if !self.peer_asns.is_empty() && !self.peer_asns.contains(&elem.peer_asn) {
            return false;
        }

        if !self.prefixes.is_empty() {
            let matched = match &elem.prefix {
                Some(p) => self
                    .prefixes
                    .iter()
                    .any(|f| prefix_match(&f.prefix, &p.prefix, f.match_type)),
                // peer-state elements carry no prefix
                None => false,
            };
            if !matched {
                return false;
            }
        }

        if let Some(re) = &self.as_path {
            let matched = match &elem.as_path {
                Some(path) => re.is_match(path.to_string().as_str()),
                None => false,
            };
            if !matched {
                return false;
            }
        }

        true
    }
}

fn prefix_match(filter_prefix: &IpNet, elem_prefix: &IpNet, t: PrefixMatch) -> bool {
    if elem_prefix == filter_prefix {
        return true;
    }

    match t {
        PrefixMatch::Exact => false,
        PrefixMatch::IncludeSuper => elem_prefix.contains(filter_prefix),
        PrefixMatch::IncludeSub => filter_prefix.contains(elem_prefix),
        PrefixMatch::IncludeSuperSub => {
            elem_prefix.contains(filter_prefix) || filter_prefix.contains(elem_prefix)
        }
    }
}
