//! Conversion from decoded MRT records to per-prefix [`BgpElem`]s.

use crate::elem::{BgpElem, ElemType};
use crate::mrt::bgp4mp::Bgp4Mp;
use crate::mrt::table_dump::{PeerIndexTable, TableDumpV2Message};
use crate::mrt::{MrtMessage, MrtRecord};
use log::warn;

/// Breaks MRT records into elements, carrying the peer index table state a
/// TABLE_DUMP_V2 dump establishes with its first record.
///
/// Element timestamps are the MRT header timestamp (archive time): that is
/// the time axis the stream merges and filters on, RIB originated times
/// notwithstanding.
#[derive(Debug, Default)]
pub struct Elementor {
    peer_table: Option<PeerIndexTable>,
}

impl Elementor {
    pub fn new() -> Elementor {
        Elementor::default()
    }

    /// Convert one record. A peer-index-table record updates internal state
    /// and yields no elements.
    pub fn record_to_elems(&mut self, record: &MrtRecord) -> Vec<BgpElem> {
        let timestamp = record.common_header.timestamp;
        let mut elems = vec![];

        match &record.message {
            MrtMessage::TableDump(msg) => {
                elems.push(BgpElem {
                    timestamp,
                    elem_type: ElemType::Rib,
                    peer_ip: msg.peer_ip,
                    peer_asn: msg.peer_asn,
                    prefix: Some(msg.prefix),
                    next_hop: msg.attributes.next_hop,
                    as_path: msg.attributes.as_path.clone(),
                    origin: msg.attributes.origin,
                    local_pref: msg.attributes.local_pref,
                    med: msg.attributes.med,
                    communities: msg.attributes.communities.clone(),
                    ..Default::default()
                });
            }

            MrtMessage::TableDumpV2(TableDumpV2Message::PeerIndexTable(table)) => {
                self.peer_table = Some(table.clone());
            }

            MrtMessage::TableDumpV2(TableDumpV2Message::RibEntries(rib)) => {
                let table = match &self.peer_table {
                    Some(t) => t,
                    None => {
                        warn!("RIB entries before peer index table; skipping record");
                        return elems;
                    }
                };
                for entry in &rib.entries {
                    let peer = match table.peer_by_index(entry.peer_index) {
                        Some(p) => p,
                        None => {
                            warn!("unknown peer index {}; skipping entry", entry.peer_index);
                            continue;
                        }
                    };
                    elems.push(BgpElem {
                        timestamp,
                        elem_type: ElemType::Rib,
                        peer_ip: peer.peer_ip,
                        peer_asn: peer.peer_asn,
                        prefix: Some(rib.prefix),
                        next_hop: entry.attributes.next_hop,
                        as_path: entry.attributes.as_path.clone(),
                        origin: entry.attributes.origin,
                        local_pref: entry.attributes.local_pref,
                        med: entry.attributes.med,
                        communities: entry.attributes.communities.clone(),
                        ..Default::default()
                    });
                }
            }

            MrtMessage::Bgp4Mp(Bgp4Mp::StateChange(sc)) => {
                elems.push(BgpElem {
                    timestamp,
                    elem_type: ElemType::PeerState,
                    peer_ip: sc.peer_ip,
                    peer_asn: sc.peer_asn,
                    old_state: sc.old_state,
                    new_state: sc.new_state,
                    ..Default::default()
                });
            }

            MrtMessage::Bgp4Mp(Bgp4Mp::Message(msg)) => {
                let update = match &msg.update {
                    Some(u) => u,
                    None => return elems,
                };
                let attrs = &update.attributes;

                for prefix in update.withdrawn.iter().chain(&attrs.mp_withdrawn) {
                    elems.push(BgpElem {
                        timestamp,
                        elem_type: ElemType::Withdraw,
                        peer_ip: msg.peer_ip,
                        peer_asn: msg.peer_asn,
                        prefix: Some(*prefix),
                        ..Default::default()
                    });
                }

                for prefix in update.announced.iter().chain(&attrs.mp_announced) {
                    elems.push(BgpElem {
                        timestamp,
                        elem_type: ElemType::Announce,
                        peer_ip: msg.peer_ip,
                        peer_asn: msg.peer_asn,
                        prefix: Some(*prefix),
                        next_hop: attrs.next_hop,
                        as_path: attrs.as_path.clone(),
                        origin: attrs.origin,
                        local_pref: attrs.local_pref,
                        med: attrs.med,
                        communities: attrs.communities.clone(),
                        ..Default::default()
                    });
                }
            }

            MrtMessage::Unsupported => {}
        }

        elems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elem::PeerState;
    use crate::mrt::bgp4mp::{Bgp4MpMessage, Bgp4MpStateChange, BgpUpdate};
    use crate::mrt::header::{CommonHeader, EntryType};
    use std::net::IpAddr;

    fn header(timestamp: u32) -> CommonHeader {
        CommonHeader {
            timestamp,
            microsecond_timestamp: None,
            entry_type: EntryType::Bgp4Mp,
            entry_subtype: 4,
            length: 0,
        }
    }

    #[test]
    fn test_update_to_elems() {
        let record = MrtRecord {
            common_header: header(1000),
            message: MrtMessage::Bgp4Mp(Bgp4Mp::Message(Bgp4MpMessage {
                peer_asn: 65000,
                peer_ip: IpAddr::from([10, 0, 0, 1]),
                update: Some(BgpUpdate {
                    withdrawn: vec!["192.0.2.0/24".parse().unwrap()],
                    announced: vec!["10.1.0.0/16".parse().unwrap()],
                    attributes: Default::default(),
                }),
            })),
        };

        let elems = Elementor::new().record_to_elems(&record);
        assert_eq!(elems.len(), 2);
        assert_eq!(elems[0].elem_type, ElemType::Withdraw);
        assert_eq!(elems[0].prefix.unwrap().to_string(), "192.0.2.0/24");
        assert_eq!(elems[1].elem_type, ElemType::Announce);
        assert_eq!(elems[1].timestamp, 1000);
    }

    #[test]
    fn test_state_change_to_elem() {
        let record = MrtRecord {
            common_header: header(2000),
            message: MrtMessage::Bgp4Mp(Bgp4Mp::StateChange(Bgp4MpStateChange {
                peer_asn: 65000,
                peer_ip: IpAddr::from([10, 0, 0, 1]),
                old_state: Some(PeerState::Idle),
                new_state: Some(PeerState::Established),
            })),
        };

        let elems = Elementor::new().record_to_elems(&record);
        assert_eq!(elems.len(), 1);
        assert_eq!(elems[0].elem_type, ElemType::PeerState);
        assert_eq!(elems[0].new_state, Some(PeerState::Established));
        assert!(elems[0].prefix.is_none());
    }

    #[test]
    fn test_rib_entries_need_peer_table() {
        use crate::mrt::table_dump::{RibAfiEntries, RibEntry};

        let record = MrtRecord {
            common_header: header(3000),
            message: MrtMessage::TableDumpV2(TableDumpV2Message::RibEntries(RibAfiEntries {
                prefix: "10.1.0.0/16".parse().unwrap(),
                entries: vec![RibEntry {
                    peer_index: 0,
                    attributes: Default::default(),
                }],
            })),
        };

        // no table yet: nothing extracted
        let mut elementor = Elementor::new();
        assert!(elementor.record_to_elems(&record).is_empty());
    }
}
