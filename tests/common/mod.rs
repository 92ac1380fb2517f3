//! Byte-exact MRT fixture builders shared by the end-to-end tests.
//!
//! Fixtures are generated rather than checked in: each helper assembles one
//! wire-format MRT record, and `write_mrt_file` concatenates records into an
//! archive file the stream can open like any downloaded dump.

use std::io::Write;
use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;

const ENTRY_TYPE_TABLE_DUMP_V2: u16 = 13;
const ENTRY_TYPE_BGP4MP: u16 = 16;

const TDV2_PEER_INDEX_TABLE: u16 = 1;
const TDV2_RIB_IPV4_UNICAST: u16 = 2;

const BGP4MP_MESSAGE_AS4: u16 = 4;
const BGP4MP_STATE_CHANGE_AS4: u16 = 5;

pub fn mrt_record(timestamp: u32, entry_type: u16, subtype: u16, body: &[u8]) -> Vec<u8> {
    let mut record = vec![];
    record.extend(timestamp.to_be_bytes());
    record.extend(entry_type.to_be_bytes());
    record.extend(subtype.to_be_bytes());
    record.extend((body.len() as u32).to_be_bytes());
    record.extend(body);
    record
}

/// NLRI encoding of `a.b.c.d/len`: length byte plus the covering address bytes.
fn nlri(prefix: &str) -> Vec<u8> {
    let (addr, len) = prefix.split_once('/').expect("prefix must contain /");
    let addr = Ipv4Addr::from_str(addr).unwrap().octets();
    let len: u8 = len.parse().unwrap();
    let byte_len = (len as usize + 7) / 8;
    let mut bytes = vec![len];
    bytes.extend(&addr[..byte_len]);
    bytes
}

/// ORIGIN + AS_PATH + NEXT_HOP attribute section with 32-bit ASNs.
fn standard_attributes(as_path: &[u32]) -> Vec<u8> {
    let mut attrs = vec![0x40, 1, 1, 0]; // ORIGIN IGP

    let mut path = vec![2u8, as_path.len() as u8]; // AS_SEQUENCE
    for asn in as_path {
        path.extend(asn.to_be_bytes());
    }
    attrs.extend([0x40, 2, path.len() as u8]);
    attrs.extend(&path);

    attrs.extend([0x40, 3, 4, 10, 0, 0, 9]); // NEXT_HOP 10.0.0.9
    attrs
}

/// One BGP4MP_MESSAGE_AS4 record with an UPDATE announcing and withdrawing
/// IPv4 prefixes from `peer_asn` at 10.0.0.1.
pub fn bgp4mp_update(
    timestamp: u32,
    peer_asn: u32,
    announce: &[&str],
    withdraw: &[&str],
) -> Vec<u8> {
    let mut body: Vec<u8> = vec![];
    body.extend(peer_asn.to_be_bytes());
    body.extend(64999u32.to_be_bytes()); // local ASN
    body.extend([0, 0]); // interface index
    body.extend([0, 1]); // AFI IPv4
    body.extend([10, 0, 0, 1]); // peer IP
    body.extend([10, 0, 0, 2]); // local IP

    let mut update: Vec<u8> = vec![];
    let withdrawn: Vec<u8> = withdraw.iter().flat_map(|p| nlri(p)).collect();
    update.extend((withdrawn.len() as u16).to_be_bytes());
    update.extend(&withdrawn);
    let attrs = match announce.is_empty() {
        true => vec![],
        false => standard_attributes(&[peer_asn, 65020]),
    };
    update.extend((attrs.len() as u16).to_be_bytes());
    update.extend(&attrs);
    for prefix in announce {
        update.extend(nlri(prefix));
    }

    body.extend([0xff; 16]); // marker
    body.extend(((19 + update.len()) as u16).to_be_bytes());
    body.push(2); // UPDATE
    body.extend(&update);

    mrt_record(timestamp, ENTRY_TYPE_BGP4MP, BGP4MP_MESSAGE_AS4, &body)
}

/// One BGP4MP_STATE_CHANGE_AS4 record (idle -> established).
pub fn bgp4mp_state_change(timestamp: u32, peer_asn: u32) -> Vec<u8> {
    let mut body: Vec<u8> = vec![];
    body.extend(peer_asn.to_be_bytes());
    body.extend(64999u32.to_be_bytes());
    body.extend([0, 0]);
    body.extend([0, 1]);
    body.extend([10, 0, 0, 1]);
    body.extend([10, 0, 0, 2]);
    body.extend([0, 1]); // old state: idle
    body.extend([0, 6]); // new state: established

    mrt_record(timestamp, ENTRY_TYPE_BGP4MP, BGP4MP_STATE_CHANGE_AS4, &body)
}

/// The peer index table record heading a TABLE_DUMP_V2 RIB dump. Peers sit
/// at 10.0.0.1, 10.0.0.2, ... in index order.
pub fn peer_index_table(timestamp: u32, peer_asns: &[u32]) -> Vec<u8> {
    let mut body: Vec<u8> = vec![];
    body.extend([10, 0, 0, 255]); // collector BGP id
    body.extend([0, 0]); // view name length
    body.extend((peer_asns.len() as u16).to_be_bytes());
    for (i, asn) in peer_asns.iter().enumerate() {
        body.push(0b10); // IPv4 peer, 32-bit ASN
        body.extend([10, 0, 0, 254]); // peer BGP id
        body.extend([10, 0, 0, (i + 1) as u8]); // peer IP
        body.extend(asn.to_be_bytes());
    }

    mrt_record(
        timestamp,
        ENTRY_TYPE_TABLE_DUMP_V2,
        TDV2_PEER_INDEX_TABLE,
        &body,
    )
}

/// One RIB_IPV4_UNICAST record: a single entry from peer index 0.
pub fn rib_entry(timestamp: u32, sequence: u32, prefix: &str, origin_asn: u32) -> Vec<u8> {
    let mut body: Vec<u8> = vec![];
    body.extend(sequence.to_be_bytes());
    body.extend(nlri(prefix));
    body.extend([0, 1]); // entry count
    body.extend([0, 0]); // peer index
    body.extend(timestamp.to_be_bytes()); // originated time
    let attrs = standard_attributes(&[65010, origin_asn]);
    body.extend((attrs.len() as u16).to_be_bytes());
    body.extend(&attrs);

    mrt_record(
        timestamp,
        ENTRY_TYPE_TABLE_DUMP_V2,
        TDV2_RIB_IPV4_UNICAST,
        &body,
    )
}

/// A complete RIB dump file: peer index table plus one entry per prefix.
pub fn rib_dump(timestamp: u32, prefixes: &[&str]) -> Vec<Vec<u8>> {
    let mut records = vec![peer_index_table(timestamp, &[65010])];
    for (i, prefix) in prefixes.iter().enumerate() {
        records.push(rib_entry(timestamp, i as u32, prefix, 65020));
    }
    records
}

pub fn write_mrt_file(path: &Path, records: &[Vec<u8>]) {
    let mut file = std::fs::File::create(path).unwrap();
    for record in records {
        file.write_all(record).unwrap();
    }
}

/// Write a CSV catalog row per `(path, type, collector, filetime)` entry,
/// all under project `ris` with runtime 1.
pub fn write_csv_catalog(path: &Path, rows: &[(&str, &str, &str, u32)]) {
    let mut file = std::fs::File::create(path).unwrap();
    for (file_path, dump_type, collector, file_time) in rows {
        writeln!(
            file,
            "{},{},{},ris,{},1",
            file_path, dump_type, collector, file_time
        )
        .unwrap();
    }
}
