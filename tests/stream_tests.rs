//! End-to-end tests driving the full pipeline over generated MRT archives.

mod common;

use bgpstream::{
    BgpStream, DataSourceId, DumpPosition, DumpType, ElemType, FilterKind, FilterSet, FOREVER,
};
use common::*;
use std::path::PathBuf;

fn collect(stream: &mut BgpStream) -> Vec<bgpstream::BgpStreamRecord> {
    let mut records = vec![];
    while let Some(record) = stream.next_record().unwrap() {
        records.push(record);
    }
    records
}

/// Single RIB file end to end: records in file order with first/middle/last
/// positions.
#[test]
fn test_single_rib_file_positions() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let rib_path = dir.path().join("rib.mrt");
    write_mrt_file(
        &rib_path,
        &rib_dump(1000, &["10.1.0.0/16", "10.2.0.0/16", "10.3.0.0/16"]),
    );

    let mut stream = BgpStream::new();
    // bounded interval reaching past the poll-time file timestamp
    stream.add_interval(0, FOREVER - 1).unwrap();
    stream
        .set_data_interface_option("rib-file", rib_path.to_str().unwrap())
        .unwrap();
    stream.start().unwrap();

    let records = collect(&mut stream);
    assert_eq!(records.len(), 3);
    let positions: Vec<DumpPosition> = records.iter().map(|r| r.position).collect();
    assert_eq!(
        positions,
        vec![DumpPosition::First, DumpPosition::Middle, DumpPosition::Last]
    );
    let prefixes: Vec<String> = records
        .iter()
        .map(|r| r.elems[0].prefix.unwrap().to_string())
        .collect();
    assert_eq!(prefixes, vec!["10.1.0.0/16", "10.2.0.0/16", "10.3.0.0/16"]);
    for record in &records {
        assert_eq!(record.dump_type, DumpType::Rib);
        assert_eq!(record.elems[0].elem_type, ElemType::Rib);
        assert!(!record.raw.is_empty());
    }
}

fn csv_two_collector_setup(dir: &tempfile::TempDir) -> PathBuf {
    // collector A: RIB at 100 and updates at 150; collector B: updates at 120
    write_mrt_file(
        &dir.path().join("a-rib.mrt"),
        &rib_dump(100, &["10.1.0.0/16"]),
    );
    write_mrt_file(
        &dir.path().join("a-updates.mrt"),
        &[bgp4mp_update(150, 65001, &["10.2.0.0/16"], &[])],
    );
    write_mrt_file(
        &dir.path().join("b-updates.mrt"),
        &[bgp4mp_update(120, 65002, &["192.0.2.0/24"], &[])],
    );

    let catalog = dir.path().join("catalog.csv");
    write_csv_catalog(
        &catalog,
        &[
            ("a-rib.mrt", "ribs", "collector-a", 100),
            ("a-updates.mrt", "updates", "collector-a", 150),
            ("b-updates.mrt", "updates", "collector-b", 120),
        ],
    );
    catalog
}

fn csv_stream(dir: &tempfile::TempDir, catalog: &PathBuf) -> BgpStream {
    let mut stream = BgpStream::new();
    stream.set_data_interface(DataSourceId::CsvFile).unwrap();
    stream
        .set_data_interface_option("csv-file", catalog.to_str().unwrap())
        .unwrap();
    stream
        .set_data_interface_option("dump-path", dir.path().to_str().unwrap())
        .unwrap();
    stream
}

/// CSV catalog across two collectors: emission strictly by timestamp.
#[test]
fn test_csv_catalog_merges_by_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = csv_two_collector_setup(&dir);

    let mut stream = csv_stream(&dir, &catalog);
    stream.add_interval(0, 200).unwrap();
    stream.start().unwrap();

    let records = collect(&mut stream);
    let emitted: Vec<(u32, String, DumpType)> = records
        .iter()
        .map(|r| (r.timestamp, r.collector.clone(), r.dump_type))
        .collect();
    assert_eq!(
        emitted,
        vec![
            (100, "collector-a".to_string(), DumpType::Rib),
            (120, "collector-b".to_string(), DumpType::Updates),
            (150, "collector-a".to_string(), DumpType::Updates),
        ]
    );
    assert_eq!(stream.stats().records_emitted, 3);
    assert!(stream.take_reader_errors().is_empty());
}

/// Same fixture with a prefix filter: only records inside 10/8 survive.
#[test]
fn test_prefix_filter_narrows_stream() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = csv_two_collector_setup(&dir);

    let mut stream = csv_stream(&dir, &catalog);
    stream.add_interval(0, 200).unwrap();
    stream.add_filter(FilterKind::Prefix, "10.0.0.0/8").unwrap();
    stream.start().unwrap();

    let records = collect(&mut stream);
    assert_eq!(records.len(), 2);
    for record in &records {
        for elem in &record.elems {
            assert!(elem.prefix.unwrap().to_string().starts_with("10."));
        }
    }
}

/// Filter soundness: every emitted element passes an equivalent filter set.
#[test]
fn test_emitted_elements_satisfy_filters() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = csv_two_collector_setup(&dir);

    let mut stream = csv_stream(&dir, &catalog);
    stream.add_interval(110, 200).unwrap();
    stream.add_filter(FilterKind::ElemType, "announcements").unwrap();
    stream.start().unwrap();

    let mut reference = FilterSet::new();
    reference.add_interval(110, 200).unwrap();
    reference.add(FilterKind::ElemType, "announcements").unwrap();

    let records = collect(&mut stream);
    assert!(!records.is_empty());
    for record in &records {
        assert!(!record.elems.is_empty());
        for elem in &record.elems {
            assert!(reference.fine_match(elem));
        }
    }
    // the RIB at 100 is outside the interval
    assert!(records.iter().all(|r| r.timestamp >= 110));
}

/// RIB-period dedup: of two RIBs for one collector half a period apart, only
/// the earlier is emitted.
#[test]
fn test_rib_period_keeps_earlier_dump() {
    let dir = tempfile::tempdir().unwrap();
    write_mrt_file(
        &dir.path().join("rib-1000.mrt"),
        &rib_dump(1000, &["10.1.0.0/16"]),
    );
    write_mrt_file(
        &dir.path().join("rib-2000.mrt"),
        &rib_dump(2000, &["10.1.0.0/16"]),
    );
    let catalog = dir.path().join("catalog.csv");
    write_csv_catalog(
        &catalog,
        &[
            ("rib-1000.mrt", "ribs", "collector-a", 1000),
            ("rib-2000.mrt", "ribs", "collector-a", 2000),
        ],
    );

    let mut stream = csv_stream(&dir, &catalog);
    stream.add_interval(0, 5000).unwrap();
    stream.add_rib_period_filter(3600).unwrap();
    stream.start().unwrap();

    let records = collect(&mut stream);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].timestamp, 1000);
}

/// Records with identical timestamps interleave by collector name, then RIB
/// before UPDATES.
#[test]
fn test_equal_timestamp_tie_breaks() {
    let dir = tempfile::tempdir().unwrap();
    write_mrt_file(
        &dir.path().join("bbb-updates.mrt"),
        &[bgp4mp_update(100, 65001, &["10.1.0.0/16"], &[])],
    );
    write_mrt_file(
        &dir.path().join("aaa-updates.mrt"),
        &[bgp4mp_update(100, 65002, &["10.2.0.0/16"], &[])],
    );
    write_mrt_file(
        &dir.path().join("aaa-rib.mrt"),
        &rib_dump(100, &["10.3.0.0/16"]),
    );
    let catalog = dir.path().join("catalog.csv");
    write_csv_catalog(
        &catalog,
        &[
            ("bbb-updates.mrt", "updates", "bbb", 100),
            ("aaa-updates.mrt", "updates", "aaa", 100),
            ("aaa-rib.mrt", "ribs", "aaa", 100),
        ],
    );

    let mut stream = csv_stream(&dir, &catalog);
    stream.add_interval(0, 200).unwrap();
    stream.start().unwrap();

    let emitted: Vec<(String, DumpType)> = collect(&mut stream)
        .iter()
        .map(|r| (r.collector.clone(), r.dump_type))
        .collect();
    assert_eq!(
        emitted,
        vec![
            ("aaa".to_string(), DumpType::Rib),
            ("aaa".to_string(), DumpType::Updates),
            ("bbb".to_string(), DumpType::Updates),
        ]
    );
}

/// Monotonic emission over many interleaved files and element kinds.
#[test]
fn test_monotonic_emission_across_files() {
    let dir = tempfile::tempdir().unwrap();
    write_mrt_file(
        &dir.path().join("a.mrt"),
        &[
            bgp4mp_update(100, 65001, &["10.1.0.0/16"], &[]),
            bgp4mp_update(130, 65001, &[], &["10.1.0.0/16"]),
            bgp4mp_update(160, 65001, &["10.1.0.0/16"], &[]),
        ],
    );
    write_mrt_file(
        &dir.path().join("b.mrt"),
        &[
            bgp4mp_state_change(110, 65002),
            bgp4mp_update(140, 65002, &["10.2.0.0/16"], &[]),
        ],
    );
    write_mrt_file(&dir.path().join("c.mrt"), &rib_dump(120, &["10.3.0.0/16"]));
    let catalog = dir.path().join("catalog.csv");
    write_csv_catalog(
        &catalog,
        &[
            ("a.mrt", "updates", "aaa", 100),
            ("b.mrt", "updates", "bbb", 110),
            ("c.mrt", "ribs", "ccc", 120),
        ],
    );

    let mut stream = csv_stream(&dir, &catalog);
    stream.add_interval(0, 500).unwrap();
    stream.start().unwrap();

    let records = collect(&mut stream);
    assert_eq!(records.len(), 6);
    let timestamps: Vec<u32> = records.iter().map(|r| r.timestamp).collect();
    let mut sorted = timestamps.clone();
    sorted.sort();
    assert_eq!(timestamps, sorted);
    assert_eq!(stream.stats().monotonicity_violations, 0);

    // a withdrawal and a peer state change both made it through
    let elem_types: Vec<ElemType> = records.iter().map(|r| r.elems[0].elem_type).collect();
    assert!(elem_types.contains(&ElemType::Withdraw));
    assert!(elem_types.contains(&ElemType::PeerState));
}

/// An unreadable catalog entry fails its reader only; the stream plays the
/// remaining files and reports the failure out of band.
#[test]
fn test_unreadable_file_does_not_fail_stream() {
    let dir = tempfile::tempdir().unwrap();
    write_mrt_file(
        &dir.path().join("good.mrt"),
        &[bgp4mp_update(100, 65001, &["10.1.0.0/16"], &[])],
    );
    // declared by the catalog, nonexistent on disk
    let catalog = dir.path().join("catalog.csv");
    write_csv_catalog(
        &catalog,
        &[
            ("missing.mrt", "updates", "aaa", 50),
            ("good.mrt", "updates", "bbb", 100),
        ],
    );

    let mut stream = csv_stream(&dir, &catalog);
    stream.add_interval(0, 200).unwrap();
    stream.start().unwrap();

    let records = collect(&mut stream);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].collector, "bbb");

    let errors = stream.take_reader_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].path.ends_with("missing.mrt"));
    assert_eq!(errors[0].collector, "aaa");
}

/// A truncated file counts as a reader failure after its intact prefix.
#[test]
fn test_truncated_file_reports_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = bgp4mp_update(100, 65001, &["10.1.0.0/16"], &[]);
    let mut second = bgp4mp_update(200, 65001, &["10.2.0.0/16"], &[]);
    second.truncate(second.len() - 5);
    bytes.extend(&second);
    std::fs::write(dir.path().join("damaged.mrt"), &bytes).unwrap();

    let catalog = dir.path().join("catalog.csv");
    write_csv_catalog(&catalog, &[("damaged.mrt", "updates", "aaa", 100)]);

    let mut stream = csv_stream(&dir, &catalog);
    stream.add_interval(0, 500).unwrap();
    stream.start().unwrap();

    let records = collect(&mut stream);
    assert!(records.len() <= 1);
    assert_eq!(stream.take_reader_errors().len(), 1);
}

/// SQLite catalog end to end, with the peer-ASN filter applied per element.
#[test]
fn test_sqlite_catalog_with_peer_filter() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_mrt_file(
        &dir.path().join("a.mrt"),
        &[bgp4mp_update(100, 65001, &["10.1.0.0/16"], &[])],
    );
    write_mrt_file(
        &dir.path().join("b.mrt"),
        &[bgp4mp_update(120, 65002, &["10.2.0.0/16"], &[])],
    );

    let db_path = dir.path().join("catalog.db");
    let conn = rusqlite::Connection::open(&db_path)?;
    conn.execute_batch(
        "CREATE TABLE archive_files (
            path TEXT NOT NULL, type TEXT NOT NULL, collector TEXT NOT NULL,
            project TEXT NOT NULL, file_time INTEGER NOT NULL, added_ts INTEGER NOT NULL
        );",
    )?;
    conn.execute(
        "INSERT INTO archive_files VALUES ('a.mrt', 'updates', 'aaa', 'ris', 100, 1)",
        [],
    )?;
    conn.execute(
        "INSERT INTO archive_files VALUES ('b.mrt', 'updates', 'bbb', 'ris', 120, 1)",
        [],
    )?;
    drop(conn);

    let mut stream = BgpStream::new();
    stream.set_data_interface(DataSourceId::Sqlite)?;
    stream.set_data_interface_option("db-file", db_path.to_str().unwrap())?;
    stream.set_data_interface_option("dump-path", dir.path().to_str().unwrap())?;
    stream.add_interval(0, 500)?;
    stream.add_filter(FilterKind::PeerAsn, "65002")?;
    stream.start()?;

    let records = collect(&mut stream);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].collector, "bbb");
    assert_eq!(records[0].elems[0].peer_asn, 65002);
    Ok(())
}

/// Updates records always carry the default dump position.
#[test]
fn test_updates_have_default_position() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("updates.mrt");
    write_mrt_file(
        &path,
        &[
            bgp4mp_update(100, 65001, &["10.1.0.0/16"], &[]),
            bgp4mp_update(110, 65001, &["10.2.0.0/16"], &[]),
        ],
    );

    let mut stream = BgpStream::new();
    stream.add_interval(0, FOREVER - 1).unwrap();
    stream
        .set_data_interface_option("upd-file", path.to_str().unwrap())
        .unwrap();
    stream.start().unwrap();

    let records = collect(&mut stream);
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.position == DumpPosition::Default));
    assert!(records.iter().all(|r| r.dump_type == DumpType::Updates));
}
