/*!
Per-file dump readers and the priority structure merging them.

A [`DumpReader`] is a cursor over the admitted records of one archive file.
It always holds the next not-yet-delivered record (its *head*) plus a
one-record lookahead, which is what lets RIB records carry first/middle/last
positions without buffering the dump.

The [`ReaderSet`] keys every open reader by its head record and always
yields the reader holding the globally smallest one, so records cross file
boundaries in non-decreasing timestamp order. Ties break by collector name,
then RIB before UPDATES, then reader insertion order, keeping the
interleaving deterministic.
*/
use crate::error::ParserError;
use crate::filter::FilterSet;
use crate::input::InputDescriptor;
use crate::mrt::{Elementor, MrtScanner};
use crate::record::{BgpStreamRecord, DumpPosition, DumpType};
use log::debug;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// An open cursor over one archive file, primed with a head record.
pub(crate) struct DumpReader {
    input: InputDescriptor,
    scanner: MrtScanner,
    elementor: Elementor,
    head: BgpStreamRecord,
    lookahead: Option<BgpStreamRecord>,
    emitted_any: bool,
    seq: u64,
}

impl DumpReader {
    /// Open an archive file and decode forward until the first record that
    /// passes fine filtering.
    ///
    /// Returns `Ok(None)` when the file holds no admitted records at all (a
    /// valid outcome, e.g. an updates file fully outside the intervals);
    /// errors mean the file could not be opened or decoded.
    pub(crate) fn open(
        input: InputDescriptor,
        filters: &FilterSet,
        seq: u64,
    ) -> Result<Option<DumpReader>, ParserError> {
        let mut scanner = MrtScanner::open(&input.path)?;
        let mut elementor = Elementor::new();

        let head = match next_admitted(&mut scanner, &mut elementor, filters, &input)? {
            Some(record) => record,
            None => {
                debug!("no admitted records in {}", input.path);
                return Ok(None);
            }
        };
        let lookahead = next_admitted(&mut scanner, &mut elementor, filters, &input)?;

        Ok(Some(DumpReader {
            input,
            scanner,
            elementor,
            head,
            lookahead,
            emitted_any: false,
            seq,
        }))
    }

    pub(crate) fn input(&self) -> &InputDescriptor {
        &self.input
    }

    pub(crate) fn head_timestamp(&self) -> u32 {
        self.head.timestamp
    }

    fn merge_key(&self) -> (u32, &str, DumpType, u64) {
        (
            self.head.timestamp,
            &self.input.collector,
            self.input.dump_type,
            self.seq,
        )
    }

    /// Hand out the head record, annotated with its dump position.
    pub(crate) fn take_head(&mut self) -> BgpStreamRecord {
        let mut record = self.head.clone();
        record.position = match self.input.dump_type {
            DumpType::Updates => DumpPosition::Default,
            DumpType::Rib => {
                if !self.emitted_any {
                    DumpPosition::First
                } else if self.lookahead.is_none() {
                    DumpPosition::Last
                } else {
                    DumpPosition::Middle
                }
            }
        };
        self.emitted_any = true;
        record
    }

    /// Move the lookahead into head position and refill it. Returns `false`
    /// at end of file.
    pub(crate) fn advance(&mut self, filters: &FilterSet) -> Result<bool, ParserError> {
        match self.lookahead.take() {
            Some(record) => {
                self.head = record;
                self.lookahead =
                    next_admitted(&mut self.scanner, &mut self.elementor, filters, &self.input)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Decode forward until a record passes fine filtering, or EOF.
fn next_admitted(
    scanner: &mut MrtScanner,
    elementor: &mut Elementor,
    filters: &FilterSet,
    input: &InputDescriptor,
) -> Result<Option<BgpStreamRecord>, ParserError> {
    while let Some(raw) = scanner.next_record()? {
        let record = raw.parse()?;
        let elems = elementor.record_to_elems(&record);
        if elems.is_empty() {
            continue;
        }

        let admitted: Vec<_> = elems.into_iter().filter(|e| filters.fine_match(e)).collect();
        if admitted.is_empty() {
            continue;
        }

        return Ok(Some(BgpStreamRecord {
            timestamp: record.common_header.timestamp,
            collector: input.collector.clone(),
            project: input.project.clone(),
            dump_type: input.dump_type,
            position: DumpPosition::Default,
            elems: admitted,
            raw: raw.raw_bytes(),
        }));
    }
    Ok(None)
}

/// Min-ordered collection of open readers, keyed by head record.
#[derive(Default)]
pub(crate) struct ReaderSet {
    heap: BinaryHeap<HeapEntry>,
    next_seq: u64,
}

impl ReaderSet {
    pub(crate) fn new() -> ReaderSet {
        ReaderSet::default()
    }

    /// Allocate the insertion sequence number for the next reader; used as
    /// the final merge tie-break.
    pub(crate) fn alloc_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub(crate) fn push(&mut self, reader: DumpReader) {
        self.heap.push(HeapEntry(reader));
    }

    /// Remove and return the reader holding the smallest head record.
    pub(crate) fn pop_min(&mut self) -> Option<DumpReader> {
        self.heap.pop().map(|entry| entry.0)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }
}

/// Heap adapter: `BinaryHeap` is a max-heap, so the ordering is inverted to
/// surface the smallest merge key first.
struct HeapEntry(DumpReader);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.merge_key() == other.0.merge_key()
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.merge_key().cmp(&self.0.merge_key())
    }
}
