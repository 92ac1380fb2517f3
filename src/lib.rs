/*!
BGPStream is a library for ingesting historical and live BGP routing data.

It unifies metadata sources that enumerate archive files of MRT-formatted
BGP dumps into a single filtered, time-ordered stream of records, delivered
one at a time to the consumer.

# Examples

## Replaying a downloaded dump file

```no_run
use bgpstream::BgpStream;

let mut stream = BgpStream::new();
stream.add_interval(0, bgpstream::FOREVER).unwrap();
stream
    .set_data_interface_option("rib-file", "rib.20211001.0000.gz")
    .unwrap();
stream.start().unwrap();

while let Some(record) = stream.next_record().unwrap() {
    for elem in &record.elems {
        println!("{}|{}", elem, record.collector);
    }
}
```

## Streaming from a catalog with filters

A catalog backend (CSV or SQLite) enumerates many files across collectors;
the stream opens them as needed and merges their records in timestamp order.

```no_run
use bgpstream::{BgpStream, DataSourceId, FilterKind};

let mut stream = BgpStream::new();
stream.set_data_interface(DataSourceId::CsvFile).unwrap();
stream
    .set_data_interface_option("csv-file", "archive-index.csv")
    .unwrap();
stream.add_interval(1633046400, 1633050000).unwrap();
stream.add_filter(FilterKind::Collector, "rrc00").unwrap();
stream.add_filter(FilterKind::Prefix, "10.0.0.0/8").unwrap();
stream.start().unwrap();

while let Some(record) = stream.next_record().unwrap() {
    println!("{}", record);
}
```

## Live mode

With an open-ended interval the stream never terminates: when the data
interface runs dry, `next_record` blocks and re-polls with exponential
backoff until new files appear.

```no_run
use bgpstream::BgpStream;

let mut stream = BgpStream::new();
stream.add_recent_interval("1h", true).unwrap();
# stream.set_data_interface_option("upd-file", "updates.mrt").unwrap();
stream.start().unwrap();

// hand the handle to a signal handler to stop a blocked next_record
let interrupt = stream.interrupt_handle();

while let Some(record) = stream.next_record().unwrap() {
    println!("{}", record);
}
```

# Records and elements

Each [`BgpStreamRecord`] corresponds to one MRT record, annotated with its
collector, project, dump type and, for RIB dumps, the position within the
dump. Records carry per-prefix [`BgpElem`]s plus the original wire bytes.

The record sequence of one stream is non-decreasing in timestamp; records
with equal timestamps interleave deterministically (collector name, RIB
before UPDATES, file open order).

# Failure behaviour

A file that cannot be opened or decoded does not fail the stream: its reader
is dropped, the failure is logged and collected, and the remaining files keep
playing. Inspect the failures through
[`BgpStream::take_reader_errors`]. Transient data-interface errors are
retried with backoff and only become fatal after three consecutive failures.
*/

pub mod datasource;
pub mod elem;
pub mod error;
pub mod filter;
pub mod input;
pub mod mrt;
pub mod record;
pub mod stream;
pub(crate) mod time;

mod reader;

pub use crate::datasource::{DataSource, DataSourceId, OptionInfo, WindowHint};
pub use crate::elem::{AsPath, AsPathSegment, BgpElem, Community, ElemType, NetworkPrefix, Origin, PeerState};
pub use crate::error::{BgpStreamError, ParserError};
pub use crate::filter::{FilterKind, FilterSet, Interval, PrefixMatch};
pub use crate::input::InputDescriptor;
pub use crate::record::{BgpStreamRecord, DumpPosition, DumpType};
pub use crate::stream::{BgpStream, InterruptHandle, ReaderIssue, StreamState, StreamStats};
pub use crate::time::{parse_duration, parse_timestamp, FOREVER};
