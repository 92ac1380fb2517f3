/*!
The stream coordinator.

[`BgpStream`] owns the whole pipeline: the filter set, the configured data
interface, the queue of discovered-but-unopened inputs, and the set of open
dump readers. The caller drives everything through
[`next_record`](BgpStream::next_record); downstream stages are refilled
lazily, only when upstream has drained.

```text
next_record -> ReaderSet -> InputQueue -> DataSource
   caller  <-  merge     <-  open      <-  poll
```

A stream is configured in the `Allocated` state, serves records in `On`, and
releases its resources through `Off` when dropped. Configuration calls after
`start()` fail with `InvalidState` instead of silently misbehaving.
*/
use crate::datasource::{new_data_source, DataSource, DataSourceId, WindowHint};
use crate::error::{BgpStreamError, ParserError};
use crate::filter::{FilterKind, FilterSet};
use crate::input::{InputDescriptor, InputQueue};
use crate::reader::{DumpReader, ReaderSet};
use crate::record::BgpStreamRecord;
use crate::time::{parse_timestamp, FOREVER};
use log::{debug, info, warn};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Initial pause before re-polling an idle data interface.
const BACKOFF_INITIAL_SECS: u64 = 30;
/// Backoff doubles up to this cap.
const BACKOFF_MAX_SECS: u64 = 3600;
/// Consecutive poll failures tolerated before the error becomes fatal.
const MAX_CONSECUTIVE_ERRORS: u32 = 3;

/// Lifecycle state of a [`BgpStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Freshly created; filters and data interface may be configured.
    Allocated,
    /// Started; `next_record` is available, configuration is rejected.
    On,
    /// Stopped; resources released.
    Off,
}

impl Display for StreamState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StreamState::Allocated => "allocated",
            StreamState::On => "on",
            StreamState::Off => "off",
        };
        write!(f, "{}", s)
    }
}

/// Counters exposed for observability.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamStats {
    pub records_emitted: u64,
    pub files_opened: u64,
    pub readers_failed: u64,
    /// Timestamp regressions observed within single files. Archived MRT
    /// files occasionally violate monotonicity; the offending records are
    /// still delivered.
    pub monotonicity_violations: u64,
}

/// A per-file decode failure, reported out of band: the stream keeps going
/// with the remaining files and collects these for the caller to inspect.
#[derive(Debug)]
pub struct ReaderIssue {
    pub path: String,
    pub collector: String,
    pub error: ParserError,
}

/// Cooperative cancellation handle for a stream.
///
/// Cloneable and usable from other threads (e.g. a signal handler). The flag
/// is polled at every backoff tick and every reader open/advance; on
/// observation `next_record` returns [`BgpStreamError::Interrupted`], the
/// flag clears, and the stream stays `On` so a later call may resume.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }
}

/// A single filtered, time-ordered stream of BGP records.
pub struct BgpStream {
    state: StreamState,
    filters: FilterSet,
    source: Box<dyn DataSource>,
    inputs: InputQueue,
    readers: ReaderSet,
    live: bool,
    window: WindowHint,
    backoff_secs: u64,
    consecutive_errors: u32,
    interrupt: Arc<AtomicBool>,
    reader_errors: Vec<ReaderIssue>,
    stats: StreamStats,
    sleep_fn: Box<dyn FnMut(Duration)>,
}

impl Default for BgpStream {
    fn default() -> Self {
        BgpStream::new()
    }
}

impl BgpStream {
    /// Create a stream in the `Allocated` state. The data interface
    /// defaults to `singlefile` until [`set_data_interface`](Self::set_data_interface)
    /// picks another one.
    pub fn new() -> BgpStream {
        BgpStream {
            state: StreamState::Allocated,
            filters: FilterSet::new(),
            source: new_data_source(DataSourceId::SingleFile),
            inputs: InputQueue::new(),
            readers: ReaderSet::new(),
            live: false,
            window: WindowHint {
                from: 0,
                to: FOREVER,
            },
            backoff_secs: BACKOFF_INITIAL_SECS,
            consecutive_errors: 0,
            interrupt: Arc::new(AtomicBool::new(false)),
            reader_errors: vec![],
            stats: StreamStats::default(),
            sleep_fn: Box::new(|d| std::thread::sleep(d)),
        }
    }

    fn require_allocated(&self, op: &'static str) -> Result<(), BgpStreamError> {
        match self.state {
            StreamState::Allocated => Ok(()),
            state => Err(BgpStreamError::InvalidState { op, state }),
        }
    }

    /// Add one filter predicate; see [`FilterKind`] for the recognized kinds.
    pub fn add_filter(&mut self, kind: FilterKind, value: &str) -> Result<(), BgpStreamError> {
        self.require_allocated("add_filter")?;
        self.filters.add(kind, value)
    }

    /// Add a time interval in POSIX seconds; `end == FOREVER` makes the
    /// stream live.
    pub fn add_interval(&mut self, begin: u32, end: u32) -> Result<(), BgpStreamError> {
        self.require_allocated("add_interval")?;
        self.filters.add_interval(begin, end)
    }

    /// Like [`add_interval`](Self::add_interval), accepting POSIX seconds or
    /// RFC3339 strings.
    pub fn add_interval_str(&mut self, begin: &str, end: &str) -> Result<(), BgpStreamError> {
        self.require_allocated("add_interval")?;
        self.filters
            .add_interval(parse_timestamp(begin)?, parse_timestamp(end)?)
    }

    /// Add an interval covering the recent past, e.g. `"3600"` or `"1h"`.
    /// With `live` the interval never ends.
    pub fn add_recent_interval(&mut self, spec: &str, live: bool) -> Result<(), BgpStreamError> {
        self.require_allocated("add_recent_interval")?;
        self.filters.add_recent_interval(spec, live)
    }

    /// Emit at most one RIB dump per collector per `period` seconds.
    pub fn add_rib_period_filter(&mut self, period: u32) -> Result<(), BgpStreamError> {
        self.require_allocated("add_rib_period_filter")?;
        self.filters.add_rib_period(period)
    }

    /// Select one of the bundled data interfaces.
    pub fn set_data_interface(&mut self, id: DataSourceId) -> Result<(), BgpStreamError> {
        self.require_allocated("set_data_interface")?;
        self.source = new_data_source(id);
        Ok(())
    }

    /// Install a caller-provided data interface implementation.
    pub fn set_custom_data_interface(
        &mut self,
        source: Box<dyn DataSource>,
    ) -> Result<(), BgpStreamError> {
        self.require_allocated("set_data_interface")?;
        self.source = source;
        Ok(())
    }

    /// The identifier of the currently selected data interface.
    pub fn data_interface_id(&self) -> DataSourceId {
        self.source.id()
    }

    /// Set a backend-specific option from the backend's published list.
    pub fn set_data_interface_option(
        &mut self,
        option: &str,
        value: &str,
    ) -> Result<(), BgpStreamError> {
        self.require_allocated("set_data_interface_option")?;
        self.source.configure(option, value)
    }

    /// Block waiting for new data instead of ending the stream when the
    /// data interface runs dry.
    pub fn set_live_mode(&mut self) -> Result<(), BgpStreamError> {
        self.require_allocated("set_live_mode")?;
        self.live = true;
        Ok(())
    }

    /// Validate filters and start the data interface. On success the stream
    /// is `On`; on failure it stays `Allocated` and may be reconfigured.
    pub fn start(&mut self) -> Result<(), BgpStreamError> {
        self.require_allocated("start")?;
        self.filters.validate()?;
        self.source.start()?;

        self.live = self.live || self.filters.is_live();
        self.window = WindowHint {
            from: self.filters.min_begin(),
            to: match self.live {
                true => FOREVER,
                false => self.filters.max_end(),
            },
        };
        self.filters.freeze();
        self.state = StreamState::On;
        info!(
            "stream started: interface {}, window [{}, {}], live: {}",
            self.source.id(),
            self.window.from,
            self.window.to,
            self.live
        );
        Ok(())
    }

    /// A handle that cancels a blocked [`next_record`](Self::next_record)
    /// from another thread.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            flag: Arc::clone(&self.interrupt),
        }
    }

    /// Pull the next record in non-decreasing timestamp order.
    ///
    /// Returns `Ok(None)` when the stream is exhausted (never in live mode,
    /// where the call instead blocks until data arrives). Per-file decode
    /// failures do not surface here; see
    /// [`take_reader_errors`](Self::take_reader_errors).
    pub fn next_record(&mut self) -> Result<Option<BgpStreamRecord>, BgpStreamError> {
        if self.state != StreamState::On {
            return Err(BgpStreamError::InvalidState {
                op: "next_record",
                state: self.state,
            });
        }

        loop {
            self.check_interrupt()?;

            if let Some(mut reader) = self.readers.pop_min() {
                let record = reader.take_head();
                match reader.advance(&self.filters) {
                    Ok(true) => {
                        if reader.head_timestamp() < record.timestamp {
                            warn!(
                                "timestamp regression in {}: {} after {}",
                                reader.input().path,
                                reader.head_timestamp(),
                                record.timestamp
                            );
                            self.stats.monotonicity_violations += 1;
                        }
                        self.readers.push(reader);
                    }
                    Ok(false) => debug!("finished reading {}", reader.input().path),
                    Err(e) => self.note_reader_failure(reader.input().clone(), e),
                }
                self.stats.records_emitted += 1;
                return Ok(Some(record));
            }

            if self.inputs.is_empty() && !self.refill_input_queue()? {
                return Ok(None);
            }
            self.open_pending_inputs()?;
        }
    }

    /// Drain the decode failures collected since the last call.
    pub fn take_reader_errors(&mut self) -> Vec<ReaderIssue> {
        std::mem::take(&mut self.reader_errors)
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Stop the stream and release the data interface. Called automatically
    /// on drop.
    pub fn stop(&mut self) {
        if self.state != StreamState::Off {
            self.state = StreamState::Off;
            self.source.close();
        }
    }

    /// Poll the data interface until the input queue gains at least one
    /// coarse-admitted file. Returns `false` when the stream is exhausted
    /// (bounded mode only).
    fn refill_input_queue(&mut self) -> Result<bool, BgpStreamError> {
        loop {
            self.check_interrupt()?;

            match self.source.poll(&self.filters, &self.window) {
                Ok(descriptors) => {
                    self.consecutive_errors = 0;
                    let polled_any = !descriptors.is_empty();
                    if polled_any {
                        self.backoff_secs = BACKOFF_INITIAL_SECS;
                    }

                    let mut admitted = 0usize;
                    for input in descriptors {
                        if self.filters.coarse_match(&input) {
                            self.inputs.push(input);
                            admitted += 1;
                        }
                    }
                    debug!(
                        "poll: {} files admitted, queue length {}",
                        admitted,
                        self.inputs.len()
                    );
                    if admitted > 0 {
                        return Ok(true);
                    }
                    if polled_any {
                        // everything was filtered out; the backend cursor
                        // advanced, so poll again right away
                        continue;
                    }
                    if !self.live {
                        return Ok(false);
                    }
                    self.sleep_backoff()?;
                }
                Err(e) => {
                    self.consecutive_errors += 1;
                    if self.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(e);
                    }
                    warn!(
                        "data interface poll failed ({}/{}): {}",
                        self.consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                    );
                    self.sleep_backoff()?;
                }
            }
        }
    }

    /// Drain the input queue into the reader set, priming each reader.
    fn open_pending_inputs(&mut self) -> Result<(), BgpStreamError> {
        while let Some(input) = self.inputs.pop() {
            self.check_interrupt()?;
            let seq = self.readers.alloc_seq();
            debug!("opening {}", input.path);
            match DumpReader::open(input.clone(), &self.filters, seq) {
                Ok(Some(reader)) => {
                    self.stats.files_opened += 1;
                    self.readers.push(reader);
                }
                Ok(None) => self.stats.files_opened += 1,
                Err(e) => self.note_reader_failure(input, e),
            }
        }
        debug!("reader set holds {} open readers", self.readers.len());
        Ok(())
    }

    fn note_reader_failure(&mut self, input: InputDescriptor, error: ParserError) {
        warn!("giving up on {}: {}", input.path, error);
        self.stats.readers_failed += 1;
        self.reader_errors.push(ReaderIssue {
            path: input.path,
            collector: input.collector,
            error,
        });
    }

    fn sleep_backoff(&mut self) -> Result<(), BgpStreamError> {
        let secs = self.backoff_secs;
        debug!("nothing new from data interface; backing off {} seconds", secs);
        (self.sleep_fn)(Duration::from_secs(secs));
        self.backoff_secs = (secs * 2).min(BACKOFF_MAX_SECS);
        self.check_interrupt()
    }

    fn check_interrupt(&mut self) -> Result<(), BgpStreamError> {
        match self.interrupt.swap(false, Ordering::Relaxed) {
            true => Err(BgpStreamError::Interrupted),
            false => Ok(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn set_sleep_fn(&mut self, f: Box<dyn FnMut(Duration)>) {
        self.sleep_fn = f;
    }
}

impl Drop for BgpStream {
    fn drop(&mut self) {
        self.stop();
    }
}
