//! CSV catalog data interface.
//!
//! The catalog is a CSV file with one row per archive file:
//!
//! ```text
//! path,type,collector,project,filetime,runtime
//! rrc00/rib.20211001.0000.gz,ribs,rrc00,ris,1633046400,1633046700
//! ```
//!
//! `filetime` is the nominal dump time, `runtime` the time the row was added
//! to the catalog. Both are POSIX seconds. The backend re-reads the catalog
//! on every poll and returns rows whose `runtime` is newer than anything
//! returned before, so a catalog being appended to behaves as a live feed.

use crate::datasource::{resolve_path, DataSource, DataSourceId, WindowHint};
use crate::error::BgpStreamError;
use crate::filter::FilterSet;
use crate::input::InputDescriptor;
use crate::record::DumpType;
use log::{debug, warn};

#[derive(Debug, Default)]
pub struct CsvFileSource {
    csv_file: Option<String>,
    dump_path: Option<String>,
    /// Largest `runtime` of any row returned so far.
    last_runtime: Option<u32>,
}

impl CsvFileSource {
    pub fn new() -> CsvFileSource {
        CsvFileSource::default()
    }

    fn parse_row(&self, row: &csv::StringRecord) -> Option<(InputDescriptor, u32)> {
        if row.len() != 6 {
            warn!("csvfile: row with {} fields, want 6; skipping", row.len());
            return None;
        }
        let path = row.get(0)?;
        let dump_type = DumpType::from_catalog_str(row.get(1)?)?;
        let collector = row.get(2)?;
        let project = row.get(3)?;
        let file_time: u32 = row.get(4)?.parse().ok()?;
        let runtime: u32 = row.get(5)?.parse().ok()?;

        let input = InputDescriptor {
            path: resolve_path(self.dump_path.as_deref(), path),
            dump_type,
            collector: collector.to_string(),
            project: project.to_string(),
            file_time,
            scan_time: file_time,
        };
        Some((input, runtime))
    }
}

impl DataSource for CsvFileSource {
    fn id(&self) -> DataSourceId {
        DataSourceId::CsvFile
    }

    fn configure(&mut self, option: &str, value: &str) -> Result<(), BgpStreamError> {
        match option {
            "csv-file" => self.csv_file = Some(value.to_string()),
            "dump-path" => self.dump_path = Some(value.to_string()),
            _ => {
                return Err(BgpStreamError::UnknownOption {
                    backend: "csvfile",
                    option: option.to_string(),
                })
            }
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), BgpStreamError> {
        let path = self.csv_file.as_deref().ok_or_else(|| {
            BgpStreamError::BackendStart("csvfile: csv-file not configured".to_string())
        })?;
        // open once up front so a missing catalog fails start, not poll
        std::fs::metadata(path).map_err(|e| {
            BgpStreamError::BackendStart(format!("csvfile: cannot open {}: {}", path, e))
        })?;
        Ok(())
    }

    fn poll(
        &mut self,
        filters: &FilterSet,
        window: &WindowHint,
    ) -> Result<Vec<InputDescriptor>, BgpStreamError> {
        let path = self.csv_file.as_deref().ok_or_else(|| {
            BgpStreamError::BackendQuery("csvfile: csv-file not configured".to_string())
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)
            .map_err(|e| BgpStreamError::BackendQuery(format!("csvfile: {}", e)))?;

        let mut inputs = vec![];
        let mut max_runtime = self.last_runtime;
        for result in reader.records() {
            let row = result.map_err(|e| BgpStreamError::BackendQuery(format!("csvfile: {}", e)))?;
            let Some((input, runtime)) = self.parse_row(&row) else {
                continue;
            };

            // cursor: only rows added since the last poll
            if let Some(last) = self.last_runtime {
                if runtime <= last {
                    continue;
                }
            }
            if input.file_time > window.to || input.file_time.saturating_add(3600) < window.from {
                continue;
            }
            if !filters.admits_file_meta(&input) {
                continue;
            }

            max_runtime = Some(max_runtime.map_or(runtime, |m| m.max(runtime)));
            inputs.push(input);
        }
        self.last_runtime = max_runtime;

        debug!("csvfile: poll returned {} new files", inputs.len());
        Ok(inputs)
    }

    fn close(&mut self) {}
}
