/*!
Pluggable data interfaces enumerating archive files.

A data interface answers "which dump files match these filters in this time
window?". The stream polls its configured interface whenever the reader set
drains; backends keep whatever cursor they need so that repeated polls only
return files not handed out before.

Three backends ship with the crate:

- [`singlefile`]: one RIB and/or one updates file given directly as options;
  useful for processing a downloaded file without any catalog.
- [`csvfile`]: a CSV catalog of archive files.
- [`sqlite`]: a SQLite catalog, the reference SQL-catalog backend.
*/
pub mod csvfile;
pub mod singlefile;
pub mod sqlite;

use crate::error::BgpStreamError;
use crate::filter::FilterSet;
use crate::input::InputDescriptor;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Advisory time range the stream currently wants covered. Backends may
/// return descriptors outside it; the stream re-applies coarse filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHint {
    pub from: u32,
    pub to: u32,
}

/// Identifier of a data interface implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSourceId {
    SingleFile,
    CsvFile,
    Sqlite,
}

impl DataSourceId {
    /// All available interfaces, for discovery by front-ends.
    pub fn all() -> &'static [DataSourceId] {
        &[
            DataSourceId::SingleFile,
            DataSourceId::CsvFile,
            DataSourceId::Sqlite,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataSourceId::SingleFile => "singlefile",
            DataSourceId::CsvFile => "csvfile",
            DataSourceId::Sqlite => "sqlite",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DataSourceId::SingleFile => "Read a single RIB and/or updates file",
            DataSourceId::CsvFile => "Retrieve metadata information from a csv file",
            DataSourceId::Sqlite => "Retrieve metadata information from a sqlite database",
        }
    }

    /// The options this interface accepts.
    pub fn options(&self) -> &'static [OptionInfo] {
        match self {
            DataSourceId::SingleFile => &[
                OptionInfo {
                    name: "rib-file",
                    help: "path or URL of the RIB dump to read",
                },
                OptionInfo {
                    name: "upd-file",
                    help: "path or URL of the updates dump to read",
                },
            ],
            DataSourceId::CsvFile => &[
                OptionInfo {
                    name: "csv-file",
                    help: "csv catalog file listing archive files",
                },
                OptionInfo {
                    name: "dump-path",
                    help: "prefix prepended to relative file paths from the catalog",
                },
            ],
            DataSourceId::Sqlite => &[
                OptionInfo {
                    name: "db-file",
                    help: "sqlite database file",
                },
                OptionInfo {
                    name: "dump-path",
                    help: "prefix prepended to relative file paths from the catalog",
                },
            ],
        }
    }

    pub fn option_by_name(&self, name: &str) -> Option<&'static OptionInfo> {
        self.options().iter().find(|o| o.name == name)
    }
}

impl FromStr for DataSourceId {
    type Err = BgpStreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "singlefile" => Ok(DataSourceId::SingleFile),
            "csvfile" => Ok(DataSourceId::CsvFile),
            "sqlite" => Ok(DataSourceId::Sqlite),
            _ => Err(BgpStreamError::UnknownBackend(s.to_string())),
        }
    }
}

impl Display for DataSourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One published backend option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionInfo {
    pub name: &'static str,
    pub help: &'static str,
}

/// The capability set every data interface implements.
pub trait DataSource {
    fn id(&self) -> DataSourceId;

    /// Set a backend-specific option from the published list.
    fn configure(&mut self, option: &str, value: &str) -> Result<(), BgpStreamError>;

    /// Open resources (file handles, connections). Called once by the
    /// stream's `start()`.
    fn start(&mut self) -> Result<(), BgpStreamError>;

    /// Enumerate matching archive files. An empty vector means nothing new
    /// is available right now; the stream decides between end-of-stream and
    /// backoff based on its mode.
    fn poll(
        &mut self,
        filters: &FilterSet,
        window: &WindowHint,
    ) -> Result<Vec<InputDescriptor>, BgpStreamError>;

    /// Release resources; idempotent.
    fn close(&mut self);
}

pub(crate) fn new_data_source(id: DataSourceId) -> Box<dyn DataSource> {
    match id {
        DataSourceId::SingleFile => Box::new(singlefile::SingleFileSource::new()),
        DataSourceId::CsvFile => Box::new(csvfile::CsvFileSource::new()),
        DataSourceId::Sqlite => Box::new(sqlite::SqliteSource::new()),
    }
}

/// Prepend the configured dump path to relative catalog paths; absolute
/// paths and URLs pass through.
pub(crate) fn resolve_path(dump_path: Option<&str>, path: &str) -> String {
    match dump_path {
        Some(prefix) if !path.starts_with('/') && !path.contains("://") => {
            format!("{}/{}", prefix.trim_end_matches('/'), path)
        }
        _ => path.to_string(),
    }
}
