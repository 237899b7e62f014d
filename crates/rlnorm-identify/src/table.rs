//! Tabular data sources
//!
//! Tables are read through a session: a [`TableSource`] opens a
//! [`TableSession`], which reads whole tables into memory and must be stopped
//! afterwards. [`SessionGuard`] stops the session when it goes out of scope, so
//! the session is released on every path, including errors.
//!
//! Two sources are provided:
//!
//! - [`MemoryTableSource`]: tables registered in memory (tests, embedding)
//! - [`JsonLinesTableSource`]: a directory of `<table_name>.jsonl` files
//!
//! # Example
//!
//! ```
//! use rlnorm_identify::table::{MemoryTableSource, Record, SessionGuard, TableSource, TableSpec};
//! use serde_json::json;
//!
//! let source = MemoryTableSource::new().with_table(
//!     "transitions",
//!     vec![Record::new().with_column("state_features", json!({"1": 0.5}))],
//! );
//!
//! let mut session = SessionGuard::new(source.open_session().unwrap());
//! let records = session.read_table(&TableSpec::new("transitions")).unwrap();
//! assert_eq!(records.len(), 1);
//! drop(session);
//! assert_eq!(source.live_sessions(), 0);
//! ```

use std::{
    collections::HashMap,
    fmt,
    fs::File,
    io::{self, BufRead as _, BufReader},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::feature::{ColumnError, FeatureColumn};

/// Identifies a table to read
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableSpec {
    pub table_name: String,
}

impl TableSpec {
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
        }
    }
}

impl fmt::Display for TableSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table_name)
    }
}

/// A table row with named columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    columns: Map<String, Value>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_column(mut self, name: impl Into<String>, value: Value) -> Self {
        self.columns.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.get(name)
    }

    /// Parses the named column as a feature column.
    pub fn feature_column(&self, column: &str) -> Result<FeatureColumn, ColumnError> {
        let value = self.get(column).ok_or_else(|| ColumnError::MissingColumn {
            column: column.to_owned(),
        })?;
        FeatureColumn::from_json(column, value)
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum SourceError {
    #[display("table '{table_name}' not found")]
    TableNotFound { table_name: String },
    #[display("invalid table name '{table_name}'")]
    InvalidTableName { table_name: String },
    #[display("failed to read {}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("failed to parse record at {}:{line}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
}

/// Opens sessions on a table store
pub trait TableSource {
    type Session: TableSession;

    fn open_session(&self) -> Result<Self::Session, SourceError>;
}

/// A live connection to a table store
pub trait TableSession {
    /// Reads every record of the table into memory.
    fn read_table(&mut self, table: &TableSpec) -> Result<Vec<Record>, SourceError>;

    /// Releases the session's resources.
    fn stop(&mut self);
}

/// Stops the wrapped session when dropped
#[derive(Debug)]
pub struct SessionGuard<S>
where
    S: TableSession,
{
    session: S,
}

impl<S> SessionGuard<S>
where
    S: TableSession,
{
    #[must_use]
    pub fn new(session: S) -> Self {
        Self { session }
    }

    pub fn read_table(&mut self, table: &TableSpec) -> Result<Vec<Record>, SourceError> {
        self.session.read_table(table)
    }
}

impl<S> Drop for SessionGuard<S>
where
    S: TableSession,
{
    fn drop(&mut self) {
        self.session.stop();
    }
}

/// In-memory tables
#[derive(Debug, Clone, Default)]
pub struct MemoryTableSource {
    tables: Arc<HashMap<String, Vec<Record>>>,
    live_sessions: Arc<AtomicUsize>,
}

impl MemoryTableSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_table(mut self, table_name: impl Into<String>, records: Vec<Record>) -> Self {
        Arc::make_mut(&mut self.tables).insert(table_name.into(), records);
        self
    }

    /// Number of sessions opened and not yet stopped
    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.live_sessions.load(Ordering::SeqCst)
    }
}

impl TableSource for MemoryTableSource {
    type Session = MemoryTableSession;

    fn open_session(&self) -> Result<Self::Session, SourceError> {
        self.live_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryTableSession {
            tables: Arc::clone(&self.tables),
            live_sessions: Arc::clone(&self.live_sessions),
            stopped: false,
        })
    }
}

#[derive(Debug)]
pub struct MemoryTableSession {
    tables: Arc<HashMap<String, Vec<Record>>>,
    live_sessions: Arc<AtomicUsize>,
    stopped: bool,
}

impl TableSession for MemoryTableSession {
    fn read_table(&mut self, table: &TableSpec) -> Result<Vec<Record>, SourceError> {
        self.tables
            .get(&table.table_name)
            .cloned()
            .ok_or_else(|| SourceError::TableNotFound {
                table_name: table.table_name.clone(),
            })
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.live_sessions.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Tables stored as `<dir>/<table_name>.jsonl`, one JSON record per line
#[derive(Debug, Clone)]
pub struct JsonLinesTableSource {
    dir: PathBuf,
}

impl JsonLinesTableSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TableSource for JsonLinesTableSource {
    type Session = JsonLinesTableSession;

    fn open_session(&self) -> Result<Self::Session, SourceError> {
        if !self.dir.is_dir() {
            return Err(SourceError::Io {
                path: self.dir.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "table directory not found"),
            });
        }
        tracing::debug!(dir = %self.dir.display(), "opened table session");
        Ok(JsonLinesTableSession {
            dir: self.dir.clone(),
        })
    }
}

#[derive(Debug)]
pub struct JsonLinesTableSession {
    dir: PathBuf,
}

impl JsonLinesTableSession {
    fn table_path(&self, table: &TableSpec) -> Result<PathBuf, SourceError> {
        let name = &table.table_name;
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(SourceError::InvalidTableName {
                table_name: name.clone(),
            });
        }
        Ok(self.dir.join(format!("{name}.jsonl")))
    }
}

impl TableSession for JsonLinesTableSession {
    fn read_table(&mut self, table: &TableSpec) -> Result<Vec<Record>, SourceError> {
        let path = self.table_path(table)?;
        let file = File::open(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                SourceError::TableNotFound {
                    table_name: table.table_name.clone(),
                }
            } else {
                SourceError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        let mut records = vec![];
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| SourceError::Io {
                path: path.clone(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|source| SourceError::Parse {
                path: path.clone(),
                line: index + 1,
                source,
            })?;
            records.push(record);
        }
        tracing::debug!(table = %table, records = records.len(), "read table");
        Ok(records)
    }

    fn stop(&mut self) {
        tracing::debug!(dir = %self.dir.display(), "stopped table session");
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, io::Write as _};

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_record_feature_column() {
        let record = Record::new().with_column("f", json!({"1": 2.0}));
        assert_eq!(record.feature_column("f").unwrap().entries.len(), 1);
        assert!(matches!(
            record.feature_column("g"),
            Err(ColumnError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_memory_source_missing_table() {
        let source = MemoryTableSource::new();
        let mut session = SessionGuard::new(source.open_session().unwrap());
        let err = session.read_table(&TableSpec::new("nope")).unwrap_err();
        assert!(matches!(err, SourceError::TableNotFound { .. }));
    }

    #[test]
    fn test_session_guard_stops_once() {
        let source = MemoryTableSource::new();
        let mut session = source.open_session().unwrap();
        assert_eq!(source.live_sessions(), 1);
        session.stop();
        assert_eq!(source.live_sessions(), 0);
        // a guard over an already stopped session does not double count
        drop(SessionGuard::new(session));
        assert_eq!(source.live_sessions(), 0);
    }

    #[test]
    fn test_json_lines_source_reads_records() {
        let dir = TempDir::new().unwrap();
        let mut file = File::create(dir.path().join("samples.jsonl")).unwrap();
        writeln!(file, r#"{{"id": 1, "state_features": {{"1": 0.5}}}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"id": 2, "state_features": {{"1": 1.5, "2": [3, 4]}}}}"#).unwrap();
        drop(file);

        let source = JsonLinesTableSource::new(dir.path());
        let mut session = SessionGuard::new(source.open_session().unwrap());
        let records = session.read_table(&TableSpec::new("samples")).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("id"), Some(&json!(2)));
        assert_eq!(
            records[1].feature_column("state_features").unwrap().entries.len(),
            2
        );
    }

    #[test]
    fn test_json_lines_source_reports_parse_line() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.jsonl"), "{\"a\": 1}\n{not json}\n").unwrap();

        let source = JsonLinesTableSource::new(dir.path());
        let mut session = SessionGuard::new(source.open_session().unwrap());
        let err = session.read_table(&TableSpec::new("broken")).unwrap_err();
        assert!(matches!(err, SourceError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_json_lines_source_rejects_path_like_names() {
        let dir = TempDir::new().unwrap();
        let source = JsonLinesTableSource::new(dir.path());
        let mut session = SessionGuard::new(source.open_session().unwrap());
        for name in ["../etc", "a/b", ""] {
            let err = session.read_table(&TableSpec::new(name)).unwrap_err();
            assert!(matches!(err, SourceError::InvalidTableName { .. }));
        }
        let err = session.read_table(&TableSpec::new("absent")).unwrap_err();
        assert!(matches!(err, SourceError::TableNotFound { .. }));
    }
}
