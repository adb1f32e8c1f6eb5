//! Source Module
//!
//! Relational cursor sources feeding a dump.
//!
//! ## Responsibilities
//! - Execute one read-only query per table with a forward-only cursor
//! - Report column metadata once, before any row
//! - Expose each cell as a binary stream or as a string
//! - Commit and close the connection at session end
//!
//! ## Scan Protocol
//! ```text
//!   scan(query) ──► sink.columns([c1 .. cN])     exactly once
//!               ──► sink.row(r1)
//!               ──► sink.row(r2)                 zero or more
//!               ──► ...
//! ```
//! Errors returned by the sink are propagated unchanged.

pub mod sqlite;

use std::borrow::Cow;
use std::io::Read;

use crate::codec::SqlType;
use crate::error::Result;

pub use sqlite::SqliteConnection;

/// One unit of dump work: a table name and the query producing its rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Entry name in both archives
    pub name: String,
    /// Query whose result set is dumped
    pub query: String,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
        }
    }

    /// Dump every row of a table as stored
    pub fn select_all(name: impl Into<String>) -> Self {
        let name = name.into();
        let query = format!("select * from {}", name);
        Self { name, query }
    }
}

/// Column metadata reported by a cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// 1-based position in the result set
    pub ordinal: usize,
    pub sql_type: SqlType,
    pub name: String,
}

impl ColumnDescriptor {
    pub fn new(ordinal: usize, sql_type: SqlType, name: impl Into<String>) -> Self {
        Self {
            ordinal,
            sql_type,
            name: name.into(),
        }
    }
}

/// A connected, transaction-capable source of relational cursors
pub trait SourceConnection {
    /// Run `query` and push its metadata and rows into `sink`
    ///
    /// `fetch_size` bounds how many rows the cursor buffers client-side.
    fn scan(&mut self, query: &str, fetch_size: usize, sink: &mut dyn RowSink) -> Result<()>;

    /// Commit the session's transaction, if one is open
    fn commit(&mut self) -> Result<()>;

    /// Close the connection
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Receives one result set from `SourceConnection::scan`
pub trait RowSink {
    /// Called once with the result set's columns, before any row
    fn columns(&mut self, columns: &[ColumnDescriptor]) -> Result<()>;

    /// Called for every row, in cursor order
    fn row(&mut self, row: &dyn SourceRow) -> Result<()>;
}

/// The current row of a cursor
pub trait SourceRow {
    /// Raw bytes of the cell at `ordinal` (1-based), None when null
    fn binary_stream(&self, ordinal: usize) -> Result<Option<Box<dyn Read + '_>>>;

    /// Text value of the cell at `ordinal` (1-based), None when null
    fn string(&self, ordinal: usize) -> Result<Option<Cow<'_, str>>>;
}
