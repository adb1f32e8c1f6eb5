//! SQLite cursor source
//!
//! Adapts a `rusqlite::Connection` to `SourceConnection`.

use std::borrow::Cow;
use std::io::{Cursor, Read};
use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row};

use crate::codec::SqlType;
use crate::error::{DumpError, Result};

use super::{ColumnDescriptor, RowSink, SourceConnection, SourceRow};

/// SQLite connection used as a dump source
///
/// The first scan opens a deferred transaction so every table of the session
/// is read from the same snapshot; `commit` ends it.
pub struct SqliteConnection {
    conn: Connection,
}

impl SqliteConnection {
    /// Open a database file
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    /// Open a database file without write access
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already-connected handle
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Borrow the underlying handle
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Resolve a declared column type, falling back to SQLite affinity rules
    ///
    /// Columns without a declared type (expressions) are reported as OTHER.
    pub fn column_type(declared: Option<&str>) -> SqlType {
        let Some(declared) = declared else {
            return SqlType::Other;
        };
        if let Some(sql_type) = SqlType::from_type_name(declared) {
            return sql_type;
        }

        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            SqlType::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            SqlType::VarChar
        } else if upper.contains("BLOB") || upper.trim().is_empty() {
            SqlType::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            SqlType::Double
        } else {
            SqlType::Numeric
        }
    }

    fn begin_snapshot(&self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN DEFERRED")?;
        }
        Ok(())
    }
}

impl SourceConnection for SqliteConnection {
    fn scan(&mut self, query: &str, _fetch_size: usize, sink: &mut dyn RowSink) -> Result<()> {
        // SQLite steps rows on demand; there is no client-side prefetch to bound.
        self.begin_snapshot()?;

        let mut stmt = self.conn.prepare(query)?;
        if !stmt.readonly() {
            return Err(DumpError::SourceRead(format!(
                "dump query is not read-only: {}",
                query
            )));
        }

        let columns: Vec<ColumnDescriptor> = stmt
            .columns()
            .iter()
            .enumerate()
            .map(|(i, column)| {
                ColumnDescriptor::new(i + 1, Self::column_type(column.decl_type()), column.name())
            })
            .collect();
        sink.columns(&columns)?;

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            sink.row(&SqliteRow { row })?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, err)| DumpError::from(err))
    }
}

/// Current row of a SQLite cursor
struct SqliteRow<'a, 'stmt> {
    row: &'a Row<'stmt>,
}

impl SqliteRow<'_, '_> {
    fn value(&self, ordinal: usize) -> Result<ValueRef<'_>> {
        let index = ordinal
            .checked_sub(1)
            .ok_or_else(|| DumpError::SourceRead("column ordinals start at 1".to_string()))?;
        Ok(self.row.get_ref(index)?)
    }
}

impl SourceRow for SqliteRow<'_, '_> {
    fn binary_stream(&self, ordinal: usize) -> Result<Option<Box<dyn Read + '_>>> {
        let stream: Box<dyn Read + '_> = match self.value(ordinal)? {
            ValueRef::Null => return Ok(None),
            ValueRef::Blob(bytes) | ValueRef::Text(bytes) => Box::new(bytes),
            ValueRef::Integer(i) => Box::new(Cursor::new(i.to_string().into_bytes())),
            ValueRef::Real(f) => Box::new(Cursor::new(real_text(f).into_bytes())),
        };
        Ok(Some(stream))
    }

    fn string(&self, ordinal: usize) -> Result<Option<Cow<'_, str>>> {
        let text = match self.value(ordinal)? {
            ValueRef::Null => return Ok(None),
            ValueRef::Integer(i) => Cow::Owned(i.to_string()),
            ValueRef::Real(f) => Cow::Owned(real_text(f)),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                let text = std::str::from_utf8(bytes).map_err(|e| {
                    DumpError::SourceRead(format!("column {} is not valid UTF-8: {}", ordinal, e))
                })?;
                Cow::Borrowed(text)
            }
        };
        Ok(Some(text))
    }
}

/// Render a REAL the way JDBC drivers do: always a fractional digit, and
/// scientific notation outside [1e-3, 1e7)
fn real_text(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let magnitude = value.abs();
    if magnitude == 0.0 || (1e-3..1e7).contains(&magnitude) {
        let text = value.to_string();
        return if text.contains('.') { text } else { format!("{}.0", text) };
    }

    // "1e20" -> "1.0E20", "1.5e-5" -> "1.5E-5"
    let text = format!("{:e}", value);
    let (mantissa, exponent) = text.split_once('e').unwrap_or((text.as_str(), "0"));
    if mantissa.contains('.') {
        format!("{}E{}", mantissa, exponent)
    } else {
        format!("{}.0E{}", mantissa, exponent)
    }
}
