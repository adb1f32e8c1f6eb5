//! Cell encoding
//!
//! Turns one cell of the current row into a byte stream.

use std::borrow::Cow;
use std::io::{self, Cursor, Read};

use crate::error::{DumpError, Result};
use crate::source::{ColumnDescriptor, SourceRow};

use super::Encoding;

/// Per-table encoding plan, fixed when the column metadata arrives
#[derive(Debug, Clone)]
pub struct ColumnCodec {
    columns: Vec<(ColumnDescriptor, Encoding)>,
}

impl ColumnCodec {
    /// Classify every column once for the table's lifetime
    pub fn new(columns: &[ColumnDescriptor]) -> Self {
        let columns = columns
            .iter()
            .map(|column| (column.clone(), Encoding::for_type(column.sql_type)))
            .collect();
        Self { columns }
    }

    /// Number of columns in the plan
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Encoding chosen for the column at `index` (0-based)
    pub fn encoding(&self, index: usize) -> Option<Encoding> {
        self.columns.get(index).map(|(_, encoding)| *encoding)
    }

    /// Open the cell at `index` (0-based) of `row`
    ///
    /// Returns `Ok(None)` for a null cell.
    pub fn open_cell<'r>(
        &self,
        row: &'r dyn SourceRow,
        index: usize,
    ) -> Result<Option<CellStream<'r>>> {
        let (column, encoding) = self.columns.get(index).ok_or_else(|| {
            DumpError::SourceRead(format!(
                "column index {} out of range ({} columns)",
                index,
                self.columns.len()
            ))
        })?;

        let cell = match encoding {
            Encoding::Binary => row.binary_stream(column.ordinal)?.map(CellStream::Binary),
            Encoding::Text => row.string(column.ordinal)?.map(CellStream::text),
        };
        Ok(cell)
    }
}

/// Bytes of one non-null cell
pub enum CellStream<'r> {
    /// Raw stream from the cursor, possibly a large object
    Binary(Box<dyn Read + 'r>),
    /// UTF-8 encoding of the cell's string value
    Text(Cursor<Cow<'r, [u8]>>),
}

impl<'r> CellStream<'r> {
    fn text(value: Cow<'r, str>) -> Self {
        let bytes = match value {
            Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
            Cow::Owned(s) => Cow::Owned(s.into_bytes()),
        };
        CellStream::Text(Cursor::new(bytes))
    }
}

impl Read for CellStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            CellStream::Binary(stream) => stream.read(buf),
            CellStream::Text(cursor) => cursor.read(buf),
        }
    }
}
