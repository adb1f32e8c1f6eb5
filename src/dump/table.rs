//! Table dump writer
//!
//! Streams one table's result set into its content and length entries.

use std::io::{ErrorKind, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use crate::archive::{ArchiveWriter, ContainerWriter, NULL_LENGTH};
use crate::codec::ColumnCodec;
use crate::error::{DumpError, Result};
use crate::source::{ColumnDescriptor, RowSink, SourceConnection, SourceRow, TableSpec};

/// Per-table counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStats {
    pub table: String,
    pub columns: usize,
    pub rows: u64,
    /// Cell bytes written to the content entry, header excluded
    pub content_bytes: u64,
    pub null_cells: u64,
}

/// Writes tables into an archive pair, one at a time
pub struct TableDumpWriter<'a, W: Write> {
    archive: &'a mut ArchiveWriter<W>,
    fetch_size: usize,
    /// Reused for every cell
    chunk: Vec<u8>,
}

impl<'a, W: Write> TableDumpWriter<'a, W> {
    pub fn new(archive: &'a mut ArchiveWriter<W>, fetch_size: usize, chunk_size: usize) -> Self {
        Self {
            archive,
            fetch_size,
            chunk: vec![0u8; chunk_size.max(1)],
        }
    }

    /// Dump `table` through `connection`
    ///
    /// On error the table's entries are left open; closing the archive closes
    /// them, and their content must be treated as incomplete.
    pub fn dump<C: SourceConnection + ?Sized>(
        &mut self,
        connection: &mut C,
        table: &TableSpec,
    ) -> Result<TableStats> {
        let mut sink = TableSink {
            table,
            archive: &mut *self.archive,
            chunk: self.chunk.as_mut_slice(),
            codec: None,
            stats: TableStats {
                table: table.name.clone(),
                columns: 0,
                rows: 0,
                content_bytes: 0,
                null_cells: 0,
            },
        };

        connection.scan(&table.query, self.fetch_size, &mut sink)?;
        sink.finish()
    }
}

/// Encode the content entry header: column count, then code and name per column
pub fn encode_header(columns: &[ColumnDescriptor]) -> Result<Bytes> {
    let count = i32::try_from(columns.len())
        .map_err(|_| DumpError::SourceRead(format!("{} columns is too many", columns.len())))?;

    let capacity = 4 + columns.iter().map(|c| 8 + c.name.len()).sum::<usize>();
    let mut header = BytesMut::with_capacity(capacity);
    header.put_i32(count);
    for column in columns {
        let name_len = i32::try_from(column.name.len()).map_err(|_| {
            DumpError::SourceRead(format!("column name of {} bytes", column.name.len()))
        })?;
        header.put_i32(column.sql_type.code());
        header.put_i32(name_len);
        header.put_slice(column.name.as_bytes());
    }
    Ok(header.freeze())
}

/// Receives one table's result set from the cursor
struct TableSink<'t, 'w, W: Write> {
    table: &'t TableSpec,
    archive: &'w mut ArchiveWriter<W>,
    chunk: &'w mut [u8],
    /// Set once the column metadata arrives
    codec: Option<ColumnCodec>,
    stats: TableStats,
}

impl<W: Write> TableSink<'_, '_, W> {
    fn finish(self) -> Result<TableStats> {
        if self.codec.is_none() {
            return Err(DumpError::SourceRead(format!(
                "cursor for table {} reported no column metadata",
                self.table.name
            )));
        }
        self.archive.close_table()?;

        tracing::debug!(
            table = %self.stats.table,
            rows = self.stats.rows,
            bytes = self.stats.content_bytes,
            "table dumped"
        );
        Ok(self.stats)
    }
}

impl<W: Write> RowSink for TableSink<'_, '_, W> {
    fn columns(&mut self, columns: &[ColumnDescriptor]) -> Result<()> {
        if self.codec.is_some() {
            return Err(DumpError::SourceRead(format!(
                "cursor for table {} reported its columns twice",
                self.table.name
            )));
        }

        let header = encode_header(columns)?;
        self.archive.open_table(&self.table.name)?;
        self.archive.content().write_bytes(&header)?;

        self.stats.columns = columns.len();
        self.codec = Some(ColumnCodec::new(columns));
        Ok(())
    }

    fn row(&mut self, row: &dyn SourceRow) -> Result<()> {
        let codec = self.codec.as_ref().ok_or_else(|| {
            DumpError::SourceRead(format!(
                "cursor for table {} produced a row before its columns",
                self.table.name
            ))
        })?;

        for index in 0..codec.column_count() {
            match codec.open_cell(row, index)? {
                None => {
                    self.archive.lengths().write_i64(NULL_LENGTH)?;
                    self.stats.null_cells += 1;
                }
                Some(mut cell) => {
                    let len = copy_cell(&mut cell, self.archive.content(), self.chunk)?;
                    let record = i64::try_from(len).map_err(|_| {
                        DumpError::ArchiveWrite(format!("cell of {} bytes", len))
                    })?;
                    self.archive.lengths().write_i64(record)?;
                    self.stats.content_bytes += len;
                }
            }
        }
        self.stats.rows += 1;
        Ok(())
    }
}

/// Stream one cell in `chunk`-sized pieces, returning the bytes written
fn copy_cell<W: Write>(
    cell: &mut impl Read,
    content: &mut ContainerWriter<W>,
    chunk: &mut [u8],
) -> Result<u64> {
    let mut total = 0u64;
    loop {
        let read = match cell.read(chunk) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(DumpError::source("reading cell value", e)),
        };
        content.write_bytes(&chunk[..read])?;
        total += read as u64;
    }
}
