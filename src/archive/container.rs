//! ZIP container writer
//!
//! Appends named, deflated entries to a single output stream and writes the
//! central directory when finished.

use std::collections::HashSet;
use std::io::{self, Write};

use bytes::{BufMut, BytesMut};
use chrono::{Datelike, Local, Timelike};
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::error::{DumpError, Result};

use super::{
    CENTRAL_HEADER_SIG, DATA_DESCRIPTOR_SIG, END_OF_CENTRAL_DIR_SIG, ENTRY_FLAGS,
    LOCAL_HEADER_SIG, METHOD_DEFLATE, ZIP32_MAX, ZIP32_MAX_ENTRIES, ZIP64_END_OF_CENTRAL_DIR_SIG,
    ZIP64_EXTRA_ID, ZIP64_LOCATOR_SIG, ZIP64_VERSION, ZIP_VERSION,
};

/// One append-only ZIP stream
///
/// Entries are opened and closed in strict pairs. Nothing written is readable
/// as an archive until `finish` appends the central directory.
pub struct ContainerWriter<W: Write> {
    /// None once a failed entry finalization consumed the stream
    state: Option<State<W>>,
    /// Central directory records, in write order
    entries: Vec<EntryRecord>,
    /// Names already used in this container
    names: HashSet<String>,
    compression: Compression,
}

enum State<W: Write> {
    Idle(CountingWriter<W>),
    Entry {
        encoder: DeflateEncoder<CountingWriter<W>>,
        entry: OpenEntry,
    },
}

/// Bookkeeping for the entry being written
struct OpenEntry {
    name: String,
    header_offset: u64,
    data_offset: u64,
    dos_time: u16,
    dos_date: u16,
    crc: crc32fast::Hasher,
    size: u64,
}

/// Central directory data for a closed entry
#[derive(Debug, Clone)]
struct EntryRecord {
    name: String,
    header_offset: u64,
    dos_time: u16,
    dos_date: u16,
    crc: u32,
    compressed_size: u64,
    size: u64,
}

impl EntryRecord {
    fn has_large_sizes(&self) -> bool {
        self.size >= ZIP32_MAX || self.compressed_size >= ZIP32_MAX
    }

    /// ZIP64 extended information field holding only the values that overflow
    ///
    /// Field order is fixed: size, compressed size, local header offset.
    fn zip64_extra(&self) -> BytesMut {
        let large: Vec<u64> = [self.size, self.compressed_size, self.header_offset]
            .into_iter()
            .filter(|value| *value >= ZIP32_MAX)
            .collect();

        let mut extra = BytesMut::with_capacity(4 + large.len() * 8);
        if !large.is_empty() {
            extra.put_u16_le(ZIP64_EXTRA_ID);
            extra.put_u16_le((large.len() * 8) as u16);
            for value in large {
                extra.put_u64_le(value);
            }
        }
        extra
    }
}

impl<W: Write> ContainerWriter<W> {
    /// Start a container on `inner` with the given deflate level (0-9)
    pub fn new(inner: W, level: u32) -> Self {
        Self {
            state: Some(State::Idle(CountingWriter::new(inner))),
            entries: Vec::new(),
            names: HashSet::new(),
            compression: Compression::new(level),
        }
    }

    /// Open a new entry; fails if one is already open or the name was used
    pub fn open_entry(&mut self, name: &str) -> Result<()> {
        if self.names.contains(name) {
            return Err(DumpError::ArchiveWrite(format!(
                "entry {} already exists in this archive",
                name
            )));
        }
        if name.len() > u16::MAX as usize {
            return Err(DumpError::ArchiveWrite(format!(
                "entry name is {} bytes (max {})",
                name.len(),
                u16::MAX
            )));
        }

        let mut sink = match self.take_state()? {
            State::Idle(sink) => sink,
            entry @ State::Entry { .. } => {
                let open = entry.entry_name().to_string();
                self.state = Some(entry);
                return Err(DumpError::ArchiveWrite(format!(
                    "cannot open entry {} while {} is still open",
                    name, open
                )));
            }
        };

        let header_offset = sink.written;
        let (dos_time, dos_date) = dos_timestamp();

        // Local header: sizes and CRC follow the data in a descriptor
        let mut header = BytesMut::with_capacity(30 + name.len());
        header.put_u32_le(LOCAL_HEADER_SIG);
        header.put_u16_le(ZIP_VERSION);
        header.put_u16_le(ENTRY_FLAGS);
        header.put_u16_le(METHOD_DEFLATE);
        header.put_u16_le(dos_time);
        header.put_u16_le(dos_date);
        header.put_u32_le(0); // crc
        header.put_u32_le(0); // compressed size
        header.put_u32_le(0); // uncompressed size
        header.put_u16_le(name.len() as u16);
        header.put_u16_le(0); // extra field length
        header.put_slice(name.as_bytes());

        if let Err(e) = sink.write_all(&header) {
            self.state = Some(State::Idle(sink));
            return Err(DumpError::archive("writing local header", e));
        }

        let entry = OpenEntry {
            name: name.to_string(),
            header_offset,
            data_offset: sink.written,
            dos_time,
            dos_date,
            crc: crc32fast::Hasher::new(),
            size: 0,
        };
        self.names.insert(entry.name.clone());
        self.state = Some(State::Entry {
            encoder: DeflateEncoder::new(sink, self.compression),
            entry,
        });
        Ok(())
    }

    /// Append raw bytes to the open entry
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        match self.state.as_mut() {
            Some(State::Entry { encoder, entry }) => {
                encoder
                    .write_all(bytes)
                    .map_err(|e| DumpError::archive(&format!("writing entry {}", entry.name), e))?;
                entry.crc.update(bytes);
                entry.size += bytes.len() as u64;
                Ok(())
            }
            Some(State::Idle(_)) => Err(DumpError::ArchiveWrite(
                "no entry is open for writing".to_string(),
            )),
            None => Err(unusable()),
        }
    }

    /// Append a big-endian i32
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Append a big-endian i64
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Append a string as i32 byte length followed by its UTF-8 bytes
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let len = i32::try_from(value.len()).map_err(|_| {
            DumpError::ArchiveWrite(format!("string of {} bytes is too long", value.len()))
        })?;
        self.write_i32(len)?;
        self.write_bytes(value.as_bytes())
    }

    /// Name of the entry currently open, if any
    pub fn open_entry_name(&self) -> Option<&str> {
        match self.state.as_ref() {
            Some(State::Entry { entry, .. }) => Some(&entry.name),
            _ => None,
        }
    }

    /// Whether an entry is currently open
    pub fn has_open_entry(&self) -> bool {
        self.open_entry_name().is_some()
    }

    /// Number of closed entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Flush the deflate stream and write the entry's data descriptor
    pub fn close_entry(&mut self) -> Result<()> {
        let (encoder, entry) = match self.take_state()? {
            State::Entry { encoder, entry } => (encoder, entry),
            idle @ State::Idle(_) => {
                self.state = Some(idle);
                return Err(DumpError::ArchiveWrite("no entry is open to close".to_string()));
            }
        };

        // On failure the stream is left unusable: the deflate state is gone
        let mut sink = encoder
            .finish()
            .map_err(|e| DumpError::archive(&format!("finishing entry {}", entry.name), e))?;

        let record = EntryRecord {
            compressed_size: sink.written - entry.data_offset,
            size: entry.size,
            crc: entry.crc.finalize(),
            header_offset: entry.header_offset,
            dos_time: entry.dos_time,
            dos_date: entry.dos_date,
            name: entry.name,
        };

        // Sizes that overflow 32 bits switch the descriptor to 8-byte fields
        let mut descriptor = BytesMut::with_capacity(24);
        descriptor.put_u32_le(DATA_DESCRIPTOR_SIG);
        descriptor.put_u32_le(record.crc);
        if record.has_large_sizes() {
            descriptor.put_u64_le(record.compressed_size);
            descriptor.put_u64_le(record.size);
        } else {
            descriptor.put_u32_le(record.compressed_size as u32);
            descriptor.put_u32_le(record.size as u32);
        }
        sink.write_all(&descriptor)
            .map_err(|e| DumpError::archive("writing data descriptor", e))?;

        tracing::trace!(
            entry = %record.name,
            size = record.size,
            compressed = record.compressed_size,
            "closed archive entry"
        );

        self.entries.push(record);
        self.state = Some(State::Idle(sink));
        Ok(())
    }

    /// Close any open entry, write the central directory, and return the stream
    pub fn finish(mut self) -> Result<W> {
        if self.has_open_entry() {
            self.close_entry()?;
        }
        let mut sink = match self.take_state()? {
            State::Idle(sink) => sink,
            State::Entry { .. } => return Err(unusable()),
        };

        let directory_offset = sink.written;
        for record in &self.entries {
            let extra = record.zip64_extra();
            let version = if extra.is_empty() { ZIP_VERSION } else { ZIP64_VERSION };

            let mut header = BytesMut::with_capacity(46 + record.name.len() + extra.len());
            header.put_u32_le(CENTRAL_HEADER_SIG);
            header.put_u16_le(version); // version made by
            header.put_u16_le(version); // version needed
            header.put_u16_le(ENTRY_FLAGS);
            header.put_u16_le(METHOD_DEFLATE);
            header.put_u16_le(record.dos_time);
            header.put_u16_le(record.dos_date);
            header.put_u32_le(record.crc);
            header.put_u32_le(clamp_u32(record.compressed_size));
            header.put_u32_le(clamp_u32(record.size));
            header.put_u16_le(record.name.len() as u16);
            header.put_u16_le(extra.len() as u16);
            header.put_u16_le(0); // comment length
            header.put_u16_le(0); // disk number start
            header.put_u16_le(0); // internal attributes
            header.put_u32_le(0); // external attributes
            header.put_u32_le(clamp_u32(record.header_offset));
            header.put_slice(record.name.as_bytes());
            header.put_slice(&extra);
            sink.write_all(&header)
                .map_err(|e| DumpError::archive("writing central directory", e))?;
        }
        let directory_size = sink.written - directory_offset;
        let count = self.entries.len() as u64;

        if count >= ZIP32_MAX_ENTRIES || directory_size >= ZIP32_MAX || directory_offset >= ZIP32_MAX {
            let record_offset = sink.written;
            let mut zip64 = BytesMut::with_capacity(76);
            zip64.put_u32_le(ZIP64_END_OF_CENTRAL_DIR_SIG);
            zip64.put_u64_le(44); // size of the rest of this record
            zip64.put_u16_le(ZIP64_VERSION); // version made by
            zip64.put_u16_le(ZIP64_VERSION); // version needed
            zip64.put_u32_le(0); // this disk
            zip64.put_u32_le(0); // disk with central directory
            zip64.put_u64_le(count);
            zip64.put_u64_le(count);
            zip64.put_u64_le(directory_size);
            zip64.put_u64_le(directory_offset);

            zip64.put_u32_le(ZIP64_LOCATOR_SIG);
            zip64.put_u32_le(0); // disk with the ZIP64 record
            zip64.put_u64_le(record_offset);
            zip64.put_u32_le(1); // total disks
            sink.write_all(&zip64)
                .map_err(|e| DumpError::archive("writing ZIP64 end of central directory", e))?;

            tracing::debug!(entries = count, directory_offset, "archive uses ZIP64 records");
        }

        let mut end = BytesMut::with_capacity(22);
        end.put_u32_le(END_OF_CENTRAL_DIR_SIG);
        end.put_u16_le(0); // this disk
        end.put_u16_le(0); // disk with central directory
        end.put_u16_le(count.min(ZIP32_MAX_ENTRIES) as u16);
        end.put_u16_le(count.min(ZIP32_MAX_ENTRIES) as u16);
        end.put_u32_le(clamp_u32(directory_size));
        end.put_u32_le(clamp_u32(directory_offset));
        end.put_u16_le(0); // comment length
        sink.write_all(&end)
            .map_err(|e| DumpError::archive("writing end of central directory", e))?;
        sink.flush()
            .map_err(|e| DumpError::archive("flushing archive", e))?;

        Ok(sink.inner)
    }

    fn take_state(&mut self) -> Result<State<W>> {
        self.state.take().ok_or_else(unusable)
    }
}

impl<W: Write> State<W> {
    fn entry_name(&self) -> &str {
        match self {
            State::Entry { entry, .. } => &entry.name,
            State::Idle(_) => "",
        }
    }
}

fn unusable() -> DumpError {
    DumpError::ArchiveWrite("archive stream is unusable after an earlier failure".to_string())
}

/// 32-bit field value, or the 0xFFFFFFFF marker pointing at the ZIP64 field
fn clamp_u32(value: u64) -> u32 {
    if value >= ZIP32_MAX {
        u32::MAX
    } else {
        value as u32
    }
}

/// Current local time in MS-DOS format: (time, date)
fn dos_timestamp() -> (u16, u16) {
    let now = Local::now();
    let year = now.year().clamp(1980, 2107) as u16;
    let date = ((year - 1980) << 9) | ((now.month() as u16) << 5) | now.day() as u16;
    let time = ((now.hour() as u16) << 11) | ((now.minute() as u16) << 5) | (now.second() as u16 / 2);
    (time, date)
}

/// Write adapter tracking the stream offset
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
