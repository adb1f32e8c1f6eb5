//! Archive pair writer
//!
//! Owns the content and length containers of one dump session.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::BackupConfig;
use crate::error::{DumpError, Result};

use super::ContainerWriter;

/// The content archive and the length archive, written in lockstep
pub struct ArchiveWriter<W: Write> {
    content: ContainerWriter<W>,
    lengths: ContainerWriter<W>,
}

impl<W: Write> ArchiveWriter<W> {
    /// Wrap two output streams
    pub fn new(content: W, lengths: W, compression_level: u32) -> Self {
        Self {
            content: ContainerWriter::new(content, compression_level),
            lengths: ContainerWriter::new(lengths, compression_level),
        }
    }

    /// Content stream: table header and cell bytes
    pub fn content(&mut self) -> &mut ContainerWriter<W> {
        &mut self.content
    }

    /// Length stream: one i64 per cell
    pub fn lengths(&mut self) -> &mut ContainerWriter<W> {
        &mut self.lengths
    }

    /// Open the entry named `table` in both containers
    pub fn open_table(&mut self, table: &str) -> Result<()> {
        self.content.open_entry(table)?;
        self.lengths.open_entry(table)
    }

    /// Close the current entry of both containers
    pub fn close_table(&mut self) -> Result<()> {
        let content = self.content.close_entry();
        let lengths = self.lengths.close_entry();
        content.and(lengths)
    }

    /// Whether either container still has an entry open
    pub fn has_open_entry(&self) -> bool {
        self.content.has_open_entry() || self.lengths.has_open_entry()
    }

    /// Finish both containers, closing any entry left open
    ///
    /// Both containers are always attempted; the first failure is returned.
    pub fn finish(self) -> Result<(W, W)> {
        if self.has_open_entry() {
            tracing::debug!(
                content = ?self.content.open_entry_name(),
                lengths = ?self.lengths.open_entry_name(),
                "closing entries left open by an aborted table"
            );
        }
        let content = self.content.finish();
        let lengths = self.lengths.finish();
        match (content, lengths) {
            (Ok(c), Ok(l)) => Ok((c, l)),
            (Err(e), other) => {
                if let Err(second) = other {
                    tracing::error!("Length archive also failed to close: {}", second);
                }
                Err(e)
            }
            (Ok(_), Err(e)) => Err(e),
        }
    }
}

impl ArchiveWriter<BufWriter<File>> {
    /// Create both archive files under the configured storage directory
    ///
    /// Existing files with the same names are truncated.
    pub fn create(config: &BackupConfig) -> Result<Self> {
        fs::create_dir_all(&config.storage_dir)
            .map_err(|e| DumpError::archive("creating storage directory", e))?;

        let content = create_file(&config.content_archive_path())?;
        let lengths = create_file(&config.length_archive_path())?;
        Ok(Self::new(content, lengths, config.compression_level))
    }

    /// Finish both archives and sync them to disk
    pub fn close(self) -> Result<()> {
        let (content, lengths) = self.finish()?;
        sync(content)?;
        sync(lengths)
    }
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|e| DumpError::archive(&format!("creating {}", path.display()), e))?;
    Ok(BufWriter::new(file))
}

fn sync(writer: BufWriter<File>) -> Result<()> {
    let file = writer
        .into_inner()
        .map_err(|e| DumpError::ArchiveWrite(format!("Failed to flush archive: {}", e)))?;
    file.sync_all()
        .map_err(|e| DumpError::archive("syncing archive", e))
}
