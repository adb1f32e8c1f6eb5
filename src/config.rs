//! Configuration for tabledump
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DumpError, Result};
use crate::intercept::WritePolicy;

/// Configuration for one dump session
#[derive(Debug, Clone)]
pub struct BackupConfig {
    // -------------------------------------------------------------------------
    // Output Configuration
    // -------------------------------------------------------------------------
    /// Directory receiving both archives
    /// Internal structure:
    ///   {storage_dir}/
    ///     ├── dump.zip         (cell contents, one entry per table)
    ///     └── dump-len.zip     (per-cell lengths, one entry per table)
    pub storage_dir: PathBuf,

    /// File name of the content archive
    pub content_archive_name: String,

    /// File name of the length archive
    pub length_archive_name: String,

    /// Deflate level for archive entries (0-9)
    pub compression_level: u32,

    // -------------------------------------------------------------------------
    // Cursor Configuration
    // -------------------------------------------------------------------------
    /// Rows prefetched per round trip by the cursor
    pub fetch_size: usize,

    /// Chunk size used to stream one cell into the content archive
    pub chunk_size: usize,

    // -------------------------------------------------------------------------
    // Write Gate Configuration
    // -------------------------------------------------------------------------
    /// Policy applied to writes attempted while the dump runs
    pub write_policy: WritePolicy,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("./backup"),
            content_archive_name: "dump.zip".to_string(),
            length_archive_name: "dump-len.zip".to_string(),
            compression_level: 6,
            fetch_size: 1000,
            chunk_size: 2048,
            write_policy: WritePolicy::Ignore,
        }
    }
}

impl BackupConfig {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Path of the content archive
    pub fn content_archive_path(&self) -> PathBuf {
        self.storage_dir.join(&self.content_archive_name)
    }

    /// Path of the length archive
    pub fn length_archive_path(&self) -> PathBuf {
        self.storage_dir.join(&self.length_archive_name)
    }

    /// Reject values the dump cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.fetch_size == 0 {
            return Err(DumpError::Config("fetch_size must be positive".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(DumpError::Config("chunk_size must be positive".to_string()));
        }
        if self.compression_level > 9 {
            return Err(DumpError::Config(format!(
                "compression_level must be 0-9, got {}",
                self.compression_level
            )));
        }
        if self.content_archive_name.is_empty() || self.length_archive_name.is_empty() {
            return Err(DumpError::Config("archive names must not be empty".to_string()));
        }
        if self.content_archive_name == self.length_archive_name {
            return Err(DumpError::Config(format!(
                "content and length archives share the name {}",
                self.content_archive_name
            )));
        }
        Ok(())
    }
}

/// Builder for BackupConfig
#[derive(Default)]
pub struct ConfigBuilder {
    config: BackupConfig,
}

impl ConfigBuilder {
    /// Set the directory receiving both archives
    pub fn storage_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = path.into();
        self
    }

    /// Set the content archive file name
    pub fn content_archive_name(mut self, name: impl Into<String>) -> Self {
        self.config.content_archive_name = name.into();
        self
    }

    /// Set the length archive file name
    pub fn length_archive_name(mut self, name: impl Into<String>) -> Self {
        self.config.length_archive_name = name.into();
        self
    }

    /// Set the deflate level (0-9)
    pub fn compression_level(mut self, level: u32) -> Self {
        self.config.compression_level = level;
        self
    }

    /// Set the cursor fetch size
    pub fn fetch_size(mut self, rows: usize) -> Self {
        self.config.fetch_size = rows;
        self
    }

    /// Set the cell streaming chunk size (in bytes)
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.config.chunk_size = bytes;
        self
    }

    /// Set the policy for writes attempted during the dump
    pub fn write_policy(mut self, policy: WritePolicy) -> Self {
        self.config.write_policy = policy;
        self
    }

    pub fn build(self) -> BackupConfig {
        self.config
    }
}

/// Settings of the process-wide write gate
#[derive(Debug, Clone, Copy)]
pub struct InterceptorConfig {
    /// Longest a suspended writer sleeps before re-checking the gate
    pub poll_interval: Duration,

    /// Give up suspending after this long (None waits for the dump to end)
    pub suspend_timeout: Option<Duration>,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            suspend_timeout: None,
        }
    }
}

impl InterceptorConfig {
    /// Reject values the gate cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(DumpError::Config(
                "poll_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
