//! Error types for tabledump
//!
//! Provides a unified error type for dump sessions and the write gate.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using DumpError
pub type Result<T> = std::result::Result<T, DumpError>;

/// Unified error type for tabledump operations
#[derive(Debug, Error)]
pub enum DumpError {
    // -------------------------------------------------------------------------
    // Source Errors
    // -------------------------------------------------------------------------
    #[error("Source read failed: {0}")]
    SourceRead(String),

    // -------------------------------------------------------------------------
    // Archive Errors
    // -------------------------------------------------------------------------
    #[error("Archive write failed: {0}")]
    ArchiveWrite(String),

    // -------------------------------------------------------------------------
    // Write Gate Errors
    // -------------------------------------------------------------------------
    #[error("Backup is in progress, the platform is in read-only mode; the change was not applied")]
    BackupInProgress,

    #[error("Write suspended for {waited:?} waiting for the backup to finish")]
    SuspendTimedOut { waited: Duration },

    #[error("A dump session is already active")]
    SessionActive,

    // -------------------------------------------------------------------------
    // Session Errors
    // -------------------------------------------------------------------------
    #[error("Cleanup failed while {stage}: {source}")]
    Cleanup {
        stage: &'static str,
        source: Box<DumpError>,
    },

    #[error("Invalid table set: {0}")]
    InvalidTableSet(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DumpError {
    /// Wrap an I/O failure on one of the archive streams
    pub(crate) fn archive(context: &str, err: std::io::Error) -> Self {
        DumpError::ArchiveWrite(format!("{}: {}", context, err))
    }

    /// Wrap an I/O failure while pulling bytes out of a cursor
    pub(crate) fn source(context: &str, err: std::io::Error) -> Self {
        DumpError::SourceRead(format!("{}: {}", context, err))
    }

    /// Whether this is the caller-facing read-only signal rather than a session failure
    pub fn is_backup_in_progress(&self) -> bool {
        matches!(self, DumpError::BackupInProgress)
    }
}

impl From<rusqlite::Error> for DumpError {
    fn from(err: rusqlite::Error) -> Self {
        DumpError::SourceRead(err.to_string())
    }
}
