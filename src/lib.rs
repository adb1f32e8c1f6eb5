//! # tabledump
//!
//! Streaming backups of relational tables for a live system:
//! - Type-aware cell encoding (raw bytes for binary columns, UTF-8 for the rest)
//! - Two synchronized ZIP archives: cell contents and per-cell lengths
//! - Chunked streaming so large objects never sit in memory whole
//! - A process-wide write gate (ignore / suspend / reject) while a dump runs
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   BackupCoordinator                          │
//! │         (one session: gate, connection, archives)            │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │ TableDumpWriter │                │ WriteInterceptor│◄── every host
//!   │  (per table)    │                │  (atomic flag)  │    mutation path
//!   └───────┬─────────┘                └─────────────────┘
//!           │
//!     ┌─────┴───────────────┐
//!     ▼                     ▼
//! ┌─────────────┐   ┌─────────────────┐
//! │ ColumnCodec │   │  ArchiveWriter  │
//! │ (bin/text)  │   │ dump.zip        │
//! └──────┬──────┘   │ dump-len.zip    │
//!        │          └─────────────────┘
//!        ▼
//! ┌─────────────────┐
//! │ SourceConnection│
//! │ (cursor source) │
//! └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod source;
pub mod archive;
pub mod intercept;
pub mod dump;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DumpError, Result};
pub use config::{BackupConfig, InterceptorConfig};
pub use dump::{BackupCoordinator, DumpProgress, DumpReport, TableStats};
pub use intercept::{MutationHub, WriteInterceptor, WritePolicy};
pub use source::{SourceConnection, TableSpec};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tabledump
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
