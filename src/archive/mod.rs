//! Archive Module
//!
//! Two append-only ZIP containers written in lockstep.
//!
//! ## Responsibilities
//! - One named entry per table in each container
//! - Strict open/close pairing of entries
//! - CRC32 and sizes recorded per entry
//! - Central directory written when the container is finished
//!
//! ## Container Layout (per stream)
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Entry 1                                                 │
//! │   Local header (30 + name) │ deflate data │ descriptor  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Entry 2 ...                                             │
//! ├─────────────────────────────────────────────────────────┤
//! │ Central directory (46 + name per entry)                 │
//! ├─────────────────────────────────────────────────────────┤
//! │ ZIP64 end record (56) + locator (20)   only when needed │
//! ├─────────────────────────────────────────────────────────┤
//! │ End of central directory (22)                           │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Entries switch to ZIP64 fields individually: a size of 4 GiB or more gets
//! an 8-byte data descriptor, and any size or offset that overflows 32 bits
//! moves into the entry's ZIP64 extra field in the central directory.
//!
//! ## Entry Payloads
//! ```text
//! content entry:  [colCount: i32][typeCode: i32][nameLen: i32][name] ... [cell bytes] ...
//! length entry:   [len: i64] per cell, -1 for null
//! ```
//! All integers inside entries are big-endian; ZIP records are little-endian.

mod container;
mod writer;

pub use container::ContainerWriter;
pub use writer::ArchiveWriter;

// =============================================================================
// Shared Constants
// =============================================================================

pub(crate) const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
pub(crate) const DATA_DESCRIPTOR_SIG: u32 = 0x0807_4b50;
pub(crate) const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
pub(crate) const END_OF_CENTRAL_DIR_SIG: u32 = 0x0605_4b50;
pub(crate) const ZIP64_END_OF_CENTRAL_DIR_SIG: u32 = 0x0606_4b50;
pub(crate) const ZIP64_LOCATOR_SIG: u32 = 0x0706_4b50;
pub(crate) const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Version 2.0: deflate with data descriptors
pub(crate) const ZIP_VERSION: u16 = 20;

/// Version 4.5: ZIP64 records
pub(crate) const ZIP64_VERSION: u16 = 45;

/// Sizes and offsets at or above this are stored in ZIP64 fields
pub(crate) const ZIP32_MAX: u64 = 0xFFFF_FFFF;

/// Entry counts at or above this need the ZIP64 end record
pub(crate) const ZIP32_MAX_ENTRIES: u64 = 0xFFFF;

/// Bit 3: sizes in data descriptor; bit 11: UTF-8 names
pub(crate) const ENTRY_FLAGS: u16 = (1 << 3) | (1 << 11);

pub(crate) const METHOD_DEFLATE: u16 = 8;

/// Length record marking a null cell
pub const NULL_LENGTH: i64 = -1;
