//! Codec Module
//!
//! Decides how each cell becomes bytes in the content archive.
//!
//! ## Encoding Rules
//! ```text
//! ┌──────────────────────────────────────┬─────────────────────────────┐
//! │ Declared type                        │ Cell bytes                  │
//! ├──────────────────────────────────────┼─────────────────────────────┤
//! │ BINARY, VARBINARY, LONGVARBINARY,    │ raw binary stream           │
//! │ BLOB, OTHER                          │                             │
//! ├──────────────────────────────────────┼─────────────────────────────┤
//! │ everything else                      │ string value, UTF-8 encoded │
//! └──────────────────────────────────────┴─────────────────────────────┘
//! ```
//! Null cells produce no bytes at all.

mod cell;
mod sql_type;

pub use cell::{CellStream, ColumnCodec};
pub use sql_type::SqlType;

/// Channel a column's cells are read through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Raw byte stream
    Binary,
    /// String re-encoded as UTF-8
    Text,
}

impl Encoding {
    /// Classify a declared column type
    pub fn for_type(sql_type: SqlType) -> Self {
        if sql_type.is_binary() {
            Encoding::Binary
        } else {
            Encoding::Text
        }
    }
}
