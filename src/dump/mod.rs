//! Dump Module
//!
//! Turns a set of tables into the paired content/length archives.
//!
//! ## Responsibilities
//! - Stream each table's rows through the column codec
//! - Keep content and length entries position-aligned
//! - Own the session: gate, connection, archives, teardown
//!
//! ## Alignment Invariant
//! ```text
//! content:  [header][c(1,1)][c(1,2)]...[c(1,C)][c(2,1)]...      variable width
//! lengths:          [l(1,1)][l(1,2)]...[l(1,C)][l(2,1)]...      8 bytes each
//! ```
//! After N complete rows both entries hold N×C cell records; `l = -1` means
//! the cell is null and contributed no content bytes.

mod coordinator;
mod progress;
mod table;

pub use coordinator::{BackupCoordinator, DumpReport};
pub use progress::DumpProgress;
pub use table::{encode_header, TableDumpWriter, TableStats};
