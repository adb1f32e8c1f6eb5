//! Intercept Module
//!
//! Gates mutations of the source data while a dump is running.
//!
//! ## Responsibilities
//! - Hold the process-wide "dump active" flag and write policy
//! - Apply the policy to every mutating call
//! - Route host mutation events through the gate for the session only
//!
//! ## Policies
//! ```text
//! ┌──────────┬──────────────────────────────────────────────────────┐
//! │ Ignore   │ write proceeds, dump consistency is best-effort      │
//! │ Suspend  │ writer blocks until the dump finishes, then proceeds │
//! │ Reject   │ writer fails with BackupInProgress                   │
//! └──────────┴──────────────────────────────────────────────────────┘
//! ```

mod hub;
mod interceptor;

use std::fmt;
use std::str::FromStr;

use crate::error::{DumpError, Result};

pub use hub::{MutationHub, MutationSource, Subscription};
pub use interceptor::{ActiveDump, WriteInterceptor};

/// What happens to a write attempted while a dump is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WritePolicy {
    Ignore = 0,
    Suspend = 1,
    Reject = 2,
}

impl WritePolicy {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => WritePolicy::Suspend,
            2 => WritePolicy::Reject,
            _ => WritePolicy::Ignore,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WritePolicy::Ignore => "ignore",
            WritePolicy::Suspend => "suspend",
            WritePolicy::Reject => "reject",
        }
    }
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WritePolicy {
    type Err = DumpError;

    /// Accepts the policy names and their legacy aliases `nothing` and `exception`
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" | "nothing" => Ok(WritePolicy::Ignore),
            "suspend" => Ok(WritePolicy::Suspend),
            "reject" | "exception" => Ok(WritePolicy::Reject),
            other => Err(DumpError::Config(format!("unknown write policy: {}", other))),
        }
    }
}

/// Kind of change a host is about to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

/// A mutation announced by the host before it touches the source data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEvent {
    pub kind: MutationKind,
    /// Kind of object being changed ("user", "group", "membership", ...)
    pub entity: String,
}

impl MutationEvent {
    pub fn new(kind: MutationKind, entity: impl Into<String>) -> Self {
        Self {
            kind,
            entity: entity.into(),
        }
    }
}

/// Callback consulted before a host mutation is applied
///
/// Returning an error vetoes the mutation.
pub trait MutationListener: Send + Sync {
    fn before_mutation(&self, event: &MutationEvent) -> Result<()>;
}
