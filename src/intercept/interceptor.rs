//! Write interceptor
//!
//! The gate every mutating path consults while a dump may be running.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::config::InterceptorConfig;
use crate::error::{DumpError, Result};

use super::{MutationEvent, MutationListener, WritePolicy};

/// Process-wide write gate
///
/// Build one per process, share it by `Arc` with the coordinator and with
/// every mutation path.
///
/// ## Concurrency:
/// - `active`/`policy`: atomics, read lock-free by any writer thread
/// - `control`: serializes activate/deactivate and backs the `released` condvar
/// - `policy` only changes while `active` is false
pub struct WriteInterceptor {
    active: AtomicBool,
    policy: AtomicU8,
    control: Mutex<()>,
    released: Condvar,
    suspended: AtomicUsize,
    config: InterceptorConfig,
}

impl WriteInterceptor {
    /// Create a gate; the config is validated here
    pub fn new(config: InterceptorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: InterceptorConfig) -> Self {
        Self {
            active: AtomicBool::new(false),
            policy: AtomicU8::new(WritePolicy::Ignore as u8),
            control: Mutex::new(()),
            released: Condvar::new(),
            suspended: AtomicUsize::new(0),
            config,
        }
    }

    /// Mark a dump as running under `policy`
    ///
    /// The returned guard deactivates the gate when dropped. Fails with
    /// `SessionActive` if another dump holds the gate.
    pub fn activate(&self, policy: WritePolicy) -> Result<ActiveDump<'_>> {
        let _control = self.control.lock();
        if self.active.load(Ordering::Acquire) {
            return Err(DumpError::SessionActive);
        }
        self.policy.store(policy as u8, Ordering::Release);
        self.active.store(true, Ordering::Release);
        tracing::debug!(%policy, "write gate activated");
        Ok(ActiveDump { interceptor: self })
    }

    fn deactivate(&self) {
        let _control = self.control.lock();
        self.active.store(false, Ordering::Release);
        self.released.notify_all();
        tracing::debug!("write gate released");
    }

    /// Whether a dump currently holds the gate
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Policy of the current (or last) dump
    pub fn policy(&self) -> WritePolicy {
        WritePolicy::from_u8(self.policy.load(Ordering::Acquire))
    }

    /// Number of writers currently blocked by the Suspend policy
    pub fn suspended_writers(&self) -> usize {
        self.suspended.load(Ordering::Acquire)
    }

    /// Apply the active policy to a write about to happen
    ///
    /// Must be called before the mutation touches any data.
    pub fn check_write_allowed(&self) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        match self.policy() {
            WritePolicy::Ignore => Ok(()),
            WritePolicy::Reject => {
                tracing::debug!("write rejected: backup in progress");
                Err(DumpError::BackupInProgress)
            }
            WritePolicy::Suspend => self.wait_for_release(),
        }
    }

    fn wait_for_release(&self) -> Result<()> {
        let started = Instant::now();
        let mut control = self.control.lock();
        if !self.active.load(Ordering::Acquire) {
            return Ok(());
        }

        self.suspended.fetch_add(1, Ordering::AcqRel);
        tracing::debug!("write suspended until the backup finishes");

        let outcome = loop {
            if !self.active.load(Ordering::Acquire) {
                break Ok(());
            }
            let mut wait = self.config.poll_interval;
            if let Some(limit) = self.config.suspend_timeout {
                let waited = started.elapsed();
                if waited >= limit {
                    break Err(DumpError::SuspendTimedOut { waited });
                }
                wait = wait.min(limit - waited);
            }
            self.released.wait_for(&mut control, wait);
        };

        self.suspended.fetch_sub(1, Ordering::AcqRel);
        match &outcome {
            Ok(()) => tracing::debug!(waited = ?started.elapsed(), "suspended write resumed"),
            Err(e) => tracing::warn!("suspended write gave up: {}", e),
        }
        outcome
    }
}

impl Default for WriteInterceptor {
    fn default() -> Self {
        Self::with_config(InterceptorConfig::default())
    }
}

impl MutationListener for WriteInterceptor {
    fn before_mutation(&self, event: &MutationEvent) -> Result<()> {
        tracing::trace!(kind = ?event.kind, entity = %event.entity, "mutation checked");
        self.check_write_allowed()
    }
}

/// Holds the gate for one dump; releases it on drop
#[must_use = "the gate is released as soon as the guard is dropped"]
pub struct ActiveDump<'a> {
    interceptor: &'a WriteInterceptor,
}

impl ActiveDump<'_> {
    pub fn policy(&self) -> WritePolicy {
        self.interceptor.policy()
    }
}

impl Drop for ActiveDump<'_> {
    fn drop(&mut self) {
        self.interceptor.deactivate();
    }
}
