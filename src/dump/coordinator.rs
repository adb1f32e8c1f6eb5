//! Backup coordinator
//!
//! Runs one dump session end to end.
//!
//! ## Session Lifecycle
//! ```text
//! run(connection, tables)
//!   ├── validate table names
//!   ├── subscribe the write gate to every mutation source
//!   ├── activate the write gate (policy fixed for the session)
//!   ├── create content + length archives
//!   ├── dump each table in order
//!   └── always:
//!         unsubscribe → deactivate gate → commit → close connection → close archives
//! ```
//! The first failure wins; teardown failures after it are only logged.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::Sender;

use crate::archive::ArchiveWriter;
use crate::config::BackupConfig;
use crate::error::{DumpError, Result};
use crate::intercept::{MutationListener, MutationSource, Subscription, WriteInterceptor};
use crate::source::{SourceConnection, TableSpec};

use super::progress::{DumpProgress, ProgressReporter};
use super::{TableDumpWriter, TableStats};

/// Outcome of a successful session
#[derive(Debug, Clone)]
pub struct DumpReport {
    /// Per-table counters, in dump order
    pub tables: Vec<TableStats>,
    pub content_archive: PathBuf,
    pub length_archive: PathBuf,
    pub elapsed: Duration,
}

impl DumpReport {
    /// Rows dumped across all tables
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

/// Orchestrates dump sessions against a shared write gate
///
/// ## Ownership:
/// - The connection passed to `run` is owned by the session and closed by it
/// - The gate is shared with every mutation path of the host
/// - Archives are created per session and closed by it
pub struct BackupCoordinator {
    config: BackupConfig,
    interceptor: Arc<WriteInterceptor>,
    sources: Vec<Arc<dyn MutationSource>>,
    progress: ProgressReporter,
}

type FileArchive = ArchiveWriter<BufWriter<File>>;

impl BackupCoordinator {
    /// Create a coordinator; the config is validated here
    pub fn new(config: BackupConfig, interceptor: Arc<WriteInterceptor>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            interceptor,
            sources: Vec::new(),
            progress: ProgressReporter::default(),
        })
    }

    /// Gate this source's mutation events during every session
    pub fn with_mutation_source(mut self, source: Arc<dyn MutationSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Send session milestones to `sender`
    pub fn with_progress(mut self, sender: Sender<DumpProgress>) -> Self {
        self.progress = ProgressReporter::new(Some(sender));
        self
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    pub fn interceptor(&self) -> &Arc<WriteInterceptor> {
        &self.interceptor
    }

    /// Dump `tables`, in order, from `connection`
    ///
    /// The connection is committed and closed and both archives are closed
    /// whatever the outcome; the gate is always left inactive.
    pub fn run<C: SourceConnection>(&self, mut connection: C, tables: &[TableSpec]) -> Result<DumpReport> {
        let started = Instant::now();
        tracing::info!(
            tables = tables.len(),
            policy = %self.config.write_policy,
            dir = %self.config.storage_dir.display(),
            "Backup started"
        );

        let mut archive: Option<FileArchive> = None;
        let outcome = self.dump_session(&mut connection, tables, &mut archive);

        let mut cleanup = Vec::new();
        if let Err(e) = connection.commit() {
            cleanup.push(cleanup_error("committing the connection", e));
        }
        if let Err(e) = connection.close() {
            cleanup.push(cleanup_error("closing the connection", e));
        }
        if let Some(archive) = archive {
            if let Err(e) = archive.close() {
                cleanup.push(cleanup_error("closing the archives", e));
            }
        }

        let elapsed = started.elapsed();
        let result = match outcome {
            Err(primary) => {
                for e in &cleanup {
                    tracing::error!("{} (after an earlier failure)", e);
                }
                Err(primary)
            }
            Ok(stats) => {
                let mut cleanup = cleanup.into_iter();
                match cleanup.next() {
                    Some(first) => {
                        for e in cleanup {
                            tracing::error!("{}", e);
                        }
                        Err(first)
                    }
                    None => Ok(DumpReport {
                        tables: stats,
                        content_archive: self.config.content_archive_path(),
                        length_archive: self.config.length_archive_path(),
                        elapsed,
                    }),
                }
            }
        };

        match &result {
            Ok(report) => tracing::info!(
                tables = report.tables.len(),
                rows = report.total_rows(),
                elapsed = ?elapsed,
                "Backup finished"
            ),
            Err(e) => tracing::error!("Backup failed: {}", e),
        }
        self.progress.report(DumpProgress::SessionFinished {
            tables: tables.len(),
            succeeded: result.is_ok(),
            elapsed,
        });
        result
    }

    /// Everything between acquiring and releasing the gate
    fn dump_session<C: SourceConnection>(
        &self,
        connection: &mut C,
        tables: &[TableSpec],
        archive: &mut Option<FileArchive>,
    ) -> Result<Vec<TableStats>> {
        validate_tables(tables)?;

        let subscriptions = self.subscribe_sources();
        let gate = self.interceptor.activate(self.config.write_policy)?;

        let result = self.dump_tables(connection, tables, archive);

        // Listeners go first, then the flag, on every path
        drop(subscriptions);
        drop(gate);
        result
    }

    fn subscribe_sources(&self) -> Vec<Subscription> {
        let listener: Arc<dyn MutationListener> = self.interceptor.clone();
        self.sources
            .iter()
            .map(|source| source.subscribe(Arc::clone(&listener)))
            .collect()
    }

    fn dump_tables<C: SourceConnection>(
        &self,
        connection: &mut C,
        tables: &[TableSpec],
        archive: &mut Option<FileArchive>,
    ) -> Result<Vec<TableStats>> {
        let writer = archive.insert(ArchiveWriter::create(&self.config)?);
        let mut table_writer =
            TableDumpWriter::new(writer, self.config.fetch_size, self.config.chunk_size);

        let mut stats = Vec::with_capacity(tables.len());
        for (index, table) in tables.iter().enumerate() {
            self.progress.report(DumpProgress::TableStarted {
                table: table.name.clone(),
                index,
                total: tables.len(),
            });

            let table_stats = table_writer.dump(connection, table).map_err(|e| {
                tracing::error!(table = %table.name, "Table dump failed: {}", e);
                e
            })?;

            self.progress
                .report(DumpProgress::TableCompleted(table_stats.clone()));
            stats.push(table_stats);
        }
        Ok(stats)
    }
}

/// Table names key the archive entries: non-empty and unique
fn validate_tables(tables: &[TableSpec]) -> Result<()> {
    let mut seen = HashSet::with_capacity(tables.len());
    for table in tables {
        if table.name.is_empty() {
            return Err(DumpError::InvalidTableSet(
                "table name must not be empty".to_string(),
            ));
        }
        if !seen.insert(table.name.as_str()) {
            return Err(DumpError::InvalidTableSet(format!(
                "table {} listed more than once",
                table.name
            )));
        }
    }
    Ok(())
}

fn cleanup_error(stage: &'static str, source: DumpError) -> DumpError {
    DumpError::Cleanup {
        stage,
        source: Box::new(source),
    }
}
