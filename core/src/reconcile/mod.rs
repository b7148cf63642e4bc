//! The reconciliation pipeline.
//!
//! Inventory, grant collection and planning complete in full before any
//! statement is delivered; revokes are delivered before ownership
//! transfers, which are delivered before new grants.

use std::io;
use std::path::PathBuf;

use common::object::{ObjectKind, SecurableObject};
use thiserror::Error;

use crate::catalog::{CatalogClient, CatalogError};
use crate::pool::{DEFAULT_WORKERS, WorkerPool};
use crate::sink::{NEW_GRANTS_ARTIFACT, OWNERSHIPS_ARTIFACT, REVOKES_ARTIFACT, SinkReport, StatementSink};

pub mod collector;
pub mod inventory;
pub mod new_grants;
pub mod planner;
pub mod signature;

pub use collector::collect;
pub use inventory::{IgnoreList, enumerate, filter_databases};
pub use new_grants::plan_new_grants;
pub use planner::{ReconciliationPlan, plan};
pub use signature::extract_signature;

pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("artifact I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Inputs of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Working-database allow-list; empty means every database.
    pub databases: Vec<String>,
    /// Kinds to inventory, in listing order.
    pub objects: Vec<ObjectKind>,
    pub new_owner: String,
    pub run_dry: bool,
    pub workers: usize,
    pub ignore: IgnoreList,
    pub output_directory: PathBuf,
}

impl Settings {
    pub fn new(new_owner: impl Into<String>, objects: Vec<ObjectKind>) -> Self {
        Self {
            databases: Vec::new(),
            objects,
            new_owner: new_owner.into(),
            run_dry: true,
            workers: DEFAULT_WORKERS,
            ignore: IgnoreList::default(),
            output_directory: PathBuf::from("."),
        }
    }
}

/// Counts from one completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub objects: usize,
    pub grants: usize,
    pub revokes: SinkReport,
    pub ownerships: SinkReport,
    pub new_grants: SinkReport,
}

impl RunReport {
    /// Statements that were submitted and failed, across all artifacts.
    pub fn failed_statements(&self) -> usize {
        [&self.revokes, &self.ownerships, &self.new_grants]
            .iter()
            .filter_map(|report| report.execution.as_ref())
            .map(|summary| summary.failed())
            .sum()
    }
}

/// Drives one run against a single catalog session.
pub struct Reconciler<'a, C> {
    client: &'a C,
    settings: Settings,
}

impl<'a, C> Reconciler<'a, C>
where
    C: CatalogClient,
{
    pub fn new(client: &'a C, settings: Settings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Computes the revoke and ownership plan without delivering anything.
    pub async fn plan(&self) -> ReconciliationPlan {
        let inventory = self.inventory().await;
        let grants = collect(self.client, &inventory, &self.settings.new_owner, self.pool()).await;
        plan(&grants, &self.settings.new_owner)
    }

    pub async fn run(&self) -> ReconcileResult<RunReport> {
        let settings = &self.settings;
        let inventory = self.inventory().await;
        let grants = collect(self.client, &inventory, &settings.new_owner, self.pool()).await;
        let reconciliation = plan(&grants, &settings.new_owner);
        log::info!(
            "All modifications to perform after checking the ownerships: {}.",
            reconciliation.len()
        );

        let sink = StatementSink::new(self.client, &settings.output_directory, settings.run_dry, self.pool());
        let revokes = sink
            .deliver(REVOKES_ARTIFACT, &reconciliation.revoke_statements)
            .await?;
        let ownerships = sink
            .deliver(OWNERSHIPS_ARTIFACT, &reconciliation.ownership_statements)
            .await?;

        let additions = plan_new_grants(&inventory, &settings.objects, &settings.new_owner);
        let new_grants = sink.deliver(NEW_GRANTS_ARTIFACT, &additions).await?;

        Ok(RunReport {
            objects: inventory.len(),
            grants: grants.len(),
            revokes,
            ownerships,
            new_grants,
        })
    }

    async fn inventory(&self) -> Vec<SecurableObject> {
        let objects = enumerate(self.client, &self.settings.objects, &self.settings.ignore).await;
        filter_databases(objects, &self.settings.databases)
    }

    fn pool(&self) -> WorkerPool {
        WorkerPool::new(self.settings.workers)
    }
}
