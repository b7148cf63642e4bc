//! Persists statement lists and optionally executes them.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::catalog::CatalogClient;
use crate::pool::{ExecutionSummary, WorkerPool, run_many};
use crate::reconcile::ReconcileResult;
use crate::statement::Statement;

pub const REVOKES_ARTIFACT: &str = "output-revokes.txt";
pub const OWNERSHIPS_ARTIFACT: &str = "output-ownerships.txt";
pub const NEW_GRANTS_ARTIFACT: &str = "output-new-grants.txt";

const READY_MARKER: &str = "-- Ready ...\n";
const DONE_MARKER: &str = "\n-- ... Done.";

/// What happened to one statement list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkReport {
    pub path: PathBuf,
    pub written: usize,
    /// `None` when nothing was submitted, either because the list was empty
    /// or because the run is simulated.
    pub execution: Option<ExecutionSummary>,
}

/// Writes artifacts into one directory and submits statements unless
/// simulating.
pub struct StatementSink<'a, C> {
    client: &'a C,
    directory: PathBuf,
    simulate: bool,
    pool: WorkerPool,
}

impl<'a, C> StatementSink<'a, C>
where
    C: CatalogClient,
{
    pub fn new(client: &'a C, directory: impl Into<PathBuf>, simulate: bool, pool: WorkerPool) -> Self {
        Self {
            client,
            directory: directory.into(),
            simulate,
            pool,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Replaces the artifact `name` with `statements` and runs them.
    ///
    /// The end marker is written only after execution finishes.
    pub async fn deliver(&self, name: &str, statements: &[Statement]) -> ReconcileResult<SinkReport> {
        let path = self.directory.join(name);
        let mut file = File::create(&path)?;

        if statements.is_empty() {
            log::info!("{name}: Nothing to do.");
            return Ok(SinkReport {
                path,
                written: 0,
                execution: None,
            });
        }

        file.write_all(READY_MARKER.as_bytes())?;
        file.write_all(join_statements(statements).as_bytes())?;
        file.flush()?;
        log::info!("{name}: {} statement(s) written to {}.", statements.len(), path.display());

        let execution = if self.simulate {
            log::info!("{name}: run_dry, nothing executed.");
            None
        } else {
            let summary = run_many(self.client, statements, self.pool).await;
            log::info!(
                "{name}: executed: ok={} failed={}.",
                summary.succeeded,
                summary.failed()
            );
            Some(summary)
        };

        file.write_all(DONE_MARKER.as_bytes())?;

        Ok(SinkReport {
            path,
            written: statements.len(),
            execution,
        })
    }
}

/// One statement per line, separated by `;`. An audit note follows the
/// separator so that it never swallows it.
fn join_statements(statements: &[Statement]) -> String {
    let last = statements.len().saturating_sub(1);
    let mut text = String::new();
    for (index, statement) in statements.iter().enumerate() {
        text.push_str(&statement.sql().to_string());
        if index < last {
            text.push(';');
        }
        if let Some(note) = statement.audit_note() {
            text.push(' ');
            text.push_str(&note);
        }
        if index < last {
            text.push('\n');
        }
    }
    text
}

/// Full artifact text for a statement list, as `deliver` leaves it.
pub fn render_artifact(statements: &[Statement]) -> String {
    if statements.is_empty() {
        return String::new();
    }
    format!("{READY_MARKER}{}{DONE_MARKER}", join_statements(statements))
}
