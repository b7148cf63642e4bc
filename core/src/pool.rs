//! Bounded fan-out over warehouse round trips.

use std::future::Future;

use futures::{StreamExt, stream};

use crate::catalog::CatalogClient;
use crate::statement::Statement;

pub const DEFAULT_WORKERS: usize = 8;

/// Runs independent tasks with at most `size` in flight at once.
///
/// Results are gathered by the driving future in completion order, so no
/// task ever touches the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPool {
    size: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub async fn map_unordered<I, T, F, Fut, R>(&self, items: I, task: F) -> Vec<R>
    where
        I: IntoIterator<Item = T>,
        F: FnMut(T) -> Fut,
        Fut: Future<Output = R>,
    {
        stream::iter(items)
            .map(task)
            .buffer_unordered(self.size)
            .collect()
            .await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementFailure {
    pub statement: String,
    pub kind: &'static str,
    pub message: String,
}

/// Outcome of executing a batch of statements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub succeeded: usize,
    pub failures: Vec<StatementFailure>,
}

impl ExecutionSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed()
    }
}

/// Executes every statement independently; a failure is logged and recorded
/// without stopping the rest of the batch.
pub async fn run_many<C>(client: &C, statements: &[Statement], pool: WorkerPool) -> ExecutionSummary
where
    C: CatalogClient,
{
    let outcomes = pool
        .map_unordered(statements, |statement| async move {
            let text = statement.to_string();
            match client.run(&text).await {
                Ok(_) => Ok(()),
                Err(err) => {
                    log::error!("SQL request '{text}' has failed ({}): {err}", err.kind());
                    Err(StatementFailure {
                        statement: text,
                        kind: err.kind(),
                        message: err.to_string(),
                    })
                }
            }
        })
        .await;

    let mut summary = ExecutionSummary::default();
    for outcome in outcomes {
        match outcome {
            Ok(()) => summary.succeeded += 1,
            Err(failure) => summary.failures.push(failure),
        }
    }
    summary
}
