pub mod catalog;
pub mod pool;
pub mod reconcile;
pub mod sink;
pub mod statement;

pub use catalog::{
    CatalogClient, CatalogError, CatalogResult, InMemoryCatalog, SnowflakeCatalog, SnowflakeSettings,
    TabularResult, TokenType,
};
pub use pool::{ExecutionSummary, StatementFailure, WorkerPool, run_many};
pub use reconcile::{
    IgnoreList, ReconcileError, ReconcileResult, Reconciler, ReconciliationPlan, RunReport, Settings,
};
pub use sink::{NEW_GRANTS_ARTIFACT, OWNERSHIPS_ARTIFACT, REVOKES_ARTIFACT, SinkReport, StatementSink};
pub use statement::{ParseError, Statement, parse_artifact, parse_statement};

pub use common::grant::{GrantRow, Grantee, GranteeKind};
pub use common::object::{ObjectKind, SecurableObject};
