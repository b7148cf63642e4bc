use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use privreset_core::reconcile::collect;
use privreset_core::{
    CatalogClient, CatalogResult, Grantee, InMemoryCatalog, ObjectKind, SecurableObject, Statement,
    TabularResult, WorkerPool, run_many,
};

/// Records how many statements were in flight at once.
struct CountingCatalog {
    inner: InMemoryCatalog,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl CountingCatalog {
    fn new(inner: InMemoryCatalog) -> Self {
        Self {
            inner,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CatalogClient for CountingCatalog {
    async fn run(&self, statement: &str) -> CatalogResult<TabularResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let result = self.inner.run(statement).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn make_tables(count: usize) -> (InMemoryCatalog, Vec<SecurableObject>) {
    let mut catalog = InMemoryCatalog::default().with_database("D").with_schema("D", "S");
    let mut objects = Vec::new();
    for i in 0..count {
        let name = format!("T{i}");
        let key = format!("D.S.{name}");
        catalog = catalog
            .with_object(ObjectKind::Table, "D", "S", &name)
            .with_grant(ObjectKind::Table, &key, "SELECT", Grantee::role("A"))
            .with_grant(ObjectKind::Table, &key, "SELECT", Grantee::role("A"));
        objects.push(SecurableObject::leaf(ObjectKind::Table, "D", "S", name));
    }
    (catalog, objects)
}

#[tokio::test]
async fn collector_respects_pool_bound() {
    let (inner, objects) = make_tables(24);
    let catalog = CountingCatalog::new(inner);

    let grants = collect(&catalog, &objects, "C", WorkerPool::new(3)).await;

    // Duplicate catalog rows collapse to one grant per table.
    assert_eq!(grants.len(), 24);
    assert_eq!(catalog.calls(), 24);
    assert!(catalog.peak() <= 3, "peak {} exceeds pool", catalog.peak());
    assert!(catalog.peak() >= 2, "pool never ran tasks concurrently");
}

#[tokio::test]
async fn run_many_isolates_failures() {
    let (inner, _) = make_tables(6);
    let failing = "REVOKE ALL PRIVILEGES ON TABLE D.S.T2 FROM ROLE A";
    let catalog = CountingCatalog::new(inner.failing_on(failing));

    let statements: Vec<Statement> = (0..6)
        .map(|i| Statement::Revoke {
            on: "TABLE".into(),
            key: format!("D.S.T{i}"),
            signature: String::new(),
            grantee: Grantee::role("A"),
        })
        .collect();

    let summary = run_many(&catalog, &statements, WorkerPool::new(2)).await;

    assert_eq!(summary.succeeded, 5);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.failures[0].statement, failing);
    assert_eq!(summary.failures[0].kind, "statement");
    assert!(catalog.peak() <= 2);
    assert_eq!(catalog.calls(), 6);
}
