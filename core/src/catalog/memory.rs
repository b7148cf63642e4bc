use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use common::grant::{Grantee, OWNERSHIP};
use common::object::{ObjectKind, SecurableObject};

use super::{CatalogClient, CatalogError, CatalogResult, TabularResult};
use crate::reconcile::signature::extract_signature;
use crate::statement::{Statement, parse_statement};

const NOT_FOUND_CODE: &str = "002003";
const INJECTED_FAILURE_CODE: &str = "003001";
const ALL_PRIVILEGES: &str = "ALL PRIVILEGES";

#[derive(Debug, Clone)]
struct SeededObject {
    object: SecurableObject,
    database_kind: &'static str,
    builtin: bool,
}

impl SeededObject {
    /// Grant target as written in statements: key plus routine signature.
    fn target(&self) -> String {
        let signature = self
            .object
            .arguments()
            .map(extract_signature)
            .unwrap_or_default();
        format!("{}{}", self.object.key(), signature)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CurrentGrant {
    target: String,
    on: ObjectKind,
    privilege: String,
    grantee: Grantee,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FutureGrant {
    container: ObjectKind,
    key: String,
    on: ObjectKind,
    privilege: String,
    grantee: Grantee,
}

#[derive(Debug, Default)]
struct WarehouseState {
    objects: Vec<SeededObject>,
    grants: Vec<CurrentGrant>,
    future: Vec<FutureGrant>,
    executed: Vec<String>,
}

/// Simulated warehouse answering catalog queries from seeded state.
///
/// `SHOW` results use the same column names the real catalog reports and
/// grant DDL mutates the state, so a full reconciliation can be replayed
/// against it.
#[derive(Debug)]
pub struct InMemoryCatalog {
    role: String,
    failing: HashSet<String>,
    state: Mutex<WarehouseState>,
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new("ACCOUNTADMIN")
    }
}

impl InMemoryCatalog {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            failing: HashSet::new(),
            state: Mutex::new(WarehouseState::default()),
        }
    }

    fn seed(&mut self) -> &mut WarehouseState {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_object(mut self, object: SecurableObject, database_kind: &'static str, builtin: bool) -> Self {
        self.seed().objects.push(SeededObject {
            object,
            database_kind,
            builtin,
        });
        self
    }

    pub fn with_database(self, name: &str) -> Self {
        self.push_object(SecurableObject::database(name), "STANDARD", false)
    }

    /// A database imported from a share; never listed as a standard database.
    pub fn with_shared_database(self, name: &str) -> Self {
        self.push_object(SecurableObject::database(name), "IMPORTED DATABASE", false)
    }

    pub fn with_schema(self, database: &str, schema: &str) -> Self {
        self.push_object(SecurableObject::schema(database, schema), "STANDARD", false)
    }

    pub fn with_object(self, kind: ObjectKind, database: &str, schema: &str, name: &str) -> Self {
        self.push_object(SecurableObject::leaf(kind, database, schema, name), "STANDARD", false)
    }

    /// `arguments` is the catalog's raw signature text, e.g. `P(FLOAT) RETURN VARCHAR`.
    pub fn with_routine(
        self,
        kind: ObjectKind,
        database: &str,
        schema: &str,
        name: &str,
        arguments: &str,
    ) -> Self {
        let routine = SecurableObject::routine(kind, database, schema, name, arguments);
        self.push_object(routine, "STANDARD", false)
    }

    pub fn with_builtin_routine(
        self,
        kind: ObjectKind,
        database: &str,
        schema: &str,
        name: &str,
        arguments: &str,
    ) -> Self {
        let routine = SecurableObject::routine(kind, database, schema, name, arguments);
        self.push_object(routine, "STANDARD", true)
    }

    /// Seeds a current grant. `target` is the object key, with the routine
    /// signature appended for procedures and functions.
    pub fn with_grant(mut self, on: ObjectKind, target: &str, privilege: &str, grantee: Grantee) -> Self {
        self.seed().grants.push(CurrentGrant {
            target: target.to_string(),
            on,
            privilege: privilege.to_string(),
            grantee,
        });
        self
    }

    pub fn with_future_grant(
        mut self,
        container: ObjectKind,
        key: &str,
        on: ObjectKind,
        privilege: &str,
        grantee: Grantee,
    ) -> Self {
        self.seed().future.push(FutureGrant {
            container,
            key: key.to_string(),
            on,
            privilege: privilege.to_string(),
            grantee,
        });
        self
    }

    /// Makes the exact statement text fail every time it is run.
    pub fn failing_on(mut self, statement: &str) -> Self {
        self.failing.insert(statement.to_string());
        self
    }

    /// Every statement run so far, in arrival order.
    pub fn executed(&self) -> CatalogResult<Vec<String>> {
        let state = self
            .state
            .lock()
            .map_err(|_| CatalogError::LockPoisoned("warehouse state"))?;
        Ok(state.executed.clone())
    }

    /// Current grants on `target` as `(privilege, grantee)` pairs.
    pub fn grants_on(&self, target: &str) -> CatalogResult<Vec<(String, Grantee)>> {
        let state = self
            .state
            .lock()
            .map_err(|_| CatalogError::LockPoisoned("warehouse state"))?;
        Ok(state
            .grants
            .iter()
            .filter(|grant| grant.target == target)
            .map(|grant| (grant.privilege.clone(), grant.grantee.clone()))
            .collect())
    }

    pub fn owner_of(&self, target: &str) -> CatalogResult<Option<Grantee>> {
        Ok(self
            .grants_on(target)?
            .into_iter()
            .find(|(privilege, _)| privilege == OWNERSHIP)
            .map(|(_, grantee)| grantee))
    }

    fn execute(&self, text: &str) -> CatalogResult<TabularResult> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| CatalogError::LockPoisoned("warehouse state"))?;
        state.executed.push(text.to_string());

        if self.failing.contains(text) {
            return Err(statement_error(text, INJECTED_FAILURE_CODE, "Insufficient privileges to operate on object"));
        }

        match parse_statement(text)? {
            Statement::SelectCurrentRole => Ok(TabularResult::from_cells(
                vec!["CURRENT_ROLE()".into()],
                vec![vec![Some(self.role.clone())]],
            )),
            Statement::ShowObjects { kind } => Ok(show_objects(&state, kind)),
            Statement::ShowGrants { on, key, signature } => {
                let target = format!("{key}{signature}");
                state.require(text, on, &target)?;
                Ok(show_grants(&state, &target))
            }
            Statement::ShowFutureGrants { container, key } => {
                state.require(text, container, &key)?;
                Ok(show_future_grants(&state, container, &key))
            }
            Statement::Revoke {
                on,
                key,
                signature,
                grantee,
            } => {
                let target = format!("{key}{signature}");
                state.require(text, kind_of(&on)?, &target)?;
                state
                    .grants
                    .retain(|grant| grant.target != target || grant.grantee != grantee || grant.privilege == OWNERSHIP);
                Ok(TabularResult::empty())
            }
            Statement::RevokeFuture {
                on,
                container,
                key,
                grantee,
            } => {
                let on = kind_of(&on)?;
                state.require(text, container, &key)?;
                state.future.retain(|grant| {
                    grant.container != container || grant.key != key || grant.on != on || grant.grantee != grantee
                });
                Ok(TabularResult::empty())
            }
            Statement::GrantOwnership {
                on,
                key,
                signature,
                grantee,
                ..
            } => {
                let on = kind_of(&on)?;
                let target = format!("{key}{signature}");
                state.require(text, on, &target)?;
                state
                    .grants
                    .retain(|grant| grant.target != target || grant.privilege != OWNERSHIP);
                state.grants.push(CurrentGrant {
                    target,
                    on,
                    privilege: OWNERSHIP.to_string(),
                    grantee,
                });
                Ok(TabularResult::empty())
            }
            Statement::GrantUsage { container, key, role } => {
                state.require(text, container, &key)?;
                state.add_grant(CurrentGrant {
                    target: key,
                    on: container,
                    privilege: "USAGE".to_string(),
                    grantee: Grantee::role(role),
                });
                Ok(TabularResult::empty())
            }
            Statement::GrantAllOnFuture { kind, schema, role } => {
                state.require(text, ObjectKind::Schema, &schema)?;
                let grant = FutureGrant {
                    container: ObjectKind::Schema,
                    key: schema,
                    on: kind,
                    privilege: ALL_PRIVILEGES.to_string(),
                    grantee: Grantee::role(role),
                };
                if !state.future.contains(&grant) {
                    state.future.push(grant);
                }
                Ok(TabularResult::empty())
            }
            Statement::GrantAllOnAll { kind, schema, role } => {
                state.require(text, ObjectKind::Schema, &schema)?;
                let targets: Vec<String> = state
                    .objects
                    .iter()
                    .filter(|seeded| seeded.object.kind() == kind && schema_key(&seeded.object) == Some(schema.clone()))
                    .map(SeededObject::target)
                    .collect();
                for target in targets {
                    state.add_grant(CurrentGrant {
                        target,
                        on: kind,
                        privilege: ALL_PRIVILEGES.to_string(),
                        grantee: Grantee::role(role.clone()),
                    });
                }
                Ok(TabularResult::empty())
            }
        }
    }
}

impl WarehouseState {
    fn require(&self, statement: &str, kind: ObjectKind, target: &str) -> CatalogResult<()> {
        let found = self
            .objects
            .iter()
            .any(|seeded| seeded.object.kind() == kind && seeded.target() == target);
        if found {
            Ok(())
        } else {
            Err(statement_error(
                statement,
                NOT_FOUND_CODE,
                &format!("{kind} '{target}' does not exist or not authorized."),
            ))
        }
    }

    fn add_grant(&mut self, grant: CurrentGrant) {
        if !self.grants.contains(&grant) {
            self.grants.push(grant);
        }
    }
}

impl CatalogClient for InMemoryCatalog {
    async fn run(&self, statement: &str) -> CatalogResult<TabularResult> {
        let result = self.execute(statement);
        // Yield so concurrent callers interleave like real round trips.
        tokio::task::yield_now().await;
        result
    }
}

fn statement_error(statement: &str, code: &str, message: &str) -> CatalogError {
    CatalogError::Statement {
        statement: statement.to_string(),
        code: code.to_string(),
        message: message.to_string(),
    }
}

fn kind_of(raw: &str) -> CatalogResult<ObjectKind> {
    raw.parse()
        .map_err(|err: common::object::UnknownObjectKind| CatalogError::Unsupported(err.to_string()))
}

fn schema_key(object: &SecurableObject) -> Option<String> {
    object
        .schema_name()
        .map(|schema| common::object::build_key([Some(object.database_name()), Some(schema)]))
}

/// Catalog spelling of a kind in grant listings (`EXTERNAL_TABLE`).
fn catalog_kind(kind: ObjectKind) -> String {
    kind.keyword().replace(' ', "_")
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn show_objects(state: &WarehouseState, kind: ObjectKind) -> TabularResult {
    let listed: Vec<&SecurableObject> = state
        .objects
        .iter()
        .filter(|seeded| seeded.object.kind() == kind)
        .map(|seeded| &seeded.object)
        .collect();
    if listed.is_empty() {
        return TabularResult::empty();
    }

    let seeded_for = |object: &SecurableObject| {
        state
            .objects
            .iter()
            .find(|seeded| &seeded.object == object)
    };

    match kind {
        ObjectKind::Database => TabularResult::from_cells(
            columns(&["name", "kind", "owner"]),
            listed
                .into_iter()
                .map(|object| {
                    let database_kind = seeded_for(object).map(|seeded| seeded.database_kind);
                    vec![
                        Some(object.database_name().to_string()),
                        database_kind.map(str::to_string),
                        None,
                    ]
                })
                .collect(),
        ),
        ObjectKind::Schema => TabularResult::from_cells(
            columns(&["name", "database_name", "owner"]),
            listed
                .into_iter()
                .map(|object| {
                    vec![
                        object.schema_name().map(str::to_string),
                        Some(object.database_name().to_string()),
                        None,
                    ]
                })
                .collect(),
        ),
        kind if kind.is_routine() => TabularResult::from_cells(
            columns(&["name", "catalog_name", "schema_name", "is_builtin", "arguments"]),
            listed
                .into_iter()
                .map(|object| {
                    let builtin = seeded_for(object).is_some_and(|seeded| seeded.builtin);
                    vec![
                        object.name().map(str::to_string),
                        Some(object.database_name().to_string()),
                        object.schema_name().map(str::to_string),
                        Some(if builtin { "Y" } else { "N" }.to_string()),
                        object.arguments().map(str::to_string),
                    ]
                })
                .collect(),
        ),
        kind => TabularResult::from_cells(
            columns(&["name", "database_name", "schema_name", "kind"]),
            listed
                .into_iter()
                .map(|object| {
                    vec![
                        object.name().map(str::to_string),
                        Some(object.database_name().to_string()),
                        object.schema_name().map(str::to_string),
                        Some(catalog_kind(kind)),
                    ]
                })
                .collect(),
        ),
    }
}

fn show_grants(state: &WarehouseState, target: &str) -> TabularResult {
    let rows: Vec<Vec<Option<String>>> = state
        .grants
        .iter()
        .filter(|grant| grant.target == target)
        .map(|grant| {
            vec![
                Some(grant.privilege.clone()),
                Some(catalog_kind(grant.on)),
                Some(grant.target.clone()),
                Some(grant.grantee.kind().to_string().replace(' ', "_")),
                Some(grant.grantee.name().to_string()),
                Some("false".to_string()),
            ]
        })
        .collect();
    if rows.is_empty() {
        return TabularResult::empty();
    }

    TabularResult::from_cells(
        columns(&["privilege", "granted_on", "name", "granted_to", "grantee_name", "grant_option"]),
        rows,
    )
}

fn show_future_grants(state: &WarehouseState, container: ObjectKind, key: &str) -> TabularResult {
    let rows: Vec<Vec<Option<String>>> = state
        .future
        .iter()
        .filter(|grant| grant.container == container && grant.key == key)
        .map(|grant| {
            vec![
                Some(grant.privilege.clone()),
                Some(catalog_kind(grant.on)),
                Some(format!("{key}.<{}>", catalog_kind(grant.on))),
                Some(grant.grantee.kind().to_string().replace(' ', "_")),
                Some(grant.grantee.name().to_string()),
                Some("false".to_string()),
            ]
        })
        .collect();
    if rows.is_empty() {
        return TabularResult::empty();
    }

    TabularResult::from_cells(
        columns(&["privilege", "grant_on", "name", "grant_to", "grantee_name", "grant_option"]),
        rows,
    )
}
