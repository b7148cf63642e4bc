//! Enumerates securable objects and assigns their identity keys.

use common::column::{CatalogRow, ColumnContainer};
use common::object::{ObjectKind, SecurableObject};

use crate::catalog::CatalogClient;
use crate::statement::Statement;

const STANDARD_DATABASE: &str = "STANDARD";

/// Databases and schemas that are never reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreList {
    pub databases: Vec<String>,
    pub schemas: Vec<String>,
}

/// The account's system database, the worksheet application and every
/// schema's information schema.
impl Default for IgnoreList {
    fn default() -> Self {
        Self {
            databases: vec!["SNOWFLAKE".into(), "WORKSHEETS_APP".into()],
            schemas: vec!["INFORMATION_SCHEMA".into()],
        }
    }
}

impl IgnoreList {
    fn excludes(&self, object: &SecurableObject) -> bool {
        self.databases.iter().any(|db| db == object.database_name())
            || object
                .schema_name()
                .is_some_and(|schema| self.schemas.iter().any(|ignored| ignored == schema))
    }
}

/// Lists every object of each kind, in kind order.
///
/// A failed listing is logged and treated as empty.
pub async fn enumerate<C>(client: &C, kinds: &[ObjectKind], ignore: &IgnoreList) -> Vec<SecurableObject>
where
    C: CatalogClient,
{
    let mut inventory = Vec::new();

    for &kind in kinds {
        let statement = Statement::ShowObjects { kind }.to_string();
        let listing = match client.run(&statement).await {
            Ok(listing) => listing,
            Err(err) => {
                log::warn!("catalog query '{statement}' failed, treating as empty: {err}");
                Default::default()
            }
        };

        log::info!("Found: {} {}(s).", listing.len(), kind.keyword().to_lowercase());

        if !listing.is_empty() {
            let before = inventory.len();
            inventory.extend(
                listing
                    .rows()
                    .iter()
                    .filter_map(|row| normalize(kind, row))
                    .filter(|object| !ignore.excludes(object)),
            );
            log::debug!("kept {} {kind} object(s)", inventory.len() - before);
        }

        log::info!("Prepare {kind}: Done.");
    }

    inventory
}

/// Keeps only objects in `databases`; an empty allow-list keeps everything.
pub fn filter_databases(objects: Vec<SecurableObject>, databases: &[String]) -> Vec<SecurableObject> {
    log::info!("Total objects before filtering on database: {}.", objects.len());
    let kept: Vec<SecurableObject> = if databases.is_empty() {
        objects
    } else {
        objects
            .into_iter()
            .filter(|object| databases.iter().any(|db| db == object.database_name()))
            .collect()
    };
    log::info!("Total objects after filtering on database: {}.", kept.len());
    kept
}

fn database_of(row: &CatalogRow) -> Option<&str> {
    row.text_any(&["database_name", "catalog_name"])
}

/// Projects one listing row onto the canonical object shape.
fn normalize(kind: ObjectKind, row: &CatalogRow) -> Option<SecurableObject> {
    let name = row.text("name")?;

    match kind {
        ObjectKind::Database => {
            let standard = row.text("kind").is_none_or(|value| value == STANDARD_DATABASE);
            standard.then(|| SecurableObject::database(name))
        }
        ObjectKind::Schema => Some(SecurableObject::schema(database_of(row)?, name)),
        kind if kind.is_routine() => {
            if row.text("is_builtin").is_some_and(|builtin| builtin != "N") {
                return None;
            }
            Some(SecurableObject::routine(
                kind,
                row.text_any(&["catalog_name", "database_name"])?,
                row.text("schema_name")?,
                name,
                row.text("arguments").unwrap_or_default(),
            ))
        }
        kind => Some(SecurableObject::leaf(
            kind,
            database_of(row)?,
            row.text("schema_name")?,
            name,
        )),
    }
}
