//! Reads current and future grants for every inventoried object.

use std::collections::HashSet;

use common::column::{CatalogRow, ColumnContainer};
use common::grant::{GrantRow, Grantee, GranteeKind};
use common::object::SecurableObject;

use super::signature::extract_signature;
use crate::catalog::{CatalogClient, TabularResult};
use crate::pool::WorkerPool;
use crate::statement::Statement;

/// Fetches grants for all objects through the pool and returns them
/// deduplicated, in first-seen order.
///
/// Ownership rows already held by `owner` are dropped.
pub async fn collect<C>(client: &C, objects: &[SecurableObject], owner: &str, pool: WorkerPool) -> Vec<GrantRow>
where
    C: CatalogClient,
{
    let per_object = pool
        .map_unordered(objects, |object| collect_object(client, object, owner))
        .await;

    let mut seen = HashSet::new();
    let grants: Vec<GrantRow> = per_object
        .into_iter()
        .flatten()
        .filter(|grant| seen.insert(grant.clone()))
        .collect();

    log::info!("Collected {} grant(s) on {} object(s).", grants.len(), objects.len());
    grants
}

/// Grants on a single object; failed lookups count as no grants.
pub async fn collect_object<C>(client: &C, object: &SecurableObject, owner: &str) -> Vec<GrantRow>
where
    C: CatalogClient,
{
    let kind = object.kind();
    let signature = if kind.is_routine() {
        object.arguments().map(extract_signature).unwrap_or_default()
    } else {
        String::new()
    };

    let current = Statement::ShowGrants {
        on: kind,
        key: object.key().to_string(),
        signature: signature.clone(),
    };
    let mut grants: Vec<GrantRow> = query(client, &current)
        .await
        .rows()
        .iter()
        .filter_map(|row| {
            let (privilege, granted_on, grantee) = grant_fields(row)?;
            Some(GrantRow::current(
                object.key(),
                kind,
                signature.as_str(),
                privilege,
                granted_on,
                grantee,
            ))
        })
        .filter(|grant| !grant.is_owned_by(owner))
        .collect();

    if kind.is_container() {
        let future = Statement::ShowFutureGrants {
            container: kind,
            key: object.key().to_string(),
        };
        grants.extend(query(client, &future).await.rows().iter().filter_map(|row| {
            let (privilege, granted_on, grantee) = grant_fields(row)?;
            Some(GrantRow::future(object.key(), kind, privilege, granted_on, grantee))
        }));
    }

    grants
}

async fn query<C>(client: &C, statement: &Statement) -> TabularResult
where
    C: CatalogClient,
{
    let text = statement.to_string();
    match client.run(&text).await {
        Ok(result) => result,
        Err(err) => {
            log::warn!("catalog query '{text}' failed ({}), treating as empty: {err}", err.kind());
            TabularResult::empty()
        }
    }
}

/// Unifies the current-grant and future-grant column spellings.
fn grant_fields(row: &CatalogRow) -> Option<(&str, &str, Grantee)> {
    let privilege = row.text("privilege")?;
    let granted_on = row.text_any(&["granted_on", "grant_on"])?;
    let Ok(grantee_kind) = row.text_any(&["granted_to", "grant_to"])?.parse::<GranteeKind>();
    let grantee_name = row.text("grantee_name")?;
    Some((privilege, granted_on, Grantee::new(grantee_kind, grantee_name)))
}
