//! Turns observed grants into revoke and ownership-transfer statements.

use common::grant::{GrantRow, Grantee};

use crate::statement::Statement;

/// Kinds whose ownership is never reassigned.
const CONTAINER_KINDS: [&str; 2] = ["DATABASE", "SCHEMA"];

/// Statements that converge grants onto the target owner.
///
/// Every revoke is applied before any ownership transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub revoke_statements: Vec<Statement>,
    pub ownership_statements: Vec<Statement>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.revoke_statements.is_empty() && self.ownership_statements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.revoke_statements.len() + self.ownership_statements.len()
    }
}

pub fn plan(grants: &[GrantRow], owner: &str) -> ReconciliationPlan {
    let (ownerships, others): (Vec<&GrantRow>, Vec<&GrantRow>) =
        grants.iter().partition(|grant| grant.is_ownership());

    let revoke_statements = others.into_iter().map(revoke).collect();
    let ownership_statements = ownerships
        .into_iter()
        .filter_map(|grant| transfer_ownership(grant, owner))
        .collect();

    ReconciliationPlan {
        revoke_statements,
        ownership_statements,
    }
}

fn revoke(grant: &GrantRow) -> Statement {
    if grant.is_future() {
        Statement::RevokeFuture {
            on: grant.granted_on_sql(),
            container: grant.object_type(),
            key: grant.object_key().to_string(),
            grantee: grant.grantee().clone(),
        }
    } else {
        Statement::Revoke {
            on: grant.granted_on_sql(),
            key: grant.object_key().to_string(),
            signature: grant.arguments().to_string(),
            grantee: grant.grantee().clone(),
        }
    }
}

fn transfer_ownership(grant: &GrantRow, owner: &str) -> Option<Statement> {
    let on = grant.granted_on_sql();
    if CONTAINER_KINDS.contains(&on.as_str()) {
        return None;
    }

    Some(Statement::GrantOwnership {
        on,
        key: grant.object_key().to_string(),
        signature: grant.arguments().to_string(),
        grantee: Grantee::new(grant.grantee().kind().clone(), owner),
        previous: Some(grant.grantee().name().to_string()),
    })
}
