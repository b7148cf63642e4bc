//! Typed forms of every statement the engine issues.
//!
//! `Display` renders the exact SQL text sent to the warehouse and written
//! to artifacts.

use std::fmt;

use common::grant::Grantee;
use common::object::ObjectKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    ShowObjects {
        kind: ObjectKind,
    },
    ShowGrants {
        on: ObjectKind,
        key: String,
        signature: String,
    },
    ShowFutureGrants {
        container: ObjectKind,
        key: String,
    },
    /// `on` is the catalog-reported kind with underscores rendered as spaces.
    Revoke {
        on: String,
        key: String,
        signature: String,
        grantee: Grantee,
    },
    RevokeFuture {
        on: String,
        container: ObjectKind,
        key: String,
        grantee: Grantee,
    },
    GrantOwnership {
        on: String,
        key: String,
        signature: String,
        grantee: Grantee,
        previous: Option<String>,
    },
    GrantUsage {
        container: ObjectKind,
        key: String,
        role: String,
    },
    GrantAllOnFuture {
        kind: ObjectKind,
        schema: String,
        role: String,
    },
    GrantAllOnAll {
        kind: ObjectKind,
        schema: String,
        role: String,
    },
    SelectCurrentRole,
}

impl Statement {
    /// Statements that change grants, as opposed to catalog reads.
    pub fn is_ddl(&self) -> bool {
        !matches!(
            self,
            Statement::ShowObjects { .. }
                | Statement::ShowGrants { .. }
                | Statement::ShowFutureGrants { .. }
                | Statement::SelectCurrentRole
        )
    }

    /// Trailing comment recording the owner an ownership transfer replaces.
    pub fn audit_note(&self) -> Option<String> {
        match self {
            Statement::GrantOwnership {
                previous: Some(previous),
                ..
            } => Some(format!("-- instead of {previous}")),
            _ => None,
        }
    }

    /// The statement text without its audit note.
    pub fn sql(&self) -> Sql<'_> {
        Sql(self)
    }
}

/// Display adapter that renders only the executable part of a statement.
#[derive(Debug, Clone, Copy)]
pub struct Sql<'a>(&'a Statement);

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql())?;
        if let Some(note) = self.audit_note() {
            write!(f, " {note}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Sql<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Statement::ShowObjects { kind } => write!(f, "SHOW {} IN ACCOUNT", kind.plural()),
            Statement::ShowGrants { on, key, signature } => {
                write!(f, "SHOW GRANTS ON {on} {key}{signature}")
            }
            Statement::ShowFutureGrants { container, key } => {
                write!(f, "SHOW FUTURE GRANTS IN {container} {key}")
            }
            Statement::Revoke {
                on,
                key,
                signature,
                grantee,
            } => write!(f, "REVOKE ALL PRIVILEGES ON {on} {key}{signature} FROM {grantee}"),
            Statement::RevokeFuture {
                on,
                container,
                key,
                grantee,
            } => write!(
                f,
                "REVOKE ALL PRIVILEGES ON FUTURE {on}S IN {container} {key} FROM {grantee}"
            ),
            Statement::GrantOwnership {
                on,
                key,
                signature,
                grantee,
                ..
            } => write!(f, "GRANT OWNERSHIP ON {on} {key}{signature} TO {grantee}"),
            Statement::GrantUsage {
                container,
                key,
                role,
            } => write!(f, "GRANT USAGE ON {container} {key} TO ROLE {role}"),
            Statement::GrantAllOnFuture { kind, schema, role } => write!(
                f,
                "GRANT ALL PRIVILEGES ON FUTURE {} IN SCHEMA {schema} TO ROLE {role}",
                kind.plural()
            ),
            Statement::GrantAllOnAll { kind, schema, role } => write!(
                f,
                "GRANT ALL PRIVILEGES ON ALL {} IN SCHEMA {schema} TO ROLE {role}",
                kind.plural()
            ),
            Statement::SelectCurrentRole => f.write_str("SELECT CURRENT_ROLE()"),
        }
    }
}
