//! Observed grants, current and future, in one canonical shape.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::object::ObjectKind;

pub const OWNERSHIP: &str = "OWNERSHIP";

/// Principal kind a privilege is granted to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum GranteeKind {
    Role,
    User,
    Share,
    DatabaseRole,
    Application,
    Other(String),
}

impl FromStr for GranteeKind {
    type Err = Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().replace('_', " ").to_ascii_uppercase();
        Ok(match normalized.as_str() {
            "ROLE" => GranteeKind::Role,
            "USER" => GranteeKind::User,
            "SHARE" => GranteeKind::Share,
            "DATABASE ROLE" => GranteeKind::DatabaseRole,
            "APPLICATION" => GranteeKind::Application,
            _ => GranteeKind::Other(normalized),
        })
    }
}

impl fmt::Display for GranteeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GranteeKind::Role => f.write_str("ROLE"),
            GranteeKind::User => f.write_str("USER"),
            GranteeKind::Share => f.write_str("SHARE"),
            GranteeKind::DatabaseRole => f.write_str("DATABASE ROLE"),
            GranteeKind::Application => f.write_str("APPLICATION"),
            GranteeKind::Other(kind) => f.write_str(kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Grantee {
    kind: GranteeKind,
    name: String,
}

impl Grantee {
    pub fn new(kind: GranteeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn role(name: impl Into<String>) -> Self {
        Self::new(GranteeKind::Role, name)
    }

    pub fn kind(&self) -> &GranteeKind {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Grantee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// One (privilege, grantee) tuple observed on one object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GrantRow {
    object_key: String,
    object_type: ObjectKind,
    arguments: String,
    privilege: String,
    granted_on: String,
    grantee: Grantee,
    is_future: bool,
    is_ownership: bool,
}

impl GrantRow {
    /// A grant that exists now on the object. `arguments` is the normalized
    /// routine signature, empty for everything else.
    pub fn current(
        object_key: impl Into<String>,
        object_type: ObjectKind,
        arguments: impl Into<String>,
        privilege: impl Into<String>,
        granted_on: impl Into<String>,
        grantee: Grantee,
    ) -> Self {
        let privilege = privilege.into();
        let is_ownership = privilege == OWNERSHIP;
        Self {
            object_key: object_key.into(),
            object_type,
            arguments: arguments.into(),
            privilege,
            granted_on: granted_on.into(),
            grantee,
            is_future: false,
            is_ownership,
        }
    }

    /// A future-grant declaration on a container. `granted_on` is the kind
    /// of contained object the declaration applies to. Future grants never
    /// carry ownership.
    pub fn future(
        object_key: impl Into<String>,
        object_type: ObjectKind,
        privilege: impl Into<String>,
        granted_on: impl Into<String>,
        grantee: Grantee,
    ) -> Self {
        Self {
            object_key: object_key.into(),
            object_type,
            arguments: String::new(),
            privilege: privilege.into(),
            granted_on: granted_on.into(),
            grantee,
            is_future: true,
            is_ownership: false,
        }
    }

    pub fn object_key(&self) -> &str {
        &self.object_key
    }

    pub fn object_type(&self) -> ObjectKind {
        self.object_type
    }

    pub fn arguments(&self) -> &str {
        &self.arguments
    }

    pub fn privilege(&self) -> &str {
        &self.privilege
    }

    /// Catalog-reported kind, as reported (`EXTERNAL_TABLE`).
    pub fn granted_on(&self) -> &str {
        &self.granted_on
    }

    /// Kind rendered for SQL (`EXTERNAL TABLE`).
    pub fn granted_on_sql(&self) -> String {
        self.granted_on.replace('_', " ")
    }

    pub fn grantee(&self) -> &Grantee {
        &self.grantee
    }

    pub fn is_future(&self) -> bool {
        self.is_future
    }

    pub fn is_ownership(&self) -> bool {
        self.is_ownership
    }

    /// True when this row already records `owner` as the object's owner.
    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.is_ownership && self.grantee.name == owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_grant_flags_ownership_from_privilege() {
        let select = GrantRow::current("D.S.T", ObjectKind::Table, "", "SELECT", "TABLE", Grantee::role("A"));
        let owner = GrantRow::current("D.S.T", ObjectKind::Table, "", "OWNERSHIP", "TABLE", Grantee::role("B"));

        assert!(!select.is_ownership());
        assert!(owner.is_ownership());
        assert!(owner.is_owned_by("B"));
        assert!(!owner.is_owned_by("C"));
        assert!(!select.is_future());
    }

    #[test]
    fn future_grant_never_carries_ownership() {
        let row = GrantRow::future("D.S", ObjectKind::Schema, "OWNERSHIP", "EXTERNAL_TABLE", Grantee::role("A"));

        assert!(row.is_future());
        assert!(!row.is_ownership());
        assert_eq!(row.granted_on_sql(), "EXTERNAL TABLE");
        assert_eq!(row.arguments(), "");
    }

    #[test]
    fn grantee_kind_parses_catalog_spellings() {
        assert_eq!("ROLE".parse(), Ok(GranteeKind::Role));
        assert_eq!("DATABASE_ROLE".parse(), Ok(GranteeKind::DatabaseRole));
        assert_eq!(
            "INTEGRATION".parse::<GranteeKind>(),
            Ok(GranteeKind::Other("INTEGRATION".into()))
        );
        assert_eq!(Grantee::new(GranteeKind::DatabaseRole, "D.R").to_string(), "DATABASE ROLE D.R");
    }
}
