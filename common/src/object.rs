//! Securable objects and their qualified identity keys.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown object kind '{0}'")]
pub struct UnknownObjectKind(pub String);

/// Kinds of catalog objects that can hold grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ObjectKind {
    Database,
    Schema,
    Table,
    View,
    Sequence,
    Stage,
    FileFormat,
    ExternalTable,
    ExternalFunction,
    Procedure,
    Function,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 11] = [
        ObjectKind::Database,
        ObjectKind::Schema,
        ObjectKind::Table,
        ObjectKind::View,
        ObjectKind::Sequence,
        ObjectKind::Stage,
        ObjectKind::FileFormat,
        ObjectKind::ExternalTable,
        ObjectKind::ExternalFunction,
        ObjectKind::Procedure,
        ObjectKind::Function,
    ];

    /// SQL keyword for the kind, with spaces between words.
    pub fn keyword(self) -> &'static str {
        match self {
            ObjectKind::Database => "DATABASE",
            ObjectKind::Schema => "SCHEMA",
            ObjectKind::Table => "TABLE",
            ObjectKind::View => "VIEW",
            ObjectKind::Sequence => "SEQUENCE",
            ObjectKind::Stage => "STAGE",
            ObjectKind::FileFormat => "FILE FORMAT",
            ObjectKind::ExternalTable => "EXTERNAL TABLE",
            ObjectKind::ExternalFunction => "EXTERNAL FUNCTION",
            ObjectKind::Procedure => "PROCEDURE",
            ObjectKind::Function => "FUNCTION",
        }
    }

    /// Plural keyword as used by `SHOW ...S` and `ON FUTURE ...S`.
    pub fn plural(self) -> String {
        format!("{}S", self.keyword())
    }

    /// Databases and schemas hold future grants and contain other objects.
    pub fn is_container(self) -> bool {
        matches!(self, ObjectKind::Database | ObjectKind::Schema)
    }

    /// Routines are overloadable and are identified by their argument signature.
    pub fn is_routine(self) -> bool {
        matches!(
            self,
            ObjectKind::Procedure | ObjectKind::Function | ObjectKind::ExternalFunction
        )
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for ObjectKind {
    type Err = UnknownObjectKind;

    /// Accepts `FILE FORMAT`, `file_format` and other spacing/case variants.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw
            .replace('_', " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        ObjectKind::ALL
            .into_iter()
            .find(|kind| kind.keyword() == normalized)
            .ok_or_else(|| UnknownObjectKind(raw.to_string()))
    }
}

impl TryFrom<String> for ObjectKind {
    type Error = UnknownObjectKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ObjectKind> for String {
    fn from(kind: ObjectKind) -> Self {
        kind.keyword().to_string()
    }
}

/// Quotes an identifier unless it is a plain upper-case identifier.
///
/// Embedded double quotes are doubled.
pub fn quote_identifier(ident: &str) -> Cow<'_, str> {
    let mut chars = ident.chars();
    let plain = match chars.next() {
        Some(first) => {
            (first.is_ascii_uppercase() || first == '_')
                && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '$')
        }
        None => false,
    };

    if plain {
        Cow::Borrowed(ident)
    } else {
        Cow::Owned(format!("\"{}\"", ident.replace('"', "\"\"")))
    }
}

/// Joins the non-null components of an object path with `.`.
pub fn build_key<'a, I>(components: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    components
        .into_iter()
        .flatten()
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".")
}

/// One catalog object in scope for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurableObject {
    database: String,
    schema: Option<String>,
    name: Option<String>,
    kind: ObjectKind,
    arguments: Option<String>,
    key: String,
}

impl SecurableObject {
    pub fn database(name: impl Into<String>) -> Self {
        Self::build(ObjectKind::Database, name.into(), None, None, None)
    }

    pub fn schema(database: impl Into<String>, schema: impl Into<String>) -> Self {
        Self::build(ObjectKind::Schema, database.into(), Some(schema.into()), None, None)
    }

    pub fn leaf(
        kind: ObjectKind,
        database: impl Into<String>,
        schema: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::build(kind, database.into(), Some(schema.into()), Some(name.into()), None)
    }

    /// A procedure or function; `arguments` is the raw signature text reported by the catalog.
    pub fn routine(
        kind: ObjectKind,
        database: impl Into<String>,
        schema: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::build(
            kind,
            database.into(),
            Some(schema.into()),
            Some(name.into()),
            Some(arguments.into()),
        )
    }

    fn build(
        kind: ObjectKind,
        database: String,
        schema: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    ) -> Self {
        let key = build_key([Some(database.as_str()), schema.as_deref(), name.as_deref()]);
        Self {
            database,
            schema,
            name,
            kind,
            arguments,
            key,
        }
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn arguments(&self) -> Option<&str> {
        self.arguments.as_deref()
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}
