use common::object::{ObjectKind, SecurableObject};

use crate::statement::Statement;

/// Kinds that never receive schema-wide ALL PRIVILEGES grants.
fn schema_wide(kind: ObjectKind) -> bool {
    !matches!(
        kind,
        ObjectKind::Database | ObjectKind::Schema | ObjectKind::ExternalTable | ObjectKind::ExternalFunction
    )
}

/// Baseline grants that give `owner` access to every database and schema
/// in scope, for existing and future objects of the configured kinds.
pub fn plan_new_grants(inventory: &[SecurableObject], kinds: &[ObjectKind], owner: &str) -> Vec<Statement> {
    let mut statements = Vec::new();

    for object in inventory {
        match object.kind() {
            ObjectKind::Database => statements.push(Statement::GrantUsage {
                container: ObjectKind::Database,
                key: object.key().to_string(),
                role: owner.to_string(),
            }),
            ObjectKind::Schema => {
                statements.push(Statement::GrantUsage {
                    container: ObjectKind::Schema,
                    key: object.key().to_string(),
                    role: owner.to_string(),
                });
                for &kind in kinds.iter().filter(|kind| schema_wide(**kind)) {
                    statements.push(Statement::GrantAllOnFuture {
                        kind,
                        schema: object.key().to_string(),
                        role: owner.to_string(),
                    });
                    statements.push(Statement::GrantAllOnAll {
                        kind,
                        schema: object.key().to_string(),
                        role: owner.to_string(),
                    });
                }
            }
            _ => {}
        }
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_grants_cover_configured_kinds() {
        let inventory = vec![
            SecurableObject::database("D"),
            SecurableObject::schema("D", "S"),
            SecurableObject::leaf(ObjectKind::Table, "D", "S", "T"),
        ];
        let kinds = [
            ObjectKind::Database,
            ObjectKind::Schema,
            ObjectKind::Table,
            ObjectKind::ExternalTable,
            ObjectKind::Procedure,
        ];

        let rendered: Vec<String> = plan_new_grants(&inventory, &kinds, "C")
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(
            rendered,
            vec![
                "GRANT USAGE ON DATABASE D TO ROLE C",
                "GRANT USAGE ON SCHEMA D.S TO ROLE C",
                "GRANT ALL PRIVILEGES ON FUTURE TABLES IN SCHEMA D.S TO ROLE C",
                "GRANT ALL PRIVILEGES ON ALL TABLES IN SCHEMA D.S TO ROLE C",
                "GRANT ALL PRIVILEGES ON FUTURE PROCEDURES IN SCHEMA D.S TO ROLE C",
                "GRANT ALL PRIVILEGES ON ALL PROCEDURES IN SCHEMA D.S TO ROLE C",
            ]
        );
    }

    #[test]
    fn leaf_only_inventory_needs_nothing() {
        let inventory = vec![SecurableObject::leaf(ObjectKind::View, "D", "S", "V")];
        assert!(plan_new_grants(&inventory, &[ObjectKind::View], "C").is_empty());
    }
}
