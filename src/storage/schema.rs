//! Schema provisioning statements: a uniqueness constraint on `entityId` and
//! `(filePath, name)` indexes for every label in the closed vocabulary.

use crate::model::NODE_KINDS;

pub fn constraint_statements() -> Vec<String> {
    NODE_KINDS
        .iter()
        .map(|kind| {
            let label = kind.label();
            format!(
                "CREATE CONSTRAINT cartograph_{}_entity_id IF NOT EXISTS \
                 FOR (n:`{}`) REQUIRE n.entityId IS UNIQUE",
                label.to_ascii_lowercase(),
                label
            )
        })
        .collect()
}

pub fn index_statements() -> Vec<String> {
    let mut statements = Vec::new();
    for kind in NODE_KINDS {
        let label = kind.label();
        let lower = label.to_ascii_lowercase();
        statements.push(format!(
            "CREATE INDEX cartograph_{lower}_file_path IF NOT EXISTS \
             FOR (n:`{label}`) ON (n.filePath)"
        ));
        statements.push(format!(
            "CREATE INDEX cartograph_{lower}_name IF NOT EXISTS \
             FOR (n:`{label}`) ON (n.name)"
        ));
    }
    statements
}

pub const RESET_STATEMENT: &str = "MATCH (n) DETACH DELETE n";

/// `REMOVE n:A:B:…` over the whole closed vocabulary, so a node whose kind
/// changed between runs ends up with exactly one label.
pub fn remove_all_labels_clause() -> String {
    let labels: Vec<String> = NODE_KINDS
        .iter()
        .map(|kind| format!("`{}`", kind.label()))
        .collect();
    format!("REMOVE n:{}", labels.join(":"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NODE_KINDS;

    #[test]
    fn one_constraint_per_label() {
        let constraints = constraint_statements();
        assert_eq!(constraints.len(), NODE_KINDS.len());
        assert!(constraints[0].contains("IF NOT EXISTS"));
        assert!(constraints.iter().any(|c| c.contains("(n:`SQLTable`)")));
    }

    #[test]
    fn two_indexes_per_label() {
        let indexes = index_statements();
        assert_eq!(indexes.len(), NODE_KINDS.len() * 2);
        assert!(indexes.iter().any(|i| i.contains("n.filePath")));
        assert!(indexes.iter().any(|i| i.contains("n.name")));
    }

    #[test]
    fn label_reset_covers_vocabulary() {
        let clause = remove_all_labels_clause();
        assert!(clause.starts_with("REMOVE n:"));
        for kind in NODE_KINDS {
            assert!(clause.contains(kind.label()), "missing {}", kind.label());
        }
    }
}
