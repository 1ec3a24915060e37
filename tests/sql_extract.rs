use cartograph::analyzer::{run_extraction, AnalyzeOptions};
use cartograph::model::{NodeKind, RelType};

fn write(dir: &std::path::Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

#[test]
fn schema_and_references_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "schema.sql",
        r#"CREATE TABLE orders (
    id INTEGER PRIMARY KEY,
    total NUMERIC
);

CREATE VIEW big_orders AS SELECT id FROM orders WHERE total > 100;
"#,
    );
    write(
        dir.path(),
        "queries.sql",
        "SELECT id FROM orders;\nSELECT * FROM big_orders;\nINSERT INTO orders (id) VALUES (1);\n",
    );

    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();

    let table = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::SqlTable)
        .expect("orders table");
    let view = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::SqlView)
        .expect("big_orders view");

    assert_eq!(
        result
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::SqlColumn)
            .count(),
        2
    );

    // The view's stored query references the table.
    assert!(result.relationships.iter().any(|r| {
        r.rel_type == RelType::ReferencesTable
            && r.source_id == view.entity_id
            && r.target_id == table.entity_id
    }));

    // DML statements reference tables and views by name.
    let table_refs = result
        .relationships
        .iter()
        .filter(|r| r.rel_type == RelType::ReferencesTable && r.target_id == table.entity_id)
        .count();
    assert!(table_refs >= 2, "view + select + insert, got {table_refs}");
    assert!(result
        .relationships
        .iter()
        .any(|r| r.rel_type == RelType::ReferencesView && r.target_id == view.entity_id));

    // Referencing a table that is not in the index links nothing.
    assert!(!result
        .relationships
        .iter()
        .any(|r| matches!(r.rel_type, RelType::ReferencesTable | RelType::ReferencesView)
            && r.is_placeholder()));
}
