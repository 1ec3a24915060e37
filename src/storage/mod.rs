//! Batched, idempotent persistence to Neo4j.
//!
//! Nodes are grouped by kind and MERGE-d by `entityId` with a full label
//! reset; relationships are partitioned by type and MERGE-d on
//! `(type, entityId)`, with endpoint MERGEs materializing placeholder targets
//! as stub nodes so the graph stays referentially closed.

pub mod schema;

use neo4rs::{
    BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType,
    ConfigBuilder, Graph, query,
};
use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::error::AnalyzerError;
use crate::model::{Node, NodeKind, RelType, Relationship};

const FAILED_BATCH_LOG_LIMIT: usize = 5;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Default)]
pub struct StoreOverrides {
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl StoreConfig {
    /// Environment defaults, overridden by explicit caller options.
    pub fn resolve(overrides: &StoreOverrides) -> StoreConfig {
        let config = Config::get();
        StoreConfig {
            url: overrides.url.clone().unwrap_or_else(|| config.neo4j_url.clone()),
            user: overrides
                .user
                .clone()
                .unwrap_or_else(|| config.neo4j_user.clone()),
            password: overrides
                .password
                .clone()
                .unwrap_or_else(|| config.neo4j_password.clone()),
            database: overrides
                .database
                .clone()
                .unwrap_or_else(|| config.neo4j_database.clone()),
            batch_size: config.batch_size,
        }
    }
}

pub struct Neo4jStore {
    graph: Graph,
    batch_size: usize,
}

impl Neo4jStore {
    pub async fn connect(config: StoreConfig) -> Result<Neo4jStore, AnalyzerError> {
        let graph_config = ConfigBuilder::default()
            .uri(config.url.clone())
            .user(config.user.clone())
            .password(config.password.clone())
            .db(config.database.clone())
            .build()
            .map_err(AnalyzerError::from)?;
        let graph = Graph::connect(graph_config)
            .await
            .map_err(AnalyzerError::from)?;
        Ok(Neo4jStore {
            graph,
            batch_size: config.batch_size.max(1),
        })
    }

    pub async fn ensure_schema(&self) -> Result<(), AnalyzerError> {
        for statement in schema::constraint_statements()
            .into_iter()
            .chain(schema::index_statements())
        {
            self.run(&statement, Vec::new()).await?;
        }
        Ok(())
    }

    pub async fn reset(&self) -> Result<(), AnalyzerError> {
        tracing::info!("resetting graph store");
        self.run(schema::RESET_STATEMENT, Vec::new()).await
    }

    /// Upsert all nodes, grouped by kind and sharded into fixed-size batches.
    pub async fn write_nodes(&self, nodes: &[Node]) -> Result<usize, AnalyzerError> {
        let mut written = 0;
        for (kind, group) in group_nodes_by_kind(nodes) {
            let statement = node_merge_statement(kind);
            for batch in group.chunks(self.batch_size) {
                let rows: Vec<Value> = batch.iter().map(|n| node_row(n)).collect();
                self.run_batch(&statement, &rows).await?;
                written += batch.len();
            }
        }
        Ok(written)
    }

    /// Upsert all relationships, partitioned by type and batched.
    pub async fn write_relationships(
        &self,
        relationships: &[Relationship],
    ) -> Result<usize, AnalyzerError> {
        let mut written = 0;
        for (rel_type, group) in group_relationships_by_type(relationships) {
            let statement = relationship_merge_statement(rel_type);
            for batch in group.chunks(self.batch_size) {
                let rows: Vec<Value> = batch.iter().map(|r| relationship_row(r)).collect();
                self.run_batch(&statement, &rows).await?;
                written += batch.len();
            }
        }
        Ok(written)
    }

    async fn run_batch(&self, statement: &str, rows: &[Value]) -> Result<(), AnalyzerError> {
        let params = vec![("rows".to_string(), json_to_bolt(&Value::Array(rows.to_vec())))];
        match self.run(statement, params).await {
            Ok(()) => Ok(()),
            Err(err) => {
                for row in rows.iter().take(FAILED_BATCH_LOG_LIMIT) {
                    tracing::error!(record = %row, "failed batch record");
                }
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        statement: &str,
        params: Vec<(String, BoltType)>,
    ) -> Result<(), AnalyzerError> {
        let mut q = query(statement);
        for (key, value) in params {
            q = q.param(&key, value);
        }
        let mut result = self.graph.execute(q).await?;
        while let Some(_row) = result.next().await? {}
        Ok(())
    }
}

pub fn group_nodes_by_kind(nodes: &[Node]) -> Vec<(NodeKind, Vec<&Node>)> {
    let mut groups: Vec<(NodeKind, Vec<&Node>)> = Vec::new();
    for node in nodes {
        match groups.iter_mut().find(|(kind, _)| *kind == node.kind) {
            Some((_, group)) => group.push(node),
            None => groups.push((node.kind, vec![node])),
        }
    }
    groups
}

pub fn group_relationships_by_type(
    relationships: &[Relationship],
) -> Vec<(RelType, Vec<&Relationship>)> {
    let mut groups: Vec<(RelType, Vec<&Relationship>)> = Vec::new();
    for rel in relationships {
        match groups.iter_mut().find(|(t, _)| *t == rel.rel_type) {
            Some((_, group)) => group.push(rel),
            None => groups.push((rel.rel_type, vec![rel])),
        }
    }
    groups
}

/// MERGE by entityId, replace properties, reset the label set to the node's
/// current kind.
pub fn node_merge_statement(kind: NodeKind) -> String {
    format!(
        "UNWIND $rows AS row \
         MERGE (n {{entityId: row.entityId}}) \
         SET n = row.props \
         {} \
         SET n:`{}`",
        schema::remove_all_labels_clause(),
        kind.label()
    )
}

pub fn relationship_merge_statement(rel_type: RelType) -> String {
    format!(
        "UNWIND $rows AS row \
         MERGE (s {{entityId: row.sourceId}}) \
         MERGE (t {{entityId: row.targetId}}) \
         MERGE (s)-[r:`{}` {{entityId: row.entityId}}]->(t) \
         SET r = row.props",
        rel_type.label()
    )
}

/// Neo4j properties hold scalars and scalar lists only; structured values are
/// stored as JSON strings.
fn flatten_property(value: &Value) -> Value {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
        Value::Array(items) => {
            if items
                .iter()
                .all(|item| matches!(item, Value::Bool(_) | Value::Number(_) | Value::String(_)))
            {
                value.clone()
            } else {
                Value::String(value.to_string())
            }
        }
        Value::Object(_) => Value::String(value.to_string()),
    }
}

fn node_row(node: &Node) -> Value {
    let mut props = Map::new();
    props.insert("entityId".into(), json!(node.entity_id));
    props.insert("instanceId".into(), json!(node.instance_id));
    props.insert("kind".into(), json!(node.kind.label()));
    props.insert("name".into(), json!(node.name));
    props.insert("filePath".into(), json!(node.file_path));
    props.insert("language".into(), json!(node.language.as_str()));
    props.insert("startLine".into(), json!(node.start_line));
    props.insert("endLine".into(), json!(node.end_line));
    props.insert("startColumn".into(), json!(node.start_column));
    props.insert("endColumn".into(), json!(node.end_column));
    props.insert("createdAt".into(), json!(node.created_at));
    if let Some(parent_id) = &node.parent_id {
        props.insert("parentId".into(), json!(parent_id));
    }
    for (key, value) in &node.properties {
        props.insert(key.clone(), flatten_property(value));
    }
    json!({ "entityId": node.entity_id, "props": props })
}

fn relationship_row(rel: &Relationship) -> Value {
    let mut props = Map::new();
    props.insert("entityId".into(), json!(rel.entity_id));
    props.insert("weight".into(), json!(rel.weight));
    props.insert("createdAt".into(), json!(rel.created_at));
    for (key, value) in &rel.properties {
        props.insert(key.clone(), flatten_property(value));
    }
    json!({
        "entityId": rel.entity_id,
        "sourceId": rel.source_id,
        "targetId": rel.target_id,
        "props": props,
    })
}

fn json_to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                BoltType::Integer(BoltInteger::new(i))
            } else {
                BoltType::Float(BoltFloat::new(n.as_f64().unwrap_or(0.0)))
            }
        }
        Value::String(s) => BoltType::String(BoltString::from(s.clone())),
        Value::Array(items) => {
            let list = items.iter().map(json_to_bolt).collect::<Vec<_>>();
            BoltType::List(BoltList::from(list))
        }
        Value::Object(map) => {
            let entries: BoltMap = map
                .iter()
                .map(|(k, v)| (BoltString::from(k.clone()), json_to_bolt(v)))
                .collect();
            BoltType::Map(entries)
        }
    }
}
