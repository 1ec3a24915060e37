use std::collections::HashMap;

use crate::model::{Node, NodeKind, Relationship, SingleFileParseResult};

#[derive(Debug, Default)]
pub struct MergeStats {
    pub intra_file_node_duplicates: usize,
    pub cross_file_node_duplicates: usize,
    pub relationship_duplicates: usize,
}

/// Collapse per-file results into one node set and one edge set, keyed by
/// entity id. Last write wins; intra-file duplicates are routine (re-emitted
/// shared nodes such as Tailwind classes), cross-file duplicates almost
/// always mean an id-generation bug and are logged loudly.
pub fn merge_results(
    results: Vec<SingleFileParseResult>,
) -> (Vec<Node>, Vec<Relationship>, MergeStats) {
    let mut stats = MergeStats::default();
    let mut nodes: Vec<Node> = Vec::new();
    let mut node_slots: HashMap<String, usize> = HashMap::new();
    let mut relationships: Vec<Relationship> = Vec::new();
    let mut rel_slots: HashMap<String, usize> = HashMap::new();

    for result in results {
        for node in result.nodes {
            match node_slots.get(&node.entity_id) {
                Some(&slot) => {
                    let previous = &nodes[slot];
                    if previous.file_path == node.file_path {
                        stats.intra_file_node_duplicates += 1;
                        tracing::debug!(
                            entity_id = %node.entity_id,
                            file = %node.file_path,
                            "duplicate node within file, keeping latest"
                        );
                    } else {
                        stats.cross_file_node_duplicates += 1;
                        tracing::warn!(
                            entity_id = %node.entity_id,
                            first = %previous.file_path,
                            second = %node.file_path,
                            "duplicate node across files, keeping latest"
                        );
                    }
                    nodes[slot] = node;
                }
                None => {
                    node_slots.insert(node.entity_id.clone(), nodes.len());
                    nodes.push(node);
                }
            }
        }
        for rel in result.relationships {
            match rel_slots.get(&rel.entity_id) {
                Some(&slot) => {
                    stats.relationship_duplicates += 1;
                    relationships[slot] = rel;
                }
                None => {
                    rel_slots.insert(rel.entity_id.clone(), relationships.len());
                    relationships.push(rel);
                }
            }
        }
    }

    (nodes, relationships, stats)
}

/// Fold additional Pass-2 relationships into the deduplicated edge set.
pub fn merge_relationships(existing: &mut Vec<Relationship>, extra: Vec<Relationship>) {
    let mut slots: HashMap<String, usize> = existing
        .iter()
        .enumerate()
        .map(|(idx, rel)| (rel.entity_id.clone(), idx))
        .collect();
    for rel in extra {
        match slots.get(&rel.entity_id) {
            Some(&slot) => existing[slot] = rel,
            None => {
                slots.insert(rel.entity_id.clone(), existing.len());
                existing.push(rel);
            }
        }
    }
}

/// Read-only lookup over the merged node set, shared by all Pass-2 resolvers.
pub struct NodeIndex<'a> {
    nodes: &'a [Node],
    by_id: HashMap<&'a str, usize>,
    by_kind_name: HashMap<(NodeKind, &'a str), Vec<usize>>,
    by_file: HashMap<&'a str, Vec<usize>>,
    file_nodes: HashMap<&'a str, usize>,
}

impl<'a> NodeIndex<'a> {
    pub fn build(nodes: &'a [Node]) -> NodeIndex<'a> {
        let mut by_id = HashMap::with_capacity(nodes.len());
        let mut by_kind_name: HashMap<(NodeKind, &'a str), Vec<usize>> = HashMap::new();
        let mut by_file: HashMap<&'a str, Vec<usize>> = HashMap::new();
        let mut file_nodes = HashMap::new();
        for (idx, node) in nodes.iter().enumerate() {
            by_id.insert(node.entity_id.as_str(), idx);
            by_kind_name
                .entry((node.kind, node.name.as_str()))
                .or_default()
                .push(idx);
            by_file.entry(node.file_path.as_str()).or_default().push(idx);
            if node.kind == NodeKind::File {
                file_nodes.insert(node.file_path.as_str(), idx);
            }
        }
        NodeIndex {
            nodes,
            by_id,
            by_kind_name,
            by_file,
            file_nodes,
        }
    }

    pub fn get(&self, entity_id: &str) -> Option<&'a Node> {
        self.by_id.get(entity_id).map(|&idx| &self.nodes[idx])
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.by_id.contains_key(entity_id)
    }

    pub fn file_node(&self, file_path: &str) -> Option<&'a Node> {
        self.file_nodes.get(file_path).map(|&idx| &self.nodes[idx])
    }

    /// First file node whose path ends with `suffix` (C/C++ include matching).
    pub fn file_node_by_suffix(&self, suffix: &str) -> Option<&'a Node> {
        let needle = format!("/{}", suffix.trim_start_matches('/'));
        let mut paths: Vec<&&str> = self.file_nodes.keys().collect();
        paths.sort();
        paths
            .into_iter()
            .find(|path| path.ends_with(&needle))
            .and_then(|path| self.file_node(path))
    }

    pub fn nodes_in_file<'s>(
        &'s self,
        file_path: &str,
    ) -> impl Iterator<Item = &'a Node> + 's {
        let nodes = self.nodes;
        self.by_file
            .get(file_path)
            .map(|slots| slots.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&idx| &nodes[idx])
    }

    pub fn find_by_kind_name(&self, kind: NodeKind, name: &str) -> Vec<&'a Node> {
        self.by_kind_name
            .get(&(kind, name))
            .map(|slots| slots.iter().map(|&idx| &self.nodes[idx]).collect())
            .unwrap_or_default()
    }

    pub fn all_files(&self) -> impl Iterator<Item = &'a Node> + '_ {
        self.file_nodes.values().map(move |&idx| &self.nodes[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Language, RelType, Span};

    fn file_result(path: &str, extra: Option<Node>) -> SingleFileParseResult {
        let mut result = SingleFileParseResult::new(path);
        let file = Node::new(NodeKind::File, "f", path, path, Language::TypeScript, Span::line(1));
        let file_id = file.entity_id.clone();
        result.nodes.push(file);
        if let Some(node) = extra {
            let rel = Relationship::new(RelType::Contains, &file_id, &node.entity_id);
            result.nodes.push(node);
            result.relationships.push(rel);
        }
        result
    }

    #[test]
    fn merge_deduplicates_by_entity_id() {
        let a = file_result("/src/a.ts", None);
        let a_again = file_result("/src/a.ts", None);
        let (nodes, rels, stats) = merge_results(vec![a, a_again]);
        assert_eq!(nodes.len(), 1);
        assert!(rels.is_empty());
        assert_eq!(stats.intra_file_node_duplicates, 1);
        assert_eq!(stats.cross_file_node_duplicates, 0);
    }

    #[test]
    fn merged_set_has_unique_ids() {
        let decl = Node::new(
            NodeKind::Function,
            "run",
            "/src/a.ts:run:3",
            "/src/a.ts",
            Language::TypeScript,
            Span::line(3),
        );
        let (nodes, _, _) = merge_results(vec![
            file_result("/src/a.ts", Some(decl)),
            file_result("/src/b.ts", None),
        ]);
        let mut ids: Vec<&String> = nodes.iter().map(|n| &n.entity_id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), nodes.len());
    }

    #[test]
    fn index_lookups() {
        let decl = Node::new(
            NodeKind::Function,
            "run",
            "/src/a.ts:run:3",
            "/src/a.ts",
            Language::TypeScript,
            Span::line(3),
        );
        let decl_id = decl.entity_id.clone();
        let (nodes, _, _) = merge_results(vec![file_result("/src/a.ts", Some(decl))]);
        let index = NodeIndex::build(&nodes);
        assert!(index.contains(&decl_id));
        assert!(index.file_node("/src/a.ts").is_some());
        assert_eq!(index.find_by_kind_name(NodeKind::Function, "run").len(), 1);
        assert!(index.file_node_by_suffix("a.ts").is_some());
        assert_eq!(index.nodes_in_file("/src/a.ts").count(), 2);
    }
}
