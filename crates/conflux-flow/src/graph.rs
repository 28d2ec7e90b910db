//! Graph construction from a wire-format `{nodes, edges}` config, per
//!  "Graph construction". Builds ordered adjacency lists and
//! picks a start node with the documented fallback chain.

use conflux_types::model::{EdgeCfg, FlowConfig, NodeCfg};
use std::collections::HashMap;

pub const START_CATEGORY: &str = "start";
pub const END_CATEGORY: &str = "end";
pub const ROUTER_CATEGORY: &str = "router";
pub const START_IMPLEMENTATION: &str = "start";
pub const END_IMPLEMENTATION: &str = "end";

#[derive(Debug, Clone)]
pub struct Graph {
    pub nodes: HashMap<String, NodeCfg>,
    /// Insertion order of node IDs, used as the final start-node fallback.
    pub order: Vec<String>,
    /// Ordered adjacency: node_id -> list of downstream node_ids, indexed
    /// by `sourceIndex` when present.
    pub adjacency: HashMap<String, Vec<String>>,
    pub start_node_id: String,
}

fn is_start(node: &NodeCfg) -> bool {
    node.category.as_deref().map(|c| c.eq_ignore_ascii_case(START_CATEGORY)).unwrap_or(false)
        || node.implementation.as_deref().map(|i| i.eq_ignore_ascii_case(START_IMPLEMENTATION)).unwrap_or(false)
        || node.data.is_start_node.unwrap_or(false)
}

fn is_end(node: &NodeCfg) -> bool {
    node.category.as_deref().map(|c| c.eq_ignore_ascii_case(END_CATEGORY)).unwrap_or(false)
        || node.implementation.as_deref().map(|i| i.eq_ignore_ascii_case(END_IMPLEMENTATION)).unwrap_or(false)
        || node.data.is_end_node.unwrap_or(false)
}

fn synthetic_node(id: &str, category: &str, implementation: &str) -> NodeCfg {
    NodeCfg {
        id: id.to_string(),
        category: Some(category.to_string()),
        implementation: Some(implementation.to_string()),
        data: conflux_types::model::NodeData {
            label: Some(category.to_string()),
            node_type: None,
            config: serde_json::Value::Object(Default::default()),
            is_start_node: Some(category == START_CATEGORY),
            is_end_node: Some(category == END_CATEGORY),
        },
        position: None,
        connections: Vec::new(),
    }
}

impl Graph {
    pub fn build_from_config(mut config: FlowConfig, explicit_start: Option<&str>) -> Self {
        if !config.nodes.iter().any(is_start) {
            let synthetic = synthetic_node("__start__", START_CATEGORY, START_IMPLEMENTATION);
            config.nodes.insert(0, synthetic);
        }
        if !config.nodes.iter().any(is_end) {
            config.nodes.push(synthetic_node("__end__", END_CATEGORY, END_IMPLEMENTATION));
        }

        let order: Vec<String> = config.nodes.iter().map(|n| n.id.clone()).collect();
        let nodes: HashMap<String, NodeCfg> = config.nodes.into_iter().map(|n| (n.id.clone(), n)).collect();

        let adjacency = if config.edges.is_empty() {
            Self::adjacency_from_connections(&nodes)
        } else {
            Self::adjacency_from_edges(&config.edges)
        };

        let in_degree = Self::in_degree(&nodes, &adjacency);

        let start_node_id = explicit_start
            .map(str::to_string)
            .or_else(|| nodes.values().find(|n| is_start(n)).map(|n| n.id.clone()))
            .or_else(|| {
                order
                    .iter()
                    .find(|id| in_degree.get(*id).copied().unwrap_or(0) == 0)
                    .cloned()
            })
            .or_else(|| order.first().cloned())
            .expect("a flow config always has at least the synthetic start node");

        Self { nodes, order, adjacency, start_node_id }
    }

    fn adjacency_from_connections(nodes: &HashMap<String, NodeCfg>) -> HashMap<String, Vec<String>> {
        nodes
            .values()
            .map(|n| (n.id.clone(), n.connections.clone()))
            .collect()
    }

    fn adjacency_from_edges(edges: &[EdgeCfg]) -> HashMap<String, Vec<String>> {
        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        for edge in edges {
            let slot = adjacency.entry(edge.source.clone()).or_default();
            match edge.source_index {
                Some(index) => {
                    if slot.len() <= index {
                        slot.resize(index + 1, String::new());
                    }
                    slot[index] = edge.target.clone();
                }
                None => slot.push(edge.target.clone()),
            }
        }
        for targets in adjacency.values_mut() {
            targets.retain(|t| !t.is_empty());
        }
        adjacency
    }

    fn in_degree(nodes: &HashMap<String, NodeCfg>, adjacency: &HashMap<String, Vec<String>>) -> HashMap<String, usize> {
        let mut in_degree: HashMap<String, usize> = nodes.keys().map(|id| (id.clone(), 0)).collect();
        for targets in adjacency.values() {
            for target in targets {
                *in_degree.entry(target.clone()).or_insert(0) += 1;
            }
        }
        in_degree
    }

    pub fn node(&self, id: &str) -> Option<&NodeCfg> {
        self.nodes.get(id)
    }

    pub fn connections(&self, id: &str) -> &[String] {
        self.adjacency.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn is_end(&self, id: &str) -> bool {
        self.nodes.get(id).map(is_end).unwrap_or(false)
    }

    pub fn is_router(&self, id: &str) -> bool {
        self.nodes
            .get(id)
            .and_then(|n| n.category.as_deref())
            .map(|c| c.eq_ignore_ascii_case(ROUTER_CATEGORY))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, category: &str, connections: Vec<&str>) -> NodeCfg {
        NodeCfg {
            id: id.to_string(),
            category: Some(category.to_string()),
            implementation: Some(category.to_string()),
            data: conflux_types::model::NodeData {
                label: None,
                node_type: None,
                config: serde_json::json!({}),
                is_start_node: None,
                is_end_node: None,
            },
            position: None,
            connections: connections.into_iter().map(str::to_string).collect(),
        }
    }

    #[test]
    fn synthesizes_start_and_end_when_absent() {
        let config = FlowConfig {
            nodes: vec![node("mid", "llm", vec![])],
            edges: vec![],
        };
        let graph = Graph::build_from_config(config, None);
        assert!(graph.node("__start__").is_some());
        assert!(graph.node("__end__").is_some());
    }

    #[test]
    fn picks_explicit_start_over_in_degree_fallback() {
        let config = FlowConfig {
            nodes: vec![node("a", "start", vec!["b"]), node("b", "llm", vec![]), node("c", "end", vec![])],
            edges: vec![],
        };
        let graph = Graph::build_from_config(config, Some("b"));
        assert_eq!(graph.start_node_id, "b");
    }

    #[test]
    fn edges_with_source_index_place_target_in_slot() {
        let config = FlowConfig {
            nodes: vec![node("router", "router", vec![]), node("a", "llm", vec![]), node("b", "llm", vec![])],
            edges: vec![
                EdgeCfg { source: "router".into(), target: "b".into(), source_handle: None, source_index: Some(1) },
                EdgeCfg { source: "router".into(), target: "a".into(), source_handle: None, source_index: Some(0) },
            ],
        };
        let graph = Graph::build_from_config(config, None);
        assert_eq!(graph.connections("router"), &["a".to_string(), "b".to_string()]);
    }
}
