use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::catalog::ComponentEntry;

/// Summary of the address component tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentTreeSummary {
    pub nodes: usize,
    pub edges: usize,
    pub roots: usize,
}

/// Parent-first ordering of the component tree, or the codes stuck on a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentTreeReport {
    pub summary: ComponentTreeSummary,
    pub topo_order: Option<Vec<String>>,
    pub cycle: Option<Vec<String>>,
}

/// Build a deterministic parent-first ordering of catalog components.
///
/// Parent codes that are not themselves components are ignored here;
/// dangling parents are reported by catalog validation.
pub fn build_component_tree_report(components: &[ComponentEntry]) -> ComponentTreeReport {
    let graph = build_adjacency(components);
    let nodes = graph.len();
    let edges: usize = graph.values().map(|children| children.len()).sum();
    let roots = nodes - edges.min(nodes);
    let summary = ComponentTreeSummary {
        nodes,
        edges,
        roots,
    };

    match toposort(&graph) {
        Ok(order) => ComponentTreeReport {
            summary,
            topo_order: Some(order),
            cycle: None,
        },
        Err(cycle) => ComponentTreeReport {
            summary,
            topo_order: None,
            cycle: Some(cycle),
        },
    }
}

fn build_adjacency(components: &[ComponentEntry]) -> BTreeMap<String, BTreeSet<String>> {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for component in components {
        graph.entry(component.code.clone()).or_default();
    }

    for component in components {
        if let Some(parent) = &component.parent_code {
            if let Some(children) = graph.get_mut(parent) {
                children.insert(component.code.clone());
            }
        }
    }

    graph
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>, Vec<String>> {
    let mut indegree: BTreeMap<String, usize> =
        graph.keys().map(|node| (node.clone(), 0)).collect();

    for children in graph.values() {
        for child in children {
            *indegree.entry(child.clone()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<String> = indegree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(node, _)| node.clone())
        .collect();

    let mut order = Vec::with_capacity(graph.len());

    while let Some(node) = ready.pop_first() {
        if let Some(children) = graph.get(&node) {
            for child in children {
                if let Some(count) = indegree.get_mut(child) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(child.clone());
                    }
                }
            }
        }
        order.push(node);
    }

    if order.len() == graph.len() {
        Ok(order)
    } else {
        Err(indegree
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(node, _)| node)
            .collect())
    }
}
