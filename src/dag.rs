// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! Scheduling the pipeline's edges into an execution order.
//!
//! Grounded on `penchy/jobs/dependency.py`'s `edgesort`/`build_keys`:
//! a fixed-point iteration, not a generic topological sort, because it
//! also has to produce the edge order alongside the element order
//! (`run_server_pipeline`/`Job.run` replay edges, not elements, when
//! wiring `out` maps to the next element's `kwargs`). Cycle diagnostics
//! reuse the teacher's `petgraph` + DFS `find_cycle_members` approach
//! for a friendlier error than "no progress was made".

use crate::edge::Edge;
use crate::error::PenchyError;
use crate::value::Value;
use petgraph::graph::DiGraph;
use petgraph::visit::{depth_first_search, DfsEvent};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Topologically sort `edges` into element order and edge order.
///
/// `starts` are elements with no dependencies (already "resolved");
/// they are not included in the returned order, mirroring the
/// original's contract. Each round, every sink whose edges all come
/// from resolved sources is resolved and its edges recorded; rounds
/// repeat until no edges remain. If a round makes no progress the
/// graph cannot be sorted (a cycle, or a sink with an unresolvable
/// source) and cycle membership is computed for the error.
pub fn edgesort<N>(starts: &[N], edges: Vec<Edge<N>>) -> Result<(Vec<N>, Vec<Edge<N>>), PenchyError>
where
    N: Clone + Eq + Hash + std::fmt::Debug,
{
    let mut resolved: HashSet<N> = starts.iter().cloned().collect();
    let mut order: Vec<N> = Vec::new();
    let mut edge_order: Vec<Edge<N>> = Vec::new();
    let mut edges = edges;
    let mut old_edges: Vec<Edge<N>> = Vec::new();

    loop {
        if edges.is_empty() {
            return Ok((order, edge_order));
        }

        if edges == old_edges {
            let unresolved = find_cycle_members(&edges);
            return Err(PenchyError::NoTopologicalSort { unresolved });
        }

        let targets: HashSet<N> = edges.iter().map(|e| e.sink.clone()).collect();
        for target in targets {
            let current: Vec<&Edge<N>> = edges.iter().filter(|e| e.sink == target).collect();
            if current.iter().all(|e| resolved.contains(&e.source)) {
                resolved.insert(target.clone());
                order.push(target.clone());
                edge_order.extend(current.into_iter().cloned());
            }
        }

        old_edges = edges.clone();
        edges.retain(|e| !resolved.contains(&e.sink));
    }
}

/// Run `petgraph` cycle detection over the unresolved edges purely to
/// produce a readable list of the elements stuck in (or behind) a
/// cycle, the way the teacher's `find_cycle_members` walks a DFS from
/// the first cycle node `toposort` reports.
fn find_cycle_members<N>(edges: &[Edge<N>]) -> Vec<String>
where
    N: Clone + Eq + Hash + std::fmt::Debug,
{
    let mut graph = DiGraph::<String, ()>::new();
    let mut index_of = HashMap::new();
    let mut label_of = HashMap::new();

    let mut node_id = |n: &N, graph: &mut DiGraph<String, ()>| {
        *index_of.entry(n.clone()).or_insert_with(|| {
            let label = format!("{:?}", n);
            let idx = graph.add_node(label.clone());
            label_of.insert(idx, label);
            idx
        })
    };

    for edge in edges {
        let source = node_id(&edge.source, &mut graph);
        let sink = node_id(&edge.sink, &mut graph);
        graph.add_edge(source, sink, ());
    }

    let start = match graph.node_indices().next() {
        Some(n) => n,
        None => return Vec::new(),
    };

    let mut visited = HashSet::new();
    let mut members = vec![label_of[&start].clone()];
    depth_first_search(&graph, Some(start), |event| {
        if let DfsEvent::Discover(node, _) = event {
            let label = &label_of[&node];
            if visited.contains(label) {
                members.push(label.clone());
                return petgraph::visit::Control::Break(());
            }
            visited.insert(label.clone());
            members.push(label.clone());
        }
        petgraph::visit::Control::Continue::<()>
    });

    members
}

/// Source elements an edge set's results can be gathered from, so
/// `build_keys` can look up `source.out[name]` without owning the
/// element registry itself.
pub trait ElementOutputs<N> {
    fn output_names(&self, node: &N) -> Vec<String>;
    fn output_value(&self, node: &N, name: &str) -> Option<Value>;
}

/// Build the `kwargs` map a sink element should be invoked with, from
/// every edge feeding it.
///
/// All `edges` must share the same sink. Without a rename map, every
/// one of the source's declared output names is carried through
/// unchanged; with one, only the mapped `(output, input)` pairs are.
pub fn build_keys<N, O>(edges: &[Edge<N>], outputs: &O) -> HashMap<String, Value>
where
    N: Eq + Clone,
    O: ElementOutputs<N>,
{
    let mut keys = HashMap::new();

    for edge in edges {
        match &edge.map {
            None => {
                for name in outputs.output_names(&edge.source) {
                    if let Some(value) = outputs.output_value(&edge.source, &name) {
                        keys.insert(name, value);
                    }
                }
            }
            Some(map) => {
                for (output, input) in map {
                    if let Some(value) = outputs.output_value(&edge.source, output) {
                        keys.insert(input.clone(), value);
                    }
                }
            }
        }
    }

    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct Id(u32);

    struct FakeOutputs(HashMap<u32, HashMap<String, Value>>);

    impl ElementOutputs<Id> for FakeOutputs {
        fn output_names(&self, node: &Id) -> Vec<String> {
            self.0
                .get(&node.0)
                .map(|m| m.keys().cloned().collect())
                .unwrap_or_default()
        }

        fn output_value(&self, node: &Id, name: &str) -> Option<Value> {
            self.0.get(&node.0).and_then(|m| m.get(name)).cloned()
        }
    }

    #[test]
    fn linear_chain_sorts_in_order() {
        let a = Id(0);
        let b = Id(1);
        let c = Id(2);
        let edges = vec![Edge::new(a, b), Edge::new(b, c)];

        let (order, edge_order) = edgesort(&[a], edges).unwrap();
        assert_eq!(order, vec![b, c]);
        assert_eq!(edge_order.len(), 2);
    }

    #[test]
    fn diamond_resolves_both_branches_before_join() {
        let a = Id(0);
        let b = Id(1);
        let c = Id(2);
        let d = Id(3);
        let edges = vec![
            Edge::new(a, b),
            Edge::new(a, c),
            Edge::new(b, d),
            Edge::new(c, d),
        ];

        let (order, _) = edgesort(&[a], edges).unwrap();
        assert_eq!(order.len(), 3);
        assert_eq!(order[2], d);
    }

    #[test]
    fn cycle_fails_with_no_progress() {
        let a = Id(0);
        let b = Id(1);
        let edges = vec![Edge::new(a, b), Edge::new(b, a)];

        let err = edgesort(&[], edges).unwrap_err();
        assert!(matches!(err, PenchyError::NoTopologicalSort { .. }));
    }

    #[test]
    fn build_keys_applies_rename_map() {
        let source = Id(0);
        let sink = Id(1);
        let mut out = HashMap::new();
        out.insert("raw_time".to_string(), Value::Float(1.5));
        let mut outputs_map = HashMap::new();
        outputs_map.insert(0u32, out);
        let outputs = FakeOutputs(outputs_map);

        let edge = Edge::with_map(source, sink, vec![("raw_time".to_string(), "time".to_string())]);
        let keys = build_keys(&[edge], &outputs);

        assert_eq!(keys.get("time"), Some(&Value::Float(1.5)));
        assert!(keys.get("raw_time").is_none());
    }

    #[test]
    fn build_keys_without_map_passes_all_outputs_through() {
        let source = Id(0);
        let sink = Id(1);
        let mut out = HashMap::new();
        out.insert("wallclock".to_string(), Value::Float(2.0));
        out.insert("exit_status".to_string(), Value::Int(0));
        let mut outputs_map = HashMap::new();
        outputs_map.insert(0u32, out);
        let outputs = FakeOutputs(outputs_map);

        let edge = Edge::new(source, sink);
        let keys = build_keys(&[edge], &outputs);

        assert_eq!(keys.len(), 2);
    }
}
