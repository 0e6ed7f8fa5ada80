// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! A builder for wiring elements into a flow, mirroring the original's
//! `>>` connector DSL (§3/§9): a lone name means keep it as-is, a
//! rename pair renames it, and either can be grouped into a list. The
//! sugar is modeled as [`MapSpec`], and the "a pending mapping is
//! attached to the next edge added" rule (§3) is explicit state on
//! [`Pipeline`] rather than an operator side effect.

use crate::edge::{Edge, ElementId};

/// The syntax sugar accepted where the original's DSL takes `"x"`,
/// `(a, b)`, or a list of either.
pub enum MapSpec {
    Same(String),
    Rename(String, String),
    Many(Vec<MapSpec>),
}

impl MapSpec {
    pub fn same(name: impl Into<String>) -> Self {
        MapSpec::Same(name.into())
    }

    pub fn rename(from: impl Into<String>, to: impl Into<String>) -> Self {
        MapSpec::Rename(from.into(), to.into())
    }

    pub fn many(specs: impl IntoIterator<Item = MapSpec>) -> Self {
        MapSpec::Many(specs.into_iter().collect())
    }

    fn flatten_into(self, out: &mut Vec<(String, String)>) {
        match self {
            MapSpec::Same(name) => out.push((name.clone(), name)),
            MapSpec::Rename(from, to) => out.push((from, to)),
            MapSpec::Many(specs) => {
                for spec in specs {
                    spec.flatten_into(out);
                }
            }
        }
    }

    fn flatten(self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }
}

/// Accumulates edges for a single composition's flow. A `map()` call
/// attaches a rename map to whichever `connect()` comes next; without
/// one, the edge uses the identity mapping.
#[derive(Default)]
pub struct Pipeline {
    edges: Vec<Edge<ElementId>>,
    pending_map: Option<Vec<(String, String)>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a rename map to the next edge `connect()` adds.
    pub fn map(mut self, spec: MapSpec) -> Self {
        self.pending_map = Some(spec.flatten());
        self
    }

    /// Wire `source`'s outputs into `sink`'s inputs, consuming any
    /// pending map set by a preceding `map()` call.
    pub fn connect(mut self, source: ElementId, sink: ElementId) -> Self {
        let edge = match self.pending_map.take() {
            Some(map) => Edge::with_map(source, sink, map),
            None => Edge::new(source, sink),
        };
        self.edges.push(edge);
        self
    }

    pub fn build(self) -> Vec<Edge<ElementId>> {
        self.edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_without_map_uses_identity() {
        let edges = Pipeline::new().connect(ElementId(0), ElementId(1)).build();
        assert_eq!(edges.len(), 1);
        assert!(edges[0].map.is_none());
    }

    #[test]
    fn map_attaches_only_to_the_next_edge() {
        let edges = Pipeline::new()
            .map(MapSpec::rename("stdout", "log"))
            .connect(ElementId(0), ElementId(1))
            .connect(ElementId(1), ElementId(2))
            .build();

        assert_eq!(edges[0].map, Some(vec![("stdout".to_string(), "log".to_string())]));
        assert!(edges[1].map.is_none());
    }

    #[test]
    fn many_flattens_mixed_same_and_rename_entries() {
        let edges = Pipeline::new()
            .map(MapSpec::many([
                MapSpec::same("exit_code"),
                MapSpec::rename("stdout", "times"),
            ]))
            .connect(ElementId(0), ElementId(1))
            .build();

        assert_eq!(
            edges[0].map,
            Some(vec![
                ("exit_code".to_string(), "exit_code".to_string()),
                ("stdout".to_string(), "times".to_string()),
            ])
        );
    }
}
