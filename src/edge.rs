// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! Edges in the pipeline dependency graph.
//!
//! Grounded on `penchy/jobs/dependency.py`'s `Edge`: a directed wire
//! from one element's outputs to another's inputs, with an optional
//! rename map. The original wires live `PipelineElement` objects
//! together and relies on Python object identity for equality; here
//! elements are addressed by [`ElementId`], the handle the pipeline
//! builder hands out when an element is added to a [`crate::pipeline::Pipeline`].

use serde::{Deserialize, Serialize};

/// Opaque handle to a `PipelineElement` registered in a pipeline.
///
/// Plays the role of Python object identity: two `ElementId`s compare
/// equal only if they name the same element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub usize);

/// A directed edge from `source`'s outputs to `sink`'s inputs.
///
/// `map` renames `source` output names to `sink` input names; `None`
/// means the identity mapping (every source output name is reused
/// unchanged as a sink input name), exactly as `Edge(source, sink)`
/// without a `map_` behaves in the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge<N = ElementId> {
    pub source: N,
    pub sink: N,
    pub map: Option<Vec<(String, String)>>,
}

impl<N> Edge<N> {
    pub fn new(source: N, sink: N) -> Self {
        Self {
            source,
            sink,
            map: None,
        }
    }

    pub fn with_map(source: N, sink: N, map: Vec<(String, String)>) -> Self {
        Self {
            source,
            sink,
            map: Some(map),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_map_is_none() {
        let edge = Edge::new(ElementId(0), ElementId(1));
        assert!(edge.map.is_none());
    }
}
