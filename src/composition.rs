// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! `SystemComposition`: the identity pair of a JVM configuration and a
//! node configuration, and the unit of scheduling across the network.
//!
//! Grounded on §3/§6: the composition hash is `SHA1(SHA1(jvm_path ||
//! jvm_options) || SHA1(node_host))`, extended per the §9 Open
//! Question (see `DESIGN.md`) so the inner term also folds in
//! workload/tool identity — otherwise two compositions with the same
//! JVM but different workloads would collide, contradicting §8's
//! stated invariant that changing the workload changes the composition
//! hash.

use crate::edge::{Edge, ElementId};
use crate::element::{Element, ElementRegistry, PipelineElement};
use crate::error::PenchyResult;
use crate::jvm::Jvm;
use crate::node_setting::NodeSetting;
use crate::element::wrapped_jvm::WrappedJvm;
use sha1::{Digest, Sha1};
use std::path::Path;

/// Either a plain JVM, or one wrapped by another program (§4.3
/// `WrappedJVM`) — also a pipeline element in that case.
pub enum CompositionJvm {
    Plain(Jvm),
    Wrapped(WrappedJvm),
}

impl CompositionJvm {
    pub fn jvm(&self) -> &Jvm {
        match self {
            CompositionJvm::Plain(j) => j,
            CompositionJvm::Wrapped(w) => &w.jvm,
        }
    }

    pub fn jvm_mut(&mut self) -> &mut Jvm {
        match self {
            CompositionJvm::Plain(j) => j,
            CompositionJvm::Wrapped(w) => &mut w.jvm,
        }
    }

    pub fn run(&mut self, registry: &mut ElementRegistry, cwd: &Path) -> PenchyResult<()> {
        match self {
            CompositionJvm::Plain(j) => j.run(registry, cwd),
            CompositionJvm::Wrapped(w) => w.run(registry, cwd),
        }
    }
}

pub struct SystemComposition {
    pub jvm: CompositionJvm,
    pub node_setting: NodeSetting,
    pub elements: ElementRegistry,
    pub flow: Vec<Edge<ElementId>>,
    /// Only set when `jvm` is `Wrapped`: the id of a shadow
    /// `Element::WrappedJvm` entry in `elements`, mirroring the real
    /// `WrappedJvm`'s `out` after each run so downstream edges can
    /// source from it like any other pipeline element without the
    /// registry and the executable JVM fighting over one mutable
    /// borrow.
    pub wrapped_jvm_id: Option<ElementId>,
    pub name: String,
}

impl SystemComposition {
    pub fn new(jvm: CompositionJvm, node_setting: NodeSetting, name: impl Into<String>) -> Self {
        Self {
            jvm,
            node_setting,
            elements: ElementRegistry::new(),
            flow: Vec::new(),
            wrapped_jvm_id: None,
            name: name.into(),
        }
    }

    /// The subset of `{workload, tool, jvm}` that are pipeline
    /// elements and thus valid roots for `edgesort`.
    pub fn starts(&self) -> Vec<ElementId> {
        let mut starts = Vec::new();
        if let Some(id) = self.jvm.jvm().workload {
            starts.push(id);
        }
        if let Some(id) = self.jvm.jvm().tool {
            starts.push(id);
        }
        if let Some(id) = self.wrapped_jvm_id {
            starts.push(id);
        }
        starts
    }

    /// After `jvm.run()`, copy a wrapped JVM's freshly produced `out`
    /// into its shadow registry entry.
    pub fn sync_wrapped_jvm_output(&mut self) {
        let (CompositionJvm::Wrapped(wrapped), Some(id)) = (&self.jvm, self.wrapped_jvm_id) else {
            return;
        };
        if let Element::WrappedJvm(shadow) = self.elements.get_mut(id) {
            *shadow.out_mut() = wrapped.out().clone();
        }
    }

    pub fn timeout(&self) -> f64 {
        self.jvm.jvm().timeout as f64 * self.node_setting.timeout_factor.evaluate()
    }

    /// `SHA1(SHA1(jvm_path || jvm_options || workload_id || tool_id)
    /// || SHA1(node_host))`.
    pub fn hash(&self) -> String {
        let jvm = self.jvm.jvm();

        let mut inner = Sha1::new();
        inner.update(jvm.path().as_bytes());
        inner.update(jvm.user_options().as_bytes());
        if let Some(id) = jvm.workload {
            inner.update(self.elements.get(id).identity().as_bytes());
        }
        if let Some(id) = jvm.tool {
            inner.update(self.elements.get(id).identity().as_bytes());
        }
        let inner_hex = hex::encode(inner.finalize());

        let mut outer = Sha1::new();
        outer.update(inner_hex.as_bytes());
        outer.update(self.node_setting.hash().as_bytes());
        hex::encode(outer.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::workload::{Workload, WorkloadKind};

    fn make_composition(benchmark: &str) -> SystemComposition {
        let jvm = Jvm::new("java", "-Xmx1G");
        let node = NodeSetting::new("h1", 22, "u", "/p", "/", "d");
        let mut comp = SystemComposition::new(CompositionJvm::Plain(jvm), node, "demo");
        let workload_id = comp
            .elements
            .insert(Element::Workload(Workload::dacapo(WorkloadKind::Dacapo, benchmark)));
        comp.jvm.jvm_mut().workload = Some(workload_id);
        comp
    }

    #[test]
    fn hash_changes_with_workload() {
        let a = make_composition("avrora");
        let b = make_composition("h2");
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn hash_is_stable_for_identical_compositions() {
        let a = make_composition("avrora");
        let b = make_composition("avrora");
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn timeout_multiplies_jvm_and_node_factor() {
        let mut comp = make_composition("avrora");
        comp.jvm.jvm_mut().timeout = 10;
        comp.node_setting.timeout_factor = crate::node_setting::TimeoutFactor::Scalar(2.5);
        assert_eq!(comp.timeout(), 25.0);
    }
}
