// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! `PipelineElement` and its closed set of variants.
//!
//! Grounded on the system-overview description of `PipelineElement`
//! as "an abstract unit with typed inputs, typed outputs, hooks, a run
//! method, and resettable state", with a deliberately closed variant
//! set (`Workload`, `Tool`, `Filter`, `SystemFilter`, `WrappedJvm`)
//! rather than open inheritance — the same design choice the teacher
//! makes for `Tool` (`Cue`/`Nickel`/`Shell` as an enum, not trait
//! objects per stage).

pub mod filter;
pub mod system_filter;
pub mod tool;
pub mod wrapped_jvm;
pub mod workload;

pub use filter::Filter;
pub use system_filter::SystemFilter;
pub use tool::Tool;
pub use wrapped_jvm::WrappedJvm;
pub use workload::Workload;

use crate::dag::ElementOutputs;
use crate::edge::ElementId;
use crate::environment::Environment;
use crate::error::PenchyResult;
use crate::typespec::TypeSpec;
use crate::value::Value;
use std::collections::HashMap;

/// A prehook or posthook: a side-effecting callback run around
/// `PipelineElement::run`. Closures rather than trait objects over a
/// richer type, the way the teacher keeps `Executor` dispatch behind
/// one `async_trait` rather than hand-rolled vtables.
pub type Hook = Box<dyn FnMut() + Send>;

/// Capability set every pipeline element exposes, shared across the
/// closed variant set by delegation from [`Element`].
pub trait PipelineElement {
    fn inputs(&self) -> &TypeSpec;
    fn outputs(&self) -> &TypeSpec;
    fn out(&self) -> &HashMap<String, Vec<Value>>;
    fn out_mut(&mut self) -> &mut HashMap<String, Vec<Value>>;

    /// A content token folded into `SystemComposition::hash()` so the
    /// composition's identity reflects which workload/tool is
    /// configured, not just the JVM's path and options (§9 Open
    /// Question — see `DESIGN.md`).
    fn identity(&self) -> String;

    /// External artifacts this element needs resolved onto the
    /// classpath before the composition runs. No current variant
    /// declares any; the resolver itself is an external collaborator
    /// (§1), so the default of "none" covers every concrete element
    /// unless a job-specific one overrides it.
    fn dependencies(&self) -> Vec<crate::dependency::Dependency> {
        Vec::new()
    }

    /// Run this element against a bundle of named inputs, with the
    /// per-invocation environment available only to `SystemFilter`s.
    fn run(&mut self, kwargs: &HashMap<String, Value>, env: Option<&mut Environment>) -> PenchyResult<()>;

    /// Clear every output accumulator back to empty, keeping the
    /// declared names. Called after a composition's flow completes so
    /// the same composition can be reused by another job run.
    fn reset(&mut self) {
        for values in self.out_mut().values_mut() {
            values.clear();
        }
    }
}

/// The closed set of concrete pipeline elements a flow can be built
/// from.
#[derive(Debug)]
pub enum Element {
    Workload(Workload),
    Tool(Tool),
    Filter(Filter),
    SystemFilter(SystemFilter),
    WrappedJvm(WrappedJvm),
}

impl PipelineElement for Element {
    fn inputs(&self) -> &TypeSpec {
        match self {
            Element::Workload(e) => e.inputs(),
            Element::Tool(e) => e.inputs(),
            Element::Filter(e) => e.inputs(),
            Element::SystemFilter(e) => e.inputs(),
            Element::WrappedJvm(e) => e.inputs(),
        }
    }

    fn outputs(&self) -> &TypeSpec {
        match self {
            Element::Workload(e) => e.outputs(),
            Element::Tool(e) => e.outputs(),
            Element::Filter(e) => e.outputs(),
            Element::SystemFilter(e) => e.outputs(),
            Element::WrappedJvm(e) => e.outputs(),
        }
    }

    fn out(&self) -> &HashMap<String, Vec<Value>> {
        match self {
            Element::Workload(e) => e.out(),
            Element::Tool(e) => e.out(),
            Element::Filter(e) => e.out(),
            Element::SystemFilter(e) => e.out(),
            Element::WrappedJvm(e) => e.out(),
        }
    }

    fn out_mut(&mut self) -> &mut HashMap<String, Vec<Value>> {
        match self {
            Element::Workload(e) => e.out_mut(),
            Element::Tool(e) => e.out_mut(),
            Element::Filter(e) => e.out_mut(),
            Element::SystemFilter(e) => e.out_mut(),
            Element::WrappedJvm(e) => e.out_mut(),
        }
    }

    fn identity(&self) -> String {
        match self {
            Element::Workload(e) => e.identity(),
            Element::Tool(e) => e.identity(),
            Element::Filter(e) => e.identity(),
            Element::SystemFilter(e) => e.identity(),
            Element::WrappedJvm(e) => e.identity(),
        }
    }

    fn run(&mut self, kwargs: &HashMap<String, Value>, env: Option<&mut Environment>) -> PenchyResult<()> {
        match self {
            Element::Workload(e) => e.run(kwargs, env),
            Element::Tool(e) => e.run(kwargs, env),
            Element::Filter(e) => e.run(kwargs, env),
            Element::SystemFilter(e) => e.run(kwargs, env),
            Element::WrappedJvm(e) => e.run(kwargs, env),
        }
    }
}

/// A per-composition registry of flow elements, addressed by
/// [`ElementId`]. Mirrors Python object identity for wiring edges
/// without elements owning each other.
#[derive(Debug, Default)]
pub struct ElementRegistry {
    elements: Vec<Element>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, element: Element) -> ElementId {
        let id = ElementId(self.elements.len());
        self.elements.push(element);
        id
    }

    pub fn get(&self, id: ElementId) -> &Element {
        &self.elements[id.0]
    }

    pub fn get_mut(&mut self, id: ElementId) -> &mut Element {
        &mut self.elements[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = ElementId> {
        (0..self.elements.len()).map(ElementId)
    }

    pub fn reset_all(&mut self) {
        for element in &mut self.elements {
            element.reset();
        }
    }
}

impl ElementOutputs<ElementId> for ElementRegistry {
    fn output_names(&self, node: &ElementId) -> Vec<String> {
        self.get(*node).outputs().names().into_iter().collect()
    }

    fn output_value(&self, node: &ElementId, name: &str) -> Option<Value> {
        let out = self.get(*node).out();
        out.get(name).map(|seq| Value::List(seq.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::workload::WorkloadKind;

    #[test]
    fn registry_resets_every_element() {
        let mut registry = ElementRegistry::new();
        let id = registry.insert(Element::Workload(Workload::dacapo(
            WorkloadKind::Dacapo,
            "avrora",
        )));

        registry
            .get_mut(id)
            .out_mut()
            .entry("exit_code".to_string())
            .or_default()
            .push(Value::Int(0));

        registry.reset_all();
        assert!(registry.get(id).out()["exit_code"].is_empty());
    }
}
