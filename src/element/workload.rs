// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! Workloads: the benchmark suites a JVM executes.
//!
//! Grounded on `penchy/jobs/workloads.py`'s `Dacapo`/`ScalaBench`. A
//! workload itself never runs a child process — `Jvm::run` does that
//! and appends `exit_code`/`stdout`/`stderr` straight into this
//! element's `out` — so `Workload::run` is a no-op; the element exists
//! to be a typed, resettable home for that data and for `arguments()`.

use super::{Hook, PipelineElement};
use crate::environment::Environment;
use crate::error::PenchyResult;
use crate::typespec::{TypeDescription, TypeSpec};
use crate::value::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Dacapo,
    ScalaBench,
}

/// Benchmarks DaCapo itself ships.
pub const DACAPO_BENCHMARKS: &[&str] = &[
    "avrora", "batik", "eclipse", "fop", "h2", "jython", "luindex", "lusearch", "pmd", "sunflow",
    "tomcat", "tradebeans", "tradesoap", "xalan",
];

/// Benchmarks Scalabench adds on top of DaCapo's set.
pub const SCALABENCH_EXTRA_BENCHMARKS: &[&str] = &[
    "actors", "apparat", "dummy", "factorie", "kiama", "scalac", "scaladoc", "scalap",
    "scalariform", "scalatest", "scalaxb", "specs", "tmt",
];

pub struct Workload {
    kind: WorkloadKind,
    benchmark: String,
    iterations: u32,
    args: String,
    pub timeout: u32,
    pub name: Option<String>,
    pub prehooks: Vec<Hook>,
    pub posthooks: Vec<Hook>,
    inputs: TypeSpec,
    outputs: TypeSpec,
    out: HashMap<String, Vec<Value>>,
}

impl std::fmt::Debug for Workload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workload")
            .field("kind", &self.kind)
            .field("benchmark", &self.benchmark)
            .field("iterations", &self.iterations)
            .finish()
    }
}

impl Workload {
    pub fn new(
        kind: WorkloadKind,
        benchmark: impl Into<String>,
        iterations: u32,
        args: impl Into<String>,
        timeout: u32,
        name: Option<String>,
    ) -> Self {
        let outputs = TypeSpec::new(vec![
            TypeDescription::new("exit_code", vec![crate::value::ValueType::Int]),
            TypeDescription::new("stdout", vec![crate::value::ValueType::Str]),
            TypeDescription::new("stderr", vec![crate::value::ValueType::Str]),
        ]);

        let mut out = HashMap::new();
        out.insert("exit_code".to_string(), Vec::new());
        out.insert("stdout".to_string(), Vec::new());
        out.insert("stderr".to_string(), Vec::new());

        Self {
            kind,
            benchmark: benchmark.into(),
            iterations,
            args: args.into(),
            timeout,
            name,
            prehooks: Vec::new(),
            posthooks: Vec::new(),
            inputs: TypeSpec::unchecked(),
            outputs,
            out,
        }
    }

    /// Convenience constructor used by tests and demos: a Dacapo-like
    /// workload with default iterations/args/timeout.
    pub fn dacapo(kind: WorkloadKind, benchmark: impl Into<String>) -> Self {
        Self::new(kind, benchmark, 1, "", 0, None)
    }

    pub fn benchmarks(kind: WorkloadKind) -> Vec<&'static str> {
        match kind {
            WorkloadKind::Dacapo => DACAPO_BENCHMARKS.to_vec(),
            WorkloadKind::ScalaBench => DACAPO_BENCHMARKS
                .iter()
                .chain(SCALABENCH_EXTRA_BENCHMARKS.iter())
                .copied()
                .collect(),
        }
    }

    pub fn benchmark(&self) -> &str {
        &self.benchmark
    }

    /// The arguments to invoke the workload's harness in the current
    /// configuration: `Harness -n <iterations> <shell-split args>
    /// <benchmark>`.
    pub fn arguments(&self) -> Vec<String> {
        let mut args = vec!["Harness".to_string(), "-n".to_string(), self.iterations.to_string()];
        args.extend(shell_words::split(&self.args).unwrap_or_default());
        args.push(self.benchmark.clone());
        args
    }

    /// The arguments to collect benchmark information rather than run
    /// it: `Harness -i <benchmark>`.
    pub fn information_arguments(&self) -> Vec<String> {
        vec!["Harness".to_string(), "-i".to_string(), self.benchmark.clone()]
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.benchmark)
    }
}

impl PipelineElement for Workload {
    fn inputs(&self) -> &TypeSpec {
        &self.inputs
    }

    fn outputs(&self) -> &TypeSpec {
        &self.outputs
    }

    fn out(&self) -> &HashMap<String, Vec<Value>> {
        &self.out
    }

    fn out_mut(&mut self) -> &mut HashMap<String, Vec<Value>> {
        &mut self.out
    }

    fn identity(&self) -> String {
        format!("{:?}({}, n={}, args={})", self.kind, self.benchmark, self.iterations, self.args)
    }

    fn run(&mut self, _kwargs: &HashMap<String, Value>, _env: Option<&mut Environment>) -> PenchyResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_assemble_in_order() {
        let w = Workload::new(WorkloadKind::Dacapo, "avrora", 3, "-verbose", 0, None);
        assert_eq!(
            w.arguments(),
            vec!["Harness", "-n", "3", "-verbose", "avrora"]
        );
    }

    #[test]
    fn information_arguments_probe_benchmark() {
        let w = Workload::dacapo(WorkloadKind::Dacapo, "h2");
        assert_eq!(w.information_arguments(), vec!["Harness", "-i", "h2"]);
    }

    #[test]
    fn scalabench_extends_dacapo_benchmarks() {
        let all = Workload::benchmarks(WorkloadKind::ScalaBench);
        assert!(all.contains(&"avrora"));
        assert!(all.contains(&"scalac"));
    }
}
