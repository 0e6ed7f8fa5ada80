// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! The declarative YAML shape a job file (the bootstrap's first
//! positional argument, §6) is written in, and the loader that turns
//! it into a runnable [`crate::job::Job`].
//!
//! The specification treats the bootstrap script as an external
//! collaborator and only pins its invocation contract, leaving the job
//! file's own format unspecified. This crate gives it a concrete,
//! serde-driven shape the way the teacher's `Pipeline` loads
//! `.conflow.yaml` via `from_file`/`from_yaml`: one workload, wired
//! through a `Dump` and a `Send` filter per composition, is enough to
//! drive the client side of §4.4 end to end without reintroducing a
//! scripting layer.

use crate::composition::{CompositionJvm, SystemComposition};
use crate::element::system_filter::SystemFilter;
use crate::element::workload::{Workload, WorkloadKind};
use crate::element::Element;
use crate::error::{PenchyError, PenchyResult};
use crate::job::Job;
use crate::jvm::Jvm;
use crate::node_setting::NodeSetting;
use crate::pipeline::{MapSpec, Pipeline};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub host: String,
    pub ssh_port: u16,
    pub username: String,
    pub path: String,
    pub basepath: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadSpecKind {
    Dacapo,
    ScalaBench,
}

impl From<WorkloadSpecKind> for WorkloadKind {
    fn from(kind: WorkloadSpecKind) -> Self {
        match kind {
            WorkloadSpecKind::Dacapo => WorkloadKind::Dacapo,
            WorkloadSpecKind::ScalaBench => WorkloadKind::ScalaBench,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadSpec {
    pub kind: WorkloadSpecKind,
    pub benchmark: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionSpec {
    pub name: String,
    pub jvm_path: String,
    #[serde(default)]
    pub jvm_options: String,
    #[serde(default)]
    pub timeout: u32,
    pub workload: WorkloadSpec,
    pub node: NodeSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    #[serde(default = "default_invocations")]
    pub invocations: u32,
    pub compositions: Vec<CompositionSpec>,
}

fn default_invocations() -> u32 {
    1
}

impl JobSpec {
    pub fn from_yaml(yaml: &str) -> PenchyResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> PenchyResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| PenchyError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_yaml(&contents)
    }

    /// Build a runnable [`Job`] with one [`Workload`] wired through a
    /// `Dump` filter into a `Send` filter per composition — enough
    /// client-side flow for `Job::check`'s "has a Send element"
    /// predicate to pass, and for the server to actually receive the
    /// workload's captured output rather than an empty payload (`Send`
    /// only reads its `payload` input; `Dump`'s `record` output is the
    /// §6 Dump JSON layout, renamed into that key).
    pub fn build(&self, filename: impl Into<String>) -> Job {
        let mut job = Job::new(filename, self.invocations);

        for spec in &self.compositions {
            let jvm = Jvm::new(spec.jvm_path.clone(), spec.jvm_options.clone());
            let node = NodeSetting::new(
                spec.node.host.clone(),
                spec.node.ssh_port,
                spec.node.username.clone(),
                spec.node.path.clone(),
                spec.node.basepath.clone(),
                spec.node.description.clone(),
            );
            let mut composition = SystemComposition::new(CompositionJvm::Plain(jvm), node, spec.name.clone());
            composition.jvm.jvm_mut().timeout = spec.timeout;

            let workload = Workload::new(
                spec.workload.kind.into(),
                spec.workload.benchmark.clone(),
                1,
                shell_words::join(&spec.workload.args),
                spec.timeout,
                None,
            );
            let workload_id = composition.elements.insert(Element::Workload(workload));
            let dump_id = composition
                .elements
                .insert(Element::SystemFilter(SystemFilter::dump(crate::VERSION)));
            let send_id = composition.elements.insert(Element::SystemFilter(SystemFilter::send()));
            composition.jvm.jvm_mut().workload = Some(workload_id);
            composition.flow = Pipeline::new()
                .connect(workload_id, dump_id)
                .map(MapSpec::rename("record", "payload"))
                .connect(dump_id, send_id)
                .build();

            job.compositions.push(composition);
        }

        job
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
invocations: 2
compositions:
  - name: demo
    jvm_path: java
    jvm_options: "-Xmx1G"
    timeout: 120
    workload:
      kind: dacapo
      benchmark: avrora
    node:
      host: worker-1
      ssh_port: 22
      username: bench
      path: /home/bench/penchy
      basepath: /usr/bin
      description: demo node
"#;

    #[test]
    fn loads_a_single_composition_job_from_yaml() {
        let spec = JobSpec::from_yaml(YAML).unwrap();
        assert_eq!(spec.invocations, 2);
        assert_eq!(spec.compositions.len(), 1);

        let job = spec.build("job.yaml");
        assert_eq!(job.compositions.len(), 1);
        assert_eq!(job.invocations, 2);
        assert!(job.compositions[0].jvm.jvm().workload.is_some());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = JobSpec::from_file(Path::new("/nonexistent/job.yaml")).unwrap_err();
        assert!(matches!(err, PenchyError::FileReadError { .. }));
    }
}
