// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! `Job`: the compositions a job runs, its server-side flow, and the
//! client/server execution entry points of §4.4-§4.6.
//!
//! Grounded on `penchy/jobs/job.py`'s `Job.run`/`run_server_pipeline`/
//! `check`. `send`/`receive` are injected from outside per §4.7 (the
//! client installs `send`, the server installs `receive`), modeled as
//! `Arc<dyn Fn>` rather than `FnMut` so the same handle can be shared
//! across the composition-hash-currying wrapper `run()` builds for
//! each invocation without an extra `Mutex`.

use crate::composition::SystemComposition;
use crate::dag::{build_keys, edgesort};
use crate::dependency::DependencyResolver;
use crate::edge::{Edge, ElementId};
use crate::element::{Element, ElementRegistry, PipelineElement};
use crate::environment::{CompositionContext, Environment};
use crate::error::{PenchyError, PenchyResult};
use crate::value::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub type JobSend = Arc<dyn Fn(String, Value) + Send + Sync>;
pub type JobReceive = Arc<dyn Fn() -> HashMap<String, Value> + Send + Sync>;

/// The conceptual per-composition state machine of §4.4: surfaced only
/// through `tracing` spans and the `Result` returned by `run`, not
/// stored — nothing downstream needs to query a composition's state
/// out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    RunningInvocations,
    RunningFlow,
}

pub struct Job {
    pub compositions: Vec<SystemComposition>,
    pub server_flow: Vec<Edge<ElementId>>,
    pub server_elements: ElementRegistry,
    pub invocations: u32,
    pub send: Option<JobSend>,
    pub receive: Option<JobReceive>,
    pub filename: String,
}

impl Job {
    pub fn new(filename: impl Into<String>, invocations: u32) -> Self {
        Self {
            compositions: Vec::new(),
            server_flow: Vec::new(),
            server_elements: ElementRegistry::new(),
            invocations,
            send: None,
            receive: None,
            filename: filename.into(),
        }
    }

    /// Run the client-side pipeline for one composition: resolve
    /// dependencies, run `invocations` JVM invocations, then execute
    /// the flow (§4.4).
    pub fn run(
        &mut self,
        composition_index: usize,
        resolver: &dyn DependencyResolver,
    ) -> PenchyResult<()> {
        let send = self.send.clone();
        let composition = &mut self.compositions[composition_index];

        let dependencies: Vec<_> = composition
            .elements
            .ids()
            .flat_map(|id| composition.elements.get(id).dependencies())
            .collect();
        if !dependencies.is_empty() {
            let classpath = resolver.resolve(&dependencies)?;
            composition.jvm.jvm_mut().add_to_cp(&classpath.join(":"));
        }
        composition.jvm.jvm_mut().basepath = Path::new(&composition.node_setting.basepath).to_path_buf();

        let hash = composition.hash();
        let jvm_info = Value::Str(format!(
            "{} {}",
            composition.jvm.jvm().path(),
            composition.jvm.jvm().user_options()
        ));
        let context = CompositionContext {
            hash: hash.clone(),
            name: composition.name.clone(),
            node_path: Path::new(&composition.node_setting.path).to_path_buf(),
            jvm_info,
        };

        let send_for_env = send.clone();
        let hash_for_env = hash.clone();
        let mut env = Environment::new(
            move |data| {
                if let Some(send) = &send_for_env {
                    send(hash_for_env.clone(), data);
                }
            },
            HashMap::new,
            self.filename.clone(),
        );
        env.current_composition = Some(context);

        tracing::debug!(?hash, state = ?RunState::RunningInvocations, "running invocations");
        // Kept alive until after `run_flow`: stdout/stderr paths stored in
        // the workload's `out` by `jvm.run()` must still resolve on disk
        // when the flow's filters (e.g. DacapoHarness) read them back (§5).
        let mut scratch_dirs = Vec::with_capacity(self.invocations as usize);
        for invocation in 1..=self.invocations {
            let scratch = tempfile::tempdir()?;
            tracing::debug!(invocation, dir = %scratch.path().display(), "running jvm");
            composition.jvm.run(&mut composition.elements, scratch.path())?;
            composition.sync_wrapped_jvm_output();
            scratch_dirs.push(scratch);
        }

        tracing::debug!(?hash, state = ?RunState::RunningFlow, "running flow");
        let (order, edge_order) = edgesort(&composition.starts(), composition.flow.clone())?;
        run_flow(&order, &edge_order, &mut composition.elements, Some(&mut env))?;

        drop(scratch_dirs);
        composition.elements.reset_all();
        env.current_composition = None;

        Ok(())
    }

    /// The server-side pipeline of §4.5: at least one `Receive` start
    /// pulls the aggregated results map, then the remaining sinks run
    /// as in step 5 of `run`.
    pub fn run_server_pipeline(&mut self) -> PenchyResult<()> {
        if self.server_flow.is_empty() {
            return Ok(());
        }

        let receive_ids = receive_starts(&self.server_elements);
        if receive_ids.is_empty() {
            return Err(PenchyError::InvalidJob {
                reason: "server flow has no Receive start".to_string(),
            });
        }

        let receive = self.receive.clone();
        let mut env = Environment::new(
            |_| {},
            move || match &receive {
                Some(receive) => receive(),
                None => HashMap::new(),
            },
            self.filename.clone(),
        );

        for id in &receive_ids {
            if let Element::SystemFilter(_) = self.server_elements.get(*id) {
                self.server_elements
                    .get_mut(*id)
                    .run(&HashMap::new(), Some(&mut env))?;
            }
        }

        let (order, edge_order) = edgesort(&receive_ids, self.server_flow.clone())?;
        run_flow(&order, &edge_order, &mut self.server_elements, Some(&mut env))
    }

    /// §4.6: every predicate a job must satisfy before deployment.
    pub fn check(&self) -> bool {
        for composition in &self.compositions {
            if composition.jvm.jvm().workload.is_none() {
                tracing::error!(composition = %composition.name, "no workload configured");
                return false;
            }
            if composition.starts().is_empty() {
                tracing::error!(composition = %composition.name, "no starts");
                return false;
            }
            if edgesort(&composition.starts(), composition.flow.clone()).is_err() {
                tracing::error!(composition = %composition.name, "client flow does not topologically sort");
                return false;
            }
            let has_send = composition.elements.ids().any(|id| {
                matches!(composition.elements.get(id), Element::SystemFilter(f) if f.is_send())
            });
            if !has_send {
                tracing::error!(composition = %composition.name, "no Send element");
                return false;
            }
            if !edges_are_saturated(&composition.flow, &composition.elements) {
                return false;
            }
        }

        let receive_ids = receive_starts(&self.server_elements);
        if receive_ids.is_empty() {
            tracing::error!("server flow has no Receive element");
            return false;
        }
        if edgesort(&receive_ids, self.server_flow.clone()).is_err() {
            tracing::error!("server flow does not topologically sort");
            return false;
        }
        if !edges_are_saturated(&self.server_flow, &self.server_elements) {
            return false;
        }

        true
    }
}

fn receive_starts(elements: &ElementRegistry) -> Vec<ElementId> {
    elements
        .ids()
        .filter(|id| matches!(elements.get(*id), Element::SystemFilter(f) if f.is_receive()))
        .collect()
}

fn edges_are_saturated(edges: &[Edge<ElementId>], elements: &ElementRegistry) -> bool {
    for edge in edges {
        let source = elements.get(edge.source);
        let sink = elements.get(edge.sink);
        let map = edge.map.as_deref();
        if !source.outputs().check_pipe(sink.inputs(), map) {
            tracing::error!(source = ?edge.source, sink = ?edge.sink, "edge pipe check failed");
            return false;
        }
    }
    true
}

fn run_flow(
    order: &[ElementId],
    edge_order: &[Edge<ElementId>],
    elements: &mut ElementRegistry,
    mut env: Option<&mut Environment>,
) -> PenchyResult<()> {
    for &sink_id in order {
        let incoming: Vec<Edge<ElementId>> = edge_order.iter().filter(|e| e.sink == sink_id).cloned().collect();
        let bundle = build_keys(&incoming, elements);

        let needs_environment = matches!(elements.get(sink_id), Element::SystemFilter(_));
        let sink = elements.get_mut(sink_id);
        if needs_environment {
            sink.run(&bundle, env.as_deref_mut())?;
        } else {
            sink.run(&bundle, None)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::CompositionJvm;
    use crate::dependency::LiteralPathResolver;
    use crate::element::filter::Filter;
    use crate::element::system_filter::SystemFilter;
    use crate::element::workload::{Workload, WorkloadKind};
    use crate::jvm::Jvm;
    use crate::node_setting::NodeSetting;
    use crate::pipeline::Pipeline;

    fn new_composition() -> SystemComposition {
        let jvm = Jvm::new("true", "-cp /fake/cp");
        let node = NodeSetting::new("h1", 22, "u", "/p", "/", "d");
        SystemComposition::new(CompositionJvm::Plain(jvm), node, "demo")
    }

    #[test]
    fn check_fails_without_workload() {
        let composition = new_composition();
        let mut job = Job::new("job.py", 1);
        job.compositions.push(composition);
        job.server_elements
            .insert(Element::SystemFilter(SystemFilter::receive()));
        assert!(!job.check());
    }

    #[test]
    fn check_passes_for_a_well_formed_job() {
        let mut composition = new_composition();
        let workload_id = composition
            .elements
            .insert(Element::Workload(Workload::dacapo(WorkloadKind::Dacapo, "avrora")));
        let send_id = composition
            .elements
            .insert(Element::SystemFilter(SystemFilter::send()));
        composition.jvm.jvm_mut().workload = Some(workload_id);
        composition.flow = Pipeline::new().connect(workload_id, send_id).build();

        let mut job = Job::new("job.py", 1);
        job.compositions.push(composition);

        let receive_id = job
            .server_elements
            .insert(Element::SystemFilter(SystemFilter::receive()));
        job.server_flow = Vec::new();
        let _ = receive_id;
        job.server_elements
            .insert(Element::SystemFilter(SystemFilter::receive()));

        assert!(job.check());
    }

    #[test]
    fn run_server_pipeline_is_noop_without_a_flow() {
        let mut job = Job::new("job.py", 1);
        assert!(job.run_server_pipeline().is_ok());
    }

    #[test]
    fn run_server_pipeline_requires_a_receive_start() {
        let mut job = Job::new("job.py", 1);
        let filter_id = job
            .server_elements
            .insert(Element::Filter(Filter::print_filter()));
        let sink_id = job
            .server_elements
            .insert(Element::Filter(Filter::print_filter()));
        job.server_flow = Pipeline::new().connect(filter_id, sink_id).build();

        let err = job.run_server_pipeline().unwrap_err();
        assert!(matches!(err, PenchyError::InvalidJob { .. }));
    }

    #[test]
    fn run_server_pipeline_publishes_received_results_downstream() {
        let mut job = Job::new("job.py", 1);
        let mut results = HashMap::new();
        results.insert("c1".to_string(), Value::Int(7));
        job.receive = Some(Arc::new(move || results.clone()));

        let receive_id = job
            .server_elements
            .insert(Element::SystemFilter(SystemFilter::receive()));

        job.run_server_pipeline().unwrap();

        match &job.server_elements.get(receive_id).out()["results"][0] {
            Value::Dict(map) => assert_eq!(map.get("c1"), Some(&Value::Int(7))),
            _ => panic!("expected dict"),
        }
    }

    #[test]
    fn resolver_failure_propagates_from_run() {
        let mut composition = new_composition();
        let workload_id = composition
            .elements
            .insert(Element::Workload(Workload::dacapo(WorkloadKind::Dacapo, "avrora")));
        composition.jvm.jvm_mut().workload = Some(workload_id);

        let mut job = Job::new("job.py", 0);
        job.compositions.push(composition);

        let resolver = LiteralPathResolver;
        assert!(job.run(0, &resolver).is_ok());
    }
}
