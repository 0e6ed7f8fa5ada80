// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! `Server`: the control node of §4.8 — RPC endpoint, per-node
//! deployment, the dual-predicate result loop, and dispatch of the
//! server-side pipeline once every node has reported in (or timed
//! out).
//!
//! Grounded on `penchy/server.py`'s `Server`: one node per distinct
//! `NodeSetting` identifier, a single lock serializing mutation of the
//! results table and each node's `expected` list (`_rcv_lock` there,
//! `state: Mutex<ServerState>` here), and `run`'s
//! `while not received_all_results and not nodes_timed_out:
//! handle_request()` loop, replaced by an async poll at
//! `config.poll_interval()` since this crate's RPC surface is Axum
//! rather than a blocking `SimpleXMLRPCServer`.
//!
//! Unlike the original (whose `exp_start_timeout`/`exp_stop_timeout`
//! are `# TODO: Implement me!` stubs), this crate actually enforces
//! composition timeouts per §5/§7: `start_timeout` spawns a deadline
//! task that, if not cancelled by a matching `stop_timeout` first,
//! kills only that composition and marks its node timed out.

use crate::composition::SystemComposition;
use crate::config::ServerConfig;
use crate::error::{PenchyError, PenchyResult};
use crate::job::Job;
use crate::node::Node;
use crate::node_setting::NodeSetting;
use crate::remote_shell::{RemoteShell, Ssh2RemoteShell};
use crate::value::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

struct ServerState {
    job: Job,
    nodes: HashMap<String, Node>,
    results: HashMap<String, Value>,
    timed_out_nodes: HashSet<String>,
    timeout_tasks: HashMap<String, JoinHandle<()>>,
}

pub struct Server {
    config: ServerConfig,
    state: Mutex<ServerState>,
}

impl Server {
    /// Build one [`Node`] per distinct `NodeSetting` host referenced by
    /// `job`'s compositions, each tracking the composition hashes
    /// assigned to it, connected over SSH.
    pub async fn new(config: ServerConfig, job: Job) -> PenchyResult<Arc<Self>> {
        Self::new_with_shell(config, job, |setting| {
            Box::new(Ssh2RemoteShell::new(
                setting.host.clone(),
                setting.ssh_port,
                setting.username.clone(),
                setting.password.clone(),
                setting.keyfile.clone(),
            ))
        })
        .await
    }

    /// As [`Server::new`], but with the remote shell implementation
    /// injected — used by tests and single-host demos to swap in
    /// [`crate::remote_shell::LocalRemoteShell`].
    pub async fn new_with_shell(
        config: ServerConfig,
        job: Job,
        shell_for: impl Fn(&NodeSetting) -> Box<dyn RemoteShell>,
    ) -> PenchyResult<Arc<Self>> {
        let mut nodes: HashMap<String, Node> = HashMap::new();
        for composition in &job.compositions {
            let setting = &composition.node_setting;
            let node = nodes.entry(setting.host.clone()).or_insert_with(|| {
                Node::new(setting.host.clone(), setting.host.clone(), setting.path.clone(), shell_for(setting))
            });
            node.expected.push(composition.hash());
        }

        Ok(Arc::new(Self {
            config,
            state: Mutex::new(ServerState {
                job,
                nodes,
                results: HashMap::new(),
                timed_out_nodes: HashSet::new(),
                timeout_tasks: HashMap::new(),
            }),
        }))
    }

    /// Deploy to every node: upload the job source, the bootstrap
    /// script, and the config file, then invoke the bootstrap with
    /// `<job-basename> config.py <node-identifier>` (§4.8 Launch,
    /// §6). Performed sequentially across nodes, per §5's stated
    /// tradeoff of simple error handling over parallel deployment.
    pub async fn launch(self: &Arc<Self>, job_source: &Path, bootstrap_script: &Path, config_file: &Path) -> PenchyResult<()> {
        let job_basename = job_source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| job_source.to_string_lossy().to_string());

        let identifiers: Vec<String> = {
            let state = self.state.lock().await;
            state.nodes.keys().cloned().collect()
        };

        for identifier in identifiers {
            if let Err(e) = self.deploy_one(&identifier, job_source, bootstrap_script, config_file, &job_basename).await {
                tracing::error!(node = %identifier, error = %e, "deployment failed");
            }
        }

        Ok(())
    }

    async fn deploy_one(
        self: &Arc<Self>,
        identifier: &str,
        job_source: &Path,
        bootstrap_script: &Path,
        config_file: &Path,
        job_basename: &str,
    ) -> PenchyResult<()> {
        let mut state = self.state.lock().await;
        let node = state.nodes.get_mut(identifier).ok_or_else(|| PenchyError::InvalidJob {
            reason: format!("unknown node {identifier}"),
        })?;

        node.connect().await?;
        node.put(job_source, job_basename).await?;
        node.put(bootstrap_script, "penchy_bootstrap").await?;
        node.put(config_file, "config.py").await?;

        for extra in &self.config.uploads {
            let path = Path::new(extra);
            if let Some(name) = path.file_name() {
                node.put(path, &name.to_string_lossy()).await?;
            }
        }

        let path = node.path.clone();
        let command = format!("cd {path} && ./penchy_bootstrap {job_basename} config.py {identifier}");
        node.exec(&command).await?;
        node.disconnect().await?;
        Ok(())
    }

    fn composition_for<'a>(job: &'a Job, hash: &str) -> PenchyResult<&'a SystemComposition> {
        job.compositions
            .iter()
            .find(|c| c.hash() == hash)
            .ok_or_else(|| PenchyError::UnknownComposition { hash: hash.to_string() })
    }

    /// §4.8 `rcv_data`: record the result and mark the owning node as
    /// having heard back about this composition.
    pub async fn rcv_data(&self, hash: String, result: Value) -> PenchyResult<()> {
        let mut state = self.state.lock().await;
        let host = Self::composition_for(&state.job, &hash)?.node_setting.host.clone();
        if let Some(node) = state.nodes.get_mut(&host) {
            node.received(&hash);
        }
        state.results.insert(hash.clone(), result);
        if let Some(task) = state.timeout_tasks.remove(&hash) {
            task.abort();
        }
        Ok(())
    }

    /// §4.8 `node_error`: same bookkeeping as `rcv_data`, but no result
    /// is stored — downstream sinks must tolerate the missing key
    /// (§9 Partial failure).
    pub async fn node_error(&self, hash: String, reason: Option<String>) -> PenchyResult<()> {
        let mut state = self.state.lock().await;
        let host = Self::composition_for(&state.job, &hash)?.node_setting.host.clone();
        tracing::warn!(%hash, ?reason, "node reported a composition error");
        if let Some(node) = state.nodes.get_mut(&host) {
            node.received(&hash);
        }
        if let Some(task) = state.timeout_tasks.remove(&hash) {
            task.abort();
        }
        Ok(())
    }

    /// §4.8/§5: arm a deadline for `hash`. If `stop_timeout` doesn't
    /// cancel it first, the deadline fires `kill_composition` on the
    /// owning node only, and marks that node timed out.
    ///
    /// The spawn and the `timeout_tasks` insert happen under one
    /// continuous lock hold so `fire_timeout`/`stop_timeout` — which
    /// both take the same lock before touching `timeout_tasks` — can
    /// never observe the handle as "not yet registered" and run past a
    /// deadline that should have been cancellable.
    pub async fn start_timeout(self: &Arc<Self>, hash: String) -> PenchyResult<()> {
        let mut state = self.state.lock().await;
        let composition = Self::composition_for(&state.job, &hash)?;
        let host = composition.node_setting.host.clone();
        let timeout = composition.timeout();

        let server = self.clone();
        let hash_for_task = hash.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(timeout.max(0.0))).await;
            server.fire_timeout(hash_for_task, host).await;
        });

        state.timeout_tasks.insert(hash, handle);
        Ok(())
    }

    /// §4.8: cancel a deadline previously armed by `start_timeout`.
    pub async fn stop_timeout(&self, hash: String) -> PenchyResult<()> {
        let mut state = self.state.lock().await;
        if let Some(task) = state.timeout_tasks.remove(&hash) {
            task.abort();
        }
        Ok(())
    }

    async fn fire_timeout(&self, hash: String, host: String) {
        let mut state = self.state.lock().await;
        state.timeout_tasks.remove(&hash);
        state.timed_out_nodes.insert(host.clone());

        if let Some(node) = state.nodes.get_mut(&host) {
            tracing::error!(%hash, %host, "composition timed out, killing it");
            if let Err(e) = node.kill_composition().await {
                tracing::error!(%hash, error = %e, "failed to kill timed-out composition");
            }
            node.received(&hash);
        }
    }

    /// §8: true exactly when every node's `expected` list is empty.
    pub async fn received_all_results(&self) -> bool {
        let state = self.state.lock().await;
        state.nodes.values().all(Node::received_all_results)
    }

    /// §5: true once every node has had at least one composition time
    /// out (the server loop's terminal failure condition).
    pub async fn all_nodes_timed_out(&self) -> bool {
        let state = self.state.lock().await;
        !state.nodes.is_empty() && state.nodes.keys().all(|id| state.timed_out_nodes.contains(id))
    }

    /// §4.8 result loop: poll until every node has reported in or every
    /// node has timed out, then close every node and — unless all
    /// timed out — run the server-side pipeline over the collected
    /// results.
    pub async fn run(self: &Arc<Self>, log_dir: &Path) -> PenchyResult<()> {
        loop {
            if self.received_all_results().await || self.all_nodes_timed_out().await {
                break;
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }

        self.shutdown(log_dir).await;

        if self.all_nodes_timed_out().await {
            return Err(PenchyError::AllNodesTimedOut);
        }

        let mut state = self.state.lock().await;
        let results = state.results.clone();
        state.job.receive = Some(Arc::new(move || {
            results.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        }));
        state.job.run_server_pipeline()
    }

    /// Close every node (killing any with results still outstanding),
    /// fetching its logs into `log_dir`. Idempotent per `Node::close`.
    pub async fn shutdown(&self, log_dir: &Path) {
        let mut state = self.state.lock().await;
        for (identifier, node) in state.nodes.iter_mut() {
            if let Err(e) = node.close(log_dir).await {
                tracing::error!(node = %identifier, error = %e, "failed to close node cleanly");
            }
        }
    }
}

pub fn default_log_dir() -> PathBuf {
    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::CompositionJvm;
    use crate::element::system_filter::SystemFilter;
    use crate::element::{workload::WorkloadKind, Element, Workload};
    use crate::jvm::Jvm;
    use crate::remote_shell::LocalRemoteShell;

    fn composition(host: &str, benchmark: &str) -> SystemComposition {
        let jvm = Jvm::new("java", "-cp /fake");
        let node = NodeSetting::new(host, 22, "u", "/p", "/", "d");
        let mut composition = SystemComposition::new(CompositionJvm::Plain(jvm), node, benchmark);
        let workload_id = composition
            .elements
            .insert(Element::Workload(Workload::dacapo(WorkloadKind::Dacapo, benchmark)));
        composition.jvm.jvm_mut().workload = Some(workload_id);
        composition
    }

    async fn two_node_job() -> (Arc<Server>, String, String) {
        let mut job = Job::new("job.py", 1);
        job.compositions.push(composition("h1", "avrora"));
        job.compositions.push(composition("h2", "h2"));
        let hash1 = job.compositions[0].hash();
        let hash2 = job.compositions[1].hash();

        job.server_elements.insert(Element::SystemFilter(SystemFilter::receive()));

        let server = Server::new_with_shell(ServerConfig::default(), job, |_| Box::new(LocalRemoteShell::default()))
            .await
            .unwrap();
        (server, hash1, hash2)
    }

    #[tokio::test]
    async fn received_all_results_flips_once_every_node_reports() {
        let (server, hash1, hash2) = two_node_job().await;
        assert!(!server.received_all_results().await);

        server.rcv_data(hash1, Value::Int(1)).await.unwrap();
        assert!(!server.received_all_results().await);

        server.rcv_data(hash2, Value::Int(2)).await.unwrap();
        assert!(server.received_all_results().await);
    }

    #[tokio::test]
    async fn node_error_counts_as_received_without_storing_a_result() {
        let (server, hash1, hash2) = two_node_job().await;
        server.node_error(hash1, Some("boom".to_string())).await.unwrap();
        server.rcv_data(hash2, Value::Int(2)).await.unwrap();
        assert!(server.received_all_results().await);
    }

    #[tokio::test]
    async fn unknown_hash_is_rejected() {
        let (server, _hash1, _hash2) = two_node_job().await;
        let err = server.rcv_data("unknown".to_string(), Value::Int(1)).await.unwrap_err();
        assert!(matches!(err, PenchyError::UnknownComposition { .. }));
    }

    #[tokio::test]
    async fn run_server_pipeline_sees_collected_results_end_to_end() {
        let (server, hash1, hash2) = two_node_job().await;
        server.rcv_data(hash1.clone(), Value::Int(10)).await.unwrap();
        server.rcv_data(hash2.clone(), Value::Int(20)).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        server.run(dir.path()).await.unwrap();

        let state = server.state.lock().await;
        let receive_id = state
            .job
            .server_elements
            .ids()
            .find(|id| matches!(state.job.server_elements.get(*id), Element::SystemFilter(f) if f.is_receive()))
            .unwrap();
        match &state.job.server_elements.get(receive_id).out()["results"][0] {
            Value::Dict(map) => {
                assert_eq!(map.get(&hash1), Some(&Value::Int(10)));
                assert_eq!(map.get(&hash2), Some(&Value::Int(20)));
            }
            _ => panic!("expected dict"),
        }
    }

    #[tokio::test]
    async fn start_timeout_kills_only_the_timed_out_composition() {
        let mut job = Job::new("job.py", 1);
        let mut c1 = composition("h1", "avrora");
        c1.jvm.jvm_mut().timeout = 0;
        let c2 = composition("h2", "h2");
        job.compositions.push(c1);
        job.compositions.push(c2);
        let hash1 = job.compositions[0].hash();
        let hash2 = job.compositions[1].hash();
        job.server_elements.insert(Element::SystemFilter(SystemFilter::receive()));

        let server = Server::new_with_shell(ServerConfig::default(), job, |_| Box::new(LocalRemoteShell::default()))
            .await
            .unwrap();

        server.start_timeout(hash1.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(server.all_nodes_timed_out().await == false);
        server.rcv_data(hash2, Value::Int(1)).await.unwrap();
        assert!(server.received_all_results().await);
    }
}
