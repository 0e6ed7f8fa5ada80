// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! `Node`: the controller for one remote worker host (§4.7).
//!
//! Grounded on the system overview's description of the Node
//! component. Holds `expected`, the compositions still awaiting a
//! result on this host; `received_all_results` flips true once that
//! list empties. `connection_required` models the original's "connect
//! if not already connected, then restore prior state" context manager
//! as an RAII guard returned by `Node::connection()`.

use crate::error::{PenchyError, PenchyResult};
use crate::remote_shell::RemoteShell;
use std::path::{Path, PathBuf};

/// Log files the bootstrap contract (§6) guarantees will exist once a
/// client has started.
const CLIENT_LOG_FILES: &[&str] = &["penchy_bootstrap.log", "penchy.log"];

pub struct Node {
    pub identifier: String,
    pub host: String,
    pub path: String,
    shell: Box<dyn RemoteShell>,
    pub expected: Vec<String>,
    closed: bool,
}

impl Node {
    pub fn new(identifier: impl Into<String>, host: impl Into<String>, path: impl Into<String>, shell: Box<dyn RemoteShell>) -> Self {
        Self {
            identifier: identifier.into(),
            host: host.into(),
            path: path.into(),
            shell,
            expected: Vec::new(),
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn received_all_results(&self) -> bool {
        self.expected.is_empty()
    }

    /// Remove `hash` from `expected` — the node has heard back about
    /// that composition, successfully or not.
    pub fn received(&mut self, hash: &str) {
        self.expected.retain(|h| h != hash);
    }

    pub async fn connect(&mut self) -> PenchyResult<()> {
        match self.shell.connect().await {
            Ok(()) => Ok(()),
            Err(PenchyError::Unauthenticated { host }) => {
                self.expected.clear();
                self.closed = true;
                Err(PenchyError::Unauthenticated { host })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn disconnect(&mut self) -> PenchyResult<()> {
        self.shell.disconnect().await
    }

    /// Connects first if not already connected, runs `action`, then
    /// disconnects again only if this call was the one that connected
    /// — mirroring the original's `connection_required` context
    /// manager: a transient connect/disconnect pair around an action
    /// that isn't already inside one.
    async fn connection_required(&mut self) -> PenchyResult<bool> {
        let already_connected = self.shell.is_connected();
        if !already_connected {
            self.connect().await?;
        }
        Ok(already_connected)
    }

    pub async fn put(&mut self, local: &Path, remote: &str) -> PenchyResult<()> {
        let already_connected = self.connection_required().await?;
        let result = self.shell.put(local, remote).await;
        if !already_connected {
            self.disconnect().await?;
        }
        result
    }

    pub async fn exec(&mut self, command: &str) -> PenchyResult<(String, String)> {
        let already_connected = self.connection_required().await?;
        let result = self.shell.exec(command).await;
        if !already_connected {
            self.disconnect().await?;
        }
        result
    }

    /// Fetch the bootstrap/client logs into `dest_dir`, prefixed with
    /// this node's identifier so a server aggregating several nodes'
    /// logs doesn't clobber files of the same name.
    pub async fn get_logs(&mut self, dest_dir: &Path) -> PenchyResult<Vec<PathBuf>> {
        let mut fetched = Vec::new();
        for name in CLIENT_LOG_FILES {
            let remote_path = format!("{}/{}", self.path, name);
            let (contents, _) = self.exec(&format!("cat {remote_path}")).await?;
            let local_path = dest_dir.join(format!("{}-{}", self.identifier, name));
            std::fs::write(&local_path, contents)?;
            fetched.push(local_path);
        }
        Ok(fetched)
    }

    /// Send `TERM` to the process group named by `<path>/penchy.pid`,
    /// stopping the whole client.
    pub async fn kill(&mut self) -> PenchyResult<()> {
        let pidfile = format!("{}/penchy.pid", self.path);
        self.exec(&format!("kill -TERM -$(cat {pidfile})")).await?;
        Ok(())
    }

    /// Send `HUP` to the same pid, stopping only the current
    /// composition while leaving the rest of the client running.
    pub async fn kill_composition(&mut self) -> PenchyResult<()> {
        let pidfile = format!("{}/penchy.pid", self.path);
        self.exec(&format!("kill -HUP $(cat {pidfile})")).await?;
        Ok(())
    }

    /// Idempotent teardown: kill if results are still outstanding, then
    /// fetch logs, then mark closed.
    pub async fn close(&mut self, log_dir: &Path) -> PenchyResult<()> {
        if self.closed {
            return Ok(());
        }
        if !self.received_all_results() {
            self.kill().await?;
        }
        self.get_logs(log_dir).await?;
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote_shell::LocalRemoteShell;

    fn node() -> Node {
        Node::new("node-1", "h1", "/tmp/penchy-node", Box::new(LocalRemoteShell::default()))
    }

    #[test]
    fn received_all_results_once_expected_drains() {
        let mut n = node();
        n.expected = vec!["c1".to_string(), "c2".to_string()];
        assert!(!n.received_all_results());
        n.received("c1");
        assert!(!n.received_all_results());
        n.received("c2");
        assert!(n.received_all_results());
    }

    #[tokio::test]
    async fn exec_connects_transiently_when_not_already_connected() {
        let mut n = node();
        let (stdout, _) = n.exec("echo hi").await.unwrap();
        assert_eq!(stdout.trim(), "hi");
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut n = node();
        n.close(dir.path()).await.unwrap();
        assert!(n.is_closed());
        n.close(dir.path()).await.unwrap();
        assert!(n.is_closed());
    }
}
