// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! The opaque "remote shell" collaborator §1 scopes SSH transport
//! behind: `connect`/`put`/`exec`/`disconnect`. [`Ssh2RemoteShell`] is
//! the real implementation over `ssh2`; [`LocalRemoteShell`] runs
//! commands on the controller's own machine for single-host setups and
//! tests.
//!
//! Grounded on the teacher's `Executor` trait shape
//! (`executors/mod.rs`): one `#[async_trait]` trait rather than
//! hand-rolled dynamic dispatch, implementations selected by what's
//! configured rather than by inheritance.

use crate::error::{PenchyError, PenchyResult};
use async_trait::async_trait;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait RemoteShell: Send + Sync {
    async fn connect(&mut self) -> PenchyResult<()>;
    async fn disconnect(&mut self) -> PenchyResult<()>;
    async fn put(&mut self, local: &Path, remote: &str) -> PenchyResult<()>;
    async fn exec(&mut self, command: &str) -> PenchyResult<(String, String)>;
    fn is_connected(&self) -> bool;
}

pub struct Ssh2RemoteShell {
    host: String,
    port: u16,
    username: String,
    password: Option<String>,
    keyfile: Option<String>,
    session: Option<Arc<Mutex<ssh2::Session>>>,
}

impl Ssh2RemoteShell {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: Option<String>,
        keyfile: Option<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password,
            keyfile,
            session: None,
        }
    }
}

#[async_trait]
impl RemoteShell for Ssh2RemoteShell {
    async fn connect(&mut self) -> PenchyResult<()> {
        let host = self.host.clone();
        let port = self.port;
        let username = self.username.clone();
        let password = self.password.clone();
        let keyfile = self.keyfile.clone();

        let session = tokio::task::spawn_blocking(move || -> PenchyResult<ssh2::Session> {
            let tcp = std::net::TcpStream::connect((host.as_str(), port))?;
            let mut session = ssh2::Session::new().map_err(|e| PenchyError::Ssh(e.to_string()))?;
            session.set_tcp_stream(tcp);
            session.handshake().map_err(|e| PenchyError::Ssh(e.to_string()))?;

            match (&keyfile, &password) {
                (Some(keyfile), _) => {
                    session.userauth_pubkey_file(&username, None, Path::new(keyfile), None)?;
                }
                (None, Some(password)) => {
                    session.userauth_password(&username, password)?;
                }
                (None, None) => {
                    session.userauth_agent(&username)?;
                }
            }

            if !session.authenticated() {
                return Err(PenchyError::Unauthenticated { host: host.clone() });
            }
            Ok(session)
        })
        .await
        .map_err(|e| PenchyError::Ssh(e.to_string()))??;

        self.session = Some(Arc::new(Mutex::new(session)));
        Ok(())
    }

    async fn disconnect(&mut self) -> PenchyResult<()> {
        self.session = None;
        Ok(())
    }

    async fn put(&mut self, local: &Path, remote: &str) -> PenchyResult<()> {
        let session = self
            .session
            .clone()
            .ok_or_else(|| PenchyError::Ssh("not connected".to_string()))?;
        let local = local.to_path_buf();
        let remote = remote.to_string();

        tokio::task::spawn_blocking(move || -> PenchyResult<()> {
            let contents = std::fs::read(&local)?;
            let session = session.lock().unwrap();
            let mut remote_file = session.scp_send(Path::new(&remote), 0o644, contents.len() as u64, None)?;
            std::io::Write::write_all(&mut remote_file, &contents)?;
            Ok(())
        })
        .await
        .map_err(|e| PenchyError::Ssh(e.to_string()))?
    }

    async fn exec(&mut self, command: &str) -> PenchyResult<(String, String)> {
        let session = self
            .session
            .clone()
            .ok_or_else(|| PenchyError::Ssh("not connected".to_string()))?;
        let command = command.to_string();

        tokio::task::spawn_blocking(move || -> PenchyResult<(String, String)> {
            let session = session.lock().unwrap();
            let mut channel = session.channel_session()?;
            channel.exec(&command)?;

            let mut stdout = String::new();
            channel.read_to_string(&mut stdout)?;
            let mut stderr = String::new();
            channel.stderr().read_to_string(&mut stderr)?;
            channel.wait_close()?;
            Ok((stdout, stderr))
        })
        .await
        .map_err(|e| PenchyError::Ssh(e.to_string()))?
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }
}

/// Runs commands locally rather than over SSH — a single-host
/// deployment, or a test double that doesn't need a live SSH server.
#[derive(Default)]
pub struct LocalRemoteShell {
    connected: bool,
}

#[async_trait]
impl RemoteShell for LocalRemoteShell {
    async fn connect(&mut self) -> PenchyResult<()> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> PenchyResult<()> {
        self.connected = false;
        Ok(())
    }

    async fn put(&mut self, local: &Path, remote: &str) -> PenchyResult<()> {
        if let Some(parent) = Path::new(remote).parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(local, remote)?;
        Ok(())
    }

    async fn exec(&mut self, command: &str) -> PenchyResult<(String, String)> {
        let output = tokio::process::Command::new("sh").arg("-c").arg(command).output().await?;
        Ok((
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
        ))
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_shell_executes_commands() {
        let mut shell = LocalRemoteShell::default();
        shell.connect().await.unwrap();
        let (stdout, _) = shell.exec("echo hello").await.unwrap();
        assert_eq!(stdout.trim(), "hello");
        shell.disconnect().await.unwrap();
        assert!(!shell.is_connected());
    }

    #[tokio::test]
    async fn local_shell_puts_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("source.txt");
        std::fs::write(&local, b"payload").unwrap();
        let remote = dir.path().join("dest.txt");

        let mut shell = LocalRemoteShell::default();
        shell.put(&local, remote.to_str().unwrap()).await.unwrap();
        assert_eq!(std::fs::read(&remote).unwrap(), b"payload");
    }
}
