// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! The JVM a composition runs: executable path, options, classpath,
//! optional tool and workload, pre/post hooks, and execution.
//!
//! Grounded on `penchy/jobs/jvms.py`'s `JVM`: `_extract_classpath`
//! scans right to left so the last `-cp`/`-classpath` wins,
//! `cmdline` assembles `[exe] ++ options ++ tool.arguments ++
//! [-classpath, joined] ++ workload.arguments`, and `run()` spawns the
//! child with stdout/stderr captured to two temp files that are kept
//! (not deleted) because their paths are data.

use crate::edge::ElementId;
use crate::element::{Element, ElementRegistry, PipelineElement};
use crate::error::{PenchyError, PenchyResult};
use crate::value::Value;
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// A prehook/posthook attached directly to the JVM (as distinct from
/// its tool's or workload's own hooks, which `Jvm::hooks` chains in
/// after these).
pub type JvmHook = Box<dyn FnMut() + Send>;

pub struct Jvm {
    pub basepath: PathBuf,
    path: String,
    user_options: String,
    options: Vec<String>,
    classpath: Vec<String>,
    pub timeout: u32,
    pub workload: Option<ElementId>,
    pub tool: Option<ElementId>,
    pub prehooks: Vec<JvmHook>,
    pub posthooks: Vec<JvmHook>,
}

impl std::fmt::Debug for Jvm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jvm")
            .field("path", &self.path)
            .field("user_options", &self.user_options)
            .field("classpath", &self.classpath)
            .field("workload", &self.workload)
            .field("tool", &self.tool)
            .finish()
    }
}

impl Jvm {
    pub fn new(path: impl Into<String>, options: impl Into<String>) -> Self {
        let user_options = options.into();
        let options = shell_words::split(&user_options).unwrap_or_default();
        let classpath = extract_classpath(&options);

        Self {
            basepath: PathBuf::from("/"),
            path: path.into(),
            user_options,
            options,
            classpath,
            timeout: 0,
            workload: None,
            tool: None,
            prehooks: Vec::new(),
            posthooks: Vec::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn user_options(&self) -> &str {
        &self.user_options
    }

    pub fn classpath(&self) -> &[String] {
        &self.classpath
    }

    /// Append a resolved classpath (as returned by the external
    /// dependency resolver) to this JVM's classpath.
    pub fn add_to_cp(&mut self, path: &str) {
        self.classpath
            .extend(path.split(':').map(str::to_string).filter(|s| !s.is_empty()));
    }

    /// The command line suitable for spawning, given the registry that
    /// holds this JVM's workload/tool elements.
    pub fn cmdline(&self, registry: &ElementRegistry) -> Vec<String> {
        let executable = self.basepath.join(&self.path).to_string_lossy().to_string();

        let mut cmd = vec![executable];
        cmd.extend(self.options.clone());

        if let Some(tool_id) = self.tool {
            if let Element::Tool(tool) = registry.get(tool_id) {
                cmd.extend(tool.arguments().iter().cloned());
            }
        }

        if !self.classpath.is_empty() {
            cmd.push("-classpath".to_string());
            cmd.push(self.classpath.join(":"));
        }

        if let Some(workload_id) = self.workload {
            if let Element::Workload(workload) = registry.get(workload_id) {
                cmd.extend(workload.arguments());
            }
        }

        cmd
    }

    /// Run the JVM in the current configuration inside `cwd`,
    /// appending `exit_code`/`stdout`/`stderr` to the workload's `out`.
    pub fn run(&mut self, registry: &mut ElementRegistry, cwd: &Path) -> PenchyResult<()> {
        let cmdline = self.cmdline(registry);
        self.run_with_cmdline(registry, cwd, cmdline)
    }

    /// Run with an explicit command line, overridden by
    /// `WrappedJvm::cmdline` to prefix a wrapper executable while
    /// still going through the same hook/capture/bookkeeping
    /// discipline as a plain JVM run.
    pub fn run_with_cmdline(
        &mut self,
        registry: &mut ElementRegistry,
        cwd: &Path,
        cmdline: Vec<String>,
    ) -> PenchyResult<()> {
        if self.classpath.is_empty() {
            return Err(PenchyError::JvmNotConfigured {
                reason: "no classpath configured".to_string(),
            });
        }
        let workload_id = self.workload.ok_or_else(|| PenchyError::JvmNotConfigured {
            reason: "no workload configured".to_string(),
        })?;

        tracing::debug!("executing prehooks");
        for hook in &mut self.prehooks {
            hook();
        }
        run_hooks_of(registry, self.tool, true);
        run_hooks_of(registry, Some(workload_id), true);

        tracing::debug!(?cmdline, "executing jvm");

        let stdout_path = cwd.join(format!("penchy-stdout-{}", unique_suffix()));
        let stderr_path = cwd.join(format!("penchy-stderr-{}", unique_suffix()));
        let stdout_file = std::fs::File::create(&stdout_path)?;
        let stderr_file = std::fs::File::create(&stderr_path)?;

        let status = std::process::Command::new(&cmdline[0])
            .args(&cmdline[1..])
            .current_dir(cwd)
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::from(stderr_file))
            .status()?;

        let exit_code = status.code().unwrap_or(-1);

        if let Element::Workload(workload) = registry.get_mut(workload_id) {
            workload.out_mut().entry("exit_code".to_string()).or_default().push(Value::Int(exit_code as i64));
            workload
                .out_mut()
                .entry("stdout".to_string())
                .or_default()
                .push(Value::Str(stdout_path.to_string_lossy().to_string()));
            workload
                .out_mut()
                .entry("stderr".to_string())
                .or_default()
                .push(Value::Str(stderr_path.to_string_lossy().to_string()));
        }

        if exit_code != 0 {
            let stderr = std::fs::read_to_string(&stderr_path).unwrap_or_default();
            tracing::error!(%exit_code, %stderr, "jvm execution failed");
            return Err(PenchyError::JvmExecution { exit_code, stderr });
        }

        tracing::debug!("executing posthooks");
        for hook in &mut self.posthooks {
            hook();
        }
        run_hooks_of(registry, self.tool, false);
        run_hooks_of(registry, Some(workload_id), false);

        Ok(())
    }

    /// Equality beyond the identity hash: same path, same
    /// user-supplied option string, and workload/tool presence
    /// matches — kept distinct from `hash()`, which is the
    /// content-addressed wire identifier (§9 Open Question; see
    /// `DESIGN.md`).
    pub fn configuration_eq(&self, other: &Jvm) -> bool {
        self.path == other.path
            && self.user_options == other.user_options
            && self.workload.is_some() == other.workload.is_some()
            && self.tool.is_some() == other.tool.is_some()
    }

    /// SHA-1 hexdigest of `(path, user_options)`, per §3/§6.
    pub fn hash(&self) -> String {
        let mut hasher = Sha1::new();
        hasher.update(self.path.as_bytes());
        hasher.update(self.user_options.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Delegates to [`Jvm::configuration_eq`] — equality by configuration,
/// not by content hash, mirroring the original's `__eq__` being a
/// separate notion from the hash it also defines for dict/set use.
impl PartialEq for Jvm {
    fn eq(&self, other: &Self) -> bool {
        self.configuration_eq(other)
    }
}

fn run_hooks_of(registry: &mut ElementRegistry, id: Option<ElementId>, pre: bool) {
    let Some(id) = id else { return };
    match registry.get_mut(id) {
        Element::Tool(tool) => {
            let hooks = if pre { &mut tool.prehooks } else { &mut tool.posthooks };
            for hook in hooks {
                hook();
            }
        }
        Element::Workload(workload) => {
            let hooks = if pre {
                &mut workload.prehooks
            } else {
                &mut workload.posthooks
            };
            for hook in hooks {
                hook();
            }
        }
        _ => {}
    }
}

fn unique_suffix() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!("{}-{}", std::process::id(), COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Scan `options` right to left; the first `-cp`/`-classpath` found
/// yields the next token as the classpath, so a later specification
/// in the original option order overrides an earlier one.
pub fn extract_classpath(options: &[String]) -> Vec<String> {
    let mut classpath = String::new();
    let mut prev = String::new();

    for token in options.iter().rev() {
        if token == "-cp" || token == "-classpath" {
            classpath = prev;
            break;
        }
        prev = token.clone();
    }

    if classpath.is_empty() {
        Vec::new()
    } else {
        classpath.split(':').map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_last_classpath_spec() {
        let options: Vec<String> = ["-Xmx1G", "-cp", "a:b", "-classpath", "c:d"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(extract_classpath(&options), vec!["c", "d"]);
    }

    #[test]
    fn no_classpath_option_yields_empty() {
        let options: Vec<String> = ["-Xmx1G"].iter().map(|s| s.to_string()).collect();
        assert!(extract_classpath(&options).is_empty());
    }

    #[test]
    fn hash_is_stable_and_sensitive_to_options() {
        let a = Jvm::new("java", "-Xmx1G");
        let b = Jvm::new("java", "-Xmx1G");
        let c = Jvm::new("java", "-Xmx2G");
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn add_to_cp_appends() {
        let mut jvm = Jvm::new("java", "-cp a");
        jvm.add_to_cp("b");
        assert_eq!(jvm.classpath(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn equality_is_configuration_not_hash_identity() {
        let a = Jvm::new("java", "-Xmx1G");
        let b = Jvm::new("java", "-Xmx1G");
        assert_eq!(a, b);

        let c = Jvm::new("java", "-Xmx2G");
        assert_ne!(a, c);
    }

    #[test]
    fn not_configured_without_classpath_or_workload() {
        let mut jvm = Jvm::new("java", "");
        let mut registry = ElementRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let err = jvm.run(&mut registry, dir.path()).unwrap_err();
        assert!(matches!(err, PenchyError::JvmNotConfigured { .. }));
    }
}
