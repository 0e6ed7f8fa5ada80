// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! `WrappedJvm`: a JVM wrapped by another program (Valgrind being the
//! original's worked example), which is simultaneously a JVM and a
//! pipeline element — its `outputs` advertise the wrapper's own
//! artifacts and a posthook records their path into `out`.
//!
//! Grounded on `penchy/jobs/jvms.py`'s `ValgrindJVM`: prefixes
//! `[valgrind, --log-file=..., --trace-children=yes, *valgrind
//! options]` onto the plain JVM's own command line.

use super::PipelineElement;
use crate::element::ElementRegistry;
use crate::environment::Environment;
use crate::error::PenchyResult;
use crate::jvm::Jvm;
use crate::typespec::{TypeDescription, TypeSpec};
use crate::value::{Value, ValueType};
use std::collections::HashMap;

#[derive(Debug)]
pub struct WrappedJvm {
    pub jvm: Jvm,
    wrapper_path: String,
    wrapper_options: String,
    log_name: String,
    outputs: TypeSpec,
    out: HashMap<String, Vec<Value>>,
}

impl WrappedJvm {
    pub fn valgrind(
        path: impl Into<String>,
        options: impl Into<String>,
        valgrind_path: impl Into<String>,
        valgrind_options: impl Into<String>,
    ) -> Self {
        let outputs = TypeSpec::new(vec![TypeDescription::new(
            "valgrind_log",
            vec![ValueType::List, ValueType::Str],
        )]);
        let mut out = HashMap::new();
        out.insert("valgrind_log".to_string(), Vec::new());

        Self {
            jvm: Jvm::new(path, options),
            wrapper_path: valgrind_path.into(),
            wrapper_options: valgrind_options.into(),
            log_name: "penchy-valgrind.log".to_string(),
            outputs,
            out,
        }
    }

    /// The full command line: wrapper prefix followed by the wrapped
    /// JVM's own command line.
    pub fn cmdline(&self, registry: &ElementRegistry) -> Vec<String> {
        let mut cmd = vec![
            self.wrapper_path.clone(),
            format!("--log-file={}", self.log_name),
            "--trace-children=yes".to_string(),
        ];
        cmd.extend(shell_words::split(&self.wrapper_options).unwrap_or_default());
        cmd.extend(self.jvm.cmdline(registry));
        cmd
    }

    /// Run the wrapped JVM and record the wrapper's log path, the way
    /// the original's posthook does.
    pub fn run(&mut self, registry: &mut ElementRegistry, cwd: &std::path::Path) -> PenchyResult<()> {
        let cmdline = self.cmdline(registry);
        self.jvm.run_with_cmdline(registry, cwd, cmdline)?;

        let log_path = cwd.join(&self.log_name);
        self.out
            .entry("valgrind_log".to_string())
            .or_default()
            .push(Value::Str(log_path.to_string_lossy().to_string()));
        Ok(())
    }
}

impl PipelineElement for WrappedJvm {
    fn inputs(&self) -> &TypeSpec {
        static UNCHECKED: std::sync::OnceLock<TypeSpec> = std::sync::OnceLock::new();
        UNCHECKED.get_or_init(TypeSpec::unchecked)
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
        format!("WrappedJvm({}, {})", self.jvm.path(), self.wrapper_path)
    }

    fn run(&mut self, _kwargs: &HashMap<String, Value>, _env: Option<&mut Environment>) -> PenchyResult<()> {
        Err(crate::error::PenchyError::InvalidJob {
            reason: "WrappedJvm is driven by Jvm::run, not the flow's run(**bundle)".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmdline_prefixes_wrapper_command() {
        let wrapped = WrappedJvm::valgrind("java", "-Xmx1G", "valgrind", "--leak-check=full");
        let registry = ElementRegistry::new();
        let cmd = wrapped.cmdline(&registry);
        assert_eq!(cmd[0], "valgrind");
        assert!(cmd[1].starts_with("--log-file="));
        assert_eq!(cmd[2], "--trace-children=yes");
        assert_eq!(cmd[3], "--leak-check=full");
        assert!(cmd.contains(&"java".to_string()) || cmd.iter().any(|s| s.ends_with("java")));
    }
}
