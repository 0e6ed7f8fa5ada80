// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! The reserved `SystemFilter` behaviors of §4.9: `Send`, `Receive`,
//! `Dump`, `Save`, `BackupFile`. Unlike ordinary filters these always
//! receive the per-invocation [`Environment`] under the reserved
//! `environment` key — modeled here as a dedicated
//! `Option<&mut Environment>` parameter on `run` rather than stuffing
//! a non-serializable value into the `kwargs` map (see
//! `src/element/mod.rs`).

use super::{Hook, PipelineElement};
use crate::environment::Environment;
use crate::error::{PenchyError, PenchyResult};
use crate::typespec::TypeSpec;
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug)]
pub enum SystemFilterKind {
    Send,
    Receive,
    Dump { penchy_version: String },
    Save { destination: String },
    BackupFile { destination: String },
}

pub struct SystemFilter {
    kind: SystemFilterKind,
    pub prehooks: Vec<Hook>,
    pub posthooks: Vec<Hook>,
    inputs: TypeSpec,
    outputs: TypeSpec,
    out: HashMap<String, Vec<Value>>,
}

impl std::fmt::Debug for SystemFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemFilter").field("kind", &self.kind).finish()
    }
}

impl SystemFilter {
    pub fn send() -> Self {
        Self::new(SystemFilterKind::Send, &[])
    }

    pub fn receive() -> Self {
        Self::new(SystemFilterKind::Receive, &["results"])
    }

    pub fn dump(penchy_version: impl Into<String>) -> Self {
        Self::new(
            SystemFilterKind::Dump {
                penchy_version: penchy_version.into(),
            },
            &["record"],
        )
    }

    pub fn save(destination: impl Into<String>) -> Self {
        Self::new(
            SystemFilterKind::Save {
                destination: destination.into(),
            },
            &[],
        )
    }

    pub fn backup_file(destination: impl Into<String>) -> Self {
        Self::new(
            SystemFilterKind::BackupFile {
                destination: destination.into(),
            },
            &[],
        )
    }

    fn new(kind: SystemFilterKind, output_names: &[&str]) -> Self {
        let mut out = HashMap::new();
        for name in output_names {
            out.insert(name.to_string(), Vec::new());
        }
        Self {
            kind,
            prehooks: Vec::new(),
            posthooks: Vec::new(),
            inputs: TypeSpec::unchecked(),
            outputs: TypeSpec::unchecked(),
            out,
        }
    }

    pub fn is_send(&self) -> bool {
        matches!(self.kind, SystemFilterKind::Send)
    }

    pub fn is_receive(&self) -> bool {
        matches!(self.kind, SystemFilterKind::Receive)
    }

    fn resolve_destination(&self, destination: &str, env: &Environment) -> std::path::PathBuf {
        let path = std::path::Path::new(destination);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match env.current_composition.as_ref() {
            Some(ctx) => ctx.node_path.join(path),
            None => path.to_path_buf(),
        }
    }
}

impl PipelineElement for SystemFilter {
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
        format!("SystemFilter({:?})", self.kind)
    }

    fn run(&mut self, kwargs: &HashMap<String, Value>, env: Option<&mut Environment>) -> PenchyResult<()> {
        let env = env.ok_or_else(|| PenchyError::WrongInput {
            filter: format!("{:?}", self.kind),
            reason: "system filter invoked without an environment".to_string(),
        })?;

        match &self.kind {
            SystemFilterKind::Send => {
                let payload = kwargs.get("payload").cloned().unwrap_or(Value::None);
                env.send(payload);
                Ok(())
            }

            SystemFilterKind::Receive => {
                let results = env.receive();
                let record: BTreeMap<String, Value> = results.into_iter().collect();
                self.out
                    .entry("results".to_string())
                    .or_default()
                    .push(Value::Dict(record));
                Ok(())
            }

            SystemFilterKind::Dump { penchy_version } => {
                let mut data = BTreeMap::new();
                for (key, value) in kwargs {
                    if key != "environment" {
                        data.insert(key.clone(), value.clone());
                    }
                }

                let (composition_name, jvm_info) = match &env.current_composition {
                    Some(ctx) => (ctx.name.clone(), ctx.jvm_info.clone()),
                    None => (String::new(), Value::None),
                };

                let mut system = BTreeMap::new();
                system.insert("job".to_string(), Value::Str(env.job.clone()));
                system.insert("penchy".to_string(), Value::Str(penchy_version.clone()));
                system.insert("composition".to_string(), Value::Str(composition_name));
                system.insert("jvm".to_string(), jvm_info);

                let mut record = BTreeMap::new();
                record.insert("system".to_string(), Value::Dict(system));
                record.insert("data".to_string(), Value::Dict(data));

                self.out.entry("record".to_string()).or_default().push(Value::Dict(record));
                Ok(())
            }

            SystemFilterKind::Save { destination } => {
                let destination = destination.clone();
                let dest_path = self.resolve_destination(&destination, env);
                let source = kwargs
                    .get("path")
                    .and_then(Value::as_str)
                    .ok_or_else(|| PenchyError::MissingArgument {
                        name: "path".to_string(),
                    })?;
                std::fs::write(&dest_path, source)?;
                Ok(())
            }

            SystemFilterKind::BackupFile { destination } => {
                let destination = destination.clone();
                let dest_path = self.resolve_destination(&destination, env);
                let source = kwargs
                    .get("path")
                    .and_then(Value::as_str)
                    .ok_or_else(|| PenchyError::MissingArgument {
                        name: "path".to_string(),
                    })?;
                std::fs::copy(source, &dest_path)?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    #[test]
    fn send_forwards_payload_to_environment() {
        let sent = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sent_clone = sent.clone();
        let mut env = Environment::new(
            move |data| sent_clone.lock().unwrap().push(data),
            StdHashMap::new,
            "job.py",
        );

        let mut filter = SystemFilter::send();
        let mut kwargs = HashMap::new();
        kwargs.insert("payload".to_string(), Value::Int(7));
        filter.run(&kwargs, Some(&mut env)).unwrap();

        assert_eq!(sent.lock().unwrap().as_slice(), &[Value::Int(7)]);
    }

    #[test]
    fn receive_publishes_results_on_out() {
        let mut env = Environment::new(
            |_| {},
            || {
                let mut m = StdHashMap::new();
                m.insert("c1".to_string(), Value::Int(1));
                m
            },
            "job.py",
        );

        let mut filter = SystemFilter::receive();
        filter.run(&HashMap::new(), Some(&mut env)).unwrap();

        match &filter.out()["results"][0] {
            Value::Dict(map) => assert_eq!(map.get("c1"), Some(&Value::Int(1))),
            _ => panic!("expected dict"),
        }
    }

    #[test]
    fn missing_environment_is_rejected() {
        let mut filter = SystemFilter::send();
        assert!(matches!(
            filter.run(&HashMap::new(), None),
            Err(PenchyError::WrongInput { .. })
        ));
    }

}
