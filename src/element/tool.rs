// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! External profiling tools attached to a JVM (e.g. Tamiflex's agent,
//! a JIT-compiler log collector) that contribute extra JVM arguments
//! rather than wrapping the executable itself (that's `WrappedJvm`).

use super::{Hook, PipelineElement};
use crate::environment::Environment;
use crate::error::PenchyResult;
use crate::typespec::TypeSpec;
use crate::value::Value;
use std::collections::HashMap;

pub struct Tool {
    pub name: String,
    arguments: Vec<String>,
    pub prehooks: Vec<Hook>,
    pub posthooks: Vec<Hook>,
    inputs: TypeSpec,
    outputs: TypeSpec,
    out: HashMap<String, Vec<Value>>,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .finish()
    }
}

impl Tool {
    pub fn new(name: impl Into<String>, arguments: Vec<String>) -> Self {
        Self {
            name: name.into(),
            arguments,
            prehooks: Vec::new(),
            posthooks: Vec::new(),
            inputs: TypeSpec::unchecked(),
            outputs: TypeSpec::unchecked(),
            out: HashMap::new(),
        }
    }

    /// Extra JVM command-line arguments this tool contributes.
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }
}

impl PipelineElement for Tool {
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
        format!("Tool({}, {:?})", self.name, self.arguments)
    }

    fn run(&mut self, _kwargs: &HashMap<String, Value>, _env: Option<&mut Environment>) -> PenchyResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_are_exposed_verbatim() {
        let tool = Tool::new("tamiflex", vec!["-javaagent:poa.jar".to_string()]);
        assert_eq!(tool.arguments(), &["-javaagent:poa.jar".to_string()]);
    }
}
