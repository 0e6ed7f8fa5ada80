// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! Per-invocation context handed to [`crate::element::SystemFilter`]s.
//!
//! Grounded on §3's `Environment` record. `send`/`receive` are held as
//! closures rather than a trait object pair so `Job::run` can close
//! over the composition hash when wrapping `send` (§4.4 step 2)
//! without an extra layer of indirection.

use crate::value::Value;
use std::collections::HashMap;
use std::path::PathBuf;

/// Read-only facts about the composition currently executing, handed
/// to `SystemFilter`s that need to resolve relative paths or label
/// their output — never a back-reference to the owning
/// `SystemComposition` itself (§9: cyclic references stay read-only
/// and out-of-band).
#[derive(Debug, Clone)]
pub struct CompositionContext {
    pub hash: String,
    pub name: String,
    pub node_path: PathBuf,
    pub jvm_info: Value,
}

pub struct Environment {
    send: Box<dyn FnMut(Value) + Send>,
    receive: Box<dyn FnMut() -> HashMap<String, Value> + Send>,
    pub job: String,
    pub current_composition: Option<CompositionContext>,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("job", &self.job)
            .field("current_composition", &self.current_composition)
            .finish()
    }
}

impl Environment {
    pub fn new(
        send: impl FnMut(Value) + Send + 'static,
        receive: impl FnMut() -> HashMap<String, Value> + Send + 'static,
        job: impl Into<String>,
    ) -> Self {
        Self {
            send: Box::new(send),
            receive: Box::new(receive),
            job: job.into(),
            current_composition: None,
        }
    }

    pub fn send(&mut self, data: Value) {
        (self.send)(data)
    }

    pub fn receive(&mut self) -> HashMap<String, Value> {
        (self.receive)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn send_reaches_the_closure() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sent_clone = sent.clone();
        let mut env = Environment::new(
            move |data| sent_clone.lock().unwrap().push(data),
            || HashMap::new(),
            "job.py",
        );

        env.send(Value::Int(42));
        assert_eq!(sent.lock().unwrap().as_slice(), &[Value::Int(42)]);
    }
}
