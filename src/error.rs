// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! Error types for PenchY.
//!
//! One enum covers the whole crate, the way `ConflowError` does for
//! conflow. Each kind carries the context §7 of the specification asks
//! for: component name, cycle members, or an arg dump.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

pub type PenchyResult<T> = Result<T, PenchyError>;

#[derive(Error, Debug, Diagnostic)]
pub enum PenchyError {
    // ── Type checking ──────────────────────────────────────────────
    #[error("Argument {name} is missing")]
    #[diagnostic(code(penchy::type_check::missing_argument))]
    MissingArgument { name: String },

    #[error("Argument {name} is not of type {expected}")]
    #[diagnostic(code(penchy::type_check::wrong_type))]
    TypeMismatch { name: String, expected: String },

    // ── Filters ─────────────────────────────────────────────────────
    #[error("{filter} received data it cannot process: {reason}")]
    #[diagnostic(code(penchy::filter::wrong_input))]
    WrongInput { filter: String, reason: String },

    // ── JVM ─────────────────────────────────────────────────────────
    #[error("JVM is not configured: {reason}")]
    #[diagnostic(
        code(penchy::jvm::not_configured),
        help("A classpath and a workload must both be set before run()")
    )]
    JvmNotConfigured { reason: String },

    #[error("JVM execution failed with exit code {exit_code}")]
    #[diagnostic(code(penchy::jvm::execution_failed))]
    JvmExecution { exit_code: i32, stderr: String },

    // ── DAG scheduling ──────────────────────────────────────────────
    #[error("no topological sort possible")]
    #[diagnostic(
        code(penchy::dag::no_topological_sort),
        help("Unresolved sinks: {}", unresolved.join(", "))
    )]
    NoTopologicalSort { unresolved: Vec<String> },

    // ── Orchestration ───────────────────────────────────────────────
    #[error("authentication to node {host} failed")]
    #[diagnostic(code(penchy::node::unauthenticated))]
    Unauthenticated { host: String },

    #[error("composition {hash} on node {host} timed out")]
    #[diagnostic(code(penchy::node::timeout))]
    Timeout { hash: String, host: String },

    #[error("all nodes timed out")]
    #[diagnostic(code(penchy::server::all_nodes_timed_out))]
    AllNodesTimedOut,

    #[error("unknown composition hash: {hash}")]
    #[diagnostic(code(penchy::server::unknown_composition))]
    UnknownComposition { hash: String },

    #[error("job is not valid: {reason}")]
    #[diagnostic(code(penchy::job::invalid))]
    InvalidJob { reason: String },

    // ── IO / wire formats (ambient) ───────────────────────────────────
    #[error("failed to read {path}: {error}")]
    #[diagnostic(code(penchy::io::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("io error: {0}")]
    #[diagnostic(code(penchy::io::error))]
    Io(String),

    #[error("yaml error: {0}")]
    #[diagnostic(code(penchy::io::yaml_error))]
    Yaml(String),

    #[error("json error: {0}")]
    #[diagnostic(code(penchy::io::json_error))]
    Json(String),

    #[error("rpc error: {0}")]
    #[diagnostic(code(penchy::rpc::error))]
    Rpc(String),

    #[error("ssh error: {0}")]
    #[diagnostic(code(penchy::node::ssh_error))]
    Ssh(String),
}

impl From<std::io::Error> for PenchyError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for PenchyError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml(e.to_string())
    }
}

impl From<serde_json::Error> for PenchyError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

impl From<reqwest::Error> for PenchyError {
    fn from(e: reqwest::Error) -> Self {
        Self::Rpc(e.to_string())
    }
}

impl From<ssh2::Error> for PenchyError {
    fn from(e: ssh2::Error) -> Self {
        Self::Ssh(e.to_string())
    }
}
