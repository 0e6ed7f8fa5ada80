// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! # PenchY — a distributed benchmarking harness for JVM workloads
//!
//! A control server deploys jobs to worker nodes over SSH; each node
//! runs a typed dataflow pipeline of [`element::Workload`]s,
//! [`element::Tool`]s, and [`element::filter::Filter`]s around a
//! [`jvm::Jvm`] invocation, then reports results back to the server
//! over a small RPC surface ([`rpc`]) for a server-side pipeline to
//! aggregate.
//!
//! ## Layout
//!
//! - [`value`]/[`typespec`] — the dynamically typed values pipeline
//!   elements exchange, and the type-checking contract between them.
//! - [`edge`]/[`dag`]/[`pipeline`] — the flow graph: edges between
//!   elements, topological scheduling, and the builder that wires them.
//! - [`element`] — the closed set of pipeline element kinds
//!   (`Workload`, `Tool`, `Filter`, `SystemFilter`, `WrappedJvm`).
//! - [`jvm`]/[`composition`] — JVM command-line assembly/execution, and
//!   the `SystemComposition` identity pairing a JVM with a node.
//! - [`node_setting`]/[`remote_shell`]/[`node`] — the per-host
//!   configuration, SSH transport, and controller that deploys to and
//!   tears down a worker host.
//! - [`environment`]/[`job`]/[`dependency`] — the per-invocation
//!   environment, the `Job` that drives client- and server-side
//!   pipeline execution, and external dependency resolution.
//! - [`job_description`] — the declarative YAML job-file format the
//!   bootstrap binary loads into a [`job::Job`].
//! - [`rpc`]/[`server`] — the control server's RPC surface and the
//!   orchestration loop that deploys jobs, collects results, and
//!   enforces timeouts.
//! - [`config`]/[`telemetry`] — ambient configuration loading and
//!   tracing setup shared by the two binaries.

pub mod composition;
pub mod config;
pub mod dag;
pub mod dependency;
pub mod edge;
pub mod element;
pub mod environment;
pub mod error;
pub mod job;
pub mod job_description;
pub mod jvm;
pub mod node;
pub mod node_setting;
pub mod pipeline;
pub mod remote_shell;
pub mod rpc;
pub mod server;
pub mod telemetry;
pub mod typespec;
pub mod value;

pub use error::{PenchyError, PenchyResult};
pub use job::Job;
pub use server::Server;

/// Library version, reported in the `Dump` system filter's record.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
