// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! The four-method RPC surface of §4.8/§6, replacing the original's
//! `SimpleXMLRPCServer` with a typed HTTP/JSON one: request/response
//! types shared by server and client, an Axum router mounting the
//! four methods, and a `reqwest`-based [`RpcClient`] the client side
//! uses from `Send` and the timeout hooks around `Jvm::run`.

use crate::error::PenchyError;
use crate::server::Server;
use crate::value::Value;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
pub struct RcvDataRequest {
    pub hash: String,
    pub result: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeErrorRequest {
    pub hash: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HashRequest {
    pub hash: String,
}

impl IntoResponse for PenchyError {
    fn into_response(self) -> Response {
        let status = match &self {
            PenchyError::UnknownComposition { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

async fn rcv_data(
    State(server): State<Arc<Server>>,
    Json(req): Json<RcvDataRequest>,
) -> Result<StatusCode, PenchyError> {
    server.rcv_data(req.hash, req.result).await?;
    Ok(StatusCode::OK)
}

async fn node_error(
    State(server): State<Arc<Server>>,
    Json(req): Json<NodeErrorRequest>,
) -> Result<StatusCode, PenchyError> {
    server.node_error(req.hash, req.reason).await?;
    Ok(StatusCode::OK)
}

async fn start_timeout(
    State(server): State<Arc<Server>>,
    Json(req): Json<HashRequest>,
) -> Result<StatusCode, PenchyError> {
    server.start_timeout(req.hash).await?;
    Ok(StatusCode::OK)
}

async fn stop_timeout(
    State(server): State<Arc<Server>>,
    Json(req): Json<HashRequest>,
) -> Result<StatusCode, PenchyError> {
    server.stop_timeout(req.hash).await?;
    Ok(StatusCode::OK)
}

/// Build the Axum router exposing the four RPC methods of §6.
pub fn server_router(server: Arc<Server>) -> Router {
    Router::new()
        .route("/rcv_data", post(rcv_data))
        .route("/node_error", post(node_error))
        .route("/start_timeout", post(start_timeout))
        .route("/stop_timeout", post(stop_timeout))
        .with_state(server)
}

/// The client-side handle a `Send` filter and the timeout hooks around
/// `Jvm::run` use to reach the server's RPC surface.
pub struct RpcClient {
    base_url: String,
    client: reqwest::Client,
}

impl RpcClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, method: &str, body: impl Serialize) -> Result<(), PenchyError> {
        self.client
            .post(format!("{}/{method}", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn rcv_data(&self, hash: String, result: Value) -> Result<(), PenchyError> {
        self.post("rcv_data", RcvDataRequest { hash, result }).await
    }

    pub async fn node_error(&self, hash: String, reason: Option<String>) -> Result<(), PenchyError> {
        self.post("node_error", NodeErrorRequest { hash, reason }).await
    }

    pub async fn start_timeout(&self, hash: String) -> Result<(), PenchyError> {
        self.post("start_timeout", HashRequest { hash }).await
    }

    pub async fn stop_timeout(&self, hash: String) -> Result<(), PenchyError> {
        self.post("stop_timeout", HashRequest { hash }).await
    }
}

/// A blocking counterpart to [`RpcClient`], for the prehook/posthook
/// pair §5 installs directly around `Jvm::run` (`JvmHook` is a plain
/// `FnMut`, not an async fn, so the call into the server has to block
/// rather than await).
pub struct BlockingRpcClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl BlockingRpcClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    fn post(&self, method: &str, body: impl Serialize) -> Result<(), PenchyError> {
        self.client
            .post(format!("{}/{method}", self.base_url))
            .json(&body)
            .send()
            .map_err(|e| PenchyError::Rpc(e.to_string()))?
            .error_for_status()
            .map_err(|e| PenchyError::Rpc(e.to_string()))?;
        Ok(())
    }

    pub fn start_timeout(&self, hash: String) -> Result<(), PenchyError> {
        self.post("start_timeout", HashRequest { hash })
    }

    pub fn stop_timeout(&self, hash: String) -> Result<(), PenchyError> {
        self.post("stop_timeout", HashRequest { hash })
    }

    pub fn node_error(&self, hash: String, reason: Option<String>) -> Result<(), PenchyError> {
        self.post("node_error", NodeErrorRequest { hash, reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::{CompositionJvm, SystemComposition};
    use crate::element::{workload::WorkloadKind, Element, Workload};
    use crate::job::Job;
    use crate::jvm::Jvm;
    use crate::node_setting::NodeSetting;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn job_with_one_composition() -> Job {
        let jvm = Jvm::new("java", "-cp /fake");
        let node = NodeSetting::new("h1", 22, "u", "/p", "/", "d");
        let mut composition = SystemComposition::new(CompositionJvm::Plain(jvm), node, "demo");
        let workload_id = composition
            .elements
            .insert(Element::Workload(Workload::dacapo(WorkloadKind::Dacapo, "avrora")));
        composition.jvm.jvm_mut().workload = Some(workload_id);

        let mut job = Job::new("job.py", 1);
        job.compositions.push(composition);
        job
    }

    #[tokio::test]
    async fn rcv_data_endpoint_records_a_result() {
        let job = job_with_one_composition();
        let hash = job.compositions[0].hash();
        let server = Server::new(crate::config::ServerConfig::default(), job).await.unwrap();
        let app = server_router(server.clone());

        let body = serde_json::to_vec(&RcvDataRequest {
            hash: hash.clone(),
            result: Value::Int(42),
        })
        .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/rcv_data")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(server.received_all_results().await);
    }

    #[tokio::test]
    async fn rcv_data_rejects_unknown_hash() {
        let job = job_with_one_composition();
        let server = Server::new(crate::config::ServerConfig::default(), job).await.unwrap();
        let app = server_router(server);

        let body = serde_json::to_vec(&RcvDataRequest {
            hash: "deadbeef".to_string(),
            result: Value::Int(1),
        })
        .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/rcv_data")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
