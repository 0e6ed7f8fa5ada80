// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! The control server binary (§4.8): load a job description and a
//! server config, listen for the RPC surface of §6, deploy the job to
//! every node, then run the result loop until every node has reported
//! in (or timed out) and dispatch the server-side pipeline.

use clap::Parser;
use penchy::config::ServerConfig;
use penchy::job_description::JobSpec;
use penchy::rpc::server_router;
use penchy::server::Server;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "penchy-server", about = "Deploy and collect a PenchY benchmarking job")]
struct Args {
    /// YAML job description (see `penchy::job_description::JobSpec`).
    job_file: PathBuf,

    /// YAML server configuration (`server_host`, `server_port`, ...).
    config_file: PathBuf,

    /// The bootstrap binary uploaded to every node.
    bootstrap_script: PathBuf,

    /// Directory the closing nodes' logs are fetched into.
    #[arg(long, default_value = ".")]
    log_dir: PathBuf,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    penchy::telemetry::init();

    let args = Args::parse();

    let config = ServerConfig::from_yaml_file(&args.config_file)
        .map_err(|e| miette::miette!("failed to load server config: {e}"))?;
    let job_spec = JobSpec::from_file(&args.job_file)
        .map_err(|e| miette::miette!("failed to load job description: {e}"))?;
    let job = job_spec.build(args.job_file.to_string_lossy().to_string());

    if !job.check() {
        return Err(miette::miette!("job failed validation, see logs for details"));
    }

    let listen_addr = format!("{}:{}", config.server_host, config.server_port);

    let server = Server::new(config, job)
        .await
        .map_err(|e| miette::miette!("failed to initialize server: {e}"))?;

    let router_server = server.clone();
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .map_err(|e| miette::miette!("failed to bind {listen_addr}: {e}"))?;
    tracing::info!(%listen_addr, "rpc surface listening");

    let rpc_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, server_router(router_server)).await {
            tracing::error!(error = %e, "rpc server exited");
        }
    });

    server
        .launch(&args.job_file, &args.bootstrap_script, &args.config_file)
        .await
        .map_err(|e| miette::miette!("deployment failed: {e}"))?;

    let result = tokio::select! {
        result = server.run(&args.log_dir) => result,
        _ = shutdown_signal() => {
            tracing::warn!("shutdown signal received, closing every node early");
            server.shutdown(&args.log_dir).await;
            Err(penchy::PenchyError::InvalidJob {
                reason: "shutdown signal received before the job completed".to_string(),
            })
        }
    };
    rpc_task.abort();

    match result {
        Ok(()) => {
            tracing::info!("job complete");
            Ok(())
        }
        Err(e) => Err(miette::miette!("job did not complete: {e}")),
    }
}

/// Mirrors the original's `SIGTERM` handler (`server.py`'s
/// `_signal_handler`): whatever signal tells the process to stop, every
/// node gets closed — killed if results were still outstanding, logs
/// fetched — before the process exits, so a terminated deployment never
/// leaves a dangling remote client.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
