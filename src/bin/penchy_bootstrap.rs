// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! The client-side bootstrap (§6): `penchy_bootstrap <job-file-basename>
//! config.py <node-identifier>`, run with its working directory set to
//! the node's configured path. Writes `penchy.pid` immediately, then
//! drives the client side of §4.4 for every composition in the job
//! file, reporting results (or errors) back to the server and arming
//! the timeout hook pair around every JVM invocation.

use clap::Parser;
use penchy::config::ClientConfig;
use penchy::dependency::LiteralPathResolver;
use penchy::job_description::JobSpec;
use penchy::rpc::{BlockingRpcClient, RpcClient};
use penchy::value::Value;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// `penchy_bootstrap <job-file-basename> config.py <node-identifier>`
/// — the exact positional shape §6 pins.
#[derive(Parser, Debug)]
#[command(name = "penchy_bootstrap")]
struct Args {
    job_file: PathBuf,
    config_file: PathBuf,
    node_identifier: String,
}

struct FileWriter(Arc<Mutex<std::fs::File>>);

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FileWriter {
    type Writer = FileWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        FileWriterGuard(self.0.clone())
    }
}

struct FileWriterGuard(Arc<Mutex<std::fs::File>>);

impl std::io::Write for FileWriterGuard {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().unwrap().flush()
    }
}

fn open_log(name: &str) -> std::io::Result<Arc<Mutex<std::fs::File>>> {
    let file = OpenOptions::new().create(true).append(true).open(name)?;
    Ok(Arc::new(Mutex::new(file)))
}

fn write_pidfile() -> std::io::Result<()> {
    std::fs::write("penchy.pid", std::process::id().to_string())
}

fn main() -> std::process::ExitCode {
    let args = Args::parse();

    if let Err(e) = write_pidfile() {
        eprintln!("failed to write penchy.pid: {e}");
        return std::process::ExitCode::FAILURE;
    }

    let bootstrap_log = match open_log("penchy_bootstrap.log") {
        Ok(f) => f,
        Err(e) => {
            eprintln!("failed to open penchy_bootstrap.log: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };
    let client_log = match open_log("penchy.log") {
        Ok(f) => f,
        Err(e) => {
            eprintln!("failed to open penchy.log: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "penchy=debug".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(FileWriter(bootstrap_log)).with_ansi(false))
        .with(tracing_subscriber::fmt::layer().with_writer(FileWriter(client_log)).with_ansi(false))
        .init();

    tracing::info!(node = %args.node_identifier, job = %args.job_file.display(), "bootstrap starting");

    match run(&args) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "bootstrap failed");
            std::process::ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> penchy::PenchyResult<()> {
    let client_config = ClientConfig::from_yaml_file(&args.config_file)?;
    let job_spec = JobSpec::from_file(&args.job_file)?;

    let base_url = client_config.base_url();
    let mut job = job_spec.build(args.job_file.to_string_lossy().to_string());

    let rpc = RpcClient::new(base_url.clone());
    let rpc = Arc::new(rpc);
    let runtime = tokio::runtime::Runtime::new().map_err(|e| penchy::PenchyError::Io(e.to_string()))?;

    let send_rpc = rpc.clone();
    let send_runtime = runtime.handle().clone();
    job.send = Some(Arc::new(move |hash: String, data: Value| {
        let rpc = send_rpc.clone();
        send_runtime.block_on(async move {
            if let Err(e) = rpc.rcv_data(hash.clone(), data).await {
                tracing::error!(%hash, error = %e, "failed to report result to server");
            }
        });
    }));

    let resolver = LiteralPathResolver;
    let blocking_rpc = Arc::new(BlockingRpcClient::new(base_url));

    for index in 0..job.compositions.len() {
        let hash = job.compositions[index].hash();

        let start_rpc = blocking_rpc.clone();
        let start_hash = hash.clone();
        let stop_rpc = blocking_rpc.clone();
        let stop_hash = hash.clone();
        job.compositions[index].jvm.jvm_mut().prehooks.push(Box::new(move || {
            if let Err(e) = start_rpc.start_timeout(start_hash.clone()) {
                tracing::error!(error = %e, "failed to arm server-side timeout");
            }
        }));
        job.compositions[index].jvm.jvm_mut().posthooks.push(Box::new(move || {
            if let Err(e) = stop_rpc.stop_timeout(stop_hash.clone()) {
                tracing::error!(error = %e, "failed to disarm server-side timeout");
            }
        }));

        tracing::info!(%hash, composition = %job.compositions[index].name, "running composition");
        if let Err(e) = job.run(index, &resolver) {
            tracing::error!(%hash, error = %e, "composition failed, reporting node_error");
            if let Err(report_err) = blocking_rpc.node_error(hash, Some(e.to_string())) {
                tracing::error!(error = %report_err, "failed to report node_error to server");
            }
        }
    }

    tracing::info!("bootstrap finished");
    Ok(())
}
