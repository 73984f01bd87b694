use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use common::rpc::ClientConfig;
use mr_worker::{serve, MRWorker, WorkerConfig};
use workload::Registry;

mod args;
use args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let max_message_size = usize::try_from(args.max_message_size.as_u64())
        .context("max message size does not fit in memory")?;
    let config = WorkerConfig {
        peer_timeout: Duration::from_secs(args.peer_timeout_secs),
        client: ClientConfig {
            connect_timeout: Duration::from_secs(args.connect_timeout_secs),
            max_message_size,
        },
    };

    let registry = Registry::builtin();
    let worker = MRWorker::new(args.id.clone(), registry.clone(), config);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(
        worker = %args.id,
        workloads = ?registry.names().collect::<Vec<_>>(),
        max_message_size = %args.max_message_size,
        "Worker server listening on {addr}"
    );

    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Worker server exited..."),
            Err(err) => error!("Unable to listen for shutdown signal: {err}"),
        }
    };

    serve(worker, listener, max_message_size, shutdown).await?;
    Ok(())
}
