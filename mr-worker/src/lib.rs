//! A map reduce worker.
//!
//! The worker holds one slice of a job's input, maps it, sends every
//! intermediate pair straight to the peer that owns its partition and reduces
//! the partition it owns. It only ever moves between phases when told to.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

use common::rpc::{ClientConfig, WorkerServer};

pub mod core;
pub mod error;
pub mod map;
pub mod reduce;
pub mod shuffle;
pub mod store;

pub use crate::core::MRWorker;
pub use crate::error::WorkerError;

#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// Bound on one shuffle delivery to a peer.
    pub peer_timeout: Duration,
    /// Used for peer connections and as the server's message size limit.
    pub client: ClientConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            peer_timeout: Duration::from_secs(30),
            client: ClientConfig::default(),
        }
    }
}

/// Serve `worker` on `listener` until `shutdown` resolves.
pub async fn serve(
    worker: MRWorker,
    listener: TcpListener,
    max_message_size: usize,
    shutdown: impl Future<Output = ()>,
) -> Result<(), tonic::transport::Error> {
    let service = WorkerServer::new(worker)
        .max_decoding_message_size(max_message_size)
        .max_encoding_message_size(max_message_size);

    Server::builder()
        .add_service(service)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await
}

/// Start `worker` on an ephemeral loopback port, in the background.
pub async fn spawn_local(
    worker: MRWorker,
) -> std::io::Result<(SocketAddr, JoinHandle<Result<(), tonic::transport::Error>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let max_message_size = worker.config().client.max_message_size;

    let handle = tokio::spawn(serve(
        worker,
        listener,
        max_message_size,
        std::future::pending(),
    ));
    Ok((addr, handle))
}
