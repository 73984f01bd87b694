use bytesize::ByteSize;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// This worker's id. Must match its entry in the coordinator's roster.
    #[arg(long)]
    pub id: String,

    /// The address to listen on.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// The port to run the worker on.
    #[arg(short, long)]
    pub port: u16,

    /// Seconds to wait for a peer to accept a shuffle delivery.
    #[arg(long, default_value_t = 30)]
    pub peer_timeout_secs: u64,

    /// Seconds to wait when connecting to a peer.
    #[arg(long, default_value_t = 5)]
    pub connect_timeout_secs: u64,

    /// Largest message sent or accepted.
    #[arg(long, default_value = "64MiB")]
    pub max_message_size: ByteSize,
}
