use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use vdl_server::{ServerConfig, VdlServer};

#[derive(Parser)]
#[command(name = "vdld", about = "VDL — versioned document store with peer sync", version)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8516")]
    bind: SocketAddr,

    /// Database file; omit for an in-memory store.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Log errors only.
    #[arg(short, long)]
    silent: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let filter = if args.silent {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig {
        bind_addr: args.bind,
        data_path: args.data,
        ..Default::default()
    };
    VdlServer::new(config)?.serve().await?;
    Ok(())
}
