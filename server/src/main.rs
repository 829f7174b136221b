use clap::Parser;
use log::{error, info};
use server::config::{ServerConfig, DEFAULT_MAX_QUEUED_FRAMES, DEFAULT_WRITE_TIMEOUT};
use server::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Grid battle game server", long_about = None)]
struct Args {
    /// Port to listen on
    port: u16,

    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Give up on a peer whose single frame write takes longer than this
    #[arg(long, default_value_t = DEFAULT_WRITE_TIMEOUT.as_millis() as u64)]
    write_timeout_ms: u64,

    /// Drop a peer once this many frames are waiting to be sent to it
    #[arg(long, default_value_t = DEFAULT_MAX_QUEUED_FRAMES)]
    max_queued_frames: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        write_timeout: Duration::from_millis(args.write_timeout_ms),
        max_queued_frames: args.max_queued_frames,
    };

    let server = match Server::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
