use clap::Parser;
use client::network::Client;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal client for the grid battle server", long_about = None)]
struct Args {
    /// Server address to connect to
    server: String,

    /// Server port
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let address = format!("{}:{}", args.server, args.port);

    info!("Connecting to: {}", address);

    let client = Client::connect(&address).await?;
    client.run().await?;

    Ok(())
}
