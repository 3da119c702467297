use clap::Parser;
use env_logger::Env;
use log::{error, info};
use server::coordinator::CoordinatorSettings;
use server::network::Server;
use std::time::Duration;

/// Session coordinator for the cooperative tower defense game
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Port to listen on
    #[clap(short, long, env = "PORT", default_value = "8080")]
    port: u16,
    /// Delay before a wave retries when no path data has arrived (ms)
    #[clap(long, default_value = "2000")]
    path_retry_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let settings = CoordinatorSettings {
        path_retry_delay: Duration::from_millis(args.path_retry_ms),
    };

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(&address, settings).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
