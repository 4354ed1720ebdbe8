//! Tidepool Server Entry Point

use clap::Parser;
use std::sync::Arc;
use tidepool::pubsub::Broker;
use tidepool::storage::Store;
use tidepool::{Result, TcpServer};
use tracing::{error, info};

use chrono::Utc;
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

struct ChronoUtc;

impl FormatTime for ChronoUtc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        // Format as RFC3339 UTC
        write!(w, "{}", Utc::now().to_rfc3339())
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 7379)]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_timer(ChronoUtc)
        .init();

    let args = Args::parse();

    info!("Starting Tidepool server...");
    info!("Host: {}, Port: {}", args.host, args.port);

    // All state is in-memory and lives exactly as long as this process.
    let store = Store::shared();
    let broker = Arc::new(Broker::new());

    let server = TcpServer::bind(&format!("{}:{}", args.host, args.port), store, broker).await?;

    match server.run().await {
        Ok(_) => {
            info!("Server stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error!("Server error: {}", e);
            Err(e)
        }
    }
}
