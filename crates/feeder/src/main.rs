//! Price feeder
//!
//! Main entry point for the oracle price feeder

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use oracle_feeder::{logging, App, Args};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();
    logging::init(&args.log_level, args.log_json, args.disable_ansi_color)?;

    info!(
        pid = std::process::id(),
        "Starting price feeder v{}",
        env!("CARGO_PKG_VERSION")
    );

    let app = match App::build(&args).await {
        Ok(app) => app,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            return Err(e);
        }
    };

    app.start()?;
    info!("Price notifier started, press Ctrl+C to shutdown");

    shutdown_signal().await?;

    if let Err(e) = app.shutdown().await {
        error!("Shutdown error: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn shutdown_signal() -> anyhow::Result<()> {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    #[cfg(unix)]
    let terminate = terminate.recv();

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Option<()>>();

    tokio::select! {
        res = ctrl_c => {
            res?;
            info!("Received Ctrl+C");
        }
        _ = terminate => {
            info!("Received termination signal");
        }
    }
    Ok(())
}
