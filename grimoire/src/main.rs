use clap::Parser;
use grimoire::{Application, Config, config::Args, telemetry};
use tokio::signal;
use tracing::info;

/// Resolves on Ctrl+C, or SIGTERM where the platform has it
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut terminate =
            signal::unix::signal(signal::unix::SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        tokio::select! {
            _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down gracefully..."),
            _ = terminate.recv() => info!("Received SIGTERM, shutting down gracefully..."),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C, shutting down gracefully...");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args)?;

    if args.validate {
        println!(
            "Configuration is valid (storage: {}, sign-in: {}).",
            config.storage.backend_name(),
            if config.identity.enabled { "enabled" } else { "disabled" }
        );
        return Ok(());
    }

    telemetry::init_telemetry(config.enable_otel_export)?;
    info!(version = env!("CARGO_PKG_VERSION"), "Starting grimoire");

    Application::new(config).await?.serve(shutdown_signal()).await
}
