use clap::Parser;
use dotenvy::dotenv;
use rust_upload_hooks::config::HookConfig;
use rust_upload_hooks::services::daemon::DaemonLaunch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Starts the tusd upload daemon wired to this service's hook endpoint.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to bind the daemon's HTTP server to
    port: u16,

    /// HTTP endpoint hook events are sent to
    hooks_http: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runtusd=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = HookConfig::from_env();
    if config.shared_secret.is_empty() {
        error!("❌ SHARED_SECRET is not set; the hook endpoint would reject every call.");
        std::process::exit(1);
    }

    let launch = DaemonLaunch::new(
        config.staging_dir(),
        &args.hooks_http,
        &config.shared_secret,
        args.port,
    )?;

    info!(
        "🚀 Launching {} on {}:{} (uploads: {})",
        launch.program,
        launch.host,
        launch.port,
        launch.upload_dir.display()
    );

    let status = launch.command().status().await?;
    if !status.success() {
        error!("❌ {} exited with {}", launch.program, status);
        std::process::exit(status.code().unwrap_or(1));
    }

    Ok(())
}
