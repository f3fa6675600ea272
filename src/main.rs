use clap::Parser;
use dotenvy::dotenv;
use rust_upload_hooks::config::HookConfig;
use rust_upload_hooks::infrastructure::database;
use rust_upload_hooks::services::hooks::HookService;
use rust_upload_hooks::services::quota::DatabaseQuotaGuard;
use rust_upload_hooks::{AppState, create_app};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the hook server to
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port for the hook server
    #[arg(short, long, default_value_t = 9292)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_upload_hooks=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting upload hook service...");

    let db = database::setup_database().await?;

    let config = match std::env::var("APP_ENV").as_deref() {
        Ok("production") => HookConfig::production()?,
        _ => HookConfig::from_env(),
    };
    info!(
        "🛡️  Hook Config: Max Size={}MiB, Files={}, Staging={}, Loopback only={}",
        config.max_file_upload_size_mib,
        config.local_files_dir.display(),
        config.staging_dir().display(),
        config.require_loopback_hooks
    );
    if config.shared_secret.is_empty() {
        warn!("⚠️  SHARED_SECRET is not set; every hook call will be rejected");
    }

    let quota = Arc::new(DatabaseQuotaGuard::new(db.clone()));
    let hook_service = Arc::new(HookService::new(db.clone(), quota, config.clone()));

    let state = AppState {
        db,
        hook_service,
        config,
    };

    let app = create_app(state);
    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ Hook server listening on: http://{}", addr);
    info!("📖 Swagger UI documentation: http://{}/swagger-ui", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("👋 Hook service exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
