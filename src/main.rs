use artshare::config::Config;
use artshare::db::Database;
use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        listen_addr = %cfg.listen_addr,
        public_url = %cfg.public_url,
        loglevel = %cfg.loglevel,
        github_client_id = %cfg.github_client_id,
        db_max_connections = cfg.db_max_connections,
    );
    if cfg.github_client_id.is_empty() {
        warn!("AUTH_GITHUB_ID is not set; GitHub sign-in will fail");
    }

    let db = Database::connect(&cfg.database_url, cfg.db_max_connections).await?;
    db.init_schema().await?;
    match db.delete_expired_sessions().await {
        Ok(n) if n > 0 => info!(count = n, "purged expired sessions"),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "failed to purge expired sessions"),
    }

    let state = artshare::AppState::new(db, &cfg)?;
    let app = artshare::artshare_router(state);

    let listener = TcpListener::bind(cfg.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = on_signal("Ctrl-C", signal::ctrl_c());

    #[cfg(unix)]
    let terminate = on_signal("SIGTERM", async {
        let mut sig = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        sig.recv().await;
        Ok(())
    });

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Resolves when `listener` sees the signal. A listener that cannot be
/// installed never resolves, so it cannot stop the server.
async fn on_signal<F>(name: &str, listener: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = listener.await {
        warn!(error = %e, "failed to listen for {name}");
        std::future::pending::<()>().await;
    }
}
