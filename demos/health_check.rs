//! Health check against the database described by `POSTGRES_*`
//!
//! Prints one JSON line on success and exits non-zero on failure.
//!
//! Run with:
//! ```bash
//! POSTGRES_USER=postgres POSTGRES_PASSWORD=postgres POSTGRES_HOST=localhost \
//!     POSTGRES_PORT=5432 POSTGRES_DB=postgres \
//!     cargo run --example health_check
//! ```

use pg_provider::ConnectionProvider;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("health check failed [{}]: {}", err.kind(), err);
        std::process::exit(1);
    }
}

async fn run() -> pg_provider::Result<()> {
    let mut provider = ConnectionProvider::from_env()?;
    tracing::info!(target_url = %provider.target(), "checking database");

    let health = provider
        .check(Duration::from_secs(5), Duration::from_secs(5))
        .await?;

    println!(
        "{}",
        serde_json::json!({
            "status": "ok",
            "endpoint": provider.target().endpoint(),
            "server_version": health.server_version(),
        })
    );
    Ok(())
}
