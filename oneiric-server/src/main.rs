use clap::Parser;
use oneiric_core::OneiricConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use oneiric_server::{http, subsystems};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "oneiric.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config = match OneiricConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Connect to DB
    let pool = match oneiric_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match oneiric_core::db::postgres_version(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        match oneiric_core::db::pgvector_version(&pool).await {
            Ok(Some(v)) => println!("✅ pgvector version: {}", v),
            Ok(None) => {
                println!("❌ pgvector extension not installed — run schema.sql first");
                std::process::exit(1);
            }
            Err(e) => {
                println!("❌ pgvector check failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ Oneiric DB health check passed");
        return Ok(());
    }

    // Shutdown signal
    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    // Spawn the embedding backfill worker
    match subsystems::embedder::create_backend_from_config(&config) {
        Ok(backend) => {
            let backfill_pool = pool.clone();
            let backfill_config = config.embedding.clone();
            let backfill_backend: std::sync::Arc<dyn oneiric_core::embeddings::EmbeddingBackend> =
                std::sync::Arc::from(backend);
            tokio::spawn(subsystems::embedder::run_backfill_worker(
                backfill_pool,
                backfill_backend,
                backfill_config,
            ));
        }
        Err(e) => {
            tracing::warn!("Backfill worker skipped: failed to create embedding backend: {}", e);
        }
    }

    // HTTP API server (foreground)
    http::start_http_server(pool, config, tx.subscribe()).await?;

    Ok(())
}
