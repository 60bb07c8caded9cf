use std::path::PathBuf;

use clap::Parser;
use lingua_server::{api::api_router, config::Config, store, utils::init_log};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides the config file)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Address to bind (overrides the config file)
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to bind (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(database) = args.database {
        config.database = database;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    let _guard = init_log(config.log_dir.clone());

    let options = SqliteConnectOptions::new()
        .filename(&config.database)
        .create_if_missing(true);
    let database = SqlitePool::connect_with(options).await?;
    store::init_schema(&database).await?;

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(5)));

    let app = api_router(database)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
