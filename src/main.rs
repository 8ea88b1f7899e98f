mod cache;
mod config;
mod db;
mod error;
mod handlers;
mod llm;
mod settings;
mod templates;
mod utils;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "querycrafter")]
#[command(about = "Schema-aware SQL assistant for MySQL", long_about = None)]
struct Args {
    /// Host for HTTP server
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port for HTTP server
    #[arg(short, long, env = "PORT", default_value = "5000")]
    port: u16,

    /// Do not open browser automatically
    #[arg(long = "no-open")]
    no_open: bool,

    /// Base path when running behind reverse proxy (e.g. /querycrafter)
    #[arg(long, default_value = "/")]
    base_path: String,

    /// Directory holding settings and the schema cache
    #[arg(long, env = "QUERYCRAFTER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(flatten)]
    database: config::DatabaseOverrides,

    #[command(flatten)]
    model: config::ModelOverrides,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Failed to load .env file: {}", e),
    }

    let args = Args::parse();

    let paths = config::Paths::resolve(args.data_dir.as_deref())?;
    config::init_directories(&paths)?;
    tracing::info!("Using data directory {}", paths.data_dir.display());

    let base_path = normalize_base_path(&args.base_path);
    let state = Arc::new(handlers::AppState {
        paths,
        database_overrides: args.database,
        model_overrides: args.model,
        completion: Arc::new(llm::openai::OpenAiClient::new()),
        base_path: base_path.clone(),
    });

    let app = handlers::build_router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}{}", addr, base_path);

    if !args.no_open {
        let url = format!("http://{}{}", addr, base_path);
        if let Err(e) = utils::browser::open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
            tracing::info!("Please open {} manually", url);
        }
    }

    axum::serve(listener, app).await?;

    Ok(())
}

fn normalize_base_path(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == "/" {
        return "/".to_string();
    }
    let mut path = trimmed.to_string();
    if !path.starts_with('/') {
        path.insert(0, '/');
    }
    while path.ends_with('/') {
        path.pop();
    }
    path
}
