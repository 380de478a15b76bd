use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use kb::config::{DEFAULT_SIMILARITY_FLOOR, DEFAULT_TOP_K};
use kb::{KbConfig, KnowledgeEngine};
use server::build_app;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "kb-server")]
#[command(about = "Knowledge-base context extraction and retrieval service", long_about = None)]
struct Args {
    /// Directory of markdown knowledge-base documents
    #[arg(long, default_value = "./kb")]
    kb_dir: PathBuf,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 5000)]
    port: u16,
    /// Documents returned per query when the request does not say
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,
    /// Similarity floor; results scoring at or below it are dropped
    #[arg(long, default_value_t = DEFAULT_SIMILARITY_FLOOR)]
    min_score: f32,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let config = KbConfig {
        kb_dir: args.kb_dir,
        top_k: args.top_k,
        similarity_floor: args.min_score,
        ..KbConfig::default()
    };
    // Without a linguistic pipeline there is nothing to serve.
    let engine =
        KnowledgeEngine::new(config).context("failed to initialize knowledge engine")?;
    let app: Router = build_app(Arc::new(engine));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
