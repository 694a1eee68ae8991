use anyhow::Result;
use clap::Parser;
use recsys_core::SharedRecommender;
use server::{build_app, load_recommender, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Artifact root directory
    #[arg(long, default_value = "./artifacts")]
    artifacts: String,
    /// Build id to serve; defaults to CURRENT
    #[arg(long)]
    build_id: Option<String>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Give up on startup if artifacts are not loaded within this many seconds
    #[arg(long, default_value_t = 30)]
    load_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let load_timeout = Duration::from_secs(args.load_timeout_secs);
    let root = PathBuf::from(&args.artifacts);

    let recommender = match load_recommender(root.clone(), args.build_id.clone(), load_timeout).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, artifacts = %args.artifacts, "refusing to start without consistent artifacts");
            return Err(e);
        }
    };
    let shared = Arc::new(SharedRecommender::new());
    shared.install(recommender);

    let state = AppState {
        artifacts_root: root,
        recommender: shared.clone(),
        admin_token: std::env::var("ADMIN_TOKEN").ok(),
        load_timeout,
    };
    let app = build_app(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    shared.shutdown();
    Ok(())
}
