use backend_lib::ai::backend::{CompletionBackend, GeminiBackend};
use backend_lib::config::Settings;
use backend_lib::{ws_router, AppState};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Collaboration server for shared coding rooms.
#[derive(Parser, Debug)]
#[command(name = "coderoom-server", version, about)]
struct Args {
    /// Config file to load instead of the default search locations
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    // RUST_LOG wins over the configured level when set
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level)),
        )
        .init();

    let backend = match settings.ai.api_key.clone() {
        Some(api_key) => {
            let gemini = GeminiBackend::new(
                api_key,
                settings.ai.model.clone(),
                settings.ai.max_output_tokens,
            )?;
            info!(model = %settings.ai.model, "completion backend configured");
            Some(Arc::new(gemini) as Arc<dyn CompletionBackend>)
        }
        None => {
            warn!("no API key configured, assistant endpoints will report unavailable");
            None
        }
    };

    let addr = settings.bind_addr();
    let state = Arc::new(AppState::new(settings, backend));
    let app = ws_router::create_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
