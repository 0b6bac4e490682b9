use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use claquete_core::{
    load_config, MediaUploader, MuxHost, Orchestrator, PollPolicy, SchedulerConfig,
    SqliteVideoStore, YtDlp,
};
use claqueted::router;

#[derive(Parser, Debug)]
#[command(author, version, about = "Claquete video ingestion daemon", long_about = None)]
struct Cli {
    /// Caminho do claquete.toml principal
    #[arg(long, default_value = "configs/claquete.toml")]
    config: PathBuf,
    /// Endereço de escuta da API
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let downloads_dir = config.downloads_dir();
    tokio::fs::create_dir_all(&downloads_dir).await?;
    let database_path = config.database_path();
    if let Some(parent) = database_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let store = SqliteVideoStore::new(&database_path)?;
    store.initialize()?;

    let extractor = YtDlp::new(
        config.extractor.binary.as_str(),
        &downloads_dir,
        config.extractor.subtitle_langs.as_str(),
    );
    let uploader = MediaUploader::new(MuxHost::new(&config.mux), config.mux.playback_base.as_str())
        .with_poll_policy(PollPolicy {
            max_attempts: config.mux.poll_max_attempts,
            interval: std::time::Duration::from_secs(config.mux.poll_interval_seconds),
        });
    let orchestrator = Orchestrator::new(
        store,
        extractor,
        uploader,
        SchedulerConfig::from_queue_config(&config.queue),
    )?;

    let listener = tokio::net::TcpListener::bind(cli.bind).await?;
    info!(addr = %cli.bind, db = %database_path.display(), "claqueted listening");
    axum::serve(listener, router(orchestrator)).await?;
    Ok(())
}
