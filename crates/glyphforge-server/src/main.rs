#![doc = include_str!("../README.md")]

mod server;

use anyhow::Context;
use clap::Parser;
use glyphforge::{
    CommandFontSynthesizer, FontPipeline, FsGlyphStore, GlyphStore, IconIntake, WorkArea,
    ZipArchiveWriter,
};
use server::config::{CliArgs, ServerConfig};
use server::routes::{AppState, router};
use server::telemetry::init_telemetry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    init_telemetry();

    let store = FsGlyphStore::new(&config.assets_dir);
    store
        .ensure()
        .await
        .context("failed to create the assets directory")?;
    let work = WorkArea::new(&config.work_dir);
    work.ensure()
        .await
        .context("failed to create the work directory")?;

    let store: Arc<dyn GlyphStore> = Arc::new(store);
    let synthesizer = Arc::new(
        CommandFontSynthesizer::new(config.synth_command.clone())
            .with_args(config.synth_args.clone()),
    );
    let intake = Arc::new(
        IconIntake::new(Arc::clone(&store)).with_max_batch_files(config.max_batch_files),
    );
    let pipeline = Arc::new(FontPipeline::new(
        Arc::clone(&store),
        synthesizer,
        Arc::new(ZipArchiveWriter),
        work,
    ));

    let state = AppState {
        store,
        intake,
        pipeline,
    };
    let app = router(state, &config.assets_dir, config.max_body_bytes);

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    log_startup_info(&config);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shut down successfully");
    Ok(())
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting glyphforge-server on {} with full config: {:#?}",
            config.listen_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting glyphforge-server on {} (synth command: {})",
            config.listen_addr,
            config.synth_command
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
}
