//! Cloud Gazer - find shapes in photos of clouds
//!
//! Runs either the analysis proxy, which holds the model credential on
//! behalf of clients, or a headless client that drives the
//! capture -> analyze -> display workflow against a photo on disk.

mod analysis;
mod app;
mod capture;
mod config;
mod proxy;
mod shared;
mod storage;
mod vision;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::analysis::AnalysisClient;
use crate::app::WorkflowController;
use crate::capture::encoder::ImageEncoder;
use crate::capture::{CaptureController, StillImageCamera};
use crate::config::AppConfig;
use crate::proxy::AnalysisProxyService;
use crate::shared::WorkflowState;
use crate::vision::GeminiModel;

/// Cloud Gazer - imaginative cloud shape finder
#[derive(Parser, Debug)]
#[command(name = "cloud-gazer")]
#[command(about = "Find shapes of objects and animals in photos of clouds")]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the analysis proxy
    Serve {
        /// Address to bind, overrides `proxy.bind_address`
        #[arg(long)]
        bind: Option<String>,
    },

    /// Analyze one photo through a running proxy
    Gaze {
        /// Photo of clouds
        #[arg(long)]
        image: PathBuf,

        /// Analyze endpoint URL, overrides `client.endpoint`
        #[arg(long)]
        endpoint: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = load_or_create_config(args.config.as_deref())?;

    match args.command {
        Command::Serve { bind } => run_serve(config, bind).await,
        Command::Gaze { image, endpoint } => run_gaze(config, &image, endpoint).await,
    }
}

/// Load configuration from file or create default
///
/// An explicit path must exist and parse. At the default location a missing
/// file is written out with defaults so it can be edited.
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_dir) = storage::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring unreadable configuration {:?}: {}", config_path, e),
            }
        } else {
            let config = AppConfig::default();
            match config::save_config(&config, &config_path) {
                Ok(()) => info!("Wrote default configuration to {:?}", config_path),
                Err(e) => warn!("Could not write default configuration: {}", e),
            }
            return Ok(config);
        }
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

/// Run the proxy until Ctrl-C
async fn run_serve(config: AppConfig, bind: Option<String>) -> Result<()> {
    let settings = config.proxy;
    let bind_address = bind.unwrap_or_else(|| settings.bind_address.clone());

    let api_key = settings.resolve_api_key(|name| std::env::var(name).ok());
    if api_key.is_none() {
        warn!(
            "Environment variable {} is not set; analysis requests will be refused",
            settings.api_key_env
        );
    }

    let model = GeminiModel::new(
        settings.api_base.clone(),
        settings.model.clone(),
        settings.request_timeout(),
    )?;
    let service = Arc::new(AnalysisProxyService::new(api_key, Arc::new(model)));
    let router = proxy::create_router(service, settings.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!(
        "Analysis proxy listening on {} (model {})",
        bind_address, settings.model
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Analysis proxy shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
    }
}

/// Drive one capture -> analyze -> display cycle with a photo standing in for the camera
async fn run_gaze(config: AppConfig, image: &Path, endpoint: Option<String>) -> Result<()> {
    let camera = StillImageCamera::open_file(image, Some(config.capture.preferred_facing))
        .with_context(|| format!("Failed to open {:?}", image))?;
    let capture = CaptureController::new(
        Arc::new(camera),
        ImageEncoder::new(config.capture.jpeg_quality),
    );

    let endpoint = endpoint.unwrap_or_else(|| config.client.endpoint.clone());
    let client = AnalysisClient::new(endpoint, config.client.timeout())?;
    info!("Sending photos to {}", client.endpoint());

    let mut workflow = WorkflowController::new(capture, client, config.capture.preferred_facing);

    if let Err(e) = workflow.start().await {
        println!("{}", e);
        return Ok(());
    }

    let settled = workflow.capture().await?;
    if let Some(photo) = workflow.captured_image() {
        info!(
            "Analyzed {} photo ({} base64 bytes)",
            photo.mime_type(),
            photo.payload().len()
        );
    }

    match settled {
        WorkflowState::ResultsShown => {
            let shapes = workflow.analysis_result().map(Vec::as_slice).unwrap_or(&[]);
            if shapes.is_empty() {
                println!("No shapes found. Try another patch of sky.");
            }
            for (i, shape) in shapes.iter().enumerate() {
                println!("{}. {}: {}", i + 1, shape.shape, shape.description);
            }
        }
        WorkflowState::Error => {
            println!("{}", workflow.error_message().unwrap_or_default());
        }
        other => warn!("Workflow settled in unexpected state {}", other),
    }

    workflow.reset();
    Ok(())
}
