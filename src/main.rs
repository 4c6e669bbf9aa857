//! cam-agent — device-side cloud agent binary.
//!
//! Usage:
//!   cam-agent run    --config agent.toml
//!   cam-agent status --config agent.toml

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cam_agent::agent::{Agent, AgentDeps, NullCallback};
use cam_agent::config::AgentConfig;
use cam_agent::event::source::ManualEventSource;
use cam_agent::protocol::persisted::InMemoryPersistedState;
use cam_agent::storage::InMemoryStorage;
use cam_agent::stream::{DemoSource, MediaSource};

#[derive(Parser)]
#[command(name = "cam-agent", about = "Device-side cloud agent for a camera", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to the cloud and run until Ctrl-C.
    Run {
        #[arg(short, long, default_value = "agent.toml")]
        config: PathBuf,
    },
    /// Load and validate the config, print a summary, and exit.
    Status {
        #[arg(short, long, default_value = "agent.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { config } => run(config).await,
        Command::Status { config } => status(config),
    }
}

fn status(config_path: PathBuf) {
    let cfg = match AgentConfig::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!("=== cam-agent status ===");
    println!("Device      : {} {} (sn {})", cfg.device.brand, cfg.device.model, cfg.device.sn);
    println!("Control URL : {}", cfg.cloud.control_url);
    println!("Streams     : {}", cfg.streams.len());
    for s in &cfg.streams {
        println!("  {} (video={:?}, audio={:?})", s.cloud_name, s.video_es, s.audio_es);
    }
    println!(
        "Uploads     : {} video / {} snapshot concurrent, {}s lateness cap",
        cfg.upload.max_concurrent_video_uploads,
        cfg.upload.max_concurrent_snapshot_uploads,
        cfg.upload.max_video_uploads_queue_lateness_secs,
    );
}

async fn run(config_path: PathBuf) {
    let cfg = match AgentConfig::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    info!(device = %cfg.device.uuid, streams = cfg.streams.len(), "starting cam-agent");

    let media_sources: Vec<Arc<dyn MediaSource>> = if cfg.streams.is_empty() {
        vec![Arc::new(DemoSource::new("main"))]
    } else {
        cfg.streams.iter().map(|s| Arc::new(DemoSource::new(s.cloud_name.clone())) as Arc<dyn MediaSource>).collect()
    };

    // A single demo motion source, driven by nothing in this reference
    // binary; a real embedder supplies its own `EventSource` impls wired to
    // actual detectors instead.
    let (motion_source, _motion_tx) = ManualEventSource::new("motion");

    let deps = AgentDeps {
        media_sources,
        event_sources: vec![Arc::new(motion_source)],
        local_storage: Arc::new(InMemoryStorage::new()),
        persisted: Arc::new(InMemoryPersistedState::new()),
    };

    let agent = match Agent::create(cfg, Arc::new(NullCallback), deps) {
        Ok(a) => a,
        Err(e) => {
            error!(error = %e, "failed to build agent");
            std::process::exit(1);
        }
    };

    agent.start();

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl-C, shutting down"),
        Err(e) => error!(error = %e, "signal handler error"),
    }

    agent.stop().await;
}
