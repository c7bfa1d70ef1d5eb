// main.rs
use anyhow::{Context, Result};
use clap::Parser;
use crane_telemetry::config::load_config;
use crane_telemetry::logging::setup_logging;
use crane_telemetry::processor::FrameProcessor;
use crane_telemetry::session::StreamSession;
use crane_telemetry::token;
use crane_telemetry::view::{LogView, PieSeries};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(version, about = "Live telemetry client for the crane dashboard")]
struct Cli {
    /// Config file, with or without extension
    #[arg(long, default_value = "config")]
    config: String,

    /// Process recorded frames (one JSON frame per line) instead of connecting
    #[arg(long)]
    replay: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.config).context("loading configuration")?;
    setup_logging(&cfg.logging)?;

    for (name, pie) in [
        ("hoist loading", PieSeries::hoist_loading()),
        ("crane operation", PieSeries::crane_operation()),
    ] {
        info!(chart = name, labels = ?pie.labels, percent = ?pie.percentages(), "chart series");
    }

    if let Some(path) = cli.replay {
        let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
        let mut processor = FrameProcessor::new(LogView::default())
            .map_err(|e| anyhow::anyhow!("latency histogram: {e:?}"))?;
        let frames = processor.replay(BufReader::new(file))?;
        info!(frames, stats = ?processor.stats().summary(), "replay finished");
        return Ok(());
    }

    let tokens = token::from_config(&cfg.auth);
    let mut session = StreamSession::new(cfg.feed, LogView::default())?;

    let shutdown = session.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.shutdown();
        }
    });

    session.start(&tokens).await?;
    info!(state = ?session.state(), renders = session.view().renders(), "done");
    Ok(())
}
