// logging.rs
use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{create_dir_all, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

pub fn setup_logging(cfg: &LoggingConfig) -> Result<()> {
    let level = cfg
        .level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    if !cfg.save_logs {
        fmt().with_env_filter(env_filter).init();
        return Ok(());
    }

    let path = log_file_path(cfg);
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        create_dir_all(dir).with_context(|| format!("creating log directory {}", dir.display()))?;
    }
    let file = File::create(&path).with_context(|| format!("creating log file {}", path.display()))?;

    // each event gets its own handle; a failed clone falls back to stderr
    let writer = move || -> Box<dyn std::io::Write> {
        match file.try_clone() {
            Ok(f) => Box::new(BufWriter::new(f)),
            Err(_) => Box::new(std::io::stderr()),
        }
    };

    fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Ok(())
}

/// Fixed path when `rewrite_last_logs` is set, otherwise one file per run.
fn log_file_path(cfg: &LoggingConfig) -> PathBuf {
    if cfg.rewrite_last_logs {
        return PathBuf::from(&cfg.log_file_path);
    }
    let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let base = Path::new(&cfg.log_file_path).with_extension("");
    PathBuf::from(format!("{}-{}.log", base.display(), stamp))
}
