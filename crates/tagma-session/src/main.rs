//! Replays recorded detections through the temporal compiler.
//!
//! Usage: `tagma-replay [RECORDING]`. Reads JSON lines from the file, or
//! stdin when no path is given, and prints one published result per line.

use anyhow::Context;
use std::fs::File;
use std::io::{self, BufReader, Write};
use tracing::{error, info, warn};

use tagma_session::{init_metrics, init_tracing, replay, SessionConfig};

fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = SessionConfig::from_env();
    if let Err(e) = init_tracing(config.log_format) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    if let Err(e) = run(&config) {
        error!("Replay failed: {:#}", e);
        std::process::exit(1);
    }
}

fn run(config: &SessionConfig) -> anyhow::Result<()> {
    config.validate().context("invalid configuration")?;
    info!("Replay config: {:?}", config.detection);

    let metrics = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            None
        }
    };

    let outputs = match std::env::args().nth(1) {
        Some(path) => {
            let file = File::open(&path).with_context(|| format!("failed to open {path}"))?;
            replay(BufReader::new(file), &config.detection)?
        }
        None => replay(io::stdin().lock(), &config.detection)?,
    };

    let mut stdout = io::stdout().lock();
    for output in &outputs {
        serde_json::to_writer(&mut stdout, output)?;
        writeln!(stdout)?;
    }

    info!(published = outputs.len(), "Replay finished");
    if let Some(handle) = metrics {
        info!("Metrics:\n{}", handle.render());
    }
    Ok(())
}
