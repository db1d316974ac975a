//! Collector binary: runs exactly one sampling cycle per configured window
//! and exits. Scheduling and retries belong to loadchart-watch.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use simplelog::{Config as LogConfig, LevelFilter, WriteLogger};

use loadchart::chart::CairoChartRenderer;
use loadchart::config::Config;
use loadchart::cycle::CollectorCycle;
use loadchart::sampler::Sampler;
use loadchart::source::SysinfoSource;

fn main() -> Result<()> {
    let config_path = parse_config_arg();
    let config =
        Config::load(config_path.as_deref()).context("Failed to load configuration")?;

    // File logging when enabled, env_logger otherwise.
    if config.logging.enabled {
        let log_dir = Path::new(&config.logging.log_path);
        if !log_dir.exists() {
            fs::create_dir_all(log_dir).context("Failed to create log directory")?;
        }
        let _ = WriteLogger::init(
            LevelFilter::Info,
            LogConfig::default(),
            fs::File::create(log_dir.join("loadchart.log"))
                .context("Failed to create log file")?,
        );
    } else {
        env_logger::init();
    }

    config.ensure_directories()?;
    log::info!(
        "loadchart v{}: {} window(s) configured",
        env!("CARGO_PKG_VERSION"),
        config.windows.len()
    );

    let source = SysinfoSource::new();
    let mut sampler = Sampler::new(
        source,
        Duration::from_millis(config.sampling.cpu_interval_ms),
        Duration::from_millis(config.sampling.net_interval_ms),
        config.sampling.disk_mount.clone(),
    );
    let renderer = CairoChartRenderer::new(config.charts.width, config.charts.height);

    for (name, window) in &config.windows {
        let report = CollectorCycle::new(name, window)
            .run(&mut sampler, &renderer)
            .with_context(|| format!("cycle failed for window '{}'", name))?;
        if report.charts.failed > 0 {
            log::warn!(
                "window '{}': {} chart(s) failed to render; data was persisted",
                name,
                report.charts.failed
            );
        }
    }

    Ok(())
}

fn parse_config_arg() -> Option<PathBuf> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
