//! One measurement cycle.
//! Queries the metrics source once per field and produces a single
//! timestamped row, or fails as a whole; partial rows never exist.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;

use crate::sample::Sample;
use crate::source::MetricsSource;

pub struct Sampler<S: MetricsSource> {
    source: S,
    cpu_interval: Duration,
    net_interval: Duration,
    disk_mount: PathBuf,
}

impl<S: MetricsSource> Sampler<S> {
    pub fn new(source: S, cpu_interval: Duration, net_interval: Duration, disk_mount: PathBuf) -> Self {
        Self {
            source,
            cpu_interval,
            net_interval,
            disk_mount,
        }
    }

    /// Takes one full sample. Blocks for the CPU interval plus the network
    /// interval; both readings need a real-time delta to be a rate rather
    /// than a since-boot counter.
    pub fn measure(&mut self) -> Result<Sample> {
        let cpu_pct = self
            .source
            .cpu_percent(self.cpu_interval)
            .context("cpu reading failed")?;
        let ram_pct = self
            .source
            .memory_percent()
            .context("memory reading failed")?;
        let disk_pct = self
            .source
            .disk_percent(&self.disk_mount)
            .context("disk reading failed")?;

        let before = self
            .source
            .network_io_counters()
            .context("network counters failed")?;
        thread::sleep(self.net_interval);
        let after = self
            .source
            .network_io_counters()
            .context("network counters failed")?;
        let download_mbps =
            after.bytes_recv.saturating_sub(before.bytes_recv) as f64 / (1024.0 * 1024.0);
        let upload_mbps =
            after.bytes_sent.saturating_sub(before.bytes_sent) as f64 / (1024.0 * 1024.0);

        let connections = self
            .source
            .connection_count()
            .context("connection count failed")?;

        let temps = self
            .source
            .temperatures()
            .context("temperature reading failed")?;
        let temperature_c = if temps.is_empty() {
            // No sensors on this host. The positional file format needs a
            // number in every column, so record 0 and make it observable.
            log::warn!("no temperature sensors found, recording 0");
            0.0
        } else {
            temps.iter().sum::<f64>() / temps.len() as f64
        };

        Ok(Sample {
            timestamp: Local::now().naive_local(),
            cpu_pct,
            ram_pct,
            disk_pct,
            download_mbps,
            upload_mbps,
            temperature_c,
            connections,
        })
    }
}
