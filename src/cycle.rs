//! The per-invocation collector cycle:
//! load -> sample -> merge -> evict -> persist -> render.
//! Everything up to and including persisting is fatal on failure; chart
//! rendering only ever degrades.

use std::path::PathBuf;

use chrono::Local;
use thiserror::Error;

use crate::buffer::WindowBuffer;
use crate::chart::{self, ChartOutcome, ChartRenderer};
use crate::codec::{self, CodecError};
use crate::config::WindowConfig;
use crate::sampler::Sampler;
use crate::source::MetricsSource;

#[derive(Debug, Error)]
pub enum CycleError {
    /// The data file exists but did not parse. Unless the window opts into
    /// `reset_on_corrupt`, the cycle aborts and the file is left in place
    /// for inspection.
    #[error("persisted state at {} is corrupt", path.display())]
    CorruptState {
        path: PathBuf,
        #[source]
        source: CodecError,
    },
    /// A metrics reading failed. Nothing is recorded; a row with missing
    /// columns would poison the positional file format.
    #[error("metrics source unavailable")]
    SourceUnavailable(#[source] anyhow::Error),
    /// The rewritten window could not be persisted. The previous file is
    /// intact (the codec writes through a temp file and rename).
    #[error("failed to persist window state to {}", path.display())]
    PersistFailure {
        path: PathBuf,
        #[source]
        source: CodecError,
    },
}

#[derive(Debug)]
pub struct CycleReport {
    pub loaded: usize,
    pub evicted: usize,
    pub retained: usize,
    pub charts: ChartOutcome,
}

/// One run-to-completion pass over a single named window.
pub struct CollectorCycle<'a> {
    name: &'a str,
    window: &'a WindowConfig,
}

impl<'a> CollectorCycle<'a> {
    pub fn new(name: &'a str, window: &'a WindowConfig) -> Self {
        Self { name, window }
    }

    pub fn run<S: MetricsSource>(
        &self,
        sampler: &mut Sampler<S>,
        renderer: &dyn ChartRenderer,
    ) -> Result<CycleReport, CycleError> {
        // Loading
        let samples = match codec::load(&self.window.data_path) {
            Ok(samples) => samples,
            Err(e @ CodecError::Corrupt { .. }) if self.window.reset_on_corrupt => {
                log::warn!(
                    "window '{}': discarding corrupt state and starting fresh: {}",
                    self.name,
                    e
                );
                Vec::new()
            }
            Err(source) => {
                return Err(CycleError::CorruptState {
                    path: self.window.data_path.clone(),
                    source,
                })
            }
        };
        let loaded = samples.len();
        let mut buffer = WindowBuffer::new(samples);
        log::debug!("window '{}': loaded {} samples", self.name, loaded);

        // Sampling
        let sample = sampler.measure().map_err(CycleError::SourceUnavailable)?;

        // Merging
        buffer.append(sample);
        let now = Local::now().naive_local();
        let evicted = buffer.evict_older_than(self.window.window_seconds, now);
        let retained = buffer.len();

        // Persisting
        codec::save(&self.window.data_path, buffer.samples()).map_err(|source| {
            CycleError::PersistFailure {
                path: self.window.data_path.clone(),
                source,
            }
        })?;

        // Rendering (never fatal)
        let charts = chart::render_all(&buffer, renderer, &self.window.plot_dir, self.name);

        log::info!(
            "window '{}': {} loaded, {} evicted, {} retained, {} charts rendered ({} failed)",
            self.name,
            loaded,
            evicted,
            retained,
            charts.rendered,
            charts.failed,
        );

        Ok(CycleReport {
            loaded,
            evicted,
            retained,
            charts,
        })
    }
}
