//! Supervisor binary: re-invokes the collector at a fixed cadence, backing
//! off when it fails. Retry policy lives entirely here; the collector itself
//! is a single idempotent cycle.

use std::env;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, RecvTimeoutError};

const PAUSE: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

fn main() -> Result<()> {
    env_logger::init();

    let collector = env::current_exe()
        .context("cannot determine own path")?
        .with_file_name("loadchart");
    let passthrough: Vec<String> = env::args().skip(1).collect();

    let (interrupt_tx, interrupt_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.try_send(());
    })
    .context("failed to install interrupt handler")?;

    log::info!("supervising {}", collector.display());

    let mut backoff = PAUSE;
    loop {
        let status = Command::new(&collector)
            .args(&passthrough)
            .status()
            .with_context(|| format!("failed to launch {}", collector.display()))?;

        let pause = if status.success() {
            backoff = PAUSE;
            PAUSE
        } else {
            log::warn!(
                "collector exited with {}, retrying in {:?}",
                status,
                backoff
            );
            let pause = backoff;
            backoff = (backoff * 2).min(MAX_BACKOFF);
            pause
        };

        // Interruptible pause: Ctrl-C stops the loop between invocations.
        match interrupt_rx.recv_timeout(pause) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                log::info!("interrupted, stopping supervisor");
                return Ok(());
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}
