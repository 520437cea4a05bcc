//! Console stand-ins for the button and the LED.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast;

use meshlink_services::{Indicator, Level, Trigger};

/// Armed by a console line, consumed by the next `read_trigger`.
#[derive(Default)]
pub struct ConsoleTrigger {
    armed: AtomicBool,
}

impl ConsoleTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl Trigger for ConsoleTrigger {
    fn read_trigger(&self) -> bool {
        self.armed.swap(false, Ordering::SeqCst)
    }
}

/// Arm `trigger` for every `press` or empty line read from `input`.
pub async fn input_loop<R>(
    input: R,
    trigger: Arc<ConsoleTrigger>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown.recv() => return Ok(()),
        };
        let Some(line) = line else {
            tracing::debug!("console input closed");
            return Ok(());
        };
        match line.trim() {
            "" | "press" => {
                tracing::info!("trigger pressed");
                trigger.arm();
            }
            other => tracing::warn!(input = other, "unrecognised console input"),
        }
    }
}

/// Indicator that logs each level change.
pub struct LogIndicator {
    level: AtomicU8,
}

/// Sentinel meaning no level has been set yet.
const UNSET: u8 = u8::MAX;

impl Default for LogIndicator {
    fn default() -> Self {
        Self {
            level: AtomicU8::new(UNSET),
        }
    }
}

impl LogIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn level(&self) -> Option<Level> {
        match self.level.load(Ordering::SeqCst) {
            0 => Some(Level::Low),
            1 => Some(Level::High),
            _ => None,
        }
    }
}

impl Indicator for LogIndicator {
    fn set_indicator(&self, level: Level) {
        let previous = self.level.swap(level.as_u8(), Ordering::SeqCst);
        if previous != level.as_u8() {
            tracing::info!(level = level.as_u8(), "indicator");
        }
    }
}
