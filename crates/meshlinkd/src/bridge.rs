//! Bridge that writes each publish as one JSON line.
//!
//! Stands in for the upstream serial link: anything reading the daemon's
//! stdout sees `{"channel":"ESP-send","payload":"156"}` per forwarded item.

use std::io::{self, Write};
use std::sync::Mutex;

use serde::Serialize;

use meshlink_services::{Bridge, BridgeError};

#[derive(Serialize)]
struct BridgeLine<'a> {
    channel: &'a str,
    payload: &'a str,
}

pub struct JsonLinesBridge<W: Write + Send> {
    out: Mutex<W>,
}

impl JsonLinesBridge<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonLinesBridge<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> Bridge for JsonLinesBridge<W> {
    fn publish(&self, channel: &str, payload: &str) -> Result<(), BridgeError> {
        let failed = |reason: String| BridgeError::PublishFailed {
            channel: channel.to_string(),
            reason,
        };
        let mut out = self
            .out
            .lock()
            .map_err(|_| failed("bridge writer poisoned".into()))?;
        serde_json::to_writer(&mut *out, &BridgeLine { channel, payload })
            .map_err(|e| failed(e.to_string()))?;
        out.write_all(b"\n").map_err(|e| failed(e.to_string()))?;
        out.flush().map_err(|e| failed(e.to_string()))?;
        tracing::debug!(channel, payload, "bridged");
        Ok(())
    }
}
