//! Newline-delimited JSON output for the command-line drivers.

use std::io::Write;

use anyhow::Context;
use serde::Serialize;
use tracing::warn;

/// Writes one JSON value per line and keeps the first failure for
/// [`JsonLines::finish`]. Values emitted after a failure are dropped.
pub struct JsonLines<W> {
    out: W,
    error: Option<anyhow::Error>,
}

impl<W: Write> JsonLines<W> {
    pub fn new(out: W) -> Self {
        Self { out, error: None }
    }

    pub fn emit<T: Serialize + ?Sized>(&mut self, value: &T) {
        if self.error.is_some() {
            return;
        }
        let result = serde_json::to_string(value)
            .context("failed to serialize output line")
            .and_then(|line| writeln!(self.out, "{line}").context("failed to write output line"));
        if let Err(err) = result {
            warn!(error = %err, "output stopped");
            self.error = Some(err);
        }
    }

    /// Flushes the writer, or returns the first failure seen by [`JsonLines::emit`].
    pub fn finish(mut self) -> anyhow::Result<()> {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.out.flush().context("failed to flush output")
    }
}
