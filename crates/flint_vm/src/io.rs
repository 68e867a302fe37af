//! The IO interface for interpreter output.

use core::fmt;
use std::io::Write as _;

/// Where `print` output goes. Errors and back-traces do not pass through
/// here; the embedder writes those itself.
pub trait IoContext: fmt::Write {}

/// Forwards to the process stdout.
pub struct StdoutContext;

impl fmt::Write for StdoutContext {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut stdout = std::io::stdout();
        stdout
            .write_all(s.as_bytes())
            .and_then(|()| stdout.flush())
            .map_err(|_err| fmt::Error)
    }
}

impl IoContext for StdoutContext {}

/// Collects output in memory. Used by tests.
#[derive(Default)]
pub struct BufferContext {
    data: String,
}

impl fmt::Write for BufferContext {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.data.push_str(s);
        Ok(())
    }
}

impl IoContext for BufferContext {}

impl BufferContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the collected output.
    #[must_use]
    pub fn flush(self) -> String {
        self.data
    }
}
