//! Runtime errors with source attribution and a call back-trace.

use compact_str::CompactString;
use core::fmt;
pub use flint_runtime::error::RuntimeErrorKind;

/// One frame of the back-trace, innermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    /// The name of the frame's function.
    pub function: CompactString,
    /// The line the frame was executing.
    pub line: usize,
}

/// A runtime error, as surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    /// The type of runtime error.
    pub kind: RuntimeErrorKind,
    /// The line of the faulting instruction.
    pub line: usize,
    /// Every live frame at the time of the error, innermost first.
    pub trace: Vec<TraceFrame>,
}

impl RuntimeError {
    /// Write the deterministic report: the message, then one line per frame
    /// from innermost to outermost.
    ///
    /// # Errors
    /// This function will error if it can not write into the buffer.
    pub fn format(&self, buffer: &mut impl fmt::Write) -> Result<(), fmt::Error> {
        write!(buffer, "{}", self.kind)?;
        for frame in &self.trace {
            write!(buffer, "\n in line {}, function {}", frame.line, frame.function)?;
        }
        Ok(())
    }
}
