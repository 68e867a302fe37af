use crate::{ReportableError, line_range};
use ariadne::{Color, Config, Label, Report as AReport, ReportKind, Source};
use core::fmt::Write as _;
use core::ops;
use flint_vm::error::RuntimeError;
use std::io;

type Report<'err> = AReport<'err, (&'err str, ops::Range<usize>)>;

impl ReportableError for RuntimeError {
    fn report(&self, buffer: &mut String, path: &str, text: &str) {
        let mut output = io::Cursor::new(Vec::new());

        // The VM attributes errors to lines, not spans; label the whole
        // faulting line.
        let range = line_range(text, self.line);
        let report: Report<'_> = Report::build(ReportKind::Error, (path, range.clone()))
            .with_message(self.kind.to_string())
            .with_config(Config::default().with_compact(true))
            .with_label(
                Label::new((path, range))
                    .with_color(Color::Red)
                    .with_message("the error occurred on this line."),
            )
            .finish();

        report
            .write((path, Source::from(text)), &mut output)
            .expect("write into buffer should not fail.");
        buffer.push_str(
            &String::from_utf8(output.into_inner())
                .expect("buffer consists of only valid UTF-8 bytes."),
        );

        for frame in &self.trace {
            writeln!(buffer, " in line {}, function {}", frame.line, frame.function)
                .expect("writing to a string shouldn't normally error.");
        }
    }
}
