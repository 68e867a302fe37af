use crate::ReportableError;
use ariadne::{Color, Config, Label, Report as AReport, ReportKind, Source};
use core::ops;
use flint_compiler::error::{CompileError, CompileErrorKind};
use std::io;

type Report<'err> = AReport<'err, (&'err str, ops::Range<usize>)>;

impl ReportableError for CompileError {
    fn report(&self, buffer: &mut String, path: &str, text: &str) {
        let mut output = io::Cursor::new(Vec::new());

        let specific = match self.kind {
            CompileErrorKind::Scanner { .. } => "the scanner could not read this.",
            CompileErrorKind::ExpectedExpression => "an expression was required here.",
            CompileErrorKind::Expected { .. } => "found this instead.",
            CompileErrorKind::InvalidAssignmentTarget => "this cannot be assigned to.",
            CompileErrorKind::DuplicateLocal { .. } => "this name is already taken.",
            CompileErrorKind::ReadInOwnInitializer { .. } => {
                "the variable is not initialized yet."
            }
            CompileErrorKind::TooManyConstants
            | CompileErrorKind::TooManyLocals
            | CompileErrorKind::TooManyUpvalues
            | CompileErrorKind::TooManyParameters
            | CompileErrorKind::TooManyArguments => "the limit was exceeded here.",
            CompileErrorKind::JumpTooFar => "this jump does not fit in its operand.",
            CompileErrorKind::ReturnAtTopLevel => "top-level code cannot return.",
            CompileErrorKind::ReturnValueFromInitializer => {
                "initializers always return their instance."
            }
            CompileErrorKind::ThisOutsideClass => "there is no enclosing class here.",
        };

        let report = format_error(path, self.span.range(), &self.kind.to_string(), specific);
        report
            .write((path, Source::from(text)), &mut output)
            .expect("write into buffer should not fail.");
        buffer.push_str(
            &String::from_utf8(output.into_inner())
                .expect("buffer consists of only valid UTF-8 bytes."),
        );
    }
}

fn format_error<'err>(
    path: &'err str,
    span: ops::Range<usize>,
    overall: &str,
    specific: &str,
) -> Report<'err> {
    Report::build(ReportKind::Error, (path, span.clone()))
        .with_message(overall)
        .with_config(Config::default().with_compact(true))
        .with_label(
            Label::new((path, span))
                .with_color(Color::Red)
                .with_message(specific),
        )
        .finish()
}
