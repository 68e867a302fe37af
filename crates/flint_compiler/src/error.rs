//! Errors encountered during compilation.

use compact_str::CompactString;
use core::fmt;
use flint_span::Span;

/// A compile error with its source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// The type of compile error.
    pub kind: CompileErrorKind,
    /// The 1-based line the error was reported at.
    pub line: usize,
    /// The offending span.
    pub span: Span,
}

impl CompileError {
    /// Write the deterministic single-line report: `[line N] Error: MESSAGE`.
    ///
    /// # Errors
    /// This function will error if it can not write into the buffer.
    pub fn format(&self, buffer: &mut impl fmt::Write) -> Result<(), fmt::Error> {
        write!(buffer, "[line {}] Error: {}", self.line, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// The scanner produced an error token.
    Scanner {
        /// The scanner's message.
        message: &'static str,
    },
    /// A token with no prefix rule where an expression was required.
    ExpectedExpression,
    /// A specific token was required but something else was found.
    Expected {
        /// A full "expected X after Y" style message.
        what: &'static str,
    },
    /// The target of an assignment is not assignable.
    InvalidAssignmentTarget,
    /// A local with the same name already exists in this scope.
    DuplicateLocal {
        /// The variable name.
        name: CompactString,
    },
    /// A local was read inside its own initializer.
    ReadInOwnInitializer {
        /// The variable name.
        name: CompactString,
    },
    /// The chunk's constant pool is full.
    TooManyConstants,
    /// The function declares more than 256 locals.
    TooManyLocals,
    /// The function captures more than 256 variables.
    TooManyUpvalues,
    /// The function declares more than 255 parameters.
    TooManyParameters,
    /// A call supplies more than 255 arguments.
    TooManyArguments,
    /// A jump offset does not fit in a signed 16-bit operand.
    JumpTooFar,
    /// `return` at top level.
    ReturnAtTopLevel,
    /// `return <value>;` inside an initializer.
    ReturnValueFromInitializer,
    /// `this` outside of a class body.
    ThisOutsideClass,
}

impl fmt::Display for CompileErrorKind {
    #[expect(
        clippy::min_ident_chars,
        reason = "keep consistent with trait definition."
    )]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Scanner { message } => write!(f, "{message}"),
            Self::ExpectedExpression => write!(f, "expected expression"),
            Self::Expected { what } => write!(f, "{what}"),
            Self::InvalidAssignmentTarget => write!(f, "invalid assignment target"),
            Self::DuplicateLocal { ref name } => {
                write!(f, "variable '{name}' already declared in this scope")
            }
            Self::ReadInOwnInitializer { ref name } => {
                write!(f, "cannot read variable '{name}' in its own initializer")
            }
            Self::TooManyConstants => write!(f, "too many constants in one chunk"),
            Self::TooManyLocals => write!(f, "too many local variables in function"),
            Self::TooManyUpvalues => write!(f, "too many captured variables in function"),
            Self::TooManyParameters => write!(f, "cannot have more than 255 parameters"),
            Self::TooManyArguments => write!(f, "cannot have more than 255 arguments"),
            Self::JumpTooFar => write!(f, "too much code to jump over"),
            Self::ReturnAtTopLevel => write!(f, "cannot return from top-level code"),
            Self::ReturnValueFromInitializer => {
                write!(f, "cannot return a value from an initializer")
            }
            Self::ThisOutsideClass => write!(f, "cannot use 'this' outside of a class"),
        }
    }
}
