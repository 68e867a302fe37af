//! Error kinds produced while operating on runtime values and objects.

use compact_str::CompactString;
use core::fmt;

/// The kind of a runtime error. The virtual machine attaches the source line
/// and a call back-trace before surfacing one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// Attempted to read or assign a global that has not been defined.
    UndefinedVariable {
        /// The variable name.
        name: CompactString,
    },
    /// Attempted to access a property that is neither a field nor a method.
    UndefinedProperty {
        /// The property name.
        name: CompactString,
    },
    /// Attempted a numeric unary operation on a non-number.
    NonNumericOperand,
    /// Attempted a numeric binary operation on non-numbers.
    NonNumericOperands,
    /// Attempted to add values that are neither two numbers nor two strings.
    InvalidAddOperands,
    /// Attempted to call a value that is not callable.
    NotCallable,
    /// Called a callable with the wrong number of arguments.
    ArityMismatch {
        /// The declared number of parameters.
        expected: u8,
        /// The number of arguments supplied.
        actual: u8,
    },
    /// Attempted `.property` on a value that is not an instance.
    PropertyOnNonInstance,
    /// Attempted `.field = value` on a value that is not an instance.
    FieldOnNonInstance,
    /// The value stack or the call-frame stack overflowed its cap.
    StackOverflow,

    // The remaining kinds indicate a corrupt interpreter rather than a bad
    // program.
    /// Popped from an empty value stack.
    EmptyStack,
    /// Popped from an empty call stack.
    EmptyCallStack,
    /// The value being defined as a method was not a closure.
    InvalidMethodAttach,
    /// The value a method is being attached to was not a class.
    InvalidClassAttach,
    /// Dereferenced a dead or foreign heap handle.
    InvalidHandle {
        /// The arena the handle pointed into.
        arena: &'static str,
    },
    /// Fetched a byte that is not an instruction.
    UnknownOpcode {
        /// The offending byte.
        byte: u8,
    },
    /// An operand referenced a constant outside the pool.
    InvalidConstant,
    /// The open-upvalue list contained a closed upvalue.
    InvalidOpenUpvalue,
    /// Could not write interpreter output.
    Io,
}

impl fmt::Display for RuntimeErrorKind {
    #[expect(
        clippy::min_ident_chars,
        reason = "keep consistent with trait definition."
    )]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UndefinedVariable { ref name } => {
                write!(f, "undefined variable '{name}'")
            }
            Self::UndefinedProperty { ref name } => {
                write!(f, "undefined property '{name}'")
            }
            Self::NonNumericOperand => write!(f, "operand must be a number"),
            Self::NonNumericOperands => write!(f, "operands must be numbers"),
            Self::InvalidAddOperands => {
                write!(f, "operands must be two numbers or two strings")
            }
            Self::NotCallable => write!(f, "can only call callable values"),
            Self::ArityMismatch { expected, actual } => {
                write!(f, "expected {expected} arguments but got {actual}")
            }
            Self::PropertyOnNonInstance => write!(f, "only instances have properties"),
            Self::FieldOnNonInstance => write!(f, "only instances have fields"),
            Self::StackOverflow => write!(f, "stack overflow"),
            Self::EmptyStack => write!(f, "value stack is unexpectedly empty"),
            Self::EmptyCallStack => write!(f, "call stack is unexpectedly empty"),
            Self::InvalidMethodAttach => write!(f, "invalid method to attach"),
            Self::InvalidClassAttach => write!(f, "invalid class to attach to"),
            Self::InvalidHandle { arena } => write!(f, "dangling {arena} handle"),
            Self::UnknownOpcode { byte } => write!(f, "unknown opcode {byte:#04x}"),
            Self::InvalidConstant => write!(f, "constant index out of range"),
            Self::InvalidOpenUpvalue => {
                write!(f, "closed upvalue found in the open upvalue list")
            }
            Self::Io => write!(f, "failed to write interpreter output"),
        }
    }
}
