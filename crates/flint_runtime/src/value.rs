use crate::error::RuntimeErrorKind;
use crate::heap::{Handle, Heap, Object};
use crate::native::NativeRef;
use crate::object::{BoundMethod, Class, Closure, Function, Instance, Upvalue};
use compact_str::CompactString;
use core::fmt;

/// A value.
///
/// Heap-backed variants hold typed handles owned by the garbage collector;
/// equality between two values of the same object kind is handle identity,
/// which for strings coincides with content equality because all strings are
/// interned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Nil.
    Nil,
    /// Booleans.
    Bool(bool),
    /// Numbers.
    Number(f64),
    /// Interned strings.
    String(Handle<CompactString>),
    /// Compiled functions, as they appear in constant pools.
    Function(Handle<Function>),
    /// Closures.
    Closure(Handle<Closure>),
    /// Host-provided functions.
    Native(Handle<NativeRef>),
    /// Classes.
    Class(Handle<Class>),
    /// Class instances.
    Instance(Handle<Instance>),
    /// Methods bound to their receiver.
    BoundMethod(Handle<BoundMethod>),
}

impl Value {
    /// Return whether the value is truthy: everything except `nil` and
    /// `false` is.
    #[must_use]
    pub const fn truthy(&self) -> bool {
        match *self {
            Value::Nil => false,
            Value::Bool(value) => value,
            _ => true,
        }
    }

    /// The heap object behind this value, if it has one.
    #[must_use]
    pub const fn object(&self) -> Option<Object> {
        match *self {
            Value::Nil | Value::Bool(_) | Value::Number(_) => None,
            Value::String(handle) => Some(Object::String(handle)),
            Value::Function(handle) => Some(Object::Function(handle)),
            Value::Closure(handle) => Some(Object::Closure(handle)),
            Value::Native(handle) => Some(Object::Native(handle)),
            Value::Class(handle) => Some(Object::Class(handle)),
            Value::Instance(handle) => Some(Object::Instance(handle)),
            Value::BoundMethod(handle) => Some(Object::BoundMethod(handle)),
        }
    }

    /// Evaluate numeric negation.
    pub fn negate(&self) -> Result<Value, RuntimeErrorKind> {
        match *self {
            Value::Number(value) => Ok(Value::Number(-value)),
            _ => Err(RuntimeErrorKind::NonNumericOperand),
        }
    }

    /// Execute add. Two numbers add; two strings concatenate into a freshly
    /// interned string.
    pub fn add(heap: &mut Heap, lhs: Self, rhs: Self) -> Result<Value, RuntimeErrorKind> {
        match (lhs, rhs) {
            (Value::Number(lhs), Value::Number(rhs)) => Ok(Value::Number(lhs + rhs)),
            (Value::String(lhs), Value::String(rhs)) => {
                let lhs = heap
                    .string(lhs)
                    .ok_or(RuntimeErrorKind::InvalidHandle { arena: "string" })?;
                let rhs = heap
                    .string(rhs)
                    .ok_or(RuntimeErrorKind::InvalidHandle { arena: "string" })?;
                let mut concat = CompactString::from(lhs);
                concat.push_str(rhs);
                Ok(Value::String(heap.intern_owned(concat)))
            }
            _ => Err(RuntimeErrorKind::InvalidAddOperands),
        }
    }

    /// Execute subtraction.
    pub fn subtract(&self, rhs: &Self) -> Result<Value, RuntimeErrorKind> {
        match (*self, *rhs) {
            (Value::Number(lhs), Value::Number(rhs)) => Ok(Value::Number(lhs - rhs)),
            _ => Err(RuntimeErrorKind::NonNumericOperands),
        }
    }

    /// Execute multiplication.
    pub fn multiply(&self, rhs: &Self) -> Result<Value, RuntimeErrorKind> {
        match (*self, *rhs) {
            (Value::Number(lhs), Value::Number(rhs)) => Ok(Value::Number(lhs * rhs)),
            _ => Err(RuntimeErrorKind::NonNumericOperands),
        }
    }

    /// Execute division.
    pub fn divide(&self, rhs: &Self) -> Result<Value, RuntimeErrorKind> {
        match (*self, *rhs) {
            (Value::Number(lhs), Value::Number(rhs)) => Ok(Value::Number(lhs / rhs)),
            _ => Err(RuntimeErrorKind::NonNumericOperands),
        }
    }

    /// Evaluate greater than.
    pub fn greater(&self, rhs: &Self) -> Result<Value, RuntimeErrorKind> {
        match (*self, *rhs) {
            (Value::Number(lhs), Value::Number(rhs)) => Ok(Value::Bool(lhs > rhs)),
            _ => Err(RuntimeErrorKind::NonNumericOperands),
        }
    }

    /// Evaluate less than.
    pub fn less(&self, rhs: &Self) -> Result<Value, RuntimeErrorKind> {
        match (*self, *rhs) {
            (Value::Number(lhs), Value::Number(rhs)) => Ok(Value::Bool(lhs < rhs)),
            _ => Err(RuntimeErrorKind::NonNumericOperands),
        }
    }
}

impl Value {
    /// Pair the value with the heap so handles can be rendered.
    #[must_use]
    pub const fn resolve<'value>(&'value self, heap: &'value Heap) -> ResolvedValue<'value> {
        ResolvedValue { inner: self, heap }
    }
}

/// A value paired with the heap that owns its handles, for display.
#[derive(Debug)]
pub struct ResolvedValue<'value> {
    inner: &'value Value,
    heap: &'value Heap,
}

impl ResolvedValue<'_> {
    fn function_name(&self, handle: Handle<Function>) -> Result<&str, fmt::Error> {
        let function = self.heap.function(handle).ok_or(fmt::Error)?;
        self.heap.string(function.name).ok_or(fmt::Error)
    }

    fn closure_name(&self, handle: Handle<Closure>) -> Result<&str, fmt::Error> {
        let closure = self.heap.closure(handle).ok_or(fmt::Error)?;
        self.function_name(closure.function)
    }

    fn instance_class_name(&self, handle: Handle<Instance>) -> Result<&str, fmt::Error> {
        let instance = self.heap.instance(handle).ok_or(fmt::Error)?;
        let class = self.heap.class(instance.class).ok_or(fmt::Error)?;
        self.heap.string(class.name).ok_or(fmt::Error)
    }
}

impl fmt::Display for ResolvedValue<'_> {
    #[expect(
        clippy::min_ident_chars,
        reason = "keep consistent with trait definition."
    )]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self.inner {
            Value::Nil => write!(f, "nil"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Number(value) => write!(f, "{value}"),
            Value::String(handle) => {
                let text = self.heap.string(handle).ok_or(fmt::Error)?;
                write!(f, "{text}")
            }
            Value::Function(handle) => {
                write!(f, "<fn {}>", self.function_name(handle)?)
            }
            Value::Closure(handle) => {
                write!(f, "<fn {}>", self.closure_name(handle)?)
            }
            Value::Native(handle) => {
                let native = self.heap.native(handle).ok_or(fmt::Error)?;
                write!(f, "<native fn {}>", native.name())
            }
            Value::Class(handle) => {
                let class = self.heap.class(handle).ok_or(fmt::Error)?;
                let name = self.heap.string(class.name).ok_or(fmt::Error)?;
                write!(f, "<class {name}>")
            }
            Value::Instance(handle) => {
                write!(f, "<instance of <class {}>>", self.instance_class_name(handle)?)
            }
            Value::BoundMethod(handle) => {
                let bound = self.heap.bound_method(handle).ok_or(fmt::Error)?;
                write!(
                    f,
                    "<bound method <fn {}> of <instance of <class {}>>>",
                    self.closure_name(bound.method)?,
                    self.instance_class_name(bound.receiver)?
                )
            }
        }
    }
}

/// An upvalue paired with the heap, for debug display.
#[derive(Debug)]
pub struct ResolvedUpvalue<'value> {
    inner: &'value Upvalue,
    heap: &'value Heap,
}

impl Upvalue {
    /// Pair the upvalue with the heap so handles can be rendered.
    #[must_use]
    pub const fn resolve<'value>(&'value self, heap: &'value Heap) -> ResolvedUpvalue<'value> {
        ResolvedUpvalue { inner: self, heap }
    }
}

impl fmt::Display for ResolvedUpvalue<'_> {
    #[expect(
        clippy::min_ident_chars,
        reason = "keep consistent with trait definition."
    )]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self.inner {
            Upvalue::Open { slot, .. } => write!(f, "<open upvalue ${slot}>"),
            Upvalue::Closed { ref value } => {
                write!(f, "<closed upvalue {}>", value.resolve(self.heap))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::Value;
    use crate::heap::Heap;

    #[test]
    fn truthiness_matches_language_rules() {
        let mut heap = Heap::new();
        assert!(!Value::Nil.truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(Value::Bool(true).truthy());
        assert!(Value::Number(0.0).truthy());
        let empty = heap.intern("");
        assert!(Value::String(empty).truthy());
    }

    #[test]
    fn interned_strings_compare_equal() {
        let mut heap = Heap::new();
        let lhs = Value::String(heap.intern("foo"));
        let rhs = Value::String(heap.intern("foo"));
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn concatenation_is_interned() {
        let mut heap = Heap::new();
        let lhs = Value::String(heap.intern("a"));
        let rhs = Value::String(heap.intern("b"));
        let concat = Value::add(&mut heap, lhs, rhs).unwrap();
        let direct = Value::String(heap.intern("ab"));
        assert_eq!(concat, direct);
    }

    #[test]
    fn numbers_render_shortest_round_trip() {
        let heap = Heap::new();
        assert_eq!(Value::Number(7.0).resolve(&heap).to_string(), "7");
        assert_eq!(Value::Number(2.5).resolve(&heap).to_string(), "2.5");
        assert_eq!(Value::Nil.resolve(&heap).to_string(), "nil");
    }

    #[test]
    fn mixed_add_is_an_error() {
        let mut heap = Heap::new();
        let text = Value::String(heap.intern("x"));
        assert!(Value::add(&mut heap, text, Value::Number(1.0)).is_err());
    }
}
