//! Heap object variants.

use crate::chunk::Chunk;
use crate::heap::Handle;
use crate::value::Value;
use compact_str::CompactString;
use std::collections::HashMap;

/// A compile-time description of a captured variable, serialized inline
/// after the closure instruction as `{is_local, index}` byte pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvalueDesc {
    /// Index into the enclosing function's locals (`is_local`) or upvalues.
    pub index: u8,
    /// Whether the capture targets a local of the immediately enclosing
    /// function, as opposed to one of its upvalues.
    pub is_local: bool,
}

/// A compiled function body.
#[derive(Debug)]
pub struct Function {
    /// The function's name.
    pub name: Handle<CompactString>,
    /// The declared number of parameters.
    pub arity: u8,
    /// Descriptors for the variables the function captures.
    pub upvalues: Vec<UpvalueDesc>,
    /// The function's bytecode.
    pub chunk: Chunk,
}

/// A function bound to its captured upvalues.
#[derive(Debug)]
pub struct Closure {
    /// The compiled function.
    pub function: Handle<Function>,
    /// Captured upvalues, positionally matching the function's descriptors.
    pub upvalues: Vec<Handle<Upvalue>>,
}

/// A captured variable.
///
/// Open upvalues point at a live value-stack slot and are threaded into the
/// VM's list of open upvalues, sorted by descending slot. Closing copies the
/// stack value into the upvalue itself.
#[derive(Debug, Clone, Copy)]
pub enum Upvalue {
    Open {
        /// Absolute index into the value stack.
        slot: usize,
        /// The next open upvalue, at a lower slot.
        next: Option<Handle<Upvalue>>,
    },
    Closed {
        /// The captured value, owned by the upvalue.
        value: Value,
    },
}

/// A class: a name and a method table.
#[derive(Debug)]
pub struct Class {
    /// The class name.
    pub name: Handle<CompactString>,
    /// Methods keyed by interned name.
    pub methods: HashMap<Handle<CompactString>, Handle<Closure>>,
}

/// An instance of a class. Fields are created on first assignment.
#[derive(Debug)]
pub struct Instance {
    /// The instance's class.
    pub class: Handle<Class>,
    /// Field values keyed by interned name.
    pub fields: HashMap<Handle<CompactString>, Value>,
}

/// A method closure paired with the instance it was looked up on.
#[derive(Debug, Clone, Copy)]
pub struct BoundMethod {
    /// The receiver, re-pushed as slot 0 when the method is called.
    pub receiver: Handle<Instance>,
    /// The method body.
    pub method: Handle<Closure>,
}
