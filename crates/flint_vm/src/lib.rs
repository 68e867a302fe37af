//! The stack-based virtual machine.
//!
//! A fetch-decode-execute loop over byte-addressed chunks, with a value
//! stack, a bounded call-frame stack, closure invocation, upvalue
//! capture/closing, property dispatch, and bound-method materialization.
//! The collector runs between instructions; the VM seeds it with its roots.

pub mod builtins;
pub mod error;
pub mod io;

use crate::error::{RuntimeError, RuntimeErrorKind, TraceFrame};
use crate::io::IoContext;
use arrayvec::ArrayVec;
use compact_str::CompactString;
use flint_runtime::heap::{Handle, Heap, MarkRoots, Object};
use flint_runtime::native::NativeRef;
use flint_runtime::object::{BoundMethod, Class, Closure, Function, Instance, Upvalue};
use flint_runtime::opcode::OpCode;
use flint_runtime::value::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// The call-frame cap.
pub const FRAMES_MAX: usize = 64;
/// The value-stack cap.
pub const STACK_MAX: usize = FRAMES_MAX * 256;

/// The control flow of the VM execution.
#[derive(Debug)]
enum ControlFlow {
    /// Continue execution.
    Continue,
    /// Finish execution.
    Done,
}

/// A call frame.
#[derive(Debug, Clone, Copy)]
struct CallFrame {
    /// The frame's closure.
    closure: Handle<Closure>,
    /// The instruction pointer into the closure's chunk.
    ip: usize,
    /// The absolute stack index of slot 0: the callee or the receiver.
    base: usize,
}

/// The result of a property lookup on an instance.
enum PropertyLookup {
    Field(Value),
    Method(Handle<Closure>),
    Missing,
}

/// The virtual machine.
///
/// Globals persist across [`Vm::run`] calls so a REPL can keep definitions
/// between lines; the value stack, call frames, and open upvalues reset at
/// the start of every run.
pub struct Vm {
    /// The value stack.
    stack: Vec<Value>,
    /// The call stack.
    frames: ArrayVec<CallFrame, FRAMES_MAX>,
    /// The global environment.
    globals: HashMap<Handle<CompactString>, Value>,
    /// Head of the open-upvalue list, sorted by descending stack slot.
    open_upvalues: Option<Handle<Upvalue>>,
    /// Log every dispatched instruction through `tracing`.
    trace_execution: bool,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// Initialise the virtual machine.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            frames: ArrayVec::new(),
            globals: HashMap::new(),
            open_upvalues: None,
            trace_execution: false,
        }
    }

    /// Initialise the virtual machine with execution tracing.
    #[must_use]
    pub fn with_trace(trace_execution: bool) -> Self {
        Self {
            trace_execution,
            ..Self::new()
        }
    }

    /// Register a host function as a predefined global.
    pub fn define_native(&mut self, heap: &mut Heap, native: NativeRef) {
        let name = heap.intern(native.name());
        let handle = heap.make_native(native);
        self.globals.insert(name, Value::Native(handle));
    }

    /// Run a compiled top-level function to completion.
    ///
    /// # Errors
    /// Returns the first runtime error, with its line and back-trace.
    pub fn run(
        &mut self,
        heap: &mut Heap,
        context: &mut impl IoContext,
        script: Handle<Function>,
    ) -> Result<(), RuntimeError> {
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues = None;

        let closure = heap.make_closure(Closure {
            function: script,
            upvalues: Vec::new(),
        });
        self.stack.push(Value::Closure(closure));
        self.frames.push(CallFrame {
            closure,
            ip: 0,
            base: 0,
        });

        loop {
            match self.step(heap, context) {
                Ok(ControlFlow::Continue) => {
                    if heap.should_collect() {
                        heap.begin_cycle();
                        self.mark_roots(heap);
                        let freed = heap.collect();
                        tracing::debug!(freed, "collected between instructions");
                    }
                }
                Ok(ControlFlow::Done) => return Ok(()),
                Err(kind) => return Err(self.runtime_error(heap, kind)),
            }
        }
    }

    #[expect(clippy::too_many_lines, reason = "this function is hard to decompose.")]
    fn step(
        &mut self,
        heap: &mut Heap,
        context: &mut impl IoContext,
    ) -> Result<ControlFlow, RuntimeErrorKind> {
        let frame = *self
            .frames
            .last()
            .ok_or(RuntimeErrorKind::EmptyCallStack)?;

        let (opcode, next_ip) = {
            let code = self.code(heap, frame.closure)?;
            if frame.ip >= code.len() {
                return Ok(ControlFlow::Done);
            }
            OpCode::decode(code, frame.ip).ok_or(RuntimeErrorKind::UnknownOpcode {
                byte: code[frame.ip],
            })?
        };

        if self.trace_execution {
            tracing::trace!(ip = frame.ip, %opcode, depth = self.stack.len(), "dispatch");
        }

        match opcode {
            OpCode::Constant(index) => {
                let value = self.constant(heap, frame.closure, index)?;
                self.push(value)?;
            }
            OpCode::Nil => self.push(Value::Nil)?,
            OpCode::True => self.push(Value::Bool(true))?,
            OpCode::False => self.push(Value::Bool(false))?,
            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::Negate => {
                let value = self.pop()?;
                self.push(value.negate()?)?;
            }
            OpCode::Not => {
                let value = self.pop()?;
                self.push(Value::Bool(!value.truthy()))?;
            }
            OpCode::Add => {
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                let sum = Value::add(heap, lhs, rhs)?;
                self.push(sum)?;
            }
            OpCode::Subtract => {
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                self.push(lhs.subtract(&rhs)?)?;
            }
            OpCode::Multiply => {
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                self.push(lhs.multiply(&rhs)?)?;
            }
            OpCode::Divide => {
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                self.push(lhs.divide(&rhs)?)?;
            }
            OpCode::Equal => {
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                self.push(Value::Bool(lhs == rhs))?;
            }
            OpCode::Greater => {
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                self.push(lhs.greater(&rhs)?)?;
            }
            OpCode::Less => {
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                self.push(lhs.less(&rhs)?)?;
            }
            OpCode::Print => {
                let value = self.pop()?;
                writeln!(context, "{}", value.resolve(heap))
                    .map_err(|_err| RuntimeErrorKind::Io)?;
            }
            OpCode::DefineGlobal(index) => {
                let name = self.name_constant(heap, frame.closure, index)?;
                let value = self.peek()?;
                self.globals.insert(name, value);
                self.pop()?;
            }
            OpCode::GetGlobal(index) => {
                let name = self.name_constant(heap, frame.closure, index)?;
                let value = self
                    .globals
                    .get(&name)
                    .copied()
                    .ok_or_else(|| undefined_variable(heap, name))?;
                self.push(value)?;
            }
            OpCode::SetGlobal(index) => {
                let name = self.name_constant(heap, frame.closure, index)?;
                let value = self.peek()?;
                if let Entry::Occupied(mut entry) = self.globals.entry(name) {
                    entry.insert(value);
                } else {
                    return Err(undefined_variable(heap, name));
                }
            }
            OpCode::GetLocal(slot) => {
                let index = frame.base + usize::from(slot);
                let value = *self
                    .stack
                    .get(index)
                    .ok_or(RuntimeErrorKind::EmptyStack)?;
                self.push(value)?;
            }
            OpCode::SetLocal(slot) => {
                let value = self.peek()?;
                let index = frame.base + usize::from(slot);
                *self
                    .stack
                    .get_mut(index)
                    .ok_or(RuntimeErrorKind::EmptyStack)? = value;
            }
            OpCode::GetProperty(index) => {
                let name = self.name_constant(heap, frame.closure, index)?;
                let Value::Instance(receiver) = self.pop()? else {
                    return Err(RuntimeErrorKind::PropertyOnNonInstance);
                };

                let lookup = {
                    let instance = heap
                        .instance(receiver)
                        .ok_or(RuntimeErrorKind::InvalidHandle { arena: "instance" })?;
                    if let Some(&value) = instance.fields.get(&name) {
                        PropertyLookup::Field(value)
                    } else {
                        let class = heap
                            .class(instance.class)
                            .ok_or(RuntimeErrorKind::InvalidHandle { arena: "class" })?;
                        match class.methods.get(&name) {
                            Some(&method) => PropertyLookup::Method(method),
                            None => PropertyLookup::Missing,
                        }
                    }
                };

                match lookup {
                    PropertyLookup::Field(value) => self.push(value)?,
                    PropertyLookup::Method(method) => {
                        let bound = heap.make_bound_method(BoundMethod { receiver, method });
                        self.push(Value::BoundMethod(bound))?;
                    }
                    PropertyLookup::Missing => {
                        return Err(RuntimeErrorKind::UndefinedProperty {
                            name: string_content(heap, name),
                        });
                    }
                }
            }
            OpCode::SetProperty(index) => {
                let name = self.name_constant(heap, frame.closure, index)?;
                let value = self.pop()?;
                let Value::Instance(receiver) = self.pop()? else {
                    return Err(RuntimeErrorKind::FieldOnNonInstance);
                };
                heap.instance_mut(receiver)
                    .ok_or(RuntimeErrorKind::InvalidHandle { arena: "instance" })?
                    .fields
                    .insert(name, value);
                self.push(value)?;
            }
            OpCode::GetUpvalue(index) => {
                let upvalue = self.frame_upvalue(heap, frame.closure, index)?;
                let value = match *heap
                    .upvalue(upvalue)
                    .ok_or(RuntimeErrorKind::InvalidHandle { arena: "upvalue" })?
                {
                    Upvalue::Open { slot, .. } => *self
                        .stack
                        .get(slot)
                        .ok_or(RuntimeErrorKind::EmptyStack)?,
                    Upvalue::Closed { value } => value,
                };
                self.push(value)?;
            }
            OpCode::SetUpvalue(index) => {
                let value = self.peek()?;
                let upvalue = self.frame_upvalue(heap, frame.closure, index)?;
                let slot = match *heap
                    .upvalue(upvalue)
                    .ok_or(RuntimeErrorKind::InvalidHandle { arena: "upvalue" })?
                {
                    Upvalue::Open { slot, .. } => Some(slot),
                    Upvalue::Closed { .. } => None,
                };
                match slot {
                    Some(slot) => {
                        *self
                            .stack
                            .get_mut(slot)
                            .ok_or(RuntimeErrorKind::EmptyStack)? = value;
                    }
                    None => {
                        *heap
                            .upvalue_mut(upvalue)
                            .ok_or(RuntimeErrorKind::InvalidHandle { arena: "upvalue" })? =
                            Upvalue::Closed { value };
                    }
                }
            }
            OpCode::CloseUpvalue => {
                let top = self
                    .stack
                    .len()
                    .checked_sub(1)
                    .ok_or(RuntimeErrorKind::EmptyStack)?;
                self.close_upvalues(heap, top)?;
                self.pop()?;
            }
            OpCode::Jump(offset) => {
                self.jump(next_ip, offset)?;
                return Ok(ControlFlow::Continue);
            }
            OpCode::JumpIfFalse(offset) => {
                if self.peek()?.truthy() {
                    self.current_frame()?.ip = next_ip;
                } else {
                    self.jump(next_ip, offset)?;
                }
                return Ok(ControlFlow::Continue);
            }
            OpCode::Call(argc) => {
                let slot = self
                    .stack
                    .len()
                    .checked_sub(usize::from(argc) + 1)
                    .ok_or(RuntimeErrorKind::EmptyStack)?;
                let callee = self.stack[slot];
                match callee {
                    Value::Closure(handle) => {
                        return self.call_closure(heap, slot, argc, handle, next_ip);
                    }
                    Value::BoundMethod(handle) => {
                        let bound = *heap
                            .bound_method(handle)
                            .ok_or(RuntimeErrorKind::InvalidHandle { arena: "bound method" })?;
                        // The receiver takes the callee slot and becomes the
                        // method's `this`.
                        self.stack[slot] = Value::Instance(bound.receiver);
                        return self.call_closure(heap, slot, argc, bound.method, next_ip);
                    }
                    Value::Class(handle) => {
                        let init_name = heap.intern("init");
                        let instance = heap.make_instance(Instance {
                            class: handle,
                            fields: HashMap::new(),
                        });
                        self.stack[slot] = Value::Instance(instance);
                        let init = heap
                            .class(handle)
                            .ok_or(RuntimeErrorKind::InvalidHandle { arena: "class" })?
                            .methods
                            .get(&init_name)
                            .copied();
                        if let Some(init) = init {
                            return self.call_closure(heap, slot, argc, init, next_ip);
                        }
                        if argc != 0 {
                            return Err(RuntimeErrorKind::ArityMismatch {
                                expected: 0,
                                actual: argc,
                            });
                        }
                    }
                    Value::Native(handle) => {
                        let native = heap
                            .native(handle)
                            .ok_or(RuntimeErrorKind::InvalidHandle { arena: "native" })?;
                        if native.arity() != argc {
                            return Err(RuntimeErrorKind::ArityMismatch {
                                expected: native.arity(),
                                actual: argc,
                            });
                        }
                        let result = native.call(heap, &self.stack[slot + 1..])?;
                        self.stack.truncate(slot);
                        self.push(result)?;
                    }
                    _ => return Err(RuntimeErrorKind::NotCallable),
                }
            }
            OpCode::Closure(index) => {
                let Value::Function(function) = self.constant(heap, frame.closure, index)? else {
                    return Err(RuntimeErrorKind::InvalidConstant);
                };
                let count = heap
                    .function(function)
                    .ok_or(RuntimeErrorKind::InvalidHandle { arena: "function" })?
                    .upvalues
                    .len();

                let mut upvalues = Vec::with_capacity(count);
                let mut cursor = next_ip;
                for _ in 0..count {
                    let (is_local, index) = {
                        let code = self.code(heap, frame.closure)?;
                        let is_local = *code
                            .get(cursor)
                            .ok_or(RuntimeErrorKind::InvalidConstant)?;
                        let index = *code
                            .get(cursor + 1)
                            .ok_or(RuntimeErrorKind::InvalidConstant)?;
                        (is_local, index)
                    };
                    cursor += 2;
                    if is_local == 1 {
                        let slot = frame.base + usize::from(index);
                        upvalues.push(self.capture_upvalue(heap, slot)?);
                    } else {
                        upvalues.push(self.frame_upvalue(heap, frame.closure, index)?);
                    }
                }

                let closure = heap.make_closure(Closure { function, upvalues });
                self.push(Value::Closure(closure))?;
                self.current_frame()?.ip = cursor;
                return Ok(ControlFlow::Continue);
            }
            OpCode::Class(index) => {
                let name = self.name_constant(heap, frame.closure, index)?;
                let class = heap.make_class(Class {
                    name,
                    methods: HashMap::new(),
                });
                self.push(Value::Class(class))?;
            }
            OpCode::DefineMethod => {
                let Value::Closure(method) = self.pop()? else {
                    return Err(RuntimeErrorKind::InvalidMethodAttach);
                };
                let name = {
                    let closure = heap
                        .closure(method)
                        .ok_or(RuntimeErrorKind::InvalidHandle { arena: "closure" })?;
                    heap.function(closure.function)
                        .ok_or(RuntimeErrorKind::InvalidHandle { arena: "function" })?
                        .name
                };
                let Value::Class(class) = self.peek()? else {
                    return Err(RuntimeErrorKind::InvalidClassAttach);
                };
                heap.class_mut(class)
                    .ok_or(RuntimeErrorKind::InvalidHandle { arena: "class" })?
                    .methods
                    .insert(name, method);
            }
            OpCode::Return => {
                let result = self.pop()?;
                let finished = self
                    .frames
                    .pop()
                    .ok_or(RuntimeErrorKind::EmptyCallStack)?;
                if self.frames.is_empty() {
                    // Pop the script closure itself.
                    self.pop()?;
                    return Ok(ControlFlow::Done);
                }
                self.close_upvalues(heap, finished.base)?;
                self.stack.truncate(finished.base);
                self.push(result)?;
                return Ok(ControlFlow::Continue);
            }
        }

        self.current_frame()?.ip = next_ip;
        Ok(ControlFlow::Continue)
    }

    // ------------------------------------------------------------------
    // Stack and frame helpers.
    // ------------------------------------------------------------------

    fn push(&mut self, value: Value) -> Result<(), RuntimeErrorKind> {
        if self.stack.len() >= STACK_MAX {
            return Err(RuntimeErrorKind::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeErrorKind> {
        self.stack.pop().ok_or(RuntimeErrorKind::EmptyStack)
    }

    fn peek(&self) -> Result<Value, RuntimeErrorKind> {
        self.stack
            .last()
            .copied()
            .ok_or(RuntimeErrorKind::EmptyStack)
    }

    fn current_frame(&mut self) -> Result<&mut CallFrame, RuntimeErrorKind> {
        self.frames
            .last_mut()
            .ok_or(RuntimeErrorKind::EmptyCallStack)
    }

    fn jump(&mut self, next_ip: usize, offset: i16) -> Result<(), RuntimeErrorKind> {
        // The offset is relative to the byte just after the operand.
        let target = next_ip
            .checked_add_signed(isize::from(offset))
            .ok_or(RuntimeErrorKind::InvalidConstant)?;
        self.current_frame()?.ip = target;
        Ok(())
    }

    fn code<'heap>(
        &self,
        heap: &'heap Heap,
        closure: Handle<Closure>,
    ) -> Result<&'heap [u8], RuntimeErrorKind> {
        let closure = heap
            .closure(closure)
            .ok_or(RuntimeErrorKind::InvalidHandle { arena: "closure" })?;
        let function = heap
            .function(closure.function)
            .ok_or(RuntimeErrorKind::InvalidHandle { arena: "function" })?;
        Ok(function.chunk.code())
    }

    fn constant(
        &self,
        heap: &Heap,
        closure: Handle<Closure>,
        index: u8,
    ) -> Result<Value, RuntimeErrorKind> {
        let closure = heap
            .closure(closure)
            .ok_or(RuntimeErrorKind::InvalidHandle { arena: "closure" })?;
        heap.function(closure.function)
            .ok_or(RuntimeErrorKind::InvalidHandle { arena: "function" })?
            .chunk
            .constant(index)
            .ok_or(RuntimeErrorKind::InvalidConstant)
    }

    fn name_constant(
        &self,
        heap: &Heap,
        closure: Handle<Closure>,
        index: u8,
    ) -> Result<Handle<CompactString>, RuntimeErrorKind> {
        match self.constant(heap, closure, index)? {
            Value::String(name) => Ok(name),
            _ => Err(RuntimeErrorKind::InvalidConstant),
        }
    }

    fn frame_upvalue(
        &self,
        heap: &Heap,
        closure: Handle<Closure>,
        index: u8,
    ) -> Result<Handle<Upvalue>, RuntimeErrorKind> {
        let closure = heap
            .closure(closure)
            .ok_or(RuntimeErrorKind::InvalidHandle { arena: "closure" })?;
        closure
            .upvalues
            .get(usize::from(index))
            .copied()
            .ok_or(RuntimeErrorKind::InvalidHandle { arena: "upvalue" })
    }

    // ------------------------------------------------------------------
    // Invocation.
    // ------------------------------------------------------------------

    fn call_closure(
        &mut self,
        heap: &Heap,
        slot: usize,
        argc: u8,
        callee: Handle<Closure>,
        next_ip: usize,
    ) -> Result<ControlFlow, RuntimeErrorKind> {
        let arity = {
            let closure = heap
                .closure(callee)
                .ok_or(RuntimeErrorKind::InvalidHandle { arena: "closure" })?;
            heap.function(closure.function)
                .ok_or(RuntimeErrorKind::InvalidHandle { arena: "function" })?
                .arity
        };
        if arity != argc {
            return Err(RuntimeErrorKind::ArityMismatch {
                expected: arity,
                actual: argc,
            });
        }
        if self.frames.is_full() {
            return Err(RuntimeErrorKind::StackOverflow);
        }
        self.current_frame()?.ip = next_ip;
        self.frames.push(CallFrame {
            closure: callee,
            ip: 0,
            base: slot,
        });
        Ok(ControlFlow::Continue)
    }

    // ------------------------------------------------------------------
    // Upvalues.
    // ------------------------------------------------------------------

    /// Return an upvalue for the given stack slot, reusing an existing open
    /// one so every closure capturing a slot shares the same upvalue.
    fn capture_upvalue(
        &mut self,
        heap: &mut Heap,
        slot: usize,
    ) -> Result<Handle<Upvalue>, RuntimeErrorKind> {
        let mut previous = None;
        let mut current = self.open_upvalues;

        while let Some(handle) = current {
            let &Upvalue::Open {
                slot: current_slot,
                next,
            } = heap
                .upvalue(handle)
                .ok_or(RuntimeErrorKind::InvalidHandle { arena: "upvalue" })?
            else {
                return Err(RuntimeErrorKind::InvalidOpenUpvalue);
            };

            if current_slot < slot {
                break;
            }
            if current_slot == slot {
                return Ok(handle);
            }

            previous = Some(handle);
            current = next;
        }

        let created = heap.make_upvalue(Upvalue::Open {
            slot,
            next: current,
        });

        match previous {
            Some(previous) => {
                let upvalue = heap
                    .upvalue_mut(previous)
                    .ok_or(RuntimeErrorKind::InvalidHandle { arena: "upvalue" })?;
                let Upvalue::Open { ref mut next, .. } = *upvalue else {
                    return Err(RuntimeErrorKind::InvalidOpenUpvalue);
                };
                *next = Some(created);
            }
            None => {
                self.open_upvalues = Some(created);
            }
        }

        Ok(created)
    }

    /// Close every open upvalue whose slot is at or above `last`, copying
    /// the stack value into the upvalue itself.
    fn close_upvalues(&mut self, heap: &mut Heap, last: usize) -> Result<(), RuntimeErrorKind> {
        let mut current = self.open_upvalues;

        while let Some(handle) = current {
            let (slot, next) = {
                let &Upvalue::Open { slot, next } = heap
                    .upvalue(handle)
                    .ok_or(RuntimeErrorKind::InvalidHandle { arena: "upvalue" })?
                else {
                    return Err(RuntimeErrorKind::InvalidOpenUpvalue);
                };
                (slot, next)
            };

            if slot < last {
                break;
            }

            let value = *self
                .stack
                .get(slot)
                .ok_or(RuntimeErrorKind::EmptyStack)?;
            *heap
                .upvalue_mut(handle)
                .ok_or(RuntimeErrorKind::InvalidHandle { arena: "upvalue" })? =
                Upvalue::Closed { value };
            current = next;
        }

        self.open_upvalues = current;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Collection and errors.
    // ------------------------------------------------------------------

    fn mark_roots(&self, heap: &mut Heap) {
        for &value in &self.stack {
            heap.mark_value(value);
        }

        // Keys are marked along with values: a binding keeps its name alive
        // for as long as it exists, or later lookups of a re-interned name
        // would miss it.
        for (&name, &value) in &self.globals {
            heap.mark_object(Object::String(name));
            heap.mark_value(value);
        }

        for frame in &self.frames {
            heap.mark_object(Object::Closure(frame.closure));
        }

        let mut current = self.open_upvalues;
        while let Some(handle) = current {
            heap.mark_object(Object::Upvalue(handle));
            current = match heap.upvalue(handle) {
                Some(&Upvalue::Open { next, .. }) => next,
                _ => None,
            };
        }
    }

    fn runtime_error(&self, heap: &Heap, kind: RuntimeErrorKind) -> RuntimeError {
        let mut trace = Vec::new();
        for (depth, frame) in self.frames.iter().rev().enumerate() {
            let resolved = heap
                .closure(frame.closure)
                .and_then(|closure| heap.function(closure.function))
                .map(|function| {
                    let name = heap.string(function.name).unwrap_or("?");
                    // The innermost frame still points at the faulting
                    // instruction; callers point just past their call.
                    let offset = if depth == 0 {
                        frame.ip
                    } else {
                        frame.ip.saturating_sub(1)
                    };
                    let line = function.chunk.line_at(offset).unwrap_or(1);
                    (CompactString::from(name), line)
                });
            let (function, line) = resolved.unwrap_or((CompactString::const_new("?"), 1));
            trace.push(TraceFrame { function, line });
        }
        let line = trace.first().map_or(1, |frame| frame.line);
        RuntimeError { kind, line, trace }
    }
}

impl MarkRoots for Vm {
    fn mark_roots(&self, heap: &mut Heap) {
        Vm::mark_roots(self, heap);
    }
}

fn string_content(heap: &Heap, name: Handle<CompactString>) -> CompactString {
    CompactString::from(heap.string(name).unwrap_or("?"))
}

fn undefined_variable(heap: &Heap, name: Handle<CompactString>) -> RuntimeErrorKind {
    RuntimeErrorKind::UndefinedVariable {
        name: string_content(heap, name),
    }
}
