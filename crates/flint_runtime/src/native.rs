use crate::error::RuntimeErrorKind;
use crate::heap::Heap;
use crate::value::Value;
use core::fmt;
use std::rc::Rc;

/// A shared native function, as stored on the heap. Shared so the VM can
/// hold the callee across a call that itself needs the heap.
pub type NativeRef = Rc<dyn NativeFunction>;

/// A host-provided function exposed to programs as a predefined global.
///
/// `args` borrows the virtual machine's value stack for the duration of the
/// call; implementations may read the arguments but must not retain them.
pub trait NativeFunction: fmt::Debug {
    /// The global name the function is registered under.
    fn name(&self) -> &'static str;
    /// The number of arguments the function expects. Checked by the VM
    /// before the call.
    fn arity(&self) -> u8;
    /// Run the function.
    fn call(&self, heap: &mut Heap, args: &[Value]) -> Result<Value, RuntimeErrorKind>;
}
