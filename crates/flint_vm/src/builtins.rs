//! The built-in native functions the reference host registers.

use flint_runtime::error::RuntimeErrorKind;
use flint_runtime::heap::Heap;
use flint_runtime::native::NativeFunction;
use flint_runtime::value::Value;
use std::thread;
use std::time::{Duration, Instant};

/// `clock()`: seconds elapsed since the interpreter started, as a number.
#[derive(Debug)]
pub struct Clock {
    start: Instant,
}

impl Clock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeFunction for Clock {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn arity(&self) -> u8 {
        0
    }

    fn call(&self, _heap: &mut Heap, _args: &[Value]) -> Result<Value, RuntimeErrorKind> {
        Ok(Value::Number(self.start.elapsed().as_secs_f64()))
    }
}

/// `sleep(seconds)`: block the interpreter, then return nil.
#[derive(Debug)]
pub struct Sleep;

impl NativeFunction for Sleep {
    fn name(&self) -> &'static str {
        "sleep"
    }

    fn arity(&self) -> u8 {
        1
    }

    fn call(&self, _heap: &mut Heap, args: &[Value]) -> Result<Value, RuntimeErrorKind> {
        let &[Value::Number(seconds)] = args else {
            return Err(RuntimeErrorKind::NonNumericOperand);
        };
        // Negative and NaN durations sleep for nothing rather than panic.
        let seconds = seconds.max(0.0);
        if seconds > 0.0 && seconds.is_finite() {
            thread::sleep(Duration::from_secs_f64(seconds));
        }
        Ok(Value::Nil)
    }
}
