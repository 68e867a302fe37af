use core::fmt::Write as _;
use flint_runtime::heap::Heap;
use flint_vm::Vm;
use flint_vm::builtins::{Clock, Sleep};
use flint_vm::io::BufferContext;
use std::rc::Rc;

fn run_interpreter(code: &str, stress: bool) -> String {
    let mut heap = Heap::with_stress(stress);
    let mut vm = Vm::new();
    vm.define_native(&mut heap, Rc::new(Clock::new()));
    vm.define_native(&mut heap, Rc::new(Sleep));

    let script = match flint_compiler::compile(code, &mut heap, Some(&vm)) {
        Ok(script) => script,
        Err(errors) => {
            let mut buffer = String::new();
            for error in errors {
                error.format(&mut buffer).unwrap();
                buffer.push('\n');
            }
            return buffer;
        }
    };

    let mut context = BufferContext::new();
    match vm.run(&mut heap, &mut context, script) {
        Ok(()) => context.flush(),
        Err(error) => {
            let mut buffer = context.flush();
            writeln!(&mut buffer, "{}", error.kind).unwrap();
            buffer
        }
    }
}

fn expected_output(code: &str) -> String {
    let mut output = String::new();
    for line in code.lines() {
        // Prints
        if let Some(pos) = line.rfind("// expect: ") {
            let needle = line[pos..].strip_prefix("// expect: ");
            if let Some(needle) = needle
                && !needle.is_empty()
            {
                output.push_str(needle);
                output.push('\n');
            }
        }

        // [line 2] Error: expected expression
        if let Some(error) = extract_line_error(line) {
            output.push_str(error);
            output.push('\n');
        }

        // Runtime errors
        if let Some(pos) = line.rfind("// expect runtime error: ") {
            let needle = line[pos..].strip_prefix("// expect runtime error: ");
            if let Some(needle) = needle
                && !needle.is_empty()
            {
                output.push_str(needle);
                output.push('\n');
            }
        }
    }
    output
}

fn extract_line_error(line: &str) -> Option<&str> {
    // Pattern: [line X] Error: message
    let pos = line.find("// [line ")?;
    let rest = &line[pos..];
    let bracket = rest.find(']')?;
    if rest[bracket + 1..].trim_start().starts_with("Error") {
        return rest.strip_prefix("// ");
    }
    None
}

/// Compile and maybe run the source, checking that the expected output and
/// errors appear.
///
/// # Panics
/// When the expected output and actual output differ.
#[allow(unreachable_pub, reason = "used by each test file.")]
#[allow(dead_code, reason = "not every test file uses every helper.")]
pub fn check(code: &str) {
    let expected = expected_output(code);
    let output = run_interpreter(code, false);
    assert_eq!(expected, output, "check failed.");
}

/// Like [`check`], but collecting on every allocation check.
#[allow(unreachable_pub, reason = "used by each test file.")]
#[allow(dead_code, reason = "not every test file uses every helper.")]
pub fn check_stressed(code: &str) {
    let expected = expected_output(code);
    let output = run_interpreter(code, true);
    assert_eq!(expected, output, "stressed check failed.");
}
