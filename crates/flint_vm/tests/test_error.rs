mod common;

use common::check;
use flint_runtime::heap::Heap;
use flint_vm::Vm;
use flint_vm::error::RuntimeError;
use flint_vm::io::BufferContext;

fn run_expecting_error(code: &str) -> RuntimeError {
    let mut heap = Heap::new();
    let mut vm = Vm::new();
    let script = flint_compiler::compile(code, &mut heap, None).expect("code should compile.");
    let mut context = BufferContext::new();
    vm.run(&mut heap, &mut context, script)
        .expect_err("code should fail at runtime.")
}

#[test]
fn missing_semicolons_are_reported_per_statement() {
    const CODE: &str = r"print 1 // [line 2] Error: expected ';' after value in print statement
var a = 2;
";
    check(CODE);
}

#[test]
fn multiple_errors_are_all_reported() {
    const CODE: &str = r"var 1; // [line 1] Error: expected variable name
print 2 +; // [line 2] Error: expected expression
";
    check(CODE);
}

#[test]
fn statements_resume_after_an_error() {
    const CODE: &str = r#"print +; // [line 1] Error: expected expression
print "still parsed" +; // [line 2] Error: expected expression
"#;
    check(CODE);
}

#[test]
fn runtime_errors_carry_the_line() {
    let error = run_expecting_error("var a = 1;\nvar b = 2;\nprint a + unknown;\n");
    assert_eq!(error.line, 3);
}

#[test]
fn back_traces_list_frames_innermost_first() {
    let error = run_expecting_error(
        "fun inner() { return 1 - nil; }\nfun outer() { return inner(); }\nouter();\n",
    );

    let mut rendered = String::new();
    error.format(&mut rendered).unwrap();
    assert_eq!(
        rendered,
        "operands must be numbers\n in line 1, function inner\n in line 2, function outer\n in line 3, function script"
    );
}

#[test]
fn undefined_variable_report_names_the_variable() {
    let error = run_expecting_error("print unknown;\n");
    let mut rendered = String::new();
    error.format(&mut rendered).unwrap();
    assert!(rendered.contains("undefined variable 'unknown'"));
    assert!(rendered.contains("in line 1, function script"));
}
