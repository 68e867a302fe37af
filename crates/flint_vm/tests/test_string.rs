mod common;

use common::check;

#[test]
fn interning_makes_equal_content_identical() {
    const CODE: &str = r#"var a = "foo";
var b = "foo";
print a == b; // expect: true
print "a" + "b" == "ab"; // expect: true
"#;
    check(CODE);
}

#[test]
fn concatenations_compare_equal() {
    const CODE: &str = r#"var greeting = "hello" + " " + "world";
print greeting == "hello world"; // expect: true
print greeting; // expect: hello world
"#;
    check(CODE);
}

#[test]
fn strings_may_span_lines() {
    // Run directly; the embedded newline would confuse the comment-driven
    // harness.
    use flint_runtime::heap::Heap;
    use flint_vm::Vm;
    use flint_vm::io::BufferContext;

    let mut heap = Heap::new();
    let mut vm = Vm::new();
    let script = flint_compiler::compile("print \"one\ntwo\";", &mut heap, None).unwrap();
    let mut context = BufferContext::new();
    vm.run(&mut heap, &mut context, script).unwrap();
    assert_eq!(context.flush(), "one\ntwo\n");
}

#[test]
fn empty_strings_are_truthy() {
    const CODE: &str = r#"if ("") print "truthy"; // expect: truthy
"#;
    check(CODE);
}
