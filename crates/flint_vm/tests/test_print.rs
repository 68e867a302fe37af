mod common;

use common::check;

#[test]
fn numbers_render_shortest_round_trip() {
    const CODE: &str = r"print 7; // expect: 7
print 2.5; // expect: 2.5
print 0.1; // expect: 0.1
print 100; // expect: 100
print -0.5; // expect: -0.5
print 1000000; // expect: 1000000
";
    check(CODE);
}

#[test]
fn literals_render_as_keywords() {
    const CODE: &str = r"print nil; // expect: nil
print true; // expect: true
print false; // expect: false
";
    check(CODE);
}

#[test]
fn strings_render_without_quotes() {
    const CODE: &str = r#"print "hello"; // expect: hello
print "with \ backslash"; // expect: with \ backslash
"#;
    check(CODE);
}

#[test]
fn expressions_render_their_value() {
    const CODE: &str = r"print 1 + 2 * 3; // expect: 7
print !(5 - 4 > 3 * 2 == !nil); // expect: true
";
    check(CODE);
}

#[test]
fn statements_leave_the_stack_balanced() {
    // A long straight-line program would fault quickly if statements leaked
    // stack slots.
    const CODE: &str = r"var total = 0;
for (var i = 0; i < 200; i = i + 1) {
  var a = 1;
  var b = 2;
  total = total + a + b;
  if (total > 0) {} else {}
}
print total; // expect: 600
";
    check(CODE);
}
