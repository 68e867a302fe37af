mod common;

use common::check;

#[test]
fn if_takes_the_truthy_branch() {
    const CODE: &str = r#"if (true) print "then"; // expect: then
if (false) print "then"; else print "else"; // expect: else
if (0) print "zero is truthy"; // expect: zero is truthy
if ("") print "empty is truthy"; // expect: empty is truthy
if (nil) print "no"; else print "nil is falsy"; // expect: nil is falsy
"#;
    check(CODE);
}

#[test]
fn and_short_circuits() {
    const CODE: &str = r#"print false and unreached(); // expect: false
print nil and unreached(); // expect: nil
print 1 and 2; // expect: 2
print true and "rhs"; // expect: rhs
"#;
    check(CODE);
}

#[test]
fn or_short_circuits() {
    const CODE: &str = r#"print 1 or unreached(); // expect: 1
print "lhs" or unreached(); // expect: lhs
print false or 2; // expect: 2
print nil or "rhs"; // expect: rhs
"#;
    check(CODE);
}

#[test]
fn logic_operators_evaluate_rhs_lazily() {
    const CODE: &str = r#"var log = "";
fun note(value) { log = log + "!"; return value; }
var result = true and note(1);
print log; // expect: !
result = false and note(2);
print log; // expect: !
result = false or note(3);
print log; // expect: !!
result = true or note(4);
print log; // expect: !!
"#;
    check(CODE);
}

#[test]
fn while_loops() {
    const CODE: &str = r"var i = 0;
while (i < 3) {
  print i;
  i = i + 1;
}
// expect: 0
// expect: 1
// expect: 2
print i; // expect: 3
";
    check(CODE);
}

#[test]
fn while_with_falsy_condition_never_runs() {
    const CODE: &str = r#"while (false) print "unreached";
print "done"; // expect: done
"#;
    check(CODE);
}

#[test]
fn for_loops() {
    const CODE: &str = r"for (var i = 0; i < 3; i = i + 1) print i;
// expect: 0
// expect: 1
// expect: 2
";
    check(CODE);
}

#[test]
fn for_without_initializer_or_increment() {
    const CODE: &str = r"var i = 10;
for (; i > 8;) {
  print i;
  i = i - 1;
}
// expect: 10
// expect: 9
";
    check(CODE);
}

#[test]
fn for_scopes_its_variable() {
    const CODE: &str = r#"var i = "global";
for (var i = 0; i < 1; i = i + 1) print i; // expect: 0
print i; // expect: global
"#;
    check(CODE);
}

#[test]
fn nested_loops() {
    const CODE: &str = r"var total = 0;
for (var i = 0; i < 3; i = i + 1) {
  for (var j = 0; j < 3; j = j + 1) {
    total = total + 1;
  }
}
print total; // expect: 9
";
    check(CODE);
}

#[test]
fn dangling_else_binds_to_nearest_if() {
    const CODE: &str = r#"if (true) if (false) print "inner"; else print "nearest"; // expect: nearest
"#;
    check(CODE);
}
