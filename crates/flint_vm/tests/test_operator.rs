mod common;

use common::check;

#[test]
fn arithmetic_precedence() {
    const CODE: &str = r"print 1 + 2 * 3; // expect: 7
print (1 + 2) * 3; // expect: 9
print 10 - 4 / 2; // expect: 8
print 1 - 2 - 3; // expect: -4
";
    check(CODE);
}

#[test]
fn unary_operators() {
    const CODE: &str = r"print -4; // expect: -4
print --4; // expect: 4
print !true; // expect: false
print !nil; // expect: true
print !0; // expect: false
";
    check(CODE);
}

#[test]
fn comparisons() {
    const CODE: &str = r"print 1 < 2; // expect: true
print 2 <= 2; // expect: true
print 3 > 4; // expect: false
print 4 >= 4; // expect: true
print 1 == 1; // expect: true
print 1 != 1; // expect: false
";
    check(CODE);
}

#[test]
fn equality_across_kinds() {
    const CODE: &str = r#"print nil == nil; // expect: true
print true == true; // expect: true
print true == false; // expect: false
print 1 == "1"; // expect: false
print nil == false; // expect: false
print "abc" == "abc"; // expect: true
print "abc" == "abd"; // expect: false
"#;
    check(CODE);
}

#[test]
fn string_concatenation() {
    const CODE: &str = r#"print "foo" + "bar"; // expect: foobar
print "a" + ""; // expect: a
print "a" + "b" + "c"; // expect: abc
"#;
    check(CODE);
}

#[test]
fn add_mixed_operands_errors() {
    const CODE: &str = r#"print 1 + "a"; // expect runtime error: operands must be two numbers or two strings
"#;
    check(CODE);
}

#[test]
fn negate_non_number_errors() {
    const CODE: &str = r#"print -"a"; // expect runtime error: operand must be a number
"#;
    check(CODE);
}

#[test]
fn compare_non_numbers_errors() {
    const CODE: &str = r#"print "a" < "b"; // expect runtime error: operands must be numbers
"#;
    check(CODE);
}

#[test]
fn division_of_doubles() {
    const CODE: &str = r"print 5 / 2; // expect: 2.5
print 6 / 3; // expect: 2
";
    check(CODE);
}
