mod common;

use common::{check, check_stressed};

#[test]
fn counter_captures_by_reference() {
    const CODE: &str = r"fun make() {
  var x = 0;
  fun inc() {
    x = x + 1;
    return x;
  }
  return inc;
}
var f = make();
print f(); // expect: 1
print f(); // expect: 2
print f(); // expect: 3
";
    check(CODE);
}

#[test]
fn open_upvalue_writes_reach_the_stack_slot() {
    const CODE: &str = r"fun outer() {
  var x = 1;
  fun inner() {
    x = x + 1;
    print x;
  }
  inner(); // expect: 2
  inner(); // expect: 3
}
outer();
";
    check(CODE);
}

#[test]
fn sibling_closures_share_one_upvalue() {
    const CODE: &str = r#"var f;
var g;

{
  var local = "local";
  fun f_() {
    print local;
    local = "after f";
    print local;
  }
  f = f_;

  fun g_() {
    print local;
    local = "after g";
    print local;
  }
  g = g_;
}

f();
// expect: local
// expect: after f

g();
// expect: after f
// expect: after g
"#;
    check(CODE);
}

#[test]
fn open_closure_in_function() {
    const CODE: &str = r#"{
  var local = "local";
  fun f() {
    print local; // expect: local
  }
  f();
}
"#;
    check(CODE);
}

#[test]
fn closed_closure_in_function() {
    const CODE: &str = r#"var f;

{
  var local = "local";
  fun f_() {
    print local;
  }
  f = f_;
}

f(); // expect: local
"#;
    check(CODE);
}

#[test]
fn close_over_function_parameter() {
    const CODE: &str = r#"var f;

fun foo(param) {
  fun f_() {
    print param;
  }
  f = f_;
}
foo("param");

f(); // expect: param
"#;
    check(CODE);
}

#[test]
fn nested_closure() {
    const CODE: &str = r#"var f;

fun f1() {
  var a = "a";
  fun f2() {
    var b = "b";
    fun f3() {
      var c = "c";
      fun f4() {
        print a;
        print b;
        print c;
      }
      f = f4;
    }
    f3();
  }
  f2();
}
f1();

f();
// expect: a
// expect: b
// expect: c
"#;
    check(CODE);
}

#[test]
fn reuse_closure_slot() {
    const CODE: &str = r#"{
  var f;

  {
    var a = "a";
    fun f_() { print a; }
    f = f_;
  }

  {
    // Since a is out of scope, the local slot will be reused by b. Make sure
    // that f still closes over a.
    var b = "b";
    f(); // expect: a
  }
}
"#;
    check(CODE);
}

#[test]
fn close_over_later_variable() {
    const CODE: &str = r#"// This captures an earlier local *after* a later one, which walks past the
// end of the sorted open-upvalue list.
fun f() {
  var a = "a";
  var b = "b";
  fun g() {
    print b; // expect: b
    print a; // expect: a
  }
  g();
}
f();
"#;
    check(CODE);
}

#[test]
fn unused_later_closure() {
    const CODE: &str = r#"// When closing upvalues for discarded locals, only the upvalue for the
// matching stack slot may close. Here "b" is compiled as captured but its
// closure never runs, so no upvalue exists for it when it leaves scope; "a"
// must stay open.
var closure;

{
  var a = "a";

  {
    var b = "b";
    fun returnA() {
      return a;
    }

    closure = returnA;

    if (false) {
      fun returnB() {
        return b;
      }
    }
  }

  print closure(); // expect: a
}
"#;
    check(CODE);
}

#[test]
fn unused_closure_in_dead_branch() {
    const CODE: &str = r#"{
  var a = "a";
  if (false) {
    fun foo() { a; }
  }
}

print "ok"; // expect: ok
"#;
    check(CODE);
}

#[test]
fn shadow_closure_with_local() {
    const CODE: &str = r#"{
  var foo = "closure";
  fun f() {
    {
      print foo; // expect: closure
      var foo = "shadow";
      print foo; // expect: shadow
    }
    print foo; // expect: closure
  }
  f();
}
"#;
    check(CODE);
}

#[test]
fn assign_to_shadowed_later() {
    const CODE: &str = r#"var a = "global";

{
  fun assign() {
    a = "assigned";
  }

  var a = "inner";
  assign();
  print a; // expect: inner
}

print a; // expect: assigned
"#;
    check(CODE);
}

#[test]
fn reference_closure_multiple_times() {
    const CODE: &str = r#"var f;

{
  var a = "a";
  fun f_() {
    print a;
    print a;
  }
  f = f_;
}

f();
// expect: a
// expect: a
"#;
    check(CODE);
}

#[test]
fn closures_survive_collection_stress() {
    const CODE: &str = r"fun make(start) {
  var x = start;
  fun inc() {
    x = x + 1;
    return x;
  }
  return inc;
}
var a = make(0);
var b = make(10);
print a(); // expect: 1
print b(); // expect: 11
print a(); // expect: 2
print b(); // expect: 12
";
    check_stressed(CODE);
}
