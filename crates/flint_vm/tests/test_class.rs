mod common;

use common::{check, check_stressed};

#[test]
fn classes_render_by_name() {
    const CODE: &str = r"class Foo {}

print Foo; // expect: <class Foo>
";
    check(CODE);
}

#[test]
fn instances_render_their_class() {
    const CODE: &str = r"class Foo {}

print Foo(); // expect: <instance of <class Foo>>
";
    check(CODE);
}

#[test]
fn bound_methods_render_receiver_and_function() {
    const CODE: &str = r"class Foo {
  bar() {}
}

print Foo().bar; // expect: <bound method <fn bar> of <instance of <class Foo>>>
";
    check(CODE);
}

#[test]
fn methods_are_callable_through_instances() {
    const CODE: &str = r#"class Greeter {
  hello() {
    print "hello";
  }
}

Greeter().hello(); // expect: hello
"#;
    check(CODE);
}

#[test]
fn this_is_the_receiver() {
    const CODE: &str = r"class A {
  m() {
    return this;
  }
}

var a = A();
print a.m() == a; // expect: true
";
    check(CODE);
}

#[test]
fn initializer_binds_fields() {
    const CODE: &str = r#"class Greeter {
  init(name) {
    this.name = name;
  }
  hi() {
    print "hi " + this.name;
  }
}

Greeter("world").hi(); // expect: hi world
"#;
    check(CODE);
}

#[test]
fn initializer_returns_the_instance() {
    const CODE: &str = r"class A {
  init() {
    this.value = 1;
  }
}

print A(); // expect: <instance of <class A>>
";
    check(CODE);
}

#[test]
fn fields_are_created_on_first_assignment() {
    const CODE: &str = r"class Box {}

var box = Box();
box.contents = 7;
print box.contents; // expect: 7
box.contents = 8;
print box.contents; // expect: 8
";
    check(CODE);
}

#[test]
fn fields_shadow_methods() {
    const CODE: &str = r#"class Widget {
  describe() {
    return "method";
  }
}

var widget = Widget();
print widget.describe(); // expect: method
widget.describe = "field";
print widget.describe; // expect: field
"#;
    check(CODE);
}

#[test]
fn bound_methods_remember_their_receiver() {
    const CODE: &str = r#"class Speaker {
  init(word) {
    this.word = word;
  }
  say() {
    print this.word;
  }
}

var hi = Speaker("hi").say;
var bye = Speaker("bye").say;
hi(); // expect: hi
bye(); // expect: bye
"#;
    check(CODE);
}

#[test]
fn methods_can_close_over_this() {
    const CODE: &str = r#"class Counter {
  init() {
    this.count = 0;
  }
  ticker() {
    fun tick() {
      this.count = this.count + 1;
      return this.count;
    }
    return tick;
  }
}

var tick = Counter().ticker();
print tick(); // expect: 1
print tick(); // expect: 2
"#;
    check(CODE);
}

#[test]
fn local_classes_resolve_themselves() {
    const CODE: &str = r"{
  class Foo {
    returnSelf() {
      return Foo;
    }
  }

  print Foo().returnSelf(); // expect: <class Foo>
}
";
    check(CODE);
}

#[test]
fn missing_property_errors() {
    const CODE: &str = r"class Empty {}

print Empty().missing; // expect runtime error: undefined property 'missing'
";
    check(CODE);
}

#[test]
fn property_get_on_non_instance_errors() {
    const CODE: &str = r"print (1).field; // expect runtime error: only instances have properties
";
    check(CODE);
}

#[test]
fn property_set_on_non_instance_errors() {
    const CODE: &str = r#""text".field = 1; // expect runtime error: only instances have fields
"#;
    check(CODE);
}

#[test]
fn plain_construction_takes_no_arguments() {
    const CODE: &str = r"class Empty {}

Empty(1); // expect runtime error: expected 0 arguments but got 1
";
    check(CODE);
}

#[test]
fn initializer_arity_is_checked() {
    const CODE: &str = r"class Pair {
  init(a, b) {
    this.a = a;
    this.b = b;
  }
}

Pair(1); // expect runtime error: expected 2 arguments but got 1
";
    check(CODE);
}

#[test]
fn instances_survive_collection_stress() {
    const CODE: &str = r#"class Node {
  init(value) {
    this.value = value;
  }
}

var sum = 0;
for (var i = 0; i < 20; i = i + 1) {
  var node = Node(i);
  sum = sum + node.value;
}
print sum; // expect: 190
"#;
    check_stressed(CODE);
}
