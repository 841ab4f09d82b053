//! End-to-end scenarios: literal programs with pinned output.

use arachno::{RunError, Runner, Value};

fn run(source: &str) -> (Result<Value, RunError>, String) {
    Runner::new(source, "scenario.as").run_collect()
}

fn output(source: &str) -> String {
    let (result, output) = run(source);
    assert!(result.is_ok(), "expected success, got {result:?}\noutput so far: {output}");
    output
}

#[test]
fn arithmetic_precedence_prints_seven() {
    assert_eq!(output("var a = 1 + 2 * 3; #_print(a);"), "7\n");
}

#[test]
fn string_concat_with_number() {
    assert_eq!(output("var s = \"a\" + 1; #_print(typeof s, s);"), "string a1\n");
}

#[test]
fn default_field_read_by_value_macro() {
    assert_eq!(
        output("class A { default value = 10; } var a = new A(); #_print(#_value(a));"),
        "10\n"
    );
}

#[test]
fn instanceof_compares_class_handles_only() {
    // documented narrow instanceof: no extends walk
    assert_eq!(
        output(
            "class A { default value = 10; } \
             class B extends A { constructor() { super(); } } \
             #_print(new B() instanceof B, new B() instanceof A);"
        ),
        "true false\n"
    );
}

#[test]
fn try_catch_finally_ordering() {
    assert_eq!(
        output("try { throw \"x\"; } catch (e) { #_print(\"caught\", e); } finally { #_print(\"done\"); }"),
        "caught x\ndone\n"
    );
}

#[test]
fn promise_resolves_after_microtask_drain() {
    assert_eq!(
        output("spawn p = new Promise((resolve) => resolve(42)); p.then((v) => #_print(\"got\", v));"),
        "got 42\n"
    );
}
