//! Cross-cutting properties: tag parity, own-property `in`, indexing edges,
//! destructuring equivalence, and idempotence.

use arachno::{RunError, Runner, Value, program_source};

fn run(source: &str) -> (Result<Value, RunError>, String) {
    Runner::new(source, "invariant.as").run_collect()
}

fn output(source: &str) -> String {
    let (result, output) = run(source);
    assert!(result.is_ok(), "expected success, got {result:?}\noutput so far: {output}");
    output
}

/// `typeof v` yields the same tag string diagnostics use for `v`.
#[test]
fn typeof_matches_diagnostic_tags() {
    let cases = [
        ("1", "number"),
        ("\"s\"", "string"),
        ("true", "boolean"),
        ("null", "null"),
        ("undefined", "undefined"),
        ("{ a: 1 }", "object"),
        ("[1]", "array"),
        ("(() => { return 1; })", "function"),
        ("#_print", "macro"),
        ("#_symbol_for(\"t\")", "symbol"),
    ];
    for (expr, tag) in cases {
        assert_eq!(output(&format!("#_print(typeof {expr});")), format!("{tag}\n"), "{expr}");
    }
    assert_eq!(output("class T {} spawn t = new T(); #_print(typeof T, typeof t);"), "class instance\n");
}

/// `k in o` iff `o` has an own property `k`; the prototype chain is excluded.
#[test]
fn in_checks_own_properties_only() {
    assert_eq!(output("spawn o = { a: 1 }; #_print(\"a\" in o, \"b\" in o);"), "true false\n");
    // fields live on the prototype, not in the instance's own map
    assert_eq!(
        output(
            "class C { x = 1; constructor() { this.own = 2; } } \
             spawn c = new C(); #_print(\"own\" in c, \"x\" in c);"
        ),
        "true false\n"
    );
}

/// Out-of-range array reads yield `undefined`; arrays do not wrap negative
/// indices, strings do.
#[test]
fn indexing_edges() {
    assert_eq!(output("spawn a = [1, 2]; #_print(a[5], a[-1]);"), "undefined undefined\n");
    assert_eq!(output("spawn s = \"abc\"; #_print(s[1], s[-1], s[9]);"), "b c undefined\n");
}

/// Assignment past the end extends with holes resolving to `undefined`.
#[test]
fn sparse_array_holes_read_as_undefined() {
    assert_eq!(
        output("spawn a = [1]; a[3] = 9; #_print(#_array_length(a), a[1], a[3]);"),
        "4 undefined 9\n"
    );
}

/// `var { x, y } = o` is equivalent to `var x = o.x; var y = o.y` when both
/// names are present, and a reference error otherwise.
#[test]
fn destructuring_equivalence() {
    let destructured = output("spawn o = { x: 1, y: 2 }; spawn { x, y } = o; #_print(x, y);");
    let member_reads = output("spawn o = { x: 1, y: 2 }; spawn x = o.x; spawn y = o.y; #_print(x, y);");
    assert_eq!(destructured, member_reads);

    let (result, _) = run("spawn o = { x: 1 }; spawn { x, missing } = o;");
    assert!(matches!(result, Err(RunError::Reference(_))), "{result:?}");
}

/// Evaluating a pure declaration twice in independent scopes yields equal
/// values.
#[test]
fn pure_declarations_are_idempotent() {
    let first = output("spawn x = 5 * 3 + 2; #_print(x);");
    let second = output("spawn x = 5 * 3 + 2; #_print(x);");
    assert_eq!(first, second);
    assert_eq!(first, "17\n");
}

/// Non-integer array indices are type errors.
#[test]
fn fractional_array_index_is_a_type_error() {
    let (result, _) = run("spawn a = [1, 2]; #_print(a[0.5]);");
    assert!(matches!(result, Err(RunError::Type(_))), "{result:?}");
}

/// Non-computed property access on strings and arrays is a type error.
#[test]
fn dot_access_on_strings_and_arrays_is_a_type_error() {
    let (result, _) = run("spawn s = \"abc\"; #_print(s.length);");
    assert!(matches!(result, Err(RunError::Type(_))), "{result:?}");
    let (result, _) = run("spawn a = [1]; #_print(a.head);");
    assert!(matches!(result, Err(RunError::Type(_))), "{result:?}");
}

/// Redeclaration in the same scope is rejected; shadowing in a child scope is
/// allowed.
#[test]
fn redeclaration_rules() {
    let (result, _) = run("spawn x = 1; spawn x = 2;");
    assert!(matches!(result, Err(RunError::Syntax(_))), "{result:?}");
    assert_eq!(output("spawn x = 1; { spawn x = 2; #_print(x); } #_print(x);"), "2\n1\n");
}

/// `parse(source)`, pretty-printed and re-parsed, evaluates to the same
/// output as the original.
#[test]
fn emitted_source_round_trips() {
    let scenarios = [
        "var a = 1 + 2 * 3; #_print(a);",
        "var s = \"a\" + 1; #_print(typeof s, s);",
        "class A { default value = 10; } var a = new A(); #_print(#_value(a));",
        "class A { default value = 10; } \
         class B extends A { constructor() { super(); } } \
         #_print(new B() instanceof B, new B() instanceof A);",
        "try { throw \"x\"; } catch (e) { #_print(\"caught\", e); } finally { #_print(\"done\"); }",
        "spawn p = new Promise((resolve) => resolve(42)); p.then((v) => #_print(\"got\", v));",
        "spawn out = \"\"; for (spawn v of [1, 2, 3]) { out = out + v; } #_print(out, `n: #{out}`);",
    ];
    for source in scenarios {
        let (original_result, original_output) = run(source);
        assert!(original_result.is_ok(), "{source}: {original_result:?}");
        let program = Runner::new(source, "invariant.as").parse().unwrap();
        let emitted = program_source(&program);
        let (emitted_result, emitted_output) = Runner::new(&emitted, "invariant.as").run_collect();
        assert!(emitted_result.is_ok(), "emitted source failed for {source}:\n{emitted}\n{emitted_result:?}");
        assert_eq!(emitted_output, original_output, "round-trip output diverged for {source}:\n{emitted}");
    }
}

/// Containers share their cell through assignment; scalars copy.
#[test]
fn reference_semantics_for_containers() {
    assert_eq!(
        output("spawn a = { n: 1 }; spawn b = a; b.n = 2; #_print(a.n);"),
        "2\n"
    );
    assert_eq!(output("spawn x = 1; spawn y = x; y = 2; #_print(x);"), "1\n");
    assert_eq!(
        output("function bump(o) { o.n = o.n + 1; } spawn o = { n: 1 }; bump(o); #_print(o.n);"),
        "2\n"
    );
}
