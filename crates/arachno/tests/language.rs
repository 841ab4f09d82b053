//! Language behavior: operators, control flow, functions, classes, modules,
//! and the async surface.

use arachno::{ErrorKind, RunError, Runner, Value};

fn run(source: &str) -> (Result<Value, RunError>, String) {
    Runner::new(source, "language.as").run_collect()
}

fn output(source: &str) -> String {
    let (result, output) = run(source);
    assert!(result.is_ok(), "expected success, got {result:?}\noutput so far: {output}");
    output
}

// ---- operators ----

#[test]
fn exponent_rounds_the_right_operand() {
    assert_eq!(output("#_print(2 ** 3, 2 ** 2.6);"), "8 8\n");
}

#[test]
fn modulo_rounds_the_left_operand() {
    assert_eq!(output("#_print(7 % 4, 7.5 % 2);"), "3 0\n");
}

#[test]
fn division_of_non_numbers_is_a_type_error() {
    let (result, _) = run("spawn x = \"a\" / 2;");
    assert!(matches!(result, Err(RunError::Type(_))), "{result:?}");
}

#[test]
fn ordering_uses_string_byte_length() {
    assert_eq!(output("#_print(\"abc\" < \"abcd\", \"abc\" > 10);"), "true false\n");
}

#[test]
fn equality_is_structural_and_strict_adds_type_tags() {
    assert_eq!(
        output("#_print(1 == 1, [1, 2] == [1, 2], 1 === 1, \"1\" == 1);"),
        "true true true false\n"
    );
}

#[test]
fn logical_operators_return_their_operands() {
    assert_eq!(output("#_print(0 || \"x\", 1 && 2, !0);"), "x 2 true\n");
}

#[test]
fn nullish_assignment_only_fills_nullish_slots() {
    assert_eq!(
        output("spawn a = null; a ??= 5; spawn b = 7; b ??= 9; #_print(a, b);"),
        "5 7\n"
    );
}

#[test]
fn compound_assignment_concatenates_strings() {
    assert_eq!(output("spawn s = \"a\"; s += 1; s += \"b\"; #_print(s);"), "a1b\n");
}

#[test]
fn increments_work_prefix_and_postfix() {
    assert_eq!(output("spawn x = 1; #_print(x++, x, ++x);"), "1 2 3\n");
}

#[test]
fn increment_through_member_access() {
    assert_eq!(output("spawn o = { n: 1 }; ++o.n; #_print(o.n);"), "2\n");
}

#[test]
fn ternary_and_match_expressions() {
    assert_eq!(output("#_print(1 ? \"yes\" : \"no\");"), "yes\n");
    assert_eq!(
        output("spawn v = match 2 { 1 => \"one\", 2 => \"two\", 3 => \"three\" }; #_print(v);"),
        "two\n"
    );
    assert_eq!(output("#_print(match 9 { 1 => \"one\" });"), "null\n");
}

#[test]
fn typeof_and_void() {
    assert_eq!(output("#_print(typeof 1, typeof \"s\", typeof [1], void 1);"), "number string array undefined\n");
}

// ---- control flow ----

#[test]
fn while_loop_with_break_and_continue() {
    assert_eq!(
        output(
            "spawn i = 0; spawn total = 0; \
             while (i < 10) { \
                 i = i + 1; \
                 if (i % 2 == 0) { continue; } \
                 if (i > 7) { break; } \
                 total = total + i; \
             } \
             #_print(i, total);"
        ),
        "9 16\n"
    );
}

#[test]
fn do_while_runs_at_least_once() {
    assert_eq!(output("spawn n = 0; do { n = n + 1; } while (n < 0); #_print(n);"), "1\n");
}

#[test]
fn c_style_for_loop() {
    assert_eq!(
        output("spawn total = 0; for (i = 0; i < 4; i = i + 1) { total = total + i; } #_print(total);"),
        "6\n"
    );
}

#[test]
fn for_of_over_arrays_objects_and_strings() {
    assert_eq!(
        output("spawn out = \"\"; for (spawn v of [1, 2, 3]) { out = out + v; } #_print(out);"),
        "123\n"
    );
    assert_eq!(
        output("spawn out = \"\"; for (spawn v of { a: \"x\", b: \"y\" }) { out = out + v; } #_print(out);"),
        "xy\n"
    );
    assert_eq!(
        output("spawn out = \"\"; for (spawn c of \"abc\") { out = out + c + \".\"; } #_print(out);"),
        "a.b.c.\n"
    );
}

#[test]
fn for_in_iterates_keys() {
    assert_eq!(
        output("spawn out = \"\"; for (spawn k in { a: 1, b: 2 }) { out = out + k; } #_print(out);"),
        "ab\n"
    );
    assert_eq!(
        output("spawn total = 0; for (spawn i in [5, 6, 7]) { total = total + i; } #_print(total);"),
        "3\n"
    );
}

#[test]
fn switch_matches_first_case_without_fallthrough() {
    assert_eq!(
        output(
            "switch (2) { \
                 case 1: { #_print(\"one\"); } \
                 case 2: { #_print(\"two\"); } \
                 default: { #_print(\"other\"); } \
             }"
        ),
        "two\n"
    );
    assert_eq!(
        output("switch (9) { case 1: { #_print(\"one\"); } default: { #_print(\"other\"); } }"),
        "other\n"
    );
}

// ---- destructuring ----

#[test]
fn object_and_array_destructuring_declarations() {
    assert_eq!(
        output("spawn o = { x: 1, y: 2 }; spawn { x, y: z } = o; #_print(x, z);"),
        "1 2\n"
    );
    assert_eq!(output("spawn [ a, b ] = [10, 20]; #_print(a, b);"), "10 20\n");
}

#[test]
fn destructuring_in_for_iterator_loops() {
    assert_eq!(
        output(
            "spawn rows = [{ id: 1 }, { id: 2 }]; spawn out = \"\"; \
             for (spawn { id } of rows) { out = out + id; } #_print(out);"
        ),
        "12\n"
    );
}

#[test]
fn destructured_parameters() {
    assert_eq!(
        output("function dist({ x, y }) { return x * x + y * y; } #_print(dist({ x: 3, y: 4 }));"),
        "25\n"
    );
}

// ---- functions ----

#[test]
fn default_parameters_apply_on_nullish_arguments() {
    assert_eq!(
        output("function f(a = 5) { return a; } #_print(f(), f(2), f(null));"),
        "5 2 5\n"
    );
}

#[test]
fn rest_parameters_collect_the_tail() {
    assert_eq!(
        output("function count(first, ...rest) { return #_array_length(rest); } #_print(count(1, 2, 3, 4));"),
        "3\n"
    );
}

#[test]
fn spread_arguments_flatten_arrays() {
    assert_eq!(
        output("function add(a, b, c) { return a + b + c; } spawn args = [1, 2, 3]; #_print(add(...args));"),
        "6\n"
    );
}

#[test]
fn closures_capture_their_declaration_environment() {
    assert_eq!(
        output(
            "function counter() { \
                 spawn n = 0; \
                 return { bump() { n = n + 1; return n; } }; \
             } \
             spawn c = counter(); c.bump(); #_print(c.bump());"
        ),
        "2\n"
    );
}

#[test]
fn object_methods_see_this() {
    assert_eq!(
        output("spawn obj = { name: \"obj\", get() { return this.name; } }; #_print(obj.get());"),
        "obj\n"
    );
}

#[test]
fn function_without_return_yields_undefined() {
    assert_eq!(output("function noop() { 1 + 1; } #_print(noop());"), "undefined\n");
}

#[test]
fn return_outside_function_is_a_syntax_error() {
    let (result, _) = run("return 1;");
    assert!(matches!(result, Err(RunError::Syntax(_))), "{result:?}");
}

// ---- classes ----

#[test]
fn fields_methods_and_constructor() {
    assert_eq!(
        output(
            "class Point { \
                 x = 0; \
                 y = 0; \
                 function sum() { return this.x + this.y; } \
                 constructor(a, b) { this.x = a; this.y = b; } \
             } \
             spawn p = new Point(3, 4); #_print(p.sum());"
        ),
        "7\n"
    );
}

#[test]
fn methods_are_reachable_through_the_super_chain() {
    assert_eq!(
        output(
            "class Base { function hello() { return \"base\"; } constructor() {} } \
             class Child extends Base { constructor() { super(); } } \
             #_print(new Child().hello());"
        ),
        "base\n"
    );
}

#[test]
fn field_initializers_run_in_declaration_order() {
    assert_eq!(
        output("class Pair { a = 1; b = a + 1; } spawn p = new Pair(); #_print(p.a, p.b);"),
        "1 2\n"
    );
}

#[test]
fn instance_iterator_protocol_drives_for_of() {
    assert_eq!(
        output(
            "class Counter { \
                 limit = 3; \
                 function [#_symbol_for(\"iterator\")]() { \
                     spawn count = 0; \
                     spawn max = this.limit; \
                     return { \
                         next() { \
                             count = count + 1; \
                             return count > max ? { done: true } : { value: count, done: false }; \
                         } \
                     }; \
                 } \
             } \
             spawn out = \"\"; \
             for (spawn v of new Counter()) { out = out + v; } \
             #_print(out);"
        ),
        "123\n"
    );
}

#[test]
fn redeclaring_a_class_name_is_a_syntax_error() {
    let (result, _) = run("class A {} class A {}");
    assert!(matches!(result, Err(RunError::Syntax(_))), "{result:?}");
}

// ---- errors ----

#[test]
fn type_errors_are_catchable() {
    let out = output("try { 1 + null; } catch (e) { #_print(\"caught\", e); }");
    assert!(out.starts_with("caught TypeError:"), "{out}");
}

#[test]
fn reference_errors_are_catchable() {
    assert_eq!(output("try { missing; } catch (e) { #_print(\"caught\"); }"), "caught\n");
}

#[test]
fn uncaught_throw_unwinds_to_the_host() {
    let (result, _) = run("throw \"boom\";");
    match result {
        Err(RunError::Thrown(Value::Str(s))) => assert_eq!(&*s, "boom"),
        other => panic!("expected thrown value, got {other:?}"),
    }
}

#[test]
fn assignment_to_constant_is_a_syntax_error() {
    let (result, _) = run("immortal x = 1; x = 2;");
    match result {
        Err(RunError::Syntax(err)) => assert_eq!(err.kind, ErrorKind::SyntaxError),
        other => panic!("expected syntax error, got {other:?}"),
    }
}

#[test]
fn finally_runs_even_when_nothing_is_thrown() {
    assert_eq!(output("try { #_print(\"a\"); } catch (e) { #_print(\"b\"); } finally { #_print(\"c\"); }"), "a\nc\n");
}

#[test]
fn nested_try_rethrow_reaches_the_outer_catch() {
    assert_eq!(
        output(
            "try { \
                 try { throw \"inner\"; } catch (e) { throw e; } \
             } catch (e) { #_print(\"outer\", e); }"
        ),
        "outer inner\n"
    );
}

// ---- values and printing ----

#[test]
fn template_strings_interpolate() {
    assert_eq!(output("spawn name = \"world\"; #_print(`hi #{name}!`);"), "hi world!\n");
    assert_eq!(output("#_print(`sum: #{1 + 2}`);"), "sum: 3\n");
}

#[test]
fn arrays_print_with_brackets() {
    assert_eq!(output("#_print([1, \"two\", true]);"), "[ 1, \"two\", true ]\n");
}

#[test]
fn delete_removes_bindings_and_properties() {
    assert_eq!(output("spawn o = { a: 1 }; delete o.a; #_print(\"a\" in o);"), "false\n");
    let (result, _) = run("spawn x = 1; delete x; #_print(x);");
    assert!(matches!(result, Err(RunError::Reference(_))), "{result:?}");
}

#[test]
fn global_this_creates_mutable_bindings() {
    assert_eq!(
        output("globalThis.counter = 5; #_print(globalThis.counter, counter); counter = 6; #_print(counter);"),
        "5 5\n6\n"
    );
}

#[test]
fn symbols_intern_and_share() {
    assert_eq!(
        output("spawn a = #_symbol_for(\"k\"); spawn b = #_symbol_for(\"k\"); #_print(a == b, typeof a);"),
        "true symbol\n"
    );
}

#[test]
fn byte_array_macros_round_trip() {
    assert_eq!(
        output(
            "spawn bytes = #_new_byte_array(\"hi\"); \
             #_print(#_byte_array_length(bytes), #_byte_at(bytes, 0), #_is_byte_array(bytes), #_is_byte_array(1)); \
             #_push_byte(bytes, #_byte(33)); \
             #_print(#_decode_byte_array(bytes));"
        ),
        "2 104 true false\nhi!\n"
    );
}

#[test]
fn string_helpers() {
    assert_eq!(output("#_print(#_str_length(\"abc\"), #_str_length(1));"), "3 -1\n");
    assert_eq!(output("#_print(#_slice_str(1, 2, \"abcd\"));"), "bc\n");
    assert_eq!(output("#_print(#_to_string(12), #_to_string(true));"), "12 true\n");
}

// ---- async ----

#[test]
fn async_function_bodies_run_after_synchronous_code() {
    assert_eq!(
        output("async function work() { #_print(\"inside\"); return 1; } work(); #_print(\"after\");"),
        "after\ninside\n"
    );
}

#[test]
fn await_forces_synchronous_evaluation() {
    assert_eq!(
        output("async function work() { return 7; } spawn result = await work(); #_print(result);"),
        "7\n"
    );
}

#[test]
fn promise_catch_receives_executor_errors() {
    assert_eq!(
        output(
            "spawn p = new Promise((resolve) => { throw \"nope\"; }); \
             p.catch((e) => #_print(\"failed\", e));"
        ),
        "failed nope\n"
    );
}

#[test]
fn promise_finally_runs_after_settlement() {
    assert_eq!(
        output(
            "spawn p = new Promise((resolve) => resolve(1)); \
             p.then((v) => #_print(\"then\", v)); \
             p.finally(() => #_print(\"finally\"));"
        ),
        "then 1\nfinally\n"
    );
}

// ---- modules ----

fn write_temp_module(name: &str, contents: &str) -> String {
    let dir = std::env::temp_dir().join(format!("arachno-tests-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp module dir");
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write temp module");
    path.to_string_lossy().into_owned()
}

#[test]
fn named_imports_bind_exports() {
    let module = write_temp_module(
        "math_utils.as",
        "export spawn magic = 42; export function double(n) { return n * 2; }",
    );
    let source = format!("import {{ magic, double }} from \"{module}\"; #_print(magic, double(21));");
    assert_eq!(output(&source), "42 42\n");
}

#[test]
fn namespace_imports_expose_the_module_object() {
    let module = write_temp_module("ns_utils.as", "export spawn magic = 7;");
    let source = format!("import util from \"{module}\"; #_print(util.magic);");
    assert_eq!(output(&source), "7\n");
}

#[test]
fn from_expressions_evaluate_modules_inline() {
    let module = write_temp_module("inline_utils.as", "export spawn answer = 42;");
    let source = format!("spawn m = from \"{module}\"; #_print(m.answer);");
    assert_eq!(output(&source), "42\n");
}

#[test]
fn each_import_re_evaluates_the_target() {
    let module = write_temp_module("effect.as", "#_print(\"evaluated\"); export spawn x = 1;");
    let source = format!("import \"{module}\"; import \"{module}\";");
    assert_eq!(output(&source), "evaluated\nevaluated\n");
}

#[test]
fn dynamic_import_awaits_to_the_module_object() {
    let module = write_temp_module("dyn_utils.as", "export spawn magic = 9;");
    let source = format!("spawn m = await import(\"{module}\"); #_print(m.magic);");
    assert_eq!(output(&source), "9\n");
}
