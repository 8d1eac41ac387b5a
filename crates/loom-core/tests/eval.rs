//! End-to-end `eval` tests, one per worked scenario.

use loom_core::{eval, eval_with, register_default_externs, ExternRegistry, NoopTracer, VmLimits};

// =============================================================================
// 1. arithmetic and compound assignment
// =============================================================================

#[test]
fn compound_assignment_chain() {
    let (code, diags) = eval("let a = 2; a += 1; a *= 14; a");
    assert_eq!(code, 42);
    assert!(diags.is_empty());
}

#[test]
fn integer_division_and_mod_follow_host_semantics() {
    let (code, diags) = eval("7 / 2 * 10 + 7 % 2");
    assert_eq!(code, 31);
    assert!(diags.is_empty());
}

// =============================================================================
// 2. comparisons
// =============================================================================

#[test]
fn not_equal_compares_operands_once_each() {
    // A regression check: `!=` must not double-evaluate its operands by
    // synthesizing an `==` node that reuses the same sub-expression twice.
    let (code, diags) = eval("let a = [0]; let x = array_pop(a) != 1; array_len(a)");
    assert_eq!(code, 0);
    assert!(diags.is_empty());
}

#[test]
fn ordering_is_total_across_types() {
    let (code, diags) = eval("if (1 < \"a\") { 1 } else { 0 }");
    assert_eq!(code, 1);
    assert!(diags.is_empty());
}

// =============================================================================
// 3. strings and arrays
// =============================================================================

#[test]
fn string_concatenation_and_indexing() {
    let (code, diags) = eval("let s = \"a\" + \"bc\"; s[2]");
    assert_eq!(code, i64::from(b'c') as i32);
    assert!(diags.is_empty());
}

#[test]
fn array_builtins_push_and_len() {
    let (code, diags) = eval("let a = []; array_push(a, 1); array_push(a, 2); array_len(a)");
    assert_eq!(code, 2);
    assert!(diags.is_empty());
}

#[test]
fn array_index_assignment_round_trips() {
    let (code, diags) = eval("let a = []; array_push(a, 0); a[0] = 9; a[0]");
    assert_eq!(code, 9);
    assert!(diags.is_empty());
}

#[test]
fn array_pop_on_empty_array_is_diagnosed() {
    let (code, diags) = eval("let a = []; array_pop(a)");
    assert_eq!(code, 1);
    assert!(diags.contains("empty"));
}

// =============================================================================
// 4. closures
// =============================================================================

#[test]
fn closures_capture_their_defining_scope() {
    let (code, diags) = eval("let f = fun(x) x + 1; f(41)");
    assert_eq!(code, 42);
    assert!(diags.is_empty());
}

#[test]
fn nested_closures_see_enclosing_locals() {
    let src = "
        let make_adder = fun(x) fun(y) x + y;
        let add_five = make_adder(5);
        add_five(37)
    ";
    let (code, diags) = eval(src);
    assert_eq!(code, 42);
    assert!(diags.is_empty());
}

#[test]
fn extra_call_arguments_are_truncated_missing_ones_are_null() {
    let (code, diags) = eval("let f = fun(x, y) y; f(1, 2, 3)");
    assert_eq!(code, 2);
    assert!(diags.is_empty());

    let (code, diags) = eval("let f = fun(x, y) y; f(1)");
    assert_eq!(code, 0);
    assert!(diags.is_empty());
}

// =============================================================================
// 5. control flow
// =============================================================================

#[test]
fn while_loop_accumulates() {
    let src = "
        let i = 0;
        let sum = 0;
        while (i < 10) {
            sum += i;
            i += 1;
        }
        sum
    ";
    let (code, diags) = eval(src);
    assert_eq!(code, 45);
    assert!(diags.is_empty());
}

#[test]
fn break_outside_a_loop_is_a_diagnosed_runtime_error() {
    let (code, diags) = eval("break");
    assert_eq!(code, 1);
    assert!(diags.contains("break"));
}

// =============================================================================
// 6. diagnostics force a non-zero exit code
// =============================================================================

#[test]
fn diagnostics_force_nonzero_exit_even_with_clean_vm_result() {
    let (code, diags) = eval("let a = does_not_exist; 0");
    assert_eq!(code, 1);
    assert!(!diags.is_empty());
}

// =============================================================================
// 7. host extern functions
// =============================================================================

#[test]
fn host_externs_can_be_registered_alongside_the_array_builtins() {
    use loom_core::vm::cell::Cell;

    let mut externs = ExternRegistry::new();
    register_default_externs(&mut externs);
    externs.register("double", |call| {
        let Cell::Int(v) = call.arg(0) else {
            call.reject("double: argument must be an int");
            return;
        };
        call.resolve(Cell::Int(v * 2));
    });

    let src = "let a = []; array_push(a, double(21)); array_pop(a)";
    let (code, diags) = eval_with(src, VmLimits::default(), &mut NoopTracer, &mut externs);
    assert_eq!(code, 42);
    assert!(diags.is_empty());
}
