//! End-to-end compilation scenarios spanning lexer, parser, and analyzer.

use aro::{compile, compile_and_optimize};

#[test]
fn a_well_formed_program_compiles_cleanly() {
    let source = r#"
    (F: Orders Summary) {
        <Extract> the <rows> from the <orders_file>.
        <Filter> the <open_rows> from the <rows> where status = "open".
        <Reduce> the <total> from the <open_rows> with sum(amount).
        Publish as <OrderTotal> <total>.
    }
    "#;
    let result = compile(source);
    assert!(result.success(), "{:?}", result.diagnostics.diagnostics());
    assert_eq!(result.program.feature_sets.len(), 1);
}

#[test]
fn an_undefined_read_is_reported_as_an_error_not_a_panic() {
    let source = r#"
    (F: Broken) {
        <Log> the <phantom> to the <console>.
    }
    "#;
    let result = compile(source);
    assert!(!result.success());
    let diags = result.diagnostics.diagnostics();
    assert!(diags.iter().any(|d| d.message.contains("phantom")));
}

#[test]
fn a_publish_in_one_feature_set_resolves_a_read_in_another() {
    let source = r#"
    (F: Producer) {
        <Extract> the <id> from the <request>.
        Publish as <CustomerId> <id>.
    }
    (F: Consumer) {
        <Log> the <CustomerId> to the <console>.
    }
    "#;
    let result = compile(source);
    assert!(result.success(), "{:?}", result.diagnostics.diagnostics());
}

#[test]
fn match_and_for_each_bodies_do_not_leak_bindings_into_sibling_statements() {
    let source = r#"
    (F: Branching) {
        <Extract> the <order> from the <request>.
        match <order> {
            case pending { <Log> "pending" to <console>. }
            otherwise { <Log> "other" to <console>. }
        }
        for each item in <order> {
            <Log> the <item> to the <console>.
        }
    }
    "#;
    let result = compile(source);
    assert!(result.success(), "{:?}", result.diagnostics.diagnostics());
}

#[test]
fn circular_handler_chains_are_reported() {
    let source = r#"
    (AHandler: A Handler) {
        <Emit> the <B> to <console>.
    }
    (BHandler: B Handler) {
        <Emit> the <A> to <console>.
    }
    "#;
    let result = compile(source);
    let diags = result.diagnostics.diagnostics();
    assert!(diags.iter().any(|d| d.message.contains("circular dependency")));
}

#[test]
fn compile_and_optimize_produces_a_plan_per_feature_set() {
    let source = r#"
    (F: A) {
        <Extract> the <rows> from the <request>.
        <Filter> the <a> from the <rows> where amount > 10.
        <Filter> the <b> from the <rows> where status = "open".
    }
    "#;
    let (result, plans) = compile_and_optimize(source);
    assert!(result.success(), "{:?}", result.diagnostics.diagnostics());
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].fused_filter_groups.len(), 1);
    assert!(plans[0].projected_fields.contains("amount"));
    assert!(plans[0].projected_fields.contains("status"));
}
