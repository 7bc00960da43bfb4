//! Integration tests for the four-pass semantic analyzer, covering
//! interactions between passes that the inline unit tests (scoped to one
//! pass at a time) don't exercise together.

use aro::analyzer::analyze;
use aro::parser::Parser;

fn analyze_source(src: &str) -> aro::analyzer::AnalyzedProgram {
    let (program, errors) = Parser::parse_source(src);
    assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
    analyze(&program)
}

#[test]
fn duplicate_feature_set_names_are_reported() {
    let analyzed = analyze_source(
        r#"
        (F: A) { <Extract> the <x> from the <request>. }
        (F: B) { <Extract> the <y> from the <request>. }
        "#,
    );
    let diags = analyzed.diagnostics.diagnostics();
    assert!(diags.iter().any(|d| d.message.contains("duplicate feature set name")));
}

#[test]
fn unused_internal_bindings_produce_warnings_not_errors() {
    let analyzed = analyze_source(
        r#"
        (F: A) {
            <Extract> the <unused> from the <request>.
        }
        "#,
    );
    assert!(analyzed.diagnostics.is_success());
    let diags = analyzed.diagnostics.diagnostics();
    assert!(diags.iter().any(|d| d.message.contains("unused variable 'unused'")));
}

#[test]
fn an_underscore_prefixed_binding_is_exempt_from_the_unused_warning() {
    let analyzed = analyze_source(
        r#"
        (F: A) {
            <Extract> the <_scratch> from the <request>.
        }
        "#,
    );
    let diags = analyzed.diagnostics.diagnostics();
    assert!(!diags.iter().any(|d| d.message.contains("_scratch")));
}

#[test]
fn a_three_feature_set_cycle_is_still_detected() {
    let analyzed = analyze_source(
        r#"
        (AHandler: A Handler) { <Emit> the <B> to <console>. }
        (BHandler: B Handler) { <Emit> the <C> to <console>. }
        (CHandler: C Handler) { <Emit> the <A> to <console>. }
        "#,
    );
    let diags = analyzed.diagnostics.diagnostics();
    assert!(diags.iter().any(|d| d.message.contains("circular dependency")));
}

#[test]
fn a_published_symbol_carries_its_declared_type_to_the_registry() {
    let analyzed = analyze_source(
        r#"
        (F: Producer) {
            <Extract> the <count: Integer> from the <request>.
            Publish as <Count> <count>.
        }
        "#,
    );
    assert!(analyzed.diagnostics.is_success());
    let entry = analyzed.registry.get("Count").expect("Count was published");
    assert_eq!(entry.ty, aro::symbols::Ty::Integer);
}

#[test]
fn socket_event_and_file_event_handlers_never_trigger_the_orphan_warning() {
    let analyzed = analyze_source(
        r#"
        (SocketEventHandler: SocketEvent Handler) {
            <Log> "socket fired" to <console>.
        }
        "#,
    );
    let diags = analyzed.diagnostics.diagnostics();
    assert!(!diags.iter().any(|d| d.message.contains("no statement ever emits")));
}
