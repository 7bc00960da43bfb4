//! Integration tests for the parser, covering constructs that compose
//! several grammar productions together.

use aro::ast::{ObjectSlot, Statement, ValueSource};
use aro::parser::Parser;

fn parse_ok(src: &str) -> aro::ast::Program {
    let (program, errors) = Parser::parse_source(src);
    assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
    program
}

#[test]
fn parses_two_feature_sets_with_an_aro_statement_each() {
    let program = parse_ok(
        r#"
        (F: First) {
            <Extract> the <rows> from the <request>.
        }
        (S: Second) {
            <Log> the <rows> to the <console>.
        }
        "#,
    );
    assert_eq!(program.feature_sets.len(), 2);
    assert_eq!(program.feature_sets[0].name, "F");
    assert_eq!(program.feature_sets[1].name, "S");
}

#[test]
fn a_sink_verb_parses_its_object_as_a_free_expression() {
    let program = parse_ok(r#"(F: A) { <Log> "hello" to <console>. }"#);
    let Statement::Aro(aro) = &program.feature_sets[0].statements[0] else {
        panic!("expected an Aro statement");
    };
    assert!(matches!(aro.value, ValueSource::Sink(_)));
}

#[test]
fn an_object_clause_may_be_a_qualified_noun_or_an_expression() {
    let program = parse_ok(
        r#"
        (F: A) {
            <Extract> the <a> from the <request>.
            <Compute> the <b> from 1 + 2.
        }
        "#,
    );
    let Statement::Aro(first) = &program.feature_sets[0].statements[0] else {
        panic!()
    };
    assert!(matches!(first.object.object, ObjectSlot::Noun(_)));

    let Statement::Aro(second) = &program.feature_sets[0].statements[1] else {
        panic!()
    };
    assert!(matches!(second.object.object, ObjectSlot::Expression(_)));
}

#[test]
fn match_with_cases_and_otherwise_parses_into_one_statement() {
    let program = parse_ok(
        r#"
        (F: A) {
            <Extract> the <order> from the <request>.
            match <order> {
                case pending { <Log> "pending" to <console>. }
                case 1 { <Log> "one" to <console>. }
                otherwise { <Log> "other" to <console>. }
            }
        }
        "#,
    );
    let Statement::Match(m) = &program.feature_sets[0].statements[1] else {
        panic!("expected a match statement");
    };
    assert_eq!(m.cases.len(), 2);
    assert!(m.otherwise.is_some());
}

#[test]
fn for_each_parses_item_index_and_where_clause() {
    let program = parse_ok(
        r#"
        (F: A) {
            <Extract> the <rows> from the <request>.
            for each row at idx in <rows> where idx > 0 {
                <Log> the <row> to the <console>.
            }
        }
        "#,
    );
    let Statement::ForEach(f) = &program.feature_sets[0].statements[1] else {
        panic!("expected a for-each statement");
    };
    assert_eq!(f.item, "row");
    assert_eq!(f.index.as_deref(), Some("idx"));
    assert!(f.where_clause.is_some());
}

#[test]
fn publish_and_require_statements_parse() {
    let program = parse_ok(
        r#"
        (F: A) {
            Require <external_dependency> from an upstream configuration service.
            <Extract> the <id> from the <request>.
            Publish as <OrderId> <id>.
        }
        "#,
    );
    assert!(matches!(program.feature_sets[0].statements[0], Statement::Require(_)));
    assert!(matches!(program.feature_sets[0].statements[2], Statement::Publish(_)));
}

#[test]
fn an_unterminated_statement_produces_a_parse_error_not_a_panic() {
    let (_, errors) = Parser::parse_source("(F: A) { <Extract> the <rows> from the <request> }");
    assert!(!errors.is_empty());
}

#[test]
fn a_lex_error_that_never_surfaces_as_an_error_token_still_reaches_parse_source() {
    let (_, errors) = Parser::parse_source(r#"(F: A) { <Log> "bad \q escape" to <console>. }"#);
    assert!(errors
        .iter()
        .any(|e| matches!(e, aro::error::ParseError::LexerError(_))));
}
