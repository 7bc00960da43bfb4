//! Integration tests for the lazy stream operators and value coercion.
//! External sort and tee fan-out have their own dedicated test files.

use aro::stream::spill::{distinct_by, group_by, SpillOptions};
use aro::stream::{from_iter, AroValue, Stream};
use pretty_assertions::assert_eq;

#[test]
fn operator_chain_composes_left_to_right() {
    let result = from_iter(1..=20)
        .filter(|x| x % 2 == 0)
        .map(|x| x * 10)
        .take(3)
        .collect()
        .unwrap();
    assert_eq!(result, vec![20, 40, 60]);
}

#[test]
fn a_failing_stage_propagates_the_same_error_to_every_downstream_operator() {
    use aro::error::StreamError;
    use aro::stream::Failed;

    let failed: Failed<i32> = Failed::new(StreamError::NotAnArray);
    let mut chained = failed.map(|x| x + 1).filter(|_| true);
    let first = chained.next();
    let second = chained.next();
    assert!(first.is_err());
    assert!(second.is_err());
}

#[test]
fn group_by_then_distinct_matches_scenario_six_from_the_spec() {
    let rows = vec![
        ("open".to_string(), 1),
        ("closed".to_string(), 2),
        ("open".to_string(), 3),
        ("open".to_string(), 1),
    ];
    let grouped = group_by(from_iter(rows), |(status, _)| status.clone(), SpillOptions::default())
        .unwrap();
    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped[0].0, "open");
    assert_eq!(grouped[0].1.len(), 3);

    let deduped = distinct_by(
        from_iter(grouped[0].1.clone()),
        |(_, amount)| *amount,
        SpillOptions::default(),
    )
    .unwrap();
    assert_eq!(deduped, vec![("open".to_string(), 1), ("open".to_string(), 3)]);
}

#[test]
fn coercion_never_produces_a_number_for_non_numeric_text() {
    assert_eq!(AroValue::coerce_from_str("not-a-number"), AroValue::String("not-a-number".to_string()));
    assert_eq!(AroValue::coerce_from_str("-12"), AroValue::Int(-12));
    assert_eq!(AroValue::coerce_from_str("-1.5"), AroValue::Float(-1.5));
}
