//! The pure pipeline optimizer (spec component L).
//!
//! Consumes an analyzed feature set and produces an [`OptimizationPlan`].
//! The optimizer never executes anything — it only records advisory
//! hints that the streaming runtime consults when wiring operators
//! together.

use crate::ast::{AroStatement, FeatureSet, NounAnnotation, ObjectSlot, Statement};
use std::collections::BTreeSet;

/// Verbs that denote data-processing actions over a stream, as opposed to
/// plain scalar computation.
const DATA_VERBS: &[&str] = &["filter", "reduce", "split", "groupby", "distinct"];

fn is_filter_statement(aro: &AroStatement) -> bool {
    aro.action.verb.eq_ignore_ascii_case("filter")
}

/// An advisory to reorder a filter earlier, because its inputs don't
/// actually depend on the statement immediately preceding it.
#[derive(Debug, Clone, PartialEq)]
pub struct PushdownHint {
    /// Index into the feature set's statement list of the filter.
    pub statement_index: usize,
    /// Human-readable justification, for diagnostics/tooling.
    pub reason: String,
}

/// A maximal run of consecutive filters over the same source, fusable into
/// one combined predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedFilterGroup {
    /// The shared source noun's base name.
    pub source: String,
    /// Indices of the fused statements, in source order.
    pub statement_indices: Vec<usize>,
}

/// The complete optimization plan for one feature set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OptimizationPlan {
    /// Predicate-pushdown advisories.
    pub pushdown_hints: Vec<PushdownHint>,
    /// The union of every field referenced anywhere in the feature set,
    /// for source readers that support column projection.
    pub projected_fields: BTreeSet<String>,
    /// Adjacent-filter fusion groups.
    pub fused_filter_groups: Vec<FusedFilterGroup>,
}

/// Builds an [`OptimizationPlan`] for `feature_set`.
pub fn optimize(feature_set: &FeatureSet) -> OptimizationPlan {
    let mut plan = OptimizationPlan::default();
    collect_pushdown_hints(feature_set, &mut plan);
    collect_projected_fields(feature_set, &mut plan);
    collect_fused_filter_groups(feature_set, &mut plan);
    plan
}

/// The source noun a data-processing statement reads from, if its object
/// slot is a plain qualified noun (rather than an expression).
fn source_noun(aro: &AroStatement) -> Option<&str> {
    match &aro.object.object {
        ObjectSlot::Noun(noun) => Some(noun.base.as_str()),
        ObjectSlot::Expression(_) => None,
    }
}

/// The set of variable names a statement's own clauses read, used to test
/// whether it depends on the immediately preceding statement's output.
fn statement_inputs(aro: &AroStatement) -> BTreeSet<String> {
    let mut names = Vec::new();
    if let ObjectSlot::Expression(e) = &aro.object.object {
        e.collect_variable_refs(&mut names);
    }
    if let Some(w) = &aro.query.where_clause {
        w.value.collect_variable_refs(&mut names);
    }
    if let crate::ast::ValueSource::Expression(e) | crate::ast::ValueSource::Sink(e) = &aro.value {
        e.collect_variable_refs(&mut names);
    }
    if let Some(to) = &aro.range.to {
        to.collect_variable_refs(&mut names);
    }
    names.into_iter().collect()
}

fn collect_pushdown_hints(feature_set: &FeatureSet, plan: &mut OptimizationPlan) {
    for (i, stmt) in feature_set.statements.iter().enumerate() {
        let Statement::Aro(aro) = stmt else { continue };
        if !is_filter_statement(aro) {
            continue;
        }
        let Some(prev) = i.checked_sub(1).and_then(|p| feature_set.statements.get(p)) else {
            continue;
        };
        let Statement::Aro(prev_aro) = prev else { continue };
        if prev_aro.result.base == crate::ast::EXPRESSION_SENTINEL {
            continue;
        }
        let mut inputs = statement_inputs(aro);
        if let Some(source) = source_noun(aro) {
            inputs.insert(source.to_string());
        }
        if !inputs.contains(&prev_aro.result.base) {
            plan.pushdown_hints.push(PushdownHint {
                statement_index: i,
                reason: format!(
                    "filter at statement {i} does not depend on preceding statement's output '{}'; swap earlier",
                    prev_aro.result.base
                ),
            });
        }
    }
}

fn collect_projected_fields(feature_set: &FeatureSet, plan: &mut OptimizationPlan) {
    for stmt in &feature_set.statements {
        collect_fields_in_statement(stmt, plan);
    }
}

fn collect_fields_in_statement(stmt: &Statement, plan: &mut OptimizationPlan) {
    match stmt {
        Statement::Aro(aro) => {
            if let Some(w) = &aro.query.where_clause {
                plan.projected_fields.insert(w.field.clone());
            }
            collect_fields_in_noun(&aro.result, plan);
            if let ObjectSlot::Noun(noun) = &aro.object.object {
                collect_fields_in_noun(noun, plan);
            }
        }
        Statement::Publish(_) | Statement::Require(_) => {}
        Statement::Match(m) => {
            for case in &m.cases {
                for s in &case.body {
                    collect_fields_in_statement(s, plan);
                }
            }
            if let Some(body) = &m.otherwise {
                for s in body {
                    collect_fields_in_statement(s, plan);
                }
            }
        }
        Statement::ForEach(f) => {
            for s in &f.body {
                collect_fields_in_statement(s, plan);
            }
        }
    }
}

fn collect_fields_in_noun(noun: &crate::ast::QualifiedNoun, plan: &mut OptimizationPlan) {
    if let Some(NounAnnotation::Path(path)) = &noun.annotation {
        plan.projected_fields.insert(path.clone());
    }
}

fn collect_fused_filter_groups(feature_set: &FeatureSet, plan: &mut OptimizationPlan) {
    let mut i = 0;
    let statements = &feature_set.statements;
    while i < statements.len() {
        let Statement::Aro(aro) = &statements[i] else {
            i += 1;
            continue;
        };
        if !is_filter_statement(aro) {
            i += 1;
            continue;
        }
        let Some(source) = source_noun(aro) else {
            i += 1;
            continue;
        };
        let mut run = vec![i];
        let mut j = i + 1;
        while j < statements.len() {
            let Statement::Aro(next) = &statements[j] else { break };
            if !is_filter_statement(next) || source_noun(next) != Some(source) {
                break;
            }
            run.push(j);
            j += 1;
        }
        if run.len() > 1 {
            plan.fused_filter_groups.push(FusedFilterGroup {
                source: source.to_string(),
                statement_indices: run,
            });
        }
        i = j;
    }
}

/// Returns true if `verb` is one of the data-processing action verbs the
/// optimizer and runtime treat as stream operators rather than scalar
/// computation.
pub fn is_data_processing_verb(verb: &str) -> bool {
    DATA_VERBS.contains(&verb.to_ascii_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn first_feature_set(src: &str) -> FeatureSet {
        let (program, errors) = Parser::parse_source(src);
        assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
        program.feature_sets.into_iter().next().expect("one feature set")
    }

    #[test]
    fn pushdown_hint_when_filter_does_not_depend_on_predecessor() {
        let src = r#"
        (F: A) {
            <Extract> the <unrelated> from the <request>.
            <Filter> the <rows> from the <orders> where amount > 10.
        }
        "#;
        let fs = first_feature_set(src);
        let plan = optimize(&fs);
        assert_eq!(plan.pushdown_hints.len(), 1);
        assert_eq!(plan.pushdown_hints[0].statement_index, 1);
    }

    #[test]
    fn no_pushdown_hint_when_filter_depends_on_predecessor() {
        let src = r#"
        (F: A) {
            <Extract> the <orders> from the <request>.
            <Filter> the <rows> from the <orders> where amount > 10.
        }
        "#;
        let fs = first_feature_set(src);
        let plan = optimize(&fs);
        assert!(plan.pushdown_hints.is_empty());
    }

    #[test]
    fn projected_fields_collects_where_clause_field_names() {
        let src = r#"
        (F: A) {
            <Filter> the <rows> from the <orders> where amount > 10.
            <Filter> the <more> from the <rows> where status = "done".
        }
        "#;
        let fs = first_feature_set(src);
        let plan = optimize(&fs);
        assert!(plan.projected_fields.contains("amount"));
        assert!(plan.projected_fields.contains("status"));
    }

    #[test]
    fn adjacent_filters_on_same_source_are_fused() {
        let src = r#"
        (F: A) {
            <Filter> the <a> from the <orders> where amount > 10.
            <Filter> the <b> from the <orders> where status = "done".
            <Extract> the <c> from the <request>.
        }
        "#;
        let fs = first_feature_set(src);
        let plan = optimize(&fs);
        assert_eq!(plan.fused_filter_groups.len(), 1);
        assert_eq!(plan.fused_filter_groups[0].statement_indices, vec![0, 1]);
        assert_eq!(plan.fused_filter_groups[0].source, "orders");
    }

    #[test]
    fn non_adjacent_filters_on_different_sources_do_not_fuse() {
        let src = r#"
        (F: A) {
            <Filter> the <a> from the <orders> where amount > 10.
            <Filter> the <b> from the <customers> where status = "done".
        }
        "#;
        let fs = first_feature_set(src);
        let plan = optimize(&fs);
        assert!(plan.fused_filter_groups.is_empty());
    }
}
