//! The four-pass semantic analyzer (spec component G).
//!
//! Pass 1 walks each feature set's statements in isolation, tracking local
//! bindings, rebinding rules, and `match`/`for each` scoping, while queuing
//! any read that doesn't resolve locally for pass 2. Pass 2 resolves those
//! queued reads against the global [`PublishedRegistry`] built during pass
//! 1, plus the built-in known-external set. Pass 3 looks for circular
//! "Handler" event chains. Pass 4 flags handler feature sets whose event is
//! never emitted.
//!
//! `match` scoping keeps a deliberate quirk: a name bound in only *some*
//! case branches is still visible to statements after the whole `match`
//! (the branches that didn't bind it are simply trusted not to have been
//! taken). Reading such a name downstream queues a warning rather than an
//! undefined-dependency error, since the analyzer can't tell whether the
//! binding branch actually ran.
//!
//! None of these passes abort analysis: every problem becomes a
//! [`Diagnostic`] in the returned [`DiagnosticCollector`], and
//! [`analyze`] always returns a complete [`AnalyzedProgram`].

use crate::ast::*;
use crate::diagnostics::{Diagnostic, DiagnosticCollector};
use crate::error::SemanticError;
use crate::symbols::{PublishedRegistry, SymbolTableBuilder, Ty, KNOWN_EXTERNALS};
use std::collections::{HashMap, HashSet};

/// Verbs that are permitted to rebind an already-bound, non-`_`-prefixed
/// name within the same scope (spec §4.G: "use Accept/Update/Modify/
/// Change/Set to rebind").
const REBIND_VERBS: &[&str] = &["accept", "update", "modify", "change", "set"];

/// System-provided events excluded from orphan-event detection.
const SYSTEM_EVENTS: &[&str] = &["socketevent", "fileevent"];

/// Classifies an action verb into its semantic role (spec §4.G pass 1 role
/// table). Verbs not recognized here default to [`ActionRole::Own`], since
/// most ARO statements describe local computation over already-bound data.
pub fn classify_verb(verb: &str) -> ActionRole {
    let lower = verb.to_ascii_lowercase();
    match lower.as_str() {
        "extract" | "parse" | "retrieve" | "fetch" | "read" | "receive" | "get" | "load" => {
            ActionRole::Request
        }
        "return" | "throw" | "send" | "emit" | "respond" | "output" | "write" | "store"
        | "save" | "persist" | "log" | "print" | "debug" | "notify" | "alert" | "signal"
        | "broadcast" => ActionRole::Response,
        "publish" | "export" | "expose" | "share" => ActionRole::Export,
        "start" | "stop" | "listen" | "await" | "connect" | "close" | "disconnect"
        | "terminate" | "wait" | "keepalive" | "block" | "make" | "touch" | "mkdir"
        | "createdirectory" | "copy" | "move" | "rename" => ActionRole::Server,
        _ => ActionRole::Own,
    }
}

/// Response-role verbs that, per the role table, also read the result
/// (rather than only recording a side effect) because they export data the
/// caller already bound — saving/emitting it rather than producing it.
const EXPORT_DATA_VERBS: &[&str] = &["store", "write", "emit", "save", "persist", "send"];

/// A pending cross-feature-set dependency check, queued during pass 1 and
/// resolved during pass 2.
struct PendingExternalCheck {
    name: String,
    span: Span,
    feature_set: String,
}

/// Tracks per-feature-set bookkeeping threaded through pass 1: the registry
/// being built, queued external checks, declared-but-maybe-unused
/// variables, and the event-emission graph for passes 3-4.
struct AnalysisCtx {
    collector: DiagnosticCollector,
    registry: PublishedRegistry,
    pending_external: Vec<PendingExternalCheck>,
    used: HashSet<String>,
    /// name, span, owning feature set, and whether it's a server-role
    /// side-effect binding exempt from the unused-variable check.
    declared: Vec<(String, Span, String, bool)>,
    /// normalized handler event name -> feature set name that owns it
    handlers: HashMap<String, String>,
    /// normalized handler event name -> normalized emitted event names
    emits: HashMap<String, Vec<String>>,
    /// Names bound in only some `match` branches but still visible
    /// downstream (spec open question: "potentially defined after match"),
    /// mapped to the match's span for the warning's hint.
    maybe_defined: HashMap<String, Span>,
}

/// The result of semantic analysis: every diagnostic produced across all
/// four passes, plus the final published-symbol registry.
pub struct AnalyzedProgram {
    /// All diagnostics gathered across all four passes.
    pub diagnostics: DiagnosticCollector,
    /// The final state of the published-symbol registry.
    pub registry: PublishedRegistry,
}

/// Runs the complete four-pass analysis over `program`.
pub fn analyze(program: &Program) -> AnalyzedProgram {
    let mut ctx = AnalysisCtx {
        collector: DiagnosticCollector::new(),
        registry: PublishedRegistry::new(),
        pending_external: Vec::new(),
        used: HashSet::new(),
        declared: Vec::new(),
        handlers: HashMap::new(),
        emits: HashMap::new(),
        maybe_defined: HashMap::new(),
    };

    check_duplicate_feature_set_names(program, &mut ctx);

    // Pass 1.
    for fs in &program.feature_sets {
        if let Some(event) = handler_event_name(fs) {
            ctx.handlers.insert(event.clone(), fs.name.clone());
            ctx.emits.entry(event).or_default();
        }
        if let Some(guard) = &fs.guard {
            let empty_scope = SymbolTableBuilder::new();
            check_reads(guard, &empty_scope, fs, &mut ctx);
        }
        check_empty_feature_set(fs, &mut ctx);
        check_unreachable_after_terminator(&fs.statements, &mut ctx);
        check_missing_terminator(fs, &mut ctx);
        let mut scope = SymbolTableBuilder::new();
        analyze_statements(&fs.statements, &mut scope, fs, &mut ctx);
    }

    // Pass 2: resolve every queued read against the final registry.
    let pending = std::mem::take(&mut ctx.pending_external);
    for check in pending {
        if !ctx.registry.resolve(&check.name) {
            ctx.collector.push(Diagnostic::error(
                SemanticError::UndefinedExternalDependency {
                    name: check.name,
                    feature_set: check.feature_set,
                }
                .to_string(),
                check.span,
            ));
        }
    }

    // Pass 3: circular event chains among "<Event> Handler" feature sets.
    detect_event_cycles(&mut ctx);

    // Pass 4: orphan event detection.
    detect_orphan_events(&mut ctx);

    // Ancillary: unused internal variables. Server-role bindings (side-
    // effecting resources such as an opened socket or a started listener)
    // are exempt per the spec role table.
    for (name, span, _feature_set, exempt) in &ctx.declared {
        if !exempt && !name.starts_with('_') && !ctx.used.contains(name) {
            ctx.collector
                .push(Diagnostic::warning(format!("unused variable '{name}'"), *span));
        }
    }

    AnalyzedProgram {
        diagnostics: ctx.collector,
        registry: ctx.registry,
    }
}

fn check_duplicate_feature_set_names(program: &Program, ctx: &mut AnalysisCtx) {
    let mut seen: HashMap<&str, Span> = HashMap::new();
    for fs in &program.feature_sets {
        if let Some(first_span) = seen.get(fs.name.as_str()) {
            ctx.collector.push(
                Diagnostic::error(format!("duplicate feature set name '{}'", fs.name), fs.span)
                    .with_hint(format!("first defined at {}", first_span.render())),
            );
        } else {
            seen.insert(&fs.name, fs.span);
        }
    }
}

/// Action verbs that terminate a feature set's control flow (spec ancillary
/// check: "unreachable code after a terminator (`Return`/`Throw`)"). These
/// are ordinary response-role verbs in the role table, not a distinct AST
/// node — a statement is a terminator purely by its verb spelling.
const TERMINATOR_VERBS: &[&str] = &["return", "throw"];

fn is_terminator(stmt: &Statement) -> bool {
    matches!(stmt, Statement::Aro(aro) if TERMINATOR_VERBS.contains(&aro.action.verb.to_ascii_lowercase().as_str()))
}

fn check_empty_feature_set(fs: &FeatureSet, ctx: &mut AnalysisCtx) {
    if fs.statements.is_empty() {
        ctx.collector.push(Diagnostic::warning(
            format!("feature set '{}' has no statements", fs.name),
            fs.span,
        ));
    }
}

/// Flags any statement that follows a `Return`/`Throw` terminator within
/// the same statement list, recursing into `match` case/otherwise bodies
/// and `for each` loop bodies.
fn check_unreachable_after_terminator(statements: &[Statement], ctx: &mut AnalysisCtx) {
    for (i, stmt) in statements.iter().enumerate() {
        if is_terminator(stmt) {
            if let Some(next) = statements.get(i + 1) {
                ctx.collector.push(Diagnostic::warning(
                    "unreachable code after a Return/Throw terminator".to_string(),
                    next.span(),
                ));
            }
            break;
        }
        match stmt {
            Statement::Match(m) => {
                for case in &m.cases {
                    check_unreachable_after_terminator(&case.body, ctx);
                }
                if let Some(otherwise) = &m.otherwise {
                    check_unreachable_after_terminator(otherwise, ctx);
                }
            }
            Statement::ForEach(f) => check_unreachable_after_terminator(&f.body, ctx),
            _ => {}
        }
    }
}

/// Flags a non-empty, non-handler feature set whose last top-level
/// statement isn't a `Return`/`Throw` terminator. "`<Event> Handler`"
/// feature sets are lifecycle/event-driven rather than call-and-return, so
/// they're exempt — they terminate by having handled the event, not by
/// producing a value back to a caller.
fn check_missing_terminator(fs: &FeatureSet, ctx: &mut AnalysisCtx) {
    if fs.statements.is_empty() || handler_event_name(fs).is_some() {
        return;
    }
    if !is_terminator(fs.statements.last().expect("checked non-empty above")) {
        ctx.collector.push(Diagnostic::warning(
            format!("feature set '{}' has no terminating Return/Throw statement", fs.name),
            fs.span,
        ));
    }
}

/// Derives the event name a "`<Event> Handler`"-convention feature set
/// owns, normalized (lowercased, whitespace stripped) for comparison.
fn handler_event_name(fs: &FeatureSet) -> Option<String> {
    fs.activity
        .strip_suffix(" Handler")
        .map(|event| normalize_event_name(event))
}

fn normalize_event_name(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect::<String>()
        .to_ascii_lowercase()
}

fn analyze_statements(
    statements: &[Statement],
    scope: &mut SymbolTableBuilder,
    fs: &FeatureSet,
    ctx: &mut AnalysisCtx,
) {
    for stmt in statements {
        analyze_statement(stmt, scope, fs, ctx);
    }
}

fn analyze_statement(stmt: &Statement, scope: &mut SymbolTableBuilder, fs: &FeatureSet, ctx: &mut AnalysisCtx) {
    match stmt {
        Statement::Aro(aro) => analyze_aro(aro, scope, fs, ctx),
        Statement::Publish(p) => analyze_publish(p, scope, fs, ctx),
        Statement::Require(r) => {
            scope.bind(&r.name, Ty::Unknown, r.span);
            ctx.declared.push((r.name.clone(), r.span, fs.name.clone(), false));
        }
        Statement::Match(m) => analyze_match(m, scope, fs, ctx),
        Statement::ForEach(f) => analyze_for_each(f, scope, fs, ctx),
    }
}

fn analyze_aro(aro: &AroStatement, scope: &mut SymbolTableBuilder, fs: &FeatureSet, ctx: &mut AnalysisCtx) {
    match &aro.object.object {
        ObjectSlot::Noun(noun) => check_name_read(&noun.base, noun.span, scope, fs, ctx),
        ObjectSlot::Expression(e) => check_reads(e, scope, fs, ctx),
    }
    match &aro.value {
        ValueSource::Expression(e) | ValueSource::Sink(e) => check_reads(e, scope, fs, ctx),
        ValueSource::Literal(_) | ValueSource::None => {}
    }
    if let Some(w) = &aro.query.where_clause {
        check_reads(&w.value, scope, fs, ctx);
    }
    if let Some(to) = &aro.range.to {
        check_reads(to, scope, fs, ctx);
    }
    if let Some(WithClause::Expression(e)) = &aro.range.with {
        check_reads(e, scope, fs, ctx);
    }
    if let Some(g) = &aro.guard {
        check_reads(g, scope, fs, ctx);
    }

    let verb_lower = aro.action.verb.to_ascii_lowercase();
    let role = classify_verb(&aro.action.verb);

    if verb_lower == "emit" {
        if let Some(event_name) = emitted_event_name(aro) {
            if let Some(handler_event) = handler_event_name(fs) {
                ctx.emits.entry(handler_event).or_default().push(event_name);
            } else {
                ctx.emits.entry(String::new()).or_default().push(event_name);
            }
        }
    }

    if aro.result.base == EXPRESSION_SENTINEL {
        return;
    }

    let name = &aro.result.base;

    // Response-role verbs don't bind a new output (spec role table: "side-
    // effect record verb:result"); the export-data subset instead reads an
    // already-bound result rather than rebinding it.
    if role == ActionRole::Response {
        if EXPORT_DATA_VERBS.contains(&verb_lower.as_str()) {
            check_name_read(name, aro.span, scope, fs, ctx);
        }
        return;
    }

    if scope.contains_local(name) && !name.starts_with('_') && !REBIND_VERBS.contains(&verb_lower.as_str()) {
        let original = scope.lookup(name).expect("contains_local implies lookup").defined_at;
        ctx.collector.push(Diagnostic::error(
            SemanticError::DuplicateDefinition {
                name: name.clone(),
                original,
                duplicate: aro.span,
            }
            .to_string(),
            aro.span,
        ));
        return;
    }

    let ty = match &aro.result.annotation {
        Some(NounAnnotation::Type(t)) => Ty::from_annotation(t),
        _ => Ty::Unknown,
    };
    scope.bind(name, ty, aro.span);
    ctx.declared
        .push((name.clone(), aro.span, fs.name.clone(), role == ActionRole::Server));
}

/// Best-effort extraction of the event name an `Emit` statement produces:
/// its result qualified-noun base (or, for the abbreviated sink form, the
/// object noun base), normalized for comparison against handler names.
fn emitted_event_name(aro: &AroStatement) -> Option<String> {
    if aro.result.base != EXPRESSION_SENTINEL {
        return Some(normalize_event_name(&aro.result.base));
    }
    if let ObjectSlot::Noun(noun) = &aro.object.object {
        return Some(normalize_event_name(&noun.base));
    }
    None
}

fn analyze_publish(p: &PublishStatement, scope: &mut SymbolTableBuilder, fs: &FeatureSet, ctx: &mut AnalysisCtx) {
    match scope.lookup(&p.internal_name) {
        Some(symbol) => {
            ctx.used.insert(p.internal_name.clone());
            ctx.registry.publish(p.external_name.clone(), fs.name.clone(), symbol.ty.clone());
        }
        None => {
            ctx.collector.push(Diagnostic::error(
                SemanticError::InvalidPublish {
                    name: p.internal_name.clone(),
                    span: p.span,
                }
                .to_string(),
                p.span,
            ));
        }
    }
}

fn analyze_match(m: &MatchStatement, scope: &mut SymbolTableBuilder, fs: &FeatureSet, ctx: &mut AnalysisCtx) {
    check_reads(&m.subject, scope, fs, ctx);

    let parent = scope.freeze();
    let total_branches = m.cases.len() + usize::from(m.otherwise.is_some());
    // name -> (branches that bound it, type, span of its first binding)
    let mut union: HashMap<String, (usize, Ty, Span)> = HashMap::new();

    for case in &m.cases {
        let mut case_scope = parent.child_builder();
        if let Pattern::Variable(name) = &case.pattern {
            case_scope.bind(name, Ty::Unknown, case.span);
            ctx.declared.push((name.clone(), case.span, fs.name.clone(), false));
        }
        if let Some(g) = &case.guard {
            check_reads(g, &case_scope, fs, ctx);
        }
        // Each case forks its own scope so sibling cases never see one
        // another's bindings while the case body is being analyzed.
        analyze_statements(&case.body, &mut case_scope, fs, ctx);
        for (name, sym) in case_scope.own_bindings() {
            let entry = union
                .entry(name.to_string())
                .or_insert_with(|| (0, sym.ty.clone(), sym.defined_at));
            entry.0 += 1;
        }
    }

    if let Some(body) = &m.otherwise {
        let mut otherwise_scope = parent.child_builder();
        analyze_statements(body, &mut otherwise_scope, fs, ctx);
        for (name, sym) in otherwise_scope.own_bindings() {
            let entry = union
                .entry(name.to_string())
                .or_insert_with(|| (0, sym.ty.clone(), sym.defined_at));
            entry.0 += 1;
        }
    }

    // Open question from the source this analyzer is modeled on: a name
    // bound in only some branches is still visible after the match rather
    // than rejected as undefined ("potentially defined after match"). Kept
    // verbatim, but reading such a name downstream now queues a warning
    // instead of passing silently.
    for (name, (branches, ty, span)) in union {
        scope.bind(&name, ty, span);
        if branches < total_branches {
            ctx.maybe_defined.insert(name, m.span);
        }
    }
}

fn analyze_for_each(f: &ForEachLoop, scope: &mut SymbolTableBuilder, fs: &FeatureSet, ctx: &mut AnalysisCtx) {
    check_reads(&f.collection, scope, fs, ctx);

    let mut loop_scope = scope.freeze().child_builder();
    loop_scope.bind(&f.item, Ty::Unknown, f.span);
    ctx.declared.push((f.item.clone(), f.span, fs.name.clone(), false));
    if let Some(index) = &f.index {
        loop_scope.bind(index, Ty::Integer, f.span);
        ctx.declared.push((index.clone(), f.span, fs.name.clone(), false));
    }

    if let Some(w) = &f.where_clause {
        check_reads(w, &loop_scope, fs, ctx);
    }

    analyze_statements(&f.body, &mut loop_scope, fs, ctx);
}

fn check_name_read(name: &str, span: Span, scope: &SymbolTableBuilder, fs: &FeatureSet, ctx: &mut AnalysisCtx) {
    ctx.used.insert(name.to_string());
    if scope.lookup(name).is_some() {
        if let Some(match_span) = ctx.maybe_defined.get(name).copied() {
            ctx.collector.push(
                Diagnostic::warning(
                    format!("'{name}' is bound in only some branches of the match at {}", match_span.render()),
                    span,
                )
                .with_hint("this read sees it only if the branch that bound it matched"),
            );
        }
        return;
    }
    if KNOWN_EXTERNALS.contains(&name) {
        return;
    }
    ctx.pending_external.push(PendingExternalCheck {
        name: name.to_string(),
        span,
        feature_set: fs.name.clone(),
    });
}

fn check_reads(expr: &Expr, scope: &SymbolTableBuilder, fs: &FeatureSet, ctx: &mut AnalysisCtx) {
    let mut names = Vec::new();
    expr.collect_variable_refs(&mut names);
    for name in names {
        check_name_read(&name, expr.span(), scope, fs, ctx);
    }
}

fn detect_event_cycles(ctx: &mut AnalysisCtx) {
    let mut visiting: HashSet<String> = HashSet::new();
    let mut done: HashSet<String> = HashSet::new();
    let events: Vec<String> = ctx.emits.keys().cloned().collect();

    for start in events {
        if done.contains(&start) {
            continue;
        }
        let mut path = Vec::new();
        if let Some(cycle) = dfs_find_cycle(&start, &ctx.emits, &mut visiting, &mut done, &mut path) {
            ctx.collector.push(Diagnostic::error(
                SemanticError::CircularDependency { path: cycle }.to_string(),
                Span::default(),
            ));
        }
    }
}

fn dfs_find_cycle(
    node: &str,
    graph: &HashMap<String, Vec<String>>,
    visiting: &mut HashSet<String>,
    done: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Option<Vec<String>> {
    if done.contains(node) {
        return None;
    }
    if visiting.contains(node) {
        let mut cycle = path.clone();
        cycle.push(node.to_string());
        return Some(cycle);
    }
    visiting.insert(node.to_string());
    path.push(node.to_string());
    if let Some(neighbors) = graph.get(node) {
        for next in neighbors {
            if let Some(cycle) = dfs_find_cycle(next, graph, visiting, done, path) {
                return Some(cycle);
            }
        }
    }
    path.pop();
    visiting.remove(node);
    done.insert(node.to_string());
    None
}

fn detect_orphan_events(ctx: &mut AnalysisCtx) {
    let emitted: HashSet<&String> = ctx.emits.values().flatten().collect();
    for (event, feature_set) in ctx.handlers.clone() {
        if SYSTEM_EVENTS.contains(&event.as_str()) {
            continue;
        }
        if !emitted.contains(&event) {
            ctx.collector.push(Diagnostic::warning(
                format!("feature set '{feature_set}' handles event '{event}' which no statement ever emits"),
                Span::default(),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn analyze_source(src: &str) -> AnalyzedProgram {
        let (program, parse_errors) = Parser::parse_source(src);
        assert!(parse_errors.is_empty(), "unexpected parse errors: {parse_errors:?}");
        analyze(&program)
    }

    #[test]
    fn rebinding_without_an_accepted_verb_is_an_error() {
        let src = r#"
        (F: A) {
            <Extract> the <id> from the <request>.
            <Extract> the <id> from the <request>.
        }
        "#;
        let analyzed = analyze_source(src);
        let diags = analyzed.diagnostics.diagnostics();
        assert!(diags.iter().any(|d| d.message.contains("cannot be rebound")));
    }

    #[test]
    fn update_verb_permits_rebinding() {
        let src = r#"
        (F: A) {
            <Extract> the <id> from the <request>.
            <Update> the <id> from the <request>.
        }
        "#;
        let analyzed = analyze_source(src);
        assert!(analyzed.diagnostics.is_success());
    }

    #[test]
    fn match_branch_bindings_do_not_leak() {
        let src = r#"
        (F: A) {
            <Extract> the <request> from the <request>.
            match <request> {
                case x { <Log> <x> to <console>. }
                otherwise { <Log> <x> to <console>. }
            }
        }
        "#;
        let analyzed = analyze_source(src);
        let diags = analyzed.diagnostics.diagnostics();
        assert!(diags.iter().any(|d| d.message.contains("undefined external dependency 'x'")));
    }

    #[test]
    fn a_name_bound_in_only_one_match_case_is_visible_but_warned_about_downstream() {
        let src = r#"
        (F: A) {
            <Extract> the <request> from the <request>.
            match <request> {
                case x { <Extract> the <id> from the <request>. }
                otherwise { <Log> "no match" to <console>. }
            }
            <Log> <id> to <console>.
        }
        "#;
        let analyzed = analyze_source(src);
        let diags = analyzed.diagnostics.diagnostics();
        assert!(!diags.iter().any(|d| d.message.contains("undefined external dependency 'id'")));
        assert!(diags
            .iter()
            .any(|d| d.message.contains("'id' is bound in only some branches")));
    }

    #[test]
    fn a_name_bound_in_every_branch_is_not_warned_about_downstream() {
        let src = r#"
        (F: A) {
            <Extract> the <request> from the <request>.
            match <request> {
                case x { <Extract> the <id> from the <request>. }
                otherwise { <Extract> the <id> from the <request>. }
            }
            <Log> <id> to <console>.
        }
        "#;
        let analyzed = analyze_source(src);
        let diags = analyzed.diagnostics.diagnostics();
        assert!(!diags.iter().any(|d| d.message.contains("is bound in only some branches")));
    }

    #[test]
    fn an_export_data_verb_reads_an_already_bound_result_instead_of_warning_unused() {
        let src = r#"
        (F: A) {
            <Extract> the <report> from the <request>.
            <Store> the <report> to <file>.
        }
        "#;
        let analyzed = analyze_source(src);
        let diags = analyzed.diagnostics.diagnostics();
        assert!(!diags.iter().any(|d| d.message.contains("unused variable 'report'")));
        assert!(!diags.iter().any(|d| d.message.contains("cannot be rebound")));
    }

    #[test]
    fn a_server_role_binding_is_exempt_from_the_unused_variable_warning() {
        let src = r#"
        (F: A) {
            <Listen> the <socket> from the <request>.
            <Start> the <listener> from the <request>.
        }
        "#;
        let analyzed = analyze_source(src);
        let diags = analyzed.diagnostics.diagnostics();
        assert!(!diags.iter().any(|d| d.message.contains("unused variable")));
    }

    #[test]
    fn a_statement_after_a_return_is_flagged_unreachable() {
        let src = r#"
        (F: A) {
            <Extract> the <x> from the <request>.
            <Return> the <x> to <console>.
            <Log> "after" to <console>.
        }
        "#;
        let analyzed = analyze_source(src);
        let diags = analyzed.diagnostics.diagnostics();
        assert!(diags
            .iter()
            .any(|d| d.message.contains("unreachable code after a Return/Throw terminator")));
    }

    #[test]
    fn a_non_handler_feature_set_without_a_terminator_is_flagged() {
        let src = r#"
        (F: A) {
            <Extract> the <x> from the <request>.
        }
        "#;
        let analyzed = analyze_source(src);
        let diags = analyzed.diagnostics.diagnostics();
        assert!(diags
            .iter()
            .any(|d| d.message.contains("has no terminating Return/Throw statement")));
    }

    #[test]
    fn a_handler_feature_set_is_exempt_from_the_missing_terminator_check() {
        let src = r#"
        (AHandler: A Handler) {
            <Log> "handled" to <console>.
        }
        "#;
        let analyzed = analyze_source(src);
        let diags = analyzed.diagnostics.diagnostics();
        assert!(!diags
            .iter()
            .any(|d| d.message.contains("has no terminating Return/Throw statement")));
    }

    #[test]
    fn an_empty_feature_set_is_flagged() {
        let src = r#"
        (F: A) {
        }
        "#;
        let analyzed = analyze_source(src);
        let diags = analyzed.diagnostics.diagnostics();
        assert!(diags.iter().any(|d| d.message.contains("has no statements")));
    }

    #[test]
    fn publish_of_undefined_internal_is_an_error() {
        let src = r#"
        (F: A) {
            Publish as <Out> <never_bound>.
        }
        "#;
        let analyzed = analyze_source(src);
        let diags = analyzed.diagnostics.diagnostics();
        assert!(diags.iter().any(|d| d.message.contains("cannot publish undefined variable")));
    }

    #[test]
    fn orphan_handler_warning_appears_and_disappears() {
        let without_emit = r#"
        (OrderPlacedHandler: Order Placed Handler) {
            <Log> "handled" to <console>.
        }
        "#;
        let analyzed = analyze_source(without_emit);
        let diags = analyzed.diagnostics.diagnostics();
        assert!(diags.iter().any(|d| d.message.contains("no statement ever emits")));

        let with_emit = r#"
        (OrderPlacedHandler: Order Placed Handler) {
            <Log> "handled" to <console>.
        }
        (Emitter: Emits Things) {
            <Emit> the <OrderPlaced> to <console>.
        }
        "#;
        let analyzed = analyze_source(with_emit);
        let diags = analyzed.diagnostics.diagnostics();
        assert!(!diags.iter().any(|d| d.message.contains("no statement ever emits")));
    }
}
