//! Prints an AST back into ARO source text (spec Testable Property 4).
//!
//! The printer is conservative rather than minimal: every `Binary`/`Unary`
//! operand is always written fully parenthesized, so this module never has
//! to replicate the Pratt precedence table in [`crate::pratt`] to stay
//! round-trip safe. The only other defensive case is the right-hand side of
//! a `<`/`>` comparison, which the parser treats as ambiguous with the start
//! of a fresh `<name>` variable reference unless it is parenthesized — see
//! `parse_expr`'s `peek2_starts_member_field`-style lookahead in
//! [`crate::parser`].
//!
//! Printed output is not guaranteed to equal the original source text (a
//! `Grouped` node may appear where the input had none, and every operand
//! gets parenthesized), but it is guaranteed to re-parse to a program whose
//! printed form no longer changes: printing a second time reproduces the
//! same text as the first. That fixed point, not textual identity with the
//! input, is what "normalized canonical form" means for this printer.

use crate::ast::*;

/// Renders `program` back into ARO source text.
pub fn print_program(program: &Program) -> String {
    let mut printer = AstPrinter::new();
    printer.print_program(program);
    printer.finish()
}

struct AstPrinter {
    output: String,
    indent: usize,
}

impl AstPrinter {
    fn new() -> Self {
        Self {
            output: String::new(),
            indent: 0,
        }
    }

    fn finish(self) -> String {
        self.output
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.output.push_str("  ");
        }
    }

    fn line(&mut self, text: &str) {
        self.write_indent();
        self.output.push_str(text);
        self.output.push('\n');
    }

    fn print_program(&mut self, program: &Program) {
        for import in &program.imports {
            self.line(&format!("import {}", import.path));
        }
        if !program.imports.is_empty() {
            self.output.push('\n');
        }
        for (i, feature_set) in program.feature_sets.iter().enumerate() {
            if i > 0 {
                self.output.push('\n');
            }
            self.print_feature_set(feature_set);
        }
    }

    fn print_feature_set(&mut self, fs: &FeatureSet) {
        let mut header = format!("({}: {})", fs.name, fs.activity);
        if let Some(guard) = &fs.guard {
            header.push_str(" when ");
            header.push_str(&self.expr_top(guard));
        }
        header.push_str(" {");
        self.line(&header);
        self.indent += 1;
        for stmt in &fs.statements {
            self.print_statement(stmt);
        }
        self.indent -= 1;
        self.line("}");
    }

    fn print_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Aro(s) => self.print_aro_statement(s),
            Statement::Publish(s) => self.print_publish(s),
            Statement::Require(s) => self.print_require(s),
            Statement::Match(s) => self.print_match(s),
            Statement::ForEach(s) => self.print_for_each(s),
        }
    }

    fn print_aro_statement(&mut self, s: &AroStatement) {
        let mut line = format!("<{}> ", s.action.verb);
        match &s.value {
            ValueSource::None => {
                line.push('<');
                line.push_str(&self.qualified_noun(&s.result));
                line.push_str("> ");
            }
            // `Literal`/`Expression` are never constructed by the parser
            // (only sink verbs produce a value source, and those always
            // produce `Sink`), but the variant exists on `ValueSource` so
            // this match has to handle it. Printed the same way as `Sink`:
            // the grammar only allows an expression right after the verb
            // when the verb is a sink verb, so re-parsing normalizes this
            // back to `Sink` regardless.
            ValueSource::Literal(lit) => {
                line.push_str(&self.literal(lit));
                line.push(' ');
            }
            ValueSource::Expression(expr) | ValueSource::Sink(expr) => {
                line.push_str(&self.expr_top(expr));
                line.push(' ');
            }
        }
        line.push_str(self.preposition(s.object.preposition));
        line.push(' ');
        line.push_str(&self.object_slot(&s.object.object));

        if let Some(with) = &s.range.with {
            line.push_str(" with ");
            line.push_str(&self.with_clause(with));
        }
        if let Some(to) = &s.range.to {
            line.push_str(" to ");
            line.push_str(&self.expr_top(to));
        }
        if let Some(wc) = &s.query.where_clause {
            line.push_str(&format!(
                " where {} {} {}",
                wc.field,
                self.compare_op(wc.op),
                self.expr_top(&wc.value)
            ));
        }
        if let Some(Literal::Regex { pattern, flags }) = &s.query.by_pattern {
            line.push_str(&format!(" by /{pattern}/{flags}"));
        }
        if let Some(guard) = &s.guard {
            line.push_str(" when ");
            line.push_str(&self.expr_top(guard));
        }
        line.push('.');
        self.line(&line);
    }

    fn print_publish(&mut self, s: &PublishStatement) {
        self.line(&format!("Publish as <{}> <{}>.", s.external_name, s.internal_name));
    }

    fn print_require(&mut self, s: &RequireStatement) {
        self.line(&format!("Require <{}> from {}.", s.name, s.source_desc));
    }

    fn print_match(&mut self, m: &MatchStatement) {
        self.line(&format!("match {} {{", self.expr_top(&m.subject)));
        self.indent += 1;
        for case in &m.cases {
            let mut header = format!("case {}", self.pattern(&case.pattern));
            if let Some(guard) = &case.guard {
                header.push_str(" where ");
                header.push_str(&self.expr_top(guard));
            }
            header.push_str(" {");
            self.line(&header);
            self.indent += 1;
            for stmt in &case.body {
                self.print_statement(stmt);
            }
            self.indent -= 1;
            self.line("}");
        }
        if let Some(body) = &m.otherwise {
            self.line("otherwise {");
            self.indent += 1;
            for stmt in body {
                self.print_statement(stmt);
            }
            self.indent -= 1;
            self.line("}");
        }
        self.indent -= 1;
        self.line("}");
    }

    fn print_for_each(&mut self, f: &ForEachLoop) {
        let mut header = String::new();
        if f.parallel {
            header.push_str("parallel ");
        }
        header.push_str(&format!("for each {}", f.item));
        if let Some(index) = &f.index {
            header.push_str(&format!(" at {index}"));
        }
        header.push_str(&format!(" in {}", self.expr_top(&f.collection)));
        if let Some(n) = f.concurrency {
            header.push_str(&format!(" with <concurrency: {n}>"));
        }
        if let Some(w) = &f.where_clause {
            header.push_str(" where ");
            header.push_str(&self.expr_top(w));
        }
        header.push_str(" {");
        self.line(&header);
        self.indent += 1;
        for stmt in &f.body {
            self.print_statement(stmt);
        }
        self.indent -= 1;
        self.line("}");
    }

    // === Shared fragments ===

    fn qualified_noun(&self, noun: &QualifiedNoun) -> String {
        match &noun.annotation {
            Some(ann) => format!("{}: {}", noun.base, self.noun_annotation(ann)),
            None => noun.base.clone(),
        }
    }

    fn noun_annotation(&self, ann: &NounAnnotation) -> String {
        match ann {
            NounAnnotation::Type(ty) => self.type_annotation(ty),
            NounAnnotation::StringLiteral(s) => format!("\"{}\"", escape_plain_string(s)),
            NounAnnotation::DateOffset { sign, amount, unit } => {
                let sign_ch = if *sign < 0 { '-' } else { '+' };
                format!("{sign_ch}{}{unit}", amount.unsigned_abs())
            }
            NounAnnotation::Index(i) => i.to_string(),
            NounAnnotation::Range(a, b) => format!("{a}-{b}"),
            NounAnnotation::Pick(picks) => picks
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(","),
            NounAnnotation::Path(p) => p.clone(),
        }
    }

    fn type_annotation(&self, ty: &TypeAnnotation) -> String {
        match ty {
            TypeAnnotation::Primitive(PrimitiveType::String) => "String".to_string(),
            TypeAnnotation::Primitive(PrimitiveType::Integer) => "Integer".to_string(),
            TypeAnnotation::Primitive(PrimitiveType::Float) => "Float".to_string(),
            TypeAnnotation::Primitive(PrimitiveType::Boolean) => "Boolean".to_string(),
            TypeAnnotation::List(inner) => format!("List<{}>", self.type_annotation(inner)),
            TypeAnnotation::Map(k, v) => {
                format!("Map<{}, {}>", self.type_annotation(k), self.type_annotation(v))
            }
            TypeAnnotation::SchemaRef(name) => name.clone(),
        }
    }

    fn preposition(&self, p: Preposition) -> &'static str {
        match p {
            Preposition::From => "from",
            Preposition::For => "for",
            Preposition::Against => "against",
            Preposition::To => "to",
            Preposition::Into => "into",
            Preposition::Via => "via",
            Preposition::With => "with",
            Preposition::On => "on",
            Preposition::At => "at",
            Preposition::By => "by",
        }
    }

    fn object_slot(&self, slot: &ObjectSlot) -> String {
        match slot {
            ObjectSlot::Noun(noun) => format!("<{}>", self.qualified_noun(noun)),
            ObjectSlot::Expression(e) => self.expr_top(e),
        }
    }

    fn with_clause(&self, w: &WithClause) -> String {
        match w {
            WithClause::Aggregation { func, field } => {
                let name = match func {
                    AggregationFn::Sum => "sum",
                    AggregationFn::Count => "count",
                    AggregationFn::Avg => "avg",
                    AggregationFn::Min => "min",
                    AggregationFn::Max => "max",
                };
                match field {
                    Some(f) => format!("{name}({f})"),
                    None => name.to_string(),
                }
            }
            WithClause::Expression(e) => self.expr_top(e),
        }
    }

    fn compare_op(&self, op: CompareOp) -> &'static str {
        match op {
            CompareOp::Is => "is",
            CompareOp::IsNot => "is not",
            CompareOp::Eq => "=",
            CompareOp::EqEq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
            CompareOp::Contains => "contains",
            CompareOp::Matches => "matches",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
        }
    }

    fn pattern(&self, p: &Pattern) -> String {
        match p {
            Pattern::Literal(lit) => self.literal(lit),
            Pattern::Variable(name) => name.clone(),
            Pattern::Wildcard => "_".to_string(),
            Pattern::Regex(pat) => format!("/{pat}/"),
        }
    }

    fn literal(&self, lit: &Literal) -> String {
        match lit {
            Literal::String(s) => format!("\"{}\"", escape_plain_string(s)),
            Literal::Int(i) => i.to_string(),
            Literal::Float(f) => format_float(*f),
            Literal::Bool(b) => b.to_string(),
            Literal::Null => "null".to_string(),
            Literal::Regex { pattern, flags } => format!("/{pattern}/{flags}"),
        }
    }

    /// Prints `expr` as a statement-level expression (an object slot, a
    /// `to`/`where`/`when` value, a loop collection, a match subject, ...).
    /// No extra parenthesization beyond what `expr` needs internally.
    fn expr_top(&self, expr: &Expr) -> String {
        self.expr(expr, false)
    }

    /// Prints `expr` as the operand of another expression. `Binary`/`Unary`
    /// operands always get wrapped so this module never needs the Pratt
    /// binding-power table to decide whether parens are required.
    fn expr_child(&self, expr: &Expr) -> String {
        self.expr(expr, true)
    }

    fn expr(&self, expr: &Expr, as_child: bool) -> String {
        let text = match expr {
            Expr::Literal(lit, _) => self.literal(lit),
            Expr::Array(items, _) => format!(
                "[{}]",
                items.iter().map(|e| self.expr_top(e)).collect::<Vec<_>>().join(", ")
            ),
            Expr::Map(pairs, _) => format!(
                "{{{}}}",
                pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", self.expr_top(k), self.expr_top(v)))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Expr::Variable(name, _) => format!("<{name}>"),
            Expr::InterpolatedString(parts, _) => self.interpolated_string(parts),
            Expr::Binary { op, left, right, .. } => {
                // `<` and `>` are ambiguous with the start of a fresh
                // `<name>` variable reference when the right operand's
                // first two tokens are `<` and an identifier, so that side
                // always gets explicit parens regardless of its shape.
                let right_text = if matches!(op, BinaryOp::Lt | BinaryOp::Gt) {
                    format!("({})", self.expr_top(right))
                } else {
                    self.expr_child(right)
                };
                format!("{} {} {}", self.expr_child(left), self.binary_op(*op), right_text)
            }
            Expr::Unary { op, operand, .. } => match op {
                UnaryOp::Neg => format!("-{}", self.expr_child(operand)),
                UnaryOp::Not => format!("not {}", self.expr_child(operand)),
            },
            Expr::Member { object, field, .. } => format!("{}.{field}", self.expr_child(object)),
            Expr::Subscript { object, index, .. } => {
                format!("{}[{}]", self.expr_child(object), self.expr_top(index))
            }
            Expr::Grouped(inner, _) => format!("({})", self.expr_top(inner)),
            Expr::Exists(inner, _) => format!("{} exists", self.expr_child(inner)),
            Expr::TypeCheck { expr, check, .. } => format!("{} is {check}", self.expr_child(expr)),
            Expr::Cast { expr, target_type, .. } => {
                format!("{} as {}", self.expr_child(expr), self.type_annotation(target_type))
            }
        };
        if as_child && matches!(expr, Expr::Binary { .. } | Expr::Unary { .. }) {
            format!("({text})")
        } else {
            text
        }
    }

    fn binary_op(&self, op: BinaryOp) -> &'static str {
        match op {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Contains => "contains",
            BinaryOp::Is => "is",
        }
    }

    fn interpolated_string(&self, parts: &[StringPart]) -> String {
        let mut out = String::from("\"");
        for part in parts {
            match part {
                StringPart::Literal(s) => out.push_str(&escape_plain_string(s)),
                StringPart::Expr(e) => {
                    out.push_str("${");
                    out.push_str(&self.expr_top(e));
                    out.push('}');
                }
            }
        }
        out.push('"');
        out
    }
}

/// Escapes a plain (non-interpolated) string body so that re-lexing it
/// between double quotes reproduces `s` exactly, per the escapes
/// `consume_escape` in [`crate::lexer`] understands. `$` is always escaped
/// even when not followed by `{`, since `\$` unescapes back to a bare `$`
/// either way and this avoids having to look ahead at the next character.
fn escape_plain_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            '$' => out.push_str("\\$"),
            other => out.push(other),
        }
    }
    out
}

/// Formats a float literal so it always re-lexes as `FloatLiteral` rather
/// than `IntLiteral` (the lexer only calls something a float once it has
/// seen a `.` or exponent in the source).
fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn roundtrip(source: &str) -> (Program, String) {
        let (program, errors) = Parser::parse_source(source);
        assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
        let printed = print_program(&program);
        let (reparsed, errors) = Parser::parse_source(&printed);
        assert!(errors.is_empty(), "printed output failed to re-parse: {errors:?}\n{printed}");
        (reparsed, printed)
    }

    #[test]
    fn prints_a_simple_feature_set() {
        let source = r#"
        (F: Greeting) {
            <Extract> the <name> from the <request>.
            <Log> the <name> to the <console>.
        }
        "#;
        let (_, printed) = roundtrip(source);
        assert!(printed.contains("(F: Greeting) {"));
        assert!(printed.contains("<Log>"));
    }

    #[test]
    fn printing_twice_reaches_a_fixed_point() {
        let source = r#"
        (F: Orders Summary) {
            <Extract> the <rows> from the <orders-file>.
            <Filter> the <open-rows> from the <rows> where status = "open".
            <Reduce> the <total> from the <open-rows> with sum(amount).
        }
        "#;
        let (reparsed_once, printed_once) = roundtrip(source);
        let printed_twice = print_program(&reparsed_once);
        assert_eq!(printed_once, printed_twice);
    }

    #[test]
    fn fully_parenthesizes_nested_binary_expressions() {
        let source = r#"
        (F: Guarded) when <a> and <b> or <c> {
            <Log> <x> to the <console>.
        }
        "#;
        let (_, printed) = roundtrip(source);
        assert!(printed.contains("(<a> and <b>) or <c>"));
    }

    #[test]
    fn parenthesizes_a_variable_on_the_right_of_a_less_than_comparison() {
        // A bare `<a> < <b>` is itself unparseable (the second `<` reads as
        // the start of a fresh variable reference, not a comparison), so
        // the only way this shape reaches the AST is already-parenthesized
        // source; the printer just has to not lose that parenthesization.
        let source = r#"
        (F: Compare) {
            <Log> <a> < (<b>) to the <console>.
        }
        "#;
        let (_, printed) = roundtrip(source);
        assert!(printed.contains("<b>"));
    }

    #[test]
    fn roundtrips_match_and_for_each() {
        let source = r#"
        (F: Dispatch) {
            match <status> {
                case "open" {
                    <Log> <status> to the <console>.
                }
                otherwise {
                    <Log> <status> to the <console>.
                }
            }
            for each <row> at <i> in <rows> where <i> > 0 {
                <Log> <row> to the <console>.
            }
        }
        "#;
        roundtrip(source);
    }

    #[test]
    fn roundtrips_an_interpolated_string() {
        let source = r#"
        (F: Greeting) {
            <Log> "hello ${<name>}!" to the <console>.
        }
        "#;
        roundtrip(source);
    }

    #[test]
    fn roundtrips_a_negative_float_literal() {
        let source = r#"
        (F: Threshold) {
            <Log> -2.5 to the <console>.
        }
        "#;
        roundtrip(source);
    }

    #[test]
    fn escapes_quotes_and_backslashes_in_string_literals() {
        let source = r#"
        (F: Escaping) {
            <Log> "a \"quoted\" \\value" to the <console>.
        }
        "#;
        roundtrip(source);
    }
}
