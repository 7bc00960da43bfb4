//! Symbol tables, the published-symbol registry, and the coarse type
//! lattice (spec component F).
//!
//! Symbol tables are immutable once built: a [`SymbolTableBuilder`] records
//! bindings while a feature set is being analyzed, then [`SymbolTableBuilder::build`]
//! freezes it into a [`SymbolTable`] that downstream passes only ever read.

use crate::ast::{Span, TypeAnnotation};
use std::collections::HashMap;

#[cfg(feature = "serde-types")]
use serde::{Deserialize, Serialize};

/// The coarse type lattice used by the semantic analyzer's type checking.
///
/// `Unknown` is universally assignable in both directions (it unifies with
/// anything); `Integer` widens to `Float` but not vice versa. Everything
/// else requires an exact match.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum Ty {
    /// No type information is available (e.g. an expression's inferred
    /// type, or an unresolved schema).
    Unknown,
    /// `String`.
    String,
    /// `Integer`.
    Integer,
    /// `Float`.
    Float,
    /// `Boolean`.
    Boolean,
    /// `List<T>`.
    List(Box<Ty>),
    /// `Map<K, V>`.
    Map(Box<Ty>, Box<Ty>),
    /// A named schema reference, resolved elsewhere.
    Schema(String),
}

impl Ty {
    /// Builds a [`Ty`] from a parsed [`TypeAnnotation`].
    pub fn from_annotation(ann: &TypeAnnotation) -> Ty {
        match ann {
            TypeAnnotation::Primitive(p) => match p {
                crate::ast::PrimitiveType::String => Ty::String,
                crate::ast::PrimitiveType::Integer => Ty::Integer,
                crate::ast::PrimitiveType::Float => Ty::Float,
                crate::ast::PrimitiveType::Boolean => Ty::Boolean,
            },
            TypeAnnotation::List(inner) => Ty::List(Box::new(Ty::from_annotation(inner))),
            TypeAnnotation::Map(k, v) => Ty::Map(
                Box::new(Ty::from_annotation(k)),
                Box::new(Ty::from_annotation(v)),
            ),
            TypeAnnotation::SchemaRef(name) => Ty::Schema(name.clone()),
        }
    }

    /// Returns true if a value of type `self` can be assigned where a value
    /// of type `expected` is required.
    ///
    /// `Unknown` unifies with anything in either direction; `Integer`
    /// widens to `Float`; all other pairs require structural equality.
    pub fn assignable_to(&self, expected: &Ty) -> bool {
        match (self, expected) {
            (Ty::Unknown, _) | (_, Ty::Unknown) => true,
            (Ty::Integer, Ty::Float) => true,
            (Ty::List(a), Ty::List(b)) => a.assignable_to(b),
            (Ty::Map(ak, av), Ty::Map(bk, bv)) => ak.assignable_to(bk) && av.assignable_to(bv),
            (a, b) => a == b,
        }
    }

    /// Renders the type's canonical textual name, used in diagnostics.
    pub fn render(&self) -> String {
        match self {
            Ty::Unknown => "Unknown".to_string(),
            Ty::String => "String".to_string(),
            Ty::Integer => "Integer".to_string(),
            Ty::Float => "Float".to_string(),
            Ty::Boolean => "Boolean".to_string(),
            Ty::List(inner) => format!("List<{}>", inner.render()),
            Ty::Map(k, v) => format!("Map<{}, {}>", k.render(), v.render()),
            Ty::Schema(name) => name.clone(),
        }
    }
}

/// A single symbol binding: a name, its inferred/declared type, and where it
/// was first defined.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub struct Symbol {
    /// The bound name.
    pub name: String,
    /// Its type in the coarse lattice.
    pub ty: Ty,
    /// Where it was first bound.
    pub defined_at: Span,
}

/// An immutable snapshot of the bindings visible at some point in a feature
/// set, with parent-chain lookup into enclosing scopes (e.g. a `match` case
/// body can see bindings from before the `match`, but not vice versa).
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolTable {
    bindings: HashMap<String, Symbol>,
    parent: Option<Box<SymbolTable>>,
}

impl SymbolTable {
    /// Looks up `name`, searching this scope then each enclosing scope.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.bindings
            .get(name)
            .or_else(|| self.parent.as_deref().and_then(|p| p.lookup(name)))
    }

    /// Returns true if `name` is bound in this scope or an enclosing one.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Returns true if `name` is bound directly in this scope (not an
    /// ancestor) — used to detect illegal rebinding within one block.
    pub fn contains_local(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Creates a child builder that starts from this table's bindings.
    pub fn child_builder(&self) -> SymbolTableBuilder {
        SymbolTableBuilder {
            bindings: HashMap::new(),
            parent: Some(Box::new(self.clone())),
        }
    }
}

/// Builds a [`SymbolTable`] incrementally while a pass walks a feature
/// set's statements, then freezes it.
#[derive(Debug, Default)]
pub struct SymbolTableBuilder {
    bindings: HashMap<String, Symbol>,
    parent: Option<Box<SymbolTable>>,
}

impl SymbolTableBuilder {
    /// Creates an empty, scopeless builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name`, overwriting any existing local binding (callers are
    /// expected to have already checked [`SymbolTable::contains_local`] for
    /// rebinding rules before calling this unconditionally).
    pub fn bind(&mut self, name: impl Into<String>, ty: Ty, defined_at: Span) {
        let name = name.into();
        self.bindings.insert(
            name.clone(),
            Symbol {
                name,
                ty,
                defined_at,
            },
        );
    }

    /// Looks up a binding already made in this (unfrozen) builder or an
    /// ancestor scope.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.bindings
            .get(name)
            .or_else(|| self.parent.as_deref().and_then(|p| p.lookup(name)))
    }

    /// Returns true if `name` is already bound in this builder's own scope.
    pub fn contains_local(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Iterates this builder's own bindings, not including any ancestor
    /// scope — exactly the names bound while this (forked) builder was
    /// alive, e.g. everything a single `match` case bound.
    pub fn own_bindings(&self) -> impl Iterator<Item = (&str, &Symbol)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Freezes the builder into an immutable [`SymbolTable`].
    pub fn build(self) -> SymbolTable {
        SymbolTable {
            bindings: self.bindings,
            parent: self.parent,
        }
    }

    /// Snapshots the builder's current bindings into a [`SymbolTable`]
    /// without consuming it, so a nested scope (a `match` case, a loop
    /// body) can fork off a child while the parent keeps accumulating
    /// later sibling bindings.
    pub fn freeze(&self) -> SymbolTable {
        SymbolTable {
            bindings: self.bindings.clone(),
            parent: self.parent.clone(),
        }
    }
}

/// The global registry of symbols published via `Publish as <external>
/// <internal>.`, consulted by pass 2 to verify cross-feature-set
/// dependencies (spec §4.G pass 2).
#[derive(Debug, Default, Clone)]
pub struct PublishedRegistry {
    /// External name -> (owning feature set, type).
    entries: HashMap<String, PublishedEntry>,
}

/// One entry in the [`PublishedRegistry`].
#[derive(Debug, Clone)]
pub struct PublishedEntry {
    /// The feature set that published this name.
    pub feature_set: String,
    /// The published value's type, if known.
    pub ty: Ty,
}

/// Names the analyzer treats as resolvable without a matching `Publish`,
/// because they are provided by the runtime rather than user code (spec
/// §4.G pass 2: "the built-in known-external set").
pub const KNOWN_EXTERNALS: &[&str] = &["framework", "environment", "request", "socket", "console"];

impl PublishedRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a published symbol. A later `Publish` of the same external
    /// name overwrites the earlier one; duplicate-publish detection is a
    /// separate ancillary check, not enforced here.
    pub fn publish(&mut self, external_name: impl Into<String>, feature_set: impl Into<String>, ty: Ty) {
        self.entries.insert(
            external_name.into(),
            PublishedEntry {
                feature_set: feature_set.into(),
                ty,
            },
        );
    }

    /// Resolves `name` against published symbols, then the known-external
    /// set.
    pub fn resolve(&self, name: &str) -> bool {
        self.entries.contains_key(name) || KNOWN_EXTERNALS.contains(&name)
    }

    /// Returns the entry for a published external name, if any.
    pub fn get(&self, name: &str) -> Option<&PublishedEntry> {
        self.entries.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_widens_to_float_but_not_reverse() {
        assert!(Ty::Integer.assignable_to(&Ty::Float));
        assert!(!Ty::Float.assignable_to(&Ty::Integer));
    }

    #[test]
    fn unknown_unifies_with_anything() {
        assert!(Ty::Unknown.assignable_to(&Ty::String));
        assert!(Ty::Boolean.assignable_to(&Ty::Unknown));
    }

    #[test]
    fn child_scope_sees_parent_bindings() {
        let mut root = SymbolTableBuilder::new();
        root.bind("x", Ty::Integer, Span::default());
        let root = root.build();

        let mut child = root.child_builder();
        child.bind("y", Ty::String, Span::default());
        assert!(child.lookup("x").is_some());
        assert!(!child.contains_local("x"));
        assert!(child.contains_local("y"));
    }

    #[test]
    fn published_registry_resolves_known_externals() {
        let registry = PublishedRegistry::new();
        assert!(registry.resolve("framework"));
        assert!(!registry.resolve("some_custom_name"));
    }
}
