//! Built-in predicates usable in rule antecedents and annotations.
//!
//! `equalTo` and `forAllIn` filter the bindings produced by a rule's triple
//! patterns. `concatenation` builds explanation strings and is evaluated
//! separately by the engine, after fact consequents, so a formatting failure
//! never blocks fact derivation.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::matcher::{satisfiable, solve, Bindings, PatternTerm, QuadPattern};
use crate::store::FactStore;
use crate::term::{Literal, Term};

/// Errors raised when a built-in cannot be evaluated.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum BuiltinError {
    #[error("{builtin}: variable ?{var} is unbound")]
    Unbound { builtin: &'static str, var: String },

    #[error("forAllIn: set pattern list is empty")]
    EmptySet,

    #[error("concatenation: result ?{0} is already bound")]
    ResultBound(String),
}

/// A built-in test in a rule antecedent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Builtin {
    /// Succeeds iff both sides denote the identical term.
    EqualTo(PatternTerm, PatternTerm),

    /// Succeeds iff every solution of `set` also satisfies `test`.
    ///
    /// Vacuously true when `set` has no solutions.
    ForAllIn {
        set: Vec<QuadPattern>,
        test: Vec<QuadPattern>,
    },
}

impl Builtin {
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::EqualTo(..) => "equalTo",
            Builtin::ForAllIn { .. } => "forAllIn",
        }
    }

    /// Variables that must be bound by the enclosing rule before the test runs.
    ///
    /// For `forAllIn`, variables introduced by the set patterns are local to
    /// the quantifier and are not included.
    pub fn required_variables(&self) -> BTreeSet<&str> {
        match self {
            Builtin::EqualTo(a, b) => [a, b].into_iter().filter_map(|t| t.var_name()).collect(),
            Builtin::ForAllIn { .. } => BTreeSet::new(),
        }
    }

    /// Variables the quantifier introduces for its own scope.
    pub fn local_variables(&self) -> BTreeSet<&str> {
        match self {
            Builtin::EqualTo(..) => BTreeSet::new(),
            Builtin::ForAllIn { set, .. } => set.iter().flat_map(|p| p.variables()).collect(),
        }
    }

    /// Variables the test half of `forAllIn` mentions.
    pub fn test_variables(&self) -> BTreeSet<&str> {
        match self {
            Builtin::EqualTo(..) => BTreeSet::new(),
            Builtin::ForAllIn { test, .. } => test.iter().flat_map(|p| p.variables()).collect(),
        }
    }

    /// Evaluate the built-in under `bindings`.
    pub fn holds(&self, store: &FactStore, bindings: &Bindings) -> Result<bool, BuiltinError> {
        match self {
            Builtin::EqualTo(a, b) => equal_to(a, b, bindings),
            Builtin::ForAllIn { set, test } => for_all_in(store, set, test, bindings),
        }
    }
}

/// `equalTo(a, b)`: term identity after substitution. No coercion.
pub fn equal_to(
    a: &PatternTerm,
    b: &PatternTerm,
    bindings: &Bindings,
) -> Result<bool, BuiltinError> {
    let left = bound("equalTo", a, bindings)?;
    let right = bound("equalTo", b, bindings)?;
    Ok(left == right)
}

/// `forAllIn(set, test)`: universal quantification over the solutions of `set`.
pub fn for_all_in(
    store: &FactStore,
    set: &[QuadPattern],
    test: &[QuadPattern],
    bindings: &Bindings,
) -> Result<bool, BuiltinError> {
    if set.is_empty() {
        return Err(BuiltinError::EmptySet);
    }
    Ok(solve(store, set, bindings)
        .iter()
        .all(|member| satisfiable(store, test, member)))
}

/// `concatenation(parts…, result)`: joins the lexical forms of `parts` and
/// returns `bindings` extended with `result` bound to the string literal.
pub fn concatenation(
    parts: &[PatternTerm],
    result: &str,
    bindings: &Bindings,
) -> Result<Bindings, BuiltinError> {
    let mut text = String::new();
    for part in parts {
        text.push_str(&bound("concatenation", part, bindings)?.lexical());
    }
    bindings
        .with(result, &Term::Literal(Literal::string(text)))
        .ok_or_else(|| BuiltinError::ResultBound(result.to_string()))
}

fn bound(
    builtin: &'static str,
    term: &PatternTerm,
    bindings: &Bindings,
) -> Result<Term, BuiltinError> {
    bindings.resolve(term).ok_or_else(|| BuiltinError::Unbound {
        builtin,
        var: term.var_name().unwrap_or_default().to_string(),
    })
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Quad;

    fn seed(pairs: &[(&str, Term)]) -> Bindings {
        pairs
            .iter()
            .fold(Bindings::new(), |b, (k, v)| b.with(k, v).unwrap())
    }

    #[test]
    fn equal_to_is_term_identity() {
        let b = seed(&[("a", Term::string("true")), ("b", Term::boolean(true))]);
        let a = PatternTerm::var("a");
        assert_eq!(equal_to(&a, &PatternTerm::var("b"), &b), Ok(false));
        assert_eq!(equal_to(&a, &PatternTerm::Const(Term::string("true")), &b), Ok(true));
    }

    #[test]
    fn equal_to_unbound_is_error() {
        let err = equal_to(&PatternTerm::var("x"), &PatternTerm::var("x"), &Bindings::new());
        assert!(matches!(err, Err(BuiltinError::Unbound { var, .. }) if var == "x"));
    }

    #[test]
    fn concatenation_renders_lexical_forms() {
        let b = seed(&[("c", Term::iri("urn:crit:1")), ("n", Term::string("Assembly"))]);
        let out = concatenation(
            &[
                PatternTerm::Const(Term::string("criterion ")),
                PatternTerm::var("n"),
                PatternTerm::Const(Term::string(" <")),
                PatternTerm::var("c"),
                PatternTerm::Const(Term::string(">")),
            ],
            "msg",
            &b,
        )
        .unwrap();
        assert_eq!(out.get("msg"), Some(&Term::string("criterion Assembly <urn:crit:1>")));
    }

    #[test]
    fn concatenation_fails_on_unbound_part() {
        let err = concatenation(&[PatternTerm::var("missing")], "msg", &Bindings::new());
        assert!(matches!(err, Err(BuiltinError::Unbound { .. })));
    }

    #[test]
    fn for_all_in_is_vacuous_on_empty_set() {
        let store = FactStore::new();
        let set = [QuadPattern::new(
            PatternTerm::var("claim"),
            PatternTerm::iri("urn:criterion"),
            PatternTerm::var("c"),
        )];
        let test = [QuadPattern::new(
            PatternTerm::var("c"),
            PatternTerm::iri("urn:verified"),
            PatternTerm::var("by"),
        )];
        let b = seed(&[("claim", Term::iri("urn:claim"))]);
        assert_eq!(for_all_in(&store, &set, &test, &b), Ok(true));
    }

    #[test]
    fn for_all_in_requires_every_member() {
        let fact = |s: &str, p: &str, o: &str| {
            Quad::triple(Term::iri(s), Term::iri(p), Term::iri(o)).unwrap()
        };
        let mut store = FactStore::from_quads([
            fact("urn:claim", "urn:criterion", "urn:a"),
            fact("urn:claim", "urn:criterion", "urn:b"),
            fact("urn:a", "urn:verified", "urn:dcc"),
        ]);
        let set = [QuadPattern::new(
            PatternTerm::var("claim"),
            PatternTerm::iri("urn:criterion"),
            PatternTerm::var("c"),
        )];
        let test = [QuadPattern::new(
            PatternTerm::var("c"),
            PatternTerm::iri("urn:verified"),
            PatternTerm::var("by"),
        )];
        let b = seed(&[("claim", Term::iri("urn:claim"))]);
        assert_eq!(for_all_in(&store, &set, &test, &b), Ok(false));

        store.insert(fact("urn:b", "urn:verified", "urn:dcc"));
        assert_eq!(for_all_in(&store, &set, &test, &b), Ok(true));
    }
}
