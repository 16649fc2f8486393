//! Conjunctive pattern matching over a [`FactStore`].
//!
//! [`solve`] extends a seed [`Bindings`] across a list of [`QuadPattern`]s by
//! backtracking join. At each step it picks the pattern with the most
//! positions already fixed by the current bindings, so the result set is the
//! same for any ordering of the input patterns; only the amount of work
//! differs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::store::FactStore;
use crate::term::{GraphName, Quad, Term};

/// One position of a pattern: a variable or a fixed term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternTerm {
    Var(String),
    Const(Term),
}

impl PatternTerm {
    pub fn var(name: impl Into<String>) -> Self {
        PatternTerm::Var(name.into())
    }

    pub fn iri(iri: impl Into<String>) -> Self {
        PatternTerm::Const(Term::iri(iri))
    }

    pub fn var_name(&self) -> Option<&str> {
        match self {
            PatternTerm::Var(v) => Some(v),
            PatternTerm::Const(_) => None,
        }
    }
}

impl From<Term> for PatternTerm {
    fn from(t: Term) -> Self {
        PatternTerm::Const(t)
    }
}

impl fmt::Display for PatternTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternTerm::Var(v) => write!(f, "?{v}"),
            PatternTerm::Const(t) => write!(f, "{t}"),
        }
    }
}

/// Graph position of a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GraphPattern {
    /// Match quads in any graph. Consequents using this land in the default graph.
    #[default]
    Any,
    Default,
    Named(String),
    /// Binds the graph name as an IRI term.
    Var(String),
}

/// A quad template with variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuadPattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
    pub graph: GraphPattern,
}

impl QuadPattern {
    /// A pattern matching in any graph.
    pub fn new(subject: PatternTerm, predicate: PatternTerm, object: PatternTerm) -> Self {
        Self {
            subject,
            predicate,
            object,
            graph: GraphPattern::Any,
        }
    }

    /// Every variable the pattern mentions.
    pub fn variables(&self) -> BTreeSet<&str> {
        let mut vars: BTreeSet<&str> = [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter_map(PatternTerm::var_name)
            .collect();
        if let GraphPattern::Var(v) = &self.graph {
            vars.insert(v);
        }
        vars
    }

    // Count of positions fixed either by a constant or by a bound variable.
    fn bound_positions(&self, bindings: &Bindings) -> usize {
        let term_bound = |t: &PatternTerm| match t {
            PatternTerm::Const(_) => true,
            PatternTerm::Var(v) => bindings.get(v).is_some(),
        };
        let graph_bound = match &self.graph {
            GraphPattern::Any => false,
            GraphPattern::Var(v) => bindings.get(v).is_some(),
            _ => true,
        };
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter(|t| term_bound(*t))
            .count()
            + usize::from(graph_bound)
    }
}

impl fmt::Display for QuadPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// A mapping from variable names to the terms they matched.
#[derive(Debug, Clone, PartialEq, Eq, Default, PartialOrd, Ord)]
pub struct Bindings(BTreeMap<String, Term>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: &str) -> Option<&Term> {
        self.0.get(var)
    }

    /// Returns a copy with `var` bound to `term`, or `None` if `var` is
    /// already bound to a different term.
    pub fn with(&self, var: &str, term: &Term) -> Option<Bindings> {
        match self.0.get(var) {
            Some(existing) if existing == term => Some(self.clone()),
            Some(_) => None,
            None => {
                let mut next = self.clone();
                next.0.insert(var.to_string(), term.clone());
                Some(next)
            }
        }
    }

    /// Substitute a pattern term; `None` if it is an unbound variable.
    pub fn resolve(&self, term: &PatternTerm) -> Option<Term> {
        match term {
            PatternTerm::Const(t) => Some(t.clone()),
            PatternTerm::Var(v) => self.0.get(v).cloned(),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// All extensions of `seed` that satisfy every pattern in `patterns`.
///
/// An empty pattern list yields `seed` itself; no match yields an empty list.
pub fn solve(store: &FactStore, patterns: &[QuadPattern], seed: &Bindings) -> Vec<Bindings> {
    let mut out = Vec::new();
    let mut pending: Vec<&QuadPattern> = patterns.iter().collect();
    search(store, &mut pending, seed.clone(), &mut out);
    out.sort();
    out.dedup();
    out
}

/// Whether at least one extension of `seed` satisfies every pattern.
pub fn satisfiable(store: &FactStore, patterns: &[QuadPattern], seed: &Bindings) -> bool {
    !solve(store, patterns, seed).is_empty()
}

fn search<'p>(
    store: &FactStore,
    pending: &mut Vec<&'p QuadPattern>,
    bindings: Bindings,
    out: &mut Vec<Bindings>,
) {
    if pending.is_empty() {
        out.push(bindings);
        return;
    }

    // most-constrained first
    let next = (0..pending.len())
        .max_by_key(|&i| (pending[i].bound_positions(&bindings), std::cmp::Reverse(i)))
        .unwrap_or(0);
    let pattern = pending.remove(next);

    let s = bindings.resolve(&pattern.subject);
    let p = bindings.resolve(&pattern.predicate);
    let o = bindings.resolve(&pattern.object);
    let g = match &pattern.graph {
        GraphPattern::Any => None,
        GraphPattern::Default => Some(GraphName::Default),
        GraphPattern::Named(iri) => Some(GraphName::named(iri)),
        GraphPattern::Var(v) => match bindings.get(v) {
            Some(Term::Iri(iri)) => Some(GraphName::named(iri)),
            // a graph variable bound to a non-IRI can never match
            Some(_) => {
                pending.insert(next, pattern);
                return;
            }
            None => None,
        },
    };

    for quad in store.match_quads(s.as_ref(), p.as_ref(), o.as_ref(), g.as_ref()) {
        if let Some(extended) = unify(pattern, quad, &bindings) {
            search(store, pending, extended, out);
        }
    }

    pending.insert(next, pattern);
}

/// Bind the variables of `pattern` against `quad`, failing on conflict.
pub fn unify(pattern: &QuadPattern, quad: &Quad, bindings: &Bindings) -> Option<Bindings> {
    let mut current = bindings.clone();
    for (pt, term) in [
        (&pattern.subject, &quad.subject),
        (&pattern.predicate, &quad.predicate),
        (&pattern.object, &quad.object),
    ] {
        current = match pt {
            PatternTerm::Const(c) if c == term => current,
            PatternTerm::Const(_) => return None,
            PatternTerm::Var(v) => current.with(v, term)?,
        };
    }
    match (&pattern.graph, &quad.graph) {
        (GraphPattern::Any, _) => {}
        (GraphPattern::Default, GraphName::Default) => {}
        (GraphPattern::Named(a), GraphName::Named(b)) if a == b => {}
        (GraphPattern::Var(v), GraphName::Named(g)) => {
            current = current.with(v, &Term::iri(g.clone()))?;
        }
        _ => return None,
    }
    Some(current)
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn v(name: &str) -> PatternTerm {
        PatternTerm::var(name)
    }

    fn c(iri: &str) -> PatternTerm {
        PatternTerm::iri(iri)
    }

    fn store() -> FactStore {
        let fact = |s: &str, p: &str, o: &str| {
            Quad::triple(Term::iri(s), Term::iri(p), Term::iri(o)).unwrap()
        };
        FactStore::from_quads([
            fact("urn:alice", "urn:knows", "urn:bob"),
            fact("urn:bob", "urn:knows", "urn:carol"),
            fact("urn:carol", "urn:knows", "urn:alice"),
            fact("urn:alice", "urn:likes", "urn:alice"),
            fact("urn:bob", "urn:likes", "urn:carol"),
        ])
    }

    #[test]
    fn single_pattern_binds_all_matches() {
        let pats = [QuadPattern::new(v("x"), c("urn:knows"), v("y"))];
        let out = solve(&store(), &pats, &Bindings::new());
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn join_prunes_conflicting_bindings() {
        // x knows y and x likes y
        let pats = [
            QuadPattern::new(v("x"), c("urn:knows"), v("y")),
            QuadPattern::new(v("x"), c("urn:likes"), v("y")),
        ];
        let out = solve(&store(), &pats, &Bindings::new());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("x"), Some(&Term::iri("urn:bob")));
        assert_eq!(out[0].get("y"), Some(&Term::iri("urn:carol")));
    }

    #[test]
    fn repeated_variable_in_one_pattern() {
        let pats = [QuadPattern::new(v("x"), c("urn:likes"), v("x"))];
        let out = solve(&store(), &pats, &Bindings::new());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("x"), Some(&Term::iri("urn:alice")));
    }

    #[test]
    fn result_is_independent_of_pattern_order() {
        let a = QuadPattern::new(v("x"), c("urn:knows"), v("y"));
        let b = QuadPattern::new(v("y"), c("urn:knows"), v("z"));
        let d = QuadPattern::new(v("z"), c("urn:knows"), v("x"));
        let forward = solve(&store(), &[a.clone(), b.clone(), d.clone()], &Bindings::new());
        let reversed = solve(&store(), &[d, b, a], &Bindings::new());
        assert_eq!(forward.len(), 3);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn seed_bindings_constrain_search() {
        let seed = Bindings::new().with("x", &Term::iri("urn:carol")).unwrap();
        let pats = [QuadPattern::new(v("x"), c("urn:knows"), v("y"))];
        let out = solve(&store(), &pats, &seed);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("y"), Some(&Term::iri("urn:alice")));
    }

    #[test]
    fn no_match_is_empty() {
        let pats = [QuadPattern::new(v("x"), c("urn:hates"), v("y"))];
        assert!(solve(&store(), &pats, &Bindings::new()).is_empty());
        assert!(!satisfiable(&store(), &pats, &Bindings::new()));
    }

    #[test]
    fn graph_variable_binds_graph_name() {
        let q = Quad::new(
            Term::iri("urn:s"),
            Term::iri("urn:p"),
            Term::iri("urn:o"),
            GraphName::named("urn:cred-1"),
        )
        .unwrap();
        let store = FactStore::from_quads([q]);
        let mut pat = QuadPattern::new(v("s"), c("urn:p"), v("o"));
        pat.graph = GraphPattern::Var("g".into());
        let out = solve(&store, &[pat], &Bindings::new());
        assert_eq!(out[0].get("g"), Some(&Term::iri("urn:cred-1")));
    }
}
