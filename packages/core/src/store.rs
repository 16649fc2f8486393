use std::collections::{HashMap, HashSet};

use crate::term::{GraphName, Quad, Term};

/// An append-only, in-memory set of [`Quad`]s.
///
/// The store owns every fact for the lifetime of one validation run. Quads
/// are only ever added; duplicates collapse. Lookups take any combination of
/// wildcards and are served from subject and predicate indexes.
///
/// Enumeration order is not part of the contract.
#[derive(Debug, Default, Clone)]
pub struct FactStore {
    quads: Vec<Quad>,
    seen: HashSet<Quad>,
    by_subject: HashMap<Term, Vec<usize>>,
    by_predicate: HashMap<Term, Vec<usize>>,
}

impl FactStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from an iterator of quads.
    pub fn from_quads(iter: impl IntoIterator<Item = Quad>) -> Self {
        let mut store = Self::new();
        store.extend(iter);
        store
    }

    /// Insert one quad. Returns `true` if it was not already present.
    pub fn insert(&mut self, quad: Quad) -> bool {
        if self.seen.contains(&quad) {
            return false;
        }
        let idx = self.quads.len();
        self.by_subject
            .entry(quad.subject.clone())
            .or_default()
            .push(idx);
        self.by_predicate
            .entry(quad.predicate.clone())
            .or_default()
            .push(idx);
        self.seen.insert(quad.clone());
        self.quads.push(quad);
        true
    }

    /// Merge quads idempotently. Returns how many were new.
    pub fn extend(&mut self, iter: impl IntoIterator<Item = Quad>) -> usize {
        iter.into_iter()
            .map(|q| self.insert(q))
            .filter(|added| *added)
            .count()
    }

    pub fn contains(&self, quad: &Quad) -> bool {
        self.seen.contains(quad)
    }

    /// Number of distinct quads.
    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    /// Iterate over all quads in unspecified order.
    pub fn quads(&self) -> impl Iterator<Item = &Quad> {
        self.quads.iter()
    }

    /// All quads matching the given pattern; `None` is a wildcard.
    pub fn match_quads(
        &self,
        subject: Option<&Term>,
        predicate: Option<&Term>,
        object: Option<&Term>,
        graph: Option<&GraphName>,
    ) -> Vec<&Quad> {
        let candidates: Box<dyn Iterator<Item = &Quad> + '_> = match (subject, predicate) {
            (Some(s), _) => Box::new(self.indexed(&self.by_subject, s)),
            (None, Some(p)) => Box::new(self.indexed(&self.by_predicate, p)),
            (None, None) => Box::new(self.quads.iter()),
        };
        candidates
            .filter(|q| subject.map_or(true, |s| &q.subject == s))
            .filter(|q| predicate.map_or(true, |p| &q.predicate == p))
            .filter(|q| object.map_or(true, |o| &q.object == o))
            .filter(|q| graph.map_or(true, |g| &q.graph == g))
            .collect()
    }

    /// Objects of every `(subject, predicate, ?o)` fact, in any graph.
    pub fn objects(&self, subject: &Term, predicate: &str) -> Vec<&Term> {
        self.match_quads(Some(subject), Some(&Term::iri(predicate)), None, None)
            .into_iter()
            .map(|q| &q.object)
            .collect()
    }

    /// Subjects of every `(?s, predicate, object)` fact, in any graph.
    pub fn subjects(&self, predicate: &str, object: &Term) -> Vec<&Term> {
        self.match_quads(None, Some(&Term::iri(predicate)), Some(object), None)
            .into_iter()
            .map(|q| &q.subject)
            .collect()
    }

    /// Whether any `(subject, predicate, object)` fact exists, in any graph.
    pub fn holds(&self, subject: &Term, predicate: &str, object: &Term) -> bool {
        !self
            .match_quads(Some(subject), Some(&Term::iri(predicate)), Some(object), None)
            .is_empty()
    }

    /// Sorted copy of every quad, for export and set comparison.
    pub fn snapshot(&self) -> Vec<Quad> {
        let mut quads = self.quads.clone();
        quads.sort();
        quads
    }

    fn indexed<'a>(
        &'a self,
        index: &'a HashMap<Term, Vec<usize>>,
        key: &Term,
    ) -> impl Iterator<Item = &'a Quad> + 'a {
        index
            .get(key)
            .map(|ids| ids.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&i| &self.quads[i])
    }
}

// --- tests -------------------------------------------------------------------
