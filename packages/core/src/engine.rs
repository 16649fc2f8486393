//! Ordered forward-chaining over a [`FactStore`].
//!
//! [`RuleEngine::run_inferences`] applies each rule of its catalog exactly
//! once, in catalog order. A rule is matched against the whole current store,
//! including facts added by earlier rules in the same run; all of its
//! instantiations are computed first and only then are the new quads merged.
//!
//! A rule error stops the run. Facts derived before the failure stay in the
//! store and the returned [`InferenceRun`] names the failed rule, so callers
//! can refuse to trust conclusions drawn from a partial store.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use crate::builtins::{concatenation, BuiltinError};
use crate::matcher::{solve, Bindings, GraphPattern, PatternTerm, QuadPattern};
use crate::rule::{Rule, RuleCatalog};
use crate::store::FactStore;
use crate::term::{GraphName, Quad, Term, TermError};

/// Errors raised while applying a single rule.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RuleError {
    #[error("built-in failed: {0}")]
    Builtin(#[from] BuiltinError),

    #[error("consequent {pattern} references unbound variable ?{var}")]
    UnboundConsequent { pattern: String, var: String },

    #[error("consequent {pattern} produced an ill-typed quad: {source}")]
    IllTyped {
        pattern: String,
        #[source]
        source: TermError,
    },
}

/// Whether the engine has been run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Applied,
}

/// What one rule did during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    pub rule: String,
    /// Antecedent solutions that passed every built-in.
    pub matches: usize,
    /// Quads this rule added to the store.
    pub derived: usize,
    /// Annotations that could not be rendered.
    pub explanation_failures: usize,
}

/// The rule that stopped a run, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFailure {
    pub rule: String,
    pub error: String,
}

/// The result of [`RuleEngine::run_inferences`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InferenceRun {
    pub outcomes: Vec<RuleOutcome>,
    pub failure: Option<RuleFailure>,
    /// Rules that never ran because an earlier rule failed.
    pub skipped: Vec<String>,
}

impl InferenceRun {
    /// `true` if every rule ran.
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// Total quads added across all rules.
    pub fn derived(&self) -> usize {
        self.outcomes.iter().map(|o| o.derived).sum()
    }
}

/// Applies a [`RuleCatalog`] to fact stores.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    catalog: RuleCatalog,
    state: EngineState,
}

impl RuleEngine {
    pub fn new(catalog: RuleCatalog) -> Self {
        Self {
            catalog,
            state: EngineState::Idle,
        }
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Apply every rule once, in order, adding newly derived quads to `store`.
    ///
    /// Rules are not re-run if the store changes afterwards; call again to
    /// pick up new facts. Re-running on an unchanged store derives nothing.
    pub fn run_inferences(&mut self, store: &mut FactStore) -> InferenceRun {
        let run = apply_catalog(&self.catalog, store);
        self.state = EngineState::Applied;
        run
    }

    /// Compute the quads a run would add, without touching `store`.
    pub fn derive(&self, store: &FactStore) -> (Vec<Quad>, InferenceRun) {
        let mut scratch = store.clone();
        let run = apply_catalog(&self.catalog, &mut scratch);
        let derived = scratch
            .snapshot()
            .into_iter()
            .filter(|q| !store.contains(q))
            .collect();
        (derived, run)
    }
}

fn apply_catalog(catalog: &RuleCatalog, store: &mut FactStore) -> InferenceRun {
    let mut run = InferenceRun::default();
    let mut rules = catalog.iter();

    for rule in rules.by_ref() {
        match apply_rule(rule, store) {
            Ok(outcome) => {
                tracing::info!(
                    rule = %rule.id,
                    matches = outcome.matches,
                    derived = outcome.derived,
                    "rule applied"
                );
                run.outcomes.push(outcome);
            }
            Err(e) => {
                tracing::error!(rule = %rule.id, error = %e, "rule failed; stopping inference");
                run.failure = Some(RuleFailure {
                    rule: rule.id.clone(),
                    error: e.to_string(),
                });
                break;
            }
        }
    }

    run.skipped = rules.map(|r| r.id.clone()).collect();
    run
}

/// Apply one rule against the current store and merge what it derives.
pub fn apply_rule(rule: &Rule, store: &mut FactStore) -> Result<RuleOutcome, RuleError> {
    let solutions = matching_bindings(rule, store)?;
    tracing::debug!(rule = %rule.id, solutions = solutions.len(), "antecedent solved");

    let mut facts: BTreeSet<Quad> = BTreeSet::new();
    for bindings in &solutions {
        for pattern in &rule.consequent {
            facts.insert(instantiate(pattern, bindings)?);
        }
    }

    let mut explanation_failures = 0;
    for bindings in &solutions {
        for annotation in &rule.annotations {
            let rendered = concatenation(&annotation.parts, &annotation.into, bindings)
                .map_err(RuleError::from)
                .and_then(|b| {
                    annotation
                        .then
                        .iter()
                        .map(|p| instantiate(p, &b))
                        .collect::<Result<Vec<_>, _>>()
                });
            match rendered {
                Ok(quads) => facts.extend(quads),
                Err(e) => {
                    explanation_failures += 1;
                    tracing::warn!(rule = %rule.id, error = %e, "explanation skipped");
                }
            }
        }
    }

    let derived = store.extend(facts);
    Ok(RuleOutcome {
        rule: rule.id.clone(),
        matches: solutions.len(),
        derived,
        explanation_failures,
    })
}

/// Solutions of the rule's triple patterns that pass every built-in test.
fn matching_bindings(rule: &Rule, store: &FactStore) -> Result<Vec<Bindings>, RuleError> {
    let patterns = rule.patterns();
    let mut out = Vec::new();
    'solutions: for bindings in solve(store, &patterns, &Bindings::new()) {
        for builtin in rule.builtins() {
            if !builtin.holds(store, &bindings)? {
                continue 'solutions;
            }
        }
        out.push(bindings);
    }
    Ok(out)
}

/// Substitute `bindings` into a consequent pattern.
pub fn instantiate(pattern: &QuadPattern, bindings: &Bindings) -> Result<Quad, RuleError> {
    let resolve = |t: &PatternTerm| {
        bindings
            .resolve(t)
            .ok_or_else(|| RuleError::UnboundConsequent {
                pattern: pattern.to_string(),
                var: t.var_name().unwrap_or_default().to_string(),
            })
    };
    let graph = match &pattern.graph {
        GraphPattern::Any | GraphPattern::Default => GraphName::Default,
        GraphPattern::Named(iri) => GraphName::named(iri),
        GraphPattern::Var(v) => match bindings.get(v) {
            Some(Term::Iri(iri)) => GraphName::named(iri),
            Some(other) => {
                return Err(RuleError::IllTyped {
                    pattern: pattern.to_string(),
                    source: TermError::NonIriGraph(other.to_string()),
                })
            }
            None => {
                return Err(RuleError::UnboundConsequent {
                    pattern: pattern.to_string(),
                    var: v.clone(),
                })
            }
        },
    };
    Quad::new(
        resolve(&pattern.subject)?,
        resolve(&pattern.predicate)?,
        resolve(&pattern.object)?,
        graph,
    )
    .map_err(|source| RuleError::IllTyped {
        pattern: pattern.to_string(),
        source,
    })
}

// --- tests -------------------------------------------------------------------
