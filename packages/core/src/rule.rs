//! Strongly-typed inference rules and the ordered catalog that holds them.
//!
//! A [`Rule`] is checked when it enters a [`RuleCatalog`]: every variable a
//! consequent writes must be bound by an antecedent triple pattern, and
//! built-in calls may only read variables the patterns bind. Rules that pass
//! validation cannot produce an unbound consequent at run time.

use std::collections::{BTreeSet, HashSet};

use thiserror::Error;

use crate::builtins::Builtin;
use crate::matcher::{PatternTerm, QuadPattern};

/// The only catalog format version this build understands.
pub const CATALOG_VERSION: u32 = 1;

/// Errors raised while loading or validating a rule catalog.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CatalogError {
    #[error("catalog is not valid JSON: {0}")]
    Parse(String),

    #[error("unsupported catalog version {0} (expected {expected})", expected = CATALOG_VERSION)]
    UnsupportedVersion(u32),

    #[error("catalog contains no rules")]
    Empty,

    #[error("duplicate rule id {0:?}")]
    DuplicateRule(String),

    #[error("rule {rule:?}: antecedent has no triple patterns")]
    NoPatterns { rule: String },

    #[error("rule {rule:?}: consequent is empty")]
    EmptyConsequent { rule: String },

    #[error("rule {rule:?}: consequent variable ?{var} is not bound by the antecedent")]
    UnsafeVariable { rule: String, var: String },

    #[error("rule {rule:?}: {builtin} reads unbound variable ?{var}")]
    UnboundBuiltinVariable {
        rule: String,
        builtin: &'static str,
        var: String,
    },

    #[error("rule {rule:?}: forAllIn needs a non-empty set that shares a variable with its test")]
    MalformedQuantifier { rule: String },

    #[error("rule {rule:?}: invalid term {term:?}: {reason}")]
    BadTerm {
        rule: String,
        term: String,
        reason: String,
    },
}

/// One antecedent item: a triple pattern or a built-in test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Match(QuadPattern),
    Builtin(Builtin),
}

/// An explanation attached to a rule: `concatenation(parts…, into)` and the
/// patterns that record the resulting string.
///
/// Annotations are evaluated after the rule's fact consequents and never
/// cause the rule to fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub parts: Vec<PatternTerm>,
    pub into: String,
    pub then: Vec<QuadPattern>,
}

/// An inference rule: when every antecedent holds, assert the consequent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub id: String,
    pub description: Option<String>,
    pub antecedent: Vec<Condition>,
    pub consequent: Vec<QuadPattern>,
    pub annotations: Vec<Annotation>,
}

impl Rule {
    pub fn new(
        id: impl Into<String>,
        antecedent: Vec<Condition>,
        consequent: Vec<QuadPattern>,
    ) -> Self {
        Self {
            id: id.into(),
            description: None,
            antecedent,
            consequent,
            annotations: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// The antecedent's triple patterns, in declaration order.
    pub fn patterns(&self) -> Vec<QuadPattern> {
        self.antecedent
            .iter()
            .filter_map(|c| match c {
                Condition::Match(p) => Some(p.clone()),
                Condition::Builtin(_) => None,
            })
            .collect()
    }

    pub fn builtins(&self) -> impl Iterator<Item = &Builtin> {
        self.antecedent.iter().filter_map(|c| match c {
            Condition::Builtin(b) => Some(b),
            Condition::Match(_) => None,
        })
    }

    /// Check variable safety and built-in arity.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let patterns = self.patterns();
        if patterns.is_empty() {
            return Err(CatalogError::NoPatterns {
                rule: self.id.clone(),
            });
        }
        if self.consequent.is_empty() {
            return Err(CatalogError::EmptyConsequent {
                rule: self.id.clone(),
            });
        }

        let bound: BTreeSet<&str> = patterns.iter().flat_map(|p| p.variables()).collect();

        for builtin in self.builtins() {
            if let Some(var) = builtin.required_variables().difference(&bound).next() {
                return Err(CatalogError::UnboundBuiltinVariable {
                    rule: self.id.clone(),
                    builtin: builtin.name(),
                    var: var.to_string(),
                });
            }
            if let Builtin::ForAllIn { set, .. } = builtin {
                let shared = builtin
                    .local_variables()
                    .intersection(&builtin.test_variables())
                    .next()
                    .is_some();
                if set.is_empty() || !shared {
                    return Err(CatalogError::MalformedQuantifier {
                        rule: self.id.clone(),
                    });
                }
            }
        }

        check_safe(&self.id, &self.consequent, &bound)?;

        for annotation in &self.annotations {
            let mut scope = bound.clone();
            scope.insert(annotation.into.as_str());
            check_safe(&self.id, &annotation.then, &scope)?;
        }

        Ok(())
    }
}

fn check_safe(
    rule: &str,
    patterns: &[QuadPattern],
    bound: &BTreeSet<&str>,
) -> Result<(), CatalogError> {
    for pattern in patterns {
        if let Some(var) = pattern.variables().difference(bound).next() {
            return Err(CatalogError::UnsafeVariable {
                rule: rule.to_string(),
                var: var.to_string(),
            });
        }
    }
    Ok(())
}

/// An explicitly ordered, validated list of rules.
///
/// Rules run in the order they appear here. A rule may depend on facts
/// derived by any rule before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleCatalog {
    rules: Vec<Rule>,
}

impl RuleCatalog {
    /// Validate every rule and the uniqueness of their ids.
    pub fn new(rules: Vec<Rule>) -> Result<Self, CatalogError> {
        if rules.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut ids = HashSet::new();
        for rule in &rules {
            if !ids.insert(rule.id.as_str()) {
                return Err(CatalogError::DuplicateRule(rule.id.clone()));
            }
            rule.validate()?;
        }
        Ok(Self { rules })
    }

    /// Rule ids in execution order.
    pub fn order(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id.as_str()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// --- tests -------------------------------------------------------------------
