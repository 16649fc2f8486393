//! Loading rule catalogs from their JSON data format.
//!
//! ```json
//! {
//!   "version": 1,
//!   "prefixes": { "ex": "https://example.org/" },
//!   "rules": [
//!     {
//!       "id": "ancestor",
//!       "when": [["?x", "ex:parent", "?y"], { "equalTo": ["?x", "?x"] }],
//!       "then": [["?x", "ex:ancestor", "?y"]],
//!       "explain": [{ "concat": ["?x", "\" begat \"", "?y"], "into": "?why",
//!                     "then": [["?x", "ex:note", "?why"]] }]
//!     }
//!   ]
//! }
//! ```
//!
//! Terms are written as `?var`, `_:label`, `<iri>`, `prefix:local`, `a`
//! (for `rdf:type`), or a quoted literal with an optional `^^datatype` or
//! `@lang` suffix. Patterns are three-element arrays, or four-element arrays
//! whose last entry names the graph. The `rdf`, `xsd`, `untp` and `trust`
//! prefixes are always available.
//!
//! The order of `rules` is the execution order.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::builtins::Builtin;
use crate::matcher::{GraphPattern, PatternTerm, QuadPattern};
use crate::rule::{Annotation, CatalogError, Condition, Rule, RuleCatalog, CATALOG_VERSION};
use crate::term::{unescape_literal, Literal, Term};
use crate::vocab;

/// The catalog shipped with the crate.
pub const DEFAULT_CATALOG: &str = include_str!("../rules/default.json");

impl RuleCatalog {
    /// The embedded default catalog.
    pub fn embedded() -> Result<Self, CatalogError> {
        parse_catalog(DEFAULT_CATALOG)
    }

    /// Parse a catalog from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        parse_catalog(json)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    version: u32,
    #[serde(default)]
    prefixes: BTreeMap<String, String>,
    rules: Vec<RuleFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    id: String,
    #[serde(default)]
    description: Option<String>,
    when: Vec<WhenItem>,
    then: Vec<Vec<String>>,
    #[serde(default)]
    explain: Vec<ExplainFile>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WhenItem {
    Pattern(Vec<String>),
    Builtin(BuiltinFile),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
enum BuiltinFile {
    EqualTo([String; 2]),
    ForAllIn {
        set: Vec<Vec<String>>,
        test: Vec<Vec<String>>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExplainFile {
    concat: Vec<String>,
    into: String,
    then: Vec<Vec<String>>,
}

/// Parse and validate a catalog.
pub fn parse_catalog(json: &str) -> Result<RuleCatalog, CatalogError> {
    let file: CatalogFile =
        serde_json::from_str(json).map_err(|e| CatalogError::Parse(e.to_string()))?;
    if file.version != CATALOG_VERSION {
        return Err(CatalogError::UnsupportedVersion(file.version));
    }

    let mut prefixes: BTreeMap<String, String> = [
        ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
        ("xsd", vocab::XSD),
        ("untp", vocab::UNTP),
        ("trust", vocab::TRUST),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    prefixes.extend(file.prefixes);

    let rules = file
        .rules
        .into_iter()
        .map(|r| {
            let reader = TermReader {
                rule: &r.id,
                prefixes: &prefixes,
            };
            reader.rule(&r)
        })
        .collect::<Result<Vec<_>, _>>()?;

    RuleCatalog::new(rules)
}

static VARIABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\?([A-Za-z_][A-Za-z0-9_]*)$").expect("invalid variable regex"));

static LITERAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^"((?:[^"\\]|\\.)*)"(?:\^\^(\S+)|@([A-Za-z]+(?:-[A-Za-z0-9]+)*))?$"#)
        .expect("invalid literal regex")
});

static PREFIXED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9_-]*)?:([^\s<>]*)$").expect("invalid prefixed-name regex")
});

struct TermReader<'a> {
    rule: &'a str,
    prefixes: &'a BTreeMap<String, String>,
}

impl TermReader<'_> {
    fn rule(&self, file: &RuleFile) -> Result<Rule, CatalogError> {
        let antecedent = file
            .when
            .iter()
            .map(|item| match item {
                WhenItem::Pattern(p) => self.pattern(p).map(Condition::Match),
                WhenItem::Builtin(b) => self.builtin(b).map(Condition::Builtin),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut rule = Rule::new(file.id.clone(), antecedent, self.patterns(&file.then)?);
        rule.description = file.description.clone();

        for explain in &file.explain {
            let parts = explain
                .concat
                .iter()
                .map(|t| self.term(t))
                .collect::<Result<Vec<_>, _>>()?;
            let into = match self.term(&explain.into)? {
                PatternTerm::Var(v) => v,
                PatternTerm::Const(_) => return Err(self.bad(&explain.into, "must be a variable")),
            };
            rule = rule.with_annotation(Annotation {
                parts,
                into,
                then: self.patterns(&explain.then)?,
            });
        }
        Ok(rule)
    }

    fn builtin(&self, file: &BuiltinFile) -> Result<Builtin, CatalogError> {
        Ok(match file {
            BuiltinFile::EqualTo([a, b]) => Builtin::EqualTo(self.term(a)?, self.term(b)?),
            BuiltinFile::ForAllIn { set, test } => Builtin::ForAllIn {
                set: self.patterns(set)?,
                test: self.patterns(test)?,
            },
        })
    }

    fn patterns(&self, raw: &[Vec<String>]) -> Result<Vec<QuadPattern>, CatalogError> {
        raw.iter().map(|p| self.pattern(p)).collect()
    }

    fn pattern(&self, raw: &[String]) -> Result<QuadPattern, CatalogError> {
        match raw {
            [s, p, o] => Ok(QuadPattern::new(self.term(s)?, self.term(p)?, self.term(o)?)),
            [s, p, o, g] => {
                let mut pattern = QuadPattern::new(self.term(s)?, self.term(p)?, self.term(o)?);
                pattern.graph = match self.term(g)? {
                    PatternTerm::Var(v) => GraphPattern::Var(v),
                    PatternTerm::Const(Term::Iri(iri)) => GraphPattern::Named(iri),
                    PatternTerm::Const(_) => return Err(self.bad(g, "graph must be an IRI")),
                };
                Ok(pattern)
            }
            _ => Err(self.bad(&raw.join(" "), "pattern must have three or four terms")),
        }
    }

    fn term(&self, raw: &str) -> Result<PatternTerm, CatalogError> {
        let raw = raw.trim();
        if let Some(caps) = VARIABLE_RE.captures(raw) {
            return Ok(PatternTerm::var(&caps[1]));
        }
        if raw == "a" {
            return Ok(PatternTerm::iri(vocab::RDF_TYPE));
        }
        if let Some(label) = raw.strip_prefix("_:") {
            if label.is_empty() {
                return Err(self.bad(raw, "blank node label is empty"));
            }
            return Ok(PatternTerm::Const(Term::blank(label)));
        }
        if raw.starts_with('"') {
            return self.literal(raw).map(|l| PatternTerm::Const(Term::Literal(l)));
        }
        self.iri(raw).map(PatternTerm::iri)
    }

    fn literal(&self, raw: &str) -> Result<Literal, CatalogError> {
        let caps = LITERAL_RE
            .captures(raw)
            .ok_or_else(|| self.bad(raw, "malformed literal"))?;
        let value = unescape_literal(&caps[1]).map_err(|e| self.bad(raw, &e))?;
        Ok(match (caps.get(2), caps.get(3)) {
            (Some(dt), _) => Literal::typed(value, self.iri(dt.as_str())?),
            (None, Some(lang)) => Literal::lang(value, lang.as_str()),
            (None, None) => Literal::string(value),
        })
    }

    fn iri(&self, raw: &str) -> Result<String, CatalogError> {
        if let Some(inner) = raw.strip_prefix('<').and_then(|r| r.strip_suffix('>')) {
            if inner.is_empty() {
                return Err(self.bad(raw, "IRI is empty"));
            }
            return Ok(inner.to_string());
        }
        let caps = PREFIXED_RE
            .captures(raw)
            .ok_or_else(|| self.bad(raw, "not a variable, literal, or IRI"))?;
        let prefix = caps.get(1).map_or("", |m| m.as_str());
        let base = self
            .prefixes
            .get(prefix)
            .ok_or_else(|| self.bad(raw, &format!("unknown prefix {prefix:?}")))?;
        Ok(format!("{base}{}", &caps[2]))
    }

    fn bad(&self, term: &str, reason: &str) -> CatalogError {
        CatalogError::BadTerm {
            rule: self.rule.to_string(),
            term: term.to_string(),
            reason: reason.to_string(),
        }
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalog_loads_in_order() {
        let catalog = RuleCatalog::embedded().unwrap();
        assert_eq!(
            catalog.order(),
            vec![
                "criterion-verified",
                "topic-attested",
                "claim-criteria-verified",
                "identity-attested",
            ]
        );
    }

    #[test]
    fn term_syntax() {
        let prefixes = BTreeMap::from([("ex".to_string(), "https://example.org/".to_string())]);
        let reader = TermReader {
            rule: "t",
            prefixes: &prefixes,
        };
        assert_eq!(reader.term("?claim").unwrap(), PatternTerm::var("claim"));
        assert_eq!(reader.term("a").unwrap(), PatternTerm::iri(vocab::RDF_TYPE));
        assert_eq!(reader.term("ex:x").unwrap(), PatternTerm::iri("https://example.org/x"));
        assert_eq!(reader.term("<urn:x>").unwrap(), PatternTerm::iri("urn:x"));
        assert_eq!(
            reader.term("_:b1").unwrap(),
            PatternTerm::Const(Term::blank("b1"))
        );
        assert_eq!(
            reader.term(r#""true"^^<http://www.w3.org/2001/XMLSchema#boolean>"#).unwrap(),
            PatternTerm::Const(Term::boolean(true))
        );
        assert_eq!(
            reader.term(r#""a \"quoted\" word""#).unwrap(),
            PatternTerm::Const(Term::string("a \"quoted\" word"))
        );
        assert!(matches!(
            reader.term("nope:x"),
            Err(CatalogError::BadTerm { .. })
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        let json = r#"{ "version": 7, "rules": [] }"#;
        assert_eq!(parse_catalog(json), Err(CatalogError::UnsupportedVersion(7)));
    }

    #[test]
    fn rejects_unsafe_rule() {
        let json = r#"{
            "version": 1,
            "rules": [{ "id": "bad", "when": [["?x", "a", "untp:Thing"]],
                        "then": [["?x", "trust:ok", "?y"]] }]
        }"#;
        assert!(matches!(
            parse_catalog(json),
            Err(CatalogError::UnsafeVariable { var, .. }) if var == "y"
        ));
    }

    #[test]
    fn parses_builtins_and_graphs() {
        let json = r#"{
            "version": 1,
            "prefixes": { "ex": "https://example.org/" },
            "rules": [{
                "id": "r",
                "when": [
                    ["?x", "ex:p", "?y", "?g"],
                    { "equalTo": ["?y", "\"1\"^^xsd:integer"] },
                    { "forAllIn": { "set": [["?x", "ex:member", "?m"]],
                                    "test": [["?m", "ex:ok", "?any"]] } }
                ],
                "then": [["?x", "ex:q", "?g", "<urn:out>"]]
            }]
        }"#;
        let catalog = parse_catalog(json).unwrap();
        let rule = catalog.get("r").unwrap();
        assert_eq!(rule.builtins().count(), 2);
        assert_eq!(rule.patterns()[0].graph, GraphPattern::Var("g".into()));
        assert_eq!(rule.consequent[0].graph, GraphPattern::Named("urn:out".into()));
    }
}
