//! Turning credential documents into quads.
//!
//! The [`Normalizer`] trait is the boundary to whatever canonicalises a
//! credential into RDF. [`JsonNormalizer`] is the built-in implementation: a
//! context-free flattening of the credential JSON that is enough for the
//! product passport, conformity, and identity anchor shapes this crate
//! validates.
//!
//! # Flattening rules
//!
//! | JSON | RDF |
//! |------|-----|
//! | object with `id` / `@id` | IRI node |
//! | object without an id, or with a `_:` id | blank node scoped to the credential |
//! | `type` / `@type` value | `rdf:type` IRI (expanded against the vocabulary) |
//! | other key | predicate IRI, expanded unless it already contains `:` |
//! | string | `xsd:string` literal |
//! | boolean / integer / decimal | typed literal |
//! | `{"@value": …, "@language" \| "@type": …}` | tagged or typed literal |
//! | array | one quad per element |
//! | `null`, `@context` | skipped |
//!
//! Every quad is tagged with the credential's `id` as its graph.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::store::FactStore;
use crate::term::{GraphName, Literal, Quad, Term, TermError};
use crate::vocab;

/// Errors that make a single credential document unusable.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum IngestError {
    #[error("credential must be a JSON object")]
    NotAnObject,

    #[error("credential has no top-level id")]
    MissingId,

    #[error("credential {0} has no type")]
    MissingType(String),

    #[error("id {0:?} is not an absolute IRI")]
    InvalidId(String),

    #[error("{key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error(transparent)]
    Term(#[from] TermError),
}

/// A credential document as loaded from disk or the network.
#[derive(Debug, Clone)]
pub struct CredentialDocument {
    /// Where the document came from, for error reporting.
    pub source: String,
    pub body: Value,
}

impl CredentialDocument {
    pub fn new(source: impl Into<String>, body: Value) -> Self {
        Self {
            source: source.into(),
            body,
        }
    }
}

/// Converts one parsed credential into quads.
pub trait Normalizer {
    fn normalize(&self, document: &Value) -> Result<Vec<Quad>, IngestError>;
}

/// A document that failed to ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestFailure {
    pub source: String,
    pub error: String,
}

/// Outcome of ingesting a batch of documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Credential ids that were merged into the store.
    pub loaded: Vec<String>,
    pub failures: Vec<IngestFailure>,
    /// Quads that were new to the store.
    pub quads: usize,
}

/// Normalise each document and merge its quads into `store`.
///
/// Documents are independent: a failure is recorded and the remaining
/// documents are still ingested. A failed document contributes no quads.
pub fn ingest(
    store: &mut FactStore,
    normalizer: &dyn Normalizer,
    documents: &[CredentialDocument],
) -> IngestReport {
    let mut report = IngestReport::default();
    for doc in documents {
        match normalizer.normalize(&doc.body) {
            Ok(quads) => {
                let added = store.extend(quads);
                let id = credential_id(&doc.body).unwrap_or_default();
                tracing::info!(source = %doc.source, credential = %id, quads = added, "ingested");
                report.quads += added;
                report.loaded.push(id);
            }
            Err(e) => {
                tracing::warn!(source = %doc.source, error = %e, "credential rejected");
                report.failures.push(IngestFailure {
                    source: doc.source.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    report
}

/// Flattens credential JSON into quads without a JSON-LD processor.
#[derive(Debug, Clone)]
pub struct JsonNormalizer {
    vocab: String,
}

impl Default for JsonNormalizer {
    fn default() -> Self {
        Self::new(vocab::UNTP)
    }
}

impl JsonNormalizer {
    /// A normalizer that expands bare keys and types against `vocab`.
    pub fn new(vocab: impl Into<String>) -> Self {
        Self {
            vocab: vocab.into(),
        }
    }

    fn expand(&self, key: &str) -> String {
        if key.contains(':') {
            key.to_string()
        } else {
            format!("{}{}", self.vocab, key)
        }
    }
}

impl Normalizer for JsonNormalizer {
    fn normalize(&self, document: &Value) -> Result<Vec<Quad>, IngestError> {
        let root = document.as_object().ok_or(IngestError::NotAnObject)?;
        let id = object_id(root)
            .ok_or(IngestError::MissingId)?
            .map_err(IngestError::InvalidId)?;
        if !root.contains_key("type") && !root.contains_key("@type") {
            return Err(IngestError::MissingType(id));
        }

        let mut flattener = Flattener {
            normalizer: self,
            graph: GraphName::named(id.clone()),
            blank_prefix: blank_prefix(&id),
            next_blank: 0,
            quads: Vec::new(),
        };
        flattener.node(Term::iri(id), root)?;
        Ok(flattener.quads)
    }
}

struct Flattener<'a> {
    normalizer: &'a JsonNormalizer,
    graph: GraphName,
    blank_prefix: String,
    next_blank: usize,
    quads: Vec<Quad>,
}

impl Flattener<'_> {
    fn node(&mut self, subject: Term, object: &Map<String, Value>) -> Result<(), IngestError> {
        for (key, value) in object {
            match key.as_str() {
                "id" | "@id" | "@context" => {}
                "type" | "@type" => {
                    for t in flatten_array(value) {
                        let name = t.as_str().ok_or_else(|| IngestError::InvalidValue {
                            key: key.clone(),
                            reason: "type must be a string".into(),
                        })?;
                        self.emit(
                            subject.clone(),
                            vocab::RDF_TYPE,
                            Term::iri(self.normalizer.expand(name)),
                        )?;
                    }
                }
                _ if key.starts_with('@') => {}
                _ => {
                    let predicate = self.normalizer.expand(key);
                    for v in flatten_array(value) {
                        if let Some(object) = self.value(key, v)? {
                            self.emit(subject.clone(), &predicate, object)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn value(&mut self, key: &str, value: &Value) -> Result<Option<Term>, IngestError> {
        Ok(Some(match value {
            Value::Null => return Ok(None),
            Value::Bool(b) => Term::boolean(*b),
            Value::Number(n) if n.is_i64() || n.is_u64() => {
                Term::Literal(Literal::typed(n.to_string(), vocab::XSD_INTEGER))
            }
            Value::Number(n) => Term::Literal(Literal::typed(n.to_string(), vocab::XSD_DECIMAL)),
            Value::String(s) => Term::string(s.clone()),
            Value::Object(obj) if obj.contains_key("@value") => value_object(key, obj)?,
            Value::Object(obj) => {
                let node = match object_id(obj) {
                    Some(Ok(id)) => Term::iri(id),
                    Some(Err(raw)) => match raw.strip_prefix("_:") {
                        Some(label) if !label.is_empty() => self.labelled_blank(label),
                        _ => return Err(IngestError::InvalidId(raw)),
                    },
                    None => self.fresh_blank(),
                };
                self.node(node.clone(), obj)?;
                node
            }
            // nested arrays were flattened by the caller
            Value::Array(_) => return Ok(None),
        }))
    }

    fn emit(&mut self, subject: Term, predicate: &str, object: Term) -> Result<(), IngestError> {
        self.quads
            .push(Quad::new(subject, Term::iri(predicate), object, self.graph.clone())?);
        Ok(())
    }

    // `_:label` ids keep their identity within the document, so two objects
    // sharing a label are the same node.
    fn labelled_blank(&self, label: &str) -> Term {
        let mut out = format!("{}n_", self.blank_prefix);
        for c in label.chars() {
            if c.is_ascii_alphanumeric() || c == '-' {
                out.push(c);
            } else {
                out.push_str(&format!("_{:X}", c as u32));
            }
        }
        Term::blank(out)
    }

    fn fresh_blank(&mut self) -> Term {
        let label = format!("{}b{}", self.blank_prefix, self.next_blank);
        self.next_blank += 1;
        Term::blank(label)
    }
}

/// `Some(Ok(id))` for a usable id, `Some(Err(raw))` for a malformed one.
fn object_id(object: &Map<String, Value>) -> Option<Result<String, String>> {
    let raw = object.get("id").or_else(|| object.get("@id"))?;
    Some(match raw.as_str() {
        Some(s) if is_absolute_iri(s) => Ok(s.to_string()),
        Some(s) => Err(s.to_string()),
        None => Err(raw.to_string()),
    })
}

fn credential_id(document: &Value) -> Option<String> {
    document.as_object().and_then(object_id).and_then(Result::ok)
}

fn value_object(key: &str, obj: &Map<String, Value>) -> Result<Term, IngestError> {
    let invalid = |reason: &str| IngestError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    let lexical = match &obj["@value"] {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err(invalid("@value must be a scalar")),
    };
    let literal = match (obj.get("@language"), obj.get("@type")) {
        (Some(Value::String(lang)), None) => Literal::lang(lexical, lang.clone()),
        (None, Some(Value::String(dt))) if is_absolute_iri(dt) => Literal::typed(lexical, dt.clone()),
        (None, None) => Literal::string(lexical),
        _ => return Err(invalid("@value needs at most one of @language or an absolute @type")),
    };
    Ok(Term::Literal(literal))
}

fn flatten_array(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().flat_map(flatten_array).collect(),
        other => vec![other],
    }
}

fn is_absolute_iri(s: &str) -> bool {
    match s.split_once(':') {
        Some((scheme, rest)) => {
            !rest.is_empty()
                && !s.chars().any(char::is_whitespace)
                && scheme
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

// Blank labels are scoped by credential so two documents never share one.
fn blank_prefix(id: &str) -> String {
    let mut prefix: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    prefix.push('_');
    prefix
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalize(v: Value) -> Result<Vec<Quad>, IngestError> {
        JsonNormalizer::default().normalize(&v)
    }

    #[test]
    fn flattens_nested_objects() {
        let quads = normalize(json!({
            "@context": ["https://www.w3.org/ns/credentials/v2"],
            "id": "urn:uuid:dpp-1",
            "type": ["VerifiableCredential", "DigitalProductPassport"],
            "issuer": { "id": "did:web:maker.example", "name": "Maker" },
            "credentialSubject": {
                "id": "https://maker.example/product/1",
                "conformityClaim": [{ "conformityTopic": "environment.waste" }]
            }
        }))
        .unwrap();

        let store = FactStore::from_quads(quads);
        let cred = Term::iri("urn:uuid:dpp-1");
        assert!(store.holds(&cred, vocab::RDF_TYPE, &Term::iri(vocab::PRODUCT_PASSPORT)));
        assert!(store.holds(&cred, vocab::ISSUER, &Term::iri("did:web:maker.example")));

        let product = Term::iri("https://maker.example/product/1");
        let claims = store.objects(&product, vocab::CONFORMITY_CLAIM);
        assert_eq!(claims.len(), 1);
        assert!(matches!(claims[0], Term::BlankNode(_)));
        assert_eq!(
            store.objects(claims[0], vocab::CONFORMITY_TOPIC),
            vec![&Term::string("environment.waste")]
        );

        assert!(store
            .quads()
            .all(|q| q.graph == GraphName::named("urn:uuid:dpp-1")));
    }

    #[test]
    fn scalars_become_typed_literals() {
        let quads = normalize(json!({
            "id": "urn:x",
            "type": "Thing",
            "conformance": true,
            "count": 3,
            "ratio": 0.5,
            "label": { "@value": "batterie", "@language": "fr" },
            "gone": null
        }))
        .unwrap();
        let store = FactStore::from_quads(quads);
        let x = Term::iri("urn:x");
        let get = |k: &str| store.objects(&x, &format!("{}{k}", vocab::UNTP));
        assert_eq!(get("conformance"), vec![&Term::boolean(true)]);
        assert_eq!(
            get("count"),
            vec![&Term::Literal(Literal::typed("3", vocab::XSD_INTEGER))]
        );
        assert_eq!(
            get("ratio"),
            vec![&Term::Literal(Literal::typed("0.5", vocab::XSD_DECIMAL))]
        );
        assert_eq!(get("label"), vec![&Term::Literal(Literal::lang("batterie", "fr"))]);
        assert!(get("gone").is_empty());
    }

    #[test]
    fn rejects_malformed_documents() {
        assert_eq!(normalize(json!([1, 2])), Err(IngestError::NotAnObject));
        assert_eq!(normalize(json!({ "type": "X" })), Err(IngestError::MissingId));
        assert_eq!(
            normalize(json!({ "id": "urn:x" })),
            Err(IngestError::MissingType("urn:x".into()))
        );
        assert_eq!(
            normalize(json!({ "id": "relative/path", "type": "X" })),
            Err(IngestError::InvalidId("relative/path".into()))
        );
    }

    #[test]
    fn failures_are_isolated_per_document() {
        let docs = vec![
            CredentialDocument::new("good.json", json!({ "id": "urn:a", "type": "X" })),
            CredentialDocument::new("bad.json", json!("not a credential")),
            CredentialDocument::new("also-good.json", json!({ "id": "urn:b", "type": "X" })),
        ];
        let mut store = FactStore::new();
        let report = ingest(&mut store, &JsonNormalizer::default(), &docs);
        assert_eq!(report.loaded, vec!["urn:a".to_string(), "urn:b".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].source, "bad.json");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn blank_node_ids_are_kept_per_document() {
        let doc = |id: &str| {
            json!({
                "id": id,
                "type": "X",
                "first": { "id": "_:shared", "name": "n" },
                "second": { "@id": "_:shared" },
                "third": { "name": "fresh" }
            })
        };
        let quads = normalize(doc("urn:a")).unwrap();
        let store = FactStore::from_quads(quads);
        let cred = Term::iri("urn:a");
        let get = |k: &str| store.objects(&cred, &format!("{}{k}", vocab::UNTP))[0].clone();
        let (first, second, third) = (get("first"), get("second"), get("third"));
        assert!(matches!(first, Term::BlankNode(_)));
        assert_eq!(first, second);
        assert_ne!(first, third);

        let other = FactStore::from_quads(normalize(doc("urn:b")).unwrap());
        assert!(!other.holds(&first, vocab::NAME, &Term::string("n")));

        // the credential itself still needs an IRI
        assert_eq!(
            normalize(json!({ "id": "_:cred", "type": "X" })),
            Err(IngestError::InvalidId("_:cred".into()))
        );
    }

    #[test]
    fn blank_nodes_do_not_collide_across_documents() {
        let doc = |id: &str| json!({ "id": id, "type": "X", "part": { "name": "n" } });
        let a = normalize(doc("urn:a")).unwrap();
        let b = normalize(doc("urn:b")).unwrap();
        let blank = |qs: &[Quad]| {
            qs.iter()
                .find(|q| q.subject.as_iri().is_none())
                .map(|q| q.subject.clone())
        };
        assert_ne!(blank(&a), blank(&b));
    }
}
