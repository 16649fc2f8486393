//! N-Quads export and import of a [`FactStore`].
//!
//! [`to_nquads`] writes one statement per line, sorted, so two stores with
//! the same facts produce byte-identical snapshots. [`parse_nquads`] accepts
//! that output plus blank lines and `#` comments.
//!
//! [`to_nquads_with_status`] prefixes the statements with a
//! `# trustgraph-run: {...}` comment carrying the [`RunStatus`] of the run
//! that produced the store. N-Quads readers skip it as a comment;
//! [`recorded_status`] reads it back.

use thiserror::Error;

use crate::store::FactStore;
use crate::term::{unescape_literal, GraphName, Literal, Quad, Term, TermError};
use crate::verify::RunStatus;
use crate::vocab;

const RUN_HEADER: &str = "# trustgraph-run: ";

/// A snapshot line that could not be parsed.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SnapshotError {
    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    #[error("line {line}: {source}")]
    Term {
        line: usize,
        #[source]
        source: TermError,
    },
}

/// Serialise every quad in the store as sorted N-Quads.
pub fn to_nquads(store: &FactStore) -> String {
    let mut out = String::new();
    for quad in store.snapshot() {
        out.push_str(&quad.to_string());
        out.push('\n');
    }
    out
}

/// Serialise the store as [`to_nquads`] does, headed by a record of the run
/// status.
pub fn to_nquads_with_status(store: &FactStore, status: &RunStatus) -> String {
    let mut out = match serde_json::to_string(status) {
        Ok(json) => format!("{RUN_HEADER}{json}\n"),
        Err(e) => {
            tracing::warn!(error = %e, "run status not recorded in snapshot");
            String::new()
        }
    };
    out.push_str(&to_nquads(store));
    out
}

/// The run status recorded in a snapshot's leading comments, if any.
///
/// Only the comment block before the first statement is searched. A header
/// that does not parse is logged and treated as absent.
pub fn recorded_status(text: &str) -> Option<RunStatus> {
    for raw in text.lines() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !trimmed.starts_with('#') {
            return None;
        }
        if let Some(json) = trimmed.strip_prefix(RUN_HEADER.trim_end()) {
            return match serde_json::from_str(json.trim()) {
                Ok(status) => Some(status),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring unreadable run record in snapshot");
                    None
                }
            };
        }
    }
    None
}

/// Parse N-Quads text into quads.
pub fn parse_nquads(text: &str) -> Result<Vec<Quad>, SnapshotError> {
    let mut quads = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        quads.push(parse_line(trimmed, line)?);
    }
    Ok(quads)
}

/// Load a snapshot into a fresh store.
pub fn load_nquads(text: &str) -> Result<FactStore, SnapshotError> {
    parse_nquads(text).map(FactStore::from_quads)
}

fn parse_line(text: &str, line: usize) -> Result<Quad, SnapshotError> {
    let syntax = |reason: String| SnapshotError::Syntax { line, reason };
    let mut cursor = Cursor { rest: text };

    let subject = cursor.term().map_err(syntax)?;
    let predicate = cursor.term().map_err(syntax)?;
    let object = cursor.term().map_err(syntax)?;

    cursor.skip_ws();
    let graph = if cursor.rest.starts_with('.') {
        GraphName::Default
    } else {
        match cursor.term().map_err(syntax)? {
            Term::Iri(iri) => GraphName::Named(iri),
            other => return Err(syntax(format!("graph label must be an IRI, got {other}"))),
        }
    };

    cursor.skip_ws();
    let tail = cursor
        .rest
        .strip_prefix('.')
        .ok_or_else(|| syntax("expected '.' at end of statement".into()))?;
    let tail = tail.trim();
    if !tail.is_empty() && !tail.starts_with('#') {
        return Err(syntax(format!("unexpected trailing input {tail:?}")));
    }

    Quad::new(subject, predicate, object, graph).map_err(|source| SnapshotError::Term { line, source })
}

struct Cursor<'a> {
    rest: &'a str,
}

impl Cursor<'_> {
    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn term(&mut self) -> Result<Term, String> {
        self.skip_ws();
        match self.rest.chars().next() {
            Some('<') => self.iri().map(Term::Iri),
            Some('_') => self.blank(),
            Some('"') => self.literal(),
            Some(c) => Err(format!("unexpected character {c:?}")),
            None => Err("unexpected end of line".into()),
        }
    }

    fn iri(&mut self) -> Result<String, String> {
        let body = &self.rest[1..];
        let end = body.find('>').ok_or("unterminated IRI")?;
        let iri = unescape_literal(&body[..end])?;
        if iri.is_empty() {
            return Err("empty IRI".into());
        }
        self.rest = &body[end + 1..];
        Ok(iri)
    }

    fn blank(&mut self) -> Result<Term, String> {
        let body = self
            .rest
            .strip_prefix("_:")
            .ok_or("blank node must start with '_:'")?;
        let end = body
            .find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.')))
            .unwrap_or(body.len());
        // a label may not end with '.'
        let label = body[..end].trim_end_matches('.');
        if label.is_empty() {
            return Err("empty blank node label".into());
        }
        self.rest = &body[label.len()..];
        Ok(Term::blank(label))
    }

    fn literal(&mut self) -> Result<Term, String> {
        let body = &self.rest[1..];
        let mut escaped = false;
        let mut end = None;
        for (i, c) in body.char_indices() {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => {
                    end = Some(i);
                    break;
                }
                _ => {}
            }
        }
        let end = end.ok_or("unterminated literal")?;
        let value = unescape_literal(&body[..end])?;
        self.rest = &body[end + 1..];

        if let Some(after) = self.rest.strip_prefix("^^") {
            self.rest = after;
            if !self.rest.starts_with('<') {
                return Err("datatype must be an IRI".into());
            }
            let datatype = self.iri()?;
            return Ok(Term::Literal(Literal::typed(value, datatype)));
        }
        if let Some(after) = self.rest.strip_prefix('@') {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
                .unwrap_or(after.len());
            if end == 0 {
                return Err("empty language tag".into());
            }
            self.rest = &after[end..];
            return Ok(Term::Literal(Literal::lang(value, &after[..end])));
        }
        Ok(Term::Literal(Literal::typed(value, vocab::XSD_STRING)))
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FactStore {
        let named = GraphName::named("urn:cred:1");
        FactStore::from_quads([
            Quad::new(
                Term::iri("urn:a"),
                Term::iri("urn:p"),
                Term::string("line\nbreak \"quoted\" \\ tab\t"),
                named.clone(),
            )
            .unwrap(),
            Quad::new(Term::blank("cred_b0"), Term::iri("urn:p"), Term::boolean(true), named)
                .unwrap(),
            Quad::triple(
                Term::iri("urn:a"),
                Term::iri("urn:label"),
                Term::Literal(Literal::lang("batterie", "fr-CA")),
            )
            .unwrap(),
            Quad::triple(Term::iri("urn:a"), Term::iri("urn:q"), Term::iri("urn:b")).unwrap(),
        ])
    }

    #[test]
    fn export_then_import_reproduces_the_set() {
        let store = sample();
        let text = to_nquads(&store);
        let reloaded = load_nquads(&text).unwrap();
        assert_eq!(reloaded.snapshot(), store.snapshot());
        assert_eq!(to_nquads(&reloaded), text);
    }

    #[test]
    fn accepts_comments_and_unicode_escapes() {
        let text = "# header\n\n<urn:s> <urn:p> \"caf\\u00E9\" . # trailing\n";
        let quads = parse_nquads(text).unwrap();
        assert_eq!(quads[0].object, Term::string("café"));
    }

    #[test]
    fn reports_line_numbers() {
        let text = "<urn:s> <urn:p> <urn:o> .\n<urn:s> <urn:p> \"open .\n";
        assert!(matches!(
            parse_nquads(text),
            Err(SnapshotError::Syntax { line: 2, .. })
        ));
    }

    #[test]
    fn ingested_awkward_iris_survive_the_round_trip() {
        use crate::ingest::{JsonNormalizer, Normalizer};
        use serde_json::json;

        let quads = JsonNormalizer::default()
            .normalize(&json!({
                "id": "urn:a\\u0041",
                "type": "Thing",
                "ex:p>q": { "@value": "colour", "@language": "en-GB" },
                "ex:with space": "x"
            }))
            .unwrap();
        let store = FactStore::from_quads(quads);
        let reloaded = load_nquads(&to_nquads(&store)).unwrap();
        assert_eq!(reloaded.snapshot(), store.snapshot());
        assert!(reloaded.holds(
            &Term::iri("urn:a\\u0041"),
            "ex:p>q",
            &Term::Literal(Literal::lang("colour", "en-GB")),
        ));
    }

    #[test]
    fn malformed_language_tag_never_reaches_a_snapshot() {
        use crate::ingest::{IngestError, JsonNormalizer, Normalizer};
        use serde_json::json;

        let result = JsonNormalizer::default().normalize(&json!({
            "id": "urn:a",
            "type": "Thing",
            "label": { "@value": "colour", "@language": "en_US" }
        }));
        assert_eq!(
            result,
            Err(IngestError::Term(TermError::InvalidLanguage("en_US".into())))
        );
        assert!(matches!(
            parse_nquads("<urn:s> <urn:p> \"x\"@en_US ."),
            Err(SnapshotError::Syntax { line: 1, .. })
        ));
    }

    #[test]
    fn run_status_travels_with_the_snapshot() {
        let store = sample();
        let status = RunStatus::Partial {
            rule: "claim-criteria-verified".into(),
            error: "unbound variable ?criterion".into(),
        };
        let text = to_nquads_with_status(&store, &status);
        assert!(text.starts_with("# trustgraph-run: {\"status\":\"partial\""));
        assert_eq!(recorded_status(&text), Some(status));
        assert_eq!(load_nquads(&text).unwrap().snapshot(), store.snapshot());
    }

    #[test]
    fn plain_snapshot_has_no_recorded_status() {
        assert_eq!(recorded_status(&to_nquads(&sample())), None);
        // a header after the first statement does not count
        let late = format!("{}# trustgraph-run: {{\"status\":\"success\"}}\n", to_nquads(&sample()));
        assert_eq!(recorded_status(&late), None);
        assert_eq!(recorded_status("# trustgraph-run: not json\n"), None);
    }

    #[test]
    fn rejects_literal_subject() {
        let text = "\"x\" <urn:p> <urn:o> .";
        assert!(matches!(
            parse_nquads(text),
            Err(SnapshotError::Term { line: 1, .. })
        ));
    }
}
