//! RDF terms and quads.
//!
//! A [`Quad`] is the unit of storage in the [`FactStore`](crate::FactStore):
//! subject, predicate, object, and the named graph it was asserted in. Quads
//! are built through [`Quad::new`], which rejects positions that RDF does not
//! allow (a literal subject, a non-IRI predicate).

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::vocab;

/// Errors raised when a quad is assembled from ill-typed terms.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TermError {
    #[error("subject must be an IRI or blank node, got literal {0}")]
    LiteralSubject(String),

    #[error("predicate must be an IRI, got {0}")]
    NonIriPredicate(String),

    #[error("graph name must be an IRI, got {0}")]
    NonIriGraph(String),

    #[error("IRI must not be empty")]
    EmptyIri,

    #[error("invalid language tag {0:?}")]
    InvalidLanguage(String),
}

static LANGUAGE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]+(?:-[A-Za-z0-9]+)*$").expect("invalid language tag regex")
});

/// Whether `tag` has the BCP 47 shape N-Quads accepts after `@`.
pub fn is_language_tag(tag: &str) -> bool {
    LANGUAGE_TAG_RE.is_match(tag)
}

/// A literal value with its datatype and optional language tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal {
    /// Lexical form.
    pub value: String,
    /// Datatype IRI. Plain strings carry `xsd:string`.
    pub datatype: String,
    /// BCP 47 tag for language-tagged strings.
    pub language: Option<String>,
}

impl Literal {
    pub fn string(value: impl Into<String>) -> Self {
        Self::typed(value, vocab::XSD_STRING)
    }

    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: datatype.into(),
            language: None,
        }
    }

    pub fn lang(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: vocab::RDF_LANG_STRING.to_string(),
            language: Some(language.into()),
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self::typed(if value { "true" } else { "false" }, vocab::XSD_BOOLEAN)
    }
}

/// A ground RDF term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    Iri(String),
    /// Blank node label, without the `_:` prefix.
    BlankNode(String),
    Literal(Literal),
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    pub fn blank(label: impl Into<String>) -> Self {
        Term::BlankNode(label.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Term::Literal(Literal::string(value))
    }

    pub fn boolean(value: bool) -> Self {
        Term::Literal(Literal::boolean(value))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal(_))
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(l) => Some(l),
            _ => None,
        }
    }

    /// The plain string form of the term: the IRI itself, the literal's
    /// lexical value, or `_:label` for blank nodes.
    ///
    /// This is the form used for report identifiers and by the
    /// `concatenation` built-in.
    pub fn lexical(&self) -> String {
        match self {
            Term::Iri(iri) => iri.clone(),
            Term::BlankNode(label) => format!("_:{label}"),
            Term::Literal(l) => l.value.clone(),
        }
    }
}

/// Formats the term in N-Quads syntax.
impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{}>", escape_iri(iri)),
            Term::BlankNode(label) => write!(f, "_:{label}"),
            Term::Literal(l) => {
                write!(f, "\"{}\"", escape_literal(&l.value))?;
                match &l.language {
                    Some(lang) => write!(f, "@{lang}"),
                    None if l.datatype == vocab::XSD_STRING => Ok(()),
                    None => write!(f, "^^<{}>", escape_iri(&l.datatype)),
                }
            }
        }
    }
}

/// The graph a quad was asserted in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum GraphName {
    #[default]
    Default,
    Named(String),
}

impl GraphName {
    pub fn named(iri: impl Into<String>) -> Self {
        GraphName::Named(iri.into())
    }
}

/// A subject–predicate–object fact plus the graph it belongs to.
///
/// Identity is value equality of all four fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Quad {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
    pub graph: GraphName,
}

impl Quad {
    /// Build a quad, checking that each term is allowed in its position.
    pub fn new(
        subject: Term,
        predicate: Term,
        object: Term,
        graph: GraphName,
    ) -> Result<Self, TermError> {
        if let Term::Literal(_) = subject {
            return Err(TermError::LiteralSubject(subject.to_string()));
        }
        match &predicate {
            Term::Iri(iri) if iri.is_empty() => return Err(TermError::EmptyIri),
            Term::Iri(_) => {}
            other => return Err(TermError::NonIriPredicate(other.to_string())),
        }
        if let GraphName::Named(g) = &graph {
            if g.is_empty() {
                return Err(TermError::EmptyIri);
            }
        }
        if let Term::Literal(Literal {
            language: Some(lang),
            ..
        }) = &object
        {
            if !is_language_tag(lang) {
                return Err(TermError::InvalidLanguage(lang.clone()));
            }
        }
        Ok(Self {
            subject,
            predicate,
            object,
            graph,
        })
    }

    /// A quad in the default graph.
    pub fn triple(subject: Term, predicate: Term, object: Term) -> Result<Self, TermError> {
        Self::new(subject, predicate, object, GraphName::Default)
    }
}

/// Formats the quad as one N-Quads statement, without the trailing newline.
impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let GraphName::Named(g) = &self.graph {
            write!(f, " <{}>", escape_iri(g))?;
        }
        write!(f, " .")
    }
}

// Characters N-Quads forbids inside `<...>` are written as UCHAR escapes.
fn escape_iri(iri: &str) -> String {
    let mut out = String::with_capacity(iri.len());
    for c in iri.chars() {
        match c {
            '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\' | '\u{0}'..='\u{20}' => {
                out.push_str(&format!("\\u{:04X}", c as u32))
            }
            c => out.push(c),
        }
    }
    out
}

fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// Reverse of the literal escaping used by [`Term`]'s `Display`, plus the
/// `\uXXXX` and `\UXXXXXXXX` forms allowed by N-Quads.
pub(crate) fn unescape_literal(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some(u @ ('u' | 'U')) => {
                let width = if u == 'u' { 4 } else { 8 };
                let hex: String = chars.by_ref().take(width).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == width)
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("invalid \\{u} escape {hex:?}"))?;
                out.push(decoded);
            }
            Some(other) => return Err(format!("invalid escape \\{other}")),
            None => return Err("dangling backslash".into()),
        }
    }
    Ok(out)
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_subject_rejected() {
        let err = Quad::triple(Term::string("x"), Term::iri("urn:p"), Term::iri("urn:o"));
        assert!(matches!(err, Err(TermError::LiteralSubject(_))));
    }

    #[test]
    fn blank_predicate_rejected() {
        let err = Quad::triple(Term::iri("urn:s"), Term::blank("b0"), Term::iri("urn:o"));
        assert!(matches!(err, Err(TermError::NonIriPredicate(_))));
    }

    #[test]
    fn literals_differ_by_datatype() {
        let a = Term::string("true");
        let b = Term::boolean(true);
        assert_ne!(a, b);
        assert_eq!(a.lexical(), b.lexical());
    }

    #[test]
    fn iri_delimiters_are_escaped() {
        assert_eq!(Term::iri("ex:p>q").to_string(), r"<ex:p\u003Eq>");
        assert_eq!(Term::iri(r"urn:a\u0041").to_string(), r"<urn:a\u005Cu0041>");
        assert_eq!(Term::iri("urn:a b").to_string(), r"<urn:a\u0020b>");
    }

    #[test]
    fn malformed_language_tag_rejected() {
        let quad = |lang: &str| {
            Quad::triple(
                Term::iri("urn:s"),
                Term::iri("urn:p"),
                Term::Literal(Literal::lang("x", lang)),
            )
        };
        assert_eq!(quad("en_US"), Err(TermError::InvalidLanguage("en_US".into())));
        assert!(quad("").is_err());
        assert!(quad("en-US").is_ok());
    }

    #[test]
    fn display_escapes_and_types() {
        let q = Quad::new(
            Term::blank("b1"),
            Term::iri("urn:p"),
            Term::string("say \"hi\"\n"),
            GraphName::named("urn:g"),
        )
        .unwrap();
        assert_eq!(q.to_string(), r#"_:b1 <urn:p> "say \"hi\"\n" <urn:g> ."#);

        let typed = Term::boolean(false);
        assert_eq!(
            typed.to_string(),
            "\"false\"^^<http://www.w3.org/2001/XMLSchema#boolean>"
        );
        assert_eq!(Term::Literal(Literal::lang("chat", "fr")).to_string(), "\"chat\"@fr");
    }
}
