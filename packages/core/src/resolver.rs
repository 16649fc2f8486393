//! Claim verification and issuer trust, read off an inferred store.
//!
//! Everything here is a projection: [`Product`], [`Claim`] and [`Criterion`]
//! are rebuilt from the store on every call and never written back. The
//! resolver only reads; it expects the [`RuleEngine`](crate::RuleEngine) to
//! have run so that `verifiedCriterion`, `topicAttestedBy`, `claimAttestedBy` and
//! `identityAttestedBy` facts are present.
//!
//! Credential data is untrusted, so odd shapes degrade instead of failing: a
//! criterion without a name has `name: None`, a claim without a topic has
//! `topic: None`, and a credential without an issuer is skipped with a
//! warning.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::store::FactStore;
use crate::term::{GraphName, Quad, Term};
use crate::vocab;

/// One criterion of a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Criterion {
    pub id: String,
    pub name: Option<String>,
    /// A conformity credential that verified this criterion, if any. When
    /// several did, the lexically smallest id is reported.
    pub verified_by: Option<String>,
}

/// A product claim and its verification status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claim {
    pub id: String,
    pub topic: Option<String>,
    pub verified: bool,
    pub criteria: Vec<Criterion>,
}

impl Claim {
    /// A claim with no criteria; only a topic-level attestation verifies it.
    pub fn is_simple(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn verified_criteria(&self) -> usize {
        self.criteria
            .iter()
            .filter(|c| c.verified_by.is_some())
            .count()
    }
}

/// A product named by a product passport, with its claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: String,
    pub name: Option<String>,
    pub claims: Vec<Claim>,
}

/// Trust status of one credential issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuerStatus {
    pub issuer: String,
    pub attested: bool,
    /// From the issuer to the trusted anchor, inclusive. Empty when unattested.
    pub chain: Vec<String>,
}

/// The externally trusted identities that terminate attestation chains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustAnchors(BTreeSet<String>);

impl TrustAnchors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, iri: impl Into<String>) -> bool {
        self.0.insert(iri.into())
    }

    pub fn contains(&self, iri: &str) -> bool {
        self.0.contains(iri)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Record each anchor as `<iri> rdf:type trust:TrustedAnchor`.
    ///
    /// Returns the number of new facts.
    pub fn assert_into(&self, store: &mut FactStore) -> usize {
        let quads = self.0.iter().filter_map(|iri| {
            Quad::triple(
                Term::iri(iri.clone()),
                Term::iri(vocab::RDF_TYPE),
                Term::iri(vocab::TRUSTED_ANCHOR),
            )
            .ok()
        });
        store.extend(quads)
    }
}

impl<S: Into<String>> FromIterator<S> for TrustAnchors {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Every product passport credential in the store, sorted.
pub fn passports(store: &FactStore) -> Vec<Term> {
    sorted(store.subjects(vocab::RDF_TYPE, &Term::iri(vocab::PRODUCT_PASSPORT)))
}

/// Every product of every passport, with claims and criteria.
///
/// Products are grouped by IRI; a product named by several passports appears
/// once.
pub fn list_claims(store: &FactStore) -> Vec<Product> {
    let products: BTreeSet<Term> = passports(store)
        .iter()
        .flat_map(|p| store.objects(p, vocab::CREDENTIAL_SUBJECT))
        .cloned()
        .collect();
    products.iter().map(|p| product(store, p)).collect()
}

/// The products of a single passport.
pub fn passport_products(store: &FactStore, passport: &str) -> Vec<Product> {
    sorted(store.objects(&Term::iri(passport), vocab::CREDENTIAL_SUBJECT))
        .iter()
        .map(|p| product(store, p))
        .collect()
}

fn product(store: &FactStore, id: &Term) -> Product {
    let name = first_lexical(store, id, vocab::NAME);
    if name.is_none() {
        tracing::warn!(product = %id.lexical(), "product has no name");
    }
    let claims = sorted(store.objects(id, vocab::CONFORMITY_CLAIM))
        .iter()
        .map(|c| claim(store, c))
        .collect();
    Product {
        id: id.lexical(),
        name,
        claims,
    }
}

fn claim(store: &FactStore, id: &Term) -> Claim {
    let criteria: Vec<Criterion> = sorted(store.objects(id, vocab::REFERENCE_CRITERIA))
        .iter()
        .map(|c| Criterion {
            id: c.lexical(),
            name: first_lexical(store, c, vocab::NAME),
            verified_by: verifier(store, id, c),
        })
        .collect();

    let verified = if criteria.is_empty() {
        !store.objects(id, vocab::TOPIC_ATTESTED_BY).is_empty()
    } else {
        criteria.iter().all(|c| c.verified_by.is_some())
    };

    Claim {
        id: id.lexical(),
        topic: first_lexical(store, id, vocab::CONFORMITY_TOPIC),
        verified,
        criteria,
    }
}

/// The passport plus every credential its claims depend on, transitively
/// through `claimAttestedBy` edges.
pub fn dependency_credentials(store: &FactStore, passport: &str) -> Vec<Term> {
    let start = Term::iri(passport);
    let mut visited: BTreeSet<Term> = BTreeSet::new();
    let mut queue: VecDeque<Term> = VecDeque::new();
    visited.insert(start.clone());
    queue.push_back(start);

    while let Some(credential) = queue.pop_front() {
        for subject in store.objects(&credential, vocab::CREDENTIAL_SUBJECT) {
            for claim in store.objects(subject, vocab::CONFORMITY_CLAIM) {
                for dependency in store.objects(claim, vocab::CLAIM_ATTESTED_BY) {
                    if visited.insert(dependency.clone()) {
                        queue.push_back(dependency.clone());
                    }
                }
            }
        }
    }

    visited.into_iter().collect()
}

/// Trust status of every issuer the passport depends on, sorted by issuer.
pub fn issuer_status(store: &FactStore, passport: &str) -> Vec<IssuerStatus> {
    let mut issuers: BTreeSet<Term> = BTreeSet::new();
    for credential in dependency_credentials(store, passport) {
        let found = store.objects(&credential, vocab::ISSUER);
        if found.is_empty() {
            tracing::warn!(credential = %credential.lexical(), "credential has no issuer");
        }
        issuers.extend(found.into_iter().cloned());
    }

    issuers
        .iter()
        .map(|issuer| {
            let chain = trust_chain(store, issuer);
            IssuerStatus {
                issuer: issuer.lexical(),
                attested: chain.is_some(),
                chain: chain
                    .unwrap_or_default()
                    .iter()
                    .map(Term::lexical)
                    .collect(),
            }
        })
        .collect()
}

/// Issuers the passport depends on whose identity does not trace back to a
/// trusted anchor.
pub fn unattested_issuers(store: &FactStore, passport: &str) -> Vec<String> {
    issuer_status(store, passport)
        .into_iter()
        .filter(|s| !s.attested)
        .map(|s| s.issuer)
        .collect()
}

/// The shortest path of `identityAttestedBy` hops from `issuer` to a trusted
/// anchor, or `None` if there is none.
///
/// Uses a visited set, so cyclic attestation graphs terminate; a cycle that
/// never reaches a trusted anchor yields `None`.
pub fn trust_chain(store: &FactStore, issuer: &Term) -> Option<Vec<Term>> {
    let mut parent: HashMap<Term, Term> = HashMap::new();
    let mut visited: HashSet<Term> = HashSet::new();
    let mut queue: VecDeque<Term> = VecDeque::new();

    visited.insert(issuer.clone());
    queue.push_back(issuer.clone());

    while let Some(current) = queue.pop_front() {
        if is_trusted(store, &current) {
            let mut chain = vec![current.clone()];
            let mut cursor = &current;
            while let Some(prev) = parent.get(cursor) {
                chain.push(prev.clone());
                cursor = prev;
            }
            chain.reverse();
            return Some(chain);
        }
        for attester in sorted(store.objects(&current, vocab::IDENTITY_ATTESTED_BY)) {
            if visited.insert(attester.clone()) {
                parent.insert(attester.clone(), current.clone());
                queue.push_back(attester);
            }
        }
    }
    None
}

fn is_trusted(store: &FactStore, term: &Term) -> bool {
    store.holds(term, vocab::RDF_TYPE, &Term::iri(vocab::TRUSTED_ANCHOR))
}

// Verification is per claim: the same criterion IRI cited by another
// product's claim says nothing about this one.
fn verifier(store: &FactStore, claim: &Term, criterion: &Term) -> Option<String> {
    let verifiers: BTreeSet<&str> = store
        .match_quads(
            Some(claim),
            Some(&Term::iri(vocab::VERIFIED_CRITERION)),
            Some(criterion),
            None,
        )
        .into_iter()
        .filter_map(|q| match &q.graph {
            GraphName::Named(g) => Some(g.as_str()),
            GraphName::Default => None,
        })
        .collect();
    verifiers.first().map(|g| g.to_string())
}

fn first_lexical(store: &FactStore, subject: &Term, predicate: &str) -> Option<String> {
    sorted(store.objects(subject, predicate))
        .first()
        .map(Term::lexical)
}

fn sorted(terms: Vec<&Term>) -> Vec<Term> {
    let set: BTreeSet<&Term> = terms.into_iter().collect();
    set.into_iter().cloned().collect()
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(s: &str, p: &str, o: Term) -> Quad {
        Quad::triple(Term::iri(s), Term::iri(p), o).unwrap()
    }

    fn attested_by(subject: &str, attester: &str) -> Quad {
        fact(subject, vocab::IDENTITY_ATTESTED_BY, Term::iri(attester))
    }

    fn trusted(iri: &str) -> FactStore {
        let mut store = FactStore::new();
        TrustAnchors::from_iter([iri]).assert_into(&mut store);
        store
    }

    #[test]
    fn issuer_that_is_itself_trusted() {
        let store = trusted("did:web:root");
        assert_eq!(
            trust_chain(&store, &Term::iri("did:web:root")),
            Some(vec![Term::iri("did:web:root")])
        );
    }

    #[test]
    fn transitive_chain_reaches_anchor() {
        let mut store = trusted("did:web:z");
        store.extend([attested_by("did:web:x", "did:web:y"), attested_by("did:web:y", "did:web:z")]);
        let chain = trust_chain(&store, &Term::iri("did:web:x")).unwrap();
        assert_eq!(
            chain,
            vec![Term::iri("did:web:x"), Term::iri("did:web:y"), Term::iri("did:web:z")]
        );
    }

    #[test]
    fn cycle_without_anchor_is_unattested() {
        let mut store = trusted("did:web:elsewhere");
        store.extend([attested_by("did:web:x", "did:web:y"), attested_by("did:web:y", "did:web:x")]);
        assert_eq!(trust_chain(&store, &Term::iri("did:web:x")), None);
    }

    #[test]
    fn cycle_with_exit_to_anchor_is_attested() {
        let mut store = trusted("did:web:root");
        store.extend([
            attested_by("did:web:x", "did:web:y"),
            attested_by("did:web:y", "did:web:x"),
            attested_by("did:web:y", "did:web:root"),
        ]);
        assert!(trust_chain(&store, &Term::iri("did:web:x")).is_some());
    }

    #[test]
    fn claim_without_criteria_needs_topic_attestation() {
        let mut store = FactStore::new();
        store.extend([
            fact("urn:dpp", vocab::RDF_TYPE, Term::iri(vocab::PRODUCT_PASSPORT)),
            fact("urn:dpp", vocab::CREDENTIAL_SUBJECT, Term::iri("urn:product")),
            fact("urn:product", vocab::CONFORMITY_CLAIM, Term::iri("urn:claim")),
            fact("urn:claim", vocab::CONFORMITY_TOPIC, Term::string("social.labour")),
            // a stray fact the criteria rule would derive vacuously must not count
            fact("urn:claim", vocab::ALL_CRITERIA_VERIFIED, Term::boolean(true)),
        ]);
        let products = list_claims(&store);
        assert_eq!(products.len(), 1);
        let claim = &products[0].claims[0];
        assert!(claim.is_simple());
        assert!(!claim.verified);
        assert_eq!(claim.topic.as_deref(), Some("social.labour"));

        store.insert(fact("urn:claim", vocab::TOPIC_ATTESTED_BY, Term::iri("urn:dcc")));
        assert!(list_claims(&store)[0].claims[0].verified);
    }

    #[test]
    fn criterion_verification_is_scoped_to_the_claim() {
        let mut store = FactStore::new();
        for (dpp, product, claim) in [
            ("urn:dpp:a", "urn:product:a", "urn:claim:a"),
            ("urn:dpp:b", "urn:product:b", "urn:claim:b"),
        ] {
            store.extend([
                fact(dpp, vocab::RDF_TYPE, Term::iri(vocab::PRODUCT_PASSPORT)),
                fact(dpp, vocab::CREDENTIAL_SUBJECT, Term::iri(product)),
                fact(product, vocab::CONFORMITY_CLAIM, Term::iri(claim)),
                fact(claim, vocab::REFERENCE_CRITERIA, Term::iri("urn:crit:x")),
            ]);
        }
        store.insert(
            Quad::new(
                Term::iri("urn:claim:a"),
                Term::iri(vocab::VERIFIED_CRITERION),
                Term::iri("urn:crit:x"),
                GraphName::named("urn:dcc:a"),
            )
            .unwrap(),
        );

        let products = list_claims(&store);
        let a = &products[0].claims[0];
        let b = &products[1].claims[0];
        assert_eq!(a.id, "urn:claim:a");
        assert!(a.verified);
        assert_eq!(a.criteria[0].verified_by.as_deref(), Some("urn:dcc:a"));
        assert!(!b.verified);
        assert_eq!(b.criteria[0].verified_by, None);
    }

    #[test]
    fn malformed_shapes_degrade() {
        let store = FactStore::from_quads([
            fact("urn:dpp", vocab::RDF_TYPE, Term::iri(vocab::PRODUCT_PASSPORT)),
            fact("urn:dpp", vocab::CREDENTIAL_SUBJECT, Term::iri("urn:product")),
            fact("urn:product", vocab::CONFORMITY_CLAIM, Term::iri("urn:claim")),
            fact("urn:claim", vocab::REFERENCE_CRITERIA, Term::iri("urn:crit")),
            fact("urn:claim", vocab::REFERENCE_CRITERIA, Term::iri("urn:crit")),
        ]);
        let products = list_claims(&store);
        assert_eq!(products[0].name, None);
        let claim = &products[0].claims[0];
        assert_eq!(claim.topic, None);
        assert_eq!(claim.criteria.len(), 1);
        assert_eq!(claim.criteria[0].name, None);
        assert!(!claim.verified);
        // no issuer anywhere: nothing to report, nothing panics
        assert!(unattested_issuers(&store, "urn:dpp").is_empty());
    }
}
