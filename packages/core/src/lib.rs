//! Semantic trust-graph validation for digital credentials.
//!
//! This crate checks a collection of product passports, conformity
//! credentials and identity anchors as one graph. It answers two questions:
//! is every claim a product makes backed by an independent attestation of
//! each of its criteria, and does every issuer involved trace back through
//! identity anchors to someone trusted?
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`term`] | RDF terms and [`Quad`]s |
//! | [`store`] | Append-only [`FactStore`] with wildcard lookup |
//! | [`matcher`] | Backtracking conjunctive matching producing [`Bindings`] |
//! | [`builtins`] | `equalTo`, `concatenation`, `forAllIn` |
//! | [`rule`] | Typed [`Rule`]s and the ordered [`RuleCatalog`] |
//! | [`catalog`] | JSON rule-catalog format and the embedded default catalog |
//! | [`engine`] | Ordered forward chaining via [`RuleEngine`] |
//! | [`ingest`] | Credential JSON to quads via a [`Normalizer`] |
//! | [`resolver`] | Claim verification and issuer trust chains |
//! | [`snapshot`] | N-Quads export and import |
//! | [`verify`] | The full pipeline: [`Validator`] and [`VerificationReport`] |
//! | [`render`] | Plain-text report rendering |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use trustgraph::{CredentialDocument, RuleCatalog, TrustAnchors, Validator};
//!
//! let anchors = TrustAnchors::from_iter(["did:web:registry.example"]);
//! let validator = Validator::new(RuleCatalog::embedded()?, anchors);
//!
//! let docs = vec![CredentialDocument::new("dpp.json", serde_json::from_str(dpp_json)?)];
//! let run = validator.validate(&docs);
//!
//! println!("{}", trustgraph::render::render_report(&run.report));
//! std::fs::write("store.nq", trustgraph::snapshot::to_nquads(&run.store))?;
//! ```

pub mod builtins;
pub mod catalog;
pub mod engine;
pub mod ingest;
pub mod matcher;
pub mod render;
pub mod resolver;
pub mod rule;
pub mod snapshot;
pub mod store;
pub mod term;
pub mod verify;
pub mod vocab;

pub use builtins::{Builtin, BuiltinError};
pub use engine::{EngineState, InferenceRun, RuleEngine, RuleError, RuleOutcome};
pub use ingest::{CredentialDocument, IngestError, JsonNormalizer, Normalizer};
pub use matcher::{Bindings, GraphPattern, PatternTerm, QuadPattern};
pub use resolver::{
    list_claims, trust_chain, unattested_issuers, Claim, Criterion, IssuerStatus, Product,
    TrustAnchors,
};
pub use rule::{Annotation, CatalogError, Condition, Rule, RuleCatalog};
pub use snapshot::SnapshotError;
pub use store::FactStore;
pub use term::{GraphName, Literal, Quad, Term, TermError};
pub use verify::{RunStatus, ValidationRun, Validator, VerificationReport};
