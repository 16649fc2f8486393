//! One validation run, end to end.
//!
//! [`Validator::validate`] ingests credential documents, asserts the trusted
//! anchors, runs the rule catalog, and resolves every passport into a
//! [`VerificationReport`]. The populated [`FactStore`] is handed back with the
//! report so it can be exported.

use serde::{Deserialize, Serialize};

use crate::engine::{InferenceRun, RuleEngine};
use crate::ingest::{ingest, CredentialDocument, IngestFailure, JsonNormalizer, Normalizer};
use crate::resolver::{self, IssuerStatus, Product, TrustAnchors};
use crate::rule::RuleCatalog;
use crate::store::FactStore;

/// Overall status of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every rule ran.
    Success,
    /// A rule failed; the store holds only what was derived before it.
    Partial { rule: String, error: String },
    /// Nothing could be ingested, so inference never ran.
    Fatal { reason: String },
    /// A snapshot was resolved without a record of the run that produced it.
    Unrecorded,
}

/// Trust status of one product passport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassportReport {
    pub id: String,
    pub products: Vec<String>,
    pub issuers: Vec<IssuerStatus>,
    pub unattested_issuers: Vec<String>,
}

/// Claim counts across the whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub products: usize,
    pub claims: usize,
    pub verified_claims: usize,
    pub unattested_issuers: usize,
}

/// Everything a validation run concluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// UUIDv7 identifying this run.
    pub run_id: String,
    /// RFC 3339 timestamp of when the run started.
    pub checked_at: String,
    pub status: RunStatus,
    pub loaded: Vec<String>,
    pub ingest_failures: Vec<IngestFailure>,
    pub inference: InferenceRun,
    pub products: Vec<Product>,
    pub passports: Vec<PassportReport>,
    pub summary: Summary,
}

impl VerificationReport {
    /// `true` only when the run completed cleanly, every document ingested,
    /// every claim is verified and every issuer is attested.
    pub fn is_valid(&self) -> bool {
        self.status == RunStatus::Success
            && self.ingest_failures.is_empty()
            && self.summary.claims == self.summary.verified_claims
            && self.summary.unattested_issuers == 0
    }
}

/// A finished run: the enriched store plus the report drawn from it.
#[derive(Debug)]
pub struct ValidationRun {
    pub store: FactStore,
    pub report: VerificationReport,
}

/// Runs the ingest → inference → resolution pipeline.
pub struct Validator {
    catalog: RuleCatalog,
    anchors: TrustAnchors,
    normalizer: Box<dyn Normalizer>,
}

impl Validator {
    /// A validator using the built-in [`JsonNormalizer`].
    pub fn new(catalog: RuleCatalog, anchors: TrustAnchors) -> Self {
        Self::with_normalizer(catalog, anchors, Box::new(JsonNormalizer::default()))
    }

    pub fn with_normalizer(
        catalog: RuleCatalog,
        anchors: TrustAnchors,
        normalizer: Box<dyn Normalizer>,
    ) -> Self {
        Self {
            catalog,
            anchors,
            normalizer,
        }
    }

    /// Validate a batch of credential documents.
    pub fn validate(&self, documents: &[CredentialDocument]) -> ValidationRun {
        let run_id = uuid::Uuid::now_v7().to_string();
        let checked_at = chrono::Utc::now().to_rfc3339();
        let span = tracing::info_span!("validate", run = %run_id, documents = documents.len());
        let _guard = span.enter();

        let mut store = FactStore::new();
        let ingested = ingest(&mut store, self.normalizer.as_ref(), documents);

        if ingested.loaded.is_empty() {
            let reason = if documents.is_empty() {
                "no credential documents supplied".to_string()
            } else {
                format!("none of {} credential documents could be ingested", documents.len())
            };
            tracing::error!(%reason, "run aborted before inference");
            let report = VerificationReport {
                run_id,
                checked_at,
                status: RunStatus::Fatal { reason },
                loaded: Vec::new(),
                ingest_failures: ingested.failures,
                inference: InferenceRun::default(),
                products: Vec::new(),
                passports: Vec::new(),
                summary: Summary::default(),
            };
            return ValidationRun { store, report };
        }

        self.anchors.assert_into(&mut store);
        let mut engine = RuleEngine::new(self.catalog.clone());
        let inference = engine.run_inferences(&mut store);

        let mut report = resolve(&store, inference);
        report.run_id = run_id;
        report.checked_at = checked_at;
        report.loaded = ingested.loaded;
        report.ingest_failures = ingested.failures;
        ValidationRun { store, report }
    }
}

/// Build a report from a loaded snapshot without re-running inference.
///
/// The status is the one the snapshot recorded, or [`RunStatus::Unrecorded`]
/// when it carries no run record.
pub fn resolve_snapshot(store: &FactStore, recorded: Option<RunStatus>) -> VerificationReport {
    let mut report = resolve(store, InferenceRun::default());
    report.status = recorded.unwrap_or(RunStatus::Unrecorded);
    report
}

/// Build a report from a store that has already been through inference.
///
/// Used directly when re-examining an exported snapshot, in which case the
/// report gets a fresh run id.
pub fn resolve(store: &FactStore, inference: InferenceRun) -> VerificationReport {
    let status = match &inference.failure {
        None => RunStatus::Success,
        Some(f) => RunStatus::Partial {
            rule: f.rule.clone(),
            error: f.error.clone(),
        },
    };

    let products = resolver::list_claims(store);
    let passports: Vec<PassportReport> = resolver::passports(store)
        .iter()
        .map(|p| {
            let id = p.lexical();
            let issuers = resolver::issuer_status(store, &id);
            PassportReport {
                products: resolver::passport_products(store, &id)
                    .into_iter()
                    .map(|product| product.id)
                    .collect(),
                unattested_issuers: issuers
                    .iter()
                    .filter(|s| !s.attested)
                    .map(|s| s.issuer.clone())
                    .collect(),
                issuers,
                id,
            }
        })
        .collect();

    let claims = products.iter().flat_map(|p| &p.claims);
    let summary = Summary {
        products: products.len(),
        claims: claims.clone().count(),
        verified_claims: claims.filter(|c| c.verified).count(),
        unattested_issuers: passports.iter().map(|p| p.unattested_issuers.len()).sum(),
    };

    VerificationReport {
        run_id: uuid::Uuid::now_v7().to_string(),
        checked_at: chrono::Utc::now().to_rfc3339(),
        status,
        loaded: Vec::new(),
        ingest_failures: Vec::new(),
        inference,
        products,
        passports,
        summary,
    }
}

// --- tests -------------------------------------------------------------------
