//! IRIs used by ingest, the default rule catalog, and the resolver.
//!
//! Credential vocabulary lives under [`UNTP`]; facts derived by inference
//! live under [`TRUST`].

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";

/// Base for credential terms; un-prefixed JSON keys expand against it.
pub const UNTP: &str = "https://test.uncefact.org/vocabulary/untp/";

pub const PRODUCT_PASSPORT: &str = "https://test.uncefact.org/vocabulary/untp/DigitalProductPassport";
pub const CONFORMITY_CREDENTIAL: &str =
    "https://test.uncefact.org/vocabulary/untp/DigitalConformityCredential";
pub const IDENTITY_ANCHOR_CREDENTIAL: &str = "https://test.uncefact.org/vocabulary/untp/DigitalIdentityAnchor";

pub const ISSUER: &str = "https://test.uncefact.org/vocabulary/untp/issuer";
pub const CREDENTIAL_SUBJECT: &str = "https://test.uncefact.org/vocabulary/untp/credentialSubject";
pub const NAME: &str = "https://test.uncefact.org/vocabulary/untp/name";
pub const CONFORMITY_CLAIM: &str = "https://test.uncefact.org/vocabulary/untp/conformityClaim";
pub const CONFORMITY_TOPIC: &str = "https://test.uncefact.org/vocabulary/untp/conformityTopic";
pub const REFERENCE_CRITERIA: &str = "https://test.uncefact.org/vocabulary/untp/referenceCriteria";

/// Namespace for inferred trust facts.
pub const TRUST: &str = "urn:trustgraph:";

pub const TRUSTED_ANCHOR: &str = "urn:trustgraph:TrustedAnchor";
/// `<claim> trust:verifiedCriterion <criterion>`, asserted in the graph of
/// the credential that verified it.
pub const VERIFIED_CRITERION: &str = "urn:trustgraph:verifiedCriterion";
pub const CLAIM_ATTESTED_BY: &str = "urn:trustgraph:claimAttestedBy";
pub const TOPIC_ATTESTED_BY: &str = "urn:trustgraph:topicAttestedBy";
pub const IDENTITY_ATTESTED_BY: &str = "urn:trustgraph:identityAttestedBy";
pub const ALL_CRITERIA_VERIFIED: &str = "urn:trustgraph:allCriteriaVerified";
pub const ANCHORED_BY: &str = "urn:trustgraph:identityAnchor";
pub const EXPLANATION: &str = "urn:trustgraph:explanation";
