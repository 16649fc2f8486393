//! Human-readable text rendering of a [`VerificationReport`].
//!
//! The output is stable plain text for terminals and logs. It is not a
//! canonical format; the JSON serialisation of the report is the
//! machine-readable form.

use crate::resolver::{Claim, Product};
use crate::verify::{PassportReport, RunStatus, VerificationReport};

/// Render a full report.
///
/// ```text
/// trustgraph report  2 claims, 1 verified
/// ───────────────────────────────────────
///
/// PRODUCT EV battery 300Ah  <https://example.com/product/ev-300>
///   ✗ environment.emissions  1/2 criteria verified
///       ✓ BatteryAssembly  verified by urn:uuid:dcc-1
///       ✗ BatteryPackaging
///   ✓ environment.waste  2/2 criteria verified
///       ...
///
/// PASSPORT urn:uuid:dpp-1
///   ✓ did:web:maker.example  via did:web:maker.example → did:web:registry.example
///   ✗ did:web:lab.example  no attestation chain
///
/// result: INVALID
/// ```
pub fn render_report(report: &VerificationReport) -> String {
    let s = &report.summary;
    let header = format!(
        "trustgraph report  {} claim{}, {} verified",
        s.claims,
        if s.claims == 1 { "" } else { "s" },
        s.verified_claims
    );
    let rule = "─".repeat(header.chars().count());
    let mut out = format!("{header}\n{rule}\n");

    match &report.status {
        RunStatus::Success => {}
        RunStatus::Partial { rule, error } => {
            out.push_str(&format!(
                "\n! inference stopped at rule {rule}: {error}\n\
                 ! conclusions below come from a partially derived store\n"
            ));
        }
        RunStatus::Fatal { reason } => {
            out.push_str(&format!("\n! fatal: {reason}\n"));
        }
        RunStatus::Unrecorded => {
            out.push_str(
                "\n! inference status unknown: the snapshot carries no run record\n\
                 ! rerun with --infer or export with a current trustgraph\n",
            );
        }
    }

    if !report.ingest_failures.is_empty() {
        out.push_str("\nREJECTED DOCUMENTS\n");
        for f in &report.ingest_failures {
            out.push_str(&format!("  {}: {}\n", f.source, f.error));
        }
    }

    for product in &report.products {
        out.push('\n');
        out.push_str(&render_product(product));
    }

    for passport in &report.passports {
        out.push('\n');
        out.push_str(&render_passport(passport));
    }

    out.push_str(&format!(
        "\nresult: {}\n",
        if report.is_valid() { "VALID" } else { "INVALID" }
    ));
    out
}

/// Render one product with its claims and criteria.
pub fn render_product(product: &Product) -> String {
    let name = product.name.as_deref().unwrap_or("(unnamed product)");
    let mut out = format!("PRODUCT {}  <{}>\n", name, product.id);
    if product.claims.is_empty() {
        out.push_str("  (no claims)\n");
    }
    for claim in &product.claims {
        out.push_str(&render_claim(claim));
    }
    out
}

fn render_claim(claim: &Claim) -> String {
    let topic = claim.topic.as_deref().unwrap_or("(no topic)");
    let detail = if claim.is_simple() {
        "topic-level attestation".to_string()
    } else {
        format!(
            "{}/{} criteria verified",
            claim.verified_criteria(),
            claim.criteria.len()
        )
    };
    let mut out = format!("  {} {}  {}\n", mark(claim.verified), topic, detail);
    for c in &claim.criteria {
        let name = c.name.as_deref().unwrap_or(&c.id);
        match &c.verified_by {
            Some(by) => out.push_str(&format!("      {} {}  verified by {}\n", mark(true), name, by)),
            None => out.push_str(&format!("      {} {}\n", mark(false), name)),
        }
    }
    out
}

fn render_passport(passport: &PassportReport) -> String {
    let mut out = format!("PASSPORT {}\n", passport.id);
    if passport.issuers.is_empty() {
        out.push_str("  (no issuers found)\n");
    }
    for issuer in &passport.issuers {
        if issuer.attested {
            out.push_str(&format!(
                "  {} {}  via {}\n",
                mark(true),
                issuer.issuer,
                issuer.chain.join(" → ")
            ));
        } else {
            out.push_str(&format!("  {} {}  no attestation chain\n", mark(false), issuer.issuer));
        }
    }
    out
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "✗"
    }
}

// --- tests -------------------------------------------------------------------
