//! NFSe dialect detection and parsing.
//!
//! Municipal service invoices have no national schema: every city picks a
//! provider with its own XML dialect. This module routes a document to one
//! of the supported dialect parsers and normalizes the result into
//! [`NfseRecord`], where every field is best-effort optional and absence is
//! never an error.
//!
//! # Supported dialects
//!
//! - **ABRASF**: `<CompNfse>` documents, possibly wrapped in a SOAP
//!   envelope or a webservice response element ([`abrasf`]).
//! - **Municipal portal**: the `<NFe>`-rooted variant used by several
//!   city portals, with flat namespace-less tags ([`municipal`]).

mod abrasf;
mod municipal;
mod split;

pub use split::split_batch;

use chrono::NaiveDate;
use roxmltree::Document;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

use crate::xmlquery::find_descendant;

/// Normalized NFSe attributes. Built by exactly one dialect parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NfseRecord {
    /// Dialect that produced this record (`"ABRASF"`, `"MUNICIPAL_NFE"`).
    pub layout: Option<String>,

    pub number: Option<String>,
    pub series: Option<String>,
    pub verification_code: Option<String>,

    pub emission_date: Option<NaiveDate>,
    /// Competence (reference) period; preferred over the emission date for
    /// monthly grouping.
    pub competence: Option<NaiveDate>,

    /// Service provider (prestador).
    pub provider_id: Option<String>,
    pub provider_municipal_registration: Option<String>,
    pub provider_name: Option<String>,
    pub provider_city_code: Option<String>,
    pub provider_state: Option<String>,

    /// Service client (tomador).
    pub client_id: Option<String>,
    pub client_name: Option<String>,
    pub client_city_code: Option<String>,
    pub client_state: Option<String>,

    pub service_value: Option<Decimal>,
    pub tax_base: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub tax_amount: Option<Decimal>,
    pub tax_withheld: Option<bool>,

    pub description: Option<String>,
}

/// Root local names (lowercase) accepted as ABRASF wrappers when an
/// `InfNfse` block is present but the root is not `CompNfse` itself:
/// webservice response elements, batch wrappers and SOAP envelopes.
const ABRASF_WRAPPER_NAMES: &[&str] = &[
    "compnfse",
    "consultarnfserpsresposta",
    "consultarnfseresposta",
    "consultarloterpsresposta",
    "gerarnfseresposta",
    "enviarloterpsresposta",
    "recepcionarloterpsresposta",
    "listanfse",
    "nfse",
    "envelope",
];

/// Detect the NFSe dialect of `text` and parse it.
///
/// Returns `None` when the document is not a recognizable NFSe; the
/// caller then falls through to NF-e/CT-e handling.
///
/// Routing:
/// 1. root `CompNfse` → ABRASF;
/// 2. root `NFe` *without* an `infNFe` block → municipal-portal variant
///    (a real NF-e also roots at `NFe`, distinguished by `infNFe`);
/// 3. otherwise, any `InfNfse` element in the tree is accepted as ABRASF
///    if an `abrasf` substring appears in any namespace URI or the root's
///    local name is a known wrapper ([`ABRASF_WRAPPER_NAMES`]).
pub fn detect_and_parse(text: &str) -> Option<NfseRecord> {
    let doc = Document::parse(text).ok()?;
    let root = doc.root_element();
    let root_name = root.tag_name().name().to_ascii_lowercase();

    if root_name == "compnfse" {
        return abrasf::parse(&doc);
    }

    if root_name == "nfe" && find_descendant(root, "infNFe").is_none() {
        return municipal::parse(&doc);
    }

    if find_descendant(root, "InfNfse").is_some() {
        let has_abrasf_ns = doc
            .descendants()
            .filter(|n| n.is_element())
            .flat_map(|n| n.namespaces())
            .any(|ns| ns.uri().to_ascii_lowercase().contains("abrasf"));
        if has_abrasf_ns || ABRASF_WRAPPER_NAMES.contains(&root_name.as_str()) {
            return abrasf::parse(&doc);
        }
    }

    None
}

/// Parse a Brazilian-formatted decimal.
///
/// Handles both `1.234,56` (thousands dot, decimal comma) and `1234.56`
/// conventions: a comma anywhere marks the comma convention, in which case
/// dots are grouping characters.
pub(crate) fn parse_decimal_br(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.to_string()
    };
    Decimal::from_str(&normalized).ok()
}

/// Withholding flag: true iff the raw value is one of `1`, `true`, `s`
/// (case-insensitive).
pub(crate) fn parse_withholding_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "s")
}

/// Parse the date formats seen across NFSe dialects: ISO timestamps with
/// or without offset, plain ISO dates, and `dd/mm/yyyy`.
pub(crate) fn parse_nfse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim().trim_end_matches('Z');
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw.trim()) {
        return Some(dt.date_naive());
    }
    // char-boundary safe truncation; date text is caller-supplied bytes
    let head = trimmed.get(..19).unwrap_or(trimmed);
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(head, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(d) = NaiveDate::parse_from_str(head, "%Y-%m-%d") {
        return Some(d);
    }
    NaiveDate::parse_from_str(head, "%d/%m/%Y").ok()
}
