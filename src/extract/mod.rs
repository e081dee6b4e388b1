//! Fiscal XML field extraction.
//!
//! Turns one document's raw bytes into the normalized tuple every other
//! stage consumes: issuer/recipient identity, model code, unique key and
//! emission period. Pure and filesystem-free so it can run over thousands
//! of in-memory archive entries.
//!
//! Dialect tolerance is the whole point here: the same logical document
//! arrives namespaced (NF-e, CT-e), namespace-less (legacy portal
//! exports), SOAP-wrapped (NFSe webservices) or as a status notice with no
//! commercial content at all. Lookup order mirrors that reality: NFSe
//! probe first, then the `infNFe`/`infCTe` core block by local name, then
//! event/cancellation markers on the root.

use roxmltree::{Document, Node};
use serde::Serialize;

use crate::core::{ModelCode, Period, digits};
use crate::nfse;
use crate::xmlquery::{child_text, find_descendant};

/// NF-e / NFC-e schema namespace.
pub const NFE_NAMESPACE: &str = "http://www.portalfiscal.inf.br/nfe";
/// CT-e schema namespace.
pub const CTE_NAMESPACE: &str = "http://www.portalfiscal.inf.br/cte";

/// Normalized fields of one fiscal document. Transient: produced per
/// entry, consumed by classification or aggregation, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentFields {
    /// Issuer identity, digit-only (CNPJ preferred, CPF fallback).
    pub issuer: Option<String>,
    /// Recipient identity, digit-only.
    pub recipient: Option<String>,
    /// Classified model; `None` when the document matches no known shape.
    pub model: Option<ModelCode>,
    /// Unique document key: the 44-digit access key for NF-e/CT-e, a
    /// `NFSE|issuer|number|verification` composite for NFSe.
    pub key: Option<String>,
    /// Emission (or competence) year/month when extractable.
    pub period: Option<Period>,
    /// Emission date as an ISO string, empty when unknown.
    pub date: String,
}

impl DocumentFields {
    fn event(model: ModelCode) -> Self {
        Self {
            model: Some(model),
            ..Self::default()
        }
    }
}

/// Extract [`DocumentFields`] from raw XML bytes.
///
/// Never fails: an unparsable document yields the all-`None` default.
pub fn parse_fields(xml: &[u8]) -> DocumentFields {
    // Permissive decode: many portal exports are not strictly UTF-8.
    let text = String::from_utf8_lossy(xml);

    if let Some(record) = nfse::detect_and_parse(&text) {
        return fields_from_nfse(&record);
    }

    let Ok(doc) = Document::parse(&text) else {
        return DocumentFields::default();
    };
    let root = doc.root_element();

    // Core info block: prefer NF-e over CT-e, match by local name so the
    // namespaced and namespace-less dialects take the same path.
    let Some(inf) = find_descendant(root, "infNFe").or_else(|| find_descendant(root, "infCTe"))
    else {
        let root_name = root.tag_name().name().to_ascii_lowercase();
        if root_name.contains("evento") {
            return DocumentFields::event(ModelCode::Event);
        }
        if root_name.contains("inut") {
            return DocumentFields::event(ModelCode::Cancellation);
        }
        return DocumentFields::default();
    };

    let ide = find_descendant(inf, "ide");
    let model = ide
        .and_then(|ide| child_text(ide, "mod"))
        .map(|code| ModelCode::from_code(&code));

    let issuer = party_identity(inf, "emit");
    let recipient = party_identity(inf, "dest");
    let key = document_key(root, inf, &text);

    let (period, date) = ide
        .and_then(|ide| child_text(ide, "dhEmi").or_else(|| child_text(ide, "dEmi")))
        .map(|raw| parse_emission_date(&raw))
        .unwrap_or((None, String::new()));

    DocumentFields {
        issuer,
        recipient,
        model,
        key,
        period,
        date,
    }
}

fn fields_from_nfse(record: &nfse::NfseRecord) -> DocumentFields {
    let issuer = digits(record.provider_id.as_deref().unwrap_or_default());
    let recipient = digits(record.client_id.as_deref().unwrap_or_default());
    let number = record.number.clone().unwrap_or_default();
    let verification = record.verification_code.clone().unwrap_or_default();
    let key = format!("NFSE|{issuer}|{number}|{verification}");

    let reference = record.competence.or(record.emission_date);

    DocumentFields {
        issuer: (!issuer.is_empty()).then_some(issuer),
        recipient: (!recipient.is_empty()).then_some(recipient),
        model: Some(ModelCode::Nfse),
        key: Some(key),
        period: reference.map(|d| {
            use chrono::Datelike;
            Period::new(d.year(), d.month())
        }),
        date: reference.map(|d| d.to_string()).unwrap_or_default(),
    }
}

fn party_identity(inf: Node, party: &str) -> Option<String> {
    let node = find_descendant(inf, party)?;
    let raw = child_text(node, "CNPJ").or_else(|| child_text(node, "CPF"))?;
    let id = digits(&raw);
    (!id.is_empty()).then_some(id)
}

/// Unique key resolution: protocol-stamped access key, then the core
/// block's `Id` attribute with its `NFe`/`CTe` prefix stripped, then any
/// standalone 44-digit run in the serialized document.
fn document_key(root: Node, inf: Node, text: &str) -> Option<String> {
    if let Some(key) = find_descendant(root, "chNFe")
        .or_else(|| find_descendant(root, "chCTe"))
        .and_then(crate::xmlquery::text)
    {
        return Some(key);
    }

    if let Some(id) = inf.attribute("Id") {
        let stripped = id
            .replace("NFe", "")
            .replace("nfe", "")
            .replace("CTe", "")
            .replace("cte", "")
            .trim()
            .to_string();
        if !stripped.is_empty() {
            return Some(stripped);
        }
    }

    find_digit_run(text, 44)
}

/// First window of `len` consecutive ASCII digits in `text`.
fn find_digit_run(text: &str, len: usize) -> Option<String> {
    let bytes = text.as_bytes();
    let mut run_start = None;
    for (i, b) in bytes.iter().enumerate() {
        if b.is_ascii_digit() {
            let start = *run_start.get_or_insert(i);
            if i + 1 - start == len {
                return Some(text[start..=i].to_string());
            }
        } else {
            run_start = None;
        }
    }
    None
}

/// Emission date parsing: ISO-8601 first (with or without offset), then a
/// permissive digit-group fallback that recovers `yyyy[-/]mm[-/]dd` with
/// an optional day (missing day becomes the 1st).
fn parse_emission_date(raw: &str) -> (Option<Period>, String) {
    use chrono::Datelike;

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return (None, String::new());
    }

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&trimmed.replace('Z', "+00:00")) {
        let date = dt.date_naive();
        return (
            Some(Period::new(date.year(), date.month())),
            date.to_string(),
        );
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return (
            Some(Period::new(date.year(), date.month())),
            date.to_string(),
        );
    }
    // char-boundary safe truncation; date text is caller-supplied bytes
    let head = trimmed.get(..19).unwrap_or(trimmed);
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(head, "%Y-%m-%dT%H:%M:%S") {
        let date = dt.date();
        return (
            Some(Period::new(date.year(), date.month())),
            date.to_string(),
        );
    }

    fallback_year_month(trimmed)
}

fn fallback_year_month(raw: &str) -> (Option<Period>, String) {
    // Collect leading digit groups, tolerating '-' and '/' separators.
    let mut groups = String::new();
    for ch in raw.chars() {
        if ch.is_ascii_digit() {
            groups.push(ch);
        } else if ch == '-' || ch == '/' {
            continue;
        } else {
            break;
        }
        if groups.len() == 8 {
            break;
        }
    }
    if groups.len() < 6 {
        return (None, String::new());
    }

    let year: i32 = match groups[0..4].parse() {
        Ok(y) => y,
        Err(_) => return (None, String::new()),
    };
    let month: u32 = match groups[4..6].parse() {
        Ok(m) => m,
        Err(_) => return (None, String::new()),
    };
    let day: u32 = if groups.len() >= 8 {
        groups[6..8].parse().unwrap_or(1)
    } else {
        1
    };

    (
        Some(Period::new(year, month)),
        format!("{year:04}-{month:02}-{day:02}"),
    )
}
