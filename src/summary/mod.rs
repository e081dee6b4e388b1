//! Zip-stream aggregation: summary counters, CFOP detail rollup and
//! item-level extraction.
//!
//! All three operations share one traversal primitive that enumerates XML
//! entries inside a zip and any nested zips, bounded in depth to keep
//! archive-bomb style nesting from recursing forever. Every aggregation
//! run is computed fresh from raw bytes: byte-identical input and an
//! identical identity set always produce identical output.

use std::collections::{BTreeMap, HashSet};
use std::io::{Cursor, Read, Seek};

use roxmltree::Document;
use serde::Serialize;
use zip::ZipArchive;

use crate::core::{FiscalError, IdentitySet, ModelCode, Period, format_period, mask_identity};
use crate::extract::parse_fields;
use crate::xmlquery::{child, child_text, find_descendant, find_path, text};

/// Default bound on nested-zip recursion.
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Role of a counted document relative to the caller's identity set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Role {
    /// The caller's entity issued the document.
    Own,
    /// The caller's entity received the document.
    ThirdParty,
}

impl Role {
    /// Conventional single-letter label (P = own/próprio, T = third party).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Own => "P",
            Self::ThirdParty => "T",
        }
    }
}

/// Per-model document counts for one identity and role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModelBreakdown {
    pub nfe_55: u64,
    pub cte_57: u64,
    pub nfce_65: u64,
    pub nfse: u64,
    pub other: u64,
}

impl ModelBreakdown {
    fn bump(&mut self, model: ModelCode) {
        match model {
            ModelCode::Nfe55 => self.nfe_55 += 1,
            ModelCode::Cte57 => self.cte_57 += 1,
            ModelCode::Nfce65 => self.nfce_65 += 1,
            ModelCode::Nfse => self.nfse += 1,
            // non-accepted models are rolled into "other"
            _ => self.other += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.nfe_55 + self.cte_57 + self.nfce_65 + self.nfse + self.other
    }
}

/// Own/third-party breakdown pair for one identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoleBreakdown {
    pub own: ModelBreakdown,
    pub third_party: ModelBreakdown,
}

/// One summary row per known identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    /// Masked identity (`00.000.000/0000-00` form).
    pub identity: String,
    pub own_total: u64,
    pub third_party_total: u64,
    pub own: ModelBreakdown,
    pub third_party: ModelBreakdown,
}

/// Scalar totals across one aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryTotals {
    /// XML entries seen, parsable or not.
    pub xml_entries: u64,
    /// Documents with a model and a unique key, first occurrence only.
    pub counted_documents: u64,
    /// Subset of counted documents with an accepted fiscal model.
    pub fiscal_documents: u64,
    /// XML entries that are neither fiscal documents nor events.
    pub unknown_other: u64,
    /// Status events and number-range cancellations.
    pub events: u64,
    /// Re-occurrences of an already-seen document key.
    pub duplicates: u64,
    /// Documents where issuer and recipient are distinct identities from
    /// the caller's set.
    pub intercompany: u64,
    /// Inclusive period bounds over dated, accepted-model documents.
    pub period_min: Option<Period>,
    pub period_max: Option<Period>,
}

impl SummaryTotals {
    /// Display label for the period bounds: `MM/YYYY - MM/YYYY`, or `-`
    /// when no dated document was seen.
    pub fn period_range(&self) -> String {
        if self.period_min.is_none() && self.period_max.is_none() {
            return "-".to_string();
        }
        format!(
            "{} - {}",
            format_period(self.period_min),
            format_period(self.period_max)
        )
    }
}

/// Complete summary output: rows, per-identity drill-down and totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub rows: Vec<SummaryRow>,
    /// Masked identity → model-code counts by role.
    pub breakdown: BTreeMap<String, RoleBreakdown>,
    pub totals: SummaryTotals,
}

/// One pivot row of the CFOP detail rollup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailRow {
    pub identity: String,
    pub model: ModelCode,
    pub cfop: String,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub role: Role,
    pub count: u64,
}

/// One line item of an NF-e/NFC-e document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemRow {
    pub identity: String,
    pub model: ModelCode,
    pub date: String,
    pub role: Role,
    pub product: String,
    pub ncm: String,
    pub unit: String,
    pub cfop: String,
    pub key: String,
    pub item_number: String,
    pub issuer: String,
    pub recipient: String,
}

fn open_zip<R: Read + Seek>(reader: R) -> Result<ZipArchive<R>, FiscalError> {
    ZipArchive::new(reader)
        .map_err(|e| FiscalError::Archive(format!("failed to open zip archive: {e}")))
}

/// Recursively visit every `.xml` entry in `zip`, descending into nested
/// `.zip` entries down to `max_depth` additional levels. Unreadable
/// entries and unopenable nested zips are skipped.
pub(crate) fn for_each_xml_in_zip<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    max_depth: usize,
    visit: &mut dyn FnMut(&str, &[u8]),
) {
    for index in 0..zip.len() {
        let Ok(mut entry) = zip.by_index(index) else {
            continue;
        };
        let name = entry.name().to_string();
        let lower = name.to_ascii_lowercase();

        if lower.ends_with(".xml") {
            let mut buf = Vec::new();
            if entry.read_to_end(&mut buf).is_ok() {
                visit(&name, &buf);
            }
        } else if lower.ends_with(".zip") && max_depth > 0 {
            let mut buf = Vec::new();
            if entry.read_to_end(&mut buf).is_err() {
                continue;
            }
            if let Ok(mut inner) = ZipArchive::new(Cursor::new(buf)) {
                for_each_xml_in_zip(&mut inner, max_depth - 1, visit);
            }
        }
    }
}

/// Summarize every XML in a zip stream against the caller's identity set.
///
/// Fails only when the top-level container is not a readable zip;
/// everything below that is a per-document soft failure.
pub fn summarize<R: Read + Seek>(
    reader: R,
    identities: &IdentitySet,
) -> Result<Summary, FiscalError> {
    let mut zip = open_zip(reader)?;
    let zip = &mut zip;
    let mut counters: BTreeMap<String, RoleBreakdown> = identities
        .iter()
        .map(|id| (id.to_string(), RoleBreakdown::default()))
        .collect();
    let mut totals = SummaryTotals::default();
    let mut seen_keys: HashSet<String> = HashSet::new();

    for_each_xml_in_zip(zip, DEFAULT_MAX_DEPTH, &mut |_name, bytes| {
        totals.xml_entries += 1;
        let fields = parse_fields(bytes);

        let model = match fields.model {
            Some(ModelCode::Event) | Some(ModelCode::Cancellation) => {
                totals.events += 1;
                return;
            }
            Some(model) => model,
            None => return,
        };
        let Some(key) = fields.key else {
            return;
        };
        if !seen_keys.insert(key) {
            totals.duplicates += 1;
            return;
        }
        totals.counted_documents += 1;

        if model.is_accepted() {
            totals.fiscal_documents += 1;
            if let Some(period) = fields.period {
                totals.period_min = Some(totals.period_min.map_or(period, |p| p.min(period)));
                totals.period_max = Some(totals.period_max.map_or(period, |p| p.max(period)));
            }
        }

        let issuer = fields.issuer.as_deref();
        let recipient = fields.recipient.as_deref();

        if let (Some(issuer), Some(recipient)) = (issuer, recipient) {
            if issuer != recipient
                && identities.contains(issuer)
                && identities.contains(recipient)
            {
                totals.intercompany += 1;
            }
        }

        // Issuer match takes priority: an intercompany document counts
        // once, under the issuer's Own breakdown.
        let (role, identity) = if issuer.is_some_and(|id| identities.contains(id)) {
            (Role::Own, issuer.map(str::to_string))
        } else if recipient.is_some_and(|id| identities.contains(id)) {
            (Role::ThirdParty, recipient.map(str::to_string))
        } else {
            return;
        };
        let Some(counter) = identity.and_then(|id| counters.get_mut(&id)) else {
            return;
        };
        match role {
            Role::Own => counter.own.bump(model),
            Role::ThirdParty => counter.third_party.bump(model),
        }
    });

    totals.unknown_other = totals
        .xml_entries
        .saturating_sub(totals.fiscal_documents)
        .saturating_sub(totals.events);

    let rows = counters
        .iter()
        .map(|(identity, counter)| SummaryRow {
            identity: mask_identity(identity),
            own_total: counter.own.total(),
            third_party_total: counter.third_party.total(),
            own: counter.own,
            third_party: counter.third_party,
        })
        .collect();
    let breakdown = counters
        .into_iter()
        .map(|(identity, counter)| (mask_identity(&identity), counter))
        .collect();

    Ok(Summary {
        rows,
        breakdown,
        totals,
    })
}

/// Pivot accepted, non-duplicate documents into counts per
/// (identity, model, CFOP, month, year, role).
pub fn detail_rollup<R: Read + Seek>(
    reader: R,
    identities: &IdentitySet,
) -> Result<Vec<DetailRow>, FiscalError> {
    let mut zip = open_zip(reader)?;
    let zip = &mut zip;
    type Key = (String, ModelCode, String, Option<u32>, Option<i32>, Role);
    let mut groups: BTreeMap<Key, u64> = BTreeMap::new();
    let mut seen_keys: HashSet<String> = HashSet::new();

    for_each_xml_in_zip(zip, DEFAULT_MAX_DEPTH, &mut |_name, bytes| {
        let fields = parse_fields(bytes);
        let Some(model) = fields.model.filter(|m| m.is_accepted()) else {
            return;
        };
        let Some(key) = fields.key else {
            return;
        };
        if !seen_keys.insert(key) {
            return;
        }

        let cfop = extract_cfop(bytes).unwrap_or_default();

        let issuer = fields.issuer.as_deref();
        let recipient = fields.recipient.as_deref();
        let (role, identity) = if issuer.is_some_and(|id| identities.contains(id)) {
            (Role::Own, issuer.unwrap_or_default())
        } else if recipient.is_some_and(|id| identities.contains(id)) {
            (Role::ThirdParty, recipient.unwrap_or_default())
        } else {
            return;
        };

        let (year, month) = fields
            .period
            .map_or((None, None), |p| (Some(p.year), Some(p.month)));
        *groups
            .entry((
                mask_identity(identity),
                model,
                cfop,
                month,
                year,
                role,
            ))
            .or_insert(0) += 1;
    });

    Ok(groups
        .into_iter()
        .map(|((identity, model, cfop, month, year, role), count)| DetailRow {
            identity,
            model,
            cfop,
            month,
            year,
            role,
            count,
        })
        .collect())
}

/// CFOP resolution: NF-e item level first, then CT-e header level, with
/// local-name matching covering the namespace-less fallback.
fn extract_cfop(bytes: &[u8]) -> Option<String> {
    let text_owned = String::from_utf8_lossy(bytes);
    let doc = Document::parse(&text_owned).ok()?;
    let root = doc.root_element();

    find_path(root, &["det", "prod", "CFOP"])
        .and_then(text)
        .or_else(|| find_path(root, &["infCTe", "ide", "CFOP"]).and_then(text))
}

/// Extract one row per NF-e/NFC-e line item, deduplicated by
/// (document key, item sequence number).
pub fn item_extract<R: Read + Seek>(
    reader: R,
    identities: &IdentitySet,
) -> Result<Vec<ItemRow>, FiscalError> {
    let mut zip = open_zip(reader)?;
    let zip = &mut zip;
    let mut rows = Vec::new();
    let mut seen_items: HashSet<(String, String)> = HashSet::new();

    for_each_xml_in_zip(zip, DEFAULT_MAX_DEPTH, &mut |_name, bytes| {
        let fields = parse_fields(bytes);
        if !matches!(fields.model, Some(ModelCode::Nfe55) | Some(ModelCode::Nfce65)) {
            return;
        }
        let Some(key) = fields.key else {
            return;
        };

        let text_owned = String::from_utf8_lossy(bytes);
        let Ok(doc) = Document::parse(&text_owned) else {
            return;
        };

        let issuer = fields.issuer.as_deref();
        let recipient = fields.recipient.as_deref();
        let (role, identity) = if issuer.is_some_and(|id| identities.contains(id)) {
            (Role::Own, issuer.unwrap_or_default())
        } else if recipient.is_some_and(|id| identities.contains(id)) {
            (Role::ThirdParty, recipient.unwrap_or_default())
        } else {
            return;
        };

        let Some(inf) = find_descendant(doc.root_element(), "infNFe") else {
            return;
        };
        for det in inf
            .descendants()
            .filter(|n| crate::xmlquery::local_name_eq(*n, "det"))
        {
            let Some(prod) = child(det, "prod") else {
                continue;
            };
            let item_number = det.attribute("nItem").unwrap_or_default().to_string();
            if !seen_items.insert((key.clone(), item_number.clone())) {
                continue;
            }

            rows.push(ItemRow {
                identity: mask_identity(identity),
                model: fields.model.unwrap_or(ModelCode::Other),
                date: fields.date.clone(),
                role,
                product: child_text(prod, "xProd").unwrap_or_default(),
                ncm: child_text(prod, "NCM").unwrap_or_default(),
                unit: child_text(prod, "uCom").unwrap_or_default(),
                cfop: child_text(prod, "CFOP").unwrap_or_default(),
                key: key.clone(),
                item_number,
                issuer: mask_identity(issuer.unwrap_or_default()),
                recipient: mask_identity(recipient.unwrap_or_default()),
            });
        }
    });

    Ok(rows)
}
