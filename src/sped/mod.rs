//! SPED EFD ICMS/IPI flat-file parsing.
//!
//! The EFD ledger is a pipe-delimited, line-oriented format with
//! hierarchical record blocks. This parser reconstructs the
//! header/detail/sub-detail relationships that matter for invoice
//! analysis: the `0190` unit catalog, the `0200` item catalog and a
//! denormalized join of each `C100` invoice header with its `C170` item
//! lines and `C190` CFOP-tax summaries.
//!
//! Files in the wild routinely deviate from the published layout:
//! vendor-added trailing columns, stray characters in date fields and
//! noise lines around the record block. Everything tolerable is tolerated.

use std::collections::HashSet;
use std::io::{Cursor, Read};

use chrono::NaiveDate;
use serde::Serialize;
use zip::ZipArchive;

use crate::core::FiscalError;

/// Source-filename column prepended to every table.
pub const SOURCE_COLUMN: &str = "ARQUIVO_ORIGEM";

/// Official layout of the first fields of each record type. Files may
/// carry more; overflow columns are auto-named.
const LAYOUT_0190: &[&str] = &["REG", "UNID", "DESCR"];

const LAYOUT_0200: &[&str] = &[
    "REG", "COD_ITEM", "DESCR_ITEM", "COD_BARRA", "COD_ANT_ITEM", "UNID_INV", "TIPO_ITEM",
    "COD_NCM", "EX_IPI", "COD_GEN", "COD_LST", "ALIQ_ICMS",
];

const LAYOUT_C100: &[&str] = &[
    "REG", "IND_OPER", "IND_EMIT", "COD_PART", "COD_MOD", "COD_SIT", "SER", "NUM_DOC", "CHV_NFE",
    "DT_DOC", "DT_E_S", "VL_DOC",
];

const LAYOUT_C170: &[&str] = &[
    "REG", "NUM_ITEM", "COD_ITEM", "DESCR_COMPL", "QTD", "UNID", "VL_ITEM", "VL_DESC", "IND_MOV",
    "CST_ICMS", "CFOP", "COD_NAT",
];

const LAYOUT_C190: &[&str] = &[
    "REG", "CST_ICMS", "CFOP", "ALIQ_ICMS", "VL_OPR", "VL_BC_ICMS", "VL_ICMS", "VL_BC_ICMS_ST",
    "VL_ICMS_ST", "VL_RED_BC", "VL_IPI", "COD_OBS",
];

/// Fixed width of each record half in the joined C100/C170/C190 table.
const JOIN_WIDTH: usize = 12;

/// A column-named table of string cells. Rows are padded to the column
/// count; cells are never reinterpreted after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SpedTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell lookup by column name, for tests and callers that pick out
    /// individual fields.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    /// Build a table from raw record rows using the official layout for
    /// the first fields and `{prefix}_EXTRA_{k}` names for overflow.
    fn from_records(rows: Vec<Vec<String>>, layout: &[&str], extra_prefix: &str) -> Self {
        if rows.is_empty() {
            return Self::default();
        }
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let columns = layout_columns(layout, width, extra_prefix);
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Prepend the source-filename column to every row.
    fn tag_source(&mut self, source: &str) {
        if self.is_empty() {
            return;
        }
        self.columns.insert(0, SOURCE_COLUMN.to_string());
        for row in &mut self.rows {
            row.insert(0, source.to_string());
        }
    }

    /// Append another table, widening columns as needed. Column sets are
    /// deterministic prefixes of each other (same layouts, same overflow
    /// naming), so the wider set wins and narrower rows are padded.
    fn append(&mut self, other: SpedTable) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other;
            return;
        }
        if other.columns.len() > self.columns.len() {
            self.columns = other.columns;
            let width = self.columns.len();
            for row in &mut self.rows {
                row.resize(width, String::new());
            }
        }
        let width = self.columns.len();
        for mut row in other.rows {
            row.resize(width, String::new());
            self.rows.push(row);
        }
    }
}

fn layout_columns(layout: &[&str], width: usize, extra_prefix: &str) -> Vec<String> {
    let mut columns: Vec<String> = layout
        .iter()
        .take(width)
        .map(|c| c.to_string())
        .collect();
    for k in layout.len() + 1..=width {
        columns.push(format!("{extra_prefix}_EXTRA_{k}"));
    }
    columns
}

/// The three output tables of one parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpedTables {
    /// `0190` unit catalog.
    pub units_0190: SpedTable,
    /// `0200` item catalog.
    pub items_0200: SpedTable,
    /// Denormalized `C100` + `C170` + `C190` join.
    pub invoices: SpedTable,
}

impl SpedTables {
    fn append(&mut self, other: SpedTables) {
        self.units_0190.append(other.units_0190);
        self.items_0200.append(other.items_0200);
        self.invoices.append(other.invoices);
    }
}

/// Decode SPED bytes: strict UTF-8 first, then Latin-1 (every byte maps
/// to a char, so this never fails).
fn decode_sped_bytes(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(s) => s.to_string(),
        Err(_) => data.iter().map(|&b| b as char).collect(),
    }
}

/// Parse one EFD ICMS/IPI text file.
///
/// Lines not shaped `|FIELD|FIELD|...|` are ignored as noise. A `C170` or
/// `C190` line associates with the most recent `C100`; with no open
/// header it is dropped. Rows are tagged with `source` in the
/// [`SOURCE_COLUMN`].
pub fn parse_efd_text(data: &[u8], source: &str) -> SpedTables {
    let text = decode_sped_bytes(data);

    let mut rows_0190: Vec<Vec<String>> = Vec::new();
    let mut rows_0200: Vec<Vec<String>> = Vec::new();

    let mut open_header: Option<Vec<String>> = None;
    let mut headers_seen: Vec<Vec<String>> = Vec::new();
    let mut headers_with_children: HashSet<usize> = HashSet::new();
    let mut joined_rows: Vec<Vec<String>> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || !line.starts_with('|') {
            continue;
        }
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < 3 {
            continue;
        }
        // drop the empty fields produced by the leading and trailing
        // delimiter, preserving internal empties
        let fields: Vec<String> = parts[1..parts.len() - 1]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if fields.is_empty() {
            continue;
        }

        match fields[0].to_ascii_uppercase().as_str() {
            "0190" => rows_0190.push(fields),
            "0200" => rows_0200.push(fields),
            "C100" => {
                headers_seen.push(fields.clone());
                open_header = Some(fields);
            }
            "C170" => {
                if let Some(header) = &open_header {
                    headers_with_children.insert(headers_seen.len() - 1);
                    joined_rows.push(join_row(header, Some(&fields), None));
                }
            }
            "C190" => {
                if let Some(header) = &open_header {
                    headers_with_children.insert(headers_seen.len() - 1);
                    joined_rows.push(join_row(header, None, Some(&fields)));
                }
            }
            _ => {}
        }
    }

    // headers with no item or CFOP-summary children still get one row,
    // with both halves blank
    for (index, header) in headers_seen.iter().enumerate() {
        if !headers_with_children.contains(&index) {
            joined_rows.push(join_row(header, None, None));
        }
    }

    let mut units_0190 = SpedTable::from_records(rows_0190, LAYOUT_0190, "B0190");
    let mut items_0200 = SpedTable::from_records(rows_0200, LAYOUT_0200, "B0200");
    let mut invoices = build_join_table(joined_rows);
    normalize_join_dates(&mut invoices);

    units_0190.tag_source(source);
    items_0200.tag_source(source);
    invoices.tag_source(source);

    SpedTables {
        units_0190,
        items_0200,
        invoices,
    }
}

/// One denormalized row: C100 half plus exactly one of the C170/C190
/// halves, each clamped/padded to [`JOIN_WIDTH`].
fn join_row(c100: &[String], c170: Option<&[String]>, c190: Option<&[String]>) -> Vec<String> {
    let mut row = Vec::with_capacity(JOIN_WIDTH * 3);
    push_clamped(&mut row, Some(c100));
    push_clamped(&mut row, c170);
    push_clamped(&mut row, c190);
    row
}

fn push_clamped(row: &mut Vec<String>, fields: Option<&[String]>) {
    for i in 0..JOIN_WIDTH {
        row.push(
            fields
                .and_then(|f| f.get(i))
                .cloned()
                .unwrap_or_default(),
        );
    }
}

fn build_join_table(rows: Vec<Vec<String>>) -> SpedTable {
    if rows.is_empty() {
        return SpedTable::default();
    }
    let columns: Vec<String> = LAYOUT_C100
        .iter()
        .map(|c| format!("C100_{c}"))
        .chain(LAYOUT_C170.iter().map(|c| format!("C170_{c}")))
        .chain(LAYOUT_C190.iter().map(|c| format!("C190_{c}")))
        .collect();
    SpedTable { columns, rows }
}

/// Reparse the two C100 date columns from an embedded 8-digit `DDMMYYYY`
/// run into ISO form; unparsable values become empty cells, not errors.
fn normalize_join_dates(table: &mut SpedTable) {
    for column in ["C100_DT_DOC", "C100_DT_E_S"] {
        let Some(col) = table.columns.iter().position(|c| c == column) else {
            continue;
        };
        for row in &mut table.rows {
            if let Some(cell) = row.get_mut(col) {
                *cell = normalize_ddmmyyyy(cell)
                    .map(|d| d.to_string())
                    .unwrap_or_default();
            }
        }
    }
}

/// Extract the first run of 8 consecutive digits and parse it as
/// `DDMMYYYY`, tolerating stray characters around it.
fn normalize_ddmmyyyy(raw: &str) -> Option<NaiveDate> {
    let bytes = raw.as_bytes();
    let mut start = None;
    for (i, b) in bytes.iter().enumerate() {
        if b.is_ascii_digit() {
            let s = *start.get_or_insert(i);
            if i + 1 - s == 8 {
                return NaiveDate::parse_from_str(&raw[s..=i], "%d%m%Y").ok();
            }
        } else {
            start = None;
        }
    }
    None
}

/// Parse SPED input from a text file or a zip of text files.
///
/// A `.txt` is parsed directly; a `.zip` has each contained `.txt` parsed
/// independently and concatenated, preserving entry order, each row tagged
/// with its source filename. Any other extension yields empty tables.
pub fn parse_sped_from_any(data: &[u8], filename: &str) -> Result<SpedTables, FiscalError> {
    let lower = filename.to_ascii_lowercase();

    if lower.ends_with(".txt") {
        return Ok(parse_efd_text(data, filename));
    }
    if lower.ends_with(".zip") {
        let mut archive = ZipArchive::new(Cursor::new(data))
            .map_err(|e| FiscalError::Archive(format!("failed to open SPED zip: {e}")))?;
        let mut tables = SpedTables::default();
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| FiscalError::Archive(format!("failed to read SPED zip entry: {e}")))?;
            let name = entry.name().to_string();
            if !name.to_ascii_lowercase().ends_with(".txt") {
                continue;
            }
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf)?;
            tables.append(parse_efd_text(&buf, &name));
        }
        return Ok(tables);
    }

    Ok(SpedTables::default())
}
