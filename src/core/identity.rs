use std::collections::BTreeSet;

/// Strip everything but ASCII digits from a taxpayer identifier.
///
/// Caller-supplied CNPJ/CPF strings arrive in arbitrary formatting
/// (`11.222.333/0001-81`, `11222333000181`, with stray whitespace); every
/// comparison in this crate happens on the digit-only form.
pub fn digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// Format a digit-only identifier for display.
///
/// 14 digits → CNPJ `00.000.000/0000-00`, 11 digits → CPF `000.000.000-00`.
/// Any other length is returned as raw digits.
pub fn mask_identity(s: &str) -> String {
    let d = digits(s);
    match d.len() {
        14 => format!(
            "{}.{}.{}/{}-{}",
            &d[0..2],
            &d[2..5],
            &d[5..8],
            &d[8..12],
            &d[12..14]
        ),
        11 => format!("{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11]),
        _ => d,
    }
}

/// An immutable set of "own" taxpayer identities used for role attribution.
///
/// Normalized to digit-only form and deduplicated on construction. Empty
/// input strings (or strings with no digits at all) are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySet {
    ids: BTreeSet<String>,
}

impl IdentitySet {
    /// Build a set from caller-declared identity strings in any formatting.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids = ids
            .into_iter()
            .map(|s| digits(s.as_ref()))
            .filter(|d| !d.is_empty())
            .collect();
        Self { ids }
    }

    /// Membership test on an already digit-normalized identifier.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Iterate identities in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}
