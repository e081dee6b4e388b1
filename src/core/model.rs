use serde::Serialize;

/// Classified kind of a fiscal document.
///
/// The numeric variants mirror the official model codes carried in the
/// `<mod>` element of NF-e/NFC-e/CT-e documents. `Event` and `Cancellation`
/// mark status notices with no commercial content; `Other` is any
/// unrecognized model code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ModelCode {
    /// NF-e, model 55.
    Nfe55,
    /// CT-e, model 57.
    Cte57,
    /// NFC-e, model 65.
    Nfce65,
    /// Municipal service invoice (no national model code).
    Nfse,
    /// Status event (`procEventoNFe` and friends).
    Event,
    /// Number-range cancellation notice (inutilização).
    Cancellation,
    /// A model code we do not recognize.
    Other,
}

impl ModelCode {
    /// Map a raw `<mod>` code to a model, normalizing unknown codes to
    /// [`ModelCode::Other`].
    pub fn from_code(raw: &str) -> Self {
        match raw.trim() {
            "55" => Self::Nfe55,
            "57" => Self::Cte57,
            "65" => Self::Nfce65,
            _ => Self::Other,
        }
    }

    /// Whether this model participates in fiscal totals and period bounds.
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Nfe55 | Self::Cte57 | Self::Nfce65 | Self::Nfse)
    }

    /// Short label used in summary rows and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nfe55 => "55",
            Self::Cte57 => "57",
            Self::Nfce65 => "65",
            Self::Nfse => "NFSE",
            Self::Event => "EVENTO",
            Self::Cancellation => "INUT",
            Self::Other => "OUT",
        }
    }
}

impl std::fmt::Display for ModelCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A year/month accounting period. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }
}

/// Format an optional period as `MM/YYYY`, or `"-"` when absent.
pub fn format_period(p: Option<Period>) -> String {
    match p {
        Some(Period { year, month }) => format!("{month:02}/{year}"),
        None => "-".to_string(),
    }
}
