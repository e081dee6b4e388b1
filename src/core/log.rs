use chrono::Local;

/// Append-only operation log surfaced to the caller.
///
/// Each entry is a timestamped human-readable line. The log is the primary
/// diagnostic surface for partially successful runs: every skipped or failed
/// item gets a line with the reason. Entries are display-only and never
/// parsed back.
#[derive(Debug, Clone, Default)]
pub struct OperationLog {
    entries: Vec<String>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a timestamped entry.
    pub fn push(&mut self, message: impl AsRef<str>) {
        let stamp = Local::now().format("%H:%M:%S");
        self.entries.push(format!("[{stamp}] {}", message.as_ref()));
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<String> {
        self.entries
    }
}
