//! Redirect record model.

/// A stored mapping from a local-part key to destination addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectRecord {
    /// Row identifier.
    pub id: i64,
    /// Local-part key, matched case-insensitively.
    pub original: String,
    /// Comma-separated destinations. `None` or empty means unresolvable.
    pub destination: Option<String>,
}

impl RedirectRecord {
    /// Returns true if the destination is missing or empty.
    #[must_use]
    pub fn is_unresolvable(&self) -> bool {
        self.destination.as_deref().is_none_or(str::is_empty)
    }

    /// Splits the destination on commas. Entries are not trimmed.
    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        self.destination
            .as_deref()
            .filter(|d| !d.is_empty())
            .into_iter()
            .flat_map(|d| d.split(','))
    }
}
