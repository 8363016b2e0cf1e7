//! Content-Disposition handling (RFC 2183).

use std::collections::HashMap;

use crate::content_type::{parse_parameters, split_parameters};

/// Disposition type of a body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispositionKind {
    /// Displayed as part of the message body.
    Inline,
    /// Separate from the body; the recipient saves it.
    Attachment,
    /// Any other token, kept verbatim (lower-cased).
    Other(String),
}

impl DispositionKind {
    /// Parse from the header token.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "inline" => Self::Inline,
            "attachment" => Self::Attachment,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Parsed Content-Disposition header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition type.
    pub kind: DispositionKind,
    /// Parameters such as `filename`.
    pub parameters: HashMap<String, String>,
}

impl ContentDisposition {
    /// Parses a Content-Disposition value, e.g. `attachment; filename="a.pdf"`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let mut parts = split_parameters(s).into_iter();
        let kind = DispositionKind::parse(parts.next().unwrap_or_default());

        Self {
            kind,
            parameters: parse_parameters(parts),
        }
    }

    /// Returns true for `attachment` dispositions.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.kind == DispositionKind::Attachment
    }

    /// Returns the `filename` parameter if present.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.parameters.get("filename").map(String::as_str)
    }
}
