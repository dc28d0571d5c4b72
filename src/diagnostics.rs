use serde::Serialize;
use thiserror::Error;

use crate::parsing::LocationInfo;

/// Problems that are recovered from while decoding a file. None of them abort a parse; they are
/// logged and collected so a caller can tell a clean file from a best-effort one.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum Issue {
    #[error("Malformed directive: {0}")]
    MalformedDirective(String),

    #[error("No usable aperture for {operation}, substituted a {diameter}mm circle")]
    UnknownAperture {
        operation: &'static str,
        diameter: f64,
    },

    #[error("Aperture D{0} uses a shape that cannot be flashed, substituted a default circle")]
    UnsupportedAperture(u32),

    #[error("Degenerate arc skipped: {0}")]
    DegenerateArc(String),

    #[error("Degenerate polygon discarded")]
    DegeneratePolygon,

    #[error("Failed to read file: {0}")]
    FileUnreadable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub location: Option<LocationInfo>,
    pub issue: Issue,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}: {}", location, self.issue),
            None => write!(f, "{}", self.issue),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Record an issue and log it as a warning.
    pub fn push(&mut self, location: Option<LocationInfo>, issue: Issue) {
        let diagnostic = Diagnostic { location, issue };
        log::warn!("{}", diagnostic);
        self.entries.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn contains(&self, predicate: impl Fn(&Issue) -> bool) -> bool {
        self.entries.iter().any(|diagnostic| predicate(&diagnostic.issue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location() {
        let diagnostic = Diagnostic {
            location: Some(LocationInfo { line: 4, column: 2 }),
            issue: Issue::DegenerateArc("zero radius".into()),
        };
        assert_eq!(
            diagnostic.to_string(),
            "4:2: Degenerate arc skipped: zero radius"
        );
    }

    #[test]
    fn contains_matches_issue_kind() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.push(None, Issue::DegeneratePolygon);

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics.contains(|issue| matches!(issue, Issue::DegeneratePolygon)));
        assert!(!diagnostics.contains(|issue| matches!(issue, Issue::FileUnreadable(_))));
    }
}
