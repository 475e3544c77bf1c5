//! Review findings returned by the LLM reviewer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity level of a finding.
///
/// Error and warning findings block the push (subject to the gate);
/// info findings are advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Custom deserializer that accepts common LLM variations.
///
/// Models sometimes answer with "critical", "major", "minor", "high" and
/// similar despite explicit instructions. Anything unrecognised normalizes
/// to `Warning`.
impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.to_lowercase().as_str() {
            "info" | "note" | "suggestion" | "low" | "minor" | "style" => Ok(Severity::Info),
            "error" | "critical" | "high" | "severe" | "blocker" | "fatal" => Ok(Severity::Error),
            _ => Ok(Severity::Warning),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl Severity {
    /// Whether a finding of this severity blocks the push.
    pub fn is_blocker(self) -> bool {
        matches!(self, Severity::Error | Severity::Warning)
    }
}

/// A specific code location (a line range in a file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub start_line: u32,
    pub end_line: u32,
}

/// A single issue found during AI code review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Path relative to the repo root.
    pub file: String,
    /// Starting line (1-based).
    pub start_line: u32,
    /// Ending line (1-based, inclusive). Zero means "not provided" on the
    /// wire and is normalized to `start_line`.
    #[serde(default)]
    pub end_line: u32,
    pub severity: Severity,
    /// What is wrong.
    pub description: String,
    /// How to fix it.
    #[serde(default)]
    pub suggestion: String,
    /// Connected code in other files, sent read-only to the fixer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_locations: Vec<Location>,
}

impl Finding {
    /// Fill defaults the wire format leaves implicit.
    pub fn normalize(&mut self) {
        if self.end_line == 0 && self.start_line > 0 {
            self.end_line = self.start_line;
        }
    }
}

/// Whether any finding is severe enough to block the push.
pub fn has_blockers(findings: &[Finding]) -> bool {
    findings.iter().any(|f| f.severity.is_blocker())
}

/// Outcome of one review call over the staged groups.
#[derive(Debug, Clone)]
pub struct ReviewResult {
    pub findings: Vec<Finding>,
    pub has_blockers: bool,
}

impl ReviewResult {
    /// Normalize the findings and compute the blocker flag once.
    pub fn from_findings(mut findings: Vec<Finding>) -> Self {
        for f in &mut findings {
            f.normalize();
        }
        let blockers = has_blockers(&findings);
        Self {
            findings,
            has_blockers: blockers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity) -> Finding {
        Finding {
            file: "src/lib.rs".into(),
            start_line: 3,
            end_line: 3,
            severity,
            description: "d".into(),
            suggestion: String::new(),
            related_locations: vec![],
        }
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn unknown_severity_normalizes_to_warning() {
        let sev: Severity = serde_json::from_str("\"catastrophic\"").unwrap();
        assert_eq!(sev, Severity::Warning);
        let sev: Severity = serde_json::from_str("\"Critical\"").unwrap();
        assert_eq!(sev, Severity::Error);
        let sev: Severity = serde_json::from_str("\"note\"").unwrap();
        assert_eq!(sev, Severity::Info);
    }

    #[test]
    fn missing_end_line_defaults_to_start_line() {
        let json = r#"{"file":"a.rs","start_line":10,"severity":"error","description":"x"}"#;
        let mut f: Finding = serde_json::from_str(json).unwrap();
        f.normalize();
        assert_eq!(f.end_line, 10);
    }

    #[test]
    fn has_blockers_law() {
        assert!(!has_blockers(&[]));
        assert!(!has_blockers(&[finding(Severity::Info)]));
        assert!(has_blockers(&[finding(Severity::Warning)]));
        assert!(has_blockers(&[finding(Severity::Error)]));
        assert!(has_blockers(&[
            finding(Severity::Info),
            finding(Severity::Error)
        ]));
    }

    #[test]
    fn review_result_computes_blockers_once() {
        let result = ReviewResult::from_findings(vec![finding(Severity::Info)]);
        assert!(!result.has_blockers);
        let result = ReviewResult::from_findings(vec![finding(Severity::Error)]);
        assert!(result.has_blockers);
    }
}
