//! Failure report composition.
//!
//! A [`Report`] carries the four pieces of text a failed check produces; the
//! formatter turns them into the final message. Formatters are pluggable:
//! the default right-aligns the labels into the familiar three-line layout,
//! but a harness can supply anything that maps a `Report` to a string.

use serde::Serialize;

/// The composed pieces of one failed check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Rendered text of the sub-expression under test (e.g. `foo`).
    pub subject: String,
    /// Natural-language relation (e.g. `be`, `be greater than`).
    pub relation: String,
    /// Rendered expected text (e.g. `2`, `empty`).
    pub expected: String,
    /// Wording of the observed line's label, normally `was`.
    pub was: String,
    /// Formatted observed value (e.g. `1`, `3 items`).
    pub actual: String,
}

impl Report {
    /// A report with the default `was` wording.
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            expected: expected.into(),
            was: "was".to_string(),
            actual: actual.into(),
        }
    }
}

/// Default three-line layout.
///
/// Labels are right-aligned to a common column so the values line up:
///
/// ```text
/// Expected: foo
///    to be: 2
///  but was: 1
/// ```
pub fn default_layout(report: &Report) -> String {
    let labels = [
        "Expected:".to_string(),
        format!("to {}:", report.relation),
        format!("but {}:", report.was),
    ];
    let values = [&report.subject, &report.expected, &report.actual];
    let width = labels.iter().map(|label| label.len()).max().unwrap_or(0);

    labels
        .iter()
        .zip(values)
        .map(|(label, value)| format!("{:>width$} {}", label, value, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_alignment() {
        let report = Report::new("foo", "be", "2", "1");
        assert_eq!(
            default_layout(&report),
            "Expected: foo\n   to be: 2\n but was: 1"
        );
    }

    #[test]
    fn test_default_layout_long_relation() {
        let report = Report::new("x", "be greater than", "10", "9");
        assert_eq!(
            default_layout(&report),
            "          Expected: x\nto be greater than: 10\n           but was: 9"
        );
    }

    #[test]
    fn test_custom_was_wording() {
        let mut report = Report::new("foo", "be", "empty", "3 items");
        report.was = "had".to_string();
        let layout = default_layout(&report);
        assert!(layout.ends_with("but had: 3 items"));
    }
}
