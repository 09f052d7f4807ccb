//! Aggregated results of multi-step operations.
//!
//! Multi-item creation and cascading deletes keep going past individual
//! failures. A [`BatchReport`] collects each step so the user sees exactly
//! which items succeeded and which did not.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchItem {
    Succeeded { label: String },
    Failed { label: String, error: String },
}

/// Per-item outcome list for one batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    title: String,
    items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
        }
    }

    pub fn succeed(&mut self, label: impl Into<String>) {
        self.items.push(BatchItem::Succeeded {
            label: label.into(),
        });
    }

    pub fn fail(&mut self, label: impl Into<String>, error: impl fmt::Display) {
        self.items.push(BatchItem::Failed {
            label: label.into(),
            error: error.to_string(),
        });
    }

    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub fn successes(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i, BatchItem::Succeeded { .. }))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.items.len() - self.successes()
    }

    /// Some but not all steps failed.
    pub fn is_partial_failure(&self) -> bool {
        self.failures() > 0 && self.successes() > 0
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "{}: {} succeeded, {} failed",
            self.title,
            self.successes(),
            self.failures()
        );
        for item in &self.items {
            match item {
                BatchItem::Succeeded { label } => {
                    out.push_str(&format!("\n✅ {label}"));
                }
                BatchItem::Failed { label, error } => {
                    out.push_str(&format!("\n❌ {label}: {error}"));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_lists_every_item_in_order() {
        let mut report = BatchReport::new("Created channels");
        report.succeed("#alpha");
        report.fail("#beta", "Missing permission to manage channels");
        report.succeed("#gamma");

        assert_eq!(report.successes(), 2);
        assert_eq!(report.failures(), 1);
        assert!(report.is_partial_failure());

        let text = report.render();
        assert!(text.starts_with("Created channels: 2 succeeded, 1 failed"));
        let lines: Vec<&str> = text.lines().skip(1).collect();
        assert_eq!(
            lines,
            vec![
                "✅ #alpha",
                "❌ #beta: Missing permission to manage channels",
                "✅ #gamma"
            ]
        );
    }

    #[test]
    fn all_failed_is_not_partial() {
        let mut report = BatchReport::new("x");
        report.fail("a", "nope");
        assert!(!report.is_partial_failure());
        assert_eq!(report.failures(), 1);
    }
}
