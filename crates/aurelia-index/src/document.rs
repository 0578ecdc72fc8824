use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::structure::StructuralSummary;

/// Marker opening the raw file content inside a document body.
pub const CODE_START: &str = "--- CODE START ---";
/// Marker closing the raw file content inside a document body.
pub const CODE_END: &str = "--- CODE END ---";

/// One indexed source file: the composed text that gets embedded, plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Header, optional structural summary, and the full file content.
    pub text: String,
    /// Path relative to the corpus root, `/`-separated.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<StructuralSummary>,
}

impl Document {
    #[must_use]
    pub fn new(source: String, content: &str, summary: Option<StructuralSummary>) -> Self {
        let text = compose_text(&source, content, summary.as_ref());
        Self {
            text,
            source,
            summary,
        }
    }
}

/// Build the document body.
///
/// ```text
/// File: pkg/models.py
/// Classes: User, Group
/// Functions: save
/// Imports: os
/// --- CODE START ---
/// <content>
/// --- CODE END ---
/// ```
///
/// Summary lines are emitted only when non-empty.
#[must_use]
pub fn compose_text(source: &str, content: &str, summary: Option<&StructuralSummary>) -> String {
    let mut text = String::with_capacity(content.len() + source.len() + 64);
    let _ = writeln!(text, "File: {source}");
    if let Some(summary) = summary {
        for (label, names) in [
            ("Classes", &summary.classes),
            ("Functions", &summary.functions),
            ("Imports", &summary.imports),
        ] {
            if !names.is_empty() {
                let _ = writeln!(text, "{label}: {}", names.join(", "));
            }
        }
    }
    text.push_str(CODE_START);
    text.push('\n');
    text.push_str(content);
    text.push('\n');
    text.push_str(CODE_END);
    text
}
