//! Structural summary extraction: type names, function names, and imports.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Parser};

use crate::languages::{Lang, detect_language};

/// Names declared in a source file, in order of first appearance, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralSummary {
    /// Type-level definitions: classes, structs, enums, traits, interfaces.
    pub classes: Vec<String>,
    /// Functions and methods at any nesting depth.
    pub functions: Vec<String>,
    /// Imported module paths.
    pub imports: Vec<String>,
}

impl StructuralSummary {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.functions.is_empty() && self.imports.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StructureError {
    #[error("no grammar available for {0}")]
    NoGrammar(String),

    #[error("set_language failed: {0}")]
    Language(String),

    #[error("parser returned no tree")]
    NoTree,

    /// The source parsed with error nodes; the summary would be unreliable.
    #[error("syntax error near line {line}")]
    Syntax { line: usize },
}

/// Summarize `source` using the grammar picked from `path`'s extension.
///
/// Returns `Ok(None)` when the extension maps to no known language.
///
/// # Errors
///
/// Returns an error if the grammar is unavailable or the source does not parse cleanly.
pub fn summarize_path(
    path: &Path,
    source: &str,
) -> Result<Option<StructuralSummary>, StructureError> {
    // Languages compiled without a grammar are treated like unknown extensions.
    match detect_language(path).filter(|lang| lang.grammar().is_some()) {
        Some(lang) => extract_summary(source, lang).map(Some),
        None => Ok(None),
    }
}

/// Parse `source` and collect declared names over the whole tree.
///
/// # Errors
///
/// Returns an error if the grammar is unavailable or the tree contains syntax errors.
pub fn extract_summary(source: &str, lang: Lang) -> Result<StructuralSummary, StructureError> {
    let grammar = lang
        .grammar()
        .ok_or_else(|| StructureError::NoGrammar(lang.id().to_owned()))?;
    let mut parser = Parser::new();
    parser
        .set_language(&grammar)
        .map_err(|e| StructureError::Language(e.to_string()))?;
    let tree = parser.parse(source, None).ok_or(StructureError::NoTree)?;
    let root = tree.root_node();

    if root.has_error() {
        return Err(StructureError::Syntax {
            line: first_error_line(root),
        });
    }

    let mut summary = StructuralSummary::default();
    let mut cursor = root.walk();
    'walk: loop {
        collect_node(&cursor.node(), source, lang, &mut summary);
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                continue 'walk;
            }
            if !cursor.goto_parent() {
                break 'walk;
            }
        }
    }

    Ok(summary)
}

fn collect_node(node: &Node, source: &str, lang: Lang, summary: &mut StructuralSummary) {
    let kind = node.kind();
    if lang.type_node_kinds().contains(&kind) {
        if let Some(name) = field_text(node, "name", source) {
            push_unique(&mut summary.classes, name);
        }
    } else if lang.function_node_kinds().contains(&kind) {
        if let Some(name) = field_text(node, "name", source) {
            push_unique(&mut summary.functions, name);
        }
    } else {
        for import in import_names(node, source, lang) {
            push_unique(&mut summary.imports, import);
        }
    }
}

fn import_names(node: &Node, source: &str, lang: Lang) -> Vec<String> {
    match (lang, node.kind()) {
        (Lang::Python, "import_statement") => {
            let count = u32::try_from(node.named_child_count()).unwrap_or(u32::MAX);
            (0..count)
                .filter_map(|i| node.named_child(i))
                .filter_map(|child| match child.kind() {
                    "dotted_name" => Some(source[child.byte_range()].to_owned()),
                    "aliased_import" => field_text(&child, "name", source),
                    _ => None,
                })
                .collect()
        }
        (Lang::Python, "import_from_statement") => field_text(node, "module_name", source)
            .map(|m| m.trim_start_matches('.').to_owned())
            .filter(|m| !m.is_empty())
            .into_iter()
            .collect(),
        (Lang::Rust, "use_declaration") => field_text(node, "argument", source)
            .into_iter()
            .collect(),
        (Lang::JavaScript | Lang::TypeScript | Lang::Tsx, "import_statement")
        | (Lang::Go, "import_spec") => {
            let field = if lang == Lang::Go { "path" } else { "source" };
            field_text(node, field, source)
                .map(|s| s.trim_matches(['"', '\'', '`']).to_owned())
                .into_iter()
                .collect()
        }
        _ => Vec::new(),
    }
}

fn field_text(node: &Node, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| source[n.byte_range()].to_owned())
}

fn push_unique(names: &mut Vec<String>, name: String) {
    if !names.contains(&name) {
        names.push(name);
    }
}

fn first_error_line(root: Node) -> usize {
    let mut cursor = root.walk();
    'walk: loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return node.start_position().row + 1;
        }
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                continue 'walk;
            }
            if !cursor.goto_parent() {
                break 'walk;
            }
        }
    }
    root.start_position().row + 1
}
