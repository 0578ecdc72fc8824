//! Language detection and tree-sitter grammar registry.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Language with a tree-sitter grammar used for structural summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Python,
    Rust,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
}

impl Lang {
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Rust => "rust",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Go => "go",
        }
    }

    /// Get the tree-sitter grammar. Returns `None` if the
    /// corresponding feature is not enabled.
    #[must_use]
    pub fn grammar(self) -> Option<tree_sitter::Language> {
        match self {
            #[cfg(feature = "lang-python")]
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            #[cfg(feature = "lang-rust")]
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            #[cfg(feature = "lang-js")]
            Self::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            #[cfg(feature = "lang-go")]
            Self::Go => Some(tree_sitter_go::LANGUAGE.into()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Node kinds reported on the `Classes:` line (type-level definitions).
    #[must_use]
    pub fn type_node_kinds(self) -> &'static [&'static str] {
        match self {
            Self::Python => &["class_definition"],
            Self::Rust => &["struct_item", "enum_item", "trait_item", "union_item"],
            Self::JavaScript => &["class_declaration"],
            Self::TypeScript | Self::Tsx => &[
                "class_declaration",
                "abstract_class_declaration",
                "interface_declaration",
            ],
            Self::Go => &["type_spec"],
        }
    }

    /// Node kinds reported on the `Functions:` line, methods included.
    #[must_use]
    pub fn function_node_kinds(self) -> &'static [&'static str] {
        match self {
            Self::Python => &["function_definition"],
            Self::Rust => &["function_item", "function_signature_item"],
            Self::JavaScript | Self::TypeScript | Self::Tsx => &[
                "function_declaration",
                "generator_function_declaration",
                "method_definition",
            ],
            Self::Go => &["function_declaration", "method_declaration"],
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Detect language from file extension.
#[must_use]
pub fn detect_language(path: &Path) -> Option<Lang> {
    let ext = path.extension()?.to_str()?;
    match ext {
        "py" | "pyi" => Some(Lang::Python),
        "rs" => Some(Lang::Rust),
        "js" | "jsx" | "mjs" | "cjs" => Some(Lang::JavaScript),
        "ts" | "mts" | "cts" => Some(Lang::TypeScript),
        "tsx" => Some(Lang::Tsx),
        "go" => Some(Lang::Go),
        _ => None,
    }
}
