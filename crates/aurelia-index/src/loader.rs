//! Corpus loading: walk a directory tree and turn matching files into documents.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{RagError, Result};
use crate::structure::summarize_path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// File extensions to include, without the leading dot.
    pub extensions: Vec<String>,
    /// Prepend class/function/import names parsed with tree-sitter.
    pub structural_summary: bool,
    /// Skip paths matched by `.gitignore` / `.ignore` files.
    pub respect_gitignore: bool,
    pub follow_links: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["py".into()],
            structural_summary: true,
            respect_gitignore: true,
            follow_links: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum WarningKind {
    /// The file could not be read; it is left out of the corpus.
    Unreadable(String),
    /// The file is not valid UTF-8; it is left out of the corpus.
    NotUtf8,
    /// Structural parsing failed; the file is kept with raw content only.
    StructuralParse(String),
    /// The walk failed on a directory or non-matching entry; no document was lost.
    Walk(String),
}

/// A per-file problem encountered while loading. Loading continues past all of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadWarning {
    pub path: String,
    pub kind: WarningKind,
}

impl LoadWarning {
    /// Whether the affected file was left out of the corpus.
    #[must_use]
    pub fn is_skip(&self) -> bool {
        matches!(self.kind, WarningKind::Unreadable(_) | WarningKind::NotUtf8)
    }
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WarningKind::Unreadable(reason) => write!(f, "{}: unreadable ({reason})", self.path),
            WarningKind::NotUtf8 => write!(f, "{}: not valid UTF-8", self.path),
            WarningKind::StructuralParse(reason) => {
                write!(f, "{}: structural parse failed ({reason})", self.path)
            }
            WarningKind::Walk(reason) => write!(f, "{}: walk error ({reason})", self.path),
        }
    }
}

#[derive(Debug, Default)]
pub struct LoadedCorpus {
    /// Documents in deterministic (path-sorted) order.
    pub documents: Vec<Document>,
    pub warnings: Vec<LoadWarning>,
}

impl LoadedCorpus {
    /// Number of matching files left out because they could not be read.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.warnings.iter().filter(|w| w.is_skip()).count()
    }

    /// Number of files kept without a structural summary because parsing failed.
    #[must_use]
    pub fn parse_failures(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| matches!(w.kind, WarningKind::StructuralParse(_)))
            .count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CorpusLoader {
    config: LoaderConfig,
}

impl CorpusLoader {
    #[must_use]
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Walk `root` recursively and load every file whose extension is configured.
    ///
    /// Unreadable and non-UTF-8 files are skipped with a warning. A directory with no
    /// matching files yields an empty corpus.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::RootNotFound`] if `root` is missing or not a directory.
    pub fn load(&self, root: &Path) -> Result<LoadedCorpus> {
        if !root.is_dir() {
            return Err(RagError::RootNotFound(root.to_path_buf()));
        }

        let walker = ignore::WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .ignore(self.config.respect_gitignore)
            .git_global(false)
            .parents(false)
            .require_git(false)
            .follow_links(self.config.follow_links)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut corpus = LoadedCorpus::default();

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    record(&mut corpus.warnings, self.walk_warning(root, &e));
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) || !self.matches(entry.path()) {
                continue;
            }

            let rel_path = relative_source(root, entry.path());
            if let Some(doc) = self.load_file(entry.path(), &rel_path, &mut corpus.warnings) {
                tracing::debug!(file = %rel_path, bytes = doc.text.len(), "loaded");
                corpus.documents.push(doc);
            }
        }

        tracing::info!(
            root = %root.display(),
            documents = corpus.documents.len(),
            skipped = corpus.skipped(),
            parse_failures = corpus.parse_failures(),
            "corpus loaded"
        );
        Ok(corpus)
    }

    /// A walk error on a matching file counts as an unreadable file; anything else
    /// is reported against the entry it names, or against `root`.
    fn walk_warning(&self, root: &Path, err: &ignore::Error) -> LoadWarning {
        let reason = err.to_string();
        match walk_error_path(err) {
            Some(path) if self.matches(path) => LoadWarning {
                path: relative_source(root, path),
                kind: WarningKind::Unreadable(reason),
            },
            Some(path) => LoadWarning {
                path: relative_source(root, path),
                kind: WarningKind::Walk(reason),
            },
            None => LoadWarning {
                path: root.display().to_string(),
                kind: WarningKind::Walk(reason),
            },
        }
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.config.extensions.iter().any(|want| want == ext))
    }

    fn load_file(
        &self,
        abs_path: &Path,
        rel_path: &str,
        warnings: &mut Vec<LoadWarning>,
    ) -> Option<Document> {
        let bytes = match std::fs::read(abs_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                record(
                    warnings,
                    LoadWarning {
                        path: rel_path.to_owned(),
                        kind: WarningKind::Unreadable(e.to_string()),
                    },
                );
                return None;
            }
        };
        let Ok(content) = String::from_utf8(bytes) else {
            record(
                warnings,
                LoadWarning {
                    path: rel_path.to_owned(),
                    kind: WarningKind::NotUtf8,
                },
            );
            return None;
        };

        let summary = if self.config.structural_summary {
            match summarize_path(abs_path, &content) {
                Ok(summary) => summary,
                Err(e) => {
                    record(
                        warnings,
                        LoadWarning {
                            path: rel_path.to_owned(),
                            kind: WarningKind::StructuralParse(e.to_string()),
                        },
                    );
                    None
                }
            }
        } else {
            None
        };

        Some(Document::new(rel_path.to_owned(), &content, summary))
    }
}

fn record(warnings: &mut Vec<LoadWarning>, warning: LoadWarning) {
    tracing::warn!("{warning}");
    warnings.push(warning);
}

fn walk_error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.as_path()),
        ignore::Error::Loop { child, .. } => Some(child.as_path()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            walk_error_path(err)
        }
        _ => None,
    }
}

fn relative_source(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CorpusLoader::default()
            .load(&dir.path().join("nope"))
            .unwrap_err();
        assert!(matches!(err, RagError::RootNotFound(_)));
    }

    #[test]
    fn file_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", b"x = 1\n");
        let err = CorpusLoader::default()
            .load(&dir.path().join("a.py"))
            .unwrap_err();
        assert!(matches!(err, RagError::RootNotFound(_)));
    }

    #[test]
    fn empty_directory_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = CorpusLoader::default().load(dir.path()).unwrap();
        assert!(corpus.documents.is_empty());
        assert!(corpus.warnings.is_empty());
    }

    #[test]
    fn loads_matching_files_recursively_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "pkg/zeta.py", b"z = 1\n");
        write(dir.path(), "alpha.py", b"a = 1\n");
        write(dir.path(), "pkg/beta.py", b"b = 1\n");
        write(dir.path(), "notes.txt", b"not code\n");

        let corpus = CorpusLoader::default().load(dir.path()).unwrap();
        let sources: Vec<_> = corpus.documents.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, vec!["alpha.py", "pkg/beta.py", "pkg/zeta.py"]);
    }

    fn denied(path: std::path::PathBuf) -> ignore::Error {
        ignore::Error::WithDepth {
            depth: 2,
            err: Box::new(ignore::Error::WithPath {
                path,
                err: Box::new(ignore::Error::Io(std::io::Error::from(
                    std::io::ErrorKind::PermissionDenied,
                ))),
            }),
        }
    }

    #[test]
    fn walk_errors_name_the_failing_entry() {
        let root = Path::new("/repo");
        let loader = CorpusLoader::default();

        let file = loader.walk_warning(root, &denied(root.join("pkg/broken.py")));
        assert_eq!(file.path, "pkg/broken.py");
        assert!(matches!(file.kind, WarningKind::Unreadable(_)));
        assert!(file.is_skip());

        let dir = loader.walk_warning(root, &denied(root.join("pkg/private")));
        assert_eq!(dir.path, "pkg/private");
        assert!(matches!(dir.kind, WarningKind::Walk(_)));
        assert!(!dir.is_skip());

        let other = loader.walk_warning(root, &denied(root.join("notes.txt")));
        assert!(!other.is_skip());

        let pathless = ignore::Error::Partial(vec![]);
        let unnamed = loader.walk_warning(root, &pathless);
        assert_eq!(unnamed.path, "/repo");
        assert!(!unnamed.is_skip());
    }

    #[test]
    fn invalid_utf8_is_skipped_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.py", b"def ok():\n    pass\n");
        write(dir.path(), "bad.py", &[0x66, 0xff, 0xfe, 0x0a]);

        let corpus = CorpusLoader::default().load(dir.path()).unwrap();
        assert_eq!(corpus.documents.len(), 1);
        assert_eq!(corpus.documents[0].source, "good.py");
        assert_eq!(corpus.skipped(), 1);
        assert_eq!(
            corpus.warnings[0],
            LoadWarning {
                path: "bad.py".into(),
                kind: WarningKind::NotUtf8,
            }
        );
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn syntax_error_keeps_raw_content() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "broken.py", b"def broken(:\n    pass\n");

        let corpus = CorpusLoader::default().load(dir.path()).unwrap();
        assert_eq!(corpus.documents.len(), 1);
        assert_eq!(corpus.parse_failures(), 1);
        assert_eq!(corpus.skipped(), 0);
        let doc = &corpus.documents[0];
        assert!(doc.summary.is_none());
        assert!(doc.text.contains("def broken(:"));
        assert!(!doc.text.contains("Functions:"));
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn summary_is_included_in_text() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "svc.py",
            b"import json\n\nclass Service:\n    def run(self):\n        return json.dumps({})\n",
        );

        let corpus = CorpusLoader::default().load(dir.path()).unwrap();
        let text = &corpus.documents[0].text;
        assert!(text.starts_with(
            "File: svc.py\nClasses: Service\nFunctions: run\nImports: json\n"
        ));
    }

    #[test]
    fn summary_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "svc.py", b"class Service:\n    pass\n");
        let loader = CorpusLoader::new(LoaderConfig {
            structural_summary: false,
            ..LoaderConfig::default()
        });
        let corpus = loader.load(dir.path()).unwrap();
        assert!(!corpus.documents[0].text.contains("Classes:"));
    }

    #[test]
    fn gitignore_respected_without_git_repo() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".gitignore", b"build/\n");
        write(dir.path(), "build/gen.py", b"x = 1\n");
        write(dir.path(), "src.py", b"y = 2\n");

        let corpus = CorpusLoader::default().load(dir.path()).unwrap();
        assert_eq!(corpus.documents.len(), 1);

        let loader = CorpusLoader::new(LoaderConfig {
            respect_gitignore: false,
            ..LoaderConfig::default()
        });
        assert_eq!(loader.load(dir.path()).unwrap().documents.len(), 2);
    }

    #[test]
    fn custom_extensions() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "lib.rs", b"fn main() {}\n");
        write(dir.path(), "app.py", b"pass\n");
        let loader = CorpusLoader::new(LoaderConfig {
            extensions: vec!["rs".into()],
            ..LoaderConfig::default()
        });
        let corpus = loader.load(dir.path()).unwrap();
        assert_eq!(corpus.documents.len(), 1);
        assert_eq!(corpus.documents[0].source, "lib.rs");
    }
}
