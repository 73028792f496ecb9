//! Source documents → body HTML.
//!
//! Dispatch is purely on the lowercase file extension:
//!
//! | Extension | Kind | Fragments |
//! |-----------|------|-----------|
//! | `.md`, `.markdown` | [`DocumentKind::Markdown`] | one, the whole file |
//! | `.ipynb` | [`DocumentKind::Notebook`] | one per renderable cell, in stored order |
//!
//! Anything else is [`RenderOutcome::Unsupported`]; the caller logs and
//! skips it. A document whose fragments are all empty is
//! [`RenderOutcome::Empty`] and gets no page.

pub mod markdown;
pub mod notebook;

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("file not found: {0}")]
    Missing(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid notebook JSON: {0}")]
    Notebook(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Markdown,
    Notebook,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "md" | "markdown" => Some(DocumentKind::Markdown),
            "ipynb" => Some(DocumentKind::Notebook),
            _ => None,
        }
    }
}

/// One piece of body HTML.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub html: String,
    /// Source text the fragment was rendered from. Asset resolution reads
    /// it to recover video ids from links next to a thumbnail.
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub kind: DocumentKind,
    pub fragments: Vec<Fragment>,
}

impl RenderedDocument {
    /// Fragments joined in order.
    pub fn body_html(&self) -> String {
        self.fragments
            .iter()
            .map(|f| f.html.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.iter().all(|f| f.html.trim().is_empty())
    }
}

#[derive(Debug)]
pub enum RenderOutcome {
    Document(RenderedDocument),
    /// Extension is not markdown or notebook; carries the extension.
    Unsupported(String),
    /// Nothing to publish.
    Empty,
}

/// Render one source document.
pub fn render(path: &Path) -> Result<RenderOutcome, RenderError> {
    if !path.is_file() {
        return Err(RenderError::Missing(path.to_path_buf()));
    }
    let Some(kind) = DocumentKind::from_path(path) else {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Ok(RenderOutcome::Unsupported(ext));
    };
    let text = fs::read_to_string(path)?;
    let document = match kind {
        DocumentKind::Markdown => RenderedDocument {
            kind,
            fragments: vec![Fragment {
                html: markdown::to_html(&text),
                source: Some(text),
            }],
        },
        DocumentKind::Notebook => RenderedDocument {
            kind,
            fragments: notebook::render_cells(&text, &path.display().to_string())?,
        },
    };
    if document.is_empty() {
        return Ok(RenderOutcome::Empty);
    }
    Ok(RenderOutcome::Document(document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn kind_from_extension_is_case_insensitive() {
        assert_eq!(
            DocumentKind::from_path(Path::new("a/Intro.MD")),
            Some(DocumentKind::Markdown)
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("lab.ipynb")),
            Some(DocumentKind::Notebook)
        );
        assert_eq!(DocumentKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(DocumentKind::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn markdown_is_a_single_fragment() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "index.md", "# Hi\n\nSome text.\n");
        let RenderOutcome::Document(doc) = render(&path).unwrap() else {
            panic!("expected a document");
        };
        assert_eq!(doc.kind, DocumentKind::Markdown);
        assert_eq!(doc.fragments.len(), 1);
        assert!(doc.body_html().contains("<h1>Hi</h1>"));
        assert_eq!(doc.fragments[0].source.as_deref(), Some("# Hi\n\nSome text.\n"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let result = render(&tmp.path().join("gone.md"));
        assert!(matches!(result, Err(RenderError::Missing(_))));
    }

    #[test]
    fn unsupported_extension_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "data.csv", "a,b\n");
        assert!(matches!(
            render(&path).unwrap(),
            RenderOutcome::Unsupported(ext) if ext == "csv"
        ));
    }

    #[test]
    fn blank_markdown_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "blank.md", "\n\n");
        assert!(matches!(render(&path).unwrap(), RenderOutcome::Empty));
    }

    #[test]
    fn notebook_without_cells_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "empty.ipynb", r#"{"cells": [], "nbformat": 4}"#);
        assert!(matches!(render(&path).unwrap(), RenderOutcome::Empty));
    }

    #[test]
    fn malformed_notebook_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "broken.ipynb", "{ not json");
        assert!(matches!(render(&path), Err(RenderError::Notebook(_))));
    }
}
