//! Build-wide diagnostics.
//!
//! Every stage records what it could not do into a [`BuildReport`] instead of
//! failing. The report is threaded through the build by `&mut` and printed
//! once at the end (see [`crate::output::format_report`]).

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// An image reference that did not resolve to a file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MissingImage {
    /// Path that was tried last.
    pub attempted: PathBuf,
    /// Document that referenced it.
    pub document: String,
    /// Reference text as written in the document.
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionFailure {
    pub file: String,
    pub format: String,
    pub stderr: String,
}

/// An `images/...` reference in written HTML with no file behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct DanglingImage {
    pub page: PathBuf,
    pub reference: String,
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Files written, in write order.
    pub written: Vec<PathBuf>,
    pub missing_files: Vec<String>,
    pub skipped: Vec<SkippedFile>,
    pub missing_images: BTreeSet<MissingImage>,
    /// Video id → local thumbnail destinations.
    pub videos: BTreeMap<String, BTreeSet<PathBuf>>,
    pub thumbnail_failures: Vec<String>,
    pub conversion_failures: Vec<ConversionFailure>,
    pub dangling_images: Vec<DanglingImage>,
}

impl BuildReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_written(&mut self, path: impl Into<PathBuf>) {
        self.written.push(path.into());
    }

    pub fn record_missing_file(&mut self, file: impl Into<String>) {
        self.missing_files.push(file.into());
    }

    pub fn record_skipped(&mut self, file: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(SkippedFile {
            file: file.into(),
            reason: reason.into(),
        });
    }

    pub fn record_missing_image(
        &mut self,
        attempted: impl Into<PathBuf>,
        document: impl Into<String>,
        reference: impl Into<String>,
    ) {
        self.missing_images.insert(MissingImage {
            attempted: attempted.into(),
            document: document.into(),
            reference: reference.into(),
        });
    }

    pub fn record_video(&mut self, id: impl Into<String>, destination: impl Into<PathBuf>) {
        self.videos
            .entry(id.into())
            .or_default()
            .insert(destination.into());
    }

    pub fn record_thumbnail_failure(&mut self, id: impl Into<String>) {
        self.thumbnail_failures.push(id.into());
    }

    pub fn record_conversion_failure(
        &mut self,
        file: impl Into<String>,
        format: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.conversion_failures.push(ConversionFailure {
            file: file.into(),
            format: format.into(),
            stderr: stderr.into(),
        });
    }

    pub fn record_dangling(&mut self, page: impl Into<PathBuf>, reference: impl Into<String>) {
        self.dangling_images.push(DanglingImage {
            page: page.into(),
            reference: reference.into(),
        });
    }

    /// True when nothing went wrong.
    pub fn is_clean(&self) -> bool {
        self.missing_files.is_empty()
            && self.missing_images.is_empty()
            && self.thumbnail_failures.is_empty()
            && self.conversion_failures.is_empty()
            && self.dangling_images.is_empty()
    }
}
