//! Shared test utilities for the coursebook test suite.
//!
//! Provides fixture setup, recording doubles for external tools and
//! thumbnail fetching, and panicking lookup helpers.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let (tmp, manifest) = setup_fixtures();
//! let tool = MockTool::new().failing_for("index.md");
//! // ... run an export with &tool ...
//! assert_eq!(tool.calls()[0].program, "pandoc");
//! let html = read_output(tmp.path(), "docs/index.html");
//! ```

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

use crate::assets::{FetchError, ThumbnailFetcher};
use crate::export::{ExternalTool, ToolOutput, copy_dir_recursive};
use crate::manifest::{self, DEFAULT_MANIFEST, Manifest, TocNode};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/project/` to a temp directory and load its manifest.
///
/// The temp directory is created under the canonical temp path so paths
/// derived from the manifest root compare equal to `tmp.path()` joins.
pub fn setup_fixtures() -> (TempDir, Manifest) {
    let base = std::env::temp_dir().canonicalize().unwrap();
    let tmp = TempDir::new_in(base).unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/project");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    let manifest = manifest::load(&tmp.path().join(DEFAULT_MANIFEST)).unwrap();
    (tmp, manifest)
}

/// Read a file under `root`. Panics with the path on failure.
pub fn read_output(root: &Path, rel: &str) -> String {
    let path = root.join(rel);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

// =========================================================================
// Manifest lookups: panic with a clear message on miss
// =========================================================================

/// Find a top-level toc node by title. Panics if not found.
pub fn find_node<'a>(manifest: &'a Manifest, title: &str) -> &'a TocNode {
    manifest
        .toc
        .iter()
        .find(|n| n.title == title)
        .unwrap_or_else(|| {
            let titles: Vec<&str> = manifest.toc.iter().map(|n| n.title.as_str()).collect();
            panic!("toc node '{title}' not found. Available: {titles:?}")
        })
}

/// Child titles of a node, in order.
pub fn child_titles(node: &TocNode) -> Vec<&str> {
    node.children().iter().map(|c| c.title.as_str()).collect()
}

// =========================================================================
// External tools
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub program: String,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
}

/// Tool double that records invocations and fakes their outputs.
///
/// - `nbconvert` writes `<output-dir>/<output>.md` plus one extracted image
///   under `<output>_files/`
/// - `pandoc` writes an empty file at the `-o` path
/// - any call with an argument containing the `failing_for` text exits 1
///   with stderr `conversion failed`
#[derive(Default)]
pub struct MockTool {
    calls: Mutex<Vec<ToolCall>>,
    nbconvert_output: Option<String>,
    fail_on: Option<String>,
}

impl MockTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nbconvert_output(mut self, markdown: &str) -> Self {
        self.nbconvert_output = Some(markdown.to_string());
        self
    }

    pub fn failing_for(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }
}

fn arg_after(args: &[OsString], flag: &str) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

impl ExternalTool for MockTool {
    fn run(&self, program: &str, args: &[OsString], cwd: Option<&Path>) -> io::Result<ToolOutput> {
        self.calls.lock().unwrap().push(ToolCall {
            program: program.to_string(),
            args: args.to_vec(),
            cwd: cwd.map(Path::to_path_buf),
        });

        if let Some(needle) = &self.fail_on {
            if args.iter().any(|a| a.to_string_lossy().contains(needle.as_str())) {
                return Ok(ToolOutput {
                    status: Some(1),
                    stdout: String::new(),
                    stderr: "conversion failed".to_string(),
                });
            }
        }

        if args.first().is_some_and(|a| a == "nbconvert") {
            if let (Some(name), Some(dir)) = (arg_after(args, "--output"), arg_after(args, "--output-dir")) {
                let name = name.to_string_lossy().into_owned();
                let markdown = self
                    .nbconvert_output
                    .clone()
                    .unwrap_or_else(|| "# Notebook\n".to_string());
                fs::create_dir_all(dir.join(format!("{name}_files")))?;
                fs::write(dir.join(format!("{name}_files/out.png")), b"png")?;
                fs::write(dir.join(format!("{name}.md")), markdown)?;
            }
        } else if let Some(output) = arg_after(args, "-o") {
            fs::write(output, b"")?;
        }

        Ok(ToolOutput {
            status: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

// =========================================================================
// Thumbnails
// =========================================================================

/// Fetcher that serves fixed bytes for the listed URLs and 404s the rest.
#[derive(Default)]
pub struct MockFetcher {
    pub available: Vec<String>,
    pub requested: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serving(urls: &[String]) -> Self {
        Self {
            available: urls.to_vec(),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl ThumbnailFetcher for MockFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        if self.available.iter().any(|a| a == url) {
            Ok(b"jpeg".to_vec())
        } else {
            Err(FetchError::Status(404))
        }
    }
}
