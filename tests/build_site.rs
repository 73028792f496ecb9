//! End-to-end builds through the public library API.
//!
//! Each test lays out a small project in a temp directory, loads its
//! manifest, and runs [`generate::run_build`] with in-process doubles for
//! the external converters and the thumbnail fetcher.

use coursebook::assets::{FetchError, ThumbnailFetcher};
use coursebook::autogen;
use coursebook::compose;
use coursebook::config::OutputKind;
use coursebook::export::{ExternalTool, ToolOutput};
use coursebook::generate;
use coursebook::manifest::{self, DEFAULT_MANIFEST, Manifest};
use coursebook::output;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

// ============================================================================
// Doubles
// ============================================================================

struct OfflineFetcher;

impl ThumbnailFetcher for OfflineFetcher {
    fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::Status(404))
    }
}

/// Writes an empty file at the `-o` path of every call.
#[derive(Default)]
struct FakePandoc {
    programs: Mutex<Vec<String>>,
}

impl ExternalTool for FakePandoc {
    fn run(&self, program: &str, args: &[OsString], _cwd: Option<&Path>) -> io::Result<ToolOutput> {
        self.programs.lock().unwrap().push(program.to_string());
        if let Some(i) = args.iter().position(|a| a == "-o") {
            fs::write(&args[i + 1], b"")?;
        }
        Ok(ToolOutput {
            status: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

// ============================================================================
// Project setup
// ============================================================================

fn manifest_yaml(toc: &str) -> String {
    format!(
        r#"site:
  title: Test Course
  author: Staff
  description: A tiny course
  logo: static/images/logo.png
  favicon: static/images/logo.png
  theme:
    default: light
    light: light
    dark: dark
  language: en
  github_url: https://example.org/course
toc:
{toc}
footer:
  text: Footer text
static:
  images: []
  css: []
  js: []
  templates: []
  themes: []
build:
  outputs: [html]
  output_dir: _build
  docs_dir: docs
  sources_dir: docs/sources
  notebooks_dir: content/notebooks
  static_dir: static
  images_dir: content/images
"#
    )
}

fn setup_project(toc: &str) -> (TempDir, Manifest) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("content")).unwrap();
    fs::write(root.join("content/index.md"), "# Hi\n\nWelcome to the course.\n").unwrap();
    compose::write_default_templates(&root.join("static/templates")).unwrap();
    fs::write(root.join(DEFAULT_MANIFEST), manifest_yaml(toc)).unwrap();
    let manifest = manifest::load(&root.join(DEFAULT_MANIFEST)).unwrap();
    (tmp, manifest)
}

const HOME_ONLY: &str = "  - title: Home\n    menu: true\n    file: content/index.md";

fn html_pages(docs: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(docs)
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".html"))
        .collect();
    names.sort();
    names
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn minimal_site_builds_one_page() {
    let (tmp, manifest) = setup_project(HOME_ONLY);
    let report = generate::run_build(
        &manifest,
        &[OutputKind::Html],
        &[],
        &FakePandoc::default(),
        &OfflineFetcher,
    )
    .unwrap();

    let page = fs::read_to_string(tmp.path().join("docs/index.html")).unwrap();
    assert!(page.starts_with("<!DOCTYPE html>"));
    assert!(page.contains("<h1>Hi</h1>"));
    assert!(page.contains("Test Course"));
    assert!(page.contains("Footer text"));
    assert!(report.is_clean(), "{:?}", output::format_report(&report, tmp.path()));
    assert!(tmp.path().join(".autogen/_menu.yml").is_file());
}

#[test]
fn missing_source_is_reported_not_fatal() {
    let toc = format!("{HOME_ONLY}\n  - title: Ghost\n    file: content/ghost.md");
    let (tmp, manifest) = setup_project(&toc);
    let report = generate::run_build(
        &manifest,
        &[OutputKind::Html],
        &[],
        &FakePandoc::default(),
        &OfflineFetcher,
    )
    .unwrap();

    assert_eq!(html_pages(&tmp.path().join("docs")), vec!["index.html"]);
    assert_eq!(report.missing_files, vec!["content/ghost.md"]);
    let lines = output::format_report(&report, tmp.path());
    assert!(lines.contains(&"Missing files (1)".to_string()));
    assert_eq!(lines.last().unwrap(), "Build finished with problems");
}

#[test]
fn exports_then_sources_are_published() {
    let (tmp, manifest) = setup_project(HOME_ONLY);
    let tool = FakePandoc::default();
    let report = generate::run_build(
        &manifest,
        &[OutputKind::Markdown, OutputKind::Docx],
        &[],
        &tool,
        &OfflineFetcher,
    )
    .unwrap();

    let root = tmp.path();
    assert!(root.join("docs/md/index.md").is_file());
    assert!(root.join("docs/docx/index.docx").is_file());
    assert!(root.join("docs/sources/index/index.md").is_file());
    assert!(root.join("docs/sources/index/index.docx").is_file());
    assert!(!root.join("docs/index.html").exists());
    assert_eq!(*tool.programs.lock().unwrap(), vec!["pandoc"]);
    assert!(report.conversion_failures.is_empty());
}

#[test]
fn flat_toc_for_single_file_warns_about_empty_chapters() {
    let (tmp, manifest) = setup_project(HOME_ONLY);
    let path = autogen::write_flat_toc(&manifest).unwrap();
    assert_eq!(path, tmp.path().join("_toc.yml"));

    let toc = autogen::flat_toc(&manifest.toc).unwrap();
    assert_eq!(toc.root, "content/index");
    assert_eq!(
        autogen::check_flat_toc(&toc, tmp.path()),
        vec!["chapters list is empty"]
    );
}
