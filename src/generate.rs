//! Site build orchestration.
//!
//! [`generate_html`] is the HTML build for a resolved file list; [`run_build`]
//! runs every requested output kind in order and returns the accumulated
//! [`BuildReport`].
//!
//! ## HTML output
//!
//! ```text
//! docs/
//! ├── index.html                 # one page per source document (<stem>.html)
//! ├── 01-motion.html
//! ├── chapters.html              # auto-index page per group menu entry
//! ├── css/ js/                   # static entries from the manifest
//! └── images/
//!     ├── logo.png               # static images
//!     ├── chapters/              # content images, bucketed by section
//!     │   ├── velocity.png
//!     │   └── video_<id>.jpg     # fetched thumbnails
//!     └── other/
//! ```
//!
//! Pages are written as they are rendered. Existing files in the docs
//! directory that the build does not touch are left alone.
//!
//! ## Build order
//!
//! Exports run before the HTML build so download links and the Jupyter Book
//! link point at files that exist; the sources directory is republished last.

use crate::assets::{self, AssetResolver, ThumbnailFetcher};
use crate::autogen::{self, AutogenError};
use crate::compose::{self, ComposeError, PageComposer, Templates};
use crate::config::{OutputKind, StaticEntry};
use crate::export::{ExportError, ExportFormat, Exporter, ExternalTool};
use crate::manifest::Manifest;
use crate::menu::{self, MenuError, SectionMap};
use crate::naming;
use crate::render::{self, RenderError, RenderOutcome};
use crate::report::BuildReport;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Menu(#[from] MenuError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Autogen(#[from] AutogenError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("no files to build: the manifest toc lists none and no --files were given")]
    NoFiles,
}

/// Files to build: the explicit list if given, else every toc file in order.
pub fn resolve_files(manifest: &Manifest, requested: &[String]) -> Result<Vec<String>, GenerateError> {
    let files: Vec<String> = if requested.is_empty() {
        menu::flatten_files(&manifest.toc)
            .into_iter()
            .map(str::to_string)
            .collect()
    } else {
        requested.to_vec()
    };
    if files.is_empty() {
        return Err(GenerateError::NoFiles);
    }
    Ok(files)
}

/// Copy the manifest's static css, js and image entries into the docs root.
pub fn copy_static_assets(manifest: &Manifest, docs_dir: &Path) -> Vec<PathBuf> {
    let groups: [(&str, &[StaticEntry]); 3] = [
        ("css", &manifest.static_assets.css),
        ("js", &manifest.static_assets.js),
        ("images", &manifest.static_assets.images),
    ];
    let mut copied = Vec::new();
    for (dir, entries) in groups {
        for entry in entries {
            let source = manifest.root.join(&entry.path);
            let Some(name) = source.file_name() else {
                continue;
            };
            if !source.is_file() {
                tracing::warn!(path = %entry.path, "static asset not found");
                continue;
            }
            let destination = docs_dir.join(dir).join(name);
            let result = fs::create_dir_all(docs_dir.join(dir))
                .and_then(|_| fs::copy(&source, &destination));
            match result {
                Ok(_) => copied.push(destination),
                Err(e) => tracing::warn!(path = %entry.path, "static asset copy failed: {e}"),
            }
        }
    }
    tracing::debug!(count = copied.len(), "copied static assets");
    copied
}

/// Build the HTML site for `files` (manifest-relative paths).
///
/// Returns the pages written. Per-file problems are recorded in `report`;
/// only structural failures (missing template, menu slug collision, an
/// auto-index page landing on a requested page, unreadable derived
/// manifests) abort.
pub fn generate_html(
    manifest: &Manifest,
    files: &[String],
    fetcher: &dyn ThumbnailFetcher,
    report: &mut BuildReport,
) -> Result<Vec<PathBuf>, GenerateError> {
    let paths = manifest.build.paths(&manifest.root);
    let docs = &paths.docs_dir;

    autogen::ensure(manifest, false)?;
    let sections = SectionMap::from_nav(&autogen::read_menu(&manifest.root)?);
    let composer = PageComposer::new(
        Templates::load(&paths.templates_dir)?,
        &manifest.site,
        &manifest.footer,
    );
    let entries = menu::menu_entries(&manifest.toc)?;
    menu::check_page_collisions(&entries, files.iter().map(String::as_str))?;
    let titles = menu::file_titles(&manifest.toc);
    let resolver = AssetResolver::from_paths(&paths);
    let has_jupyter_book = docs.join("jupyter-book").is_dir();

    fs::create_dir_all(docs)?;
    copy_static_assets(manifest, docs);

    let mut pages = Vec::new();
    for file in files {
        let source = manifest.root.join(file);
        let mut document = match render::render(&source) {
            Ok(RenderOutcome::Document(document)) => document,
            Ok(RenderOutcome::Unsupported(ext)) => {
                tracing::info!(file = %file, ext = %ext, "unsupported file type, skipping");
                report.record_skipped(file.as_str(), format!("unsupported extension '{ext}'"));
                continue;
            }
            Ok(RenderOutcome::Empty) => {
                tracing::warn!(file = %file, "rendered body is empty, skipping");
                report.record_skipped(file.as_str(), "empty body");
                continue;
            }
            Err(RenderError::Missing(_)) => {
                tracing::warn!(file = %file, "source file not found");
                report.record_missing_file(file.as_str());
                continue;
            }
            Err(e) => {
                tracing::error!(file = %file, "render failed: {e}");
                report.record_skipped(file.as_str(), e.to_string());
                continue;
            }
        };

        let target = menu::page_target(file);
        let doc_dir = source.parent().unwrap_or(manifest.root.as_path());
        resolver.process_document(&mut document, file, doc_dir, sections.section_of(&target), report);

        let title = titles
            .get(file.as_str())
            .map(|t| t.to_string())
            .unwrap_or_else(|| naming::title_from_path(file));
        let stem = naming::file_stem(file);
        let html = composer.compose(
            &composer.page_title(&title),
            &document.body_html(),
            &menu::render_nav(&entries, &target).into_string(),
            &compose::download_buttons(&stem, document.kind, has_jupyter_book).into_string(),
        );
        let out = docs.join(&target);
        if let Err(e) = fs::write(&out, html) {
            tracing::error!(file = %file, page = %target, "cannot write page: {e}");
            report.record_conversion_failure(file.as_str(), OutputKind::Html.name(), e.to_string());
            continue;
        }
        tracing::info!(file = %file, page = %target, "wrote page");
        report.record_written(&out);
        pages.push(out);
    }

    for entry in entries.iter().filter(|e| e.is_auto_index) {
        let html = composer.compose(
            &composer.page_title(entry.title),
            &compose::render_auto_index(entry.node),
            &menu::render_nav(&entries, &entry.target).into_string(),
            "",
        );
        let out = docs.join(&entry.target);
        if let Err(e) = fs::write(&out, html) {
            tracing::error!(page = %entry.target, "cannot write index page: {e}");
            report.record_conversion_failure(entry.target.as_str(), OutputKind::Html.name(), e.to_string());
            continue;
        }
        tracing::info!(title = entry.title, page = %entry.target, "wrote index page");
        report.record_written(&out);
        pages.push(out);
    }

    assets::fetch_thumbnails(report, fetcher);
    assets::check_page_images(&pages, docs, report);
    Ok(pages)
}

/// Run every requested output kind over `files` and return the report.
///
/// A failing Jupyter Book build is recorded, not raised.
pub fn run_build(
    manifest: &Manifest,
    kinds: &[OutputKind],
    requested: &[String],
    runner: &dyn ExternalTool,
    fetcher: &dyn ThumbnailFetcher,
) -> Result<BuildReport, GenerateError> {
    let files = resolve_files(manifest, requested)?;
    let paths = manifest.build.paths(&manifest.root);
    let exporter = Exporter::new(&paths, &manifest.build.tools, runner);
    let mut report = BuildReport::new();

    for format in ExportFormat::ALL {
        let selected = kinds
            .iter()
            .any(|k| ExportFormat::from_output(*k) == Some(format));
        if selected {
            println!("==> Export: {format}");
            exporter.export_all(&files, format, &mut report);
        }
    }

    if kinds.contains(&OutputKind::Notebook) {
        println!("==> Export: ipynb");
        exporter.copy_notebooks(&files, &mut report);
    }

    if kinds.contains(&OutputKind::JupyterBook) {
        println!("==> Jupyter Book");
        let toc_path = autogen::write_flat_toc(manifest)?;
        let toc: autogen::FlatToc = serde_yaml::from_str(&fs::read_to_string(&toc_path)?)
            .map_err(AutogenError::from)?;
        for problem in autogen::check_flat_toc(&toc, &manifest.root) {
            tracing::warn!(toc = %toc_path.display(), "{problem}");
        }
        for problem in autogen::check_notebook_kernels(&manifest.toc, &manifest.root) {
            tracing::warn!("{problem}");
        }
        if let Err(e) = exporter.build_jupyter_book(&mut report) {
            tracing::error!("jupyter-book build failed: {e}");
            let stderr = match e {
                ExportError::ToolFailed { stderr, .. } => stderr,
                other => other.to_string(),
            };
            report.record_conversion_failure(autogen::TOC_FILE, OutputKind::JupyterBook.name(), stderr);
        }
    }

    if kinds.contains(&OutputKind::Html) {
        println!("==> HTML → {}", paths.docs_dir.display());
        generate_html(manifest, &files, fetcher, &mut report)?;
    }

    if kinds.iter().any(|k| *k != OutputKind::Html) {
        exporter.publish_sources(&files, &mut report)?;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockFetcher, MockTool, read_output, setup_fixtures};

    fn build_html(manifest: &Manifest, files: &[String]) -> (Vec<PathBuf>, BuildReport) {
        let mut report = BuildReport::new();
        let pages = generate_html(manifest, files, &MockFetcher::new(), &mut report).unwrap();
        (pages, report)
    }

    // =========================================================================
    // File resolution
    // =========================================================================

    #[test]
    fn resolve_defaults_to_toc_order() {
        let (_tmp, manifest) = setup_fixtures();
        let files = resolve_files(&manifest, &[]).unwrap();
        assert_eq!(
            files,
            vec![
                "content/index.md",
                "content/chapters/01-motion.md",
                "content/chapters/02-forces.md",
                "content/notebooks/lab1.ipynb",
                "content/about.md",
            ]
        );
    }

    #[test]
    fn explicit_files_win() {
        let (_tmp, manifest) = setup_fixtures();
        let files = resolve_files(&manifest, &["content/about.md".to_string()]).unwrap();
        assert_eq!(files, vec!["content/about.md"]);
    }

    // =========================================================================
    // HTML build
    // =========================================================================

    #[test]
    fn pages_and_auto_indexes_are_written() {
        let (tmp, manifest) = setup_fixtures();
        let files = resolve_files(&manifest, &[]).unwrap();
        let (pages, report) = build_html(&manifest, &files);
        let names: Vec<String> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "index.html",
                "01-motion.html",
                "02-forces.html",
                "lab1.html",
                "about.html",
                "chapters.html",
                "labs.html",
            ]
        );
        assert!(report.missing_files.is_empty());

        let index = read_output(tmp.path(), "docs/index.html");
        assert!(index.contains("<h1>Hi</h1>"));
        assert!(index.contains("<title>Home | Intro Physics</title>"));
        assert!(index.contains(r#"<li class="current"><a href="index.html">Home</a></li>"#));
        assert!(index.contains(r#"<nav class="downloads""#));

        let chapters = read_output(tmp.path(), "docs/chapters.html");
        assert!(chapters.contains("<h2>Chapters</h2>"));
        assert!(chapters.contains(r#"<a href="01-motion.html">motion</a>"#));
    }

    #[test]
    fn images_are_bucketed_by_section() {
        let (tmp, manifest) = setup_fixtures();
        let files = resolve_files(&manifest, &[]).unwrap();
        let (_pages, report) = build_html(&manifest, &files);

        let motion = read_output(tmp.path(), "docs/01-motion.html");
        assert!(motion.contains(r#"src="images/chapters/velocity.png""#));
        assert!(tmp.path().join("docs/images/chapters/velocity.png").is_file());

        let index = read_output(tmp.path(), "docs/index.html");
        assert!(index.contains(r#"src="images/other/diagram.png""#));
        assert!(report.missing_images.is_empty());
        assert!(report.dangling_images.is_empty());
    }

    #[test]
    fn notebook_page_renders_cells() {
        let (tmp, manifest) = setup_fixtures();
        build_html(&manifest, &["content/notebooks/lab1.ipynb".to_string()]);
        let lab = read_output(tmp.path(), "docs/lab1.html");
        assert!(lab.contains(r#"<div class="markdown-cell">"#));
        assert!(lab.contains(r#"<pre class="stream-output">hello"#));
        assert!(lab.contains(r#"href="ipynb/lab1.ipynb""#));
        assert!(lab.contains("<title>Lab 1 | Intro Physics</title>"));
    }

    #[test]
    fn static_assets_are_copied() {
        let (tmp, manifest) = setup_fixtures();
        build_html(&manifest, &["content/about.md".to_string()]);
        assert!(tmp.path().join("docs/css/theme-light.css").is_file());
        assert!(tmp.path().join("docs/css/theme-dark.css").is_file());
        assert!(tmp.path().join("docs/images/logo.png").is_file());
    }

    #[test]
    fn missing_and_unsupported_files_are_recorded() {
        let (tmp, manifest) = setup_fixtures();
        let files = vec![
            "content/index.md".to_string(),
            "content/nope.md".to_string(),
            "content/data.csv".to_string(),
        ];
        let (_pages, report) = build_html(&manifest, &files);
        assert!(tmp.path().join("docs/index.html").is_file());
        assert_eq!(report.missing_files, vec!["content/nope.md"]);
        assert_eq!(report.skipped.len(), 1);
        assert!(!tmp.path().join("docs/nope.html").exists());
    }

    #[test]
    fn auto_index_may_not_replace_a_requested_page() {
        let (tmp, manifest) = setup_fixtures();
        fs::write(tmp.path().join("content/labs.md"), "# Labs page body\n").unwrap();
        let mut report = BuildReport::new();
        let files = vec!["content/index.md".to_string(), "content/labs.md".to_string()];
        let result = generate_html(&manifest, &files, &MockFetcher::new(), &mut report);
        assert!(matches!(
            result,
            Err(GenerateError::Menu(MenuError::PageCollision { ref target, .. })) if target == "labs.html"
        ));
        assert!(!tmp.path().join("docs/labs.html").exists());
    }

    #[test]
    fn unwritable_page_is_recorded_and_build_continues() {
        let (tmp, manifest) = setup_fixtures();
        fs::create_dir_all(tmp.path().join("docs/about.html")).unwrap();
        let files = vec!["content/about.md".to_string(), "content/index.md".to_string()];
        let (pages, report) = build_html(&manifest, &files);
        assert!(pages.contains(&tmp.path().join("docs/index.html")));
        assert!(!pages.contains(&tmp.path().join("docs/about.html")));
        assert_eq!(report.conversion_failures.len(), 1);
        assert_eq!(report.conversion_failures[0].file, "content/about.md");
        assert_eq!(report.conversion_failures[0].format, "html");
    }

    #[test]
    fn missing_template_aborts() {
        let (tmp, manifest) = setup_fixtures();
        fs::remove_file(tmp.path().join("static/templates/page.html")).unwrap();
        let mut report = BuildReport::new();
        let result = generate_html(&manifest, &["content/index.md".to_string()], &MockFetcher::new(), &mut report);
        assert!(matches!(
            result,
            Err(GenerateError::Compose(ComposeError::MissingTemplate(_)))
        ));
    }

    #[test]
    fn video_thumbnails_are_fetched_after_pages() {
        let (tmp, manifest) = setup_fixtures();
        let fetcher = MockFetcher::serving(&[assets::thumbnail_urls("dQw4w9WgXcQ")[0].clone()]);
        let mut report = BuildReport::new();
        generate_html(&manifest, &["content/about.md".to_string()], &fetcher, &mut report).unwrap();
        assert!(report.videos.contains_key("dQw4w9WgXcQ"));
        assert!(tmp.path().join("docs/images/other/video_dQw4w9WgXcQ.jpg").is_file());
        assert!(report.dangling_images.is_empty());
    }

    #[test]
    fn failed_thumbnail_leaves_dangling_reference() {
        let (_tmp, manifest) = setup_fixtures();
        let mut report = BuildReport::new();
        generate_html(&manifest, &["content/about.md".to_string()], &MockFetcher::new(), &mut report).unwrap();
        assert_eq!(report.thumbnail_failures, vec!["dQw4w9WgXcQ"]);
        assert_eq!(report.dangling_images.len(), 1);
        assert_eq!(report.dangling_images[0].reference, "images/other/video_dQw4w9WgXcQ.jpg");
    }

    // =========================================================================
    // Full build
    // =========================================================================

    #[test]
    fn run_build_exports_then_publishes_sources() {
        let (tmp, manifest) = setup_fixtures();
        let tool = MockTool::new();
        let report = run_build(
            &manifest,
            &[OutputKind::Html, OutputKind::Pdf, OutputKind::Notebook],
            &["content/index.md".to_string(), "content/notebooks/lab1.ipynb".to_string()],
            &tool,
            &MockFetcher::new(),
        )
        .unwrap();
        assert!(report.conversion_failures.is_empty());
        assert!(tmp.path().join("docs/pdf/index.pdf").is_file());
        assert!(tmp.path().join("docs/pdf/lab1.pdf").is_file());
        assert!(tmp.path().join("docs/ipynb/lab1.ipynb").is_file());
        assert!(tmp.path().join("docs/index.html").is_file());

        let sources = tmp.path().join("docs/sources");
        assert!(sources.join("index/index.pdf").is_file());
        assert!(sources.join("lab1/lab1.pdf").is_file());
        assert!(sources.join("lab1/lab1.ipynb").is_file());
    }

    #[test]
    fn html_only_build_does_not_touch_sources() {
        let (tmp, manifest) = setup_fixtures();
        run_build(
            &manifest,
            &[OutputKind::Html],
            &["content/index.md".to_string()],
            &MockTool::new(),
            &MockFetcher::new(),
        )
        .unwrap();
        assert!(!tmp.path().join("docs/sources").exists());
    }

    #[test]
    fn jupyter_book_failure_is_recorded() {
        let (tmp, manifest) = setup_fixtures();
        let tool = MockTool::new().failing_for("build");
        let report = run_build(
            &manifest,
            &[OutputKind::JupyterBook],
            &[],
            &tool,
            &MockFetcher::new(),
        )
        .unwrap();
        assert!(tmp.path().join("_toc.yml").is_file());
        assert_eq!(report.conversion_failures.len(), 1);
        assert_eq!(report.conversion_failures[0].format, "jupyter");
    }
}
