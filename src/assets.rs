//! Image reference resolution for rendered pages.
//!
//! Every `<img src>` in a rendered document is resolved to a physical file,
//! copied under `images/<section>/` in the docs directory, and rewritten to
//! point at the copy. Sections come from [`crate::menu::SectionMap`], so two
//! chapters can both ship a `plot.png`.
//!
//! ## Lookup order
//!
//! For a local reference (after dropping a leading `images/` and anything up
//! to a `.._images_` marker left by earlier flattening):
//!
//! 1. the cleaned path under each image root, in order
//! 2. the reference as written, relative to the document's directory
//! 3. the basename inside every immediate subdirectory of each image root
//! 4. the conventional `_images` directories
//!
//! First hit wins. A miss still produces a well-formed rewritten reference
//! and is recorded in the [`BuildReport`], never raised.
//!
//! ## Video thumbnails
//!
//! `https://img.youtube.com/vi/<id>/...` references (and local files that were
//! once such a thumbnail, like `youtube___hqdefault.jpg`, whose id is recovered
//! from the alt text or a watch link in the same cell) become
//! `images/<section>/video_<id>.jpg`. The ids are fetched in one pass after
//! all pages are written, see [`fetch_thumbnails`].

use crate::config::BuildPaths;
use crate::menu::DEFAULT_SECTION;
use crate::naming;
use crate::render::RenderedDocument;
use crate::report::BuildReport;
use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

static IMG_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<img\b[^>]*>").unwrap());
static SRC_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\s)src\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());
static ALT_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\s)alt\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());
static VIDEO_THUMB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://img\.youtube\.com/vi/([\w-]{11})/").unwrap());
static MANGLED_THUMB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"youtube_*(?:hq|maxres)default\.jpg$").unwrap());
static VIDEO_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/)([\w-]{11})").unwrap()
});
static VIDEO_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w-]{11}$").unwrap());
static PAGE_IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\ssrc=["'](images/[^"']+)["']"#).unwrap());

const MANGLE_MARKER: &str = ".._images_";

/// Where one image comes from and where it goes.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageReference {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Reference written into the page, relative to the docs root.
    pub rewritten: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Source file exists.
    Found(ImageReference),
    /// Thumbnail to be fetched for `id`.
    Video { id: String, asset: ImageReference },
    /// No candidate exists; `source` is the last path tried.
    Missing(ImageReference),
    /// Inline data or a remote image; left as is.
    Untouched,
}

/// What the resolver needs to know about the referencing document.
#[derive(Debug, Clone, Copy)]
pub struct RefContext<'a> {
    /// Document label used in the report.
    pub document: &'a str,
    pub doc_dir: &'a Path,
    pub section: &'a str,
    /// Source text of the fragment holding the reference.
    pub cell_source: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct AssetResolver {
    roots: Vec<PathBuf>,
    fallback_dirs: Vec<PathBuf>,
    docs_dir: PathBuf,
}

/// Directory name for a section: slugified, [`DEFAULT_SECTION`] if empty.
pub fn section_dir(section: &str) -> String {
    let slug = naming::slugify(section);
    if slug.is_empty() {
        DEFAULT_SECTION.to_string()
    } else {
        slug
    }
}

impl AssetResolver {
    pub fn new(roots: Vec<PathBuf>, fallback_dirs: Vec<PathBuf>, docs_dir: PathBuf) -> Self {
        Self {
            roots,
            fallback_dirs,
            docs_dir,
        }
    }

    /// Image roots and `_images` fallbacks for a project layout.
    pub fn from_paths(paths: &BuildPaths) -> Self {
        Self::new(
            vec![paths.images_dir.clone(), paths.notebooks_dir.join("images")],
            vec![
                paths.notebooks_dir.join("_images"),
                paths.root.join("_images"),
                paths.output_dir.join("_images"),
            ],
            paths.docs_dir.clone(),
        )
    }

    /// Decide where `reference` comes from and what it becomes.
    pub fn locate(&self, reference: &str, alt: Option<&str>, ctx: &RefContext<'_>) -> Resolution {
        let reference = reference.trim();
        if reference.is_empty() || reference.starts_with("data:") {
            return Resolution::Untouched;
        }
        if let Some(id) = video_id(reference, alt, ctx.cell_source) {
            return Resolution::Video {
                asset: self.target(&format!("video_{id}.jpg"), PathBuf::new(), ctx.section),
                id,
            };
        }
        if is_remote(reference) {
            return Resolution::Untouched;
        }

        let written = reference.replace("%20", " ");
        let clean = clean_reference(&written);
        let basename = Path::new(&clean)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| clean.clone());

        let mut candidates: Vec<PathBuf> = self.roots.iter().map(|root| root.join(&clean)).collect();
        candidates.push(ctx.doc_dir.join(&written));
        candidates.extend(self.roots.iter().flat_map(|root| {
            subdirectories(root)
                .into_iter()
                .map(|dir| dir.join(&basename))
        }));
        for dir in &self.fallback_dirs {
            candidates.push(dir.join(&clean));
            candidates.push(dir.join(&basename));
        }

        match candidates.into_iter().find(|c| c.is_file()) {
            Some(source) => Resolution::Found(self.target(&basename, source, ctx.section)),
            None => {
                let attempted = self
                    .roots
                    .first()
                    .map(|root| root.join(&clean))
                    .unwrap_or_else(|| ctx.doc_dir.join(&clean));
                Resolution::Missing(self.target(&basename, attempted, ctx.section))
            }
        }
    }

    fn target(&self, basename: &str, source: PathBuf, section: &str) -> ImageReference {
        let rewritten = format!("images/{}/{}", section_dir(section), basename);
        ImageReference {
            source,
            destination: self.docs_dir.join(&rewritten),
            rewritten,
        }
    }

    /// Resolve, copy and rewrite one reference. `None` leaves it unchanged.
    pub fn resolve(
        &self,
        reference: &str,
        alt: Option<&str>,
        ctx: &RefContext<'_>,
        report: &mut BuildReport,
    ) -> Option<String> {
        match self.locate(reference, alt, ctx) {
            Resolution::Untouched => None,
            Resolution::Found(asset) => {
                copy_asset(&asset.source, &asset.destination);
                Some(asset.rewritten)
            }
            Resolution::Video { id, asset } => {
                tracing::debug!(id = %id, document = ctx.document, "video thumbnail referenced");
                report.record_video(id, asset.destination);
                Some(asset.rewritten)
            }
            Resolution::Missing(asset) => {
                tracing::warn!(
                    reference,
                    document = ctx.document,
                    attempted = %asset.source.display(),
                    "image not found"
                );
                report.record_missing_image(&asset.source, ctx.document, reference);
                Some(asset.rewritten)
            }
        }
    }

    /// Rewrite every `<img src>` of a rendered document in place.
    pub fn process_document(
        &self,
        document: &mut RenderedDocument,
        label: &str,
        doc_dir: &Path,
        section: &str,
        report: &mut BuildReport,
    ) {
        for fragment in &mut document.fragments {
            let ctx = RefContext {
                document: label,
                doc_dir,
                section,
                cell_source: fragment.source.as_deref(),
            };
            let rewritten = IMG_TAG_RE.replace_all(&fragment.html, |caps: &Captures| {
                let tag = &caps[0];
                let Some(src) = attribute(&SRC_ATTR_RE, tag) else {
                    return tag.to_string();
                };
                let alt = attribute(&ALT_ATTR_RE, tag);
                match self.resolve(&src, alt.as_deref(), &ctx, report) {
                    Some(new_src) => SRC_ATTR_RE
                        .replace(tag, |caps: &Captures| format!("{}src=\"{new_src}\"", &caps[1]))
                        .into_owned(),
                    None => tag.to_string(),
                }
            });
            let rewritten = rewritten.into_owned();
            fragment.html = rewritten;
        }
    }
}

fn attribute(re: &Regex, tag: &str) -> Option<String> {
    let caps = re.captures(tag)?;
    caps.get(2)
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().replace("&amp;", "&"))
}

fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://") || reference.starts_with("//")
}

/// Drop `./`, a leading `images/`, and everything up to a mangling marker.
fn clean_reference(reference: &str) -> String {
    let mut clean = reference.trim_start_matches("./");
    if let Some(pos) = clean.rfind(MANGLE_MARKER) {
        clean = &clean[pos + MANGLE_MARKER.len()..];
    }
    clean.strip_prefix("images/").unwrap_or(clean).to_string()
}

/// Video id for a thumbnail reference, if it is one.
fn video_id(reference: &str, alt: Option<&str>, cell_source: Option<&str>) -> Option<String> {
    if let Some(caps) = VIDEO_THUMB_RE.captures(reference) {
        return Some(caps[1].to_string());
    }
    if !MANGLED_THUMB_RE.is_match(reference) {
        return None;
    }
    if let Some(alt) = alt.map(str::trim).filter(|a| VIDEO_ID_RE.is_match(a)) {
        return Some(alt.to_string());
    }
    cell_source
        .and_then(|source| VIDEO_LINK_RE.captures(source))
        .map(|caps| caps[1].to_string())
}

fn subdirectories(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

/// Copy unless source and destination are the same file. Failures are logged.
pub fn copy_asset(source: &Path, destination: &Path) {
    if same_file(source, destination) {
        return;
    }
    let result = destination
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| fs::copy(source, destination));
    match result {
        Ok(_) => tracing::debug!(
            source = %source.display(),
            destination = %destination.display(),
            "copied image"
        ),
        Err(e) => tracing::warn!(
            source = %source.display(),
            destination = %destination.display(),
            "image copy failed: {e}"
        ),
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

// ============================================================================
// Thumbnail fetching
// ============================================================================

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
}

/// Fetches remote thumbnail bytes.
pub trait ThumbnailFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP fetcher with a fixed 10 second timeout.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }
}

impl ThumbnailFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.bytes()?.to_vec())
    }
}

/// High-resolution first, then standard resolution.
pub fn thumbnail_urls(id: &str) -> [String; 2] {
    [
        format!("https://img.youtube.com/vi/{id}/maxresdefault.jpg"),
        format!("https://img.youtube.com/vi/{id}/hqdefault.jpg"),
    ]
}

/// Fetch every thumbnail recorded in the report that is not on disk yet.
pub fn fetch_thumbnails(report: &mut BuildReport, fetcher: &dyn ThumbnailFetcher) {
    let videos = report.videos.clone();
    for (id, destinations) in videos {
        let pending: Vec<&PathBuf> = destinations.iter().filter(|d| !d.exists()).collect();
        if pending.is_empty() {
            tracing::debug!(id = %id, "thumbnail already present");
            continue;
        }
        let bytes = thumbnail_urls(&id).iter().find_map(|url| match fetcher.fetch(url) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::debug!(id = %id, url = %url, "thumbnail fetch failed: {e}");
                None
            }
        });
        let Some(bytes) = bytes else {
            tracing::warn!(id = %id, "no thumbnail available");
            report.record_thumbnail_failure(id);
            continue;
        };
        for destination in pending {
            let written = destination
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|_| fs::write(destination, &bytes));
            match written {
                Ok(()) => tracing::info!(id = %id, path = %destination.display(), "fetched thumbnail"),
                Err(e) => tracing::warn!(id = %id, path = %destination.display(), "thumbnail write failed: {e}"),
            }
        }
    }
}

// ============================================================================
// Consistency check
// ============================================================================

/// Report every `src="images/..."` in the written pages with no file behind it.
pub fn check_page_images(pages: &[PathBuf], docs_dir: &Path, report: &mut BuildReport) {
    for page in pages {
        let html = match fs::read_to_string(page) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(page = %page.display(), "cannot re-read page: {e}");
                continue;
            }
        };
        let mut seen = BTreeSet::new();
        for caps in PAGE_IMAGE_RE.captures_iter(&html) {
            let reference = caps[1].to_string();
            if seen.insert(reference.clone()) && !docs_dir.join(&reference).exists() {
                report.record_dangling(page, reference);
            }
        }
    }
}
