//! Manifest loading, expansion, and validation.
//!
//! The manifest is the single source of truth for a site: metadata, the
//! navigation tree (`toc`), footer, static assets, and build layout. Loading
//! runs in three steps:
//!
//! ```text
//! 1. Sections   site / footer / static / build shape checks on raw YAML
//! 2. Expand     `.autogen` globs and `append_children` directories → file nodes
//! 3. Validate   titles, field types, leaf-has-file, depth ≤ 4 → typed TocNode tree
//! ```
//!
//! ## Authoring shortcuts
//!
//! ```yaml
//! toc:
//!   - title: Notebooks
//!     children:
//!       - .autogen: content/notebooks/*.ipynb   # replaced by one node per match
//!   - title: Labs
//!     file: content/labs.md
//!     append_children: content/labs           # files appended after children
//! ```
//!
//! Expansion runs once, top-down, before validation, so expanded nodes obey
//! the same invariants as authored ones. Matches are sorted by resolved path.
//! An expanded tree contains no directives, so expanding it again is a no-op.
//!
//! ## Node shapes
//!
//! Every node has a title. The rest of its shape is captured by [`NodeKind`]:
//! a file page, a group (children, no file, which becomes an auto-index page),
//! or a file page that also has children.

use crate::config::{BuildConfig, FooterConfig, SiteConfig, StaticConfig};
use crate::naming;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default manifest file name, looked up in the working directory.
pub const DEFAULT_MANIFEST: &str = "_content.yml";

/// Maximum nesting: root menu → group → subgroup → page.
pub const MAX_DEPTH: usize = 4;

const AUTOGEN_KEY: &str = ".autogen";
const APPEND_KEY: &str = "append_children";

const SITE_KEYS: [&str; 8] = [
    "title",
    "author",
    "description",
    "logo",
    "favicon",
    "theme",
    "language",
    "github_url",
];
const THEME_KEYS: [&str; 3] = ["default", "light", "dark"];
const STATIC_KEYS: [&str; 5] = ["images", "css", "js", "templates", "themes"];
const BUILD_DIR_KEYS: [&str; 6] = [
    "output_dir",
    "docs_dir",
    "sources_dir",
    "notebooks_dir",
    "static_dir",
    "images_dir",
];

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("manifest not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid manifest: {0}")]
    Validation(String),
    #[error("invalid glob pattern '{pattern}': {source}")]
    Glob {
        pattern: String,
        source: glob::PatternError,
    },
}

fn invalid(msg: impl Into<String>) -> ManifestError {
    ManifestError::Validation(msg.into())
}

/// A fully loaded and validated manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Directory holding the manifest; every relative path resolves here.
    pub root: PathBuf,
    pub site: SiteConfig,
    pub toc: Vec<TocNode>,
    pub footer: FooterConfig,
    pub static_assets: StaticConfig,
    pub build: BuildConfig,
}

/// One entry of the navigation tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TocNode {
    pub title: String,
    /// Whether the node is a top-level navigation entry.
    pub menu: bool,
    /// Shown on auto-index pages.
    pub description: Option<String>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A page with no children.
    File(String),
    /// Children only; rendered as an auto-generated index page.
    Group(Vec<TocNode>),
    /// A page that also heads a subtree.
    FileGroup { file: String, children: Vec<TocNode> },
}

impl TocNode {
    pub fn file(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::File(file) | NodeKind::FileGroup { file, .. } => Some(file),
            NodeKind::Group(_) => None,
        }
    }

    pub fn children(&self) -> &[TocNode] {
        match &self.kind {
            NodeKind::File(_) => &[],
            NodeKind::Group(children) | NodeKind::FileGroup { children, .. } => children,
        }
    }
}

#[derive(Serialize)]
struct NodeRecord<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    menu: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "no_children")]
    children: &'a [TocNode],
}

fn no_children(children: &&[TocNode]) -> bool {
    children.is_empty()
}

impl Serialize for TocNode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        NodeRecord {
            title: &self.title,
            file: self.file(),
            menu: self.menu,
            description: self.description.as_deref(),
            children: self.children(),
        }
        .serialize(serializer)
    }
}

/// Load a manifest file.
///
/// Fails with [`ManifestError::NotFound`] when the file is absent and with
/// [`ManifestError::Validation`] when any section or toc node is malformed.
pub fn load(path: &Path) -> Result<Manifest, ManifestError> {
    if !path.is_file() {
        return Err(ManifestError::NotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;
    let absolute = path.canonicalize()?;
    let root = absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    parse(&text, &root)
}

/// Parse manifest text whose relative paths resolve against `root`.
pub fn parse(text: &str, root: &Path) -> Result<Manifest, ManifestError> {
    let doc: Value = serde_yaml::from_str(text)?;
    let map = doc
        .as_mapping()
        .ok_or_else(|| invalid("manifest must be a mapping"))?;

    validate_site(map)?;
    validate_footer(map)?;
    validate_static(map)?;
    validate_build(map)?;

    let entries = map
        .get("toc")
        .and_then(Value::as_sequence)
        .ok_or_else(|| invalid("missing or invalid 'toc' (must be a list)"))?;
    let expanded = expand_toc(entries, root)?;
    for entry in &expanded {
        validate_node(entry, 1)?;
    }
    let toc = expanded.iter().map(typed_node).collect();

    Ok(Manifest {
        root: root.to_path_buf(),
        site: section_value(map, "site")?,
        toc,
        footer: section_value(map, "footer")?,
        static_assets: section_value(map, "static")?,
        build: section_value(map, "build")?,
    })
}

fn section_value<T: serde::de::DeserializeOwned>(
    map: &Mapping,
    name: &str,
) -> Result<T, ManifestError> {
    let value = map.get(name).cloned().unwrap_or(Value::Null);
    Ok(serde_yaml::from_value(value)?)
}

// ============================================================================
// Expansion
// ============================================================================

/// Replace `.autogen` entries and consume `append_children` keys.
///
/// Entries that are not mappings pass through untouched so validation can
/// report them.
pub fn expand_toc(entries: &[Value], root: &Path) -> Result<Vec<Value>, ManifestError> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(map) = entry.as_mapping() else {
            out.push(entry.clone());
            continue;
        };

        if let Some(pattern) = map.get(AUTOGEN_KEY) {
            let pattern = pattern
                .as_str()
                .ok_or_else(|| invalid(format!("'{AUTOGEN_KEY}' must be a glob string")))?;
            let files = glob_files(root, pattern)?;
            tracing::debug!(pattern, matches = files.len(), "expanded glob directive");
            out.extend(files.iter().map(|f| file_entry(root, f)));
            continue;
        }

        let mut map = map.clone();
        let expanded = match map.get("children") {
            Some(Value::Sequence(children)) => Some(expand_toc(children, root)?),
            _ => None,
        };
        if let Some(children) = expanded {
            map.insert(Value::from("children"), Value::Sequence(children));
        }
        if let Some(dir) = map.remove(APPEND_KEY) {
            let dir = dir
                .as_str()
                .ok_or_else(|| invalid(format!("'{APPEND_KEY}' must be a directory path")))?;
            let appended: Vec<Value> = dir_files(root, dir)?
                .iter()
                .map(|f| file_entry(root, f))
                .collect();
            match map.get_mut("children") {
                Some(Value::Sequence(children)) => children.extend(appended),
                Some(_) => {}
                None => {
                    map.insert(Value::from("children"), Value::Sequence(appended));
                }
            }
        }
        out.push(Value::Mapping(map));
    }
    Ok(out)
}

fn glob_files(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, ManifestError> {
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        pattern
    );
    let paths = glob::glob(&full).map_err(|source| ManifestError::Glob {
        pattern: pattern.to_string(),
        source,
    })?;
    let mut files: Vec<PathBuf> = paths
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("unreadable glob match: {e}");
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

fn dir_files(root: &Path, dir: &str) -> Result<Vec<PathBuf>, ManifestError> {
    let full = root.join(dir);
    if !full.is_dir() {
        tracing::warn!(dir = %full.display(), "append_children directory not found");
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(&full)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_entry(root: &Path, path: &Path) -> Value {
    let rel = relative_posix(root, path);
    let mut map = Mapping::new();
    map.insert(Value::from("title"), Value::from(naming::title_from_path(&rel)));
    map.insert(Value::from("file"), Value::from(rel));
    Value::Mapping(map)
}

/// `path` relative to `root`, `/`-separated.
fn relative_posix(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================================
// Validation
// ============================================================================

fn section<'a>(map: &'a Mapping, name: &str) -> Result<&'a Mapping, ManifestError> {
    map.get(name)
        .and_then(Value::as_mapping)
        .ok_or_else(|| invalid(format!("missing or invalid '{name}' (must be a mapping)")))
}

fn require_string(map: &Mapping, section: &str, key: &str) -> Result<(), ManifestError> {
    match map.get(key) {
        None => Err(invalid(format!("missing required key in '{section}': {key}"))),
        Some(Value::String(_)) => Ok(()),
        Some(_) => Err(invalid(format!("'{key}' in '{section}' must be a string"))),
    }
}

fn validate_site(doc: &Mapping) -> Result<(), ManifestError> {
    let site = section(doc, "site")?;
    for key in SITE_KEYS {
        if key == "theme" {
            continue;
        }
        require_string(site, "site", key)?;
    }
    let theme = match site.get("theme") {
        None => return Err(invalid("missing required key in 'site': theme")),
        Some(Value::Mapping(theme)) => theme,
        Some(_) => return Err(invalid("'theme' in 'site' must be a mapping")),
    };
    for key in THEME_KEYS {
        require_string(theme, "site.theme", key)?;
    }
    Ok(())
}

fn validate_footer(doc: &Mapping) -> Result<(), ManifestError> {
    let footer = section(doc, "footer")?;
    require_string(footer, "footer", "text")
}

fn validate_static(doc: &Mapping) -> Result<(), ManifestError> {
    let assets = section(doc, "static")?;
    for key in STATIC_KEYS {
        let entries = match assets.get(key) {
            None => return Err(invalid(format!("missing required key in 'static': {key}"))),
            Some(Value::Sequence(entries)) => entries,
            Some(_) => return Err(invalid(format!("'{key}' in 'static' must be a list"))),
        };
        let scope = format!("static.{key}");
        for entry in entries {
            let entry = entry
                .as_mapping()
                .ok_or_else(|| invalid(format!("each entry in '{scope}' must be a mapping")))?;
            require_string(entry, &scope, "path")?;
            require_string(entry, &scope, "description")?;
        }
    }
    Ok(())
}

fn validate_build(doc: &Mapping) -> Result<(), ManifestError> {
    let build = section(doc, "build")?;
    match build.get("outputs") {
        None => return Err(invalid("missing required key in 'build': outputs")),
        Some(Value::Sequence(items)) if items.iter().all(Value::is_string) => {}
        Some(_) => return Err(invalid("'outputs' in 'build' must be a list of strings")),
    }
    for key in BUILD_DIR_KEYS {
        require_string(build, "build", key)?;
    }
    Ok(())
}

/// Check one node and its subtree. `depth` starts at 1 for root entries.
fn validate_node(node: &Value, depth: usize) -> Result<(), ManifestError> {
    if depth > MAX_DEPTH {
        return Err(invalid(format!(
            "exceeded max depth of {MAX_DEPTH} (menu > group > subgroup > page) at {}",
            describe(node)
        )));
    }
    let map = node
        .as_mapping()
        .ok_or_else(|| invalid(format!("toc entry at depth {depth} is not a mapping")))?;
    if !matches!(map.get("title"), Some(Value::String(_))) {
        return Err(invalid(format!(
            "missing or invalid 'title' at depth {depth}: {}",
            describe(node)
        )));
    }
    if map.get("menu").is_some_and(|v| !v.is_bool()) {
        return Err(invalid(format!("'menu' must be a boolean at {}", describe(node))));
    }
    if map.get("file").is_some_and(|v| !v.is_string()) {
        return Err(invalid(format!("'file' must be a string at {}", describe(node))));
    }
    if map.get("description").is_some_and(|v| !v.is_string()) {
        return Err(invalid(format!(
            "'description' must be a string at {}",
            describe(node)
        )));
    }
    let children = match map.get("children") {
        None => &[][..],
        Some(Value::Sequence(children)) => children.as_slice(),
        Some(_) => {
            return Err(invalid(format!(
                "'children' must be a list at {}",
                describe(node)
            )));
        }
    };
    if children.is_empty() && map.get("file").is_none() {
        return Err(invalid(format!(
            "leaf entry has no 'file' at {}",
            describe(node)
        )));
    }
    for child in children {
        validate_node(child, depth + 1)?;
    }
    Ok(())
}

fn describe(node: &Value) -> String {
    match node.get("title").and_then(Value::as_str) {
        Some(title) => format!("'{title}'"),
        None => serde_yaml::to_string(node)
            .map(|s| s.trim().replace('\n', ", "))
            .unwrap_or_default(),
    }
}

/// Build the typed node. Only called on validated values.
fn typed_node(value: &Value) -> TocNode {
    let str_field = |key: &str| value.get(key).and_then(Value::as_str).map(String::from);
    let children: Vec<TocNode> = value
        .get("children")
        .and_then(Value::as_sequence)
        .map(|seq| seq.iter().map(typed_node).collect())
        .unwrap_or_default();
    let kind = match (str_field("file"), children.is_empty()) {
        (Some(file), true) => NodeKind::File(file),
        (Some(file), false) => NodeKind::FileGroup { file, children },
        (None, _) => NodeKind::Group(children),
    };
    TocNode {
        title: str_field("title").unwrap_or_default(),
        menu: value.get("menu").and_then(Value::as_bool).unwrap_or(false),
        description: str_field("description"),
        kind,
    }
}
