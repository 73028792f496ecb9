//! Machine-generated manifests derived from `_content.yml`.
//!
//! ```text
//! <root>/
//! ├── _toc.yml               # flat Jupyter Book table of contents
//! └── .autogen/
//!     ├── _notebooks.yml     # every notebook in the tree, in order
//!     ├── _menu.yml          # navigation tree of the menu entries
//!     └── _config.yml        # site + build mirror
//! ```
//!
//! The `.autogen` files are regenerated as a set whenever any one is missing;
//! they are never diffed for staleness.

use crate::config::{BuildConfig, SiteConfig};
use crate::manifest::{Manifest, TocNode};
use crate::menu::{self, MenuError};
use crate::types::NavItem;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const AUTOGEN_DIR: &str = ".autogen";
pub const NOTEBOOKS_FILE: &str = "_notebooks.yml";
pub const MENU_FILE: &str = "_menu.yml";
pub const CONFIG_FILE: &str = "_config.yml";
pub const TOC_FILE: &str = "_toc.yml";

const HEADER: &str = "# AUTO-GENERATED FILE. DO NOT EDIT.\n";
const SOURCE_EXTENSIONS: [&str; 2] = ["md", "ipynb"];

#[derive(Error, Debug)]
pub enum AutogenError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Menu(#[from] MenuError),
    #[error("no files found in toc")]
    NoFiles,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct NotebookList {
    pub notebooks: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MenuFile {
    pub menu: Vec<NavItem>,
}

#[derive(Debug, Serialize)]
struct ConfigMirror<'a> {
    site: &'a SiteConfig,
    build: &'a BuildConfig,
}

/// Flat Jupyter Book TOC: the first file is the root, the rest chapters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlatToc {
    pub format: String,
    pub root: String,
    #[serde(default)]
    pub chapters: Vec<TocChapter>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TocChapter {
    pub file: String,
}

pub fn autogen_dir(root: &Path) -> PathBuf {
    root.join(AUTOGEN_DIR)
}

fn derived_paths(root: &Path) -> [PathBuf; 3] {
    let dir = autogen_dir(root);
    [
        dir.join(NOTEBOOKS_FILE),
        dir.join(MENU_FILE),
        dir.join(CONFIG_FILE),
    ]
}

fn write_with_header<T: Serialize>(path: &Path, value: &T) -> Result<(), AutogenError> {
    let body = serde_yaml::to_string(value)?;
    fs::write(path, format!("{HEADER}{body}"))?;
    Ok(())
}

/// Notebook files of the tree, pre-order, first occurrence only.
pub fn notebook_list(toc: &[TocNode]) -> NotebookList {
    let mut notebooks: Vec<String> = Vec::new();
    for file in menu::flatten_files(toc) {
        if file.to_lowercase().ends_with(".ipynb") && !notebooks.iter().any(|n| n == file) {
            notebooks.push(file.to_string());
        }
    }
    NotebookList { notebooks }
}

/// Write all three derived manifests.
pub fn write_all(manifest: &Manifest) -> Result<Vec<PathBuf>, AutogenError> {
    fs::create_dir_all(autogen_dir(&manifest.root))?;
    let [notebooks, menu_path, config] = derived_paths(&manifest.root);

    write_with_header(&notebooks, &notebook_list(&manifest.toc))?;
    write_with_header(
        &menu_path,
        &MenuFile {
            menu: menu::nav_tree(&manifest.toc)?,
        },
    )?;
    write_with_header(
        &config,
        &ConfigMirror {
            site: &manifest.site,
            build: &manifest.build,
        },
    )?;
    Ok(vec![notebooks, menu_path, config])
}

/// Regenerate the derived manifests if any is missing (or always with `force`).
///
/// Returns the written paths; empty when nothing had to be done.
pub fn ensure(manifest: &Manifest, force: bool) -> Result<Vec<PathBuf>, AutogenError> {
    let missing = derived_paths(&manifest.root).iter().any(|p| !p.is_file());
    if !force && !missing {
        tracing::debug!("derived manifests present");
        return Ok(Vec::new());
    }
    let written = write_all(manifest)?;
    tracing::info!(count = written.len(), "wrote derived manifests");
    Ok(written)
}

/// Navigation tree from `.autogen/_menu.yml`.
pub fn read_menu(root: &Path) -> Result<Vec<NavItem>, AutogenError> {
    let text = fs::read_to_string(autogen_dir(root).join(MENU_FILE))?;
    let file: MenuFile = serde_yaml::from_str(&text)?;
    Ok(file.menu)
}

// ============================================================================
// Flat TOC
// ============================================================================

fn without_extension(file: &str) -> String {
    let path = Path::new(file);
    match path.extension() {
        Some(_) => path.with_extension("").to_string_lossy().replace('\\', "/"),
        None => file.to_string(),
    }
}

/// Flat TOC of every file in pre-order. A file listed more than once keeps
/// only its first position.
pub fn flat_toc(toc: &[TocNode]) -> Result<FlatToc, AutogenError> {
    let mut files: Vec<String> = Vec::new();
    for file in menu::flatten_files(toc).into_iter().map(without_extension) {
        if !files.contains(&file) {
            files.push(file);
        }
    }
    let (root, rest) = files.split_first().ok_or(AutogenError::NoFiles)?;
    Ok(FlatToc {
        format: "jb-book".to_string(),
        root: root.clone(),
        chapters: rest
            .iter()
            .map(|file| TocChapter { file: file.clone() })
            .collect(),
    })
}

/// Write `<root>/_toc.yml` and return its path.
pub fn write_flat_toc(manifest: &Manifest) -> Result<PathBuf, AutogenError> {
    let toc = flat_toc(&manifest.toc)?;
    let path = manifest.root.join(TOC_FILE);
    fs::write(&path, serde_yaml::to_string(&toc)?)?;
    tracing::info!(
        path = %path.display(),
        files = toc.chapters.len() + 1,
        "wrote flat toc"
    );
    Ok(path)
}

/// Problems with a flat TOC: a root that is not a source file, an empty
/// chapter list, or a file listed twice.
pub fn check_flat_toc(toc: &FlatToc, root: &Path) -> Vec<String> {
    let mut problems = Vec::new();
    let mut seen = HashSet::from([toc.root.as_str()]);
    for chapter in &toc.chapters {
        if !seen.insert(chapter.file.as_str()) {
            problems.push(format!("duplicate file '{}'", chapter.file));
        }
    }
    let root_exists = SOURCE_EXTENSIONS
        .iter()
        .any(|ext| root.join(format!("{}.{ext}", toc.root)).is_file());
    if !root_exists {
        problems.push(format!("root '{}' is not a source file", toc.root));
    }
    if toc.chapters.is_empty() {
        problems.push("chapters list is empty".to_string());
    }
    problems
}

/// Notebooks of the tree whose metadata has no kernelspec name.
///
/// Jupyter Book executes notebooks with their declared kernel, so one
/// without a kernelspec fails the book build. Unreadable notebooks are
/// reported the same way.
pub fn check_notebook_kernels(toc: &[TocNode], root: &Path) -> Vec<String> {
    let mut problems = Vec::new();
    for notebook in notebook_list(toc).notebooks {
        let kernel = fs::read_to_string(root.join(&notebook))
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str::<Value>(&text).map_err(|e| e.to_string()))
            .map(|nb| {
                nb.pointer("/metadata/kernelspec/name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| !name.is_empty())
            });
        match kernel {
            Ok(true) => {}
            Ok(false) => problems.push(format!("notebook '{notebook}' has no kernelspec")),
            Err(e) => problems.push(format!("notebook '{notebook}' cannot be read: {e}")),
        }
    }
    problems
}
