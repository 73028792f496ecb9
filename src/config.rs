//! Typed manifest sections.
//!
//! The manifest (`_content.yml`) carries five top-level sections. Shape
//! checks run in [`crate::manifest`] against the raw YAML so error messages
//! can name the offending key; once a section passes, it is deserialized into
//! the structs below.
//!
//! ```yaml
//! site:
//!   title: Intro Physics
//!   author: Physics Dept
//!   description: Lecture notes and labs
//!   logo: static/images/logo.png
//!   favicon: static/images/favicon.ico
//!   theme: { default: light, light: light, dark: dark }
//!   language: en
//!   github_url: https://example.org/physics
//! footer:
//!   text: "(c) Physics Dept"
//! static:
//!   css: [{ path: static/css/theme-light.css, description: Light theme }]
//!   images: []
//!   js: []
//!   templates: []
//!   themes: []
//! build:
//!   outputs: [html]
//!   output_dir: _build
//!   docs_dir: docs
//!   sources_dir: docs/sources
//!   notebooks_dir: content/notebooks
//!   static_dir: static
//!   images_dir: content/images
//! ```
//!
//! Paths are relative to the directory holding the manifest.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Site-level metadata. Every field is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub title: String,
    pub author: String,
    pub description: String,
    /// Logo path, usually under `static/`.
    pub logo: String,
    pub favicon: String,
    pub theme: ThemeConfig,
    /// Language code for `<html lang>`.
    pub language: String,
    /// Source repository URL.
    pub github_url: String,
}

/// Theme identifiers: the one active on first load plus the light/dark pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeConfig {
    pub default: String,
    pub light: String,
    pub dark: String,
}

impl ThemeConfig {
    /// Stylesheet for the light theme, relative to the docs root.
    pub fn light_css(&self) -> String {
        format!("css/theme-{}.css", self.light)
    }

    /// Stylesheet for the dark theme, relative to the docs root.
    pub fn dark_css(&self) -> String {
        format!("css/theme-{}.css", self.dark)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FooterConfig {
    pub text: String,
}

/// One static asset listed in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticEntry {
    pub path: String,
    pub description: String,
}

/// Static assets grouped by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticConfig {
    pub images: Vec<StaticEntry>,
    pub css: Vec<StaticEntry>,
    pub js: Vec<StaticEntry>,
    pub templates: Vec<StaticEntry>,
    pub themes: Vec<StaticEntry>,
}

/// Build outputs and directory layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Output kinds built when no format flag is given (`html`, `md`, ...).
    pub outputs: Vec<String>,
    /// Intermediate build directory.
    pub output_dir: String,
    /// Published site root.
    pub docs_dir: String,
    /// Per-document download bundle root.
    pub sources_dir: String,
    pub notebooks_dir: String,
    pub static_dir: String,
    /// Primary image root searched when resolving references.
    pub images_dir: String,
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_templates_dir() -> String {
    "static/templates".to_string()
}

/// Program names of the external tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub pandoc: String,
    pub jupyter: String,
    pub jupyter_book: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            pandoc: "pandoc".to_string(),
            jupyter: "jupyter".to_string(),
            jupyter_book: "jupyter-book".to_string(),
        }
    }
}

/// Build directories resolved against the project root.
#[derive(Debug, Clone)]
pub struct BuildPaths {
    pub root: PathBuf,
    pub output_dir: PathBuf,
    pub docs_dir: PathBuf,
    pub sources_dir: PathBuf,
    pub notebooks_dir: PathBuf,
    pub static_dir: PathBuf,
    pub images_dir: PathBuf,
    pub templates_dir: PathBuf,
}

impl BuildConfig {
    pub fn paths(&self, root: &Path) -> BuildPaths {
        BuildPaths {
            root: root.to_path_buf(),
            output_dir: root.join(&self.output_dir),
            docs_dir: root.join(&self.docs_dir),
            sources_dir: root.join(&self.sources_dir),
            notebooks_dir: root.join(&self.notebooks_dir),
            static_dir: root.join(&self.static_dir),
            images_dir: root.join(&self.images_dir),
            templates_dir: root.join(&self.templates_dir),
        }
    }

    /// Parsed `outputs`, dropping (and logging) names that are not known.
    pub fn output_kinds(&self) -> Vec<OutputKind> {
        let mut kinds = Vec::new();
        for name in &self.outputs {
            match name.parse::<OutputKind>() {
                Ok(kind) if !kinds.contains(&kind) => kinds.push(kind),
                Ok(_) => {}
                Err(e) => tracing::warn!("{e}; ignoring"),
            }
        }
        kinds
    }
}

/// One family of build output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutputKind {
    Html,
    Markdown,
    Docx,
    Latex,
    Pdf,
    Notebook,
    JupyterBook,
}

impl OutputKind {
    pub const ALL: [OutputKind; 7] = [
        OutputKind::Html,
        OutputKind::Markdown,
        OutputKind::Docx,
        OutputKind::Latex,
        OutputKind::Pdf,
        OutputKind::Notebook,
        OutputKind::JupyterBook,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OutputKind::Html => "html",
            OutputKind::Markdown => "md",
            OutputKind::Docx => "docx",
            OutputKind::Latex => "tex",
            OutputKind::Pdf => "pdf",
            OutputKind::Notebook => "ipynb",
            OutputKind::JupyterBook => "jupyter",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "html" => Ok(OutputKind::Html),
            "md" | "markdown" => Ok(OutputKind::Markdown),
            "docx" => Ok(OutputKind::Docx),
            "tex" | "latex" => Ok(OutputKind::Latex),
            "pdf" => Ok(OutputKind::Pdf),
            "ipynb" | "notebook" => Ok(OutputKind::Notebook),
            "jupyter" | "jupyter-book" => Ok(OutputKind::JupyterBook),
            other => Err(format!("unknown output kind '{other}'")),
        }
    }
}

/// Returns a fully-commented stock manifest.
///
/// Used by the `init` CLI command.
pub fn stock_manifest_yaml() -> &'static str {
    r##"# Coursebook manifest
# ===================
# All paths are relative to the directory holding this file.

site:
  title: My Course
  author: Course Staff
  description: Lecture notes, notebooks and labs
  logo: static/images/logo.png
  favicon: static/images/favicon.ico
  # Stylesheets are looked up as css/theme-<name>.css
  theme:
    default: light
    light: light
    dark: dark
  language: en
  github_url: https://github.com/example/course

# Navigation tree. Nodes with `menu: true` appear in the top menu.
# A node with children and no file gets a generated index page.
# Nesting is limited to four levels.
toc:
  - title: Home
    menu: true
    file: content/index.md
  - title: Notebooks
    menu: true
    description: Worked examples
    children:
      # Expands to one entry per match, sorted by path.
      - .autogen: content/notebooks/*.ipynb
  - title: Labs
    menu: true
    file: content/labs.md
    # Appends one entry per file in the directory after explicit children.
    append_children: content/labs

footer:
  text: "Released under CC-BY 4.0"

static:
  images:
    - path: static/images/logo.png
      description: Site logo
  css:
    - path: static/css/theme-light.css
      description: Light theme
    - path: static/css/theme-dark.css
      description: Dark theme
  js: []
  templates: []
  themes: []

build:
  # Built when `coursebook build` runs without format flags.
  # Known kinds: html, md, docx, tex, pdf, ipynb, jupyter
  outputs: [html]
  output_dir: _build
  docs_dir: docs
  sources_dir: docs/sources
  notebooks_dir: content/notebooks
  static_dir: static
  images_dir: content/images
  # templates_dir: static/templates
  # tools:
  #   pandoc: pandoc
  #   jupyter: jupyter
  #   jupyter_book: jupyter-book
"##
}
