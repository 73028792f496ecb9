//! Full-page assembly from plain-text templates.
//!
//! Templates are HTML files with `{{ name }}` placeholders. Substitution is a
//! single pass of exact slot replacement: no conditionals, no loops, and
//! values are never re-scanned for placeholders. Unknown placeholders are
//! left in place.
//!
//! | Template | Slots |
//! |----------|-------|
//! | `head.html` | `title`, `css_light`, `css_dark`, `favicon` |
//! | `header.html` | `logo`, `title`, `description` |
//! | `footer.html` | `footer_text` |
//! | `theme-toggle.html` | `default_theme` |
//! | `page.html` | `language`, `head`, `header`, `menu`, `theme_toggle`, `downloads`, `body`, `footer` |
//!
//! The default set is embedded at compile time and written out by
//! `coursebook init --templates <dir>`.

use crate::config::{FooterConfig, SiteConfig};
use crate::manifest::{NodeKind, TocNode};
use crate::menu;
use crate::render::DocumentKind;
use maud::{Markup, html};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

static SLOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

pub const HEAD: &str = "head.html";
pub const HEADER: &str = "header.html";
pub const FOOTER: &str = "footer.html";
pub const THEME_TOGGLE: &str = "theme-toggle.html";
pub const PAGE: &str = "page.html";

/// Embedded default templates, by file name.
pub const DEFAULT_TEMPLATES: [(&str, &str); 5] = [
    (HEAD, include_str!("../static/templates/head.html")),
    (HEADER, include_str!("../static/templates/header.html")),
    (FOOTER, include_str!("../static/templates/footer.html")),
    (THEME_TOGGLE, include_str!("../static/templates/theme-toggle.html")),
    (PAGE, include_str!("../static/templates/page.html")),
];

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("required template not found: {0}")]
    MissingTemplate(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    text: String,
}

impl Template {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Substitute `slots` into the template.
    pub fn render(&self, slots: &[(&str, &str)]) -> String {
        let values: HashMap<&str, &str> = slots.iter().copied().collect();
        SLOT_RE
            .replace_all(&self.text, |caps: &Captures| match values.get(&caps[1]) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

/// The five page templates.
#[derive(Debug, Clone)]
pub struct Templates {
    pub head: Template,
    pub header: Template,
    pub footer: Template,
    pub theme_toggle: Template,
    pub page: Template,
}

impl Templates {
    /// Read every template from `dir`. Any missing file is fatal.
    pub fn load(dir: &Path) -> Result<Self, ComposeError> {
        let read = |name: &str| -> Result<Template, ComposeError> {
            let path = dir.join(name);
            if !path.is_file() {
                return Err(ComposeError::MissingTemplate(path));
            }
            Ok(Template::new(fs::read_to_string(&path)?))
        };
        Ok(Self {
            head: read(HEAD)?,
            header: read(HEADER)?,
            footer: read(FOOTER)?,
            theme_toggle: read(THEME_TOGGLE)?,
            page: read(PAGE)?,
        })
    }
}

/// Write the embedded templates into `dir`, returning the written paths.
pub fn write_default_templates(dir: &Path) -> Result<Vec<PathBuf>, ComposeError> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for (name, text) in DEFAULT_TEMPLATES {
        let path = dir.join(name);
        fs::write(&path, text)?;
        written.push(path);
    }
    Ok(written)
}

/// HTML-escape a slot value.
pub fn escape(text: &str) -> String {
    html! { (text) }.into_string()
}

/// Logos configured under `static/` are served from the docs root.
pub fn site_relative(path: &str) -> String {
    match path.strip_prefix("static/") {
        Some(rest) => format!("./{rest}"),
        None => path.to_string(),
    }
}

/// Assembles pages that share one site chrome.
pub struct PageComposer {
    page: Template,
    head: Template,
    language: String,
    header_html: String,
    footer_html: String,
    theme_toggle_html: String,
    site_title: String,
    css_light: String,
    css_dark: String,
    favicon: String,
}

impl PageComposer {
    pub fn new(templates: Templates, site: &SiteConfig, footer: &FooterConfig) -> Self {
        let header_html = templates.header.render(&[
            ("logo", &escape(&site_relative(&site.logo))),
            ("title", &escape(&site.title)),
            ("description", &escape(&site.description)),
        ]);
        let footer_html = templates
            .footer
            .render(&[("footer_text", &escape(&footer.text))]);
        let theme_toggle_html = templates
            .theme_toggle
            .render(&[("default_theme", &escape(&site.theme.default))]);
        Self {
            page: templates.page,
            head: templates.head,
            language: escape(&site.language),
            header_html,
            footer_html,
            theme_toggle_html,
            site_title: site.title.clone(),
            css_light: escape(&site.theme.light_css()),
            css_dark: escape(&site.theme.dark_css()),
            favicon: escape(&site_relative(&site.favicon)),
        }
    }

    /// `<title> | <site title>`
    pub fn page_title(&self, title: &str) -> String {
        format!("{title} | {}", self.site_title)
    }

    /// Full HTML document around `body`.
    pub fn compose(&self, title: &str, body: &str, menu_html: &str, downloads_html: &str) -> String {
        let head = self.head.render(&[
            ("title", &escape(title)),
            ("css_light", &self.css_light),
            ("css_dark", &self.css_dark),
            ("favicon", &self.favicon),
        ]);
        self.page.render(&[
            ("language", &self.language),
            ("head", &head),
            ("header", &self.header_html),
            ("menu", menu_html),
            ("theme_toggle", &self.theme_toggle_html),
            ("downloads", downloads_html),
            ("body", body),
            ("footer", &self.footer_html),
        ])
    }
}

// ============================================================================
// Auto-index pages
// ============================================================================

/// Body of the generated index page for a node with children but no file.
///
/// Child files become `<li>` links and child subtrees become headings (`h2`
/// at the first level, capped at `h4`). All list items are collected under
/// one `<ul class="menu-section">`, which is only emitted when there is at
/// least one.
pub fn render_auto_index(node: &TocNode) -> String {
    let mut body = html! { h2 { (node.title) } }.into_string();
    if let Some(description) = node.description.as_deref().filter(|d| !d.is_empty()) {
        body.push_str(&html! { div.menu-description { (description) } }.into_string());
    }
    render_level(node.children(), 1, &mut body);
    body
}

/// One level of an auto-index. Consecutive file children share a
/// `<ul class="menu-section">`; headings close the current list.
fn render_level(children: &[TocNode], level: usize, out: &mut String) {
    let depth = (level + 1).min(4);
    let heading = |inner: Markup| -> String {
        match depth {
            2 => html! { h2 { (inner) } },
            3 => html! { h3 { (inner) } },
            _ => html! { h4 { (inner) } },
        }
        .into_string()
    };
    let mut items: Vec<Markup> = Vec::new();
    for child in children {
        match &child.kind {
            NodeKind::File(file) => items.push(page_link(file, &child.title)),
            NodeKind::FileGroup { file, children } => {
                flush_list(&mut items, out);
                out.push_str(&heading(page_link(file, &child.title)));
                render_level(children, level + 1, out);
            }
            NodeKind::Group(children) => {
                flush_list(&mut items, out);
                out.push_str(&heading(html! { (child.title) }));
                render_level(children, level + 1, out);
            }
        }
    }
    flush_list(&mut items, out);
}

fn flush_list(items: &mut Vec<Markup>, out: &mut String) {
    if items.is_empty() {
        return;
    }
    let list = html! {
        ul.menu-section {
            @for item in items.drain(..) {
                li { (item) }
            }
        }
    };
    out.push_str(&list.into_string());
}

fn page_link(file: &str, title: &str) -> Markup {
    html! { a href=(menu::page_target(file)) { (title) } }
}

// ============================================================================
// Download buttons
// ============================================================================

/// Links to the exported variants of a page.
pub fn download_buttons(stem: &str, kind: DocumentKind, has_jupyter_book: bool) -> Markup {
    let formats = [("pdf", "PDF"), ("docx", "Word"), ("tex", "LaTeX"), ("md", "Markdown")];
    html! {
        nav.downloads aria-label="Downloads" {
            @for (ext, label) in formats {
                a.download href={ (ext) "/" (stem) "." (ext) } download { (label) }
            }
            @if kind == DocumentKind::Notebook {
                a.download href={ "ipynb/" (stem) ".ipynb" } download { "Notebook" }
                @if has_jupyter_book {
                    a.download href={ "jupyter-book/" (stem) ".html" } { "Jupyter Book" }
                }
            }
        }
    }
}
