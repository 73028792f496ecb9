//! Navigation derived from the manifest tree.
//!
//! Three views of the same [`TocNode`] tree:
//!
//! - [`top_level_entries`]: the menu bar. Each entry links either to its file
//!   page (`<stem>.html`) or, for groups, to a generated index (`<slug>.html`).
//! - [`flatten_files`]: every file in pre-order. This is the default build
//!   order and the first file becomes the root of the flat book TOC.
//! - [`SectionMap`]: output page → top-level section title, used to bucket
//!   copied images under `images/<section>/`.

use crate::manifest::TocNode;
use crate::naming;
use crate::types::NavItem;
use maud::{Markup, html};
use std::collections::HashMap;
use thiserror::Error;

/// Section for pages that are not nested under a top-level entry.
pub const DEFAULT_SECTION: &str = "other";

#[derive(Error, Debug, PartialEq)]
pub enum MenuError {
    #[error("auto-index pages '{first}' and '{second}' both map to '{slug}.html'")]
    SlugCollision {
        slug: String,
        first: String,
        second: String,
    },
    #[error("auto-index title '{0}' produces an empty slug")]
    EmptySlug(String),
    #[error("auto-index page '{title}' and the page built from '{file}' both map to '{target}'")]
    PageCollision {
        target: String,
        title: String,
        file: String,
    },
}

/// One entry of the top menu.
#[derive(Debug, Clone)]
pub struct TopLevelEntry<'a> {
    pub file: Option<&'a str>,
    pub title: &'a str,
    pub node: &'a TocNode,
    /// Link target relative to the docs root.
    pub target: String,
    pub is_auto_index: bool,
}

/// Link target of a page built from `file`.
pub fn page_target(file: &str) -> String {
    format!("{}.html", naming::file_stem(file))
}

/// Qualifying top-level entries, in order.
///
/// A node qualifies when it has a title and a file or children. Nodes with
/// children but no file become auto-index entries; their slugs must be unique.
pub fn top_level_entries<'a>(
    nodes: impl IntoIterator<Item = &'a TocNode>,
) -> Result<Vec<TopLevelEntry<'a>>, MenuError> {
    let mut entries = Vec::new();
    let mut slugs: HashMap<String, &'a str> = HashMap::new();
    for node in nodes {
        if node.title.is_empty() || (node.file().is_none() && node.children().is_empty()) {
            continue;
        }
        let entry = match node.file() {
            Some(file) => TopLevelEntry {
                file: Some(file),
                title: &node.title,
                node,
                target: page_target(file),
                is_auto_index: false,
            },
            None => {
                let slug = naming::slugify(&node.title);
                if slug.is_empty() {
                    return Err(MenuError::EmptySlug(node.title.clone()));
                }
                if let Some(first) = slugs.insert(slug.clone(), &node.title) {
                    return Err(MenuError::SlugCollision {
                        slug,
                        first: first.to_string(),
                        second: node.title.clone(),
                    });
                }
                TopLevelEntry {
                    file: None,
                    title: &node.title,
                    node,
                    target: format!("{slug}.html"),
                    is_auto_index: true,
                }
            }
        };
        entries.push(entry);
    }
    Ok(entries)
}

/// Top-level entries of the nodes flagged `menu: true`.
///
/// Fails when an auto-index page would land on the page of a file in the tree.
pub fn menu_entries(toc: &[TocNode]) -> Result<Vec<TopLevelEntry<'_>>, MenuError> {
    let entries = top_level_entries(toc.iter().filter(|node| node.menu))?;
    check_page_collisions(&entries, flatten_files(toc))?;
    Ok(entries)
}

/// Fails when the target of an auto-index entry equals the page built from
/// any of `files`.
pub fn check_page_collisions<'f>(
    entries: &[TopLevelEntry<'_>],
    files: impl IntoIterator<Item = &'f str>,
) -> Result<(), MenuError> {
    let index_pages: HashMap<&str, &str> = entries
        .iter()
        .filter(|e| e.is_auto_index)
        .map(|e| (e.target.as_str(), e.title))
        .collect();
    if index_pages.is_empty() {
        return Ok(());
    }
    for file in files {
        let target = page_target(file);
        if let Some(title) = index_pages.get(target.as_str()) {
            return Err(MenuError::PageCollision {
                target,
                title: title.to_string(),
                file: file.to_string(),
            });
        }
    }
    Ok(())
}

/// Every `file` in the tree, depth-first pre-order.
pub fn flatten_files(toc: &[TocNode]) -> Vec<&str> {
    fn walk<'a>(nodes: &'a [TocNode], out: &mut Vec<&'a str>) {
        for node in nodes {
            if let Some(file) = node.file() {
                out.push(file);
            }
            walk(node.children(), out);
        }
    }
    let mut files = Vec::new();
    walk(toc, &mut files);
    files
}

/// Title for each file in the tree. The first occurrence wins.
pub fn file_titles(toc: &[TocNode]) -> HashMap<&str, &str> {
    fn walk<'a>(nodes: &'a [TocNode], out: &mut HashMap<&'a str, &'a str>) {
        for node in nodes {
            if let Some(file) = node.file() {
                out.entry(file).or_insert(&node.title);
            }
            walk(node.children(), out);
        }
    }
    let mut titles = HashMap::new();
    walk(toc, &mut titles);
    titles
}

/// Navigation tree of the menu entries.
pub fn nav_tree(toc: &[TocNode]) -> Result<Vec<NavItem>, MenuError> {
    Ok(menu_entries(toc)?
        .into_iter()
        .map(|entry| NavItem {
            title: entry.title.to_string(),
            path: entry.target,
            description: entry.node.description.clone(),
            children: entry.node.children().iter().map(nav_item).collect(),
        })
        .collect())
}

fn nav_item(node: &TocNode) -> NavItem {
    NavItem {
        title: node.title.clone(),
        path: node.file().map(page_target).unwrap_or_default(),
        description: node.description.clone(),
        children: node.children().iter().map(nav_item).collect(),
    }
}

/// Output page name → section title.
#[derive(Debug, Clone, Default)]
pub struct SectionMap {
    sections: HashMap<String, String>,
}

impl SectionMap {
    /// Record every page nested below a top-level item under that item's title.
    pub fn from_nav(items: &[NavItem]) -> Self {
        fn walk(items: &[NavItem], section: &str, map: &mut HashMap<String, String>) {
            for item in items {
                if item.path.ends_with(".html") {
                    map.entry(item.path.clone())
                        .or_insert_with(|| section.to_string());
                }
                walk(&item.children, section, map);
            }
        }
        let mut sections = HashMap::new();
        for top in items {
            walk(&top.children, &top.title, &mut sections);
        }
        Self { sections }
    }

    /// Section of an output page, [`DEFAULT_SECTION`] when unknown.
    pub fn section_of(&self, output_name: &str) -> &str {
        self.sections
            .get(output_name)
            .map(String::as_str)
            .unwrap_or(DEFAULT_SECTION)
    }
}

/// Renders the top menu; the entry whose target is `current` is marked.
pub fn render_nav(entries: &[TopLevelEntry<'_>], current: &str) -> Markup {
    html! {
        ul class="site-nav-menu" id="site-nav-menu" {
            @for entry in entries {
                @let is_current = entry.target == current;
                li class=[is_current.then_some("current")] {
                    a href=(entry.target) { (entry.title) }
                }
            }
        }
    }
}
