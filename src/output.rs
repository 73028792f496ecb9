//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Output is organized around the course structure, not the filesystem. Each
//! toc entry leads with its positional index and title; file paths appear as
//! indented `Source:` context lines.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Site
//!     Intro Physics (en)
//!     Author: Physics Dept
//!
//! Toc
//! 001 Home [menu] → index.html
//!     Source: content/index.md
//! 002 Chapters [menu] → chapters.html
//!     001 motion → 01-motion.html
//!         Source: content/chapters/01-motion.md
//!
//! Build
//!     Outputs: html
//!     Docs: docs
//! ```
//!
//! ## Build report
//!
//! ```text
//! Written 7 files
//! Missing files (1)
//!     content/nope.md
//! Missing images (1)
//!     gone.png in content/index.md
//!         Tried: content/images/gone.png
//! Build finished with problems
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::manifest::{Manifest, NodeKind, TocNode};
use crate::menu;
use crate::naming;
use crate::report::BuildReport;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Path relative to `root` when below it, else as is.
fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Section heading with a count.
fn counted(label: &str, n: usize) -> String {
    format!("{label} ({n})")
}

// ============================================================================
// Check: manifest tree
// ============================================================================

fn node_lines(node: &TocNode, position: usize, depth: usize, top_level: bool, lines: &mut Vec<String>) {
    let base = indent(depth);
    let menu_marker = if node.menu { " [menu]" } else { "" };
    let target = match &node.kind {
        NodeKind::File(file) | NodeKind::FileGroup { file, .. } => Some(menu::page_target(file)),
        NodeKind::Group(_) if top_level && node.menu => {
            Some(format!("{}.html", naming::slugify(&node.title)))
        }
        NodeKind::Group(_) => None,
    };
    let header = format!("{}{} {}{}", base, format_index(position), node.title, menu_marker);
    match target {
        Some(target) => lines.push(format!("{header} → {target}")),
        None => lines.push(header),
    }
    if let Some(file) = node.file() {
        lines.push(format!("{}    Source: {}", base, file));
    }
    for (i, child) in node.children().iter().enumerate() {
        node_lines(child, i + 1, depth + 1, false, lines);
    }
}

/// Format the validated manifest for `coursebook check`.
pub fn format_manifest(manifest: &Manifest) -> Vec<String> {
    let mut lines = vec![
        "Site".to_string(),
        format!("    {} ({})", manifest.site.title, manifest.site.language),
        format!("    Author: {}", manifest.site.author),
        String::new(),
        "Toc".to_string(),
    ];
    for (i, node) in manifest.toc.iter().enumerate() {
        node_lines(node, i + 1, 0, true, &mut lines);
    }
    lines.push(String::new());
    lines.push("Build".to_string());
    lines.push(format!("    Outputs: {}", manifest.build.outputs.join(", ")));
    lines.push(format!("    Docs: {}", manifest.build.docs_dir));
    lines
}

pub fn print_manifest(manifest: &Manifest) {
    for line in format_manifest(manifest) {
        println!("{}", line);
    }
}

// ============================================================================
// Written files
// ============================================================================

/// One line per written path, relative to `root`.
pub fn format_written(paths: &[impl AsRef<Path>], root: &Path) -> Vec<String> {
    paths
        .iter()
        .map(|p| format!("    {}", display_path(p.as_ref(), root)))
        .collect()
}

pub fn print_written(paths: &[impl AsRef<Path>], root: &Path) {
    for line in format_written(paths, root) {
        println!("{}", line);
    }
}

// ============================================================================
// Build report
// ============================================================================

/// Format the end-of-build report. Empty categories are omitted.
pub fn format_report(report: &BuildReport, root: &Path) -> Vec<String> {
    let mut lines = vec![format!("Written {} files", report.written.len())];

    if !report.missing_files.is_empty() {
        lines.push(counted("Missing files", report.missing_files.len()));
        for file in &report.missing_files {
            lines.push(format!("    {}", file));
        }
    }

    if !report.skipped.is_empty() {
        lines.push(counted("Skipped", report.skipped.len()));
        for skip in &report.skipped {
            lines.push(format!("    {}: {}", skip.file, skip.reason));
        }
    }

    if !report.missing_images.is_empty() {
        lines.push(counted("Missing images", report.missing_images.len()));
        for image in &report.missing_images {
            lines.push(format!("    {} in {}", image.reference, image.document));
            lines.push(format!("        Tried: {}", display_path(&image.attempted, root)));
        }
    }

    if !report.videos.is_empty() {
        lines.push(counted("Video thumbnails", report.videos.len()));
        for (id, destinations) in &report.videos {
            for destination in destinations {
                lines.push(format!("    {} → {}", id, display_path(destination, root)));
            }
        }
    }

    if !report.thumbnail_failures.is_empty() {
        lines.push(counted("Thumbnail failures", report.thumbnail_failures.len()));
        for id in &report.thumbnail_failures {
            lines.push(format!("    {}", id));
        }
    }

    if !report.conversion_failures.is_empty() {
        lines.push(counted("Conversion failures", report.conversion_failures.len()));
        for failure in &report.conversion_failures {
            let first_line = failure.stderr.lines().next().unwrap_or("").trim();
            lines.push(format!("    {} [{}]: {}", failure.file, failure.format, first_line));
        }
    }

    if !report.dangling_images.is_empty() {
        lines.push(counted("Dangling image references", report.dangling_images.len()));
        for dangling in &report.dangling_images {
            lines.push(format!(
                "    {}: {}",
                display_path(&dangling.page, root),
                dangling.reference
            ));
        }
    }

    lines.push(if report.is_clean() {
        "Build clean".to_string()
    } else {
        "Build finished with problems".to_string()
    });
    lines
}

pub fn print_report(report: &BuildReport, root: &Path) {
    for line in format_report(report, root) {
        println!("{}", line);
    }
}
