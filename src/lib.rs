//! # Coursebook
//!
//! A static site generator for course material. A single YAML manifest
//! (`_content.yml`) lists markdown chapters and Jupyter notebooks as a
//! hierarchical table of contents; coursebook turns that tree into a themed
//! HTML site with a navigation menu, and optionally into markdown, DOCX,
//! LaTeX, PDF, flat notebook copies and a Jupyter Book.
//!
//! # Architecture: Manifest-Driven Pipeline
//!
//! ```text
//! 1. Load      _content.yml  →  Manifest        (expand globs, validate, type)
//! 2. Derive    Manifest      →  .autogen/       (_menu.yml, _notebooks.yml, _config.yml)
//! 3. Export    files         →  docs/<fmt>/     (pandoc, nbconvert, jupyter-book)
//! 4. Render    files         →  docs/*.html     (markdown/notebook → page template)
//! 5. Check     docs/*.html   →  BuildReport     (thumbnails, dangling images)
//! ```
//!
//! Nothing in the pipeline aborts on a single bad document. Missing files,
//! missing images, failed conversions and failed downloads are collected in
//! a [`report::BuildReport`] and printed at the end of the build. Only a
//! malformed manifest or a missing page template stops a build.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`manifest`] | Loads `_content.yml`: `.autogen` glob expansion, `append_children`, validation, typed toc tree |
//! | [`config`] | Typed `site` / `footer` / `static` / `build` sections, output kinds, stock manifest |
//! | [`naming`] | `slugify` and stem-derived titles |
//! | [`menu`] | Top-level menu entries, flattened file order, navigation tree, section lookup |
//! | [`autogen`] | Derived manifests under `.autogen/` and the flat Jupyter Book `_toc.yml` |
//! | [`render`] | Markdown and notebook documents to HTML fragments |
//! | [`assets`] | Image lookup, section bucketing, video thumbnails, page consistency check |
//! | [`compose`] | `{{ slot }}` templates, page assembly, auto-index pages, download buttons |
//! | [`export`] | External converters: pandoc, nbconvert, jupyter-book, sources directory |
//! | [`generate`] | Build orchestration: exports, then the HTML site |
//! | [`report`] | [`report::BuildReport`] accumulator |
//! | [`output`] | CLI output formatting |
//! | [`logging`] | Tracing subscriber setup |
//! | [`types`] | Shared [`types::NavItem`] navigation node |
//!
//! # Design Decisions
//!
//! ## Runtime Templates, Compile-Time Fragments
//!
//! The page shell (head, header, footer, theme toggle, page) is read at build
//! time from `build.templates_dir` so course authors can restyle a site
//! without rebuilding the binary. Everything coursebook generates *inside*
//! that shell (navigation menu, auto-index pages, download buttons) is built
//! with [Maud](https://maud.lambda.xyz/), so those fragments are escaped and
//! checked at compile time. Substitution is a single regex pass: a value
//! containing `{{ x }}` is never re-expanded.
//!
//! ## External Converters Behind a Trait
//!
//! DOCX, LaTeX, PDF and Jupyter Book output come from `pandoc`, `jupyter
//! nbconvert` and `jupyter-book`. They are invoked through
//! [`export::ExternalTool`] so tests can substitute a recording double and
//! the build never needs those programs installed to be exercised.
//!
//! ## Section-Bucketed Images
//!
//! Content images are copied to `docs/images/<section>/`, where the section
//! is the slug of the top-level menu entry that contains the document. Two
//! chapters in different sections may therefore use the same image file name
//! without clobbering each other.
//!
//! ## Manifest Is the Only Config
//!
//! There is no separate config file and no cascading: site metadata, build
//! directories and tool names all live in `_content.yml`. The `.autogen/`
//! files mirror it for downstream tools and are regenerated as a set when
//! any of them is missing.

pub mod assets;
pub mod autogen;
pub mod compose;
pub mod config;
pub mod export;
pub mod generate;
pub mod logging;
pub mod manifest;
pub mod menu;
pub mod naming;
pub mod output;
pub mod render;
pub mod report;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
