//! Markdown rendering with pulldown-cmark.
//!
//! Tables, footnotes, definition lists, strikethrough and heading attributes
//! are enabled. A paragraph consisting of `[TOC]` alone is replaced by a
//! nested list of the document's headings; headings then get `id` anchors.
//! Documents without the marker render headings without ids.

use crate::naming;
use maud::html;
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, html as md_html};
use std::collections::HashMap;

const TOC_MARKER: &str = "[TOC]";

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_DEFINITION_LIST
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_HEADING_ATTRIBUTES
}

/// Render a markdown string to HTML.
pub fn to_html(source: &str) -> String {
    let parser = Parser::new_ext(source, options());
    let mut out = String::new();
    if !source.lines().any(|line| line.trim() == TOC_MARKER) {
        md_html::push_html(&mut out, parser);
        return out;
    }

    let mut events: Vec<Event<'_>> = parser.collect();
    let headings = anchor_headings(&mut events);
    md_html::push_html(&mut out, events.into_iter());
    out.replace(&format!("<p>{TOC_MARKER}</p>"), &render_toc(&headings))
}

#[derive(Debug)]
struct Heading {
    level: u32,
    id: String,
    text: String,
}

enum Step {
    Open,
    Text(String),
    Close,
    Skip,
}

/// Give every heading an id (keeping authored `{#id}` ones) and collect them.
fn anchor_headings(events: &mut [Event<'_>]) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut used: HashMap<String, usize> = HashMap::new();
    let mut open: Option<(usize, String)> = None;

    for i in 0..events.len() {
        let step = match &events[i] {
            Event::Start(Tag::Heading { .. }) => Step::Open,
            Event::Text(text) | Event::Code(text) => Step::Text(text.to_string()),
            Event::End(TagEnd::Heading(_)) => Step::Close,
            _ => Step::Skip,
        };
        match step {
            Step::Open => open = Some((i, String::new())),
            Step::Text(text) => {
                if let Some((_, buf)) = open.as_mut() {
                    buf.push_str(&text);
                }
            }
            Step::Close => {
                let Some((start, text)) = open.take() else {
                    continue;
                };
                if let Event::Start(Tag::Heading { level, id, .. }) = &mut events[start] {
                    let anchor = match id {
                        Some(existing) => existing.to_string(),
                        None => {
                            let anchor = unique_anchor(&text, &mut used);
                            *id = Some(CowStr::from(anchor.clone()));
                            anchor
                        }
                    };
                    headings.push(Heading {
                        level: *level as u32,
                        id: anchor,
                        text,
                    });
                }
            }
            Step::Skip => {}
        }
    }
    headings
}

fn unique_anchor(text: &str, used: &mut HashMap<String, usize>) -> String {
    let mut base = naming::slugify(text);
    if base.is_empty() {
        base = "section".to_string();
    }
    let count = used.entry(base.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        base
    } else {
        format!("{base}-{}", *count - 1)
    }
}

/// Nested `<ul>` of headings, one level per heading depth.
fn render_toc(headings: &[Heading]) -> String {
    let mut out = String::from("<div class=\"toc\">\n");
    let mut levels: Vec<u32> = Vec::new();
    for heading in headings {
        while levels.last().is_some_and(|&top| top > heading.level) {
            levels.pop();
            out.push_str("</li>\n</ul>\n");
        }
        match levels.last() {
            Some(&top) if top == heading.level => out.push_str("</li>\n<li>"),
            _ => {
                out.push_str("<ul>\n<li>");
                levels.push(heading.level);
            }
        }
        let link = html! { a href={ "#" (heading.id) } { (heading.text) } };
        out.push_str(&link.into_string());
    }
    for _ in levels {
        out.push_str("</li>\n</ul>\n");
    }
    out.push_str("</div>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_has_no_id_without_marker() {
        assert_eq!(to_html("# Hi"), "<h1>Hi</h1>\n");
    }

    #[test]
    fn tables_are_enabled() {
        let html = to_html("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn footnotes_are_enabled() {
        let html = to_html("Text[^1].\n\n[^1]: The note.\n");
        assert!(html.contains("footnote-definition"));
    }

    #[test]
    fn toc_marker_is_replaced() {
        let html = to_html("[TOC]\n\n# Intro\n\n## Details\n\n# Summary\n");
        assert!(!html.contains("[TOC]"));
        assert!(html.contains(r#"<h1 id="intro">Intro</h1>"#));
        assert!(html.contains(r##"<a href="#details">Details</a>"##));
        assert!(html.starts_with("<div class=\"toc\">"));
    }

    #[test]
    fn toc_nests_by_level() {
        let html = to_html("[TOC]\n\n# A\n\n## B\n\n# C\n");
        let expected = "<div class=\"toc\">\n<ul>\n<li><a href=\"#a\">A</a><ul>\n<li><a href=\"#b\">B</a></li>\n</ul>\n</li>\n<li><a href=\"#c\">C</a></li>\n</ul>\n</div>";
        assert!(html.starts_with(expected), "got: {html}");
    }

    #[test]
    fn duplicate_headings_get_suffixes() {
        let html = to_html("[TOC]\n\n# Notes\n\n# Notes\n");
        assert!(html.contains(r#"<h1 id="notes">Notes</h1>"#));
        assert!(html.contains(r#"<h1 id="notes-1">Notes</h1>"#));
    }

    #[test]
    fn authored_ids_are_kept() {
        let html = to_html("[TOC]\n\n# Intro {#start}\n");
        assert!(html.contains(r#"<h1 id="start">Intro</h1>"#));
        assert!(html.contains(r##"href="#start""##));
    }
}
