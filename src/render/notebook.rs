//! Notebook (`.ipynb`, nbformat 4) rendering.
//!
//! Cells are decoded one at a time so a malformed cell or output only drops
//! that piece of the page:
//!
//! ```text
//! markdown cell  →  <div class="markdown-cell">rendered markdown</div>
//! code cell      →  <div class="code-cell-block">
//!                      <pre class="code-cell"><code>source</code></pre>
//!                      outputs, in stored order
//!                   </div>
//! raw cell       →  (nothing)
//! ```
//!
//! Output mapping:
//!
//! | Output | HTML |
//! |--------|------|
//! | `stream` | `<pre class="stream-output">` |
//! | `text/plain` | `<pre class="text-output">` |
//! | `image/png`, `image/jpeg` | `<img class="image-output">` with a base64 data URI |
//! | `text/html` | passed through in `<div class="html-output">` |
//! | `error` | `<div class="error-output">` with name, value and traceback |

use super::Fragment;
use super::markdown;
use maud::{Markup, PreEscaped, html};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static ANSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap());

/// Notebook text fields are either one string or a list of lines.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MultilineString {
    One(String),
    Lines(Vec<String>),
}

impl Default for MultilineString {
    fn default() -> Self {
        MultilineString::One(String::new())
    }
}

impl MultilineString {
    pub fn joined(&self) -> String {
        match self {
            MultilineString::One(s) => s.clone(),
            MultilineString::Lines(lines) => lines.concat(),
        }
    }
}

#[derive(Deserialize)]
struct NotebookFile {
    #[serde(default)]
    cells: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
enum Cell {
    Markdown {
        #[serde(default)]
        source: MultilineString,
    },
    Code {
        #[serde(default)]
        source: MultilineString,
        #[serde(default)]
        outputs: Vec<Value>,
    },
    Raw {},
}

#[derive(Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
enum Output {
    Stream {
        #[serde(default)]
        text: MultilineString,
    },
    ExecuteResult {
        #[serde(default)]
        data: BTreeMap<String, Value>,
    },
    DisplayData {
        #[serde(default)]
        data: BTreeMap<String, Value>,
    },
    Error {
        #[serde(default)]
        ename: String,
        #[serde(default)]
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

/// Render every cell of a notebook document into fragments.
///
/// `label` names the notebook in log lines. Only a document that is not
/// valid notebook JSON fails; per-cell problems are logged and skipped.
pub fn render_cells(json: &str, label: &str) -> Result<Vec<Fragment>, serde_json::Error> {
    let notebook: NotebookFile = serde_json::from_str(json)?;
    let mut fragments = Vec::with_capacity(notebook.cells.len());
    for (index, raw) in notebook.cells.into_iter().enumerate() {
        let cell = match serde_json::from_value::<Cell>(raw) {
            Ok(cell) => cell,
            Err(e) => {
                tracing::warn!(notebook = label, cell = index + 1, "skipping cell: {e}");
                continue;
            }
        };
        match cell {
            Cell::Markdown { source } => {
                let source = source.joined();
                let body = markdown::to_html(&source);
                fragments.push(Fragment {
                    html: html! { div.markdown-cell { (PreEscaped(body)) } }.into_string(),
                    source: Some(source),
                });
            }
            Cell::Code { source, outputs } => {
                let source = source.joined();
                let rendered: Vec<Markup> = outputs
                    .into_iter()
                    .enumerate()
                    .filter_map(|(i, output)| match render_output(output) {
                        Ok(markup) => Some(markup),
                        Err(e) => {
                            tracing::warn!(
                                notebook = label,
                                cell = index + 1,
                                output = i + 1,
                                "skipping output: {e}"
                            );
                            None
                        }
                    })
                    .collect();
                let block = html! {
                    div.code-cell-block {
                        pre.code-cell { code { (source) } }
                        @for output in &rendered {
                            (output)
                        }
                    }
                };
                fragments.push(Fragment {
                    html: block.into_string(),
                    source: Some(source),
                });
            }
            Cell::Raw {} => {
                tracing::debug!(notebook = label, cell = index + 1, "raw cell not rendered");
            }
        }
    }
    Ok(fragments)
}

fn render_output(raw: Value) -> Result<Markup, serde_json::Error> {
    let output: Output = serde_json::from_value(raw)?;
    Ok(match output {
        Output::Stream { text } => html! { pre.stream-output { (text.joined()) } },
        Output::ExecuteResult { data } | Output::DisplayData { data } => render_mime_bundle(&data)?,
        Output::Error {
            ename,
            evalue,
            traceback,
        } => {
            let lines: Vec<String> = traceback
                .iter()
                .map(|line| ANSI_RE.replace_all(line, "").into_owned())
                .collect();
            html! {
                div.error-output {
                    b { (ename) ": " (evalue) }
                    br;
                    @for (i, line) in lines.iter().enumerate() {
                        @if i > 0 { br; }
                        (line)
                    }
                }
            }
        }
    })
}

/// Every supported representation in the bundle, in fixed priority order.
fn render_mime_bundle(data: &BTreeMap<String, Value>) -> Result<Markup, serde_json::Error> {
    let text = |key: &str| -> Result<Option<String>, serde_json::Error> {
        data.get(key)
            .map(|v| serde_json::from_value::<MultilineString>(v.clone()).map(|m| m.joined()))
            .transpose()
    };
    let plain = text("text/plain")?;
    let png = text("image/png")?.map(|d| strip_whitespace(&d));
    let jpeg = text("image/jpeg")?.map(|d| strip_whitespace(&d));
    let rich = text("text/html")?;
    Ok(html! {
        @if let Some(plain) = plain {
            pre.text-output { (plain) }
        }
        @if let Some(png) = png {
            img.image-output src={ "data:image/png;base64," (png) } alt="output";
        }
        @if let Some(jpeg) = jpeg {
            img.image-output src={ "data:image/jpeg;base64," (jpeg) } alt="output";
        }
        @if let Some(rich) = rich {
            div.html-output { (PreEscaped(rich)) }
        }
    })
}

fn strip_whitespace(data: &str) -> String {
    data.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn notebook(cells: Value) -> String {
        json!({ "cells": cells, "metadata": {}, "nbformat": 4, "nbformat_minor": 5 }).to_string()
    }

    fn code_cell(source: &str, outputs: Value) -> Value {
        json!({
            "cell_type": "code",
            "execution_count": 1,
            "metadata": {},
            "source": source,
            "outputs": outputs,
        })
    }

    fn render(cells: Value) -> Vec<Fragment> {
        render_cells(&notebook(cells), "test.ipynb").unwrap()
    }

    #[test]
    fn markdown_then_code_with_stream() {
        let fragments = render(json!([
            { "cell_type": "markdown", "metadata": {}, "source": ["# Title"] },
            code_cell("print(1)", json!([
                { "output_type": "stream", "name": "stdout", "text": ["hello\n"] }
            ])),
        ]));
        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].html.starts_with(r#"<div class="markdown-cell">"#));
        assert!(fragments[0].html.contains("<h1>Title</h1>"));
        assert!(fragments[1].html.starts_with(r#"<div class="code-cell-block">"#));
        assert!(fragments[1].html.contains("print(1)"));
        assert!(fragments[1].html.contains(r#"<pre class="stream-output">hello"#));
    }

    #[test]
    fn source_lists_are_concatenated() {
        let fragments = render(json!([
            { "cell_type": "markdown", "source": ["Line one\n", "line two"] }
        ]));
        assert_eq!(fragments[0].source.as_deref(), Some("Line one\nline two"));
    }

    #[test]
    fn code_is_escaped() {
        let fragments = render(json!([code_cell("if a < b: pass", json!([]))]));
        assert!(fragments[0].html.contains("if a &lt; b: pass"));
    }

    #[test]
    fn execute_result_emits_every_representation() {
        let fragments = render(json!([code_cell("x", json!([{
            "output_type": "execute_result",
            "execution_count": 1,
            "metadata": {},
            "data": {
                "text/plain": ["<Figure>"],
                "image/png": "iVBORw0KGgo=\n",
                "text/html": "<table><tr><td>1</td></tr></table>"
            }
        }]))]));
        let html = &fragments[0].html;
        assert!(html.contains(r#"<pre class="text-output">&lt;Figure&gt;</pre>"#));
        assert!(html.contains(r#"src="data:image/png;base64,iVBORw0KGgo=""#));
        assert!(html.contains(r#"<div class="html-output"><table><tr><td>1</td></tr></table></div>"#));
    }

    #[test]
    fn jpeg_display_data_is_embedded() {
        let fragments = render(json!([code_cell("show()", json!([{
            "output_type": "display_data",
            "metadata": {},
            "data": { "image/jpeg": ["/9j/4AAQ", "SkZJRg=="] }
        }]))]));
        assert!(fragments[0].html.contains("data:image/jpeg;base64,/9j/4AAQSkZJRg=="));
    }

    #[test]
    fn error_output_joins_traceback() {
        let fragments = render(json!([code_cell("1/0", json!([{
            "output_type": "error",
            "ename": "ZeroDivisionError",
            "evalue": "division by zero",
            "traceback": ["\u{1b}[0;31mTraceback\u{1b}[0m", "line 1"]
        }]))]));
        let html = &fragments[0].html;
        assert!(html.contains("<b>ZeroDivisionError: division by zero</b>"));
        assert!(html.contains("Traceback<br>line 1"));
        assert!(!html.contains('\u{1b}'));
    }

    #[test]
    fn bad_cell_is_skipped_and_rest_render() {
        let fragments = render(json!([
            { "cell_type": "widget", "source": "?" },
            { "cell_type": "markdown", "source": "After" },
        ]));
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].html.contains("After"));
    }

    #[test]
    fn bad_output_is_skipped_and_cell_renders() {
        let fragments = render(json!([code_cell("x", json!([
            { "output_type": "mystery" },
            { "output_type": "stream", "name": "stdout", "text": "ok" }
        ]))]));
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].html.contains(r#"<pre class="stream-output">ok</pre>"#));
    }

    #[test]
    fn raw_cells_are_not_rendered() {
        let fragments = render(json!([{ "cell_type": "raw", "source": "raw text" }]));
        assert!(fragments.is_empty());
    }
}
