//! Markdown, DOCX, LaTeX and PDF exports plus the notebook side outputs.
//!
//! Every document is first normalized to markdown (copied as is, or
//! converted with `jupyter nbconvert`), its image links flattened to
//! `images/<stem>_<basename>` next to the markdown, and then, for the
//! pandoc formats, converted:
//!
//! ```text
//! md    content/intro.md ──copy──▶ docs/md/intro.md           (final)
//! docx  content/intro.md ──copy──▶ _build/docx/intro.md ──pandoc──▶ docs/docx/intro.docx
//! tex   ...                        _build/tex/intro.md  ──pandoc──▶ docs/tex/intro.tex
//! pdf   ...                        _build/pdf/intro.md  ──pandoc──▶ docs/pdf/intro.pdf
//! ```
//!
//! Remote images cannot be embedded by pandoc; in DOCX/LaTeX/PDF they are
//! replaced by a notice and a plain link. PDF markdown is additionally
//! sanitized of a few glyphs the LaTeX engine cannot typeset.
//!
//! Subprocesses go through [`ExternalTool`] so tests can run without
//! pandoc or Jupyter. A failing tool skips that file for that format; the
//! failure is recorded in the [`BuildReport`].

use crate::config::{BuildPaths, OutputKind, ToolsConfig};
use crate::naming;
use crate::render::DocumentKind;
use crate::report::BuildReport;
use regex::{Captures, Regex};
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;
use thiserror::Error;
use walkdir::WalkDir;

static MD_IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").unwrap());

const REMOTE_NOTICE: &str = "> **[Image not embedded: remote images are not included in this export. Check the original file for the image.]**";

/// Glyph replacements applied to PDF markdown.
const PDF_REPLACEMENTS: [(&str, &str); 3] = [("✅", "[Check]"), ("🚀", "[Rocket]"), ("μ", "mu")];

/// Extensions published per document in the sources directory, with the
/// docs subdirectory each lives in.
const SOURCE_ARTIFACTS: [(&str, &str); 5] = [
    ("md", "md"),
    ("docx", "docx"),
    ("tex", "tex"),
    ("pdf", "pdf"),
    ("ipynb", "ipynb"),
];

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to run {program}: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("{program} exited with {status}: {stderr}")]
    ToolFailed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("expected output not produced: {0}")]
    NoOutput(PathBuf),
}

// ============================================================================
// External tools
// ============================================================================

/// Captured result of a subprocess.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    /// Exit code; `None` when terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs an external program to completion.
pub trait ExternalTool {
    fn run(&self, program: &str, args: &[OsString], cwd: Option<&Path>) -> io::Result<ToolOutput>;
}

/// Spawns real processes with `std::process::Command`.
pub struct SystemTool;

impl ExternalTool for SystemTool {
    fn run(&self, program: &str, args: &[OsString], cwd: Option<&Path>) -> io::Result<ToolOutput> {
        let mut command = Command::new(program);
        command.args(args);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }
        let output = command.output()?;
        Ok(ToolOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

// ============================================================================
// Formats
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Docx,
    Latex,
    Pdf,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [
        ExportFormat::Markdown,
        ExportFormat::Docx,
        ExportFormat::Latex,
        ExportFormat::Pdf,
    ];

    /// File extension, also the docs subdirectory name.
    pub fn ext(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Docx => "docx",
            ExportFormat::Latex => "tex",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn from_output(kind: OutputKind) -> Option<Self> {
        match kind {
            OutputKind::Markdown => Some(ExportFormat::Markdown),
            OutputKind::Docx => Some(ExportFormat::Docx),
            OutputKind::Latex => Some(ExportFormat::Latex),
            OutputKind::Pdf => Some(ExportFormat::Pdf),
            _ => None,
        }
    }

    fn uses_pandoc(self) -> bool {
        self != ExportFormat::Markdown
    }

    fn embeds_remote_images(self) -> bool {
        self == ExportFormat::Markdown
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ext())
    }
}

// ============================================================================
// Image flattening
// ============================================================================

/// Rewrite `![alt](path)` links of one document.
///
/// Local images are looked up under each of `base_dirs` in order, copied to
/// `images_dir/<stem>_<basename>`, and the link points at
/// `images/<stem>_<basename>`; missing ones are reported against the first
/// base directory and left unchanged. Remote images are kept when `embed_remote` is set, otherwise
/// replaced by a notice and a plain link.
pub fn flatten_images(
    markdown: &str,
    stem: &str,
    base_dirs: &[PathBuf],
    images_dir: &Path,
    embed_remote: bool,
    document: &str,
    report: &mut BuildReport,
) -> String {
    MD_IMAGE_RE
        .replace_all(markdown, |caps: &Captures| {
            let whole = &caps[0];
            let alt = &caps[1];
            let target = caps[2].split_whitespace().next().unwrap_or_default();
            if target.starts_with("http://") || target.starts_with("https://") {
                if embed_remote {
                    return whole.to_string();
                }
                tracing::debug!(document, url = target, "replacing remote image");
                return format!("\n{REMOTE_NOTICE}\n\n[Remote image: {alt}]({target})");
            }
            if target.starts_with("data:") {
                return whole.to_string();
            }
            let relative = target.replace("%20", " ");
            let Some(basename) = Path::new(&relative).file_name().map(|n| n.to_string_lossy().into_owned()) else {
                return whole.to_string();
            };
            let candidates: Vec<PathBuf> = base_dirs.iter().map(|dir| dir.join(&relative)).collect();
            let Some(source) = candidates.iter().find(|c| c.is_file()) else {
                tracing::warn!(document, reference = target, "image not found");
                let attempted = candidates.first().cloned().unwrap_or_else(|| PathBuf::from(&relative));
                report.record_missing_image(attempted, document, target);
                return whole.to_string();
            };
            let flat = format!("{stem}_{basename}");
            let destination = images_dir.join(&flat);
            let copied = fs::create_dir_all(images_dir).and_then(|_| fs::copy(source, &destination));
            if let Err(e) = copied {
                tracing::warn!(document, source = %source.display(), "image copy failed: {e}");
                return whole.to_string();
            }
            format!("![{alt}](images/{flat})")
        })
        .into_owned()
}

/// Replace glyphs the PDF engine cannot typeset.
pub fn sanitize_for_pdf(text: &str) -> String {
    PDF_REPLACEMENTS
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}

// ============================================================================
// Exporter
// ============================================================================

/// Exports documents using the project layout and configured tool names.
pub struct Exporter<'a> {
    paths: &'a BuildPaths,
    tools: &'a ToolsConfig,
    runner: &'a dyn ExternalTool,
}

impl<'a> Exporter<'a> {
    pub fn new(paths: &'a BuildPaths, tools: &'a ToolsConfig, runner: &'a dyn ExternalTool) -> Self {
        Self {
            paths,
            tools,
            runner,
        }
    }

    /// Directory holding the markdown handed to pandoc (or the final
    /// markdown for [`ExportFormat::Markdown`]).
    pub fn work_dir(&self, format: ExportFormat) -> PathBuf {
        match format {
            ExportFormat::Markdown => self.paths.docs_dir.join(format.ext()),
            _ => self.paths.output_dir.join(format.ext()),
        }
    }

    /// Final artifact path of `stem` in `format`.
    pub fn artifact_path(&self, stem: &str, format: ExportFormat) -> PathBuf {
        self.paths
            .docs_dir
            .join(format.ext())
            .join(format!("{stem}.{}", format.ext()))
    }

    /// Export every file in `files` (manifest-relative) to `format`.
    ///
    /// Returns the artifacts written. Missing, unsupported and failing files
    /// are skipped and recorded.
    pub fn export_all(
        &self,
        files: &[String],
        format: ExportFormat,
        report: &mut BuildReport,
    ) -> Vec<PathBuf> {
        let mut written = Vec::new();
        for file in files {
            match self.export_file(file, format, report) {
                Ok(Some(path)) => {
                    report.record_written(&path);
                    written.push(path);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(file = %file, format = %format, "export failed: {e}");
                    let stderr = match &e {
                        ExportError::ToolFailed { stderr, .. } => stderr.clone(),
                        other => other.to_string(),
                    };
                    report.record_conversion_failure(file, format.ext(), stderr);
                }
            }
        }
        tracing::info!(format = %format, count = written.len(), "export finished");
        written
    }

    fn export_file(
        &self,
        file: &str,
        format: ExportFormat,
        report: &mut BuildReport,
    ) -> Result<Option<PathBuf>, ExportError> {
        let source = self.paths.root.join(file);
        if !source.is_file() {
            tracing::warn!(file, "source file not found");
            report.record_missing_file(file);
            return Ok(None);
        }
        let Some(kind) = DocumentKind::from_path(&source) else {
            tracing::info!(file, "unsupported file type, skipping");
            report.record_skipped(file, "unsupported file type");
            return Ok(None);
        };
        let stem = naming::file_stem(file);
        let work_dir = self.work_dir(format);
        fs::create_dir_all(&work_dir)?;

        // Notebook images live beside the notebook; extracted outputs land in
        // the work dir.
        let doc_dir = source.parent().map(Path::to_path_buf).unwrap_or_default();
        let (markdown, base_dirs) = match kind {
            DocumentKind::Markdown => (fs::read_to_string(&source)?, vec![doc_dir]),
            DocumentKind::Notebook => (
                self.notebook_to_markdown(&source, &stem, &work_dir)?,
                vec![doc_dir, work_dir.clone()],
            ),
        };

        let mut markdown = flatten_images(
            &markdown,
            &stem,
            &base_dirs,
            &work_dir.join("images"),
            format.embeds_remote_images(),
            file,
            report,
        );
        if kind == DocumentKind::Notebook {
            cleanup_nbconvert(&work_dir, &stem);
        }
        if format == ExportFormat::Pdf {
            markdown = sanitize_for_pdf(&markdown);
        }
        let intermediate = work_dir.join(format!("{stem}.md"));
        fs::write(&intermediate, markdown)?;

        if !format.uses_pandoc() {
            return Ok(Some(intermediate));
        }

        let artifact = self.artifact_path(&stem, format);
        if let Some(parent) = artifact.parent() {
            fs::create_dir_all(parent)?;
        }
        let args: Vec<OsString> = vec![
            format!("{stem}.md").into(),
            "-o".into(),
            artifact.clone().into_os_string(),
            "--resource-path".into(),
            work_dir.clone().into_os_string(),
        ];
        self.invoke(&self.tools.pandoc, &args, Some(&work_dir))?;
        tracing::debug!(file, artifact = %artifact.display(), "pandoc finished");
        Ok(Some(artifact))
    }

    /// Convert a notebook with nbconvert and return the markdown text.
    fn notebook_to_markdown(&self, notebook: &Path, stem: &str, work_dir: &Path) -> Result<String, ExportError> {
        let tmp_name = format!("{stem}_tmp");
        let args: Vec<OsString> = vec![
            "nbconvert".into(),
            "--to".into(),
            "markdown".into(),
            notebook.as_os_str().to_owned(),
            "--output".into(),
            tmp_name.clone().into(),
            "--output-dir".into(),
            work_dir.as_os_str().to_owned(),
        ];
        self.invoke(&self.tools.jupyter, &args, None)?;
        let tmp_md = work_dir.join(format!("{tmp_name}.md"));
        if !tmp_md.is_file() {
            return Err(ExportError::NoOutput(tmp_md));
        }
        Ok(fs::read_to_string(&tmp_md)?)
    }

    fn invoke(&self, program: &str, args: &[OsString], cwd: Option<&Path>) -> Result<ToolOutput, ExportError> {
        let output = self
            .runner
            .run(program, args, cwd)
            .map_err(|source| ExportError::Spawn {
                program: program.to_string(),
                source,
            })?;
        if !output.success() {
            return Err(ExportError::ToolFailed {
                program: program.to_string(),
                status: output
                    .status
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    /// Copy notebooks flat into `<docs>/ipynb/`.
    pub fn copy_notebooks(&self, files: &[String], report: &mut BuildReport) -> Vec<PathBuf> {
        let dest_dir = self.paths.docs_dir.join("ipynb");
        let mut written = Vec::new();
        for file in files.iter().filter(|f| f.to_lowercase().ends_with(".ipynb")) {
            let source = self.paths.root.join(file);
            if !source.is_file() {
                report.record_missing_file(file.as_str());
                continue;
            }
            let Some(name) = source.file_name() else {
                continue;
            };
            let destination = dest_dir.join(name);
            match fs::create_dir_all(&dest_dir).and_then(|_| fs::copy(&source, &destination)) {
                Ok(_) => {
                    report.record_written(&destination);
                    written.push(destination);
                }
                Err(e) => tracing::warn!(file = %file, "notebook copy failed: {e}"),
            }
        }
        tracing::info!(count = written.len(), "copied notebooks");
        written
    }

    /// Run `jupyter-book build` on the project and publish its HTML under
    /// `<docs>/jupyter-book/`. Expects `_toc.yml` to be written already.
    pub fn build_jupyter_book(&self, report: &mut BuildReport) -> Result<Option<PathBuf>, ExportError> {
        let root = &self.paths.root;
        let args: Vec<OsString> = vec!["build".into(), root.as_os_str().to_owned()];
        let output = self.invoke(&self.tools.jupyter_book, &args, Some(root))?;
        tracing::debug!(stdout = %output.stdout, "jupyter-book finished");

        let built = root.join("_build").join("html");
        if !built.is_dir() {
            tracing::warn!(path = %built.display(), "jupyter-book produced no HTML");
            return Ok(None);
        }
        let destination = self.paths.docs_dir.join("jupyter-book");
        if destination.exists() {
            fs::remove_dir_all(&destination)?;
        }
        copy_dir_recursive(&built, &destination)?;
        report.record_written(&destination);
        Ok(Some(destination))
    }

    /// Rebuild `<sources_dir>` as `<stem>/<stem>.<ext>` for every artifact
    /// present in the docs directory.
    ///
    /// Only a failure to clear the old directory is returned; a failed copy
    /// is recorded against its file and the rest are still published.
    pub fn publish_sources(&self, files: &[String], report: &mut BuildReport) -> Result<usize, ExportError> {
        let sources = &self.paths.sources_dir;
        if sources.exists() {
            fs::remove_dir_all(sources)?;
        }
        let mut count = 0;
        for file in files {
            let stem = naming::file_stem(file);
            for (ext, dir) in SOURCE_ARTIFACTS {
                let artifact = self.paths.docs_dir.join(dir).join(format!("{stem}.{ext}"));
                if !artifact.is_file() {
                    continue;
                }
                let destination = sources.join(&stem).join(format!("{stem}.{ext}"));
                let copied = fs::create_dir_all(sources.join(&stem))
                    .and_then(|_| fs::copy(&artifact, &destination));
                if let Err(e) = copied {
                    tracing::warn!(file = %file, ext, "cannot publish source artifact: {e}");
                    report.record_conversion_failure(file.as_str(), ext, e.to_string());
                    continue;
                }
                report.record_written(&destination);
                count += 1;
            }
        }
        tracing::info!(count, path = %sources.display(), "published sources");
        Ok(count)
    }
}

/// Remove nbconvert's temporary markdown and its extracted-output directory.
fn cleanup_nbconvert(work_dir: &Path, stem: &str) {
    let tmp_md = work_dir.join(format!("{stem}_tmp.md"));
    let tmp_files = work_dir.join(format!("{stem}_tmp_files"));
    if let Err(e) = fs::remove_file(&tmp_md) {
        tracing::debug!(path = %tmp_md.display(), "cannot remove temporary markdown: {e}");
    }
    if tmp_files.is_dir() {
        if let Err(e) = fs::remove_dir_all(&tmp_files) {
            tracing::debug!(path = %tmp_files.display(), "cannot remove nbconvert output dir: {e}");
        }
    }
}

/// Recursively copy `src` into `dst`.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
