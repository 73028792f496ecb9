use clap::{Parser, Subcommand};
use coursebook::assets::HttpFetcher;
use coursebook::config::OutputKind;
use coursebook::export::SystemTool;
use coursebook::manifest::{self, DEFAULT_MANIFEST};
use coursebook::{autogen, compose, config, generate, logging, output};
use std::path::PathBuf;

/// Output-kind selection for `build`.
#[derive(clap::Args, Clone, Default)]
struct FormatArgs {
    /// Themed HTML site
    #[arg(long)]
    html: bool,
    /// Flattened markdown with local images
    #[arg(long)]
    md: bool,
    /// Word documents via pandoc
    #[arg(long)]
    docx: bool,
    /// LaTeX sources via pandoc
    #[arg(long)]
    tex: bool,
    /// PDF via pandoc
    #[arg(long)]
    pdf: bool,
    /// Flat copies of every notebook
    #[arg(long)]
    ipynb: bool,
    /// Jupyter Book build
    #[arg(long)]
    jupyter: bool,
    /// Every output kind
    #[arg(long)]
    all: bool,
}

impl FormatArgs {
    /// Selected kinds, or `None` when no flag was given.
    fn kinds(&self) -> Option<Vec<OutputKind>> {
        if self.all {
            return Some(OutputKind::ALL.to_vec());
        }
        let flags = [
            (self.html, OutputKind::Html),
            (self.md, OutputKind::Markdown),
            (self.docx, OutputKind::Docx),
            (self.tex, OutputKind::Latex),
            (self.pdf, OutputKind::Pdf),
            (self.ipynb, OutputKind::Notebook),
            (self.jupyter, OutputKind::JupyterBook),
        ];
        let kinds: Vec<OutputKind> = flags
            .into_iter()
            .filter_map(|(on, kind)| on.then_some(kind))
            .collect();
        (!kinds.is_empty()).then_some(kinds)
    }
}

#[derive(Parser)]
#[command(name = "coursebook")]
#[command(about = "Static site generator for markdown and notebook course material")]
#[command(long_about = "\
Static site generator for markdown and notebook course material

A single manifest lists chapters and notebooks as a table of contents.
Top-level entries marked `menu: true` form the site navigation.

Manifest structure:

  _content.yml
  ├── site:        title, author, description, logo, favicon, theme, language
  ├── toc:         tree of { title, file?, menu?, description?, children? }
  │                  children may hold `.autogen: <glob>` entries
  ├── footer:      text
  ├── static:      images / css / js entries copied into the site
  └── build:       outputs, output_dir, docs_dir, sources_dir, notebooks_dir,
                   static_dir, images_dir, templates_dir, tools

Run 'coursebook init' to print a documented manifest.")]
#[command(version)]
struct Cli {
    /// Manifest file
    #[arg(long, default_value = DEFAULT_MANIFEST, global = true)]
    manifest: PathBuf,

    /// Debug logging on stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the site and any other requested outputs
    Build {
        #[command(flatten)]
        formats: FormatArgs,
        /// Build only these files (manifest-relative paths)
        #[arg(long, num_args = 1..)]
        files: Vec<String>,
    },
    /// Validate the manifest and print the resolved tree
    Check,
    /// Write the flat _toc.yml for Jupyter Book
    Toc,
    /// Write the derived manifests under .autogen/
    Autogen {
        /// Regenerate even if every file is present
        #[arg(long)]
        force: bool,
    },
    /// Print a stock manifest, or write the default templates
    Init {
        /// Directory to write the default page templates into
        #[arg(long)]
        templates: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.debug)?;

    match cli.command {
        Command::Build { formats, files } => {
            println!("==> Loading {}", cli.manifest.display());
            let manifest = manifest::load(&cli.manifest)?;
            let kinds = formats
                .kinds()
                .unwrap_or_else(|| manifest.build.output_kinds());
            let names: Vec<&str> = kinds.iter().map(|k| k.name()).collect();
            println!("==> Building: {}", names.join(", "));

            let fetcher = HttpFetcher::new()?;
            let report = generate::run_build(&manifest, &kinds, &files, &SystemTool, &fetcher)?;
            output::print_report(&report, &manifest.root);
            println!("==> Build complete");
        }
        Command::Check => {
            println!("==> Checking {}", cli.manifest.display());
            let manifest = manifest::load(&cli.manifest)?;
            output::print_manifest(&manifest);
            println!("==> Manifest is valid");
        }
        Command::Toc => {
            let manifest = manifest::load(&cli.manifest)?;
            let path = autogen::write_flat_toc(&manifest)?;
            println!("==> Wrote {}", path.display());
            let toc = autogen::flat_toc(&manifest.toc)?;
            let problems = autogen::check_flat_toc(&toc, &manifest.root)
                .into_iter()
                .chain(autogen::check_notebook_kernels(&manifest.toc, &manifest.root));
            for problem in problems {
                println!("    warning: {}", problem);
            }
        }
        Command::Autogen { force } => {
            let manifest = manifest::load(&cli.manifest)?;
            let written = autogen::ensure(&manifest, force)?;
            if written.is_empty() {
                println!("==> Derived manifests up to date");
            } else {
                println!("==> Wrote derived manifests");
                output::print_written(&written, &manifest.root);
            }
        }
        Command::Init { templates } => match templates {
            Some(dir) => {
                let written = compose::write_default_templates(&dir)?;
                println!("==> Wrote templates to {}", dir.display());
                output::print_written(&written, &dir);
            }
            None => print!("{}", config::stock_manifest_yaml()),
        },
    }

    Ok(())
}
