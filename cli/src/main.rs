//! pdfslides CLI - split PDF decks into SVG pages and JPEG thumbnails

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdfslides::{
    ArtifactWriter, DirectoryWriter, DocumentLoader, LoadOptions, NamingScheme, Outcome,
    OutputArtifact, OutputConfig, PageSelection, Pipeline, RunReport, RunStatus, VectorFormat,
};

#[derive(Parser)]
#[command(name = "pdfslides")]
#[command(version)]
#[command(about = "Split a PDF into per-page SVG drawings and JPEG thumbnails", long_about = None)]
struct Cli {
    #[command(flatten)]
    convert: ConvertArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Args)]
struct ConvertArgs {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output directory (defaults to <FILE stem>_slides)
    #[arg(value_name = "OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// Pages to export (e.g., "1-10", "1,3,5", "1 3 5")
    #[arg(long)]
    pages: Option<String>,

    /// Thumbnail box width in pixels
    #[arg(long, default_value = "512")]
    max_width: u32,

    /// Thumbnail box height in pixels
    #[arg(long, default_value = "512")]
    max_height: u32,

    /// JPEG quality (0-100)
    #[arg(long, default_value = "75")]
    quality: u8,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Password for encrypted documents
    #[arg(long, env = "PDFSLIDES_PASSWORD")]
    password: Option<String>,

    /// Write gzip-compressed .svgz files
    #[arg(long)]
    svgz: bool,

    /// Letterbox thumbnails to exactly the box size
    #[arg(long)]
    pad: bool,

    /// Name files 001.svg / 001.jpg instead of page-0.svg / page-0-thumb.jpg
    #[arg(long)]
    numbered: bool,

    /// Write the run report as JSON to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Do not show progress or the summary
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show document information
    Info {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Password for encrypted documents
        #[arg(long, env = "PDFSLIDES_PASSWORD")]
        password: Option<String>,
    },

    /// Show version information
    Version,
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Info { input, password }) => cmd_info(&input, password).map(|_| ExitCode::SUCCESS),
        Some(Commands::Version) => {
            cmd_version();
            Ok(ExitCode::SUCCESS)
        }
        None => {
            if cli.convert.input.is_some() {
                cmd_convert(cli.convert)
            } else {
                println!("{}", "Usage: pdfslides <FILE> [OUTPUT_DIR]".yellow());
                println!("       pdfslides --help for more information");
                Ok(ExitCode::SUCCESS)
            }
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            ExitCode::from(1)
        }
    }
}

/// Forwards artifacts to a directory and advances the progress bar.
struct ProgressWriter {
    inner: DirectoryWriter,
    bar: ProgressBar,
}

impl ArtifactWriter for ProgressWriter {
    fn write(&self, artifact: &OutputArtifact) -> pdfslides::Result<PathBuf> {
        let path = self.inner.write(artifact)?;
        self.bar.inc(1);
        Ok(path)
    }
}

fn cmd_convert(args: ConvertArgs) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let Some(input) = args.input.as_deref() else {
        return Err("no input file".into());
    };
    let output_dir = args.output.clone().unwrap_or_else(|| {
        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        PathBuf::from(format!("{}_slides", stem))
    });

    let selection = match args.pages.as_deref() {
        Some(p) => PageSelection::parse(p).map_err(|e| format!("Invalid page range: {}", e))?,
        None => PageSelection::All,
    };

    let document = DocumentLoader::new(load_options(args.password.clone())).load_path(input)?;
    let selected = selection.to_indices(document.page_count())?;

    let mut config = OutputConfig::new()
        .with_max_size(args.max_width, args.max_height)
        .with_thumbnail_quality(args.quality)
        .with_pad_to_box(args.pad)
        .with_pages(selection);
    if let Some(jobs) = args.jobs {
        config = config.with_parallelism(jobs);
    }
    if args.svgz {
        config = config.with_vector_format(VectorFormat::Svgz);
    }

    let naming = if args.numbered {
        NamingScheme::Numbered
    } else {
        NamingScheme::ZeroBased
    };
    let bar = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(selected.len() as u64 * 2)
    };
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    bar.set_message("Rendering pages...");

    let writer = ProgressWriter {
        inner: DirectoryWriter::new(&output_dir)?.with_naming(naming),
        bar: bar.clone(),
    };
    let report = Pipeline::new(config).process_and_write(&document, &writer);
    bar.finish_with_message("Done!");

    if let Some(path) = &args.report {
        fs::write(path, serde_json::to_vec_pretty(&report)?)?;
    }
    if !args.quiet {
        print_summary(&report, &output_dir, naming);
    }

    Ok(match report.status {
        RunStatus::Success => ExitCode::SUCCESS,
        RunStatus::PartialSuccess => ExitCode::from(2),
        RunStatus::Failure => ExitCode::from(1),
    })
}

fn load_options(password: Option<String>) -> LoadOptions {
    let options = LoadOptions::new().lenient();
    match password {
        Some(password) => options.with_password(password),
        None => options,
    }
}

fn print_summary(report: &RunReport, output_dir: &Path, naming: NamingScheme) {
    let status = match report.status {
        RunStatus::Success => "Success".green().bold(),
        RunStatus::PartialSuccess => "Partial success".yellow().bold(),
        RunStatus::Failure => "Failure".red().bold(),
    };
    println!("\n{} {}", "Status:".bold(), status);

    for warning in &report.warnings {
        println!("  {} {}", "warning:".yellow(), warning);
    }

    for page in &report.pages {
        for outcome in [&page.vector, &page.thumbnail] {
            match outcome {
                Outcome::Success(artifact) if artifact.is_degraded() => println!(
                    "  {} {} ({} omissions)",
                    "├─".dimmed(),
                    naming.file_name(artifact).yellow(),
                    artifact.warnings.len()
                ),
                Outcome::Success(_) => {}
                Outcome::Failure(reason) => println!(
                    "  {} page {}: {}",
                    "├─".dimmed(),
                    page.page_index + 1,
                    reason.to_string().red()
                ),
            }
        }
    }

    println!(
        "  {} {} files in {}",
        "└─".dimmed(),
        report.artifacts().count(),
        output_dir.display()
    );
}

fn cmd_info(input: &Path, password: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let doc = DocumentLoader::new(load_options(password)).load_path(input)?;
    let metadata = doc.metadata();

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: PDF {}", "Format".bold(), metadata.pdf_version);
    println!("{}: {}", "Pages".bold(), doc.page_count());
    println!(
        "{}: {}",
        "Encrypted".bold(),
        if metadata.encrypted { "Yes" } else { "No" }
    );
    println!("{}: {:?}", "Validity".bold(), doc.validity());

    if let Some(ref title) = metadata.title {
        println!("{}: {}", "Title".bold(), title);
    }
    if let Some(ref author) = metadata.author {
        println!("{}: {}", "Author".bold(), author);
    }
    if let Some(ref creator) = metadata.creator {
        println!("{}: {}", "Creator".bold(), creator);
    }
    if let Some(ref producer) = metadata.producer {
        println!("{}: {}", "Producer".bold(), producer);
    }
    if let Some(ref created) = metadata.created {
        println!("{}: {}", "Created".bold(), created);
    }

    println!();
    println!("{}", "Pages".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for page in doc.pages() {
        println!(
            "{:>4}: {:.0} x {:.0} pt{}",
            page.number(),
            page.width(),
            page.height(),
            if page.rotation() != 0 {
                format!(", rotated {}°", page.rotation())
            } else {
                String::new()
            }
        );
    }

    for warning in doc.warnings() {
        println!("{} {}", "warning:".yellow(), warning);
    }

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "pdfslides".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("PDF to SVG pages and JPEG thumbnails");
    println!();
    println!("License: MIT");
}
