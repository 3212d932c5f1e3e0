//! pdfstudio command line
//!
//! Thin host around `pdfstudio-core`: reads files, runs one operation and
//! writes the outputs. Logs go to stderr so stdout only carries results.

mod args;
mod config;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pdfstudio_core::command::{InputFile, MergeLayout, PdfCommand, ProcessOutput, ProcessResult};
use pdfstudio_core::compress::{
    calculate_savings, estimate_all, format_file_size, meets_email_limit, recommend_level,
    CompressionLevel, DEFAULT_EMAIL_LIMIT_MB,
};
use pdfstudio_core::render::{preview_thumbnail, PageRenderer, THUMBNAIL_SCALE};
use pdfstudio_core::{
    extract_outline, flatten, naming, package, parse_page_selection, BlankDetector, Bookmark,
    OutputFile, PdfDocument, SplitMode,
};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "pdfstudio")]
#[command(version, about = "Split, merge and compress PDF files")]
struct Cli {
    /// TOML config file (defaults to ./pdfstudio.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for output files
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Write every output file instead of bundling them into a zip
    #[arg(long, global = true)]
    no_zip: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show page count, version and metadata
    Info {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Split a document into several
    Split {
        file: PathBuf,
        #[command(subcommand)]
        mode: SplitCommand,
    },
    /// Insert added documents into a base document
    Merge {
        base: PathBuf,
        #[arg(required = true)]
        added: Vec<PathBuf>,
        /// before, after, or a base page number to insert after
        #[arg(long, conflicts_with = "order")]
        position: Option<String>,
        /// Explicit page list, e.g. "base:1,0:1,base:2"
        #[arg(long)]
        order: Option<String>,
    },
    /// Re-save a document with smaller encoding
    Compress {
        file: PathBuf,
        #[arg(long)]
        level: Option<CompressionLevel>,
        #[arg(long)]
        strip_metadata: bool,
        /// Use the least aggressive level that fits
        #[arg(long)]
        target_mb: Option<f64>,
    },
    /// Estimate compressed sizes without compressing
    Estimate {
        file: PathBuf,
        #[arg(long)]
        target_mb: Option<f64>,
    },
    /// Print the outline
    Bookmarks {
        file: PathBuf,
        /// Only list bookmarks at this depth
        #[arg(long)]
        level: Option<u32>,
    },
    /// Report which pages look blank
    Blanks {
        file: PathBuf,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Render one page to PNG
    Thumbnail {
        file: PathBuf,
        #[arg(long)]
        page: u32,
        #[arg(long)]
        scale: Option<f32>,
    },
    /// Execute a JSON command file and print the JSON result
    Run { command: PathBuf },
}

#[derive(Subcommand, Debug)]
enum SplitCommand {
    /// Pages such as "1-3,7" into one file
    Extract {
        pages: String,
        #[arg(long)]
        skip_blank: bool,
        /// White-pixel ratio for --skip-blank
        #[arg(long, requires = "skip_blank")]
        threshold: Option<f64>,
    },
    /// One file per range
    Ranges { expression: String },
    /// Chunks of N pages
    Every { n: Option<u32> },
    /// One file per page
    Single,
    /// One file per bookmark
    Bookmarks {
        #[arg(long)]
        level: Option<u32>,
    },
    Even,
    Odd,
    /// Chunks of roughly TARGET_MB megabytes
    Size { target_mb: Option<f64> },
    /// Drop blank pages
    RemoveBlank {
        #[arg(long)]
        threshold: Option<f64>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries results, logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let mut config = Config::discover(cli.config.as_deref(), &cwd)?;
    if let Some(dir) = cli.output_dir {
        config.output.directory = dir;
    }
    if cli.no_zip {
        config.output.zip = false;
    }

    run(cli.command, &config)
}

fn run(command: Commands, config: &Config) -> anyhow::Result<()> {
    match command {
        Commands::Info { file, json } => {
            let (_, doc) = read_pdf(&file)?;
            let info = doc.info();
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("Pages:     {}", info.page_count);
                println!("Version:   {}", info.version);
                println!("Size:      {}", format_file_size(info.size_bytes as u64));
                println!("Encrypted: {}", info.encrypted);
                if let Some(title) = info.title {
                    println!("Title:     {}", title);
                }
                if let Some(author) = info.author {
                    println!("Author:    {}", author);
                }
            }
        }
        Commands::Split { file, mode } => {
            let (name, doc) = read_pdf(&file)?;
            let mode = split_mode(mode, config, &doc)?;
            let renderer = if mode.needs_renderer() {
                Some(require_renderer(config)?)
            } else {
                None
            };
            let command = PdfCommand::Split {
                file: InputFile {
                    name: name.clone(),
                    data: doc.bytes().to_vec(),
                },
                mode,
            };
            let output = command.execute(renderer.as_deref())?;
            write_outputs(output, &naming::base_name(&name), config)?;
        }
        Commands::Merge {
            base,
            added,
            position,
            order,
        } => {
            let layout = match (order, position) {
                (Some(order), _) => MergeLayout::CustomOrder(args::parse_order(&order)?),
                (None, Some(position)) => MergeLayout::Position(args::parse_position(&position)?),
                (None, None) => MergeLayout::Position(pdfstudio_core::MergePosition::After),
            };
            let base = read_input(&base)?;
            let added = added
                .iter()
                .map(|path| read_input(path))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let base_name = naming::base_name(&base.name);

            let output = PdfCommand::Merge {
                base,
                added,
                layout,
            }
            .execute(None)?;
            write_outputs(output, &base_name, config)?;
        }
        Commands::Compress {
            file,
            level,
            strip_metadata,
            target_mb,
        } => {
            let input = read_input(&file)?;
            let base_name = naming::base_name(&input.name);
            let output = PdfCommand::Compress {
                file: input,
                level: level.unwrap_or(config.compress.level),
                remove_metadata: strip_metadata || config.compress.remove_metadata,
                target_mb,
            }
            .execute(None)?;

            let savings = calculate_savings(
                output.metrics.input_size_bytes as u64,
                output.metrics.output_size_bytes as u64,
            );
            println!(
                "{} -> {} (saved {}, {:.1}%)",
                format_file_size(output.metrics.input_size_bytes as u64),
                format_file_size(output.metrics.output_size_bytes as u64),
                savings.formatted_saved,
                savings.saved_percentage
            );
            if let (Some(level), Some(met)) =
                (output.metrics.achieved_level, output.metrics.target_met)
            {
                if met {
                    println!("Target met at level {}", level);
                } else {
                    warn!(%level, "Target size not reachable, keeping smallest output");
                    println!("Target not met; best effort at level {}", level);
                }
            }
            write_outputs(output, &base_name, config)?;
        }
        Commands::Estimate { file, target_mb } => {
            let (_, doc) = read_pdf(&file)?;
            let size = doc.byte_len() as u64;
            println!("Original: {}", format_file_size(size));
            for estimate in estimate_all(&doc) {
                println!(
                    "{:<8} ~{} ({:.0}% smaller)",
                    estimate.level,
                    format_file_size(estimate.estimated_size),
                    estimate.estimated_ratio
                );
            }
            if let Some(target_mb) = target_mb {
                println!("Recommended for {} MB: {}", target_mb, recommend_level(size, target_mb));
            }
            if !meets_email_limit(size, DEFAULT_EMAIL_LIMIT_MB) {
                println!("Larger than the usual {} MB email limit", DEFAULT_EMAIL_LIMIT_MB);
            }
        }
        Commands::Bookmarks { file, level } => {
            let (_, doc) = read_pdf(&file)?;
            let outline = extract_outline(&doc);
            if outline.is_empty() {
                println!("No bookmarks");
                return Ok(());
            }
            match level {
                Some(level) => {
                    for bookmark in flatten(&outline, level) {
                        println!("{:>5}  {}", bookmark.page_number, bookmark.title);
                    }
                }
                None => print_outline(&outline),
            }
        }
        Commands::Blanks { file, threshold } => {
            let (_, doc) = read_pdf(&file)?;
            let renderer = require_renderer(config)?;
            let detector = BlankDetector::new(
                threshold.unwrap_or(config.blank.threshold),
                config.blank.scale,
            )?;
            let pages = detector.classify(&doc, &*renderer)?;
            let blank: Vec<u32> = pages
                .iter()
                .filter(|p| p.is_blank)
                .map(|p| p.page_number)
                .collect();
            for page in &pages {
                println!(
                    "{:>5}  {:.3}{}",
                    page.page_number,
                    page.white_ratio,
                    if page.is_blank { "  blank" } else { "" }
                );
            }
            info!(blank = blank.len(), pages = pages.len(), "Blank page scan done");
        }
        Commands::Thumbnail { file, page, scale } => {
            let (name, doc) = read_pdf(&file)?;
            let renderer = require_renderer(config)?;
            let thumbnail = preview_thumbnail(
                &doc,
                &*renderer,
                page,
                scale.unwrap_or(THUMBNAIL_SCALE),
            )?;
            let dir = &config.output.directory;
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let path = dir.join(format!("{}_page_{}.png", naming::base_name(&name), page));
            fs::write(&path, &thumbnail.png)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{}", path.display());
        }
        Commands::Run { command } => {
            let json = fs::read_to_string(&command)
                .with_context(|| format!("Failed to read {}", command.display()))?;
            let command: PdfCommand =
                serde_json::from_str(&json).context("Failed to parse command JSON")?;
            let renderer = match &command {
                PdfCommand::Split { mode, .. } if mode.needs_renderer() => {
                    Some(require_renderer(config)?)
                }
                _ => None,
            };
            let result = ProcessResult::from(command.execute(renderer.as_deref()));
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(())
}

fn split_mode(mode: SplitCommand, config: &Config, doc: &PdfDocument) -> anyhow::Result<SplitMode> {
    let mode = match mode {
        SplitCommand::Extract {
            pages,
            skip_blank,
            threshold,
        } => {
            let pages = parse_page_selection(&pages, doc.page_count());
            if pages.is_empty() {
                bail!("No valid pages selected");
            }
            SplitMode::Extract {
                pages,
                skip_blank,
                threshold: Some(threshold.unwrap_or(config.blank.threshold)),
                scale: Some(config.blank.scale),
            }
        }
        SplitCommand::Ranges { expression } => SplitMode::Ranges { expression },
        SplitCommand::Every { n } => SplitMode::EveryN {
            n: n.unwrap_or(config.split.every_n),
        },
        SplitCommand::Single => SplitMode::Single,
        SplitCommand::Bookmarks { level } => SplitMode::Bookmarks {
            level: level.unwrap_or(config.split.bookmark_level),
        },
        SplitCommand::Even => SplitMode::Even,
        SplitCommand::Odd => SplitMode::Odd,
        SplitCommand::Size { target_mb } => SplitMode::BySize {
            target_mb: target_mb.unwrap_or(config.split.target_mb),
        },
        SplitCommand::RemoveBlank { threshold } => SplitMode::RemoveBlank {
            threshold: Some(threshold.unwrap_or(config.blank.threshold)),
            scale: Some(config.blank.scale),
        },
    };
    Ok(mode)
}

fn print_outline(bookmarks: &[Bookmark]) {
    for bookmark in bookmarks {
        println!(
            "{:>5}  {}{}",
            bookmark.page_number,
            "  ".repeat(bookmark.level as usize),
            bookmark.title
        );
        print_outline(&bookmark.children);
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string())
}

fn read_input(path: &Path) -> anyhow::Result<InputFile> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(InputFile {
        name: file_name(path),
        data,
    })
}

fn read_pdf(path: &Path) -> anyhow::Result<(String, PdfDocument)> {
    let input = read_input(path)?;
    let doc = PdfDocument::load(input.data)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    Ok((input.name, doc))
}

fn write_outputs(output: ProcessOutput, base_name: &str, config: &Config) -> anyhow::Result<()> {
    if output.files.is_empty() {
        warn!("Nothing to write");
        return Ok(());
    }

    let dir = &config.output.directory;
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let files: Vec<OutputFile> = if config.output.zip && output.files.len() > 1 {
        vec![package(output.files, base_name)?]
    } else {
        output.files
    };

    for file in &files {
        let path = dir.join(&file.name);
        fs::write(&path, &file.data)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{}", path.display());
    }

    info!(
        files = files.len(),
        pages = output.metrics.page_count,
        time_ms = output.metrics.processing_time_ms,
        "Wrote output"
    );
    Ok(())
}

#[cfg(feature = "pdfium")]
fn require_renderer(config: &Config) -> anyhow::Result<Box<dyn PageRenderer>> {
    let renderer =
        pdfstudio_core::PdfiumRenderer::new(config.render.pdfium_library_path.as_deref())?;
    Ok(Box::new(renderer))
}

#[cfg(not(feature = "pdfium"))]
fn require_renderer(_config: &Config) -> anyhow::Result<Box<dyn PageRenderer>> {
    bail!("Page rendering is not enabled. Rebuild with --features pdfium")
}
