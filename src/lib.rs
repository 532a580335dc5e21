//! Turns a line-delimited JSON dump of papers and their reference lists into
//! a paper table and a citation edge table.

pub mod accumulator;
pub mod reader;
pub mod writer;

use anyhow::{ensure, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::create_dir_all;
use std::path::PathBuf;
use tracing::{debug, info};

pub use accumulator::{Citation, CitationGraph};
pub use reader::{ErrorPolicy, Record};
pub use writer::OutputFormat;

pub const DEFAULT_BATCH_SIZE: usize = 100_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub inputs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub on_error: ErrorPolicy,
    /// Rows per Parquet record batch
    pub batch_size: usize,
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output_dir: PathBuf::from("."),
            format: OutputFormat::default(),
            on_error: ErrorPolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            show_progress: false,
        }
    }
}

// ====== PROCESSING STATISTICS ======
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub files_processed: u64,
    /// Lines seen, malformed ones included
    pub lines_read: u64,
    pub records_used: u64,
    pub records_without_paper: u64,
    pub malformed_lines: u64,
    pub papers: u64,
    pub citation_edges: u64,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Default::default()
    }
}

#[derive(Debug)]
pub struct Summary {
    pub papers_path: PathBuf,
    pub citations_path: PathBuf,
    pub stats: ProcessingStats,
}

// ====== MEMORY MONITORING ======
fn memory_usage() -> String {
    if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
        for line in status.lines() {
            if line.starts_with("VmRSS:") {
                return line.to_string();
            }
        }
    }
    "Memory info unavailable".to_string()
}

fn progress_bar(show: bool) -> Result<ProgressBar> {
    if !show {
        return Ok(ProgressBar::hidden());
    }
    let progress = ProgressBar::new(0);
    progress.set_style(ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:50.cyan/blue} {bytes:>10}/{total_bytes:10} | {msg}",
    )?);
    Ok(progress)
}

/// Reads every input into a single graph. Nothing is written here, so a
/// fatal read error leaves the output directory untouched.
pub fn build_graph(config: &Config, stats: &mut ProcessingStats) -> Result<CitationGraph> {
    let progress = progress_bar(config.show_progress)?;
    let mut graph = CitationGraph::new();

    for path in &config.inputs {
        reader::read_file(path, config.on_error, &mut graph, stats, &progress)?;
        debug!("Memory after {}: {}", path.display(), memory_usage());
    }
    progress.finish_and_clear();

    stats.papers = graph.paper_count() as u64;
    stats.citation_edges = graph.citation_count() as u64;
    Ok(graph)
}

/// Read phase followed by write phase.
pub fn run(config: &Config) -> Result<Summary> {
    ensure!(!config.inputs.is_empty(), "no input files given");
    info!("Processing {} input file(s)", config.inputs.len());

    let mut stats = ProcessingStats::new();
    let graph = build_graph(config, &mut stats)?;

    create_dir_all(&config.output_dir).with_context(|| {
        format!("failed to create output directory {}", config.output_dir.display())
    })?;
    info!("Output directory: {}", config.output_dir.display());

    let (papers_path, citations_path) =
        writer::write_tables(&graph, &config.output_dir, config.format, config.batch_size)?;

    info!("Final Processing Statistics:");
    info!("  Files processed: {}", stats.files_processed);
    info!("  Lines read: {}", stats.lines_read);
    info!("  Records used: {}", stats.records_used);
    info!("  Records without paper id: {}", stats.records_without_paper);
    info!("  Malformed lines skipped: {}", stats.malformed_lines);
    info!("  Unique papers: {}", stats.papers);
    info!("  Citation edges: {}", stats.citation_edges);
    debug!("{}", memory_usage());

    Ok(Summary {
        papers_path,
        citations_path,
        stats,
    })
}
