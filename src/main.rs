use anyhow::Result;
use citation_extractor::{run, Config, ErrorPolicy, OutputFormat, DEFAULT_BATCH_SIZE};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "citation_extractor")]
#[command(about = "Extracts paper and citation tables from line-delimited JSON")]
struct Cli {
    /// Input JSONL files, one record per line (.gz is decompressed)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory for the papers and citations tables
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Output table format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// What to do with lines that are not valid records
    #[arg(long, value_enum, default_value_t = ErrorPolicy::Abort)]
    on_error: ErrorPolicy,

    /// Rows per record batch when writing Parquet
    #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Config {
            inputs: cli.inputs,
            output_dir: cli.output_dir,
            format: cli.format,
            on_error: cli.on_error,
            batch_size: cli.batch_size,
            show_progress: !cli.no_progress,
        }
    }
}

fn main() -> Result<()> {
    // Logs on stderr, completion message on stdout
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = Config::from(Cli::parse());
    let summary = run(&config)?;

    println!(
        "Data has been successfully written to {} and {}.",
        summary.papers_path.display(),
        summary.citations_path.display()
    );

    Ok(())
}
