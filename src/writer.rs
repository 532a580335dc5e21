use anyhow::{Context, Result};
use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::accumulator::{Citation, CitationGraph};

pub const PAPERS_HEADER: [&str; 1] = ["paper_id"];
pub const CITATIONS_HEADER: [&str; 2] = ["citing_paper_id", "cited_paper_id"];

// Macro for creating Arrow schema fields
macro_rules! field {
    ($name:expr, $data_type:expr) => {
        Field::new($name, $data_type, true)
    };
    ($name:expr, $data_type:expr, $nullable:expr) => {
        Field::new($name, $data_type, $nullable)
    };
}

// Macro for creating schemas with less boilerplate
macro_rules! schema {
    ($($name:expr => $data_type:expr $(, $nullable:expr)?);* $(;)?) => {
        Schema::new(vec![
            $(field!($name, $data_type $(, $nullable)?),)*
        ])
    };
}

// Macro for creating record batches with less boilerplate
macro_rules! record_batch {
    ($schema:expr, $($array:expr),* $(,)?) => {
        RecordBatch::try_new($schema, vec![$($array,)*])
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

// ====== CSV ======
fn create_csv_writer(output_path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    let file = File::create(output_path)
        .with_context(|| format!("failed to create {}", output_path.display()))?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

pub fn write_papers_csv<W: Write>(writer: &mut csv::Writer<W>, papers: &[&str]) -> Result<()> {
    writer.write_record(PAPERS_HEADER)?;
    for paper_id in papers {
        writer.write_record([paper_id])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_citations_csv<W: Write>(
    writer: &mut csv::Writer<W>,
    citations: &[Citation],
) -> Result<()> {
    writer.write_record(CITATIONS_HEADER)?;
    for citation in citations {
        writer.write_record([&citation.citing, &citation.cited])?;
    }
    writer.flush()?;
    Ok(())
}

// ====== PARQUET ======
fn create_parquet_writer(output_path: &Path, schema: Arc<Schema>) -> Result<ArrowWriter<File>> {
    let file = File::create(output_path)
        .with_context(|| format!("failed to create {}", output_path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();

    let writer = ArrowWriter::try_new(file, schema, Some(props))?;
    Ok(writer)
}

fn papers_schema() -> Arc<Schema> {
    Arc::new(schema! {
        PAPERS_HEADER[0] => DataType::Utf8, false;
    })
}

fn citations_schema() -> Arc<Schema> {
    Arc::new(schema! {
        CITATIONS_HEADER[0] => DataType::Utf8, false;
        CITATIONS_HEADER[1] => DataType::Utf8, false;
    })
}

fn papers_to_record_batch(schema: &Arc<Schema>, papers: &[&str]) -> Result<RecordBatch> {
    let ids: ArrayRef = Arc::new(StringArray::from_iter_values(papers.iter().copied()));
    Ok(record_batch!(schema.clone(), ids)?)
}

fn citations_to_record_batch(schema: &Arc<Schema>, citations: &[Citation]) -> Result<RecordBatch> {
    let citing: ArrayRef = Arc::new(StringArray::from_iter_values(
        citations.iter().map(|c| c.citing.as_str()),
    ));
    let cited: ArrayRef = Arc::new(StringArray::from_iter_values(
        citations.iter().map(|c| c.cited.as_str()),
    ));
    Ok(record_batch!(schema.clone(), citing, cited)?)
}

/// Writes `rows` in chunks of at most `batch_size`. An empty table still
/// gets a valid file carrying the schema.
fn write_parquet_table<T>(
    output_path: &Path,
    schema: Arc<Schema>,
    rows: &[T],
    batch_size: usize,
    to_record_batch: fn(&Arc<Schema>, &[T]) -> Result<RecordBatch>,
) -> Result<()> {
    let mut writer = create_parquet_writer(output_path, schema.clone())?;
    for chunk in rows.chunks(batch_size.max(1)) {
        let batch = to_record_batch(&schema, chunk)?;
        writer.write(&batch)?;
    }
    writer.close()?;
    Ok(())
}

/// Writes both tables into `output_dir`, replacing existing files.
/// Returns the papers and citations paths.
pub fn write_tables(
    graph: &CitationGraph,
    output_dir: &Path,
    format: OutputFormat,
    batch_size: usize,
) -> Result<(PathBuf, PathBuf)> {
    let ext = format.extension();
    let papers_path = output_dir.join(format!("papers.{}", ext));
    let citations_path = output_dir.join(format!("citations.{}", ext));
    let papers = graph.sorted_papers();

    match format {
        OutputFormat::Csv => {
            write_papers_csv(&mut create_csv_writer(&papers_path)?, &papers)
                .with_context(|| format!("failed to write {}", papers_path.display()))?;
            write_citations_csv(&mut create_csv_writer(&citations_path)?, graph.citations())
                .with_context(|| format!("failed to write {}", citations_path.display()))?;
        }
        OutputFormat::Parquet => {
            write_parquet_table(
                &papers_path,
                papers_schema(),
                papers.as_slice(),
                batch_size,
                papers_to_record_batch,
            )
            .with_context(|| format!("failed to write {}", papers_path.display()))?;
            write_parquet_table(
                &citations_path,
                citations_schema(),
                graph.citations(),
                batch_size,
                citations_to_record_batch,
            )
            .with_context(|| format!("failed to write {}", citations_path.display()))?;
        }
    }

    info!("Wrote {} papers to {}", papers.len(), papers_path.display());
    info!(
        "Wrote {} citation edges to {}",
        graph.citation_count(),
        citations_path.display()
    );
    Ok((papers_path, citations_path))
}
