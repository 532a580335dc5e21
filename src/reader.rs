use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use indicatif::ProgressBar;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::accumulator::CitationGraph;
use crate::ProcessingStats;

const READ_BUFFER_SIZE: usize = 256 * 1024;

/// One input line. Both fields are optional and anything else is ignored.
///
/// Ids may be JSON strings or numbers; numbers keep their JSON spelling
/// (`123` becomes `"123"`). Any other id type makes the line malformed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Record {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub paper: Option<String>,
    #[serde(default, deserialize_with = "deserialize_ids")]
    pub reference: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl From<RawId> for String {
    fn from(id: RawId) -> Self {
        match id {
            RawId::Text(text) => text,
            RawId::Number(number) => number.to_string(),
        }
    }
}

fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}

fn deserialize_ids<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<String>>, D::Error> {
    Ok(Option::<Vec<RawId>>::deserialize(deserializer)?
        .map(|ids| ids.into_iter().map(String::from).collect()))
}

/// What to do with a line that is not a valid record.
///
/// A line is malformed when it is not valid UTF-8, is not a JSON object
/// (blank lines included), or carries ids of the wrong type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ErrorPolicy {
    /// Stop the whole run on the first malformed line
    #[default]
    Abort,
    /// Log the line, count it, and keep going
    Skip,
}

/// Opens an input file, transparently gunzipping `.gz` paths (all members of
/// a multi-member archive). Progress is tracked on the raw bytes pulled from
/// disk.
pub fn open_input(path: &Path, progress: &ProgressBar) -> Result<Box<dyn BufRead>> {
    let file =
        File::open(path).with_context(|| format!("failed to open input {}", path.display()))?;
    let len = file.metadata().map(|m| m.len()).unwrap_or(0);
    progress.set_length(len);
    progress.set_position(0);

    let raw = progress.wrap_read(file);
    let is_gzip = path.extension().is_some_and(|ext| ext == "gz");
    let inner: Box<dyn Read> = if is_gzip {
        Box::new(MultiGzDecoder::new(raw))
    } else {
        Box::new(raw)
    };

    Ok(Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, inner)))
}

/// Parses one raw line. Only JSON objects are records.
pub fn parse_line(line: &[u8]) -> serde_json::Result<Record> {
    let object: Map<String, Value> = serde_json::from_slice(line)?;
    serde_json::from_value(Value::Object(object))
}

/// Streams every line of `reader` into `graph`. Lines are read as raw bytes
/// so that bad encoding is handled by `policy`; only I/O errors are always
/// fatal.
pub fn read_records<R: BufRead>(
    mut reader: R,
    source: &Path,
    policy: ErrorPolicy,
    graph: &mut CitationGraph,
    stats: &mut ProcessingStats,
) -> Result<()> {
    let mut buf = Vec::new();
    let mut line_no = 0usize;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .with_context(|| format!("failed to read {} after line {}", source.display(), line_no))?;
        if read == 0 {
            break;
        }
        line_no += 1;
        stats.lines_read += 1;

        let line = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
        let record = match parse_line(line) {
            Ok(record) => record,
            Err(e) => match policy {
                ErrorPolicy::Abort => {
                    return Err(e).with_context(|| {
                        format!("malformed record in {} at line {}", source.display(), line_no)
                    });
                }
                ErrorPolicy::Skip => {
                    warn!("Skipping malformed line {} in {}: {}", line_no, source.display(), e);
                    stats.malformed_lines += 1;
                    continue;
                }
            },
        };

        if graph.ingest(&record) {
            stats.records_used += 1;
        } else {
            debug!("Line {} in {} has no paper id", line_no, source.display());
            stats.records_without_paper += 1;
        }
    }

    Ok(())
}

/// Reads one input file into `graph`.
pub fn read_file(
    path: &Path,
    policy: ErrorPolicy,
    graph: &mut CitationGraph,
    stats: &mut ProcessingStats,
    progress: &ProgressBar,
) -> Result<()> {
    info!("Reading {}", path.display());
    progress.set_message(path.display().to_string());

    let reader = open_input(path, progress)?;
    read_records(reader, path, policy, graph, stats)?;

    stats.files_processed += 1;
    info!(
        "Finished {}: {} papers, {} citation edges so far",
        path.display(),
        graph.paper_count(),
        graph.citation_count()
    );
    Ok(())
}
