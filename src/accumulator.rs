use std::collections::HashSet;

use crate::reader::Record;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub citing: String,
    pub cited: String,
}

/// In-memory citation graph built during the read phase.
///
/// Papers are a set; citations keep every edge in the order it was added,
/// duplicates and self-citations included.
#[derive(Debug, Default)]
pub struct CitationGraph {
    papers: HashSet<String>,
    citations: Vec<Citation>,
}

impl CitationGraph {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_paper(&mut self, id: &str) {
        if !self.papers.contains(id) {
            self.papers.insert(id.to_string());
        }
    }

    pub fn add_citation(&mut self, citing: &str, cited: &str) {
        self.add_paper(citing);
        self.add_paper(cited);
        self.citations.push(Citation {
            citing: citing.to_string(),
            cited: cited.to_string(),
        });
    }

    /// Applies one parsed record. Returns false when the record has no
    /// usable paper id, in which case its references are ignored too.
    pub fn ingest(&mut self, record: &Record) -> bool {
        let paper_id = match record.paper.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => return false,
        };

        self.add_paper(paper_id);
        for cited in record.reference.iter().flatten() {
            self.add_citation(paper_id, cited);
        }
        true
    }

    pub fn paper_count(&self) -> usize {
        self.papers.len()
    }

    pub fn citation_count(&self) -> usize {
        self.citations.len()
    }

    pub fn papers(&self) -> &HashSet<String> {
        &self.papers
    }

    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    /// Paper ids in byte order, so repeated runs write identical tables.
    pub fn sorted_papers(&self) -> Vec<&str> {
        let mut papers: Vec<&str> = self.papers.iter().map(String::as_str).collect();
        papers.sort_unstable();
        papers
    }
}
