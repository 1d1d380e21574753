//! Term aggregation: per-document `(token, count)` pairs in, one
//! `token -> {document -> frequency}` map out.

use crate::error::{IndexError, Result};
use crate::tokenizer::{doc_name_from_token_file, parse_doc_header, TokenFilter};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// token -> (document name -> frequency). Inner maps iterate in filename order.
pub type TermMap = HashMap<String, BTreeMap<String, u32>>;

/// Everything the later stages need from the aggregation pass.
#[derive(Debug, Default)]
pub struct Corpus {
    pub terms: TermMap,
    /// Sum of every well-formed count seen for a document, filtered or not.
    pub doc_lengths: BTreeMap<String, u64>,
    pub skipped_lines: usize,
}

#[derive(Debug, Default)]
pub struct TermAggregator {
    corpus: Corpus,
    filter: Option<TokenFilter>,
}

impl TermAggregator {
    pub fn new() -> Self { Self::default() }

    pub fn with_filter(filter: TokenFilter) -> Self {
        Self { corpus: Corpus::default(), filter: Some(filter) }
    }

    pub fn add(&mut self, doc: &str, token: &str, count: u32) {
        *self.corpus.doc_lengths.entry(doc.to_string()).or_insert(0) += u64::from(count);
        if let Some(filter) = &self.filter {
            if !filter.accepts(token) { return; }
        }
        let docs = self.corpus.terms.entry(token.to_string()).or_default();
        *docs.entry(doc.to_string()).or_insert(0) += count;
    }

    /// Parse one `token count` line. Blank lines are ignored; anything else that
    /// does not have exactly two fields with a positive integer count is
    /// counted as skipped and returns false.
    pub fn ingest_line(&mut self, doc: &str, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() { return true; }
        let mut fields = line.split_whitespace();
        let parsed = match (fields.next(), fields.next(), fields.next()) {
            (Some(token), Some(count), None) => count.parse::<u32>().ok().filter(|c| *c > 0).map(|c| (token, c)),
            _ => None,
        };
        match parsed {
            Some((token, count)) => {
                self.add(doc, token, count);
                true
            }
            None => {
                self.corpus.skipped_lines += 1;
                false
            }
        }
    }

    pub fn ingest_reader<R: BufRead>(&mut self, doc: &str, reader: R) -> Result<()> {
        for line in reader.lines() {
            self.ingest_line(doc, &line?);
        }
        Ok(())
    }

    /// Read one `*_tokens.txt` file. The document is the one its header
    /// names; files without a header read as `<stem>.html`.
    pub fn ingest_token_file(&mut self, path: &Path) -> Result<Option<String>> {
        let Some(fallback) = doc_name_from_token_file(path) else { return Ok(None) };
        let mut lines = BufReader::new(File::open(path)?).lines();
        let first = lines.next().transpose()?;
        let header = first.as_deref().and_then(parse_doc_header).map(str::to_string);
        let doc = match header {
            Some(name) => name,
            None => {
                if let Some(line) = &first {
                    self.ingest_line(&fallback, line);
                }
                fallback
            }
        };
        for line in lines {
            self.ingest_line(&doc, &line?);
        }
        Ok(Some(doc))
    }

    /// Ingest every token file in `dir`, in path order. Returns how many were
    /// read. Two files naming the same document are an error.
    pub fn ingest_token_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && doc_name_from_token_file(p).is_some())
            .collect();
        files.sort();
        let mut seen = HashSet::new();
        for file in &files {
            let before = self.corpus.skipped_lines;
            if let Some(doc) = self.ingest_token_file(file)? {
                if !seen.insert(doc.clone()) {
                    return Err(IndexError::DuplicateDocument { document: doc, artifact: file.clone() });
                }
            }
            tracing::debug!(file = %file.display(), skipped = self.corpus.skipped_lines - before, "ingested token file");
        }
        if files.is_empty() {
            tracing::warn!(dir = %dir.display(), "no token files found; building an empty index");
        }
        Ok(files.len())
    }

    pub fn finish(self) -> Corpus {
        let corpus = self.corpus;
        if corpus.skipped_lines > 0 {
            tracing::warn!(skipped = corpus.skipped_lines, "skipped malformed token lines");
        }
        tracing::info!(num_terms = corpus.terms.len(), num_docs = corpus.doc_lengths.len(), "aggregated corpus");
        corpus
    }
}
