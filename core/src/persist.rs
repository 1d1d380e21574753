//! On-disk artifacts. Text files are line oriented with `;` separated fields;
//! the binary snapshot and `meta.json` go through bincode and serde_json.
//!
//! Every writer goes through a temp file and a rename, so a failed stage never
//! leaves a half-written artifact under its final name.

use crate::config::IndexConfig;
use crate::dictionary::{Dictionary, DictionaryEntry};
use crate::doc_index::DocumentIndex;
use crate::error::{IndexError, Result};
use crate::hash_table::{HashTable, Slot, TableStats};
use crate::index::{DocId, Index};
use crate::postings::{PostingRecord, PostingStore, ValueKind};
use crate::tokenizer::doc_name_from_token_file;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Token written for empty hash slots. Tokens are at least one letter long
/// and never start with `-`, so it cannot clash with a real token.
pub const EMPTY_SLOT_TOKEN: &str = "-";
pub const EMPTY_SLOT_OFFSET: i64 = -1;
pub const META_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub created_at: String,
    pub config: IndexConfig,
    pub num_docs: usize,
    pub num_terms: usize,
    pub num_postings: usize,
    pub skipped_lines: usize,
    pub table: TableStats,
}

/// A value read back from a text artifact plus the number of lines that did not parse.
#[derive(Debug)]
pub struct Loaded<T> {
    pub value: T,
    pub skipped: usize,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn tokenized(&self) -> PathBuf { self.root.join("tokenized") }
    pub fn dictionary(&self) -> PathBuf { self.root.join("dictionary.txt") }
    pub fn hash_table(&self) -> PathBuf { self.root.join("hash_table.txt") }
    pub fn postings(&self) -> PathBuf { self.root.join("postings.txt") }
    pub fn postings_weighted(&self) -> PathBuf { self.root.join("postings_weighted.txt") }
    pub fn postings_indexed(&self) -> PathBuf { self.root.join("postings_indexed.txt") }
    pub fn documents(&self) -> PathBuf { self.root.join("documents.txt") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn snapshot(&self) -> PathBuf { self.root.join("index.bin") }
}

/// Fail with `MissingInput` unless `path` exists.
pub fn require(path: &Path, stage: &'static str, run_first: &'static str) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(IndexError::MissingInput { artifact: path.to_path_buf(), stage, run_first })
    }
}

/// Delete `path`; false if it was not there.
pub fn remove_artifact(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Delete every token file under `tokenized/`. Other files are left alone.
pub fn clear_token_files(paths: &IndexPaths) -> Result<usize> {
    let dir = paths.tokenized();
    if !dir.is_dir() { return Ok(0); }
    let mut removed = 0;
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.is_file() && doc_name_from_token_file(&path).is_some() {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn write_atomic<F>(path: &Path, body: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    let result = (|| {
        let mut w = BufWriter::new(File::create(&tmp)?);
        body(&mut w)?;
        w.flush()
    })();
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_lines(path: &Path) -> Result<impl Iterator<Item = io::Result<String>>> {
    Ok(BufReader::new(File::open(path)?).lines())
}

// --- dictionary ---

pub fn save_dictionary(paths: &IndexPaths, dict: &Dictionary) -> Result<()> {
    write_atomic(&paths.dictionary(), |w| {
        for e in dict.entries() {
            writeln!(w, "{};{};{};{}", e.token, e.total_frequency, e.doc_count, e.posting_offset)?;
        }
        Ok(())
    })
}

/// Accepts `token;total;docs` or `token;total;docs;offset`. With every line
/// intact, offsets are recomputed from the line order. Once a line has been
/// dropped that would shift every later run, so the recorded offsets are kept
/// instead, and a file that cannot supply consistent ones is rejected.
pub fn load_dictionary(paths: &IndexPaths) -> Result<Loaded<Dictionary>> {
    let mut parsed = Vec::new();
    let mut skipped = 0;
    for line in read_lines(&paths.dictionary())? {
        let line = line?;
        if line.trim().is_empty() { continue; }
        match parse_dictionary_line(&line) {
            Some(e) => parsed.push(e),
            None => skipped += 1,
        }
    }
    if skipped == 0 {
        let entries = parsed.into_iter().map(|(e, _)| e).collect();
        return Ok(Loaded { value: Dictionary::from_entries(entries), skipped });
    }

    let corrupt = |reason: &str| IndexError::Corrupt { artifact: paths.dictionary(), reason: format!("{skipped} malformed lines and {reason}") };
    let entries = parsed
        .into_iter()
        .map(|(e, offset)| offset.map(|posting_offset| DictionaryEntry { posting_offset, ..e }))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| corrupt("no offset column to recover from"))?;
    let dict = Dictionary::with_recorded_offsets(entries).ok_or_else(|| corrupt("overlapping posting offsets"))?;
    tracing::warn!(path = %paths.dictionary().display(), skipped, "malformed dictionary lines dropped; keeping recorded offsets");
    Ok(Loaded { value: dict, skipped })
}

fn parse_dictionary_line(line: &str) -> Option<(DictionaryEntry, Option<usize>)> {
    let fields: Vec<&str> = line.trim().split(';').collect();
    if !(3..=4).contains(&fields.len()) || fields[0].is_empty() { return None; }
    let offset = match fields.get(3) {
        Some(raw) => Some(raw.parse().ok()?),
        None => None,
    };
    let entry = DictionaryEntry {
        token: fields[0].to_string(),
        total_frequency: fields[1].parse().ok()?,
        doc_count: fields[2].parse().ok()?,
        posting_offset: 0,
    };
    Some((entry, offset))
}

// --- hash table ---

pub fn save_hash_table(paths: &IndexPaths, table: &HashTable) -> Result<()> {
    write_atomic(&paths.hash_table(), |w| {
        writeln!(w, "# slots={}", table.num_slots())?;
        for (i, slot) in table.slots().iter().enumerate() {
            match slot {
                Slot::Empty => writeln!(w, "{i};{EMPTY_SLOT_TOKEN};0;0;{EMPTY_SLOT_OFFSET}")?,
                Slot::Chain(chain) => {
                    for e in chain {
                        writeln!(w, "{i};{};{};{};{}", e.token, e.total_frequency, e.doc_count, e.posting_offset)?;
                    }
                }
            }
        }
        Ok(())
    })
}

/// Entries go back into the slot their record names, not the one their
/// token hashes to.
pub fn load_hash_table(paths: &IndexPaths) -> Result<Loaded<HashTable>> {
    let mut lines = read_lines(&paths.hash_table())?;
    let header = lines.next().transpose()?.unwrap_or_default();
    let slots: usize = header
        .trim()
        .strip_prefix("# slots=")
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| IndexError::Corrupt { artifact: paths.hash_table(), reason: format!("header '{header}' has no slot count") })?;

    let mut records = Vec::new();
    let mut skipped = 0;
    for line in lines {
        let line = line?;
        if line.trim().is_empty() { continue; }
        match parse_table_line(&line) {
            Some(Some(rec)) => records.push(rec),
            Some(None) => {}
            None => skipped += 1,
        }
    }
    Ok(Loaded { value: HashTable::from_records(slots, records)?, skipped })
}

/// None: malformed. Some(None): an empty-slot marker.
fn parse_table_line(line: &str) -> Option<Option<(usize, DictionaryEntry)>> {
    let fields: Vec<&str> = line.trim().split(';').collect();
    if fields.len() != 5 { return None; }
    let slot: usize = fields[0].parse().ok()?;
    let offset: i64 = fields[4].parse().ok()?;
    if fields[1] == EMPTY_SLOT_TOKEN && offset == EMPTY_SLOT_OFFSET {
        return Some(None);
    }
    let entry = DictionaryEntry {
        token: fields[1].to_string(),
        total_frequency: fields[2].parse().ok()?,
        doc_count: fields[3].parse().ok()?,
        posting_offset: usize::try_from(offset).ok()?,
    };
    Some(Some((slot, entry)))
}

// --- postings ---

const NAME_COLUMN: &str = "document";
const ID_COLUMN: &str = "doc_id";

fn write_postings<D: Display>(path: &Path, doc_column: &str, store: &PostingStore<D>) -> Result<()> {
    write_atomic(path, |w| {
        writeln!(w, "{doc_column};{}", store.kind().column_name())?;
        for rec in store.records() {
            writeln!(w, "{};{}", rec.doc, rec.value)?;
        }
        Ok(())
    })
}

fn read_postings<D: FromStr>(path: &Path, doc_column: &str) -> Result<Loaded<PostingStore<D>>> {
    let mut kind = ValueKind::Frequency;
    let mut records = Vec::new();
    let mut skipped = 0;
    for (n, line) in read_lines(path)?.enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() { continue; }
        if n == 0 {
            if let Some(k) = line.strip_prefix(doc_column).and_then(|rest| rest.strip_prefix(';')).and_then(ValueKind::from_column_name) {
                kind = k;
                continue;
            }
        }
        // split from the right so document names may contain ';'
        let parsed = line
            .rsplit_once(';')
            .and_then(|(doc, value)| Some(PostingRecord { doc: doc.parse::<D>().ok()?, value: value.parse().ok()? }));
        match parsed {
            Some(rec) => records.push(rec),
            None => skipped += 1,
        }
    }
    Ok(Loaded { value: PostingStore::from_records(records, kind), skipped })
}

pub fn save_named_postings(path: &Path, store: &PostingStore<String>) -> Result<()> {
    write_postings(path, NAME_COLUMN, store)
}

pub fn load_named_postings(path: &Path) -> Result<Loaded<PostingStore<String>>> {
    read_postings(path, NAME_COLUMN)
}

pub fn save_indexed_postings(path: &Path, store: &PostingStore<DocId>) -> Result<()> {
    write_postings(path, ID_COLUMN, store)
}

pub fn load_indexed_postings(path: &Path) -> Result<Loaded<PostingStore<DocId>>> {
    read_postings(path, ID_COLUMN)
}

// --- documents ---

pub fn save_documents(paths: &IndexPaths, docs: &DocumentIndex) -> Result<()> {
    write_atomic(&paths.documents(), |w| {
        for (id, name) in docs.iter() {
            writeln!(w, "{id};{name}")?;
        }
        Ok(())
    })
}

pub fn load_documents(paths: &IndexPaths) -> Result<Loaded<DocumentIndex>> {
    let mut pairs = Vec::new();
    let mut skipped = 0;
    for line in read_lines(&paths.documents())? {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let parsed = line
            .trim()
            .split_once(';')
            .and_then(|(id, name)| Some((id.parse::<DocId>().ok()?, name.to_string())));
        match parsed {
            Some(pair) => pairs.push(pair),
            None => skipped += 1,
        }
    }
    let docs = DocumentIndex::from_pairs(pairs)
        .ok_or_else(|| IndexError::Corrupt { artifact: paths.documents(), reason: "document ids are not dense and unique".into() })?;
    Ok(Loaded { value: docs, skipped })
}

// --- meta + snapshot ---

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    let json = serde_json::to_string_pretty(meta)?;
    write_atomic(&paths.meta(), |w| w.write_all(json.as_bytes()))
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let f = File::open(paths.meta())?;
    Ok(serde_json::from_reader(BufReader::new(f))?)
}

pub fn save_snapshot(paths: &IndexPaths, index: &Index) -> Result<()> {
    let bytes = bincode::serialize(index)?;
    write_atomic(&paths.snapshot(), |w| w.write_all(&bytes))
}

pub fn load_snapshot(paths: &IndexPaths) -> Result<Index> {
    let bytes = fs::read(paths.snapshot())?;
    let mut index: Index = bincode::deserialize(&bytes)?;
    index.documents.rebuild_lookup();
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn table_lines_parse() {
        assert_eq!(parse_table_line("4;-;0;0;-1"), Some(None));
        let (slot, e) = parse_table_line("7;cat;4;2;0").unwrap().unwrap();
        assert_eq!((slot, e.token.as_str(), e.doc_count), (7, "cat", 2));
        assert!(parse_table_line("7;cat;4;2").is_none());
        assert!(parse_table_line("x;cat;4;2;0").is_none());
    }

    #[test]
    fn postings_header_sets_kind_and_bad_lines_skip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.txt");
        fs::write(&path, "document;weight\na;b.html;75\nbroken\nc.html;x\nd.html;3\n").unwrap();
        let loaded = load_named_postings(&path).unwrap();
        assert_eq!(loaded.value.kind(), ValueKind::Weight);
        assert_eq!(loaded.skipped, 2);
        let docs: Vec<&str> = loaded.value.records().iter().map(|r| r.doc.as_str()).collect();
        assert_eq!(docs, vec!["a;b.html", "d.html"]);
    }

    #[test]
    fn require_names_stage() {
        let dir = tempdir().unwrap();
        let err = require(&dir.path().join("dictionary.txt"), "weight", "dictionary").unwrap_err();
        assert!(err.to_string().contains("run 'dictionary' first"));
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        save_dictionary(&paths, &Dictionary::default()).unwrap();
        assert!(paths.dictionary().exists());
        assert!(!dir.path().join("dictionary.txt.tmp").exists());
    }
}
