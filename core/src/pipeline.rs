//! Build orchestration. Stages run strictly in order; each consumes the
//! complete output of the previous one.
//!
//! `build_index` runs the whole chain in memory. The `run_*_stage` functions
//! run one step at a time against an artifact directory, checking that the
//! previous step's output is present before writing anything. A stage that
//! writes also deletes everything later stages derived from the old output.

use crate::aggregate::{Corpus, TermAggregator};
use crate::config::IndexConfig;
use crate::dictionary::Dictionary;
use crate::doc_index::DocumentIndex;
use crate::error::Result;
use crate::hash_table::HashTable;
use crate::index::{BuildStats, Index};
use crate::persist::{self, IndexPaths, MetaFile, META_VERSION};
use crate::postings::PostingStore;
use crate::tokenizer::TokenFilter;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Tokenize,
    Dictionary,
    Weight,
    DocIndex,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Tokenize => "tokenize",
            Stage::Dictionary => "dictionary",
            Stage::Weight => "weight",
            Stage::DocIndex => "doc-index",
        }
    }

    /// Files this stage writes under the output root. Token files are
    /// managed by `persist::clear_token_files`.
    pub fn outputs(self, paths: &IndexPaths) -> Vec<PathBuf> {
        match self {
            Stage::Tokenize => Vec::new(),
            Stage::Dictionary => vec![paths.dictionary(), paths.hash_table(), paths.postings()],
            Stage::Weight => vec![paths.postings_weighted()],
            Stage::DocIndex => vec![paths.documents(), paths.postings_indexed()],
        }
    }
}

const STAGES: [Stage; 4] = [Stage::Tokenize, Stage::Dictionary, Stage::Weight, Stage::DocIndex];

/// Delete the outputs of every stage after `stage`, and the snapshot and
/// meta.json of any earlier full build. Returns how many files went.
pub fn discard_downstream(paths: &IndexPaths, stage: Stage) -> Result<usize> {
    let later = STAGES.iter().skip_while(|s| **s != stage).skip(1);
    let mut removed = 0;
    for path in later.flat_map(|s| s.outputs(paths)).chain([paths.snapshot(), paths.meta()]) {
        if persist::remove_artifact(&path)? {
            removed += 1;
        }
    }
    if removed > 0 {
        tracing::info!(stage = stage.name(), removed, "discarded stale artifacts");
    }
    Ok(removed)
}

/// Remove token files and every derived artifact.
pub fn clean(paths: &IndexPaths) -> Result<usize> {
    let tokens = persist::clear_token_files(paths)?;
    let artifacts = discard_downstream(paths, Stage::Tokenize)?;
    tracing::info!(root = %paths.root.display(), tokens, artifacts, "output directory cleaned");
    Ok(tokens + artifacts)
}

/// Aggregate every token file under `dir`, applying the configured filter.
pub fn aggregate_token_dir(dir: &Path, config: &IndexConfig, stage: Stage) -> Result<Corpus> {
    persist::require(dir, stage.name(), Stage::Tokenize.name())?;
    let mut agg = TermAggregator::with_filter(TokenFilter::from_config(&config.filter));
    agg.ingest_token_dir(dir)?;
    Ok(agg.finish())
}

/// Run every stage in memory.
pub fn build_index(corpus: Corpus, config: &IndexConfig) -> Result<Index> {
    config.validate()?;
    let Corpus { terms, doc_lengths, skipped_lines } = corpus;

    let dictionary = Dictionary::build(&terms);
    let table = HashTable::build(&dictionary, config.table_slots)?;
    let postings = PostingStore::build(&dictionary, &terms);
    drop(terms);

    let weighted = config.weight.apply(postings, &doc_lengths);
    let documents = DocumentIndex::assign(&weighted);
    let postings = documents.reindex(&dictionary, weighted);

    let stats = BuildStats {
        num_docs: documents.len(),
        num_source_docs: doc_lengths.len(),
        num_terms: dictionary.len(),
        num_postings: postings.len(),
        skipped_lines,
        table: table.stats(),
    };
    tracing::info!(num_docs = stats.num_docs, num_terms = stats.num_terms, num_postings = stats.num_postings, "index built");
    Ok(Index { config: config.clone(), dictionary, table, postings, documents, stats })
}

pub fn build_from_token_dir(dir: &Path, config: &IndexConfig) -> Result<Index> {
    config.validate()?;
    let corpus = aggregate_token_dir(dir, config, Stage::Dictionary)?;
    build_index(corpus, config)
}

/// Persist every artifact of a finished build, including the snapshot.
/// Staged intermediates from an earlier run are removed first.
pub fn save_index(paths: &IndexPaths, index: &Index, created_at: String) -> Result<()> {
    discard_downstream(paths, Stage::Tokenize)?;
    persist::save_dictionary(paths, &index.dictionary)?;
    persist::save_hash_table(paths, &index.table)?;
    persist::save_documents(paths, &index.documents)?;
    persist::save_indexed_postings(&paths.postings_indexed(), &index.postings)?;
    persist::save_snapshot(paths, index)?;
    persist::save_meta(paths, &meta_for(index, created_at))?;
    tracing::info!(root = %paths.root.display(), "index artifacts written");
    Ok(())
}

fn meta_for(index: &Index, created_at: String) -> MetaFile {
    MetaFile {
        version: META_VERSION,
        created_at,
        config: index.config.clone(),
        num_docs: index.stats.num_docs,
        num_terms: index.stats.num_terms,
        num_postings: index.stats.num_postings,
        skipped_lines: index.stats.skipped_lines,
        table: index.stats.table,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    pub records: usize,
    pub skipped: usize,
}

/// tokenized/ -> dictionary.txt, hash_table.txt, postings.txt
pub fn run_dictionary_stage(paths: &IndexPaths, config: &IndexConfig) -> Result<StageReport> {
    config.validate()?;
    let corpus = aggregate_token_dir(&paths.tokenized(), config, Stage::Dictionary)?;
    let dictionary = Dictionary::build(&corpus.terms);
    let table = HashTable::build(&dictionary, config.table_slots)?;
    let postings = PostingStore::build(&dictionary, &corpus.terms);

    discard_downstream(paths, Stage::Dictionary)?;
    persist::save_dictionary(paths, &dictionary)?;
    persist::save_hash_table(paths, &table)?;
    persist::save_named_postings(&paths.postings(), &postings)?;
    Ok(StageReport { stage: Stage::Dictionary, records: postings.len(), skipped: corpus.skipped_lines })
}

/// postings.txt + token file lengths -> postings_weighted.txt
pub fn run_weight_stage(paths: &IndexPaths, config: &IndexConfig) -> Result<StageReport> {
    config.validate()?;
    let stage = Stage::Weight.name();
    persist::require(&paths.postings(), stage, Stage::Dictionary.name())?;
    persist::require(&paths.tokenized(), stage, Stage::Tokenize.name())?;

    // lengths count every token line, so read the files without the filter
    let mut agg = TermAggregator::new();
    agg.ingest_token_dir(&paths.tokenized())?;
    let doc_lengths: BTreeMap<String, u64> = agg.finish().doc_lengths;

    let loaded = persist::load_named_postings(&paths.postings())?;
    let weighted = config.weight.apply(loaded.value, &doc_lengths);
    discard_downstream(paths, Stage::Weight)?;
    persist::save_named_postings(&paths.postings_weighted(), &weighted)?;
    Ok(StageReport { stage: Stage::Weight, records: weighted.len(), skipped: loaded.skipped })
}

/// dictionary.txt + (weighted or raw) postings -> documents.txt, postings_indexed.txt
pub fn run_doc_index_stage(paths: &IndexPaths) -> Result<StageReport> {
    let stage = Stage::DocIndex.name();
    persist::require(&paths.dictionary(), stage, Stage::Dictionary.name())?;
    let source = if paths.postings_weighted().exists() { paths.postings_weighted() } else { paths.postings() };
    persist::require(&source, stage, Stage::Dictionary.name())?;

    let dictionary = persist::load_dictionary(paths)?;
    let postings = persist::load_named_postings(&source)?;
    let documents = DocumentIndex::assign(&postings.value);
    let indexed = documents.reindex(&dictionary.value, postings.value);

    discard_downstream(paths, Stage::DocIndex)?;
    persist::save_documents(paths, &documents)?;
    persist::save_indexed_postings(&paths.postings_indexed(), &indexed)?;
    Ok(StageReport { stage: Stage::DocIndex, records: documents.len(), skipped: dictionary.skipped + postings.skipped })
}
