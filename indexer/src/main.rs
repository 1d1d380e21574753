use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use postdex_core::config::{FilterConfig, IndexConfig, DEFAULT_MIN_TOKEN_LEN, DEFAULT_TABLE_SLOTS};
use postdex_core::persist::IndexPaths;
use postdex_core::pipeline::{self, StageReport};
use postdex_core::tokenizer::{count_tokens, load_stop_list, read_document, strip_markup, token_file_name, write_token_file, TokenFilter};
use postdex_core::{SearchEngine, WeightScheme};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query a hashed inverted index over HTML documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct IndexArgs {
    /// Number of hash table slots
    #[arg(long, default_value_t = DEFAULT_TABLE_SLOTS)]
    slots: usize,
    /// Minimum token length kept by the filter
    #[arg(long, default_value_t = DEFAULT_MIN_TOKEN_LEN)]
    min_len: usize,
    /// Stop list file, one word per line
    #[arg(long)]
    stop_list: Option<PathBuf>,
    /// Weight = round(frequency * scale / document length)
    #[arg(long, default_value_t = 100)]
    weight_scale: u32,
    /// Upper bound for weights
    #[arg(long, default_value_t = 99)]
    weight_max: u32,
}

impl IndexArgs {
    fn to_config(&self) -> Result<IndexConfig> {
        let stop_words = match &self.stop_list {
            Some(path) => load_stop_list(path).with_context(|| format!("reading stop list {}", path.display()))?,
            None => Vec::new(),
        };
        let config = IndexConfig {
            table_slots: self.slots,
            weight: WeightScheme { scale: self.weight_scale, max: self.weight_max },
            filter: FilterConfig { min_len: self.min_len, stop_words, ..FilterConfig::default() },
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Strip markup from HTML files and write per-document token counts
    Tokenize {
        /// Directory of HTML documents
        #[arg(long)]
        input: PathBuf,
        /// Artifact directory
        #[arg(long, default_value = "results")]
        output: PathBuf,
        #[command(flatten)]
        index: IndexArgs,
    },
    /// Aggregate token files into the dictionary, hash table and posting file
    Dictionary {
        #[arg(long, default_value = "results")]
        output: PathBuf,
        #[command(flatten)]
        index: IndexArgs,
    },
    /// Replace posting frequencies with term weights
    Weight {
        #[arg(long, default_value = "results")]
        output: PathBuf,
        #[command(flatten)]
        index: IndexArgs,
    },
    /// Assign document ids and rewrite postings to reference them
    DocIndex {
        #[arg(long, default_value = "results")]
        output: PathBuf,
    },
    /// Run every stage and write all artifacts plus the binary snapshot
    Build {
        /// Directory of HTML documents; omit to reuse existing token files
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value = "results")]
        output: PathBuf,
        #[command(flatten)]
        index: IndexArgs,
    },
    /// Delete token files and every artifact in the output directory
    Clean {
        #[arg(long, default_value = "results")]
        output: PathBuf,
    },
    /// Print the documents containing a term, one per line
    Search {
        #[arg(long, default_value = "results")]
        index: PathBuf,
        term: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Tokenize { input, output, index } => {
            let config = index.to_config()?;
            tokenize_corpus(&input, &IndexPaths::new(&output), &TokenFilter::from_config(&config.filter))?;
        }
        Commands::Dictionary { output, index } => {
            report(pipeline::run_dictionary_stage(&IndexPaths::new(&output), &index.to_config()?)?);
        }
        Commands::Weight { output, index } => {
            report(pipeline::run_weight_stage(&IndexPaths::new(&output), &index.to_config()?)?);
        }
        Commands::DocIndex { output } => {
            report(pipeline::run_doc_index_stage(&IndexPaths::new(&output))?);
        }
        Commands::Build { input, output, index } => {
            build(input.as_deref(), &IndexPaths::new(&output), &index.to_config()?)?;
        }
        Commands::Clean { output } => {
            pipeline::clean(&IndexPaths::new(&output))?;
        }
        Commands::Search { index, term } => {
            let engine = SearchEngine::open(&IndexPaths::new(&index))?;
            for doc in engine.search(&term) {
                println!("{doc}");
            }
        }
    }
    Ok(())
}

fn report(r: StageReport) {
    tracing::info!(stage = r.stage.name(), records = r.records, skipped = r.skipped, "stage complete");
}

fn build(input: Option<&Path>, paths: &IndexPaths, config: &IndexConfig) -> Result<()> {
    let start = Instant::now();
    if let Some(input) = input {
        tokenize_corpus(input, paths, &TokenFilter::from_config(&config.filter))?;
    }
    let index = pipeline::build_from_token_dir(&paths.tokenized(), config)?;
    pipeline::save_index(paths, &index, now_rfc3339())?;
    let stats = &index.stats;
    tracing::info!(
        num_docs = stats.num_docs,
        num_terms = stats.num_terms,
        collisions = stats.table.collisions,
        occupied = stats.table.occupied_slots,
        load_factor = stats.table.load_factor,
        took_s = start.elapsed().as_secs_f64(),
        output = %paths.root.display(),
        "index build complete"
    );
    Ok(())
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_else(|_| "".into())
}

fn html_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(input)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("html" | "htm")))
        .collect();
    files.sort();
    files
}

/// Corpus-relative name with `/` separators, e.g. `x/index.html`.
fn doc_name(input: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(input).unwrap_or(file);
    rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

/// Write a token file for every HTML file under `input`, replacing whatever
/// the output directory held before. Returns the number of documents.
fn tokenize_corpus(input: &Path, paths: &IndexPaths, filter: &TokenFilter) -> Result<usize> {
    if !input.is_dir() {
        bail!("input directory {} does not exist", input.display());
    }
    let files = html_files(input);
    let mut targets: HashMap<String, &Path> = HashMap::new();
    for file in &files {
        if let Some(other) = targets.insert(token_file_name(&doc_name(input, file)), file.as_path()) {
            bail!("{} and {} map to the same token file", other.display(), file.display());
        }
    }

    pipeline::clean(paths)?;
    let out_dir = paths.tokenized();
    fs::create_dir_all(&out_dir)?;
    for file in &files {
        let start = Instant::now();
        let raw = read_document(file).with_context(|| format!("reading {}", file.display()))?;
        let counts = count_tokens(&strip_markup(&raw), filter);
        let name = doc_name(input, file);
        write_token_file(&out_dir.join(token_file_name(&name)), &name, &counts)?;
        tracing::debug!(file = %file.display(), unique = counts.len(), took_s = start.elapsed().as_secs_f64(), "tokenized");
    }
    tracing::info!(num_docs = files.len(), output = %out_dir.display(), "tokenized corpus");
    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn tokenize_then_build_then_search() {
        let src = tempdir().unwrap();
        fs::write(src.path().join("simple.html"), "<html><body><p>Cat cat cat dog</p></body></html>").unwrap();
        fs::write(src.path().join("medium.html"), "<html><body><b>cat</b></body></html>").unwrap();
        fs::write(src.path().join("readme.txt"), "cat").unwrap();

        let out = tempdir().unwrap();
        let paths = IndexPaths::new(out.path());
        build(Some(src.path()), &paths, &IndexConfig::default()).unwrap();

        let tokens = fs::read_to_string(paths.tokenized().join("simple_tokens.txt")).unwrap();
        assert_eq!(tokens, "# document: simple.html\ncat 3\ndog 1\n");
        assert!(paths.snapshot().exists());
        assert!(paths.meta().exists());

        let engine = SearchEngine::open(&paths).unwrap();
        assert_eq!(engine.search("Cat"), vec!["medium.html", "simple.html"]);
        assert!(engine.search("readme").is_empty());
    }

    #[test]
    fn missing_input_dir_is_an_error() {
        let out = tempdir().unwrap();
        let err = tokenize_corpus(&out.path().join("nope"), &IndexPaths::new(out.path()), &TokenFilter::default()).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn nested_and_htm_documents_keep_their_names() {
        let src = tempdir().unwrap();
        fs::create_dir_all(src.path().join("x")).unwrap();
        fs::create_dir_all(src.path().join("y")).unwrap();
        fs::write(src.path().join("x/index.html"), "<p>alpha</p>").unwrap();
        fs::write(src.path().join("y/index.html"), "<p>beta</p>").unwrap();
        fs::write(src.path().join("page.htm"), "<p>gamma</p>").unwrap();

        let out = tempdir().unwrap();
        let paths = IndexPaths::new(out.path());
        build(Some(src.path()), &paths, &IndexConfig::default()).unwrap();

        let engine = SearchEngine::open(&paths).unwrap();
        assert_eq!(engine.search("alpha"), vec!["x/index.html"]);
        assert_eq!(engine.search("beta"), vec!["y/index.html"]);
        assert_eq!(engine.search("gamma"), vec!["page.htm"]);
    }

    #[test]
    fn clashing_token_files_are_refused() {
        let src = tempdir().unwrap();
        fs::write(src.path().join("page.html"), "<p>one</p>").unwrap();
        fs::write(src.path().join("page.htm"), "<p>two</p>").unwrap();
        let out = tempdir().unwrap();
        let err = tokenize_corpus(src.path(), &IndexPaths::new(out.path()), &TokenFilter::default()).unwrap_err();
        assert!(err.to_string().contains("same token file"));
    }

    #[test]
    fn removed_document_leaves_the_index_on_rebuild() {
        let src = tempdir().unwrap();
        fs::write(src.path().join("a.html"), "<p>alpha</p>").unwrap();
        fs::write(src.path().join("b.html"), "<p>beta</p>").unwrap();
        let out = tempdir().unwrap();
        let paths = IndexPaths::new(out.path());
        build(Some(src.path()), &paths, &IndexConfig::default()).unwrap();
        assert_eq!(SearchEngine::open(&paths).unwrap().search("alpha"), vec!["a.html"]);

        fs::remove_file(src.path().join("a.html")).unwrap();
        build(Some(src.path()), &paths, &IndexConfig::default()).unwrap();
        let engine = SearchEngine::open(&paths).unwrap();
        assert!(engine.search("alpha").is_empty());
        assert_eq!(engine.search("beta"), vec!["b.html"]);
        assert!(!paths.tokenized().join("a_tokens.txt").exists());
    }

    #[test]
    fn clean_empties_the_output_directory() {
        let src = tempdir().unwrap();
        fs::write(src.path().join("a.html"), "<p>alpha</p>").unwrap();
        let out = tempdir().unwrap();
        let paths = IndexPaths::new(out.path());
        build(Some(src.path()), &paths, &IndexConfig::default()).unwrap();
        fs::write(paths.tokenized().join("notes.txt"), "keep").unwrap();

        pipeline::clean(&paths).unwrap();
        assert!(!paths.tokenized().join("a_tokens.txt").exists());
        assert!(paths.tokenized().join("notes.txt").exists());
        for artifact in [paths.dictionary(), paths.hash_table(), paths.documents(), paths.postings_indexed(), paths.snapshot(), paths.meta()] {
            assert!(!artifact.exists(), "{} survived", artifact.display());
        }
    }
}
