use crate::config::FilterConfig;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::Html;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

pub const TOKEN_FILE_SUFFIX: &str = "_tokens.txt";

lazy_static! {
    static ref WORD_RE: Regex = Regex::new(r"(?u)\b\p{L}(?:[\p{L}\p{N}\-]*[\p{L}\p{N}])?\b").expect("valid regex");
}

/// Decode raw bytes as utf-8, falling back to latin-1 (every byte maps to
/// the code point of the same value) when the input is not valid utf-8.
pub fn decode_document(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

pub fn read_document(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(decode_document(&bytes).into_owned())
}

/// Visible text of an HTML document. Script and style bodies are dropped,
/// entities come back decoded.
pub fn strip_markup(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut out = String::new();
    for node in doc.tree.root().descendants() {
        let Some(text) = node.value().as_text() else { continue };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| matches!(e.name(), "script" | "style")))
            .unwrap_or(false);
        if hidden { continue; }
        out.push_str(text);
        out.push(' ');
    }
    out
}

/// NFKC + lowercase; the same normalization documents go through.
pub fn normalize_term(text: &str) -> String {
    text.trim().nfkc().collect::<String>().to_lowercase()
}

/// Split text into lowercased NFKC words. No filtering happens here.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = normalize_term(text);
    WORD_RE
        .find_iter(&normalized)
        .map(|m| m.as_str().trim_matches('-').to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

#[derive(Debug, Clone)]
pub struct TokenFilter {
    min_len: usize,
    reject_numeric: bool,
    stop_words: HashSet<String>,
}

impl TokenFilter {
    pub fn from_config(cfg: &FilterConfig) -> Self {
        Self {
            min_len: cfg.min_len,
            reject_numeric: cfg.reject_numeric,
            stop_words: cfg.stop_words.iter().map(|w| w.trim().to_lowercase()).filter(|w| !w.is_empty()).collect(),
        }
    }

    pub fn accepts(&self, token: &str) -> bool {
        if token.chars().count() < self.min_len { return false; }
        if self.reject_numeric && token.chars().all(|c| c.is_ascii_digit()) { return false; }
        !self.stop_words.contains(token)
    }
}

impl Default for TokenFilter {
    fn default() -> Self { Self::from_config(&FilterConfig::default()) }
}

/// Count accepted tokens of one document, sorted case-insensitively (raw order breaks ties).
pub fn count_tokens(text: &str, filter: &TokenFilter) -> Vec<(String, u32)> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for token in tokenize(text) {
        if filter.accepts(&token) {
            *counts.entry(token).or_insert(0) += 1;
        }
    }
    let mut sorted: Vec<(String, u32)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| a.0.to_lowercase().cmp(&b.0.to_lowercase()).then_with(|| a.0.cmp(&b.0)));
    sorted
}

/// First line of every token file; the rest of the line is the document name.
pub const DOC_HEADER: &str = "# document: ";

/// Token file for a corpus-relative document name. Directories are folded
/// into the file name, so `simple.html` -> `simple_tokens.txt` and
/// `x/index.html` -> `x__index_tokens.txt`.
pub fn token_file_name(doc_name: &str) -> String {
    let without_ext = Path::new(doc_name).with_extension("");
    let flat = without_ext.to_string_lossy().replace(['/', '\\'], "__");
    format!("{flat}{TOKEN_FILE_SUFFIX}")
}

/// `simple_tokens.txt` -> `simple.html`. Only used for token files written
/// without a document header. None for files that are not token files.
pub fn doc_name_from_token_file(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(TOKEN_FILE_SUFFIX)?;
    Some(format!("{stem}.html"))
}

/// Document name carried by a header line, if `line` is one.
pub fn parse_doc_header(line: &str) -> Option<&str> {
    line.strip_prefix(DOC_HEADER).map(str::trim).filter(|name| !name.is_empty())
}

pub fn write_token_file(path: &Path, doc_name: &str, counts: &[(String, u32)]) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "{DOC_HEADER}{doc_name}")?;
    for (token, count) in counts {
        writeln!(w, "{token} {count}")?;
    }
    w.flush()
}

/// One stop word per line; blank lines ignored.
pub fn load_stop_list(path: &Path) -> io::Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut words = Vec::new();
    for line in reader.lines() {
        let word = line?.trim().to_lowercase();
        if !word.is_empty() { words.push(word); }
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Hello, WORLD! co-op -dash- año 2024");
        assert_eq!(t, vec!["hello", "world", "co-op", "dash", "año"]);
    }

    #[test]
    fn filter_drops_short_numeric_and_stop_words() {
        let cfg = FilterConfig { stop_words: vec!["The".into()], ..FilterConfig::default() };
        let f = TokenFilter::from_config(&cfg);
        assert!(!f.accepts("a"));
        assert!(!f.accepts("1999"));
        assert!(!f.accepts("the"));
        assert!(f.accepts("cat"));
        assert!(f.accepts("b2"));
    }

    #[test]
    fn markup_is_stripped() {
        let html = "<html><head><style>p { color: red }</style><script>var x = 1;</script></head>\
                    <body><p>Cats &amp; dogs</p></body></html>";
        let text = strip_markup(html);
        let words = tokenize(&text);
        assert_eq!(words, vec!["cats", "dogs"]);
    }

    #[test]
    fn latin1_fallback() {
        let bytes = [b'c', b'a', b'f', 0xE9];
        assert_eq!(decode_document(&bytes), "café");
        assert_eq!(decode_document("plain".as_bytes()), "plain");
    }

    #[test]
    fn counts_sorted_case_insensitively() {
        let counts = count_tokens("dog cat Dog bird cat cat", &TokenFilter::default());
        assert_eq!(counts, vec![("bird".to_string(), 1), ("cat".to_string(), 3), ("dog".to_string(), 2)]);
    }

    #[test]
    fn token_file_names() {
        assert_eq!(token_file_name("simple.html"), "simple_tokens.txt");
        assert_eq!(token_file_name("page.htm"), "page_tokens.txt");
        assert_eq!(token_file_name("x/index.html"), "x__index_tokens.txt");
        assert_ne!(token_file_name("x/index.html"), token_file_name("y/index.html"));
        assert_eq!(doc_name_from_token_file(Path::new("dir/simple_tokens.txt")).as_deref(), Some("simple.html"));
        assert_eq!(doc_name_from_token_file(Path::new("dir/notes.txt")), None);
    }

    #[test]
    fn header_names_the_document() {
        assert_eq!(parse_doc_header("# document: x/index.html"), Some("x/index.html"));
        assert_eq!(parse_doc_header("# document: "), None);
        assert_eq!(parse_doc_header("cat 3"), None);
    }
}
