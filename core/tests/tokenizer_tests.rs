use postdex_core::config::FilterConfig;
use postdex_core::tokenizer::{count_tokens, strip_markup, TokenFilter};

#[test]
fn it_normalizes_and_filters_html() {
    let html = "<html><body><h1>Cats</h1><p>The CAT sat. 42 cats, x!</p></body></html>";
    let counts = count_tokens(&strip_markup(html), &TokenFilter::default());
    assert_eq!(counts, vec![("cat".to_string(), 1), ("cats".to_string(), 2), ("sat".to_string(), 1), ("the".to_string(), 1)]);
}

#[test]
fn it_filters_stopwords() {
    let cfg = FilterConfig { stop_words: vec!["the".into(), "and".into()], ..FilterConfig::default() };
    let counts = count_tokens("The quick brown fox and the lazy dog", &TokenFilter::from_config(&cfg));
    let words: Vec<&str> = counts.iter().map(|(w, _)| w.as_str()).collect();
    assert!(!words.contains(&"the"));
    assert!(!words.contains(&"and"));
    assert!(words.contains(&"fox"));
}

#[test]
fn it_respects_min_length() {
    let cfg = FilterConfig { min_len: 4, ..FilterConfig::default() };
    let counts = count_tokens("the quick fox jumped", &TokenFilter::from_config(&cfg));
    let words: Vec<&str> = counts.iter().map(|(w, _)| w.as_str()).collect();
    assert_eq!(words, vec!["jumped", "quick"]);
}
