use recsys_core::tokenizer::{normalize_text, Tokenizer};
use recsys_core::StopWords;

#[test]
fn it_normalizes_unicode_and_case() {
    let text = normalize_text("Café ＲＯＭＡＮＣＥ Dramas");
    let tok = Tokenizer::default();
    let words = tok.tokenize(&text);
    assert!(words.contains(&"romance"));
    assert!(words.contains(&"café"));
    assert!(words.contains(&"dramas"));
}

#[test]
fn it_filters_stopwords_and_short_tokens() {
    let words = Tokenizer::default().tokenize("the quick brown fox and a lazy dog x");
    assert!(!words.contains(&"the"));
    assert!(!words.contains(&"and"));
    assert!(!words.contains(&"x"));
    assert!(words.contains(&"fox"));
}

#[test]
fn genres_are_not_stemmed() {
    let tok = Tokenizer { stop_words: StopWords::None, min_token_len: 2 };
    assert_eq!(tok.tokenize("comedies dramas"), vec!["comedies", "dramas"]);
}
