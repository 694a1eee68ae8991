use crate::config::{BuildConfig, StopWords};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}][\p{L}\p{N}_']*").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// NFKC-normalize and lower-case. Applied once per document by the corpus builder.
pub fn normalize_text(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase()
}

/// Splits already-normalized text into terms. Persisted with the vectorizer so
/// later transforms tokenize exactly like the fit did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokenizer {
    pub stop_words: StopWords,
    pub min_token_len: usize,
}

impl Default for Tokenizer {
    fn default() -> Self { Self { stop_words: StopWords::English, min_token_len: 2 } }
}

impl Tokenizer {
    pub fn from_config(cfg: &BuildConfig) -> Self {
        Self { stop_words: cfg.stop_words, min_token_len: cfg.min_token_len }
    }

    fn is_stopword(&self, token: &str) -> bool {
        self.stop_words == StopWords::English && STOPWORDS.contains(token)
    }

    pub fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str> {
        RE.find_iter(text)
            .map(|m| m.as_str())
            .filter(|t| t.chars().count() >= self.min_token_len)
            .filter(|t| !self.is_stopword(t))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = Tokenizer::default().tokenize("a comedy, drama & horror!");
        assert_eq!(t, vec!["comedy", "drama", "horror"]);
    }

    #[test]
    fn stop_words_can_be_disabled() {
        let tok = Tokenizer { stop_words: StopWords::None, min_token_len: 2 };
        assert_eq!(tok.tokenize("the end"), vec!["the", "end"]);
    }
}
