use crate::error::BuildError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopWords {
    English,
    None,
}

/// Knobs of a build run. Every threshold lives here and is written into the
/// artifact manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub stop_words: StopWords,
    /// Terms appearing in fewer documents than this are dropped from the vocabulary.
    pub min_df: u32,
    pub min_token_len: usize,
    /// Separator used when `genres` arrives as a single joined string.
    pub genre_delimiter: char,
    /// Worker threads for the similarity matrix; `None` uses the global rayon pool.
    pub threads: Option<usize>,
    pub max_matrix_bytes: u64,
    pub max_similarity_secs: Option<u64>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            stop_words: StopWords::English,
            min_df: 1,
            min_token_len: 2,
            genre_delimiter: '|',
            threads: None,
            max_matrix_bytes: 2 * 1024 * 1024 * 1024,
            max_similarity_secs: None,
        }
    }
}

impl BuildConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BuildError::Config(format!("{}: {e}", path.display())))?;
        let cfg: BuildConfig = serde_json::from_str(&raw)
            .map_err(|e| BuildError::Config(format!("{}: {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), BuildError> {
        if self.min_df == 0 {
            return Err(BuildError::Config("min_df must be at least 1".into()));
        }
        if self.min_token_len == 0 {
            return Err(BuildError::Config("min_token_len must be at least 1".into()));
        }
        if self.threads == Some(0) {
            return Err(BuildError::Config("threads must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: BuildConfig = serde_json::from_str(r#"{"min_df": 2, "stop_words": "none"}"#).unwrap();
        assert_eq!(cfg.min_df, 2);
        assert_eq!(cfg.stop_words, StopWords::None);
        assert_eq!(cfg.genre_delimiter, '|');
        assert!(cfg.threads.is_none());
    }

    #[test]
    fn zero_min_df_is_rejected() {
        let cfg = BuildConfig { min_df: 0, ..BuildConfig::default() };
        assert!(matches!(cfg.validate(), Err(BuildError::Config(_))));
    }
}
