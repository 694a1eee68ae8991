use std::path::PathBuf;
use thiserror::Error;

/// Failures of the offline build phase. Any of these aborts the build before
/// artifacts are written.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to read catalog {path}: {message}")]
    Input { path: PathBuf, message: String },

    #[error("catalog {path} is missing required column `{column}` (available: {available:?})")]
    MissingColumn { path: PathBuf, column: &'static str, available: Vec<String> },

    #[error("catalog contains no records")]
    EmptyDataset,

    #[error("no terms left after tokenization over {num_docs} documents")]
    EmptyVocabulary { num_docs: usize },

    #[error("resource budget exceeded: {0}")]
    ResourceExceeded(String),

    #[error("invalid build configuration: {0}")]
    Config(String),
}

/// Failures loading or writing the persisted artifact set.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact missing: {0}")]
    Missing(PathBuf),

    #[error("artifact corrupt: {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("fingerprint mismatch in {blob}: expected {expected}, found {found}")]
    FingerprintMismatch { blob: &'static str, expected: String, found: String },

    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("unsupported artifact format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("io error on {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

impl ArtifactError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            ArtifactError::Missing(path)
        } else {
            ArtifactError::Io { path, source }
        }
    }
}

/// Everything a caller of `recommend` can observe. Internal failures are mapped
/// into one of these before crossing the query boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("title not found: {0}")]
    TitleNotFound(String),

    #[error("recommendation artifacts unavailable")]
    ArtifactsUnavailable,

    #[error("invalid k: {0} (must be > 0)")]
    InvalidK(i64),
}

impl QueryError {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::TitleNotFound(_) => "title_not_found",
            QueryError::ArtifactsUnavailable => "artifacts_unavailable",
            QueryError::InvalidK(_) => "invalid_k",
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
