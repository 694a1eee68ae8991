use crate::catalog::{CatalogRecord, TitleKind};
use crate::config::BuildConfig;
use crate::corpus::build_documents;
use crate::error::{BuildError, Result};
use crate::persist::{artifact_fingerprint, save_artifacts, ArtifactPaths, BuildHandle};
use crate::recommend::Recommender;
use crate::reference::ReferenceTable;
use crate::similarity::{self, SimilarityMatrix};
use crate::vectorizer::TfidfVectorizer;

/// In-memory result of one build run.
#[derive(Debug)]
pub struct BuildOutput {
    pub vectorizer: TfidfVectorizer,
    pub matrix: SimilarityMatrix,
    pub table: ReferenceTable,
}

impl BuildOutput {
    pub fn into_recommender(self) -> Result<Recommender> {
        let fingerprint = artifact_fingerprint(self.vectorizer.fingerprint(), &self.table, &self.matrix);
        Ok(Recommender::new(self.matrix, self.table, fingerprint)?)
    }
}

/// Corpus -> vectorizer -> similarity matrix -> reference table.
pub fn build(records: &[CatalogRecord], cfg: &BuildConfig) -> Result<BuildOutput> {
    cfg.validate()?;
    if records.is_empty() {
        return Err(BuildError::EmptyDataset.into());
    }
    let movies = records.iter().filter(|r| r.kind == TitleKind::Movie).count();
    let shows = records.iter().filter(|r| r.kind == TitleKind::Show).count();
    tracing::info!(records = records.len(), movies, shows, "building recommender");

    let documents = build_documents(records);
    let empty = documents.iter().filter(|d| d.trim().is_empty()).count();
    if empty > 0 {
        tracing::warn!(empty, "records without description or genres; they will match nothing");
    }

    let vectorizer = TfidfVectorizer::fit(&documents, cfg)?;
    let vectors = vectorizer.transform(&documents);
    let matrix = similarity::compute(&vectors, vectorizer.vocabulary().len(), cfg)?;
    drop(vectors);
    let table = ReferenceTable::from_records(records);
    Ok(BuildOutput { vectorizer, matrix, table })
}

/// Build and persist. Artifacts are written only after every stage succeeded.
pub fn build_and_save(records: &[CatalogRecord], cfg: &BuildConfig, paths: &ArtifactPaths) -> Result<BuildHandle> {
    let out = build(records, cfg)?;
    Ok(save_artifacts(paths, &out.vectorizer, &out.matrix, &out.table, cfg)?)
}
