use crate::error::{ArtifactError, QueryError};
use crate::persist::{load_artifacts, BuildHandle};
use crate::recommend::{Recommendation, Recommender};
use parking_lot::RwLock;
use std::sync::Arc;

/// Process-wide serving state.
///
/// Starts empty, is filled by [`SharedRecommender::install`] or
/// [`SharedRecommender::load`], may be swapped any number of times, and is
/// emptied again by [`SharedRecommender::shutdown`]. A swap replaces one `Arc`
/// under a write lock held only for the pointer store, so a query either sees
/// the old artifact set or the new one in full.
#[derive(Default)]
pub struct SharedRecommender {
    current: RwLock<Option<Arc<Recommender>>>,
}

impl SharedRecommender {
    pub fn new() -> Self { Self::default() }

    /// Install a recommender, returning the one it replaced.
    pub fn install(&self, recommender: Recommender) -> Option<Arc<Recommender>> {
        let next = Arc::new(recommender);
        tracing::info!(fingerprint = next.fingerprint(), num_docs = next.len(), "recommender installed");
        self.current.write().replace(next)
    }

    /// Load the artifact set behind `handle` and swap it in. On error the
    /// previously installed recommender stays in place.
    pub fn load(&self, handle: &BuildHandle) -> Result<(), ArtifactError> {
        let recommender = load_artifacts(handle)?.into_recommender()?;
        self.install(recommender);
        Ok(())
    }

    pub fn shutdown(&self) {
        if self.current.write().take().is_some() {
            tracing::info!("recommender released");
        }
    }

    pub fn is_ready(&self) -> bool { self.current.read().is_some() }

    pub fn current(&self) -> Result<Arc<Recommender>, QueryError> {
        self.current.read().clone().ok_or(QueryError::ArtifactsUnavailable)
    }

    pub fn recommend(&self, title: &str, k: usize) -> Result<Vec<String>, QueryError> {
        self.current()?.recommend(title, k)
    }

    pub fn recommend_scored(&self, title: &str, k: usize) -> Result<Vec<Recommendation>, QueryError> {
        self.current()?.recommend_scored(title, k)
    }
}
