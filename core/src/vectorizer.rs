//! TF-IDF fitting and transformation.
//!
//! Weights follow the smoothed scheme `idf(t) = ln((1 + N) / (1 + df(t))) + 1`
//! with raw term counts as tf and L2 normalization per document, so dot
//! products between transformed vectors are cosine similarities.

use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::tokenizer::Tokenizer;
use crate::TermId;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, BTreeSet};

/// Sparse, index-sorted term weights for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<TermId>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn nnz(&self) -> usize { self.indices.len() }
    pub fn is_zero(&self) -> bool { self.values.iter().all(|v| *v == 0.0) }

    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| (*v as f64) * (*v as f64)).sum::<f64>().sqrt()
    }

    /// Merge-join dot product; both sides are sorted by term id.
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut a, mut b) = (0, 0);
        let mut acc = 0.0f64;
        while a < self.indices.len() && b < other.indices.len() {
            match self.indices[a].cmp(&other.indices[b]) {
                std::cmp::Ordering::Less => a += 1,
                std::cmp::Ordering::Greater => b += 1,
                std::cmp::Ordering::Equal => {
                    acc += self.values[a] as f64 * other.values[b] as f64;
                    a += 1;
                    b += 1;
                }
            }
        }
        acc
    }
}

/// A fitted vectorizer. The only way to obtain one is [`TfidfVectorizer::fit`],
/// and it is immutable afterwards; the fingerprint ties every derived artifact
/// to this exact vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    tokenizer: Tokenizer,
    vocabulary: BTreeMap<String, TermId>,
    idf: Vec<f64>,
    num_docs: usize,
    fingerprint: String,
}

impl TfidfVectorizer {
    pub fn fit(documents: &[String], cfg: &BuildConfig) -> Result<Self, BuildError> {
        let tokenizer = Tokenizer::from_config(cfg);
        let mut df: BTreeMap<&str, u32> = BTreeMap::new();
        for doc in documents {
            let unique: BTreeSet<&str> = tokenizer.tokenize(doc).into_iter().collect();
            for term in unique {
                *df.entry(term).or_insert(0) += 1;
            }
        }

        let n = documents.len();
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::new();
        // BTreeMap iteration is lexicographic, which fixes the id order.
        for (term, count) in df.into_iter().filter(|(_, c)| *c >= cfg.min_df) {
            vocabulary.insert(term.to_string(), idf.len() as TermId);
            idf.push(smoothed_idf(n, count));
        }
        if vocabulary.is_empty() {
            return Err(BuildError::EmptyVocabulary { num_docs: n });
        }

        let fingerprint = fingerprint(n, &vocabulary, &idf);
        tracing::info!(num_docs = n, vocab_size = vocabulary.len(), %fingerprint, "fitted vectorizer");
        Ok(Self { tokenizer, vocabulary, idf, num_docs: n, fingerprint })
    }

    pub fn transform(&self, documents: &[String]) -> Vec<SparseVector> {
        documents.iter().map(|d| self.transform_one(d)).collect()
    }

    pub fn transform_one(&self, document: &str) -> SparseVector {
        let mut counts: BTreeMap<TermId, u32> = BTreeMap::new();
        for token in self.tokenizer.tokenize(document) {
            if let Some(&tid) = self.vocabulary.get(token) {
                *counts.entry(tid).or_insert(0) += 1;
            }
        }

        let weights: Vec<(TermId, f64)> = counts
            .into_iter()
            .map(|(tid, tf)| (tid, tf as f64 * self.idf[tid as usize]))
            .collect();
        let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();

        let mut out = SparseVector { indices: Vec::with_capacity(weights.len()), values: Vec::with_capacity(weights.len()) };
        if norm == 0.0 { return out; }
        for (tid, w) in weights {
            out.indices.push(tid);
            out.values.push((w / norm) as f32);
        }
        out
    }

    pub fn vocabulary(&self) -> &BTreeMap<String, TermId> { &self.vocabulary }
    pub fn idf(&self) -> &[f64] { &self.idf }
    pub fn num_docs(&self) -> usize { self.num_docs }
    pub fn fingerprint(&self) -> &str { &self.fingerprint }
    pub fn tokenizer(&self) -> &Tokenizer { &self.tokenizer }

    /// Recomputes the fingerprint from the stored state, for load-time checks.
    pub fn computed_fingerprint(&self) -> String { fingerprint(self.num_docs, &self.vocabulary, &self.idf) }
}

pub fn smoothed_idf(num_docs: usize, df: u32) -> f64 {
    ((1.0 + num_docs as f64) / (1.0 + df as f64)).ln() + 1.0
}

fn fingerprint(num_docs: usize, vocabulary: &BTreeMap<String, TermId>, idf: &[f64]) -> String {
    let mut hasher = Sha1::new();
    hasher.update((num_docs as u64).to_le_bytes());
    for (term, &tid) in vocabulary {
        hasher.update(term.as_bytes());
        hasher.update([0u8]);
        hasher.update(idf[tid as usize].to_bits().to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}
