use crate::config::BuildConfig;
use crate::error::{ArtifactError, BuildError};
use crate::vectorizer::SparseVector;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Dense, square, symmetric cosine-similarity matrix stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix")]
pub struct SimilarityMatrix {
    n: usize,
    data: Vec<f32>,
}

#[derive(Deserialize)]
struct RawMatrix {
    n: usize,
    data: Vec<f32>,
}

impl TryFrom<RawMatrix> for SimilarityMatrix {
    type Error = ArtifactError;
    fn try_from(raw: RawMatrix) -> Result<Self, Self::Error> { Self::from_raw(raw.n, raw.data) }
}

impl SimilarityMatrix {
    pub fn from_raw(n: usize, data: Vec<f32>) -> Result<Self, ArtifactError> {
        if n.checked_mul(n) != Some(data.len()) {
            return Err(ArtifactError::DimensionMismatch(format!(
                "matrix has {} cells, expected {n}x{n}",
                data.len()
            )));
        }
        Ok(Self { n, data })
    }

    pub fn dim(&self) -> usize { self.n }
    pub fn row(&self, i: usize) -> &[f32] { &self.data[i * self.n..(i + 1) * self.n] }
    pub fn get(&self, i: usize, j: usize) -> f32 { self.data[i * self.n + j] }
    pub fn as_slice(&self) -> &[f32] { &self.data }
}

pub fn matrix_bytes(n: usize) -> u128 {
    (n as u128) * (n as u128) * std::mem::size_of::<f32>() as u128
}

/// All-pairs cosine similarity over unit-normalized vectors.
///
/// Rows are distributed over rayon workers; each worker scatters its row
/// vector into a private dense scratch buffer and walks only the upper
/// triangle, then the lower triangle is mirrored in a single pass. Diagonal
/// cells are exactly 1.0 for nonzero vectors and 0.0 for zero vectors.
pub fn compute(vectors: &[SparseVector], vocab_size: usize, cfg: &BuildConfig) -> Result<SimilarityMatrix, BuildError> {
    let n = vectors.len();
    let bytes = matrix_bytes(n);
    if bytes > cfg.max_matrix_bytes as u128 {
        return Err(BuildError::ResourceExceeded(format!(
            "{n}x{n} similarity matrix needs {bytes} bytes, budget is {}",
            cfg.max_matrix_bytes
        )));
    }

    let start = Instant::now();
    let deadline = cfg.max_similarity_secs.map(|s| start + Duration::from_secs(s));
    let timed_out = AtomicBool::new(false);
    let mut data = vec![0.0f32; n * n];

    match cfg.threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| BuildError::Config(format!("thread pool: {e}")))?;
            pool.install(|| fill_upper(&mut data, vectors, vocab_size, deadline, &timed_out));
        }
        None => fill_upper(&mut data, vectors, vocab_size, deadline, &timed_out),
    }

    if timed_out.load(Ordering::Relaxed) {
        return Err(BuildError::ResourceExceeded(format!(
            "similarity computation exceeded {}s",
            cfg.max_similarity_secs.unwrap_or_default()
        )));
    }

    for i in 0..n {
        for j in 0..i {
            data[i * n + j] = data[j * n + i];
        }
    }

    tracing::info!(n, elapsed_ms = start.elapsed().as_millis() as u64, "similarity matrix computed");
    Ok(SimilarityMatrix { n, data })
}

fn fill_upper(data: &mut [f32], vectors: &[SparseVector], vocab_size: usize, deadline: Option<Instant>, timed_out: &AtomicBool) {
    let n = vectors.len();
    if n == 0 { return; }
    data.par_chunks_mut(n).enumerate().for_each_init(
        || vec![0.0f32; vocab_size],
        |scratch, (i, row)| {
            if timed_out.load(Ordering::Relaxed) { return; }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                timed_out.store(true, Ordering::Relaxed);
                return;
            }
            let vi = &vectors[i];
            if vi.is_zero() { return; }

            for (&t, &w) in vi.indices.iter().zip(&vi.values) {
                scratch[t as usize] = w;
            }
            row[i] = 1.0;
            for (j, vj) in vectors.iter().enumerate().skip(i + 1) {
                let mut acc = 0.0f64;
                for (&t, &w) in vj.indices.iter().zip(&vj.values) {
                    acc += scratch[t as usize] as f64 * w as f64;
                }
                row[j] = acc.min(1.0) as f32;
            }
            for &t in &vi.indices {
                scratch[t as usize] = 0.0;
            }
        },
    );
}
