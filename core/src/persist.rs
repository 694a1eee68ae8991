//! On-disk artifact set.
//!
//! ```text
//! <root>/CURRENT                      active build id
//! <root>/<build_id>/manifest.json     fingerprint, dimensions, config
//! <root>/<build_id>/vectorizer.bin    vocabulary + idf
//! <root>/<build_id>/similarity.bin    dense row-major f32 matrix
//! <root>/<build_id>/reference.bin     row -> title table
//! ```
//!
//! Every blob carries the artifact-set fingerprint and is checked against the
//! manifest on load; the fingerprint is then recomputed from what was read. A build directory only appears under its final name once
//! all blobs are written.

use crate::config::BuildConfig;
use crate::error::ArtifactError;
use crate::recommend::Recommender;
use crate::reference::ReferenceTable;
use crate::similarity::SimilarityMatrix;
use crate::vectorizer::TfidfVectorizer;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fs::{self, create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

const MANIFEST: &str = "manifest.json";
const VECTORIZER: &str = "vectorizer.bin";
const SIMILARITY: &str = "similarity.bin";
const REFERENCE: &str = "reference.bin";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub build_id: String,
    /// Covers the whole artifact set, see [`artifact_fingerprint`].
    pub fingerprint: String,
    /// Covers the fitted vocabulary and idf only.
    pub vocab_fingerprint: String,
    pub num_docs: usize,
    pub vocab_size: usize,
    pub created_at: String,
    pub version: u32,
    pub config: BuildConfig,
}

#[derive(Serialize)]
struct BlobRef<'a, T> {
    fingerprint: &'a str,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Blob<T> {
    fingerprint: String,
    payload: T,
}

pub struct ArtifactPaths {
    pub root: PathBuf,
}

impl ArtifactPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn current(&self) -> PathBuf { self.root.join("CURRENT") }
    fn current_tmp(&self) -> PathBuf { self.root.join(".CURRENT.tmp") }
    fn staging(&self, build_id: &str) -> PathBuf { self.root.join(format!(".staging-{build_id}")) }
    fn build_dir(&self, build_id: &str) -> PathBuf { self.root.join(build_id) }
}

/// Durable reference to one complete artifact set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildHandle {
    pub root: PathBuf,
    pub build_id: String,
}

impl BuildHandle {
    pub fn dir(&self) -> PathBuf { self.root.join(&self.build_id) }
    fn blob(&self, name: &str) -> PathBuf { self.dir().join(name) }
}

/// Everything needed to serve, validated against its manifest.
#[derive(Debug)]
pub struct LoadedArtifacts {
    pub manifest: Manifest,
    pub matrix: SimilarityMatrix,
    pub table: ReferenceTable,
}

impl LoadedArtifacts {
    pub fn into_recommender(self) -> Result<Recommender, ArtifactError> {
        Recommender::new(self.matrix, self.table, self.manifest.fingerprint)
    }
}

fn new_build_id(fingerprint: &str) -> String {
    let ts = time::OffsetDateTime::now_utc().unix_timestamp();
    format!("{ts}-{}", &fingerprint[..fingerprint.len().min(12)])
}

/// Fingerprint of one complete artifact set: the vocabulary fingerprint, the
/// reference table in row order and the matrix cells bit for bit. Two builds
/// only share it if they would answer every query identically.
pub fn artifact_fingerprint(vocab_fingerprint: &str, table: &ReferenceTable, matrix: &SimilarityMatrix) -> String {
    let mut hasher = Sha1::new();
    hasher.update(vocab_fingerprint.as_bytes());
    hasher.update([0u8]);
    hasher.update((table.len() as u64).to_le_bytes());
    for e in table.entries() {
        hasher.update(e.index.to_le_bytes());
        hasher.update(e.title.as_bytes());
        hasher.update([0u8]);
        hasher.update(e.normalized_title.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update((matrix.dim() as u64).to_le_bytes());
    let mut row_bytes = Vec::with_capacity(matrix.dim() * 4);
    for i in 0..matrix.dim() {
        row_bytes.clear();
        row_bytes.extend(matrix.row(i).iter().flat_map(|v| v.to_bits().to_le_bytes()));
        hasher.update(&row_bytes);
    }
    format!("{:x}", hasher.finalize())
}

/// Persist one build as a unit and point `CURRENT` at it. Nothing becomes
/// visible under the build id unless every blob was written.
pub fn save_artifacts(
    paths: &ArtifactPaths,
    vectorizer: &TfidfVectorizer,
    matrix: &SimilarityMatrix,
    table: &ReferenceTable,
    config: &BuildConfig,
) -> Result<BuildHandle, ArtifactError> {
    if matrix.dim() != table.len() || table.len() != vectorizer.num_docs() {
        return Err(ArtifactError::DimensionMismatch(format!(
            "matrix {}, reference table {}, vectorizer fitted on {} documents",
            matrix.dim(),
            table.len(),
            vectorizer.num_docs()
        )));
    }

    let fingerprint = artifact_fingerprint(vectorizer.fingerprint(), table, matrix);
    commit_build(paths, &fingerprint, |dir, build_id| {
        let manifest = Manifest {
            build_id: build_id.to_string(),
            fingerprint: fingerprint.clone(),
            vocab_fingerprint: vectorizer.fingerprint().to_string(),
            num_docs: table.len(),
            vocab_size: vectorizer.vocabulary().len(),
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "".into()),
            version: FORMAT_VERSION,
            config: config.clone(),
        };
        write_staging(dir, &manifest, vectorizer, matrix, table)
    })
}

/// Run `write` against a fresh staging directory, then publish it under its
/// build id and move `CURRENT`. If `write` or the rename fails the staging
/// directory is removed and `CURRENT` is left as it was.
fn commit_build<F>(paths: &ArtifactPaths, fingerprint: &str, write: F) -> Result<BuildHandle, ArtifactError>
where
    F: FnOnce(&Path, &str) -> Result<(), ArtifactError>,
{
    create_dir_all(&paths.root).map_err(|e| ArtifactError::io(&paths.root, e))?;

    let base_id = new_build_id(fingerprint);
    let mut build_id = base_id.clone();
    let mut attempt = 1;
    while paths.build_dir(&build_id).exists() || paths.staging(&build_id).exists() {
        build_id = format!("{base_id}-{attempt}");
        attempt += 1;
    }

    let staging = paths.staging(&build_id);
    let written = create_dir_all(&staging)
        .map_err(|e| ArtifactError::io(&staging, e))
        .and_then(|_| write(&staging, &build_id))
        .and_then(|_| fs::rename(&staging, paths.build_dir(&build_id)).map_err(|e| ArtifactError::io(&staging, e)));
    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_dir_all(&staging) {
            tracing::warn!(dir = %staging.display(), error = %cleanup, "failed to remove staging directory");
        }
        return Err(e);
    }

    set_current(paths, &build_id)?;
    tracing::info!(%build_id, root = %paths.root.display(), "artifacts saved");
    Ok(BuildHandle { root: paths.root.clone(), build_id })
}

fn write_staging(
    dir: &Path,
    manifest: &Manifest,
    vectorizer: &TfidfVectorizer,
    matrix: &SimilarityMatrix,
    table: &ReferenceTable,
) -> Result<(), ArtifactError> {
    let fp = manifest.fingerprint.as_str();
    write_blob(&dir.join(VECTORIZER), fp, vectorizer)?;
    write_blob(&dir.join(SIMILARITY), fp, matrix)?;
    write_blob(&dir.join(REFERENCE), fp, table)?;

    let path = dir.join(MANIFEST);
    let json = serde_json::to_string_pretty(manifest)
        .map_err(|e| ArtifactError::Corrupt { path: path.clone(), message: e.to_string() })?;
    let mut f = File::create(&path).map_err(|e| ArtifactError::io(&path, e))?;
    f.write_all(json.as_bytes()).and_then(|_| f.sync_all()).map_err(|e| ArtifactError::io(&path, e))?;
    Ok(())
}

fn write_blob<T: Serialize>(path: &Path, fingerprint: &str, payload: &T) -> Result<(), ArtifactError> {
    let f = File::create(path).map_err(|e| ArtifactError::io(path, e))?;
    let mut w = BufWriter::new(f);
    bincode::serialize_into(&mut w, &BlobRef { fingerprint, payload })
        .map_err(|e| ArtifactError::Corrupt { path: path.to_path_buf(), message: e.to_string() })?;
    let f = w.into_inner().map_err(|e| ArtifactError::io(path, e.into_error()))?;
    f.sync_all().map_err(|e| ArtifactError::io(path, e))?;
    Ok(())
}

fn read_blob<T: DeserializeOwned>(path: &Path) -> Result<Blob<T>, ArtifactError> {
    let f = File::open(path).map_err(|e| ArtifactError::io(path, e))?;
    bincode::deserialize_from(BufReader::new(f))
        .map_err(|e| ArtifactError::Corrupt { path: path.to_path_buf(), message: e.to_string() })
}

fn check_fingerprint(blob: &'static str, expected: &str, found: &str) -> Result<(), ArtifactError> {
    if expected != found {
        return Err(ArtifactError::FingerprintMismatch { blob, expected: expected.into(), found: found.into() });
    }
    Ok(())
}

/// Replace `CURRENT` via write-then-rename so readers never see a torn id.
pub fn set_current(paths: &ArtifactPaths, build_id: &str) -> Result<(), ArtifactError> {
    let tmp = paths.current_tmp();
    fs::write(&tmp, build_id).map_err(|e| ArtifactError::io(&tmp, e))?;
    fs::rename(&tmp, paths.current()).map_err(|e| ArtifactError::io(paths.current(), e))?;
    Ok(())
}

/// Handle for an explicit build id, or the one `CURRENT` points at.
pub fn resolve(paths: &ArtifactPaths, build_id: Option<&str>) -> Result<BuildHandle, ArtifactError> {
    let build_id = match build_id {
        Some(id) => id.to_string(),
        None => {
            let current = paths.current();
            let raw = fs::read_to_string(&current).map_err(|e| ArtifactError::io(&current, e))?;
            let id = raw.trim().to_string();
            if id.is_empty() {
                return Err(ArtifactError::Corrupt { path: current, message: "empty build id".into() });
            }
            id
        }
    };
    let handle = BuildHandle { root: paths.root.clone(), build_id };
    if !handle.dir().is_dir() {
        return Err(ArtifactError::Missing(handle.dir()));
    }
    Ok(handle)
}

pub fn load_manifest(handle: &BuildHandle) -> Result<Manifest, ArtifactError> {
    let path = handle.blob(MANIFEST);
    let raw = fs::read_to_string(&path).map_err(|e| ArtifactError::io(&path, e))?;
    let manifest: Manifest = serde_json::from_str(&raw)
        .map_err(|e| ArtifactError::Corrupt { path: path.clone(), message: e.to_string() })?;
    if manifest.version != FORMAT_VERSION {
        return Err(ArtifactError::UnsupportedVersion { found: manifest.version, supported: FORMAT_VERSION });
    }
    Ok(manifest)
}

/// Load and cross-check the serving artifacts. Any inconsistency is an error;
/// there is no partial result.
pub fn load_artifacts(handle: &BuildHandle) -> Result<LoadedArtifacts, ArtifactError> {
    let manifest = load_manifest(handle)?;

    let table_path = handle.blob(REFERENCE);
    let table: Blob<ReferenceTable> = read_blob(&table_path)?;
    check_fingerprint(REFERENCE, &manifest.fingerprint, &table.fingerprint)?;
    let table = table.payload;
    if !table.is_well_formed() {
        return Err(ArtifactError::Corrupt { path: table_path, message: "row indices out of order".into() });
    }

    let matrix: Blob<SimilarityMatrix> = read_blob(&handle.blob(SIMILARITY))?;
    check_fingerprint(SIMILARITY, &manifest.fingerprint, &matrix.fingerprint)?;
    let matrix = matrix.payload;

    if matrix.dim() != table.len() || table.len() != manifest.num_docs {
        return Err(ArtifactError::DimensionMismatch(format!(
            "matrix {0}x{0}, reference table {1} rows, manifest {2} documents",
            matrix.dim(),
            table.len(),
            manifest.num_docs
        )));
    }

    // blobs can each carry the right fingerprint and still disagree in content
    let actual = artifact_fingerprint(&manifest.vocab_fingerprint, &table, &matrix);
    check_fingerprint("artifact set", &manifest.fingerprint, &actual)?;

    tracing::info!(build_id = %handle.build_id, num_docs = manifest.num_docs, "artifacts loaded");
    Ok(LoadedArtifacts { manifest, matrix, table })
}

/// The fitted vectorizer is not needed to serve, only to re-transform.
pub fn load_vectorizer(handle: &BuildHandle) -> Result<TfidfVectorizer, ArtifactError> {
    let manifest = load_manifest(handle)?;
    let path = handle.blob(VECTORIZER);
    let blob: Blob<TfidfVectorizer> = read_blob(&path)?;
    check_fingerprint(VECTORIZER, &manifest.fingerprint, &blob.fingerprint)?;
    let vectorizer = blob.payload;
    check_fingerprint(VECTORIZER, &manifest.vocab_fingerprint, &vectorizer.computed_fingerprint())?;
    Ok(vectorizer)
}
