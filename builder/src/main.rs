use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use recsys_core::persist::{load_artifacts, load_manifest, load_vectorizer, resolve, ArtifactPaths};
use recsys_core::pipeline::build_and_save;
use recsys_core::{load_catalog, validate_k, BuildConfig, StopWords, DEFAULT_K};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "builder")]
#[command(about = "Build and query content-based recommendation artifacts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum StopWordsArg {
    English,
    None,
}

impl From<StopWordsArg> for StopWords {
    fn from(arg: StopWordsArg) -> Self {
        match arg {
            StopWordsArg::English => StopWords::English,
            StopWordsArg::None => StopWords::None,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build artifacts from a catalog file (CSV/JSON/JSONL) or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Artifact root directory
        #[arg(long, default_value = "./artifacts")]
        output: String,
        /// JSON file with a build configuration; flags below override it
        #[arg(long)]
        config: Option<String>,
        #[arg(long, value_enum)]
        stop_words: Option<StopWordsArg>,
        /// Minimum number of documents a term must occur in
        #[arg(long)]
        min_df: Option<u32>,
        #[arg(long)]
        min_token_len: Option<usize>,
        /// Separator for delimiter-joined genre strings
        #[arg(long)]
        genre_delimiter: Option<char>,
        /// Worker threads for the similarity matrix
        #[arg(long)]
        threads: Option<usize>,
        /// Refuse to build a similarity matrix larger than this many MiB
        #[arg(long)]
        max_matrix_mb: Option<u64>,
        /// Abort if the similarity matrix takes longer than this
        #[arg(long)]
        max_similarity_secs: Option<u64>,
    },
    /// Print recommendations for one title
    Recommend {
        #[arg(long, default_value = "./artifacts")]
        artifacts: String,
        /// Build id; defaults to CURRENT
        #[arg(long)]
        build_id: Option<String>,
        #[arg(long)]
        title: String,
        #[arg(short, long, default_value_t = DEFAULT_K as i64, allow_negative_numbers = true)]
        k: i64,
    },
    /// Show the manifest and vocabulary summary of a build
    Inspect {
        #[arg(long, default_value = "./artifacts")]
        artifacts: String,
        #[arg(long)]
        build_id: Option<String>,
        /// Number of highest-idf terms to list
        #[arg(long, default_value_t = 10)]
        top_terms: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, config, stop_words, min_df, min_token_len, genre_delimiter, threads, max_matrix_mb, max_similarity_secs } => {
            let mut cfg = match config {
                Some(path) => BuildConfig::from_json_file(&path)?,
                None => BuildConfig::default(),
            };
            if let Some(v) = stop_words { cfg.stop_words = v.into(); }
            if let Some(v) = min_df { cfg.min_df = v; }
            if let Some(v) = min_token_len { cfg.min_token_len = v; }
            if let Some(v) = genre_delimiter { cfg.genre_delimiter = v; }
            if threads.is_some() { cfg.threads = threads; }
            if let Some(v) = max_matrix_mb { cfg.max_matrix_bytes = mib_to_bytes(v); }
            if max_similarity_secs.is_some() { cfg.max_similarity_secs = max_similarity_secs; }
            run_build(&input, &output, &cfg)
        }
        Commands::Recommend { artifacts, build_id, title, k } => run_recommend(&artifacts, build_id.as_deref(), &title, k),
        Commands::Inspect { artifacts, build_id, top_terms } => run_inspect(&artifacts, build_id.as_deref(), top_terms),
    }
}

/// Huge budgets saturate instead of wrapping to a tiny one.
fn mib_to_bytes(mib: u64) -> u64 { mib.saturating_mul(1024 * 1024) }

fn run_build(input: &str, output: &str, cfg: &BuildConfig) -> Result<()> {
    cfg.validate()?;
    let records = load_catalog(input, cfg.genre_delimiter).with_context(|| format!("loading catalog from {input}"))?;
    tracing::info!(records = records.len(), input, "catalog loaded");

    let paths = ArtifactPaths::new(output);
    let handle = build_and_save(&records, cfg, &paths).context("build failed; no artifacts were written")?;
    tracing::info!(build_id = %handle.build_id, output, "build complete");
    println!("{}", handle.build_id);
    Ok(())
}

fn run_recommend(artifacts: &str, build_id: Option<&str>, title: &str, k: i64) -> Result<()> {
    let k = validate_k(k)?;
    let handle = resolve(&ArtifactPaths::new(artifacts), build_id).context("artifacts unavailable")?;
    let recommender = load_artifacts(&handle)?.into_recommender()?;
    let recs = recommender.recommend(title, k)?;
    if recs.is_empty() {
        println!("No other titles to recommend for '{title}'.");
    }
    for (i, show) in recs.iter().enumerate() {
        println!("{}. {show}", i + 1);
    }
    Ok(())
}

fn run_inspect(artifacts: &str, build_id: Option<&str>, top_terms: usize) -> Result<()> {
    let handle = resolve(&ArtifactPaths::new(artifacts), build_id)?;
    let manifest = load_manifest(&handle)?;
    println!("{}", serde_json::to_string_pretty(&manifest)?);

    let vectorizer = load_vectorizer(&handle)?;
    let idf = vectorizer.idf();
    let mut terms: Vec<(&str, f64)> = vectorizer.vocabulary().iter().map(|(t, &id)| (t.as_str(), idf[id as usize])).collect();
    terms.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(b.0)));
    println!("vocabulary: {} terms over {} documents", terms.len(), vectorizer.num_docs());
    for (term, w) in terms.into_iter().take(top_terms) {
        println!("  {term:<24} idf={w:.4}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_budget_saturates() {
        assert_eq!(mib_to_bytes(2), 2 * 1024 * 1024);
        assert_eq!(mib_to_bytes(u64::MAX), u64::MAX);
        assert_eq!(mib_to_bytes(u64::MAX / (1024 * 1024) + 1), u64::MAX);
    }

    #[test]
    fn build_flags_parse() {
        let cli = Cli::try_parse_from(["builder", "build", "--input", "c.csv", "--max-matrix-mb", "18446744073709551615"]).unwrap();
        match cli.command {
            Commands::Build { max_matrix_mb, .. } => assert_eq!(max_matrix_mb.map(mib_to_bytes), Some(u64::MAX)),
            _ => panic!("expected build"),
        }
    }
}
