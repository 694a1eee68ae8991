//! Reading the cleaned catalog table handed over by the upstream pipeline.
//!
//! Accepted inputs are CSV with a header row, JSON Lines, or a JSON array of
//! objects. A directory is walked and its files are read in path order so the
//! row index stays reproducible between runs.

use crate::error::BuildError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const REQUIRED_COLUMNS: [&str; 3] = ["title", "description", "genres"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleKind {
    Movie,
    Show,
    Unknown,
}

impl TitleKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "movie" => TitleKind::Movie,
            "tv show" | "show" | "tv" => TitleKind::Show,
            _ => TitleKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    pub title: String,
    pub description: Option<String>,
    pub genres: Vec<String>,
    pub kind: TitleKind,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GenresField {
    Joined(String),
    List(Vec<String>),
}

#[derive(Deserialize)]
struct JsonRecord {
    title: Option<String>,
    description: Option<String>,
    genres: Option<GenresField>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

pub fn split_genres(raw: &str, delimiter: char) -> Vec<String> {
    raw.split(delimiter).map(str::trim).filter(|g| !g.is_empty()).map(str::to_string).collect()
}

fn input_err(path: &Path, message: impl ToString) -> BuildError {
    BuildError::Input { path: path.to_path_buf(), message: message.to_string() }
}

/// Load every record under `input` (a file or a directory). Fails on an empty
/// result so the build never runs over nothing.
pub fn load_catalog<P: AsRef<Path>>(input: P, genre_delimiter: char) -> Result<Vec<CatalogRecord>, BuildError> {
    let input = input.as_ref();
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).follow_links(true).sort_by_file_name() {
            // an unreadable entry would silently drop rows, so it fails the build
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(input).to_path_buf();
                BuildError::Input { path, message: e.to_string() }
            })?;
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "csv" | "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        return Err(input_err(input, "no such file or directory"));
    }

    let mut records = Vec::new();
    for file in files {
        let before = records.len();
        match file.extension().and_then(|s| s.to_str()) {
            Some("jsonl") => read_jsonl(&file, genre_delimiter, &mut records)?,
            Some("json") => read_json(&file, genre_delimiter, &mut records)?,
            _ => read_csv(&file, genre_delimiter, &mut records)?,
        }
        tracing::debug!(file = %file.display(), rows = records.len() - before, "read catalog file");
    }

    if records.is_empty() {
        return Err(BuildError::EmptyDataset);
    }
    Ok(records)
}

fn read_csv(path: &Path, delimiter: char, out: &mut Vec<CatalogRecord>) -> Result<(), BuildError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| input_err(path, e))?;
    let headers = reader.headers().map_err(|e| input_err(path, e))?.clone();
    let position = |name: &str| headers.iter().position(|h| h.trim() == name);

    let mut idx = [0usize; 3];
    for (slot, column) in idx.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = position(column).ok_or_else(|| BuildError::MissingColumn {
            path: path.to_path_buf(),
            column,
            available: headers.iter().map(str::to_string).collect(),
        })?;
    }
    let [title_idx, desc_idx, genres_idx] = idx;
    let kind_idx = position("type");

    for (row, rec) in reader.records().enumerate() {
        let rec = rec.map_err(|e| input_err(path, format!("row {}: {e}", row + 1)))?;
        let field = |i: usize| rec.get(i).unwrap_or("");
        let description = field(desc_idx);
        out.push(CatalogRecord {
            title: field(title_idx).to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            genres: split_genres(field(genres_idx), delimiter),
            kind: kind_idx.map(|i| TitleKind::parse(field(i))).unwrap_or(TitleKind::Unknown),
        });
    }
    Ok(())
}

fn read_jsonl(path: &Path, delimiter: char, out: &mut Vec<CatalogRecord>) -> Result<(), BuildError> {
    let reader = BufReader::new(File::open(path).map_err(|e| input_err(path, e))?);
    for (n, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| input_err(path, e))?;
        if line.trim().is_empty() { continue; }
        let value: serde_json::Value = serde_json::from_str(&line).map_err(|e| input_err(path, format!("line {}: {e}", n + 1)))?;
        out.push(record_from_value(path, value, delimiter)?);
    }
    Ok(())
}

fn read_json(path: &Path, delimiter: char, out: &mut Vec<CatalogRecord>) -> Result<(), BuildError> {
    let reader = BufReader::new(File::open(path).map_err(|e| input_err(path, e))?);
    let json: serde_json::Value = serde_json::from_reader(reader).map_err(|e| input_err(path, e))?;
    let values = match json {
        serde_json::Value::Array(arr) => arr,
        obj @ serde_json::Value::Object(_) => vec![obj],
        _ => return Err(input_err(path, "expected an object or an array of objects")),
    };
    for v in values {
        out.push(record_from_value(path, v, delimiter)?);
    }
    Ok(())
}

/// Same schema rule as the CSV header: every required key must be present on
/// every object, even if its value is null or empty.
fn record_from_value(path: &Path, value: serde_json::Value, delimiter: char) -> Result<CatalogRecord, BuildError> {
    let serde_json::Value::Object(map) = value else {
        return Err(input_err(path, "expected a JSON object per record"));
    };
    if let Some(column) = REQUIRED_COLUMNS.into_iter().find(|c| !map.contains_key(*c)) {
        return Err(BuildError::MissingColumn { path: path.to_path_buf(), column, available: map.keys().cloned().collect() });
    }
    let rec: JsonRecord = serde_json::from_value(serde_json::Value::Object(map)).map_err(|e| input_err(path, e))?;
    Ok(from_json(rec, delimiter))
}

fn from_json(rec: JsonRecord, delimiter: char) -> CatalogRecord {
    let genres = match rec.genres {
        Some(GenresField::Joined(s)) => split_genres(&s, delimiter),
        Some(GenresField::List(list)) => list.into_iter().map(|g| g.trim().to_string()).filter(|g| !g.is_empty()).collect(),
        None => Vec::new(),
    };
    CatalogRecord {
        title: rec.title.unwrap_or_default(),
        description: rec.description,
        genres,
        kind: rec.kind.as_deref().map(TitleKind::parse).unwrap_or(TitleKind::Unknown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn csv_with_missing_genres_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.csv");
        fs::write(&path, "title,description,genres_str\nA,x,Drama\n").unwrap();
        match load_catalog(&path, '|') {
            Err(BuildError::MissingColumn { column, available, .. }) => {
                assert_eq!(column, "genres");
                assert!(available.contains(&"genres_str".to_string()));
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn csv_rows_keep_order_and_empty_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.csv");
        fs::write(&path, "type,title,description,genres\nMovie,A,funny film,Comedies|Dramas\nTV Show,B,,\n").unwrap();
        let recs = load_catalog(&path, '|').unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].genres, vec!["Comedies", "Dramas"]);
        assert_eq!(recs[0].kind, TitleKind::Movie);
        assert_eq!(recs[1].description, None);
        assert!(recs[1].genres.is_empty());
        assert_eq!(recs[1].kind, TitleKind::Show);
    }

    #[test]
    fn jsonl_with_renamed_genres_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.jsonl");
        fs::write(&path, "{\"title\":\"A\",\"description\":\"x\",\"genres_str\":\"Drama|Crime\"}\n").unwrap();
        match load_catalog(&path, '|') {
            Err(BuildError::MissingColumn { column, available, .. }) => {
                assert_eq!(column, "genres");
                assert!(available.contains(&"genres_str".to_string()));
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn json_record_without_title_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(
            &path,
            r#"[{"title":"A","description":"x","genres":"Drama"},{"name":"B","description":"y","genres":"Crime"}]"#,
        )
        .unwrap();
        assert!(matches!(load_catalog(&path, '|'), Err(BuildError::MissingColumn { column: "title", .. })));
    }

    #[test]
    fn null_values_count_as_present_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.jsonl");
        fs::write(&path, "{\"title\":\"A\",\"description\":null,\"genres\":null}\n").unwrap();
        let recs = load_catalog(&path, '|').unwrap();
        assert_eq!(recs[0].description, None);
        assert!(recs[0].genres.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_entry_fails_the_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "title,description,genres\nA,x,Drama\n").unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing.csv"), dir.path().join("b.csv")).unwrap();
        assert!(matches!(load_catalog(dir.path(), '|'), Err(BuildError::Input { .. })));
    }

    #[test]
    fn jsonl_accepts_list_or_joined_genres() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.jsonl");
        fs::write(
            &path,
            "{\"title\":\"A\",\"description\":\"x\",\"genres\":[\"Horror\"]}\n\n{\"title\":\"B\",\"description\":null,\"genres\":\"Drama|Crime\"}\n",
        )
        .unwrap();
        let recs = load_catalog(&path, '|').unwrap();
        assert_eq!(recs[0].genres, vec!["Horror"]);
        assert_eq!(recs[1].genres, vec!["Drama", "Crime"]);
        assert_eq!(recs[1].description, None);
    }

    #[test]
    fn header_only_csv_is_an_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.csv");
        fs::write(&path, "title,description,genres\n").unwrap();
        assert!(matches!(load_catalog(&path, '|'), Err(BuildError::EmptyDataset)));
    }
}
