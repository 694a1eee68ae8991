use crate::catalog::CatalogRecord;
use crate::tokenizer::normalize_text;

/// Joins description and genres into one lower-cased document per record.
/// Output index `i` always corresponds to input record `i`; records with no
/// text still produce an (empty) document.
pub fn build_documents(records: &[CatalogRecord]) -> Vec<String> {
    records.iter().map(document_for).collect()
}

pub fn document_for(record: &CatalogRecord) -> String {
    let description = record.description.as_deref().unwrap_or("");
    let genres = record.genres.join(" ");
    let joined = match (description.is_empty(), genres.is_empty()) {
        (_, true) => description.to_string(),
        (true, false) => genres,
        (false, false) => format!("{description} {genres}"),
    };
    normalize_text(&joined)
}
