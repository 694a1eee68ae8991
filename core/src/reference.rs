use crate::catalog::CatalogRecord;
use crate::DocId;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;

/// Lower-cased, trimmed form used for case-insensitive title lookup.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefEntry {
    pub index: DocId,
    pub title: String,
    pub normalized_title: String,
}

/// Row index -> display title, in similarity-matrix row order.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "Vec<RefEntry>")]
pub struct ReferenceTable {
    entries: Vec<RefEntry>,
    lookup: HashMap<String, DocId>,
}

impl PartialEq for ReferenceTable {
    fn eq(&self, other: &Self) -> bool { self.entries == other.entries }
}

impl From<Vec<RefEntry>> for ReferenceTable {
    fn from(entries: Vec<RefEntry>) -> Self {
        let mut lookup = HashMap::with_capacity(entries.len());
        for e in &entries {
            // duplicates: first occurrence in table order wins
            lookup.entry(e.normalized_title.clone()).or_insert(e.index);
        }
        Self { entries, lookup }
    }
}

// Only the ordered entries are persisted; the lookup map is rebuilt on load.
impl Serialize for ReferenceTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl ReferenceTable {
    pub fn from_records(records: &[CatalogRecord]) -> Self {
        let entries = records
            .iter()
            .enumerate()
            .map(|(i, r)| RefEntry { index: i as DocId, title: r.title.clone(), normalized_title: normalize_title(&r.title) })
            .collect::<Vec<_>>();
        let table = Self::from(entries);
        let duplicates = table.entries.len() - table.lookup.len();
        if duplicates > 0 {
            tracing::warn!(duplicates, "duplicate titles in catalog; lookups resolve to the first occurrence");
        }
        table
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn entries(&self) -> &[RefEntry] { &self.entries }
    pub fn get(&self, index: usize) -> Option<&RefEntry> { self.entries.get(index) }

    /// Resolve a free-text title to its row index.
    pub fn resolve(&self, title: &str) -> Option<DocId> {
        self.lookup.get(&normalize_title(title)).copied()
    }

    /// Row indices must be `0..len` in order; anything else means the blob was
    /// not produced by a build.
    pub fn is_well_formed(&self) -> bool {
        self.entries.iter().enumerate().all(|(i, e)| e.index as usize == i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TitleKind;

    fn rec(title: &str) -> CatalogRecord {
        CatalogRecord { title: title.into(), description: None, genres: vec![], kind: TitleKind::Unknown }
    }

    #[test]
    fn lookup_is_case_insensitive_and_trimmed() {
        let t = ReferenceTable::from_records(&[rec("Breaking Bad"), rec("Ozark")]);
        assert_eq!(t.resolve("  BREAKING BAD "), Some(0));
        assert_eq!(t.resolve("ozark"), Some(1));
        assert_eq!(t.resolve("Narcos"), None);
    }

    #[test]
    fn first_duplicate_wins() {
        let t = ReferenceTable::from_records(&[rec("Dark"), rec("Other"), rec("dark")]);
        assert_eq!(t.resolve("DARK"), Some(0));
        assert_eq!(t.len(), 3);
    }
}
