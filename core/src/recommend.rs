use crate::error::{ArtifactError, QueryError};
use crate::reference::ReferenceTable;
use crate::similarity::SimilarityMatrix;
use crate::DocId;
use serde::Serialize;

pub const DEFAULT_K: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub index: DocId,
    pub title: String,
    pub score: f32,
}

/// Accept a caller-supplied `k`, rejecting anything below 1.
pub fn validate_k(k: i64) -> Result<usize, QueryError> {
    match usize::try_from(k) {
        Ok(k) if k > 0 => Ok(k),
        _ => Err(QueryError::InvalidK(k)),
    }
}

/// Read-only view over one consistent artifact set.
#[derive(Debug)]
pub struct Recommender {
    matrix: SimilarityMatrix,
    table: ReferenceTable,
    fingerprint: String,
}

impl Recommender {
    pub fn new(matrix: SimilarityMatrix, table: ReferenceTable, fingerprint: String) -> Result<Self, ArtifactError> {
        if matrix.dim() != table.len() {
            return Err(ArtifactError::DimensionMismatch(format!(
                "similarity matrix is {0}x{0} but reference table has {1} rows",
                matrix.dim(),
                table.len()
            )));
        }
        Ok(Self { matrix, table, fingerprint })
    }

    pub fn len(&self) -> usize { self.table.len() }
    pub fn is_empty(&self) -> bool { self.table.is_empty() }
    pub fn fingerprint(&self) -> &str { &self.fingerprint }
    pub fn table(&self) -> &ReferenceTable { &self.table }
    pub fn matrix(&self) -> &SimilarityMatrix { &self.matrix }

    pub fn recommend(&self, title: &str, k: usize) -> Result<Vec<String>, QueryError> {
        Ok(self.recommend_scored(title, k)?.into_iter().map(|r| r.title).collect())
    }

    /// Top `k` neighbours of `title` by descending similarity, ties broken by
    /// ascending row index. Rows sharing the query's normalized title are never
    /// returned.
    pub fn recommend_scored(&self, title: &str, k: usize) -> Result<Vec<Recommendation>, QueryError> {
        if k == 0 {
            return Err(QueryError::InvalidK(0));
        }
        let i = self.table.resolve(title).ok_or_else(|| QueryError::TitleNotFound(title.to_string()))? as usize;
        let entries = self.table.entries();
        let query_key = &entries[i].normalized_title;
        let row = self.matrix.row(i);

        let mut candidates: Vec<usize> = (0..entries.len())
            .filter(|&j| j != i && entries[j].normalized_title != *query_key)
            .collect();
        let by_rank = |a: &usize, b: &usize| row[*b].total_cmp(&row[*a]).then(a.cmp(b));
        if k < candidates.len() {
            candidates.select_nth_unstable_by(k - 1, by_rank);
            candidates.truncate(k);
        }
        candidates.sort_unstable_by(by_rank);

        Ok(candidates
            .into_iter()
            .map(|j| Recommendation { index: j as DocId, title: entries[j].title.clone(), score: row[j] })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{normalize_title, RefEntry};

    fn recommender(titles: &[&str], data: Vec<f32>) -> Recommender {
        let entries = titles
            .iter()
            .enumerate()
            .map(|(i, t)| RefEntry { index: i as DocId, title: t.to_string(), normalized_title: normalize_title(t) })
            .collect::<Vec<_>>();
        let n = titles.len();
        Recommender::new(SimilarityMatrix::from_raw(n, data).unwrap(), ReferenceTable::from(entries), "fp".into()).unwrap()
    }

    #[test]
    fn ties_break_by_row_index() {
        let r = recommender(
            &["Q", "W", "X", "Y", "Z"],
            vec![
                1.0, 0.5, 0.9, 0.5, 0.9,
                0.5, 1.0, 0.0, 0.0, 0.0,
                0.9, 0.0, 1.0, 0.0, 0.0,
                0.5, 0.0, 0.0, 1.0, 0.0,
                0.9, 0.0, 0.0, 0.0, 1.0,
            ],
        );
        assert_eq!(r.recommend("q", 10).unwrap(), vec!["X", "Z", "W", "Y"]);
        assert_eq!(r.recommend("q", 3).unwrap(), vec!["X", "Z", "W"]);
        assert_eq!(r.recommend("q", 1).unwrap(), vec!["X"]);
    }

    #[test]
    fn duplicate_titles_are_not_returned_for_themselves() {
        let r = recommender(&["Dark", "dark", "Other"], vec![1.0, 1.0, 0.2, 1.0, 1.0, 0.2, 0.2, 0.2, 1.0]);
        assert_eq!(r.recommend("DARK", 5).unwrap(), vec!["Other"]);
    }

    #[test]
    fn zero_k_and_unknown_titles_are_typed_errors() {
        let r = recommender(&["A", "B"], vec![1.0, 0.3, 0.3, 1.0]);
        assert_eq!(r.recommend("A", 0), Err(QueryError::InvalidK(0)));
        assert_eq!(r.recommend("C", 2), Err(QueryError::TitleNotFound("C".into())));
    }

    #[test]
    fn validate_k_rejects_non_positive() {
        assert_eq!(validate_k(3), Ok(3));
        assert_eq!(validate_k(0), Err(QueryError::InvalidK(0)));
        assert_eq!(validate_k(-4), Err(QueryError::InvalidK(-4)));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let entries = vec![RefEntry { index: 0, title: "A".into(), normalized_title: "a".into() }];
        let m = SimilarityMatrix::from_raw(2, vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        assert!(matches!(
            Recommender::new(m, ReferenceTable::from(entries), "fp".into()),
            Err(ArtifactError::DimensionMismatch(_))
        ));
    }
}
