//! Exact nearest-neighbour search over a flat, contiguous vector store.

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index dimension must be non-zero")]
    ZeroDimension,

    /// Serialized index data is internally inconsistent.
    #[error("corrupt index data: {0}")]
    Corrupt(String),
}

/// Scalar types accepted as vector components; stored as `f32`.
pub trait Element: Copy {
    fn to_f32(self) -> f32;
}

impl Element for f32 {
    fn to_f32(self) -> f32 {
        self
    }
}

impl Element for f64 {
    #[allow(clippy::cast_possible_truncation)]
    fn to_f32(self) -> f32 {
        self as f32
    }
}

/// A search result: insertion position and squared Euclidean distance to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Flat index with exact squared-L2 search.
///
/// Vectors are stored row-major in one buffer; position `i` is the `i`-th vector added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawIndex")]
pub struct FlatL2Index {
    dimension: usize,
    data: Vec<f32>,
}

#[derive(Deserialize)]
struct RawIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl TryFrom<RawIndex> for FlatL2Index {
    type Error = IndexError;

    fn try_from(raw: RawIndex) -> Result<Self, Self::Error> {
        if raw.dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }
        if raw.data.len() % raw.dimension != 0 {
            return Err(IndexError::Corrupt(format!(
                "{} values is not a multiple of dimension {}",
                raw.data.len(),
                raw.dimension
            )));
        }
        Ok(Self {
            dimension: raw.dimension,
            data: raw.data,
        })
    }
}

impl FlatL2Index {
    /// # Errors
    ///
    /// Returns [`IndexError::ZeroDimension`] if `dimension` is 0.
    pub fn new(dimension: usize) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Stored vector at `position`.
    #[must_use]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Append vectors in order. All-or-nothing: on error nothing is added.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DimensionMismatch`] if any row has the wrong length.
    pub fn add_batch<T: Element>(&mut self, rows: &[Vec<T>]) -> Result<(), IndexError> {
        if let Some(bad) = rows.iter().find(|r| r.len() != self.dimension) {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }
        self.data.reserve(rows.len() * self.dimension);
        for row in rows {
            self.data.extend(row.iter().map(|x| x.to_f32()));
        }
        Ok(())
    }

    /// Return up to `k` nearest vectors, ascending by distance, ties broken by position.
    ///
    /// An empty index or `k == 0` yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DimensionMismatch`] if the query has the wrong length.
    pub fn search<T: Element>(&self, query: &[T], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let query: Vec<f32> = query.iter().map(|x| x.to_f32()).collect();
        let mut scored: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, row)| Neighbor {
                position,
                distance: squared_l2(&query, row),
            })
            .collect();

        scored.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn index_of(rows: &[Vec<f32>]) -> FlatL2Index {
        let mut index = FlatL2Index::new(rows[0].len()).unwrap();
        index.add_batch(rows).unwrap();
        index
    }

    #[test]
    fn zero_dimension_rejected() {
        assert!(matches!(
            FlatL2Index::new(0),
            Err(IndexError::ZeroDimension)
        ));
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = FlatL2Index::new(3).unwrap();
        assert!(index.search(&[0.0f32, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn k_zero_returns_nothing() {
        let index = index_of(&[vec![1.0, 0.0]]);
        assert!(index.search(&[1.0f32, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn nearest_first_with_squared_distance() {
        let index = index_of(&[vec![0.0, 0.0], vec![3.0, 4.0], vec![1.0, 0.0]]);
        let hits = index.search(&[0.0f32, 0.0], 3).unwrap();
        let positions: Vec<_> = hits.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![0, 2, 1]);
        assert!((hits[2].distance - 25.0).abs() < f32::EPSILON);
    }

    #[test]
    fn k_larger_than_len_returns_all() {
        let index = index_of(&[vec![1.0], vec![2.0]]);
        assert_eq!(index.search(&[0.0f32], 10).unwrap().len(), 2);
    }

    #[test]
    fn ties_broken_by_position() {
        let index = index_of(&[vec![1.0, 0.0], vec![-1.0, 0.0], vec![0.0, 1.0]]);
        let hits = index.search(&[0.0f32, 0.0], 3).unwrap();
        let positions: Vec<_> = hits.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn add_batch_is_all_or_nothing() {
        let mut index = FlatL2Index::new(2).unwrap();
        let err = index
            .add_batch(&[vec![1.0f32, 2.0], vec![1.0, 2.0, 3.0]])
            .unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert!(index.is_empty());
    }

    #[test]
    fn query_dimension_checked() {
        let index = index_of(&[vec![1.0, 2.0]]);
        assert!(matches!(
            index.search(&[1.0f32], 1),
            Err(IndexError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn accepts_f64_input() {
        let mut index = FlatL2Index::new(2).unwrap();
        index.add_batch(&[vec![0.5f64, 0.25]]).unwrap();
        assert_eq!(index.vector(0), Some(&[0.5f32, 0.25][..]));
        let hits = index.search(&[0.5f64, 0.25], 1).unwrap();
        assert_eq!(hits[0].distance, 0.0);
    }

    #[test]
    fn serde_rejects_ragged_data() {
        let json = r#"{"dimension":3,"data":[1.0,2.0]}"#;
        let err = serde_json::from_str::<FlatL2Index>(json).unwrap_err();
        assert!(err.to_string().contains("corrupt"));
        let zero = r#"{"dimension":0,"data":[]}"#;
        assert!(serde_json::from_str::<FlatL2Index>(zero).is_err());
    }

    #[test]
    fn serde_preserves_vectors() {
        let index = index_of(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        let json = serde_json::to_string(&index).unwrap();
        let back: FlatL2Index = serde_json::from_str(&json).unwrap();
        assert_eq!(back, index);
    }

    proptest! {
        #[test]
        fn search_is_sorted_and_bounded(
            rows in prop::collection::vec(prop::collection::vec(-100.0f32..100.0, 4), 1..40),
            query in prop::collection::vec(-100.0f32..100.0, 4),
            k in 0usize..50,
        ) {
            let index = index_of(&rows);
            let hits = index.search(query.as_slice(), k).unwrap();
            prop_assert_eq!(hits.len(), k.min(rows.len()));
            for pair in hits.windows(2) {
                prop_assert!(pair[0].distance <= pair[1].distance);
                if pair[0].distance == pair[1].distance {
                    prop_assert!(pair[0].position < pair[1].position);
                }
            }
        }

        #[test]
        fn stored_vector_is_its_own_nearest(
            rows in prop::collection::vec(prop::collection::vec(-100.0f32..100.0, 3), 1..30),
            pick in any::<prop::sample::Index>(),
        ) {
            let index = index_of(&rows);
            let target = pick.index(rows.len());
            let hits = index.search(rows[target].as_slice(), 1).unwrap();
            prop_assert_eq!(hits[0].distance, 0.0);
            prop_assert_eq!(&rows[hits[0].position], &rows[target]);
        }
    }
}
