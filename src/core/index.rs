use crate::utils::error::{RagError, Result};

/// One search hit: position of the stored vector and its squared L2 distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f32,
}

/// Exact nearest-neighbour index over squared Euclidean distance.
///
/// Vectors are stored contiguously; a search scans all of them.
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Appends vectors in order. Either all of them are added or none.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Returns up to `k` stored vectors closest to `query`, nearest first.
    /// Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(index, stored)| Neighbor {
                index,
                distance: squared_l2(stored, query),
            })
            .collect();

        // 溢位的向量會產生 NaN 距離，total_cmp 仍是全序
        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.index.cmp(&b.index))
        });
        neighbors.truncate(k);

        Ok(neighbors)
    }

    pub fn reset(&mut self) {
        self.data.clear();
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

    fn sample_index() -> FlatL2Index {
        let mut index = FlatL2Index::new(2);
        index
            .add(&[
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![0.0, 3.0],
                vec![5.0, 5.0],
            ])
            .unwrap();
        index
    }

    #[test]
    fn test_search_orders_by_squared_distance() {
        let index = sample_index();
        let hits = index.search(&[0.9, 0.1], 3).unwrap();

        assert_eq!(
            hits.iter().map(|h| h.index).collect::<Vec<_>>(),
            vec![1, 0, 2]
        );
        assert!((hits[0].distance - 0.02).abs() < 1e-6);
        assert!((hits[1].distance - 0.82).abs() < 1e-6);
    }

    #[test]
    fn test_k_larger_than_index_returns_everything() {
        let index = sample_index();
        let hits = index.search(&[0.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].index, 0);
        assert_eq!(hits[3].index, 3);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = FlatL2Index::new(1);
        index.add(&[vec![1.0], vec![-1.0], vec![1.0]]).unwrap();

        let hits = index.search(&[0.0], 3).unwrap();
        assert_eq!(
            hits.iter().map(|h| h.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_dimension_mismatch_leaves_index_unchanged() {
        let mut index = sample_index();
        let err = index.add(&[vec![1.0, 1.0], vec![1.0]]).unwrap_err();

        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
        assert_eq!(index.len(), 4);
        assert!(index.search(&[1.0, 2.0, 3.0], 1).is_err());
    }

    #[test]
    fn test_empty_index_and_zero_k() {
        let index = FlatL2Index::new(3);
        assert!(index.is_empty());
        assert!(index.search(&[0.0, 0.0, 0.0], 5).unwrap().is_empty());

        let index = sample_index();
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_reset_clears_vectors() {
        let mut index = sample_index();
        index.reset();
        assert_eq!(index.len(), 0);
        assert_eq!(index.dimension(), 2);
    }

    #[test]
    fn test_overflowing_vectors_do_not_break_ordering() {
        let mut index = FlatL2Index::new(1);
        index
            .add(&[vec![f32::INFINITY], vec![1.0], vec![2.0]])
            .unwrap();

        // inf - inf 為 NaN
        let hits = index.search(&[f32::INFINITY], 3).unwrap();
        assert_eq!(hits.len(), 3);

        let comparable: Vec<usize> = hits
            .iter()
            .filter(|h| !h.distance.is_nan())
            .map(|h| h.index)
            .collect();
        assert_eq!(comparable, vec![1, 2]);
    }
}
