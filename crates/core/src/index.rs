//! Exact nearest-neighbour index over squared Euclidean distance.
//!
//! Vectors are stored contiguously in insertion order; a vector's position is its join key
//! into the [`KnowledgeStore`](crate::store::KnowledgeStore).

use crate::error::IndexError;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

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

    /// Appends `vectors` in order. Nothing is inserted unless every vector has the index dimension.
    pub fn insert(&mut self, vectors: &[Vec<f32>]) -> Result<(), IndexError> {
        if let Some(bad) = vectors.iter().find(|vector| vector.len() != self.dimension) {
            return Err(IndexError::DimensionMismatch {
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

    /// The `k` closest vectors to `query`, closest first. Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<Neighbor> = self
            .vectors()
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                distance: squared_l2(query, vector),
            })
            .collect();

        let k = k.min(neighbors.len());
        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, compare_neighbors);
            neighbors.truncate(k);
        }
        neighbors.sort_unstable_by(compare_neighbors);
        Ok(neighbors)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn vectors(&self) -> impl Iterator<Item = &[f32]> + '_ {
        // chunks_exact panics on zero; an empty slice yields nothing either way
        self.data.chunks_exact(self.dimension.max(1))
    }
}

fn compare_neighbors(left: &Neighbor, right: &Neighbor) -> Ordering {
    left.distance
        .total_cmp(&right.distance)
        .then(left.position.cmp(&right.position))
}

fn squared_l2(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| {
            let delta = a - b;
            delta * delta
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(index: &FlatL2Index, query: &[f32], k: usize) -> Vec<usize> {
        let mut all: Vec<(f32, usize)> = index
            .vectors()
            .enumerate()
            .map(|(position, vector)| (squared_l2(query, vector), position))
            .collect();
        all.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        all.into_iter().take(k).map(|(_, position)| position).collect()
    }

    #[test]
    fn insert_assigns_positions_in_order() {
        let mut index = FlatL2Index::new(2);
        index.insert(&[vec![0.0, 0.0], vec![1.0, 0.0]]).unwrap();
        index.insert(&[vec![5.0, 5.0]]).unwrap();
        assert_eq!(index.len(), 3);

        let hits = index.search(&[5.0, 5.0], 1).unwrap();
        assert_eq!(hits[0].position, 2);
        assert_eq!(hits[0].distance, 0.0);
    }

    #[test]
    fn wrong_dimension_leaves_index_unchanged() {
        let mut index = FlatL2Index::new(3);
        index.insert(&[vec![1.0, 2.0, 3.0]]).unwrap();

        let result = index.insert(&[vec![1.0, 1.0, 1.0], vec![1.0, 1.0]]);
        assert_eq!(
            result,
            Err(IndexError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn query_of_wrong_dimension_is_rejected() {
        let index = FlatL2Index::new(3);
        assert!(index.search(&[1.0], 1).is_err());
    }

    #[test]
    fn empty_index_or_zero_k_returns_nothing() {
        let mut index = FlatL2Index::new(2);
        assert!(index.search(&[0.0, 0.0], 5).unwrap().is_empty());
        index.insert(&[vec![1.0, 1.0]]).unwrap();
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn result_length_is_capped_by_size() {
        let mut index = FlatL2Index::new(1);
        index.insert(&[vec![1.0], vec![2.0]]).unwrap();
        assert_eq!(index.search(&[0.0], 10).unwrap().len(), 2);
    }

    #[test]
    fn ties_are_broken_by_position() {
        let mut index = FlatL2Index::new(1);
        index
            .insert(&[vec![1.0], vec![-1.0], vec![1.0], vec![3.0]])
            .unwrap();

        let hits = index.search(&[0.0], 3).unwrap();
        let positions: Vec<usize> = hits.iter().map(|hit| hit.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn matches_brute_force_ordering() {
        let mut index = FlatL2Index::new(4);
        let vectors: Vec<Vec<f32>> = (0..200)
            .map(|i| {
                let x = i as f32;
                vec![(x * 0.37).sin(), (x * 0.11).cos(), (i % 7) as f32, (i % 3) as f32]
            })
            .collect();
        index.insert(&vectors).unwrap();

        let query = [0.2, -0.4, 3.0, 1.0];
        for k in [1, 5, 17, 200, 500] {
            let hits = index.search(&query, k).unwrap();
            let positions: Vec<usize> = hits.iter().map(|hit| hit.position).collect();
            assert_eq!(positions, brute_force(&index, &query, k));
        }
    }

    #[test]
    fn clear_keeps_dimension() {
        let mut index = FlatL2Index::new(2);
        index.insert(&[vec![1.0, 1.0]]).unwrap();
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.dimension(), 2);
        assert!(index.insert(&[vec![1.0]]).is_err());
    }
}
