//! Rectangular in-memory vector storage.

use crate::error::{BenchError, Result};

/// Ordered set of fixed-dimension `f32` vectors, stored row-major.
///
/// Every row has exactly `dim` components. Construction from ragged input
/// fails; nothing is ever padded or truncated.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSet {
    data: Vec<f32>,
    dim: usize,
}

/// Per-query exact neighbor indices into the base set.
pub type NeighborList = Vec<Vec<u32>>;

impl VectorSet {
    /// Build a set from decoded rows, rejecting non-rectangular input.
    ///
    /// An empty row list yields an empty set of dimension 0.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let dim = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * dim);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != dim {
                return Err(BenchError::format(format!(
                    "row {i} has {} components, expected {dim}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self { data, dim })
    }

    /// Build a set from a flat row-major buffer.
    pub fn from_flat(data: Vec<f32>, dim: usize) -> Result<Self> {
        if dim == 0 && !data.is_empty() {
            return Err(BenchError::format("non-empty buffer with dimension 0"));
        }
        if dim > 0 && data.len() % dim != 0 {
            return Err(BenchError::format(format!(
                "buffer of {} values is not a multiple of dimension {dim}",
                data.len()
            )));
        }
        Ok(Self { data, dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row `i`. Panics if out of range, like slice indexing.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[f32]> + '_ {
        // chunks_exact on an empty buffer with dim 0 would panic
        self.data.chunks_exact(self.dim.max(1)).take(self.len())
    }

    /// First `n` rows (all rows if `n` exceeds the length).
    pub fn truncated(&self, n: usize) -> Self {
        let n = n.min(self.len());
        Self {
            data: self.data[..n * self.dim].to_vec(),
            dim: self.dim,
        }
    }

    /// Apply `f` to every row, keeping the dimension.
    pub(crate) fn map_rows(&self, mut f: impl FnMut(&[f32]) -> Vec<f32>) -> Self {
        let mut data = Vec::with_capacity(self.data.len());
        for row in self.iter() {
            data.extend(f(row));
        }
        Self {
            data,
            dim: self.dim,
        }
    }
}
