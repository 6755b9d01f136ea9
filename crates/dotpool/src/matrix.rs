//! Integer matrices and the shape checks run before dispatch.

use serde::{Deserialize, Serialize};

/// Which side of a product a matrix sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Left,
    Right,
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Left => write!(f, "matrix1"),
            Operand::Right => write!(f, "matrix2"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatrixError {
    #[error("{operand} row {row} has {found} columns, expected {expected}")]
    Ragged {
        operand: Operand,
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("matrix1 has {left_cols} columns but matrix2 has {right_rows} rows")]
    DimensionMismatch { left_cols: usize, right_rows: usize },
}

/// Row-major matrix of `i64`. Serialized as a plain array of rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Matrix(Vec<Vec<i64>>);

impl Matrix {
    pub fn new(rows: Vec<Vec<i64>>) -> Self {
        Self(rows)
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self(vec![vec![0; cols]; rows])
    }

    pub fn rows(&self) -> usize {
        self.0.len()
    }

    /// Column count, taken from the first row. A matrix with no rows has none.
    pub fn cols(&self) -> usize {
        self.0.first().map_or(0, Vec::len)
    }

    pub fn row(&self, i: usize) -> Option<&[i64]> {
        self.0.get(i).map(Vec::as_slice)
    }

    /// Column `j`, read one element from each row.
    pub fn column(&self, j: usize) -> Option<Vec<i64>> {
        self.0.iter().map(|row| row.get(j).copied()).collect()
    }

    pub fn as_rows(&self) -> &[Vec<i64>] {
        &self.0
    }

    pub(crate) fn set(&mut self, i: usize, j: usize, value: i64) {
        if let Some(cell) = self.0.get_mut(i).and_then(|row| row.get_mut(j)) {
            *cell = value;
        }
    }

    fn ensure_rectangular(&self, operand: Operand) -> Result<(), MatrixError> {
        let expected = self.cols();
        match self
            .0
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != expected)
        {
            Some((row, found)) => Err(MatrixError::Ragged {
                operand,
                row,
                expected,
                found: found.len(),
            }),
            None => Ok(()),
        }
    }

    /// Check that `self × right` is defined: both operands rectangular and
    /// `cols(self) == rows(right)`.
    pub fn check_product(&self, right: &Matrix) -> Result<(), MatrixError> {
        self.ensure_rectangular(Operand::Left)?;
        right.ensure_rectangular(Operand::Right)?;

        // A left operand with no rows multiplies anything into an empty result.
        if self.rows() > 0 && self.cols() != right.rows() {
            return Err(MatrixError::DimensionMismatch {
                left_cols: self.cols(),
                right_rows: right.rows(),
            });
        }
        Ok(())
    }
}

impl From<Vec<Vec<i64>>> for Matrix {
    fn from(rows: Vec<Vec<i64>>) -> Self {
        Self(rows)
    }
}

impl std::fmt::Display for Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, row) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{:?}", row)?;
        }
        Ok(())
    }
}
