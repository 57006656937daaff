//! Column-major matrices
//!
//! `matrix[col][row]`: the outer vector holds columns, each inner vector the
//! rows of that column. The empty matrix is a single empty column (`[[]]`),
//! so it has width 1 and height 0.

use crate::error::{Error, Result};

/// A rectangular, column-major matrix
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    columns: Vec<Vec<T>>,
}

impl<T> Matrix<T> {
    /// The empty matrix `[[]]`
    pub fn empty() -> Self {
        Self {
            columns: vec![Vec::new()],
        }
    }

    /// Build from columns, rejecting columns of different heights
    pub fn from_columns(columns: Vec<Vec<T>>) -> Result<Self> {
        if columns.is_empty() {
            return Ok(Self::empty());
        }
        let expected = columns[0].len();
        if let Some((column, col)) = columns
            .iter()
            .enumerate()
            .find(|(_, col)| col.len() != expected)
        {
            return Err(Error::RaggedMatrix {
                column,
                expected,
                actual: col.len(),
            });
        }
        Ok(Self { columns })
    }

    /// Build from rows (row-major input), rejecting rows of different widths
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self> {
        if rows.is_empty() {
            return Ok(Self::empty());
        }
        let width = rows[0].len();
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(Error::RaggedMatrix {
                column: row,
                expected: width,
                actual: r.len(),
            });
        }
        let height = rows.len();
        let mut columns: Vec<Vec<T>> = (0..width).map(|_| Vec::with_capacity(height)).collect();
        for row in rows {
            for (col, value) in row.into_iter().enumerate() {
                columns[col].push(value);
            }
        }
        Self::from_columns(columns)
    }

    /// Build by calling `f(col, row)` for every position
    pub fn from_fn<F: FnMut(usize, usize) -> T>(width: usize, height: usize, mut f: F) -> Self {
        if width == 0 {
            return Self::empty();
        }
        let columns = (0..width)
            .map(|col| (0..height).map(|row| f(col, row)).collect())
            .collect();
        Self { columns }
    }

    /// A single-element matrix
    pub fn scalar(value: T) -> Self {
        Self {
            columns: vec![vec![value]],
        }
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Whether the matrix holds no element
    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    /// Whether the matrix is 1x1
    pub fn is_single(&self) -> bool {
        self.width() == 1 && self.height() == 1
    }

    /// Element at `(col, row)`
    pub fn get(&self, col: usize, row: usize) -> Option<&T> {
        self.columns.get(col).and_then(|c| c.get(row))
    }

    /// Mutable element at `(col, row)`
    pub fn get_mut(&mut self, col: usize, row: usize) -> Option<&mut T> {
        self.columns.get_mut(col).and_then(|c| c.get_mut(row))
    }

    /// The columns
    pub fn columns(&self) -> &[Vec<T>] {
        &self.columns
    }

    /// Iterate `(col, row, &value)` in column-major order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        self.columns
            .iter()
            .enumerate()
            .flat_map(|(c, col)| col.iter().enumerate().map(move |(r, v)| (c, r, v)))
    }

    /// Iterate `(col, row, &value)` in row-major order
    pub fn iter_row_major(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width();
        (0..self.height()).flat_map(move |r| {
            (0..width).filter_map(move |c| self.get(c, r).map(|v| (c, r, v)))
        })
    }

    /// Apply `f` to every element
    pub fn map<U, F: FnMut(&T) -> U>(&self, mut f: F) -> Matrix<U> {
        Matrix {
            columns: self
                .columns
                .iter()
                .map(|col| col.iter().map(&mut f).collect())
                .collect(),
        }
    }

    /// Consume and apply `f` to every element
    pub fn into_map<U, F: FnMut(T) -> U>(self, mut f: F) -> Matrix<U> {
        Matrix {
            columns: self
                .columns
                .into_iter()
                .map(|col| col.into_iter().map(&mut f).collect())
                .collect(),
        }
    }
}

impl<T: Clone> Matrix<T> {
    /// A `width` x `height` matrix filled with `value`
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self::from_fn(width, height, |_, _| value.clone())
    }

    /// Swap rows and columns
    pub fn transpose(&self) -> Self {
        if self.is_empty() {
            return Self::empty();
        }
        Self::from_fn(self.height(), self.width(), |c, r| self.columns[r][c].clone())
    }

    /// The elements as row-major rows
    pub fn to_rows(&self) -> Vec<Vec<T>> {
        (0..self.height())
            .map(|r| self.columns.iter().map(|col| col[r].clone()).collect())
            .collect()
    }
}

impl<T> Default for Matrix<T> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_matrix() {
        let m: Matrix<f64> = Matrix::empty();
        assert_eq!(m.width(), 1);
        assert_eq!(m.height(), 0);
        assert!(m.is_empty());
        assert_eq!(Matrix::<f64>::from_columns(vec![]).unwrap(), m);
    }

    #[test]
    fn test_from_rows_is_column_major() {
        let m = Matrix::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
        assert_eq!(m.width(), 3);
        assert_eq!(m.height(), 2);
        assert_eq!(m.columns(), &[vec![1, 4], vec![2, 5], vec![3, 6]]);
        assert_eq!(m.get(2, 1), Some(&6));
        assert_eq!(m.to_rows(), vec![vec![1, 2, 3], vec![4, 5, 6]]);
    }

    #[test]
    fn test_ragged_rejected() {
        assert!(Matrix::from_columns(vec![vec![1, 2], vec![3]]).is_err());
        assert!(Matrix::from_rows(vec![vec![1, 2], vec![3]]).is_err());
    }

    #[test]
    fn test_iteration_orders() {
        let m = Matrix::from_rows(vec![vec![1, 2], vec![3, 4]]).unwrap();
        let col_major: Vec<_> = m.iter().map(|(_, _, v)| *v).collect();
        let row_major: Vec<_> = m.iter_row_major().map(|(_, _, v)| *v).collect();
        assert_eq!(col_major, vec![1, 3, 2, 4]);
        assert_eq!(row_major, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_transpose_and_map() {
        let m = Matrix::from_rows(vec![vec![1, 2, 3]]).unwrap();
        let t = m.transpose();
        assert_eq!((t.width(), t.height()), (1, 3));
        assert_eq!(t.map(|v| v * 10).columns(), &[vec![10, 20, 30]]);
    }
}
