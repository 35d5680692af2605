//! A dense grid of `f64` cells, stored row by row.

use std::ops::{Index, IndexMut};

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    cells: Vec<f64>,
}
impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![0.0; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.cells
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.cells
    }

    /// `(row, col, value)` for every cell, row by row.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .map(move |(offset, &value)| (offset / cols, offset % cols, value))
    }

    #[inline]
    fn offset(&self, (row, col): (usize, usize)) -> usize {
        assert!(
            row < self.rows && col < self.cols,
            "cell ({row}, {col}) lies outside a {}x{} matrix",
            self.rows,
            self.cols
        );
        row * self.cols + col
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, cell: (usize, usize)) -> &f64 {
        &self.cells[self.offset(cell)]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, cell: (usize, usize)) -> &mut f64 {
        let offset = self.offset(cell);
        &mut self.cells[offset]
    }
}
