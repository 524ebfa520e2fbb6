//! Window iteration over a raster extent

use crate::types::Window;

/// Row-major iterator of windows that exactly tile a raster.
///
/// Windows follow a fixed block size; the last row and column of blocks are
/// truncated to the raster edge.
#[derive(Debug, Clone)]
pub struct WindowIterator {
    total_rows: usize,
    total_cols: usize,
    block_rows: usize,
    block_cols: usize,
    current_row: usize,
    current_col: usize,
}

impl WindowIterator {
    pub fn new(total_rows: usize, total_cols: usize, block_rows: usize, block_cols: usize) -> Self {
        Self {
            total_rows,
            total_cols,
            block_rows: block_rows.max(1),
            block_cols: block_cols.max(1),
            current_row: 0,
            current_col: 0,
        }
    }

    /// Number of windows the iterator yields in total
    pub fn window_count(&self) -> usize {
        if self.total_rows == 0 || self.total_cols == 0 {
            return 0;
        }
        self.total_rows.div_ceil(self.block_rows) * self.total_cols.div_ceil(self.block_cols)
    }
}

impl Iterator for WindowIterator {
    type Item = Window;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row >= self.total_rows || self.total_cols == 0 {
            return None;
        }

        let height = self.block_rows.min(self.total_rows - self.current_row);
        let width = self.block_cols.min(self.total_cols - self.current_col);
        let window = Window::new(self.current_row, self.current_col, height, width);

        self.current_col += self.block_cols;
        if self.current_col >= self.total_cols {
            self.current_col = 0;
            self.current_row += self.block_rows;
        }

        Some(window)
    }
}
