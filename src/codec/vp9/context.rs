//! Above/Left Entropy Contexts
//!
//! One flag per 4-sample unit along the top and left edges of the blocks
//! coded so far in a tile. A flag is set when the block covering it had a
//! non-zero end-of-block. The DC context of the next block is the number of
//! set sides over its span.

use super::tables::TxSize;

/// Entropy context for one plane of a tile
///
/// Sized to the visible frame area in 4x4 units. Spans reaching past the
/// frame edge are clipped, so units outside the frame always read as zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntropyContext {
    above: Vec<bool>,
    left: Vec<bool>,
}

impl EntropyContext {
    /// Create contexts for `cols` x `rows` 4x4 units
    pub fn new(cols: usize, rows: usize) -> Self {
        EntropyContext {
            above: vec![false; cols],
            left: vec![false; rows],
        }
    }

    pub fn cols(&self) -> usize {
        self.above.len()
    }

    pub fn rows(&self) -> usize {
        self.left.len()
    }

    /// Reset at the start of a tile
    pub fn reset(&mut self) {
        self.above.fill(false);
        self.left.fill(false);
    }

    fn span(len: usize, start: usize, count: usize) -> std::ops::Range<usize> {
        start.min(len)..(start + count).min(len)
    }

    /// DC context (0..=2) for a transform block at (col, row) in 4x4 units
    pub fn initial_ctx(&self, col: usize, row: usize, tx_size: TxSize) -> usize {
        let n = tx_size.num_4x4();
        let above = self.above[Self::span(self.above.len(), col, n)]
            .iter()
            .any(|&f| f);
        let left = self.left[Self::span(self.left.len(), row, n)]
            .iter()
            .any(|&f| f);
        above as usize + left as usize
    }

    /// Record the outcome of a transform block
    pub fn update(&mut self, col: usize, row: usize, tx_size: TxSize, nonzero: bool) {
        let n = tx_size.num_4x4();
        let cols = Self::span(self.above.len(), col, n);
        let rows = Self::span(self.left.len(), row, n);
        self.above[cols].fill(nonzero);
        self.left[rows].fill(nonzero);
    }

    /// Clear the contexts under a skipped block of `width` x `height` 4x4 units
    pub fn clear_block(&mut self, col: usize, row: usize, width: usize, height: usize) {
        let cols = Self::span(self.above.len(), col, width);
        let rows = Self::span(self.left.len(), row, height);
        self.above[cols].fill(false);
        self.left[rows].fill(false);
    }
}
