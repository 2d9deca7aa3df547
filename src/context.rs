//! Frame, tile and block decoding contexts
//!
//! The mode-info grid stores one entry per 8x8 unit. Above/left context
//! arrays feed the syntax element context formulas; a snapshot of the
//! previous frame's grid backs predicted segment ids and co-located motion
//! vector candidates.

use crate::error::{Error, Result};
use crate::tables::{
    BlockSize, InterpolationFilter, MotionVector, PredictionMode, ReferenceFrame, TxSize,
};

/// Per-8x8-unit block state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockInfo {
    pub block_size: BlockSize,
    pub segment_id: u8,
    pub skip: bool,
    pub tx_size: TxSize,
    pub is_inter: bool,
    pub y_mode: PredictionMode,
    pub uv_mode: PredictionMode,
    pub interp_filter: InterpolationFilter,
    /// Second entry is `Intra` for single-reference blocks
    pub ref_frames: [ReferenceFrame; 2],
    /// Per-4x4-quadrant modes for sub-8x8 blocks; uniform otherwise
    pub sub_modes: [PredictionMode; 4],
    /// Per-4x4-quadrant motion vectors for up to two references
    pub mvs: [[MotionVector; 2]; 4],
}

impl Default for BlockInfo {
    fn default() -> Self {
        BlockInfo {
            block_size: BlockSize::Block64x64,
            segment_id: 0,
            skip: false,
            tx_size: TxSize::Tx4x4,
            is_inter: false,
            y_mode: PredictionMode::DcPred,
            uv_mode: PredictionMode::DcPred,
            interp_filter: InterpolationFilter::EightTap,
            ref_frames: [ReferenceFrame::Intra; 2],
            sub_modes: [PredictionMode::DcPred; 4],
            mvs: [[MotionVector::zero(); 2]; 4],
        }
    }
}

impl BlockInfo {
    /// Motion vector pair of the bottom-right 4x4 quadrant
    pub fn primary_mvs(&self) -> [MotionVector; 2] {
        self.mvs[3]
    }

    pub fn single_reference(&self) -> bool {
        self.ref_frames[1].is_intra()
    }
}

/// Grid of block info, one entry per mode-info unit
#[derive(Debug, Clone)]
pub struct ModeInfoGrid {
    cols: usize,
    rows: usize,
    data: Vec<BlockInfo>,
}

impl ModeInfoGrid {
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        let len = rows
            .checked_mul(cols)
            .ok_or_else(|| Error::allocation("mode info grid dimensions overflow"))?;
        Ok(ModeInfoGrid {
            cols,
            rows,
            data: vec![BlockInfo::default(); len],
        })
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&BlockInfo> {
        if row < self.rows && col < self.cols {
            Some(&self.data[row * self.cols + col])
        } else {
            None
        }
    }

    /// Neighbour lookup with signed offsets
    pub fn get_signed(&self, row: i32, col: i32) -> Option<&BlockInfo> {
        if row < 0 || col < 0 {
            return None;
        }
        self.get(row as usize, col as usize)
    }

    /// Copy a span of columns from another grid with identical dimensions
    pub fn copy_columns(&mut self, source: &ModeInfoGrid, start: usize, end: usize) {
        let start = start.min(self.cols);
        let end = end.min(self.cols).min(source.cols);
        for row in 0..self.rows.min(source.rows) {
            let offset = row * self.cols;
            self.data[offset + start..offset + end]
                .copy_from_slice(&source.data[offset + start..offset + end]);
        }
    }

    /// Write `info` into every mode-info unit the block covers, clipped to
    /// the frame
    pub fn fill_block(&mut self, row: usize, col: usize, info: &BlockInfo) {
        let h = info.block_size.height_mi().min(self.rows.saturating_sub(row));
        let w = info.block_size.width_mi().min(self.cols.saturating_sub(col));
        for r in row..row + h {
            for c in col..col + w {
                self.data[r * self.cols + c] = *info;
            }
        }
    }
}

/// Snapshot of the previous frame used for cross-frame prediction
#[derive(Debug, Clone)]
pub struct PrevFrameInfo {
    pub cols: usize,
    pub rows: usize,
    pub segment_ids: Vec<u8>,
    pub ref_frames: Vec<[ReferenceFrame; 2]>,
    pub mvs: Vec<[MotionVector; 2]>,
}

impl PrevFrameInfo {
    /// Capture the parts of a decoded grid that the next frame may read
    ///
    /// Segment ids are kept only when segmentation was active; otherwise
    /// they are stored as zero so predicted segment ids fall back cleanly.
    pub fn capture(grid: &ModeInfoGrid, keep_segment_ids: bool) -> Self {
        let len = grid.rows * grid.cols;
        let mut segment_ids = Vec::with_capacity(len);
        let mut ref_frames = Vec::with_capacity(len);
        let mut mvs = Vec::with_capacity(len);
        for info in grid.data.iter() {
            segment_ids.push(if keep_segment_ids { info.segment_id } else { 0 });
            ref_frames.push(info.ref_frames);
            mvs.push(info.primary_mvs());
        }
        PrevFrameInfo {
            cols: grid.cols,
            rows: grid.rows,
            segment_ids,
            ref_frames,
            mvs,
        }
    }

    pub fn matches_dimensions(&self, rows: usize, cols: usize) -> bool {
        self.rows == rows && self.cols == cols
    }

    pub fn segment_id(&self, row: usize, col: usize) -> u8 {
        if row < self.rows && col < self.cols {
            self.segment_ids[row * self.cols + col]
        } else {
            0
        }
    }

    pub fn mv(&self, row: usize, col: usize) -> Option<(&[ReferenceFrame; 2], &[MotionVector; 2])> {
        if row < self.rows && col < self.cols {
            let i = row * self.cols + col;
            Some((&self.ref_frames[i], &self.mvs[i]))
        } else {
            None
        }
    }
}

// =============================================================================
// Above/Left Contexts
// =============================================================================

/// Partition context masks per mode-info column/row
///
/// `above` spans the columns this decode owns; `left` covers the 8 rows of
/// the current superblock and resets at the start of each superblock row.
#[derive(Debug, Clone)]
pub struct PartitionContexts {
    above: Vec<u8>,
    left: [u8; 8],
    col_offset: usize,
}

impl PartitionContexts {
    pub fn new(cols: usize, col_offset: usize) -> Self {
        PartitionContexts {
            above: vec![0; cols],
            left: [0; 8],
            col_offset,
        }
    }

    pub fn clear_left(&mut self) {
        self.left = [0; 8];
    }

    /// Partition context for a block at the given position
    pub fn context(&self, mi_row: usize, mi_col: usize, block_size: BlockSize) -> usize {
        // log2 of the block width in mode-info units
        let bsl = block_size.width_log2().saturating_sub(1);
        let above = self
            .above
            .get(mi_col - self.col_offset)
            .map(|&v| (v >> bsl) & 1)
            .unwrap_or(0) as usize;
        let left = ((self.left[mi_row & 7] >> bsl) & 1) as usize;
        bsl * 4 + left * 2 + above
    }

    /// Record a decoded partition leaf of the given size
    ///
    /// The stored value keeps one low bit set per finer partition level, so
    /// coarser leaves leave fewer bits set. The write covers the extent of
    /// the enclosing partition node, which is always square.
    pub fn update(&mut self, mi_row: usize, mi_col: usize, subsize: BlockSize, parent: BlockSize) {
        let above_value = (15 >> subsize.width_log2()) as u8;
        let left_value = (15 >> subsize.height_log2()) as u8;

        for i in 0..parent.width_mi() {
            if let Some(slot) = self.above.get_mut(mi_col - self.col_offset + i) {
                *slot = above_value;
            }
            self.left[(mi_row + i) & 7] = left_value;
        }
    }
}

/// Non-zero coefficient contexts per plane
///
/// Tracked per 4x4 transform column/row; `above` spans the columns this
/// decode owns, `left` covers one superblock and resets per superblock row.
#[derive(Debug, Clone)]
pub struct TokenContexts {
    above: [Vec<bool>; 3],
    left: [[bool; 16]; 3],
    /// First 4x4 column owned, per plane
    col_offset: [usize; 3],
}

impl TokenContexts {
    /// `cols_4x4` is the owned width per plane in 4x4 units
    pub fn new(cols_4x4: [usize; 3], col_offset: [usize; 3]) -> Self {
        TokenContexts {
            above: [
                vec![false; cols_4x4[0]],
                vec![false; cols_4x4[1]],
                vec![false; cols_4x4[2]],
            ],
            left: [[false; 16]; 3],
            col_offset,
        }
    }

    pub fn clear_left(&mut self) {
        self.left = [[false; 16]; 3];
    }

    /// Context (0..=2) for the DC coefficient of a transform block
    pub fn context(
        &self,
        plane: usize,
        col_4x4: usize,
        row_4x4_in_sb: usize,
        tx_size: TxSize,
    ) -> usize {
        let n = tx_size.size() / 4;
        let start = col_4x4 - self.col_offset[plane];
        let above = (0..n).any(|i| {
            self.above[plane]
                .get(start + i)
                .copied()
                .unwrap_or(false)
        });
        let left = (0..n).any(|i| {
            self.left[plane]
                .get(row_4x4_in_sb + i)
                .copied()
                .unwrap_or(false)
        });
        above as usize + left as usize
    }

    /// Record whether the transform block had any non-zero coefficients
    pub fn update(
        &mut self,
        plane: usize,
        col_4x4: usize,
        row_4x4_in_sb: usize,
        tx_size: TxSize,
        non_zero: bool,
    ) {
        let n = tx_size.size() / 4;
        let start = col_4x4 - self.col_offset[plane];
        for i in 0..n {
            if let Some(slot) = self.above[plane].get_mut(start + i) {
                *slot = non_zero;
            }
            if let Some(slot) = self.left[plane].get_mut(row_4x4_in_sb + i) {
                *slot = non_zero;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_fill_block_clips_at_edge() {
        let mut grid = ModeInfoGrid::new(5, 5).unwrap();
        let info = BlockInfo {
            block_size: BlockSize::Block64x64,
            segment_id: 3,
            ..BlockInfo::default()
        };
        grid.fill_block(4, 4, &info);
        assert_eq!(grid.get(4, 4).unwrap().segment_id, 3);
        assert_eq!(grid.get(3, 4).unwrap().segment_id, 0);
        assert!(grid.get(5, 4).is_none());
    }

    #[test]
    fn test_grid_signed_lookup() {
        let grid = ModeInfoGrid::new(2, 2).unwrap();
        assert!(grid.get_signed(-1, 0).is_none());
        assert!(grid.get_signed(0, -1).is_none());
        assert!(grid.get_signed(1, 1).is_some());
    }

    #[test]
    fn test_partition_context_tracks_coarseness() {
        let mut ctx = PartitionContexts::new(16, 0);
        // Nothing decoded above or left yet.
        assert_eq!(ctx.context(0, 0, BlockSize::Block64x64), 3 * 4);

        // A 64x64 leaf clears every bit, so a later 64x64 in the same
        // superblock row sees coarse neighbors.
        ctx.update(0, 0, BlockSize::Block64x64, BlockSize::Block64x64);
        assert_eq!(ctx.context(0, 8, BlockSize::Block64x64), 3 * 4);

        // An 8x8 leaf leaves the fine bits set in its column.
        ctx.update(0, 8, BlockSize::Block8x8, BlockSize::Block8x8);
        assert_eq!(ctx.context(1, 8, BlockSize::Block8x8) & 1, 1);
    }

    #[test]
    fn test_partition_left_clear() {
        let mut ctx = PartitionContexts::new(16, 0);
        ctx.update(0, 0, BlockSize::Block8x8, BlockSize::Block8x8);
        assert_eq!(ctx.context(0, 8, BlockSize::Block8x8) & 2, 2);
        ctx.clear_left();
        assert_eq!(ctx.context(0, 8, BlockSize::Block8x8) & 2, 0);
    }

    #[test]
    fn test_token_context_roundtrip() {
        let mut ctx = TokenContexts::new([32, 16, 16], [0, 0, 0]);
        assert_eq!(ctx.context(0, 0, 0, TxSize::Tx8x8), 0);
        ctx.update(0, 0, 0, TxSize::Tx8x8, true);
        // Same position now sees both above and left set.
        assert_eq!(ctx.context(0, 0, 0, TxSize::Tx8x8), 2);
        // A distant position is unaffected.
        assert_eq!(ctx.context(0, 8, 8, TxSize::Tx4x4), 0);
        ctx.clear_left();
        assert_eq!(ctx.context(0, 0, 0, TxSize::Tx8x8), 1);
    }

    #[test]
    fn test_prev_frame_capture_zeroes_segment_ids() {
        let mut grid = ModeInfoGrid::new(2, 2).unwrap();
        let info = BlockInfo {
            block_size: BlockSize::Block8x8,
            segment_id: 5,
            ..BlockInfo::default()
        };
        grid.fill_block(0, 0, &info);
        let kept = PrevFrameInfo::capture(&grid, true);
        let dropped = PrevFrameInfo::capture(&grid, false);
        assert_eq!(kept.segment_id(0, 0), 5);
        assert_eq!(dropped.segment_id(0, 0), 0);
        assert!(kept.matches_dimensions(2, 2));
    }
}
