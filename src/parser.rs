//! Frame syntax parsing and tile decoding
//!
//! The compressed header applies per-frame probability deltas to the working
//! tables, then the tile payload is split into columns which decode in
//! parallel. Each column owns its own frame buffer and mode-info grid;
//! finished columns are stitched together and their syntax counters merged
//! for the post-frame probability adaptation.

use byteorder::{BigEndian, ByteOrder};
use rayon::prelude::*;
use tracing::debug;

use crate::bool_coder::BoolDecoder;
use crate::context::{
    BlockInfo, ModeInfoGrid, PartitionContexts, PrevFrameInfo, TokenContexts,
};
use crate::error::{Error, Result};
use crate::frame::{FrameBuffer, ReferenceFrameStore};
use crate::header::FrameHeader;
use crate::predict;
use crate::probs::{
    kf_y_mode_probs, inv_remap_prob, ProbabilityTables, SyntaxElementCounter,
    KF_PARTITION_PROBS, KF_UV_MODE_PROBS, REF_CONTEXTS, TX_SIZE_CONTEXTS,
};
use crate::reconstruct::{reconstruct, SegmentQuantizers};
use crate::tables::{
    get_subsize, intra_mode_to_tx_type, scan_order, BlockSize, InterpolationFilter, MotionVector,
    Partition, PredictionMode, ReferenceFrame, TxMode, TxSize, TxType, CAT1_PROBS, CAT2_PROBS,
    CAT3_PROBS, CAT4_PROBS, CAT5_PROBS, CAT6_PROBS, CAT_BASE, COEFBAND_4X4, COEFBAND_8X8PLUS,
    COEF_BANDS, COUNTER_TO_CONTEXT, INTERP_FILTER_CONTEXTS,
    MODE_2_COUNTER, MV_BORDER, MV_REF_BLOCKS, SEG_LVL_REF_FRAME, SIZE_GROUP_LOOKUP,
    SUB8X8_MV_CANDIDATE_SUBBLOCKS, TOKEN_ENERGY_CLASS,
};
use crate::tree::{self, CompoundRefs, Neighbors};

/// Probability for the update gate in front of every compressed header delta
const DIFF_UPDATE_PROB: u8 = 252;

/// Clamp range applied to the best reference vector, in 1/8 pel
const BEST_MV_BORDER: i32 = (160 - 4) << 3;

// =============================================================================
// Compressed Header
// =============================================================================

/// How inter blocks choose between single and compound prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceMode {
    Single,
    Compound,
    Select,
}

/// Frame-wide decisions read from the compressed header
#[derive(Debug, Clone, Copy)]
pub struct FrameModes {
    pub tx_mode: TxMode,
    pub reference_mode: ReferenceMode,
    /// Fixed/variable compound references, present unless the mode is Single
    pub compound: Option<CompoundRefs>,
}

impl FrameModes {
    /// Modes for a frame with no compressed header content beyond defaults
    pub fn intra_defaults(header: &FrameHeader) -> Self {
        FrameModes {
            tx_mode: if header.lossless {
                TxMode::Only4x4
            } else {
                TxMode::Allow32x32
            },
            reference_mode: ReferenceMode::Single,
            compound: None,
        }
    }
}

/// Apply the compressed header's probability deltas to the working tables
/// and read the frame-wide mode selections.
pub fn parse_compressed_header(
    data: &[u8],
    header: &FrameHeader,
    probs: &mut ProbabilityTables,
) -> Result<FrameModes> {
    let mut decoder = BoolDecoder::new(data)?;

    let tx_mode = read_tx_mode(&mut decoder, header);
    if tx_mode == TxMode::Select {
        read_tx_mode_probs(&mut decoder, probs);
    }
    read_coef_probs(&mut decoder, tx_mode, probs);
    for prob in probs.skip.iter_mut() {
        diff_update_prob(&mut decoder, prob);
    }

    let mut modes = FrameModes {
        tx_mode,
        reference_mode: ReferenceMode::Single,
        compound: None,
    };

    if !header.is_intra() {
        for ctx in probs.inter_mode.iter_mut() {
            for prob in ctx.iter_mut() {
                diff_update_prob(&mut decoder, prob);
            }
        }
        if header.interpolation_filter == InterpolationFilter::Switchable {
            for ctx in 0..INTERP_FILTER_CONTEXTS {
                for prob in probs.interp_filter[ctx].iter_mut() {
                    diff_update_prob(&mut decoder, prob);
                }
            }
        }
        for prob in probs.is_inter.iter_mut() {
            diff_update_prob(&mut decoder, prob);
        }

        let (reference_mode, compound) = read_frame_reference_mode(&mut decoder, header)?;
        modes.reference_mode = reference_mode;
        modes.compound = compound;
        read_frame_reference_mode_probs(&mut decoder, reference_mode, probs);

        for group in probs.y_mode.iter_mut() {
            for prob in group.iter_mut() {
                diff_update_prob(&mut decoder, prob);
            }
        }
        for ctx in probs.partition.iter_mut() {
            for prob in ctx.iter_mut() {
                diff_update_prob(&mut decoder, prob);
            }
        }
        read_mv_probs(&mut decoder, header.allow_high_precision_mv, probs);
    }

    decoder.finish()?;
    Ok(modes)
}

fn read_tx_mode(decoder: &mut BoolDecoder, header: &FrameHeader) -> TxMode {
    if header.lossless {
        return TxMode::Only4x4;
    }
    let mut value = decoder.read_literal(2);
    if value == 3 {
        value += decoder.read_literal(1);
    }
    match value {
        0 => TxMode::Only4x4,
        1 => TxMode::Allow8x8,
        2 => TxMode::Allow16x16,
        3 => TxMode::Allow32x32,
        _ => TxMode::Select,
    }
}

fn read_tx_mode_probs(decoder: &mut BoolDecoder, probs: &mut ProbabilityTables) {
    for ctx in 0..TX_SIZE_CONTEXTS {
        for prob in probs.tx_8x8[ctx].iter_mut() {
            diff_update_prob(decoder, prob);
        }
    }
    for ctx in 0..TX_SIZE_CONTEXTS {
        for prob in probs.tx_16x16[ctx].iter_mut() {
            diff_update_prob(decoder, prob);
        }
    }
    for ctx in 0..TX_SIZE_CONTEXTS {
        for prob in probs.tx_32x32[ctx].iter_mut() {
            diff_update_prob(decoder, prob);
        }
    }
}

fn read_coef_probs(decoder: &mut BoolDecoder, tx_mode: TxMode, probs: &mut ProbabilityTables) {
    let max_tx = tx_mode.max_tx_size() as usize;
    for tx_size in 0..=max_tx {
        if decoder.read_literal(1) == 0 {
            continue;
        }
        for plane_type in 0..2 {
            for is_inter in 0..2 {
                for band in 0..COEF_BANDS {
                    let contexts = if band == 0 { 3 } else { 6 };
                    for ctx in 0..contexts {
                        for prob in probs.coef[tx_size][plane_type][is_inter][band][ctx].iter_mut()
                        {
                            diff_update_prob(decoder, prob);
                        }
                    }
                }
            }
        }
    }
}

fn read_frame_reference_mode(
    decoder: &mut BoolDecoder,
    header: &FrameHeader,
) -> Result<(ReferenceMode, Option<CompoundRefs>)> {
    let compound = tree::compound_reference_setup(header.ref_frame_sign_bias);
    let mode = if compound.is_some() {
        if decoder.read_literal(1) == 1 {
            if decoder.read_literal(1) == 1 {
                ReferenceMode::Select
            } else {
                ReferenceMode::Compound
            }
        } else {
            ReferenceMode::Single
        }
    } else {
        ReferenceMode::Single
    };
    if mode == ReferenceMode::Single {
        return Ok((mode, None));
    }
    match compound {
        Some(refs) => Ok((mode, Some(refs))),
        None => Err(Error::corrupted("compound mode without opposing references")),
    }
}

fn read_frame_reference_mode_probs(
    decoder: &mut BoolDecoder,
    mode: ReferenceMode,
    probs: &mut ProbabilityTables,
) {
    if mode == ReferenceMode::Select {
        for ctx in 0..REF_CONTEXTS {
            diff_update_prob(decoder, &mut probs.comp_mode[ctx]);
        }
    }
    if mode != ReferenceMode::Compound {
        for ctx in 0..REF_CONTEXTS {
            diff_update_prob(decoder, &mut probs.single_ref[ctx][0]);
            diff_update_prob(decoder, &mut probs.single_ref[ctx][1]);
        }
    }
    if mode != ReferenceMode::Single {
        for ctx in 0..REF_CONTEXTS {
            diff_update_prob(decoder, &mut probs.comp_ref[ctx]);
        }
    }
}

fn read_mv_probs(decoder: &mut BoolDecoder, allow_high_precision: bool, probs: &mut ProbabilityTables) {
    for prob in probs.mv_joint.iter_mut() {
        update_mv_prob(decoder, prob);
    }
    for component in probs.mv.iter_mut() {
        update_mv_prob(decoder, &mut component.sign);
        for prob in component.classes.iter_mut() {
            update_mv_prob(decoder, prob);
        }
        update_mv_prob(decoder, &mut component.class0_bit);
        for prob in component.bits.iter_mut() {
            update_mv_prob(decoder, prob);
        }
    }
    for component in probs.mv.iter_mut() {
        for fr in component.class0_fr.iter_mut() {
            for prob in fr.iter_mut() {
                update_mv_prob(decoder, prob);
            }
        }
        for prob in component.fr.iter_mut() {
            update_mv_prob(decoder, prob);
        }
    }
    if allow_high_precision {
        for component in probs.mv.iter_mut() {
            update_mv_prob(decoder, &mut component.class0_hp);
            update_mv_prob(decoder, &mut component.hp);
        }
    }
}

fn diff_update_prob(decoder: &mut BoolDecoder, prob: &mut u8) {
    if decoder.read_bool(DIFF_UPDATE_PROB) {
        let delta = decode_term_subexp(decoder);
        *prob = inv_remap_prob(delta, *prob);
    }
}

fn update_mv_prob(decoder: &mut BoolDecoder, prob: &mut u8) {
    if decoder.read_bool(DIFF_UPDATE_PROB) {
        *prob = ((decoder.read_literal(7) << 1) | 1) as u8;
    }
}

fn decode_term_subexp(decoder: &mut BoolDecoder) -> u32 {
    if decoder.read_literal(1) == 0 {
        return decoder.read_literal(4);
    }
    if decoder.read_literal(1) == 0 {
        return decoder.read_literal(4) + 16;
    }
    if decoder.read_literal(1) == 0 {
        return decoder.read_literal(5) + 32;
    }
    let value = decoder.read_literal(7);
    if value < 65 {
        return value + 64;
    }
    (value << 1) - 1 + decoder.read_literal(1)
}

// =============================================================================
// Tile Layout
// =============================================================================

/// First mode-info unit of a tile along one axis
fn get_tile_offset(tile_start: usize, mi_count: usize, tile_count_log2: u8) -> usize {
    let superblocks = (mi_count + 7) >> 3;
    let offset = ((tile_start * superblocks) >> tile_count_log2) << 3;
    offset.min(mi_count)
}

/// One tile's bitstream slice and row extent
struct Tile<'a> {
    rows_start: usize,
    rows_end: usize,
    data: &'a [u8],
}

/// Everything a decoded frame produces besides the sticky decoder state
pub struct DecodedTiles {
    pub frame: FrameBuffer,
    pub grid: ModeInfoGrid,
    pub counts: SyntaxElementCounter,
}

/// Working frame buffer sized to whole mode-info units
///
/// Blocks straddling the right or bottom frame edge still carry coded
/// residuals for their alignment remainder, so the reconstruction buffer
/// covers it. The visible dimensions are kept for output metadata.
fn aligned_frame_buffer(header: &FrameHeader) -> Result<FrameBuffer> {
    let mut buffer = FrameBuffer::new(
        header.mi_cols() * 8,
        header.mi_rows() * 8,
        &header.color,
    )?;
    buffer.width = header.width as usize;
    buffer.height = header.height as usize;
    Ok(buffer)
}

/// Decode every tile of a frame, running tile columns in parallel.
pub fn decode_tiles(
    header: &FrameHeader,
    tile_data: &[u8],
    probs: &ProbabilityTables,
    modes: &FrameModes,
    references: &ReferenceFrameStore,
    prev: Option<&PrevFrameInfo>,
) -> Result<DecodedTiles> {
    let tile_cols = header.tile_cols();
    let tile_rows = header.tile_rows();
    let quantizers = SegmentQuantizers::new(header);

    // Tiles are stored in raster order; every tile except the last carries
    // a 32-bit size prefix.
    let mut workloads: Vec<Vec<Tile>> = (0..tile_cols).map(|_| Vec::with_capacity(tile_rows)).collect();
    let mut rest = tile_data;
    for tile_row in 0..tile_rows {
        let rows_start = get_tile_offset(tile_row, header.mi_rows(), header.tile_rows_log2);
        let rows_end = get_tile_offset(tile_row + 1, header.mi_rows(), header.tile_rows_log2);
        for (tile_col, workload) in workloads.iter_mut().enumerate() {
            let last = tile_row == tile_rows - 1 && tile_col == tile_cols - 1;
            let size = if last {
                rest.len()
            } else {
                if rest.len() < 4 {
                    return Err(Error::corrupted("tile size prefix past end of data"));
                }
                let size = BigEndian::read_u32(rest) as usize;
                rest = &rest[4..];
                size
            };
            if size > rest.len() {
                return Err(Error::corrupted("tile data shorter than its size prefix"));
            }
            workload.push(Tile {
                rows_start,
                rows_end,
                data: &rest[..size],
            });
            rest = &rest[size..];
        }
    }

    debug!(tile_cols, tile_rows, "decoding tiles");

    let results: Vec<Result<TileColumnDecoder>> = workloads
        .into_par_iter()
        .enumerate()
        .map(|(tile_col, tiles)| {
            let mut column = TileColumnDecoder::new(
                header, probs, modes, references, prev, &quantizers, tile_col,
            )?;
            column.decode(&tiles)?;
            Ok(column)
        })
        .collect();

    let mut columns = Vec::with_capacity(results.len());
    for result in results {
        columns.push(result?);
    }

    if columns.len() == 1 {
        let column = columns.pop().ok_or_else(|| Error::corrupted("no tile columns"))?;
        return Ok(DecodedTiles {
            frame: column.frame,
            grid: column.grid,
            counts: column.counts,
        });
    }

    let mut frame = aligned_frame_buffer(header)?;
    let mut grid = ModeInfoGrid::new(header.mi_rows(), header.mi_cols())?;
    let mut counts = SyntaxElementCounter::new();
    for column in &columns {
        for plane in 0..3 {
            let ssx = if plane > 0 && header.color.subsampling_x { 1 } else { 0 };
            let source = column.frame.plane(plane);
            let dest = frame.plane_mut(plane);
            let start = (column.columns_start * 8) >> ssx;
            let end = ((column.columns_end * 8) >> ssx).min(dest.width());
            for y in 0..dest.height() {
                dest.row_mut(y)[start..end].copy_from_slice(&source.row(y)[start..end]);
            }
        }
        grid.copy_columns(&column.grid, column.columns_start, column.columns_end);
        counts.merge_from(&column.counts);
    }

    Ok(DecodedTiles { frame, grid, counts })
}

// =============================================================================
// Tile Column Decoding
// =============================================================================

/// Candidate vectors for one reference slot of a block
#[derive(Debug, Clone, Copy, Default)]
struct MvCandidates {
    nearest: MotionVector,
    near: MotionVector,
    best: MotionVector,
}

/// Deduplicating list capped at two reference vector candidates
#[derive(Debug, Clone, Copy, Default)]
struct MvList {
    entries: [MotionVector; 2],
    len: usize,
}

impl MvList {
    fn push(&mut self, vector: MotionVector) {
        if self.len >= 2 {
            return;
        }
        if self.len == 1 && vector == self.entries[0] {
            return;
        }
        self.entries[self.len] = vector;
        self.len += 1;
    }
}

fn should_use_high_precision(vector: MotionVector) -> bool {
    (vector.row.abs() >> 3) < 8 && (vector.col.abs() >> 3) < 8
}

/// Decoder state for one column of tiles
///
/// Each column owns a full-size frame buffer and grid addressed with
/// absolute coordinates; only the column's span is copied out afterwards.
struct TileColumnDecoder<'a> {
    header: &'a FrameHeader,
    probs: &'a ProbabilityTables,
    modes: &'a FrameModes,
    references: &'a ReferenceFrameStore,
    prev: Option<&'a PrevFrameInfo>,
    quantizers: &'a SegmentQuantizers,
    columns_start: usize,
    columns_end: usize,
    frame: FrameBuffer,
    grid: ModeInfoGrid,
    partition_ctx: PartitionContexts,
    token_ctx: TokenContexts,
    above_seg_pred: Vec<bool>,
    left_seg_pred: [bool; 8],
    /// Inter mode context per reference frame, set by the candidate scan
    mode_context: [usize; 4],
    counts: SyntaxElementCounter,
    residual_tokens: Box<[i32; 1024]>,
}

impl<'a> TileColumnDecoder<'a> {
    #[allow(clippy::too_many_arguments)]
    fn new(
        header: &'a FrameHeader,
        probs: &'a ProbabilityTables,
        modes: &'a FrameModes,
        references: &'a ReferenceFrameStore,
        prev: Option<&'a PrevFrameInfo>,
        quantizers: &'a SegmentQuantizers,
        tile_col: usize,
    ) -> Result<Self> {
        let mi_cols = header.mi_cols();
        let columns_start = get_tile_offset(tile_col, mi_cols, header.tile_cols_log2);
        let columns_end = get_tile_offset(tile_col + 1, mi_cols, header.tile_cols_log2);
        let width_mi = columns_end.saturating_sub(columns_start);
        if width_mi == 0 {
            return Err(Error::corrupted("empty tile column"));
        }

        let ssx = header.color.subsampling_x as usize;
        let luma_cols_4x4 = width_mi * 2;
        let chroma_cols_4x4 = luma_cols_4x4 >> ssx;
        let luma_offset = columns_start * 2;
        let chroma_offset = luma_offset >> ssx;

        Ok(TileColumnDecoder {
            header,
            probs,
            modes,
            references,
            prev,
            quantizers,
            columns_start,
            columns_end,
            frame: aligned_frame_buffer(header)?,
            grid: ModeInfoGrid::new(header.mi_rows(), mi_cols)?,
            partition_ctx: PartitionContexts::new(((width_mi + 7) >> 3) << 3, columns_start),
            token_ctx: TokenContexts::new(
                [luma_cols_4x4, chroma_cols_4x4, chroma_cols_4x4],
                [luma_offset, chroma_offset, chroma_offset],
            ),
            above_seg_pred: vec![false; width_mi],
            left_seg_pred: [false; 8],
            mode_context: [0; 4],
            counts: SyntaxElementCounter::new(),
            residual_tokens: Box::new([0; 1024]),
        })
    }

    fn decode(&mut self, tiles: &[Tile]) -> Result<()> {
        for tile in tiles {
            let mut decoder = BoolDecoder::new(tile.data)?;
            for mi_row in (tile.rows_start..tile.rows_end).step_by(8) {
                self.clear_left_contexts();
                for mi_col in (self.columns_start..self.columns_end).step_by(8) {
                    self.decode_partition(&mut decoder, mi_row, mi_col, BlockSize::Block64x64)?;
                }
            }
            decoder.finish()?;
        }
        Ok(())
    }

    fn clear_left_contexts(&mut self) {
        self.partition_ctx.clear_left();
        self.token_ctx.clear_left();
        self.left_seg_pred = [false; 8];
    }

    fn decode_partition(
        &mut self,
        decoder: &mut BoolDecoder,
        mi_row: usize,
        mi_col: usize,
        size: BlockSize,
    ) -> Result<()> {
        let mi_rows = self.grid.rows();
        let mi_cols = self.grid.cols();
        if mi_row >= mi_rows || mi_col >= mi_cols {
            return Ok(());
        }

        let half = size.width_mi() >> 1;
        let has_rows = mi_row + half < mi_rows;
        let has_cols = mi_col + half < mi_cols;
        let ctx = self.partition_ctx.context(mi_row, mi_col, size);
        let node_probs = if self.header.is_intra() {
            &KF_PARTITION_PROBS[ctx]
        } else {
            &self.probs.partition[ctx]
        };
        let partition =
            tree::read_partition(decoder, node_probs, &mut self.counts, ctx, has_rows, has_cols);

        let subsize = get_subsize(size, partition);
        if subsize.is_sub_8x8() || partition == Partition::None {
            self.decode_block(decoder, mi_row, mi_col, subsize)?;
        } else {
            match partition {
                Partition::Horizontal => {
                    self.decode_block(decoder, mi_row, mi_col, subsize)?;
                    if has_rows {
                        self.decode_block(decoder, mi_row + half, mi_col, subsize)?;
                    }
                }
                Partition::Vertical => {
                    self.decode_block(decoder, mi_row, mi_col, subsize)?;
                    if has_cols {
                        self.decode_block(decoder, mi_row, mi_col + half, subsize)?;
                    }
                }
                Partition::Split => {
                    self.decode_partition(decoder, mi_row, mi_col, subsize)?;
                    self.decode_partition(decoder, mi_row, mi_col + half, subsize)?;
                    self.decode_partition(decoder, mi_row + half, mi_col, subsize)?;
                    self.decode_partition(decoder, mi_row + half, mi_col + half, subsize)?;
                }
                Partition::None => unreachable!(),
            }
        }

        if size == BlockSize::Block8x8 || partition != Partition::Split {
            self.partition_ctx.update(mi_row, mi_col, subsize, size);
        }
        Ok(())
    }

    fn decode_block(
        &mut self,
        decoder: &mut BoolDecoder,
        mi_row: usize,
        mi_col: usize,
        size: BlockSize,
    ) -> Result<()> {
        let above = if mi_row > 0 {
            self.grid.get(mi_row - 1, mi_col).copied()
        } else {
            None
        };
        let left = if mi_col > self.columns_start {
            self.grid.get(mi_row, mi_col - 1).copied()
        } else {
            None
        };
        let has_above = above.is_some();
        let has_left = left.is_some();

        let mut info = {
            let nb = Neighbors::new(above.as_ref(), left.as_ref());
            if self.header.is_intra() {
                self.intra_frame_mode_info(decoder, &nb, size)
            } else {
                self.inter_frame_mode_info(decoder, &nb, mi_row, mi_col, size)?
            }
        };

        let had_tokens = self.residual(decoder, &info, mi_row, mi_col, has_above, has_left)?;
        if info.is_inter && !size.is_sub_8x8() && !had_tokens {
            info.skip = true;
        }
        self.grid.fill_block(mi_row, mi_col, &info);
        Ok(())
    }

    // =========================================================================
    // Mode Info
    // =========================================================================

    fn read_skip_flag(&mut self, decoder: &mut BoolDecoder, nb: &Neighbors, segment_id: u8) -> bool {
        if self.header.segmentation.segment_forces_skip(segment_id) {
            return true;
        }
        let ctx = tree::skip_context(nb);
        tree::read_skip(decoder, self.probs, &mut self.counts, ctx)
    }

    fn intra_frame_mode_info(
        &mut self,
        decoder: &mut BoolDecoder,
        nb: &Neighbors,
        size: BlockSize,
    ) -> BlockInfo {
        let mut info = BlockInfo {
            block_size: size,
            ref_frames: [ReferenceFrame::Intra; 2],
            ..BlockInfo::default()
        };

        let seg = &self.header.segmentation;
        info.segment_id = if seg.enabled && seg.update_map {
            tree::read_segment_id(decoder, &seg.tree_probs)
        } else {
            0
        };
        info.skip = self.read_skip_flag(decoder, nb, info.segment_id);
        info.tx_size = tree::read_tx_size(
            decoder,
            self.probs,
            &mut self.counts,
            tree::tx_size_context(nb, size.max_tx_size()),
            self.modes.tx_mode,
            size.max_tx_size(),
            true,
        );

        if !size.is_sub_8x8() {
            let above_mode = nb.above.map(|b| b.sub_modes[2]).unwrap_or(PredictionMode::DcPred);
            let left_mode = nb.left.map(|b| b.sub_modes[1]).unwrap_or(PredictionMode::DcPred);
            let node_probs = kf_y_mode_probs(above_mode as usize, left_mode as usize);
            let mode = tree::read_kf_y_mode(decoder, &node_probs);
            info.sub_modes = [mode; 4];
        } else {
            let w = size.width_4x4();
            let h = size.height_4x4();
            let mut idy = 0;
            while idy < 2 {
                let mut idx = 0;
                while idx < 2 {
                    let b = idy * 2 + idx;
                    let above_mode = if idy > 0 {
                        info.sub_modes[b - 2]
                    } else {
                        nb.above
                            .map(|blk| blk.sub_modes[2 + idx])
                            .unwrap_or(PredictionMode::DcPred)
                    };
                    let left_mode = if idx > 0 {
                        info.sub_modes[b - 1]
                    } else {
                        nb.left
                            .map(|blk| blk.sub_modes[1 + 2 * idy])
                            .unwrap_or(PredictionMode::DcPred)
                    };
                    let node_probs = kf_y_mode_probs(above_mode as usize, left_mode as usize);
                    let mode = tree::read_kf_y_mode(decoder, &node_probs);
                    for y in 0..h {
                        for x in 0..w {
                            info.sub_modes[(idy + y) * 2 + idx + x] = mode;
                        }
                    }
                    idx += w;
                }
                idy += h;
            }
        }
        info.y_mode = info.sub_modes[3];
        info.uv_mode = tree::read_kf_uv_mode(decoder, &KF_UV_MODE_PROBS[info.y_mode as usize]);
        info
    }

    fn inter_frame_mode_info(
        &mut self,
        decoder: &mut BoolDecoder,
        nb: &Neighbors,
        mi_row: usize,
        mi_col: usize,
        size: BlockSize,
    ) -> Result<BlockInfo> {
        let mut info = BlockInfo {
            block_size: size,
            ..BlockInfo::default()
        };

        info.segment_id = self.read_inter_segment_id(decoder, mi_row, mi_col, size);
        info.skip = self.read_skip_flag(decoder, nb, info.segment_id);

        let seg = &self.header.segmentation;
        info.is_inter = match seg.feature(info.segment_id, SEG_LVL_REF_FRAME) {
            Some(value) => value != 0,
            None => {
                let ctx = tree::is_inter_context(nb);
                tree::read_is_inter(decoder, self.probs, &mut self.counts, ctx)
            }
        };

        info.tx_size = tree::read_tx_size(
            decoder,
            self.probs,
            &mut self.counts,
            tree::tx_size_context(nb, size.max_tx_size()),
            self.modes.tx_mode,
            size.max_tx_size(),
            !info.skip || !info.is_inter,
        );

        if info.is_inter {
            self.inter_block_mode_info(decoder, nb, &mut info, mi_row, mi_col)?;
        } else {
            self.intra_block_mode_info(decoder, &mut info);
        }
        Ok(info)
    }

    /// Segment id for inter frames, possibly predicted from the previous
    /// frame's ids over the block footprint.
    fn read_inter_segment_id(
        &mut self,
        decoder: &mut BoolDecoder,
        mi_row: usize,
        mi_col: usize,
        size: BlockSize,
    ) -> u8 {
        let seg = &self.header.segmentation;
        if !seg.enabled {
            return 0;
        }
        let predicted = self.predicted_segment_id(mi_row, mi_col, size);
        if !seg.update_map {
            return predicted;
        }
        if !seg.temporal_update {
            return tree::read_segment_id(decoder, &seg.tree_probs);
        }

        let above_flag = self
            .above_seg_pred
            .get(mi_col - self.columns_start)
            .copied()
            .unwrap_or(false);
        let left_flag = self.left_seg_pred[mi_row & 7];
        let ctx = tree::seg_pred_context(above_flag, left_flag);
        let use_predicted = decoder.read_bool(seg.pred_probs[ctx]);
        let segment_id = if use_predicted {
            predicted
        } else {
            tree::read_segment_id(decoder, &seg.tree_probs)
        };

        for i in 0..size.width_mi() {
            if let Some(slot) = self.above_seg_pred.get_mut(mi_col - self.columns_start + i) {
                *slot = use_predicted;
            }
        }
        for i in 0..size.height_mi() {
            self.left_seg_pred[(mi_row + i) & 7] = use_predicted;
        }
        segment_id
    }

    fn predicted_segment_id(&self, mi_row: usize, mi_col: usize, size: BlockSize) -> u8 {
        let Some(prev) = self.prev else {
            return 0;
        };
        if !prev.matches_dimensions(self.grid.rows(), self.grid.cols()) {
            return 0;
        }
        let xmis = size.width_mi().min(self.grid.cols() - mi_col);
        let ymis = size.height_mi().min(self.grid.rows() - mi_row);
        let mut segment = 7u8;
        for y in 0..ymis {
            for x in 0..xmis {
                segment = segment.min(prev.segment_id(mi_row + y, mi_col + x));
            }
        }
        segment
    }

    fn intra_block_mode_info(&mut self, decoder: &mut BoolDecoder, info: &mut BlockInfo) {
        info.ref_frames = [ReferenceFrame::Intra; 2];
        let size = info.block_size;
        if !size.is_sub_8x8() {
            let group = SIZE_GROUP_LOOKUP[size as usize];
            let mode = tree::read_y_mode(decoder, self.probs, &mut self.counts, group);
            info.sub_modes = [mode; 4];
        } else {
            let w = size.width_4x4();
            let h = size.height_4x4();
            let mut idy = 0;
            while idy < 2 {
                let mut idx = 0;
                while idx < 2 {
                    let mode = tree::read_y_mode(decoder, self.probs, &mut self.counts, 0);
                    for y in 0..h {
                        for x in 0..w {
                            info.sub_modes[(idy + y) * 2 + idx + x] = mode;
                        }
                    }
                    idx += w;
                }
                idy += h;
            }
        }
        info.y_mode = info.sub_modes[3];
        info.uv_mode = tree::read_uv_mode(decoder, self.probs, &mut self.counts, info.y_mode);
    }

    fn inter_block_mode_info(
        &mut self,
        decoder: &mut BoolDecoder,
        nb: &Neighbors,
        info: &mut BlockInfo,
        mi_row: usize,
        mi_col: usize,
    ) -> Result<()> {
        self.read_ref_frames(decoder, nb, info)?;

        let mut candidates = [MvCandidates::default(); 2];
        let rmv = self.find_reference_motion_vectors(info, mi_row, mi_col, info.ref_frames[0], -1);
        candidates[0] = self.select_best_reference(info.block_size, mi_row, mi_col, rmv);
        if !info.single_reference() {
            let rmv =
                self.find_reference_motion_vectors(info, mi_row, mi_col, info.ref_frames[1], -1);
            candidates[1] = self.select_best_reference(info.block_size, mi_row, mi_col, rmv);
        }

        let seg_skip = self.header.segmentation.segment_forces_skip(info.segment_id);
        if seg_skip {
            info.y_mode = PredictionMode::ZeroMv;
        } else if !info.block_size.is_sub_8x8() {
            let ctx = self.mode_context[info.ref_frames[0] as usize];
            info.y_mode = tree::read_inter_mode(decoder, self.probs, &mut self.counts, ctx);
        }

        info.interp_filter = if self.header.interpolation_filter == InterpolationFilter::Switchable
        {
            let ctx = tree::interp_filter_context(nb);
            tree::read_interp_filter(decoder, self.probs, &mut self.counts, ctx)
        } else {
            self.header.interpolation_filter
        };

        if info.block_size.is_sub_8x8() && !seg_skip {
            let w = info.block_size.width_4x4();
            let h = info.block_size.height_4x4();
            let mut idy = 0;
            while idy < 2 {
                let mut idx = 0;
                while idx < 2 {
                    let b = idy * 2 + idx;
                    let ctx = self.mode_context[info.ref_frames[0] as usize];
                    info.y_mode =
                        tree::read_inter_mode(decoder, self.probs, &mut self.counts, ctx);
                    if info.y_mode == PredictionMode::NearestMv
                        || info.y_mode == PredictionMode::NearMv
                    {
                        self.append_sub8x8_mvs(info, mi_row, mi_col, b as i32, 0, &mut candidates[0]);
                        if !info.single_reference() {
                            self.append_sub8x8_mvs(
                                info,
                                mi_row,
                                mi_col,
                                b as i32,
                                1,
                                &mut candidates[1],
                            );
                        }
                    }
                    let pair = self.read_block_motion_vectors(decoder, info, &candidates);
                    for y in 0..h {
                        for x in 0..w {
                            info.mvs[(idy + y) * 2 + idx + x] = pair;
                        }
                    }
                    idx += w;
                }
                idy += h;
            }
        } else {
            let pair = self.read_block_motion_vectors(decoder, info, &candidates);
            info.mvs = [pair; 4];
        }
        Ok(())
    }

    fn read_ref_frames(
        &mut self,
        decoder: &mut BoolDecoder,
        nb: &Neighbors,
        info: &mut BlockInfo,
    ) -> Result<()> {
        let seg = &self.header.segmentation;
        if let Some(value) = seg.feature(info.segment_id, SEG_LVL_REF_FRAME) {
            let reference = match value {
                1 => ReferenceFrame::Last,
                2 => ReferenceFrame::Golden,
                3 => ReferenceFrame::AltRef,
                _ => ReferenceFrame::Intra,
            };
            info.ref_frames = [reference, ReferenceFrame::Intra];
            return Ok(());
        }

        let compound = match self.modes.reference_mode {
            ReferenceMode::Single => false,
            ReferenceMode::Compound => true,
            ReferenceMode::Select => {
                let fixed = self
                    .modes
                    .compound
                    .map(|c| c.fixed)
                    .unwrap_or(ReferenceFrame::AltRef);
                let ctx = tree::comp_mode_context(nb, fixed);
                tree::read_comp_mode(decoder, self.probs, &mut self.counts, ctx)
            }
        };

        if compound {
            let comp = self
                .modes
                .compound
                .ok_or_else(|| Error::corrupted("compound block without opposing references"))?;
            let ctx = tree::comp_ref_context(nb, &comp);
            let bit = tree::read_comp_ref(decoder, self.probs, &mut self.counts, ctx);
            let mut refs = [ReferenceFrame::Intra; 2];
            refs[1 - comp.var_ref_idx] = comp.fixed;
            refs[comp.var_ref_idx] = comp.variable[bit as usize];
            info.ref_frames = refs;
        } else {
            let p1 = tree::read_single_ref_bit(
                decoder,
                self.probs,
                &mut self.counts,
                tree::single_ref_p1_context(nb),
                0,
            );
            let reference = if p1 {
                let p2 = tree::read_single_ref_bit(
                    decoder,
                    self.probs,
                    &mut self.counts,
                    tree::single_ref_p2_context(nb),
                    1,
                );
                if p2 {
                    ReferenceFrame::AltRef
                } else {
                    ReferenceFrame::Golden
                }
            } else {
                ReferenceFrame::Last
            };
            info.ref_frames = [reference, ReferenceFrame::Intra];
        }
        Ok(())
    }

    /// assign_mv: pick or read the final vector pair for the current mode
    fn read_block_motion_vectors(
        &mut self,
        decoder: &mut BoolDecoder,
        info: &BlockInfo,
        candidates: &[MvCandidates; 2],
    ) -> [MotionVector; 2] {
        let mut pair = [MotionVector::zero(); 2];
        let count = if info.single_reference() { 1 } else { 2 };
        for (i, out) in pair.iter_mut().take(count).enumerate() {
            *out = match info.y_mode {
                PredictionMode::NewMv => tree::read_mv(
                    decoder,
                    self.probs,
                    &mut self.counts,
                    candidates[i].best,
                    self.header.allow_high_precision_mv,
                ),
                PredictionMode::NearestMv => candidates[i].nearest,
                PredictionMode::NearMv => candidates[i].near,
                _ => MotionVector::zero(),
            };
        }
        pair
    }

    // =========================================================================
    // Motion Vector Candidates
    // =========================================================================

    fn is_inside(&self, row: i32, col: i32) -> bool {
        row >= 0
            && (row as usize) < self.grid.rows()
            && col >= self.columns_start as i32
            && (col as usize) < self.columns_end
    }

    fn use_prev_frame_mvs(&self) -> bool {
        self.header.use_prev_frame_mvs
            && self
                .prev
                .map(|p| p.matches_dimensions(self.grid.rows(), self.grid.cols()))
                .unwrap_or(false)
    }

    /// Reference and primary vector of a neighbor in the current or the
    /// previous frame's grid
    fn candidate_reference(
        &self,
        row: usize,
        col: usize,
        ref_index: usize,
        use_prev: bool,
    ) -> (ReferenceFrame, MotionVector) {
        if use_prev {
            if let Some((refs, mvs)) = self.prev.and_then(|p| p.mv(row, col)) {
                return (refs[ref_index], mvs[ref_index]);
            }
            return (ReferenceFrame::Intra, MotionVector::zero());
        }
        match self.grid.get(row, col) {
            Some(info) => (info.ref_frames[ref_index], info.primary_mvs()[ref_index]),
            None => (ReferenceFrame::Intra, MotionVector::zero()),
        }
    }

    fn add_if_same_reference(
        &self,
        row: usize,
        col: usize,
        reference: ReferenceFrame,
        list: &mut MvList,
        use_prev: bool,
    ) {
        for ref_index in 0..2 {
            let (candidate_ref, vector) = self.candidate_reference(row, col, ref_index, use_prev);
            if candidate_ref == reference {
                list.push(vector);
                return;
            }
        }
    }

    fn add_if_different_reference(
        &self,
        row: usize,
        col: usize,
        reference: ReferenceFrame,
        list: &mut MvList,
        use_prev: bool,
    ) {
        let sign_bias = |r: ReferenceFrame| self.header.ref_frame_sign_bias[r.ref_index()];
        let adjust = |r: ReferenceFrame, v: MotionVector| {
            if sign_bias(r) != sign_bias(reference) {
                MotionVector::new(-v.row, -v.col)
            } else {
                v
            }
        };

        let (first_ref, first_vector) = self.candidate_reference(row, col, 0, use_prev);
        if !first_ref.is_intra() && first_ref != reference {
            list.push(adjust(first_ref, first_vector));
        }
        let (second_ref, second_vector) = self.candidate_reference(row, col, 1, use_prev);
        if !second_ref.is_intra() && second_ref != reference && second_vector != first_vector {
            list.push(adjust(second_ref, second_vector));
        }
    }

    fn clamp_mv_near_block(
        &self,
        size: BlockSize,
        mi_row: usize,
        mi_col: usize,
        vector: MotionVector,
        border: i32,
    ) -> MotionVector {
        let bh = size.height_mi() as i32;
        let bw = size.width_mi() as i32;
        let to_top = -8 * (mi_row as i32 * 8);
        let to_bottom = 8 * ((self.grid.rows() as i32 - bh - mi_row as i32) * 8);
        let to_left = -8 * (mi_col as i32 * 8);
        let to_right = 8 * ((self.grid.cols() as i32 - bw - mi_col as i32) * 8);
        vector.clamped(
            to_top - border,
            to_bottom + border,
            to_left - border,
            to_right + border,
        )
    }

    /// find_mv_refs: scan spatial neighbors and the previous frame for up
    /// to two candidate vectors, recording the inter mode context.
    fn find_reference_motion_vectors(
        &mut self,
        info: &BlockInfo,
        mi_row: usize,
        mi_col: usize,
        reference: ReferenceFrame,
        block: i32,
    ) -> (MotionVector, MotionVector) {
        let size = info.block_size;
        let offsets = &MV_REF_BLOCKS[size as usize];
        let mut list = MvList::default();
        let mut different_ref_found = false;
        let mut context_counter = 0usize;

        for offset in offsets.iter().take(2) {
            let row = mi_row as i32 + offset.0 as i32;
            let col = mi_col as i32 + offset.1 as i32;
            if !self.is_inside(row, col) {
                continue;
            }
            different_ref_found = true;
            let Some(candidate) = self.grid.get(row as usize, col as usize) else {
                continue;
            };
            context_counter += MODE_2_COUNTER[candidate.y_mode as usize] as usize;

            for ref_index in 0..2 {
                if candidate.ref_frames[ref_index] == reference {
                    // get_sub_block_mv: prefer the vector of the sub block
                    // nearest this block.
                    let index = if block >= 0 {
                        SUB8X8_MV_CANDIDATE_SUBBLOCKS[block as usize][(offset.1 == 0) as usize]
                    } else {
                        3
                    };
                    list.push(candidate.mvs[index][ref_index]);
                    break;
                }
            }
        }
        self.mode_context[reference as usize] =
            COUNTER_TO_CONTEXT[context_counter.min(COUNTER_TO_CONTEXT.len() - 1)] as usize;

        for offset in offsets.iter().skip(2) {
            let row = mi_row as i32 + offset.0 as i32;
            let col = mi_col as i32 + offset.1 as i32;
            if self.is_inside(row, col) {
                different_ref_found = true;
                self.add_if_same_reference(row as usize, col as usize, reference, &mut list, false);
            }
        }
        if self.use_prev_frame_mvs() {
            self.add_if_same_reference(mi_row, mi_col, reference, &mut list, true);
        }

        if different_ref_found {
            for offset in offsets.iter() {
                let row = mi_row as i32 + offset.0 as i32;
                let col = mi_col as i32 + offset.1 as i32;
                if self.is_inside(row, col) {
                    self.add_if_different_reference(
                        row as usize,
                        col as usize,
                        reference,
                        &mut list,
                        false,
                    );
                }
            }
        }
        if self.use_prev_frame_mvs() {
            self.add_if_different_reference(mi_row, mi_col, reference, &mut list, true);
        }

        let primary = self.clamp_mv_near_block(size, mi_row, mi_col, list.entries[0], MV_BORDER);
        let secondary = self.clamp_mv_near_block(size, mi_row, mi_col, list.entries[1], MV_BORDER);
        (primary, secondary)
    }

    /// find_best_ref_mvs: lower precision when high-precision vectors are
    /// not in use and clamp the candidates near the visible frame.
    fn select_best_reference(
        &self,
        size: BlockSize,
        mi_row: usize,
        mi_col: usize,
        rmv: (MotionVector, MotionVector),
    ) -> MvCandidates {
        let adjust = |vector: MotionVector| {
            let mut row = vector.row;
            let mut col = vector.col;
            if !self.header.allow_high_precision_mv || !should_use_high_precision(vector) {
                if row & 1 != 0 {
                    row += if row > 0 { -1 } else { 1 };
                }
                if col & 1 != 0 {
                    col += if col > 0 { -1 } else { 1 };
                }
            }
            self.clamp_mv_near_block(
                size,
                mi_row,
                mi_col,
                MotionVector::new(row, col),
                BEST_MV_BORDER,
            )
        };
        let nearest = adjust(rmv.0);
        MvCandidates {
            nearest,
            near: adjust(rmv.1),
            best: nearest,
        }
    }

    /// append_sub8x8_mvs: seed the nearest/near candidates of one sub block
    /// from earlier sub blocks and the block-level scan.
    fn append_sub8x8_mvs(
        &mut self,
        info: &BlockInfo,
        mi_row: usize,
        mi_col: usize,
        block: i32,
        ref_index: usize,
        candidates: &mut MvCandidates,
    ) {
        let rmv = self.find_reference_motion_vectors(
            info,
            mi_row,
            mi_col,
            info.ref_frames[ref_index],
            block,
        );
        let mut list = MvList::default();
        match block {
            0 => {
                list.entries[0] = rmv.0;
                list.entries[1] = rmv.1;
                list.len = 2;
            }
            1 | 2 => {
                list.entries[0] = info.mvs[0][ref_index];
                list.len = 1;
            }
            _ => {
                list.entries[0] = info.mvs[2][ref_index];
                list.len = 1;
                for index in [1usize, 0] {
                    if list.len >= 2 {
                        break;
                    }
                    let vector = info.mvs[index][ref_index];
                    if vector != list.entries[0] {
                        list.entries[list.len] = vector;
                        list.len += 1;
                    }
                }
            }
        }
        for vector in [rmv.0, rmv.1] {
            if list.len >= 2 {
                break;
            }
            if vector != list.entries[0] {
                list.entries[list.len] = vector;
                list.len += 1;
            }
        }
        candidates.nearest = list.entries[0];
        candidates.near = list.entries[1];
    }

    // =========================================================================
    // Residual
    // =========================================================================

    /// Predict and reconstruct every plane of a block, returning whether any
    /// transform block carried non-zero tokens.
    fn residual(
        &mut self,
        decoder: &mut BoolDecoder,
        info: &BlockInfo,
        mi_row: usize,
        mi_col: usize,
        has_above: bool,
        has_left: bool,
    ) -> Result<bool> {
        let mut block_had_tokens = false;
        // Sub-8x8 blocks still cover a full mode-info cell.
        let footprint = if info.block_size.is_sub_8x8() {
            BlockSize::Block8x8
        } else {
            info.block_size
        };
        let bit_depth = self.header.color.bit_depth;

        for plane in 0..3 {
            let ssx = (plane > 0 && self.header.color.subsampling_x) as usize;
            let ssy = (plane > 0 && self.header.color.subsampling_y) as usize;
            let num_4x4_w = (footprint.width_4x4() >> ssx).max(1);
            let num_4x4_h = (footprint.height_4x4() >> ssy).max(1);
            let tx_size = if plane == 0 {
                info.tx_size
            } else {
                uv_tx_size(info.tx_size, num_4x4_w, num_4x4_h)
            };
            let tx_sb = tx_size.size() / 4;

            let base_x = (mi_col * 8) >> ssx;
            let base_y = (mi_row * 8) >> ssy;

            if info.is_inter {
                if info.block_size.is_sub_8x8() {
                    for y in 0..num_4x4_h {
                        for x in 0..num_4x4_w {
                            predict::predict_inter(
                                &mut self.frame,
                                self.references,
                                self.header,
                                info,
                                plane,
                                mi_row,
                                mi_col,
                                base_x + 4 * x,
                                base_y + 4 * y,
                                4,
                                4,
                                y * num_4x4_w + x,
                            )?;
                        }
                    }
                } else {
                    predict::predict_inter(
                        &mut self.frame,
                        self.references,
                        self.header,
                        info,
                        plane,
                        mi_row,
                        mi_col,
                        base_x,
                        base_y,
                        num_4x4_w * 4,
                        num_4x4_h * 4,
                        0,
                    )?;
                }
            }

            let (plane_width, plane_height) = self.frame.plane_size(plane);
            let sb_rows_4x4 = 16 >> ssy;
            let row_in_sb_base = (base_y / 4) % sb_rows_4x4;

            let mut sub_block_index = 0;
            let mut y = 0;
            while y < num_4x4_h {
                let mut x = 0;
                while x < num_4x4_w {
                    let tx_x = base_x + 4 * x;
                    let tx_y = base_y + 4 * y;
                    let mut had_tokens = false;
                    if tx_x < plane_width && tx_y < plane_height {
                        if !info.is_inter {
                            let mode = predict::intra_mode_for_block(info, plane, sub_block_index);
                            predict::predict_intra(
                                self.frame.plane_mut(plane),
                                mode,
                                tx_x,
                                tx_y,
                                has_above || y > 0,
                                has_left || x > 0,
                                (x + tx_sb) < num_4x4_w,
                                tx_size,
                                bit_depth,
                            )?;
                        }
                        if !info.skip {
                            let tx_type = select_transform_type(
                                info,
                                plane,
                                tx_size,
                                sub_block_index,
                                self.header.lossless,
                            );
                            had_tokens = self.read_tokens(
                                decoder,
                                plane,
                                tx_size,
                                tx_type,
                                info.is_inter,
                                tx_x / 4,
                                row_in_sb_base + y,
                            );
                            block_had_tokens |= had_tokens;
                            reconstruct(
                                self.frame.plane_mut(plane),
                                plane,
                                &self.residual_tokens[..tx_size.num_coeffs()],
                                self.quantizers.for_segment(info.segment_id),
                                tx_x,
                                tx_y,
                                tx_size,
                                tx_type,
                                self.header.lossless,
                                bit_depth,
                            )?;
                        }
                    }
                    self.token_ctx
                        .update(plane, tx_x / 4, row_in_sb_base + y, tx_size, had_tokens);
                    sub_block_index += 1;
                    x += tx_sb;
                }
                y += tx_sb;
            }
        }
        Ok(block_had_tokens)
    }

    /// Decode the coefficient tokens of one transform block into
    /// `residual_tokens`, returning whether any token was present.
    fn read_tokens(
        &mut self,
        decoder: &mut BoolDecoder,
        plane: usize,
        tx_size: TxSize,
        tx_type: TxType,
        is_inter: bool,
        col_4x4: usize,
        row_4x4_in_sb: usize,
    ) -> bool {
        let coeff_count = tx_size.num_coeffs();
        self.residual_tokens[..coeff_count].fill(0);
        let mut token_cache = [0u8; 1024];

        let scan = scan_order(tx_size, tx_type);
        let size = tx_size.size();
        let tx_index = tx_size as usize;
        let plane_type = (plane > 0) as usize;
        let inter = is_inter as usize;
        let bit_depth = self.header.color.bit_depth;

        let mut check_more = true;
        let mut coef_index = 0usize;
        while coef_index < coeff_count {
            let band = if tx_size == TxSize::Tx4x4 {
                COEFBAND_4X4[coef_index]
            } else {
                COEFBAND_8X8PLUS[coef_index]
            } as usize;
            let position = scan[coef_index] as usize;
            let ctx = if coef_index == 0 {
                self.token_ctx.context(plane, col_4x4, row_4x4_in_sb, tx_size)
            } else {
                let row = position / size;
                let col = position % size;
                let (n0, n1) = if row > 0 && col > 0 {
                    (position - size, position - 1)
                } else if row == 0 {
                    (position - 1, position - 1)
                } else {
                    (position - size, position - size)
                };
                (1 + token_cache[n0] as usize + token_cache[n1] as usize) >> 1
            };
            let node = self.probs.coef[tx_index][plane_type][inter][band][ctx];

            if check_more {
                let more = decoder.read_bool(node[0]);
                self.counts.coef_more[tx_index][plane_type][inter][band][ctx]
                    [more as usize] += 1;
                if !more {
                    break;
                }
            }

            let value = if !decoder.read_bool(node[1]) {
                self.counts.coef_token[tx_index][plane_type][inter][band][ctx][0] += 1;
                token_cache[position] = TOKEN_ENERGY_CLASS[0];
                check_more = false;
                coef_index += 1;
                continue;
            } else if !decoder.read_bool(node[2]) {
                self.counts.coef_token[tx_index][plane_type][inter][band][ctx][1] += 1;
                token_cache[position] = TOKEN_ENERGY_CLASS[1];
                check_more = true;
                read_coef_value(decoder, bit_depth, 1)
            } else {
                self.counts.coef_token[tx_index][plane_type][inter][band][ctx][2] += 1;
                let token = tree::read_coef_tail(decoder, node[2]);
                token_cache[position] = TOKEN_ENERGY_CLASS[token];
                check_more = true;
                read_coef_value(decoder, bit_depth, token)
            };
            self.residual_tokens[position] = value;
            coef_index += 1;
        }

        coef_index > 0
    }
}

/// Largest transform fitting a chroma block, limited by the luma selection
fn uv_tx_size(tx_size: TxSize, num_4x4_w: usize, num_4x4_h: usize) -> TxSize {
    let limit = num_4x4_w.min(num_4x4_h);
    let largest = if limit >= 8 {
        TxSize::Tx32x32
    } else if limit >= 4 {
        TxSize::Tx16x16
    } else if limit >= 2 {
        TxSize::Tx8x8
    } else {
        TxSize::Tx4x4
    };
    tx_size.min(largest)
}

/// Row/column transform pair for one transform block
fn select_transform_type(
    info: &BlockInfo,
    plane: usize,
    tx_size: TxSize,
    block_index: usize,
    lossless: bool,
) -> TxType {
    if plane > 0 || tx_size == TxSize::Tx32x32 {
        return TxType::DctDct;
    }
    if tx_size == TxSize::Tx4x4 {
        if lossless || info.is_inter {
            return TxType::DctDct;
        }
        let mode = if info.block_size.is_sub_8x8() {
            info.sub_modes[block_index]
        } else {
            info.y_mode
        };
        return intra_mode_to_tx_type(mode);
    }
    if info.is_inter {
        TxType::DctDct
    } else {
        intra_mode_to_tx_type(info.y_mode)
    }
}

/// Decode the magnitude and sign of one coefficient token
fn read_coef_value(decoder: &mut BoolDecoder, bit_depth: u8, token: usize) -> i32 {
    let (mut value, extra_probs): (i32, &[u8]) = match token {
        1 => (1, &[]),
        2 => (2, &[]),
        3 => (3, &[]),
        4 => (4, &[]),
        5 => (CAT_BASE[0], &CAT1_PROBS),
        6 => (CAT_BASE[1], &CAT2_PROBS),
        7 => (CAT_BASE[2], &CAT3_PROBS),
        8 => (CAT_BASE[3], &CAT4_PROBS),
        9 => (CAT_BASE[4], &CAT5_PROBS),
        _ => (CAT_BASE[5], &CAT6_PROBS),
    };

    if token == 10 && bit_depth > 8 {
        for e in 0..(bit_depth - 8) as i32 {
            let high_bit = decoder.read_bool(255) as i32;
            value += high_bit << (5 + bit_depth as i32 - e);
        }
    }
    let num_extra = extra_probs.len();
    for (e, &prob) in extra_probs.iter().enumerate() {
        let bit = decoder.read_bool(prob) as i32;
        value += bit << (num_extra - 1 - e);
    }

    if decoder.read_literal(1) == 1 {
        -value
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{ColorConfig, ResetFrameContext};
    use crate::tables::{FrameType, Profile};

    fn test_frame_header(width: u32, height: u32) -> FrameHeader {
        FrameHeader {
            profile: Profile::Profile0,
            frame_type: FrameType::KeyFrame,
            intra_only: false,
            show_frame: true,
            error_resilient_mode: false,
            color: ColorConfig::default(),
            width,
            height,
            render_width: width,
            render_height: height,
            refresh_frame_flags: 0xFF,
            ref_frame_indices: [0; 3],
            ref_frame_sign_bias: [false; 3],
            allow_high_precision_mv: false,
            interpolation_filter: InterpolationFilter::EightTap,
            refresh_frame_context: false,
            frame_parallel_decoding_mode: true,
            frame_context_idx: 0,
            reset_frame_context: ResetFrameContext::All,
            use_prev_frame_mvs: false,
            loop_filter: Default::default(),
            quant: Default::default(),
            lossless: true,
            segmentation: Default::default(),
            tile_cols_log2: 0,
            tile_rows_log2: 0,
            header_size_in_bytes: 1,
            uncompressed_header_size_in_bytes: 0,
        }
    }

    #[test]
    fn test_tile_offsets_cover_frame() {
        // 100 mode-info units, two tile columns.
        assert_eq!(get_tile_offset(0, 100, 1), 0);
        assert_eq!(get_tile_offset(1, 100, 1), 48);
        assert_eq!(get_tile_offset(2, 100, 1), 100);
        // A single tile spans everything.
        assert_eq!(get_tile_offset(0, 8, 0), 0);
        assert_eq!(get_tile_offset(1, 8, 0), 8);
    }

    #[test]
    fn test_uv_tx_size_limits() {
        assert_eq!(uv_tx_size(TxSize::Tx32x32, 4, 4), TxSize::Tx16x16);
        assert_eq!(uv_tx_size(TxSize::Tx8x8, 1, 1), TxSize::Tx4x4);
        assert_eq!(uv_tx_size(TxSize::Tx4x4, 8, 8), TxSize::Tx4x4);
    }

    #[test]
    fn test_compressed_header_without_updates() {
        // An all-zero bool stream leaves every update gate closed.
        let header = test_frame_header(64, 64);
        let mut probs = ProbabilityTables::default();
        let reference = ProbabilityTables::default();
        let modes = parse_compressed_header(&[0x00, 0x00], &header, &mut probs).unwrap();
        assert_eq!(modes.tx_mode, TxMode::Only4x4);
        assert_eq!(modes.reference_mode, ReferenceMode::Single);
        assert_eq!(probs.skip, reference.skip);
        assert_eq!(probs.partition, reference.partition);
    }

    #[test]
    fn test_decode_zero_stream_keyframe() {
        // A zero bool stream yields one unpartitioned 64x64 DC-predicted
        // block with an immediate end-of-block in every transform.
        let header = test_frame_header(64, 64);
        let probs = ProbabilityTables::default();
        let modes = FrameModes::intra_defaults(&header);
        let references = ReferenceFrameStore::new();
        let data = [0u8; 64];

        let decoded =
            decode_tiles(&header, &data, &probs, &modes, &references, None).unwrap();
        assert_eq!(decoded.frame.plane(0).width(), 64);
        assert_eq!(decoded.frame.plane(0).get(0, 0), 128);
        assert_eq!(decoded.frame.plane(0).get(63, 63), 128);
        assert_eq!(decoded.frame.plane(1).get(15, 15), 128);

        let info = decoded.grid.get(0, 0).unwrap();
        assert_eq!(info.block_size, BlockSize::Block64x64);
        assert!(!info.is_inter);
        assert_eq!(info.tx_size, TxSize::Tx4x4);

        // One block, one skip decision.
        let skips: u32 = decoded.counts.skip.iter().map(|c| c[0] + c[1]).sum();
        assert_eq!(skips, 1);
    }

    #[test]
    fn test_edge_superblocks_use_restricted_partitions() {
        // 72x72 leaves one mode-info column and row past the last full
        // superblock; edge superblocks must narrow toward the frame edge
        // and the corner must split without reading any partition bits.
        let header = test_frame_header(72, 72);
        let probs = ProbabilityTables::default();
        let modes = FrameModes::intra_defaults(&header);
        let references = ReferenceFrameStore::new();
        let data = [0u8; 64];

        let decoded =
            decode_tiles(&header, &data, &probs, &modes, &references, None).unwrap();
        assert_eq!(decoded.grid.get(0, 0).unwrap().block_size, BlockSize::Block64x64);
        assert_eq!(decoded.grid.get(0, 8).unwrap().block_size, BlockSize::Block32x64);
        assert_eq!(decoded.grid.get(8, 0).unwrap().block_size, BlockSize::Block64x32);
        assert_eq!(decoded.grid.get(8, 8).unwrap().block_size, BlockSize::Block8x8);
    }

    #[test]
    fn test_decode_tiles_rejects_truncated_prefix() {
        let mut header = test_frame_header(256, 64);
        header.tile_cols_log2 = 1;
        let probs = ProbabilityTables::default();
        let modes = FrameModes::intra_defaults(&header);
        let references = ReferenceFrameStore::new();
        // First tile claims more data than the buffer holds.
        let data = [0x00, 0x00, 0x10, 0x00, 0x00];
        let result = decode_tiles(&header, &data, &probs, &modes, &references, None);
        assert!(matches!(result, Err(Error::Corrupted(_))));
    }

    #[test]
    fn test_select_transform_type_rules() {
        let mut info = BlockInfo {
            block_size: BlockSize::Block16x16,
            y_mode: PredictionMode::VPred,
            ..BlockInfo::default()
        };
        assert_eq!(
            select_transform_type(&info, 0, TxSize::Tx8x8, 0, false),
            TxType::AdstDct
        );
        // Chroma and 32x32 always use DCT in both directions.
        assert_eq!(
            select_transform_type(&info, 1, TxSize::Tx8x8, 0, false),
            TxType::DctDct
        );
        assert_eq!(
            select_transform_type(&info, 0, TxSize::Tx32x32, 0, false),
            TxType::DctDct
        );
        info.is_inter = true;
        assert_eq!(
            select_transform_type(&info, 0, TxSize::Tx4x4, 0, false),
            TxType::DctDct
        );
    }
}
