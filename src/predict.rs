//! Intra and inter sample prediction
//!
//! Intra prediction builds each transform block from its reconstructed
//! neighbors. Inter prediction samples a stored reference frame through the
//! eight-tap subpel filters, with optional scaling when the reference frame
//! has a different size than the current frame.

use crate::context::BlockInfo;
use crate::error::{Error, Result};
use crate::frame::{FrameBuffer, Plane, ReferenceFrameStore};
use crate::header::FrameHeader;
use crate::tables::{BlockSize, MotionVector, PredictionMode, TxSize, MI_SIZE};

/// Fractional motion vector precision of the prediction filters
pub const SUBPEL_BITS: u32 = 4;

pub const SUBPEL_SHIFTS: i32 = 16;

pub const SUBPEL_MASK: i32 = 15;

/// Fixed-point shift used for reference frame scale factors
pub const REF_SCALE_SHIFT: u32 = 14;

/// Extra samples needed on each side of a block by the eight-tap filters
pub const INTERP_EXTEND: i32 = 4;

/// Largest subpel step allowed by the reference scaling limits
pub const MAX_SCALED_STEP: i32 = 80;

const SAMPLE_OFFSET: i64 = 3;

/// Clip a reconstructed value to the sample range of the bit depth
#[inline]
pub fn clip_bd(bit_depth: u8, value: i32) -> u16 {
    value.clamp(0, (1 << bit_depth) - 1) as u16
}

#[inline]
fn round2(value: i32, bits: u32) -> i32 {
    (value + (1 << (bits - 1))) >> bits
}

// =============================================================================
// Intra Prediction
// =============================================================================

/// The intra mode covering the given plane and 4x4 sub-block
pub fn intra_mode_for_block(
    block: &BlockInfo,
    plane: usize,
    block_index: usize,
) -> PredictionMode {
    if plane > 0 {
        block.uv_mode
    } else if !block.block_size.is_sub_8x8() {
        block.y_mode
    } else {
        block.sub_modes[block_index]
    }
}

/// Predict one transform block from its decoded neighbors
///
/// `x` and `y` locate the block inside the plane. `have_above_right` reports
/// whether the samples above and to the right belong to an already decoded
/// block; they are only usable for 4x4 transforms.
#[allow(clippy::too_many_arguments)]
pub fn predict_intra(
    plane: &mut Plane,
    mode: PredictionMode,
    x: usize,
    y: usize,
    have_above: bool,
    have_left: bool,
    have_above_right: bool,
    tx_size: TxSize,
    bit_depth: u8,
) -> Result<()> {
    let size = tx_size.size();
    let max_x = plane.width() - 1;
    let max_y = plane.height() - 1;
    let half = 1i32 << (bit_depth - 1);

    // The row above the block extends to twice the block width for the
    // diagonal modes. Index 0 holds the top-left corner sample.
    let mut above_storage = [0u16; 2 * 32 + 1];
    let above_row = &mut above_storage[..2 * size + 1];
    let mut left_col = [0u16; 32];

    if have_above {
        for i in 0..size {
            above_row[1 + i] = plane.get((x + i).min(max_x), y - 1);
        }
        let extend = have_above_right && tx_size == TxSize::Tx4x4;
        for i in size..2 * size {
            above_row[1 + i] = if extend {
                plane.get((x + i).min(max_x), y - 1)
            } else {
                above_row[size]
            };
        }
        above_row[0] = if have_left {
            plane.get((x - 1).min(max_x), y - 1)
        } else {
            (half + 1) as u16
        };
    } else {
        for value in above_row.iter_mut() {
            *value = (half - 1) as u16;
        }
    }

    if have_left {
        for i in 0..size {
            left_col[i] = plane.get(x - 1, (y + i).min(max_y));
        }
    } else {
        for value in left_col.iter_mut().take(size) {
            *value = (half + 1) as u16;
        }
    }

    let above = |i: isize| above_storage[(i + 1) as usize] as i32;
    let left = |i: usize| left_col[i] as i32;

    let mut pred = [[0u16; 32]; 32];

    match mode {
        PredictionMode::VPred => {
            for i in 0..size {
                for j in 0..size {
                    pred[i][j] = above(j as isize) as u16;
                }
            }
        }
        PredictionMode::HPred => {
            for i in 0..size {
                for j in 0..size {
                    pred[i][j] = left(i) as u16;
                }
            }
        }
        PredictionMode::D207Pred => {
            for i in 0..size - 1 {
                pred[i][0] = round2(left(i) + left(i + 1), 1) as u16;
            }
            pred[size - 1][0] = left(size - 1) as u16;
            for i in 0..size - 2 {
                pred[i][1] = round2(left(i) + 2 * left(i + 1) + left(i + 2), 2) as u16;
            }
            pred[size - 2][1] = round2(left(size - 2) + 3 * left(size - 1), 2) as u16;
            pred[size - 1][1] = left(size - 1) as u16;
            for j in 2..size {
                pred[size - 1][j] = left(size - 1) as u16;
            }
            for i in (0..size - 1).rev() {
                for j in 2..size {
                    pred[i][j] = pred[i + 1][j - 2];
                }
            }
        }
        PredictionMode::D45Pred => {
            for i in 0..size {
                for j in 0..size {
                    pred[i][j] = if i + j + 2 < 2 * size {
                        let k = (i + j) as isize;
                        round2(above(k) + 2 * above(k + 1) + above(k + 2), 2) as u16
                    } else {
                        above(2 * size as isize - 1) as u16
                    };
                }
            }
        }
        PredictionMode::D63Pred => {
            for i in 0..size {
                for j in 0..size {
                    let k = (i / 2 + j) as isize;
                    pred[i][j] = if i & 1 != 0 {
                        round2(above(k) + 2 * above(k + 1) + above(k + 2), 2) as u16
                    } else {
                        round2(above(k) + above(k + 1), 1) as u16
                    };
                }
            }
        }
        PredictionMode::D117Pred => {
            for j in 0..size {
                pred[0][j] = round2(above(j as isize - 1) + above(j as isize), 1) as u16;
            }
            pred[1][0] = round2(left(0) + 2 * above(-1) + above(0), 2) as u16;
            for j in 1..size {
                pred[1][j] =
                    round2(above(j as isize - 2) + 2 * above(j as isize - 1) + above(j as isize), 2)
                        as u16;
            }
            pred[2][0] = round2(above(-1) + 2 * left(0) + left(1), 2) as u16;
            for i in 3..size {
                pred[i][0] = round2(left(i - 3) + 2 * left(i - 2) + left(i - 1), 2) as u16;
            }
            for i in 2..size {
                for j in 1..size {
                    pred[i][j] = pred[i - 2][j - 1];
                }
            }
        }
        PredictionMode::D135Pred => {
            pred[0][0] = round2(left(0) + 2 * above(-1) + above(0), 2) as u16;
            for j in 1..size {
                pred[0][j] =
                    round2(above(j as isize - 2) + 2 * above(j as isize - 1) + above(j as isize), 2)
                        as u16;
            }
            pred[1][0] = round2(above(-1) + 2 * left(0) + left(1), 2) as u16;
            for i in 2..size {
                pred[i][0] = round2(left(i - 2) + 2 * left(i - 1) + left(i), 2) as u16;
            }
            for i in 1..size {
                for j in 1..size {
                    pred[i][j] = pred[i - 1][j - 1];
                }
            }
        }
        PredictionMode::D153Pred => {
            pred[0][0] = round2(left(0) + above(-1), 1) as u16;
            for i in 1..size {
                pred[i][0] = round2(left(i - 1) + left(i), 1) as u16;
            }
            pred[0][1] = round2(left(0) + 2 * above(-1) + above(0), 2) as u16;
            pred[1][1] = round2(above(-1) + 2 * left(0) + left(1), 2) as u16;
            for i in 2..size {
                pred[i][1] = round2(left(i - 2) + 2 * left(i - 1) + left(i), 2) as u16;
            }
            for j in 2..size {
                pred[0][j] =
                    round2(above(j as isize - 3) + 2 * above(j as isize - 2) + above(j as isize - 1), 2)
                        as u16;
            }
            for i in 1..size {
                for j in 2..size {
                    pred[i][j] = pred[i - 1][j - 2];
                }
            }
        }
        PredictionMode::TmPred => {
            for i in 0..size {
                for j in 0..size {
                    let value = above(j as isize) + left(i) - above(-1);
                    pred[i][j] = clip_bd(bit_depth, value);
                }
            }
        }
        PredictionMode::DcPred => {
            let log2 = tx_size.log2() as u32;
            let dc = if have_above && have_left {
                let mut sum = 0i32;
                for k in 0..size {
                    sum += above(k as isize) + left(k);
                }
                (sum + size as i32) >> (log2 + 1)
            } else if have_left {
                let mut sum = 0i32;
                for k in 0..size {
                    sum += left(k);
                }
                (sum + (1 << (log2 - 1))) >> log2
            } else if have_above {
                let mut sum = 0i32;
                for k in 0..size {
                    sum += above(k as isize);
                }
                (sum + (1 << (log2 - 1))) >> log2
            } else {
                half
            };
            for i in 0..size {
                for j in 0..size {
                    pred[i][j] = dc as u16;
                }
            }
        }
        _ => return Err(Error::corrupted("inter mode in intra prediction")),
    }

    // Edge blocks keep only the samples inside the plane.
    let width_in_plane = size.min(max_x - x + 1);
    let height_in_plane = size.min(max_y - y + 1);
    for i in 0..height_in_plane {
        for j in 0..width_in_plane {
            plane.set(x + j, y + i, pred[i][j]);
        }
    }
    Ok(())
}

// =============================================================================
// Motion Vector Selection and Clamping
// =============================================================================

#[inline]
fn round_mv_comp_q2(value: i32) -> i32 {
    (if value < 0 { value - 1 } else { value + 1 }) / 2
}

#[inline]
fn round_mv_comp_q4(value: i32) -> i32 {
    (if value < 0 { value - 2 } else { value + 2 }) / 4
}

/// The motion vector covering a plane region of a block
///
/// Sub-8x8 chroma blocks cover several luma blocks, so their motion vector
/// is the rounded average of the covered luma vectors.
pub fn select_motion_vector(
    plane: usize,
    block: &BlockInfo,
    ref_index: usize,
    block_index: usize,
    subsampling_x: bool,
    subsampling_y: bool,
) -> MotionVector {
    let mv = |index: usize| block.mvs[index][ref_index];
    if plane == 0 || !block.block_size.is_sub_8x8() || (!subsampling_x && !subsampling_y) {
        return mv(block_index);
    }
    let average = |a: MotionVector, b: MotionVector| MotionVector {
        row: round_mv_comp_q2(a.row as i32 + b.row as i32) as i16,
        col: round_mv_comp_q2(a.col as i32 + b.col as i32) as i16,
    };
    if !subsampling_x {
        return average(mv(block_index), mv(block_index + 2));
    }
    if !subsampling_y {
        return average(mv(block_index), mv(block_index + 1));
    }
    let sum_row: i32 = (0..4).map(|i| mv(i).row as i32).sum();
    let sum_col: i32 = (0..4).map(|i| mv(i).col as i32).sum();
    MotionVector {
        row: round_mv_comp_q4(sum_row) as i16,
        col: round_mv_comp_q4(sum_col) as i16,
    }
}

/// Convert a motion vector to plane precision and clamp it near the frame edge
///
/// The result is in units of 1/16th of a sample of the given plane.
#[allow(clippy::too_many_arguments)]
pub fn clamp_motion_vector(
    block_size: BlockSize,
    mi_row: usize,
    mi_col: usize,
    mi_rows: usize,
    mi_cols: usize,
    subsampling_x: bool,
    subsampling_y: bool,
    vector: MotionVector,
) -> (i32, i32) {
    let ssx = subsampling_x as u32;
    let ssy = subsampling_y as u32;
    let blocks_wide = block_size.width_mi() as i32;
    let blocks_high = block_size.height_mi() as i32;

    let mb_to_top = -((mi_row * MI_SIZE) as i32 * 16) >> ssy;
    let mb_to_bottom = ((mi_cols_to_edge(mi_rows, blocks_high, mi_row)) * 16) >> ssy;
    let mb_to_left = -((mi_col * MI_SIZE) as i32 * 16) >> ssx;
    let mb_to_right = ((mi_cols_to_edge(mi_cols, blocks_wide, mi_col)) * 16) >> ssx;

    let subpel_left = (INTERP_EXTEND + ((blocks_wide * MI_SIZE as i32) >> ssx)) << SUBPEL_BITS;
    let subpel_right = subpel_left - SUBPEL_SHIFTS;
    let subpel_top = (INTERP_EXTEND + ((blocks_high * MI_SIZE as i32) >> ssy)) << SUBPEL_BITS;
    let subpel_bottom = subpel_top - SUBPEL_SHIFTS;

    let row = ((2 * vector.row as i32) >> ssy)
        .clamp(mb_to_top - subpel_top, mb_to_bottom + subpel_bottom);
    let col = ((2 * vector.col as i32) >> ssx)
        .clamp(mb_to_left - subpel_left, mb_to_right + subpel_right);
    (row, col)
}

#[inline]
fn mi_cols_to_edge(total_mi: usize, blocks: i32, position: usize) -> i32 {
    (total_mi as i32 - blocks - position as i32) * MI_SIZE as i32
}

// =============================================================================
// Inter Prediction
// =============================================================================

/// Scale factors and subpel steps for one reference frame
#[derive(Debug, Clone, Copy)]
struct ReferenceScaling {
    x_scale: i64,
    y_scale: i64,
    step_x: i32,
    step_y: i32,
}

fn reference_scaling(
    frame_width: usize,
    frame_height: usize,
    ref_width: usize,
    ref_height: usize,
) -> Result<ReferenceScaling> {
    if 2 * frame_width < ref_width || 2 * frame_height < ref_height {
        return Err(Error::corrupted(
            "frame size too small relative to reference frame",
        ));
    }
    if frame_width > 16 * ref_width || frame_height > 16 * ref_height {
        return Err(Error::corrupted(
            "frame size too large relative to reference frame",
        ));
    }
    let x_scale = ((ref_width as i64) << REF_SCALE_SHIFT) / frame_width as i64;
    let y_scale = ((ref_height as i64) << REF_SCALE_SHIFT) / frame_height as i64;
    let step_x = ((16 * x_scale) >> REF_SCALE_SHIFT) as i32;
    let step_y = ((16 * y_scale) >> REF_SCALE_SHIFT) as i32;
    if step_x > MAX_SCALED_STEP || step_y > MAX_SCALED_STEP {
        return Err(Error::corrupted("reference scaling step out of range"));
    }
    Ok(ReferenceScaling {
        x_scale,
        y_scale,
        step_x,
        step_y,
    })
}

/// Predict one region of a plane from the block's reference frames
///
/// Compound blocks average the predictions from both references. The region
/// is located at `(x, y)` in plane coordinates and may extend past the
/// visible frame on the right and bottom superblock edges.
#[allow(clippy::too_many_arguments)]
pub fn predict_inter(
    frame: &mut FrameBuffer,
    references: &ReferenceFrameStore,
    header: &FrameHeader,
    block: &BlockInfo,
    plane: usize,
    mi_row: usize,
    mi_col: usize,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    block_index: usize,
) -> Result<()> {
    let mut first = vec![0u16; width * height];
    predict_inter_block(
        frame,
        references,
        header,
        block,
        plane,
        0,
        mi_row,
        mi_col,
        x,
        y,
        width,
        height,
        block_index,
        &mut first,
    )?;

    let compound = !block.single_reference();
    let mut second = Vec::new();
    if compound {
        second = vec![0u16; width * height];
        predict_inter_block(
            frame,
            references,
            header,
            block,
            plane,
            1,
            mi_row,
            mi_col,
            x,
            y,
            width,
            height,
            block_index,
            &mut second,
        )?;
    }

    let target = frame.plane_mut(plane);
    let width_in_plane = width.min(target.width() - x);
    let height_in_plane = height.min(target.height() - y);
    for i in 0..height_in_plane {
        let row = target.row_mut(y + i);
        for j in 0..width_in_plane {
            row[x + j] = if compound {
                round2(
                    first[i * width + j] as i32 + second[i * width + j] as i32,
                    1,
                ) as u16
            } else {
                first[i * width + j]
            };
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn predict_inter_block(
    frame: &FrameBuffer,
    references: &ReferenceFrameStore,
    header: &FrameHeader,
    block: &BlockInfo,
    plane: usize,
    ref_index: usize,
    mi_row: usize,
    mi_col: usize,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    block_index: usize,
    output: &mut [u16],
) -> Result<()> {
    let reference_frame = block.ref_frames[ref_index];
    let slot_index = header.ref_frame_indices[reference_frame.ref_index()] as usize;
    let reference = references
        .get(slot_index)
        .ok_or_else(|| Error::corrupted("reference slot is empty"))?;

    let subsampling_x = plane > 0 && frame.subsampling_x;
    let subsampling_y = plane > 0 && frame.subsampling_y;

    let motion_vector = select_motion_vector(
        plane,
        block,
        ref_index,
        block_index,
        frame.subsampling_x,
        frame.subsampling_y,
    );
    let (clamped_row, clamped_col) = clamp_motion_vector(
        block.block_size,
        mi_row,
        mi_col,
        header.mi_rows() as usize,
        header.mi_cols() as usize,
        subsampling_x,
        subsampling_y,
        motion_vector,
    );

    let scaling = reference_scaling(
        frame.width,
        frame.height,
        reference.width,
        reference.height,
    )?;

    let base_x = ((x as i64 * scaling.x_scale) >> REF_SCALE_SHIFT) as i32;
    let base_y = ((y as i64 * scaling.y_scale) >> REF_SCALE_SHIFT) as i32;
    let luma_x = (x << subsampling_x as usize) as i64;
    let luma_y = (y << subsampling_y as usize) as i64;
    let frac_x = (((16 * luma_x * scaling.x_scale) >> REF_SCALE_SHIFT) as i32) & SUBPEL_MASK;
    let frac_y = (((16 * luma_y * scaling.y_scale) >> REF_SCALE_SHIFT) as i32) & SUBPEL_MASK;
    let scaled_vector_x = ((clamped_col as i64 * scaling.x_scale) >> REF_SCALE_SHIFT) as i32 + frac_x;
    let scaled_vector_y = ((clamped_row as i64 * scaling.y_scale) >> REF_SCALE_SHIFT) as i32 + frac_y;
    let start_x = (base_x << SUBPEL_BITS) + scaled_vector_x;
    let start_y = (base_y << SUBPEL_BITS) + scaled_vector_y;

    let block_x = (start_x >> SUBPEL_BITS) as i64;
    let block_y = (start_y >> SUBPEL_BITS) as i64;
    let subpel_x = start_x & SUBPEL_MASK;
    let subpel_y = start_y & SUBPEL_MASK;

    let kernel = block.interp_filter.kernel();
    let bit_depth = frame.bit_depth;

    // With unscaled references and whole-sample vectors the filters reduce
    // to a copy, so skip the convolutions entirely.
    if scaling.step_x == 16 && scaling.step_y == 16 && subpel_x == 0 && subpel_y == 0 {
        for row in 0..height {
            for col in 0..width {
                output[row * width + col] =
                    reference.sample(plane, block_x + col as i64, block_y + row as i64);
            }
        }
        return Ok(());
    }

    // Horizontal filter into an intermediate strip tall enough for the
    // vertical taps, then filter the strip vertically.
    let intermediate_height = ((((height - 1) as i32 * scaling.step_y + 15) >> 4) + 8) as usize;
    let mut intermediate = vec![0u16; intermediate_height * width];

    for row in 0..intermediate_height {
        let source_y = block_y + row as i64 - SAMPLE_OFFSET;
        let mut scan_subpel = subpel_x;
        for col in 0..width {
            let source_x = block_x + (scan_subpel >> SUBPEL_BITS) as i64 - SAMPLE_OFFSET;
            let taps = &kernel[(scan_subpel & SUBPEL_MASK) as usize];
            let mut accumulator = 0i32;
            for (t, tap) in taps.iter().enumerate() {
                let sample = reference.sample(plane, source_x + t as i64, source_y);
                accumulator += *tap as i32 * sample as i32;
            }
            intermediate[row * width + col] = clip_bd(bit_depth, round2(accumulator, 7));
            scan_subpel += scaling.step_x;
        }
    }

    let mut scan_subpel = subpel_y;
    for row in 0..height {
        let source_row = (scan_subpel >> SUBPEL_BITS) as usize;
        let taps = &kernel[(scan_subpel & SUBPEL_MASK) as usize];
        for col in 0..width {
            let mut accumulator = 0i32;
            for (t, tap) in taps.iter().enumerate() {
                let sample = intermediate[(source_row + t) * width + col];
                accumulator += *tap as i32 * sample as i32;
            }
            output[row * width + col] = clip_bd(bit_depth, round2(accumulator, 7));
        }
        scan_subpel += scaling.step_y;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::ColorConfig;
    use crate::tables::{InterpolationFilter, ReferenceFrame};

    fn plane_with_gradient(width: usize, height: usize) -> Plane {
        let mut plane = Plane::new(width, height).unwrap();
        for y in 0..height {
            for x in 0..width {
                plane.set(x, y, (y * width + x) as u16);
            }
        }
        plane
    }

    #[test]
    fn test_dc_prediction_without_neighbors_uses_half_range() {
        let mut plane = Plane::new(8, 8).unwrap();
        predict_intra(
            &mut plane,
            PredictionMode::DcPred,
            0,
            0,
            false,
            false,
            false,
            TxSize::Tx4x4,
            8,
        )
        .unwrap();
        assert_eq!(plane.get(0, 0), 128);
        assert_eq!(plane.get(3, 3), 128);
        // Samples outside the transform block are untouched.
        assert_eq!(plane.get(4, 0), 0);
    }

    #[test]
    fn test_vertical_prediction_copies_above_row() {
        let mut plane = plane_with_gradient(8, 8);
        predict_intra(
            &mut plane,
            PredictionMode::VPred,
            0,
            4,
            true,
            false,
            false,
            TxSize::Tx4x4,
            8,
        )
        .unwrap();
        for y in 4..8 {
            for x in 0..4 {
                assert_eq!(plane.get(x, y), (3 * 8 + x) as u16);
            }
        }
    }

    #[test]
    fn test_horizontal_prediction_copies_left_column() {
        let mut plane = plane_with_gradient(8, 8);
        predict_intra(
            &mut plane,
            PredictionMode::HPred,
            4,
            0,
            false,
            true,
            false,
            TxSize::Tx4x4,
            8,
        )
        .unwrap();
        for y in 0..4 {
            for x in 4..8 {
                assert_eq!(plane.get(x, y), (y * 8 + 3) as u16);
            }
        }
    }

    #[test]
    fn test_tm_prediction_is_clipped() {
        let mut plane = Plane::new(8, 8).unwrap();
        for x in 0..8 {
            plane.set(x, 3, 250);
        }
        for y in 0..8 {
            plane.set(0, y, 250);
        }
        predict_intra(
            &mut plane,
            PredictionMode::TmPred,
            1,
            4,
            true,
            true,
            false,
            TxSize::Tx4x4,
            8,
        )
        .unwrap();
        // 250 + 250 - 250 = 250, still in range; corner sample drives the
        // clip when above-left is small.
        assert!(plane.get(1, 4) <= 255);
    }

    #[test]
    fn test_intra_rejects_inter_mode() {
        let mut plane = Plane::new(8, 8).unwrap();
        let result = predict_intra(
            &mut plane,
            PredictionMode::NewMv,
            0,
            0,
            false,
            false,
            false,
            TxSize::Tx4x4,
            8,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_select_motion_vector_chroma_averaging() {
        let mut block = BlockInfo::default();
        block.block_size = BlockSize::Block4x4;
        block.mvs[0][0] = MotionVector::new(8, 4);
        block.mvs[1][0] = MotionVector::new(16, 8);
        block.mvs[2][0] = MotionVector::new(8, 4);
        block.mvs[3][0] = MotionVector::new(16, 8);

        // Luma takes the sub-block vector untouched.
        assert_eq!(
            select_motion_vector(0, &block, 0, 1, true, true),
            MotionVector::new(16, 8)
        );
        // 4:2:0 chroma averages all four.
        assert_eq!(
            select_motion_vector(1, &block, 0, 0, true, true),
            MotionVector::new(12, 6)
        );
    }

    #[test]
    fn test_round_mv_comp_rounds_away_from_zero() {
        assert_eq!(round_mv_comp_q2(3), 2);
        assert_eq!(round_mv_comp_q2(-3), -2);
        assert_eq!(round_mv_comp_q4(6), 2);
        assert_eq!(round_mv_comp_q4(-6), -2);
    }

    #[test]
    fn test_clamp_motion_vector_limits_offscreen_reach() {
        // A tiny frame cannot be reached far outside of.
        let (row, col) = clamp_motion_vector(
            BlockSize::Block8x8,
            0,
            0,
            2,
            2,
            false,
            false,
            MotionVector::new(-4000, -4000),
        );
        let bound = -(INTERP_EXTEND + 8) << SUBPEL_BITS;
        assert_eq!(row, bound);
        assert_eq!(col, bound);
    }

    #[test]
    fn test_reference_scaling_rejects_extremes() {
        assert!(reference_scaling(64, 64, 64, 64).is_ok());
        // Reference more than twice the frame size.
        assert!(reference_scaling(16, 16, 64, 64).is_err());
        // Frame more than sixteen times the reference.
        assert!(reference_scaling(1024, 1024, 16, 16).is_err());
    }

    #[test]
    fn test_whole_pixel_inter_prediction_copies_reference() {
        let color = ColorConfig::default();
        let mut source = FrameBuffer::new(16, 16, &color).unwrap();
        for y in 0..16 {
            for x in 0..16 {
                source.plane_mut(0).set(x, y, (y * 16 + x) as u16);
            }
        }
        let header = test_frame_header(16, 16);
        let mut store = ReferenceFrameStore::new();
        store.update(&source, &header).unwrap();
        let mut frame = FrameBuffer::new(16, 16, &color).unwrap();
        let mut block = BlockInfo::default();
        block.block_size = BlockSize::Block8x8;
        block.is_inter = true;
        block.interp_filter = InterpolationFilter::EightTap;
        block.ref_frames = [ReferenceFrame::Last, ReferenceFrame::Intra];
        // One whole sample right and down, in 1/8 units.
        block.mvs = [[MotionVector::new(8, 8), MotionVector::zero()]; 4];

        predict_inter(
            &mut frame, &store, &header, &block, 0, 0, 0, 0, 0, 8, 8, 0,
        )
        .unwrap();
        assert_eq!(frame.plane(0).get(0, 0), source.plane(0).get(1, 1));
        assert_eq!(frame.plane(0).get(7, 7), source.plane(0).get(8, 8));
    }

    fn test_frame_header(width: u32, height: u32) -> FrameHeader {
        FrameHeader {
            profile: crate::tables::Profile::Profile0,
            frame_type: crate::tables::FrameType::KeyFrame,
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
            reset_frame_context: crate::header::ResetFrameContext::All,
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
}
