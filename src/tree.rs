//! Context selection and tree reads for every adaptive syntax element
//!
//! Each `read_*` function computes the context from neighbouring block
//! state, walks the element's syntax tree with the probabilities for that
//! context, and bumps the matching counter cell. The context case tables
//! are normative; every branch matters for bit-exactness.

use crate::bool_coder::BoolDecoder;
use crate::context::BlockInfo;
use crate::probs::{coef_tail_probs, MvComponentProbs, ProbabilityTables, SyntaxElementCounter};
use crate::tables::{
    InterpolationFilter, MotionVector, Partition, PredictionMode, ReferenceFrame, TxMode, TxSize,
    INTER_MODE_CONTEXTS, INTER_MODE_TREE, INTERP_FILTER_TREE, INTRA_MODE_TREE, MV_CLASS_TREE,
    MV_FR_TREE, MV_JOINT_TREE, PARTITION_TREE, SEGMENT_TREE,
};

/// Reference motion vectors this small keep high-precision bits
const COMPANDED_MVREF_THRESH: i16 = 8 << 3;

/// The spatial neighbours consulted by the context formulas
#[derive(Clone, Copy, Default)]
pub struct Neighbors<'a> {
    pub above: Option<&'a BlockInfo>,
    pub left: Option<&'a BlockInfo>,
}

impl<'a> Neighbors<'a> {
    pub fn new(above: Option<&'a BlockInfo>, left: Option<&'a BlockInfo>) -> Self {
        Neighbors { above, left }
    }
}

// =============================================================================
// Partition
// =============================================================================

/// Read a partition symbol, restricted when the block overhangs the frame
pub fn read_partition(
    decoder: &mut BoolDecoder,
    node_probs: &[u8; 3],
    counts: &mut SyntaxElementCounter,
    ctx: usize,
    has_rows: bool,
    has_cols: bool,
) -> Partition {
    let partition = if has_rows && has_cols {
        Partition::from_index(decoder.read_tree(&PARTITION_TREE, node_probs))
    } else if has_cols {
        // Bottom edge: only a horizontal or a full split can fit.
        if decoder.read_bool(node_probs[1]) {
            Partition::Split
        } else {
            Partition::Horizontal
        }
    } else if has_rows {
        // Right edge: vertical or split.
        if decoder.read_bool(node_probs[2]) {
            Partition::Split
        } else {
            Partition::Vertical
        }
    } else {
        Partition::Split
    };
    counts.partition[ctx][partition as usize] += 1;
    partition
}

// =============================================================================
// Segmentation
// =============================================================================

/// Read a segment id from the 8-leaf segment tree
pub fn read_segment_id(decoder: &mut BoolDecoder, tree_probs: &[u8; 7]) -> u8 {
    decoder.read_tree(&SEGMENT_TREE, tree_probs)
}

/// Context for the "segment id is predicted" flag
pub fn seg_pred_context(above_flag: bool, left_flag: bool) -> usize {
    above_flag as usize + left_flag as usize
}

// =============================================================================
// Skip
// =============================================================================

pub fn skip_context(nb: &Neighbors) -> usize {
    let above = nb.above.map_or(0, |b| b.skip as usize);
    let left = nb.left.map_or(0, |b| b.skip as usize);
    above + left
}

pub fn read_skip(
    decoder: &mut BoolDecoder,
    probs: &ProbabilityTables,
    counts: &mut SyntaxElementCounter,
    ctx: usize,
) -> bool {
    let skip = decoder.read_bool(probs.skip[ctx]);
    counts.skip[ctx][skip as usize] += 1;
    skip
}

// =============================================================================
// Transform Size
// =============================================================================

/// Context compares each neighbour's transform size against this block's
/// maximum; a skipped or missing neighbour falls back to the maximum.
pub fn tx_size_context(nb: &Neighbors, max_tx_size: TxSize) -> usize {
    let neighbor_tx = |info: Option<&BlockInfo>| -> Option<usize> {
        let info = info?;
        if info.skip {
            None
        } else {
            Some(info.tx_size as usize)
        }
    };
    let max = max_tx_size as usize;
    let mut above = nb.above.and(neighbor_tx(nb.above)).unwrap_or(max);
    let mut left = nb.left.and(neighbor_tx(nb.left)).unwrap_or(max);
    if nb.left.is_none() {
        left = above;
    }
    if nb.above.is_none() {
        above = left;
    }
    (above + left > max) as usize
}

/// Read a transform size, or derive it when the mode is not `Select`
pub fn read_tx_size(
    decoder: &mut BoolDecoder,
    probs: &ProbabilityTables,
    counts: &mut SyntaxElementCounter,
    ctx: usize,
    tx_mode: TxMode,
    max_tx_size: TxSize,
    allow_select: bool,
) -> TxSize {
    if !allow_select || tx_mode != TxMode::Select {
        return max_tx_size.min(tx_mode.max_tx_size());
    }

    match max_tx_size {
        TxSize::Tx4x4 => TxSize::Tx4x4,
        TxSize::Tx8x8 => {
            let bit = decoder.read_bool(probs.tx_8x8[ctx][0]);
            counts.tx_8x8[ctx][bit as usize] += 1;
            if bit {
                TxSize::Tx8x8
            } else {
                TxSize::Tx4x4
            }
        }
        TxSize::Tx16x16 => {
            let p = &probs.tx_16x16[ctx];
            let size = if !decoder.read_bool(p[0]) {
                TxSize::Tx4x4
            } else if !decoder.read_bool(p[1]) {
                TxSize::Tx8x8
            } else {
                TxSize::Tx16x16
            };
            counts.tx_16x16[ctx][size as usize] += 1;
            size
        }
        TxSize::Tx32x32 => {
            let p = &probs.tx_32x32[ctx];
            let size = if !decoder.read_bool(p[0]) {
                TxSize::Tx4x4
            } else if !decoder.read_bool(p[1]) {
                TxSize::Tx8x8
            } else if !decoder.read_bool(p[2]) {
                TxSize::Tx16x16
            } else {
                TxSize::Tx32x32
            };
            counts.tx_32x32[ctx][size as usize] += 1;
            size
        }
    }
}

// =============================================================================
// Intra/Inter and Reference Selection
// =============================================================================

pub fn is_inter_context(nb: &Neighbors) -> usize {
    match (nb.above, nb.left) {
        (Some(above), Some(left)) => {
            if !above.is_inter && !left.is_inter {
                3
            } else if !above.is_inter || !left.is_inter {
                1
            } else {
                0
            }
        }
        (Some(edge), None) | (None, Some(edge)) => {
            if edge.is_inter {
                0
            } else {
                2
            }
        }
        (None, None) => 0,
    }
}

pub fn read_is_inter(
    decoder: &mut BoolDecoder,
    probs: &ProbabilityTables,
    counts: &mut SyntaxElementCounter,
    ctx: usize,
) -> bool {
    let is_inter = decoder.read_bool(probs.is_inter[ctx]);
    counts.is_inter[ctx][is_inter as usize] += 1;
    is_inter
}

/// The fixed compound reference and the two selectable ones, derived from
/// the header sign biases (LAST, GOLDEN, ALTREF order)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompoundRefs {
    pub fixed: ReferenceFrame,
    pub variable: [ReferenceFrame; 2],
    /// Which of a compound block's two reference slots holds the variable
    /// reference
    pub var_ref_idx: usize,
}

/// Compound prediction is possible only when two references sit on
/// opposite sides of the current frame in display order.
pub fn compound_reference_setup(sign_bias: [bool; 3]) -> Option<CompoundRefs> {
    use ReferenceFrame::*;
    let (fixed, variable) = if sign_bias[Last.ref_index()] == sign_bias[Golden.ref_index()] {
        (AltRef, [Last, Golden])
    } else if sign_bias[Last.ref_index()] == sign_bias[AltRef.ref_index()] {
        (Golden, [Last, AltRef])
    } else {
        (Last, [Golden, AltRef])
    };
    if sign_bias[Last.ref_index()] == sign_bias[Golden.ref_index()]
        && sign_bias[Last.ref_index()] == sign_bias[AltRef.ref_index()]
    {
        return None;
    }
    let fix_ref_idx = sign_bias[fixed.ref_index()] as usize;
    Some(CompoundRefs {
        fixed,
        variable,
        var_ref_idx: 1 - fix_ref_idx,
    })
}

pub fn comp_mode_context(nb: &Neighbors, fixed_ref: ReferenceFrame) -> usize {
    match (nb.above, nb.left) {
        (Some(above), Some(left)) => {
            if above.single_reference() && left.single_reference() {
                ((above.ref_frames[0] == fixed_ref) ^ (left.ref_frames[0] == fixed_ref)) as usize
            } else if above.single_reference() {
                2 + (above.ref_frames[0] == fixed_ref || !above.is_inter) as usize
            } else if left.single_reference() {
                2 + (left.ref_frames[0] == fixed_ref || !left.is_inter) as usize
            } else {
                4
            }
        }
        (Some(edge), None) | (None, Some(edge)) => {
            if edge.single_reference() {
                (edge.ref_frames[0] == fixed_ref) as usize
            } else {
                3
            }
        }
        (None, None) => 1,
    }
}

pub fn read_comp_mode(
    decoder: &mut BoolDecoder,
    probs: &ProbabilityTables,
    counts: &mut SyntaxElementCounter,
    ctx: usize,
) -> bool {
    let compound = decoder.read_bool(probs.comp_mode[ctx]);
    counts.comp_mode[ctx][compound as usize] += 1;
    compound
}

pub fn comp_ref_context(nb: &Neighbors, comp: &CompoundRefs) -> usize {
    let var1 = comp.variable[1];
    let var_of = |info: &BlockInfo| -> ReferenceFrame {
        if info.single_reference() {
            info.ref_frames[0]
        } else {
            info.ref_frames[comp.var_ref_idx]
        }
    };

    match (nb.above, nb.left) {
        (Some(above), Some(left)) => {
            let above_intra = !above.is_inter;
            let left_intra = !left.is_inter;
            if above_intra && left_intra {
                2
            } else if above_intra || left_intra {
                let edge = if above_intra { left } else { above };
                1 + 2 * (var_of(edge) != var1) as usize
            } else {
                let above_single = above.single_reference();
                let left_single = left.single_reference();
                let var_above = var_of(above);
                let var_left = var_of(left);
                if var_above == var_left && var1 == var_above {
                    0
                } else if above_single && left_single {
                    if (var_above == comp.fixed && var_left == var1)
                        || (var_left == comp.fixed && var_above == var1)
                    {
                        4
                    } else if var_above == var_left {
                        3
                    } else {
                        1
                    }
                } else if above_single || left_single {
                    let single_ref = if above_single { var_above } else { var_left };
                    let comp_var = if above_single { var_left } else { var_above };
                    if comp_var == var1 && single_ref != var1 {
                        1
                    } else if single_ref == var1 && comp_var != var1 {
                        2
                    } else {
                        4
                    }
                } else if var_above == var_left {
                    4
                } else {
                    2
                }
            }
        }
        (Some(edge), None) | (None, Some(edge)) => {
            if !edge.is_inter {
                2
            } else if edge.single_reference() {
                3 * (edge.ref_frames[0] != var1) as usize
            } else {
                4 * (edge.ref_frames[comp.var_ref_idx] != var1) as usize
            }
        }
        (None, None) => 2,
    }
}

pub fn read_comp_ref(
    decoder: &mut BoolDecoder,
    probs: &ProbabilityTables,
    counts: &mut SyntaxElementCounter,
    ctx: usize,
) -> bool {
    let bit = decoder.read_bool(probs.comp_ref[ctx]);
    counts.comp_ref[ctx][bit as usize] += 1;
    bit
}

/// Context for the first single-reference bit (LAST vs not)
pub fn single_ref_p1_context(nb: &Neighbors) -> usize {
    use ReferenceFrame::Last;
    let has_last = |info: &BlockInfo| {
        info.ref_frames[0] == Last || (!info.single_reference() && info.ref_frames[1] == Last)
    };

    match (nb.above, nb.left) {
        (Some(above), Some(left)) => {
            let above_intra = !above.is_inter;
            let left_intra = !left.is_inter;
            if above_intra && left_intra {
                2
            } else if above_intra || left_intra {
                let edge = if above_intra { left } else { above };
                if edge.single_reference() {
                    4 * (edge.ref_frames[0] == Last) as usize
                } else {
                    1 + has_last(edge) as usize
                }
            } else {
                let above_single = above.single_reference();
                let left_single = left.single_reference();
                if above_single && left_single {
                    2 * (above.ref_frames[0] == Last) as usize
                        + 2 * (left.ref_frames[0] == Last) as usize
                } else if above_single || left_single {
                    let (single, compound) = if above_single { (above, left) } else { (left, above) };
                    if single.ref_frames[0] == Last {
                        3 + has_last(compound) as usize
                    } else {
                        has_last(compound) as usize
                    }
                } else {
                    1 + (has_last(above) || has_last(left)) as usize
                }
            }
        }
        (Some(edge), None) | (None, Some(edge)) => {
            if !edge.is_inter {
                2
            } else if edge.single_reference() {
                4 * (edge.ref_frames[0] == Last) as usize
            } else {
                1 + has_last(edge) as usize
            }
        }
        (None, None) => 2,
    }
}

/// Context for the second single-reference bit (GOLDEN vs ALTREF)
pub fn single_ref_p2_context(nb: &Neighbors) -> usize {
    use ReferenceFrame::{Golden, Last};
    let has_golden = |info: &BlockInfo| {
        info.ref_frames[0] == Golden || (!info.single_reference() && info.ref_frames[1] == Golden)
    };

    match (nb.above, nb.left) {
        (Some(above), Some(left)) => {
            let above_intra = !above.is_inter;
            let left_intra = !left.is_inter;
            if above_intra && left_intra {
                2
            } else if above_intra || left_intra {
                let edge = if above_intra { left } else { above };
                if edge.single_reference() {
                    if edge.ref_frames[0] == Last {
                        3
                    } else {
                        4 * (edge.ref_frames[0] == Golden) as usize
                    }
                } else {
                    1 + 2 * has_golden(edge) as usize
                }
            } else {
                let above_single = above.single_reference();
                let left_single = left.single_reference();
                if !above_single && !left_single {
                    if above.ref_frames == left.ref_frames {
                        3 * (has_golden(above) || has_golden(left)) as usize
                    } else {
                        2
                    }
                } else if above_single != left_single {
                    let (single, compound) = if above_single { (above, left) } else { (left, above) };
                    if single.ref_frames[0] == Golden {
                        3 + has_golden(compound) as usize
                    } else if single.ref_frames[0] == ReferenceFrame::AltRef {
                        has_golden(compound) as usize
                    } else {
                        1 + 2 * has_golden(compound) as usize
                    }
                } else {
                    let above0 = above.ref_frames[0];
                    let left0 = left.ref_frames[0];
                    if above0 == Last && left0 == Last {
                        3
                    } else if above0 == Last || left0 == Last {
                        let other = if above0 == Last { left0 } else { above0 };
                        4 * (other == Golden) as usize
                    } else {
                        2 * (above0 == Golden) as usize + 2 * (left0 == Golden) as usize
                    }
                }
            }
        }
        (Some(edge), None) | (None, Some(edge)) => {
            if !edge.is_inter || (edge.ref_frames[0] == Last && edge.single_reference()) {
                2
            } else if edge.single_reference() {
                4 * (edge.ref_frames[0] == Golden) as usize
            } else {
                3 * has_golden(edge) as usize
            }
        }
        (None, None) => 2,
    }
}

pub fn read_single_ref_bit(
    decoder: &mut BoolDecoder,
    probs: &ProbabilityTables,
    counts: &mut SyntaxElementCounter,
    ctx: usize,
    bit_index: usize,
) -> bool {
    let bit = decoder.read_bool(probs.single_ref[ctx][bit_index]);
    counts.single_ref[ctx][bit_index][bit as usize] += 1;
    bit
}

// =============================================================================
// Prediction Modes
// =============================================================================

/// Keyframe luma mode; probabilities come from the above/left modes and are
/// not adapted, so there is no counter.
pub fn read_kf_y_mode(decoder: &mut BoolDecoder, probs: &[u8; 9]) -> PredictionMode {
    PredictionMode::intra_from_index(decoder.read_tree(&INTRA_MODE_TREE, probs))
}

pub fn read_y_mode(
    decoder: &mut BoolDecoder,
    probs: &ProbabilityTables,
    counts: &mut SyntaxElementCounter,
    size_group: usize,
) -> PredictionMode {
    let index = decoder.read_tree(&INTRA_MODE_TREE, &probs.y_mode[size_group]);
    counts.y_mode[size_group][index as usize] += 1;
    PredictionMode::intra_from_index(index)
}

pub fn read_kf_uv_mode(decoder: &mut BoolDecoder, probs: &[u8; 9]) -> PredictionMode {
    PredictionMode::intra_from_index(decoder.read_tree(&INTRA_MODE_TREE, probs))
}

pub fn read_uv_mode(
    decoder: &mut BoolDecoder,
    probs: &ProbabilityTables,
    counts: &mut SyntaxElementCounter,
    y_mode: PredictionMode,
) -> PredictionMode {
    let y = y_mode as usize;
    let index = decoder.read_tree(&INTRA_MODE_TREE, &probs.uv_mode[y]);
    counts.uv_mode[y][index as usize] += 1;
    PredictionMode::intra_from_index(index)
}

pub fn read_inter_mode(
    decoder: &mut BoolDecoder,
    probs: &ProbabilityTables,
    counts: &mut SyntaxElementCounter,
    mode_ctx: usize,
) -> PredictionMode {
    let ctx = mode_ctx.min(INTER_MODE_CONTEXTS - 1);
    let offset = decoder.read_tree(&INTER_MODE_TREE, &probs.inter_mode[ctx]);
    counts.inter_mode[ctx][offset as usize] += 1;
    PredictionMode::inter_from_offset(offset)
}

// =============================================================================
// Interpolation Filter
// =============================================================================

/// Context from neighbouring inter blocks' filter choices
pub fn interp_filter_context(nb: &Neighbors) -> usize {
    let filter_of = |info: Option<&BlockInfo>| -> Option<InterpolationFilter> {
        let info = info?;
        info.is_inter.then_some(info.interp_filter)
    };
    let above = filter_of(nb.above);
    let left = filter_of(nb.left);
    match (above, left) {
        (Some(a), Some(l)) if a == l => a as usize,
        (Some(a), None) => a as usize,
        (None, Some(l)) => l as usize,
        (None, None) => 3,
        _ => 3,
    }
}

pub fn read_interp_filter(
    decoder: &mut BoolDecoder,
    probs: &ProbabilityTables,
    counts: &mut SyntaxElementCounter,
    ctx: usize,
) -> InterpolationFilter {
    let index = decoder.read_tree(&INTERP_FILTER_TREE, &probs.interp_filter[ctx]);
    counts.interp_filter[ctx][index as usize] += 1;
    InterpolationFilter::from_index(index)
}

// =============================================================================
// Coefficient Token Tail
// =============================================================================

/// Read the token above ONE: TWO through the six extra-bit categories
///
/// Node probabilities are not stored per context; they come from the model
/// extension of the ONE node probability. Returns the token index, 2 to 10.
pub fn read_coef_tail(decoder: &mut BoolDecoder, pivot: u8) -> usize {
    let t = coef_tail_probs(pivot);
    if !decoder.read_bool(t[0]) {
        if !decoder.read_bool(t[1]) {
            2
        } else if !decoder.read_bool(t[2]) {
            3
        } else {
            4
        }
    } else if !decoder.read_bool(t[3]) {
        if !decoder.read_bool(t[4]) {
            5
        } else {
            6
        }
    } else if !decoder.read_bool(t[5]) {
        if !decoder.read_bool(t[6]) {
            7
        } else {
            8
        }
    } else if !decoder.read_bool(t[7]) {
        9
    } else {
        10
    }
}

// =============================================================================
// Motion Vectors
// =============================================================================

/// High-precision bits are only coded when the reference vector is small
fn mv_uses_hp(reference: MotionVector) -> bool {
    reference.row.abs() < COMPANDED_MVREF_THRESH && reference.col.abs() < COMPANDED_MVREF_THRESH
}

fn read_mv_component(
    decoder: &mut BoolDecoder,
    probs: &MvComponentProbs,
    counts: &mut SyntaxElementCounter,
    comp: usize,
    usehp: bool,
) -> i16 {
    let sign = decoder.read_bool(probs.sign);
    counts.mv_sign[comp][sign as usize] += 1;

    let class = decoder.read_tree(&MV_CLASS_TREE, &probs.classes) as usize;
    counts.mv_class[comp][class] += 1;

    let magnitude = if class == 0 {
        let d = decoder.read_bool(probs.class0_bit) as usize;
        counts.mv_class0_bit[comp][d] += 1;
        let fr = decoder.read_tree(&MV_FR_TREE, &probs.class0_fr[d]) as usize;
        counts.mv_class0_fr[comp][d][fr] += 1;
        let hp = if usehp {
            let hp = decoder.read_bool(probs.class0_hp);
            counts.mv_class0_hp[comp][hp as usize] += 1;
            hp
        } else {
            true
        };
        (d << 3) + (fr << 1) + hp as usize + 1
    } else {
        let mut d = 0usize;
        for i in 0..class {
            let bit = decoder.read_bool(probs.bits[i]);
            counts.mv_bits[comp][i][bit as usize] += 1;
            d |= (bit as usize) << i;
        }
        let fr = decoder.read_tree(&MV_FR_TREE, &probs.fr) as usize;
        counts.mv_fr[comp][fr] += 1;
        let hp = if usehp {
            let hp = decoder.read_bool(probs.hp);
            counts.mv_hp[comp][hp as usize] += 1;
            hp
        } else {
            true
        };
        let base = 2usize << (class + 2);
        base + (d << 3) + (fr << 1) + hp as usize + 1
    };

    if sign {
        -(magnitude as i16)
    } else {
        magnitude as i16
    }
}

/// Read a motion vector difference and add it to the best reference
pub fn read_mv(
    decoder: &mut BoolDecoder,
    probs: &ProbabilityTables,
    counts: &mut SyntaxElementCounter,
    reference: MotionVector,
    allow_high_precision: bool,
) -> MotionVector {
    let usehp = allow_high_precision && mv_uses_hp(reference);
    let joint = decoder.read_tree(&MV_JOINT_TREE, &probs.mv_joint);
    counts.mv_joint[joint as usize] += 1;

    // Joint leaves: 0 zero, 1 col only, 2 row only, 3 both.
    let mut diff = MotionVector::zero();
    if joint == 2 || joint == 3 {
        diff.row = read_mv_component(decoder, &probs.mv[0], counts, 0, usehp);
    }
    if joint == 1 || joint == 3 {
        diff.col = read_mv_component(decoder, &probs.mv[1], counts, 1, usehp);
    }

    reference.add(diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::BlockSize;

    fn zero_decoder(data: &'static [u8]) -> BoolDecoder<'static> {
        BoolDecoder::new(data).unwrap()
    }

    fn inter_block(refs: [ReferenceFrame; 2]) -> BlockInfo {
        BlockInfo {
            is_inter: true,
            ref_frames: refs,
            ..BlockInfo::default()
        }
    }

    #[test]
    fn test_partition_read_counts() {
        let mut dec = zero_decoder(&[0x00, 0x00, 0x00, 0x00]);
        let probs = ProbabilityTables::default();
        let mut counts = SyntaxElementCounter::new();
        let p = read_partition(&mut dec, &probs.partition[5], &mut counts, 5, true, true);
        assert_eq!(p, Partition::None);
        assert_eq!(counts.partition[5][Partition::None as usize], 1);
    }

    #[test]
    fn test_partition_forced_split() {
        let mut dec = zero_decoder(&[0x00, 0x00]);
        let probs = ProbabilityTables::default();
        let mut counts = SyntaxElementCounter::new();
        let p = read_partition(&mut dec, &probs.partition[0], &mut counts, 0, false, false);
        assert_eq!(p, Partition::Split);
        // Forced splits consume no bits.
        assert_eq!(dec.position(), 2);
    }

    #[test]
    fn test_skip_context_cases() {
        let skipped = BlockInfo {
            skip: true,
            ..BlockInfo::default()
        };
        let clear = BlockInfo::default();
        assert_eq!(skip_context(&Neighbors::new(None, None)), 0);
        assert_eq!(skip_context(&Neighbors::new(Some(&skipped), None)), 1);
        assert_eq!(
            skip_context(&Neighbors::new(Some(&skipped), Some(&skipped))),
            2
        );
        assert_eq!(
            skip_context(&Neighbors::new(Some(&clear), Some(&skipped))),
            1
        );
    }

    #[test]
    fn test_tx_size_context_missing_neighbors() {
        // With no neighbours both sides fall back to the maximum, which
        // always exceeds it when summed.
        assert_eq!(tx_size_context(&Neighbors::default(), TxSize::Tx8x8), 1);

        let small = BlockInfo {
            tx_size: TxSize::Tx4x4,
            ..BlockInfo::default()
        };
        assert_eq!(
            tx_size_context(&Neighbors::new(Some(&small), Some(&small)), TxSize::Tx8x8),
            0
        );
    }

    #[test]
    fn test_is_inter_context_cases() {
        let intra = BlockInfo::default();
        let inter = inter_block([ReferenceFrame::Last, ReferenceFrame::Intra]);
        assert_eq!(is_inter_context(&Neighbors::new(None, None)), 0);
        assert_eq!(is_inter_context(&Neighbors::new(Some(&intra), None)), 2);
        assert_eq!(is_inter_context(&Neighbors::new(Some(&inter), None)), 0);
        assert_eq!(
            is_inter_context(&Neighbors::new(Some(&intra), Some(&intra))),
            3
        );
        assert_eq!(
            is_inter_context(&Neighbors::new(Some(&intra), Some(&inter))),
            1
        );
        assert_eq!(
            is_inter_context(&Neighbors::new(Some(&inter), Some(&inter))),
            0
        );
    }

    #[test]
    fn test_compound_reference_setup() {
        // LAST and GOLDEN on the same side: ALTREF is fixed.
        let comp = compound_reference_setup([false, false, true]).unwrap();
        assert_eq!(comp.fixed, ReferenceFrame::AltRef);
        assert_eq!(comp.variable, [ReferenceFrame::Last, ReferenceFrame::Golden]);

        // All on the same side: no compound prediction.
        assert!(compound_reference_setup([false, false, false]).is_none());
    }

    #[test]
    fn test_single_ref_p1_context_single_neighbors() {
        let last = inter_block([ReferenceFrame::Last, ReferenceFrame::Intra]);
        let golden = inter_block([ReferenceFrame::Golden, ReferenceFrame::Intra]);
        assert_eq!(single_ref_p1_context(&Neighbors::new(None, None)), 2);
        assert_eq!(
            single_ref_p1_context(&Neighbors::new(Some(&last), Some(&last))),
            4
        );
        assert_eq!(
            single_ref_p1_context(&Neighbors::new(Some(&golden), Some(&golden))),
            0
        );
        assert_eq!(
            single_ref_p1_context(&Neighbors::new(Some(&last), Some(&golden))),
            2
        );
    }

    #[test]
    fn test_interp_filter_context() {
        let smooth = BlockInfo {
            is_inter: true,
            interp_filter: InterpolationFilter::EightTapSmooth,
            ref_frames: [ReferenceFrame::Last, ReferenceFrame::Intra],
            ..BlockInfo::default()
        };
        let sharp = BlockInfo {
            interp_filter: InterpolationFilter::EightTapSharp,
            ..smooth
        };
        assert_eq!(interp_filter_context(&Neighbors::new(None, None)), 3);
        assert_eq!(
            interp_filter_context(&Neighbors::new(Some(&smooth), None)),
            InterpolationFilter::EightTapSmooth as usize
        );
        assert_eq!(
            interp_filter_context(&Neighbors::new(Some(&smooth), Some(&sharp))),
            3
        );
    }

    #[test]
    fn test_read_mv_zero_joint() {
        let mut dec = zero_decoder(&[0x00, 0x00, 0x00, 0x00]);
        let probs = ProbabilityTables::default();
        let mut counts = SyntaxElementCounter::new();
        let reference = MotionVector::new(12, -7);
        let mv = read_mv(&mut dec, &probs, &mut counts, reference, true);
        // A zero joint leaves the prediction untouched.
        assert_eq!(mv, reference);
        assert_eq!(counts.mv_joint[0], 1);
    }

    #[test]
    fn test_mode_reads_from_zero_stream() {
        let mut dec = zero_decoder(&[0x00; 8]);
        let probs = ProbabilityTables::default();
        let mut counts = SyntaxElementCounter::new();
        // Left branches of the intra tree lead to DC.
        assert_eq!(
            read_y_mode(&mut dec, &probs, &mut counts, 0),
            PredictionMode::DcPred
        );
        assert_eq!(counts.y_mode[0][PredictionMode::DcPred as usize], 1);
        // Inter tree leaf 0 is ZEROMV.
        assert_eq!(
            read_inter_mode(&mut dec, &probs, &mut counts, 9),
            PredictionMode::ZeroMv
        );
        assert_eq!(counts.inter_mode[INTER_MODE_CONTEXTS - 1][2], 1);
    }

    #[test]
    fn test_coef_tail_zero_stream_reads_two() {
        let mut dec = zero_decoder(&[0x00; 4]);
        assert_eq!(read_coef_tail(&mut dec, 128), 2);
    }

    #[test]
    fn test_size_group_matches_tx_context_inputs() {
        // 8x8 blocks sit in group 1 and allow an 8x8 transform.
        let bs = BlockSize::Block8x8;
        assert_eq!(crate::tables::SIZE_GROUP_LOOKUP[bs as usize], 1);
        assert_eq!(bs.max_tx_size(), TxSize::Tx8x8);
    }
}
