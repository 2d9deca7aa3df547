//! Probability tables, syntax counters and backward adaptation
//!
//! Every adaptive syntax element has a probability here, a mirror counter in
//! [`SyntaxElementCounter`], and a merge rule applied after each decoded
//! frame when the header permits adaptation.

use std::sync::OnceLock;

use crate::tables::{
    COEF_BANDS, COEF_CONTEXTS, COEF_MODEL_PROBS, INTER_MODES, INTER_MODE_CONTEXTS,
    INTERP_FILTER_CONTEXTS, INTRA_MODES, MV_CLASSES, MV_CLASS0_SIZE, MV_FR_SIZE, MV_JOINTS,
    MV_OFFSET_BITS, TX_SIZES,
};

/// Number of saved frame context slots
pub const FRAME_CONTEXTS: usize = 4;

/// Number of partition probability contexts
pub const PARTITION_CONTEXTS: usize = 16;
/// Number of skip-flag contexts
pub const SKIP_CONTEXTS: usize = 3;
/// Number of intra/inter-flag contexts
pub const IS_INTER_CONTEXTS: usize = 4;
/// Number of compound-mode and reference contexts
pub const REF_CONTEXTS: usize = 5;
/// Number of tx-size contexts
pub const TX_SIZE_CONTEXTS: usize = 2;
/// Number of block size groups for the y-mode element
pub const BLOCK_SIZE_GROUPS: usize = 4;

/// Saturation and update factor for non-coefficient adaptation
pub const COUNT_SAT: u32 = 20;
pub const MAX_UPDATE_FACTOR: u32 = 128;
/// Saturation and update factors for coefficient adaptation
pub const COEF_COUNT_SAT: u32 = 24;
pub const COEF_MAX_UPDATE_FACTOR: u32 = 112;
pub const COEF_MAX_UPDATE_FACTOR_AFTER_KEY: u32 = 128;

/// Coefficient model probabilities, indexed by
/// `[tx_size][plane_type][is_inter][band][context][node]`
pub type CoefProbs =
    [[[[[[u8; COEF_MODEL_PROBS]; COEF_CONTEXTS]; COEF_BANDS]; 2]; 2]; TX_SIZES];

/// Per-component motion vector probabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MvComponentProbs {
    pub sign: u8,
    pub classes: [u8; MV_CLASSES - 1],
    pub class0_bit: u8,
    pub bits: [u8; MV_OFFSET_BITS],
    pub class0_fr: [[u8; MV_FR_SIZE - 1]; MV_CLASS0_SIZE],
    pub fr: [u8; MV_FR_SIZE - 1],
    pub class0_hp: u8,
    pub hp: u8,
}

impl Default for MvComponentProbs {
    fn default() -> Self {
        MvComponentProbs {
            sign: 128,
            classes: [224, 144, 192, 168, 192, 176, 192, 198, 198, 245],
            class0_bit: 216,
            bits: [136, 140, 148, 160, 176, 192, 224, 234, 234, 240],
            class0_fr: [[128, 128, 64], [96, 112, 64]],
            fr: [64, 96, 64],
            class0_hp: 160,
            hp: 128,
        }
    }
}

/// The complete adaptive probability set for one frame context slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbabilityTables {
    pub tx_8x8: [[u8; 1]; TX_SIZE_CONTEXTS],
    pub tx_16x16: [[u8; 2]; TX_SIZE_CONTEXTS],
    pub tx_32x32: [[u8; 3]; TX_SIZE_CONTEXTS],
    pub coef: CoefProbs,
    pub skip: [u8; SKIP_CONTEXTS],
    pub inter_mode: [[u8; INTER_MODES - 1]; INTER_MODE_CONTEXTS],
    pub interp_filter: [[u8; 2]; INTERP_FILTER_CONTEXTS],
    pub is_inter: [u8; IS_INTER_CONTEXTS],
    pub comp_mode: [u8; REF_CONTEXTS],
    pub single_ref: [[u8; 2]; REF_CONTEXTS],
    pub comp_ref: [u8; REF_CONTEXTS],
    pub y_mode: [[u8; INTRA_MODES - 1]; BLOCK_SIZE_GROUPS],
    pub uv_mode: [[u8; INTRA_MODES - 1]; INTRA_MODES],
    pub partition: [[u8; 3]; PARTITION_CONTEXTS],
    pub mv_joint: [u8; MV_JOINTS - 1],
    pub mv: [MvComponentProbs; 2],
}

impl Default for ProbabilityTables {
    fn default() -> Self {
        ProbabilityTables {
            tx_8x8: [[100], [66]],
            tx_16x16: [[20, 152], [15, 101]],
            tx_32x32: [[3, 136, 37], [5, 52, 13]],
            coef: default_coef_probs(),
            skip: [192, 128, 64],
            inter_mode: [
                [2, 173, 34],
                [7, 145, 85],
                [7, 166, 63],
                [7, 94, 66],
                [8, 64, 46],
                [17, 81, 31],
                [25, 29, 30],
            ],
            interp_filter: [[235, 162], [36, 255], [34, 3], [149, 144]],
            is_inter: [9, 102, 187, 225],
            comp_mode: [239, 183, 119, 96, 41],
            single_ref: [[33, 16], [77, 74], [142, 142], [172, 170], [238, 247]],
            comp_ref: [50, 126, 123, 221, 226],
            y_mode: [
                [65, 32, 18, 144, 162, 194, 41, 51, 98],
                [132, 68, 18, 165, 217, 196, 45, 40, 78],
                [173, 80, 19, 176, 240, 193, 64, 35, 46],
                [221, 135, 38, 194, 248, 121, 96, 85, 29],
            ],
            uv_mode: [
                [120, 7, 76, 176, 208, 126, 28, 54, 103],
                [48, 12, 154, 155, 139, 90, 34, 117, 119],
                [67, 6, 25, 204, 243, 158, 13, 21, 96],
                [97, 5, 44, 131, 176, 139, 48, 68, 97],
                [83, 5, 42, 156, 111, 152, 26, 49, 152],
                [80, 5, 58, 178, 74, 83, 33, 62, 145],
                [86, 5, 32, 154, 192, 168, 14, 22, 163],
                [85, 5, 32, 156, 216, 148, 19, 29, 73],
                [77, 7, 64, 116, 132, 122, 37, 126, 120],
                [101, 21, 107, 181, 192, 103, 19, 67, 125],
            ],
            partition: [
                [199, 122, 141],
                [147, 63, 159],
                [148, 133, 118],
                [121, 104, 114],
                [174, 73, 87],
                [92, 41, 83],
                [82, 99, 50],
                [53, 39, 39],
                [177, 58, 59],
                [68, 26, 63],
                [52, 79, 25],
                [17, 14, 12],
                [222, 34, 30],
                [72, 16, 44],
                [58, 32, 12],
                [10, 7, 6],
            ],
            mv_joint: [32, 64, 96],
            mv: [MvComponentProbs::default(), MvComponentProbs::default()],
        }
    }
}

/// Keyframe UV mode probabilities, conditioned on the y mode
pub const KF_UV_MODE_PROBS: [[u8; INTRA_MODES - 1]; INTRA_MODES] = [
    [121, 30, 54, 128, 164, 158, 45, 26, 70],
    [132, 44, 68, 128, 138, 165, 55, 46, 68],
    [68, 28, 65, 128, 200, 163, 32, 21, 77],
    [123, 29, 67, 128, 155, 178, 45, 35, 77],
    [90, 29, 55, 128, 145, 174, 38, 32, 116],
    [95, 34, 44, 128, 147, 163, 31, 31, 143],
    [94, 22, 42, 128, 156, 171, 32, 24, 51],
    [115, 37, 49, 128, 157, 178, 38, 28, 47],
    [102, 33, 48, 128, 155, 177, 36, 27, 64],
    [122, 37, 44, 128, 154, 162, 32, 23, 65],
];

/// Keyframe partition probabilities, fixed and never adapted
pub const KF_PARTITION_PROBS: [[u8; 3]; PARTITION_CONTEXTS] = [
    [158, 97, 94],
    [93, 24, 99],
    [85, 119, 44],
    [62, 59, 67],
    [149, 53, 53],
    [94, 20, 48],
    [83, 53, 24],
    [52, 18, 18],
    [150, 40, 39],
    [78, 12, 26],
    [67, 33, 11],
    [24, 7, 5],
    [174, 35, 49],
    [68, 11, 27],
    [57, 15, 9],
    [12, 3, 3],
];

/// Base keyframe Y mode probabilities, conditioned on the above mode
const KF_Y_MODE_BASE: [[u8; INTRA_MODES - 1]; INTRA_MODES] = [
    [137, 30, 42, 148, 151, 207, 70, 52, 91],
    [92, 45, 102, 136, 116, 180, 74, 90, 100],
    [73, 32, 19, 187, 222, 215, 46, 34, 100],
    [91, 30, 32, 116, 121, 186, 93, 86, 94],
    [72, 35, 36, 149, 68, 206, 68, 63, 105],
    [73, 31, 28, 138, 57, 124, 55, 122, 151],
    [67, 23, 21, 140, 126, 197, 40, 37, 171],
    [86, 27, 28, 128, 154, 212, 45, 43, 53],
    [74, 32, 27, 107, 86, 160, 63, 134, 102],
    [59, 67, 44, 140, 161, 202, 78, 67, 119],
];

/// Keyframe Y mode probabilities for an above/left mode pair
pub fn kf_y_mode_probs(above: usize, left: usize) -> [u8; INTRA_MODES - 1] {
    let a = &KF_Y_MODE_BASE[above.min(INTRA_MODES - 1)];
    let l = &KF_Y_MODE_BASE[left.min(INTRA_MODES - 1)];
    let mut out = [0u8; INTRA_MODES - 1];
    for i in 0..out.len() {
        out[i] = (((a[i] as u32) + (l[i] as u32) + 1) / 2).clamp(1, 255) as u8;
    }
    out
}

/// Default coefficient model probabilities
///
/// Head probabilities fall off with the coefficient band and the neighbour
/// context; chroma and inter blocks start slightly more skewed to zero.
pub fn default_coef_probs() -> CoefProbs {
    let mut probs = [[[[[[0u8; COEF_MODEL_PROBS]; COEF_CONTEXTS]; COEF_BANDS]; 2]; 2]; TX_SIZES];
    for (t, per_tx) in probs.iter_mut().enumerate() {
        for (plane, per_plane) in per_tx.iter_mut().enumerate() {
            for per_ref in per_plane.iter_mut() {
                for (band, per_band) in per_ref.iter_mut().enumerate() {
                    for (ctx, node) in per_band.iter_mut().enumerate() {
                        let falloff = (band as u32) * 24 + (t as u32) * 4;
                        let skew = (plane as u32) * 12;
                        node[0] = (212u32.saturating_sub(falloff + skew))
                            .saturating_add(ctx as u32 * 6)
                            .clamp(16, 255) as u8;
                        node[1] = (160u32.saturating_sub(ctx as u32 * 18)).clamp(16, 255) as u8;
                        node[2] = (176u32.saturating_sub(band as u32 * 8)).clamp(32, 255) as u8;
                    }
                }
            }
        }
    }
    probs
}

// =============================================================================
// Coefficient Tail Model
// =============================================================================

/// Node probabilities for the token tail above ONE, derived from the model
/// probability of the ONE node
///
/// Magnitudes above one follow a Pareto curve with shape 8; the pivot fixes
/// the curve's scale, and the eight tail tree nodes take their probabilities
/// from the curve mass between the token category boundaries.
pub fn coef_tail_probs(pivot: u8) -> &'static [u8; 8] {
    static TABLE: OnceLock<Vec<[u8; 8]>> = OnceLock::new();
    let table = TABLE.get_or_init(|| (0..=255u16).map(|p| pareto_tail_nodes(p as u8)).collect());
    &table[pivot as usize]
}

fn pareto_tail_nodes(pivot: u8) -> [u8; 8] {
    const BETA: f64 = 8.0;
    let p = f64::from(pivot.max(1)) / 256.0;
    // Fit the scale so that P(|x| = 1 | |x| >= 1) equals the pivot.
    let t = (1.0 - p).powf(1.0 / BETA);
    let alpha = ((1.5 * t - 0.5) / (1.0 - t)).max(1e-6);
    let g = |x: f64| (alpha / (alpha + x)).powf(BETA);
    let node = |num: f64, den: f64| ((num / den * 256.0).round() as i64).clamp(1, 255) as u8;
    let (g1, g2, g3, g4) = (g(1.5), g(2.5), g(3.5), g(4.5));
    let (g6, g10, g18, g34, g66) = (g(6.5), g(10.5), g(18.5), g(34.5), g(66.5));
    [
        node(g1 - g4, g1),
        node(g1 - g2, g1 - g4),
        node(g2 - g3, g2 - g4),
        node(g4 - g10, g4),
        node(g4 - g6, g4 - g10),
        node(g10 - g34, g10),
        node(g10 - g18, g10 - g34),
        node(g34 - g66, g34),
    ]
}

// =============================================================================
// Probability Remapping (compressed header updates)
// =============================================================================

const MAX_PROB: u32 = 255;

/// Inverse map applied to subexponentially coded probability deltas
pub const INV_MAP_TABLE: [u8; 254] = {
    let mut table = [0u8; 254];
    let mut i = 0;
    // 20 coarse anchors spaced 13 apart
    while i < 20 {
        table[i] = (7 + 13 * i) as u8;
        i += 1;
    }
    // Remaining values in ascending order, skipping the anchors
    let mut v = 1u32;
    while i < 254 {
        let is_anchor = v >= 7 && (v - 7) % 13 == 0 && (v - 7) / 13 < 20;
        if !is_anchor {
            table[i] = v as u8;
            i += 1;
        }
        v += 1;
    }
    table
};

fn inv_recenter_nonneg(v: u32, m: u32) -> u32 {
    if v > 2 * m {
        v
    } else if v & 1 == 0 {
        (v >> 1) + m
    } else {
        m - ((v + 1) >> 1)
    }
}

/// Apply a decoded delta to a probability, keeping it in [1, 255]
pub fn inv_remap_prob(delta: u32, prob: u8) -> u8 {
    let v = INV_MAP_TABLE[(delta as usize).min(INV_MAP_TABLE.len() - 1)] as u32;
    let m = prob as u32 - 1;
    if (m << 1) <= MAX_PROB {
        (1 + inv_recenter_nonneg(v, m)) as u8
    } else {
        (MAX_PROB - inv_recenter_nonneg(v, MAX_PROB - 1 - m)) as u8
    }
}

// =============================================================================
// Syntax Element Counters
// =============================================================================

/// Per-frame counts of every adaptive syntax element
///
/// Counters are accumulated per tile and merged with [`merge_from`]; the
/// merge is a plain sum, so the result is independent of tile order.
///
/// [`merge_from`]: SyntaxElementCounter::merge_from
#[derive(Debug, Clone)]
pub struct SyntaxElementCounter {
    pub partition: [[u32; 4]; PARTITION_CONTEXTS],
    pub y_mode: [[u32; INTRA_MODES]; BLOCK_SIZE_GROUPS],
    pub uv_mode: [[u32; INTRA_MODES]; INTRA_MODES],
    pub skip: [[u32; 2]; SKIP_CONTEXTS],
    pub is_inter: [[u32; 2]; IS_INTER_CONTEXTS],
    pub comp_mode: [[u32; 2]; REF_CONTEXTS],
    pub single_ref: [[[u32; 2]; 2]; REF_CONTEXTS],
    pub comp_ref: [[u32; 2]; REF_CONTEXTS],
    pub inter_mode: [[u32; INTER_MODES]; INTER_MODE_CONTEXTS],
    pub interp_filter: [[u32; 3]; INTERP_FILTER_CONTEXTS],
    pub tx_8x8: [[u32; 2]; TX_SIZE_CONTEXTS],
    pub tx_16x16: [[u32; 3]; TX_SIZE_CONTEXTS],
    pub tx_32x32: [[u32; 4]; TX_SIZE_CONTEXTS],
    pub mv_joint: [u32; MV_JOINTS],
    pub mv_sign: [[u32; 2]; 2],
    pub mv_class: [[u32; MV_CLASSES]; 2],
    pub mv_class0_bit: [[u32; MV_CLASS0_SIZE]; 2],
    pub mv_bits: [[[u32; 2]; MV_OFFSET_BITS]; 2],
    pub mv_class0_fr: [[[u32; MV_FR_SIZE]; MV_CLASS0_SIZE]; 2],
    pub mv_fr: [[u32; MV_FR_SIZE]; 2],
    pub mv_class0_hp: [[u32; 2]; 2],
    pub mv_hp: [[u32; 2]; 2],
    /// More-coefficients decision per coefficient position
    pub coef_more: Box<[[[[[[u32; 2]; COEF_CONTEXTS]; COEF_BANDS]; 2]; 2]; TX_SIZES]>,
    /// Head token decisions: zero / one / larger
    pub coef_token: Box<[[[[[[u32; 3]; COEF_CONTEXTS]; COEF_BANDS]; 2]; 2]; TX_SIZES]>,
}

impl Default for SyntaxElementCounter {
    fn default() -> Self {
        SyntaxElementCounter {
            partition: [[0; 4]; PARTITION_CONTEXTS],
            y_mode: [[0; INTRA_MODES]; BLOCK_SIZE_GROUPS],
            uv_mode: [[0; INTRA_MODES]; INTRA_MODES],
            skip: [[0; 2]; SKIP_CONTEXTS],
            is_inter: [[0; 2]; IS_INTER_CONTEXTS],
            comp_mode: [[0; 2]; REF_CONTEXTS],
            single_ref: [[[0; 2]; 2]; REF_CONTEXTS],
            comp_ref: [[0; 2]; REF_CONTEXTS],
            inter_mode: [[0; INTER_MODES]; INTER_MODE_CONTEXTS],
            interp_filter: [[0; 3]; INTERP_FILTER_CONTEXTS],
            tx_8x8: [[0; 2]; TX_SIZE_CONTEXTS],
            tx_16x16: [[0; 3]; TX_SIZE_CONTEXTS],
            tx_32x32: [[0; 4]; TX_SIZE_CONTEXTS],
            mv_joint: [0; MV_JOINTS],
            mv_sign: [[0; 2]; 2],
            mv_class: [[0; MV_CLASSES]; 2],
            mv_class0_bit: [[0; MV_CLASS0_SIZE]; 2],
            mv_bits: [[[0; 2]; MV_OFFSET_BITS]; 2],
            mv_class0_fr: [[[0; MV_FR_SIZE]; MV_CLASS0_SIZE]; 2],
            mv_fr: [[0; MV_FR_SIZE]; 2],
            mv_class0_hp: [[0; 2]; 2],
            mv_hp: [[0; 2]; 2],
            coef_more: Box::new([[[[[[0; 2]; COEF_CONTEXTS]; COEF_BANDS]; 2]; 2]; TX_SIZES]),
            coef_token: Box::new([[[[[[0; 3]; COEF_CONTEXTS]; COEF_BANDS]; 2]; 2]; TX_SIZES]),
        }
    }
}

fn sum_slices(dst: &mut [u32], src: &[u32]) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d += *s;
    }
}

impl SyntaxElementCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add another counter set into this one
    pub fn merge_from(&mut self, other: &SyntaxElementCounter) {
        for (d, s) in self.partition.iter_mut().zip(other.partition.iter()) {
            sum_slices(d, s);
        }
        for (d, s) in self.y_mode.iter_mut().zip(other.y_mode.iter()) {
            sum_slices(d, s);
        }
        for (d, s) in self.uv_mode.iter_mut().zip(other.uv_mode.iter()) {
            sum_slices(d, s);
        }
        for (d, s) in self.skip.iter_mut().zip(other.skip.iter()) {
            sum_slices(d, s);
        }
        for (d, s) in self.is_inter.iter_mut().zip(other.is_inter.iter()) {
            sum_slices(d, s);
        }
        for (d, s) in self.comp_mode.iter_mut().zip(other.comp_mode.iter()) {
            sum_slices(d, s);
        }
        for (d2, s2) in self.single_ref.iter_mut().zip(other.single_ref.iter()) {
            for (d, s) in d2.iter_mut().zip(s2.iter()) {
                sum_slices(d, s);
            }
        }
        for (d, s) in self.comp_ref.iter_mut().zip(other.comp_ref.iter()) {
            sum_slices(d, s);
        }
        for (d, s) in self.inter_mode.iter_mut().zip(other.inter_mode.iter()) {
            sum_slices(d, s);
        }
        for (d, s) in self.interp_filter.iter_mut().zip(other.interp_filter.iter()) {
            sum_slices(d, s);
        }
        for (d, s) in self.tx_8x8.iter_mut().zip(other.tx_8x8.iter()) {
            sum_slices(d, s);
        }
        for (d, s) in self.tx_16x16.iter_mut().zip(other.tx_16x16.iter()) {
            sum_slices(d, s);
        }
        for (d, s) in self.tx_32x32.iter_mut().zip(other.tx_32x32.iter()) {
            sum_slices(d, s);
        }
        sum_slices(&mut self.mv_joint, &other.mv_joint);
        for (d, s) in self.mv_sign.iter_mut().zip(other.mv_sign.iter()) {
            sum_slices(d, s);
        }
        for (d, s) in self.mv_class.iter_mut().zip(other.mv_class.iter()) {
            sum_slices(d, s);
        }
        for (d, s) in self.mv_class0_bit.iter_mut().zip(other.mv_class0_bit.iter()) {
            sum_slices(d, s);
        }
        for (d2, s2) in self.mv_bits.iter_mut().zip(other.mv_bits.iter()) {
            for (d, s) in d2.iter_mut().zip(s2.iter()) {
                sum_slices(d, s);
            }
        }
        for (d2, s2) in self.mv_class0_fr.iter_mut().zip(other.mv_class0_fr.iter()) {
            for (d, s) in d2.iter_mut().zip(s2.iter()) {
                sum_slices(d, s);
            }
        }
        for (d, s) in self.mv_fr.iter_mut().zip(other.mv_fr.iter()) {
            sum_slices(d, s);
        }
        for (d, s) in self.mv_class0_hp.iter_mut().zip(other.mv_class0_hp.iter()) {
            sum_slices(d, s);
        }
        for (d, s) in self.mv_hp.iter_mut().zip(other.mv_hp.iter()) {
            sum_slices(d, s);
        }
        for t in 0..TX_SIZES {
            for p in 0..2 {
                for r in 0..2 {
                    for b in 0..COEF_BANDS {
                        for c in 0..COEF_CONTEXTS {
                            sum_slices(
                                &mut self.coef_more[t][p][r][b][c],
                                &other.coef_more[t][p][r][b][c],
                            );
                            sum_slices(
                                &mut self.coef_token[t][p][r][b][c],
                                &other.coef_token[t][p][r][b][c],
                            );
                        }
                    }
                }
            }
        }
    }
}

// =============================================================================
// Backward Adaptation
// =============================================================================

/// Merge a probability with observed branch counts
pub fn merge_prob(pre: u8, count0: u32, count1: u32, sat: u32, max_factor: u32) -> u8 {
    let total = count0 + count1;
    if total == 0 {
        return pre;
    }
    let observed = ((count0 * 256 + (total >> 1)) / total).clamp(1, 255);
    let factor = max_factor * total.min(sat) / sat;
    (((pre as u32) * (256 - factor) + observed * factor + 128) >> 8).clamp(1, 255) as u8
}

/// Recursively merge every probability on a syntax tree, returning the
/// total count below `node`
pub fn merge_probs(
    tree: &[i8],
    node: usize,
    probs: &mut [u8],
    counts: &[u32],
    sat: u32,
    max_factor: u32,
) -> u32 {
    let child = |branch: i8, probs: &mut [u8]| -> u32 {
        if branch <= 0 {
            counts[(-branch) as usize]
        } else {
            merge_probs(tree, branch as usize, probs, counts, sat, max_factor)
        }
    };
    let left = child(tree[node], probs);
    let right = child(tree[node + 1], probs);
    probs[node >> 1] = merge_prob(probs[node >> 1], left, right, sat, max_factor);
    left + right
}

impl ProbabilityTables {
    /// Adapt coefficient probabilities from the merged frame counts
    pub fn adapt_coef_probs(&mut self, counts: &SyntaxElementCounter, update_factor: u32) {
        for t in 0..TX_SIZES {
            for p in 0..2 {
                for r in 0..2 {
                    for b in 0..COEF_BANDS {
                        for c in 0..COEF_CONTEXTS {
                            let node = &mut self.coef[t][p][r][b][c];
                            let more = &counts.coef_more[t][p][r][b][c];
                            let token = &counts.coef_token[t][p][r][b][c];
                            node[0] = merge_prob(
                                node[0],
                                more[0],
                                more[1],
                                COEF_COUNT_SAT,
                                update_factor,
                            );
                            node[1] = merge_prob(
                                node[1],
                                token[0],
                                token[1] + token[2],
                                COEF_COUNT_SAT,
                                update_factor,
                            );
                            node[2] = merge_prob(
                                node[2],
                                token[1],
                                token[2],
                                COEF_COUNT_SAT,
                                update_factor,
                            );
                        }
                    }
                }
            }
        }
    }

    /// Adapt every non-coefficient probability from the merged frame counts
    pub fn adapt_noncoef_probs(&mut self, counts: &SyntaxElementCounter) {
        use crate::tables::{
            INTER_MODE_TREE, INTRA_MODE_TREE, INTERP_FILTER_TREE, MV_CLASS_TREE, MV_FR_TREE,
            MV_JOINT_TREE, PARTITION_TREE,
        };

        let bin = |prob: &mut u8, c: &[u32; 2]| {
            *prob = merge_prob(*prob, c[0], c[1], COUNT_SAT, MAX_UPDATE_FACTOR);
        };

        for ctx in 0..IS_INTER_CONTEXTS {
            bin(&mut self.is_inter[ctx], &counts.is_inter[ctx]);
        }
        for ctx in 0..REF_CONTEXTS {
            bin(&mut self.comp_mode[ctx], &counts.comp_mode[ctx]);
            bin(&mut self.comp_ref[ctx], &counts.comp_ref[ctx]);
            for bit in 0..2 {
                bin(&mut self.single_ref[ctx][bit], &counts.single_ref[ctx][bit]);
            }
        }
        for ctx in 0..INTER_MODE_CONTEXTS {
            merge_probs(
                &INTER_MODE_TREE,
                0,
                &mut self.inter_mode[ctx],
                &counts.inter_mode[ctx],
                COUNT_SAT,
                MAX_UPDATE_FACTOR,
            );
        }
        for group in 0..BLOCK_SIZE_GROUPS {
            merge_probs(
                &INTRA_MODE_TREE,
                0,
                &mut self.y_mode[group],
                &counts.y_mode[group],
                COUNT_SAT,
                MAX_UPDATE_FACTOR,
            );
        }
        for mode in 0..INTRA_MODES {
            merge_probs(
                &INTRA_MODE_TREE,
                0,
                &mut self.uv_mode[mode],
                &counts.uv_mode[mode],
                COUNT_SAT,
                MAX_UPDATE_FACTOR,
            );
        }
        for ctx in 0..PARTITION_CONTEXTS {
            merge_probs(
                &PARTITION_TREE,
                0,
                &mut self.partition[ctx],
                &counts.partition[ctx],
                COUNT_SAT,
                MAX_UPDATE_FACTOR,
            );
        }
        for ctx in 0..INTERP_FILTER_CONTEXTS {
            merge_probs(
                &INTERP_FILTER_TREE,
                0,
                &mut self.interp_filter[ctx],
                &counts.interp_filter[ctx],
                COUNT_SAT,
                MAX_UPDATE_FACTOR,
            );
        }
        for ctx in 0..SKIP_CONTEXTS {
            bin(&mut self.skip[ctx], &counts.skip[ctx]);
        }

        // Tx size probabilities adapt over cumulative branch counts.
        for ctx in 0..TX_SIZE_CONTEXTS {
            let c = &counts.tx_8x8[ctx];
            bin(&mut self.tx_8x8[ctx][0], c);
            let c = &counts.tx_16x16[ctx];
            self.tx_16x16[ctx][0] =
                merge_prob(self.tx_16x16[ctx][0], c[0], c[1] + c[2], COUNT_SAT, MAX_UPDATE_FACTOR);
            self.tx_16x16[ctx][1] =
                merge_prob(self.tx_16x16[ctx][1], c[1], c[2], COUNT_SAT, MAX_UPDATE_FACTOR);
            let c = &counts.tx_32x32[ctx];
            self.tx_32x32[ctx][0] = merge_prob(
                self.tx_32x32[ctx][0],
                c[0],
                c[1] + c[2] + c[3],
                COUNT_SAT,
                MAX_UPDATE_FACTOR,
            );
            self.tx_32x32[ctx][1] =
                merge_prob(self.tx_32x32[ctx][1], c[1], c[2] + c[3], COUNT_SAT, MAX_UPDATE_FACTOR);
            self.tx_32x32[ctx][2] =
                merge_prob(self.tx_32x32[ctx][2], c[2], c[3], COUNT_SAT, MAX_UPDATE_FACTOR);
        }

        // Motion vectors.
        merge_probs(
            &MV_JOINT_TREE,
            0,
            &mut self.mv_joint,
            &counts.mv_joint,
            COUNT_SAT,
            MAX_UPDATE_FACTOR,
        );
        for comp in 0..2 {
            let probs = &mut self.mv[comp];
            bin(&mut probs.sign, &counts.mv_sign[comp]);
            merge_probs(
                &MV_CLASS_TREE,
                0,
                &mut probs.classes,
                &counts.mv_class[comp],
                COUNT_SAT,
                MAX_UPDATE_FACTOR,
            );
            bin(&mut probs.class0_bit, &counts.mv_class0_bit[comp]);
            for bit in 0..MV_OFFSET_BITS {
                bin(&mut probs.bits[bit], &counts.mv_bits[comp][bit]);
            }
            for c0 in 0..MV_CLASS0_SIZE {
                merge_probs(
                    &MV_FR_TREE,
                    0,
                    &mut probs.class0_fr[c0],
                    &counts.mv_class0_fr[comp][c0],
                    COUNT_SAT,
                    MAX_UPDATE_FACTOR,
                );
            }
            merge_probs(
                &MV_FR_TREE,
                0,
                &mut probs.fr,
                &counts.mv_fr[comp],
                COUNT_SAT,
                MAX_UPDATE_FACTOR,
            );
            bin(&mut probs.class0_hp, &counts.mv_class0_hp[comp]);
            bin(&mut probs.hp, &counts.mv_hp[comp]);
        }
    }
}

// =============================================================================
// Frame Context Slots
// =============================================================================

/// The four saved probability slots selected by `frame_context_idx`
#[derive(Debug, Clone)]
pub struct FrameContexts {
    slots: [ProbabilityTables; FRAME_CONTEXTS],
}

impl Default for FrameContexts {
    fn default() -> Self {
        FrameContexts {
            slots: [
                ProbabilityTables::default(),
                ProbabilityTables::default(),
                ProbabilityTables::default(),
                ProbabilityTables::default(),
            ],
        }
    }
}

impl FrameContexts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every slot to the default probabilities
    pub fn reset_all(&mut self) {
        *self = Self::default();
    }

    /// Reset a single slot to the default probabilities
    pub fn reset_slot(&mut self, idx: usize) {
        self.slots[idx & (FRAME_CONTEXTS - 1)] = ProbabilityTables::default();
    }

    /// Working copy of a slot for decoding a frame
    pub fn load(&self, idx: usize) -> ProbabilityTables {
        self.slots[idx & (FRAME_CONTEXTS - 1)].clone()
    }

    /// Save adapted probabilities back into a slot
    pub fn save(&mut self, idx: usize, probs: &ProbabilityTables) {
        self.slots[idx & (FRAME_CONTEXTS - 1)] = probs.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::MV_JOINT_TREE;

    #[test]
    fn test_inv_map_table_is_permutation() {
        let mut seen = [false; 255];
        for &v in INV_MAP_TABLE.iter() {
            assert!(v >= 1, "delta targets must be non-zero");
            assert!(!seen[v as usize]);
            seen[v as usize] = true;
        }
    }

    #[test]
    fn test_inv_remap_prob_stays_in_range() {
        for prob in 1..=255u8 {
            for delta in [0u32, 1, 19, 20, 100, 253] {
                let p = inv_remap_prob(delta, prob);
                assert!(p >= 1, "prob {} delta {} gave {}", prob, delta, p);
            }
        }
    }

    #[test]
    fn test_coef_tail_probs_legal_and_follow_pivot() {
        for pivot in 0..=255u16 {
            let nodes = coef_tail_probs(pivot as u8);
            assert!(nodes.iter().all(|&n| n >= 1));
        }
        // A likelier ONE token means a lighter tail, so the low tokens
        // gain mass at every split.
        assert!(coef_tail_probs(250)[0] > coef_tail_probs(10)[0]);
        assert!(coef_tail_probs(250)[3] > coef_tail_probs(10)[3]);
        assert!(coef_tail_probs(250)[5] > coef_tail_probs(10)[5]);
    }

    #[test]
    fn test_merge_prob_no_counts_keeps_prob() {
        assert_eq!(merge_prob(143, 0, 0, COUNT_SAT, MAX_UPDATE_FACTOR), 143);
    }

    #[test]
    fn test_merge_prob_moves_toward_counts() {
        // Heavy zero counts should raise the probability of branch 0.
        let p = merge_prob(128, 1000, 0, COUNT_SAT, MAX_UPDATE_FACTOR);
        assert!(p > 128);
        let p = merge_prob(128, 0, 1000, COUNT_SAT, MAX_UPDATE_FACTOR);
        assert!(p < 128);
        // Never leaves the legal range.
        assert!(merge_prob(255, 100_000, 0, COUNT_SAT, MAX_UPDATE_FACTOR) >= 1);
        assert!(merge_prob(1, 0, 100_000, COUNT_SAT, MAX_UPDATE_FACTOR) >= 1);
    }

    #[test]
    fn test_merge_probs_tree() {
        let mut probs = [128u8; 3];
        let counts = [10u32, 0, 0, 0];
        merge_probs(&MV_JOINT_TREE, 0, &mut probs, &counts, COUNT_SAT, MAX_UPDATE_FACTOR);
        // All observations were joint 0, so the root prob must rise.
        assert!(probs[0] > 128);
    }

    #[test]
    fn test_counter_merge_is_commutative() {
        let mut a = SyntaxElementCounter::new();
        let mut b = SyntaxElementCounter::new();
        a.partition[3][1] = 5;
        a.mv_joint[2] = 7;
        a.coef_token[1][0][1][2][3][1] = 11;
        b.partition[3][1] = 2;
        b.mv_joint[0] = 3;
        b.coef_token[1][0][1][2][3][1] = 4;

        let mut ab = a.clone();
        ab.merge_from(&b);
        let mut ba = b.clone();
        ba.merge_from(&a);

        assert_eq!(ab.partition[3][1], 7);
        assert_eq!(ba.partition[3][1], 7);
        assert_eq!(ab.mv_joint, ba.mv_joint);
        assert_eq!(
            ab.coef_token[1][0][1][2][3][1],
            ba.coef_token[1][0][1][2][3][1]
        );
    }

    #[test]
    fn test_frame_context_slots_round_trip() {
        let mut contexts = FrameContexts::new();
        let mut probs = contexts.load(2);
        probs.skip[0] = 7;
        contexts.save(2, &probs);
        assert_eq!(contexts.load(2).skip[0], 7);
        assert_ne!(contexts.load(1).skip[0], 7);
        contexts.reset_slot(2);
        assert_eq!(contexts.load(2).skip[0], ProbabilityTables::default().skip[0]);
    }

    #[test]
    fn test_adaptation_keeps_probs_legal() {
        let mut probs = ProbabilityTables::default();
        let mut counts = SyntaxElementCounter::new();
        counts.skip[0] = [50_000, 0];
        counts.coef_more[0][0][0][0][0] = [0, 40_000];
        probs.adapt_coef_probs(&counts, COEF_MAX_UPDATE_FACTOR);
        probs.adapt_noncoef_probs(&counts);
        assert!(probs.skip[0] >= 1);
        assert!(probs.coef[0][0][0][0][0][0] >= 1);
    }
}
