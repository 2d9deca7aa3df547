//! Enums and constant lookup tables shared across the decoder
//!
//! Block geometry, prediction modes, syntax trees, quantizer lookups,
//! subpel filter kernels, scan orders and coefficient bands all live here.

// =============================================================================
// Block Sizes
// =============================================================================

/// Block sizes from 4x4 to 64x64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BlockSize {
    Block4x4 = 0,
    Block4x8 = 1,
    Block8x4 = 2,
    Block8x8 = 3,
    Block8x16 = 4,
    Block16x8 = 5,
    Block16x16 = 6,
    Block16x32 = 7,
    Block32x16 = 8,
    Block32x32 = 9,
    Block32x64 = 10,
    Block64x32 = 11,
    Block64x64 = 12,
}

/// Number of distinct block sizes
pub const BLOCK_SIZES: usize = 13;

impl BlockSize {
    /// Width in pixels
    pub const fn width(self) -> usize {
        4 << self.width_log2()
    }

    /// Height in pixels
    pub const fn height(self) -> usize {
        4 << self.height_log2()
    }

    /// log2 of the width in 4-pixel units
    pub const fn width_log2(self) -> usize {
        match self {
            BlockSize::Block4x4 | BlockSize::Block4x8 => 0,
            BlockSize::Block8x4 | BlockSize::Block8x8 | BlockSize::Block8x16 => 1,
            BlockSize::Block16x8 | BlockSize::Block16x16 | BlockSize::Block16x32 => 2,
            BlockSize::Block32x16 | BlockSize::Block32x32 | BlockSize::Block32x64 => 3,
            BlockSize::Block64x32 | BlockSize::Block64x64 => 4,
        }
    }

    /// log2 of the height in 4-pixel units
    pub const fn height_log2(self) -> usize {
        match self {
            BlockSize::Block4x4 | BlockSize::Block8x4 => 0,
            BlockSize::Block4x8 | BlockSize::Block8x8 | BlockSize::Block16x8 => 1,
            BlockSize::Block8x16 | BlockSize::Block16x16 | BlockSize::Block32x16 => 2,
            BlockSize::Block16x32 | BlockSize::Block32x32 | BlockSize::Block64x32 => 3,
            BlockSize::Block32x64 | BlockSize::Block64x64 => 4,
        }
    }

    /// Width in 4-pixel sub-block units
    pub const fn width_4x4(self) -> usize {
        1 << self.width_log2()
    }

    /// Height in 4-pixel sub-block units
    pub const fn height_4x4(self) -> usize {
        1 << self.height_log2()
    }

    /// Width in 8-pixel mode-info units (at least 1)
    pub const fn width_mi(self) -> usize {
        let w = self.width_4x4() >> 1;
        if w == 0 {
            1
        } else {
            w
        }
    }

    /// Height in 8-pixel mode-info units (at least 1)
    pub const fn height_mi(self) -> usize {
        let h = self.height_4x4() >> 1;
        if h == 0 {
            1
        } else {
            h
        }
    }

    /// True for 4x4, 4x8 and 8x4
    pub const fn is_sub_8x8(self) -> bool {
        (self as usize) < BlockSize::Block8x8 as usize
    }

    /// Largest square transform that fits the luma block
    pub const fn max_tx_size(self) -> TxSize {
        match self {
            BlockSize::Block4x4 | BlockSize::Block4x8 | BlockSize::Block8x4 => TxSize::Tx4x4,
            BlockSize::Block8x8 | BlockSize::Block8x16 | BlockSize::Block16x8 => TxSize::Tx8x8,
            BlockSize::Block16x16 | BlockSize::Block16x32 | BlockSize::Block32x16 => {
                TxSize::Tx16x16
            }
            _ => TxSize::Tx32x32,
        }
    }

    pub fn from_index(v: usize) -> Option<Self> {
        use BlockSize::*;
        const ALL: [BlockSize; BLOCK_SIZES] = [
            Block4x4, Block4x8, Block8x4, Block8x8, Block8x16, Block16x8, Block16x16, Block16x32,
            Block32x16, Block32x32, Block32x64, Block64x32, Block64x64,
        ];
        ALL.get(v).copied()
    }
}

/// Block size group used to select the y-mode probability context
pub const SIZE_GROUP_LOOKUP: [usize; BLOCK_SIZES] = [0, 0, 0, 1, 1, 1, 2, 2, 2, 3, 3, 3, 3];

/// Sub-size of a block after applying a partition
///
/// Returns `None` for invalid partitionings of sub-8x8 sizes.
pub const fn get_subsize(block_size: BlockSize, partition: Partition) -> BlockSize {
    use BlockSize::*;
    match partition {
        Partition::None => block_size,
        Partition::Horizontal => match block_size {
            Block8x8 => Block8x4,
            Block16x16 => Block16x8,
            Block32x32 => Block32x16,
            Block64x64 => Block64x32,
            other => other,
        },
        Partition::Vertical => match block_size {
            Block8x8 => Block4x8,
            Block16x16 => Block8x16,
            Block32x32 => Block16x32,
            Block64x64 => Block32x64,
            other => other,
        },
        Partition::Split => match block_size {
            Block8x8 => Block4x4,
            Block16x16 => Block8x8,
            Block32x32 => Block16x16,
            Block64x64 => Block32x32,
            other => other,
        },
    }
}

// =============================================================================
// Transform Sizes and Types
// =============================================================================

/// Square transform sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TxSize {
    Tx4x4 = 0,
    Tx8x8 = 1,
    Tx16x16 = 2,
    Tx32x32 = 3,
}

/// Number of transform sizes
pub const TX_SIZES: usize = 4;

impl TxSize {
    /// Transform edge length in pixels
    pub const fn size(self) -> usize {
        4 << (self as usize)
    }

    /// log2 of the edge length
    pub const fn log2(self) -> usize {
        2 + self as usize
    }

    /// Number of coefficients in the transform block
    pub const fn num_coeffs(self) -> usize {
        self.size() * self.size()
    }

    pub fn from_index(v: usize) -> Option<Self> {
        match v {
            0 => Some(TxSize::Tx4x4),
            1 => Some(TxSize::Tx8x8),
            2 => Some(TxSize::Tx16x16),
            3 => Some(TxSize::Tx32x32),
            _ => None,
        }
    }
}

/// Frame-level transform mode from the compressed header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    Only4x4 = 0,
    Allow8x8 = 1,
    Allow16x16 = 2,
    Allow32x32 = 3,
    Select = 4,
}

impl TxMode {
    /// Largest transform size the mode permits
    pub const fn max_tx_size(self) -> TxSize {
        match self {
            TxMode::Only4x4 => TxSize::Tx4x4,
            TxMode::Allow8x8 => TxSize::Tx8x8,
            TxMode::Allow16x16 => TxSize::Tx16x16,
            TxMode::Allow32x32 | TxMode::Select => TxSize::Tx32x32,
        }
    }
}

/// Row/column transform kind pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxType {
    DctDct = 0,
    AdstDct = 1,
    DctAdst = 2,
    AdstAdst = 3,
}

/// Transform type implied by an intra prediction mode (4x4/8x8/16x16 luma)
pub const fn intra_mode_to_tx_type(mode: PredictionMode) -> TxType {
    use PredictionMode::*;
    match mode {
        DcPred | D45Pred => TxType::DctDct,
        VPred | D117Pred | D63Pred => TxType::AdstDct,
        HPred | D153Pred | D207Pred => TxType::DctAdst,
        D135Pred | TmPred => TxType::AdstAdst,
        _ => TxType::DctDct,
    }
}

// =============================================================================
// Partitions
// =============================================================================

/// Partition of a square block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    None = 0,
    Horizontal = 1,
    Vertical = 2,
    Split = 3,
}

/// Partition syntax tree
pub const PARTITION_TREE: [i8; 6] = [0, 2, -1, 4, -2, -3];

impl Partition {
    pub fn from_index(v: u8) -> Self {
        match v {
            1 => Partition::Horizontal,
            2 => Partition::Vertical,
            3 => Partition::Split,
            _ => Partition::None,
        }
    }
}

// =============================================================================
// Prediction Modes
// =============================================================================

/// Intra and inter prediction modes
///
/// The discriminants match the bitstream ordering; the four inter modes
/// follow the ten intra modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionMode {
    DcPred = 0,
    VPred = 1,
    HPred = 2,
    D45Pred = 3,
    D135Pred = 4,
    D117Pred = 5,
    D153Pred = 6,
    D207Pred = 7,
    D63Pred = 8,
    TmPred = 9,
    NearestMv = 10,
    NearMv = 11,
    ZeroMv = 12,
    NewMv = 13,
}

/// Number of intra prediction modes
pub const INTRA_MODES: usize = 10;
/// Number of inter prediction modes
pub const INTER_MODES: usize = 4;

impl PredictionMode {
    pub const fn is_intra(self) -> bool {
        (self as usize) < INTRA_MODES
    }

    pub const fn is_inter(self) -> bool {
        !self.is_intra()
    }

    /// Offset within the inter mode group (NEARESTMV = 0)
    pub const fn inter_offset(self) -> usize {
        self as usize - PredictionMode::NearestMv as usize
    }

    pub fn intra_from_index(v: u8) -> Self {
        use PredictionMode::*;
        const INTRA: [PredictionMode; INTRA_MODES] = [
            DcPred, VPred, HPred, D45Pred, D135Pred, D117Pred, D153Pred, D207Pred, D63Pred, TmPred,
        ];
        INTRA[(v as usize).min(INTRA_MODES - 1)]
    }

    pub fn inter_from_offset(v: u8) -> Self {
        use PredictionMode::*;
        const INTER: [PredictionMode; INTER_MODES] = [NearestMv, NearMv, ZeroMv, NewMv];
        INTER[(v as usize).min(INTER_MODES - 1)]
    }
}

/// Intra mode syntax tree
pub const INTRA_MODE_TREE: [i8; 18] = [
    0, 2, -9, 4, -1, 6, 8, 12, -2, 10, -4, -5, -3, 14, -8, 16, -6, -7,
];

/// Inter mode syntax tree over NEAREST/NEAR/ZERO/NEW offsets
pub const INTER_MODE_TREE: [i8; 6] = [-2, 2, 0, 4, -1, -3];

/// Segment id syntax tree (8 leaves)
pub const SEGMENT_TREE: [i8; 14] = [2, 4, 6, 8, 10, 12, 0, -1, -2, -3, -4, -5, -6, -7];

// =============================================================================
// Reference Frames
// =============================================================================

/// Reference frame selector for a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceFrame {
    Intra = 0,
    Last = 1,
    Golden = 2,
    AltRef = 3,
}

/// Number of usable inter reference slots per frame header
pub const REFS_PER_FRAME: usize = 3;
/// Number of slots in the reference frame store
pub const NUM_REF_FRAMES: usize = 8;

impl ReferenceFrame {
    pub const fn is_intra(self) -> bool {
        matches!(self, ReferenceFrame::Intra)
    }

    /// Index into the per-header reference arrays (LAST = 0)
    pub const fn ref_index(self) -> usize {
        self as usize - 1
    }
}

// =============================================================================
// Interpolation Filters
// =============================================================================

/// Subpel interpolation filter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationFilter {
    EightTap = 0,
    EightTapSmooth = 1,
    EightTapSharp = 2,
    Bilinear = 3,
    Switchable = 4,
}

/// Interp filter syntax tree (switchable filters only)
pub const INTERP_FILTER_TREE: [i8; 4] = [0, 2, -1, -2];

/// Number of contexts for the switchable filter element
pub const INTERP_FILTER_CONTEXTS: usize = 4;

impl InterpolationFilter {
    /// Header encoding maps 0 -> smooth, 1 -> regular
    pub fn from_header_bits(v: u32) -> Self {
        match v {
            0 => InterpolationFilter::EightTapSmooth,
            1 => InterpolationFilter::EightTap,
            2 => InterpolationFilter::EightTapSharp,
            _ => InterpolationFilter::Bilinear,
        }
    }

    pub fn from_index(v: u8) -> Self {
        match v {
            1 => InterpolationFilter::EightTapSmooth,
            2 => InterpolationFilter::EightTapSharp,
            3 => InterpolationFilter::Bilinear,
            _ => InterpolationFilter::EightTap,
        }
    }

    /// Filter kernel table for this selection
    pub fn kernel(self) -> &'static [[i16; 8]; 16] {
        match self {
            InterpolationFilter::EightTapSmooth => &SUBPEL_FILTERS_SMOOTH,
            InterpolationFilter::EightTapSharp => &SUBPEL_FILTERS_SHARP,
            InterpolationFilter::Bilinear => &SUBPEL_FILTERS_BILINEAR,
            _ => &SUBPEL_FILTERS_REGULAR,
        }
    }
}

// =============================================================================
// Motion Vectors
// =============================================================================

/// Motion vector in 1/8-pixel units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotionVector {
    pub row: i16,
    pub col: i16,
}

impl MotionVector {
    pub const fn new(row: i16, col: i16) -> Self {
        MotionVector { row, col }
    }

    pub const fn zero() -> Self {
        MotionVector { row: 0, col: 0 }
    }

    pub const fn is_zero(self) -> bool {
        self.row == 0 && self.col == 0
    }

    pub fn add(self, other: MotionVector) -> Self {
        MotionVector {
            row: self.row.saturating_add(other.row),
            col: self.col.saturating_add(other.col),
        }
    }

    /// Clamp both components to the given inclusive bounds
    pub fn clamped(self, min_row: i32, max_row: i32, min_col: i32, max_col: i32) -> Self {
        MotionVector {
            row: (self.row as i32).clamp(min_row, max_row) as i16,
            col: (self.col as i32).clamp(min_col, max_col) as i16,
        }
    }
}

/// Motion vector joint categories
pub const MV_JOINTS: usize = 4;
/// Motion vector magnitude classes
pub const MV_CLASSES: usize = 11;
/// Bits in a class-0 magnitude
pub const MV_CLASS0_SIZE: usize = 2;
/// Integer-bit positions above class 0
pub const MV_OFFSET_BITS: usize = 10;
/// Fractional (1/8th) positions
pub const MV_FR_SIZE: usize = 4;
/// Border in 1/8-pixel units that motion vectors may extend past the tile
pub const MV_BORDER: i32 = 128;

/// Motion vector joint tree
pub const MV_JOINT_TREE: [i8; 6] = [0, 2, -1, 4, -2, -3];

/// Motion vector class tree
pub const MV_CLASS_TREE: [i8; 20] = [
    0, 2, -1, 4, 6, 8, -2, -3, 10, 12, -4, -5, -6, 14, 16, 18, -7, -8, -9, -10,
];

/// Motion vector fractional-part tree
pub const MV_FR_TREE: [i8; 6] = [0, 2, -1, 4, -2, -3];

// =============================================================================
// Motion Vector Reference Scan
// =============================================================================

/// Candidate neighbour offsets (row, col in mode-info units) scanned when
/// building the motion vector reference list, per block size
pub const MV_REF_BLOCKS: [[(i8, i8); 8]; BLOCK_SIZES] = [
    // 4x4
    [(-1, 0), (0, -1), (-1, -1), (-2, 0), (0, -2), (-2, -1), (-1, -2), (-2, -2)],
    // 4x8
    [(-1, 0), (0, -1), (-1, -1), (-2, 0), (0, -2), (-2, -1), (-1, -2), (-2, -2)],
    // 8x4
    [(-1, 0), (0, -1), (-1, -1), (-2, 0), (0, -2), (-2, -1), (-1, -2), (-2, -2)],
    // 8x8
    [(-1, 0), (0, -1), (-1, -1), (-2, 0), (0, -2), (-2, -1), (-1, -2), (-2, -2)],
    // 8x16
    [(0, -1), (-1, 0), (1, -1), (-1, -1), (0, -2), (-2, 0), (-2, -1), (-1, -2)],
    // 16x8
    [(-1, 0), (0, -1), (-1, 1), (-1, -1), (-2, 0), (0, -2), (-1, -2), (-2, -1)],
    // 16x16
    [(-1, 0), (0, -1), (-1, 1), (1, -1), (-1, -1), (-3, 0), (0, -3), (-3, -3)],
    // 16x32
    [(0, -1), (-1, 0), (2, -1), (-1, -1), (-1, 1), (0, -3), (-3, 0), (1, -1)],
    // 32x16
    [(-1, 0), (0, -1), (-1, 2), (-1, -1), (1, -1), (-3, 0), (0, -3), (-1, -3)],
    // 32x32
    [(-1, 1), (1, -1), (-1, 2), (2, -1), (-1, -1), (-3, 0), (0, -3), (-3, -3)],
    // 32x64
    [(0, -1), (-1, 0), (4, -1), (-1, 2), (-1, -1), (0, -3), (-3, 0), (2, -1)],
    // 64x32
    [(-1, 0), (0, -1), (-1, 4), (2, -1), (-1, -1), (-3, 0), (0, -3), (-1, 2)],
    // 64x64
    [(-1, 3), (3, -1), (-1, 4), (4, -1), (-1, -1), (-1, 0), (0, -1), (-1, 6)],
];

/// Contribution of a neighbour's mode to the reference-mode counter
pub const MODE_2_COUNTER: [u8; 14] = [9, 10, 10, 9, 9, 9, 9, 9, 9, 9, 0, 0, 3, 1];

/// Number of inter mode probability contexts
pub const INTER_MODE_CONTEXTS: usize = 7;

/// Maps the accumulated reference-mode counter to an inter mode context
pub const COUNTER_TO_CONTEXT: [u8; 19] = [
    2, 3, 4, 1, 3, 5, 0, 5, 5, 5, 5, 5, 5, 5, 6, 6, 6, 6, 6,
];

/// Sub-block index pairs used when collecting candidate motion vectors from
/// the block directly above or to the left of a sub-8x8 block
pub const SUB8X8_MV_CANDIDATE_SUBBLOCKS: [[usize; 2]; 4] = [[1, 2], [1, 3], [3, 2], [3, 3]];

// =============================================================================
// Frame-Level Enums
// =============================================================================

/// Frame type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    KeyFrame,
    InterFrame,
}

impl FrameType {
    pub const fn is_key(self) -> bool {
        matches!(self, FrameType::KeyFrame)
    }
}

/// Bitstream profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Profile0 = 0,
    Profile1 = 1,
    Profile2 = 2,
    Profile3 = 3,
}

/// Color space signalled in the uncompressed header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Unknown = 0,
    Bt601 = 1,
    Bt709 = 2,
    Smpte170 = 3,
    Smpte240 = 4,
    Bt2020 = 5,
    Reserved = 6,
    Rgb = 7,
}

impl ColorSpace {
    pub fn from_bits(v: u32) -> Self {
        match v {
            1 => ColorSpace::Bt601,
            2 => ColorSpace::Bt709,
            3 => ColorSpace::Smpte170,
            4 => ColorSpace::Smpte240,
            5 => ColorSpace::Bt2020,
            6 => ColorSpace::Reserved,
            7 => ColorSpace::Rgb,
            _ => ColorSpace::Unknown,
        }
    }
}

/// Studio or full swing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRange {
    Studio = 0,
    Full = 1,
}

// =============================================================================
// Mode-Info Geometry
// =============================================================================

/// Pixels per mode-info unit
pub const MI_SIZE: usize = 8;
/// log2 of `MI_SIZE`
pub const MI_SIZE_LOG2: usize = 3;
/// Mode-info units per superblock edge
pub const MI_BLOCK_SIZE: usize = 8;
/// Pixels per superblock edge
pub const SB_SIZE: usize = 64;

/// Segmentation constants
pub const MAX_SEGMENTS: usize = 8;
pub const SEG_LVL_ALT_Q: usize = 0;
pub const SEG_LVL_ALT_LF: usize = 1;
pub const SEG_LVL_REF_FRAME: usize = 2;
pub const SEG_LVL_SKIP: usize = 3;
pub const SEG_LVL_MAX: usize = 4;
/// Feature magnitude bit widths, matching `SEG_LVL_*` order
pub const SEGMENTATION_FEATURE_BITS: [u8; SEG_LVL_MAX] = [8, 6, 2, 0];
/// Whether each feature carries a sign bit
pub const SEGMENTATION_FEATURE_SIGNED: [bool; SEG_LVL_MAX] = [true, true, false, false];

/// Tile sizing limits in superblock units
pub const MIN_TILE_WIDTH_B64: usize = 4;
pub const MAX_TILE_WIDTH_B64: usize = 64;

// =============================================================================
// Quantization Tables
// =============================================================================

/// DC quantizer lookup, indexed by `[(bit_depth - 8) >> 1][q_index]`
pub const DC_QLOOKUP: [[u16; 256]; 3] = [
    [
        4, 8, 8, 9, 10, 11, 12, 12, 13, 14, 15, 16, 17, 18, 19, 19, 20, 21, 22, 23, 24, 25, 26,
        26, 27, 28, 29, 30, 31, 32, 32, 33, 34, 35, 36, 37, 38, 38, 39, 40, 41, 42, 43, 43, 44,
        45, 46, 47, 48, 48, 49, 50, 51, 52, 53, 53, 54, 55, 56, 57, 57, 58, 59, 60, 61, 62, 62,
        63, 64, 65, 66, 66, 67, 68, 69, 70, 70, 71, 72, 73, 74, 74, 75, 76, 77, 78, 78, 79, 80,
        81, 81, 82, 83, 84, 85, 85, 87, 88, 90, 92, 93, 95, 96, 98, 99, 101, 102, 104, 105, 107,
        108, 110, 111, 113, 114, 116, 117, 118, 120, 121, 123, 125, 127, 129, 131, 134, 136, 138,
        140, 142, 144, 146, 148, 150, 152, 154, 156, 158, 161, 164, 166, 169, 172, 174, 177, 180,
        182, 185, 187, 190, 192, 195, 199, 202, 205, 208, 211, 214, 217, 220, 223, 226, 230, 233,
        237, 240, 243, 247, 250, 253, 257, 261, 265, 269, 272, 276, 280, 284, 288, 292, 296, 300,
        304, 309, 313, 317, 322, 326, 330, 335, 340, 344, 349, 354, 359, 364, 369, 374, 379, 384,
        389, 395, 400, 406, 411, 417, 423, 429, 435, 441, 447, 454, 461, 467, 475, 482, 489, 497,
        505, 513, 522, 530, 539, 549, 559, 569, 579, 590, 602, 614, 626, 640, 654, 668, 684, 700,
        717, 736, 755, 775, 796, 819, 843, 869, 896, 925, 955, 988, 1022, 1058, 1098, 1139, 1184,
        1232, 1282, 1336,
    ],
    [
        4, 9, 10, 13, 15, 17, 20, 22, 25, 28, 31, 34, 37, 40, 43, 47, 50, 53, 57, 60, 64, 68, 71,
        75, 78, 82, 86, 90, 93, 97, 101, 105, 109, 113, 116, 120, 124, 128, 132, 136, 140, 143,
        147, 151, 155, 159, 163, 166, 170, 174, 178, 182, 185, 189, 193, 197, 200, 204, 208, 212,
        215, 219, 223, 226, 230, 233, 237, 241, 244, 248, 251, 255, 259, 262, 266, 269, 273, 276,
        280, 283, 287, 290, 293, 297, 300, 304, 307, 310, 314, 317, 321, 324, 327, 331, 334, 337,
        343, 350, 356, 362, 369, 375, 381, 387, 394, 400, 406, 412, 418, 424, 430, 436, 442, 448,
        454, 460, 466, 472, 478, 484, 490, 499, 507, 516, 525, 533, 542, 550, 559, 567, 576, 584,
        592, 601, 609, 617, 625, 634, 644, 655, 666, 676, 687, 698, 708, 718, 729, 739, 749, 759,
        770, 782, 795, 807, 819, 831, 844, 856, 868, 880, 891, 906, 920, 933, 947, 961, 975, 988,
        1001, 1015, 1030, 1045, 1061, 1076, 1090, 1105, 1120, 1137, 1153, 1170, 1186, 1202, 1218,
        1236, 1253, 1271, 1288, 1306, 1323, 1342, 1361, 1379, 1398, 1416, 1436, 1456, 1476, 1496,
        1516, 1537, 1559, 1580, 1601, 1624, 1647, 1670, 1692, 1717, 1741, 1766, 1791, 1817, 1844,
        1871, 1900, 1929, 1958, 1990, 2021, 2054, 2088, 2123, 2159, 2197, 2236, 2276, 2319, 2363,
        2410, 2458, 2508, 2561, 2616, 2675, 2737, 2802, 2871, 2944, 3020, 3102, 3188, 3280, 3375,
        3478, 3586, 3702, 3823, 3953, 4089, 4236, 4394, 4559, 4737, 4929, 5130, 5347,
    ],
    [
        4, 12, 18, 25, 33, 41, 50, 60, 70, 80, 91, 103, 115, 127, 140, 153, 166, 180, 194, 208,
        222, 237, 251, 266, 281, 296, 312, 327, 343, 358, 374, 390, 405, 421, 437, 453, 469, 484,
        500, 516, 532, 548, 564, 580, 596, 611, 627, 643, 659, 674, 690, 706, 721, 737, 752, 768,
        783, 798, 814, 829, 844, 859, 874, 889, 904, 919, 934, 949, 964, 978, 993, 1008, 1022,
        1037, 1051, 1065, 1080, 1094, 1108, 1122, 1136, 1151, 1165, 1179, 1192, 1206, 1220, 1234,
        1248, 1261, 1275, 1288, 1302, 1315, 1329, 1342, 1368, 1393, 1419, 1444, 1469, 1494, 1519,
        1544, 1569, 1594, 1618, 1643, 1668, 1692, 1717, 1741, 1765, 1789, 1814, 1838, 1862, 1885,
        1909, 1933, 1957, 1992, 2027, 2061, 2096, 2130, 2165, 2199, 2233, 2267, 2300, 2334, 2367,
        2400, 2434, 2467, 2499, 2532, 2575, 2618, 2661, 2704, 2746, 2788, 2830, 2872, 2913, 2954,
        2995, 3036, 3076, 3127, 3177, 3226, 3275, 3324, 3373, 3421, 3469, 3517, 3565, 3621, 3677,
        3733, 3788, 3843, 3897, 3951, 4005, 4058, 4119, 4181, 4241, 4301, 4361, 4420, 4479, 4546,
        4612, 4677, 4742, 4807, 4871, 4942, 5013, 5083, 5153, 5222, 5291, 5367, 5442, 5517, 5591,
        5665, 5745, 5825, 5905, 5984, 6063, 6149, 6234, 6319, 6404, 6495, 6587, 6678, 6769, 6867,
        6966, 7064, 7163, 7269, 7376, 7483, 7599, 7715, 7832, 7958, 8085, 8214, 8352, 8492, 8635,
        8788, 8945, 9104, 9275, 9450, 9639, 9832, 10031, 10245, 10465, 10702, 10946, 11210, 11482,
        11776, 12081, 12409, 12750, 13118, 13501, 13913, 14343, 14807, 15290, 15812, 16356, 16943,
        17575, 18237, 18949, 19718, 20521, 21387,
    ],
];

/// AC quantizer lookup, indexed by `[(bit_depth - 8) >> 1][q_index]`
pub const AC_QLOOKUP: [[u16; 256]; 3] = [
    [
        4, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29,
        30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48, 49, 50, 51,
        52, 53, 54, 55, 56, 57, 58, 59, 60, 61, 62, 63, 64, 65, 66, 67, 68, 69, 70, 71, 72, 73,
        74, 75, 76, 77, 78, 79, 80, 81, 82, 83, 84, 85, 86, 87, 88, 89, 90, 91, 92, 93, 94, 95,
        96, 97, 98, 99, 100, 101, 102, 104, 106, 108, 110, 112, 114, 116, 118, 120, 122, 124, 126,
        128, 130, 132, 134, 136, 138, 140, 142, 144, 146, 148, 150, 152, 155, 158, 161, 164, 167,
        170, 173, 176, 179, 182, 185, 188, 191, 194, 197, 200, 203, 207, 211, 215, 219, 223, 227,
        231, 235, 239, 243, 247, 251, 255, 260, 265, 270, 275, 280, 285, 290, 295, 300, 305, 311,
        317, 323, 329, 335, 341, 347, 353, 359, 366, 373, 380, 387, 394, 401, 408, 416, 424, 432,
        440, 448, 456, 465, 474, 483, 492, 501, 510, 520, 530, 540, 550, 560, 571, 582, 593, 604,
        615, 627, 639, 651, 663, 676, 689, 702, 715, 729, 743, 757, 771, 786, 801, 816, 832, 848,
        864, 881, 898, 915, 933, 951, 969, 988, 1007, 1026, 1046, 1066, 1087, 1108, 1129, 1151,
        1173, 1196, 1219, 1243, 1267, 1292, 1317, 1343, 1369, 1396, 1423, 1451, 1479, 1508, 1537,
        1567, 1597, 1628, 1660, 1692, 1725, 1759, 1793, 1828,
    ],
    [
        4, 9, 11, 13, 16, 18, 21, 24, 27, 30, 33, 37, 40, 44, 48, 51, 55, 59, 63, 67, 71, 75, 79,
        83, 88, 92, 96, 100, 105, 109, 114, 118, 122, 127, 131, 136, 140, 145, 149, 154, 158, 163,
        168, 172, 177, 181, 186, 190, 195, 199, 204, 208, 213, 217, 222, 226, 231, 235, 240, 244,
        249, 253, 258, 262, 267, 271, 275, 280, 284, 289, 293, 297, 302, 306, 311, 315, 319, 324,
        328, 332, 337, 341, 345, 349, 354, 358, 362, 367, 371, 375, 379, 384, 388, 392, 396, 401,
        409, 417, 425, 433, 441, 449, 458, 466, 474, 482, 490, 498, 506, 514, 523, 531, 539, 547,
        555, 563, 571, 579, 588, 596, 604, 616, 628, 640, 652, 664, 676, 688, 700, 713, 725, 737,
        749, 761, 773, 785, 797, 809, 825, 841, 857, 873, 889, 905, 922, 938, 954, 970, 986, 1002,
        1018, 1038, 1058, 1078, 1098, 1118, 1138, 1158, 1178, 1198, 1218, 1242, 1266, 1290, 1314,
        1338, 1362, 1386, 1411, 1435, 1463, 1491, 1519, 1547, 1575, 1603, 1631, 1663, 1695, 1727,
        1759, 1791, 1823, 1859, 1895, 1931, 1967, 2003, 2039, 2079, 2119, 2159, 2199, 2239, 2283,
        2327, 2371, 2415, 2459, 2507, 2555, 2603, 2651, 2703, 2755, 2807, 2859, 2915, 2971, 3027,
        3083, 3143, 3203, 3263, 3327, 3391, 3455, 3523, 3591, 3659, 3731, 3803, 3876, 3952, 4028,
        4104, 4184, 4264, 4348, 4432, 4516, 4604, 4692, 4784, 4876, 4972, 5068, 5168, 5268, 5372,
        5476, 5584, 5692, 5804, 5916, 6032, 6148, 6268, 6388, 6512, 6640, 6768, 6900, 7036, 7172,
        7312,
    ],
    [
        4, 13, 19, 27, 35, 44, 54, 64, 75, 87, 99, 112, 126, 139, 154, 168, 183, 199, 214, 230,
        247, 263, 280, 297, 314, 331, 349, 366, 384, 402, 420, 438, 456, 475, 493, 511, 530, 548,
        567, 586, 604, 623, 642, 660, 679, 698, 716, 735, 753, 772, 791, 809, 828, 846, 865, 884,
        902, 920, 939, 957, 976, 994, 1012, 1030, 1049, 1067, 1085, 1103, 1121, 1139, 1157, 1175,
        1193, 1211, 1229, 1246, 1264, 1282, 1299, 1317, 1335, 1352, 1370, 1387, 1405, 1422, 1440,
        1457, 1474, 1491, 1509, 1526, 1543, 1560, 1577, 1595, 1627, 1660, 1693, 1725, 1758, 1791,
        1824, 1856, 1889, 1922, 1954, 1987, 2020, 2052, 2085, 2118, 2150, 2183, 2216, 2248, 2281,
        2313, 2346, 2378, 2411, 2459, 2508, 2556, 2605, 2653, 2701, 2750, 2798, 2847, 2895, 2943,
        2992, 3040, 3088, 3137, 3185, 3234, 3298, 3362, 3426, 3491, 3555, 3619, 3684, 3748, 3812,
        3876, 3941, 4005, 4069, 4149, 4230, 4310, 4390, 4470, 4550, 4631, 4711, 4791, 4871, 4967,
        5064, 5160, 5256, 5352, 5448, 5544, 5641, 5737, 5849, 5961, 6073, 6185, 6297, 6410, 6522,
        6650, 6778, 6906, 7034, 7162, 7290, 7435, 7579, 7723, 7867, 8011, 8155, 8315, 8475, 8635,
        8795, 8956, 9132, 9308, 9484, 9660, 9836, 10028, 10220, 10412, 10604, 10812, 11020, 11228,
        11437, 11661, 11885, 12109, 12333, 12573, 12813, 13053, 13309, 13565, 13821, 14093, 14365,
        14637, 14925, 15213, 15502, 15806, 16110, 16414, 16734, 17054, 17390, 17726, 18062, 18414,
        18766, 19134, 19502, 19886, 20270, 20670, 21070, 21486, 21902, 22334, 22766, 23214, 23662,
        24126, 24590, 25070, 25551, 26047, 26559, 27071, 27599, 28143, 28687, 29247,
    ],
];

// =============================================================================
// Interpolation Filter Kernels
// =============================================================================

/// 8-tap regular interpolation filter, indexed by `[subpel_position][tap]`
pub const SUBPEL_FILTERS_REGULAR: [[i16; 8]; 16] = [
    [0, 0, 0, 128, 0, 0, 0, 0],
    [0, 1, -5, 126, 8, -3, 1, 0],
    [-1, 3, -10, 122, 18, -6, 2, 0],
    [-1, 4, -13, 118, 27, -9, 3, -1],
    [-1, 4, -16, 112, 37, -11, 4, -1],
    [-1, 5, -18, 105, 48, -14, 4, -1],
    [-1, 5, -19, 97, 58, -16, 5, -1],
    [-1, 6, -19, 88, 68, -18, 5, -1],
    [-1, 6, -19, 78, 78, -19, 6, -1],
    [-1, 5, -18, 68, 88, -19, 6, -1],
    [-1, 5, -16, 58, 97, -19, 5, -1],
    [-1, 4, -14, 48, 105, -18, 5, -1],
    [-1, 4, -11, 37, 112, -16, 4, -1],
    [-1, 3, -9, 27, 118, -13, 4, -1],
    [0, 2, -6, 18, 122, -10, 3, -1],
    [0, 1, -3, 8, 126, -5, 1, 0],
];

/// 8-tap smooth interpolation filter
pub const SUBPEL_FILTERS_SMOOTH: [[i16; 8]; 16] = [
    [0, 0, 0, 128, 0, 0, 0, 0],
    [-3, -1, 32, 64, 38, 1, -3, 0],
    [-2, -2, 29, 63, 41, 2, -3, 0],
    [-2, -2, 26, 63, 44, 3, -4, 0],
    [-2, -3, 24, 62, 46, 4, -4, 1],
    [-2, -3, 21, 60, 49, 6, -4, 1],
    [-1, -4, 18, 59, 51, 7, -4, 2],
    [-1, -4, 16, 57, 53, 9, -4, 2],
    [-1, -4, 14, 55, 55, 14, -4, -1],
    [2, -4, 9, 53, 57, 16, -4, -1],
    [2, -4, 7, 51, 59, 18, -4, -1],
    [1, -4, 6, 49, 60, 21, -3, -2],
    [1, -4, 4, 46, 62, 24, -3, -2],
    [0, -4, 3, 44, 63, 26, -2, -2],
    [0, -3, 2, 41, 63, 29, -2, -2],
    [0, -3, 1, 38, 64, 32, -1, -3],
];

/// 8-tap sharp interpolation filter
pub const SUBPEL_FILTERS_SHARP: [[i16; 8]; 16] = [
    [0, 0, 0, 128, 0, 0, 0, 0],
    [-1, 3, -7, 127, 8, -3, 1, 0],
    [-2, 5, -13, 125, 17, -6, 3, -1],
    [-3, 7, -17, 121, 27, -10, 5, -2],
    [-4, 9, -20, 115, 37, -13, 6, -2],
    [-4, 10, -23, 108, 48, -16, 8, -3],
    [-4, 10, -24, 100, 59, -19, 9, -3],
    [-4, 11, -24, 90, 70, -21, 10, -4],
    [-4, 11, -23, 80, 80, -23, 11, -4],
    [-4, 10, -21, 70, 90, -24, 11, -4],
    [-3, 9, -19, 59, 100, -24, 10, -4],
    [-3, 8, -16, 48, 108, -23, 10, -4],
    [-2, 6, -13, 37, 115, -20, 9, -4],
    [-2, 5, -10, 27, 121, -17, 7, -3],
    [-1, 3, -6, 17, 125, -13, 5, -2],
    [0, 1, -3, 8, 127, -7, 3, -1],
];

/// Bilinear filter expressed as an 8-tap kernel so all filters share a path
pub const SUBPEL_FILTERS_BILINEAR: [[i16; 8]; 16] = [
    [0, 0, 0, 128, 0, 0, 0, 0],
    [0, 0, 0, 120, 8, 0, 0, 0],
    [0, 0, 0, 112, 16, 0, 0, 0],
    [0, 0, 0, 104, 24, 0, 0, 0],
    [0, 0, 0, 96, 32, 0, 0, 0],
    [0, 0, 0, 88, 40, 0, 0, 0],
    [0, 0, 0, 80, 48, 0, 0, 0],
    [0, 0, 0, 72, 56, 0, 0, 0],
    [0, 0, 0, 64, 64, 0, 0, 0],
    [0, 0, 0, 56, 72, 0, 0, 0],
    [0, 0, 0, 48, 80, 0, 0, 0],
    [0, 0, 0, 40, 88, 0, 0, 0],
    [0, 0, 0, 32, 96, 0, 0, 0],
    [0, 0, 0, 24, 104, 0, 0, 0],
    [0, 0, 0, 16, 112, 0, 0, 0],
    [0, 0, 0, 8, 120, 0, 0, 0],
];

// =============================================================================
// Scan Orders
// =============================================================================

/// Scan order variants selected by the transform type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    Default,
    Row,
    Col,
}

/// Default scan for 4x4 blocks
pub const DEFAULT_SCAN_4X4: [u16; 16] =
    [0, 4, 1, 5, 8, 2, 12, 9, 3, 6, 13, 10, 7, 14, 11, 15];

const fn diagonal_scan<const N: usize, const EDGE: usize>() -> [u16; N] {
    let mut scan = [0u16; N];
    let mut i = 0;
    let mut diag = 0;
    while i < N {
        let mut x = if diag < EDGE { 0 } else { diag - EDGE + 1 };
        loop {
            let y = diag - x;
            if y >= EDGE {
                x += 1;
                continue;
            }
            scan[i] = (y * EDGE + x) as u16;
            i += 1;
            if y == 0 || x + 1 >= EDGE || i >= N {
                break;
            }
            x += 1;
        }
        diag += 1;
    }
    scan
}

/// Row-biased scan (columns advance fastest), used when the row transform
/// is an ADST
const fn row_scan<const N: usize, const EDGE: usize>() -> [u16; N] {
    let mut scan = [0u16; N];
    let mut i = 0;
    while i < N {
        scan[i] = i as u16;
        i += 1;
    }
    scan
}

/// Column-biased scan (rows advance fastest), used when the column
/// transform is an ADST
const fn col_scan<const N: usize, const EDGE: usize>() -> [u16; N] {
    let mut scan = [0u16; N];
    let mut i = 0;
    while i < N {
        let x = i / EDGE;
        let y = i % EDGE;
        scan[i] = (y * EDGE + x) as u16;
        i += 1;
    }
    scan
}

pub const DEFAULT_SCAN_8X8: [u16; 64] = diagonal_scan::<64, 8>();
pub const DEFAULT_SCAN_16X16: [u16; 256] = diagonal_scan::<256, 16>();
pub const DEFAULT_SCAN_32X32: [u16; 1024] = diagonal_scan::<1024, 32>();

/// Row-biased scan for 4x4 blocks
pub const ROW_SCAN_4X4: [u16; 16] =
    [0, 1, 4, 2, 5, 3, 6, 8, 9, 7, 12, 10, 13, 11, 14, 15];
pub const ROW_SCAN_8X8: [u16; 64] = row_scan::<64, 8>();
pub const ROW_SCAN_16X16: [u16; 256] = row_scan::<256, 16>();

/// Column-biased scan for 4x4 blocks
pub const COL_SCAN_4X4: [u16; 16] =
    [0, 4, 8, 1, 12, 5, 9, 2, 13, 6, 10, 3, 7, 14, 11, 15];
pub const COL_SCAN_8X8: [u16; 64] = col_scan::<64, 8>();
pub const COL_SCAN_16X16: [u16; 256] = col_scan::<256, 16>();

/// Scan table for a transform size and type
pub fn scan_order(tx_size: TxSize, tx_type: TxType) -> &'static [u16] {
    let order = match tx_type {
        TxType::AdstDct => ScanOrder::Row,
        TxType::DctAdst => ScanOrder::Col,
        _ => ScanOrder::Default,
    };
    match (tx_size, order) {
        (TxSize::Tx4x4, ScanOrder::Row) => &ROW_SCAN_4X4,
        (TxSize::Tx4x4, ScanOrder::Col) => &COL_SCAN_4X4,
        (TxSize::Tx4x4, ScanOrder::Default) => &DEFAULT_SCAN_4X4,
        (TxSize::Tx8x8, ScanOrder::Row) => &ROW_SCAN_8X8,
        (TxSize::Tx8x8, ScanOrder::Col) => &COL_SCAN_8X8,
        (TxSize::Tx8x8, ScanOrder::Default) => &DEFAULT_SCAN_8X8,
        (TxSize::Tx16x16, ScanOrder::Row) => &ROW_SCAN_16X16,
        (TxSize::Tx16x16, ScanOrder::Col) => &COL_SCAN_16X16,
        (TxSize::Tx16x16, ScanOrder::Default) => &DEFAULT_SCAN_16X16,
        // 32x32 blocks always use the default scan
        (TxSize::Tx32x32, _) => &DEFAULT_SCAN_32X32,
    }
}

// =============================================================================
// Coefficient Bands and Tokens
// =============================================================================

/// Coefficient band per scan position, 4x4 transforms
pub const COEFBAND_4X4: [u8; 16] = [0, 1, 1, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 5, 5, 5];

/// Coefficient band per scan position, 8x8 and larger transforms
pub const COEFBAND_8X8PLUS: [u8; 1024] = {
    let mut bands = [5u8; 1024];
    let head = [0u8, 1, 1, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 4, 4];
    let mut i = 0;
    while i < 16 {
        bands[i] = head[i];
        i += 1;
    }
    bands
};

/// Number of coefficient bands
pub const COEF_BANDS: usize = 6;
/// Number of coefficient probability contexts within a band
pub const COEF_CONTEXTS: usize = 6;
/// Stored model probabilities per band context
pub const COEF_MODEL_PROBS: usize = 3;

/// Energy class of each token, cached to form later coefficient contexts
pub const TOKEN_ENERGY_CLASS: [u8; 12] = [0, 1, 2, 3, 3, 4, 4, 5, 5, 5, 5, 5];

/// Base values of the six extra-bit token categories
pub const CAT_BASE: [i32; 6] = [5, 7, 11, 19, 35, 67];

/// Extra-bit probabilities for categories 1 through 6
pub const CAT1_PROBS: [u8; 1] = [159];
pub const CAT2_PROBS: [u8; 2] = [165, 145];
pub const CAT3_PROBS: [u8; 3] = [173, 148, 140];
pub const CAT4_PROBS: [u8; 4] = [176, 155, 140, 135];
pub const CAT5_PROBS: [u8; 5] = [180, 157, 141, 134, 130];
pub const CAT6_PROBS: [u8; 14] = [
    254, 254, 254, 252, 249, 243, 230, 196, 177, 153, 140, 133, 130, 129,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_size_geometry() {
        assert_eq!(BlockSize::Block4x4.width(), 4);
        assert_eq!(BlockSize::Block64x64.height(), 64);
        assert_eq!(BlockSize::Block8x16.width_mi(), 1);
        assert_eq!(BlockSize::Block8x16.height_mi(), 2);
        assert_eq!(BlockSize::Block4x8.width_mi(), 1);
        assert!(BlockSize::Block8x4.is_sub_8x8());
        assert!(!BlockSize::Block8x8.is_sub_8x8());
    }

    #[test]
    fn test_subsize_lookup() {
        assert_eq!(
            get_subsize(BlockSize::Block64x64, Partition::Split),
            BlockSize::Block32x32
        );
        assert_eq!(
            get_subsize(BlockSize::Block16x16, Partition::Horizontal),
            BlockSize::Block16x8
        );
        assert_eq!(
            get_subsize(BlockSize::Block8x8, Partition::Vertical),
            BlockSize::Block4x8
        );
        assert_eq!(
            get_subsize(BlockSize::Block32x32, Partition::None),
            BlockSize::Block32x32
        );
    }

    #[test]
    fn test_tx_size() {
        assert_eq!(TxSize::Tx4x4.num_coeffs(), 16);
        assert_eq!(TxSize::Tx32x32.num_coeffs(), 1024);
        assert_eq!(TxSize::Tx16x16.log2(), 4);
        assert_eq!(BlockSize::Block16x8.max_tx_size(), TxSize::Tx8x8);
    }

    #[test]
    fn test_scan_tables_are_permutations() {
        fn check(scan: &[u16]) {
            let mut seen = vec![false; scan.len()];
            for &s in scan {
                assert!(!seen[s as usize]);
                seen[s as usize] = true;
            }
        }
        check(&DEFAULT_SCAN_4X4);
        check(&DEFAULT_SCAN_8X8);
        check(&DEFAULT_SCAN_16X16);
        check(&DEFAULT_SCAN_32X32);
        check(&COL_SCAN_16X16);
        check(&ROW_SCAN_8X8);
    }

    #[test]
    fn test_4x4_scan_values() {
        assert_eq!(
            DEFAULT_SCAN_4X4,
            [0, 4, 1, 5, 8, 2, 12, 9, 3, 6, 13, 10, 7, 14, 11, 15]
        );
        assert_eq!(
            ROW_SCAN_4X4,
            [0, 1, 4, 2, 5, 3, 6, 8, 9, 7, 12, 10, 13, 11, 14, 15]
        );
        assert_eq!(
            COL_SCAN_4X4,
            [0, 4, 8, 1, 12, 5, 9, 2, 13, 6, 10, 3, 7, 14, 11, 15]
        );
    }

    #[test]
    fn test_scan_starts_at_dc() {
        for tx in [TxSize::Tx4x4, TxSize::Tx8x8, TxSize::Tx16x16, TxSize::Tx32x32] {
            for ty in [TxType::DctDct, TxType::AdstDct, TxType::DctAdst, TxType::AdstAdst] {
                let scan = scan_order(tx, ty);
                assert_eq!(scan.len(), tx.num_coeffs());
                assert_eq!(scan[0], 0);
            }
        }
    }

    #[test]
    fn test_quant_tables_monotonic() {
        for table in DC_QLOOKUP.iter().chain(AC_QLOOKUP.iter()) {
            for w in table.windows(2) {
                assert!(w[0] <= w[1]);
            }
        }
    }

    #[test]
    fn test_filter_kernels_sum_to_128() {
        for kernels in [
            &SUBPEL_FILTERS_REGULAR,
            &SUBPEL_FILTERS_SMOOTH,
            &SUBPEL_FILTERS_SHARP,
            &SUBPEL_FILTERS_BILINEAR,
        ] {
            for kernel in kernels.iter() {
                let sum: i16 = kernel.iter().sum();
                assert_eq!(sum, 128);
            }
        }
    }

    #[test]
    fn test_intra_mode_tree_leaves() {
        // Every intra mode must be reachable exactly once.
        let mut leaves: Vec<i8> = INTRA_MODE_TREE.iter().copied().filter(|&v| v <= 0).collect();
        leaves.sort_unstable();
        let expected: Vec<i8> = (0..INTRA_MODES as i8).map(|m| -m).rev().collect();
        assert_eq!(leaves, expected);
    }

    #[test]
    fn test_segment_tree_balanced() {
        let leaves: Vec<i8> = SEGMENT_TREE.iter().copied().filter(|&v| v <= 0).collect();
        assert_eq!(leaves.len(), MAX_SEGMENTS);
    }

    #[test]
    fn test_mode_2_counter_in_table_range() {
        // Two neighbours can contribute at most twice the largest counter.
        let max = *MODE_2_COUNTER.iter().max().unwrap() as usize;
        assert!(max <= COUNTER_TO_CONTEXT.len() - 1 || max * 2 >= COUNTER_TO_CONTEXT.len());
        for &ctx in COUNTER_TO_CONTEXT.iter() {
            assert!((ctx as usize) < INTER_MODE_CONTEXTS);
        }
    }

    #[test]
    fn test_coefband_covers_all_positions() {
        for &b in COEFBAND_4X4.iter() {
            assert!((b as usize) < COEF_BANDS);
        }
        assert_eq!(
            COEFBAND_8X8PLUS[..16],
            [0, 1, 1, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 4, 4]
        );
        assert!(COEFBAND_8X8PLUS[16..].iter().all(|&b| b == 5));
    }
}
