//! Uncompressed frame header and superframe index parsing
//!
//! The uncompressed header is plain big-endian bit fields; everything after
//! `header_size_in_bytes` is bool-coded and handled elsewhere. Several header
//! fields are sticky across frames (color config, loop filter deltas,
//! segmentation features), so parsing goes through a persistent
//! [`HeaderState`].

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use crate::bitstream::BitReader;
use crate::error::{Error, Result};
use crate::tables::{
    ColorRange, ColorSpace, FrameType, InterpolationFilter, Profile, MAX_SEGMENTS,
    MAX_TILE_WIDTH_B64, MIN_TILE_WIDTH_B64, NUM_REF_FRAMES, REFS_PER_FRAME, SEGMENTATION_FEATURE_BITS,
    SEGMENTATION_FEATURE_SIGNED, SEG_LVL_ALT_Q, SEG_LVL_MAX, SEG_LVL_SKIP,
};

/// Frame sync code that starts key and intra-only frame headers
const FRAME_SYNC_CODE: u32 = 0x498342;

// =============================================================================
// Superframes
// =============================================================================

/// Split a chunk into the frame sizes listed in its superframe index
///
/// Returns `None` when the chunk is not a superframe, in which case the whole
/// chunk is a single frame. The index lives at the end of the chunk: a marker
/// byte, little-endian frame sizes, and a repeat of the marker byte.
pub fn parse_superframe_sizes(data: &[u8]) -> Option<Vec<usize>> {
    let last = *data.last()?;
    if last & 0b1110_0000 != 0b1100_0000 {
        return None;
    }

    let bytes_per_size = (((last >> 3) & 0b11) + 1) as usize;
    let frame_count = ((last & 0b111) + 1) as usize;
    let index_size = 2 + bytes_per_size * frame_count;
    if index_size > data.len() {
        return None;
    }

    let index = &data[data.len() - index_size..];
    // The first byte of the index must match the final byte of the chunk.
    if index[0] != last {
        return None;
    }

    let mut sizes = Vec::with_capacity(frame_count);
    for i in 0..frame_count {
        let offset = 1 + i * bytes_per_size;
        let size = LittleEndian::read_uint(&index[offset..offset + bytes_per_size], bytes_per_size);
        sizes.push(size as usize);
    }
    debug!(frames = frame_count, "parsed superframe index");
    Some(sizes)
}

// =============================================================================
// Header Types
// =============================================================================

/// Bit depth, color space and chroma layout from the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorConfig {
    pub bit_depth: u8,
    pub color_space: ColorSpace,
    pub color_range: ColorRange,
    pub subsampling_x: bool,
    pub subsampling_y: bool,
}

impl Default for ColorConfig {
    fn default() -> Self {
        ColorConfig {
            bit_depth: 8,
            color_space: ColorSpace::Bt601,
            color_range: ColorRange::Studio,
            subsampling_x: true,
            subsampling_y: true,
        }
    }
}

/// Loop filter fields; parsed and carried on the frame but not applied
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopFilterParams {
    pub level: u8,
    pub sharpness: u8,
    pub delta_enabled: bool,
    pub ref_deltas: [i8; 4],
    pub mode_deltas: [i8; 2],
}

/// Quantizer indices from the header
#[derive(Debug, Clone, Copy, Default)]
pub struct QuantizationParams {
    pub base_q_idx: u8,
    pub delta_q_y_dc: i8,
    pub delta_q_uv_dc: i8,
    pub delta_q_uv_ac: i8,
}

impl QuantizationParams {
    /// A frame is lossless when every index and delta is zero
    pub fn is_lossless(&self) -> bool {
        self.base_q_idx == 0
            && self.delta_q_y_dc == 0
            && self.delta_q_uv_dc == 0
            && self.delta_q_uv_ac == 0
    }
}

/// One enabled/value pair per segment feature
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentFeature {
    pub enabled: bool,
    pub value: i16,
}

/// Segmentation map and feature data
#[derive(Debug, Clone, Copy)]
pub struct SegmentationParams {
    pub enabled: bool,
    pub update_map: bool,
    pub tree_probs: [u8; 7],
    pub temporal_update: bool,
    pub pred_probs: [u8; 3],
    pub abs_delta: bool,
    pub features: [[SegmentFeature; SEG_LVL_MAX]; MAX_SEGMENTS],
}

impl Default for SegmentationParams {
    fn default() -> Self {
        SegmentationParams {
            enabled: false,
            update_map: false,
            tree_probs: [255; 7],
            temporal_update: false,
            pred_probs: [255; 3],
            abs_delta: false,
            features: [[SegmentFeature::default(); SEG_LVL_MAX]; MAX_SEGMENTS],
        }
    }
}

impl SegmentationParams {
    /// Active feature value for a segment, `None` when disabled
    pub fn feature(&self, segment_id: u8, feature: usize) -> Option<i16> {
        if !self.enabled {
            return None;
        }
        let entry = &self.features[segment_id as usize][feature];
        entry.enabled.then_some(entry.value)
    }

    pub fn segment_forces_skip(&self, segment_id: u8) -> bool {
        self.feature(segment_id, SEG_LVL_SKIP).is_some()
    }
}

/// What to do with the four stored probability contexts before this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetFrameContext {
    /// Keep all stored contexts
    Keep,
    /// Reset the context selected by `frame_context_idx` to defaults
    Current,
    /// Reset all four contexts to defaults
    All,
}

/// Fully parsed uncompressed header for a frame carrying coded data
#[derive(Debug, Clone)]
pub struct FrameHeader {
    pub profile: Profile,
    pub frame_type: FrameType,
    pub intra_only: bool,
    pub show_frame: bool,
    pub error_resilient_mode: bool,
    pub color: ColorConfig,

    pub width: u32,
    pub height: u32,
    pub render_width: u32,
    pub render_height: u32,

    /// Bitmask of reference slots this frame is stored into
    pub refresh_frame_flags: u8,
    /// Slot index for LAST, GOLDEN and ALTREF
    pub ref_frame_indices: [u8; REFS_PER_FRAME],
    pub ref_frame_sign_bias: [bool; REFS_PER_FRAME],
    pub allow_high_precision_mv: bool,
    pub interpolation_filter: InterpolationFilter,

    pub refresh_frame_context: bool,
    pub frame_parallel_decoding_mode: bool,
    pub frame_context_idx: u8,
    pub reset_frame_context: ResetFrameContext,
    /// Previous frame's motion field may seed MV candidate scans
    pub use_prev_frame_mvs: bool,

    pub loop_filter: LoopFilterParams,
    pub quant: QuantizationParams,
    pub lossless: bool,
    pub segmentation: SegmentationParams,

    pub tile_cols_log2: u8,
    pub tile_rows_log2: u8,
    /// Size of the bool-coded compressed header that follows
    pub header_size_in_bytes: u16,
    /// Byte offset where the compressed header starts
    pub uncompressed_header_size_in_bytes: usize,
}

impl FrameHeader {
    pub fn is_intra(&self) -> bool {
        self.frame_type.is_key() || self.intra_only
    }

    pub fn mi_cols(&self) -> usize {
        ((self.width as usize) + 7) >> 3
    }

    pub fn mi_rows(&self) -> usize {
        ((self.height as usize) + 7) >> 3
    }

    pub fn sb64_cols(&self) -> usize {
        (self.mi_cols() + 7) >> 3
    }

    pub fn sb64_rows(&self) -> usize {
        (self.mi_rows() + 7) >> 3
    }

    pub fn tile_cols(&self) -> usize {
        1 << self.tile_cols_log2
    }

    pub fn tile_rows(&self) -> usize {
        1 << self.tile_rows_log2
    }
}

/// Outcome of parsing one frame's uncompressed header
#[derive(Debug, Clone)]
pub enum ParsedHeader {
    /// Directly re-present a stored reference frame
    ShowExisting(u8),
    /// A frame with coded data follows
    Frame(FrameHeader),
}

// =============================================================================
// Parsing
// =============================================================================

/// Header fields that persist from one frame to the next
pub struct HeaderState {
    color: ColorConfig,
    have_color: bool,
    lf_ref_deltas: [i8; 4],
    lf_mode_deltas: [i8; 2],
    abs_delta: bool,
    features: [[SegmentFeature; SEG_LVL_MAX]; MAX_SEGMENTS],
    first_frame: bool,
    prev_size: (u32, u32),
    prev_show_frame: bool,
}

impl Default for HeaderState {
    fn default() -> Self {
        let mut state = HeaderState {
            color: ColorConfig::default(),
            have_color: false,
            lf_ref_deltas: [0; 4],
            lf_mode_deltas: [0; 2],
            abs_delta: false,
            features: [[SegmentFeature::default(); SEG_LVL_MAX]; MAX_SEGMENTS],
            first_frame: true,
            prev_size: (0, 0),
            prev_show_frame: false,
        };
        state.reset_deltas();
        state
    }
}

impl HeaderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults restored whenever past independence is set up
    fn reset_deltas(&mut self) {
        self.lf_ref_deltas = [1, 0, -1, -1];
        self.lf_mode_deltas = [0, 0];
        self.abs_delta = false;
        self.features = [[SegmentFeature::default(); SEG_LVL_MAX]; MAX_SEGMENTS];
    }

    /// Parse one frame's uncompressed header
    ///
    /// `ref_sizes` holds the dimensions of each populated reference slot so
    /// that inter frames can inherit their size from a reference.
    pub fn parse_uncompressed_header(
        &mut self,
        data: &[u8],
        ref_sizes: &[Option<(u32, u32)>; NUM_REF_FRAMES],
    ) -> Result<ParsedHeader> {
        let mut reader = BitReader::new(data);

        let frame_marker = reader.read_bits(2)?;
        if frame_marker != 2 {
            return Err(Error::corrupted("frame marker must be 2"));
        }

        let profile_low = reader.read_bit()? as u8;
        let profile_high = reader.read_bit()? as u8;
        let profile = match (profile_high << 1) | profile_low {
            0 => Profile::Profile0,
            1 => Profile::Profile1,
            2 => Profile::Profile2,
            _ => Profile::Profile3,
        };
        if profile == Profile::Profile3 && reader.read_bit()? {
            return Err(Error::corrupted("profile 3 reserved bit was set"));
        }

        if reader.read_bit()? {
            let slot = reader.read_bits(3)? as u8;
            return Ok(ParsedHeader::ShowExisting(slot));
        }

        let is_keyframe = !reader.read_bit()?;
        let show_frame = reader.read_bit()?;
        let error_resilient_mode = reader.read_bit()?;

        let frame_type;
        let mut intra_only = false;
        let mut refresh_frame_flags = 0xFFu8;
        let mut ref_frame_indices = [0u8; REFS_PER_FRAME];
        let mut ref_frame_sign_bias = [false; REFS_PER_FRAME];
        let mut allow_high_precision_mv = false;
        let mut interpolation_filter = InterpolationFilter::EightTap;
        let mut reset_frame_context = ResetFrameContext::All;
        let size;
        let render_size;

        if is_keyframe {
            frame_type = FrameType::KeyFrame;
            read_frame_sync_code(&mut reader)?;
            self.color = parse_color_config(&mut reader, profile)?;
            self.have_color = true;
            size = parse_frame_size(&mut reader)?;
            render_size = parse_render_size(&mut reader, size)?;
        } else {
            frame_type = FrameType::InterFrame;
            if !show_frame {
                intra_only = reader.read_bit()?;
            }
            if !intra_only {
                reset_frame_context = ResetFrameContext::Keep;
            }
            if !error_resilient_mode {
                reset_frame_context = match reader.read_bits(2)? {
                    0 | 1 => ResetFrameContext::Keep,
                    2 => ResetFrameContext::Current,
                    _ => ResetFrameContext::All,
                };
            }

            if intra_only {
                read_frame_sync_code(&mut reader)?;
                if profile == Profile::Profile0 {
                    self.color = ColorConfig::default();
                } else {
                    self.color = parse_color_config(&mut reader, profile)?;
                }
                self.have_color = true;
                refresh_frame_flags = reader.read_bits(8)? as u8;
                size = parse_frame_size(&mut reader)?;
                render_size = parse_render_size(&mut reader, size)?;
            } else {
                if !self.have_color {
                    return Err(Error::corrupted("inter frame before any color config"));
                }
                refresh_frame_flags = reader.read_bits(NUM_REF_FRAMES as u8)? as u8;
                for i in 0..REFS_PER_FRAME {
                    ref_frame_indices[i] = reader.read_bits(3)? as u8;
                    ref_frame_sign_bias[i] = reader.read_bit()?;
                }
                size = parse_frame_size_with_refs(&mut reader, &ref_frame_indices, ref_sizes)?;
                render_size = parse_render_size(&mut reader, size)?;
                allow_high_precision_mv = reader.read_bit()?;
                interpolation_filter = read_interpolation_filter(&mut reader)?;
            }
        }

        let mut refresh_frame_context = false;
        let mut frame_parallel_decoding_mode = true;
        if !error_resilient_mode {
            refresh_frame_context = reader.read_bit()?;
            frame_parallel_decoding_mode = reader.read_bit()?;
        }
        let mut frame_context_idx = reader.read_bits(2)? as u8;

        match reset_frame_context {
            ResetFrameContext::All | ResetFrameContext::Current => {
                self.reset_deltas();
                frame_context_idx = 0;
            }
            ResetFrameContext::Keep => {}
        }

        let is_intra = is_keyframe || intra_only;
        let use_prev_frame_mvs = !self.first_frame
            && self.prev_size == size
            && self.prev_show_frame
            && !error_resilient_mode
            && !is_intra;
        self.first_frame = false;
        self.prev_size = size;
        self.prev_show_frame = show_frame;

        let loop_filter = self.parse_loop_filter_params(&mut reader)?;
        let quant = parse_quantization_params(&mut reader)?;
        let segmentation = self.parse_segmentation_params(&mut reader)?;

        let mi_cols = ((size.0 as usize) + 7) >> 3;
        let sb64_cols = (mi_cols + 7) >> 3;
        let (tile_cols_log2, tile_rows_log2) = parse_tile_counts(&mut reader, sb64_cols)?;

        let header_size_in_bytes = reader.read_bits(16)? as u16;
        if header_size_in_bytes == 0 {
            return Err(Error::corrupted("compressed header is zero-sized"));
        }
        reader.byte_align()?;
        let uncompressed_header_size_in_bytes = reader.position();

        let lossless = quant.is_lossless();
        Ok(ParsedHeader::Frame(FrameHeader {
            profile,
            frame_type,
            intra_only,
            show_frame,
            error_resilient_mode,
            color: self.color,
            width: size.0,
            height: size.1,
            render_width: render_size.0,
            render_height: render_size.1,
            refresh_frame_flags,
            ref_frame_indices,
            ref_frame_sign_bias,
            allow_high_precision_mv,
            interpolation_filter,
            refresh_frame_context,
            frame_parallel_decoding_mode,
            frame_context_idx,
            reset_frame_context,
            use_prev_frame_mvs,
            loop_filter,
            quant,
            lossless,
            segmentation,
            tile_cols_log2,
            tile_rows_log2,
            header_size_in_bytes,
            uncompressed_header_size_in_bytes,
        }))
    }

    fn parse_loop_filter_params(&mut self, reader: &mut BitReader) -> Result<LoopFilterParams> {
        let level = reader.read_bits(6)? as u8;
        let sharpness = reader.read_bits(3)? as u8;
        let delta_enabled = reader.read_bit()?;

        if delta_enabled && reader.read_bit()? {
            for delta in &mut self.lf_ref_deltas {
                if reader.read_bit()? {
                    *delta = reader.read_signed_bits(6)? as i8;
                }
            }
            for delta in &mut self.lf_mode_deltas {
                if reader.read_bit()? {
                    *delta = reader.read_signed_bits(6)? as i8;
                }
            }
        }

        Ok(LoopFilterParams {
            level,
            sharpness,
            delta_enabled,
            ref_deltas: self.lf_ref_deltas,
            mode_deltas: self.lf_mode_deltas,
        })
    }

    fn parse_segmentation_params(&mut self, reader: &mut BitReader) -> Result<SegmentationParams> {
        let mut params = SegmentationParams::default();
        params.enabled = reader.read_bit()?;
        if !params.enabled {
            return Ok(params);
        }

        params.abs_delta = self.abs_delta;
        params.features = self.features;

        if reader.read_bit()? {
            params.update_map = true;
            for prob in &mut params.tree_probs {
                *prob = read_updated_prob(reader)?;
            }
            if reader.read_bit()? {
                params.temporal_update = true;
                for prob in &mut params.pred_probs {
                    *prob = read_updated_prob(reader)?;
                }
            }
        }

        if reader.read_bit()? {
            params.abs_delta = reader.read_bit()?;
            for segment in 0..MAX_SEGMENTS {
                for feature in 0..SEG_LVL_MAX {
                    let enabled = reader.read_bit()?;
                    let mut value = 0i16;
                    if enabled {
                        let bits = SEGMENTATION_FEATURE_BITS[feature];
                        if bits > 0 {
                            value = reader.read_bits(bits)? as i16;
                        }
                        if SEGMENTATION_FEATURE_SIGNED[feature] && reader.read_bit()? {
                            value = -value;
                        }
                    }
                    params.features[segment][feature] = SegmentFeature { enabled, value };
                }
            }
            self.abs_delta = params.abs_delta;
            self.features = params.features;
        }

        Ok(params)
    }
}

fn read_frame_sync_code(reader: &mut BitReader) -> Result<()> {
    let code = reader.read_bits(24)?;
    if code != FRAME_SYNC_CODE {
        return Err(Error::corrupted(format!(
            "frame sync code was {code:#x}, expected 0x498342"
        )));
    }
    Ok(())
}

fn parse_color_config(reader: &mut BitReader, profile: Profile) -> Result<ColorConfig> {
    let bit_depth = if matches!(profile, Profile::Profile2 | Profile::Profile3) {
        if reader.read_bit()? {
            12
        } else {
            10
        }
    } else {
        8
    };

    let color_space = ColorSpace::from_bits(reader.read_bits(3)?);
    if color_space == ColorSpace::Reserved {
        return Err(Error::corrupted("reserved color space"));
    }

    let color_range;
    let subsampling_x;
    let subsampling_y;
    let explicit_subsampling = matches!(profile, Profile::Profile1 | Profile::Profile3);

    if color_space != ColorSpace::Rgb {
        color_range = if reader.read_bit()? {
            ColorRange::Full
        } else {
            ColorRange::Studio
        };
        if explicit_subsampling {
            subsampling_x = reader.read_bit()?;
            subsampling_y = reader.read_bit()?;
            if reader.read_bit()? {
                return Err(Error::corrupted("subsampling reserved bit was set"));
            }
        } else {
            subsampling_x = true;
            subsampling_y = true;
        }
    } else {
        color_range = ColorRange::Full;
        if !explicit_subsampling {
            return Err(Error::corrupted("RGB requires profile 1 or 3"));
        }
        subsampling_x = false;
        subsampling_y = false;
        if reader.read_bit()? {
            return Err(Error::corrupted("RGB reserved bit was set"));
        }
    }

    Ok(ColorConfig {
        bit_depth,
        color_space,
        color_range,
        subsampling_x,
        subsampling_y,
    })
}

fn parse_frame_size(reader: &mut BitReader) -> Result<(u32, u32)> {
    let width = reader.read_bits(16)? + 1;
    let height = reader.read_bits(16)? + 1;
    Ok((width, height))
}

fn parse_render_size(reader: &mut BitReader, frame_size: (u32, u32)) -> Result<(u32, u32)> {
    if !reader.read_bit()? {
        return Ok(frame_size);
    }
    let width = reader.read_bits(16)? + 1;
    let height = reader.read_bits(16)? + 1;
    Ok((width, height))
}

fn parse_frame_size_with_refs(
    reader: &mut BitReader,
    ref_frame_indices: &[u8; REFS_PER_FRAME],
    ref_sizes: &[Option<(u32, u32)>; NUM_REF_FRAMES],
) -> Result<(u32, u32)> {
    let mut size = None;
    for &slot in ref_frame_indices {
        if reader.read_bit()? {
            size = Some(
                ref_sizes[slot as usize]
                    .ok_or_else(|| Error::corrupted("frame size referenced an empty slot"))?,
            );
            break;
        }
    }

    let size = match size {
        Some(size) => size,
        None => parse_frame_size(reader)?,
    };

    // Motion compensated scaling only supports references within 2x down
    // and 16x up of the current frame dimensions.
    for &slot in ref_frame_indices {
        if let Some((ref_w, ref_h)) = ref_sizes[slot as usize] {
            if !reference_size_usable(size, (ref_w, ref_h)) {
                return Err(Error::corrupted("reference frame size out of scaling range"));
            }
        }
    }

    Ok(size)
}

/// Scaling range check for one reference against the current frame size
fn reference_size_usable(frame: (u32, u32), reference: (u32, u32)) -> bool {
    2 * frame.0 >= reference.0
        && 2 * frame.1 >= reference.1
        && frame.0 <= 16 * reference.0
        && frame.1 <= 16 * reference.1
}

fn read_interpolation_filter(reader: &mut BitReader) -> Result<InterpolationFilter> {
    if reader.read_bit()? {
        return Ok(InterpolationFilter::Switchable);
    }
    Ok(InterpolationFilter::from_header_bits(reader.read_bits(2)?))
}

fn parse_quantization_params(reader: &mut BitReader) -> Result<QuantizationParams> {
    let base_q_idx = reader.read_bits(8)? as u8;
    let delta_q_y_dc = read_delta_q(reader)?;
    let delta_q_uv_dc = read_delta_q(reader)?;
    let delta_q_uv_ac = read_delta_q(reader)?;
    Ok(QuantizationParams {
        base_q_idx,
        delta_q_y_dc,
        delta_q_uv_dc,
        delta_q_uv_ac,
    })
}

fn read_delta_q(reader: &mut BitReader) -> Result<i8> {
    if reader.read_bit()? {
        Ok(reader.read_signed_bits(4)? as i8)
    } else {
        Ok(0)
    }
}

/// `255` means keep the default probability
fn read_updated_prob(reader: &mut BitReader) -> Result<u8> {
    if reader.read_bit()? {
        Ok(reader.read_bits(8)? as u8)
    } else {
        Ok(255)
    }
}

fn min_log2_tile_cols(sb64_cols: usize) -> u8 {
    let mut min_log2 = 0u8;
    while (MAX_TILE_WIDTH_B64 << min_log2) < sb64_cols {
        min_log2 += 1;
    }
    min_log2
}

fn max_log2_tile_cols(sb64_cols: usize) -> u8 {
    let mut max_log2 = 1u8;
    while (sb64_cols >> max_log2) >= MIN_TILE_WIDTH_B64 {
        max_log2 += 1;
    }
    max_log2 - 1
}

fn parse_tile_counts(reader: &mut BitReader, sb64_cols: usize) -> Result<(u8, u8)> {
    let mut tile_cols_log2 = min_log2_tile_cols(sb64_cols);
    let max = max_log2_tile_cols(sb64_cols);
    while tile_cols_log2 < max {
        if reader.read_bit()? {
            tile_cols_log2 += 1;
        } else {
            break;
        }
    }

    let mut tile_rows_log2 = reader.read_bit()? as u8;
    if tile_rows_log2 > 0 {
        tile_rows_log2 += reader.read_bit()? as u8;
    }
    Ok((tile_cols_log2, tile_rows_log2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superframe_index_basic() {
        // Marker 0b110, 1 byte per size, 2 frames, sizes 3 and 2.
        let mut chunk = vec![0u8; 5];
        let marker = 0b1100_0001u8;
        chunk.extend_from_slice(&[marker, 3, 2, marker]);
        let sizes = parse_superframe_sizes(&chunk).unwrap();
        assert_eq!(sizes, vec![3, 2]);
    }

    #[test]
    fn test_superframe_marker_mismatch_rejected() {
        let chunk = [0u8, 1, 2, 3, 0b1100_0001, 3, 2, 0b1100_0000];
        assert!(parse_superframe_sizes(&chunk).is_none());
    }

    #[test]
    fn test_not_a_superframe() {
        assert!(parse_superframe_sizes(&[0x82, 0x49, 0x83, 0x42]).is_none());
        assert!(parse_superframe_sizes(&[]).is_none());
    }

    #[test]
    fn test_superframe_two_byte_sizes() {
        let marker = 0b1100_1000u8; // 2 bytes per size, 1 frame
        let mut chunk = vec![0u8; 300];
        chunk.extend_from_slice(&[marker, 0x2C, 0x01, marker]);
        let sizes = parse_superframe_sizes(&chunk).unwrap();
        assert_eq!(sizes, vec![300]);
    }

    #[test]
    fn test_bad_frame_marker_rejected() {
        let mut state = HeaderState::new();
        let refs = [None; NUM_REF_FRAMES];
        // First two bits are 0b00 rather than 0b10.
        let data = [0x00u8; 16];
        assert!(matches!(
            state.parse_uncompressed_header(&data, &refs),
            Err(Error::Corrupted(_))
        ));
    }

    #[test]
    fn test_show_existing_frame() {
        let mut state = HeaderState::new();
        let refs = [None; NUM_REF_FRAMES];
        // marker=2, profile bits 0,0, show_existing=1, slot=5
        // bits: 10 0 0 1 101 -> 0b1000_1101
        let data = [0b1000_1101u8, 0x00];
        match state.parse_uncompressed_header(&data, &refs) {
            Ok(ParsedHeader::ShowExisting(slot)) => assert_eq!(slot, 5),
            other => panic!("unexpected parse result: {other:?}"),
        }
    }

    #[test]
    fn test_reference_scaling_limits() {
        assert!(reference_size_usable((640, 480), (640, 480)));
        assert!(reference_size_usable((640, 480), (1280, 960)));
        assert!(!reference_size_usable((640, 480), (1282, 960)));
        assert!(reference_size_usable((640, 480), (40, 30)));
        assert!(!reference_size_usable((640, 480), (38, 30)));
    }

    #[test]
    fn test_sync_code_enforced() {
        let mut state = HeaderState::new();
        let refs = [None; NUM_REF_FRAMES];
        // marker=2, profile 0, not show_existing, keyframe, show_frame=1,
        // error_resilient=0, then a bad sync code.
        // bits: 10 0 0 0 0 1 0 | 0xFF ...
        let data = [0b1000_0010u8, 0xFF, 0xFF, 0xFF, 0x00, 0x00];
        assert!(matches!(
            state.parse_uncompressed_header(&data, &refs),
            Err(Error::Corrupted(_))
        ));
    }

    #[test]
    fn test_tile_log2_limits() {
        // 120 superblocks requires at least 1 tile column split and allows
        // up to 120/4 = 30 -> log2 4.
        assert_eq!(min_log2_tile_cols(120), 1);
        assert_eq!(max_log2_tile_cols(120), 4);
        assert_eq!(min_log2_tile_cols(8), 0);
        assert_eq!(max_log2_tile_cols(8), 1);
    }
}
