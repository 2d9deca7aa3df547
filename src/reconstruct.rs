//! Residual dequantization and block reconstruction
//!
//! Decoded token values are scaled by the frame quantizers, run through the
//! inverse transform and added to the prediction already sitting in the
//! frame buffer.

use crate::error::Result;
use crate::frame::Plane;
use crate::header::FrameHeader;
use crate::predict::clip_bd;
use crate::tables::{TxSize, TxType, AC_QLOOKUP, DC_QLOOKUP, MAX_SEGMENTS, SEG_LVL_ALT_Q};
use crate::transform::inverse_transform_2d;

/// Dequantization factors for one segment
#[derive(Debug, Clone, Copy, Default)]
pub struct Quantizers {
    pub y_dc: u16,
    pub y_ac: u16,
    pub uv_dc: u16,
    pub uv_ac: u16,
}

impl Quantizers {
    #[inline]
    pub fn dc(&self, plane: usize) -> u16 {
        if plane == 0 {
            self.y_dc
        } else {
            self.uv_dc
        }
    }

    #[inline]
    pub fn ac(&self, plane: usize) -> u16 {
        if plane == 0 {
            self.y_ac
        } else {
            self.uv_ac
        }
    }
}

/// Quantizers for every segment, resolved once per frame
#[derive(Debug, Clone)]
pub struct SegmentQuantizers {
    quantizers: [Quantizers; MAX_SEGMENTS],
}

impl SegmentQuantizers {
    pub fn new(header: &FrameHeader) -> Self {
        let mut quantizers = [Quantizers::default(); MAX_SEGMENTS];
        for (segment_id, out) in quantizers.iter_mut().enumerate() {
            let base = base_quantizer_index(header, segment_id as u8);
            let bit_depth = header.color.bit_depth;
            *out = Quantizers {
                y_dc: dc_quantizer(bit_depth, base, header.quant.delta_q_y_dc),
                y_ac: ac_quantizer(bit_depth, base, 0),
                uv_dc: dc_quantizer(bit_depth, base, header.quant.delta_q_uv_dc),
                uv_ac: ac_quantizer(bit_depth, base, header.quant.delta_q_uv_ac),
            };
        }
        SegmentQuantizers { quantizers }
    }

    #[inline]
    pub fn for_segment(&self, segment_id: u8) -> &Quantizers {
        &self.quantizers[segment_id as usize & (MAX_SEGMENTS - 1)]
    }
}

/// Quantizer index for a block, honoring the alternate quantizer feature
fn base_quantizer_index(header: &FrameHeader, segment_id: u8) -> u8 {
    if let Some(data) = header.segmentation.feature(segment_id, SEG_LVL_ALT_Q) {
        let mut value = data as i32;
        if !header.segmentation.abs_delta {
            value += header.quant.base_q_idx as i32;
        }
        return value.clamp(0, 255) as u8;
    }
    header.quant.base_q_idx
}

#[inline]
fn dc_quantizer(bit_depth: u8, base: u8, delta: i8) -> u16 {
    let index = (base as i32 + delta as i32).clamp(0, 255) as usize;
    DC_QLOOKUP[((bit_depth - 8) >> 1) as usize][index]
}

#[inline]
fn ac_quantizer(bit_depth: u8, base: u8, delta: i8) -> u16 {
    let index = (base as i32 + delta as i32).clamp(0, 255) as usize;
    AC_QLOOKUP[((bit_depth - 8) >> 1) as usize][index]
}

/// Dequantize a token block, inverse transform it and add it to the plane
///
/// `tokens` holds the decoded coefficient values in raster order; `x` and
/// `y` locate the transform block inside the plane. Blocks straddling the
/// right or bottom plane edge write only the covered samples.
#[allow(clippy::too_many_arguments)]
pub fn reconstruct(
    plane: &mut Plane,
    plane_index: usize,
    tokens: &[i32],
    quantizers: &Quantizers,
    x: usize,
    y: usize,
    tx_size: TxSize,
    tx_type: TxType,
    lossless: bool,
    bit_depth: u8,
) -> Result<()> {
    let size = tx_size.size();

    // 32x32 transforms halve the dequantized values to stay in range.
    let denominator = if tx_size == TxSize::Tx32x32 { 2 } else { 1 };
    let ac = quantizers.ac(plane_index) as i32;
    let dc = quantizers.dc(plane_index) as i32;

    let mut residual = vec![0i32; size * size];
    for (out, token) in residual.iter_mut().zip(tokens.iter()) {
        *out = token * ac / denominator;
    }
    if let Some(first) = tokens.first() {
        residual[0] = first * dc / denominator;
    }

    inverse_transform_2d(&mut residual, tx_size, tx_type, lossless)?;

    let width_in_plane = size.min(plane.width() - x);
    let height_in_plane = size.min(plane.height() - y);
    for i in 0..height_in_plane {
        let row = plane.row_mut(y + i);
        for j in 0..width_in_plane {
            let value = row[x + j] as i32 + residual[i * size + j];
            row[x + j] = clip_bd(bit_depth, value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{ColorConfig, SegmentFeature};

    fn header_with_base_q(base: u8) -> FrameHeader {
        let mut header = test_frame_header();
        header.quant.base_q_idx = base;
        header.lossless = header.quant.is_lossless();
        header
    }

    fn test_frame_header() -> FrameHeader {
        FrameHeader {
            profile: crate::tables::Profile::Profile0,
            frame_type: crate::tables::FrameType::KeyFrame,
            intra_only: false,
            show_frame: true,
            error_resilient_mode: false,
            color: ColorConfig::default(),
            width: 64,
            height: 64,
            render_width: 64,
            render_height: 64,
            refresh_frame_flags: 0xFF,
            ref_frame_indices: [0; 3],
            ref_frame_sign_bias: [false; 3],
            allow_high_precision_mv: false,
            interpolation_filter: crate::tables::InterpolationFilter::EightTap,
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

    #[test]
    fn test_lossless_quantizers_are_unity_scale() {
        let header = header_with_base_q(0);
        let quantizers = SegmentQuantizers::new(&header);
        let q = quantizers.for_segment(0);
        // Quantizer index zero maps to a factor of 4 in every table.
        assert_eq!(q.y_dc, 4);
        assert_eq!(q.y_ac, 4);
        assert_eq!(q.uv_dc, 4);
        assert_eq!(q.uv_ac, 4);
    }

    #[test]
    fn test_segment_quantizer_delta() {
        let mut header = header_with_base_q(100);
        header.segmentation.enabled = true;
        header.segmentation.features[2][SEG_LVL_ALT_Q] = SegmentFeature {
            enabled: true,
            value: -50,
        };
        let quantizers = SegmentQuantizers::new(&header);
        assert_eq!(
            quantizers.for_segment(2).y_ac,
            AC_QLOOKUP[0][50],
        );
        assert_eq!(
            quantizers.for_segment(0).y_ac,
            AC_QLOOKUP[0][100],
        );
    }

    #[test]
    fn test_absolute_segment_quantizer() {
        let mut header = header_with_base_q(200);
        header.segmentation.enabled = true;
        header.segmentation.abs_delta = true;
        header.segmentation.features[1][SEG_LVL_ALT_Q] = SegmentFeature {
            enabled: true,
            value: 30,
        };
        let quantizers = SegmentQuantizers::new(&header);
        assert_eq!(quantizers.for_segment(1).y_ac, AC_QLOOKUP[0][30]);
    }

    #[test]
    fn test_lossless_dc_round_trip() {
        let header = header_with_base_q(0);
        let quantizers = SegmentQuantizers::new(&header);
        let mut plane = Plane::new(8, 8).unwrap();
        for y in 0..8 {
            for x in 0..8 {
                plane.set(x, y, 100);
            }
        }

        // A WHT DC-only block: coefficient c decodes to samples of value c/4
        // after the lossless shift, scaled by the quantizer factor of 4.
        let mut tokens = vec![0i32; 16];
        tokens[0] = 4;
        reconstruct(
            &mut plane,
            0,
            &tokens,
            quantizers.for_segment(0),
            0,
            0,
            TxSize::Tx4x4,
            TxType::DctDct,
            true,
            8,
        )
        .unwrap();
        // Dequantized DC of 16 spreads as 16/4/4 = 1 per sample.
        assert_eq!(plane.get(0, 0), 101);
        assert_eq!(plane.get(3, 3), 101);
        assert_eq!(plane.get(4, 4), 100);
    }

    #[test]
    fn test_reconstruction_clips_to_bit_depth() {
        let header = header_with_base_q(0);
        let quantizers = SegmentQuantizers::new(&header);
        let mut plane = Plane::new(4, 4).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                plane.set(x, y, 250);
            }
        }
        let mut tokens = vec![0i32; 16];
        tokens[0] = 400;
        reconstruct(
            &mut plane,
            0,
            &tokens,
            quantizers.for_segment(0),
            0,
            0,
            TxSize::Tx4x4,
            TxType::DctDct,
            true,
            8,
        )
        .unwrap();
        assert_eq!(plane.get(0, 0), 255);
    }
}
