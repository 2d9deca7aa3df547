//! Pixel planes, decoded frame output and the reference frame store
//!
//! Samples are `u16` throughout so 10- and 12-bit profiles share one path.
//! Reference slots keep a replicated border around every plane sized to the
//! maximum motion vector reach, so inter prediction never bounds-checks.

use tracing::debug;

use crate::error::{Error, Result};
use crate::header::{ColorConfig, FrameHeader};
use crate::tables::{ColorRange, ColorSpace, MV_BORDER, NUM_REF_FRAMES};

/// Reference border width in samples per edge
pub const REF_BORDER: usize = MV_BORDER as usize;

/// Chroma plane length for a luma length under the given subsampling
#[inline]
pub const fn uv_size(subsampling: bool, size: usize) -> usize {
    (size + subsampling as usize) >> (subsampling as usize)
}

/// One pixel plane of the frame under reconstruction
#[derive(Debug, Clone)]
pub struct Plane {
    width: usize,
    height: usize,
    data: Vec<u16>,
}

impl Plane {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        let len = width
            .checked_mul(height)
            .ok_or_else(|| Error::allocation("plane dimensions overflow"))?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| Error::allocation("plane buffer allocation failed"))?;
        data.resize(len, 0);
        Ok(Plane {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[u16] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [u16] {
        &mut self.data[y * self.width..(y + 1) * self.width]
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u16 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: u16) {
        self.data[y * self.width + x] = value;
    }

    pub fn data(&self) -> &[u16] {
        &self.data
    }
}

/// The three planes of a frame being decoded
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    planes: [Plane; 3],
    pub width: usize,
    pub height: usize,
    pub subsampling_x: bool,
    pub subsampling_y: bool,
    pub bit_depth: u8,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize, color: &ColorConfig) -> Result<Self> {
        let uv_w = uv_size(color.subsampling_x, width);
        let uv_h = uv_size(color.subsampling_y, height);
        Ok(FrameBuffer {
            planes: [
                Plane::new(width, height)?,
                Plane::new(uv_w, uv_h)?,
                Plane::new(uv_w, uv_h)?,
            ],
            width,
            height,
            subsampling_x: color.subsampling_x,
            subsampling_y: color.subsampling_y,
            bit_depth: color.bit_depth,
        })
    }

    #[inline]
    pub fn plane(&self, index: usize) -> &Plane {
        &self.planes[index]
    }

    #[inline]
    pub fn plane_mut(&mut self, index: usize) -> &mut Plane {
        &mut self.planes[index]
    }

    /// Width/height of the given plane
    pub fn plane_size(&self, index: usize) -> (usize, usize) {
        let plane = &self.planes[index];
        (plane.width(), plane.height())
    }
}

/// A fully decoded frame handed to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    pub render_width: u32,
    pub render_height: u32,
    pub bit_depth: u8,
    pub subsampling_x: bool,
    pub subsampling_y: bool,
    pub color_space: ColorSpace,
    pub color_range: ColorRange,
    /// Y, U and V sample planes, row-major; rows may carry alignment
    /// padding past the visible width
    pub planes: [Vec<u16>; 3],
    /// Row stride per plane, in samples
    pub strides: [usize; 3],
}

impl DecodedFrame {
    pub fn from_buffer(buffer: &FrameBuffer, header: &FrameHeader) -> Self {
        DecodedFrame {
            width: header.width,
            height: header.height,
            render_width: header.render_width,
            render_height: header.render_height,
            bit_depth: buffer.bit_depth,
            subsampling_x: buffer.subsampling_x,
            subsampling_y: buffer.subsampling_y,
            color_space: header.color.color_space,
            color_range: header.color.color_range,
            planes: [
                buffer.planes[0].data().to_vec(),
                buffer.planes[1].data().to_vec(),
                buffer.planes[2].data().to_vec(),
            ],
            strides: [
                buffer.planes[0].width(),
                buffer.planes[1].width(),
                buffer.planes[2].width(),
            ],
        }
    }
}

// =============================================================================
// Reference Frame Store
// =============================================================================

/// One stored reference frame with border-extended planes
#[derive(Debug, Clone)]
pub struct ReferenceSlot {
    pub width: usize,
    pub height: usize,
    pub subsampling_x: bool,
    pub subsampling_y: bool,
    pub bit_depth: u8,
    planes: [Vec<u16>; 3],
    strides: [usize; 3],
    plane_sizes: [(usize, usize); 3],
    /// Output metadata carried along for show-existing-frame
    pub color_space: ColorSpace,
    pub color_range: ColorRange,
    pub render_size: (u32, u32),
}

impl ReferenceSlot {
    /// Copy a reconstructed frame into a bordered reference buffer
    ///
    /// The top and bottom borders repeat the clamped source rows; the left
    /// and right borders stretch the edge samples of each extended row.
    fn store(buffer: &FrameBuffer, header: &FrameHeader) -> Result<Self> {
        let mut planes: [Vec<u16>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        let mut strides = [0usize; 3];
        let mut plane_sizes = [(0usize, 0usize); 3];

        for plane in 0..3 {
            let source = buffer.plane(plane);
            let width = source.width();
            let height = source.height();
            let store_width = width + REF_BORDER * 2;
            let store_height = height + REF_BORDER * 2;
            let len = store_width
                .checked_mul(store_height)
                .ok_or_else(|| Error::allocation("reference plane dimensions overflow"))?;

            let mut store = Vec::new();
            store
                .try_reserve_exact(len)
                .map_err(|_| Error::allocation("reference plane allocation failed"))?;
            store.resize(len, 0);

            for dest_y in 0..store_height {
                let source_y = dest_y.saturating_sub(REF_BORDER).min(height - 1);
                let row = source.row(source_y);
                let dest = &mut store[dest_y * store_width + REF_BORDER..][..width];
                dest.copy_from_slice(row);

                let left = store[dest_y * store_width + REF_BORDER];
                for x in 0..REF_BORDER {
                    store[dest_y * store_width + x] = left;
                }
                let right = store[dest_y * store_width + REF_BORDER + width - 1];
                for x in REF_BORDER + width..store_width {
                    store[dest_y * store_width + x] = right;
                }
            }

            planes[plane] = store;
            strides[plane] = store_width;
            plane_sizes[plane] = (width, height);
        }

        Ok(ReferenceSlot {
            width: buffer.width,
            height: buffer.height,
            subsampling_x: buffer.subsampling_x,
            subsampling_y: buffer.subsampling_y,
            bit_depth: buffer.bit_depth,
            planes,
            strides,
            plane_sizes,
            color_space: header.color.color_space,
            color_range: header.color.color_range,
            render_size: (header.render_width, header.render_height),
        })
    }

    /// Width/height of the unbordered plane
    pub fn plane_size(&self, plane: usize) -> (usize, usize) {
        self.plane_sizes[plane]
    }

    /// Fetch a sample; coordinates may reach into the border
    #[inline]
    pub fn sample(&self, plane: usize, x: i64, y: i64) -> u16 {
        let (width, height) = self.plane_sizes[plane];
        let border = REF_BORDER as i64;
        let x = (x.max(-border).min(width as i64 - 1 + border) + border) as usize;
        let y = (y.max(-border).min(height as i64 - 1 + border) + border) as usize;
        self.planes[plane][y * self.strides[plane] + x]
    }

    /// Extract the unbordered frame, used by show-existing-frame
    pub fn to_decoded_frame(&self) -> DecodedFrame {
        let mut planes: [Vec<u16>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        let mut out_strides = [0usize; 3];
        for plane in 0..3 {
            let (width, height) = self.plane_sizes[plane];
            let stride = self.strides[plane];
            let mut out = Vec::with_capacity(width * height);
            for y in 0..height {
                let start = (y + REF_BORDER) * stride + REF_BORDER;
                out.extend_from_slice(&self.planes[plane][start..start + width]);
            }
            planes[plane] = out;
            out_strides[plane] = width;
        }
        DecodedFrame {
            width: self.width as u32,
            height: self.height as u32,
            render_width: self.render_size.0,
            render_height: self.render_size.1,
            bit_depth: self.bit_depth,
            subsampling_x: self.subsampling_x,
            subsampling_y: self.subsampling_y,
            color_space: self.color_space,
            color_range: self.color_range,
            planes,
            strides: out_strides,
        }
    }
}

/// The eight reference slots refreshed by `refresh_frame_flags`
#[derive(Debug, Clone, Default)]
pub struct ReferenceFrameStore {
    slots: [Option<ReferenceSlot>; NUM_REF_FRAMES],
}

impl ReferenceFrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: usize) -> Option<&ReferenceSlot> {
        self.slots.get(slot).and_then(|s| s.as_ref())
    }

    /// Dimensions of each populated slot, as the header parser consumes them
    pub fn sizes(&self) -> [Option<(u32, u32)>; NUM_REF_FRAMES] {
        let mut sizes = [None; NUM_REF_FRAMES];
        for (out, slot) in sizes.iter_mut().zip(self.slots.iter()) {
            *out = slot
                .as_ref()
                .map(|s| (s.width as u32, s.height as u32));
        }
        sizes
    }

    /// Store a reconstructed frame into every slot whose refresh bit is set
    pub fn update(&mut self, buffer: &FrameBuffer, header: &FrameHeader) -> Result<()> {
        let flags = header.refresh_frame_flags;
        if flags == 0 {
            return Ok(());
        }
        // Build the bordered copy once and clone it into the other slots.
        let mut stored: Option<ReferenceSlot> = None;
        for slot in 0..NUM_REF_FRAMES {
            if (flags >> slot) & 1 == 1 {
                if stored.is_none() {
                    stored = Some(ReferenceSlot::store(buffer, header)?);
                }
                self.slots[slot] = stored.clone();
            }
        }
        debug!(flags, "updated reference frame slots");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{HeaderState, ParsedHeader};
    use crate::tables::REFS_PER_FRAME;

    fn test_header(width: u32, height: u32) -> FrameHeader {
        // Build a header through the parser types rather than hand-rolling
        // every field.
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
            ref_frame_indices: [0; REFS_PER_FRAME],
            ref_frame_sign_bias: [false; REFS_PER_FRAME],
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
    fn test_uv_size_rounds_up() {
        assert_eq!(uv_size(true, 7), 4);
        assert_eq!(uv_size(true, 8), 4);
        assert_eq!(uv_size(false, 7), 7);
    }

    #[test]
    fn test_frame_buffer_chroma_dimensions() {
        let buffer = FrameBuffer::new(65, 33, &ColorConfig::default()).unwrap();
        assert_eq!(buffer.plane_size(0), (65, 33));
        assert_eq!(buffer.plane_size(1), (33, 17));
        assert_eq!(buffer.plane_size(2), (33, 17));
    }

    #[test]
    fn test_reference_border_replication() {
        let header = test_header(8, 8);
        let mut buffer = FrameBuffer::new(8, 8, &header.color).unwrap();
        for y in 0..8 {
            for x in 0..8 {
                buffer.plane_mut(0).set(x, y, (y * 8 + x) as u16);
            }
        }
        let mut store = ReferenceFrameStore::new();
        store.update(&buffer, &header).unwrap();
        let slot = store.get(0).unwrap();

        // Interior is intact.
        assert_eq!(slot.sample(0, 0, 0), 0);
        assert_eq!(slot.sample(0, 7, 7), 63);
        // Borders replicate the nearest edge sample.
        assert_eq!(slot.sample(0, -5, 0), 0);
        assert_eq!(slot.sample(0, 12, 0), 7);
        assert_eq!(slot.sample(0, 0, -20), 0);
        assert_eq!(slot.sample(0, 7, 30), 63);
        assert_eq!(slot.sample(0, -1, -1), 0);
    }

    #[test]
    fn test_refresh_flags_select_slots() {
        let mut header = test_header(16, 16);
        header.refresh_frame_flags = 0b0000_0101;
        let buffer = FrameBuffer::new(16, 16, &header.color).unwrap();
        let mut store = ReferenceFrameStore::new();
        store.update(&buffer, &header).unwrap();
        assert!(store.get(0).is_some());
        assert!(store.get(1).is_none());
        assert!(store.get(2).is_some());
        assert_eq!(store.sizes()[0], Some((16, 16)));
        assert_eq!(store.sizes()[1], None);
    }

    #[test]
    fn test_show_existing_round_trip() {
        let header = test_header(4, 4);
        let mut buffer = FrameBuffer::new(4, 4, &header.color).unwrap();
        buffer.plane_mut(0).set(2, 1, 99);
        let mut store = ReferenceFrameStore::new();
        store.update(&buffer, &header).unwrap();

        let frame = store.get(3).unwrap().to_decoded_frame();
        assert_eq!(frame.width, 4);
        assert_eq!(frame.planes[0][1 * 4 + 2], 99);
    }

    #[test]
    fn test_header_state_type_is_usable() {
        // Keeps the test module honest about the public surface used above.
        let mut state = HeaderState::new();
        let refs = ReferenceFrameStore::new().sizes();
        let parsed = state.parse_uncompressed_header(&[0b1000_1101, 0], &refs);
        assert!(matches!(parsed, Ok(ParsedHeader::ShowExisting(5))));
    }
}
