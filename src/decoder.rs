//! Top-level decoder driving header parsing, tile decoding and the
//! reference frame store
//!
//! Feed whole temporal units with [`Vp9Decoder::decode_chunk`]; superframes
//! are split internally. Decoded frames queue up in presentation order and
//! drain through [`Vp9Decoder::get_decoded_frame`].

use std::collections::VecDeque;

use tracing::debug;

use crate::context::PrevFrameInfo;
use crate::error::{Error, Result};
use crate::frame::{DecodedFrame, ReferenceFrameStore};
use crate::header::{parse_superframe_sizes, FrameHeader, HeaderState, ParsedHeader, ResetFrameContext};
use crate::parser::{decode_tiles, parse_compressed_header};
use crate::probs::{FrameContexts, SyntaxElementCounter};

/// Coefficient adaptation rate for a frame following an ordinary inter frame
const COEF_UPDATE_FACTOR: u32 = 112;
/// Faster adaptation rate right after a key or intra-only frame
const COEF_UPDATE_FACTOR_AFTER_KEY: u32 = 128;

/// Stateful VP9 decoder
///
/// Owns everything that persists between frames: sticky header fields, the
/// four probability context slots, the eight reference slots and the
/// previous frame's motion field.
pub struct Vp9Decoder {
    header_state: HeaderState,
    contexts: FrameContexts,
    references: ReferenceFrameStore,
    prev: Option<PrevFrameInfo>,
    /// Whether the previously decoded frame was key or intra-only
    last_frame_was_intra: bool,
    output: VecDeque<DecodedFrame>,
}

impl Default for Vp9Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Vp9Decoder {
    pub fn new() -> Self {
        Vp9Decoder {
            header_state: HeaderState::new(),
            contexts: FrameContexts::new(),
            references: ReferenceFrameStore::new(),
            prev: None,
            last_frame_was_intra: false,
            output: VecDeque::new(),
        }
    }

    /// Decode one temporal unit, splitting a superframe into its frames
    pub fn decode_chunk(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(Error::corrupted("empty chunk"));
        }
        match parse_superframe_sizes(data) {
            Some(sizes) => {
                let mut offset = 0usize;
                for size in sizes {
                    let end = offset
                        .checked_add(size)
                        .filter(|&end| end <= data.len())
                        .ok_or_else(|| {
                            Error::corrupted("superframe sizes exceed the chunk")
                        })?;
                    self.decode_frame(&data[offset..end])?;
                    offset = end;
                }
            }
            None => self.decode_frame(data)?,
        }
        Ok(())
    }

    /// Pop the next decoded frame in presentation order
    pub fn get_decoded_frame(&mut self) -> Result<DecodedFrame> {
        self.output.pop_front().ok_or(Error::NeedsMoreInput)
    }

    /// Drop queued output and per-sequence state, keeping nothing
    pub fn flush(&mut self) {
        self.header_state = HeaderState::new();
        self.contexts = FrameContexts::new();
        self.references = ReferenceFrameStore::new();
        self.prev = None;
        self.last_frame_was_intra = false;
        self.output.clear();
    }

    fn decode_frame(&mut self, data: &[u8]) -> Result<()> {
        let ref_sizes = self.references.sizes();
        let header = match self
            .header_state
            .parse_uncompressed_header(data, &ref_sizes)?
        {
            ParsedHeader::ShowExisting(slot) => {
                let slot = self
                    .references
                    .get(slot as usize)
                    .ok_or_else(|| Error::corrupted("show_existing_frame names an empty slot"))?;
                self.output.push_back(slot.to_decoded_frame());
                return Ok(());
            }
            ParsedHeader::Frame(header) => header,
        };

        debug!(
            width = header.width,
            height = header.height,
            frame_type = ?header.frame_type,
            show = header.show_frame,
            "decoding frame"
        );

        match header.reset_frame_context {
            ResetFrameContext::Keep => {}
            ResetFrameContext::Current => {
                self.contexts.reset_slot(header.frame_context_idx as usize)
            }
            ResetFrameContext::All => self.contexts.reset_all(),
        }

        if header.header_size_in_bytes == 0 {
            return Err(Error::corrupted("compressed header is empty"));
        }
        let compressed_start = header.uncompressed_header_size_in_bytes;
        let compressed_end = compressed_start + header.header_size_in_bytes as usize;
        if compressed_end > data.len() {
            return Err(Error::corrupted("compressed header past end of frame data"));
        }

        let mut probs = self.contexts.load(header.frame_context_idx as usize);
        let modes =
            parse_compressed_header(&data[compressed_start..compressed_end], &header, &mut probs)?;

        let decoded = decode_tiles(
            &header,
            &data[compressed_end..],
            &probs,
            &modes,
            &self.references,
            self.prev.as_ref(),
        )?;

        self.refresh_probability_context(&header, &probs, &decoded.counts);

        self.references.update(&decoded.frame, &header)?;
        self.prev = Some(PrevFrameInfo::capture(
            &decoded.grid,
            header.segmentation.enabled && header.segmentation.update_map,
        ));
        self.last_frame_was_intra = header.is_intra();

        if header.show_frame {
            self.output
                .push_back(DecodedFrame::from_buffer(&decoded.frame, &header));
        } else {
            debug!("frame decoded but not shown");
        }
        Ok(())
    }

    /// Backward adaptation after a frame, then save into the frame's slot
    ///
    /// Adaptation starts from the slot values as they were before this
    /// frame's header deltas. Error-resilient and frame-parallel frames
    /// save their delta-updated tables unadapted.
    fn refresh_probability_context(
        &mut self,
        header: &FrameHeader,
        frame_probs: &crate::probs::ProbabilityTables,
        counts: &SyntaxElementCounter,
    ) {
        let idx = header.frame_context_idx as usize;
        if header.error_resilient_mode || header.frame_parallel_decoding_mode {
            if header.refresh_frame_context {
                self.contexts.save(idx, frame_probs);
            }
            return;
        }

        let mut adapted = self.contexts.load(idx);
        let factor = if self.last_frame_was_intra {
            COEF_UPDATE_FACTOR_AFTER_KEY
        } else {
            COEF_UPDATE_FACTOR
        };
        adapted.adapt_coef_probs(counts, factor);
        if !header.is_intra() {
            adapted.adapt_noncoef_probs(counts);
        }
        if header.refresh_frame_context {
            self.contexts.save(idx, &adapted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_decoder_needs_input() {
        let mut decoder = Vp9Decoder::new();
        assert_eq!(decoder.get_decoded_frame(), Err(Error::NeedsMoreInput));
    }

    #[test]
    fn test_empty_chunk_rejected() {
        let mut decoder = Vp9Decoder::new();
        assert!(matches!(
            decoder.decode_chunk(&[]),
            Err(Error::Corrupted(_))
        ));
    }

    #[test]
    fn test_garbage_chunk_rejected() {
        let mut decoder = Vp9Decoder::new();
        // Wrong frame marker in the first two bits.
        let result = decoder.decode_chunk(&[0x00; 16]);
        assert!(matches!(result, Err(Error::Corrupted(_))));
    }

    #[test]
    fn test_flush_clears_output() {
        let mut decoder = Vp9Decoder::new();
        decoder.output.push_back(DecodedFrame {
            width: 2,
            height: 2,
            render_width: 2,
            render_height: 2,
            bit_depth: 8,
            subsampling_x: true,
            subsampling_y: true,
            color_space: crate::tables::ColorSpace::Bt601,
            color_range: crate::tables::ColorRange::Studio,
            planes: [vec![0; 4], vec![0; 1], vec![0; 1]],
            strides: [2, 1, 1],
        });
        decoder.flush();
        assert_eq!(decoder.get_decoded_frame(), Err(Error::NeedsMoreInput));
    }
}
