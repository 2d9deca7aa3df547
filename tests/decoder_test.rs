//! End-to-end decoder integration tests
//!
//! Builds minimal VP9 frames bit by bit and runs them through the full
//! decode path: uncompressed header, compressed header, tile decode and
//! the output queue.

use vp9dec::error::Error;
use vp9dec::probs::{kf_y_mode_probs, ProbabilityTables, KF_PARTITION_PROBS, KF_UV_MODE_PROBS};
use vp9dec::Vp9Decoder;

/// MSB-first bit assembler mirroring the uncompressed header layout
struct BitWriter {
    bytes: Vec<u8>,
    bit: u8,
}

impl BitWriter {
    fn new() -> Self {
        BitWriter {
            bytes: Vec::new(),
            bit: 0,
        }
    }

    fn push_bits(&mut self, value: u32, count: u8) {
        for i in (0..count).rev() {
            if self.bit == 0 {
                self.bytes.push(0);
            }
            let bit = ((value >> i) & 1) as u8;
            let last = self.bytes.len() - 1;
            self.bytes[last] |= bit << (7 - self.bit);
            self.bit = (self.bit + 1) & 7;
        }
    }

    fn byte_align(&mut self) {
        self.bit = 0;
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Bool encoder for crafting tile payloads
///
/// Tracks the lower bound of the coding interval as an exact binary
/// fraction and emits it verbatim, mirroring the decoder's split
/// arithmetic so every written symbol decodes back unchanged.
struct BoolEncoder {
    low: Vec<u8>,
    range: u32,
    shift: usize,
}

impl BoolEncoder {
    fn new() -> Self {
        let mut enc = BoolEncoder {
            low: Vec::new(),
            range: 255,
            shift: 0,
        };
        // Marker bit consumed by the decoder on startup.
        enc.put(false, 128);
        enc
    }

    fn put(&mut self, bit: bool, prob: u8) {
        let split = 1 + (((self.range - 1) * prob as u32) >> 8);
        if bit {
            self.add(split, 8 + self.shift);
            self.range -= split;
        } else {
            self.range = split;
        }
        while self.range < 128 {
            self.range <<= 1;
            self.shift += 1;
        }
    }

    /// Add `v * 2^-pos` into the fraction, propagating carries upward
    fn add(&mut self, v: u32, pos: usize) {
        let bytes = (pos + 7) / 8;
        if self.low.len() < bytes {
            self.low.resize(bytes, 0);
        }
        let mut carry = v << (bytes * 8 - pos);
        let mut idx = bytes;
        while carry > 0 {
            idx -= 1;
            let sum = self.low[idx] as u32 + (carry & 0xff);
            self.low[idx] = (sum & 0xff) as u8;
            carry = (carry >> 8) + (sum >> 8);
        }
    }

    fn into_bytes(mut self) -> Vec<u8> {
        if self.low.is_empty() {
            self.low.push(0);
        }
        self.low
    }
}

/// A showable 64x64 lossless keyframe around the given tile payload
fn keyframe_with_tile(tile: &[u8]) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.push_bits(2, 2); // frame marker
    w.push_bits(0, 1); // profile low bit
    w.push_bits(0, 1); // profile high bit
    w.push_bits(0, 1); // not show_existing_frame
    w.push_bits(0, 1); // key frame
    w.push_bits(1, 1); // show_frame
    w.push_bits(0, 1); // error_resilient_mode
    w.push_bits(0x498342, 24); // frame sync code
    w.push_bits(1, 3); // color space BT.601
    w.push_bits(0, 1); // studio range
    w.push_bits(63, 16); // width - 1
    w.push_bits(63, 16); // height - 1
    w.push_bits(0, 1); // render size equals frame size
    w.push_bits(0, 1); // refresh_frame_context
    w.push_bits(1, 1); // frame_parallel_decoding_mode
    w.push_bits(0, 2); // frame_context_idx
    w.push_bits(0, 6); // loop filter level
    w.push_bits(0, 3); // loop filter sharpness
    w.push_bits(0, 1); // loop filter deltas disabled
    w.push_bits(0, 8); // base_q_idx, lossless
    w.push_bits(0, 1); // no y dc delta
    w.push_bits(0, 1); // no uv dc delta
    w.push_bits(0, 1); // no uv ac delta
    w.push_bits(0, 1); // segmentation disabled
    w.push_bits(0, 1); // no extra tile rows
    w.push_bits(2, 16); // compressed header size
    w.byte_align();

    let mut frame = w.into_bytes();
    frame.extend_from_slice(&[0x00, 0x00]); // compressed header, no updates
    frame.extend_from_slice(tile);
    frame
}

/// A keyframe whose bool-coded payload is all zeros, decoding to a flat
/// DC-predicted frame.
fn minimal_keyframe() -> Vec<u8> {
    keyframe_with_tile(&[0x00; 64])
}

/// A keyframe carrying a single +1 AC coefficient in the last chroma V
/// transform block, everything else empty.
fn keyframe_with_one_coefficient() -> Vec<u8> {
    let probs = ProbabilityTables::default();
    let mut enc = BoolEncoder::new();

    // One unsplit, unskipped 64x64 superblock, DC predicted in both planes.
    enc.put(false, KF_PARTITION_PROBS[12][0]);
    enc.put(false, probs.skip[0]);
    enc.put(false, kf_y_mode_probs(0, 0)[0]);
    enc.put(false, KF_UV_MODE_PROBS[0][0]);

    // Empty 4x4 luma blocks, then every chroma block but the last.
    let y_eob = probs.coef[0][0][0][0][0][0];
    for _ in 0..256 {
        enc.put(false, y_eob);
    }
    let uv_eob = probs.coef[0][1][0][0][0][0];
    for _ in 0..(64 + 63) {
        enc.put(false, uv_eob);
    }

    // Last V block: zero at DC, +1 at the first AC scan position.
    let dc_node = probs.coef[0][1][0][0][0];
    let ac_node = probs.coef[0][1][0][1][0];
    enc.put(true, dc_node[0]); // block is not empty
    enc.put(false, dc_node[1]); // DC coefficient is zero
    enc.put(true, ac_node[1]); // AC coefficient present
    enc.put(false, ac_node[2]); // magnitude one
    enc.put(false, 128); // positive sign
    enc.put(false, ac_node[0]); // end of block

    keyframe_with_tile(&enc.into_bytes())
}

#[test]
fn test_decode_minimal_keyframe() {
    let mut decoder = Vp9Decoder::new();
    decoder.decode_chunk(&minimal_keyframe()).unwrap();

    let frame = decoder.get_decoded_frame().unwrap();
    assert_eq!(frame.width, 64);
    assert_eq!(frame.height, 64);
    assert_eq!(frame.bit_depth, 8);
    assert!(frame.subsampling_x && frame.subsampling_y);

    // Every sample is the no-neighbor DC value.
    assert!(frame.planes[0].iter().all(|&s| s == 128));
    assert!(frame.planes[1].iter().all(|&s| s == 128));
    assert_eq!(frame.planes[0].len(), frame.strides[0] * 64);

    assert_eq!(decoder.get_decoded_frame(), Err(Error::NeedsMoreInput));
}

#[test]
fn test_decode_keyframe_with_ac_coefficient() {
    let mut decoder = Vp9Decoder::new();
    decoder
        .decode_chunk(&keyframe_with_one_coefficient())
        .unwrap();
    let frame = decoder.get_decoded_frame().unwrap();

    // The token only touches the V plane.
    assert!(frame.planes[0].iter().all(|&s| s == 128));
    assert!(frame.planes[1].iter().all(|&s| s == 128));

    // A dequantized +4 at row 1 of the 4x4 block turns into the WHT
    // column [1, 0, -1, -1] on top of the flat DC prediction.
    let stride = frame.strides[2];
    let v = &frame.planes[2];
    assert_eq!(v[28 * stride + 28], 129);
    assert_eq!(v[29 * stride + 28], 128);
    assert_eq!(v[30 * stride + 28], 127);
    assert_eq!(v[31 * stride + 28], 127);

    for y in 0..32 {
        for x in 0..32 {
            if x != 28 || y < 28 {
                assert_eq!(v[y * stride + x], 128, "sample ({}, {})", x, y);
            }
        }
    }
}

#[test]
fn test_decode_superframe() {
    let first = minimal_keyframe();
    let second = minimal_keyframe();

    let mut chunk = Vec::new();
    chunk.extend_from_slice(&first);
    chunk.extend_from_slice(&second);
    // Two frames, two bytes per size.
    let marker = 0b1100_0000 | ((2 - 1) << 3) | (2 - 1);
    chunk.push(marker);
    chunk.extend_from_slice(&(first.len() as u16).to_le_bytes());
    chunk.extend_from_slice(&(second.len() as u16).to_le_bytes());
    chunk.push(marker);

    let mut decoder = Vp9Decoder::new();
    decoder.decode_chunk(&chunk).unwrap();

    assert!(decoder.get_decoded_frame().is_ok());
    assert!(decoder.get_decoded_frame().is_ok());
    assert_eq!(decoder.get_decoded_frame(), Err(Error::NeedsMoreInput));
}

#[test]
fn test_show_existing_without_reference() {
    // show_existing_frame pointing at a slot nothing was stored into.
    let mut w = BitWriter::new();
    w.push_bits(2, 2);
    w.push_bits(0, 2);
    w.push_bits(1, 1); // show_existing_frame
    w.push_bits(3, 3); // slot index
    let chunk = w.into_bytes();

    let mut decoder = Vp9Decoder::new();
    assert!(matches!(
        decoder.decode_chunk(&chunk),
        Err(Error::Corrupted(_))
    ));
}

#[test]
fn test_show_existing_returns_stored_frame() {
    let mut decoder = Vp9Decoder::new();
    decoder.decode_chunk(&minimal_keyframe()).unwrap();
    decoder.get_decoded_frame().unwrap();

    // Keyframes refresh every slot; re-present slot 0.
    let mut w = BitWriter::new();
    w.push_bits(2, 2);
    w.push_bits(0, 2);
    w.push_bits(1, 1);
    w.push_bits(0, 3);
    decoder.decode_chunk(&w.into_bytes()).unwrap();

    let frame = decoder.get_decoded_frame().unwrap();
    assert_eq!(frame.width, 64);
    assert!(frame.planes[0].iter().all(|&s| s == 128));
}

#[test]
fn test_truncated_frame_rejected() {
    let mut frame = minimal_keyframe();
    // Drop the compressed header and tile data.
    frame.truncate(frame.len() - 66);
    let mut decoder = Vp9Decoder::new();
    assert!(matches!(
        decoder.decode_chunk(&frame),
        Err(Error::Corrupted(_))
    ));
}

#[test]
fn test_flush_resets_decoder() {
    let mut decoder = Vp9Decoder::new();
    decoder.decode_chunk(&minimal_keyframe()).unwrap();
    decoder.flush();
    assert_eq!(decoder.get_decoded_frame(), Err(Error::NeedsMoreInput));
    // Decoding works again after a flush.
    decoder.decode_chunk(&minimal_keyframe()).unwrap();
    assert!(decoder.get_decoded_frame().is_ok());
}
