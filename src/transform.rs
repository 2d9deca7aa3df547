//! Inverse DCT, ADST and Walsh-Hadamard transforms
//!
//! All transforms are bit-exact integer procedures on `i32` buffers;
//! butterfly products widen to `i64` before rounding. The 2-D driver runs
//! row transforms first, then column transforms, with the per-size final
//! rounding.

use crate::error::{Error, Result};
use crate::tables::{TxSize, TxType};

/// Rounded right shift
#[inline]
pub fn round2(value: i64, bits: u32) -> i32 {
    ((value + (1i64 << (bits - 1))) >> bits) as i32
}

/// Bit reversal of the low `bits` bits of `value`
#[inline]
fn brev(bits: u32, value: u32) -> u32 {
    let mut out = 0u32;
    for i in 0..bits {
        out |= ((value >> i) & 1) << (bits - 1 - i);
    }
    out
}

const COS64_LOOKUP: [i32; 33] = [
    16384, 16364, 16305, 16207, 16069, 15893, 15679, 15426, 15137, 14811, 14449, 14053, 13623,
    13160, 12665, 12140, 11585, 11003, 10394, 9760, 9102, 8423, 7723, 7005, 6270, 5520, 4756,
    3981, 3196, 2404, 1606, 804, 0,
];

/// cos(angle * pi / 64) in Q14
#[inline]
fn cos64(angle: u8) -> i32 {
    let angle = (angle & 127) as usize;
    match angle {
        0..=32 => COS64_LOOKUP[angle],
        33..=64 => -COS64_LOOKUP[64 - angle],
        65..=96 => -COS64_LOOKUP[angle - 64],
        _ => COS64_LOOKUP[128 - angle],
    }
}

/// sin(angle * pi / 64) in Q14
#[inline]
fn sin64(angle: u8) -> i32 {
    let angle = if angle < 32 { angle + 128 } else { angle };
    cos64(angle - 32)
}

/// In-place butterfly rotation B(a, b, angle, flip)
#[inline]
fn butterfly(data: &mut [i32], a: usize, b: usize, angle: u8, flip: bool) {
    let cos = cos64(angle) as i64;
    let sin = sin64(angle) as i64;
    let x = data[a] as i64 * cos - data[b] as i64 * sin;
    let y = data[a] as i64 * sin + data[b] as i64 * cos;
    data[a] = round2(x, 14);
    data[b] = round2(y, 14);
    if flip {
        data.swap(a, b);
    }
}

/// In-place Hadamard rotation H(a, b, flip)
#[inline]
fn hadamard(data: &mut [i32], a: usize, b: usize, flip: bool) {
    let (a, b) = if flip { (b, a) } else { (a, b) };
    let x = data[a];
    let y = data[b];
    data[a] = x + y;
    data[b] = x - y;
}

/// Butterfly into the high-precision scratch array, SB(a, b, angle, flip)
#[inline]
fn butterfly_wide(src: &[i32], dst: &mut [i64], a: usize, b: usize, angle: u8, flip: bool) {
    let cos = cos64(angle) as i64;
    let sin = sin64(angle) as i64;
    let x = src[a] as i64;
    let y = src[b] as i64;
    dst[a] = x * cos - y * sin;
    dst[b] = x * sin + y * cos;
    if flip {
        dst.swap(a, b);
    }
}

/// Hadamard rotation with rounding back to the working array, SH(a, b)
#[inline]
fn hadamard_narrow(src: &[i64], dst: &mut [i32], a: usize, b: usize) {
    let x = src[a];
    let y = src[b];
    dst[a] = round2(x + y, 14);
    dst[b] = round2(x - y, 14);
}

// =============================================================================
// Inverse DCT
// =============================================================================

/// Bit-reversal permutation applied before the inverse DCT
fn idct_permutation(data: &mut [i32], n: u32) {
    let size = 1usize << n;
    let mut copy = [0i32; 32];
    copy[..size].copy_from_slice(&data[..size]);
    for i in 0..size {
        data[i] = copy[brev(n, i as u32) as usize];
    }
}

/// Recursive inverse DCT on the first `1 << n` entries of `data`
fn idct_in_place(data: &mut [i32], n: u32) {
    let n0 = 1usize << n;
    let n1 = n0 >> 1;
    let n2 = n0 >> 2;
    let n3 = n0 >> 3;

    if n == 2 {
        butterfly(data, 0, 1, 16, true);
    } else {
        idct_in_place(data, n - 1);
    }

    for i in 0..n2 {
        let index = n1 + i;
        butterfly(data, index, n0 - 1 - i, 32 - brev(5, index as u32) as u8, false);
    }

    if n >= 3 {
        for i in 0..n3 {
            for j in 0..2 {
                let index = n1 + 4 * i + 2 * j;
                hadamard(data, index, index + 1, j == 1);
            }
        }
    }

    if n == 5 {
        for i in 0..2usize {
            for j in 0..2usize {
                let a = n0 - n as usize + 3 - n2 * j - 4 * i;
                let b = n1 + n as usize - 4 + n2 * j + 4 * i;
                let angle = 28 - 16 * i as i32 + 56 * j as i32;
                butterfly(data, a, b, angle as u8, true);
            }
        }
        for i in 0..2usize {
            for j in 0..4usize {
                let a = n1 + n3 * j + i;
                let b = n1 + n2 - 5 + n3 * j - i;
                hadamard(data, a, b, (j & 1) == 1);
            }
        }
    }

    if n >= 4 {
        let extra = if n == 5 { 1 } else { 0 };
        for i in 0..=extra {
            for j in 0..2usize {
                let a = n0 - n as usize + 2 - i - n2 * j;
                let b = n1 + n as usize - 3 + i + n2 * j;
                butterfly(data, a, b, (24 + 48 * j) as u8, true);
            }
        }
        for i in 0..(2 * n as usize - 6) {
            for j in 0..2usize {
                let a = n1 + n2 * j + i;
                let b = n1 + n2 - 1 + n2 * j - i;
                hadamard(data, a, b, (j & 1) == 1);
            }
        }
    }

    if n >= 3 {
        for i in 0..n3 {
            let a = n0 - n3 - 1 - i;
            let b = n1 + n3 + i;
            butterfly(data, a, b, 16, true);
        }
    }

    for i in 0..n1 {
        hadamard(data, i, n0 - 1 - i, false);
    }
}

fn idct(data: &mut [i32], n: u32) {
    idct_permutation(data, n);
    idct_in_place(data, n);
}

// =============================================================================
// Inverse ADST
// =============================================================================

const SINPI_1_9: i64 = 5283;
const SINPI_2_9: i64 = 9929;
const SINPI_3_9: i64 = 13377;
const SINPI_4_9: i64 = 15212;

fn adst4(data: &mut [i32]) {
    let t0 = data[0] as i64;
    let t1 = data[1] as i64;
    let t2 = data[2] as i64;
    let t3 = data[3] as i64;

    let s0 = SINPI_1_9 * t0;
    let s1 = SINPI_2_9 * t0;
    let s2 = SINPI_3_9 * t1;
    let s3 = SINPI_4_9 * t2;
    let s4 = SINPI_1_9 * t2;
    let s5 = SINPI_2_9 * t3;
    let s6 = SINPI_4_9 * t3;
    let s7 = SINPI_3_9 * (t0 - t2 + t3);

    let x0 = s0 + s3 + s5;
    let x1 = s1 - s4 - s6;
    let x2 = s7;
    let x3 = s2;

    data[0] = round2(x0 + x3, 14);
    data[1] = round2(x1 + x3, 14);
    data[2] = round2(x2, 14);
    data[3] = round2(x0 + x1 - x3, 14);
}

/// Even entries take reversed inputs, odd entries take the even inputs
fn adst_input_permutation(data: &mut [i32], n: u32) {
    let size = 1usize << n;
    let mut copy = [0i32; 16];
    copy[..size].copy_from_slice(&data[..size]);
    let mut i = 0;
    while i < size {
        data[i] = copy[size - 1 - i];
        data[i + 1] = copy[i];
        i += 2;
    }
}

fn adst_output_permutation(data: &mut [i32], n: u32) {
    let size = 1usize << n;
    let mut copy = [0i32; 16];
    copy[..size].copy_from_slice(&data[..size]);
    if n == 4 {
        for a in 0..2usize {
            for b in 0..2usize {
                for c in 0..2usize {
                    for d in 0..2usize {
                        data[8 * a + 4 * b + 2 * c + d] =
                            copy[8 * (d ^ c) + 4 * (c ^ b) + 2 * (b ^ a) + a];
                    }
                }
            }
        }
    } else {
        for a in 0..2usize {
            for b in 0..2usize {
                for c in 0..2usize {
                    data[4 * a + 2 * b + c] = copy[4 * (c ^ b) + 2 * (b ^ a) + a];
                }
            }
        }
    }
}

fn adst8(data: &mut [i32]) {
    let mut s = [0i64; 8];

    adst_input_permutation(data, 3);

    for i in 0..4 {
        butterfly_wide(data, &mut s, 2 * i, 1 + 2 * i, (30 - 8 * i) as u8, true);
    }
    for i in 0..4 {
        hadamard_narrow(&s, data, i, 4 + i);
    }
    for i in 0..2 {
        butterfly_wide(data, &mut s, 4 + 3 * i, 5 + i, (24 - 16 * i) as u8, true);
    }
    for i in 0..2 {
        hadamard_narrow(&s, data, 4 + i, 6 + i);
    }
    for i in 0..2 {
        hadamard(data, i, 2 + i, false);
    }
    for i in 0..2 {
        butterfly(data, 2 + 4 * i, 3 + 4 * i, 16, true);
    }

    adst_output_permutation(data, 3);

    for i in 0..4 {
        data[1 + 2 * i] = -data[1 + 2 * i];
    }
}

fn adst16(data: &mut [i32]) {
    let mut s = [0i64; 16];

    adst_input_permutation(data, 4);

    for i in 0..8 {
        butterfly_wide(data, &mut s, 2 * i, 1 + 2 * i, (31 - 4 * i) as u8, true);
    }
    for i in 0..8 {
        hadamard_narrow(&s, data, i, 8 + i);
    }
    for i in 0..4usize {
        let angle = 128 + 28 - 16 * i as i32;
        butterfly_wide(data, &mut s, 8 + 2 * i, 9 + 2 * i, angle as u8, true);
    }
    for i in 0..4 {
        hadamard_narrow(&s, data, 8 + i, 12 + i);
    }
    for i in 0..4 {
        hadamard(data, i, 4 + i, false);
    }
    for i in 0..2usize {
        for j in 0..2usize {
            butterfly_wide(
                data,
                &mut s,
                4 + 8 * i + 3 * j,
                5 + 8 * i + j,
                (24 - 16 * j) as u8,
                true,
            );
        }
    }
    for i in 0..2usize {
        for j in 0..2usize {
            hadamard_narrow(&s, data, 4 + 8 * j + i, 6 + 8 * j + i);
        }
    }
    for i in 0..2usize {
        for j in 0..2usize {
            hadamard(data, 8 * j + i, 2 + 8 * j + i, false);
        }
    }
    for i in 0..2usize {
        for j in 0..2usize {
            butterfly(
                data,
                2 + 4 * j + 8 * i,
                3 + 4 * j + 8 * i,
                (48 + 64 * (i ^ j)) as u8,
                false,
            );
        }
    }

    adst_output_permutation(data, 4);

    for i in 0..2usize {
        for j in 0..2usize {
            let index = 1 + 12 * j + 2 * i;
            data[index] = -data[index];
        }
    }
}

fn adst(data: &mut [i32], n: u32) -> Result<()> {
    match n {
        2 => adst4(data),
        3 => adst8(data),
        4 => adst16(data),
        _ => return Err(Error::corrupted("ADST requested for 32x32 transform")),
    }
    Ok(())
}

// =============================================================================
// Inverse Walsh-Hadamard (lossless)
// =============================================================================

/// 4-point inverse WHT; `shift` is 2 on the row pass and 0 on columns
fn wht4(data: &mut [i32], shift: u32) {
    let mut a = data[0] >> shift;
    let mut c = data[1] >> shift;
    let mut d = data[2] >> shift;
    let mut b = data[3] >> shift;
    a += c;
    d -= b;
    let average_of_a_and_d = (a - d) >> 1;
    b = average_of_a_and_d - b;
    c = average_of_a_and_d - c;
    a -= b;
    d += c;
    data[0] = a;
    data[1] = b;
    data[2] = c;
    data[3] = d;
}

// =============================================================================
// 2-D Driver
// =============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
enum Transform1d {
    Dct,
    Adst,
}

/// Row/column 1-D transform pair implied by the transform type
///
/// `ADST_DCT` means the column transform is the ADST.
const fn split_tx_type(tx_type: TxType) -> (Transform1d, Transform1d) {
    match tx_type {
        TxType::DctDct => (Transform1d::Dct, Transform1d::Dct),
        TxType::AdstDct => (Transform1d::Adst, Transform1d::Dct),
        TxType::DctAdst => (Transform1d::Dct, Transform1d::Adst),
        TxType::AdstAdst => (Transform1d::Adst, Transform1d::Adst),
    }
}

/// In-place 2-D inverse transform of a `size x size` coefficient block
///
/// Rows are transformed first, then columns. Lossless blocks use the WHT
/// with the per-pass shifts; everything else rounds once per column with
/// `Round2(x, min(6, n + 2))`.
pub fn inverse_transform_2d(
    data: &mut [i32],
    tx_size: TxSize,
    tx_type: TxType,
    lossless: bool,
) -> Result<()> {
    let n = tx_size.log2() as u32;
    let size = tx_size.size();
    if data.len() < size * size {
        return Err(Error::allocation("transform buffer shorter than block"));
    }
    // There is no 32-point ADST; 32x32 blocks are always DCT/DCT.
    let tx_type = if tx_size == TxSize::Tx32x32 {
        TxType::DctDct
    } else {
        tx_type
    };
    let (col_tx, row_tx) = split_tx_type(tx_type);

    let mut line = [0i32; 32];

    for i in 0..size {
        let row = &mut data[i * size..(i + 1) * size];
        line[..size].copy_from_slice(row);
        if lossless {
            wht4(&mut line, 2);
        } else {
            match row_tx {
                Transform1d::Dct => idct(&mut line, n),
                Transform1d::Adst => adst(&mut line, n)?,
            }
        }
        row.copy_from_slice(&line[..size]);
    }

    for j in 0..size {
        for i in 0..size {
            line[i] = data[i * size + j];
        }
        if lossless {
            wht4(&mut line, 0);
            for i in 0..size {
                data[i * size + j] = line[i];
            }
        } else {
            match col_tx {
                Transform1d::Dct => idct(&mut line, n),
                Transform1d::Adst => adst(&mut line, n)?,
            }
            let final_shift = (n + 2).min(6);
            for i in 0..size {
                data[i * size + j] = round2(line[i] as i64, final_shift);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cos64_symmetry() {
        assert_eq!(cos64(0), 16384);
        assert_eq!(cos64(32), 0);
        assert_eq!(cos64(64), -16384);
        assert_eq!(cos64(16), 11585);
        assert_eq!(cos64(48), -11585);
        // sin(x) = cos(x - 32)
        assert_eq!(sin64(32), cos64(0));
        assert_eq!(sin64(16), cos64(112));
    }

    #[test]
    fn test_brev() {
        assert_eq!(brev(2, 0b01), 0b10);
        assert_eq!(brev(5, 0b00001), 0b10000);
        assert_eq!(brev(5, 0b10110), 0b01101);
    }

    #[test]
    fn test_zero_input_stays_zero() {
        for (tx_size, tx_type) in [
            (TxSize::Tx4x4, TxType::DctDct),
            (TxSize::Tx4x4, TxType::AdstAdst),
            (TxSize::Tx8x8, TxType::AdstDct),
            (TxSize::Tx16x16, TxType::DctAdst),
            (TxSize::Tx32x32, TxType::DctDct),
        ] {
            let mut data = vec![0i32; tx_size.num_coeffs()];
            inverse_transform_2d(&mut data, tx_size, tx_type, false).unwrap();
            assert!(data.iter().all(|&v| v == 0));
        }
    }

    #[test]
    fn test_dc_only_dct_is_flat() {
        for tx_size in [TxSize::Tx4x4, TxSize::Tx8x8, TxSize::Tx16x16, TxSize::Tx32x32] {
            let mut data = vec![0i32; tx_size.num_coeffs()];
            data[0] = 1024;
            inverse_transform_2d(&mut data, tx_size, TxType::DctDct, false).unwrap();
            let first = data[0];
            assert!(data.iter().all(|&v| v == first), "tx {:?}", tx_size);
            assert!(first > 0);
        }
    }

    #[test]
    fn test_32x32_coerces_to_dct() {
        // There is no 32-point ADST, so any requested type must decode
        // exactly like DCT/DCT.
        let mut requested = vec![0i32; 1024];
        requested[0] = 512;
        requested[33] = -96;
        let mut reference = requested.clone();
        inverse_transform_2d(&mut requested, TxSize::Tx32x32, TxType::AdstAdst, false).unwrap();
        inverse_transform_2d(&mut reference, TxSize::Tx32x32, TxType::DctDct, false).unwrap();
        assert_eq!(requested, reference);
    }

    #[test]
    fn test_wht_dc_gain() {
        // Lossless DC of 4 reconstructs a residual of 1 in every position
        // being spread by the two WHT passes.
        let mut data = vec![0i32; 16];
        data[0] = 4;
        inverse_transform_2d(&mut data, TxSize::Tx4x4, TxType::DctDct, true).unwrap();
        assert_eq!(data[0], 1);
        assert!(data.iter().skip(1).all(|&v| v == 0));
    }

    #[test]
    fn test_wht_row_pass_known_vector() {
        let mut line = [4i32, 0, 0, 0];
        wht4(&mut line, 2);
        assert_eq!(line, [1, 0, 0, 0]);
        let mut line = [1i32, 0, 0, 0];
        wht4(&mut line, 0);
        assert_eq!(line, [1, 0, 0, 0]);
    }

    #[test]
    fn test_idct_linearity() {
        // The integer DCT is close to linear: doubling the input doubles
        // the output up to rounding.
        let mut a = vec![0i32; 16];
        let mut b = vec![0i32; 16];
        for i in 0..16 {
            a[i] = (i as i32 * 13) % 47 - 23;
            b[i] = a[i] * 2;
        }
        inverse_transform_2d(&mut a, TxSize::Tx4x4, TxType::DctDct, false).unwrap();
        inverse_transform_2d(&mut b, TxSize::Tx4x4, TxType::DctDct, false).unwrap();
        for i in 0..16 {
            assert!((b[i] - 2 * a[i]).abs() <= 2, "position {}", i);
        }
    }
}
