//! VP9 Transform Implementations
//!
//! VP9 uses multiple transform types and sizes:
//! - DCT (Discrete Cosine Transform): 4x4, 8x8, 16x16, 32x32
//! - ADST (Asymmetric Discrete Sine Transform): 4x4, 8x8, 16x16
//! - WHT (Walsh-Hadamard Transform): 4x4 only (lossless mode)
//!
//! All transforms use fixed-point arithmetic. Every product with a 14-bit
//! trigonometric constant is rounded half away from zero, so encoder and
//! decoder reconstruct identically on every platform.
//!
//! Scaling: forward outputs are 8x the orthonormal transform (4x for 32x32).
//! The inverse 2-D transforms undo that scale with their final shift.

use super::tables::{BitDepth, TxSize, TxType};

// =============================================================================
// Fixed-Point Constants
// =============================================================================

const DCT_CONST_BITS: u32 = 14;

// DCT constants (cos(k * pi / 64) * 16384)
const COSPI_1_64: i64 = 16364;
const COSPI_2_64: i64 = 16305;
const COSPI_3_64: i64 = 16207;
const COSPI_4_64: i64 = 16069;
const COSPI_5_64: i64 = 15893;
const COSPI_6_64: i64 = 15679;
const COSPI_7_64: i64 = 15426;
const COSPI_8_64: i64 = 15137;
const COSPI_9_64: i64 = 14811;
const COSPI_10_64: i64 = 14449;
const COSPI_11_64: i64 = 14053;
const COSPI_12_64: i64 = 13623;
const COSPI_13_64: i64 = 13160;
const COSPI_14_64: i64 = 12665;
const COSPI_15_64: i64 = 12140;
const COSPI_16_64: i64 = 11585;
const COSPI_17_64: i64 = 11003;
const COSPI_18_64: i64 = 10394;
const COSPI_19_64: i64 = 9760;
const COSPI_20_64: i64 = 9102;
const COSPI_21_64: i64 = 8423;
const COSPI_22_64: i64 = 7723;
const COSPI_23_64: i64 = 7005;
const COSPI_24_64: i64 = 6270;
const COSPI_25_64: i64 = 5520;
const COSPI_26_64: i64 = 4756;
const COSPI_27_64: i64 = 3981;
const COSPI_28_64: i64 = 3196;
const COSPI_29_64: i64 = 2404;
const COSPI_30_64: i64 = 1606;
const COSPI_31_64: i64 = 804;

// ADST constants
const SINPI_1_9: i64 = 5283;
const SINPI_2_9: i64 = 9929;
const SINPI_3_9: i64 = 13377;
const SINPI_4_9: i64 = 15212;

/// Scale of the lossless quantizer step folded into the WHT
const UNIT_QUANT_SHIFT: u32 = 2;
const UNIT_QUANT_FACTOR: i32 = 1 << UNIT_QUANT_SHIFT;

// =============================================================================
// Rounding and Range
// =============================================================================

/// Right shift with rounding, ties away from zero
#[inline(always)]
pub fn round_shift(x: i64, bits: u32) -> i64 {
    if bits == 0 {
        return x;
    }
    let half = 1i64 << (bits - 1);
    if x >= 0 {
        (x + half) >> bits
    } else {
        -((-x + half) >> bits)
    }
}

/// Rounding shift for DCT
#[inline(always)]
fn dct_round_shift(x: i64) -> i64 {
    round_shift(x, DCT_CONST_BITS)
}

/// Signed width that inverse-transform intermediates must fit in
///
/// Conformant streams never leave the range. Debug builds assert on it;
/// release builds wrap to the width, which only changes output for streams
/// that are already invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    bits: u32,
}

impl Range {
    /// No range limit (forward path)
    pub const UNBOUNDED: Range = Range { bits: 64 };

    pub const fn for_depth(bit_depth: BitDepth) -> Self {
        Range {
            bits: bit_depth.coeff_bits(),
        }
    }

    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Whether a value fits the range without wrapping
    #[inline(always)]
    pub fn contains(&self, x: i64) -> bool {
        if self.bits >= 64 {
            return true;
        }
        let limit = 1i64 << (self.bits - 1);
        x >= -limit && x < limit
    }

    #[inline(always)]
    pub fn wrap(&self, x: i64) -> i64 {
        if self.bits >= 64 {
            return x;
        }
        debug_assert!(
            self.contains(x),
            "transform intermediate {} exceeds {}-bit range",
            x,
            self.bits
        );
        let shift = 64 - self.bits;
        (x << shift) >> shift
    }

    /// Round a 14-bit fixed-point product, then range-check it
    #[inline(always)]
    fn round(&self, x: i64) -> i64 {
        self.wrap(dct_round_shift(x))
    }
}

/// One 1-D transform kernel. The 2-D drivers pick a column and a row kernel
/// once per block, before any sample is touched.
type Kernel = fn(&[i32], &mut [i32], Range);

// =============================================================================
// 4-point Transforms
// =============================================================================

/// 4-point inverse DCT
pub fn idct4(input: &[i32], output: &mut [i32], range: Range) {
    let x0 = input[0] as i64;
    let x1 = input[1] as i64;
    let x2 = input[2] as i64;
    let x3 = input[3] as i64;

    let s0 = range.round((x0 + x2) * COSPI_16_64);
    let s1 = range.round((x0 - x2) * COSPI_16_64);
    let s2 = range.round(x1 * COSPI_24_64 - x3 * COSPI_8_64);
    let s3 = range.round(x1 * COSPI_8_64 + x3 * COSPI_24_64);

    output[0] = range.wrap(s0 + s3) as i32;
    output[1] = range.wrap(s1 + s2) as i32;
    output[2] = range.wrap(s1 - s2) as i32;
    output[3] = range.wrap(s0 - s3) as i32;
}

/// 4-point inverse ADST
pub fn iadst4(input: &[i32], output: &mut [i32], range: Range) {
    let x0 = input[0] as i64;
    let x1 = input[1] as i64;
    let x2 = input[2] as i64;
    let x3 = input[3] as i64;

    let s0 = SINPI_1_9 * x0;
    let s1 = SINPI_2_9 * x0;
    let s2 = SINPI_3_9 * x1;
    let s3 = SINPI_4_9 * x2;
    let s4 = SINPI_1_9 * x2;
    let s5 = SINPI_2_9 * x3;
    let s6 = SINPI_4_9 * x3;
    let s7 = x0 - x2 + x3;

    let a = s0 + s3 + s5;
    let b = s1 - s4 - s6;
    let c = SINPI_3_9 * s7;
    let d = s2;

    output[0] = range.round(a + d) as i32;
    output[1] = range.round(b + d) as i32;
    output[2] = range.round(c) as i32;
    output[3] = range.round(a + b - d) as i32;
}

/// 4-point forward DCT
pub fn fdct4(input: &[i32], output: &mut [i32], _range: Range) {
    let s0 = (input[0] + input[3]) as i64;
    let s1 = (input[1] + input[2]) as i64;
    let s2 = (input[1] - input[2]) as i64;
    let s3 = (input[0] - input[3]) as i64;

    output[0] = dct_round_shift((s0 + s1) * COSPI_16_64) as i32;
    output[1] = dct_round_shift(s3 * COSPI_8_64 + s2 * COSPI_24_64) as i32;
    output[2] = dct_round_shift((s0 - s1) * COSPI_16_64) as i32;
    output[3] = dct_round_shift(s3 * COSPI_24_64 - s2 * COSPI_8_64) as i32;
}

/// 4-point forward ADST (transpose of [`iadst4`])
pub fn fadst4(input: &[i32], output: &mut [i32], _range: Range) {
    let x0 = input[0] as i64;
    let x1 = input[1] as i64;
    let x2 = input[2] as i64;
    let x3 = input[3] as i64;

    let s0 = SINPI_1_9 * x0;
    let s1 = SINPI_4_9 * x0;
    let s2 = SINPI_2_9 * x1;
    let s3 = SINPI_1_9 * x1;
    let s4 = SINPI_3_9 * x2;
    let s5 = SINPI_4_9 * x3;
    let s6 = SINPI_2_9 * x3;
    let s7 = x0 + x1 - x3;

    let a = s0 + s2 + s5;
    let b = SINPI_3_9 * s7;
    let c = s1 - s3 + s6;
    let d = s4;

    output[0] = dct_round_shift(a + d) as i32;
    output[1] = dct_round_shift(b) as i32;
    output[2] = dct_round_shift(c - d) as i32;
    output[3] = dct_round_shift(c - a + d) as i32;
}

// =============================================================================
// 8-point Transforms
// =============================================================================

/// 8-point inverse DCT
pub fn idct8(input: &[i32], output: &mut [i32], range: Range) {
    let x: [i64; 8] = std::array::from_fn(|i| input[i] as i64);

    // Stage 1
    let s4 = range.round(x[1] * COSPI_28_64 - x[7] * COSPI_4_64);
    let s7 = range.round(x[1] * COSPI_4_64 + x[7] * COSPI_28_64);
    let s5 = range.round(x[5] * COSPI_12_64 - x[3] * COSPI_20_64);
    let s6 = range.round(x[5] * COSPI_20_64 + x[3] * COSPI_12_64);

    // Stage 2
    let t0 = range.round((x[0] + x[4]) * COSPI_16_64);
    let t1 = range.round((x[0] - x[4]) * COSPI_16_64);
    let t2 = range.round(x[2] * COSPI_24_64 - x[6] * COSPI_8_64);
    let t3 = range.round(x[2] * COSPI_8_64 + x[6] * COSPI_24_64);
    let t4 = range.wrap(s4 + s5);
    let t5 = range.wrap(s4 - s5);
    let t6 = range.wrap(s7 - s6);
    let t7 = range.wrap(s6 + s7);

    // Stage 3
    let u0 = range.wrap(t0 + t3);
    let u1 = range.wrap(t1 + t2);
    let u2 = range.wrap(t1 - t2);
    let u3 = range.wrap(t0 - t3);
    let u5 = range.round((t6 - t5) * COSPI_16_64);
    let u6 = range.round((t5 + t6) * COSPI_16_64);

    // Stage 4
    output[0] = range.wrap(u0 + t7) as i32;
    output[1] = range.wrap(u1 + u6) as i32;
    output[2] = range.wrap(u2 + u5) as i32;
    output[3] = range.wrap(u3 + t4) as i32;
    output[4] = range.wrap(u3 - t4) as i32;
    output[5] = range.wrap(u2 - u5) as i32;
    output[6] = range.wrap(u1 - u6) as i32;
    output[7] = range.wrap(u0 - t7) as i32;
}

/// 8-point inverse ADST
///
/// The 8-point ADST matrix is symmetric, so this kernel also serves as the
/// forward ADST.
pub fn iadst8(input: &[i32], output: &mut [i32], range: Range) {
    let x0 = input[7] as i64;
    let x1 = input[0] as i64;
    let x2 = input[5] as i64;
    let x3 = input[2] as i64;
    let x4 = input[3] as i64;
    let x5 = input[4] as i64;
    let x6 = input[1] as i64;
    let x7 = input[6] as i64;

    // Stage 1
    let s0 = COSPI_2_64 * x0 + COSPI_30_64 * x1;
    let s1 = COSPI_30_64 * x0 - COSPI_2_64 * x1;
    let s2 = COSPI_10_64 * x2 + COSPI_22_64 * x3;
    let s3 = COSPI_22_64 * x2 - COSPI_10_64 * x3;
    let s4 = COSPI_18_64 * x4 + COSPI_14_64 * x5;
    let s5 = COSPI_14_64 * x4 - COSPI_18_64 * x5;
    let s6 = COSPI_26_64 * x6 + COSPI_6_64 * x7;
    let s7 = COSPI_6_64 * x6 - COSPI_26_64 * x7;

    let x0 = range.round(s0 + s4);
    let x1 = range.round(s1 + s5);
    let x2 = range.round(s2 + s6);
    let x3 = range.round(s3 + s7);
    let x4 = range.round(s0 - s4);
    let x5 = range.round(s1 - s5);
    let x6 = range.round(s2 - s6);
    let x7 = range.round(s3 - s7);

    // Stage 2
    let s4 = COSPI_8_64 * x4 + COSPI_24_64 * x5;
    let s5 = COSPI_24_64 * x4 - COSPI_8_64 * x5;
    let s6 = -COSPI_24_64 * x6 + COSPI_8_64 * x7;
    let s7 = COSPI_8_64 * x6 + COSPI_24_64 * x7;

    let y0 = range.wrap(x0 + x2);
    let y1 = range.wrap(x1 + x3);
    let y2 = range.wrap(x0 - x2);
    let y3 = range.wrap(x1 - x3);
    let y4 = range.round(s4 + s6);
    let y5 = range.round(s5 + s7);
    let y6 = range.round(s4 - s6);
    let y7 = range.round(s5 - s7);

    // Stage 3
    let z2 = range.round(COSPI_16_64 * (y2 + y3));
    let z3 = range.round(COSPI_16_64 * (y2 - y3));
    let z6 = range.round(COSPI_16_64 * (y6 + y7));
    let z7 = range.round(COSPI_16_64 * (y6 - y7));

    output[0] = y0 as i32;
    output[1] = range.wrap(-y4) as i32;
    output[2] = z6 as i32;
    output[3] = range.wrap(-z2) as i32;
    output[4] = z3 as i32;
    output[5] = range.wrap(-z7) as i32;
    output[6] = y5 as i32;
    output[7] = range.wrap(-y1) as i32;
}

/// 8-point forward DCT: 4-point DCT of the folded sums plus an odd rotation
pub fn fdct8(input: &[i32], output: &mut [i32], range: Range) {
    let sums: [i32; 4] = std::array::from_fn(|k| input[k] + input[7 - k]);
    let b: [i64; 4] = std::array::from_fn(|k| (input[k] - input[7 - k]) as i64);

    let mut even = [0i32; 4];
    fdct4(&sums, &mut even, range);

    let t5 = dct_round_shift((b[1] - b[2]) * COSPI_16_64);
    let t6 = dct_round_shift((b[1] + b[2]) * COSPI_16_64);
    let x4 = b[3] + t5;
    let x5 = b[3] - t5;
    let x6 = b[0] - t6;
    let x7 = b[0] + t6;

    for k in 0..4 {
        output[2 * k] = even[k];
    }
    output[1] = dct_round_shift(x4 * COSPI_28_64 + x7 * COSPI_4_64) as i32;
    output[3] = dct_round_shift(x6 * COSPI_12_64 - x5 * COSPI_20_64) as i32;
    output[5] = dct_round_shift(x5 * COSPI_12_64 + x6 * COSPI_20_64) as i32;
    output[7] = dct_round_shift(x7 * COSPI_28_64 - x4 * COSPI_4_64) as i32;
}

/// 8-point forward ADST
pub fn fadst8(input: &[i32], output: &mut [i32], range: Range) {
    iadst8(input, output, range);
}

// =============================================================================
// 16-point Transforms
// =============================================================================

/// 16-point inverse DCT: 8-point IDCT of the even inputs, a six-stage
/// butterfly network for the odd inputs, then the mirrored combination.
pub fn idct16(input: &[i32], output: &mut [i32], range: Range) {
    let even_in: [i32; 8] = std::array::from_fn(|k| input[2 * k]);
    let mut even = [0i32; 8];
    idct8(&even_in, &mut even, range);

    let i = |k: usize| input[k] as i64;

    // Stage 2
    let t8 = range.round(i(1) * COSPI_30_64 - i(15) * COSPI_2_64);
    let t15 = range.round(i(1) * COSPI_2_64 + i(15) * COSPI_30_64);
    let t9 = range.round(i(9) * COSPI_14_64 - i(7) * COSPI_18_64);
    let t14 = range.round(i(9) * COSPI_18_64 + i(7) * COSPI_14_64);
    let t10 = range.round(i(5) * COSPI_22_64 - i(11) * COSPI_10_64);
    let t13 = range.round(i(5) * COSPI_10_64 + i(11) * COSPI_22_64);
    let t11 = range.round(i(13) * COSPI_6_64 - i(3) * COSPI_26_64);
    let t12 = range.round(i(13) * COSPI_26_64 + i(3) * COSPI_6_64);

    // Stage 3
    let s8 = range.wrap(t8 + t9);
    let s9 = range.wrap(t8 - t9);
    let s10 = range.wrap(t11 - t10);
    let s11 = range.wrap(t10 + t11);
    let s12 = range.wrap(t12 + t13);
    let s13 = range.wrap(t12 - t13);
    let s14 = range.wrap(t15 - t14);
    let s15 = range.wrap(t14 + t15);

    // Stage 4
    let t9 = range.round(-s9 * COSPI_8_64 + s14 * COSPI_24_64);
    let t14 = range.round(s9 * COSPI_24_64 + s14 * COSPI_8_64);
    let t10 = range.round(-s10 * COSPI_24_64 - s13 * COSPI_8_64);
    let t13 = range.round(-s10 * COSPI_8_64 + s13 * COSPI_24_64);

    // Stage 5
    let w8 = range.wrap(s8 + s11);
    let w9 = range.wrap(t9 + t10);
    let w10 = range.wrap(t9 - t10);
    let w11 = range.wrap(s8 - s11);
    let w12 = range.wrap(s15 - s12);
    let w13 = range.wrap(t14 - t13);
    let w14 = range.wrap(t13 + t14);
    let w15 = range.wrap(s12 + s15);

    // Stage 6
    let v10 = range.round((w13 - w10) * COSPI_16_64);
    let v13 = range.round((w10 + w13) * COSPI_16_64);
    let v11 = range.round((w12 - w11) * COSPI_16_64);
    let v12 = range.round((w11 + w12) * COSPI_16_64);

    let odd = [w8, w9, v10, v11, v12, v13, w14, w15];
    for k in 0..8 {
        let e = even[k] as i64;
        output[k] = range.wrap(e + odd[7 - k]) as i32;
        output[15 - k] = range.wrap(e - odd[7 - k]) as i32;
    }
}

/// 16-point inverse ADST
///
/// Symmetric like [`iadst8`]; also used as the forward ADST.
pub fn iadst16(input: &[i32], output: &mut [i32], range: Range) {
    const ORDER: [usize; 16] = [15, 0, 13, 2, 11, 4, 9, 6, 7, 8, 5, 10, 3, 12, 1, 14];
    const STAGE1: [(i64, i64); 8] = [
        (COSPI_1_64, COSPI_31_64),
        (COSPI_5_64, COSPI_27_64),
        (COSPI_9_64, COSPI_23_64),
        (COSPI_13_64, COSPI_19_64),
        (COSPI_17_64, COSPI_15_64),
        (COSPI_21_64, COSPI_11_64),
        (COSPI_25_64, COSPI_7_64),
        (COSPI_29_64, COSPI_3_64),
    ];

    let x: [i64; 16] = std::array::from_fn(|k| input[ORDER[k]] as i64);

    // Stage 1
    let mut s = [0i64; 16];
    for (k, &(a, b)) in STAGE1.iter().enumerate() {
        s[2 * k] = x[2 * k] * a + x[2 * k + 1] * b;
        s[2 * k + 1] = x[2 * k] * b - x[2 * k + 1] * a;
    }
    let mut x = [0i64; 16];
    for k in 0..8 {
        x[k] = range.round(s[k] + s[k + 8]);
        x[k + 8] = range.round(s[k] - s[k + 8]);
    }

    // Stage 2
    let mut s = x;
    s[8] = x[8] * COSPI_4_64 + x[9] * COSPI_28_64;
    s[9] = x[8] * COSPI_28_64 - x[9] * COSPI_4_64;
    s[10] = x[10] * COSPI_20_64 + x[11] * COSPI_12_64;
    s[11] = x[10] * COSPI_12_64 - x[11] * COSPI_20_64;
    s[12] = -x[12] * COSPI_28_64 + x[13] * COSPI_4_64;
    s[13] = x[12] * COSPI_4_64 + x[13] * COSPI_28_64;
    s[14] = -x[14] * COSPI_12_64 + x[15] * COSPI_20_64;
    s[15] = x[14] * COSPI_20_64 + x[15] * COSPI_12_64;

    let mut x = [0i64; 16];
    for k in 0..4 {
        x[k] = range.wrap(s[k] + s[k + 4]);
        x[k + 4] = range.wrap(s[k] - s[k + 4]);
        x[k + 8] = range.round(s[k + 8] + s[k + 12]);
        x[k + 12] = range.round(s[k + 8] - s[k + 12]);
    }

    // Stage 3
    let mut s = x;
    for base in [4usize, 12] {
        s[base] = x[base] * COSPI_8_64 + x[base + 1] * COSPI_24_64;
        s[base + 1] = x[base] * COSPI_24_64 - x[base + 1] * COSPI_8_64;
        s[base + 2] = -x[base + 2] * COSPI_24_64 + x[base + 3] * COSPI_8_64;
        s[base + 3] = x[base + 2] * COSPI_8_64 + x[base + 3] * COSPI_24_64;
    }

    let mut x = [0i64; 16];
    for base in [0usize, 8] {
        x[base] = range.wrap(s[base] + s[base + 2]);
        x[base + 1] = range.wrap(s[base + 1] + s[base + 3]);
        x[base + 2] = range.wrap(s[base] - s[base + 2]);
        x[base + 3] = range.wrap(s[base + 1] - s[base + 3]);
        x[base + 4] = range.round(s[base + 4] + s[base + 6]);
        x[base + 5] = range.round(s[base + 5] + s[base + 7]);
        x[base + 6] = range.round(s[base + 4] - s[base + 6]);
        x[base + 7] = range.round(s[base + 5] - s[base + 7]);
    }

    // Stage 4
    let (a, b) = (x[2], x[3]);
    x[2] = range.round(-COSPI_16_64 * (a + b));
    x[3] = range.round(COSPI_16_64 * (a - b));
    let (a, b) = (x[6], x[7]);
    x[6] = range.round(COSPI_16_64 * (a + b));
    x[7] = range.round(COSPI_16_64 * (b - a));
    let (a, b) = (x[10], x[11]);
    x[10] = range.round(COSPI_16_64 * (a + b));
    x[11] = range.round(COSPI_16_64 * (b - a));
    let (a, b) = (x[14], x[15]);
    x[14] = range.round(-COSPI_16_64 * (a + b));
    x[15] = range.round(COSPI_16_64 * (a - b));

    let result = [
        x[0], -x[8], x[12], -x[4], x[6], x[14], x[10], x[2], x[3], x[11], x[15], x[7], x[5],
        -x[13], x[9], -x[1],
    ];
    for (out, v) in output.iter_mut().zip(result) {
        *out = range.wrap(v) as i32;
    }
}

/// 16-point forward DCT
pub fn fdct16(input: &[i32], output: &mut [i32], range: Range) {
    let sums: [i32; 8] = std::array::from_fn(|k| input[k] + input[15 - k]);
    let mut even = [0i32; 8];
    fdct8(&sums, &mut even, range);

    // step[k] = in[7 - k] - in[8 + k]
    let st: [i64; 8] = std::array::from_fn(|k| (input[7 - k] - input[8 + k]) as i64);

    let a2 = dct_round_shift((st[5] - st[2]) * COSPI_16_64);
    let a3 = dct_round_shift((st[4] - st[3]) * COSPI_16_64);
    let a4 = dct_round_shift((st[4] + st[3]) * COSPI_16_64);
    let a5 = dct_round_shift((st[5] + st[2]) * COSPI_16_64);

    let b = [
        st[0] + a3,
        st[1] + a2,
        st[1] - a2,
        st[0] - a3,
        st[7] - a4,
        st[6] - a5,
        st[6] + a5,
        st[7] + a4,
    ];

    let c1 = dct_round_shift(-b[1] * COSPI_8_64 + b[6] * COSPI_24_64);
    let c2 = dct_round_shift(b[2] * COSPI_24_64 + b[5] * COSPI_8_64);
    let c5 = dct_round_shift(b[2] * COSPI_8_64 - b[5] * COSPI_24_64);
    let c6 = dct_round_shift(b[1] * COSPI_24_64 + b[6] * COSPI_8_64);

    let p = [
        b[0] + c1,
        b[0] - c1,
        b[3] + c2,
        b[3] - c2,
        b[4] - c5,
        b[4] + c5,
        b[7] - c6,
        b[7] + c6,
    ];

    for k in 0..8 {
        output[2 * k] = even[k];
    }
    output[1] = dct_round_shift(p[0] * COSPI_30_64 + p[7] * COSPI_2_64) as i32;
    output[9] = dct_round_shift(p[1] * COSPI_14_64 + p[6] * COSPI_18_64) as i32;
    output[5] = dct_round_shift(p[2] * COSPI_22_64 + p[5] * COSPI_10_64) as i32;
    output[13] = dct_round_shift(p[3] * COSPI_6_64 + p[4] * COSPI_26_64) as i32;
    output[3] = dct_round_shift(-p[3] * COSPI_26_64 + p[4] * COSPI_6_64) as i32;
    output[11] = dct_round_shift(-p[2] * COSPI_10_64 + p[5] * COSPI_22_64) as i32;
    output[7] = dct_round_shift(-p[1] * COSPI_18_64 + p[6] * COSPI_14_64) as i32;
    output[15] = dct_round_shift(-p[0] * COSPI_2_64 + p[7] * COSPI_30_64) as i32;
}

/// 16-point forward ADST
pub fn fadst16(input: &[i32], output: &mut [i32], range: Range) {
    iadst16(input, output, range);
}

// =============================================================================
// 32-point Transforms
// =============================================================================

/// Odd half of the 32-point DCT as a seven-stage butterfly network
///
/// `odd[k]` holds frequency `2k + 1`; entry `j` of the result is the odd
/// contribution to sample `j`. The odd cosine matrix is symmetric, so the
/// forward transform runs the same network over the half-input differences.
fn dct32_odd(odd: &[i64; 16], range: Range) -> [i64; 16] {
    // (frequency a, frequency b, cos for a, cos for b) per output pair
    const STAGE1: [(usize, usize, i64, i64); 8] = [
        (1, 31, COSPI_31_64, COSPI_1_64),
        (17, 15, COSPI_15_64, COSPI_17_64),
        (9, 23, COSPI_23_64, COSPI_9_64),
        (25, 7, COSPI_7_64, COSPI_25_64),
        (5, 27, COSPI_27_64, COSPI_5_64),
        (21, 11, COSPI_11_64, COSPI_21_64),
        (13, 19, COSPI_19_64, COSPI_13_64),
        (29, 3, COSPI_3_64, COSPI_29_64),
    ];
    let i = |freq: usize| odd[freq / 2];

    // Stage 1
    let mut s = [0i64; 32];
    for (n, &(a, b, ca, cb)) in STAGE1.iter().enumerate() {
        s[16 + n] = range.round(i(a) * ca - i(b) * cb);
        s[31 - n] = range.round(i(a) * cb + i(b) * ca);
    }

    // Stage 2
    let mut t = [0i64; 32];
    for b in [16usize, 20, 24, 28] {
        t[b] = range.wrap(s[b] + s[b + 1]);
        t[b + 1] = range.wrap(s[b] - s[b + 1]);
        t[b + 2] = range.wrap(s[b + 3] - s[b + 2]);
        t[b + 3] = range.wrap(s[b + 2] + s[b + 3]);
    }

    // Stage 3
    let mut s = t;
    s[17] = range.round(-t[17] * COSPI_4_64 + t[30] * COSPI_28_64);
    s[30] = range.round(t[17] * COSPI_28_64 + t[30] * COSPI_4_64);
    s[18] = range.round(-t[18] * COSPI_28_64 - t[29] * COSPI_4_64);
    s[29] = range.round(-t[18] * COSPI_4_64 + t[29] * COSPI_28_64);
    s[21] = range.round(-t[21] * COSPI_20_64 + t[26] * COSPI_12_64);
    s[26] = range.round(t[21] * COSPI_12_64 + t[26] * COSPI_20_64);
    s[22] = range.round(-t[22] * COSPI_12_64 - t[25] * COSPI_20_64);
    s[25] = range.round(-t[22] * COSPI_20_64 + t[25] * COSPI_12_64);

    // Stage 4
    let mut t = [0i64; 32];
    for b in [16usize, 24] {
        t[b] = range.wrap(s[b] + s[b + 3]);
        t[b + 1] = range.wrap(s[b + 1] + s[b + 2]);
        t[b + 2] = range.wrap(s[b + 1] - s[b + 2]);
        t[b + 3] = range.wrap(s[b] - s[b + 3]);
        t[b + 4] = range.wrap(s[b + 7] - s[b + 4]);
        t[b + 5] = range.wrap(s[b + 6] - s[b + 5]);
        t[b + 6] = range.wrap(s[b + 5] + s[b + 6]);
        t[b + 7] = range.wrap(s[b + 4] + s[b + 7]);
    }

    // Stage 5
    let mut s = t;
    for (lo, hi) in [(18usize, 29usize), (19, 28)] {
        s[lo] = range.round(-t[lo] * COSPI_8_64 + t[hi] * COSPI_24_64);
        s[hi] = range.round(t[lo] * COSPI_24_64 + t[hi] * COSPI_8_64);
    }
    for (lo, hi) in [(20usize, 27usize), (21, 26)] {
        s[lo] = range.round(-t[lo] * COSPI_24_64 - t[hi] * COSPI_8_64);
        s[hi] = range.round(-t[lo] * COSPI_8_64 + t[hi] * COSPI_24_64);
    }

    // Stage 6
    let mut t = [0i64; 32];
    for k in 0..4 {
        t[16 + k] = range.wrap(s[16 + k] + s[23 - k]);
        t[23 - k] = range.wrap(s[16 + k] - s[23 - k]);
        t[24 + k] = range.wrap(s[31 - k] - s[24 + k]);
        t[31 - k] = range.wrap(s[24 + k] + s[31 - k]);
    }

    // Stage 7
    let mut s = t;
    for k in 0..4 {
        let (lo, hi) = (t[20 + k], t[27 - k]);
        s[20 + k] = range.round((hi - lo) * COSPI_16_64);
        s[27 - k] = range.round((lo + hi) * COSPI_16_64);
    }

    std::array::from_fn(|j| s[31 - j])
}

/// 32-point inverse DCT: 16-point IDCT of the even inputs, the odd
/// butterfly network, then the mirrored combination
pub fn idct32(input: &[i32], output: &mut [i32], range: Range) {
    let even_in: [i32; 16] = std::array::from_fn(|k| input[2 * k]);
    let mut even = [0i32; 16];
    idct16(&even_in, &mut even, range);

    let odd_in: [i64; 16] = std::array::from_fn(|k| input[2 * k + 1] as i64);
    let odd = dct32_odd(&odd_in, range);

    for j in 0..16 {
        let e = even[j] as i64;
        output[j] = range.wrap(e + odd[j]) as i32;
        output[31 - j] = range.wrap(e - odd[j]) as i32;
    }
}

/// 32-point forward DCT
pub fn fdct32(input: &[i32], output: &mut [i32], range: Range) {
    let sums: [i32; 16] = std::array::from_fn(|k| input[k] + input[31 - k]);
    let diffs: [i64; 16] = std::array::from_fn(|k| (input[k] - input[31 - k]) as i64);

    let mut even = [0i32; 16];
    fdct16(&sums, &mut even, range);
    let odd = dct32_odd(&diffs, range);

    for k in 0..16 {
        output[2 * k] = even[k];
        output[2 * k + 1] = odd[k] as i32;
    }
}

// =============================================================================
// 2-D Drivers
// =============================================================================

/// Inverse kernels for one transform size: (DCT, ADST)
fn inverse_kernels(tx_size: TxSize) -> (Kernel, Kernel) {
    match tx_size {
        TxSize::Tx4x4 => (idct4, iadst4),
        TxSize::Tx8x8 => (idct8, iadst8),
        TxSize::Tx16x16 => (idct16, iadst16),
        TxSize::Tx32x32 => (idct32, idct32),
    }
}

/// Forward kernels for one transform size: (DCT, ADST)
fn forward_kernels(tx_size: TxSize) -> (Kernel, Kernel) {
    match tx_size {
        TxSize::Tx4x4 => (fdct4, fadst4),
        TxSize::Tx8x8 => (fdct8, fadst8),
        TxSize::Tx16x16 => (fdct16, fadst16),
        TxSize::Tx32x32 => (fdct32, fdct32),
    }
}

/// Final normalization shift of the inverse 2-D transform
const fn inverse_shift(tx_size: TxSize) -> u32 {
    match tx_size {
        TxSize::Tx4x4 => 4,
        TxSize::Tx8x8 => 5,
        TxSize::Tx16x16 | TxSize::Tx32x32 => 6,
    }
}

/// Forward scaling: (input left shift, shift between passes, final shift)
const fn forward_shifts(tx_size: TxSize) -> (u32, u32, u32) {
    match tx_size {
        TxSize::Tx4x4 => (4, 0, 2),
        TxSize::Tx8x8 => (2, 0, 1),
        TxSize::Tx16x16 => (2, 2, 0),
        TxSize::Tx32x32 => (2, 2, 2),
    }
}

fn check_block(tx_size: TxSize, tx_type: TxType, input: &[i32], output: &[i32]) {
    let n = tx_size.num_coeffs();
    assert!(
        input.len() >= n && output.len() >= n,
        "{:?} transform needs {} coefficients",
        tx_size,
        n
    );
    assert!(
        tx_size != TxSize::Tx32x32 || tx_type == TxType::DctDct,
        "32x32 transforms are DCT only, got {:?}",
        tx_type
    );
}

/// 2-D inverse transform
///
/// `input` holds dequantized coefficients in raster order, `output` receives
/// residual samples. An `eob` of zero means the block has no coefficients.
///
/// # Panics
/// On short buffers or a non-DCT 32x32 type.
pub fn inverse_transform(
    tx_size: TxSize,
    tx_type: TxType,
    input: &[i32],
    output: &mut [i32],
    eob: usize,
    bit_depth: BitDepth,
) {
    check_block(tx_size, tx_type, input, output);
    let n = tx_size.size();
    let output = &mut output[..n * n];
    if eob == 0 {
        output.fill(0);
        return;
    }

    let range = Range::for_depth(bit_depth);
    let (dct, adst) = inverse_kernels(tx_size);
    let col = if tx_type.vertical_adst() { adst } else { dct };
    let row = if tx_type.horizontal_adst() { adst } else { dct };

    let mut temp = [0i32; 1024];
    let mut col_in = [0i32; 32];
    let mut col_out = [0i32; 32];

    // Column pass; all-zero columns stay zero
    for x in 0..n {
        for y in 0..n {
            col_in[y] = range.wrap(input[y * n + x] as i64) as i32;
        }
        if col_in[..n].iter().all(|&v| v == 0) {
            continue;
        }
        col(&col_in[..n], &mut col_out[..n], range);
        for y in 0..n {
            temp[y * n + x] = col_out[y];
        }
    }

    // Row pass and final rounding
    let shift = inverse_shift(tx_size);
    let mut row_out = [0i32; 32];
    for y in 0..n {
        row(&temp[y * n..y * n + n], &mut row_out[..n], range);
        for x in 0..n {
            output[y * n + x] = range.wrap(round_shift(row_out[x] as i64, shift)) as i32;
        }
    }
}

/// 2-D forward transform of a residual block in raster order
///
/// # Panics
/// On short buffers or a non-DCT 32x32 type.
pub fn forward_transform(tx_size: TxSize, tx_type: TxType, input: &[i32], output: &mut [i32]) {
    check_block(tx_size, tx_type, input, output);
    let n = tx_size.size();
    let (dct, adst) = forward_kernels(tx_size);
    let col = if tx_type.vertical_adst() { adst } else { dct };
    let row = if tx_type.horizontal_adst() { adst } else { dct };
    let (pre, mid, post) = forward_shifts(tx_size);
    let range = Range::UNBOUNDED;

    let mut temp = [0i32; 1024];
    let mut col_in = [0i32; 32];
    let mut col_out = [0i32; 32];

    for x in 0..n {
        for y in 0..n {
            col_in[y] = input[y * n + x] << pre;
        }
        col(&col_in[..n], &mut col_out[..n], range);
        for y in 0..n {
            temp[y * n + x] = round_shift(col_out[y] as i64, mid) as i32;
        }
    }

    let mut row_out = [0i32; 32];
    for y in 0..n {
        row(&temp[y * n..y * n + n], &mut row_out[..n], range);
        for x in 0..n {
            output[y * n + x] = round_shift(row_out[x] as i64, post) as i32;
        }
    }
}

// =============================================================================
// Walsh-Hadamard (lossless)
// =============================================================================

/// 4x4 inverse Walsh-Hadamard transform
///
/// Exact integer inverse of [`fwht4x4`]; used when the quantizer step is the
/// lossless unit step.
pub fn iwht4x4(input: &[i32], output: &mut [i32], eob: usize) {
    assert!(input.len() >= 16 && output.len() >= 16, "WHT needs 16 coefficients");
    if eob == 0 {
        output[..16].fill(0);
        return;
    }

    let mut temp = [0i32; 16];
    for i in 0..4 {
        let mut a1 = input[i * 4] >> UNIT_QUANT_SHIFT;
        let mut c1 = input[i * 4 + 1] >> UNIT_QUANT_SHIFT;
        let mut d1 = input[i * 4 + 2] >> UNIT_QUANT_SHIFT;
        let mut b1 = input[i * 4 + 3] >> UNIT_QUANT_SHIFT;
        a1 += c1;
        d1 -= b1;
        let e1 = (a1 - d1) >> 1;
        b1 = e1 - b1;
        c1 = e1 - c1;
        a1 -= b1;
        d1 += c1;
        temp[i * 4] = a1;
        temp[i * 4 + 1] = b1;
        temp[i * 4 + 2] = c1;
        temp[i * 4 + 3] = d1;
    }

    for i in 0..4 {
        let mut a1 = temp[i];
        let mut c1 = temp[4 + i];
        let mut d1 = temp[8 + i];
        let mut b1 = temp[12 + i];
        a1 += c1;
        d1 -= b1;
        let e1 = (a1 - d1) >> 1;
        b1 = e1 - b1;
        c1 = e1 - c1;
        a1 -= b1;
        d1 += c1;
        output[i] = a1;
        output[4 + i] = b1;
        output[8 + i] = c1;
        output[12 + i] = d1;
    }
}

/// 4x4 forward Walsh-Hadamard transform
pub fn fwht4x4(input: &[i32], output: &mut [i32]) {
    assert!(input.len() >= 16 && output.len() >= 16, "WHT needs 16 samples");

    let mut temp = [0i32; 16];
    for i in 0..4 {
        let mut a1 = input[i];
        let mut b1 = input[4 + i];
        let mut c1 = input[8 + i];
        let mut d1 = input[12 + i];
        a1 += b1;
        d1 -= c1;
        let e1 = (a1 - d1) >> 1;
        b1 = e1 - b1;
        c1 = e1 - c1;
        a1 -= c1;
        d1 += b1;
        temp[i] = a1;
        temp[4 + i] = c1;
        temp[8 + i] = d1;
        temp[12 + i] = b1;
    }

    for i in 0..4 {
        let mut a1 = temp[i * 4];
        let mut b1 = temp[i * 4 + 1];
        let mut c1 = temp[i * 4 + 2];
        let mut d1 = temp[i * 4 + 3];
        a1 += b1;
        d1 -= c1;
        let e1 = (a1 - d1) >> 1;
        b1 = e1 - b1;
        c1 = e1 - c1;
        a1 -= c1;
        d1 += b1;
        output[i * 4] = a1 * UNIT_QUANT_FACTOR;
        output[i * 4 + 1] = c1 * UNIT_QUANT_FACTOR;
        output[i * 4 + 2] = d1 * UNIT_QUANT_FACTOR;
        output[i * 4 + 3] = b1 * UNIT_QUANT_FACTOR;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic residual generator
    fn residual(n: usize, amplitude: i32, seed: u32) -> Vec<i32> {
        let mut state = seed.wrapping_mul(2654435761).wrapping_add(1);
        (0..n * n)
            .map(|_| {
                state = state.wrapping_mul(1103515245).wrapping_add(12345);
                ((state >> 16) % (2 * amplitude as u32 + 1)) as i32 - amplitude
            })
            .collect()
    }

    fn round_trip(tx_size: TxSize, tx_type: TxType, res: &[i32]) -> i32 {
        let n = tx_size.num_coeffs();
        let mut coeffs = vec![0i32; n];
        let mut recon = vec![0i32; n];
        forward_transform(tx_size, tx_type, res, &mut coeffs);
        inverse_transform(tx_size, tx_type, &coeffs, &mut recon, n, BitDepth::Eight);
        res.iter()
            .zip(&recon)
            .map(|(a, b)| (a - b).abs())
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn test_round_shift_symmetric() {
        assert_eq!(round_shift(8, 4), 1);
        assert_eq!(round_shift(-8, 4), -1);
        assert_eq!(round_shift(7, 4), 0);
        assert_eq!(round_shift(-7, 4), 0);
        assert_eq!(round_shift(24, 4), 2);
        assert_eq!(round_shift(-24, 4), -2);
        assert_eq!(round_shift(5, 0), 5);
    }

    #[test]
    fn test_round_trip_all_sizes_and_types() {
        for tx_size in TxSize::ALL {
            let types: &[TxType] = if tx_size == TxSize::Tx32x32 {
                &[TxType::DctDct]
            } else {
                &TxType::ALL
            };
            for &tx_type in types {
                for seed in 0..4 {
                    let res = residual(tx_size.size(), 100, seed);
                    let err = round_trip(tx_size, tx_type, &res);
                    assert!(err <= 1, "{:?} {:?} error {}", tx_size, tx_type, err);
                }
            }
        }
    }

    #[test]
    fn test_full_scale_small_blocks() {
        for tx_size in [TxSize::Tx4x4, TxSize::Tx8x8] {
            for tx_type in TxType::ALL {
                let res = residual(tx_size.size(), 255, 7);
                assert!(round_trip(tx_size, tx_type, &res) <= 1);
            }
        }
    }

    #[test]
    fn test_forward_dc_scaling() {
        // Forward output is 8x orthonormal (4x for 32x32), up to rounding
        let cases = [
            (TxSize::Tx4x4, 320),
            (TxSize::Tx8x8, 639),
            (TxSize::Tx16x16, 1278),
            (TxSize::Tx32x32, 1279),
        ];
        for (tx_size, dc) in cases {
            let n = tx_size.num_coeffs();
            let res = vec![10i32; n];
            let mut coeffs = vec![0i32; n];
            forward_transform(tx_size, TxType::DctDct, &res, &mut coeffs);
            assert_eq!(coeffs[0], dc, "{:?}", tx_size);
            assert!(coeffs[1..].iter().all(|&c| c == 0), "{:?}", tx_size);
        }
    }

    #[test]
    fn test_inverse_dc_only_is_flat() {
        for tx_size in TxSize::ALL {
            let n = tx_size.num_coeffs();
            let mut coeffs = vec![0i32; n];
            coeffs[0] = match tx_size {
                TxSize::Tx32x32 => 1280,
                _ => 80 << tx_size.log2(),
            };
            let mut out = vec![0i32; n];
            inverse_transform(tx_size, TxType::DctDct, &coeffs, &mut out, 1, BitDepth::Eight);
            assert!(out.iter().all(|&v| v == out[0]), "{:?}", tx_size);
            assert_eq!(out[0], 10, "{:?}", tx_size);
        }
    }

    #[test]
    fn test_eob_zero_clears_output() {
        let coeffs = [100i32; 64];
        let mut out = [7i32; 64];
        inverse_transform(TxSize::Tx8x8, TxType::AdstAdst, &coeffs, &mut out, 0, BitDepth::Eight);
        assert!(out.iter().all(|&v| v == 0));
    }

    #[test]
    #[should_panic]
    fn test_adst_32x32_rejected() {
        let coeffs = [0i32; 1024];
        let mut out = [0i32; 1024];
        inverse_transform(TxSize::Tx32x32, TxType::AdstAdst, &coeffs, &mut out, 1, BitDepth::Eight);
    }

    #[test]
    fn test_wht_dc_lossless() {
        let mut coeffs = [0i32; 16];
        coeffs[0] = 24;
        let mut out = [0i32; 16];
        iwht4x4(&coeffs, &mut out, 1);
        assert_eq!(&out[..4], &[2, 2, 2, 2]);
        assert!(out[4..].iter().all(|&v| v == 1));

        // The forward transform recovers the same coefficients
        let mut back = [0i32; 16];
        fwht4x4(&out, &mut back);
        assert_eq!(back, coeffs);
    }

    #[test]
    fn test_wht_exact_round_trip() {
        for seed in 0..32 {
            let res = residual(4, 255, seed);
            let mut coeffs = [0i32; 16];
            let mut recon = [0i32; 16];
            fwht4x4(&res, &mut coeffs);
            iwht4x4(&coeffs, &mut recon, 16);
            assert_eq!(&recon[..], &res[..]);
        }
    }

    #[test]
    fn test_range_wrap() {
        let range = Range::for_depth(BitDepth::Eight);
        assert_eq!(range.bits(), 16);
        assert_eq!(range.wrap(32767), 32767);
        assert_eq!(range.wrap(-32768), -32768);
        assert!(!range.contains(32768));
        assert!(Range::UNBOUNDED.contains(i64::MAX));
        assert_eq!(Range::UNBOUNDED.wrap(1 << 40), 1 << 40);
    }

    #[test]
    fn test_dct32_odd_network_matches_cosines() {
        for k in 0..16 {
            let mut odd = [0i64; 16];
            odd[k] = 1000;
            let out = dct32_odd(&odd, Range::for_depth(BitDepth::Eight));
            for (j, &v) in out.iter().enumerate() {
                let angle = ((2 * j + 1) * (2 * k + 1)) as f64 * std::f64::consts::PI / 64.0;
                let expected = 1000.0 * angle.cos();
                assert!(
                    (v as f64 - expected).abs() <= 2.0,
                    "freq {} sample {}: {} vs {:.1}",
                    2 * k + 1,
                    j,
                    v,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_idct32_odd_only_round_trip() {
        // Residual with no even-frequency content: x[k] == -x[31 - k] per row
        let mut res = vec![0i32; 1024];
        for row in 0..32 {
            for col in 0..16 {
                let v = ((row * 7 + col * 13) % 41) as i32 - 20;
                res[row * 32 + col] = v;
                res[row * 32 + 31 - col] = -v;
            }
        }
        assert!(round_trip(TxSize::Tx32x32, TxType::DctDct, &res) <= 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "exceeds 16-bit range")]
    fn test_idct32_first_stage_range_checked() {
        let mut input = [0i32; 32];
        input[1] = 32767;
        input[31] = 32767;
        let mut out = [0i32; 32];
        idct32(&input, &mut out, Range::for_depth(BitDepth::Eight));
    }
}
