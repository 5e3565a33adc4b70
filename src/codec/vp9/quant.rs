//! VP9 Quantization and Dequantization
//!
//! VP9 uses separate quantization for DC and AC coefficients,
//! with different deltas for luma and chroma planes. Band 0 holds only the
//! DC coefficient in every band table, so the DC step is the band 0 step.
//!
//! Non-uniform quantization (NUQ) replaces the first few linear bins with
//! per-band boundaries and reconstruction points.

use serde::{Deserialize, Serialize};

use super::tables::{
    ac_quant, dc_quant, BitDepth, PlaneType, TxSize, COEF_BANDS, MAXQ, PLANE_TYPES,
};
use super::transform::round_shift;
use crate::error::{Error, Result};

/// Frame-level quantizer parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuantParams {
    /// Base Q index
    pub base_q_idx: u8,
    /// Y DC delta
    pub y_dc_delta: i8,
    /// UV DC delta
    pub uv_dc_delta: i8,
    /// UV AC delta
    pub uv_ac_delta: i8,
}

impl QuantParams {
    pub fn new(base_q_idx: u8) -> Self {
        QuantParams {
            base_q_idx,
            ..Default::default()
        }
    }

    /// Lossless coding uses the WHT with a unit step
    pub fn is_lossless(&self) -> bool {
        self.base_q_idx == 0 && self.deltas_zero()
    }

    fn deltas_zero(&self) -> bool {
        self.y_dc_delta == 0 && self.uv_dc_delta == 0 && self.uv_ac_delta == 0
    }
}

/// Segment quantizer feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SegmentQuant {
    /// Whether the segment overrides the frame qindex
    pub enabled: bool,
    /// `value` is an absolute qindex rather than a delta
    pub abs_delta: bool,
    /// Absolute qindex or delta from the base
    pub value: i16,
}

impl SegmentQuant {
    pub fn delta(value: i16) -> Self {
        SegmentQuant {
            enabled: true,
            abs_delta: false,
            value,
        }
    }

    pub fn absolute(value: i16) -> Self {
        SegmentQuant {
            enabled: true,
            abs_delta: true,
            value,
        }
    }
}

/// Calculate QIndex with segment adjustments
pub fn get_qindex(base_q_idx: u8, segment: &SegmentQuant) -> u8 {
    if !segment.enabled {
        return base_q_idx;
    }
    if segment.abs_delta {
        segment.value.clamp(0, MAXQ as i16) as u8
    } else {
        (base_q_idx as i16 + segment.value).clamp(0, MAXQ as i16) as u8
    }
}

#[inline]
fn offset_qindex(qindex: u8, delta: i8) -> usize {
    (qindex as i16 + delta as i16).clamp(0, MAXQ as i16) as usize
}

/// DC and AC step for a qindex
///
/// # Panics
/// Panics if `qindex > MAXQ`.
pub fn dequant_step(qindex: usize, bit_depth: BitDepth) -> (i32, i32) {
    assert!(qindex <= MAXQ, "qindex {} out of range", qindex);
    (dc_quant(qindex, bit_depth), ac_quant(qindex, bit_depth))
}

/// Dequantize a single level
///
/// The magnitude saturates at `i32::MAX` before the sign is applied.
///
/// # Panics
/// Panics if `step` is not positive.
#[inline]
pub fn dequantize(level: i32, step: i32, tx_size: TxSize) -> i32 {
    assert!(step > 0, "quantizer step must be positive");
    let magnitude = (level.unsigned_abs() as i64 * step as i64) >> tx_size.dequant_shift();
    with_sign(saturate(magnitude, i32::MAX), level)
}

#[inline]
fn saturate(magnitude: i64, max: i32) -> i32 {
    magnitude.min(max as i64) as i32
}

#[inline]
fn with_sign(magnitude: i32, level: i32) -> i32 {
    if level < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Quantize a single coefficient, rounding to the nearest level
///
/// # Panics
/// Panics if `step` is not positive.
#[inline]
pub fn quantize(coeff: i32, step: i32, tx_size: TxSize) -> i32 {
    assert!(step > 0, "quantizer step must be positive");
    if coeff == 0 {
        return 0;
    }
    let scaled = (coeff.unsigned_abs() as i64) << tx_size.dequant_shift();
    let level = ((scaled + (step as i64 >> 1)) / step as i64) as i32;
    if coeff < 0 {
        -level
    } else {
        level
    }
}

// =============================================================================
// Non-Uniform Quantization
// =============================================================================

/// Number of individually shaped bins
pub const NUQ_KNOTS: usize = 3;

/// Per-band NUQ shape
///
/// Knots are bin widths in 1/128ths of the step. `doff` pulls reconstruction
/// points toward zero, in 1/256ths of the step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NuqProfile {
    pub knots: [[u8; NUQ_KNOTS]; COEF_BANDS],
    pub doff: [u8; COEF_BANDS],
}

impl Default for NuqProfile {
    fn default() -> Self {
        NuqProfile {
            knots: [
                [86, 122, 128],
                [84, 124, 128],
                [82, 126, 128],
                [80, 126, 128],
                [78, 128, 128],
                [76, 128, 128],
            ],
            doff: [4, 6, 8, 10, 12, 14],
        }
    }
}

impl NuqProfile {
    pub fn validate(&self) -> Result<()> {
        for (band, knots) in self.knots.iter().enumerate() {
            if knots.iter().any(|&k| k == 0 || k > 128) {
                return Err(Error::config(format!(
                    "NUQ knots for band {} must be in 1..=128, got {:?}",
                    band, knots
                )));
            }
        }
        if let Some(&doff) = self.doff.iter().find(|&&d| d >= 128) {
            return Err(Error::config(format!("NUQ offset {} must be below 128", doff)));
        }
        Ok(())
    }
}

/// Bin boundaries and reconstruction points for one step size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NuqBins {
    step: i32,
    /// Lower edge of bins 1..=NUQ_KNOTS
    boundaries: [i32; NUQ_KNOTS],
    /// Reconstruction point of bins 0..=NUQ_KNOTS
    points: [i32; NUQ_KNOTS + 1],
}

impl NuqBins {
    pub fn new(step: i32, knots: &[u8; NUQ_KNOTS], doff: u8) -> Self {
        assert!(step > 0, "quantizer step must be positive");
        let step64 = step as i64;
        let doff = doff as i64;

        let mut boundaries = [0i32; NUQ_KNOTS];
        let mut cumulative = 0i64;
        for (b, &k) in boundaries.iter_mut().zip(knots) {
            cumulative += k as i64;
            *b = round_shift(cumulative * step64, 7) as i32;
        }

        let mut points = [0i32; NUQ_KNOTS + 1];
        for i in 1..=NUQ_KNOTS {
            let frac = if i < NUQ_KNOTS {
                knots[i] as i64 - doff
            } else {
                128 - doff
            };
            let point = boundaries[i - 1] + round_shift(frac * step64, 8) as i32;
            points[i] = point.max(points[i - 1] + 1);
        }

        NuqBins {
            step,
            boundaries,
            points,
        }
    }

    /// Reconstructed magnitude for a coded magnitude, saturating at `i32::MAX`
    pub fn dequantize(&self, v: u32) -> i32 {
        let v = v as usize;
        if v <= NUQ_KNOTS {
            return self.points[v];
        }
        let tail = (v - NUQ_KNOTS) as i64 * self.step as i64;
        saturate(self.points[NUQ_KNOTS] as i64 + tail, i32::MAX)
    }

    /// Coded magnitude for a coefficient magnitude
    pub fn quantize(&self, magnitude: i32) -> u32 {
        match self.boundaries.iter().position(|&b| magnitude < b) {
            Some(bin) => bin as u32,
            None => {
                let last = self.boundaries[NUQ_KNOTS - 1];
                NUQ_KNOTS as u32 + ((magnitude - last) / self.step) as u32
            }
        }
    }
}

// =============================================================================
// Dequantizer
// =============================================================================

/// Quantization factors for a single plane
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaneQuantFactors {
    /// DC step
    pub dc: i32,
    /// AC step
    pub ac: i32,
}

impl PlaneQuantFactors {
    /// Step for a coefficient band
    #[inline]
    pub fn for_band(&self, band: usize) -> i32 {
        if band == 0 {
            self.dc
        } else {
            self.ac
        }
    }
}

/// Dequantization state for one effective qindex
///
/// Derived once per frame or segment and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Dequantizer {
    /// Effective qindex after the segment override
    pub qindex: u8,
    pub bit_depth: BitDepth,
    /// Y and UV steps
    pub planes: [PlaneQuantFactors; PLANE_TYPES],
    pub lossless: bool,
    nuq: Option<Box<[[NuqBins; COEF_BANDS]; PLANE_TYPES]>>,
}

impl Dequantizer {
    /// Create quantizer state from frame parameters and a segment
    pub fn new(
        params: &QuantParams,
        segment: &SegmentQuant,
        bit_depth: BitDepth,
        nuq: Option<&NuqProfile>,
    ) -> Self {
        let qindex = get_qindex(params.base_q_idx, segment);

        let y_dc_q = offset_qindex(qindex, params.y_dc_delta);
        let y_ac_q = qindex as usize;
        let uv_dc_q = offset_qindex(qindex, params.uv_dc_delta);
        let uv_ac_q = offset_qindex(qindex, params.uv_ac_delta);

        let planes = [
            PlaneQuantFactors {
                dc: dc_quant(y_dc_q, bit_depth),
                ac: ac_quant(y_ac_q, bit_depth),
            },
            PlaneQuantFactors {
                dc: dc_quant(uv_dc_q, bit_depth),
                ac: ac_quant(uv_ac_q, bit_depth),
            },
        ];

        let lossless = qindex == 0 && params.deltas_zero();

        // Lossless steps stay uniform
        let nuq = nuq.filter(|_| !lossless).map(|profile| {
            Box::new(planes.map(|factors| {
                std::array::from_fn::<_, COEF_BANDS, _>(|band| {
                    NuqBins::new(
                        factors.for_band(band),
                        &profile.knots[band],
                        profile.doff[band],
                    )
                })
            }))
        });

        Dequantizer {
            qindex,
            bit_depth,
            planes,
            lossless,
            nuq,
        }
    }

    /// Frame dequantizer without a segment override
    pub fn for_frame(params: &QuantParams, bit_depth: BitDepth) -> Self {
        Self::new(params, &SegmentQuant::default(), bit_depth, None)
    }

    /// Get quantizer for a plane type
    pub fn for_plane(&self, plane: PlaneType) -> &PlaneQuantFactors {
        &self.planes[plane as usize]
    }

    pub fn is_nuq(&self) -> bool {
        self.nuq.is_some()
    }

    /// Largest dequantized magnitude at this bit depth
    pub fn coeff_max(&self) -> i32 {
        (1 << (self.bit_depth.coeff_bits() - 1)) - 1
    }

    /// Dequantize a coded level at a band
    ///
    /// The magnitude saturates at [`coeff_max`](Self::coeff_max), so the
    /// sign of the level always survives.
    #[inline]
    pub fn dequantize(&self, plane: PlaneType, band: usize, level: i32, tx_size: TxSize) -> i32 {
        let magnitude = match &self.nuq {
            Some(bins) => {
                bins[plane as usize][band].dequantize(level.unsigned_abs())
                    >> tx_size.dequant_shift()
            }
            None => dequantize(
                level.saturating_abs(),
                self.planes[plane as usize].for_band(band),
                tx_size,
            ),
        };
        with_sign(magnitude.min(self.coeff_max()), level)
    }

    /// Quantize a transform coefficient at a band
    #[inline]
    pub fn quantize(&self, plane: PlaneType, band: usize, coeff: i32, tx_size: TxSize) -> i32 {
        match &self.nuq {
            Some(bins) => {
                let magnitude = (coeff.unsigned_abs() as i32) << tx_size.dequant_shift();
                let level = bins[plane as usize][band].quantize(magnitude) as i32;
                if coeff < 0 {
                    -level
                } else {
                    level
                }
            }
            None => quantize(coeff, self.planes[plane as usize].for_band(band), tx_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::entropy::max_magnitude;
    use super::*;

    #[test]
    fn test_dequantizer_creation() {
        let params = QuantParams::new(100);
        let dq = Dequantizer::for_frame(&params, BitDepth::Eight);
        assert_eq!(dq.qindex, 100);
        assert!(!dq.lossless);
        assert!(dq.for_plane(PlaneType::Y).dc > 0);
        assert!(dq.for_plane(PlaneType::Y).ac > 0);
    }

    #[test]
    fn test_lossless_quantizer() {
        let params = QuantParams::new(0);
        assert!(params.is_lossless());

        let dq = Dequantizer::new(
            &params,
            &SegmentQuant::default(),
            BitDepth::Ten,
            Some(&NuqProfile::default()),
        );
        assert!(dq.lossless);
        assert!(!dq.is_nuq());
        // At Q=0 steps are 4 at every bit depth
        assert_eq!(*dq.for_plane(PlaneType::Y), PlaneQuantFactors { dc: 4, ac: 4 });
        assert_eq!(*dq.for_plane(PlaneType::Uv), PlaneQuantFactors { dc: 4, ac: 4 });
    }

    #[test]
    fn test_delta_breaks_lossless() {
        let params = QuantParams {
            base_q_idx: 0,
            uv_dc_delta: 2,
            ..Default::default()
        };
        assert!(!params.is_lossless());
        let dq = Dequantizer::for_frame(&params, BitDepth::Eight);
        assert!(!dq.lossless);
        assert!(dq.for_plane(PlaneType::Uv).dc > dq.for_plane(PlaneType::Y).dc);
    }

    #[test]
    fn test_get_qindex() {
        assert_eq!(get_qindex(100, &SegmentQuant::default()), 100);
        assert_eq!(get_qindex(100, &SegmentQuant::delta(-10)), 90);
        assert_eq!(get_qindex(10, &SegmentQuant::delta(-100)), 0);
        assert_eq!(get_qindex(250, &SegmentQuant::delta(20)), 255);
        assert_eq!(get_qindex(100, &SegmentQuant::absolute(30)), 30);
        assert_eq!(get_qindex(100, &SegmentQuant::absolute(400)), 255);
    }

    #[test]
    fn test_segment_applies_plane_deltas() {
        let params = QuantParams {
            base_q_idx: 100,
            y_dc_delta: -5,
            uv_dc_delta: 0,
            uv_ac_delta: 3,
        };
        let dq = Dequantizer::new(&params, &SegmentQuant::delta(-10), BitDepth::Eight, None);
        assert_eq!(dq.qindex, 90);
        assert_eq!(dq.for_plane(PlaneType::Y).dc, dc_quant(85, BitDepth::Eight));
        assert_eq!(dq.for_plane(PlaneType::Y).ac, ac_quant(90, BitDepth::Eight));
        assert_eq!(dq.for_plane(PlaneType::Uv).ac, ac_quant(93, BitDepth::Eight));
    }

    #[test]
    fn test_dequant_step() {
        assert_eq!(dequant_step(0, BitDepth::Eight), (4, 4));
        assert_eq!(dequant_step(0, BitDepth::Twelve), (4, 4));
        assert_eq!(dequant_step(1, BitDepth::Ten), (9, 9));
        assert_eq!(dequant_step(3, BitDepth::Twelve), (25, 27));
        assert_eq!(dequant_step(255, BitDepth::Eight), (1336, 1828));
    }

    #[test]
    #[should_panic]
    fn test_dequant_step_out_of_range() {
        dequant_step(256, BitDepth::Eight);
    }

    #[test]
    fn test_dequantize_values() {
        assert_eq!(dequantize(10, 8, TxSize::Tx4x4), 80);
        assert_eq!(dequantize(-5, 4, TxSize::Tx8x8), -20);
        assert_eq!(dequantize(0, 40, TxSize::Tx16x16), 0);
        // 32x32 halves magnitudes, rounding toward zero symmetrically
        assert_eq!(dequantize(3, 5, TxSize::Tx32x32), 7);
        assert_eq!(dequantize(-3, 5, TxSize::Tx32x32), -7);
    }

    #[test]
    fn test_dequantize_saturates_magnitude() {
        let (_, ac) = dequant_step(255, BitDepth::Twelve);
        let level = max_magnitude(BitDepth::Twelve) as i32;
        assert_eq!(dequantize(level, ac, TxSize::Tx4x4), i32::MAX);
        assert_eq!(dequantize(-level, ac, TxSize::Tx4x4), -i32::MAX);
        assert!(dequantize(level, ac, TxSize::Tx32x32) > 0);
    }

    #[test]
    fn test_dequantizer_clamps_to_coefficient_range() {
        let dq = Dequantizer::for_frame(&QuantParams::new(255), BitDepth::Twelve);
        let level = max_magnitude(BitDepth::Twelve) as i32;
        assert_eq!(dq.coeff_max(), (1 << 19) - 1);
        for tx_size in TxSize::ALL {
            assert_eq!(dq.dequantize(PlaneType::Y, 1, level, tx_size), dq.coeff_max());
            assert_eq!(dq.dequantize(PlaneType::Uv, 0, -level, tx_size), -dq.coeff_max());
        }
    }

    #[test]
    fn test_nuq_max_level_saturates() {
        let dq = Dequantizer::new(
            &QuantParams::new(255),
            &SegmentQuant::default(),
            BitDepth::Twelve,
            Some(&NuqProfile::default()),
        );
        let level = max_magnitude(BitDepth::Twelve) as i32;
        for band in 0..COEF_BANDS {
            assert_eq!(dq.dequantize(PlaneType::Y, band, level, TxSize::Tx8x8), dq.coeff_max());
            assert_eq!(
                dq.dequantize(PlaneType::Uv, band, -level, TxSize::Tx32x32),
                -dq.coeff_max()
            );
        }

        let bins = NuqBins::new(ac_quant(255, BitDepth::Twelve), &[80, 120, 128], 8);
        assert_eq!(bins.dequantize(u32::MAX), i32::MAX);
    }

    #[test]
    fn test_quantize_rounds_to_nearest() {
        assert_eq!(quantize(0, 10, TxSize::Tx4x4), 0);
        assert_eq!(quantize(14, 10, TxSize::Tx4x4), 1);
        assert_eq!(quantize(15, 10, TxSize::Tx4x4), 2);
        assert_eq!(quantize(-26, 10, TxSize::Tx8x8), -3);
        assert_eq!(quantize(10, 10, TxSize::Tx32x32), 2);
    }

    #[test]
    fn test_uniform_dequantize_monotonic() {
        for qindex in [0usize, 1, 40, 128, 255] {
            let (_, ac) = dequant_step(qindex, BitDepth::Eight);
            for tx_size in TxSize::ALL {
                for v in 0..300 {
                    assert!(dequantize(v, ac, tx_size) < dequantize(v + 1, ac, tx_size));
                }
            }
        }
    }

    #[test]
    fn test_nuq_bins_monotonic() {
        let profile = NuqProfile::default();
        for step in [4, 8, 37, 1828] {
            for band in 0..COEF_BANDS {
                let bins = NuqBins::new(step, &profile.knots[band], profile.doff[band]);
                assert_eq!(bins.dequantize(0), 0);
                for v in 0..200 {
                    assert!(bins.dequantize(v) < bins.dequantize(v + 1));
                }
            }
        }
    }

    #[test]
    fn test_nuq_extrapolates_linearly() {
        let bins = NuqBins::new(40, &[80, 120, 128], 8);
        let last = bins.dequantize(NUQ_KNOTS as u32);
        assert_eq!(bins.dequantize(NUQ_KNOTS as u32 + 5), last + 5 * 40);
    }

    #[test]
    fn test_nuq_quantize_inverts_points() {
        let profile = NuqProfile::default();
        let bins = NuqBins::new(64, &profile.knots[2], profile.doff[2]);
        for v in 0..50u32 {
            assert_eq!(bins.quantize(bins.dequantize(v)), v);
        }
    }

    #[test]
    fn test_nuq_dequantizer_band_steps() {
        let params = QuantParams::new(120);
        let profile = NuqProfile::default();
        let dq = Dequantizer::new(
            &params,
            &SegmentQuant::default(),
            BitDepth::Eight,
            Some(&profile),
        );
        assert!(dq.is_nuq());
        for band in 0..COEF_BANDS {
            let mut prev = 0;
            for v in 1..100 {
                let cur = dq.dequantize(PlaneType::Y, band, v, TxSize::Tx8x8);
                assert!(cur > prev);
                assert_eq!(dq.dequantize(PlaneType::Y, band, -v, TxSize::Tx8x8), -cur);
                prev = cur;
            }
        }
    }

    #[test]
    fn test_nuq_profile_validate() {
        assert!(NuqProfile::default().validate().is_ok());

        let mut bad = NuqProfile::default();
        bad.knots[3][1] = 0;
        assert!(bad.validate().is_err());

        let mut bad = NuqProfile::default();
        bad.doff[0] = 200;
        assert!(bad.validate().is_err());
    }
}
