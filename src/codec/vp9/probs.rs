//! Coefficient Probability and Count Tables
//!
//! Each (tx size, plane type, ref type, band, context) carries three explicit
//! node probabilities. Tokens of magnitude two and above walk a fixed
//! 8-node subtree whose probabilities come from the Pareto table, selected by
//! the third explicit probability.
//!
//! Probabilities are frozen for a frame and shared as an `Arc` snapshot.
//! Counts are private to a worker and merged by summation afterwards.

use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tables::{
    PlaneType, RefType, TxSize, COEFF_CONTEXTS, COEF_BANDS, COEF_COUNT_BINS, PLANE_TYPES,
    REF_TYPES, TX_SIZES, UNCONSTRAINED_NODES,
};
use crate::error::{Error, Result};

/// Probabilities in the Pareto subtree
pub const PARETO_NODES: usize = 8;

/// Stored rows, one per odd pivot probability
const PARETO_ROWS: usize = 128;

/// Probabilities for one (band, context)
pub type NodeProbs = [u8; UNCONSTRAINED_NODES];

/// Probabilities for one (tx size, plane type, ref type)
pub type BandProbs = [[NodeProbs; COEFF_CONTEXTS]; COEF_BANDS];

/// Counts for one (tx size, plane type, ref type)
pub type BandCounts = [[[u32; COEF_COUNT_BINS]; COEFF_CONTEXTS]; COEF_BANDS];

/// EOB check counts for one (tx size, plane type, ref type)
pub type BandEobCounts = [[u32; COEFF_CONTEXTS]; COEF_BANDS];

// =============================================================================
// Pareto Table
// =============================================================================

/// Survival function of the magnitude model: P(magnitude >= x | magnitude >= 2)
/// up to a common factor, with `x >= 2`
fn pareto_tail(scale: f64, x: u32) -> f64 {
    let b = scale / (scale + (x - 1) as f64);
    // Shape 8: b^8 by repeated squaring
    let b2 = b * b;
    let b4 = b2 * b2;
    b4 * b4
}

fn pareto_row(pivot: u32) -> [u8; PARETO_NODES] {
    // The pivot is P(magnitude == 1 | magnitude >= 1) in 1/256ths
    let r = (1.0 - pivot as f64 / 256.0).sqrt().sqrt().sqrt();
    let scale = r / (1.0 - r);
    let s = |x| pareto_tail(scale, x);

    let (s2, s3, s4, s5) = (s(2), s(3), s(4), s(5));
    let (s7, s11, s19, s35, s67) = (s(7), s(11), s(19), s(35), s(67));

    let fractions = [
        (s2 - s5) / s2,
        (s2 - s3) / (s2 - s5),
        (s3 - s4) / (s3 - s5),
        (s5 - s11) / s5,
        (s5 - s7) / (s5 - s11),
        (s11 - s35) / s11,
        (s11 - s19) / (s11 - s35),
        (s35 - s67) / s35,
    ];

    fractions.map(|f| (256.0 * f + 0.5).floor().clamp(1.0, 255.0) as u8)
}

fn pareto_table() -> &'static [[u8; PARETO_NODES]; PARETO_ROWS] {
    static TABLE: OnceLock<[[u8; PARETO_NODES]; PARETO_ROWS]> = OnceLock::new();
    TABLE.get_or_init(|| {
        debug!("Building Pareto table");
        std::array::from_fn(|row| pareto_row(2 * row as u32 + 1))
    })
}

/// Pareto subtree probabilities for a pivot probability
///
/// Odd pivots are stored; even pivots average the neighbouring rows.
pub fn pareto_probs(pivot: u8) -> [u8; PARETO_NODES] {
    debug_assert!(pivot > 0, "probabilities are 1..=255");
    let table = pareto_table();
    let pivot = pivot.max(1) as usize;
    if pivot & 1 == 1 {
        table[(pivot - 1) / 2]
    } else {
        let (lo, hi) = (&table[pivot / 2 - 1], &table[pivot / 2]);
        std::array::from_fn(|i| ((lo[i] as u32 + hi[i] as u32 + 1) >> 1) as u8)
    }
}

// =============================================================================
// Frame Probabilities
// =============================================================================

/// Coefficient probabilities for a frame
///
/// Indexed by [tx_size][plane_type][ref_type][band][context][node].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameCoefProbs {
    pub coef: [[[BandProbs; REF_TYPES]; PLANE_TYPES]; TX_SIZES],
}

impl Default for FrameCoefProbs {
    /// Model-based defaults
    ///
    /// EOB grows likelier with band and less likely with context energy;
    /// chroma and large transforms are sparser.
    fn default() -> Self {
        let mut coef = [[[[[[0u8; UNCONSTRAINED_NODES]; COEFF_CONTEXTS]; COEF_BANDS];
            REF_TYPES]; PLANE_TYPES]; TX_SIZES];

        for (tx, per_tx) in coef.iter_mut().enumerate() {
            for (plane, per_plane) in per_tx.iter_mut().enumerate() {
                for (ref_type, per_ref) in per_plane.iter_mut().enumerate() {
                    for (band, per_band) in per_ref.iter_mut().enumerate() {
                        for (ctx, probs) in per_band.iter_mut().enumerate() {
                            let (t, p, r) = (tx as i32, plane as i32, ref_type as i32);
                            let (b, c) = (band as i32, ctx as i32);
                            let eob = 96 + 24 * b - 40 * c + 16 * p + 8 * t + 8 * r;
                            let zero = 64 + 20 * b - 30 * c + 8 * p + 4 * t;
                            let one = 128 + 16 * b - 32 * c + 8 * p;
                            *probs = [eob, zero, one].map(|v| v.clamp(16, 240) as u8);
                        }
                    }
                }
            }
        }

        FrameCoefProbs { coef }
    }
}

impl FrameCoefProbs {
    /// Probabilities for a block kind
    #[inline]
    pub fn block(&self, tx_size: TxSize, plane: PlaneType, ref_type: RefType) -> &BandProbs {
        &self.coef[tx_size as usize][plane as usize][ref_type as usize]
    }

    pub fn block_mut(
        &mut self,
        tx_size: TxSize,
        plane: PlaneType,
        ref_type: RefType,
    ) -> &mut BandProbs {
        &mut self.coef[tx_size as usize][plane as usize][ref_type as usize]
    }

    /// Reject tables holding a zero probability
    pub fn validate(&self) -> Result<()> {
        let zero = self
            .coef
            .iter()
            .flatten()
            .flatten()
            .flatten()
            .flatten()
            .flatten()
            .any(|&p| p == 0);
        if zero {
            return Err(Error::invalid_input("coefficient probabilities must be 1..=255"));
        }
        Ok(())
    }

    /// Save probabilities to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            Error::InvalidInput(format!("Failed to serialize probabilities: {}", e))
        })?;

        std::fs::write(path, json).map_err(Error::Io)?;

        Ok(())
    }

    /// Load probabilities from file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(Error::Io)?;

        let probs: FrameCoefProbs = serde_json::from_str(&json).map_err(|e| {
            Error::InvalidInput(format!("Failed to deserialize probabilities: {}", e))
        })?;
        probs.validate()?;

        Ok(probs)
    }
}

// =============================================================================
// Counts
// =============================================================================

/// Count bin for each coded decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CountBin {
    Zero = 0,
    One = 1,
    TwoOrMore = 2,
    EobModel = 3,
}

/// Per-frame token counts
///
/// Indexed like [`FrameCoefProbs`]. `eob_branch` counts how often the EOB
/// node was tested in each (band, context).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoefCounts {
    pub coef: [[[BandCounts; REF_TYPES]; PLANE_TYPES]; TX_SIZES],
    pub eob_branch: [[[BandEobCounts; REF_TYPES]; PLANE_TYPES]; TX_SIZES],
}

impl CoefCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutable view for one block kind
    pub fn block_mut(
        &mut self,
        tx_size: TxSize,
        plane: PlaneType,
        ref_type: RefType,
    ) -> BlockCounts<'_> {
        let (tx, p, r) = (tx_size as usize, plane as usize, ref_type as usize);
        BlockCounts {
            coef: &mut self.coef[tx][p][r],
            eob_branch: &mut self.eob_branch[tx][p][r],
        }
    }

    /// Add another worker's counts
    pub fn merge(&mut self, other: &CoefCounts) {
        let dst = self.coef.iter_mut().flatten().flatten().flatten().flatten();
        let src = other.coef.iter().flatten().flatten().flatten().flatten();
        for (d, s) in dst.zip(src) {
            for (a, b) in d.iter_mut().zip(s) {
                *a += b;
            }
        }

        let dst = self.eob_branch.iter_mut().flatten().flatten().flatten();
        let src = other.eob_branch.iter().flatten().flatten().flatten();
        for (d, s) in dst.zip(src) {
            for (a, b) in d.iter_mut().zip(s) {
                *a += b;
            }
        }
    }

    /// Reset all counts to zero
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Total number of counted decisions, EOB checks excluded
    pub fn total(&self) -> u64 {
        self.coef
            .iter()
            .flatten()
            .flatten()
            .flatten()
            .flatten()
            .flatten()
            .map(|&c| c as u64)
            .sum()
    }

    /// Total number of EOB checks
    pub fn total_eob_checks(&self) -> u64 {
        self.eob_branch
            .iter()
            .flatten()
            .flatten()
            .flatten()
            .flatten()
            .map(|&c| c as u64)
            .sum()
    }
}

/// Counts for one block kind, borrowed from [`CoefCounts`]
pub struct BlockCounts<'a> {
    coef: &'a mut BandCounts,
    eob_branch: &'a mut BandEobCounts,
}

impl BlockCounts<'_> {
    #[inline]
    pub fn token(&mut self, band: usize, ctx: usize, bin: CountBin) {
        self.coef[band][ctx][bin as usize] += 1;
    }

    #[inline]
    pub fn eob_check(&mut self, band: usize, ctx: usize) {
        self.eob_branch[band][ctx] += 1;
    }
}

// =============================================================================
// Adaptation
// =============================================================================

/// Count-driven probability update applied between frames
pub trait CoefProbAdapter {
    fn adapt(&self, prev: &FrameCoefProbs, counts: &CoefCounts) -> FrameCoefProbs;
}

/// Adapter that keeps the previous frame's probabilities
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityAdapter;

impl CoefProbAdapter for IdentityAdapter {
    fn adapt(&self, prev: &FrameCoefProbs, _counts: &CoefCounts) -> FrameCoefProbs {
        prev.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pareto_known_rows() {
        assert_eq!(pareto_probs(1), [3, 86, 128, 6, 86, 23, 88, 29]);
        assert_eq!(pareto_probs(3), [9, 86, 129, 17, 88, 61, 94, 76]);
    }

    #[test]
    fn test_pareto_even_interpolates() {
        let lo = pareto_probs(1);
        let hi = pareto_probs(3);
        let mid = pareto_probs(2);
        for i in 0..PARETO_NODES {
            assert_eq!(mid[i], ((lo[i] as u32 + hi[i] as u32 + 1) >> 1) as u8);
        }
    }

    #[test]
    fn test_pareto_first_node_monotonic() {
        let mut prev = 0;
        for pivot in 1..=255u8 {
            let row = pareto_probs(pivot);
            assert!(row[0] >= prev, "pivot {}", pivot);
            assert!(row.iter().all(|&p| p >= 1));
            prev = row[0];
        }
    }

    #[test]
    fn test_default_probs_valid() {
        let probs = FrameCoefProbs::default();
        assert!(probs.validate().is_ok());
        let y = probs.block(TxSize::Tx4x4, PlaneType::Y, RefType::Intra);
        // EOB grows likelier with band at fixed context
        assert!(y[5][0][0] > y[1][0][0]);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let mut probs = FrameCoefProbs::default();
        probs.block_mut(TxSize::Tx16x16, PlaneType::Uv, RefType::Inter)[3][1][2] = 0;
        assert!(probs.validate().is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coef_probs.json");

        let mut probs = FrameCoefProbs::default();
        probs.block_mut(TxSize::Tx8x8, PlaneType::Y, RefType::Inter)[2][1] = [17, 99, 201];
        probs.save(&path).unwrap();

        let loaded = FrameCoefProbs::load(&path).unwrap();
        assert_eq!(loaded, probs);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = FrameCoefProbs::load(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_load_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"coef\": 3}").unwrap();
        assert!(matches!(
            FrameCoefProbs::load(&path),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_counts_merge_and_clear() {
        let mut a = CoefCounts::new();
        let mut b = CoefCounts::new();
        {
            let mut view = a.block_mut(TxSize::Tx4x4, PlaneType::Y, RefType::Intra);
            view.token(0, 0, CountBin::One);
            view.eob_check(0, 0);
        }
        {
            let mut view = b.block_mut(TxSize::Tx4x4, PlaneType::Y, RefType::Intra);
            view.token(0, 0, CountBin::One);
            view.token(3, 2, CountBin::EobModel);
            view.eob_check(3, 2);
        }

        a.merge(&b);
        assert_eq!(a.coef[0][0][0][0][0][CountBin::One as usize], 2);
        assert_eq!(a.coef[0][0][0][3][2][CountBin::EobModel as usize], 1);
        assert_eq!(a.total(), 3);
        assert_eq!(a.total_eob_checks(), 2);

        a.clear();
        assert_eq!(a.total(), 0);
    }

    #[test]
    fn test_identity_adapter() {
        let probs = FrameCoefProbs::default();
        let mut counts = CoefCounts::new();
        counts
            .block_mut(TxSize::Tx4x4, PlaneType::Y, RefType::Intra)
            .token(1, 1, CountBin::Zero);
        assert_eq!(IdentityAdapter.adapt(&probs, &counts), probs);
    }
}
