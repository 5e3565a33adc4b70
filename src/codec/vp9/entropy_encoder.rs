//! VP9 Entropy Encoding (Coefficient Encoding)
//!
//! The dual of [`super::entropy`]: the same scan, band and context
//! derivation drive the writer, so a block encoded here decodes to the same
//! levels. Rate is estimated alongside in 1/256 bit units.

use std::sync::{Arc, OnceLock};

use tracing::trace;

use super::entropy::{category_probs, get_coef_context, max_magnitude, BlockParams, Token, PARETO_TREE};
use super::probs::{pareto_probs, CoefCounts, CountBin, FrameCoefProbs};
use super::range_encoder::BoolWriter;
use super::scan::get_scan_order;
use super::tables::{get_band_table, EOB_CONTEXT_NODE, ONE_CONTEXT_NODE, PIVOT_NODE, ZERO_CONTEXT_NODE};

// =============================================================================
// Cost Estimation
// =============================================================================

fn entropy_cost_table() -> &'static [u16; 256] {
    static TABLE: OnceLock<[u16; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        std::array::from_fn(|p| {
            let p = p.max(1) as f64 / 256.0;
            (-p.log2() * 256.0).round() as u16
        })
    })
}

/// Cost of coding `bit` where `prob` is the probability of a 0 bit
///
/// Returns cost in 1/256 bit units.
#[inline]
pub fn bit_cost(bit: bool, prob: u8) -> u32 {
    let table = entropy_cost_table();
    if bit {
        table[256 - prob.max(1) as usize] as u32
    } else {
        table[prob as usize] as u32
    }
}

/// Writer that forwards decisions and accumulates their cost
struct CostTally<'w, W: BoolWriter> {
    inner: Option<&'w mut W>,
    cost: u32,
}

impl<W: BoolWriter> BoolWriter for CostTally<'_, W> {
    #[inline]
    fn write_bool(&mut self, bit: bool, prob: u8) {
        self.cost += bit_cost(bit, prob);
        if let Some(inner) = self.inner.as_deref_mut() {
            inner.write_bool(bit, prob);
        }
    }
}

/// Writer with nowhere to write, for cost-only passes
struct NullWriter;

impl BoolWriter for NullWriter {
    #[inline]
    fn write_bool(&mut self, _bit: bool, _prob: u8) {}
}

// =============================================================================
// Tree Coding
// =============================================================================

/// Check whether a subtree contains a symbol
fn symbol_in_subtree(tree: &[i8], node: i8, symbol: i8) -> bool {
    if node < 0 {
        return -node == symbol;
    }

    let idx = node as usize;
    if idx + 1 >= tree.len() {
        return false;
    }

    symbol_in_subtree(tree, tree[idx], symbol) || symbol_in_subtree(tree, tree[idx + 1], symbol)
}

/// Write the path to a leaf of a tree whose node `i` uses `probs[i >> 1]`
pub fn write_tree<W: BoolWriter>(writer: &mut W, tree: &[i8], probs: &[u8], symbol: i8) {
    let mut node = 0usize;
    loop {
        let prob = probs[node >> 1];
        let left = tree[node];

        let bit = !symbol_in_subtree(tree, left, symbol);
        writer.write_bool(bit, prob);

        let next = tree[node + bit as usize];
        if next < 0 {
            debug_assert_eq!(-next, symbol);
            return;
        }
        node = next as usize;
    }
}

// =============================================================================
// Coefficient Encoder
// =============================================================================

/// Per-block result of encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeStats {
    /// Trimmed end-of-block
    pub eob: usize,
    /// Tokens written, EOB included
    pub tokens: usize,
    /// Estimated size in 1/256 bits
    pub cost: u32,
}

/// Coefficient encoder for one worker
pub struct CoefEncoder {
    probs: Arc<FrameCoefProbs>,
    counts: CoefCounts,
    frame_parallel: bool,
}

impl CoefEncoder {
    /// Create a new coefficient encoder over a probability snapshot
    pub fn new(probs: Arc<FrameCoefProbs>, frame_parallel: bool) -> Self {
        CoefEncoder {
            probs,
            counts: CoefCounts::default(),
            frame_parallel,
        }
    }

    pub fn counts(&self) -> &CoefCounts {
        &self.counts
    }

    pub fn into_counts(self) -> CoefCounts {
        self.counts
    }

    /// Encode a block of quantized levels
    ///
    /// # Arguments
    /// * `writer` - Bool writer to emit decisions to
    /// * `levels` - Quantized levels in raster order, one per coefficient
    /// * `eob` - Upper bound on the end of block; trimmed to the last non-zero
    /// * `params` - Block kind
    /// * `initial_ctx` - DC context from neighboring blocks
    ///
    /// # Panics
    /// Panics if `levels` does not hold exactly one level per coefficient.
    pub fn encode_block<W: BoolWriter>(
        &mut self,
        writer: &mut W,
        levels: &[i32],
        eob: usize,
        params: &BlockParams,
        initial_ctx: usize,
    ) -> EncodeStats {
        let mut tally = CostTally {
            inner: Some(writer),
            cost: 0,
        };
        let update = !self.frame_parallel;
        let stats = tokenize(
            &mut tally,
            &self.probs,
            update.then_some(&mut self.counts),
            levels,
            eob,
            params,
            initial_ctx,
        );

        trace!(
            "Encoded {:?} block: eob={} tokens={} cost={}",
            params.tx_size,
            stats.eob,
            stats.tokens,
            stats.cost
        );
        stats
    }

    /// Estimate the cost of a block without writing or counting
    pub fn estimate_cost(
        &self,
        levels: &[i32],
        eob: usize,
        params: &BlockParams,
        initial_ctx: usize,
    ) -> EncodeStats {
        let mut tally = CostTally::<NullWriter> {
            inner: None,
            cost: 0,
        };
        tokenize(
            &mut tally,
            &self.probs,
            None,
            levels,
            eob,
            params,
            initial_ctx,
        )
    }
}

fn tokenize<W: BoolWriter>(
    tally: &mut CostTally<'_, W>,
    probs: &FrameCoefProbs,
    counts: Option<&mut CoefCounts>,
    levels: &[i32],
    eob: usize,
    params: &BlockParams,
    initial_ctx: usize,
) -> EncodeStats {
    let tx_size = params.tx_size;
    let max_eob = tx_size.num_coeffs();
    assert_eq!(levels.len(), max_eob, "one level per coefficient");

    let scan = get_scan_order(tx_size, params.tx_type);
    let bands = get_band_table(tx_size);
    let probs = probs.block(tx_size, params.plane_type, params.ref_type);
    let mut counts =
        counts.map(|counts| counts.block_mut(tx_size, params.plane_type, params.ref_type));
    let bit_depth = params.bit_depth();
    let max_mag = max_magnitude(bit_depth);

    let eob = (0..eob.min(max_eob))
        .rev()
        .find(|&c| levels[scan.scan[c] as usize] != 0)
        .map_or(0, |c| c + 1);

    let mut cache = vec![0u8; max_eob];
    let mut tokens = 0;
    let mut c = 0;

    let context_at = |cache: &[u8], c: usize| {
        if c == 0 {
            initial_ctx
        } else {
            get_coef_context(&scan.neighbors, cache, c)
        }
    };

    while c < eob {
        let mut ctx = context_at(&cache, c);
        let mut band = bands[c] as usize;

        if let Some(counts) = counts.as_mut() {
            counts.eob_check(band, ctx);
        }
        tally.write_bool(true, probs[band][ctx][EOB_CONTEXT_NODE]);

        // The last coded position is non-zero, so every run ends before eob
        while levels[scan.scan[c] as usize] == 0 {
            tally.write_bool(false, probs[band][ctx][ZERO_CONTEXT_NODE]);
            if let Some(counts) = counts.as_mut() {
                counts.token(band, ctx, CountBin::Zero);
            }
            tokens += 1;
            c += 1;
            ctx = context_at(&cache, c);
            band = bands[c] as usize;
        }
        let node_probs = &probs[band][ctx];
        tally.write_bool(true, node_probs[ZERO_CONTEXT_NODE]);

        let level = levels[scan.scan[c] as usize];
        debug_assert!(level.unsigned_abs() <= max_mag, "level {} out of range", level);
        let magnitude = level.unsigned_abs().min(max_mag);
        let token = Token::from_magnitude(magnitude);

        if token == Token::One {
            tally.write_bool(false, node_probs[ONE_CONTEXT_NODE]);
        } else {
            tally.write_bool(true, node_probs[ONE_CONTEXT_NODE]);
            write_tree(
                tally,
                &PARETO_TREE,
                &pareto_probs(node_probs[PIVOT_NODE]),
                token as i8,
            );
        }

        let extra_probs = category_probs(token, bit_depth);
        let extra = magnitude - token.base_value();
        for (i, &p) in extra_probs.iter().enumerate() {
            let shift = extra_probs.len() - 1 - i;
            tally.write_bool((extra >> shift) & 1 == 1, p);
        }
        tally.write_bit(level < 0);

        if let Some(counts) = counts.as_mut() {
            counts.token(band, ctx, token.count_bin());
        }
        cache[scan.scan[c] as usize] = token.energy_class();
        tokens += 1;
        c += 1;
    }

    if c < max_eob {
        let ctx = context_at(&cache, c);
        let band = bands[c] as usize;
        if let Some(counts) = counts.as_mut() {
            counts.eob_check(band, ctx);
            counts.token(band, ctx, CountBin::EobModel);
        }
        tally.write_bool(false, probs[band][ctx][EOB_CONTEXT_NODE]);
        tokens += 1;
    }

    EncodeStats {
        eob,
        tokens,
        cost: tally.cost,
    }
}
