//! VP9 Entropy Coding (Coefficient Decoding)
//!
//! Coefficients are coded in scan order as tokens from a 12-symbol alphabet.
//! The probability set for each token depends on:
//! - Transform size, plane type and reference type
//! - Coefficient band of the scan position
//! - Context: above/left flags at DC, neighbor energy classes elsewhere

use std::sync::Arc;

use tracing::{trace, warn};

use super::probs::{pareto_probs, BandProbs, BlockCounts, CoefCounts, CountBin, FrameCoefProbs};
use super::quant::Dequantizer;
use super::range_coder::BoolReader;
use super::scan::get_scan_order;
use super::tables::{
    get_band_table, BitDepth, PlaneType, RefType, TxSize, TxType, CAT1_PROB, CAT2_PROB, CAT3_PROB,
    CAT4_PROB, CAT5_PROB, CAT6_PROB, CAT_BASE_VALUES, EOB_CONTEXT_NODE, ONE_CONTEXT_NODE,
    PIVOT_NODE, ZERO_CONTEXT_NODE,
};

// =============================================================================
// Token Definitions
// =============================================================================

/// Coefficient tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Token {
    Zero = 0,  // 0
    One = 1,   // 1
    Two = 2,   // 2
    Three = 3, // 3
    Four = 4,  // 4
    Cat1 = 5,  // 5-6 (category 1)
    Cat2 = 6,  // 7-10 (category 2)
    Cat3 = 7,  // 11-18 (category 3)
    Cat4 = 8,  // 19-34 (category 4)
    Cat5 = 9,  // 35-66 (category 5)
    Cat6 = 10, // 67+ (category 6)
    Eob = 11,  // End of block
}

impl Token {
    pub const ALL: [Token; 12] = [
        Token::Zero,
        Token::One,
        Token::Two,
        Token::Three,
        Token::Four,
        Token::Cat1,
        Token::Cat2,
        Token::Cat3,
        Token::Cat4,
        Token::Cat5,
        Token::Cat6,
        Token::Eob,
    ];

    /// Token that codes a coefficient magnitude
    pub fn from_magnitude(magnitude: u32) -> Self {
        match magnitude {
            0 => Token::Zero,
            1 => Token::One,
            2 => Token::Two,
            3 => Token::Three,
            4 => Token::Four,
            5..=6 => Token::Cat1,
            7..=10 => Token::Cat2,
            11..=18 => Token::Cat3,
            19..=34 => Token::Cat4,
            35..=66 => Token::Cat5,
            _ => Token::Cat6,
        }
    }

    /// Category index 0..=5 for CAT1..CAT6
    pub fn category(&self) -> Option<usize> {
        match self {
            Token::Cat1
            | Token::Cat2
            | Token::Cat3
            | Token::Cat4
            | Token::Cat5
            | Token::Cat6 => Some(*self as usize - Token::Cat1 as usize),
            _ => None,
        }
    }

    /// Smallest magnitude coded by this token
    pub fn base_value(&self) -> u32 {
        match self.category() {
            Some(cat) => CAT_BASE_VALUES[cat] as u32,
            None => match self {
                Token::Eob => 0,
                other => *other as u32,
            },
        }
    }

    /// Coarse magnitude class feeding the context of later positions
    pub fn energy_class(&self) -> u8 {
        match self {
            Token::Zero | Token::Eob => 0,
            Token::One => 1,
            _ => 2,
        }
    }

    /// Count bin this token falls in
    pub fn count_bin(&self) -> CountBin {
        match self {
            Token::Zero => CountBin::Zero,
            Token::One => CountBin::One,
            Token::Eob => CountBin::EobModel,
            _ => CountBin::TwoOrMore,
        }
    }
}

/// Subtree below the ONE node
///
/// Binary tree: positive values are the next node index, negative are -token.
/// Node `i` uses Pareto probability `i >> 1`. A 0 bit takes the left branch.
pub(crate) const PARETO_TREE: [i8; 16] = [
    2, 6, // TWO..FOUR or categories?
    -2, 4, // TWO or THREE/FOUR?
    -3, -4, // THREE or FOUR
    8, 10, // CAT1-2 or CAT3+?
    -5, -6, // CAT1 or CAT2
    12, 14, // CAT3-4 or CAT5-6?
    -7, -8, // CAT3 or CAT4
    -9, -10, // CAT5 or CAT6
];

/// Extra-bit probabilities for a category token, most significant bit first
pub fn category_probs(token: Token, bit_depth: BitDepth) -> &'static [u8] {
    match token {
        Token::Cat1 => &CAT1_PROB,
        Token::Cat2 => &CAT2_PROB,
        Token::Cat3 => &CAT3_PROB,
        Token::Cat4 => &CAT4_PROB,
        Token::Cat5 => &CAT5_PROB,
        Token::Cat6 => &CAT6_PROB[CAT6_PROB.len() - bit_depth.cat6_bits()..],
        _ => &[],
    }
}

/// Largest magnitude a token stream can carry at a bit depth
pub fn max_magnitude(bit_depth: BitDepth) -> u32 {
    CAT_BASE_VALUES[5] as u32 + (1u32 << bit_depth.cat6_bits()) - 1
}

// =============================================================================
// Context Calculation
// =============================================================================

/// Context for scan index `c > 0` from the energy classes of its neighbors
#[inline]
pub fn get_coef_context(neighbors: &[[u16; 2]], cache: &[u8], c: usize) -> usize {
    let [a, b] = neighbors[c];
    (1 + cache[a as usize] as usize + cache[b as usize] as usize) >> 1
}

// =============================================================================
// Coefficient Decoding
// =============================================================================

/// What a coefficient block is coded as
#[derive(Debug, Clone, Copy)]
pub struct BlockParams<'a> {
    pub tx_size: TxSize,
    pub tx_type: TxType,
    pub plane_type: PlaneType,
    pub ref_type: RefType,
    pub dequant: &'a Dequantizer,
}

impl BlockParams<'_> {
    pub fn bit_depth(&self) -> BitDepth {
        self.dequant.bit_depth
    }
}

/// Point where a block stopped decoding because the stream ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Corruption {
    /// Scan index being decoded
    pub position: usize,
    /// Token read at that position, if its tree walk started
    pub token: Option<Token>,
}

/// Decoded coefficient block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoefBlock {
    /// Quantized levels in raster order
    pub qcoeff: Vec<i32>,
    /// Dequantized coefficients in raster order
    pub dqcoeff: Vec<i32>,
    /// Number of scan positions coded
    pub eob: usize,
    pub corruption: Option<Corruption>,
}

impl CoefBlock {
    fn empty(tx_size: TxSize) -> Self {
        CoefBlock {
            qcoeff: vec![0; tx_size.num_coeffs()],
            dqcoeff: vec![0; tx_size.num_coeffs()],
            eob: 0,
            corruption: None,
        }
    }

    pub fn is_corrupt(&self) -> bool {
        self.corruption.is_some()
    }
}

/// Coefficient decoder for one worker
///
/// Reads a frozen probability snapshot and accumulates private counts.
pub struct CoefDecoder {
    probs: Arc<FrameCoefProbs>,
    counts: CoefCounts,
    /// Counts are not kept when adaptation is disabled
    frame_parallel: bool,
}

impl CoefDecoder {
    /// Create a new coefficient decoder over a probability snapshot
    pub fn new(probs: Arc<FrameCoefProbs>, frame_parallel: bool) -> Self {
        CoefDecoder {
            probs,
            counts: CoefCounts::default(),
            frame_parallel,
        }
    }

    pub fn probs(&self) -> &FrameCoefProbs {
        &self.probs
    }

    pub fn counts(&self) -> &CoefCounts {
        &self.counts
    }

    pub fn into_counts(self) -> CoefCounts {
        self.counts
    }

    /// Decode a block of coefficients
    ///
    /// `initial_ctx` is the DC context from the above/left entropy flags.
    /// Decoding stops at an EOB token or when every position is coded. If the
    /// reader runs past its data the block decoded so far is returned with a
    /// [`Corruption`] report.
    pub fn decode_block<R: BoolReader>(
        &mut self,
        reader: &mut R,
        params: &BlockParams,
        initial_ctx: usize,
    ) -> CoefBlock {
        debug_assert!(initial_ctx <= 2);
        let probs = self
            .probs
            .block(params.tx_size, params.plane_type, params.ref_type);
        let mut counts = (!self.frame_parallel).then(|| {
            self.counts
                .block_mut(params.tx_size, params.plane_type, params.ref_type)
        });

        let block = decode_coefs(reader, params, initial_ctx, probs, counts.as_mut());

        trace!(
            "Decoded {:?} block: eob={} corrupt={}",
            params.tx_size,
            block.eob,
            block.is_corrupt()
        );
        block
    }
}

fn decode_coefs<R: BoolReader>(
    reader: &mut R,
    params: &BlockParams,
    initial_ctx: usize,
    probs: &BandProbs,
    mut counts: Option<&mut BlockCounts<'_>>,
) -> CoefBlock {
    let tx_size = params.tx_size;
    let max_eob = tx_size.num_coeffs();
    let scan = get_scan_order(tx_size, params.tx_type);
    let bands = get_band_table(tx_size);
    let bit_depth = params.bit_depth();

    let mut block = CoefBlock::empty(tx_size);
    let mut cache = vec![0u8; max_eob];
    let mut c = 0;

    let context_at = |cache: &[u8], c: usize| {
        if c == 0 {
            initial_ctx
        } else {
            get_coef_context(&scan.neighbors, cache, c)
        }
    };

    let corrupt = |block: &mut CoefBlock, c: usize, token: Option<Token>| {
        warn!(
            "Coefficient data exhausted at scan position {} ({:?})",
            c, token
        );
        block.eob = c;
        block.corruption = Some(Corruption { position: c, token });
    };

    while c < max_eob {
        let mut ctx = context_at(&cache, c);
        let mut band = bands[c] as usize;

        if let Some(counts) = counts.as_deref_mut() {
            counts.eob_check(band, ctx);
        }
        let more = reader.read_bool(probs[band][ctx][EOB_CONTEXT_NODE]);
        if reader.has_overrun() {
            corrupt(&mut block, c, None);
            return block;
        }
        if !more {
            if let Some(counts) = counts.as_deref_mut() {
                counts.token(band, ctx, CountBin::EobModel);
            }
            break;
        }

        // A zero run moves on without another EOB check
        while !reader.read_bool(probs[band][ctx][ZERO_CONTEXT_NODE]) {
            if reader.has_overrun() {
                corrupt(&mut block, c, Some(Token::Zero));
                return block;
            }
            if let Some(counts) = counts.as_deref_mut() {
                counts.token(band, ctx, CountBin::Zero);
            }
            c += 1;
            if c >= max_eob {
                block.eob = max_eob;
                return block;
            }
            ctx = context_at(&cache, c);
            band = bands[c] as usize;
        }

        let node_probs = &probs[band][ctx];
        let token = if !reader.read_bool(node_probs[ONE_CONTEXT_NODE]) {
            Token::One
        } else {
            read_pareto_token(reader, node_probs[PIVOT_NODE])
        };

        let mut extra = 0u32;
        for &p in category_probs(token, bit_depth) {
            extra = (extra << 1) | reader.read_bool(p) as u32;
        }
        let negative = reader.read_bit();

        if reader.has_overrun() {
            corrupt(&mut block, c, Some(token));
            return block;
        }
        if let Some(counts) = counts.as_deref_mut() {
            counts.token(band, ctx, token.count_bin());
        }

        let magnitude = (token.base_value() + extra) as i32;
        let level = if negative { -magnitude } else { magnitude };
        let pos = scan.scan[c] as usize;
        block.qcoeff[pos] = level;
        // Saturates to the coefficient range of the bit depth
        block.dqcoeff[pos] = params
            .dequant
            .dequantize(params.plane_type, band, level, tx_size);
        cache[pos] = token.energy_class();
        c += 1;
    }

    block.eob = c;
    block
}

/// Walk the Pareto subtree for a token of magnitude two or more
fn read_pareto_token<R: BoolReader>(reader: &mut R, pivot: u8) -> Token {
    let probs = pareto_probs(pivot);
    let mut node = 0usize;
    loop {
        let bit = reader.read_bool(probs[node >> 1]);
        let next = PARETO_TREE[node + bit as usize];
        if next < 0 {
            return Token::ALL[(-next) as usize];
        }
        node = next as usize;
    }
}
