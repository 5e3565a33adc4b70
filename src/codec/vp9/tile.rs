//! VP9 Tile-Level Residual Coding
//!
//! A tile is an independently coded run of transform blocks with its own bool
//! coder stream, its own above/left entropy contexts and its own counts. Tiles
//! share nothing but the frame's probability snapshot, so they are decoded and
//! encoded in parallel with rayon and their counts summed after the join.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use super::block::{encode_residual, reconstruct_residual, EncodedBlock, ResidualBlock};
use super::config::ResidualConfig;
use super::context::EntropyContext;
use super::entropy::{BlockParams, CoefDecoder, Corruption};
use super::entropy_encoder::{CoefEncoder, EncodeStats};
use super::probs::{CoefCounts, FrameCoefProbs};
use super::quant::Dequantizer;
use super::range_coder::RangeCoder;
use super::range_encoder::RangeEncoder;
use super::tables::{PlaneType, RefType, TxSize, TxType};
use crate::error::{Error, Result};

/// Number of planes (Y, U, V)
pub const MAX_PLANES: usize = 3;

/// One transform block in tile coding order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileBlock {
    /// Plane index (0=Y, 1=U, 2=V)
    pub plane: usize,
    /// Column in 4x4 units within the plane
    pub col: usize,
    /// Row in 4x4 units within the plane
    pub row: usize,
    pub tx_size: TxSize,
    pub tx_type: TxType,
    pub ref_type: RefType,
    /// No coefficients are coded for this block
    pub skip: bool,
}

impl TileBlock {
    pub fn new(plane: usize, col: usize, row: usize, tx_size: TxSize, tx_type: TxType) -> Self {
        TileBlock {
            plane,
            col,
            row,
            tx_size,
            tx_type,
            ref_type: RefType::Intra,
            skip: false,
        }
    }

    /// Mark as an inter block
    pub fn inter(mut self) -> Self {
        self.ref_type = RefType::Inter;
        self
    }

    /// Mark as skipped
    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    pub fn plane_type(&self) -> PlaneType {
        PlaneType::from_plane(self.plane)
    }

    fn params<'a>(&self, dequant: &'a Dequantizer) -> BlockParams<'a> {
        BlockParams {
            tx_size: self.tx_size,
            tx_type: self.tx_type,
            plane_type: self.plane_type(),
            ref_type: self.ref_type,
            dequant,
        }
    }
}

/// Block layout of one tile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePlan {
    /// Visible (cols, rows) per plane in 4x4 units
    pub plane_dims: [(usize, usize); MAX_PLANES],
    /// Blocks in coding order
    pub blocks: Vec<TileBlock>,
}

impl TilePlan {
    pub fn new(plane_dims: [(usize, usize); MAX_PLANES]) -> Self {
        TilePlan {
            plane_dims,
            blocks: Vec::new(),
        }
    }

    /// Plan for 4:2:0 content with a luma area of `cols` x `rows` 4x4 units
    pub fn yuv420(cols: usize, rows: usize) -> Self {
        let chroma = (cols.div_ceil(2), rows.div_ceil(2));
        Self::new([(cols, rows), chroma, chroma])
    }

    /// Append a block
    pub fn push(&mut self, block: TileBlock) {
        self.blocks.push(block);
    }

    /// Check that every block can be coded under `dequant`
    pub fn validate(&self, dequant: &Dequantizer) -> Result<()> {
        for (i, block) in self.blocks.iter().enumerate() {
            if block.plane >= MAX_PLANES {
                return Err(Error::invalid_input(format!(
                    "block {}: plane {} out of range",
                    i, block.plane
                )));
            }

            let (cols, rows) = self.plane_dims[block.plane];
            if block.col >= cols || block.row >= rows {
                return Err(Error::invalid_input(format!(
                    "block {}: position ({}, {}) outside plane {} of {}x{}",
                    i, block.col, block.row, block.plane, cols, rows
                )));
            }

            if block.tx_size == TxSize::Tx32x32 && block.tx_type != TxType::DctDct {
                return Err(Error::invalid_input(format!(
                    "block {}: 32x32 transforms are DCT only, got {:?}",
                    i, block.tx_type
                )));
            }

            if dequant.lossless && block.tx_size != TxSize::Tx4x4 {
                return Err(Error::invalid_input(format!(
                    "block {}: lossless blocks are 4x4, got {:?}",
                    i, block.tx_size
                )));
            }
        }
        Ok(())
    }
}

/// Above/left contexts of every plane, kept by a worker across its tiles
#[derive(Debug, Default)]
struct TileContexts {
    planes: Vec<EntropyContext>,
}

impl TileContexts {
    /// Cleared contexts for the start of a tile under `plan`
    ///
    /// Buffers from the previous tile are reused when the plane sizes match.
    fn start(&mut self, plan: &TilePlan) -> &mut [EntropyContext] {
        let reusable = self.planes.len() == MAX_PLANES
            && self
                .planes
                .iter()
                .zip(&plan.plane_dims)
                .all(|(ctx, &(cols, rows))| ctx.cols() == cols && ctx.rows() == rows);

        if reusable {
            self.planes.iter_mut().for_each(EntropyContext::reset);
        } else {
            self.planes = plan
                .plane_dims
                .iter()
                .map(|&(cols, rows)| EntropyContext::new(cols, rows))
                .collect();
        }
        &mut self.planes
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decoded residuals of one tile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTile {
    /// One entry per plan block; `None` for skipped blocks and for blocks
    /// after a corruption
    pub blocks: Vec<Option<ResidualBlock>>,
    pub counts: CoefCounts,
    /// Index of the first corrupt block and where it stopped
    pub corruption: Option<(usize, Corruption)>,
}

impl DecodedTile {
    pub fn is_corrupt(&self) -> bool {
        self.corruption.is_some()
    }
}

/// Decode one tile
///
/// Decoding stops at the first corrupt block: the bool decoder has no data
/// left, so later blocks of the tile cannot be recovered.
///
/// # Panics
/// On a plan that fails [`TilePlan::validate`].
pub fn decode_tile(
    plan: &TilePlan,
    data: &[u8],
    probs: Arc<FrameCoefProbs>,
    dequant: &Dequantizer,
    frame_parallel: bool,
) -> DecodedTile {
    decode_tile_with(
        &mut TileContexts::default(),
        plan,
        data,
        probs,
        dequant,
        frame_parallel,
    )
}

fn decode_tile_with(
    contexts: &mut TileContexts,
    plan: &TilePlan,
    data: &[u8],
    probs: Arc<FrameCoefProbs>,
    dequant: &Dequantizer,
    frame_parallel: bool,
) -> DecodedTile {
    let contexts = contexts.start(plan);
    let mut decoder = CoefDecoder::new(probs, frame_parallel);
    let mut reader = RangeCoder::new(data);

    let mut blocks = Vec::with_capacity(plan.blocks.len());
    let mut corruption = None;

    for (i, block) in plan.blocks.iter().enumerate() {
        let ctx = &mut contexts[block.plane];
        if block.skip {
            let n = block.tx_size.num_4x4();
            ctx.clear_block(block.col, block.row, n, n);
            blocks.push(None);
            continue;
        }

        let initial_ctx = ctx.initial_ctx(block.col, block.row, block.tx_size);
        let decoded =
            reconstruct_residual(&mut decoder, &mut reader, &block.params(dequant), initial_ctx);
        ctx.update(block.col, block.row, block.tx_size, decoded.coefs.eob > 0);

        if let Some(c) = decoded.coefs.corruption {
            warn!("Tile corrupt at block {} of {}", i, plan.blocks.len());
            corruption = Some((i, c));
            blocks.push(Some(decoded));
            break;
        }
        blocks.push(Some(decoded));
    }
    blocks.resize(plan.blocks.len(), None);

    DecodedTile {
        blocks,
        counts: decoder.into_counts(),
        corruption,
    }
}

/// Decoded residuals of a frame
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub tiles: Vec<DecodedTile>,
    /// Sum of all tile counts
    pub counts: CoefCounts,
}

// =============================================================================
// Encoding
// =============================================================================

/// Coded data of one tile
#[derive(Debug, Clone)]
pub struct EncodedTile {
    pub data: Vec<u8>,
    /// One entry per plan block; `None` for skipped blocks
    pub blocks: Vec<Option<EncodedBlock>>,
    pub counts: CoefCounts,
}

impl EncodedTile {
    /// Total estimated cost in 1/256 bits
    pub fn cost(&self) -> u64 {
        self.blocks
            .iter()
            .flatten()
            .map(|b| b.stats.cost as u64)
            .sum()
    }

    /// Per-block statistics of the coded blocks
    pub fn stats(&self) -> impl Iterator<Item = &EncodeStats> + '_ {
        self.blocks.iter().flatten().map(|b| &b.stats)
    }
}

/// Encode one tile
///
/// `residuals` holds one raster-order residual per plan block; entries for
/// skipped blocks are ignored.
///
/// # Panics
/// On a plan that fails [`TilePlan::validate`] or a residual count mismatch.
pub fn encode_tile(
    plan: &TilePlan,
    residuals: &[Vec<i32>],
    probs: Arc<FrameCoefProbs>,
    dequant: &Dequantizer,
    frame_parallel: bool,
) -> EncodedTile {
    encode_tile_with(
        &mut TileContexts::default(),
        plan,
        residuals,
        probs,
        dequant,
        frame_parallel,
    )
}

fn encode_tile_with(
    contexts: &mut TileContexts,
    plan: &TilePlan,
    residuals: &[Vec<i32>],
    probs: Arc<FrameCoefProbs>,
    dequant: &Dequantizer,
    frame_parallel: bool,
) -> EncodedTile {
    assert_eq!(
        residuals.len(),
        plan.blocks.len(),
        "one residual per plan block"
    );

    let contexts = contexts.start(plan);
    let mut encoder = CoefEncoder::new(probs, frame_parallel);
    let mut writer = RangeEncoder::new();

    let blocks = plan
        .blocks
        .iter()
        .zip(residuals)
        .map(|(block, residual)| {
            let ctx = &mut contexts[block.plane];
            if block.skip {
                let n = block.tx_size.num_4x4();
                ctx.clear_block(block.col, block.row, n, n);
                return None;
            }

            let initial_ctx = ctx.initial_ctx(block.col, block.row, block.tx_size);
            let encoded = encode_residual(
                &mut encoder,
                &mut writer,
                residual,
                &block.params(dequant),
                initial_ctx,
            );
            ctx.update(block.col, block.row, block.tx_size, encoded.stats.eob > 0);
            Some(encoded)
        })
        .collect();

    EncodedTile {
        data: writer.finalize(),
        blocks,
        counts: encoder.into_counts(),
    }
}

/// Encoded tiles of a frame
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub tiles: Vec<EncodedTile>,
    /// Sum of all tile counts
    pub counts: CoefCounts,
}

// =============================================================================
// Frame Coding
// =============================================================================

/// Tile-parallel residual coder for a sequence of frames
///
/// Owns the configuration and, when `tile_threads` is non-zero, a dedicated
/// rayon pool that is built once here and reused by every frame. With
/// `tile_threads == 0` tiles run on the global pool.
#[derive(Debug)]
pub struct TileCoder {
    config: ResidualConfig,
    pool: Option<rayon::ThreadPool>,
}

impl TileCoder {
    /// Validate `config` and build its worker pool
    pub fn new(config: ResidualConfig) -> Result<Self> {
        config.validate()?;

        let pool = match config.tile_threads {
            0 => None,
            threads => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("zvd-tile-{}", i))
                    .build()
                    .map_err(|e| {
                        Error::Init(format!("Failed to initialize tile thread pool: {}", e))
                    })?,
            ),
        };

        debug!(
            "Tile coder ready ({} threads, frame_parallel={})",
            config.tile_threads, config.frame_parallel
        );
        Ok(TileCoder { config, pool })
    }

    pub fn config(&self) -> &ResidualConfig {
        &self.config
    }

    /// Worker threads tiles run on
    pub fn threads(&self) -> usize {
        self.install(rayon::current_num_threads)
    }

    /// Run `f` on the coder's pool
    fn install<T: Send>(&self, f: impl FnOnce() -> T + Send) -> T {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }

    /// Decode the tiles of a frame in parallel
    ///
    /// Each entry pairs a tile's plan with its bool coder data.
    pub fn decode_tiles(
        &self,
        tiles: &[(TilePlan, &[u8])],
        probs: Arc<FrameCoefProbs>,
        dequant: &Dequantizer,
    ) -> Result<DecodedFrame> {
        for (plan, _) in tiles {
            plan.validate(dequant)?;
        }
        debug!("Decoding {} tiles", tiles.len());

        let frame_parallel = self.config.frame_parallel;
        let decoded: Vec<DecodedTile> = self.install(|| {
            tiles
                .par_iter()
                .map_init(TileContexts::default, |contexts, (plan, data)| {
                    decode_tile_with(contexts, plan, data, probs.clone(), dequant, frame_parallel)
                })
                .collect()
        });

        let mut counts = CoefCounts::new();
        for tile in &decoded {
            counts.merge(&tile.counts);
        }

        Ok(DecodedFrame {
            tiles: decoded,
            counts,
        })
    }

    /// Encode the tiles of a frame in parallel
    pub fn encode_tiles(
        &self,
        tiles: &[(TilePlan, Vec<Vec<i32>>)],
        probs: Arc<FrameCoefProbs>,
        dequant: &Dequantizer,
    ) -> Result<EncodedFrame> {
        for (plan, residuals) in tiles {
            plan.validate(dequant)?;
            if residuals.len() != plan.blocks.len() {
                return Err(Error::invalid_input(format!(
                    "{} residuals for {} blocks",
                    residuals.len(),
                    plan.blocks.len()
                )));
            }
        }
        debug!("Encoding {} tiles", tiles.len());

        let frame_parallel = self.config.frame_parallel;
        let encoded: Vec<EncodedTile> = self.install(|| {
            tiles
                .par_iter()
                .map_init(TileContexts::default, |contexts, (plan, residuals)| {
                    encode_tile_with(
                        contexts,
                        plan,
                        residuals,
                        probs.clone(),
                        dequant,
                        frame_parallel,
                    )
                })
                .collect()
        });

        let mut counts = CoefCounts::new();
        for tile in &encoded {
            counts.merge(&tile.counts);
        }

        Ok(EncodedFrame {
            tiles: encoded,
            counts,
        })
    }
}
