//! VP9 residual coding
//!
//! The part of VP9 between prediction and the bitstream: a block of
//! prediction error goes through a fixed-point transform, scalar quantization
//! and context-adaptive token coding, and comes back bit-exactly.
//!
//! ## Pipeline
//!
//! - [`transform`]: DCT/ADST at 4, 8, 16 and 32 points, plus the exact WHT
//! - [`quant`]: qindex step tables, segment overrides, optional NUQ
//! - [`entropy`] / [`entropy_encoder`]: token coding of quantized levels
//! - [`block`] and [`tile`]: per-block and per-tile drivers
//!
//! ## Bit Depths
//!
//! 8, 10 and 12-bit samples are supported. Higher depths widen the
//! intermediate range and the CATEGORY6 extra bits.

pub mod block;
pub mod config;
pub mod context;
pub mod entropy;
pub mod entropy_encoder;
pub mod probs;
pub mod quant;
pub mod range_coder;
pub mod range_encoder;
pub mod scan;
pub mod tables;
pub mod tile;
pub mod transform;

pub use block::{encode_residual, quantize_block, reconstruct_residual, EncodedBlock, ResidualBlock};
pub use config::ResidualConfig;
pub use context::EntropyContext;
pub use entropy::{BlockParams, CoefBlock, CoefDecoder, Corruption, Token};
pub use entropy_encoder::{bit_cost, CoefEncoder, EncodeStats};
pub use probs::{CoefCounts, CoefProbAdapter, FrameCoefProbs, IdentityAdapter};
pub use quant::{Dequantizer, NuqProfile, QuantParams, SegmentQuant};
pub use range_coder::{BoolReader, RangeCoder};
pub use range_encoder::{BoolWriter, RangeEncoder};
pub use scan::{get_scan_order, ScanOrder};
pub use tables::{BitDepth, PlaneType, RefType, TxSize, TxType};
pub use tile::{
    decode_tile, encode_tile, DecodedFrame, DecodedTile, EncodedFrame, EncodedTile, TileBlock,
    TileCoder, TilePlan,
};
