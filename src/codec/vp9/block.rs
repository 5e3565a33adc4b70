//! VP9 Residual Block Pipeline
//!
//! Glues the three stages together for one transform block:
//! - Encode: forward transform (or WHT) → quantize per band → tokenize
//! - Decode: detokenize with dequantization → inverse transform (or WHT)
//!
//! The Walsh-Hadamard path is taken when the dequantizer is lossless.

use super::entropy::{BlockParams, CoefBlock, CoefDecoder};
use super::entropy_encoder::{CoefEncoder, EncodeStats};
use super::range_coder::BoolReader;
use super::range_encoder::BoolWriter;
use super::scan::get_scan_order;
use super::tables::{get_band_table, TxSize};
use super::transform::{forward_transform, fwht4x4, inverse_transform, iwht4x4};

/// A decoded transform block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidualBlock {
    /// Coefficients as decoded
    pub coefs: CoefBlock,
    /// Residual samples in raster order
    pub residual: Vec<i32>,
}

/// An encoded transform block
#[derive(Debug, Clone)]
pub struct EncodedBlock {
    /// Quantized levels in raster order
    pub levels: Vec<i32>,
    pub stats: EncodeStats,
}

#[inline]
fn check_lossless(params: &BlockParams) {
    assert!(
        params.tx_size == TxSize::Tx4x4,
        "lossless blocks are 4x4, got {:?}",
        params.tx_size
    );
}

/// Decode one block and reconstruct its residual
///
/// A corrupt block still yields a residual built from the coefficients
/// decoded before the corruption point.
pub fn reconstruct_residual<R: BoolReader>(
    decoder: &mut CoefDecoder,
    reader: &mut R,
    params: &BlockParams,
    initial_ctx: usize,
) -> ResidualBlock {
    let coefs = decoder.decode_block(reader, params, initial_ctx);
    let mut residual = vec![0i32; params.tx_size.num_coeffs()];

    if params.dequant.lossless {
        check_lossless(params);
        iwht4x4(&coefs.dqcoeff, &mut residual, coefs.eob);
    } else {
        inverse_transform(
            params.tx_size,
            params.tx_type,
            &coefs.dqcoeff,
            &mut residual,
            coefs.eob,
            params.bit_depth(),
        );
    }

    ResidualBlock { coefs, residual }
}

/// Quantize transform coefficients, raster in and raster out
///
/// Each coefficient uses the step of the band its scan position falls in.
pub fn quantize_block(coeffs: &[i32], params: &BlockParams) -> Vec<i32> {
    let tx_size = params.tx_size;
    let scan = get_scan_order(tx_size, params.tx_type);
    let bands = get_band_table(tx_size);

    let mut levels = vec![0i32; tx_size.num_coeffs()];
    for (c, &pos) in scan.scan.iter().enumerate() {
        let pos = pos as usize;
        levels[pos] =
            params
                .dequant
                .quantize(params.plane_type, bands[c] as usize, coeffs[pos], tx_size);
    }
    levels
}

/// Transform, quantize and tokenize a residual block
pub fn encode_residual<W: BoolWriter>(
    encoder: &mut CoefEncoder,
    writer: &mut W,
    residual: &[i32],
    params: &BlockParams,
    initial_ctx: usize,
) -> EncodedBlock {
    let n = params.tx_size.num_coeffs();
    let mut coeffs = vec![0i32; n];

    if params.dequant.lossless {
        check_lossless(params);
        fwht4x4(residual, &mut coeffs);
    } else {
        forward_transform(params.tx_size, params.tx_type, residual, &mut coeffs);
    }

    let levels = quantize_block(&coeffs, params);
    let stats = encoder.encode_block(writer, &levels, n, params, initial_ctx);

    EncodedBlock { levels, stats }
}
