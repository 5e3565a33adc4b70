//! VP9 Binary Arithmetic Range Encoder
//!
//! The inverse of the decoder in `range_coder.rs`. [`BoolWriter`] is the
//! contract the coefficient encoder writes through; [`RangeEncoder`] is the
//! reference implementation with carry propagation into already-emitted bytes.

/// Probability-driven binary decision writer
///
/// `prob` is the probability of a 0 bit on a 1..=255 scale.
pub trait BoolWriter {
    /// Write one decision
    fn write_bool(&mut self, bit: bool, prob: u8);

    /// Write an equiprobable bit
    #[inline]
    fn write_bit(&mut self, bit: bool) {
        self.write_bool(bit, 128);
    }

    /// Write `n` equiprobable bits, most significant first
    #[inline]
    fn write_literal(&mut self, value: u32, n: u32) {
        for i in (0..n).rev() {
            self.write_bit((value >> i) & 1 != 0);
        }
    }
}

/// Range encoder for VP9 encoding
///
/// The encoder maintains:
/// - A range value that narrows as symbols are encoded (128..=255)
/// - The low end of the current interval, 24 bits of which are pending
/// - An output buffer that carries may ripple back into
pub struct RangeEncoder {
    /// Current range
    range: u32,
    /// Current low value (bottom of range)
    bottom: u32,
    /// Shifts remaining before the next byte is emitted
    bit_count: u32,
    /// Output buffer
    buffer: Vec<u8>,
}

impl RangeEncoder {
    /// Minimum range value before renormalization
    pub const MIN_RANGE: u32 = 128;

    /// Create a new range encoder
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create with pre-allocated buffer capacity
    pub fn with_capacity(capacity: usize) -> Self {
        RangeEncoder {
            range: 255,
            bottom: 0,
            bit_count: 24,
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Add one to the bytes already written, rippling through 0xFF runs
    fn propagate_carry(&mut self) {
        for byte in self.buffer.iter_mut().rev() {
            if *byte == 0xFF {
                *byte = 0;
            } else {
                *byte += 1;
                return;
            }
        }
    }

    /// Finish the stream and return the encoded bytes
    ///
    /// Flushing pads the buffer so the decoder's two-byte window never has
    /// to read past the end.
    pub fn finalize(mut self) -> Vec<u8> {
        self.flush();
        self.buffer
    }

    fn flush(&mut self) {
        let c = self.bit_count;
        let mut v = self.bottom;

        if v & (1 << (32 - c)) != 0 {
            self.propagate_carry();
        }

        v <<= c & 7;
        for _ in 0..(c >> 3) {
            v <<= 8;
        }
        for _ in 0..4 {
            self.buffer.push((v >> 24) as u8);
            v <<= 8;
        }
    }

    /// Bytes emitted so far (excluding pending bits)
    pub fn size(&self) -> usize {
        self.buffer.len()
    }
}

impl BoolWriter for RangeEncoder {
    #[inline]
    fn write_bool(&mut self, bit: bool, prob: u8) {
        let split = 1 + (((self.range - 1) * prob as u32) >> 8);

        if bit {
            self.bottom = self.bottom.wrapping_add(split);
            self.range -= split;
        } else {
            self.range = split;
        }

        while self.range < Self::MIN_RANGE {
            self.range <<= 1;

            if self.bottom & (1 << 31) != 0 {
                self.propagate_carry();
            }

            self.bottom <<= 1;
            self.bit_count -= 1;

            if self.bit_count == 0 {
                self.buffer.push((self.bottom >> 24) as u8);
                self.bottom &= (1 << 24) - 1;
                self.bit_count = 8;
            }
        }
    }
}

impl Default for RangeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::super::range_coder::{BoolReader, RangeCoder};
    use super::*;

    /// Deterministic (bit, probability) sequence
    fn decisions(count: usize, seed: u32) -> Vec<(bool, u8)> {
        let mut state = seed.wrapping_add(0x9E37_79B9);
        (0..count)
            .map(|_| {
                state = state.wrapping_mul(1664525).wrapping_add(1013904223);
                let prob = ((state >> 8) % 255) as u8 + 1;
                state = state.wrapping_mul(1664525).wrapping_add(1013904223);
                // Bias bits toward the likely branch so carries happen
                let bit = ((state >> 8) & 0xFF) as u8 >= prob;
                (bit, prob)
            })
            .collect()
    }

    #[test]
    fn test_range_encoder_creation() {
        let encoder = RangeEncoder::new();
        assert_eq!(encoder.size(), 0);
        assert_eq!(encoder.range, 255);
    }

    #[test]
    fn test_empty_stream() {
        let data = RangeEncoder::new().finalize();
        assert_eq!(data, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_roundtrip_literal() {
        let mut encoder = RangeEncoder::new();
        encoder.write_literal(0xABC, 12);
        encoder.write_literal(5, 3);
        let data = encoder.finalize();

        let mut decoder = RangeCoder::new(&data);
        assert_eq!(decoder.read_literal(12), 0xABC);
        assert_eq!(decoder.read_literal(3), 5);
    }

    #[test]
    fn test_roundtrip_bool() {
        for seed in 0..20 {
            let seq = decisions(500, seed);
            let mut encoder = RangeEncoder::new();
            for &(bit, prob) in &seq {
                encoder.write_bool(bit, prob);
            }
            let data = encoder.finalize();

            let mut decoder = RangeCoder::new(&data);
            for (i, &(bit, prob)) in seq.iter().enumerate() {
                assert_eq!(decoder.read_bool(prob), bit, "seed {} decision {}", seed, i);
            }
            assert!(!decoder.has_overrun());
        }
    }

    #[test]
    fn test_extreme_probabilities() {
        let mut encoder = RangeEncoder::new();
        for i in 0..200 {
            encoder.write_bool(i % 7 == 0, 1);
            encoder.write_bool(i % 5 != 0, 255);
        }
        let data = encoder.finalize();

        let mut decoder = RangeCoder::new(&data);
        for i in 0..200 {
            assert_eq!(decoder.read_bool(1), i % 7 == 0);
            assert_eq!(decoder.read_bool(255), i % 5 != 0);
        }
    }
}
