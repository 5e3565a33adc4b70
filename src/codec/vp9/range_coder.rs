//! VP9 Binary Arithmetic Range Decoder
//!
//! The coefficient codec only needs a probability-driven binary decision
//! reader. [`BoolReader`] is that contract; [`RangeCoder`] is the reference
//! implementation (the VP8/VP9 boolean decoder with 8-bit probabilities).

/// Probability-driven binary decision reader
///
/// `prob` is the probability of a 0 bit on a 1..=255 scale.
pub trait BoolReader {
    /// Read one decision
    fn read_bool(&mut self, prob: u8) -> bool;

    /// Read an equiprobable bit
    #[inline]
    fn read_bit(&mut self) -> bool {
        self.read_bool(128)
    }

    /// Read `n` equiprobable bits, most significant first
    #[inline]
    fn read_literal(&mut self, n: u32) -> u32 {
        let mut value = 0u32;
        for _ in 0..n {
            value = (value << 1) | self.read_bit() as u32;
        }
        value
    }

    /// Whether the reader has consumed bytes past the end of its buffer
    ///
    /// Conformant streams never do; the codec treats it as corruption.
    fn has_overrun(&self) -> bool {
        false
    }
}

/// Range coder state for VP9 decoding
///
/// The range coder maintains:
/// - An 8-bit range (128..=255 after renormalization)
/// - A 16-bit window of the bitstream being compared against the split
/// - Position tracking in the input buffer
pub struct RangeCoder<'a> {
    /// Input data buffer
    data: &'a [u8],
    /// Current position in data
    pos: usize,
    /// Current range
    range: u32,
    /// Current value window
    value: u32,
    /// Number of bits shifted out of the low byte of the window
    bit_count: u32,
    /// Bytes requested past the end of `data`
    overrun: usize,
}

impl<'a> RangeCoder<'a> {
    /// Minimum range value before renormalization
    pub const MIN_RANGE: u32 = 128;

    /// Initialize a new range coder from input data
    pub fn new(data: &'a [u8]) -> Self {
        let mut coder = RangeCoder {
            data,
            pos: 0,
            range: 255,
            value: 0,
            bit_count: 0,
            overrun: 0,
        };

        let hi = coder.next_byte();
        let lo = coder.next_byte();
        coder.value = (hi << 8) | lo;
        coder
    }

    #[inline]
    fn next_byte(&mut self) -> u32 {
        match self.data.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                b as u32
            }
            None => {
                self.overrun += 1;
                0
            }
        }
    }

    /// Renormalize the range coder state
    #[inline]
    fn renormalize(&mut self) {
        while self.range < Self::MIN_RANGE {
            self.range <<= 1;
            self.value <<= 1;
            self.bit_count += 1;

            if self.bit_count == 8 {
                self.bit_count = 0;
                self.value |= self.next_byte();
            }
        }
    }

    /// Bytes consumed from the buffer so far
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes requested past the end of the buffer
    pub fn overrun_bytes(&self) -> usize {
        self.overrun
    }
}

impl BoolReader for RangeCoder<'_> {
    #[inline]
    fn read_bool(&mut self, prob: u8) -> bool {
        // Split point: where the 0/1 boundary lies in the range
        let split = 1 + (((self.range - 1) * prob as u32) >> 8);
        let split_shifted = split << 8;

        let bit = if self.value >= split_shifted {
            self.range -= split;
            self.value -= split_shifted;
            true
        } else {
            self.range = split;
            false
        };

        self.renormalize();
        bit
    }

    fn has_overrun(&self) -> bool {
        self.overrun > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_coder_creation() {
        let data = [0x9D, 0x01, 0x2A, 0x00, 0x00];
        let coder = RangeCoder::new(&data);
        assert_eq!(coder.position(), 2);
        assert_eq!(coder.range, 255);
        assert!(!coder.has_overrun());
    }

    #[test]
    fn test_zero_stream_reads_zeros() {
        let data = [0x00; 8];
        let mut coder = RangeCoder::new(&data);
        for _ in 0..16 {
            assert!(!coder.read_bool(128));
        }
        assert_eq!(coder.read_literal(8), 0);
    }

    #[test]
    fn test_overrun_detected() {
        let data = [0xFF];
        let mut coder = RangeCoder::new(&data);
        assert!(coder.has_overrun());
        assert_eq!(coder.overrun_bytes(), 1);
        for _ in 0..32 {
            coder.read_bit();
        }
        assert!(coder.overrun_bytes() > 1);
    }

    #[test]
    fn test_read_literal_range() {
        let data = [0xA5, 0x5A, 0xC3, 0x3C, 0xFF, 0x00];
        let mut coder = RangeCoder::new(&data);
        let val = coder.read_literal(4);
        assert!(val <= 15);
    }
}
