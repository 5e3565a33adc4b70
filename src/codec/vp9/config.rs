//! Residual coding configuration

use serde::{Deserialize, Serialize};

use super::quant::{Dequantizer, NuqProfile, QuantParams, SegmentQuant};
use super::tables::BitDepth;
use crate::error::{Error, Result};

/// Upper bound on dedicated tile worker threads
pub const MAX_TILE_THREADS: usize = 64;

/// Settings shared by every block of a frame
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResidualConfig {
    /// Sample bit depth
    pub bit_depth: BitDepth,
    /// Skip count collection (no backward adaptation)
    pub frame_parallel: bool,
    /// Non-uniform quantization shape, if enabled
    pub nuq: Option<NuqProfile>,
    /// Dedicated tile worker threads (0 = global rayon pool)
    pub tile_threads: usize,
}

impl ResidualConfig {
    pub fn new(bit_depth: BitDepth) -> Self {
        ResidualConfig {
            bit_depth,
            ..Default::default()
        }
    }

    /// Set frame-parallel mode
    pub fn with_frame_parallel(mut self, frame_parallel: bool) -> Self {
        self.frame_parallel = frame_parallel;
        self
    }

    /// Enable non-uniform quantization
    pub fn with_nuq(mut self, profile: NuqProfile) -> Self {
        self.nuq = Some(profile);
        self
    }

    /// Set the number of dedicated tile threads
    pub fn with_tile_threads(mut self, threads: usize) -> Self {
        self.tile_threads = threads;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.tile_threads > MAX_TILE_THREADS {
            return Err(Error::config(format!(
                "Invalid tile thread count: {}. Valid range: 0-{}",
                self.tile_threads, MAX_TILE_THREADS
            )));
        }

        if let Some(nuq) = &self.nuq {
            nuq.validate()?;
        }

        Ok(())
    }

    /// Dequantizer for a frame and segment under this configuration
    pub fn dequantizer(&self, params: &QuantParams, segment: &SegmentQuant) -> Dequantizer {
        Dequantizer::new(params, segment, self.bit_depth, self.nuq.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResidualConfig::default();
        assert_eq!(config.bit_depth, BitDepth::Eight);
        assert!(!config.frame_parallel);
        assert!(config.nuq.is_none());
        assert_eq!(config.tile_threads, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ResidualConfig::new(BitDepth::Ten)
            .with_frame_parallel(true)
            .with_nuq(NuqProfile::default())
            .with_tile_threads(4);
        assert_eq!(config.bit_depth, BitDepth::Ten);
        assert!(config.frame_parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let config = ResidualConfig::default().with_tile_threads(MAX_TILE_THREADS + 1);
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut nuq = NuqProfile::default();
        nuq.knots[2][0] = 0;
        let config = ResidualConfig::default().with_nuq(nuq);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_dequantizer_follows_config() {
        let params = QuantParams::new(50);
        let segment = SegmentQuant::default();

        let plain = ResidualConfig::default().dequantizer(&params, &segment);
        assert!(!plain.is_nuq());

        let nuq = ResidualConfig::new(BitDepth::Twelve)
            .with_nuq(NuqProfile::default())
            .dequantizer(&params, &segment);
        assert!(nuq.is_nuq());
        assert_eq!(nuq.bit_depth, BitDepth::Twelve);
    }

    #[test]
    fn test_json_round_trip() {
        let config = ResidualConfig::new(BitDepth::Ten).with_nuq(NuqProfile::default());
        let json = serde_json::to_string(&config).unwrap();
        let back: ResidualConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
