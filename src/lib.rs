//! ZVD Residual - the residual coding core of a VP9-style video codec
//!
//! Turns blocks of prediction error into context-adaptively entropy-coded
//! coefficients and back, bit-exactly on every platform.
//!
//! # Architecture
//!
//! - `codec::vp9::transform`: fixed-point DCT/ADST and the lossless WHT
//! - `codec::vp9::quant`: step tables, segment overrides, non-uniform bins
//! - `codec::vp9::entropy`: token model and coefficient decoder
//! - `codec::vp9::entropy_encoder`: coefficient encoder and rate estimates
//! - `codec::vp9::tile`: tile-parallel block coding with rayon
//!
//! Prediction, loop filtering and bitstream framing live outside this crate;
//! the bool coder is reached through the `BoolReader`/`BoolWriter` traits.

pub mod codec;
pub mod error;

pub use error::{Error, Result};

/// ZVD Residual version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;

/// Configuration for the library
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Maximum number of threads to use for tile processing
    pub max_threads: Option<usize>,
    /// Enable verbose logging
    pub verbose: bool,
    /// Enable debug output
    pub debug: bool,
}

/// Initialize the library with the given configuration
pub fn init(config: Config) -> Result<()> {
    // Initialize thread pool if max_threads is specified
    if let Some(threads) = config.max_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| Error::Init(format!("Failed to initialize thread pool: {}", e)))?;
    }

    // Initialize logging
    if config.verbose || config.debug {
        let level = if config.debug { "debug" } else { "info" };
        tracing_subscriber::fmt()
            .with_env_filter(level)
            .try_init()
            .map_err(|e| Error::Init(format!("Failed to initialize logging: {}", e)))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION_MAJOR, 0);
        assert_eq!(VERSION_MINOR, 1);
        assert_eq!(VERSION_PATCH, 0);
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_threads, None);
        assert!(!config.verbose);
        assert!(!config.debug);
    }

    #[test]
    fn test_init() {
        let config = Config::default();
        assert!(init(config).is_ok());
    }
}
