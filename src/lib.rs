//! vp9dec - A VP9 video bitstream decoder written in Rust
//!
//! vp9dec parses VP9 frames out of raw temporal units and reconstructs
//! them into planar frames, with tile columns decoded in parallel.
//!
//! # Architecture
//!
//! The decoder is organized into several key modules:
//!
//! - `decoder`: Stateful top-level decoder and frame queue
//! - `header`: Uncompressed frame header and superframe index parsing
//! - `parser`: Compressed header and tile syntax decoding
//! - `bool_coder`: The boolean arithmetic decoder behind all coded syntax
//! - `probs`: Probability tables, contexts slots and forward/backward updates
//! - `predict`: Intra and inter (motion compensated) prediction
//! - `transform`: Inverse DCT, ADST and Walsh-Hadamard transforms
//! - `reconstruct`: Dequantization and residual application
//! - `frame`: Frame buffers and the reference frame store
//!
//! # Example
//!
//! ```no_run
//! use vp9dec::{Vp9Decoder, Error};
//!
//! let mut decoder = Vp9Decoder::new();
//! decoder.decode_chunk(&std::fs::read("frame.vp9").unwrap())?;
//! loop {
//!     match decoder.get_decoded_frame() {
//!         Ok(frame) => println!("{}x{}", frame.width, frame.height),
//!         Err(Error::NeedsMoreInput) => break,
//!         Err(e) => return Err(e),
//!     }
//! }
//! # Ok::<(), vp9dec::Error>(())
//! ```

pub mod bitstream;
pub mod bool_coder;
pub mod context;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod header;
pub mod parser;
pub mod predict;
pub mod probs;
pub mod reconstruct;
pub mod tables;
pub mod transform;
pub mod tree;

pub use decoder::Vp9Decoder;
pub use error::{Error, Result};
pub use frame::DecodedFrame;

/// vp9dec version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;

/// Configuration for the vp9dec library
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of threads to use for tile decoding
    pub max_threads: Option<usize>,
    /// Enable verbose logging
    pub verbose: bool,
    /// Enable debug output
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_threads: None,
            verbose: false,
            debug: false,
        }
    }
}

/// Initialize the vp9dec library with the given configuration
///
/// Safe to call more than once; a thread pool that is already running is
/// left as it is.
pub fn init(config: Config) {
    if let Some(threads) = config.max_threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            tracing::warn!("thread pool already initialized: {e}");
        }
    }

    if config.verbose || config.debug {
        let level = if config.debug { "debug" } else { "info" };
        tracing_subscriber::fmt().with_env_filter(level).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION_MAJOR, 0);
        assert_eq!(VERSION_MINOR, 1);
        assert_eq!(VERSION_PATCH, 0);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_threads, None);
        assert!(!config.verbose);
        assert!(!config.debug);
    }
}
