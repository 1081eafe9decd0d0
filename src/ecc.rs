//! LT (Luby Transform) fountain code.
//!
//! Fountain codes are rateless erasure codes: the encoder produces a
//! potentially endless stream of droplets, and the original payload can be
//! recovered from slightly more droplets than there are source chunks,
//! regardless of which droplets arrive, in which order, or how often.
//!
//! This module provides:
//! - A deterministic seed-indexed generator shared by both sides
//! - The truncated robust soliton degree table
//! - Reproducible chunk selection from a droplet seed
//! - The encoder, the droplet wire codec and the peeling decoder
//!
//! # Examples
//!
//! ```rust
//! use ltcode::ecc::{decode_from_wire, encode_to_wire};
//!
//! let payload = b"Hello, world! This is a test of LT codes.".to_vec();
//! let lines = encode_to_wire(&payload, 8, 40).unwrap();
//! assert_eq!(decode_from_wire(&lines), Some(payload));
//! ```

use crate::error::Result;

pub mod decoder;
pub mod droplet;
pub mod encoder;
pub mod prng;
pub mod sampler;
pub mod soliton;

pub use decoder::{Decoder, DropletStatus, Glass, Progress};
pub use droplet::{peek_seed, Droplet, DropletLimits, MAX_NUM_CHUNKS, MAX_PADDING};
pub use encoder::{Encoder, EncoderParameters, DEFAULT_CHUNK_SIZE, DEFAULT_EXTRA};
pub use prng::{SeededRandom, DEFAULT_SEED};
pub use sampler::chunk_indices;
pub use soliton::{RobustSoliton, SolitonCache};

/// XOR `src` into `dst` byte by byte
pub(crate) fn xor_into(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

// Convenience functions

/// Encode `data` into `count` droplet wire strings.
pub fn encode_to_wire(data: &[u8], chunk_size: usize, count: usize) -> Result<Vec<String>> {
    let encoder = Encoder::with_chunk_size(data, chunk_size)?;
    Ok(encoder.take(count).map(|d| d.to_wire()).collect())
}

/// Decode a payload from droplet wire strings.
///
/// Malformed or out-of-range lines are skipped. Returns `None` if the droplets that parsed
/// were not enough to resolve every chunk.
pub fn decode_from_wire<S: AsRef<str>>(lines: &[S]) -> Option<Vec<u8>> {
    let mut decoder = Decoder::new();
    for line in lines {
        if let Ok(droplet) = line.as_ref().parse::<Droplet>() {
            // A droplet the graph rejects is dropped like a malformed line
            let _ = decoder.add_droplet(droplet);
            if decoder.is_done() {
                break;
            }
        }
    }
    decoder.data()
}
