//! Fountain encoder.
//!
//! Splits a payload into `K` fixed-size chunks (the last one zero padded) and
//! emits an unbounded stream of droplets. Each droplet gets a fresh seed from
//! the encoder's own running generator; the chunks it combines are derived
//! from that seed alone.

use crate::ecc::droplet::Droplet;
use crate::ecc::prng::SeededRandom;
use crate::ecc::sampler::chunk_indices;
use crate::ecc::soliton::RobustSoliton;
use crate::ecc::xor_into;
use crate::error::{Error, Result};

/// Chunk size used when none is given
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Extra droplets generated on top of `K` by default (50%)
pub const DEFAULT_EXTRA: f64 = 0.5;

/// Parameters for configuring the encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderParameters {
    /// Bytes per chunk, and per droplet payload
    pub chunk_size: usize,
    /// Start state of the running generator; `None` and `0` use the default
    pub seed: Option<u64>,
}

impl Default for EncoderParameters {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            seed: None,
        }
    }
}

/// LT fountain encoder over a single payload
#[derive(Debug, Clone)]
pub struct Encoder {
    /// Payload padded to `num_chunks * chunk_size`
    data: Vec<u8>,
    chunk_size: usize,
    num_chunks: usize,
    padding: usize,
    /// Running generator, advanced once per droplet
    rng: SeededRandom,
    table: RobustSoliton,
}

impl Encoder {
    /// Create an encoder for `data`.
    pub fn new(data: &[u8], params: EncoderParameters) -> Result<Self> {
        let chunk_size = params.chunk_size;
        if chunk_size == 0 {
            return Err(Error::InvalidInput(
                "chunk size must be positive".to_string(),
            ));
        }
        if data.is_empty() {
            return Err(Error::InvalidInput(
                "cannot encode an empty payload".to_string(),
            ));
        }

        let num_chunks = data.len().div_ceil(chunk_size);
        let padding = num_chunks * chunk_size - data.len();

        let mut padded = Vec::with_capacity(num_chunks * chunk_size);
        padded.extend_from_slice(data);
        padded.resize(num_chunks * chunk_size, 0);

        Ok(Self {
            data: padded,
            chunk_size,
            num_chunks,
            padding,
            rng: SeededRandom::from_option(params.seed),
            table: RobustSoliton::new(num_chunks)?,
        })
    }

    /// Create an encoder with the given chunk size and the default seed
    pub fn with_chunk_size(data: &[u8], chunk_size: usize) -> Result<Self> {
        Self::new(
            data,
            EncoderParameters {
                chunk_size,
                ..EncoderParameters::default()
            },
        )
    }

    /// Number of source chunks (K)
    pub fn num_chunks(&self) -> usize {
        self.num_chunks
    }

    /// Bytes per chunk
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Zero bytes appended to the last chunk
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Degree table used for this payload
    pub fn table(&self) -> &RobustSoliton {
        &self.table
    }

    /// The `index`-th chunk of the padded payload
    pub fn chunk(&self, index: usize) -> &[u8] {
        let start = index * self.chunk_size;
        &self.data[start..start + self.chunk_size]
    }

    /// Iterate over the padded chunks in order
    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(self.chunk_size)
    }

    /// Droplets to pre-generate for a transfer: `K + ceil(K * extra)`
    pub fn droplet_budget(&self, extra: f64) -> usize {
        let extra = (self.num_chunks as f64 * extra.max(0.0)).ceil() as usize;
        self.num_chunks + extra
    }

    /// Emit the next droplet
    pub fn next_droplet(&mut self) -> Droplet {
        let seed = self.rng.next_seed();

        let data = if self.num_chunks > 1 {
            let mut combined = vec![0u8; self.chunk_size];
            for index in chunk_indices(&self.table, seed) {
                xor_into(&mut combined, self.chunk(index));
            }
            combined
        } else {
            self.data.clone()
        };

        Droplet::new(seed, self.num_chunks, self.padding, data)
    }
}

impl Iterator for Encoder {
    type Item = Droplet;

    fn next(&mut self) -> Option<Droplet> {
        Some(self.next_droplet())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}
