//! Droplets and their textual wire form.
//!
//! A droplet travels as `seed|num_chunks|padding|base64(payload)`. The payload
//! is base64 and therefore the last field; parsing splits on at most three
//! delimiters so the payload text is never cut apart.

use crate::ecc::sampler::chunk_indices;
use crate::ecc::soliton::RobustSoliton;
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use std::str::FromStr;

/// Field separator of the wire format
pub const FIELD_SEPARATOR: char = '|';

/// Largest chunk count accepted from the wire
pub const MAX_NUM_CHUNKS: usize = 1_000_000;

/// Largest padding accepted from the wire
pub const MAX_PADDING: usize = 1024;

/// One encoded symbol of a fountain stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Droplet {
    /// Generator seed that reproduces this droplet's chunk selection
    pub seed: u64,
    /// Number of source chunks of the stream (K)
    pub num_chunks: usize,
    /// Zero bytes appended to the last chunk
    pub padding: usize,
    /// XOR of the selected chunks, `chunk_size` bytes
    pub data: Vec<u8>,
}

/// Acceptance limits applied to droplets read from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropletLimits {
    /// Largest accepted `num_chunks`
    pub max_num_chunks: usize,
    /// Largest accepted `padding`
    pub max_padding: usize,
    /// Exact payload length, when agreed out of band
    pub chunk_size: Option<usize>,
}

impl Default for DropletLimits {
    fn default() -> Self {
        Self {
            max_num_chunks: MAX_NUM_CHUNKS,
            max_padding: MAX_PADDING,
            chunk_size: None,
        }
    }
}

impl Droplet {
    /// Create a droplet
    pub fn new(seed: u64, num_chunks: usize, padding: usize, data: Vec<u8>) -> Self {
        Self {
            seed,
            num_chunks,
            padding,
            data,
        }
    }

    /// Chunk indices combined into this droplet.
    ///
    /// `table` must be the soliton table for `self.num_chunks`.
    pub fn chunk_nums(&self, table: &RobustSoliton) -> Vec<usize> {
        debug_assert_eq!(table.k(), self.num_chunks);
        chunk_indices(table, self.seed)
    }

    /// Wire representation
    pub fn to_wire(&self) -> String {
        self.to_string()
    }

    /// Parse a wire string
    pub fn from_wire(s: &str) -> Result<Self> {
        s.parse()
    }

    /// Check the droplet against receiver limits.
    ///
    /// `expected_num_chunks` pins the droplet to an active stream when set.
    pub fn validate(
        &self,
        limits: &DropletLimits,
        expected_num_chunks: Option<usize>,
    ) -> Result<()> {
        if self.num_chunks == 0 || self.num_chunks > limits.max_num_chunks {
            return Err(Error::InvalidDroplet(format!(
                "num_chunks {} outside [1, {}]",
                self.num_chunks, limits.max_num_chunks
            )));
        }
        if self.padding > limits.max_padding {
            return Err(Error::InvalidDroplet(format!(
                "padding {} exceeds {}",
                self.padding, limits.max_padding
            )));
        }
        if let Some(chunk_size) = limits.chunk_size {
            if self.data.len() != chunk_size {
                return Err(Error::InvalidDroplet(format!(
                    "payload is {} bytes, expected {}",
                    self.data.len(),
                    chunk_size
                )));
            }
            if self.padding >= chunk_size {
                return Err(Error::InvalidDroplet(format!(
                    "padding {} not below chunk size {}",
                    self.padding, chunk_size
                )));
            }
        }
        if let Some(expected) = expected_num_chunks {
            if expected != self.num_chunks {
                return Err(Error::StreamMismatch {
                    expected,
                    found: self.num_chunks,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Droplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}",
            self.seed,
            self.num_chunks,
            self.padding,
            STANDARD.encode(&self.data),
            sep = FIELD_SEPARATOR
        )
    }
}

fn parse_field<T: FromStr>(field: &str, name: &str) -> Result<T> {
    field
        .trim()
        .parse()
        .map_err(|_| Error::Format(format!("{name} is not an unsigned integer: {field:?}")))
}

impl FromStr for Droplet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.trim().splitn(4, FIELD_SEPARATOR).collect();
        if fields.len() != 4 {
            return Err(Error::Format(format!(
                "expected 4 fields, got {}",
                fields.len()
            )));
        }

        let seed = parse_field(fields[0], "seed")?;
        let num_chunks = parse_field(fields[1], "num_chunks")?;
        let padding = parse_field(fields[2], "padding")?;
        let data = STANDARD
            .decode(fields[3].trim())
            .map_err(|e| Error::Format(format!("payload is not valid base64: {e}")))?;

        Ok(Self {
            seed,
            num_chunks,
            padding,
            data,
        })
    }
}

/// Read the seed of a wire string without decoding the payload.
pub fn peek_seed(s: &str) -> Option<u64> {
    s.trim()
        .split(FIELD_SEPARATOR)
        .next()
        .and_then(|seed| seed.trim().parse().ok())
}
