//! Peeling decoder.
//!
//! A [`Glass`] holds the decode graph of one stream: the chunks resolved so
//! far and the equations ("entries") still waiting for enough of their chunks
//! to be known. Every droplet adds one equation `xor(chunks[indices]) ==
//! payload`. Known chunks are substituted out of it; once a single unknown is
//! left the chunk is solved and every other entry referencing it is revisited,
//! which may solve further chunks in turn.
//!
//! [`Decoder`] owns at most one glass and replaces it whenever a droplet from a
//! different stream shows up.
//!
//! # Examples
//!
//! ```
//! use ltcode::ecc::{Decoder, Encoder};
//!
//! let payload: Vec<u8> = (1..=10).collect();
//! let mut encoder = Encoder::with_chunk_size(&payload, 4).unwrap();
//! let mut decoder = Decoder::new();
//!
//! while !decoder.is_done() {
//!     decoder.add_droplet(encoder.next_droplet()).unwrap();
//! }
//! assert_eq!(decoder.data().unwrap(), payload);
//! ```

use crate::ecc::droplet::{Droplet, DropletLimits};
use crate::ecc::sampler::chunk_indices;
use crate::ecc::soliton::{RobustSoliton, SolitonCache};
use crate::ecc::xor_into;
use crate::error::{Error, Result};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

/// Effect of a single droplet on the decode graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropletStatus {
    /// The seed was already applied; nothing changed
    Duplicate,
    /// Accepted, but no chunk was resolved
    Stalled,
    /// Accepted and resolved this many chunks
    Resolved(usize),
}

impl DropletStatus {
    /// Whether the droplet advanced completion
    pub fn made_progress(&self) -> bool {
        matches!(self, DropletStatus::Resolved(_))
    }
}

/// A pending equation: the XOR of the chunks in `indices` equals `payload`
#[derive(Debug, Clone)]
struct Entry {
    indices: Vec<usize>,
    payload: Vec<u8>,
}

/// Decode graph of one fountain stream
#[derive(Debug, Clone)]
pub struct Glass {
    num_chunks: usize,
    chunk_size: usize,
    padding: usize,
    table: Arc<RobustSoliton>,
    chunks: Vec<Option<Vec<u8>>>,
    /// Pending entries in arrival order
    entries: BTreeMap<u64, Entry>,
    next_entry: u64,
    /// For each chunk, entries that were waiting on it
    watchers: Vec<Vec<u64>>,
    seen_seeds: HashSet<u64>,
    resolved: usize,
}

impl Glass {
    /// Create an empty graph for the stream `first` belongs to, then apply it.
    pub fn new(first: Droplet, table: Arc<RobustSoliton>) -> Result<Self> {
        if first.num_chunks == 0 {
            return Err(Error::InvalidDroplet(
                "droplet announces zero chunks".to_string(),
            ));
        }
        if first.data.is_empty() {
            return Err(Error::InvalidDroplet("droplet payload is empty".to_string()));
        }
        if table.k() != first.num_chunks {
            return Err(Error::InvalidInput(format!(
                "soliton table is for {} chunks, stream has {}",
                table.k(),
                first.num_chunks
            )));
        }

        let num_chunks = first.num_chunks;
        let mut glass = Self {
            num_chunks,
            chunk_size: first.data.len(),
            padding: first.padding,
            table,
            chunks: vec![None; num_chunks],
            entries: BTreeMap::new(),
            next_entry: 0,
            watchers: vec![Vec::new(); num_chunks],
            seen_seeds: HashSet::new(),
            resolved: 0,
        };
        glass.add_droplet(first)?;
        Ok(glass)
    }

    /// Number of source chunks (K)
    pub fn num_chunks(&self) -> usize {
        self.num_chunks
    }

    /// Payload length of every droplet in this stream
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Padding announced by the stream
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Number of resolved chunks
    pub fn chunks_done(&self) -> usize {
        self.resolved
    }

    /// Number of distinct droplets applied
    pub fn received(&self) -> usize {
        self.seen_seeds.len()
    }

    /// Number of equations still waiting for more chunks
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// Whether every chunk is resolved
    pub fn is_done(&self) -> bool {
        self.resolved == self.num_chunks
    }

    /// Apply one droplet.
    ///
    /// # Errors
    ///
    /// `StreamMismatch` when the droplet belongs to another stream and
    /// `InvalidDroplet` when its payload length differs from the stream's; the
    /// graph is left untouched in both cases.
    pub fn add_droplet(&mut self, droplet: Droplet) -> Result<DropletStatus> {
        if droplet.num_chunks != self.num_chunks {
            return Err(Error::StreamMismatch {
                expected: self.num_chunks,
                found: droplet.num_chunks,
            });
        }
        if droplet.data.len() != self.chunk_size {
            return Err(Error::InvalidDroplet(format!(
                "payload is {} bytes, stream uses {}",
                droplet.data.len(),
                self.chunk_size
            )));
        }
        if !self.seen_seeds.insert(droplet.seed) {
            return Ok(DropletStatus::Duplicate);
        }

        let before = self.resolved;

        if self.num_chunks == 1 {
            if self.chunks[0].is_none() {
                self.store_chunk(0, droplet.data);
            }
        } else {
            let indices = chunk_indices(&self.table, droplet.seed);
            let id = self.next_entry;
            self.next_entry += 1;
            self.entries.insert(
                id,
                Entry {
                    indices,
                    payload: droplet.data,
                },
            );
            self.propagate(id);
        }

        let solved = self.resolved - before;
        debug!(
            "droplet seed {} resolved {} chunk(s), {}/{} done, {} pending",
            droplet.seed,
            solved,
            self.resolved,
            self.num_chunks,
            self.entries.len()
        );

        Ok(if solved > 0 {
            DropletStatus::Resolved(solved)
        } else {
            DropletStatus::Stalled
        })
    }

    /// Resolve `start` and everything that cascades from it.
    fn propagate(&mut self, start: u64) {
        let mut queue = VecDeque::from([start]);

        while let Some(id) = queue.pop_front() {
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };

            // Collect first, then mutate: every known index is visited once
            let known: Vec<usize> = entry
                .indices
                .iter()
                .copied()
                .filter(|&i| self.chunks[i].is_some())
                .collect();
            for &i in &known {
                if let Some(chunk) = &self.chunks[i] {
                    xor_into(&mut entry.payload, chunk);
                }
            }
            entry.indices.retain(|i| !known.contains(i));

            match entry.indices.len() {
                0 => {
                    // Every chunk was already known; the equation adds nothing
                    self.entries.remove(&id);
                }
                1 => {
                    let index = entry.indices[0];
                    if let Some(entry) = self.entries.remove(&id) {
                        self.store_chunk(index, entry.payload);
                    }
                    for waiting in std::mem::take(&mut self.watchers[index]) {
                        if waiting != id && self.entries.contains_key(&waiting) {
                            queue.push_back(waiting);
                        }
                    }
                }
                _ => {
                    for &i in &entry.indices {
                        if !self.watchers[i].contains(&id) {
                            self.watchers[i].push(id);
                        }
                    }
                }
            }
        }
    }

    fn store_chunk(&mut self, index: usize, payload: Vec<u8>) {
        if self.chunks[index].is_none() {
            self.chunks[index] = Some(payload);
            self.resolved += 1;
        }
    }

    /// Reassembled payload with the padding stripped, once every chunk is known
    pub fn data(&self) -> Option<Vec<u8>> {
        if !self.is_done() {
            return None;
        }

        let mut out = Vec::with_capacity(self.num_chunks * self.chunk_size);
        for chunk in self.chunks.iter().flatten() {
            out.extend_from_slice(chunk);
        }
        out.truncate(out.len().saturating_sub(self.padding));
        Some(out)
    }
}

/// Progress snapshot of the active stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    /// Resolved chunks
    pub done: usize,
    /// Total chunks
    pub total: usize,
    /// Distinct droplets applied
    pub received: usize,
}

/// Decoder that follows whichever stream is currently arriving
#[derive(Debug, Default)]
pub struct Decoder {
    glass: Option<Glass>,
    tables: SolitonCache,
    limits: DropletLimits,
    resets: usize,
}

impl Decoder {
    /// Create a decoder with no active stream and the default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder that accepts droplets within `limits`
    pub fn with_limits(limits: DropletLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Apply one droplet, starting a new graph when the stream changes.
    ///
    /// # Errors
    ///
    /// `InvalidDroplet` for droplets outside the decoder's limits. They are
    /// rejected before any table or graph is built for them.
    pub fn add_droplet(&mut self, droplet: Droplet) -> Result<DropletStatus> {
        droplet.validate(&self.limits, None)?;

        if let Some(glass) = self.glass.as_ref() {
            if glass.num_chunks() != droplet.num_chunks {
                info!(
                    "new droplet stream ({} chunks, was {}), resetting decoder",
                    droplet.num_chunks,
                    glass.num_chunks()
                );
                self.resets += 1;
                self.glass = None;
            } else if glass.chunk_size() != droplet.data.len()
                && glass.received() == 1
                && !glass.is_done()
            {
                // Only the first droplet fixed the length, and it may be the bad one
                warn!(
                    "payload length {} disagrees with the first droplet ({}), restarting stream",
                    droplet.data.len(),
                    glass.chunk_size()
                );
                self.resets += 1;
                self.glass = None;
            }
        }

        if let Some(glass) = self.glass.as_mut() {
            return glass.add_droplet(droplet);
        }

        let table = self.tables.get(droplet.num_chunks)?;
        let glass = Glass::new(droplet, table)?;
        info!("receiving stream of {} chunks", glass.num_chunks());

        let status = match glass.chunks_done() {
            0 => DropletStatus::Stalled,
            n => DropletStatus::Resolved(n),
        };
        self.glass = Some(glass);
        Ok(status)
    }

    /// Active decode graph, if any droplet has been accepted
    pub fn glass(&self) -> Option<&Glass> {
        self.glass.as_ref()
    }

    /// Whether the active stream is fully decoded
    pub fn is_done(&self) -> bool {
        self.glass.as_ref().is_some_and(Glass::is_done)
    }

    /// Decoded payload of the active stream, once complete
    pub fn data(&self) -> Option<Vec<u8>> {
        self.glass.as_ref().and_then(Glass::data)
    }

    /// Progress of the active stream
    pub fn progress(&self) -> Progress {
        self.glass
            .as_ref()
            .map(|g| Progress {
                done: g.chunks_done(),
                total: g.num_chunks(),
                received: g.received(),
            })
            .unwrap_or_default()
    }

    /// How many times a stream switch discarded an unfinished graph
    pub fn resets(&self) -> usize {
        self.resets
    }

    /// Drop the active graph
    pub fn reset(&mut self) {
        self.glass = None;
    }

    /// Take the decoded payload and clear the active graph
    pub fn take_data(&mut self) -> Option<Vec<u8>> {
        let data = self.data()?;
        self.glass = None;
        Some(data)
    }
}
