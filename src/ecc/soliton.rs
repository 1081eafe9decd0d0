//! Robust soliton degree distribution.
//!
//! The table built here is the cumulative form of a truncated robust soliton
//! distribution. Index `i` of the table stands for degree `i + 1`. The
//! encoder and the decoder build it independently from `K` alone, so every
//! floating point step below is performed in a fixed order and rounded to 8
//! decimals at the end: two builds for the same `K` must agree bit for bit.

use crate::ecc::prng::round8;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Spike scale of the robust soliton distribution
pub const SOLITON_C: f64 = 0.05;

/// Failure probability bound of the robust soliton distribution
pub const SOLITON_DELTA: f64 = 0.05;

/// Cumulative robust soliton table for a fixed block count.
#[derive(Debug, Clone, PartialEq)]
pub struct RobustSoliton {
    k: usize,
    cumulative: Vec<f64>,
}

impl RobustSoliton {
    /// Build the table for `k` source chunks.
    pub fn new(k: usize) -> Result<Self> {
        match k {
            0 => Err(Error::InvalidInput(
                "soliton table needs at least one chunk".to_string(),
            )),
            // A single chunk is always sent verbatim
            1 => Ok(Self {
                k,
                cumulative: vec![1.0],
            }),
            _ => Ok(Self {
                k,
                cumulative: robust_soliton_table(k),
            }),
        }
    }

    /// Number of source chunks this table was built for
    pub fn k(&self) -> usize {
        self.k
    }

    /// Largest degree the table can produce
    pub fn max_degree(&self) -> usize {
        self.cumulative.len()
    }

    /// Cumulative probabilities, one per degree
    pub fn cumulative(&self) -> &[f64] {
        &self.cumulative
    }

    /// Map a uniform draw in `[0, 1]` to a degree.
    ///
    /// Picks the smallest degree whose cumulative probability reaches `u`. The
    /// last entry can round to just below a draw of `1.0`; the largest degree
    /// covers that case.
    pub fn degree_for(&self, u: f64) -> usize {
        self.cumulative
            .iter()
            .position(|&p| p >= u)
            .map_or(self.cumulative.len(), |j| j + 1)
    }
}

/// Compute the truncated cumulative robust soliton table for `k >= 2`.
#[allow(clippy::needless_range_loop)]
fn robust_soliton_table(k: usize) -> Vec<f64> {
    let kf = k as f64;

    // Ideal soliton
    let mut dist = vec![0.0; k];
    dist[0] = 1.0 / kf;
    for (i, d) in dist.iter_mut().enumerate().skip(1) {
        *d = 1.0 / (i * (i + 1)) as f64;
    }

    // Spike parameters
    let r = SOLITON_C * (kf / SOLITON_DELTA).ln() * kf.sqrt();
    let degree_max = ((kf / r).round_ties_even() as usize).max(2).min(k);

    let mut tau = vec![0.0; degree_max];
    for i in 0..degree_max - 1 {
        tau[i] = r / ((i + 1) * k) as f64;
    }
    tau[degree_max - 1] = r * (r / SOLITON_DELTA).ln() / kf;

    for (d, t) in dist.iter_mut().zip(tau.iter()) {
        *d += t;
    }

    let sum: f64 = dist.iter().sum();
    for d in dist.iter_mut() {
        *d /= sum;
    }

    // Drop the tail of negligible degrees
    let threshold = 0.1 / kf;
    let keep = dist
        .iter()
        .rposition(|&p| p > threshold)
        .map_or(1, |i| i + 1);
    dist.truncate(keep);

    let kept: f64 = dist.iter().sum();
    let scale = 1.0 / kept;

    let mut running_sum = 0.0;
    for d in dist.iter_mut() {
        running_sum += *d * scale;
        *d = round8(running_sum);
    }

    dist
}

/// Per-`K` memo of soliton tables.
///
/// Building a table is linear in `K`; a receiver that hops between streams
/// keeps one cache and hands the shared table to each new decode graph.
#[derive(Debug, Default)]
pub struct SolitonCache {
    tables: HashMap<usize, Arc<RobustSoliton>>,
}

impl SolitonCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the table for `k`, building it on first use.
    pub fn get(&mut self, k: usize) -> Result<Arc<RobustSoliton>> {
        if let Some(table) = self.tables.get(&k) {
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(RobustSoliton::new(k)?);
        self.tables.insert(k, Arc::clone(&table));
        Ok(table)
    }

    /// Number of distinct `K` values cached
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether nothing has been cached yet
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
