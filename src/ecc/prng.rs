//! Deterministic seed-indexed pseudo-random generator.
//!
//! Droplets do not carry the list of chunks they combine. Both sides rebuild
//! that list from the droplet seed, so the generator has to produce the exact
//! same integers on every platform. It is a sine-based generator whose state
//! goes through a fixed decimal rounding step on every draw:
//!
//! ```text
//! x     = sin(state) * 100
//! frac  = round(x - floor(x), 8 decimals)
//! state = (floor(frac * 25214903917) + 11) mod 2147483647
//! out   = floor(frac * (max - min + 1) + min)
//! ```
//!
//! It has no cryptographic value whatsoever.

/// Seed used when the caller passes `0` or no seed at all
pub const DEFAULT_SEED: u64 = 1337;

/// Upper bound (inclusive) of the default draw range
pub const SEED_MAX: u64 = 2_147_483_647;

const MULTIPLIER: f64 = 25_214_903_917.0;
const INCREMENT: u64 = 11;
const MODULUS: u64 = 2_147_483_647;

/// Round to 8 decimal places exactly the way a correctly rounded decimal
/// conversion does (half to even on the exact binary value).
///
/// Scaling by `1e8` and calling `round` is not equivalent: the product picks up
/// its own rounding error and occasionally lands on the other side of a tie.
pub(crate) fn round8(value: f64) -> f64 {
    format!("{value:.8}").parse().unwrap_or(value)
}

/// Sine-based generator with an explicit, owned state.
#[derive(Debug, Clone, PartialEq)]
pub struct SeededRandom {
    state: u64,
}

impl SeededRandom {
    /// Create a generator. `0` falls back to [`DEFAULT_SEED`].
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { DEFAULT_SEED } else { seed },
        }
    }

    /// Create a generator from an optional seed.
    pub fn from_option(seed: Option<u64>) -> Self {
        Self::new(seed.unwrap_or(0))
    }

    /// Current internal state
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Advance the state and scale the rounded fraction onto `[min, max]`.
    ///
    /// A fraction that rounds up to exactly 1.0 yields `max + 1`.
    fn draw(&mut self, min: u64, max: u64) -> u64 {
        debug_assert!(min <= max);

        let x = (self.state as f64).sin() * 100.0;
        let frac = round8(x - x.floor());

        self.state = ((frac * MULTIPLIER).floor() as u64 + INCREMENT) % MODULUS;

        let span = (max - min + 1) as f64;
        (frac * span + min as f64).floor() as u64
    }

    /// Draw an integer in `[min, max]` and advance the state.
    pub fn next_in(&mut self, min: u64, max: u64) -> u64 {
        self.draw(min, max).min(max)
    }

    /// Draw the next droplet seed.
    ///
    /// Seeds are not clamped: a draw whose fraction rounds to 1.0 produces
    /// `SEED_MAX + 1`.
    pub fn next_seed(&mut self) -> u64 {
        self.draw(0, SEED_MAX)
    }
}

impl Default for SeededRandom {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}
