// SPDX-FileCopyrightText: xorshift64 implementation from G. Marsaglia, "Xorshift RNGs," J. Stat. Soft., vol. 8, no. 14, pp. 1-6, Jul. 2003, doi: 10.18637/jss.v008.i14.
//
// SPDX-FileCopyrightText: 2025 Choices and bisect implementation translated from Python; original code: Python Software Foundation
// SPDX-License-Identifier: PSF-2.0
//
// SPDX-FileCopyrightText: 2025 Rest of implementation and scaffolding: dimacs-fuzz contributors
// SPDX-License-Identifier: MIT

//! Seedable, deterministic pseudorandom source.
//!
//! Every randomized decision the fuzzer makes is drawn from a single `Rng`
//! instance created once at startup from the CLI seed, so that given the
//! same seed and the same SUT/oracle behavior the sequence of generated
//! and mutated bytes is reproducible byte-for-byte. We deliberately do not
//! use the `rand` crate's thread-local entropy sources here: determinism
//! is a hard requirement of this fuzzer, not an optimization.

/// digits + ascii_letters + punctuation + whitespace, in that order --
/// byte-for-byte the same 100 characters as Python's `string.printable`.
const PYTHON_STRING_PRINTABLE: &[u8] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~ \t\n\r\x0b\x0c";

#[allow(dead_code)]
pub struct Rng {
    pub seed: u64,
    state: u64,
}

#[allow(dead_code)]
impl Rng {
    pub const DEFAULT_SEED: u64 = 42;

    /// Create a new PRNG from a seed value. xorshift64 has a fixed point at
    /// state == 0, so seed 0 is nudged away from it.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            state: seed | 1,
        }
    }

    /// Create new random number and advance the internal state.
    pub fn next(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Create random float in [0,1.0)
    pub fn f64(&mut self) -> f64 {
        (self.next() as f64) / (u64::MAX as f64 + 1.0)
    }

    /// Create random number in given range [min,max).
    pub fn range(&mut self, min: u64, max: u64) -> u64 {
        assert!(min < max, "{} >= {}", min, max);
        let range = max - min;
        min + (self.next() % range)
    }

    /// Create random number in range [0,max).
    pub fn int(&mut self, max: u64) -> u64 {
        self.range(0, max)
    }

    /// Signed integer in [min, max], inclusive on both ends (matching
    /// Python's `random.randint`/`random.randrange` depending on call site).
    pub fn randint(&mut self, min: i64, max: i64) -> i64 {
        assert!(min <= max, "{} > {}", min, max);
        let span = (max - min) as u64 + 1;
        min + self.range(0, span) as i64
    }

    /// Random boolean, true with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.f64() < p
    }

    /// Uniform draw over the same 100-character alphabet as Python's
    /// `string.printable`: digits, ASCII letters, punctuation, space, and
    /// the whitespace control characters (`\t \n \r \x0b \x0c`). The
    /// whitespace tail matters -- it's how the `Random` generator injects
    /// stray newlines into header tokens and clause blobs.
    pub fn printable_char(&mut self) -> char {
        let idx = self.int(PYTHON_STRING_PRINTABLE.len() as u64) as usize;
        PYTHON_STRING_PRINTABLE[idx] as char
    }

    /// Create a random printable ascii string of length in [min_len, max_len].
    pub fn printable_string(&mut self, min_len: u64, max_len: u64) -> String {
        let len = self.range(min_len, max_len + 1);
        (0..len).map(|_| self.printable_char()).collect()
    }

    /// Randomly choose an element of a slice.
    pub fn choice<'a, T>(&mut self, v: &'a [T]) -> &'a T {
        let pos = self.int(v.len() as u64) as usize;
        &v[pos]
    }

    /// Randomly choose one element from a slice given weights/probabilities.
    /// `weights` should sum to 1.0; callers assert this once at
    /// pool-construction time via [`assert_weights_normalized`] rather than
    /// on every draw.
    ///
    /// Translated from https://github.com/python/cpython/blob/9634085af3670b1eb654e3c7820aca66f358f39f/Lib/random.py#L460
    /// and https://github.com/python/cpython/blob/9634085af3670b1eb654e3c7820aca66f358f39f/Lib/bisect.py#L21
    pub fn weighted_choice<'a, T>(&mut self, v: &'a [T], weights: &[f64]) -> &'a T {
        assert!(v.len() == weights.len(), "{} != {}", v.len(), weights.len());
        let mut cumulative_weights = Vec::new();
        let mut tmp = 0.0;
        for w in weights {
            assert!(*w >= 0.0, "Weight must be non-negative {}", w);
            tmp += w;
            cumulative_weights.push(tmp);
        }
        self.choice_cw(v, &cumulative_weights)
    }

    fn choice_cw<'a, T>(&mut self, v: &'a [T], cumulative_weights: &[f64]) -> &'a T {
        let total = *cumulative_weights.last().unwrap();
        assert!(total > 0.0, "Total weight must be non-zero: {}", total);

        let pos = bisect(cumulative_weights, self.f64() * total);
        &v[pos]
    }
}

/// Assert that a set of strategy-pool weights sums to 1.0 within floating
/// tolerance, matching the original Python's `math.isclose(sum(weights), 1.0)`
/// checks in `TestFileGenerator`/`TestFileMutator`.
pub fn assert_weights_normalized(weights: &[f64]) {
    let total: f64 = weights.iter().sum();
    assert!(
        (total - 1.0).abs() < 1e-9,
        "strategy weights must sum to 1.0, got {total}"
    );
}

fn bisect(v: &[f64], x: f64) -> usize {
    let (mut lo, mut hi) = (0usize, v.len() - 1);
    while lo < hi {
        let mid = (lo + hi) / 2;
        if x < v[mid] {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo
}
