// SPDX-FileCopyrightText: 2025 Original python code: ruxi09/Fuzzer, fuzzer/generator.py
// SPDX-FileCopyrightText: 2025 Rust port/adaptation: dimacs-fuzz contributors
//
// SPDX-License-Identifier: MIT

//! Generators that synthesize complete DIMACS CNF test files from scratch.
//!
//! Each strategy produces a full file independent of any prior input. They
//! are chosen by [`crate::rng::Rng::weighted_choice`] under the fixed mix
//! `{Valid: 0.30, ValidSyntaxInvalidSemantics: 0.50, InvalidSyntax: 0.10,
//! Random: 0.10}`.

use crate::rng::{assert_weights_normalized, Rng};
use std::fmt::Write as _;

/// Categorical distribution over clause lengths, shared by generators and
/// mutators. 0 and 1 are sampled on purpose (P=0.005 each) to probe
/// solvers that skip arity checks on degenerate clauses.
const CLAUSE_LENGTH_DISTRIBUTION: [(u64, f64); 6] = [
    (0, 0.005),
    (1, 0.005),
    (2, 0.2475),
    (3, 0.2475),
    (4, 0.2475),
    (5, 0.2475),
];

pub fn random_clause_len(rng: &mut Rng) -> u64 {
    let (lens, weights): (Vec<u64>, Vec<f64>) = CLAUSE_LENGTH_DISTRIBUTION.iter().copied().unzip();
    *rng.weighted_choice(&lens, &weights)
}

#[derive(Clone, Copy, Debug)]
pub enum GeneratorStrategy {
    Valid,
    ValidSyntaxInvalidSemantics,
    InvalidSyntax,
    Random,
}

/// The fixed generator mix used by the fuzzing loop's generation phase.
pub const GENERATOR_POOL: [(GeneratorStrategy, f64); 4] = [
    (GeneratorStrategy::Valid, 0.30),
    (GeneratorStrategy::ValidSyntaxInvalidSemantics, 0.50),
    (GeneratorStrategy::InvalidSyntax, 0.10),
    (GeneratorStrategy::Random, 0.10),
];

pub fn assert_generator_pool_normalized() {
    let weights: Vec<f64> = GENERATOR_POOL.iter().map(|(_, w)| *w).collect();
    assert_weights_normalized(&weights);
}

/// Pick a generator strategy per the fixed mix and produce a test file's
/// bytes from scratch.
pub fn generate(rng: &mut Rng) -> String {
    let strategies: Vec<GeneratorStrategy> = GENERATOR_POOL.iter().map(|(s, _)| *s).collect();
    let weights: Vec<f64> = GENERATOR_POOL.iter().map(|(_, w)| *w).collect();
    let strategy = *rng.weighted_choice(&strategies, &weights);
    strategy.generate(rng)
}

impl GeneratorStrategy {
    pub fn generate(self, rng: &mut Rng) -> String {
        match self {
            GeneratorStrategy::Valid => valid(rng),
            GeneratorStrategy::InvalidSyntax => invalid_syntax(rng),
            GeneratorStrategy::ValidSyntaxInvalidSemantics => valid_syntax_invalid_semantics(rng),
            GeneratorStrategy::Random => random(rng),
        }
    }
}

fn random_clause_atoms(rng: &mut Rng, num_vars: i64) -> Vec<i64> {
    let len = random_clause_len(rng);
    (0..len).map(|_| rng.randint(-num_vars, num_vars)).collect()
}

/// Syntactically and semantically valid DIMACS CNF file.
fn valid(rng: &mut Rng) -> String {
    let num_vars = rng.randint(3, 4999) as i64;
    let num_clauses = rng.randint(3000, 9999);

    let mut out = String::new();
    let _ = writeln!(out, "p cnf {} {}", num_vars, num_clauses);
    for _ in 0..num_clauses {
        let clause = random_clause_atoms(rng, num_vars);
        let joined = clause
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "{} 0", joined);
    }
    out
}

/// Slightly syntactically invalid DIMACS CNF file: a fraction of clauses
/// are missing their trailing `0` terminator.
fn invalid_syntax(rng: &mut Rng) -> String {
    let num_vars = rng.randint(3, 4999);
    let num_clauses = rng.randint(3000, 9999);

    let mut out = String::new();
    let _ = writeln!(out, "p cnf {} {}", num_vars, num_clauses);
    for _ in 0..num_clauses {
        let clause = random_clause_atoms(rng, num_vars);
        let joined = clause
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&joined);
        if !rng.chance(0.3) {
            out.push_str(" 0");
        }
        out.push('\n');
    }
    out
}

const MAX_INT_32: i64 = 2_147_483_647;
const MIN_INT_32: i64 = -2_147_483_648;

fn generate_num_vars(rng: &mut Rng) -> i64 {
    rng.randint(3, 4999)
}

fn generate_num_clauses(rng: &mut Rng) -> i64 {
    rng.randint(3, 999)
}

fn generate_overflowed_int(rng: &mut Rng) -> i64 {
    if rng.chance(0.75) {
        rng.randint(MAX_INT_32 + 1, 2 * MAX_INT_32 - 1)
    } else {
        rng.randint(2 * MIN_INT_32, MIN_INT_32 - 2)
    }
}

/// Syntactically valid but semantically invalid DIMACS CNF file: the
/// declared header counts and the per-clause atom bounds are each
/// re-sampled independently at every point they're needed, so the header
/// routinely diverges from the actual content. This re-sampling is
/// intentional (it is how the original Python implementation behaves) and
/// must be preserved rather than "fixed" into a single consistent sample.
fn valid_syntax_invalid_semantics(rng: &mut Rng) -> String {
    let mut declared_num_vars = generate_num_vars(rng);
    if rng.chance(0.05) {
        declared_num_vars = generate_overflowed_int(rng);
    }
    let declared_num_clauses = generate_num_clauses(rng);

    let mut out = String::new();
    let _ = writeln!(out, "p cnf {} {}", declared_num_vars, declared_num_clauses);

    let actual_num_clauses = generate_num_clauses(rng);
    for _ in 0..actual_num_clauses {
        let clause_len = random_clause_len(rng);
        // Low and high bounds are each re-sampled independently per atom
        // (not shared), so the resulting range is usually asymmetric -- a
        // deliberately preserved quirk, not a symmetric `[-N, N]` draw.
        let clause: Vec<i64> = (0..clause_len)
            .map(|_| {
                let low = generate_num_vars(rng);
                let high = generate_num_vars(rng);
                rng.randint(-low, high)
            })
            .collect();
        let joined = clause
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "{} 0", joined);
    }
    out
}

/// Header and body are both random printable garbage.
fn random(rng: &mut Rng) -> String {
    let garbage_a = rng.printable_string(0, 5);
    let garbage_b = rng.printable_string(0, 5);

    let mut out = String::new();
    let _ = writeln!(out, "p cnf {} {}", garbage_a, garbage_b);

    let num_clauses = rng.randint(0, 99);
    for _ in 0..num_clauses {
        out.push_str(&rng.printable_string(0, 3));
        out.push(' ');
        if rng.chance(0.5) {
            out.push('0');
        }
        if rng.chance(0.85) {
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_weights_sum_to_one() {
        assert_generator_pool_normalized();
    }

    #[test]
    fn valid_generator_emits_well_formed_header() {
        let mut rng = Rng::new(1);
        let text = valid(&mut rng);
        let header = text.lines().next().unwrap();
        let tokens: Vec<&str> = header.split_whitespace().collect();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0], "p");
        assert_eq!(tokens[1], "cnf");
    }

    #[test]
    fn clause_length_zero_is_a_bare_terminator_line() {
        // With clause_len == 0 the joined atom list is empty, so the emitted
        // line is exactly " 0" (a space then the terminator).
        let clause: Vec<i64> = Vec::new();
        let joined = clause
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(format!("{} 0", joined), " 0");
    }

    #[test]
    fn overflowed_int_is_outside_32_bit_signed_range() {
        let mut rng = Rng::new(2);
        for _ in 0..200 {
            let v = generate_overflowed_int(&mut rng);
            assert!(v > MAX_INT_32 || v < MIN_INT_32);
        }
    }
}
