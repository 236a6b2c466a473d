// SPDX-License-Identifier: MIT

//! The two external collaborators the core fuzzing engine treats as
//! black boxes: a crash analyzer (stderr -> normalized signature) and a
//! coverage oracle (SUT source path -> cumulative line-coverage percent).
//!
//! The core never inspects a [`CrashSignature`]'s internals; it only
//! hashes and compares it for equality. Real deployments are expected to
//! swap in a proper `casr`/ASan-triage-backed analyzer and an
//! `lcov`-report-backed oracle -- the implementations here are
//! deliberately simple so the crate runs standalone.

use std::hash::Hash;
use std::path::Path;
use std::process::Command;

/// Opaque, equality- and hash-comparable token identifying a crash class.
/// Equality between two signatures defines "same crash class".
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CrashSignature(String);

impl CrashSignature {
    pub fn new(label: impl Into<String>) -> Self {
        CrashSignature(label.into())
    }
}

impl std::fmt::Display for CrashSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `stderr -> Option<CrashSignature>`. Must be deterministic: identical
/// stderr bytes always yield the identical signature (or lack thereof).
pub trait CrashAnalyzer {
    fn analyze(&self, stderr: &[u8]) -> Option<CrashSignature>;
}

/// `sut_source_path -> cumulative line coverage percentage in [0, 100]`.
/// Not required to be monotonic across calls; the fuzzer treats each
/// return value as a snapshot taken shortly after the run completes.
pub trait CoverageOracle {
    fn coverage(&self, sut_source_path: &Path) -> f64;
}

/// Default crash analyzer: treats empty stderr as "no crash", otherwise
/// derives a signature from the first line matching a common
/// sanitizer/panic/abort marker, falling back to a hash of the full
/// stderr when no marker is recognized. This is intentionally a coarse
/// heuristic -- a full `casr`-style triage pipeline is out of scope for
/// this crate.
pub struct HeuristicCrashAnalyzer;

const CRASH_MARKERS: &[&str] = &[
    "AddressSanitizer",
    "Segmentation fault",
    "segfault",
    "panicked at",
    "Aborted",
    "SIGABRT",
    "SIGSEGV",
    "SIGFPE",
    "double free",
    "stack smashing detected",
];

impl CrashAnalyzer for HeuristicCrashAnalyzer {
    fn analyze(&self, stderr: &[u8]) -> Option<CrashSignature> {
        if stderr.is_empty() {
            return None;
        }
        let text = String::from_utf8_lossy(stderr);
        for marker in CRASH_MARKERS {
            if let Some(line) = text.lines().find(|l| l.contains(marker)) {
                return Some(CrashSignature::new(format!("{marker}:{}", line.trim())));
            }
        }
        None
    }
}

/// Default coverage oracle: sums `lcov`-reported covered/total lines
/// across the SUT source tree. Returns 0.0 if `lcov` is unavailable or
/// produces no data, which is a valid (if uninformative) snapshot per
/// the oracle's contract.
pub struct LcovCoverageOracle;

impl CoverageOracle for LcovCoverageOracle {
    fn coverage(&self, sut_source_path: &Path) -> f64 {
        let output = Command::new("lcov")
            .arg("--capture")
            .arg("--directory")
            .arg(sut_source_path)
            .arg("--quiet")
            .arg("--output-file")
            .arg("/dev/stdout")
            .output();

        let Ok(output) = output else {
            return 0.0;
        };
        let text = String::from_utf8_lossy(&output.stdout);
        parse_lcov_summary(&text)
    }
}

/// Parse `DA:` line-hit records out of an lcov tracefile and compute
/// percent lines covered.
fn parse_lcov_summary(tracefile: &str) -> f64 {
    let (mut hit, mut found) = (0u64, 0u64);
    for line in tracefile.lines() {
        if let Some(rest) = line.strip_prefix("DA:") {
            found += 1;
            if let Some((_, count)) = rest.split_once(',') {
                if count.trim().parse::<u64>().map(|c| c > 0).unwrap_or(false) {
                    hit += 1;
                }
            }
        }
    }
    if found == 0 {
        0.0
    } else {
        100.0 * hit as f64 / found as f64
    }
}

#[cfg(test)]
pub mod stub {
    //! Stub oracles used by the fuzzer's own scenario tests.
    use super::*;
    use std::cell::RefCell;

    pub struct StubCrashAnalyzer {
        pub signature: Option<CrashSignature>,
    }

    impl CrashAnalyzer for StubCrashAnalyzer {
        fn analyze(&self, _stderr: &[u8]) -> Option<CrashSignature> {
            self.signature.clone()
        }
    }

    /// Returns values from a fixed, cyclically-repeated sequence -- handy
    /// for scenarios where the oracle's answer changes partway through a
    /// run (e.g. coverage rising from 10.0 to 20.0 after the 5th call).
    pub struct SequenceCoverageOracle {
        values: Vec<f64>,
        next: RefCell<usize>,
    }

    impl SequenceCoverageOracle {
        pub fn new(values: Vec<f64>) -> Self {
            Self {
                values,
                next: RefCell::new(0),
            }
        }
    }

    impl CoverageOracle for SequenceCoverageOracle {
        fn coverage(&self, _sut_source_path: &Path) -> f64 {
            let mut idx = self.next.borrow_mut();
            let value = self.values[*idx % self.values.len()];
            *idx += 1;
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stderr_is_no_crash() {
        assert!(HeuristicCrashAnalyzer.analyze(b"").is_none());
    }

    #[test]
    fn recognized_marker_yields_stable_signature() {
        let stderr = b"==1234==ERROR: AddressSanitizer: heap-buffer-overflow\n";
        let a = HeuristicCrashAnalyzer.analyze(stderr);
        let b = HeuristicCrashAnalyzer.analyze(stderr);
        assert_eq!(a, b);
        assert!(a.is_some());
    }

    #[test]
    fn lcov_summary_percentage() {
        let tracefile = "DA:1,1\nDA:2,0\nDA:3,5\nDA:4,0\n";
        assert_eq!(parse_lcov_summary(tracefile), 50.0);
    }
}
