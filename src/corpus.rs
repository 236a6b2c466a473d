// SPDX-FileCopyrightText: 2025 Original python code: ruxi09/Fuzzer, fuzzer/fuzzer.py (interesting_cases/work_queue)
// SPDX-FileCopyrightText: 2025 Rust port/adaptation: dimacs-fuzz contributors
//
// SPDX-License-Identifier: MIT

//! The corpus: a per-crash-signature max-heap over coverage, plus a FIFO
//! work queue of inputs pending mutation.

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::path::PathBuf;

use crate::oracle::CrashSignature;

/// The outcome of one SUT invocation that *did* crash (runs that don't
/// crash are discarded before a `RunOutput` is ever constructed).
#[derive(Clone, Debug)]
pub struct RunOutput {
    pub test_file: PathBuf,
    pub signature: CrashSignature,
    pub stderr: Vec<u8>,
    pub coverage: f64,
}

impl PartialEq for RunOutput {
    fn eq(&self, other: &Self) -> bool {
        self.test_file == other.test_file
            && self.signature == other.signature
            && self.stderr == other.stderr
            && self.coverage == other.coverage
    }
}
impl Eq for RunOutput {}

// Ordered by coverage only, ascending -- `BinaryHeap` is a max-heap, so
// the highest-coverage `RunOutput` for a signature pops first.
impl PartialOrd for RunOutput {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for RunOutput {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.coverage.total_cmp(&other.coverage)
    }
}

/// Decision table for whether a mutation's before/after pair should be
/// re-enqueued onto the work queue. `new_signature` must reflect whether
/// `after.signature` was present in the corpus *before* this call -- see
/// DESIGN.md for why this check is resolved before mutating corpus state.
pub fn is_interesting_mutation(
    new_signature: bool,
    before: &RunOutput,
    after: &RunOutput,
) -> (bool, bool) {
    if new_signature {
        (true, true)
    } else if after.signature != before.signature {
        (true, true)
    } else if after.coverage > before.coverage {
        (true, false)
    } else {
        (false, true)
    }
}

#[derive(Default)]
pub struct Corpus {
    interesting_cases: HashMap<CrashSignature, BinaryHeap<RunOutput>>,
    work_queue: VecDeque<RunOutput>,
    /// Order in which signatures were first sighted, for a deterministic
    /// and reproducible round-robin at shutdown instead of relying on
    /// hash-map iteration order.
    signature_order: Vec<CrashSignature>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_heap(&mut self, signature: &CrashSignature) -> bool {
        if self.interesting_cases.contains_key(signature) {
            false
        } else {
            self.interesting_cases
                .insert(signature.clone(), BinaryHeap::new());
            self.signature_order.push(signature.clone());
            true
        }
    }

    /// Record a run discovered outside of mutation (provided-inputs phase
    /// or generation phase): a newly-discovered signature unconditionally
    /// enqueues the run for future mutation, in addition to its heap push.
    pub fn record(&mut self, run_output: RunOutput) -> bool {
        let is_new = self.ensure_heap(&run_output.signature);
        if is_new {
            self.work_queue.push_back(run_output.clone());
        }
        self.interesting_cases
            .get_mut(&run_output.signature)
            .unwrap()
            .push(run_output);
        is_new
    }

    /// Record a run discovered during mutation: applies
    /// [`is_interesting_mutation`] to decide whether `before`/`after`
    /// should be re-enqueued, then pushes `after` onto its signature's
    /// heap.
    pub fn record_mutation(&mut self, before: RunOutput, after: RunOutput) {
        let is_new = self.ensure_heap(&after.signature);
        let (keep_after, keep_before) = is_interesting_mutation(is_new, &before, &after);
        if keep_after {
            self.work_queue.push_back(after.clone());
        }
        if keep_before {
            self.work_queue.push_back(before);
        }
        self.interesting_cases
            .get_mut(&after.signature)
            .unwrap()
            .push(after);
    }

    pub fn pop_work(&mut self) -> Option<RunOutput> {
        self.work_queue.pop_front()
    }

    pub fn work_queue_len(&self) -> usize {
        self.work_queue.len()
    }

    pub fn total_crashes(&self) -> usize {
        self.interesting_cases.values().map(BinaryHeap::len).sum()
    }

    pub fn distinct_signatures(&self) -> usize {
        self.interesting_cases.len()
    }

    /// Round-robin over signatures (in first-sighted order) popping one
    /// best (highest-coverage) element per signature, until `to_save`
    /// elements have been collected or the corpus is exhausted.
    pub fn select_for_retention(&mut self, max_saved: usize) -> Vec<RunOutput> {
        let to_save = max_saved.min(self.total_crashes());
        let mut kept = Vec::with_capacity(to_save);
        while kept.len() < to_save {
            for signature in &self.signature_order {
                if kept.len() == to_save {
                    break;
                }
                if let Some(heap) = self.interesting_cases.get_mut(signature) {
                    if let Some(run_output) = heap.pop() {
                        kept.push(run_output);
                    }
                }
            }
        }
        kept
    }
}
