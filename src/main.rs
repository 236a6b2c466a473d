// SPDX-FileCopyrightText: 2025 Original python code: ruxi09/Fuzzer, fuzzer/fuzzer.py (main)
// SPDX-FileCopyrightText: 2025 Rust port/adaptation: dimacs-fuzz contributors
//
// SPDX-License-Identifier: MIT

mod corpus;
mod dimacs;
mod error;
mod fuzzer;
mod mutation;
mod oracle;
mod rng;
mod runner;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use log::info;

use rng::Rng;

/// A coverage-guided, crash-seeking black-box fuzzer for DIMACS-CNF-consuming
/// SAT solvers.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Directory containing the system under test, expected to hold a
    /// `runsat.sh` entry point.
    sut_source_path: PathBuf,

    /// Directory of `.cnf` seed files to run once before randomized fuzzing
    /// begins.
    provided_inputs_dir: PathBuf,

    /// PRNG seed; fixing this makes a run byte-for-byte reproducible.
    /// Positional and optional, per the original tool's flagless CLI.
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        // The "termination" feature makes this also catch SIGTERM (not just
        // SIGINT) on Unix, which is how a 30-minute grading harness signals
        // shutdown. No corpus access here: just flip the flag and let the
        // main loop notice and unwind on its own.
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })?;
    }

    let seed = cli.seed.unwrap_or(Rng::DEFAULT_SEED);
    info!("Starting up with seed {seed}");

    let mut fuzzer = fuzzer::Fuzzer::new_default(
        cli.sut_source_path,
        cli.provided_inputs_dir,
        seed,
        running,
    )?;

    fuzzer.run();
    fuzzer.shutdown();

    Ok(())
}
