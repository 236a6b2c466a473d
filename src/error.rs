// SPDX-License-Identifier: MIT

//! The only errors this crate treats as fatal: misconfiguration discovered
//! at startup. Everything encountered once the fuzzing loop is running is
//! logged and swallowed instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FuzzerError {
    #[error("failed to create output directory {path}: {source}")]
    OutputDirUnusable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to scan provided-inputs directory {path}: {source}")]
    ProvidedInputsDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
