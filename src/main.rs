//! tamiz CLI - filtered data loading from the command line.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::process::ExitCode;

fn main() -> ExitCode {
    tamiz::cli::run()
}
