//! assetpipe - Command-line asset pipeline for static sites

use std::process::ExitCode;

use assetpipe::cli;

fn main() -> ExitCode {
    cli::run()
}
