//! shardbase CLI entry point
//!
//! Parses arguments and dispatches to `cli::run`. The response (or the
//! error object) is printed by the command itself; main only maps failure
//! to a non-zero exit status.

use shardbase::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
