#![forbid(unsafe_code)]

//! tpd — telemetry post-stage daemon CLI entry point.

use clap::Parser;
use telemetry_post_daemon::cli::{self, Cli};

fn main() {
    let args = Cli::parse();
    if let Err(e) = cli::run(&args) {
        eprintln!("tpd: {e}");
        std::process::exit(1);
    }
}
