use std::process;

use clap::Parser;

use fragorb::interfaces::cli::{run, Cli};

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        eprintln!("fragorb: {err:#}");
        process::exit(1);
    }
}
