//! `pmreq`: build power-management topologies and drive their requirements
//! from the command line.

mod cli;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    cli::Cli::parse().run()
}
