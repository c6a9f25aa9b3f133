use std::path::Path;

mod init;
mod run;
mod show;
mod terminal;
mod validate;

use clap::ArgAction;
use pmreq::{Topology, TopologyConfig};
use tracing::instrument;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);
        self.command.run()
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Write an example topology file
    Init(init::Init),

    /// Check that a topology file builds
    Validate(validate::Validate),

    /// Show every requirement and resource of a topology
    Show(show::Show),

    /// Run a transition script against a topology
    ///
    /// Each line of the script is one operation (schedule, update, commit,
    /// cancel, defaults, release, reset). Execution stops at the first
    /// failing step.
    Run(run::Run),
}

impl Command {
    fn run(self) -> anyhow::Result<()> {
        match self {
            Self::Init(command) => command.run()?,
            Self::Validate(command) => command.run()?,
            Self::Show(command) => command.run()?,
            Self::Run(command) => command.run()?,
        }
        Ok(())
    }
}

/// How `show` and `run` print the topology table.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

/// Loads and builds the topology at `path`.
#[instrument(level = "debug")]
fn load_topology(path: &Path) -> anyhow::Result<Topology> {
    let config = TopologyConfig::load(path)?;
    let topology = Topology::build(&config)
        .map_err(|e| anyhow::anyhow!("Invalid topology {}: {e}", path.display()))?;
    Ok(topology)
}
