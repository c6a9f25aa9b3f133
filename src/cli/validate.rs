use std::path::PathBuf;

use clap::Parser;
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Check that a topology file builds and report arena usage")]
pub struct Validate {
    /// The topology file
    topology: PathBuf,

    /// Suppress all output except errors
    #[arg(long, short)]
    quiet: bool,
}

impl Validate {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self) -> anyhow::Result<()> {
        let topology = super::load_topology(&self.topology)?;
        if self.quiet {
            return Ok(());
        }

        let requirements = topology.requirements();
        let used = requirements.len();
        let capacity = requirements.capacity();

        println!(
            "{}",
            format!("✅ {} is valid", self.topology.display()).success()
        );
        println!(
            "  {} requesters, {} resources",
            requirements.requesters().count(),
            requirements.resources().count()
        );

        let usage = format!("  {used} of {capacity} requirement slots used");
        if used == capacity {
            // a rebuild still fits, but nothing can be added
            println!("{}", usage.warning());
        } else {
            println!("{}", usage.dim());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pmreq::TopologyConfig;

    use super::*;

    #[test]
    fn accepts_default_topology() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("topology.toml");
        TopologyConfig::default().save(&path).unwrap();

        Validate {
            topology: path,
            quiet: true,
        }
        .run()
        .unwrap();
    }

    #[test]
    fn rejects_topology_over_capacity() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("topology.toml");
        let mut config = TopologyConfig::default();
        config.set_capacity(2);
        config.save(&path).unwrap();

        let error = Validate {
            topology: path,
            quiet: true,
        }
        .run()
        .unwrap_err();

        assert!(error.to_string().contains("requirement arena is full"));
    }
}
