use std::path::PathBuf;

use pmreq::TopologyConfig;
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, clap::Parser)]
pub struct Init {
    /// Where to write the topology file
    #[arg(long, default_value = "topology.toml")]
    path: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

impl Init {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self) -> anyhow::Result<()> {
        if self.path.exists() && !self.force {
            anyhow::bail!(
                "{} already exists (use --force to overwrite it)",
                self.path.display()
            );
        }

        let config = TopologyConfig::default();
        config
            .save(&self.path)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", self.path.display()))?;

        println!(
            "{}",
            format!("✅ Wrote example topology to {}", self.path.display()).success()
        );
        println!();
        println!("Next steps:");
        println!("  pmreq show {}", self.path.display());
        println!("  pmreq run {} script.txt", self.path.display());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_loadable_topology() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("topology.toml");

        Init {
            path: path.clone(),
            force: false,
        }
        .run()
        .unwrap();

        assert_eq!(
            TopologyConfig::load(&path).unwrap(),
            TopologyConfig::default()
        );
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("topology.toml");
        std::fs::write(&path, "keep me").unwrap();

        let error = Init {
            path: path.clone(),
            force: false,
        }
        .run()
        .unwrap_err();

        assert!(error.to_string().contains("already exists"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me");

        Init { path, force: true }.run().unwrap();
    }
}
