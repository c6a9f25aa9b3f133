use std::path::PathBuf;

use clap::Parser;
use pmreq::topology::parse_script;
use tracing::instrument;

use super::{OutputFormat, show::print_snapshot, terminal::Colorize};

#[derive(Debug, Parser)]
#[command(about = "Run a transition script against a topology")]
pub struct Run {
    /// The topology file
    topology: PathBuf,

    /// The transition script
    script: PathBuf,

    /// Output format of the final table
    #[arg(long, value_name = "FORMAT", default_value = "pretty")]
    output: OutputFormat,

    /// Don't print each step as it runs
    #[arg(long, short)]
    quiet: bool,
}

impl Run {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self) -> anyhow::Result<()> {
        let mut topology = super::load_topology(&self.topology)?;

        let script = std::fs::read_to_string(&self.script).map_err(|e| {
            anyhow::anyhow!("Failed to read script {}: {e}", self.script.display())
        })?;
        let steps = parse_script(&script)
            .map_err(|e| anyhow::anyhow!("{}: {e}", self.script.display()))?;

        for (line, step) in &steps {
            if let Err(e) = topology.execute(step) {
                eprintln!("{}", format!("✗ {line:>3}: {step}").failure());
                print_snapshot(&topology.snapshot(), self.output)?;
                anyhow::bail!("{}:{line}: {e}", self.script.display());
            }
            if !self.quiet {
                println!("{}", format!("✓ {line:>3}: {step}").success());
            }
        }

        if !self.quiet {
            println!();
        }
        print_snapshot(&topology.snapshot(), self.output)
    }
}

#[cfg(test)]
mod tests {
    use pmreq::TopologyConfig;

    use super::*;

    fn setup(script: &str) -> (tempfile::TempDir, Run) {
        let tmp = tempfile::tempdir().unwrap();
        let topology = tmp.path().join("topology.toml");
        let script_path = tmp.path().join("script.txt");
        TopologyConfig::default().save(&topology).unwrap();
        std::fs::write(&script_path, script).unwrap();

        let run = Run {
            topology,
            script: script_path,
            output: OutputFormat::Json,
            quiet: true,
        };
        (tmp, run)
    }

    #[test]
    fn runs_script_to_completion() {
        let (_tmp, run) = setup(
            "# suspend with a wake-up source\nupdate apu ddr access|context\nschedule apu usb0 \
             wakeup\ncommit apu swap\n",
        );

        run.run().unwrap();
    }

    #[test]
    fn stops_at_first_failing_step() {
        let (_tmp, run) = setup("update apu ddr access\nupdate apu tcm0 access\nreset\n");

        let error = run.run().unwrap_err();

        assert!(error.to_string().ends_with(":2: 'apu' has no requirement on 'tcm0'"));
    }

    #[test]
    fn reports_parse_errors_with_line() {
        let (_tmp, run) = setup("commit apu\nhibernate apu\n");

        let error = run.run().unwrap_err();

        assert!(error.to_string().contains("line 2: unknown operation 'hibernate'"));
    }
}
