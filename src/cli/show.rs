use std::path::PathBuf;

use clap::Parser;
use pmreq::topology::Snapshot;
use tracing::instrument;

use super::{OutputFormat, terminal::Colorize};

#[derive(Debug, Parser)]
#[command(about = "Display every requirement and resource of a topology")]
pub struct Show {
    /// The topology file
    topology: PathBuf,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "pretty")]
    output: OutputFormat,
}

impl Show {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self) -> anyhow::Result<()> {
        let topology = super::load_topology(&self.topology)?;
        print_snapshot(&topology.snapshot(), self.output)
    }
}

/// Prints a snapshot in the requested format.
pub fn print_snapshot(snapshot: &Snapshot, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Pretty => {
            for line in render_pretty(snapshot) {
                println!("{line}");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(snapshot)?),
    }
    Ok(())
}

fn render_pretty(snapshot: &Snapshot) -> Vec<String> {
    let requester_width = column_width(snapshot.requirements.iter().map(|r| &r.requester), 9);
    let resource_width = column_width(
        snapshot
            .requirements
            .iter()
            .map(|r| &r.resource)
            .chain(snapshot.resources.iter().map(|r| &r.name)),
        8,
    );

    let mut lines = vec![
        format!(
            "{:<requester_width$}  {:<resource_width$}  {:>7}  {:>7}  {:>7}  IN USE",
            "REQUESTER", "RESOURCE", "CURRENT", "NEXT", "DEFAULT"
        )
        .dim(),
    ];

    for row in &snapshot.requirements {
        let line = format!(
            "{:<requester_width$}  {:<resource_width$}  {:>7}  {:>7}  {:>7}  {}",
            row.requester,
            row.resource,
            row.current.to_string(),
            row.next.to_string(),
            row.default.to_string(),
            if row.in_use { "yes" } else { "no" },
        );
        // staged but not committed yet
        if row.current == row.next {
            lines.push(line);
        } else {
            lines.push(line.warning());
        }
    }

    lines.push(String::new());
    lines.push(
        format!(
            "{:<resource_width$}  {:<10}  {:>8}  APPLIES",
            "RESOURCE", "STATE", "COMBINED"
        )
        .dim(),
    );
    for row in &snapshot.resources {
        lines.push(format!(
            "{:<resource_width$}  {:<10}  {:>8}  {}",
            row.name,
            row.state.as_deref().unwrap_or("-"),
            row.combined.to_string(),
            row.applies,
        ));
    }

    lines.push(String::new());
    lines.push(
        format!(
            "{} of {} requirement slots used",
            snapshot.requirements.len(),
            snapshot.capacity
        )
        .dim(),
    );

    lines
}

fn column_width<'a>(values: impl Iterator<Item = &'a String>, header: usize) -> usize {
    values.map(String::len).fold(header, usize::max)
}
