//! Transition scripts: a line-based sequence of requirement operations run
//! against a topology.
//!
//! ```text
//! # apu asks for ddr, then suspends
//! update apu ddr access|context
//! schedule apu ddr context
//! commit apu swap
//! ```

use std::{fmt, str::FromStr};

use crate::domain::{Capabilities, ParseCapabilitiesError};

/// One operation of a transition script. Requesters and resources are named
/// as in the topology file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Stage a requirement for the requester's next commit point.
    Schedule {
        /// Requester name.
        requester: String,
        /// Resource name.
        resource: String,
        /// Capabilities to stage.
        caps: Capabilities,
    },

    /// Change a requirement immediately.
    Update {
        /// Requester name.
        requester: String,
        /// Resource name.
        resource: String,
        /// Capabilities to apply.
        caps: Capabilities,
    },

    /// Commit everything the requester has staged.
    Commit {
        /// Requester name.
        requester: String,
        /// Restage the default (or previous) requirements afterwards.
        swap: bool,
    },

    /// Drop everything the requester has staged.
    Cancel {
        /// Requester name.
        requester: String,
    },

    /// Stage the requester's default requirements.
    Defaults {
        /// Requester name.
        requester: String,
    },

    /// Release every resource the requester is using.
    Release {
        /// Requester name.
        requester: String,
    },

    /// Reset every requirement and rebuild the topology.
    Reset,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Schedule {
                requester,
                resource,
                caps,
            } => write!(f, "schedule {requester} {resource} {caps}"),
            Self::Update {
                requester,
                resource,
                caps,
            } => write!(f, "update {requester} {resource} {caps}"),
            Self::Commit {
                requester,
                swap: false,
            } => write!(f, "commit {requester}"),
            Self::Commit {
                requester,
                swap: true,
            } => write!(f, "commit {requester} swap"),
            Self::Cancel { requester } => write!(f, "cancel {requester}"),
            Self::Defaults { requester } => write!(f, "defaults {requester}"),
            Self::Release { requester } => write!(f, "release {requester}"),
            Self::Reset => write!(f, "reset"),
        }
    }
}

/// Errors parsing a single script line.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseStepError {
    /// The line does not start with a known operation.
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    /// The operation got the wrong number of arguments.
    #[error("'{operation}' expects {expected}")]
    Arguments {
        /// The operation.
        operation: &'static str,
        /// Its usage.
        expected: &'static str,
    },

    /// The capability argument is malformed.
    #[error(transparent)]
    Capabilities(#[from] ParseCapabilitiesError),
}

impl FromStr for Step {
    type Err = ParseStepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = s.split_whitespace().collect();
        let Some((&operation, args)) = words.split_first() else {
            return Err(ParseStepError::UnknownOperation(String::new()));
        };

        let usage = |operation: &'static str, expected: &'static str| ParseStepError::Arguments {
            operation,
            expected,
        };

        match (operation, args) {
            ("schedule", [requester, resource, caps]) => Ok(Self::Schedule {
                requester: (*requester).to_string(),
                resource: (*resource).to_string(),
                caps: caps.parse()?,
            }),
            ("schedule", _) => Err(usage("schedule", "<requester> <resource> <caps>")),

            ("update", [requester, resource, caps]) => Ok(Self::Update {
                requester: (*requester).to_string(),
                resource: (*resource).to_string(),
                caps: caps.parse()?,
            }),
            ("update", _) => Err(usage("update", "<requester> <resource> <caps>")),

            ("commit", [requester]) => Ok(Self::Commit {
                requester: (*requester).to_string(),
                swap: false,
            }),
            ("commit", [requester, "swap"]) => Ok(Self::Commit {
                requester: (*requester).to_string(),
                swap: true,
            }),
            ("commit", _) => Err(usage("commit", "<requester> [swap]")),

            ("cancel", [requester]) => Ok(Self::Cancel {
                requester: (*requester).to_string(),
            }),
            ("cancel", _) => Err(usage("cancel", "<requester>")),

            ("defaults", [requester]) => Ok(Self::Defaults {
                requester: (*requester).to_string(),
            }),
            ("defaults", _) => Err(usage("defaults", "<requester>")),

            ("release", [requester]) => Ok(Self::Release {
                requester: (*requester).to_string(),
            }),
            ("release", _) => Err(usage("release", "<requester>")),

            ("reset", []) => Ok(Self::Reset),
            ("reset", _) => Err(usage("reset", "no arguments")),

            (other, _) => Err(ParseStepError::UnknownOperation(other.to_string())),
        }
    }
}

/// A script line that could not be parsed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("line {line}: {source}")]
pub struct StepError {
    /// One-based line number.
    pub line: usize,
    /// What was wrong with it.
    #[source]
    pub source: ParseStepError,
}

/// Parses a whole script. Blank lines and `#` comments are skipped.
///
/// Returns each step with its one-based line number.
///
/// # Errors
///
/// Returns the first line that is not a valid step.
pub fn parse_script(script: &str) -> Result<Vec<(usize, Step)>, StepError> {
    script
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.split('#').next().unwrap_or_default().trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(line, text)| {
            text.parse()
                .map(|step| (line, step))
                .map_err(|source| StepError { line, source })
        })
        .collect()
}
