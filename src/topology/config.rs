use std::{io, path::Path};

use serde::{Deserialize, Serialize};

use crate::domain::{Capabilities, DEFAULT_CAPACITY};

/// The description of a power-management topology.
///
/// Lists every requester, every resource with the capability states it
/// defines, and every (requester, resource) pairing with its default
/// requirement. This is the fixed table the requirement arena is populated
/// from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct TopologyConfig {
    /// The number of requirement slots in the arena.
    ///
    /// Building a topology with more pairings than this fails.
    capacity: usize,

    /// The requesters (processors and other masters).
    pub requesters: Vec<RequesterConfig>,

    /// The resources (peripherals, memories, power domains).
    pub resources: Vec<ResourceConfig>,

    /// Which requester may use which resource.
    pub requirements: Vec<RequirementConfig>,
}

/// A requester entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterConfig {
    /// Unique name, used in scripts and diagnostics.
    pub name: String,
}

/// A resource entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Unique name, used in scripts and diagnostics.
    pub name: String,

    /// The capability states of the resource, lowest power first.
    pub states: Vec<StateConfig>,

    /// Simulate hardware that never acknowledges a state change.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub faulty: bool,
}

/// One capability state of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateConfig {
    /// Name of the state, for diagnostics.
    pub name: String,

    /// Everything the resource provides in this state.
    pub caps: Capabilities,
}

/// A (requester, resource) pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementConfig {
    /// Name of the requester.
    pub requester: String,

    /// Name of the resource.
    pub resource: String,

    /// What the requester needs from the resource when waking from a forced
    /// power down. Omitted when there is no such requirement.
    #[serde(default, skip_serializing_if = "is_none")]
    pub default: Capabilities,
}

/// Errors reading or writing a topology file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read topology file: {0}")]
    Read(#[source] io::Error),

    /// The file is not a valid topology.
    #[error("Failed to parse topology file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The topology could not be serialised.
    #[error("Failed to serialize topology: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The file could not be written.
    #[error("Failed to write topology file: {0}")]
    Write(#[source] io::Error),
}

impl TopologyConfig {
    /// Creates an empty topology with the given arena capacity.
    #[must_use]
    pub const fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            requesters: Vec::new(),
            resources: Vec::new(),
            requirements: Vec::new(),
        }
    }

    /// Loads the topology from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        Ok(toml::from_str(&content)?)
    }

    /// Saves the topology to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the topology cannot be serialized to TOML or if the
    /// file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(ConfigError::Write)
    }

    /// Returns the arena capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sets the arena capacity.
    pub const fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }
}

/// An example topology: an application processor cluster and a real-time
/// processor sharing memories and a USB controller.
impl Default for TopologyConfig {
    fn default() -> Self {
        let access = Capabilities::ACCESS;
        let context = Capabilities::CONTEXT;
        let wakeup = Capabilities::WAKEUP;

        let state = |name: &str, caps| StateConfig {
            name: name.to_string(),
            caps,
        };
        let memory = |name: &str| ResourceConfig {
            name: name.to_string(),
            states: vec![
                state("off", Capabilities::NONE),
                state("retention", context),
                state("on", access | context | wakeup),
            ],
            faulty: false,
        };
        let pair = |requester: &str, resource: &str, default| RequirementConfig {
            requester: requester.to_string(),
            resource: resource.to_string(),
            default,
        };

        Self {
            capacity: DEFAULT_CAPACITY,
            requesters: vec![
                RequesterConfig {
                    name: "apu".to_string(),
                },
                RequesterConfig {
                    name: "rpu0".to_string(),
                },
            ],
            resources: vec![
                memory("ddr"),
                memory("ocm"),
                memory("tcm0"),
                ResourceConfig {
                    name: "usb0".to_string(),
                    states: vec![
                        state("off", Capabilities::NONE),
                        state("on", access | wakeup),
                    ],
                    faulty: false,
                },
            ],
            requirements: vec![
                pair("apu", "ddr", access | context),
                pair("apu", "ocm", Capabilities::NONE),
                pair("apu", "usb0", Capabilities::NONE),
                pair("rpu0", "ddr", Capabilities::NONE),
                pair("rpu0", "ocm", Capabilities::NONE),
                pair("rpu0", "tcm0", access | context),
            ],
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_none(caps: &Capabilities) -> bool {
    caps.is_empty()
}

const fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

/// The serialized versions of the topology.
/// This allows the file format and the domain type to change independently.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_capacity")]
        capacity: usize,

        #[serde(default)]
        requesters: Vec<RequesterConfig>,

        #[serde(default)]
        resources: Vec<ResourceConfig>,

        #[serde(default)]
        requirements: Vec<RequirementConfig>,
    },
}

impl From<Versions> for TopologyConfig {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                capacity,
                requesters,
                resources,
                requirements,
            } => Self {
                capacity,
                requesters,
                resources,
                requirements,
            },
        }
    }
}

impl From<TopologyConfig> for Versions {
    fn from(config: TopologyConfig) -> Self {
        Self::V1 {
            capacity: config.capacity,
            requesters: config.requesters,
            resources: config.resources,
            requirements: config.requirements,
        }
    }
}
