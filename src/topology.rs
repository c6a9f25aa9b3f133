//! A complete topology: requirements built from a [`TopologyConfig`], driven
//! against [`SimulatedResources`].
//!
//! [`Topology`] is what firmware would hold at run time. It owns the
//! requirement context, maps names from files and scripts onto ids, and
//! remembers the configured pairings so the whole thing can be reinitialised.

use std::collections::BTreeMap;

use non_empty_string::NonEmptyString;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::domain::{
    Capabilities, Error, RequesterId, RequirementId, Requirements, ResourceId, ResourceLayer,
};

mod config;
pub use config::{
    ConfigError, RequesterConfig, RequirementConfig, ResourceConfig, StateConfig, TopologyConfig,
};

mod script;
pub use script::{ParseStepError, Step, StepError, parse_script};

mod simulated;
pub use simulated::{SimulatedResources, State};

/// Errors building a topology from its configuration.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The arena capacity is larger than can be indexed or allocated.
    #[error("arena capacity {0} is too large")]
    Capacity(usize),

    /// A requester or resource has an empty name.
    #[error("a {0} has an empty name")]
    EmptyName(&'static str),

    /// Two requesters, or two resources, share a name.
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName {
        /// "requester" or "resource".
        kind: &'static str,
        /// The repeated name.
        name: String,
    },

    /// A resource declares no capability state.
    #[error("resource '{0}' has no states")]
    NoStates(String),

    /// A pairing names a requester that is not declared.
    #[error("unknown requester '{0}'")]
    UnknownRequester(String),

    /// A pairing names a resource that is not declared.
    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    /// The same pairing is listed twice.
    #[error("requirement of '{requester}' on '{resource}' is listed more than once")]
    DuplicateRequirement {
        /// Requester name.
        requester: String,
        /// Resource name.
        resource: String,
    },

    /// A default requirement no state of the resource provides.
    #[error("no state of '{resource}' provides the default {default} of '{requester}'")]
    UnsupportedDefault {
        /// Requester name.
        requester: String,
        /// Resource name.
        resource: String,
        /// The configured default.
        default: Capabilities,
    },

    /// The requirement layer refused a pairing, typically because the arena
    /// is too small.
    #[error(transparent)]
    Requirements(#[from] Error),
}

/// Errors executing a script step.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    /// The step names a requester that is not in the topology.
    #[error("unknown requester '{0}'")]
    UnknownRequester(String),

    /// The step names a resource that is not in the topology.
    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    /// The requester has no requirement on the resource.
    #[error("'{requester}' has no requirement on '{resource}'")]
    NoRequirement {
        /// Requester name.
        requester: String,
        /// Resource name.
        resource: String,
    },

    /// The operation itself failed.
    #[error(transparent)]
    Requirements(#[from] Error),
}

/// A topology ready to run.
#[derive(Debug, Clone)]
pub struct Topology {
    requirements: Requirements,
    resources: SimulatedResources,
    requester_ids: BTreeMap<String, RequesterId>,
    resource_ids: BTreeMap<String, ResourceId>,
    pairs: Vec<(RequesterId, ResourceId, Capabilities)>,
}

impl Topology {
    /// Registers every requester and resource of `config` and creates the
    /// requirement of every pairing, in file order.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] if the configuration is inconsistent, asks
    /// for an arena that cannot be allocated, or has more pairings than its
    /// arena capacity.
    #[instrument(skip(config))]
    pub fn build(config: &TopologyConfig) -> Result<Self, BuildError> {
        let mut requirements = Requirements::try_with_capacity(config.capacity())
            .ok_or(BuildError::Capacity(config.capacity()))?;
        let mut resources = SimulatedResources::default();
        let mut requester_ids = BTreeMap::new();
        let mut resource_ids = BTreeMap::new();

        for requester in &config.requesters {
            let name = node_name("requester", &requester.name, &requester_ids)?;
            let id = requirements.add_requester(name);
            requester_ids.insert(requester.name.clone(), id);
        }

        for resource in &config.resources {
            let name = node_name("resource", &resource.name, &resource_ids)?;
            if resource.states.is_empty() {
                return Err(BuildError::NoStates(resource.name.clone()));
            }
            let id = requirements.add_resource(name);
            resource_ids.insert(resource.name.clone(), id);
            resources.push(
                resource
                    .states
                    .iter()
                    .map(|state| State {
                        name: state.name.clone(),
                        caps: state.caps,
                    })
                    .collect(),
                resource.faulty,
            );
        }

        let mut pairs = Vec::with_capacity(config.requirements.len());
        for pairing in &config.requirements {
            let requester = *requester_ids
                .get(&pairing.requester)
                .ok_or_else(|| BuildError::UnknownRequester(pairing.requester.clone()))?;
            let resource = *resource_ids
                .get(&pairing.resource)
                .ok_or_else(|| BuildError::UnknownResource(pairing.resource.clone()))?;

            if requirements.find(requester, resource).is_some() {
                return Err(BuildError::DuplicateRequirement {
                    requester: pairing.requester.clone(),
                    resource: pairing.resource.clone(),
                });
            }
            if !resources.has_capabilities(resource, pairing.default) {
                return Err(BuildError::UnsupportedDefault {
                    requester: pairing.requester.clone(),
                    resource: pairing.resource.clone(),
                    default: pairing.default,
                });
            }

            requirements.add_with_default(requester, resource, pairing.default)?;
            pairs.push((requester, resource, pairing.default));
        }

        info!(
            requesters = requester_ids.len(),
            resources = resource_ids.len(),
            requirements = requirements.len(),
            capacity = requirements.capacity(),
            "topology built"
        );

        Ok(Self {
            requirements,
            resources,
            requester_ids,
            resource_ids,
            pairs,
        })
    }

    /// Reinitialises the topology: every requirement is released at once and
    /// recreated from the configured pairings, and the simulated resources
    /// forget their states and apply counts.
    ///
    /// Requirement handles taken before the rebuild become stale.
    ///
    /// # Errors
    ///
    /// Fails only if the configured pairings no longer fit, which cannot
    /// happen for a topology that built successfully.
    #[instrument(skip(self))]
    pub fn rebuild(&mut self) -> Result<(), Error> {
        self.requirements.reset_all();
        self.resources.reset();
        for &(requester, resource, default) in &self.pairs {
            self.requirements
                .add_with_default(requester, resource, default)?;
        }
        Ok(())
    }

    /// The requirement context.
    #[must_use]
    pub const fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    /// The simulated resource layer.
    #[must_use]
    pub const fn resources(&self) -> &SimulatedResources {
        &self.resources
    }

    /// Mutable access to the simulated resource layer, e.g. to inject faults.
    pub const fn resources_mut(&mut self) -> &mut SimulatedResources {
        &mut self.resources
    }

    /// Looks up a requester by name.
    #[must_use]
    pub fn requester(&self, name: &str) -> Option<RequesterId> {
        self.requester_ids.get(name).copied()
    }

    /// Looks up a resource by name.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<ResourceId> {
        self.resource_ids.get(name).copied()
    }

    /// Runs one script step.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecuteError`] if a name does not resolve or the
    /// operation fails. A failed operation leaves the state the requirement
    /// layer documents for it.
    #[instrument(skip(self, step), fields(%step))]
    pub fn execute(&mut self, step: &Step) -> Result<(), ExecuteError> {
        match step {
            Step::Schedule {
                requester,
                resource,
                caps,
            } => {
                let id = self.lookup(requester, resource)?;
                self.requirements.schedule(&self.resources, id, *caps)?;
            }
            Step::Update {
                requester,
                resource,
                caps,
            } => {
                let id = self.lookup(requester, resource)?;
                self.requirements
                    .update_now(&mut self.resources, id, *caps)?;
            }
            Step::Commit { requester, swap } => {
                let requester = self.requester_id(requester)?;
                self.requirements
                    .commit_scheduled(&mut self.resources, requester, *swap)?;
            }
            Step::Cancel { requester } => {
                let requester = self.requester_id(requester)?;
                self.requirements.cancel_scheduled(requester);
            }
            Step::Defaults { requester } => {
                let requester = self.requester_id(requester)?;
                self.requirements.request_defaults(requester);
            }
            Step::Release { requester } => {
                let requester = self.requester_id(requester)?;
                self.requirements
                    .release_all(&mut self.resources, requester)?;
            }
            Step::Reset => self.rebuild()?,
        }
        debug!("step done");
        Ok(())
    }

    fn requester_id(&self, name: &str) -> Result<RequesterId, ExecuteError> {
        self.requester(name)
            .ok_or_else(|| ExecuteError::UnknownRequester(name.to_string()))
    }

    fn lookup(
        &self,
        requester: &str,
        resource: &str,
    ) -> Result<RequirementId, ExecuteError> {
        let requester_id = self.requester_id(requester)?;
        let resource_id = self
            .resource(resource)
            .ok_or_else(|| ExecuteError::UnknownResource(resource.to_string()))?;

        self.requirements
            .find(requester_id, resource_id)
            .ok_or_else(|| ExecuteError::NoRequirement {
                requester: requester.to_string(),
                resource: resource.to_string(),
            })
    }

    /// A serialisable view of every requirement and resource.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let name_of = |id: RequesterId| {
            self.requirements
                .requester_name(id)
                .unwrap_or_default()
                .to_string()
        };

        let requirements = self
            .requirements
            .iter()
            .map(|(_, req)| RequirementRow {
                requester: name_of(req.requester()),
                resource: self
                    .requirements
                    .resource_name(req.resource())
                    .unwrap_or_default()
                    .to_string(),
                current: req.current(),
                next: req.next(),
                default: req.default_capabilities(),
                in_use: req.in_use(),
            })
            .collect();

        let resources = self
            .requirements
            .resources()
            .map(|(id, name)| ResourceRow {
                name: name.to_string(),
                state: self
                    .resources
                    .selected_state(id)
                    .map(|state| state.name.clone()),
                combined: self.requirements.requirements_on(id).combined(),
                applies: self.resources.applies(id),
            })
            .collect();

        Snapshot {
            capacity: self.requirements.capacity(),
            requirements,
            resources,
        }
    }
}

/// Checks a configured name is non-empty and not yet taken.
fn node_name<T>(
    kind: &'static str,
    name: &str,
    taken: &BTreeMap<String, T>,
) -> Result<NonEmptyString, BuildError> {
    if taken.contains_key(name) {
        return Err(BuildError::DuplicateName {
            kind,
            name: name.to_string(),
        });
    }
    NonEmptyString::new(name.to_string()).map_err(|_| BuildError::EmptyName(kind))
}

/// Point-in-time view of a topology, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Arena capacity.
    pub capacity: usize,
    /// Every requirement, in creation order.
    pub requirements: Vec<RequirementRow>,
    /// Every resource, in registration order.
    pub resources: Vec<ResourceRow>,
}

/// One requirement in a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementRow {
    /// Requester name.
    pub requester: String,
    /// Resource name.
    pub resource: String,
    /// Capabilities in effect.
    pub current: Capabilities,
    /// Capabilities staged for the next commit.
    pub next: Capabilities,
    /// Default capabilities.
    pub default: Capabilities,
    /// Whether the default requirement is in use.
    pub in_use: bool,
}

/// One resource in a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceRow {
    /// Resource name.
    pub name: String,
    /// The selected state, if one was ever applied.
    pub state: Option<String>,
    /// Union of every requirement's current capabilities.
    pub combined: Capabilities,
    /// How often the resource was asked to apply its state.
    pub applies: usize,
}
