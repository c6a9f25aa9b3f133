//! Power Requirement Negotiation
//!
//! Tracks, for every (requester, resource) pair of a power-management
//! topology, what capabilities the requester needs from the resource now,
//! after its next commit point, and on wake-up.

pub mod domain;
pub use domain::{
    ApplyError, Capabilities, Error, RequesterId, Requirement, RequirementId, Requirements,
    ResourceId, ResourceLayer, ResourceRequirements,
};

/// Topology files, the simulated resource layer and transition scripts.
pub mod topology;
pub use topology::{SimulatedResources, Step, Topology, TopologyConfig};
