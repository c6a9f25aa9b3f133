//! Domain model of the requirement negotiation.
//!
//! This module contains the requirement records, the arena they live in, the
//! context tying requesters and resources together, and the contract resources
//! must satisfy.

mod arena;
pub use arena::DEFAULT_CAPACITY;

/// Capability masks.
pub mod capabilities;
pub use capabilities::{Capabilities, ParseCapabilitiesError};

mod node;
pub use node::{RequesterId, ResourceId};

pub mod requirement;
pub use requirement::{Requirement, RequirementId};

/// The requirement context and the operations on it.
pub mod requirements;
pub use requirements::{Error, RequesterRequirements, Requirements, ResourceRequirements};

mod resource;
pub use resource::{ApplyError, ResourceLayer};
