//! The contract the requirement layer needs from resources.

use crate::domain::{Capabilities, ResourceId, requirements::ResourceRequirements};

/// The resource (slave) side of the negotiation.
///
/// The requirement layer only decides *what* each requester needs. Turning
/// the superposition of those needs into a concrete hardware state is the
/// job of the implementor.
pub trait ResourceLayer {
    /// Whether `resource` defines a state providing every bit of `caps`.
    ///
    /// This is a pure query. It is consulted before any requirement is
    /// changed, so a `false` answer never leaves a partial update behind.
    fn has_capabilities(&self, resource: ResourceId, caps: Capabilities) -> bool;

    /// Recompute the effective state of `resource` from all of its
    /// requirements and program it.
    ///
    /// `requirements` walks the resource's requirement list, so
    /// [`ResourceRequirements::combined`] gives the least upper bound of
    /// what every requester currently needs.
    ///
    /// # Errors
    ///
    /// Returns an [`ApplyError`] if the combined requirement cannot be met or
    /// the hardware does not acknowledge the change.
    fn apply_state(
        &mut self,
        resource: ResourceId,
        requirements: ResourceRequirements<'_>,
    ) -> Result<(), ApplyError>;
}

/// Reasons a resource rejects an update.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    /// No state of the resource provides the combined capabilities.
    #[error("no state provides the combined capabilities {0}")]
    Infeasible(Capabilities),

    /// The hardware did not acknowledge the state change.
    #[error("hardware did not acknowledge the state change")]
    NotAcknowledged,
}
