//! The requirement record binding one requester to one resource.

use std::fmt;

use crate::domain::{Capabilities, RequesterId, ResourceId};

/// Handle to a requirement stored in a [`Requirements`](crate::Requirements)
/// context.
///
/// The handle is tagged with the generation of the arena it was allocated
/// from. Once the arena is reset, every older handle is rejected with
/// [`Error::StaleHandle`](crate::Error::StaleHandle) instead of silently
/// aliasing a newer requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequirementId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for RequirementId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.index, self.generation)
    }
}

/// The negotiated relationship between one requester and one resource.
///
/// A requirement is created once per pairing when the topology is built and
/// is never unlinked. It sits on two singly-linked lists at the same time:
/// the list of everything its requester needs, and the list of everyone
/// needing its resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    requester: RequesterId,
    resource: ResourceId,
    pub(crate) current: Capabilities,
    pub(crate) next: Capabilities,
    default: Capabilities,
    pub(crate) in_use: bool,
    pub(crate) next_in_requester: Option<u32>,
    pub(crate) next_in_resource: Option<u32>,
}

impl Requirement {
    pub(crate) const fn new(
        requester: RequesterId,
        resource: ResourceId,
        default: Capabilities,
    ) -> Self {
        Self {
            requester,
            resource,
            current: Capabilities::NONE,
            next: Capabilities::NONE,
            default,
            in_use: false,
            next_in_requester: None,
            next_in_resource: None,
        }
    }

    /// The requester that owns this requirement.
    #[must_use]
    pub const fn requester(&self) -> RequesterId {
        self.requester
    }

    /// The resource this requirement applies to.
    #[must_use]
    pub const fn resource(&self) -> ResourceId {
        self.resource
    }

    /// The capabilities currently in effect.
    #[must_use]
    pub const fn current(&self) -> Capabilities {
        self.current
    }

    /// The capabilities staged for the next commit point.
    #[must_use]
    pub const fn next(&self) -> Capabilities {
        self.next
    }

    /// The capabilities needed on wake-up from a forced power down.
    ///
    /// [`Capabilities::NONE`] when the requester has no such requirement.
    #[must_use]
    pub const fn default_capabilities(&self) -> Capabilities {
        self.default
    }

    /// Whether the requester is relying on its default requirement for this
    /// resource.
    #[must_use]
    pub const fn in_use(&self) -> bool {
        self.in_use
    }

    /// Whether a change is staged that the next commit would apply.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.current != self.next
    }
}
