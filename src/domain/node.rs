use std::fmt;

use non_empty_string::NonEmptyString;

/// Identifies a requester (a processor or other compute subsystem) registered
/// with a [`Requirements`](crate::Requirements) context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequesterId(pub(crate) usize);

/// Identifies a resource (peripheral, memory, power domain) registered with a
/// [`Requirements`](crate::Requirements) context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(pub(crate) usize);

impl RequesterId {
    /// Position of the requester in registration order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl ResourceId {
    /// Position of the resource in registration order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "requester#{}", self.0)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "resource#{}", self.0)
    }
}

/// A requester or resource as the requirement layer sees it: a diagnostic
/// name and the head of its intrusive requirement list.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub name: NonEmptyString,
    /// Slot of the most recently linked requirement.
    pub head: Option<u32>,
}

impl Node {
    pub const fn new(name: NonEmptyString) -> Self {
        Self { name, head: None }
    }
}
