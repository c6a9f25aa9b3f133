//! The requirement context: every requirement of a topology and the lists
//! threading them together.
//!
//! [`Requirements`] owns the arena and the list heads of every requester and
//! resource. All operations go through it, so whoever owns the context is the
//! single writer of requirement state.

use std::iter::FusedIterator;

use non_empty_string::NonEmptyString;
use tracing::{debug, instrument};

use crate::domain::{
    ApplyError, Capabilities, RequesterId, Requirement, RequirementId, ResourceId, ResourceLayer,
    arena::{Arena, DEFAULT_CAPACITY},
    node::Node,
};

mod transitions;

/// Errors produced by the requirement layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Every requirement slot is taken. This is a topology configuration
    /// error; the pairing being added never becomes usable.
    #[error("requirement arena is full (capacity {capacity})")]
    CapacityExceeded {
        /// The fixed number of slots in the arena.
        capacity: usize,
    },

    /// The requester was not registered with this context.
    #[error("{0} is not registered")]
    UnknownRequester(RequesterId),

    /// The resource was not registered with this context.
    #[error("{0} is not registered")]
    UnknownResource(ResourceId),

    /// The handle was issued before the last reset.
    #[error("requirement {0} was invalidated by a reset")]
    StaleHandle(RequirementId),

    /// The resource defines no state with the requested capabilities.
    /// Nothing was changed.
    #[error("{resource} has no state with capabilities {requested}")]
    NoMatchingCapabilityState {
        /// The resource that was asked.
        resource: ResourceId,
        /// The capabilities that were asked for.
        requested: Capabilities,
    },

    /// The resource rejected an immediate update. The requirement was rolled
    /// back to its previous value.
    #[error("{resource} rejected the update")]
    ResourceUpdateFailed {
        /// The resource that rejected the update.
        resource: ResourceId,
        /// Why it was rejected.
        #[source]
        source: ApplyError,
    },

    /// A resource rejected an update part-way through a bulk walk.
    ///
    /// Requirements before `position` in the requester's list have been
    /// applied, the one at `position` has been changed but its resource
    /// refused it, and the rest were not visited. A correct resource layer
    /// never produces this.
    #[error(
        "{resource} rejected the update at requirement {} of {total} of {requester}; the walk \
         stopped there",
        .position + 1
    )]
    WalkHalted {
        /// The requester whose list was being walked.
        requester: RequesterId,
        /// The resource that rejected the update.
        resource: ResourceId,
        /// Zero-based position in the requester's list where the walk stopped.
        position: usize,
        /// Length of the requester's list.
        total: usize,
        /// Why the update was rejected.
        #[source]
        source: ApplyError,
    },
}

/// The requirement context of a topology.
#[derive(Debug, Clone)]
pub struct Requirements {
    arena: Arena,
    requesters: Vec<Node>,
    resources: Vec<Node>,
}

impl Default for Requirements {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl Requirements {
    /// Creates an empty context whose arena holds at most `capacity`
    /// requirements.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: Arena::with_capacity(capacity),
            requesters: Vec::new(),
            resources: Vec::new(),
        }
    }

    /// Like [`Requirements::with_capacity`], but returns `None` when
    /// `capacity` slots cannot be indexed or allocated.
    #[must_use]
    pub fn try_with_capacity(capacity: usize) -> Option<Self> {
        Some(Self {
            arena: Arena::try_with_capacity(capacity)?,
            requesters: Vec::new(),
            resources: Vec::new(),
        })
    }

    /// The fixed number of requirement slots.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// The number of requirements created since the last reset.
    #[must_use]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Whether no requirement exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }

    /// Registers a requester.
    pub fn add_requester(&mut self, name: NonEmptyString) -> RequesterId {
        self.requesters.push(Node::new(name));
        RequesterId(self.requesters.len() - 1)
    }

    /// Registers a resource.
    pub fn add_resource(&mut self, name: NonEmptyString) -> ResourceId {
        self.resources.push(Node::new(name));
        ResourceId(self.resources.len() - 1)
    }

    /// The diagnostic name of a requester.
    #[must_use]
    pub fn requester_name(&self, requester: RequesterId) -> Option<&str> {
        self.requesters.get(requester.0).map(|node| node.name.as_str())
    }

    /// The diagnostic name of a resource.
    #[must_use]
    pub fn resource_name(&self, resource: ResourceId) -> Option<&str> {
        self.resources.get(resource.0).map(|node| node.name.as_str())
    }

    /// All registered requesters, in registration order.
    pub fn requesters(&self) -> impl Iterator<Item = (RequesterId, &str)> {
        self.requesters
            .iter()
            .enumerate()
            .map(|(index, node)| (RequesterId(index), node.name.as_str()))
    }

    /// All registered resources, in registration order.
    pub fn resources(&self) -> impl Iterator<Item = (ResourceId, &str)> {
        self.resources
            .iter()
            .enumerate()
            .map(|(index, node)| (ResourceId(index), node.name.as_str()))
    }

    /// Creates the requirement binding `requester` to `resource`, with no
    /// default requirement.
    ///
    /// # Errors
    ///
    /// See [`Requirements::add_with_default`].
    pub fn add(
        &mut self,
        requester: RequesterId,
        resource: ResourceId,
    ) -> Result<RequirementId, Error> {
        self.add_with_default(requester, resource, Capabilities::NONE)
    }

    /// Creates the requirement binding `requester` to `resource` and links it
    /// at the head of both of their lists.
    ///
    /// `default` is what the requester needs from the resource when it wakes
    /// from a forced power down. It is fixed for the life of the requirement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRequester`] or [`Error::UnknownResource`] for
    /// ids not registered here, and [`Error::CapacityExceeded`] when the arena
    /// is full. No state is changed on error.
    #[instrument(level = "debug", skip(self))]
    pub fn add_with_default(
        &mut self,
        requester: RequesterId,
        resource: ResourceId,
        default: Capabilities,
    ) -> Result<RequirementId, Error> {
        if requester.0 >= self.requesters.len() {
            return Err(Error::UnknownRequester(requester));
        }
        if resource.0 >= self.resources.len() {
            return Err(Error::UnknownResource(resource));
        }

        let id = self
            .arena
            .allocate(Requirement::new(requester, resource, default))
            .ok_or(Error::CapacityExceeded {
                capacity: self.arena.capacity(),
            })?;
        self.link(id.index);

        Ok(id)
    }

    /// Pushes the requirement in `index` onto its requester's and its
    /// resource's lists.
    fn link(&mut self, index: u32) {
        let (requester, resource) = {
            let req = self.arena.slot(index);
            (req.requester(), req.resource())
        };

        let requester_node = &mut self.requesters[requester.0];
        let resource_node = &mut self.resources[resource.0];
        let req = self.arena.slot_mut(index);

        req.next_in_requester = requester_node.head.replace(index);
        req.next_in_resource = resource_node.head.replace(index);
    }

    /// Finds the requirement binding `requester` to `resource`.
    #[must_use]
    pub fn find(&self, requester: RequesterId, resource: ResourceId) -> Option<RequirementId> {
        self.requirements_of(requester)
            .find(|(_, req)| req.resource() == resource)
            .map(|(id, _)| id)
    }

    /// Resolves a handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if the handle predates the last reset.
    pub fn get(&self, id: RequirementId) -> Result<&Requirement, Error> {
        self.arena.get(id).ok_or(Error::StaleHandle(id))
    }

    /// All requirements, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (RequirementId, &Requirement)> {
        self.arena.iter()
    }

    /// Walks the requirements of `requester`, most recently added first.
    ///
    /// This is the order every bulk operation visits them in. An unregistered
    /// requester has no requirements.
    #[must_use]
    pub fn requirements_of(&self, requester: RequesterId) -> RequesterRequirements<'_> {
        RequesterRequirements {
            arena: &self.arena,
            cursor: self.requesters.get(requester.0).and_then(|node| node.head),
        }
    }

    /// Walks the requirements on `resource`, most recently added first.
    #[must_use]
    pub fn requirements_on(&self, resource: ResourceId) -> ResourceRequirements<'_> {
        ResourceRequirements {
            arena: &self.arena,
            cursor: self.resources.get(resource.0).and_then(|node| node.head),
        }
    }

    /// Stages `caps` as what the requester will need after its next commit
    /// point. The requirement in effect is not touched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] for an outdated handle and
    /// [`Error::NoMatchingCapabilityState`] if the resource has no state with
    /// `caps`. The requirement is unchanged on error.
    #[instrument(level = "debug", skip(self, layer))]
    pub fn schedule<L>(
        &mut self,
        layer: &L,
        id: RequirementId,
        caps: Capabilities,
    ) -> Result<(), Error>
    where
        L: ResourceLayer + ?Sized,
    {
        let resource = self.get(id)?.resource();
        if !layer.has_capabilities(resource, caps) {
            return Err(Error::NoMatchingCapabilityState {
                resource,
                requested: caps,
            });
        }

        let req = self.arena.get_mut(id).ok_or(Error::StaleHandle(id))?;
        req.next = caps;

        Ok(())
    }

    /// Applies `caps` immediately, for a requester that is running.
    ///
    /// On success the new value is also staged as `next`, so it persists
    /// past the next commit point unless rescheduled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] for an outdated handle,
    /// [`Error::NoMatchingCapabilityState`] if the resource has no state with
    /// `caps`, and [`Error::ResourceUpdateFailed`] if the resource rejects
    /// the change. After a rejection `current` is restored and `next` is
    /// left as it was.
    #[instrument(level = "debug", skip(self, layer))]
    pub fn update_now<L>(
        &mut self,
        layer: &mut L,
        id: RequirementId,
        caps: Capabilities,
    ) -> Result<(), Error>
    where
        L: ResourceLayer + ?Sized,
    {
        let resource = self.get(id)?.resource();
        if !layer.has_capabilities(resource, caps) {
            return Err(Error::NoMatchingCapabilityState {
                resource,
                requested: caps,
            });
        }

        let req = self.arena.get_mut(id).ok_or(Error::StaleHandle(id))?;
        let previous = std::mem::replace(&mut req.current, caps);

        match layer.apply_state(resource, self.requirements_on(resource)) {
            Ok(()) => {
                if let Some(req) = self.arena.get_mut(id) {
                    req.next = caps;
                }
                Ok(())
            }
            Err(source) => {
                debug!(%resource, %previous, "rolling back rejected update");
                if let Some(req) = self.arena.get_mut(id) {
                    req.current = previous;
                }
                Err(Error::ResourceUpdateFailed { resource, source })
            }
        }
    }

    /// Releases every requirement at once, for a full topology
    /// reinitialisation.
    ///
    /// Requesters and resources stay registered with empty lists. Every
    /// [`RequirementId`] issued so far becomes stale.
    #[instrument(level = "debug", skip(self))]
    pub fn reset_all(&mut self) {
        self.arena.reset();
        for node in self.requesters.iter_mut().chain(&mut self.resources) {
            node.head = None;
        }
    }
}

/// Iterator over a requester's requirements. See
/// [`Requirements::requirements_of`].
#[derive(Debug, Clone)]
pub struct RequesterRequirements<'a> {
    arena: &'a Arena,
    cursor: Option<u32>,
}

impl<'a> Iterator for RequesterRequirements<'a> {
    type Item = (RequirementId, &'a Requirement);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let req = self.arena.slot(index);
        self.cursor = req.next_in_requester;
        Some((self.arena.id(index), req))
    }
}

impl FusedIterator for RequesterRequirements<'_> {}

/// Iterator over the requirements on one resource. See
/// [`Requirements::requirements_on`].
#[derive(Debug, Clone)]
pub struct ResourceRequirements<'a> {
    arena: &'a Arena,
    cursor: Option<u32>,
}

impl ResourceRequirements<'_> {
    /// The union of the capabilities currently in effect across every
    /// requirement on the resource.
    #[must_use]
    pub fn combined(self) -> Capabilities {
        self.fold(Capabilities::NONE, |acc, req| acc | req.current())
    }
}

impl<'a> Iterator for ResourceRequirements<'a> {
    type Item = &'a Requirement;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let req = self.arena.slot(index);
        self.cursor = req.next_in_resource;
        Some(req)
    }
}

impl FusedIterator for ResourceRequirements<'_> {}
