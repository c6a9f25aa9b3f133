//! Bulk walks over a requester's requirements, run when the requester
//! changes power state.
//!
//! All four walks visit the requester's list most recently added first.

use tracing::{debug, error, instrument};

use super::{Error, Requirements};
use crate::domain::{Capabilities, RequesterId, ResourceId, ResourceLayer};

impl Requirements {
    /// Commits every staged change of `requester`, on suspend or another
    /// state transition.
    ///
    /// For each requirement whose `next` differs from `current`, `next`
    /// becomes `current` and the resource is asked to apply it. With
    /// `swap`, the requester expects to resume afterwards, so the
    /// requirement's default (or, without one, the value being replaced) is
    /// staged as the new `next`. Without `swap`, the staged value is consumed
    /// and the requester has to request everything again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRequester`] for an unregistered requester and
    /// [`Error::WalkHalted`] if a resource rejects its update. The walk stops
    /// at the first rejection, leaving earlier requirements committed and
    /// later ones untouched.
    #[instrument(level = "debug", skip(self, layer))]
    pub fn commit_scheduled<L>(
        &mut self,
        layer: &mut L,
        requester: RequesterId,
        swap: bool,
    ) -> Result<(), Error>
    where
        L: ResourceLayer + ?Sized,
    {
        let total = self.checked_list_len(requester)?;
        let mut cursor = self.requesters[requester.0].head;
        let mut position = 0;

        while let Some(index) = cursor {
            let req = self.arena.slot_mut(index);
            cursor = req.next_in_requester;

            if req.is_pending() {
                let pending = req.next;
                if swap {
                    req.next = if req.default_capabilities().is_empty() {
                        req.current
                    } else {
                        req.default_capabilities()
                    };
                }
                req.current = pending;

                let resource = req.resource();
                debug!(%resource, current = %pending, "committing scheduled requirement");
                self.apply(layer, requester, resource, position, total)?;
            }
            position += 1;
        }

        Ok(())
    }

    /// Drops every staged change of `requester`, when its suspend is
    /// aborted. Resources are not touched.
    ///
    /// An unregistered requester has nothing to cancel.
    #[instrument(level = "debug", skip(self))]
    pub fn cancel_scheduled(&mut self, requester: RequesterId) {
        let mut cursor = self.requester_head(requester);

        while let Some(index) = cursor {
            let req = self.arena.slot_mut(index);
            cursor = req.next_in_requester;

            if req.is_pending() {
                debug!(resource = %req.resource(), "cancelling scheduled requirement");
                req.next = req.current;
            }
        }
    }

    /// Stages the default requirements of `requester`, when it wakes from a
    /// forced power down, and marks those resources as in use.
    ///
    /// Requirements without a default are left alone. Nothing is applied
    /// until the next [`commit_scheduled`](Self::commit_scheduled).
    #[instrument(level = "debug", skip(self))]
    pub fn request_defaults(&mut self, requester: RequesterId) {
        let mut cursor = self.requester_head(requester);

        while let Some(index) = cursor {
            let req = self.arena.slot_mut(index);
            cursor = req.next_in_requester;

            if !req.default_capabilities().is_empty() {
                req.in_use = true;
                req.next = req.default_capabilities();
            }
        }
    }

    /// Releases every resource `requester` is using, when it is forced to
    /// power down.
    ///
    /// Each in-use requirement drops to [`Capabilities::NONE`] for both
    /// `current` and `next` and its resource is asked to apply that.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRequester`] for an unregistered requester and
    /// [`Error::WalkHalted`] if a resource rejects its update, with the same
    /// partial outcome as [`commit_scheduled`](Self::commit_scheduled).
    #[instrument(level = "debug", skip(self, layer))]
    pub fn release_all<L>(&mut self, layer: &mut L, requester: RequesterId) -> Result<(), Error>
    where
        L: ResourceLayer + ?Sized,
    {
        let total = self.checked_list_len(requester)?;
        let mut cursor = self.requesters[requester.0].head;
        let mut position = 0;

        while let Some(index) = cursor {
            let req = self.arena.slot_mut(index);
            cursor = req.next_in_requester;

            if req.in_use {
                req.in_use = false;
                req.current = Capabilities::NONE;
                req.next = Capabilities::NONE;

                let resource = req.resource();
                debug!(%resource, "releasing requirement");
                self.apply(layer, requester, resource, position, total)?;
            }
            position += 1;
        }

        Ok(())
    }

    fn requester_head(&self, requester: RequesterId) -> Option<u32> {
        self.requesters.get(requester.0).and_then(|node| node.head)
    }

    fn checked_list_len(&self, requester: RequesterId) -> Result<usize, Error> {
        if requester.0 >= self.requesters.len() {
            return Err(Error::UnknownRequester(requester));
        }
        Ok(self.requirements_of(requester).count())
    }

    fn apply<L>(
        &self,
        layer: &mut L,
        requester: RequesterId,
        resource: ResourceId,
        position: usize,
        total: usize,
    ) -> Result<(), Error>
    where
        L: ResourceLayer + ?Sized,
    {
        layer
            .apply_state(resource, self.requirements_on(resource))
            .map_err(|source| {
                error!(%resource, %source, "error setting resource; walk stopped");
                Error::WalkHalted {
                    requester,
                    resource,
                    position,
                    total,
                    source,
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use non_empty_string::NonEmptyString;

    use super::*;
    use crate::domain::{ApplyError, RequirementId, requirements::ResourceRequirements};

    /// Accepts everything except updates on `failing`, and records every
    /// update it sees.
    #[derive(Debug, Default)]
    struct Recorder {
        failing: Option<ResourceId>,
        applied: Vec<(ResourceId, Capabilities)>,
    }

    impl ResourceLayer for Recorder {
        fn has_capabilities(&self, _resource: ResourceId, _caps: Capabilities) -> bool {
            true
        }

        fn apply_state(
            &mut self,
            resource: ResourceId,
            requirements: ResourceRequirements<'_>,
        ) -> Result<(), ApplyError> {
            self.applied.push((resource, requirements.combined()));
            if self.failing == Some(resource) {
                Err(ApplyError::NotAcknowledged)
            } else {
                Ok(())
            }
        }
    }

    fn name(s: &str) -> NonEmptyString {
        NonEmptyString::new(s.to_string()).unwrap()
    }

    struct Fixture {
        reqs: Requirements,
        requester: RequesterId,
        resources: Vec<ResourceId>,
        ids: HashMap<ResourceId, RequirementId>,
    }

    /// One requester using three resources, with the given defaults.
    fn fixture(defaults: [u32; 3]) -> Fixture {
        let mut reqs = Requirements::with_capacity(8);
        let requester = reqs.add_requester(name("apu"));
        let mut resources = Vec::new();
        let mut ids = HashMap::new();
        for (i, default) in defaults.into_iter().enumerate() {
            let resource = reqs.add_resource(name(&format!("res{i}")));
            let id = reqs
                .add_with_default(requester, resource, Capabilities::from_bits(default))
                .unwrap();
            resources.push(resource);
            ids.insert(resource, id);
        }
        Fixture {
            reqs,
            requester,
            resources,
            ids,
        }
    }

    impl Fixture {
        fn req(&self, resource: usize) -> &crate::domain::Requirement {
            self.reqs.get(self.ids[&self.resources[resource]]).unwrap()
        }

        fn schedule(&mut self, resource: usize, caps: u32) {
            let id = self.ids[&self.resources[resource]];
            self.reqs
                .schedule(&Recorder::default(), id, Capabilities::from_bits(caps))
                .unwrap();
        }

        fn update(&mut self, resource: usize, caps: u32) {
            let id = self.ids[&self.resources[resource]];
            self.reqs
                .update_now(&mut Recorder::default(), id, Capabilities::from_bits(caps))
                .unwrap();
        }
    }

    #[test]
    fn commit_without_swap_consumes_schedule() {
        let mut f = fixture([0, 0, 0]);
        f.update(1, 1);
        f.schedule(0, 3);
        f.schedule(2, 2);
        let mut layer = Recorder::default();

        f.reqs.commit_scheduled(&mut layer, f.requester, false).unwrap();

        assert_eq!(f.req(0).current().bits(), 3);
        assert_eq!(f.req(0).next().bits(), 3);
        assert_eq!(f.req(2).current().bits(), 2);
        // not pending, so never handed to the resource
        assert_eq!(f.req(1).current().bits(), 1);
        let touched: Vec<_> = layer.applied.iter().map(|(r, _)| *r).collect();
        assert_eq!(touched, vec![f.resources[2], f.resources[0]]);
    }

    #[test]
    fn commit_with_swap_carries_current_forward() {
        let mut f = fixture([0, 0, 0]);
        f.update(0, 1);
        f.schedule(0, 7);

        f.reqs
            .commit_scheduled(&mut Recorder::default(), f.requester, true)
            .unwrap();

        assert_eq!(f.req(0).current().bits(), 7);
        assert_eq!(f.req(0).next().bits(), 1);
    }

    #[test]
    fn commit_with_swap_prefers_default() {
        let mut f = fixture([4, 0, 0]);
        f.update(0, 1);
        f.schedule(0, 3);

        f.reqs
            .commit_scheduled(&mut Recorder::default(), f.requester, true)
            .unwrap();

        assert_eq!(f.req(0).current().bits(), 3);
        assert_eq!(f.req(0).next().bits(), 4);
    }

    #[test]
    fn commit_with_swap_leaves_settled_requirements_alone() {
        let mut f = fixture([4, 0, 0]);
        f.update(0, 1);
        f.schedule(1, 2);
        let mut layer = Recorder::default();

        f.reqs.commit_scheduled(&mut layer, f.requester, true).unwrap();

        // entry 0 had nothing staged, so its default is not restaged
        assert_eq!(f.req(0).current().bits(), 1);
        assert_eq!(f.req(0).next().bits(), 1);
        assert_eq!(f.req(1).current().bits(), 2);
        assert_eq!(layer.applied, vec![(f.resources[1], Capabilities::from_bits(2))]);
    }

    #[test]
    fn commit_stops_at_first_rejection() {
        let mut f = fixture([0, 0, 0]);
        for resource in 0..3 {
            f.schedule(resource, 1);
        }
        // list order is res2, res1, res0: fail on the second visited
        let mut layer = Recorder {
            failing: Some(f.resources[1]),
            ..Recorder::default()
        };

        let error = f
            .reqs
            .commit_scheduled(&mut layer, f.requester, false)
            .unwrap_err();

        match error {
            Error::WalkHalted {
                requester,
                resource,
                position,
                total,
                source,
            } => {
                assert_eq!(requester, f.requester);
                assert_eq!(resource, f.resources[1]);
                assert_eq!(position, 1);
                assert_eq!(total, 3);
                assert_eq!(source, ApplyError::NotAcknowledged);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(f.req(2).current().bits(), 1, "first visited is committed");
        assert_eq!(f.req(1).current().bits(), 1, "rejected entry keeps new value");
        assert_eq!(f.req(0).current().bits(), 0, "third is never visited");
        assert_eq!(f.req(0).next().bits(), 1);
        assert_eq!(layer.applied.len(), 2);
    }

    #[test]
    fn cancel_makes_every_requirement_constant() {
        let mut f = fixture([4, 0, 0]);
        f.update(0, 1);
        f.schedule(0, 3);
        f.schedule(1, 2);
        f.reqs.request_defaults(f.requester);

        f.reqs.cancel_scheduled(f.requester);

        for resource in 0..3 {
            assert_eq!(f.req(resource).current(), f.req(resource).next());
        }
        assert_eq!(f.req(0).current().bits(), 1);
    }

    #[test]
    fn request_defaults_only_touches_defaults() {
        let mut f = fixture([4, 0, 2]);
        f.schedule(1, 1);

        f.reqs.request_defaults(f.requester);

        assert!(f.req(0).in_use());
        assert_eq!(f.req(0).next().bits(), 4);
        assert!(f.req(2).in_use());
        assert_eq!(f.req(2).next().bits(), 2);
        assert!(!f.req(1).in_use());
        assert_eq!(f.req(1).next().bits(), 1);
        assert_eq!(f.req(0).current(), Capabilities::NONE);
    }

    #[test]
    fn release_all_only_touches_requirements_in_use() {
        let mut f = fixture([4, 0, 0]);
        f.update(1, 1);
        f.reqs.request_defaults(f.requester);
        let mut layer = Recorder::default();
        f.reqs.commit_scheduled(&mut layer, f.requester, false).unwrap();

        f.reqs.release_all(&mut layer, f.requester).unwrap();

        assert_eq!(f.req(0).current(), Capabilities::NONE);
        assert_eq!(f.req(0).next(), Capabilities::NONE);
        assert!(!f.req(0).in_use());
        assert_eq!(f.req(1).current().bits(), 1);
        assert_eq!(f.req(1).next().bits(), 1);
        assert_eq!(
            layer.applied.last(),
            Some(&(f.resources[0], Capabilities::NONE))
        );
    }

    #[test]
    fn release_all_stops_at_first_rejection() {
        let mut f = fixture([1, 2, 4]);
        f.reqs.request_defaults(f.requester);
        let mut layer = Recorder {
            failing: Some(f.resources[2]),
            ..Recorder::default()
        };

        let error = f.reqs.release_all(&mut layer, f.requester).unwrap_err();

        assert!(matches!(error, Error::WalkHalted { position: 0, total: 3, .. }));
        assert!(!f.req(2).in_use());
        assert!(f.req(1).in_use());
        assert!(f.req(0).in_use());
    }

    #[test]
    fn default_lifecycle_scenario() {
        let mut f = fixture([4, 0, 0]);
        let mut layer = Recorder::default();

        f.reqs.request_defaults(f.requester);
        assert_eq!(f.req(0).next().bits(), 4);
        assert!(f.req(0).in_use());

        f.reqs.commit_scheduled(&mut layer, f.requester, false).unwrap();
        assert_eq!(f.req(0).current().bits(), 4);

        f.reqs.release_all(&mut layer, f.requester).unwrap();
        assert_eq!(f.req(0).current(), Capabilities::NONE);
        assert_eq!(f.req(0).next(), Capabilities::NONE);
        assert!(!f.req(0).in_use());
    }

    #[test]
    fn unknown_requester_is_rejected_by_applying_walks() {
        let mut f = fixture([0, 0, 0]);
        let stranger = RequesterId(7);
        let mut layer = Recorder::default();

        assert!(matches!(
            f.reqs.commit_scheduled(&mut layer, stranger, true),
            Err(Error::UnknownRequester(id)) if id == stranger
        ));
        assert!(matches!(
            f.reqs.release_all(&mut layer, stranger),
            Err(Error::UnknownRequester(_))
        ));
        f.reqs.cancel_scheduled(stranger);
        f.reqs.request_defaults(stranger);
        assert!(layer.applied.is_empty());
    }

    #[test]
    fn walks_only_visit_their_own_requester() {
        let mut f = fixture([0, 0, 0]);
        let other = f.reqs.add_requester(name("rpu"));
        let shared = f.resources[0];
        let id = f.reqs.add(other, shared).unwrap();
        f.reqs
            .schedule(&Recorder::default(), id, Capabilities::ACCESS)
            .unwrap();

        f.reqs
            .commit_scheduled(&mut Recorder::default(), f.requester, false)
            .unwrap();

        assert!(f.reqs.get(id).unwrap().is_pending());
    }
}
