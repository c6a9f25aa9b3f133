//! A resource layer driven by per-resource state tables.
//!
//! Stands in for the resource state machines of real firmware: it picks the
//! lowest-power state that covers what every requester currently needs, and
//! remembers it instead of programming hardware.

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{
    ApplyError, Capabilities, ResourceId, ResourceLayer, ResourceRequirements,
};

/// A capability state of a simulated resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct State {
    /// Name of the state.
    pub name: String,
    /// Everything the resource provides in this state.
    pub caps: Capabilities,
}

#[derive(Debug, Clone)]
struct Simulated {
    states: Vec<State>,
    selected: Option<usize>,
    faulty: bool,
    applies: usize,
}

/// Simulated resources, indexed by [`ResourceId`].
///
/// Resources must be pushed in the same order they were registered with the
/// [`Requirements`](crate::Requirements) context they serve.
#[derive(Debug, Clone, Default)]
pub struct SimulatedResources {
    resources: Vec<Simulated>,
}

impl SimulatedResources {
    /// Adds the next resource. `states` are ordered lowest power first.
    pub fn push(&mut self, states: Vec<State>, faulty: bool) {
        self.resources.push(Simulated {
            states,
            selected: None,
            faulty,
            applies: 0,
        });
    }

    /// The state last selected for `resource`, if it was ever applied.
    #[must_use]
    pub fn selected_state(&self, resource: ResourceId) -> Option<&State> {
        let sim = self.resources.get(resource.index())?;
        sim.selected.and_then(|index| sim.states.get(index))
    }

    /// How many times `resource` has been asked to apply its state.
    #[must_use]
    pub fn applies(&self, resource: ResourceId) -> usize {
        self.resources
            .get(resource.index())
            .map_or(0, |sim| sim.applies)
    }

    /// Makes `resource` reject (or stop rejecting) every update.
    pub fn set_faulty(&mut self, resource: ResourceId, faulty: bool) {
        if let Some(sim) = self.resources.get_mut(resource.index()) {
            sim.faulty = faulty;
        }
    }

    /// Forgets every selected state and apply count, as after a power-on
    /// reset.
    pub fn reset(&mut self) {
        for sim in &mut self.resources {
            sim.selected = None;
            sim.applies = 0;
        }
    }
}

impl ResourceLayer for SimulatedResources {
    fn has_capabilities(&self, resource: ResourceId, caps: Capabilities) -> bool {
        self.resources
            .get(resource.index())
            .is_some_and(|sim| sim.states.iter().any(|state| state.caps.contains(caps)))
    }

    fn apply_state(
        &mut self,
        resource: ResourceId,
        requirements: ResourceRequirements<'_>,
    ) -> Result<(), ApplyError> {
        let combined = requirements.combined();
        let Some(sim) = self.resources.get_mut(resource.index()) else {
            return Err(ApplyError::Infeasible(combined));
        };
        sim.applies += 1;

        if sim.faulty {
            warn!(%resource, "simulated hardware did not acknowledge");
            return Err(ApplyError::NotAcknowledged);
        }

        let index = sim
            .states
            .iter()
            .position(|state| state.caps.contains(combined))
            .ok_or(ApplyError::Infeasible(combined))?;

        if sim.selected != Some(index) {
            debug!(%resource, %combined, state = sim.states[index].name, "resource state changed");
        }
        sim.selected = Some(index);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use non_empty_string::NonEmptyString;

    use super::*;
    use crate::Requirements;

    fn state(name: &str, bits: u32) -> State {
        State {
            name: name.to_string(),
            caps: Capabilities::from_bits(bits),
        }
    }

    fn memory() -> Vec<State> {
        vec![state("off", 0), state("retention", 2), state("on", 7)]
    }

    fn setup() -> (Requirements, SimulatedResources, ResourceId) {
        let mut reqs = Requirements::with_capacity(4);
        let ddr = reqs.add_resource(NonEmptyString::new("ddr".to_string()).unwrap());
        let mut sim = SimulatedResources::default();
        sim.push(memory(), false);
        (reqs, sim, ddr)
    }

    #[test]
    fn capabilities_must_fit_in_one_state() {
        let (_, mut sim, ddr) = setup();
        sim.push(vec![state("a", 1), state("b", 2)], false);
        let split = ResourceId(1);

        assert!(sim.has_capabilities(ddr, Capabilities::from_bits(3)));
        assert!(sim.has_capabilities(split, Capabilities::from_bits(2)));
        assert!(!sim.has_capabilities(split, Capabilities::from_bits(3)));
        assert!(!sim.has_capabilities(ResourceId(5), Capabilities::NONE));
    }

    #[test]
    fn selects_lowest_state_covering_all_requirements() {
        let (mut reqs, mut sim, ddr) = setup();
        let apu = reqs.add_requester(NonEmptyString::new("apu".to_string()).unwrap());
        let rpu = reqs.add_requester(NonEmptyString::new("rpu".to_string()).unwrap());
        let from_apu = reqs.add(apu, ddr).unwrap();
        let from_rpu = reqs.add(rpu, ddr).unwrap();
        assert!(sim.selected_state(ddr).is_none());

        reqs.update_now(&mut sim, from_apu, Capabilities::CONTEXT)
            .unwrap();
        assert_eq!(sim.selected_state(ddr).unwrap().name, "retention");

        reqs.update_now(&mut sim, from_rpu, Capabilities::ACCESS)
            .unwrap();
        assert_eq!(sim.selected_state(ddr).unwrap().name, "on");

        reqs.update_now(&mut sim, from_rpu, Capabilities::NONE)
            .unwrap();
        assert_eq!(sim.selected_state(ddr).unwrap().name, "retention");
        assert_eq!(sim.applies(ddr), 3);
    }

    #[test]
    fn faulty_resource_rejects_and_keeps_state() {
        let (mut reqs, mut sim, ddr) = setup();
        let apu = reqs.add_requester(NonEmptyString::new("apu".to_string()).unwrap());
        let id = reqs.add(apu, ddr).unwrap();
        reqs.update_now(&mut sim, id, Capabilities::CONTEXT).unwrap();

        sim.set_faulty(ddr, true);
        let error = reqs
            .update_now(&mut sim, id, Capabilities::ACCESS)
            .unwrap_err();

        assert!(matches!(
            error,
            crate::Error::ResourceUpdateFailed {
                source: ApplyError::NotAcknowledged,
                ..
            }
        ));
        assert_eq!(sim.selected_state(ddr).unwrap().name, "retention");
        assert_eq!(reqs.get(id).unwrap().current(), Capabilities::CONTEXT);
    }

    #[test]
    fn infeasible_combination_is_rejected() {
        let mut reqs = Requirements::with_capacity(2);
        let res = reqs.add_resource(NonEmptyString::new("split".to_string()).unwrap());
        let apu = reqs.add_requester(NonEmptyString::new("apu".to_string()).unwrap());
        let rpu = reqs.add_requester(NonEmptyString::new("rpu".to_string()).unwrap());
        let mut sim = SimulatedResources::default();
        sim.push(vec![state("a", 1), state("b", 2)], false);
        let first = reqs.add(apu, res).unwrap();
        let second = reqs.add(rpu, res).unwrap();
        reqs.update_now(&mut sim, first, Capabilities::from_bits(1))
            .unwrap();

        let error = reqs
            .update_now(&mut sim, second, Capabilities::from_bits(2))
            .unwrap_err();

        assert!(matches!(
            error,
            crate::Error::ResourceUpdateFailed {
                source: ApplyError::Infeasible(caps),
                ..
            } if caps.bits() == 3
        ));
        assert_eq!(sim.selected_state(res).unwrap().name, "a");
    }

    #[test]
    fn reset_forgets_selection_and_apply_count() {
        let (mut reqs, mut sim, ddr) = setup();
        let apu = reqs.add_requester(NonEmptyString::new("apu".to_string()).unwrap());
        let id = reqs.add(apu, ddr).unwrap();
        reqs.update_now(&mut sim, id, Capabilities::ACCESS).unwrap();

        assert_eq!(sim.applies(ddr), 1);

        sim.reset();

        assert!(sim.selected_state(ddr).is_none());
        assert_eq!(sim.applies(ddr), 0);
    }
}
