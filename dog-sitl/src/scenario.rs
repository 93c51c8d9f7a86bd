// scenario.rs
//! Scripted operator input for a simulation run: button presses, tilting
//! the commander, pulling cables and taking nodes out of radio range.
use dog_core::Buttons;
use dog_core::event;
use embassy_time::Duration;

use crate::bus::Bus;
use crate::sim::{SharedState, lock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Buttons(Buttons),
    /// Hub (pitch, roll) in degrees.
    Orientation(i16, i16),
    Unplug(usize),
    Replug(usize),
    /// True body tilt in degrees.
    Tilt([i16; 3]),
    /// Take the node's channel off the air, or put it back.
    Silence(bool),
    Battery(u16),
}

#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub at: Duration,
    pub node: usize,
    pub action: Action,
}

const fn step(at_ms: u64, node: usize, action: Action) -> Step {
    Step {
        at: Duration::from_millis(at_ms),
        node,
        action,
    }
}

const CENTER: Action = Action::Buttons(Buttons::PRIMARY);
const LEFT: Action = Action::Buttons(Buttons(Buttons::LEFT));
const RIGHT: Action = Action::Buttons(Buttons(Buttons::RIGHT));
const RELEASE: Action = Action::Buttons(Buttons::NONE);

const COMMANDER: usize = 0;
const LEG_1: usize = 1;
const LEG_2: usize = 2;
const LEG_3: usize = 3;
const BODY_REAR: usize = 6;

/// The default run, in time order.
pub const SCRIPT: &[Step] = &[
    // Engage the commander and walk the menu from Return back to leg 4.
    step(1_000, COMMANDER, CENTER),
    step(1_200, COMMANDER, RELEASE),
    step(1_300, COMMANDER, LEFT),
    step(1_350, COMMANDER, RELEASE),
    step(1_400, COMMANDER, LEFT),
    step(1_450, COMMANDER, RELEASE),
    step(1_500, COMMANDER, LEFT),
    step(1_550, COMMANDER, RELEASE),
    // Roll left picks the bottom joint, pitch sets the speed.
    step(2_000, COMMANDER, Action::Orientation(20, -20)),
    step(2_500, LEG_3, Action::Tilt([60, 5, 0])),
    step(3_000, COMMANDER, Action::Orientation(0, 0)),
    step(3_200, COMMANDER, CENTER),
    step(3_300, COMMANDER, RELEASE),
    step(3_500, LEG_3, Action::Tilt([0, 0, 0])),
    step(4_000, LEG_2, Action::Unplug(0)),
    step(4_500, LEG_2, Action::Replug(0)),
    step(5_000, COMMANDER, Action::Silence(true)),
    step(5_800, COMMANDER, Action::Silence(false)),
    // Leg 1 self-test: engage, release, confirm early in the cycle.
    step(6_200, LEG_1, CENTER),
    step(6_300, LEG_1, RELEASE),
    step(6_500, LEG_1, CENTER),
    step(6_600, LEG_1, RELEASE),
    step(7_000, BODY_REAR, Action::Battery(6_500)),
    step(7_500, BODY_REAR, Action::Battery(7_800)),
    // Pick Shutdown (one right of Return) and confirm.
    step(8_500, COMMANDER, CENTER),
    step(8_600, COMMANDER, RELEASE),
    step(8_700, COMMANDER, RIGHT),
    step(8_750, COMMANDER, RELEASE),
    step(8_900, COMMANDER, CENTER),
    step(9_000, COMMANDER, RELEASE),
];

pub struct Scenario {
    steps: &'static [Step],
    next: usize,
}

impl Scenario {
    pub const fn new(steps: &'static [Step]) -> Self {
        Self { steps, next: 0 }
    }

    /// Applies every step due at `elapsed`. Returns how many were applied.
    pub fn apply_due(&mut self, elapsed: Duration, nodes: &[SharedState], bus: &Bus) -> usize {
        let mut applied = 0;
        while let Some(step) = self.steps.get(self.next) {
            if step.at > elapsed {
                break;
            }
            self.next += 1;
            applied += 1;
            if let Some(state) = nodes.get(step.node) {
                apply(step, state, bus);
            }
        }
        applied
    }

    pub fn is_done(&self) -> bool {
        self.next >= self.steps.len()
    }
}

fn apply(step: &Step, state: &SharedState, bus: &Bus) {
    let mut state = lock(state);
    match step.action {
        Action::Buttons(buttons) => state.buttons = buttons,
        Action::Orientation(pitch, roll) => state.orientation = (pitch, roll),
        Action::Unplug(port) => {
            if let Some(port) = state.ports.get_mut(port) {
                port.plugged = false;
            }
            event!("scenario: cable pulled");
        }
        Action::Replug(port) => {
            if let Some(port) = state.ports.get_mut(port) {
                port.plugged = true;
            }
            event!("scenario: cable replugged");
        }
        Action::Tilt(tilt) => state.tilt = tilt,
        Action::Silence(silenced) => {
            bus.silence(step.node as u8, silenced);
            if silenced {
                event!("scenario: node out of range");
            } else {
                event!("scenario: node back in range");
            }
        }
        Action::Battery(mv) => state.battery_mv = mv,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimState;
    use dog_core::topology::NODES;
    use std::sync::{Arc, Mutex};

    fn states() -> Vec<SharedState> {
        NODES
            .iter()
            .map(|node| Arc::new(Mutex::new(SimState::for_node(node))))
            .collect()
    }

    #[test]
    fn test_script_is_time_ordered() {
        assert!(SCRIPT.windows(2).all(|pair| pair[0].at <= pair[1].at));
        assert!(SCRIPT.iter().all(|step| step.node < NODES.len()));
    }

    #[test]
    fn test_steps_apply_once_when_due() {
        const STEPS: &[Step] = &[
            step(100, 1, Action::Battery(6_000)),
            step(200, 1, Action::Unplug(0)),
            step(200, 0, CENTER),
        ];
        let nodes = states();
        let bus = Bus::new();
        let mut scenario = Scenario::new(STEPS);

        assert_eq!(scenario.apply_due(Duration::from_millis(50), &nodes, &bus), 0);
        assert_eq!(scenario.apply_due(Duration::from_millis(100), &nodes, &bus), 1);
        assert_eq!(lock(&nodes[1]).battery_mv, 6_000);
        assert!(lock(&nodes[1]).ports[0].plugged);

        assert_eq!(scenario.apply_due(Duration::from_millis(250), &nodes, &bus), 2);
        assert!(!lock(&nodes[1]).ports[0].plugged);
        assert_eq!(lock(&nodes[0]).buttons, Buttons::PRIMARY);
        assert!(scenario.is_done());
        assert_eq!(scenario.apply_due(Duration::from_millis(500), &nodes, &bus), 0);
    }

    #[test]
    fn test_silence_reaches_the_bus() {
        const STEPS: &[Step] = &[step(0, 3, Action::Silence(true))];
        let nodes = states();
        let bus = Bus::new();
        Scenario::new(STEPS).apply_due(Duration::from_millis(0), &nodes, &bus);
        assert!(bus.is_silenced(3));
        assert!(!bus.is_silenced(0));
    }
}
