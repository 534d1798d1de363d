use std::collections::HashMap;

use crate::controller::{Robot, RobotId, RobotState};

/// A fully-populated fleet state as of one aggregation cycle.
///
/// Holds the robots in controller list order plus one state entry per
/// robot. Snapshots are built whole and never mutated afterwards;
/// consumers share them behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FleetSnapshot {
    robots: Vec<Robot>,
    states: HashMap<RobotId, RobotState>,
}

impl FleetSnapshot {
    /// Builds a snapshot from complete (robot, state) pairs, keeping the
    /// one-state-per-robot invariant by construction.
    pub fn from_entries(entries: Vec<(Robot, RobotState)>) -> Self {
        let mut robots = Vec::with_capacity(entries.len());
        let mut states = HashMap::with_capacity(entries.len());
        for (robot, state) in entries {
            states.insert(robot.id.clone(), state);
            robots.push(robot);
        }
        Self { robots, states }
    }

    /// Robots in the order the controller listed them.
    pub fn robots(&self) -> &[Robot] {
        &self.robots
    }

    pub fn state(&self, id: &RobotId) -> Option<&RobotState> {
        self.states.get(id)
    }

    /// Robots paired with their state, in list order.
    pub fn iter(&self) -> impl Iterator<Item = (&Robot, &RobotState)> {
        self.robots.iter().map(|robot| {
            let state = self
                .states
                .get(&robot.id)
                .expect("every listed robot has a state entry");
            (robot, state)
        })
    }

    pub fn len(&self) -> usize {
        self.robots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.robots.is_empty()
    }
}
