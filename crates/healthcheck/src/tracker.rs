//! Per-target availability tracking.

use crate::probe::Probe;
use crate::types::{EventKind, ProbeResult, Status, StatusEvent, Target, TargetState};
use chrono::Local;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Classify a transition between two consecutive checks
pub fn classify(previous: Status, new: Status) -> EventKind {
    match (previous, new) {
        (Status::Up, Status::Down) => EventKind::AlertDown,
        (Status::Down, Status::Up) => EventKind::AlertRecovered,
        _ => EventKind::Update,
    }
}

/// Owns the target list and one [`TargetState`] per target
pub struct HealthTracker<P> {
    probe: P,
    targets: Vec<Target>,
    states: HashMap<String, TargetState>,
}

impl<P: Probe> HealthTracker<P> {
    /// Create a tracker with every target in `Unknown` state.
    ///
    /// Targets sharing a name with an earlier one are ignored.
    pub fn new(probe: P, targets: Vec<Target>) -> Self {
        let mut states = HashMap::with_capacity(targets.len());
        let mut unique = Vec::with_capacity(targets.len());
        for target in targets {
            if states.contains_key(&target.name) {
                continue;
            }
            states.insert(target.name.clone(), TargetState::default());
            unique.push(target);
        }

        Self {
            probe,
            targets: unique,
            states,
        }
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Current state of a target
    pub fn state(&self, name: &str) -> Option<&TargetState> {
        self.states.get(name)
    }

    /// Current status of every target, keyed by name
    pub fn snapshot(&self) -> BTreeMap<String, Status> {
        self.states
            .iter()
            .map(|(name, state)| (name.clone(), state.status))
            .collect()
    }

    /// Initialization pass over all targets.
    ///
    /// Records each target's status without classifying anything: there is no
    /// previous status to compare against, so no event is produced.
    pub fn baseline(&mut self) -> BTreeMap<String, Status> {
        for index in 0..self.targets.len() {
            let result = self.run_probe(index);
            let name = result.target_name.clone();
            if let Some(state) = self.states.get_mut(&name) {
                state.status = result.status();
                state.consecutive_down_count = 0;
                state.last_checked_at = Some(result.checked_at);
            }
            debug!(target = %name, status = %result.status(), "Baseline check");
        }
        self.snapshot()
    }

    /// Check the target at `index` (in configuration order)
    pub fn check_at(&mut self, index: usize) -> Option<StatusEvent> {
        if index >= self.targets.len() {
            return None;
        }

        let result = self.run_probe(index);
        let target = &self.targets[index];
        let state = self.states.get_mut(&target.name)?;

        let previous = state.status;
        let new = result.status();

        match (previous, new) {
            (_, Status::Up) => state.consecutive_down_count = 0,
            (Status::Up | Status::Down, Status::Down) => {
                state.consecutive_down_count = state.consecutive_down_count.saturating_add(1);
            }
            // No known previous status to count from. A probe result is
            // always Up or Down, so a target never goes back to Unknown.
            (Status::Unknown, _) | (_, Status::Unknown) => {}
        }
        state.status = new;
        state.last_checked_at = Some(result.checked_at);

        let kind = classify(previous, new);
        debug!(
            target = %target.name,
            previous = %previous,
            new = %new,
            kind = ?kind,
            consecutive_down = state.consecutive_down_count,
            "Check completed"
        );

        Some(StatusEvent {
            kind,
            target_name: target.name.clone(),
            url: target.url.clone(),
            new_status: new,
            previous_status: previous,
            consecutive_down_count: state.consecutive_down_count,
            detail: result,
        })
    }

    /// Check a target by name
    pub fn check(&mut self, name: &str) -> Option<StatusEvent> {
        let index = self.targets.iter().position(|t| t.name == name)?;
        self.check_at(index)
    }

    /// Check every target once, in configuration order
    pub fn sweep(&mut self) -> Vec<StatusEvent> {
        (0..self.targets.len())
            .filter_map(|index| self.check_at(index))
            .collect()
    }

    fn run_probe(&self, index: usize) -> ProbeResult {
        let target = &self.targets[index];
        let outcome = self.probe.probe(&target.url);
        ProbeResult::from_outcome(target.name.clone(), outcome, Local::now())
    }
}
