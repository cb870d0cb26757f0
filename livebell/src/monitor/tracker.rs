//! Per-channel liveness state across poll cycles.

use std::collections::HashMap;

/// Result of comparing a new observation with the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    BecameLive,
    BecameOffline,
}

/// How a channel that has never been observed is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownPolicy {
    /// Unknown compares as offline: a channel already live on its first
    /// check produces [`Transition::BecameLive`].
    #[default]
    TreatAsOffline,
    /// The first observation only records a baseline and never produces a
    /// transition.
    Baseline,
}

/// Last observed liveness of every channel seen so far.
///
/// Absence from the map means "unknown". Entries are never removed; channels
/// nobody follows any more simply stop being observed.
#[derive(Debug, Default)]
pub struct LivenessTracker {
    states: HashMap<String, bool>,
    policy: UnknownPolicy,
}

impl LivenessTracker {
    pub fn new(policy: UnknownPolicy) -> Self {
        Self {
            states: HashMap::new(),
            policy,
        }
    }

    /// Record an observation and report the transition it implies.
    ///
    /// The stored state is always updated to `is_live`.
    pub fn observe(&mut self, channel: &str, is_live: bool) -> Transition {
        let previous = self.states.insert(channel.to_string(), is_live);

        let previous = match (previous, self.policy) {
            (Some(prev), _) => prev,
            (None, UnknownPolicy::TreatAsOffline) => false,
            (None, UnknownPolicy::Baseline) => return Transition::None,
        };

        match (previous, is_live) {
            (false, true) => Transition::BecameLive,
            (true, false) => Transition::BecameOffline,
            _ => Transition::None,
        }
    }

    /// Last observed state, `None` if the channel was never observed.
    pub fn get(&self, channel: &str) -> Option<bool> {
        self.states.get(channel).copied()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Number of channels currently recorded as live.
    pub fn live_count(&self) -> usize {
        self.states.values().filter(|live| **live).count()
    }
}
