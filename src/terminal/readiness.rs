// ABOUTME: Tracks which required contracts are bound and derives the controller lifecycle state

use std::collections::BTreeSet;
use std::fmt;

/// Lifecycle of the terminal controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Not configured on a hub, or torn down after exit
    Unbound,
    /// Configured, waiting for at least one required contract
    PartiallyBound,
    /// Every required contract bound, waiting for login
    Ready,
    /// Accepting command lines
    Interactive,
    Exiting,
}

impl ControllerState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Ready | Self::Interactive)
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unbound => "unbound",
            Self::PartiallyBound => "waiting for services",
            Self::Ready => "ready",
            Self::Interactive => "interactive",
            Self::Exiting => "exiting",
        };
        f.write_str(label)
    }
}

/// Set of required contracts and the subset currently bound
#[derive(Debug, Clone, Default)]
pub struct Readiness {
    required: BTreeSet<&'static str>,
    bound: BTreeSet<&'static str>,
}

impl Readiness {
    pub fn new(required: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            required: required.into_iter().collect(),
            bound: BTreeSet::new(),
        }
    }

    pub fn is_required(&self, contract: &str) -> bool {
        self.required.contains(contract)
    }

    /// Records a bound contract; returns true when this bind completes the set
    pub fn bind(&mut self, contract: &'static str) -> bool {
        if !self.is_required(contract) {
            return false;
        }
        let was_ready = self.is_ready();
        self.bound.insert(contract);
        !was_ready && self.is_ready()
    }

    /// Records an unbound contract; returns true when the set was complete before
    pub fn unbind(&mut self, contract: &'static str) -> bool {
        if !self.is_required(contract) {
            return false;
        }
        let was_ready = self.is_ready();
        self.bound.remove(contract);
        was_ready
    }

    pub fn is_ready(&self) -> bool {
        self.bound.len() == self.required.len()
    }

    pub fn missing(&self) -> Vec<&'static str> {
        self.required.difference(&self.bound).copied().collect()
    }

    pub fn clear(&mut self) {
        self.bound.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_only_when_all_required_bound() {
        let mut readiness = Readiness::new(["ShellService", "StreamService"]);
        assert!(!readiness.is_ready());

        assert!(!readiness.bind("ShellService"));
        assert!(!readiness.is_ready());
        assert_eq!(readiness.missing(), vec!["StreamService"]);

        assert!(readiness.bind("StreamService"));
        assert!(readiness.is_ready());
    }

    #[test]
    fn test_optional_contracts_do_not_count() {
        let mut readiness = Readiness::new(["ShellService"]);
        assert!(!readiness.bind("AuthService"));
        assert!(!readiness.is_ready());
        assert!(readiness.bind("ShellService"));
        assert!(!readiness.unbind("AuthService"));
        assert!(readiness.is_ready());
    }

    #[test]
    fn test_unbind_reports_lost_readiness_once() {
        let mut readiness = Readiness::new(["ShellService", "StreamService"]);
        readiness.bind("ShellService");
        readiness.bind("StreamService");

        assert!(readiness.unbind("StreamService"));
        assert!(!readiness.unbind("ShellService"));
        assert!(!readiness.is_ready());
    }

    #[test]
    fn test_rebinding_same_contract_is_idempotent() {
        let mut readiness = Readiness::new(["ShellService"]);
        assert!(readiness.bind("ShellService"));
        assert!(!readiness.bind("ShellService"));
    }
}
