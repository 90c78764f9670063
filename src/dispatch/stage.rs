use std::sync::{Mutex, PoisonError};
use strum_macros::{AsRefStr, Display, EnumIter};

/// Where a request is in the dispatch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Received,
    Routed,
    DependenciesResolved,
    Validated,
    Handled,
    ResponseReady,
    Sent,
}

impl Stage {
    /// The stage that follows, `Sent` being terminal.
    pub fn next(self) -> Stage {
        match self {
            Stage::Received => Stage::Routed,
            Stage::Routed => Stage::DependenciesResolved,
            Stage::DependenciesResolved => Stage::Validated,
            Stage::Validated => Stage::Handled,
            Stage::Handled => Stage::ResponseReady,
            Stage::ResponseReady | Stage::Sent => Stage::Sent,
        }
    }
}

/// Last stage a request completed. Shared between the dispatcher and the
/// terminal link of the middleware chain.
#[derive(Debug)]
pub(crate) struct StageTracker {
    current: Mutex<Stage>,
}

impl StageTracker {
    pub(crate) fn new() -> Self {
        Self {
            current: Mutex::new(Stage::Received),
        }
    }

    pub(crate) fn advance(&self, stage: Stage) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        debug_assert!(stage >= *current, "stage moved backwards: {current} -> {stage}");
        *current = stage;
    }

    pub(crate) fn current(&self) -> Stage {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The stage a request did not reach when it failed.
    pub(crate) fn failed_at(&self) -> Stage {
        self.current().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_stages_are_ordered() {
        let stages: Vec<Stage> = Stage::iter().collect();
        for pair in stages.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].next(), pair[1]);
        }
        assert_eq!(Stage::Sent.next(), Stage::Sent);
        assert_eq!(Stage::DependenciesResolved.to_string(), "dependencies_resolved");
    }

    #[test]
    fn test_tracker() {
        let tracker = StageTracker::new();
        assert_eq!(tracker.failed_at(), Stage::Routed);
        tracker.advance(Stage::Validated);
        assert_eq!(tracker.current(), Stage::Validated);
        assert_eq!(tracker.failed_at(), Stage::Handled);
    }
}
