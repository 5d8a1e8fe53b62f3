//! Registry of log workers for one aggregation run

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

/// Lifecycle of a single log worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Idle,
    Streaming,
    Completed,
    Failed,
    /// Stopped by the group's cancellation signal
    Cancelled,
}

impl WorkerState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkerState::Completed | WorkerState::Failed | WorkerState::Cancelled
        )
    }
}

/// Instance name -> worker state, shared between the group and its workers
#[derive(Debug, Clone, Default)]
pub struct WorkerRegistry {
    states: Arc<DashMap<String, WorkerState>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, instance: &str, state: WorkerState) {
        self.states.insert(instance.to_string(), state);
    }

    pub fn get(&self, instance: &str) -> Option<WorkerState> {
        self.states.get(instance).map(|s| *s)
    }

    /// All workers sorted by instance name
    pub fn snapshot(&self) -> Vec<(String, WorkerState)> {
        let mut entries: Vec<_> = self
            .states
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn count(&self, state: WorkerState) -> usize {
        self.states.iter().filter(|e| *e.value() == state).count()
    }

    /// Number of workers not yet in a terminal state
    pub fn active(&self) -> usize {
        self.states.iter().filter(|e| !e.value().is_terminal()).count()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_tracks_states() {
        let registry = WorkerRegistry::new();
        registry.set("b", WorkerState::Idle);
        registry.set("a", WorkerState::Streaming);
        registry.set("b", WorkerState::Failed);

        assert_eq!(registry.get("b"), Some(WorkerState::Failed));
        assert_eq!(registry.get("c"), None);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.active(), 1);
        assert_eq!(registry.count(WorkerState::Failed), 1);
        assert_eq!(
            registry.snapshot(),
            vec![
                ("a".to_string(), WorkerState::Streaming),
                ("b".to_string(), WorkerState::Failed)
            ]
        );
    }

    #[test]
    fn test_clones_share_state() {
        let registry = WorkerRegistry::new();
        let clone = registry.clone();
        clone.set("a", WorkerState::Completed);
        assert_eq!(registry.get("a"), Some(WorkerState::Completed));
    }
}
