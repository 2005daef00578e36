//! The in-memory table of agents currently running under this daemon
//! process. The durable record is the `AgentRun` row; this registry is
//! the mutex-guarded index the orchestrator consults for O(1) lookups and
//! `kill`, mirroring the diagnostic-carrying intent of a session lock file
//! without needing cross-process visibility — a single daemon owns every
//! spawn.

use gobby_core::{IsolationMode, SpawnMode};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::oneshot;

/// What the orchestrator needs to reach a running agent again: enough to
/// signal it, poll it, or tear it down.
pub struct RegistryEntry {
    pub run_id: String,
    pub session_id: String,
    pub isolation: IsolationMode,
    pub mode: SpawnMode,
    pub pid: Option<u32>,
    /// PTY master fd for `embedded` spawns; closed on kill/cleanup.
    pub master_fd: Option<i32>,
    /// Set for `in_process` runs: sending on this cancels the agentic loop.
    pub cancel: Option<oneshot::Sender<()>>,
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("run_id", &self.run_id)
            .field("session_id", &self.session_id)
            .field("isolation", &self.isolation)
            .field("mode", &self.mode)
            .field("pid", &self.pid)
            .finish()
    }
}

#[derive(Default)]
pub struct RunningAgentRegistry {
    entries: Mutex<HashMap<String, RegistryEntry>>,
}

impl RunningAgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: RegistryEntry) {
        self.entries.lock().unwrap().insert(entry.run_id.clone(), entry);
    }

    pub fn remove(&self, run_id: &str) -> Option<RegistryEntry> {
        self.entries.lock().unwrap().remove(run_id)
    }

    pub fn pid_of(&self, run_id: &str) -> Option<u32> {
        self.entries.lock().unwrap().get(run_id).and_then(|e| e.pid)
    }

    pub fn contains(&self, run_id: &str) -> bool {
        self.entries.lock().unwrap().contains_key(run_id)
    }

    pub fn take_cancel(&self, run_id: &str) -> Option<oneshot::Sender<()>> {
        self.entries.lock().unwrap().get_mut(run_id).and_then(|e| e.cancel.take())
    }

    pub fn session_id_of(&self, run_id: &str) -> Option<String> {
        self.entries.lock().unwrap().get(run_id).map(|e| e.session_id.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_remove_roundtrip() {
        let registry = RunningAgentRegistry::new();
        registry.insert(RegistryEntry {
            run_id: "run-1".into(),
            session_id: "sess-1".into(),
            isolation: IsolationMode::Current,
            mode: SpawnMode::Headless,
            pid: Some(4242),
            master_fd: None,
            cancel: None,
        });
        assert!(registry.contains("run-1"));
        assert_eq!(registry.pid_of("run-1"), Some(4242));
        let removed = registry.remove("run-1").unwrap();
        assert_eq!(removed.session_id, "sess-1");
        assert!(!registry.contains("run-1"));
    }

    #[test]
    fn test_take_cancel_is_one_shot() {
        let registry = RunningAgentRegistry::new();
        let (tx, _rx) = oneshot::channel();
        registry.insert(RegistryEntry {
            run_id: "run-2".into(),
            session_id: "sess-2".into(),
            isolation: IsolationMode::Current,
            mode: SpawnMode::InProcess,
            pid: None,
            master_fd: None,
            cancel: Some(tx),
        });
        assert!(registry.take_cancel("run-2").is_some());
        assert!(registry.take_cancel("run-2").is_none());
    }
}
