//! The agent orchestration layer: spawns subagents across three isolation
//! modes and four execution modes, tracks them in an in-memory registry
//! backed by the durable `AgentRun` row, and exposes lifecycle, messaging,
//! and merge-resolution operations to callers (the CLI, the conductor
//! loop, and in-process agents calling `start_agent`/`wait_for_task`).

pub mod executor;
pub mod isolation;
pub mod orchestrator;
pub mod prompt;
pub mod registry;
pub mod spawner;

pub use isolation::{CloneIsolationHandler, CurrentIsolationHandler, IsolationHandler, IsolationPrep, WorktreeIsolationHandler};
pub use orchestrator::{AgentOrchestrator, SpawnParams, WaitOutcome};
pub use registry::{RegistryEntry, RunningAgentRegistry};
pub use spawner::{EmbeddedSpawner, HeadlessSpawner, SpawnHandle, Spawner, TerminalSpawner};
