//! `GitOps`: the git subprocess layer treated as a capability the
//! orchestrator and task engine depend on through a trait, never directly
//! on a `git` binary path. Worktree and shallow-clone primitives back the
//! two isolated agent modes; `merge` escalates through the conflict
//! resolution tiers in spec §4.6.

pub mod merge;
pub mod ops;

pub use merge::{resolve_merge, ConflictFile, MergeOutcome, MergeResolution, MergeTier};
pub use ops::{GitOps, MergeAttempt, ProcessGitOps};
