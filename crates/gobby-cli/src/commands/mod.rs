//! One module per noun in [`crate::cli::Commands`], mirroring
//! `cli-sub-agent`'s `session_cmds`/`todo_cmd`/etc. split.

pub mod agents;
pub mod clones;
pub mod conductor;
pub mod daemon;
pub mod projects;
pub mod sessions;
pub mod tasks;
pub mod workflows;
pub mod worktrees;
