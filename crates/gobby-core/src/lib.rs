//! Shared types, error taxonomy and configuration loader used by every
//! gobby crate: the vocabulary the store, engine and orchestrator all
//! speak without depending on each other.

pub mod audit;
pub mod config;
pub mod error;
pub mod ids;
pub mod types;

pub use audit::{AuditEventType, AuditResult, WorkflowAuditEntry};
pub use config::DaemonConfig;
pub use error::GobbyError;
pub use types::*;
