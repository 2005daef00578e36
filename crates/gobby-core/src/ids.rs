//! ID generation and reference resolution shared by every store manager.
//!
//! Sessions get ULIDs (sortable, 26 chars). Tasks get a short hash id in
//! the `gt-xxxxxx` shape, derived from `(timestamp_ns, random, project_id)`
//! with retry-with-salt on collision, per the task ID contract.

use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Generate a new session ID. We don't depend on a ULID crate; a
/// millisecond timestamp prefix plus random suffix gives the same
/// sortable-unique-opaque-string property a ULID would.
pub fn new_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let rand = uuid::Uuid::new_v4().simple().to_string();
    format!("{millis:013x}{}", &rand[..13])
}

/// Generate a new project id (a plain UUID; projects are looked up by name
/// far more often than by id).
pub fn new_project_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Generate a `gt-xxxxxx` task id from a short hash of
/// `(timestamp_ns, salt, project_id)`. Callers retry with an incremented
/// salt on the rare collision (checked against the store).
pub fn new_task_id(project_id: &str, salt: u32) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut hasher = Sha256::new();
    hasher.update(nanos.to_le_bytes());
    hasher.update(salt.to_le_bytes());
    hasher.update(project_id.as_bytes());
    let digest = hasher.finalize();
    format!("gt-{}", hex_prefix(&digest, 6))
}

pub fn new_worktree_id() -> String {
    format!("wt-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
}

pub fn new_clone_id() -> String {
    format!("clone-{}", uuid::Uuid::new_v4())
}

pub fn new_agent_run_id() -> String {
    format!("run-{}", uuid::Uuid::new_v4())
}

pub fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn hex_prefix(bytes: &[u8], nibbles: usize) -> String {
    bytes
        .iter()
        .take(nibbles.div_ceil(2))
        .map(|b| format!("{b:02x}"))
        .collect::<String>()
        .chars()
        .take(nibbles)
        .collect()
}

/// A reference to an entity as typed by a human or CLI argument: a bare
/// project-scoped sequence number, a `#N` form, or a UUID / UUID prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    SeqNum(i64),
    Id(String),
    IdPrefix(String),
}

/// Parse a reference string as typed anywhere a task/session id is accepted:
/// `N`, `#N`, a full id, or an id prefix.
pub fn parse_ref(raw: &str) -> EntityRef {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(n) = digits.parse::<i64>() {
            return EntityRef::SeqNum(n);
        }
    }
    // Full ids are long enough that a short literal is unambiguously a
    // prefix; anything >= 20 chars we treat as a candidate full id, the
    // store falls back to prefix matching either way.
    if trimmed.len() >= 20 {
        EntityRef::Id(trimmed.to_string())
    } else {
        EntityRef::IdPrefix(trimmed.to_string())
    }
}

/// Resolve a candidate prefix against a set of full ids. Mirrors the
/// "0 -> NotFound, 1 -> match, >1 -> AmbiguousReference" contract shared by
/// `resolve_task_ref` and `resolve_session_ref`.
pub fn resolve_prefix<'a>(
    candidates: impl Iterator<Item = &'a str>,
    prefix: &str,
) -> Result<&'a str, usize> {
    let mut matches: Vec<&str> = candidates
        .filter(|id| id.to_ascii_lowercase().starts_with(&prefix.to_ascii_lowercase()))
        .collect();
    match matches.len() {
        1 => Ok(matches.pop().unwrap()),
        n => Err(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_format() {
        let id = new_task_id("proj-1", 0);
        assert!(id.starts_with("gt-"));
        assert_eq!(id.len(), 9);
    }

    #[test]
    fn test_task_id_salt_changes_id() {
        let a = new_task_id("proj-1", 0);
        let b = new_task_id("proj-1", 1);
        // Extremely unlikely to collide since salt feeds the hash directly.
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_ref_seq_num() {
        assert_eq!(parse_ref("42"), EntityRef::SeqNum(42));
        assert_eq!(parse_ref("#42"), EntityRef::SeqNum(42));
    }

    #[test]
    fn test_parse_ref_prefix_vs_full() {
        assert_eq!(parse_ref("gt-ab12cd"), EntityRef::IdPrefix("gt-ab12cd".to_string()));
        let full = "01234567890123456789012345";
        assert_eq!(parse_ref(full), EntityRef::Id(full.to_string()));
    }

    #[test]
    fn test_resolve_prefix_unique() {
        let ids = vec!["gt-aaaaaa", "gt-bbbbbb"];
        assert_eq!(resolve_prefix(ids.into_iter(), "gt-aa"), Ok("gt-aaaaaa"));
    }

    #[test]
    fn test_resolve_prefix_ambiguous() {
        let ids = vec!["gt-aaaaaa", "gt-aabbbb"];
        assert_eq!(resolve_prefix(ids.into_iter(), "gt-aa"), Err(2));
    }

    #[test]
    fn test_resolve_prefix_not_found() {
        let ids = vec!["gt-aaaaaa"];
        assert_eq!(resolve_prefix(ids.into_iter(), "gt-zz"), Err(0));
    }
}
