//! Numbered schema migrations. Every migration is plain idempotent DDL run
//! inside one transaction at startup; a schema mismatch (a migration that
//! fails to apply) fails the daemon fast rather than running degraded.

use rusqlite::Connection;

/// Current schema version. Bump alongside adding a migration below.
pub const SCHEMA_VERSION: i64 = 1;

const MIGRATIONS: &[&str] = &[
    // 1: initial schema
    r#"
    CREATE TABLE IF NOT EXISTS projects (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        repo_path TEXT NOT NULL,
        base_branch TEXT NOT NULL DEFAULT 'main',
        github_url TEXT,
        is_orphaned INTEGER NOT NULL DEFAULT 0,
        protected INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        project_id TEXT NOT NULL REFERENCES projects(id),
        source TEXT NOT NULL,
        seq_num INTEGER NOT NULL,
        parent_session_id TEXT REFERENCES sessions(id),
        spawned_by_agent_id TEXT,
        agent_depth INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'active',
        summary_markdown TEXT,
        terminal_context TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE(project_id, seq_num)
    );

    CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        project_id TEXT NOT NULL REFERENCES projects(id),
        parent_task_id TEXT REFERENCES tasks(id),
        seq_num INTEGER NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        details TEXT,
        test_strategy TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        priority INTEGER NOT NULL DEFAULT 2,
        type TEXT NOT NULL DEFAULT 'task',
        labels TEXT NOT NULL DEFAULT '[]',
        validation_criteria TEXT,
        validation_fail_count INTEGER NOT NULL DEFAULT 0,
        validation_status TEXT,
        validation_feedback TEXT,
        commits TEXT NOT NULL DEFAULT '[]',
        closed_in_session_id TEXT,
        closed_commit_sha TEXT,
        created_in_session_id TEXT,
        compacted_at TEXT,
        summary TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE(project_id, seq_num)
    );

    CREATE TABLE IF NOT EXISTS task_dependencies (
        task_id TEXT NOT NULL REFERENCES tasks(id),
        depends_on TEXT NOT NULL REFERENCES tasks(id),
        dep_type TEXT NOT NULL,
        PRIMARY KEY (task_id, depends_on, dep_type)
    );

    CREATE TABLE IF NOT EXISTS workflow_states (
        session_id TEXT PRIMARY KEY REFERENCES sessions(id),
        workflow_name TEXT NOT NULL,
        definition_snapshot TEXT NOT NULL,
        current_phase TEXT NOT NULL,
        phase_entered_at TEXT NOT NULL,
        phase_action_count INTEGER NOT NULL DEFAULT 0,
        total_action_count INTEGER NOT NULL DEFAULT 0,
        variables TEXT NOT NULL DEFAULT '{}',
        artifacts TEXT NOT NULL DEFAULT '{}',
        reflection_pending INTEGER NOT NULL DEFAULT 0,
        context_injected INTEGER NOT NULL DEFAULT 0,
        pending_approval TEXT,
        active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS workflow_audit_log (
        rowid_seq INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        phase TEXT NOT NULL,
        event_type TEXT NOT NULL,
        tool_name TEXT,
        rule_id TEXT,
        condition TEXT,
        result TEXT NOT NULL,
        reason TEXT NOT NULL,
        context TEXT NOT NULL DEFAULT '{}'
    );

    CREATE TABLE IF NOT EXISTS agent_runs (
        id TEXT PRIMARY KEY,
        parent_session_id TEXT NOT NULL REFERENCES sessions(id),
        child_session_id TEXT REFERENCES sessions(id),
        workflow_name TEXT,
        provider TEXT NOT NULL,
        model TEXT,
        status TEXT NOT NULL DEFAULT 'running',
        prompt TEXT NOT NULL,
        isolation TEXT NOT NULL,
        mode TEXT NOT NULL,
        worktree_id TEXT,
        clone_id TEXT,
        result TEXT,
        started_at TEXT NOT NULL,
        completed_at TEXT
    );

    CREATE TABLE IF NOT EXISTS worktrees (
        id TEXT PRIMARY KEY,
        project_id TEXT NOT NULL REFERENCES projects(id),
        task_id TEXT,
        branch_name TEXT NOT NULL,
        worktree_path TEXT NOT NULL,
        base_branch TEXT NOT NULL,
        agent_session_id TEXT,
        status TEXT NOT NULL DEFAULT 'active',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS clones (
        id TEXT PRIMARY KEY,
        project_id TEXT NOT NULL REFERENCES projects(id),
        task_id TEXT,
        branch_name TEXT NOT NULL,
        clone_path TEXT NOT NULL,
        base_branch TEXT NOT NULL,
        remote_url TEXT NOT NULL,
        agent_session_id TEXT,
        status TEXT NOT NULL DEFAULT 'active',
        last_sync_at TEXT,
        cleanup_after TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS inter_session_messages (
        id TEXT PRIMARY KEY,
        from_session TEXT NOT NULL,
        to_session TEXT NOT NULL,
        content TEXT NOT NULL,
        priority TEXT NOT NULL DEFAULT 'normal',
        sent_at TEXT NOT NULL,
        read_at TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_tasks_project_status ON tasks(project_id, status);
    CREATE INDEX IF NOT EXISTS idx_task_deps_depends_on ON task_dependencies(depends_on);
    CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project_id);
    CREATE INDEX IF NOT EXISTS idx_audit_session ON workflow_audit_log(session_id, rowid_seq);
    CREATE INDEX IF NOT EXISTS idx_messages_to ON inter_session_messages(to_session, read_at);
    "#,
];

/// Run every migration not yet applied, inside one transaction. Each
/// statement is `CREATE TABLE IF NOT EXISTS` / `CREATE INDEX IF NOT
/// EXISTS`, so re-running a migration that already applied is a no-op.
pub fn run_migrations(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "journal_mode", "WAL")?;

    let current: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    let tx = conn.transaction()?;
    for (idx, migration) in MIGRATIONS.iter().enumerate() {
        let version = (idx + 1) as i64;
        if version <= current {
            continue;
        }
        tx.execute_batch(migration)?;
    }
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='tasks'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0)).unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_user_version_set() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        let v: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0)).unwrap();
        assert_eq!(v, SCHEMA_VERSION);
    }
}
