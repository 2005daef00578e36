//! Inter-session messaging. Owns `inter_session_messages` exclusively.

use crate::models::{InterSessionMessage, MessagePriority};
use crate::store::SharedConn;
use chrono::Utc;
use gobby_core::ids::new_message_id;
use rusqlite::{params, OptionalExtension, Row};

pub struct MessageManager {
    conn: SharedConn,
}

fn priority_to_str(p: MessagePriority) -> &'static str {
    match p {
        MessagePriority::Normal => "normal",
        MessagePriority::Urgent => "urgent",
    }
}

fn priority_from_str(s: &str) -> MessagePriority {
    match s {
        "urgent" => MessagePriority::Urgent,
        _ => MessagePriority::Normal,
    }
}

fn row_to_message(row: &Row) -> rusqlite::Result<InterSessionMessage> {
    Ok(InterSessionMessage {
        id: row.get("id")?,
        from_session: row.get("from_session")?,
        to_session: row.get("to_session")?,
        content: row.get("content")?,
        priority: priority_from_str(&row.get::<_, String>("priority")?),
        sent_at: row.get("sent_at")?,
        read_at: row.get("read_at")?,
    })
}

impl MessageManager {
    pub(crate) fn new(conn: SharedConn) -> Self {
        Self { conn }
    }

    pub fn send(&self, from_session: &str, to_session: &str, content: &str, priority: MessagePriority) -> rusqlite::Result<InterSessionMessage> {
        let message = InterSessionMessage {
            id: new_message_id(),
            from_session: from_session.to_string(),
            to_session: to_session.to_string(),
            content: content.to_string(),
            priority,
            sent_at: Utc::now(),
            read_at: None,
        };
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO inter_session_messages (id, from_session, to_session, content, priority, sent_at, read_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7)",
            params![
                message.id,
                message.from_session,
                message.to_session,
                message.content,
                priority_to_str(message.priority),
                message.sent_at,
                message.read_at,
            ],
        )?;
        Ok(message)
    }

    pub fn list_unread(&self, to_session: &str) -> rusqlite::Result<Vec<InterSessionMessage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM inter_session_messages WHERE to_session = ?1 AND read_at IS NULL ORDER BY sent_at",
        )?;
        let rows = stmt.query_map(params![to_session], row_to_message)?;
        rows.collect()
    }

    pub fn mark_read(&self, id: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE inter_session_messages SET read_at = ?1 WHERE id = ?2",
            params![Utc::now(), id],
        )?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> rusqlite::Result<Option<InterSessionMessage>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM inter_session_messages WHERE id = ?1", params![id], row_to_message)
            .optional()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use gobby_core::CliSource;

    fn setup() -> (Store, String, String) {
        let store = Store::open_in_memory().unwrap();
        let p = store.projects().create("demo", "/tmp", "main").unwrap();
        let s1 = store.sessions().create(&p.id, CliSource::ClaudeCode, None, None).unwrap();
        let s2 = store.sessions().create(&p.id, CliSource::Codex, None, None).unwrap();
        (store, s1.id, s2.id)
    }

    #[test]
    fn test_send_and_list_unread() {
        let (store, s1, s2) = setup();
        store.messages().send(&s1, &s2, "status?", MessagePriority::Normal).unwrap();
        let unread = store.messages().list_unread(&s2).unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].from_session, s1);
    }

    #[test]
    fn test_mark_read_removes_from_unread() {
        let (store, s1, s2) = setup();
        let msg = store.messages().send(&s1, &s2, "done", MessagePriority::Urgent).unwrap();
        store.messages().mark_read(&msg.id).unwrap();
        let unread = store.messages().list_unread(&s2).unwrap();
        assert!(unread.is_empty());
    }
}
