// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message rows and guarded pronunciation status updates.
//!
//! Every status update carries a `WHERE pronunciation_status = <from>` guard
//! and reports whether it matched, so terminal states can never be left.

use std::str::FromStr;

use parlance_core::types::{Message, MessageId, PronunciationStatus, Role, ThreadId};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::text_conversion_err;

const MESSAGE_COLUMNS: &str = "id, thread_id, role, content, audio_ref, audio_duration_secs,
     pronunciation_status, pronunciation_result, pronunciation_error,
     pronunciation_updated_at, created_at";

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let role: String = row.get(2)?;
    let status: String = row.get(6)?;
    let result: Option<String> = row.get(7)?;
    let pronunciation_result = result
        .map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(|e| text_conversion_err(7, e))?;

    Ok(Message {
        id: MessageId(row.get(0)?),
        thread_id: ThreadId(row.get(1)?),
        role: Role::from_str(&role).map_err(|e| text_conversion_err(2, e))?,
        content: row.get(3)?,
        audio_ref: row.get(4)?,
        audio_duration_secs: row.get(5)?,
        pronunciation_status: PronunciationStatus::from_str(&status)
            .map_err(|e| text_conversion_err(6, e))?,
        pronunciation_result,
        pronunciation_error: row.get(8)?,
        pronunciation_updated_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

pub fn insert_message(conn: &Connection, msg: &Message) -> rusqlite::Result<()> {
    let result = msg
        .pronunciation_result
        .as_ref()
        .map(serde_json::Value::to_string);
    conn.execute(
        "INSERT INTO messages (id, thread_id, role, content, audio_ref, audio_duration_secs,
                               pronunciation_status, pronunciation_result, pronunciation_error,
                               pronunciation_updated_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            msg.id.as_str(),
            msg.thread_id.as_str(),
            msg.role.to_string(),
            msg.content,
            msg.audio_ref,
            msg.audio_duration_secs,
            msg.pronunciation_status.to_string(),
            result,
            msg.pronunciation_error,
            msg.pronunciation_updated_at,
            msg.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_message(conn: &Connection, id: &str) -> rusqlite::Result<Option<Message>> {
    conn.query_row(
        &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
        params![id],
        message_from_row,
    )
    .optional()
}

/// Messages of a thread in chronological order.
pub fn messages_for_thread(conn: &Connection, thread_id: &str) -> rusqlite::Result<Vec<Message>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE thread_id = ?1
         ORDER BY created_at ASC, rowid ASC"
    ))?;
    let rows = stmt.query_map(params![thread_id], message_from_row)?;
    rows.collect()
}

/// `none → pending`. Returns whether a row matched.
pub fn mark_pending(conn: &Connection, id: &str, at: &str) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE messages
         SET pronunciation_status = 'pending', pronunciation_updated_at = ?2
         WHERE id = ?1 AND pronunciation_status = 'none'",
        params![id, at],
    )?;
    Ok(changed == 1)
}

/// `pending → complete`. The transcript fills `content` only when it is empty.
pub fn mark_complete(
    conn: &Connection,
    id: &str,
    transcript: &str,
    result: &serde_json::Value,
    audio_duration_secs: Option<f64>,
    at: &str,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE messages
         SET pronunciation_status = 'complete',
             pronunciation_result = ?2,
             pronunciation_error = NULL,
             content = CASE WHEN content = '' THEN ?3 ELSE content END,
             audio_duration_secs = COALESCE(?4, audio_duration_secs),
             pronunciation_updated_at = ?5
         WHERE id = ?1 AND pronunciation_status = 'pending'",
        params![id, result.to_string(), transcript, audio_duration_secs, at],
    )?;
    Ok(changed == 1)
}

/// `pending → failed`.
pub fn mark_failed(conn: &Connection, id: &str, error: &str, at: &str) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE messages
         SET pronunciation_status = 'failed',
             pronunciation_error = ?2,
             pronunciation_updated_at = ?3
         WHERE id = ?1 AND pronunciation_status = 'pending'",
        params![id, error, at],
    )?;
    Ok(changed == 1)
}

/// Number of messages per pronunciation status.
pub fn count_by_status(conn: &Connection) -> rusqlite::Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT pronunciation_status, COUNT(*) FROM messages
         GROUP BY pronunciation_status ORDER BY pronunciation_status",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{test_connection, threads};
    use parlance_core::types::Thread;

    fn setup() -> Connection {
        let conn = test_connection();
        threads::insert_thread(
            &conn,
            &Thread {
                id: ThreadId("t1".into()),
                user_id: "u1".into(),
                name: "practice".into(),
                created_at: "2026-01-01T00:00:00.000Z".into(),
            },
        )
        .unwrap();
        conn
    }

    fn audio_message(id: &str) -> Message {
        Message::user_audio(MessageId(id.into()), ThreadId("t1".into()), format!("ref/{id}"))
    }

    #[test]
    fn insert_and_get_round_trips_fields() {
        let conn = setup();
        insert_message(&conn, &audio_message("m1")).unwrap();

        let msg = get_message(&conn, "m1").unwrap().unwrap();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.audio_ref.as_deref(), Some("ref/m1"));
        assert_eq!(msg.pronunciation_status, PronunciationStatus::None);
        assert!(msg.pronunciation_result.is_none());
        assert!(get_message(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn message_requires_existing_thread() {
        let conn = test_connection();
        assert!(insert_message(&conn, &audio_message("m1")).is_err());
    }

    #[test]
    fn full_success_path() {
        let conn = setup();
        insert_message(&conn, &audio_message("m1")).unwrap();

        assert!(mark_pending(&conn, "m1", "t1").unwrap());
        let result = serde_json::json!({"phoneme_count": 3});
        assert!(mark_complete(&conn, "m1", "think", &result, Some(1.5), "t2").unwrap());

        let msg = get_message(&conn, "m1").unwrap().unwrap();
        assert_eq!(msg.pronunciation_status, PronunciationStatus::Complete);
        assert_eq!(msg.pronunciation_result, Some(result));
        assert_eq!(msg.content, "think");
        assert_eq!(msg.audio_duration_secs, Some(1.5));
        assert_eq!(msg.pronunciation_updated_at.as_deref(), Some("t2"));
    }

    #[test]
    fn transcript_does_not_overwrite_existing_content() {
        let conn = setup();
        let mut msg = audio_message("m1");
        msg.content = "typed by user".into();
        insert_message(&conn, &msg).unwrap();
        mark_pending(&conn, "m1", "t1").unwrap();
        mark_complete(&conn, "m1", "heard", &serde_json::json!({}), None, "t2").unwrap();

        assert_eq!(get_message(&conn, "m1").unwrap().unwrap().content, "typed by user");
    }

    #[test]
    fn guards_reject_out_of_order_transitions() {
        let conn = setup();
        insert_message(&conn, &audio_message("m1")).unwrap();

        // none → complete / failed skip pending.
        assert!(!mark_complete(&conn, "m1", "", &serde_json::json!({}), None, "t").unwrap());
        assert!(!mark_failed(&conn, "m1", "X: y", "t").unwrap());

        assert!(mark_pending(&conn, "m1", "t").unwrap());
        assert!(!mark_pending(&conn, "m1", "t").unwrap());
        assert!(mark_failed(&conn, "m1", "TIMEOUT: slow", "t").unwrap());

        // failed is terminal.
        assert!(!mark_complete(&conn, "m1", "", &serde_json::json!({}), None, "t").unwrap());
        assert!(!mark_pending(&conn, "m1", "t").unwrap());

        let msg = get_message(&conn, "m1").unwrap().unwrap();
        assert_eq!(msg.pronunciation_status, PronunciationStatus::Failed);
        assert_eq!(msg.pronunciation_error.as_deref(), Some("TIMEOUT: slow"));
    }

    #[test]
    fn thread_listing_and_status_counts() {
        let conn = setup();
        insert_message(&conn, &audio_message("m1")).unwrap();
        insert_message(
            &conn,
            &Message::text(ThreadId("t1".into()), Role::Assistant, "hello".into()),
        )
        .unwrap();
        mark_pending(&conn, "m1", "t").unwrap();

        assert_eq!(messages_for_thread(&conn, "t1").unwrap().len(), 2);
        let counts = count_by_status(&conn).unwrap();
        assert_eq!(counts, vec![("none".to_string(), 1), ("pending".to_string(), 1)]);
    }
}
