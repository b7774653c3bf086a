// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thread CRUD operations.

use parlance_core::types::{Thread, ThreadId, UserId};
use rusqlite::{Connection, OptionalExtension, params};

pub fn insert_thread(conn: &Connection, thread: &Thread) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO threads (id, user_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            thread.id.as_str(),
            thread.user_id.as_str(),
            thread.name,
            thread.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_thread(conn: &Connection, id: &str) -> rusqlite::Result<Option<Thread>> {
    conn.query_row(
        "SELECT id, user_id, name, created_at FROM threads WHERE id = ?1",
        params![id],
        |row| {
            Ok(Thread {
                id: ThreadId(row.get(0)?),
                user_id: UserId(row.get(1)?),
                name: row.get(2)?,
                created_at: row.get(3)?,
            })
        },
    )
    .optional()
}
