// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Accumulate-only phoneme counters.
//!
//! Increments are single `INSERT ... ON CONFLICT DO UPDATE` statements that
//! add to the stored value, so concurrent batches never lose updates.

use parlance_core::types::{PhonemeStats, PhonemeSubstitution, UserId};
use rusqlite::{Connection, params};

pub fn increment_phoneme(
    conn: &Connection,
    user_id: &str,
    phoneme: &str,
    attempts: i64,
    correct: i64,
    deletions: i64,
    at: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO phoneme_stats
             (user_id, phoneme, total_attempts, correct_count, deletion_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(user_id, phoneme) DO UPDATE SET
             total_attempts = total_attempts + excluded.total_attempts,
             correct_count = correct_count + excluded.correct_count,
             deletion_count = deletion_count + excluded.deletion_count,
             updated_at = excluded.updated_at",
        params![user_id, phoneme, attempts, correct, deletions, at],
    )?;
    Ok(())
}

pub fn increment_substitution(
    conn: &Connection,
    user_id: &str,
    expected: &str,
    actual: &str,
    count: i64,
    at: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO phoneme_substitutions
             (user_id, expected_phoneme, actual_phoneme, occurrence_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(user_id, expected_phoneme, actual_phoneme) DO UPDATE SET
             occurrence_count = occurrence_count + excluded.occurrence_count,
             updated_at = excluded.updated_at",
        params![user_id, expected, actual, count, at],
    )?;
    Ok(())
}

/// All phoneme rows for a user, ordered by phoneme.
pub fn list_stats(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<PhonemeStats>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, phoneme, total_attempts, correct_count, deletion_count,
                created_at, updated_at
         FROM phoneme_stats WHERE user_id = ?1 ORDER BY phoneme",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(PhonemeStats {
            user_id: UserId(row.get(0)?),
            phoneme: row.get(1)?,
            total_attempts: row.get(2)?,
            correct_count: row.get(3)?,
            deletion_count: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    })?;
    rows.collect()
}

/// Most frequent substitutions first.
pub fn top_substitutions(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> rusqlite::Result<Vec<PhonemeSubstitution>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, expected_phoneme, actual_phoneme, occurrence_count,
                created_at, updated_at
         FROM phoneme_substitutions WHERE user_id = ?1
         ORDER BY occurrence_count DESC, expected_phoneme, actual_phoneme
         LIMIT ?2",
    )?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = stmt.query_map(params![user_id, limit], |row| {
        Ok(PhonemeSubstitution {
            user_id: UserId(row.get(0)?),
            expected_phoneme: row.get(1)?,
            actual_phoneme: row.get(2)?,
            occurrence_count: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    })?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_connection;

    #[test]
    fn first_increment_creates_then_adds() {
        let conn = test_connection();
        increment_phoneme(&conn, "u1", "θ", 1, 1, 0, "t1").unwrap();
        increment_phoneme(&conn, "u1", "θ", 2, 0, 1, "t2").unwrap();

        let stats = list_stats(&conn, "u1").unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_attempts, 3);
        assert_eq!(stats[0].correct_count, 1);
        assert_eq!(stats[0].deletion_count, 1);
        assert_eq!(stats[0].created_at, "t1");
        assert_eq!(stats[0].updated_at, "t2");
    }

    #[test]
    fn users_are_isolated() {
        let conn = test_connection();
        increment_phoneme(&conn, "u1", "θ", 1, 1, 0, "t").unwrap();
        increment_phoneme(&conn, "u2", "θ", 5, 0, 0, "t").unwrap();
        assert_eq!(list_stats(&conn, "u1").unwrap()[0].total_attempts, 1);
    }

    #[test]
    fn counts_cannot_exceed_attempts() {
        let conn = test_connection();
        assert!(increment_phoneme(&conn, "u1", "θ", 1, 2, 0, "t").is_err());
    }

    #[test]
    fn substitutions_ranked_by_count() {
        let conn = test_connection();
        increment_substitution(&conn, "u1", "θ", "s", 1, "t").unwrap();
        increment_substitution(&conn, "u1", "ɪ", "i", 2, "t").unwrap();
        increment_substitution(&conn, "u1", "θ", "s", 2, "t").unwrap();

        let top = top_substitutions(&conn, "u1", 10).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].expected_phoneme, "θ");
        assert_eq!(top[0].occurrence_count, 3);
        assert_eq!(top[1].actual_phoneme, "i");
        assert_eq!(top_substitutions(&conn, "u1", 1).unwrap().len(), 1);
    }
}
