// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credits rows and the credit transaction log.

use std::str::FromStr;

use parlance_core::types::{CreditTransaction, Credits, TransactionKind, UserId};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::text_conversion_err;

fn credits_from_row(row: &Row<'_>) -> rusqlite::Result<Credits> {
    Ok(Credits {
        user_id: UserId(row.get(0)?),
        balance: row.get(1)?,
        monthly_allowance: row.get(2)?,
        used_this_period: row.get(3)?,
        last_refreshed_at: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<CreditTransaction> {
    let kind: String = row.get(2)?;
    Ok(CreditTransaction {
        id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        kind: TransactionKind::from_str(&kind).map_err(|e| text_conversion_err(2, e))?,
        amount: row.get(3)?,
        balance_after: row.get(4)?,
        reference: row.get(5)?,
        reason: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn get_credits(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<Credits>> {
    conn.query_row(
        "SELECT user_id, balance, monthly_allowance, used_this_period,
                last_refreshed_at, created_at, updated_at
         FROM credits WHERE user_id = ?1",
        params![user_id],
        credits_from_row,
    )
    .optional()
}

pub fn insert_credits(conn: &Connection, credits: &Credits) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO credits (user_id, balance, monthly_allowance, used_this_period,
                              last_refreshed_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            credits.user_id.as_str(),
            credits.balance,
            credits.monthly_allowance,
            credits.used_this_period,
            credits.last_refreshed_at,
            credits.created_at,
            credits.updated_at,
        ],
    )?;
    Ok(())
}

/// Applies the deltas in one statement. Returns the new balance, or `None`
/// when the user has no credits row. A negative result violates the
/// `balance >= 0` check and surfaces as a constraint error.
pub fn apply_balance_delta(
    conn: &Connection,
    user_id: &str,
    delta: i64,
    usage_delta: i64,
    at: &str,
) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "UPDATE credits
         SET balance = balance + ?2,
             used_this_period = used_this_period + ?3,
             updated_at = ?4
         WHERE user_id = ?1
         RETURNING balance",
        params![user_id, delta, usage_delta, at],
        |row| row.get(0),
    )
    .optional()
}

/// Returns the number of rows changed (0 or 1).
pub fn reset_period(
    conn: &Connection,
    user_id: &str,
    balance: i64,
    at: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE credits
         SET balance = ?2, used_this_period = 0, last_refreshed_at = ?3, updated_at = ?3
         WHERE user_id = ?1",
        params![user_id, balance, at],
    )
}

/// Returns the number of rows changed (0 or 1).
pub fn set_allowance(
    conn: &Connection,
    user_id: &str,
    allowance: i64,
    at: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE credits SET monthly_allowance = ?2, updated_at = ?3 WHERE user_id = ?1",
        params![user_id, allowance, at],
    )
}

pub fn insert_transaction(conn: &Connection, tx: &CreditTransaction) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO credit_transactions
             (id, user_id, kind, amount, balance_after, reference, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            tx.id,
            tx.user_id.as_str(),
            tx.kind.to_string(),
            tx.amount,
            tx.balance_after,
            tx.reference,
            tx.reason,
            tx.created_at,
        ],
    )?;
    Ok(())
}

/// Newest first. Rows sharing a timestamp fall back to insertion order.
pub fn list_transactions(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> rusqlite::Result<Vec<CreditTransaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, kind, amount, balance_after, reference, reason, created_at
         FROM credit_transactions
         WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?2",
    )?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = stmt.query_map(params![user_id, limit], transaction_from_row)?;
    rows.collect()
}

pub fn transaction_sum(conn: &Connection, user_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM credit_transactions WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )
}
