// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parlance credits`, `parlance top-up` and `parlance refresh`.

use chrono::Utc;
use parlance_config::ParlanceConfig;
use parlance_core::types::{CreditTransaction, Credits};
use parlance_core::{ParlanceError, UserId};
use parlance_ledger::CreditLedger;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct CreditsView {
    credits: Credits,
    /// False when the balance disagrees with the transaction log.
    consistent: bool,
    history: Vec<CreditTransaction>,
}

pub async fn run_credits(
    config: &ParlanceConfig,
    user: &str,
    history: usize,
    json: bool,
) -> Result<(), ParlanceError> {
    let storage = crate::open_storage(config).await?;
    let ledger = CreditLedger::new(storage);
    let user_id = UserId(user.to_string());

    let credits = ledger.credits(&user_id).await?;
    let consistent = match ledger.verify_balance(&user_id).await {
        Ok(_) => true,
        Err(ParlanceError::LedgerDrift { .. }) => false,
        Err(e) => return Err(e),
    };
    let view = CreditsView {
        credits,
        consistent,
        history: ledger.history(&user_id, history).await?,
    };

    if json {
        let rendered = serde_json::to_string_pretty(&view)
            .map_err(|e| ParlanceError::Internal(format!("failed to render credits: {e}")))?;
        println!("{rendered}");
        return Ok(());
    }

    let c = &view.credits;
    println!("user:       {}", c.user_id);
    println!("balance:    {}", c.balance);
    println!("allowance:  {} ({} used this period)", c.monthly_allowance, c.used_this_period);
    println!("refreshed:  {}", c.last_refreshed_at);
    if !view.consistent {
        println!("warning:    balance does not match the transaction log");
    }
    if !view.history.is_empty() {
        println!();
        for tx in &view.history {
            println!("{}", format_transaction(tx));
        }
    }
    Ok(())
}

pub async fn run_top_up(
    config: &ParlanceConfig,
    user: &str,
    amount: i64,
    reason: &str,
    reference: Option<&str>,
) -> Result<(), ParlanceError> {
    let storage = crate::open_storage(config).await?;
    let ledger = CreditLedger::new(storage);
    let user_id = UserId(user.to_string());

    ledger
        .initialize(&user_id, config.credits.default_allowance)
        .await?;
    let tx = ledger.top_up(&user_id, amount, reason, reference).await?;
    println!("{}", format_transaction(&tx));
    Ok(())
}

pub async fn run_refresh(
    config: &ParlanceConfig,
    user: &str,
    force: bool,
    allowance: Option<i64>,
) -> Result<(), ParlanceError> {
    let storage = crate::open_storage(config).await?;
    let ledger = CreditLedger::new(storage);
    let user_id = UserId(user.to_string());

    if let Some(allowance) = allowance {
        ledger.update_allowance(&user_id, allowance).await?;
    }
    let refreshed = if force {
        Some(ledger.refresh_monthly(&user_id).await?)
    } else {
        ledger.refresh_if_due(&user_id, Utc::now()).await?
    };

    match refreshed {
        Some(tx) => println!("{}", format_transaction(&tx)),
        None => println!("not due; balance is {}", ledger.balance(&user_id).await?),
    }
    Ok(())
}

/// One history line: time, kind, signed amount, resulting balance, reason.
fn format_transaction(tx: &CreditTransaction) -> String {
    let mut line = format!(
        "{}  {:<7} {:>+6}  -> {:>6}  {}",
        tx.created_at,
        tx.kind.to_string(),
        tx.amount,
        tx.balance_after,
        tx.reason
    );
    if let Some(reference) = &tx.reference {
        line.push_str(&format!(" ({reference})"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlance_core::types::TransactionKind;

    #[test]
    fn transaction_lines_show_sign_and_reference() {
        let mut tx = CreditTransaction::new(
            UserId("u1".into()),
            TransactionKind::Debit,
            -5,
            3,
            Some("m1".into()),
            "audio turn",
        );
        tx.created_at = "2026-10-01T00:00:00.000Z".into();
        assert_eq!(
            format_transaction(&tx),
            "2026-10-01T00:00:00.000Z  debit       -5  ->      3  audio turn (m1)"
        );

        tx.kind = TransactionKind::Credit;
        tx.amount = 50;
        tx.reference = None;
        assert!(format_transaction(&tx).contains("credit     +50"));
    }
}
