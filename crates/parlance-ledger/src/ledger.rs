// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prepaid credit ledger.
//!
//! Every balance change is paired with an append-only [`CreditTransaction`]
//! written in the same storage transaction, so a user's balance always equals
//! the signed sum of their transaction amounts. Charges are checked and
//! applied inside one transaction; the storage layer serializes concurrent
//! transactions, so two charges racing for the same balance cannot both pass
//! the check.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parlance_core::types::{
    CreditTransaction, Credits, TransactionKind, UserId, now_timestamp,
};
use parlance_core::{CreditRepo, ParlanceError, UnitOfWork, work};
use tracing::{debug, info, warn};

use crate::period::refresh_due;

/// Debits `amount` from `user_id` inside an already open scope.
///
/// Fails with `InvalidAmount` for non-positive amounts, `NotFound` when the
/// user has no credits row and `InsufficientCredits` when the balance does
/// not cover the amount. Nothing is written on failure.
pub fn debit<S: CreditRepo + ?Sized>(
    scope: &mut S,
    user_id: &UserId,
    amount: i64,
    reason: &str,
    reference: Option<&str>,
) -> Result<CreditTransaction, ParlanceError> {
    if amount <= 0 {
        return Err(ParlanceError::InvalidAmount(amount));
    }
    let credits = scope
        .get_credits(user_id)?
        .ok_or_else(|| ParlanceError::not_found("credits", user_id.as_str()))?;
    if credits.balance < amount {
        return Err(ParlanceError::InsufficientCredits {
            user_id: user_id.to_string(),
            required: amount,
            available: credits.balance,
        });
    }

    let balance_after = scope.apply_balance_delta(user_id, -amount, amount)?;
    let tx = CreditTransaction::new(
        user_id.clone(),
        TransactionKind::Debit,
        -amount,
        balance_after,
        reference.map(str::to_string),
        reason,
    );
    scope.insert_credit_transaction(&tx)?;
    Ok(tx)
}

/// Resets the balance to the monthly allowance and logs the difference.
fn refresh_in<S: CreditRepo + ?Sized>(
    scope: &mut S,
    credits: &Credits,
) -> Result<CreditTransaction, ParlanceError> {
    let at = now_timestamp();
    let allowance = credits.monthly_allowance;
    scope.reset_period(&credits.user_id, allowance, &at)?;
    let tx = CreditTransaction::new(
        credits.user_id.clone(),
        TransactionKind::Refresh,
        allowance - credits.balance,
        allowance,
        None,
        "monthly refresh",
    );
    scope.insert_credit_transaction(&tx)?;
    Ok(tx)
}

/// Credit ledger over any [`UnitOfWork`].
pub struct CreditLedger<U> {
    store: Arc<U>,
}

impl<U> Clone for CreditLedger<U> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<U: UnitOfWork> CreditLedger<U> {
    pub fn new(store: Arc<U>) -> Self {
        Self { store }
    }

    /// `false` when the user has no credits row.
    pub async fn has_sufficient_credits(
        &self,
        user_id: &UserId,
        amount: i64,
    ) -> Result<bool, ParlanceError> {
        let user = user_id.clone();
        let credits = self
            .store
            .ambient(work(move |scope| scope.get_credits(&user)))
            .await?;
        Ok(credits.is_some_and(|c| c.balance >= amount))
    }

    /// Charges `amount` against the user's balance in one transaction.
    pub async fn charge(
        &self,
        user_id: &UserId,
        amount: i64,
        reason: &str,
        reference: Option<&str>,
    ) -> Result<CreditTransaction, ParlanceError> {
        let user = user_id.clone();
        let reason_owned = reason.to_string();
        let reference_owned = reference.map(str::to_string);
        let result = self
            .store
            .transaction(work(move |scope| {
                debit(scope, &user, amount, &reason_owned, reference_owned.as_deref())
            }))
            .await;

        match &result {
            Ok(tx) => info!(
                user_id = %user_id,
                amount,
                balance_after = tx.balance_after,
                reason,
                "credits charged"
            ),
            Err(ParlanceError::InsufficientCredits { available, .. }) => warn!(
                user_id = %user_id,
                required = amount,
                available,
                "charge rejected: insufficient credits"
            ),
            Err(_) => {}
        }
        result
    }

    /// Creates the user's credits row with `allowance` as both the opening
    /// balance and the monthly allowance, plus the matching `grant`.
    ///
    /// Returns the existing row unchanged if the user is already initialized.
    pub async fn initialize(
        &self,
        user_id: &UserId,
        allowance: i64,
    ) -> Result<Credits, ParlanceError> {
        if allowance < 0 {
            return Err(ParlanceError::InvalidAmount(allowance));
        }
        let user = user_id.clone();
        self.store
            .transaction(work(move |scope| {
                if let Some(existing) = scope.get_credits(&user)? {
                    return Ok(existing);
                }
                let at = now_timestamp();
                let credits = Credits {
                    user_id: user.clone(),
                    balance: allowance,
                    monthly_allowance: allowance,
                    used_this_period: 0,
                    last_refreshed_at: at.clone(),
                    created_at: at.clone(),
                    updated_at: at,
                };
                scope.insert_credits(&credits)?;
                scope.insert_credit_transaction(&CreditTransaction::new(
                    user,
                    TransactionKind::Grant,
                    allowance,
                    allowance,
                    None,
                    "opening balance",
                ))?;
                Ok(credits)
            }))
            .await
            .inspect(|c| debug!(user_id = %c.user_id, balance = c.balance, "credits initialized"))
    }

    /// Adds purchased credits.
    pub async fn top_up(
        &self,
        user_id: &UserId,
        amount: i64,
        reason: &str,
        reference: Option<&str>,
    ) -> Result<CreditTransaction, ParlanceError> {
        if amount <= 0 {
            return Err(ParlanceError::InvalidAmount(amount));
        }
        let user = user_id.clone();
        let reason_owned = reason.to_string();
        let reference_owned = reference.map(str::to_string);
        let tx = self
            .store
            .transaction(work(move |scope| {
                let balance_after = scope.apply_balance_delta(&user, amount, 0)?;
                let tx = CreditTransaction::new(
                    user,
                    TransactionKind::Credit,
                    amount,
                    balance_after,
                    reference_owned,
                    reason_owned,
                );
                scope.insert_credit_transaction(&tx)?;
                Ok(tx)
            }))
            .await?;
        info!(user_id = %user_id, amount, balance_after = tx.balance_after, "credits added");
        Ok(tx)
    }

    /// Resets the balance to the monthly allowance and starts a new period.
    pub async fn refresh_monthly(
        &self,
        user_id: &UserId,
    ) -> Result<CreditTransaction, ParlanceError> {
        let user = user_id.clone();
        let tx = self
            .store
            .transaction(work(move |scope| {
                let credits = scope
                    .get_credits(&user)?
                    .ok_or_else(|| ParlanceError::not_found("credits", user.as_str()))?;
                refresh_in(scope, &credits)
            }))
            .await?;
        info!(user_id = %user_id, delta = tx.amount, balance = tx.balance_after, "credits refreshed");
        Ok(tx)
    }

    /// Refreshes only if the last refresh was in an earlier month than `now`.
    pub async fn refresh_if_due(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<CreditTransaction>, ParlanceError> {
        let user = user_id.clone();
        self.store
            .transaction(work(move |scope| {
                let credits = scope
                    .get_credits(&user)?
                    .ok_or_else(|| ParlanceError::not_found("credits", user.as_str()))?;
                if !refresh_due(&credits.last_refreshed_at, now) {
                    return Ok(None);
                }
                refresh_in(scope, &credits).map(Some)
            }))
            .await
    }

    /// Changes the allowance used by future refreshes. The balance is untouched.
    pub async fn update_allowance(
        &self,
        user_id: &UserId,
        allowance: i64,
    ) -> Result<(), ParlanceError> {
        if allowance < 0 {
            return Err(ParlanceError::InvalidAmount(allowance));
        }
        let user = user_id.clone();
        self.store
            .ambient(work(move |scope| scope.set_allowance(&user, allowance)))
            .await
    }

    pub async fn credits(&self, user_id: &UserId) -> Result<Credits, ParlanceError> {
        let user = user_id.clone();
        self.store
            .ambient(work(move |scope| {
                scope
                    .get_credits(&user)?
                    .ok_or_else(|| ParlanceError::not_found("credits", user.as_str()))
            }))
            .await
    }

    pub async fn balance(&self, user_id: &UserId) -> Result<i64, ParlanceError> {
        Ok(self.credits(user_id).await?.balance)
    }

    /// Most recent transactions first.
    pub async fn history(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<CreditTransaction>, ParlanceError> {
        let user = user_id.clone();
        self.store
            .ambient(work(move |scope| scope.credit_transactions(&user, limit)))
            .await
    }

    /// Checks that the balance equals the sum of the transaction log.
    ///
    /// Returns the balance, or `LedgerDrift` when the two disagree.
    pub async fn verify_balance(&self, user_id: &UserId) -> Result<i64, ParlanceError> {
        let user = user_id.clone();
        self.store
            .transaction(work(move |scope| {
                let credits = scope
                    .get_credits(&user)?
                    .ok_or_else(|| ParlanceError::not_found("credits", user.as_str()))?;
                let sum = scope.credit_transaction_sum(&user)?;
                if sum != credits.balance {
                    return Err(ParlanceError::LedgerDrift {
                        user_id: user.to_string(),
                        balance: credits.balance,
                        transaction_sum: sum,
                    });
                }
                Ok(credits.balance)
            }))
            .await
    }
}
