// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Transaction ledger.
//!
//! Append-only store of [`Transaction`] records. Each record sits behind its
//! own lock so that reading the status and moving it out of `Pending` happen
//! in one critical section.

use crate::account::check_precision;
use crate::base::{AccountId, Sequence, TransactionId};
use crate::error::LedgerError;
use crate::transaction::{Transaction, TransactionKind, TransactionStatus};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

/// Thread-safe ledger of money-movement attempts.
///
/// Records are never removed. Ids are allocated sequentially from 1, so id
/// order is creation order.
#[derive(Debug, Default)]
pub struct TransactionLedger {
    transactions: DashMap<TransactionId, Arc<Mutex<Transaction>>>,
    ids: Sequence,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new pending transaction and returns a snapshot of it.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidRequest`] if `source == destination` or
    /// `amount <= 0`. No id is consumed in that case.
    pub fn create(
        &self,
        source: AccountId,
        destination: AccountId,
        kind: TransactionKind,
        amount: Decimal,
    ) -> Result<Transaction, LedgerError> {
        if source == destination {
            return Err(LedgerError::invalid("source and destination must differ"));
        }
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid("amount must be positive"));
        }
        check_precision(amount)?;

        let id = TransactionId(self.ids.next()?);
        let transaction = Transaction::new(id, source, destination, kind, amount, Utc::now())?;
        self.transactions
            .insert(id, Arc::new(Mutex::new(transaction.clone())));
        debug!(tx = %id, %source, %destination, %kind, %amount, "transaction recorded");
        Ok(transaction)
    }

    /// Returns a snapshot of the record.
    pub fn get(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        Ok(self.row(id)?.lock().clone())
    }

    /// Runs `f` while holding the record's lock.
    ///
    /// Callers use this to make a status check and the transition that
    /// depends on it atomic. Any other lock `f` takes must be ordered after the
    /// record lock.
    pub fn update<F, T>(&self, id: TransactionId, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut Transaction) -> Result<T, LedgerError>,
    {
        let row = self.row(id)?;
        let mut transaction = row.lock();
        f(&mut *transaction)
    }

    /// Moves a pending record to a terminal status.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::TransactionNotFound`] - unknown id.
    /// - [`LedgerError::InvalidRequest`] - `status` is `Pending`.
    /// - [`LedgerError::AlreadySettled`] - record is already terminal.
    pub fn set_terminal(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        completed: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        self.update(id, |transaction| {
            transaction.finish(status, completed)?;
            Ok(transaction.clone())
        })
    }

    /// Returns every record in creation order.
    pub fn history(&self) -> Vec<Transaction> {
        let mut transactions: Vec<_> = self
            .rows()
            .into_iter()
            .map(|row| row.lock().clone())
            .collect();
        transactions.sort_by_key(Transaction::id);
        transactions
    }

    /// Returns records touching any of `accounts`, in creation order.
    pub fn involving(&self, accounts: &[AccountId]) -> Vec<Transaction> {
        self.history()
            .into_iter()
            .filter(|tx| accounts.iter().any(|account| tx.touches(*account)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    fn row(&self, id: TransactionId) -> Result<Arc<Mutex<Transaction>>, LedgerError> {
        // Clone out so the map shard is released before the row is locked.
        self.transactions
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(LedgerError::TransactionNotFound(id))
    }

    fn rows(&self) -> Vec<Arc<Mutex<Transaction>>> {
        self.transactions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}
