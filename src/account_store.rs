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

//! Account store.
//!
//! Holds every [`Account`] keyed by id, plus an index from
//! `(owner, category)` to account id. Single-account adjustments lock one
//! account; [`AccountStore::move_funds`] locks both endpoints in ascending
//! [`AccountId`] order so crossed transfers cannot deadlock.

use crate::account::{Account, AccountCategory, check_precision};
use crate::base::{AccountId, Sequence, UserId};
use crate::error::LedgerError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

/// Thread-safe store of user accounts.
#[derive(Debug, Default)]
pub struct AccountStore {
    accounts: DashMap<AccountId, Arc<Account>>,
    by_owner: DashMap<(UserId, AccountCategory), AccountId>,
    ids: Sequence,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an account for `owner` with an opening balance.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidRequest`] if the owner already holds an account of
    /// this category, or the opening balance is negative or finer than a cent.
    pub fn open_account(
        &self,
        owner: UserId,
        category: AccountCategory,
        opening: Decimal,
    ) -> Result<AccountId, LedgerError> {
        if opening < Decimal::ZERO {
            return Err(LedgerError::invalid("opening balance cannot be negative"));
        }
        check_precision(opening)?;

        // Entry lock on the index makes check-and-insert atomic.
        match self.by_owner.entry((owner, category)) {
            Entry::Occupied(_) => Err(LedgerError::invalid(format!(
                "user {owner} already has a {category} account"
            ))),
            Entry::Vacant(entry) => {
                let id = AccountId(self.ids.next()?);
                self.accounts
                    .insert(id, Arc::new(Account::new(id, owner, category, opening)));
                entry.insert(id);
                debug!(account = %id, user = %owner, %category, %opening, "account opened");
                Ok(id)
            }
        }
    }

    /// Drops an account opened during a registration that did not complete.
    pub(crate) fn close_account(&self, id: AccountId) {
        if let Some((_, account)) = self.accounts.remove(&id) {
            self.by_owner.remove(&(account.owner(), account.category()));
        }
    }

    /// Looks up a user's account of the given category.
    pub fn get_account(
        &self,
        owner: UserId,
        category: AccountCategory,
    ) -> Result<Arc<Account>, LedgerError> {
        let id = *self
            .by_owner
            .get(&(owner, category))
            .ok_or(LedgerError::AccountNotFound)?;
        self.get(id)
    }

    /// Looks up an account by id.
    pub fn get(&self, id: AccountId) -> Result<Arc<Account>, LedgerError> {
        self.accounts
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(LedgerError::AccountNotFound)
    }

    /// Atomically applies a signed delta to one account and returns the new
    /// balance. See [`Account::adjust`].
    pub fn adjust_balance(&self, id: AccountId, delta: Decimal) -> Result<Decimal, LedgerError> {
        // Clone the Arc out so the shard lock is not held while the account lock is.
        let account = self.get(id)?;
        account.adjust(delta)
    }

    /// Debits `source` and credits `destination` by `amount` as one unit.
    ///
    /// Both account locks are held for the whole check-and-write, so either
    /// both balances change or neither does.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidRequest`] - same account on both sides or non-positive amount.
    /// - [`LedgerError::AccountNotFound`] - either account is unknown.
    /// - [`LedgerError::InsufficientFunds`] - source balance below `amount`.
    /// - [`LedgerError::Storage`] - destination balance would overflow.
    pub fn move_funds(
        &self,
        source: AccountId,
        destination: AccountId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        if source == destination {
            return Err(LedgerError::invalid("source and destination must differ"));
        }
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid("amount must be positive"));
        }
        check_precision(amount)?;

        let from = self.get(source)?;
        let to = self.get(destination)?;

        // Lock in ascending id order.
        let (mut from_data, mut to_data) = if source < destination {
            let f = from.lock();
            let t = to.lock();
            (f, t)
        } else {
            let t = to.lock();
            let f = from.lock();
            (f, t)
        };

        from_data.can_debit(amount)?;
        to_data.can_credit(amount)?;
        from_data.debit(amount)?;
        to_data.credit(amount)?;
        Ok(())
    }

    /// Returns every account owned by `owner`, checking first.
    pub fn accounts_of(&self, owner: UserId) -> Vec<Arc<Account>> {
        AccountCategory::ALL
            .iter()
            .filter_map(|category| self.get_account(owner, *category).ok())
            .collect()
    }

    /// Returns all accounts ordered by id.
    pub fn all(&self) -> Vec<Arc<Account>> {
        let mut accounts: Vec<_> = self
            .accounts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        accounts.sort_by_key(|account| account.id());
        accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
