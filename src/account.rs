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

//! Account records.
//!
//! An [`Account`] keeps its identity outside the lock and its balance inside a
//! [`parking_lot::Mutex`], so every balance change is a read-modify-write
//! under that account's lock.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use bank_ledger_rs::{Account, AccountCategory, AccountId, UserId};
//!
//! let account = Account::new(AccountId(1), UserId(1), AccountCategory::Checking, dec!(292.12));
//! assert_eq!(account.balance(), dec!(292.12));
//! ```

use crate::base::{AccountId, UserId};
use crate::error::LedgerError;
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Kind of account a user holds.
///
/// Only checking accounts take part in transfers between users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountCategory {
    Checking,
    Savings,
}

impl AccountCategory {
    pub const ALL: [AccountCategory; 2] = [AccountCategory::Checking, AccountCategory::Savings];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountCategory::Checking => "checking",
            AccountCategory::Savings => "savings",
        }
    }
}

impl fmt::Display for AccountCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountCategory {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "checking" => Ok(AccountCategory::Checking),
            "savings" => Ok(AccountCategory::Savings),
            other => Err(LedgerError::invalid(format!("unknown account category '{other}'"))),
        }
    }
}

/// Fails if `amount` has more fractional digits than a balance can hold.
pub(crate) fn check_precision(amount: Decimal) -> Result<(), LedgerError> {
    if amount.normalize().scale() > Account::DECIMAL_PRECISION {
        return Err(LedgerError::invalid(format!(
            "amount {amount} has more than {} decimal places",
            Account::DECIMAL_PRECISION
        )));
    }
    Ok(())
}

/// Mutable part of an account, only reachable through the account lock.
#[derive(Debug)]
pub(crate) struct AccountData {
    id: AccountId,
    balance: Decimal,
}

impl AccountData {
    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: balance of account {} went negative: {}",
            self.id,
            self.balance
        );
    }

    pub(crate) fn balance(&self) -> Decimal {
        self.balance
    }

    /// Increases the balance.
    pub(crate) fn credit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid("amount must be positive"));
        }
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Storage(format!("balance overflow in account {}", self.id)))?;
        self.assert_invariants();
        Ok(())
    }

    /// Decreases the balance. Leaves it untouched when funds are short.
    pub(crate) fn debit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid("amount must be positive"));
        }
        if self.balance < amount {
            return Err(LedgerError::InsufficientFunds(self.id));
        }
        self.balance -= amount;
        self.assert_invariants();
        Ok(())
    }

    /// Checks that a debit of `amount` would succeed without applying it.
    pub(crate) fn can_debit(&self, amount: Decimal) -> Result<(), LedgerError> {
        if self.balance < amount {
            return Err(LedgerError::InsufficientFunds(self.id));
        }
        Ok(())
    }

    /// Checks that a credit of `amount` would not overflow.
    pub(crate) fn can_credit(&self, amount: Decimal) -> Result<(), LedgerError> {
        self.balance
            .checked_add(amount)
            .map(|_| ())
            .ok_or_else(|| LedgerError::Storage(format!("balance overflow in account {}", self.id)))
    }
}

/// Bank account owned by a single user.
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    owner: UserId,
    category: AccountCategory,
    inner: Mutex<AccountData>,
}

impl Account {
    const DECIMAL_PRECISION: u32 = 2;

    pub fn new(id: AccountId, owner: UserId, category: AccountCategory, opening: Decimal) -> Self {
        Self {
            id,
            owner,
            category,
            inner: Mutex::new(AccountData {
                id,
                balance: opening,
            }),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn category(&self) -> AccountCategory {
        self.category
    }

    pub fn balance(&self) -> Decimal {
        self.inner.lock().balance
    }

    /// Applies a signed adjustment and returns the new balance.
    ///
    /// Positive deltas credit, negative deltas debit. A debit that would take
    /// the balance below zero fails with [`LedgerError::InsufficientFunds`]
    /// and changes nothing.
    pub fn adjust(&self, delta: Decimal) -> Result<Decimal, LedgerError> {
        check_precision(delta)?;
        let mut data = self.inner.lock();
        if delta > Decimal::ZERO {
            data.credit(delta)?;
        } else if delta < Decimal::ZERO {
            data.debit(-delta)?;
        } else {
            return Err(LedgerError::invalid("adjustment must be non-zero"));
        }
        Ok(data.balance)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, AccountData> {
        self.inner.lock()
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let balance = self.balance();
        let mut state = serializer.serialize_struct("Account", 4)?;
        state.serialize_field("user", &self.owner)?;
        state.serialize_field("account", &self.id)?;
        state.serialize_field("category", &self.category)?;
        state.serialize_field("balance", &balance.round_dp(Account::DECIMAL_PRECISION))?;
        state.end()
    }
}
