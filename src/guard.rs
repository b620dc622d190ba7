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

//! Authorization guard for settlement actions.
//!
//! | Action  | Permitted user               |
//! |---------|------------------------------|
//! | Accept  | owner of the destination     |
//! | Decline | owner of the destination     |
//! | Cancel  | owner of the source (initiator) |

use crate::account_store::AccountStore;
use crate::base::UserId;
use crate::error::LedgerError;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Action a user may take on a pending transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Accept,
    Decline,
    Cancel,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Accept => "accept",
            Action::Decline => "decline",
            Action::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accept" => Ok(Action::Accept),
            "decline" => Ok(Action::Decline),
            "cancel" => Ok(Action::Cancel),
            other => Err(LedgerError::invalid(format!("unknown action '{other}'"))),
        }
    }
}

/// Decides who may act on a transaction, resolving owners through the
/// account store.
#[derive(Debug, Clone)]
pub struct AuthorizationGuard {
    accounts: Arc<AccountStore>,
}

impl AuthorizationGuard {
    pub fn new(accounts: Arc<AccountStore>) -> Self {
        Self { accounts }
    }

    /// Returns whether `acting` may perform `action` on `transaction`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AccountNotFound`] if an endpoint of the transaction no
    /// longer resolves.
    pub fn can_act(
        &self,
        acting: UserId,
        transaction: &Transaction,
        action: Action,
    ) -> Result<bool, LedgerError> {
        let party = match action {
            Action::Cancel => transaction.source(),
            Action::Accept | Action::Decline => transaction.destination(),
        };
        Ok(self.accounts.get(party)?.owner() == acting)
    }

    /// Like [`can_act`](Self::can_act) but fails with
    /// [`LedgerError::Unauthorized`] instead of returning `false`.
    pub fn authorize(
        &self,
        acting: UserId,
        transaction: &Transaction,
        action: Action,
    ) -> Result<(), LedgerError> {
        if self.can_act(acting, transaction, action)? {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized)
        }
    }
}
