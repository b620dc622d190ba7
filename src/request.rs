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

//! Requests handed to the engine by the collaborator layer.
//!
//! Raw payloads ([`TransferPayload`]) carry every field as optional, the way a
//! form submits them; converting one into a [`TransferRequest`] checks that the
//! fields required by the chosen mode are present.

use crate::account::{AccountCategory, check_precision};
use crate::base::TransactionId;
use crate::error::LedgerError;
use crate::guard::Action;
use crate::transaction::TransactionKind;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Credit one of the acting user's own accounts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DepositRequest {
    pub category: AccountCategory,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    BetweenAccounts,
    BetweenUsers,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::BetweenAccounts => f.write_str("between_accounts"),
            TransferMode::BetweenUsers => f.write_str("between_users"),
        }
    }
}

impl FromStr for TransferMode {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "between_accounts" => Ok(TransferMode::BetweenAccounts),
            "between_users" => Ok(TransferMode::BetweenUsers),
            other => Err(LedgerError::invalid(format!("unknown transfer mode '{other}'"))),
        }
    }
}

/// Transfer form as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransferPayload {
    pub mode: TransferMode,
    pub source_category: Option<AccountCategory>,
    pub dest_category: Option<AccountCategory>,
    pub dest_username: Option<String>,
    pub direction: Option<TransactionKind>,
    pub amount: Option<Decimal>,
}

/// A validated transfer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferRequest {
    /// Between two of the acting user's own accounts; settles immediately.
    BetweenAccounts {
        source: AccountCategory,
        destination: AccountCategory,
        amount: Option<Decimal>,
    },
    /// Checking to checking with another user; waits for the counterparty.
    BetweenUsers {
        recipient: String,
        kind: TransactionKind,
        amount: Option<Decimal>,
    },
}

impl TransferRequest {
    pub fn amount(&self) -> Option<Decimal> {
        match self {
            Self::BetweenAccounts { amount, .. } => *amount,
            Self::BetweenUsers { amount, .. } => *amount,
        }
    }
}

impl TryFrom<TransferPayload> for TransferRequest {
    type Error = LedgerError;

    fn try_from(payload: TransferPayload) -> Result<Self, Self::Error> {
        match payload.mode {
            TransferMode::BetweenAccounts => {
                let (Some(source), Some(destination)) =
                    (payload.source_category, payload.dest_category)
                else {
                    return Err(LedgerError::invalid("both accounts required"));
                };
                Ok(Self::BetweenAccounts {
                    source,
                    destination,
                    amount: payload.amount,
                })
            }
            TransferMode::BetweenUsers => {
                let recipient = payload
                    .dest_username
                    .filter(|name| !name.trim().is_empty())
                    .ok_or_else(|| LedgerError::invalid("user required"))?;
                let kind = payload
                    .direction
                    .ok_or_else(|| LedgerError::invalid("request type required"))?;
                Ok(Self::BetweenUsers {
                    recipient,
                    kind,
                    amount: payload.amount,
                })
            }
        }
    }
}

/// Accept, decline or cancel a pending transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SettlementRequest {
    pub action: Action,
    pub transaction_id: TransactionId,
}

/// Any request the engine can handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Deposit(DepositRequest),
    Transfer(TransferRequest),
    Settle(SettlementRequest),
}

/// Returns the amount if present, strictly positive and in whole cents.
pub(crate) fn require_positive(amount: Option<Decimal>) -> Result<Decimal, LedgerError> {
    match amount {
        None => Err(LedgerError::invalid("amount required")),
        Some(amount) if amount <= Decimal::ZERO => {
            Err(LedgerError::invalid("amount must be positive"))
        }
        Some(amount) => {
            check_precision(amount)?;
            Ok(amount)
        }
    }
}
