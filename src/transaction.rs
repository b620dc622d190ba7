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

//! Transaction records.
//!
//! Transactions follow a state machine with a single non-terminal state:
//!
//! ```text
//!            ┌──accept (funds ok)──────► Posted
//! Pending ───┼──accept (funds short)───► Failed
//!            └──decline / cancel───────► Cancelled
//! ```
//!
//! A record leaves [`TransactionStatus::Pending`] exactly once and is never
//! modified afterwards.

use crate::account::check_precision;
use crate::base::{AccountId, TransactionId};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What the initiator asked for. Does not change which account is debited.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Send,
    Receive,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Send => "send",
            TransactionKind::Receive => "receive",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "send" => Ok(TransactionKind::Send),
            "receive" => Ok(TransactionKind::Receive),
            other => Err(LedgerError::invalid(format!("unknown transaction kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Posted,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Posted => "posted",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "posted" => Ok(TransactionStatus::Posted),
            "failed" => Ok(TransactionStatus::Failed),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            other => Err(LedgerError::invalid(format!("unknown transaction status '{other}'"))),
        }
    }
}

/// A money movement between two accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transaction {
    id: TransactionId,
    source: AccountId,
    destination: AccountId,
    kind: TransactionKind,
    status: TransactionStatus,
    amount: Decimal,
    time_initiated: DateTime<Utc>,
    /// Equal to `time_initiated` until the record is settled.
    time_completed: DateTime<Utc>,
}

impl Transaction {
    /// Builds a pending record.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidRequest`] if both sides are the same account or
    /// the amount is not positive.
    pub fn new(
        id: TransactionId,
        source: AccountId,
        destination: AccountId,
        kind: TransactionKind,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        if source == destination {
            return Err(LedgerError::invalid("source and destination must differ"));
        }
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid("amount must be positive"));
        }
        check_precision(amount)?;
        Ok(Self {
            id,
            source,
            destination,
            kind,
            status: TransactionStatus::Pending,
            amount,
            time_initiated: now,
            time_completed: now,
        })
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn source(&self) -> AccountId {
        self.source
    }

    pub fn destination(&self) -> AccountId {
        self.destination
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn time_initiated(&self) -> DateTime<Utc> {
        self.time_initiated
    }

    pub fn time_completed(&self) -> DateTime<Utc> {
        self.time_completed
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    pub fn touches(&self, account: AccountId) -> bool {
        self.source == account || self.destination == account
    }

    /// Moves the record out of `Pending`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidRequest`] - `status` is `Pending`.
    /// - [`LedgerError::AlreadySettled`] - the record is already terminal.
    pub(crate) fn finish(
        &mut self,
        status: TransactionStatus,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if !status.is_terminal() {
            return Err(LedgerError::invalid("target status must be terminal"));
        }
        if !self.is_pending() {
            return Err(LedgerError::AlreadySettled(self.id));
        }
        self.status = status;
        self.time_completed = at;
        Ok(())
    }
}
