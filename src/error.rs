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

//! Error types for ledger operations.
//!
//! Every failure the engine can report is a [`LedgerError`]. The collaborator
//! layer does not match on variants directly; it reads
//! [`LedgerError::reason_code`] and renders the message.

use crate::base::{AccountId, TransactionId};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Ledger processing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Request is malformed or incomplete; nothing was recorded.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Referenced account does not exist
    #[error("account not found")]
    AccountNotFound,

    /// No user is registered under this name or id
    #[error("user not found")]
    UserNotFound,

    /// Referenced transaction does not exist
    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionId),

    /// Debit would leave the balance below zero
    #[error("insufficient funds in account {0}")]
    InsufficientFunds(AccountId),

    /// Acting user may not perform this action
    #[error("not authorized to act on this transaction")]
    Unauthorized,

    /// Transaction has already left `PENDING`
    #[error("transaction {0} is already settled")]
    AlreadySettled(TransactionId),

    /// The underlying store could not complete the write
    #[error("storage failure: {0}")]
    Storage(String),
}

impl LedgerError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }

    /// Maps the error onto the reason code shown to the end user.
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            Self::InvalidRequest(_) => ReasonCode::InvalidRequest,
            Self::AccountNotFound => ReasonCode::AccountNotFound,
            Self::UserNotFound => ReasonCode::UserNotFound,
            Self::TransactionNotFound(_) => ReasonCode::TransactionNotFound,
            Self::InsufficientFunds(_) => ReasonCode::InsufficientFunds,
            Self::Unauthorized => ReasonCode::Unauthorized,
            Self::AlreadySettled(_) => ReasonCode::AlreadySettled,
            Self::Storage(_) => ReasonCode::StorageError,
        }
    }
}

/// Reason codes exposed to the collaborator layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReasonCode {
    InsufficientFunds,
    AccountNotFound,
    UserNotFound,
    TransactionNotFound,
    Unauthorized,
    AlreadySettled,
    InvalidRequest,
    StorageError,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::InsufficientFunds => "InsufficientFunds",
            ReasonCode::AccountNotFound => "AccountNotFound",
            ReasonCode::UserNotFound => "UserNotFound",
            ReasonCode::TransactionNotFound => "TransactionNotFound",
            ReasonCode::Unauthorized => "Unauthorized",
            ReasonCode::AlreadySettled => "AlreadySettled",
            ReasonCode::InvalidRequest => "InvalidRequest",
            ReasonCode::StorageError => "StorageError",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
