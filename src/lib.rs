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

//! # Bank Ledger
//!
//! Ledger core for a small bank: user accounts, balances, and the lifecycle of
//! money movements between accounts of the same user or of two users.
//!
//! ## Core Components
//!
//! - [`AccountStore`]: accounts and balances with atomic adjustments
//! - [`TransactionLedger`]: append-only record of transfer attempts
//! - [`Engine`]: state machine settling, declining and cancelling transfers
//! - [`AuthorizationGuard`]: who may accept, decline or cancel a transfer
//! - [`LedgerError`]: error type with user-facing [`ReasonCode`]s
//!
//! ## Example
//!
//! ```
//! use bank_ledger_rs::{AccountCategory, Engine, TransactionStatus, TransferRequest};
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::new();
//! let alice = engine.register_user("alice").unwrap();
//!
//! let tx = engine
//!     .submit_transfer(
//!         alice,
//!         TransferRequest::BetweenAccounts {
//!             source: AccountCategory::Checking,
//!             destination: AccountCategory::Savings,
//!             amount: Some(dec!(100.00)),
//!         },
//!     )
//!     .unwrap();
//! assert_eq!(tx.status(), TransactionStatus::Posted);
//!
//! let checking = engine.get_account(alice, AccountCategory::Checking).unwrap();
//! assert_eq!(checking.balance(), dec!(192.12));
//! ```
//!
//! ## Thread Safety
//!
//! All stores are shared through [`std::sync::Arc`] and safe to call from many
//! threads. Balances of different accounts are updated in parallel; a given
//! account or transaction is mutated by one thread at a time.

pub mod account;
pub mod account_store;
mod base;
pub mod config;
mod engine;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod logging;
pub mod notice;
pub mod request;
mod transaction;
pub mod users;

pub use account::{Account, AccountCategory};
pub use account_store::AccountStore;
pub use base::{AccountId, TransactionId, UserId};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{LedgerError, ReasonCode};
pub use guard::{Action, AuthorizationGuard};
pub use ledger::TransactionLedger;
pub use notice::Notice;
pub use request::{
    DepositRequest, Request, SettlementRequest, TransferMode, TransferPayload, TransferRequest,
};
pub use transaction::{Transaction, TransactionKind, TransactionStatus};
pub use users::UserDirectory;
