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

//! Transfer engine.
//!
//! The [`Engine`] turns requests into ledger entries and drives them through
//! their lifecycle:
//!
//! - **Between accounts**: a transfer between two of the acting user's own
//!   accounts is recorded `Pending` and settled in the same call.
//! - **Between users**: a checking-to-checking transfer is recorded `Pending`
//!   and waits for the recipient to accept or decline, or the initiator to
//!   cancel.
//! - **Accept**: debits the source and credits the destination as one unit.
//!   Short funds end the transaction `Failed` with both balances untouched.
//! - **Decline / Cancel**: end the transaction `Cancelled`; no balance moves.
//!
//! # Thread Safety
//!
//! The engine holds no per-request state. Every operation reads the stores,
//! takes the record lock of the transaction it settles and then the locks of
//! the two accounts in ascending id order. Two concurrent accepts of the same
//! transaction serialize on the record lock; the loser sees a terminal status
//! and gets [`LedgerError::AlreadySettled`].

use crate::account::{Account, AccountCategory};
use crate::account_store::AccountStore;
use crate::base::{AccountId, TransactionId, UserId};
use crate::config::EngineConfig;
use crate::error::{LedgerError, ReasonCode};
use crate::guard::{Action, AuthorizationGuard};
use crate::ledger::TransactionLedger;
use crate::notice::{Notice, NoticeBoard};
use crate::request::{
    DepositRequest, Request, SettlementRequest, TransferRequest, require_positive,
};
use crate::transaction::{Transaction, TransactionKind, TransactionStatus};
use crate::users::UserDirectory;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ledger engine operating on injected stores.
///
/// # Invariants
///
/// - A transaction's source and destination accounts differ.
/// - A transaction leaves `Pending` exactly once.
/// - A posted settlement leaves the sum of the two balances unchanged.
/// - No balance is ever debited below zero.
pub struct Engine {
    accounts: Arc<AccountStore>,
    ledger: Arc<TransactionLedger>,
    users: Arc<UserDirectory>,
    guard: AuthorizationGuard,
    notices: NoticeBoard,
    config: EngineConfig,
}

impl Engine {
    /// Creates an engine with empty stores and the default seed balances.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_stores(
            Arc::new(AccountStore::new()),
            Arc::new(TransactionLedger::new()),
            Arc::new(UserDirectory::new()),
            config,
        )
    }

    /// Creates an engine over existing stores.
    pub fn with_stores(
        accounts: Arc<AccountStore>,
        ledger: Arc<TransactionLedger>,
        users: Arc<UserDirectory>,
        config: EngineConfig,
    ) -> Self {
        Engine {
            guard: AuthorizationGuard::new(Arc::clone(&accounts)),
            accounts,
            ledger,
            users,
            notices: NoticeBoard::new(),
            config,
        }
    }

    // === Registration and deposits ===

    /// Registers a user and opens their checking and savings accounts with
    /// the configured seed balances.
    ///
    /// Either the user ends up with both accounts or nothing is recorded and
    /// the name stays free.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidRequest`] if the name is blank or taken, or the
    /// configured seeds are invalid.
    pub fn register_user(&self, username: &str) -> Result<UserId, LedgerError> {
        self.config
            .validate()
            .map_err(|e| LedgerError::invalid(e.to_string()))?;

        let user = self.users.register(username)?;
        let mut opened = Vec::with_capacity(2);
        let seeds = [
            (AccountCategory::Checking, self.config.checking_seed),
            (AccountCategory::Savings, self.config.savings_seed),
        ];
        for (category, seed) in seeds {
            match self.accounts.open_account(user, category, seed) {
                Ok(id) => opened.push(id),
                Err(e) => {
                    warn!(%user, %category, error = %e, "registration rolled back");
                    for id in opened {
                        self.accounts.close_account(id);
                    }
                    self.users.unregister(user);
                    return Err(e);
                }
            }
        }
        info!(%user, username = username.trim(), "user registered");
        Ok(user)
    }

    /// Credits one of the acting user's accounts and returns the new balance.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidRequest`] - amount missing or not positive.
    /// - [`LedgerError::AccountNotFound`] - user has no account of that category.
    pub fn deposit(&self, acting: UserId, request: DepositRequest) -> Result<Decimal, LedgerError> {
        let amount = require_positive(request.amount)?;
        let account = self.accounts.get_account(acting, request.category)?;
        let balance = self.accounts.adjust_balance(account.id(), amount)?;
        info!(user = %acting, account = %account.id(), %amount, %balance, "deposit applied");
        Ok(balance)
    }

    // === Transfers ===

    /// Records a transfer request.
    ///
    /// Between-accounts requests are settled before returning, so the
    /// returned record is terminal (`Posted` or `Failed`). Between-users
    /// requests come back `Pending`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidRequest`] - amount missing or not positive, same
    ///   category on both sides, or a user sending to themselves.
    /// - [`LedgerError::UserNotFound`] - unknown recipient.
    /// - [`LedgerError::AccountNotFound`] - an endpoint account does not exist.
    pub fn submit_transfer(
        &self,
        acting: UserId,
        request: TransferRequest,
    ) -> Result<Transaction, LedgerError> {
        let amount = require_positive(request.amount())?;

        match request {
            TransferRequest::BetweenAccounts {
                source,
                destination,
                ..
            } => {
                if source == destination {
                    return Err(LedgerError::invalid("You cannot send to the same account"));
                }
                let from = self.accounts.get_account(acting, source)?;
                let to = self.accounts.get_account(acting, destination)?;
                let pending = self
                    .ledger
                    .create(from.id(), to.id(), TransactionKind::Send, amount)?;
                debug!(tx = %pending.id(), user = %acting, "between-accounts transfer settling");
                self.settle(pending.id())
            }
            TransferRequest::BetweenUsers {
                recipient, kind, ..
            } => {
                let recipient_id = self.users.lookup(&recipient)?;
                if recipient_id == acting {
                    return Err(LedgerError::invalid("cannot send a request to yourself"));
                }
                let from = self.accounts.get_account(acting, AccountCategory::Checking)?;
                let to = self
                    .accounts
                    .get_account(recipient_id, AccountCategory::Checking)?;
                let pending = self.ledger.create(from.id(), to.id(), kind, amount)?;
                info!(
                    tx = %pending.id(),
                    from = %acting,
                    to = %recipient_id,
                    %kind,
                    %amount,
                    "transfer request pending"
                );
                self.notices.post(
                    recipient_id,
                    Notice::success(format!(
                        "{} sent you a {} request #{} for {}",
                        self.display_name(acting),
                        kind,
                        pending.id(),
                        amount
                    )),
                );
                Ok(pending)
            }
        }
    }

    // === Settlement actions ===

    /// Accepts a pending transaction on behalf of its recipient.
    ///
    /// Returns `true` if funds moved (`Posted`) and `false` if the source was
    /// short (`Failed`).
    ///
    /// # Errors
    ///
    /// - [`LedgerError::TransactionNotFound`] - unknown id.
    /// - [`LedgerError::Unauthorized`] - acting user does not own the destination.
    /// - [`LedgerError::AlreadySettled`] - transaction is no longer pending.
    /// - [`LedgerError::Storage`] - the balance write failed; the transaction
    ///   stays pending.
    pub fn accept(&self, acting: UserId, id: TransactionId) -> Result<bool, LedgerError> {
        let transaction = self.authorized(acting, id, Action::Accept)?;
        let settled = self.settle(id)?;
        let posted = settled.status() == TransactionStatus::Posted;

        let initiator = self.accounts.get(transaction.source())?.owner();
        let notice = if posted {
            Notice::success(format!(
                "Your transfer #{} for {} was accepted",
                id,
                settled.amount()
            ))
        } else {
            Notice::failure(
                ReasonCode::InsufficientFunds,
                format!("Your transfer #{} failed: insufficient balance", id),
            )
        };
        self.notices.post(initiator, notice);
        Ok(posted)
    }

    /// Declines a pending transaction on behalf of its recipient.
    pub fn decline(&self, acting: UserId, id: TransactionId) -> Result<Transaction, LedgerError> {
        let transaction = self.authorized(acting, id, Action::Decline)?;
        let closed = self.close(id)?;
        let initiator = self.accounts.get(transaction.source())?.owner();
        self.notices.post(
            initiator,
            Notice::success(format!("Your transfer #{} was declined", id)),
        );
        Ok(closed)
    }

    /// Cancels a pending transaction on behalf of its initiator.
    pub fn cancel(&self, acting: UserId, id: TransactionId) -> Result<Transaction, LedgerError> {
        let transaction = self.authorized(acting, id, Action::Cancel)?;
        let closed = self.close(id)?;
        let recipient = self.accounts.get(transaction.destination())?.owner();
        if recipient != acting {
            self.notices.post(
                recipient,
                Notice::success(format!("Transfer request #{} was cancelled", id)),
            );
        }
        Ok(closed)
    }

    /// Dispatches a settlement request and returns the resulting record.
    pub fn act(
        &self,
        acting: UserId,
        request: SettlementRequest,
    ) -> Result<Transaction, LedgerError> {
        let id = request.transaction_id;
        match request.action {
            Action::Accept => {
                self.accept(acting, id)?;
                self.ledger.get(id)
            }
            Action::Decline => self.decline(acting, id),
            Action::Cancel => self.cancel(acting, id),
        }
    }

    /// Handles any request and reports the outcome as a notice.
    ///
    /// The notice is also queued for the acting user.
    pub fn handle(&self, acting: UserId, request: Request) -> Notice {
        let notice = match request {
            Request::Deposit(deposit) => {
                let (category, amount) = (deposit.category, deposit.amount);
                match self.deposit(acting, deposit) {
                    Ok(_) => Notice::success(format!(
                        "Successfully added {} to your {} account",
                        amount.unwrap_or_default(),
                        category
                    )),
                    Err(e) => Notice::from(&e),
                }
            }
            Request::Transfer(transfer) => match self.submit_transfer(acting, transfer) {
                Ok(tx) => match tx.status() {
                    TransactionStatus::Posted => {
                        Notice::success(format!("Successfully transferred ${}", tx.amount()))
                    }
                    TransactionStatus::Failed => Notice::from(&LedgerError::InsufficientFunds(
                        tx.source(),
                    )),
                    _ => Notice::success(format!("Transfer request #{} created", tx.id())),
                },
                Err(e) => Notice::from(&e),
            },
            Request::Settle(settlement) => match settlement.action {
                Action::Accept => match self.accept(acting, settlement.transaction_id) {
                    Ok(true) => Notice::success("Transaction successfully completed"),
                    Ok(false) => Notice::failure(
                        ReasonCode::InsufficientFunds,
                        "Failed to complete transaction",
                    ),
                    Err(e) => Notice::from(&e),
                },
                Action::Decline => match self.decline(acting, settlement.transaction_id) {
                    Ok(_) => Notice::success("Transaction successfully declined"),
                    Err(e) => Notice::from(&e),
                },
                Action::Cancel => match self.cancel(acting, settlement.transaction_id) {
                    Ok(_) => Notice::success("Transaction successfully cancelled"),
                    Err(e) => Notice::from(&e),
                },
            },
        };

        if !notice.success {
            warn!(user = %acting, reason = ?notice.reason, message = %notice.message, "request rejected");
        }
        self.notices.post(acting, notice.clone());
        notice
    }

    /// Removes and returns the notices waiting for `user`.
    pub fn drain_notices(&self, user: UserId) -> Vec<Notice> {
        self.notices.drain(user)
    }

    // === Queries ===

    pub fn get_account(
        &self,
        user: UserId,
        category: AccountCategory,
    ) -> Result<Arc<Account>, LedgerError> {
        self.accounts.get_account(user, category)
    }

    pub fn accounts_of(&self, user: UserId) -> Vec<Arc<Account>> {
        self.accounts.accounts_of(user)
    }

    /// Returns all accounts ordered by id.
    pub fn accounts(&self) -> Vec<Arc<Account>> {
        self.accounts.all()
    }

    pub fn transaction(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        self.ledger.get(id)
    }

    /// Returns all transactions touching the user's accounts.
    pub fn transactions_for(&self, user: UserId) -> Vec<Transaction> {
        let ids: Vec<_> = self.accounts_of(user).iter().map(|a| a.id()).collect();
        self.ledger.involving(&ids)
    }

    /// Pending transactions waiting for `user` to accept or decline.
    pub fn incoming_pending(&self, user: UserId) -> Vec<Transaction> {
        self.pending_where(user, |tx, ids| ids.contains(&tx.destination()))
    }

    /// Pending transactions `user` initiated and may still cancel.
    pub fn outgoing_pending(&self, user: UserId) -> Vec<Transaction> {
        self.pending_where(user, |tx, ids| ids.contains(&tx.source()))
    }

    /// Returns every transaction in creation order.
    pub fn history(&self) -> Vec<Transaction> {
        self.ledger.history()
    }

    pub fn user_id(&self, username: &str) -> Result<UserId, LedgerError> {
        self.users.lookup(username)
    }

    pub fn username(&self, user: UserId) -> Result<String, LedgerError> {
        self.users.username(user)
    }

    // === Internals ===

    /// Loads the record and checks the acting user may perform `action`.
    fn authorized(
        &self,
        acting: UserId,
        id: TransactionId,
        action: Action,
    ) -> Result<Transaction, LedgerError> {
        let transaction = self.ledger.get(id)?;
        if let Err(e) = self.guard.authorize(acting, &transaction, action) {
            warn!(tx = %id, user = %acting, %action, "action not permitted");
            return Err(e);
        }
        Ok(transaction)
    }

    /// Settles a pending transaction under its record lock.
    ///
    /// Storage failures leave the transaction `Pending`.
    fn settle(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        self.ledger.update(id, |transaction| {
            if !transaction.is_pending() {
                return Err(LedgerError::AlreadySettled(id));
            }

            let status = match self.accounts.move_funds(
                transaction.source(),
                transaction.destination(),
                transaction.amount(),
            ) {
                Ok(()) => TransactionStatus::Posted,
                Err(LedgerError::InsufficientFunds(_)) => TransactionStatus::Failed,
                Err(e) => {
                    warn!(tx = %id, error = %e, "settlement aborted, transaction left pending");
                    return Err(e);
                }
            };

            transaction.finish(status, Utc::now())?;
            match status {
                TransactionStatus::Posted => {
                    info!(tx = %id, amount = %transaction.amount(), "transaction posted")
                }
                _ => warn!(tx = %id, amount = %transaction.amount(), "transaction failed: insufficient funds"),
            }
            Ok(transaction.clone())
        })
    }

    /// Moves a pending transaction to `Cancelled` without touching balances.
    fn close(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        let closed = self
            .ledger
            .set_terminal(id, TransactionStatus::Cancelled, Utc::now())?;
        info!(tx = %id, "transaction cancelled");
        Ok(closed)
    }

    fn pending_where<F>(&self, user: UserId, keep: F) -> Vec<Transaction>
    where
        F: Fn(&Transaction, &[AccountId]) -> bool,
    {
        let ids: Vec<_> = self.accounts_of(user).iter().map(|a| a.id()).collect();
        self.ledger
            .involving(&ids)
            .into_iter()
            .filter(|tx| tx.is_pending() && keep(tx, &ids))
            .collect()
    }

    fn display_name(&self, user: UserId) -> String {
        self.users
            .username(user)
            .unwrap_or_else(|_| format!("user {user}"))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
