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

//! Property-based tests for the transfer engine.
//!
//! These tests verify invariants that should hold for any amount and any
//! sequence of settlement actions.

use bank_ledger_rs::{
    AccountCategory, Action, Engine, EngineConfig, LedgerError, SettlementRequest,
    TransactionKind, TransactionStatus, TransferRequest, UserId,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Generate a positive amount (0.01 to 2000.00 with 2 decimal places).
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..=200_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Generate a non-negative balance (0.00 to 1000.00).
fn arb_balance() -> impl Strategy<Value = Decimal> {
    (0i64..=100_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![Just(Action::Accept), Just(Action::Decline), Just(Action::Cancel)]
}

fn engine_with_seeds(checking: Decimal, savings: Decimal) -> Engine {
    Engine::with_config(EngineConfig {
        checking_seed: checking,
        savings_seed: savings,
    })
}

fn checking(engine: &Engine, user: UserId) -> Decimal {
    engine
        .get_account(user, AccountCategory::Checking)
        .unwrap()
        .balance()
}

fn savings(engine: &Engine, user: UserId) -> Decimal {
    engine
        .get_account(user, AccountCategory::Savings)
        .unwrap()
        .balance()
}

// =============================================================================
// Between-accounts Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// A funded transfer posts and moves exactly `amount`.
    #[test]
    fn funded_transfer_posts_and_conserves(
        headroom in arb_balance(),
        savings_seed in arb_balance(),
        amount in arb_amount(),
    ) {
        let checking_seed = amount + headroom;
        let engine = engine_with_seeds(checking_seed, savings_seed);
        let alice = engine.register_user("alice").unwrap();

        let tx = engine.submit_transfer(alice, TransferRequest::BetweenAccounts {
            source: AccountCategory::Checking,
            destination: AccountCategory::Savings,
            amount: Some(amount),
        }).unwrap();

        prop_assert_eq!(tx.status(), TransactionStatus::Posted);
        prop_assert_eq!(checking(&engine, alice), checking_seed - amount);
        prop_assert_eq!(savings(&engine, alice), savings_seed + amount);
        prop_assert_eq!(
            checking(&engine, alice) + savings(&engine, alice),
            checking_seed + savings_seed
        );
    }

    /// An underfunded transfer fails and moves nothing.
    #[test]
    fn underfunded_transfer_fails_unchanged(
        shortfall in 1i64..=10_000i64,
        savings_seed in arb_balance(),
        amount in arb_amount(),
    ) {
        let checking_seed = (amount - Decimal::new(shortfall, 2)).max(Decimal::ZERO);
        let engine = engine_with_seeds(checking_seed, savings_seed);
        let alice = engine.register_user("alice").unwrap();

        let tx = engine.submit_transfer(alice, TransferRequest::BetweenAccounts {
            source: AccountCategory::Checking,
            destination: AccountCategory::Savings,
            amount: Some(amount),
        }).unwrap();

        prop_assert_eq!(tx.status(), TransactionStatus::Failed);
        prop_assert_eq!(checking(&engine, alice), checking_seed);
        prop_assert_eq!(savings(&engine, alice), savings_seed);
    }
}

// =============================================================================
// Between-users Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Whatever sequence of actions is attempted, only the first permitted
    /// one takes effect, later ones are `AlreadySettled`, and money is
    /// conserved across both users.
    #[test]
    fn first_action_wins_and_total_conserved(
        seed in arb_balance(),
        amount in arb_amount(),
        actions in prop::collection::vec(arb_action(), 1..6),
    ) {
        let engine = engine_with_seeds(seed, Decimal::ZERO);
        let alice = engine.register_user("alice").unwrap();
        let bob = engine.register_user("bob").unwrap();
        let tx = engine.submit_transfer(alice, TransferRequest::BetweenUsers {
            recipient: "bob".into(),
            kind: TransactionKind::Send,
            amount: Some(amount),
        }).unwrap();

        let mut settled = false;
        for action in &actions {
            let actor = match action {
                Action::Cancel => alice,
                Action::Accept | Action::Decline => bob,
            };
            let result = engine.act(actor, SettlementRequest { action: *action, transaction_id: tx.id() });
            if settled {
                prop_assert_eq!(result, Err(LedgerError::AlreadySettled(tx.id())));
            } else {
                prop_assert!(result.is_ok());
                settled = true;
            }
        }

        let record = engine.transaction(tx.id()).unwrap();
        let expected = match actions[0] {
            Action::Accept if seed >= amount => TransactionStatus::Posted,
            Action::Accept => TransactionStatus::Failed,
            Action::Decline | Action::Cancel => TransactionStatus::Cancelled,
        };
        prop_assert_eq!(record.status(), expected);

        let (alice_after, bob_after) = (checking(&engine, alice), checking(&engine, bob));
        prop_assert_eq!(alice_after + bob_after, seed + seed);
        prop_assert!(alice_after >= Decimal::ZERO);
        if expected == TransactionStatus::Posted {
            prop_assert_eq!(alice_after, seed - amount);
        } else {
            prop_assert_eq!(alice_after, seed);
            prop_assert_eq!(bob_after, seed);
        }
    }

    /// Decline and cancel never touch balances.
    #[test]
    fn decline_and_cancel_never_mutate(
        seed in arb_balance(),
        amount in arb_amount(),
        decline in any::<bool>(),
    ) {
        let engine = engine_with_seeds(seed, seed);
        let alice = engine.register_user("alice").unwrap();
        let bob = engine.register_user("bob").unwrap();
        let tx = engine.submit_transfer(alice, TransferRequest::BetweenUsers {
            recipient: "bob".into(),
            kind: TransactionKind::Receive,
            amount: Some(amount),
        }).unwrap();

        let closed = if decline {
            engine.decline(bob, tx.id()).unwrap()
        } else {
            engine.cancel(alice, tx.id()).unwrap()
        };

        prop_assert_eq!(closed.status(), TransactionStatus::Cancelled);
        for user in [alice, bob] {
            prop_assert_eq!(checking(&engine, user), seed);
            prop_assert_eq!(savings(&engine, user), seed);
        }
    }

    /// A third user never gets past the guard.
    #[test]
    fn stranger_always_unauthorized(
        amount in arb_amount(),
        action in arb_action(),
    ) {
        let engine = Engine::new();
        let alice = engine.register_user("alice").unwrap();
        engine.register_user("bob").unwrap();
        let mallory = engine.register_user("mallory").unwrap();
        let tx = engine.submit_transfer(alice, TransferRequest::BetweenUsers {
            recipient: "bob".into(),
            kind: TransactionKind::Send,
            amount: Some(amount),
        }).unwrap();

        let result = engine.act(mallory, SettlementRequest { action, transaction_id: tx.id() });
        prop_assert_eq!(result, Err(LedgerError::Unauthorized));
        prop_assert!(engine.transaction(tx.id()).unwrap().is_pending());
    }
}
