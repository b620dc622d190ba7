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

//! Deadlock and race tests using parking_lot's built-in deadlock detector.
//!
//! Settlement takes the transaction record lock and then both account locks.
//! These tests hammer that path from many threads: crossed transfers between
//! the same pair of accounts, competing actions on one transaction, and
//! readers walking the stores while balances move.

use bank_ledger_rs::{
    AccountCategory, Engine, LedgerError, TransactionId, TransactionKind, TransactionStatus,
    TransferRequest, UserId,
};
use parking_lot::deadlock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

// === Deadlock Detection Infrastructure ===

/// Starts a background thread that checks for deadlocks.
/// Returns a handle to stop the detector.
fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

/// Stops the deadlock detector.
fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150));
}

// === Helpers ===

fn request(recipient: &str, amount: Decimal) -> TransferRequest {
    TransferRequest::BetweenUsers {
        recipient: recipient.to_string(),
        kind: TransactionKind::Send,
        amount: Some(amount),
    }
}

fn checking(engine: &Engine, user: UserId) -> Decimal {
    engine
        .get_account(user, AccountCategory::Checking)
        .unwrap()
        .balance()
}

fn total_money(engine: &Engine) -> Decimal {
    engine.accounts().iter().map(|a| a.balance()).sum()
}

// === Tests ===

/// Many threads accept the same transaction; exactly one settles it.
#[test]
fn concurrent_accepts_settle_once() {
    let detector = start_deadlock_detector();

    for _ in 0..10 {
        let engine = Arc::new(Engine::new());
        let alice = engine.register_user("alice").unwrap();
        let bob = engine.register_user("bob").unwrap();
        let tx = engine.submit_transfer(alice, request("bob", dec!(100.00))).unwrap();

        const NUM_THREADS: usize = 20;
        let handles: Vec<_> = (0..NUM_THREADS)
            .map(|_| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || engine.accept(bob, tx.id()))
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("Thread panicked"))
            .collect();

        let wins = results.iter().filter(|r| matches!(r, Ok(true))).count();
        let rejected = results
            .iter()
            .filter(|r| **r == Err(LedgerError::AlreadySettled(tx.id())))
            .count();
        assert_eq!(wins, 1);
        assert_eq!(rejected, NUM_THREADS - 1);
        assert_eq!(checking(&engine, alice), dec!(192.12));
        assert_eq!(checking(&engine, bob), dec!(392.12));
    }

    stop_deadlock_detector(detector);
}

/// Accept races cancel; whichever wins, balances match the final status.
#[test]
fn accept_cancel_race_is_consistent() {
    let detector = start_deadlock_detector();

    for _ in 0..50 {
        let engine = Arc::new(Engine::new());
        let alice = engine.register_user("alice").unwrap();
        let bob = engine.register_user("bob").unwrap();
        let tx = engine.submit_transfer(alice, request("bob", dec!(50.00))).unwrap();

        let accepter = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.accept(bob, tx.id()).is_ok())
        };
        let canceller = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.cancel(alice, tx.id()).is_ok())
        };

        let accepted = accepter.join().expect("Thread panicked");
        let cancelled = canceller.join().expect("Thread panicked");
        assert!(accepted ^ cancelled, "exactly one action must win");

        let status = engine.transaction(tx.id()).unwrap().status();
        if accepted {
            assert_eq!(status, TransactionStatus::Posted);
            assert_eq!(checking(&engine, alice), dec!(242.12));
        } else {
            assert_eq!(status, TransactionStatus::Cancelled);
            assert_eq!(checking(&engine, alice), dec!(292.12));
        }
    }

    stop_deadlock_detector(detector);
}

/// Transfers in both directions between the same accounts, settled
/// concurrently, lock the pair in a consistent order.
#[test]
fn no_deadlock_crossed_transfers() {
    let detector = start_deadlock_detector();
    let engine = Arc::new(Engine::new());
    let alice = engine.register_user("alice").unwrap();
    let bob = engine.register_user("bob").unwrap();
    let before = total_money(&engine);

    const PER_SIDE: usize = 200;
    let mut to_bob = Vec::with_capacity(PER_SIDE);
    let mut to_alice = Vec::with_capacity(PER_SIDE);
    for _ in 0..PER_SIDE {
        to_bob.push(engine.submit_transfer(alice, request("bob", dec!(3.00))).unwrap().id());
        to_alice.push(engine.submit_transfer(bob, request("alice", dec!(3.00))).unwrap().id());
    }

    let settle_all = |engine: Arc<Engine>, acting: UserId, ids: Vec<TransactionId>| {
        thread::spawn(move || {
            for id in ids {
                engine.accept(acting, id).expect("accept failed");
            }
        })
    };

    let handles = vec![
        settle_all(Arc::clone(&engine), bob, to_bob[..PER_SIDE / 2].to_vec()),
        settle_all(Arc::clone(&engine), bob, to_bob[PER_SIDE / 2..].to_vec()),
        settle_all(Arc::clone(&engine), alice, to_alice[..PER_SIDE / 2].to_vec()),
        settle_all(Arc::clone(&engine), alice, to_alice[PER_SIDE / 2..].to_vec()),
    ];
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(total_money(&engine), before);
    assert!(checking(&engine, alice) >= Decimal::ZERO);
    assert!(checking(&engine, bob) >= Decimal::ZERO);
    assert!(engine.history().iter().all(|tx| tx.status().is_terminal()));
}

/// Many users moving money around a ring while readers walk the stores.
#[test]
fn no_deadlock_ring_with_readers() {
    let detector = start_deadlock_detector();
    let engine = Arc::new(Engine::new());

    const NUM_USERS: usize = 8;
    const OPS_PER_THREAD: usize = 100;
    let names: Vec<String> = (0..NUM_USERS).map(|i| format!("user{i}")).collect();
    let users: Vec<UserId> = names
        .iter()
        .map(|name| engine.register_user(name).unwrap())
        .collect();
    let before = total_money(&engine);

    let mut handles = Vec::new();
    for i in 0..NUM_USERS {
        let engine = Arc::clone(&engine);
        let me = users[i];
        let next_name = names[(i + 1) % NUM_USERS].clone();
        let next = users[(i + 1) % NUM_USERS];

        handles.push(thread::spawn(move || {
            for op in 0..OPS_PER_THREAD {
                let tx = engine
                    .submit_transfer(me, request(&next_name, dec!(1.50)))
                    .unwrap();
                match op % 3 {
                    0 | 1 => {
                        let _ = engine.accept(next, tx.id());
                    }
                    _ => {
                        engine.cancel(me, tx.id()).unwrap();
                    }
                }
                if op % 10 == 0 {
                    let _ = engine.submit_transfer(
                        me,
                        TransferRequest::BetweenAccounts {
                            source: AccountCategory::Savings,
                            destination: AccountCategory::Checking,
                            amount: Some(dec!(5.00)),
                        },
                    );
                }
            }
        }));
    }

    for _ in 0..2 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for _ in 0..200 {
                let _ = engine.history().len();
                let _ = total_money(&engine);
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(total_money(&engine), before);
    for account in engine.accounts() {
        assert!(account.balance() >= Decimal::ZERO);
    }
}
