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

//! Outcome notices for the collaborator layer.
//!
//! Every handled request produces a [`Notice`] for the acting user. Requests
//! that concern another user (a new transfer request, a settled or cancelled
//! one) also leave a notice for them. Notices wait in a per-user lock-free
//! queue until the collaborator drains them for display.

use crate::base::UserId;
use crate::error::{LedgerError, ReasonCode};
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub success: bool,
    pub reason: Option<ReasonCode>,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            reason: None,
            message: message.into(),
        }
    }

    pub fn failure(reason: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason),
            message: message.into(),
        }
    }
}

impl From<&LedgerError> for Notice {
    fn from(error: &LedgerError) -> Self {
        let message = match error {
            LedgerError::AccountNotFound => "Banking Account not found".to_string(),
            LedgerError::UserNotFound => "User not found".to_string(),
            LedgerError::InsufficientFunds(_) => "Insufficient balance".to_string(),
            other => other.to_string(),
        };
        Notice::failure(error.reason_code(), message)
    }
}

/// Per-user FIFO of pending notices.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    queues: DashMap<UserId, Arc<SegQueue<Notice>>>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, user: UserId, notice: Notice) {
        let queue = Arc::clone(self.queues.entry(user).or_default().value());
        queue.push(notice);
    }

    /// Removes and returns every notice waiting for `user`, oldest first.
    pub fn drain(&self, user: UserId) -> Vec<Notice> {
        let Some(queue) = self.queues.get(&user).map(|entry| Arc::clone(entry.value())) else {
            return Vec::new();
        };
        std::iter::from_fn(|| queue.pop()).collect()
    }
}
