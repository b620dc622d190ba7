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

//! Registered users.
//!
//! The engine only needs to resolve a counterparty by username and to know
//! which ids exist; credentials live with the collaborator layer.

use crate::base::{Sequence, UserId};
use crate::error::LedgerError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

#[derive(Debug, Default)]
pub struct UserDirectory {
    by_name: DashMap<String, UserId>,
    names: DashMap<UserId, String>,
    ids: Sequence,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a username and returns its new id.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidRequest`] if the name is blank or taken.
    pub fn register(&self, username: &str) -> Result<UserId, LedgerError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(LedgerError::invalid("username is required"));
        }

        match self.by_name.entry(username.to_string()) {
            Entry::Occupied(_) => Err(LedgerError::invalid(format!(
                "username '{username}' is already taken"
            ))),
            Entry::Vacant(entry) => {
                let id = UserId(self.ids.next()?);
                self.names.insert(id, username.to_string());
                entry.insert(id);
                Ok(id)
            }
        }
    }

    /// Forgets a registration whose accounts could not be opened.
    pub(crate) fn unregister(&self, id: UserId) {
        if let Some((_, name)) = self.names.remove(&id) {
            self.by_name.remove(&name);
        }
    }

    pub fn lookup(&self, username: &str) -> Result<UserId, LedgerError> {
        self.by_name
            .get(username.trim())
            .map(|entry| *entry.value())
            .ok_or(LedgerError::UserNotFound)
    }

    pub fn username(&self, id: UserId) -> Result<String, LedgerError> {
        self.names
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(LedgerError::UserNotFound)
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.names.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
