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

//! User point accounts.
//!
//! A [`UserAccount`] is the ledger row for a point-bearing user. Balance and
//! cached level only change together, through [`UserData::credit`] and
//! [`UserData::debit`], so the level always equals `level(balance)`.
//!
//! # Example
//!
//! ```
//! use points_economy::{Role, SchoolId, UserAccount, UserId};
//!
//! let account = UserAccount::new(SchoolId(1), UserId(7), Role::Student, 150);
//! assert_eq!(account.balance(), 150);
//! assert_eq!(account.level(), 2);
//! ```

use crate::base::{Points, PurchaseId, SchoolId, UserId};
use crate::error::EconomyError;
use crate::leveling::{self, LevelInfo};
use crate::scope::Role;
use parking_lot::{Mutex, MutexGuard};
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Level before and after a balance mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    pub from: u32,
    pub to: u32,
}

impl LevelChange {
    pub fn increased(&self) -> bool {
        self.to > self.from
    }
}

#[derive(Debug)]
pub(crate) struct UserData {
    pub(crate) user_id: UserId,
    balance: Points,
    level: u32,
    /// Purchases owned by this user, in commit order.
    pub(crate) purchases: Vec<PurchaseId>,
}

impl UserData {
    fn new(user_id: UserId, balance: Points) -> Self {
        Self {
            user_id,
            balance,
            level: leveling::level(balance),
            purchases: Vec::new(),
        }
    }

    fn assert_invariants(&self) {
        debug_assert_eq!(
            self.level,
            leveling::level(self.balance),
            "Invariant violated: cached level out of sync with balance {}",
            self.balance
        );
    }

    pub(crate) fn balance(&self) -> Points {
        self.balance
    }

    pub(crate) fn level(&self) -> u32 {
        self.level
    }

    /// Increases the balance and recomputes the level.
    pub(crate) fn credit(&mut self, amount: Points) -> Result<LevelChange, EconomyError> {
        let balance = self.balance.checked_add(amount).ok_or_else(|| {
            EconomyError::TransactionAborted(format!("balance overflow for user {}", self.user_id))
        })?;
        Ok(self.set_balance(balance))
    }

    /// Decreases the balance if it covers `amount`; otherwise leaves it untouched.
    pub(crate) fn debit(&mut self, amount: Points) -> Result<LevelChange, EconomyError> {
        if self.balance < amount {
            return Err(EconomyError::InsufficientBalance {
                available: self.balance,
                required: amount,
            });
        }
        Ok(self.set_balance(self.balance - amount))
    }

    fn set_balance(&mut self, balance: Points) -> LevelChange {
        let from = self.level;
        self.balance = balance;
        self.level = leveling::level(balance);
        self.assert_invariants();
        LevelChange {
            from,
            to: self.level,
        }
    }
}

/// Ledger row for a user's points.
///
/// Identity, school and role are fixed at registration and readable without
/// taking the row lock.
#[derive(Debug)]
pub struct UserAccount {
    user_id: UserId,
    school_id: SchoolId,
    role: Role,
    inner: Mutex<UserData>,
}

impl UserAccount {
    const PROGRESS_PRECISION: u32 = 4;

    pub fn new(school_id: SchoolId, user_id: UserId, role: Role, balance: Points) -> Self {
        Self {
            user_id,
            school_id,
            role,
            inner: Mutex::new(UserData::new(user_id, balance)),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn school_id(&self) -> SchoolId {
        self.school_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn balance(&self) -> Points {
        self.inner.lock().balance
    }

    pub fn level(&self) -> u32 {
        self.inner.lock().level
    }

    pub fn level_info(&self) -> LevelInfo {
        LevelInfo::from_points(self.balance())
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, UserData> {
        self.inner.lock()
    }
}

impl Serialize for UserAccount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let data = self.inner.lock();
        let info = LevelInfo::from_points(data.balance);
        let mut state = serializer.serialize_struct("UserAccount", 5)?;
        state.serialize_field("user", &self.user_id)?;
        state.serialize_field("school", &self.school_id)?;
        state.serialize_field("balance", &data.balance)?;
        state.serialize_field("level", &data.level)?;
        state.serialize_field(
            "progress",
            &info.progress.round_dp(UserAccount::PROGRESS_PRECISION),
        )?;
        state.end()
    }
}
