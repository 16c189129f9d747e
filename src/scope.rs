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

//! Tenant scope and capability checks.
//!
//! A [`Scope`] is resolved by the caller (subdomain, session) and threaded
//! through every engine call. At its boundary the engine first confirms the
//! actor is registered in `school_id` with the claimed role, then checks
//! capabilities. Any referenced entity outside `school_id`, the actor
//! included, is reported as not found.

use crate::base::{SchoolId, UserId};
use crate::error::EconomyError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

/// The authenticated user performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub school_id: SchoolId,
    pub actor: Actor,
}

impl Scope {
    pub fn new(school_id: SchoolId, user_id: UserId, role: Role) -> Self {
        Self {
            school_id,
            actor: Actor { user_id, role },
        }
    }

    /// Teachers and administrators review submissions and fulfil purchases.
    pub fn can_review(&self) -> bool {
        matches!(self.actor.role, Role::Teacher | Role::Admin)
    }

    /// Students act for themselves; administrators may act for anyone in their school.
    pub fn can_act_as(&self, user_id: UserId) -> bool {
        self.actor.user_id == user_id || self.actor.role == Role::Admin
    }

    pub fn can_manage_catalog(&self) -> bool {
        self.actor.role == Role::Admin
    }

    pub(crate) fn require_reviewer(&self, action: &'static str) -> Result<(), EconomyError> {
        self.require(self.can_review(), action)
    }

    pub(crate) fn require_acting_as(
        &self,
        user_id: UserId,
        action: &'static str,
    ) -> Result<(), EconomyError> {
        self.require(self.can_act_as(user_id), action)
    }

    pub(crate) fn require_admin(&self, action: &'static str) -> Result<(), EconomyError> {
        self.require(self.can_manage_catalog(), action)
    }

    fn require(&self, allowed: bool, action: &'static str) -> Result<(), EconomyError> {
        if allowed {
            Ok(())
        } else {
            Err(EconomyError::Forbidden {
                actor: self.actor.user_id,
                action,
            })
        }
    }
}
