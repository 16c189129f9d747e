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

//! Core identifier types for schools, users, quests, products and the records
//! the ledger creates on their behalf.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Point amounts. Balances, prices and awards are whole points.
pub type Points = u64;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Tenant partition. Every user, quest, product and record belongs to exactly one school.
    SchoolId(u32)
);

id_type!(
    /// Point-bearing user (student, teacher or administrator).
    UserId(u32)
);

id_type!(QuestId(u32));

id_type!(ProductId(u32));

id_type!(
    /// Allocated by the ledger when a student first submits a quest.
    SubmissionId(u64)
);

id_type!(
    /// Allocated by the ledger when a purchase commits.
    PurchaseId(u64)
);
