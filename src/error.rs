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

//! Error types for the points economy.
//!
//! Every rejected precondition is an [`EconomyError`] variant carrying the
//! numbers a caller needs to render it (available vs. required, current total
//! vs. cap). [`EconomyError::kind`] collapses the variants into the coarse
//! [`ErrorKind`] taxonomy callers branch on.

use crate::base::{Points, ProductId, PurchaseId, QuestId, SubmissionId, UserId};
use crate::purchase::PurchaseStatus;
use crate::submission::SubmissionStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Machine-distinguishable error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    DeadlinePassed,
    InsufficientStock,
    InsufficientBalance,
    LimitExceeded,
    ValidationFailed,
    Forbidden,
    Duplicate,
    TransactionAborted,
}

/// Points economy errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EconomyError {
    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error("quest {0} not found")]
    QuestNotFound(QuestId),

    #[error("submission {0} not found")]
    SubmissionNotFound(SubmissionId),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("purchase {0} not found")]
    PurchaseNotFound(PurchaseId),

    /// The acting user lacks the capability for this operation
    #[error("user {actor} is not allowed to {action}")]
    Forbidden { actor: UserId, action: &'static str },

    #[error("quest {quest_id} closed at {deadline}")]
    DeadlinePassed {
        quest_id: QuestId,
        deadline: DateTime<Utc>,
    },

    #[error("quest {0} already completed")]
    AlreadyCompleted(QuestId),

    #[error("quest {0} already has a submission awaiting review")]
    AlreadyPending(QuestId),

    #[error("submission {submission_id} already reviewed ({status})")]
    AlreadyReviewed {
        submission_id: SubmissionId,
        status: SubmissionStatus,
    },

    #[error("purchase {purchase_id} already processed ({status})")]
    AlreadyProcessed {
        purchase_id: PurchaseId,
        status: PurchaseStatus,
    },

    #[error("Insufficient stock: {available} left, {requested} requested")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },

    #[error("Insufficient points: {available} available, {required} required")]
    InsufficientBalance { available: Points, required: Points },

    #[error("Purchase limit exceeded: {current_total} held, {requested} requested, limit {max}")]
    LimitExceeded {
        product_id: ProductId,
        current_total: u32,
        requested: u32,
        max: u32,
    },

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("{entity} {id} already exists")]
    Duplicate { entity: &'static str, id: String },

    /// A ledger mutation could not be committed; nothing was applied
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),
}

impl EconomyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UserNotFound(_)
            | Self::QuestNotFound(_)
            | Self::SubmissionNotFound(_)
            | Self::ProductNotFound(_)
            | Self::PurchaseNotFound(_) => ErrorKind::NotFound,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::DeadlinePassed { .. } => ErrorKind::DeadlinePassed,
            Self::AlreadyCompleted(_)
            | Self::AlreadyPending(_)
            | Self::AlreadyReviewed { .. }
            | Self::AlreadyProcessed { .. } => ErrorKind::InvalidState,
            Self::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            Self::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Self::Duplicate { .. } => ErrorKind::Duplicate,
            Self::TransactionAborted(_) => ErrorKind::TransactionAborted,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }
}
