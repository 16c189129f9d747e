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

//! Quests and quest submissions.
//!
//! Submission state machine:
//!
//! ```text
//!  submit ──► PENDING ──approve──► APPROVED
//!                │
//!                └──reject───► REJECTED ──resubmit──► PENDING (same row)
//! ```

use crate::base::{Points, QuestId, SchoolId, SubmissionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestKind {
    Academic,
    Physical,
    Creative,
    /// Requires a comment describing the social activity.
    Social,
}

impl QuestKind {
    pub fn requires_comment(&self) -> bool {
        matches!(self, Self::Social)
    }
}

/// A task students complete for points. Read-only during review.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Quest {
    pub id: QuestId,
    pub school_id: SchoolId,
    pub title: String,
    pub kind: QuestKind,
    pub points: Points,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Quest {
    pub fn new(
        id: QuestId,
        school_id: SchoolId,
        title: impl Into<String>,
        kind: QuestKind,
        points: Points,
    ) -> Self {
        Self {
            id,
            school_id,
            title: title.into(),
            kind,
            points,
            deadline: None,
            active: true,
        }
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| now > deadline)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

/// Reviewer verdict on a pending submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub school_id: SchoolId,
    pub user_id: UserId,
    pub quest_id: QuestId,
    pub status: SubmissionStatus,
    pub proof: String,
    pub comment: Option<String>,
    pub feedback: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<UserId>,
    /// Points credited on approval.
    pub awarded: Option<Points>,
}

impl Submission {
    pub(crate) fn new(
        id: SubmissionId,
        quest: &Quest,
        user_id: UserId,
        proof: String,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            school_id: quest.school_id,
            user_id,
            quest_id: quest.id,
            status: SubmissionStatus::Pending,
            proof,
            comment,
            feedback: None,
            submitted_at: now,
            reviewed_at: None,
            reviewed_by: None,
            awarded: None,
        }
    }

    /// Reopens a rejected submission in place with new evidence.
    pub(crate) fn resubmit(&mut self, proof: String, comment: Option<String>, now: DateTime<Utc>) {
        debug_assert_eq!(self.status, SubmissionStatus::Rejected);
        self.status = SubmissionStatus::Pending;
        self.proof = proof;
        self.comment = comment;
        self.feedback = None;
        self.submitted_at = now;
        self.reviewed_at = None;
        self.reviewed_by = None;
    }

    pub(crate) fn close(
        &mut self,
        status: SubmissionStatus,
        feedback: Option<String>,
        reviewer: UserId,
        now: DateTime<Utc>,
    ) {
        debug_assert_eq!(self.status, SubmissionStatus::Pending);
        self.status = status;
        self.feedback = feedback;
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(now);
    }
}
