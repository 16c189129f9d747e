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

//! Quest submission and review.

use crate::base::{Points, QuestId, SubmissionId, UserId};
use crate::engine::Engine;
use crate::error::EconomyError;
use crate::events::DomainEvent;
use crate::scope::Scope;
use crate::submission::{Decision, Quest, Submission, SubmissionStatus};
use chrono::Utc;
use tracing::{debug, info};

impl Engine {
    /// Submits proof that `user_id` completed a quest.
    ///
    /// A previously rejected submission for the same quest is reopened in
    /// place rather than duplicated.
    ///
    /// # Errors
    ///
    /// - [`EconomyError::QuestNotFound`] - Quest missing, inactive or in another school.
    /// - [`EconomyError::DeadlinePassed`] - Quest deadline has elapsed.
    /// - [`EconomyError::AlreadyCompleted`] - An approved submission exists.
    /// - [`EconomyError::AlreadyPending`] - A submission is awaiting review.
    /// - [`EconomyError::ValidationFailed`] - Social quest without a comment, or missing proof.
    pub fn submit_quest(
        &self,
        scope: &Scope,
        user_id: UserId,
        quest_id: QuestId,
        proof: &str,
        comment: Option<&str>,
    ) -> Result<Submission, EconomyError> {
        self.authorize(scope)?;
        scope.require_acting_as(user_id, "submit quests")?;

        let quest = self.ledger.quest_in(scope.school_id, quest_id)?;
        if !quest.active {
            return Err(EconomyError::QuestNotFound(quest_id));
        }
        let now = Utc::now();
        if let Some(deadline) = quest.deadline.filter(|_| quest.deadline_passed(now)) {
            return Err(EconomyError::DeadlinePassed { quest_id, deadline });
        }

        let comment = non_blank(comment);
        let proof = proof.trim().to_string();
        if quest.kind.requires_comment() {
            if comment.is_none() {
                return Err(EconomyError::validation("social quests require a comment"));
            }
        } else if proof.is_empty() {
            return Err(EconomyError::validation("proof is required"));
        }

        let account = self.ledger.user_in(scope.school_id, user_id)?;
        // Holding the user row serializes this user's submissions.
        let _user = account.lock();

        let Some(row) = self.ledger.submission_for(user_id, quest_id) else {
            let submission = self
                .ledger
                .open_submission(&quest, user_id, proof, comment, now);
            info!(submission_id = %submission.id, %user_id, %quest_id, "quest submitted");
            return Ok(submission);
        };

        let mut submission = row.lock();
        match submission.status {
            SubmissionStatus::Approved => Err(EconomyError::AlreadyCompleted(quest_id)),
            SubmissionStatus::Pending => Err(EconomyError::AlreadyPending(quest_id)),
            SubmissionStatus::Rejected => {
                submission.resubmit(proof, comment, now);
                info!(submission_id = %submission.id, %user_id, %quest_id, "quest resubmitted");
                Ok(submission.clone())
            }
        }
    }

    /// Approves or rejects a pending submission.
    ///
    /// Approval credits the quest's points and recomputes the level in the
    /// same unit as the status change, then emits `QuestApproved` and, if
    /// the level rose, `LevelUp`. Rejection emits `QuestRejected`.
    ///
    /// # Errors
    ///
    /// - [`EconomyError::Forbidden`] - Actor is not a teacher or administrator.
    /// - [`EconomyError::SubmissionNotFound`] - Submission missing or in another school.
    /// - [`EconomyError::AlreadyReviewed`] - Submission is no longer pending.
    /// - [`EconomyError::TransactionAborted`] - The award would overflow the balance.
    pub fn review_submission(
        &self,
        scope: &Scope,
        submission_id: SubmissionId,
        decision: Decision,
        feedback: Option<&str>,
    ) -> Result<Submission, EconomyError> {
        self.authorize(scope)?;
        scope.require_reviewer("review submissions")?;
        let reviewer = scope.actor.user_id;

        let row = self.ledger.submission_in(scope.school_id, submission_id)?;
        let (user_id, quest_id) = {
            let submission = row.lock();
            (submission.user_id, submission.quest_id)
        };
        let quest = self.ledger.quest_in(scope.school_id, quest_id)?;
        let account = self.ledger.user_in(scope.school_id, user_id)?;

        let mut user = account.lock();
        let mut submission = row.lock();
        if submission.status != SubmissionStatus::Pending {
            return Err(EconomyError::AlreadyReviewed {
                submission_id,
                status: submission.status,
            });
        }

        let feedback = non_blank(feedback);
        let now = Utc::now();
        let mut events = Vec::with_capacity(2);
        match decision {
            Decision::Reject => {
                submission.close(SubmissionStatus::Rejected, feedback.clone(), reviewer, now);
                events.push(DomainEvent::QuestRejected {
                    school_id: scope.school_id,
                    user_id,
                    submission_id,
                    quest_id,
                    feedback,
                });
            }
            Decision::Approve => {
                let award = award_for(&quest);
                let change = self.ledger.approve(
                    &mut user,
                    &mut submission,
                    award,
                    feedback.clone(),
                    reviewer,
                    now,
                )?;
                events.push(DomainEvent::QuestApproved {
                    school_id: scope.school_id,
                    user_id,
                    submission_id,
                    quest_id,
                    points: award,
                    feedback,
                });
                if change.increased() {
                    events.push(DomainEvent::LevelUp {
                        school_id: scope.school_id,
                        user_id,
                        from: change.from,
                        to: change.to,
                    });
                }
                debug!(%user_id, award, balance = user.balance(), level = user.level(), "award credited");
            }
        }

        let reviewed = submission.clone();
        drop(submission);
        drop(user);

        info!(%submission_id, %user_id, status = %reviewed.status, %reviewer, "submission reviewed");
        self.emit(events);
        Ok(reviewed)
    }
}

/// Points credited for an approved quest.
fn award_for(quest: &Quest) -> Points {
    quest.points
}

fn non_blank(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
