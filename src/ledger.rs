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

//! In-memory ledger store.
//!
//! Rows live in concurrent maps, each mutable row behind its own
//! [`parking_lot::Mutex`]. Multi-row mutations take row locks in a fixed
//! order, `user → product → submission/purchase`, validate every
//! precondition under those locks and only then write. The primitives in this
//! module assume the caller holds the locks they are handed.
//!
//! Tenant scoping is enforced on lookup: a row from another school is
//! reported exactly like a missing one.

use crate::account::{LevelChange, UserAccount, UserData};
use crate::base::{Points, ProductId, PurchaseId, QuestId, SchoolId, SubmissionId, UserId};
use crate::error::EconomyError;
use crate::purchase::{Product, Purchase, PurchaseStatus};
use crate::submission::{Quest, Submission, SubmissionStatus};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) type ProductRow = Arc<Mutex<Product>>;
pub(crate) type SubmissionRow = Arc<Mutex<Submission>>;
pub(crate) type PurchaseRow = Arc<Mutex<Purchase>>;

/// A locked row tagged with its school, so scoping never takes the row lock.
#[derive(Debug)]
struct Scoped<T> {
    school_id: SchoolId,
    row: Arc<Mutex<T>>,
}

impl<T> Scoped<T> {
    fn new(school_id: SchoolId, value: T) -> Self {
        Self {
            school_id,
            row: Arc::new(Mutex::new(value)),
        }
    }

    fn row_in(&self, school_id: SchoolId) -> Option<Arc<Mutex<T>>> {
        (self.school_id == school_id).then(|| Arc::clone(&self.row))
    }
}

#[derive(Debug)]
pub struct Ledger {
    users: DashMap<UserId, Arc<UserAccount>>,
    quests: DashMap<QuestId, Quest>,
    products: DashMap<ProductId, Scoped<Product>>,
    submissions: DashMap<SubmissionId, Scoped<Submission>>,
    /// The single live submission per (user, quest) pair.
    submission_index: DashMap<(UserId, QuestId), SubmissionId>,
    purchases: DashMap<PurchaseId, Scoped<Purchase>>,
    next_submission: AtomicU64,
    next_purchase: AtomicU64,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            quests: DashMap::new(),
            products: DashMap::new(),
            submissions: DashMap::new(),
            submission_index: DashMap::new(),
            purchases: DashMap::new(),
            next_submission: AtomicU64::new(1),
            next_purchase: AtomicU64::new(1),
        }
    }

    // === Catalog ===

    pub(crate) fn insert_user(
        &self,
        account: UserAccount,
    ) -> Result<Arc<UserAccount>, EconomyError> {
        let user_id = account.user_id();
        match self.users.entry(user_id) {
            Entry::Occupied(_) => Err(duplicate("user", user_id)),
            Entry::Vacant(entry) => Ok(entry.insert(Arc::new(account)).value().clone()),
        }
    }

    pub(crate) fn insert_quest(&self, quest: Quest) -> Result<(), EconomyError> {
        match self.quests.entry(quest.id) {
            Entry::Occupied(_) => Err(duplicate("quest", quest.id)),
            Entry::Vacant(entry) => {
                entry.insert(quest);
                Ok(())
            }
        }
    }

    pub(crate) fn insert_product(&self, product: Product) -> Result<(), EconomyError> {
        match self.products.entry(product.id) {
            Entry::Occupied(_) => Err(duplicate("product", product.id)),
            Entry::Vacant(entry) => {
                entry.insert(Scoped::new(product.school_id, product));
                Ok(())
            }
        }
    }

    pub(crate) fn update_quest<T>(
        &self,
        school_id: SchoolId,
        quest_id: QuestId,
        update: impl FnOnce(&mut Quest) -> T,
    ) -> Result<T, EconomyError> {
        match self.quests.get_mut(&quest_id) {
            Some(mut quest) if quest.school_id == school_id => Ok(update(quest.value_mut())),
            _ => Err(EconomyError::QuestNotFound(quest_id)),
        }
    }

    // === Scoped lookups ===

    pub(crate) fn user_in(
        &self,
        school_id: SchoolId,
        user_id: UserId,
    ) -> Result<Arc<UserAccount>, EconomyError> {
        self.users
            .get(&user_id)
            .map(|account| account.value().clone())
            .filter(|account| account.school_id() == school_id)
            .ok_or(EconomyError::UserNotFound(user_id))
    }

    pub(crate) fn quest_in(
        &self,
        school_id: SchoolId,
        quest_id: QuestId,
    ) -> Result<Quest, EconomyError> {
        self.quests
            .get(&quest_id)
            .filter(|quest| quest.school_id == school_id)
            .map(|quest| quest.value().clone())
            .ok_or(EconomyError::QuestNotFound(quest_id))
    }

    pub(crate) fn product_in(
        &self,
        school_id: SchoolId,
        product_id: ProductId,
    ) -> Result<ProductRow, EconomyError> {
        self.products
            .get(&product_id)
            .and_then(|entry| entry.row_in(school_id))
            .ok_or(EconomyError::ProductNotFound(product_id))
    }

    pub(crate) fn submission_in(
        &self,
        school_id: SchoolId,
        submission_id: SubmissionId,
    ) -> Result<SubmissionRow, EconomyError> {
        self.submissions
            .get(&submission_id)
            .and_then(|entry| entry.row_in(school_id))
            .ok_or(EconomyError::SubmissionNotFound(submission_id))
    }

    pub(crate) fn purchase_in(
        &self,
        school_id: SchoolId,
        purchase_id: PurchaseId,
    ) -> Result<PurchaseRow, EconomyError> {
        self.purchases
            .get(&purchase_id)
            .and_then(|entry| entry.row_in(school_id))
            .ok_or(EconomyError::PurchaseNotFound(purchase_id))
    }

    /// Submission currently occupying the (user, quest) slot.
    pub(crate) fn submission_for(
        &self,
        user_id: UserId,
        quest_id: QuestId,
    ) -> Option<SubmissionRow> {
        let submission_id = *self.submission_index.get(&(user_id, quest_id))?;
        self.submissions
            .get(&submission_id)
            .map(|entry| Arc::clone(&entry.row))
    }

    // === Read models ===

    pub(crate) fn users_in(&self, school_id: SchoolId) -> Vec<Arc<UserAccount>> {
        let mut users: Vec<_> = self
            .all_users()
            .into_iter()
            .filter(|account| account.school_id() == school_id)
            .collect();
        users.sort_by_key(|account| account.user_id());
        users
    }

    pub(crate) fn all_users(&self) -> Vec<Arc<UserAccount>> {
        let mut users: Vec<_> = self.users.iter().map(|account| account.value().clone()).collect();
        users.sort_by_key(|account| (account.school_id(), account.user_id()));
        users
    }

    /// Submissions of one school matching `keep`, oldest first.
    pub(crate) fn submissions_where(
        &self,
        school_id: SchoolId,
        keep: impl Fn(&Submission) -> bool,
    ) -> Vec<Submission> {
        let rows: Vec<_> = self
            .submissions
            .iter()
            .filter_map(|entry| entry.row_in(school_id))
            .collect();
        let mut found: Vec<_> = rows
            .iter()
            .map(|row| row.lock().clone())
            .filter(|submission| keep(submission))
            .collect();
        found.sort_by_key(|submission| (submission.submitted_at, submission.id));
        found
    }

    /// Purchases of one school matching `keep`, ordered by ID.
    pub(crate) fn purchases_where(
        &self,
        school_id: SchoolId,
        keep: impl Fn(&Purchase) -> bool,
    ) -> Vec<Purchase> {
        let rows: Vec<_> = self
            .purchases
            .iter()
            .filter_map(|entry| entry.row_in(school_id))
            .collect();
        let mut found: Vec<_> = rows
            .iter()
            .map(|row| row.lock().clone())
            .filter(|purchase| keep(purchase))
            .collect();
        found.sort_by_key(|purchase| purchase.id);
        found
    }

    // === Transaction primitives ===

    /// Quantity of `product_id` the user holds across non-cancelled purchases.
    ///
    /// Caller holds the user lock, which every purchase insert and cancel also takes.
    pub(crate) fn held_quantity(&self, user: &UserData, product_id: ProductId) -> u32 {
        user.purchases
            .iter()
            .filter_map(|purchase_id| {
                self.purchases
                    .get(purchase_id)
                    .map(|entry| Arc::clone(&entry.row))
            })
            .map(|row| {
                let purchase = row.lock();
                if purchase.product_id == product_id && purchase.status.is_held() {
                    purchase.quantity
                } else {
                    0
                }
            })
            .fold(0u32, u32::saturating_add)
    }

    /// Creates a pending submission and claims the (user, quest) slot.
    ///
    /// Caller holds the user lock and has checked the slot is free.
    pub(crate) fn open_submission(
        &self,
        quest: &Quest,
        user_id: UserId,
        proof: String,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Submission {
        let submission_id = SubmissionId(self.next_submission.fetch_add(1, Ordering::SeqCst));
        let submission = Submission::new(submission_id, quest, user_id, proof, comment, now);
        self.submissions
            .insert(submission_id, Scoped::new(quest.school_id, submission.clone()));
        self.submission_index.insert((user_id, quest.id), submission_id);
        submission
    }

    /// Credits the award and closes the submission as approved, as one unit.
    ///
    /// Caller holds the user and submission locks.
    pub(crate) fn approve(
        &self,
        user: &mut UserData,
        submission: &mut Submission,
        award: Points,
        feedback: Option<String>,
        reviewer: UserId,
        now: DateTime<Utc>,
    ) -> Result<LevelChange, EconomyError> {
        // The only fallible step runs first; nothing is written if it fails.
        let change = user.credit(award)?;
        submission.close(SubmissionStatus::Approved, feedback, reviewer, now);
        submission.awarded = Some(award);
        Ok(change)
    }

    /// Debits the user, takes the stock and records the purchase, as one unit.
    ///
    /// Caller holds the user and product locks and has run every precondition
    /// check against the locked rows.
    pub(crate) fn commit_purchase(
        &self,
        user: &mut UserData,
        product: &mut Product,
        quantity: u32,
        cost: Points,
        now: DateTime<Utc>,
    ) -> Result<(Purchase, LevelChange), EconomyError> {
        product.take_stock(quantity)?;
        let change = match user.debit(cost) {
            Ok(change) => change,
            Err(err) => {
                product.return_stock(quantity)?;
                return Err(err);
            }
        };

        let purchase_id = PurchaseId(self.next_purchase.fetch_add(1, Ordering::SeqCst));
        let purchase = Purchase::new(purchase_id, user.user_id, product, quantity, cost, now);
        self.purchases
            .insert(purchase_id, Scoped::new(product.school_id, purchase.clone()));
        user.purchases.push(purchase_id);
        Ok((purchase, change))
    }

    /// Refunds the stored total, restores the stored quantity and closes the
    /// purchase as cancelled, as one unit.
    ///
    /// Caller holds the user, product and purchase locks.
    pub(crate) fn revert_purchase(
        &self,
        user: &mut UserData,
        product: &mut Product,
        purchase: &mut Purchase,
        reviewer: UserId,
        now: DateTime<Utc>,
    ) -> Result<LevelChange, EconomyError> {
        let change = user.credit(purchase.total_cost)?;
        if let Err(err) = product.return_stock(purchase.quantity) {
            user.debit(purchase.total_cost)?;
            return Err(err);
        }
        purchase.close(PurchaseStatus::Cancelled, reviewer, now);
        Ok(change)
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

fn duplicate(entity: &'static str, id: impl ToString) -> EconomyError {
    EconomyError::Duplicate {
        entity,
        id: id.to_string(),
    }
}
