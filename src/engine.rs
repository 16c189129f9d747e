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

//! Points economy engine.
//!
//! The [`Engine`] owns the ledger store and the notification [`Dispatcher`].
//! Quest review lives in [`crate::quests`], the marketplace in
//! [`crate::marketplace`]; this module holds construction, the catalog and
//! the read side.
//!
//! # Thread Safety
//!
//! All operations take `&self`. Rows are locked individually, so operations
//! on different users and products run in parallel while operations touching
//! the same user, product or record serialize.

use crate::account::UserAccount;
use crate::base::{Points, ProductId, PurchaseId, QuestId, SchoolId, SubmissionId, UserId};
use crate::config::EngineConfig;
use crate::error::EconomyError;
use crate::events::{DomainEvent, Dispatcher, LoggingNotifier, Notifier};
use crate::ledger::Ledger;
use crate::leveling::LevelInfo;
use crate::purchase::{Product, Purchase, PurchaseStatus};
use crate::scope::{Role, Scope};
use crate::submission::{Quest, Submission, SubmissionStatus};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Balance and level of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub user_id: UserId,
    pub school_id: SchoolId,
    pub role: Role,
    pub balance: Points,
    #[serde(flatten)]
    pub level: LevelInfo,
}

/// Points economy engine.
///
/// # Invariants
///
/// - Balances and stock never go negative.
/// - A user's cached level equals `level(balance)` after every commit.
/// - At most one live submission per (user, quest); rejected ones are reused.
/// - Pending purchases move to claimed or cancelled exactly once.
/// - Events are queued only after the mutation they describe has committed.
pub struct Engine {
    pub(crate) ledger: Ledger,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) config: EngineConfig,
}

impl Engine {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_config(EngineConfig::default(), notifier)
    }

    pub fn with_config(config: EngineConfig, notifier: Arc<dyn Notifier>) -> Self {
        Engine {
            ledger: Ledger::new(),
            dispatcher: Dispatcher::spawn(notifier),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn emit(&self, events: Vec<DomainEvent>) {
        self.dispatcher.emit_all(events);
    }

    /// Blocks until every event emitted so far has reached the notifier.
    pub fn flush_notifications(&self) {
        self.dispatcher.flush();
    }

    /// Checks the acting user against the ledger before any capability check.
    ///
    /// The actor must be registered in `scope.school_id` under the role the
    /// scope claims. An actor from another school, or one never registered,
    /// is reported as not found.
    pub(crate) fn authorize(&self, scope: &Scope) -> Result<(), EconomyError> {
        let actor = scope.actor;
        let account = self.ledger.user_in(scope.school_id, actor.user_id)?;
        if account.role() != actor.role {
            return Err(EconomyError::Forbidden {
                actor: actor.user_id,
                action: "act with an unregistered role",
            });
        }
        Ok(())
    }

    // === Catalog ===

    /// Adds a user with an opening balance; the level is derived from it.
    pub fn register_user(
        &self,
        school_id: SchoolId,
        user_id: UserId,
        role: Role,
        opening_balance: Points,
    ) -> Result<Arc<UserAccount>, EconomyError> {
        let account = self
            .ledger
            .insert_user(UserAccount::new(school_id, user_id, role, opening_balance))?;
        info!(%school_id, %user_id, ?role, opening_balance, "registered user");
        Ok(account)
    }

    pub fn register_quest(&self, quest: Quest) -> Result<(), EconomyError> {
        let (school_id, quest_id) = (quest.school_id, quest.id);
        self.ledger.insert_quest(quest)?;
        info!(%school_id, %quest_id, "registered quest");
        Ok(())
    }

    /// # Errors
    ///
    /// - [`EconomyError::ValidationFailed`] - Price is zero.
    /// - [`EconomyError::Duplicate`] - Product ID already registered.
    pub fn register_product(&self, product: Product) -> Result<(), EconomyError> {
        if product.price == 0 {
            return Err(EconomyError::validation("price must be positive"));
        }
        let (school_id, product_id) = (product.school_id, product.id);
        self.ledger.insert_product(product)?;
        info!(%school_id, %product_id, "registered product");
        Ok(())
    }

    /// Changes the price of future purchases. Existing purchases keep their snapshot.
    pub fn set_product_price(
        &self,
        scope: &Scope,
        product_id: ProductId,
        price: Points,
    ) -> Result<Product, EconomyError> {
        self.authorize(scope)?;
        scope.require_admin("change prices")?;
        if price == 0 {
            return Err(EconomyError::validation("price must be positive"));
        }
        let row = self.ledger.product_in(scope.school_id, product_id)?;
        let mut product = row.lock();
        product.price = price;
        info!(%product_id, price, "product repriced");
        Ok(product.clone())
    }

    pub fn restock(
        &self,
        scope: &Scope,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Product, EconomyError> {
        self.authorize(scope)?;
        scope.require_admin("restock products")?;
        let row = self.ledger.product_in(scope.school_id, product_id)?;
        let mut product = row.lock();
        product.return_stock(quantity)?;
        info!(%product_id, quantity, stock = product.stock, "product restocked");
        Ok(product.clone())
    }

    pub fn set_product_active(
        &self,
        scope: &Scope,
        product_id: ProductId,
        active: bool,
    ) -> Result<Product, EconomyError> {
        self.authorize(scope)?;
        scope.require_admin("manage products")?;
        let row = self.ledger.product_in(scope.school_id, product_id)?;
        let mut product = row.lock();
        product.active = active;
        Ok(product.clone())
    }

    pub fn set_quest_active(
        &self,
        scope: &Scope,
        quest_id: QuestId,
        active: bool,
    ) -> Result<Quest, EconomyError> {
        self.authorize(scope)?;
        scope.require_admin("manage quests")?;
        self.ledger.update_quest(scope.school_id, quest_id, |quest| {
            quest.active = active;
            quest.clone()
        })
    }

    // === Read side ===

    pub fn user_summary(
        &self,
        scope: &Scope,
        user_id: UserId,
    ) -> Result<UserSummary, EconomyError> {
        self.authorize(scope)?;
        if !scope.can_review() {
            scope.require_acting_as(user_id, "view other users")?;
        }
        let account = self.ledger.user_in(scope.school_id, user_id)?;
        let balance = account.balance();
        Ok(UserSummary {
            user_id,
            school_id: account.school_id(),
            role: account.role(),
            balance,
            level: LevelInfo::from_points(balance),
        })
    }

    pub fn product(&self, scope: &Scope, product_id: ProductId) -> Result<Product, EconomyError> {
        self.authorize(scope)?;
        let row = self.ledger.product_in(scope.school_id, product_id)?;
        let product = row.lock().clone();
        Ok(product)
    }

    pub fn quest(&self, scope: &Scope, quest_id: QuestId) -> Result<Quest, EconomyError> {
        self.authorize(scope)?;
        self.ledger.quest_in(scope.school_id, quest_id)
    }

    pub fn submission(
        &self,
        scope: &Scope,
        submission_id: SubmissionId,
    ) -> Result<Submission, EconomyError> {
        self.authorize(scope)?;
        let row = self.ledger.submission_in(scope.school_id, submission_id)?;
        let submission = row.lock().clone();
        if !scope.can_review() {
            scope.require_acting_as(submission.user_id, "view other submissions")?;
        }
        Ok(submission)
    }

    pub fn purchase_record(
        &self,
        scope: &Scope,
        purchase_id: PurchaseId,
    ) -> Result<Purchase, EconomyError> {
        self.authorize(scope)?;
        let row = self.ledger.purchase_in(scope.school_id, purchase_id)?;
        let purchase = row.lock().clone();
        if !scope.can_review() {
            scope.require_acting_as(purchase.user_id, "view other purchases")?;
        }
        Ok(purchase)
    }

    /// Review queue, oldest submission first.
    pub fn pending_submissions(&self, scope: &Scope) -> Result<Vec<Submission>, EconomyError> {
        self.authorize(scope)?;
        scope.require_reviewer("review submissions")?;
        Ok(self.ledger.submissions_where(scope.school_id, |submission| {
            submission.status == SubmissionStatus::Pending
        }))
    }

    /// Fulfilment queue, oldest purchase first.
    pub fn pending_purchases(&self, scope: &Scope) -> Result<Vec<Purchase>, EconomyError> {
        self.authorize(scope)?;
        scope.require_reviewer("fulfil purchases")?;
        Ok(self.ledger.purchases_where(scope.school_id, |purchase| {
            purchase.status == PurchaseStatus::Pending
        }))
    }

    pub fn purchases_of(
        &self,
        scope: &Scope,
        user_id: UserId,
    ) -> Result<Vec<Purchase>, EconomyError> {
        self.authorize(scope)?;
        if !scope.can_review() {
            scope.require_acting_as(user_id, "view other purchases")?;
        }
        self.ledger.user_in(scope.school_id, user_id)?;
        Ok(self
            .ledger
            .purchases_where(scope.school_id, |purchase| purchase.user_id == user_id))
    }

    /// Users of one school, ordered by ID.
    pub fn accounts_in(&self, school_id: SchoolId) -> Vec<Arc<UserAccount>> {
        self.ledger.users_in(school_id)
    }

    /// Every account, ordered by school then user ID.
    pub fn accounts(&self) -> Vec<Arc<UserAccount>> {
        self.ledger.all_users()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Arc::new(LoggingNotifier))
    }
}
