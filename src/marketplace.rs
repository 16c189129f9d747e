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

//! Marketplace purchases, fulfilment and cancellation.
//!
//! Every check runs against rows locked in `user → product → purchase`
//! order, and the write happens under the same locks. Two buyers racing for
//! the last item serialize on the product row; the loser sees the committed
//! stock and fails with `InsufficientStock`.

use crate::base::{ProductId, PurchaseId, UserId};
use crate::engine::Engine;
use crate::error::EconomyError;
use crate::events::DomainEvent;
use crate::purchase::{Purchase, PurchaseStatus};
use crate::scope::Scope;
use chrono::Utc;
use tracing::{debug, info};

impl Engine {
    /// Buys `quantity` units of a product for `user_id`.
    ///
    /// # Checks
    ///
    /// | Order | Check | Error |
    /// |-------|-------|-------|
    /// | 1 | Product active and in scope | [`EconomyError::ProductNotFound`] |
    /// | 2 | Stock covers quantity | [`EconomyError::InsufficientStock`] |
    /// | 3 | Per-student cap | [`EconomyError::LimitExceeded`] |
    /// | 4 | Balance covers cost | [`EconomyError::InsufficientBalance`] |
    ///
    /// On success the balance debit, stock decrement and purchase record
    /// commit together, then `PurchaseConfirmed` (and `LowStock` when the
    /// remaining stock is in `(0, threshold]`) are emitted.
    pub fn purchase(
        &self,
        scope: &Scope,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Purchase, EconomyError> {
        self.authorize(scope)?;
        scope.require_acting_as(user_id, "purchase")?;
        if quantity == 0 {
            return Err(EconomyError::validation("quantity must be positive"));
        }

        let account = self.ledger.user_in(scope.school_id, user_id)?;
        let product_row = self.ledger.product_in(scope.school_id, product_id)?;

        let mut user = account.lock();
        let mut product = product_row.lock();

        if !product.active {
            return Err(EconomyError::ProductNotFound(product_id));
        }
        product.ensure_stock(quantity)?;
        if let Some(max) = product.max_per_student {
            let current_total = self.ledger.held_quantity(&user, product_id);
            if current_total.saturating_add(quantity) > max {
                return Err(EconomyError::LimitExceeded {
                    product_id,
                    current_total,
                    requested: quantity,
                    max,
                });
            }
        }
        let cost = product.cost_of(quantity)?;
        if user.balance() < cost {
            return Err(EconomyError::InsufficientBalance {
                available: user.balance(),
                required: cost,
            });
        }

        let (purchase, change) = self
            .ledger
            .commit_purchase(&mut user, &mut product, quantity, cost, Utc::now())?;
        let remaining = product.stock;
        let low_stock = product.is_low_stock(self.config.low_stock_threshold);
        drop(product);
        drop(user);

        info!(
            purchase_id = %purchase.id,
            %user_id,
            %product_id,
            quantity,
            cost,
            remaining,
            "purchase committed"
        );
        if change.from != change.to {
            debug!(%user_id, from = change.from, to = change.to, "level changed by purchase");
        }

        let mut events = vec![DomainEvent::PurchaseConfirmed {
            school_id: scope.school_id,
            user_id,
            purchase_id: purchase.id,
            product_id,
            quantity,
            total_cost: cost,
        }];
        if low_stock {
            events.push(DomainEvent::LowStock {
                school_id: scope.school_id,
                user_id,
                product_id,
                remaining,
            });
        }
        self.emit(events);
        Ok(purchase)
    }

    /// Marks a pending purchase as handed over. Balance and stock are untouched.
    ///
    /// # Errors
    ///
    /// - [`EconomyError::Forbidden`] - Actor is not a teacher or administrator.
    /// - [`EconomyError::PurchaseNotFound`] - Purchase missing or in another school.
    /// - [`EconomyError::AlreadyProcessed`] - Purchase already claimed or cancelled.
    pub fn claim_purchase(
        &self,
        scope: &Scope,
        purchase_id: PurchaseId,
    ) -> Result<Purchase, EconomyError> {
        self.authorize(scope)?;
        scope.require_reviewer("fulfil purchases")?;
        let row = self.ledger.purchase_in(scope.school_id, purchase_id)?;

        let mut purchase = row.lock();
        purchase.ensure_pending()?;
        purchase.close(PurchaseStatus::Claimed, scope.actor.user_id, Utc::now());

        info!(%purchase_id, reviewer = %scope.actor.user_id, "purchase claimed");
        Ok(purchase.clone())
    }

    /// Cancels a pending purchase, refunding its stored total and restoring
    /// its stored quantity. The product's current price plays no part.
    ///
    /// # Errors
    ///
    /// - [`EconomyError::Forbidden`] - Actor is not a teacher or administrator.
    /// - [`EconomyError::PurchaseNotFound`] - Purchase missing or in another school.
    /// - [`EconomyError::AlreadyProcessed`] - Purchase already claimed or cancelled.
    /// - [`EconomyError::TransactionAborted`] - Refund or restock would overflow.
    pub fn cancel_purchase(
        &self,
        scope: &Scope,
        purchase_id: PurchaseId,
    ) -> Result<Purchase, EconomyError> {
        self.authorize(scope)?;
        scope.require_reviewer("cancel purchases")?;
        let row = self.ledger.purchase_in(scope.school_id, purchase_id)?;
        let (user_id, product_id) = {
            let purchase = row.lock();
            (purchase.user_id, purchase.product_id)
        };
        let account = self.ledger.user_in(scope.school_id, user_id)?;
        let product_row = self.ledger.product_in(scope.school_id, product_id)?;

        let mut user = account.lock();
        let mut product = product_row.lock();
        let mut purchase = row.lock();
        purchase.ensure_pending()?;

        self.ledger.revert_purchase(
            &mut user,
            &mut product,
            &mut purchase,
            scope.actor.user_id,
            Utc::now(),
        )?;

        info!(
            %purchase_id,
            %user_id,
            refund = purchase.total_cost,
            restored = purchase.quantity,
            reviewer = %scope.actor.user_id,
            "purchase cancelled"
        );
        Ok(purchase.clone())
    }
}
