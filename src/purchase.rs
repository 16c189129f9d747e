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

//! Marketplace products and purchases.
//!
//! Purchase state machine:
//!
//! ```text
//!  purchase ──► PENDING ──claim───► CLAIMED    (handed over, no ledger effect)
//!                  │
//!                  └──cancel──► CANCELLED      (points refunded, stock restored)
//! ```
//!
//! A purchase keeps the unit price and total it was charged; later price
//! changes on the product never reach it.

use crate::base::{Points, ProductId, PurchaseId, SchoolId, UserId};
use crate::error::EconomyError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub school_id: SchoolId,
    pub name: String,
    pub price: Points,
    pub stock: u32,
    /// Cap on the quantity one student may hold across non-cancelled purchases.
    #[serde(default)]
    pub max_per_student: Option<u32>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Product {
    pub fn new(
        id: ProductId,
        school_id: SchoolId,
        name: impl Into<String>,
        price: Points,
        stock: u32,
    ) -> Self {
        Self {
            id,
            school_id,
            name: name.into(),
            price,
            stock,
            max_per_student: None,
            active: true,
        }
    }

    pub fn with_max_per_student(mut self, max: u32) -> Self {
        self.max_per_student = Some(max);
        self
    }

    /// Stock in `(0, threshold]`. Zero is out of stock, not low.
    pub fn is_low_stock(&self, threshold: u32) -> bool {
        self.stock > 0 && self.stock <= threshold
    }

    pub(crate) fn ensure_stock(&self, quantity: u32) -> Result<(), EconomyError> {
        if self.stock < quantity {
            return Err(EconomyError::InsufficientStock {
                product_id: self.id,
                available: self.stock,
                requested: quantity,
            });
        }
        Ok(())
    }

    pub(crate) fn take_stock(&mut self, quantity: u32) -> Result<(), EconomyError> {
        self.ensure_stock(quantity)?;
        self.stock -= quantity;
        Ok(())
    }

    pub(crate) fn return_stock(&mut self, quantity: u32) -> Result<(), EconomyError> {
        self.stock = self.stock.checked_add(quantity).ok_or_else(|| {
            EconomyError::TransactionAborted(format!("stock overflow for product {}", self.id))
        })?;
        Ok(())
    }

    pub(crate) fn cost_of(&self, quantity: u32) -> Result<Points, EconomyError> {
        self.price
            .checked_mul(Points::from(quantity))
            .ok_or_else(|| EconomyError::validation(format!("quantity {quantity} too large")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseStatus {
    Pending,
    Claimed,
    Cancelled,
}

impl PurchaseStatus {
    /// Counts toward the per-student cap.
    pub fn is_held(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Claimed => "CLAIMED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub school_id: SchoolId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Product price when the purchase committed.
    pub unit_price: Points,
    pub total_cost: Points,
    pub status: PurchaseStatus,
    pub purchased_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by: Option<UserId>,
}

impl Purchase {
    pub(crate) fn new(
        id: PurchaseId,
        user_id: UserId,
        product: &Product,
        quantity: u32,
        total_cost: Points,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            school_id: product.school_id,
            user_id,
            product_id: product.id,
            quantity,
            unit_price: product.price,
            total_cost,
            status: PurchaseStatus::Pending,
            purchased_at: now,
            claimed_at: None,
            claimed_by: None,
        }
    }

    pub(crate) fn ensure_pending(&self) -> Result<(), EconomyError> {
        if self.status != PurchaseStatus::Pending {
            return Err(EconomyError::AlreadyProcessed {
                purchase_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    pub(crate) fn close(&mut self, status: PurchaseStatus, reviewer: UserId, now: DateTime<Utc>) {
        debug_assert_eq!(self.status, PurchaseStatus::Pending);
        self.status = status;
        self.claimed_at = Some(now);
        self.claimed_by = Some(reviewer);
    }
}
