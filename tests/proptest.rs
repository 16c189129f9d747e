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

//! Property-based tests for the points economy.
//!
//! These tests verify invariants that should hold for any sequence of
//! operations, successful or not.

use points_economy::leveling::{level, points_ceil, points_floor, progress};
use points_economy::{
    Decision, Engine, Product, ProductId, PurchaseId, PurchaseStatus, Quest, QuestId, QuestKind,
    Role, SchoolId, Scope, UserId,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

const SCHOOL: SchoolId = SchoolId(1);
const STAFF: UserId = UserId(1);
const BUYER: UserId = UserId(10);
const PRODUCT: ProductId = ProductId(1);

fn staff() -> Scope {
    Scope::new(SCHOOL, STAFF, Role::Admin)
}

fn buyer() -> Scope {
    Scope::new(SCHOOL, BUYER, Role::Student)
}

// =============================================================================
// Arbitrary Strategies
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Purchase(u32),
    Claim(u64),
    Cancel(u64),
    Reprice(u64),
    Earn(u64),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u32..4).prop_map(Op::Purchase),
        2 => (1u64..12).prop_map(Op::Claim),
        3 => (1u64..12).prop_map(Op::Cancel),
        1 => (1u64..300).prop_map(Op::Reprice),
        2 => (0u64..400).prop_map(Op::Earn),
    ]
}

fn engine_with(balance: u64, price: u64, stock: u32, max: Option<u32>) -> Engine {
    let engine = Engine::default();
    engine.register_user(SCHOOL, STAFF, Role::Admin, 0).unwrap();
    engine.register_user(SCHOOL, BUYER, Role::Student, balance).unwrap();
    let mut product = Product::new(PRODUCT, SCHOOL, "Item", price, stock);
    product.max_per_student = max;
    engine.register_product(product).unwrap();
    engine
}

// =============================================================================
// Leveling Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// More points never means a lower level.
    #[test]
    fn level_is_monotonic(a in 0u64..10_000_000, b in 0u64..10_000_000) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(level(low) <= level(high));
    }

    /// Every balance sits inside its level's bracket with progress in [0, 1].
    #[test]
    fn level_brackets_points(points in 0u64..1_000_000_000) {
        let l = level(points);
        prop_assert!(points_floor(l) <= points);
        prop_assert!(points < points_ceil(l));
        let p = progress(points, l);
        prop_assert!(p >= Decimal::ZERO && p <= Decimal::ONE);
    }
}

// =============================================================================
// Ledger Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Purchasing and then cancelling restores balance and stock exactly.
    #[test]
    fn purchase_cancel_round_trip(
        balance in 0u64..5_000,
        price in 1u64..500,
        stock in 0u32..20,
        quantity in 1u32..5,
        new_price in 1u64..500,
    ) {
        let engine = engine_with(balance, price, stock, None);

        if let Ok(purchase) = engine.purchase(&buyer(), BUYER, PRODUCT, quantity) {
            engine.set_product_price(&staff(), PRODUCT, new_price).unwrap();
            engine.cancel_purchase(&staff(), purchase.id).unwrap();
        }

        let summary = engine.user_summary(&staff(), BUYER).unwrap();
        prop_assert_eq!(summary.balance, balance);
        prop_assert_eq!(engine.product(&staff(), PRODUCT).unwrap().stock, stock);
    }

    /// Points and stock are conserved across any operation sequence:
    /// what left the balance or the shelf is exactly what non-cancelled
    /// purchases hold.
    #[test]
    fn points_and_stock_are_conserved(
        balance in 0u64..2_000,
        price in 1u64..300,
        stock in 0u32..15,
        max in prop::option::of(1u32..6),
        ops in prop::collection::vec(arb_op(), 0..40),
    ) {
        let engine = engine_with(balance, price, stock, max);
        let mut earned = 0u64;

        for (i, op) in ops.iter().enumerate() {
            match *op {
                Op::Purchase(quantity) => {
                    let _ = engine.purchase(&buyer(), BUYER, PRODUCT, quantity);
                }
                Op::Claim(id) => {
                    let _ = engine.claim_purchase(&staff(), PurchaseId(id));
                }
                Op::Cancel(id) => {
                    let _ = engine.cancel_purchase(&staff(), PurchaseId(id));
                }
                Op::Reprice(price) => {
                    engine.set_product_price(&staff(), PRODUCT, price).unwrap();
                }
                Op::Earn(points) => {
                    let quest_id = QuestId(i as u32);
                    engine
                        .register_quest(Quest::new(quest_id, SCHOOL, "Quest", QuestKind::Academic, points))
                        .unwrap();
                    let submission = engine
                        .submit_quest(&buyer(), BUYER, quest_id, "proof", None)
                        .unwrap();
                    engine
                        .review_submission(&staff(), submission.id, Decision::Approve, None)
                        .unwrap();
                    earned += points;
                }
            }
        }

        let purchases = engine.purchases_of(&staff(), BUYER).unwrap();
        let held: Vec<_> = purchases
            .iter()
            .filter(|purchase| purchase.status != PurchaseStatus::Cancelled)
            .collect();
        let spent: u64 = held.iter().map(|purchase| purchase.total_cost).sum();
        let taken: u32 = held.iter().map(|purchase| purchase.quantity).sum();

        let summary = engine.user_summary(&staff(), BUYER).unwrap();
        prop_assert_eq!(summary.balance + spent, balance + earned);
        prop_assert_eq!(engine.product(&staff(), PRODUCT).unwrap().stock + taken, stock);
        prop_assert_eq!(summary.level.level, level(summary.balance));
        if let Some(max) = max {
            prop_assert!(taken <= max);
        }
        for purchase in &purchases {
            prop_assert_eq!(purchase.total_cost, purchase.unit_price * u64::from(purchase.quantity));
        }
    }
}
