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

//! Benchmarks for the points economy engine.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Single-threaded purchase and purchase/cancel round trips
//! - Quest approval
//! - Multi-threaded purchases on one hot product vs. many products

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use points_economy::{
    Decision, DomainEvent, Engine, Notifier, NotifyError, Product, ProductId, Quest, QuestId,
    QuestKind, Role, SchoolId, Scope, UserId,
};
use rayon::prelude::*;
use std::sync::Arc;

const SCHOOL: SchoolId = SchoolId(1);
const STAFF: UserId = UserId(1);

// =============================================================================
// Helper Functions
// =============================================================================

/// Drops events so logging does not dominate the numbers.
struct Discard;

impl Notifier for Discard {
    fn notify(&self, _event: &DomainEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

fn staff() -> Scope {
    Scope::new(SCHOOL, STAFF, Role::Admin)
}

fn student(user: u32) -> Scope {
    Scope::new(SCHOOL, UserId(user), Role::Student)
}

/// Engine with `students` rich students (ids 100..) and `products` well-stocked products.
fn setup(students: u32, products: u32) -> Engine {
    let engine = Engine::new(Arc::new(Discard));
    engine.register_user(SCHOOL, STAFF, Role::Admin, 0).unwrap();
    for user in 0..students {
        engine
            .register_user(SCHOOL, UserId(100 + user), Role::Student, u64::MAX / 2)
            .unwrap();
    }
    for product in 0..products {
        engine
            .register_product(Product::new(ProductId(product), SCHOOL, "Item", 10, u32::MAX / 2))
            .unwrap();
    }
    engine
}

// =============================================================================
// Single-Threaded Benchmarks
// =============================================================================

fn bench_single_purchase(c: &mut Criterion) {
    let engine = setup(1, 1);
    c.bench_function("single_purchase", |b| {
        b.iter(|| {
            engine
                .purchase(&student(100), UserId(100), black_box(ProductId(0)), 1)
                .unwrap();
        })
    });
}

fn bench_purchase_cancel(c: &mut Criterion) {
    let engine = setup(1, 1);
    c.bench_function("purchase_cancel_round_trip", |b| {
        b.iter(|| {
            let purchase = engine
                .purchase(&student(100), UserId(100), ProductId(0), 1)
                .unwrap();
            engine.cancel_purchase(&staff(), black_box(purchase.id)).unwrap();
        })
    });
}

fn bench_quest_approval(c: &mut Criterion) {
    let mut group = c.benchmark_group("quest_approval");

    for count in [100u32, 1_000].iter() {
        group.throughput(Throughput::Elements(u64::from(*count)));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let engine = setup(1, 0);
                for quest in 0..count {
                    engine
                        .register_quest(Quest::new(QuestId(quest), SCHOOL, "Q", QuestKind::Academic, 25))
                        .unwrap();
                    let submission = engine
                        .submit_quest(&student(100), UserId(100), QuestId(quest), "proof", None)
                        .unwrap();
                    engine
                        .review_submission(&staff(), submission.id, Decision::Approve, None)
                        .unwrap();
                }
                black_box(&engine);
            })
        });
    }
    group.finish();
}

// =============================================================================
// Multi-Threaded Benchmarks
// =============================================================================

/// All threads buy the same product from different accounts.
fn bench_parallel_hot_product(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_hot_product");
    let engine = setup(64, 1);

    for count in [1_000u32, 10_000].iter() {
        group.throughput(Throughput::Elements(u64::from(*count)));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                (0..count).into_par_iter().for_each(|i| {
                    let user = 100 + i % 64;
                    engine
                        .purchase(&student(user), UserId(user), ProductId(0), 1)
                        .unwrap();
                });
            })
        });
    }
    group.finish();
}

/// Each thread buys its own product from its own account.
fn bench_parallel_independent(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_independent");
    let engine = setup(64, 64);

    for count in [1_000u32, 10_000].iter() {
        group.throughput(Throughput::Elements(u64::from(*count)));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                (0..count).into_par_iter().for_each(|i| {
                    let slot = i % 64;
                    engine
                        .purchase(&student(100 + slot), UserId(100 + slot), ProductId(slot), 1)
                        .unwrap();
                });
            })
        });
    }
    group.finish();
}

criterion_group!(
    single_threaded,
    bench_single_purchase,
    bench_purchase_cancel,
    bench_quest_approval,
);

criterion_group!(
    multi_threaded,
    bench_parallel_hot_product,
    bench_parallel_independent,
);

criterion_main!(single_threaded, multi_threaded);
