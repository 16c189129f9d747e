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

//! Domain events emitted by committed transitions.

use parking_lot::Mutex;
use points_economy::{
    Decision, DomainEvent, Engine, EngineConfig, EventKind, Notifier, NotifyError, Product,
    ProductId, Quest, QuestId, QuestKind, Role, SchoolId, Scope, UserId,
};
use std::sync::Arc;

const SCHOOL: SchoolId = SchoolId(1);
const TEACHER: UserId = UserId(2);
const ALICE: UserId = UserId(10);

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<DomainEvent>>,
}

impl Recorder {
    fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(DomainEvent::kind).collect()
    }
}

impl Notifier for Recorder {
    fn notify(&self, event: &DomainEvent) -> Result<(), NotifyError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Rejects every delivery.
struct Unreachable;

impl Notifier for Unreachable {
    fn notify(&self, _event: &DomainEvent) -> Result<(), NotifyError> {
        Err(NotifyError("push gateway down".into()))
    }
}

fn setup(notifier: Arc<dyn Notifier>, alice_balance: u64) -> Engine {
    let engine = Engine::new(notifier);
    engine.register_user(SCHOOL, TEACHER, Role::Teacher, 0).unwrap();
    engine
        .register_user(SCHOOL, ALICE, Role::Student, alice_balance)
        .unwrap();
    engine
}

fn alice() -> Scope {
    Scope::new(SCHOOL, ALICE, Role::Student)
}

fn teacher() -> Scope {
    Scope::new(SCHOOL, TEACHER, Role::Teacher)
}

fn approve_quest(engine: &Engine, points: u64) {
    engine
        .register_quest(Quest::new(QuestId(1), SCHOOL, "Quest", QuestKind::Academic, points))
        .unwrap();
    let submission = engine
        .submit_quest(&alice(), ALICE, QuestId(1), "proof", None)
        .unwrap();
    engine
        .review_submission(&teacher(), submission.id, Decision::Approve, None)
        .unwrap();
}

#[test]
fn approval_with_level_up_emits_both_events() {
    let recorder = Arc::new(Recorder::default());
    let engine = setup(recorder.clone(), 0);

    approve_quest(&engine, 150);
    engine.flush_notifications();

    assert_eq!(
        recorder.kinds(),
        vec![EventKind::QuestApproved, EventKind::LevelUp]
    );
    let events = recorder.events.lock();
    assert!(matches!(
        events[0],
        DomainEvent::QuestApproved { points: 150, user_id: ALICE, .. }
    ));
    assert!(matches!(
        events[1],
        DomainEvent::LevelUp { from: 1, to: 2, .. }
    ));
}

#[test]
fn approval_without_level_up_emits_one_event() {
    let recorder = Arc::new(Recorder::default());
    let engine = setup(recorder.clone(), 0);

    approve_quest(&engine, 50);
    engine.flush_notifications();

    assert_eq!(recorder.kinds(), vec![EventKind::QuestApproved]);
}

#[test]
fn rejection_emits_quest_rejected_with_feedback() {
    let recorder = Arc::new(Recorder::default());
    let engine = setup(recorder.clone(), 0);
    engine
        .register_quest(Quest::new(QuestId(1), SCHOOL, "Quest", QuestKind::Academic, 50))
        .unwrap();
    let submission = engine
        .submit_quest(&alice(), ALICE, QuestId(1), "proof", None)
        .unwrap();
    engine
        .review_submission(&teacher(), submission.id, Decision::Reject, Some("try again"))
        .unwrap();
    engine.flush_notifications();

    let events = recorder.events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0],
        DomainEvent::QuestRejected {
            school_id: SCHOOL,
            user_id: ALICE,
            submission_id: submission.id,
            quest_id: QuestId(1),
            feedback: Some("try again".into()),
        }
    );
}

#[test]
fn failed_operations_emit_nothing() {
    let recorder = Arc::new(Recorder::default());
    let engine = setup(recorder.clone(), 10);
    engine
        .register_product(Product::new(ProductId(1), SCHOOL, "Hoodie", 100, 3))
        .unwrap();

    assert!(engine.purchase(&alice(), ALICE, ProductId(1), 1).is_err());
    engine.flush_notifications();

    assert!(recorder.kinds().is_empty());
}

#[test]
fn purchase_into_low_stock_emits_low_stock() {
    let recorder = Arc::new(Recorder::default());
    let engine = setup(recorder.clone(), 1_000);
    engine
        .register_product(Product::new(ProductId(1), SCHOOL, "Pin", 10, 7))
        .unwrap();

    // 7 -> 6: not low yet
    engine.purchase(&alice(), ALICE, ProductId(1), 1).unwrap();
    // 6 -> 5: low
    engine.purchase(&alice(), ALICE, ProductId(1), 1).unwrap();
    engine.flush_notifications();

    assert_eq!(
        recorder.kinds(),
        vec![
            EventKind::PurchaseConfirmed,
            EventKind::PurchaseConfirmed,
            EventKind::LowStock
        ]
    );
    let events = recorder.events.lock();
    assert!(matches!(
        events[2],
        DomainEvent::LowStock { remaining: 5, product_id: ProductId(1), .. }
    ));
}

#[test]
fn selling_out_is_not_low_stock() {
    let recorder = Arc::new(Recorder::default());
    let engine = setup(recorder.clone(), 1_000);
    engine
        .register_product(Product::new(ProductId(1), SCHOOL, "Pin", 10, 2))
        .unwrap();

    engine.purchase(&alice(), ALICE, ProductId(1), 2).unwrap();
    engine.flush_notifications();

    assert_eq!(recorder.kinds(), vec![EventKind::PurchaseConfirmed]);
}

#[test]
fn low_stock_threshold_is_configurable() {
    let recorder = Arc::new(Recorder::default());
    let engine = Engine::with_config(
        EngineConfig {
            low_stock_threshold: 1,
        },
        recorder.clone(),
    );
    engine.register_user(SCHOOL, ALICE, Role::Student, 1_000).unwrap();
    engine
        .register_product(Product::new(ProductId(1), SCHOOL, "Pin", 10, 3))
        .unwrap();

    engine.purchase(&alice(), ALICE, ProductId(1), 1).unwrap();
    engine.purchase(&alice(), ALICE, ProductId(1), 1).unwrap();
    engine.flush_notifications();

    assert_eq!(
        recorder.kinds(),
        vec![
            EventKind::PurchaseConfirmed,
            EventKind::PurchaseConfirmed,
            EventKind::LowStock
        ]
    );
}

#[test]
fn delivery_failure_does_not_fail_the_transaction() {
    let engine = setup(Arc::new(Unreachable), 0);

    approve_quest(&engine, 150);
    engine.flush_notifications();

    let summary = engine.user_summary(&teacher(), ALICE).unwrap();
    assert_eq!(summary.balance, 150);
    assert_eq!(summary.level.level, 2);
}

#[test]
fn claim_and_cancel_emit_nothing() {
    let recorder = Arc::new(Recorder::default());
    let engine = setup(recorder.clone(), 1_000);
    engine
        .register_product(Product::new(ProductId(1), SCHOOL, "Pin", 10, 100))
        .unwrap();
    let first = engine.purchase(&alice(), ALICE, ProductId(1), 1).unwrap();
    let second = engine.purchase(&alice(), ALICE, ProductId(1), 1).unwrap();
    engine.claim_purchase(&teacher(), first.id).unwrap();
    engine.cancel_purchase(&teacher(), second.id).unwrap();
    engine.flush_notifications();

    assert_eq!(
        recorder.kinds(),
        vec![EventKind::PurchaseConfirmed, EventKind::PurchaseConfirmed]
    );
}
