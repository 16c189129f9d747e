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

//! # Points Economy
//!
//! This library is the points engine of a school gamification platform:
//! students earn points by completing quests, spend them in a marketplace,
//! and staff review submissions and hand out purchases.
//!
//! ## Core Components
//!
//! - [`Engine`]: Entry point for quest review, purchases and the catalog
//! - `ledger`: Row-locked store for balances, stock, submissions and purchases
//! - [`leveling`]: Pure level and progress computation
//! - [`Dispatcher`]: Fire-and-forget delivery of [`DomainEvent`]s to a [`Notifier`]
//! - [`EconomyError`]: Typed failures with an [`ErrorKind`] for callers to branch on
//!
//! ## Example
//!
//! ```
//! use points_economy::{
//!     Decision, Engine, ProductId, Product, Quest, QuestId, QuestKind, Role, SchoolId, Scope,
//!     UserId,
//! };
//!
//! let engine = Engine::default();
//! let school = SchoolId(1);
//! engine.register_user(school, UserId(1), Role::Teacher, 0).unwrap();
//! engine.register_user(school, UserId(2), Role::Student, 0).unwrap();
//! engine
//!     .register_quest(Quest::new(QuestId(1), school, "Science fair", QuestKind::Academic, 150))
//!     .unwrap();
//! engine
//!     .register_product(Product::new(ProductId(1), school, "Hoodie", 100, 10))
//!     .unwrap();
//!
//! let student = Scope::new(school, UserId(2), Role::Student);
//! let teacher = Scope::new(school, UserId(1), Role::Teacher);
//!
//! let submission = engine
//!     .submit_quest(&student, UserId(2), QuestId(1), "poster.jpg", None)
//!     .unwrap();
//! engine
//!     .review_submission(&teacher, submission.id, Decision::Approve, Some("Great work"))
//!     .unwrap();
//!
//! let purchase = engine.purchase(&student, UserId(2), ProductId(1), 1).unwrap();
//! assert_eq!(purchase.total_cost, 100);
//!
//! let summary = engine.user_summary(&student, UserId(2)).unwrap();
//! assert_eq!(summary.balance, 50);
//! assert_eq!(summary.level.level, 1);
//! ```
//!
//! ## Thread Safety
//!
//! Every operation takes `&self`; share the engine behind an `Arc`. Rows
//! are locked individually, so unrelated users and products proceed in
//! parallel.

pub mod account;
mod base;
pub mod config;
mod engine;
pub mod error;
pub mod events;
mod ledger;
pub mod leveling;
mod marketplace;
pub mod purchase;
mod quests;
pub mod scope;
pub mod submission;

pub use account::{LevelChange, UserAccount};
pub use base::{Points, ProductId, PurchaseId, QuestId, SchoolId, SubmissionId, UserId};
pub use config::EngineConfig;
pub use engine::{Engine, UserSummary};
pub use error::{EconomyError, ErrorKind};
pub use events::{Dispatcher, DomainEvent, EventKind, LoggingNotifier, Notifier, NotifyError};
pub use leveling::LevelInfo;
pub use purchase::{Product, Purchase, PurchaseStatus};
pub use scope::{Actor, Role, Scope};
pub use submission::{Decision, Quest, QuestKind, Submission, SubmissionStatus};
