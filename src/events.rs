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

//! Domain events and their fire-and-forget dispatch.
//!
//! The engines emit events only after the ledger mutation they describe has
//! committed. Delivery runs on a dedicated worker thread fed by an unbounded
//! channel, so a slow or failing [`Notifier`] never blocks or fails the
//! operation that produced the event.

use crate::base::{Points, ProductId, PurchaseId, QuestId, SchoolId, SubmissionId, UserId};
use crossbeam::channel::{self, Receiver, Sender};
use serde::Serialize;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    QuestApproved,
    QuestRejected,
    LevelUp,
    PurchaseConfirmed,
    LowStock,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A committed state transition worth telling someone about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    QuestApproved {
        school_id: SchoolId,
        user_id: UserId,
        submission_id: SubmissionId,
        quest_id: QuestId,
        points: Points,
        feedback: Option<String>,
    },
    QuestRejected {
        school_id: SchoolId,
        user_id: UserId,
        submission_id: SubmissionId,
        quest_id: QuestId,
        feedback: Option<String>,
    },
    LevelUp {
        school_id: SchoolId,
        user_id: UserId,
        from: u32,
        to: u32,
    },
    PurchaseConfirmed {
        school_id: SchoolId,
        user_id: UserId,
        purchase_id: PurchaseId,
        product_id: ProductId,
        quantity: u32,
        total_cost: Points,
    },
    /// Raised by the purchase that left the product in low stock.
    LowStock {
        school_id: SchoolId,
        user_id: UserId,
        product_id: ProductId,
        remaining: u32,
    },
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::QuestApproved { .. } => EventKind::QuestApproved,
            Self::QuestRejected { .. } => EventKind::QuestRejected,
            Self::LevelUp { .. } => EventKind::LevelUp,
            Self::PurchaseConfirmed { .. } => EventKind::PurchaseConfirmed,
            Self::LowStock { .. } => EventKind::LowStock,
        }
    }

    pub fn user_id(&self) -> UserId {
        match self {
            Self::QuestApproved { user_id, .. }
            | Self::QuestRejected { user_id, .. }
            | Self::LevelUp { user_id, .. }
            | Self::PurchaseConfirmed { user_id, .. }
            | Self::LowStock { user_id, .. } => *user_id,
        }
    }

    pub fn school_id(&self) -> SchoolId {
        match self {
            Self::QuestApproved { school_id, .. }
            | Self::QuestRejected { school_id, .. }
            | Self::LevelUp { school_id, .. }
            | Self::PurchaseConfirmed { school_id, .. }
            | Self::LowStock { school_id, .. } => *school_id,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Delivery collaborator. Owns retries and channels; the ledger never depends on it.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &DomainEvent) -> Result<(), NotifyError>;
}

/// Writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify(&self, event: &DomainEvent) -> Result<(), NotifyError> {
        info!(
            kind = %event.kind(),
            school_id = %event.school_id(),
            user_id = %event.user_id(),
            ?event,
            "notification"
        );
        Ok(())
    }
}

enum Message {
    Event(DomainEvent),
    Flush(Sender<()>),
}

/// Queues events for a background worker that hands them to a [`Notifier`].
///
/// Dropping the dispatcher delivers everything still queued, then joins the worker.
pub struct Dispatcher {
    sender: Option<Sender<Message>>,
    worker: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn spawn(notifier: Arc<dyn Notifier>) -> Self {
        let (sender, receiver) = channel::unbounded();
        let worker = thread::spawn(move || run_worker(notifier, receiver));
        Self {
            sender: Some(sender),
            worker: Some(worker),
        }
    }

    /// Queues one event. Never blocks and never fails the caller.
    pub fn emit(&self, event: DomainEvent) {
        debug!(kind = %event.kind(), user_id = %event.user_id(), "queueing event");
        let Some(sender) = &self.sender else {
            return;
        };
        if let Err(err) = sender.send(Message::Event(event)) {
            // Worker is gone; the ledger has already committed.
            if let Message::Event(event) = err.into_inner() {
                warn!(kind = %event.kind(), "dispatcher stopped, dropping event");
            }
        }
    }

    pub fn emit_all(&self, events: impl IntoIterator<Item = DomainEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Blocks until every event queued before this call has been handed to the notifier.
    pub fn flush(&self) {
        let Some(sender) = &self.sender else {
            return;
        };
        let (ack, done) = channel::bounded(1);
        if sender.send(Message::Flush(ack)).is_ok() {
            let _ = done.recv();
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once the queue drains.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("notification worker panicked");
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("running", &self.sender.is_some())
            .finish()
    }
}

fn run_worker(notifier: Arc<dyn Notifier>, receiver: Receiver<Message>) {
    for message in receiver {
        match message {
            Message::Event(event) => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| notifier.notify(&event)));
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        warn!(kind = %event.kind(), user_id = %event.user_id(), %err, "notification failed");
                    }
                    Err(_) => {
                        warn!(kind = %event.kind(), user_id = %event.user_id(), "notifier panicked");
                    }
                }
            }
            Message::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}
