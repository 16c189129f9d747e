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

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use points_economy::{
    Decision, EconomyError, Engine, EngineConfig, LoggingNotifier, Points, Product, ProductId,
    PurchaseId, Quest, QuestId, Role, SchoolId, Scope, SubmissionId, UserId,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Points Economy - Replay operations against a seeded catalog
///
/// Loads users, quests and products from a TOML seed, replays an operations
/// CSV, and writes final user balances and levels as CSV to stdout.
#[derive(Parser, Debug)]
#[command(name = "points-economy")]
#[command(about = "Replays quest and marketplace operations and reports balances", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,actor,target,quantity,note
    /// where op is one of submit, approve, reject, purchase, claim, cancel.
    /// For submit, note is the proof, or the comment on a social quest.
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// TOML seed with `[engine]` settings and `[[users]]`, `[[quests]]`,
    /// `[[products]]` tables. Quest deadlines are RFC 3339 strings.
    #[arg(long, value_name = "SEED")]
    seed: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let seed = match &args.seed {
        Some(path) => match Seed::load(path) {
            Ok(seed) => seed,
            Err(e) => {
                error!("Error loading seed '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => Seed::default(),
    };

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            error!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let replay = match Replay::from_seed(seed) {
        Ok(replay) => replay,
        Err(e) => {
            error!("Error applying seed: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = replay.process_operations(BufReader::new(file)) {
        error!("Error processing operations: {}", e);
        process::exit(1);
    }

    if let Err(e) = write_accounts(&replay.engine, std::io::stdout()) {
        error!("Error writing output: {}", e);
        process::exit(1);
    }
}

#[derive(Error, Debug)]
enum SeedError {
    #[error("cannot read seed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid seed: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Economy(#[from] EconomyError),
}

#[derive(Debug, Deserialize)]
struct SeedUser {
    school_id: SchoolId,
    id: UserId,
    role: Role,
    #[serde(default)]
    balance: Points,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Seed {
    engine: EngineConfig,
    users: Vec<SeedUser>,
    quests: Vec<Quest>,
    products: Vec<Product>,
}

impl Seed {
    fn load(path: &Path) -> Result<Self, SeedError> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, actor, target, quantity, note`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    actor: u32,
    target: u64,
    #[serde(deserialize_with = "csv::invalid_option")]
    quantity: Option<u32>,
    #[serde(default)]
    note: Option<String>,
}

/// Engine plus the actor directory used to resolve each row's tenant scope.
struct Replay {
    engine: Engine,
    actors: HashMap<UserId, (SchoolId, Role)>,
}

impl Replay {
    fn from_seed(seed: Seed) -> Result<Self, SeedError> {
        let engine = Engine::with_config(seed.engine, Arc::new(LoggingNotifier));
        let mut actors = HashMap::new();
        for user in seed.users {
            engine.register_user(user.school_id, user.id, user.role, user.balance)?;
            actors.insert(user.id, (user.school_id, user.role));
        }
        for quest in seed.quests {
            engine.register_quest(quest)?;
        }
        for product in seed.products {
            engine.register_product(product)?;
        }
        Ok(Self { engine, actors })
    }

    fn scope_for(&self, actor: UserId) -> Option<Scope> {
        let (school_id, role) = self.actors.get(&actor)?;
        Some(Scope::new(*school_id, actor, *role))
    }

    /// Applies one row. `Ok(None)` means the op name is not recognised.
    fn apply(&self, record: &CsvRecord) -> Result<Option<String>, EconomyError> {
        let actor = UserId(record.actor);
        let scope = self
            .scope_for(actor)
            .ok_or(EconomyError::UserNotFound(actor))?;
        let note = record.note.as_deref().unwrap_or("");

        let outcome = match record.op.to_lowercase().as_str() {
            "submit" => {
                let quest_id = QuestId(narrow(record.target)?);
                let quest = self.engine.quest(&scope, quest_id)?;
                // The note is the comment for social quests and the proof otherwise.
                let (proof, comment) = if quest.kind.requires_comment() {
                    ("", Some(note))
                } else {
                    (note, None)
                };
                let submission = self
                    .engine
                    .submit_quest(&scope, actor, quest_id, proof, comment)?;
                format!("submission {} {}", submission.id, submission.status)
            }
            op @ ("approve" | "reject") => {
                let decision = if op == "approve" {
                    Decision::Approve
                } else {
                    Decision::Reject
                };
                let submission = self.engine.review_submission(
                    &scope,
                    SubmissionId(record.target),
                    decision,
                    Some(note),
                )?;
                format!("submission {} {}", submission.id, submission.status)
            }
            "purchase" => {
                let product_id = ProductId(narrow(record.target)?);
                let quantity = record.quantity.unwrap_or(1);
                let purchase = self.engine.purchase(&scope, actor, product_id, quantity)?;
                format!("purchase {} cost {}", purchase.id, purchase.total_cost)
            }
            "claim" => {
                let purchase = self
                    .engine
                    .claim_purchase(&scope, PurchaseId(record.target))?;
                format!("purchase {} {}", purchase.id, purchase.status)
            }
            "cancel" => {
                let purchase = self
                    .engine
                    .cancel_purchase(&scope, PurchaseId(record.target))?;
                format!("purchase {} {}", purchase.id, purchase.status)
            }
            _ => return Ok(None),
        };
        Ok(Some(outcome))
    }

    /// Replays operations from a CSV reader.
    ///
    /// Rejected operations and malformed rows are logged and skipped.
    ///
    /// # CSV Format
    ///
    /// ```csv
    /// op,actor,target,quantity,note
    /// submit,10,1,,poster.jpg
    /// approve,2,1,,nice work
    /// purchase,10,3,2,
    /// cancel,1,1,,
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a CSV error if the reader fails or the CSV structure is invalid.
    fn process_operations<R: Read>(&self, reader: R) -> Result<(), csv::Error> {
        let mut rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        for (line, result) in rdr.deserialize::<CsvRecord>().enumerate() {
            let line = line + 2;
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!(line, %e, "skipping malformed row");
                    continue;
                }
            };
            match self.apply(&record) {
                Ok(Some(outcome)) => info!(line, op = %record.op, "{outcome}"),
                Ok(None) => warn!(line, op = %record.op, "skipping unknown operation"),
                Err(e) => warn!(line, op = %record.op, kind = ?e.kind(), "rejected: {e}"),
            }
        }

        self.engine.flush_notifications();
        Ok(())
    }
}

fn narrow(target: u64) -> Result<u32, EconomyError> {
    u32::try_from(target).map_err(|_| EconomyError::ValidationFailed(format!("id {target} out of range")))
}

/// Writes user states as CSV: `user, school, balance, level, progress`.
fn write_accounts<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for account in engine.accounts() {
        wtr.serialize(&*account)?;
    }
    wtr.flush()?;
    Ok(())
}
