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

//! Level computation.
//!
//! `level(points) = floor(sqrt(points / 100)) + 1`, so level `n` starts at
//! `(n - 1)² * 100` points and level `n + 1` at `n² * 100`.
//!
//! ```
//! use points_economy::leveling::{level, progress};
//! use rust_decimal::Decimal;
//!
//! assert_eq!(level(0), 1);
//! assert_eq!(level(150), 2);
//! assert_eq!(progress(0, 1), Decimal::ZERO);
//! ```

use crate::base::Points;
use rust_decimal::Decimal;
use serde::Serialize;

const POINTS_PER_LEVEL_STEP: Points = 100;

pub fn level(points: Points) -> u32 {
    // isqrt of a u64 fits in u32
    ((points / POINTS_PER_LEVEL_STEP).isqrt() as u32).saturating_add(1)
}

/// Points required to be at `level`.
pub fn points_floor(level: u32) -> Points {
    let steps = Points::from(level.saturating_sub(1));
    steps.saturating_mul(steps).saturating_mul(POINTS_PER_LEVEL_STEP)
}

/// Points required to reach `level + 1`.
pub fn points_ceil(level: u32) -> Points {
    let steps = Points::from(level);
    steps.saturating_mul(steps).saturating_mul(POINTS_PER_LEVEL_STEP)
}

/// Fraction of the way from `level` to `level + 1`, clamped to `[0, 1]`.
pub fn progress(points: Points, level: u32) -> Decimal {
    let floor = points_floor(level);
    let ceil = points_ceil(level);
    if points <= floor || ceil <= floor {
        return Decimal::ZERO;
    }
    if points >= ceil {
        return Decimal::ONE;
    }
    Decimal::from(points - floor) / Decimal::from(ceil - floor)
}

/// Level and progress derived from a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelInfo {
    pub level: u32,
    pub progress: Decimal,
    /// Points still missing for the next level.
    pub to_next: Points,
}

impl LevelInfo {
    pub fn from_points(points: Points) -> Self {
        let level = level(points);
        Self {
            level,
            progress: progress(points, level),
            to_next: points_ceil(level).saturating_sub(points),
        }
    }
}
