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

//! Engine configuration.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Stock at or below this (and above zero) after a purchase raises `LowStock`.
    pub low_stock_threshold: u32,
}

impl EngineConfig {
    pub const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 5;
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: Self::DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }
}
