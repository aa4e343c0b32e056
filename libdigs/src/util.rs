/*
 * This file is part of digsd, the control-plane daemon for a wide-area
 * replicated data grid.
 *
 * Copyright (c) 2026, DiGS control plane contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! Small shared helpers that don't deserve their own crate

pub mod humandate {
    //! Human-readable timestamps used for the `<host>-lastchecked` replica attribute
    use chrono::{DateTime, Utc};

    /// Render "now" the way a freshly-checked replica's `-lastchecked` attribute is stamped
    pub fn now() -> String {
        Utc::now().format("%a %b %e %T %Y").to_string()
    }

    /// Render a unix timestamp the same way, used when replaying journalled timestamps
    pub fn from_unix(secs: i64) -> String {
        DateTime::from_timestamp(secs, 0)
            .map(|dt| dt.format("%a %b %e %T %Y").to_string())
            .unwrap_or_else(|| "unknown".to_owned())
    }
}
