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

pub mod compiler;
pub mod error;
pub mod os;

use std::process;

pub const IS_ON_CI: bool = option_env!("CI").is_some();

const EXITCODE_ONE: i32 = 0x01;

pub fn exit_error() -> ! {
    process::exit(EXITCODE_ONE)
}

/// Render a human-readable byte count using the same units the verification and
/// space-reclamation log lines use (`kB`, `MB`, `GB`)
pub fn fmt_kb(kb: u64) -> String {
    const UNIT: u64 = 1024;
    if kb < UNIT {
        format!("{kb} kB")
    } else if kb < UNIT * UNIT {
        format!("{:.2} MB", kb as f64 / UNIT as f64)
    } else {
        format!("{:.2} GB", kb as f64 / (UNIT * UNIT) as f64)
    }
}
