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

//! The five pending-op journals. Each is a full-file rewrite on every mutation: not
//! atomic by rename, accepted because every recorded operation is idempotent on
//! replay. A loader never fails on a missing file or a single malformed line — it
//! logs a warning and drops that line, so a crash mid-write degrades to a valid
//! prefix rather than refusing to start

pub mod adds;
pub mod dels;
pub mod mods;
pub mod newmods;
pub mod permissions;

use crate::util::error::SkyResult;
use std::fs;
use std::io;
use std::path::Path;

/// Read `path` as whitespace-tolerant lines, treating a missing file as empty
pub(crate) fn read_lines_tolerant(path: &Path) -> SkyResult<Vec<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Rewrite `path` in full from `lines`
pub(crate) fn write_lines(path: &Path, lines: impl Iterator<Item = String>) -> SkyResult<()> {
    let mut out = String::new();
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
    fs::write(path, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_empty() {
        let path = Path::new("/tmp/digs-pending-journal-definitely-does-not-exist");
        assert_eq!(read_lines_tolerant(path).unwrap(), Vec::<String>::new());
    }
}
