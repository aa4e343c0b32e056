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

//! `pendingmods`: `<lfn> <host> <source-host>` — a still-to-be-propagated copy-over
//! on `host`, sourced from `source`. Created once a [`super::newmods::NewModification`]
//! is promoted and fanned out across every other replica

use super::{read_lines_tolerant, write_lines};
use crate::util::error::SkyResult;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingModification {
    pub lfn: String,
    pub host: String,
    pub source: String,
}

#[derive(Default)]
pub struct PendingModificationList {
    entries: Vec<PendingModification>,
}

impl PendingModificationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> SkyResult<Self> {
        let mut list = Self::new();
        for line in read_lines_tolerant(path)? {
            let mut parts = line.splitn(3, ' ');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(lfn), Some(host), Some(source)) => list.entries.push(PendingModification {
                    lfn: lfn.to_owned(),
                    host: host.to_owned(),
                    source: source.to_owned(),
                }),
                _ => log::warn!("skipping malformed pendingmods line: {line}"),
            }
        }
        Ok(list)
    }

    pub fn save(&self, path: &Path) -> SkyResult<()> {
        write_lines(
            path,
            self.entries
                .iter()
                .map(|e| format!("{} {} {}", e.lfn, e.host, e.source)),
        )
    }

    pub fn push(&mut self, lfn: impl Into<String>, host: impl Into<String>, source: impl Into<String>) {
        self.entries.push(PendingModification {
            lfn: lfn.into(),
            host: host.into(),
            source: source.into(),
        });
    }

    pub fn for_host<'a>(&'a self, host: &'a str) -> impl Iterator<Item = &'a PendingModification> + 'a {
        self.entries.iter().filter(move |e| e.host == host)
    }

    /// Whether any replica of `lfn`, on any host, still has a propagation pending
    pub fn has_pending_for_lfn(&self, lfn: &str) -> bool {
        self.entries.iter().any(|e| e.lfn == lfn)
    }

    pub fn remove(&mut self, lfn: &str, host: &str) {
        self.entries.retain(|e| !(e.lfn == lfn && e.host == host));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_on_resurrection_targets_only_that_host() {
        let mut list = PendingModificationList::new();
        list.push("u/v.dat", "hA", "hMain");
        list.push("u/v.dat", "hB", "hMain");
        assert_eq!(list.for_host("hA").count(), 1);
        list.remove("u/v.dat", "hA");
        assert_eq!(list.len(), 1);
        assert_eq!(list.for_host("hB").count(), 1);
    }
}
