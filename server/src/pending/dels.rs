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

//! `pendingdels`: `<host> <absolute-path>`, drained once `host` transitions dead→alive

use super::{read_lines_tolerant, write_lines};
use crate::util::error::SkyResult;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelete {
    pub host: String,
    pub path: String,
}

#[derive(Default)]
pub struct PendingDeleteList {
    entries: Vec<PendingDelete>,
}

impl PendingDeleteList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> SkyResult<Self> {
        let mut list = Self::new();
        for line in read_lines_tolerant(path)? {
            let mut parts = line.splitn(2, ' ');
            match (parts.next(), parts.next()) {
                (Some(host), Some(p)) => list.entries.push(PendingDelete {
                    host: host.to_owned(),
                    path: p.to_owned(),
                }),
                _ => log::warn!("skipping malformed pendingdels line: {line}"),
            }
        }
        Ok(list)
    }

    pub fn save(&self, path: &Path) -> SkyResult<()> {
        write_lines(
            path,
            self.entries.iter().map(|e| format!("{} {}", e.host, e.path)),
        )
    }

    pub fn push(&mut self, host: impl Into<String>, path: impl Into<String>) {
        self.entries.push(PendingDelete {
            host: host.into(),
            path: path.into(),
        });
    }

    /// Every pending delete queued against `host`, in insertion order
    pub fn for_host<'a>(&'a self, host: &'a str) -> impl Iterator<Item = &'a PendingDelete> + 'a {
        self.entries.iter().filter(move |e| e.host == host)
    }

    /// Drop one matching entry (the one the caller just successfully replayed)
    pub fn remove(&mut self, host: &str, path: &str) {
        if let Some(pos) = self.entries.iter().position(|e| e.host == host && e.path == path) {
            self.entries.remove(pos);
        }
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
    fn round_trip_preserves_order() {
        let mut list = PendingDeleteList::new();
        list.push("hA", "/store/data/foo");
        list.push("hA", "/store/data/bar");
        list.push("hB", "/store/data2/baz");
        let path = std::env::temp_dir().join(format!("digs-pendingdels-test-{}", std::process::id()));
        list.save(&path).unwrap();
        let reloaded = PendingDeleteList::load(&path).unwrap();
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.for_host("hA").count(), 2);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn dead_host_drain_removes_only_that_entry() {
        let mut list = PendingDeleteList::new();
        list.push("hA", "/store/data/foo");
        list.remove("hA", "/store/data/foo");
        assert!(list.is_empty());
    }
}
