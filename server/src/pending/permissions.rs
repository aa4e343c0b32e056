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

//! `pendingpermissions`: `<recursive:true|false> <group> <lfn> <perm>`, drained by
//! the sweep's permission-propagation step, which sets the catalogue attribute and
//! then calls `setPermissions` on every replica

use super::{read_lines_tolerant, write_lines};
use crate::util::error::SkyResult;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPermissionChange {
    pub recursive: bool,
    pub group: String,
    pub lfn: String,
    pub permissions: String,
}

#[derive(Default)]
pub struct PendingPermissionList {
    entries: Vec<PendingPermissionChange>,
}

impl PendingPermissionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> SkyResult<Self> {
        let mut list = Self::new();
        for line in read_lines_tolerant(path)? {
            let parts: Vec<&str> = line.splitn(4, ' ').collect();
            if let [recursive, group, lfn, perm] = parts[..] {
                match recursive.parse() {
                    Ok(recursive) => list.entries.push(PendingPermissionChange {
                        recursive,
                        group: group.to_owned(),
                        lfn: lfn.to_owned(),
                        permissions: perm.to_owned(),
                    }),
                    Err(_) => log::warn!("skipping malformed pendingpermissions line: {line}"),
                }
            } else {
                log::warn!("skipping malformed pendingpermissions line: {line}");
            }
        }
        Ok(list)
    }

    pub fn save(&self, path: &Path) -> SkyResult<()> {
        write_lines(
            path,
            self.entries
                .iter()
                .map(|e| format!("{} {} {} {}", e.recursive, e.group, e.lfn, e.permissions)),
        )
    }

    pub fn push(&mut self, entry: PendingPermissionChange) {
        self.entries.push(entry);
    }

    pub fn drain_all(&mut self) -> Vec<PendingPermissionChange> {
        std::mem::take(&mut self.entries)
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
    fn round_trip_preserves_recursive_flag() {
        let mut list = PendingPermissionList::new();
        list.push(PendingPermissionChange {
            recursive: true,
            group: "ukq".to_owned(),
            lfn: "u/v".to_owned(),
            permissions: "private".to_owned(),
        });
        let path = std::env::temp_dir().join(format!("digs-pendingperms-test-{}", std::process::id()));
        list.save(&path).unwrap();
        let reloaded = PendingPermissionList::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn drain_empties_the_list() {
        let mut list = PendingPermissionList::new();
        list.push(PendingPermissionChange {
            recursive: false,
            group: "g".to_owned(),
            lfn: "a".to_owned(),
            permissions: "public".to_owned(),
        });
        let drained = list.drain_all();
        assert_eq!(drained.len(), 1);
        assert!(list.is_empty());
    }
}
