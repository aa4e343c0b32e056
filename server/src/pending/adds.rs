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

//! `pendingadds`: `<lfn> <group> <perm> <size> <md5> <time> <submitter-with-+-for-space>`,
//! created on a client `putFile`, removed once the background loop promotes the file
//! out of the destination's inbox

use super::{read_lines_tolerant, write_lines};
use crate::util::error::SkyResult;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAdd {
    pub lfn: String,
    pub group: String,
    pub permissions: String,
    pub size: u64,
    pub md5: String,
    pub timestamp: i64,
    /// space-encoded per [`libdigs::encode_dn`]
    pub submitter: String,
}

#[derive(Default)]
pub struct PendingAddList {
    entries: Vec<PendingAdd>,
}

impl PendingAddList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> SkyResult<Self> {
        let mut list = Self::new();
        for line in read_lines_tolerant(path)? {
            let parts: Vec<&str> = line.splitn(7, ' ').collect();
            if let [lfn, group, perm, size, md5, time, submitter] = parts[..] {
                match (size.parse(), time.parse()) {
                    (Ok(size), Ok(timestamp)) => list.entries.push(PendingAdd {
                        lfn: lfn.to_owned(),
                        group: group.to_owned(),
                        permissions: perm.to_owned(),
                        size,
                        md5: md5.to_owned(),
                        timestamp,
                        submitter: submitter.to_owned(),
                    }),
                    _ => log::warn!("skipping malformed pendingadds line: {line}"),
                }
            } else {
                log::warn!("skipping malformed pendingadds line: {line}");
            }
        }
        Ok(list)
    }

    pub fn save(&self, path: &Path) -> SkyResult<()> {
        write_lines(
            path,
            self.entries.iter().map(|e| {
                format!(
                    "{} {} {} {} {} {} {}",
                    e.lfn, e.group, e.permissions, e.size, e.md5, e.timestamp, e.submitter
                )
            }),
        )
    }

    pub fn push(&mut self, entry: PendingAdd) {
        self.entries.push(entry);
    }

    pub fn find(&self, lfn: &str) -> Option<&PendingAdd> {
        self.entries.iter().find(|e| e.lfn == lfn)
    }

    pub fn remove(&mut self, lfn: &str) {
        self.entries.retain(|e| e.lfn != lfn);
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

    fn sample(lfn: &str) -> PendingAdd {
        PendingAdd {
            lfn: lfn.to_owned(),
            group: "g1".to_owned(),
            permissions: "public".to_owned(),
            size: 100,
            md5: "ABCDEF0123456789ABCDEF0123456789".to_owned(),
            timestamp: 1_700_000_000,
            submitter: libdigs::encode_dn("/O=Grid/OU=ex/CN=Jane Doe"),
        }
    }

    #[test]
    fn round_trip_preserves_fields() {
        let mut list = PendingAddList::new();
        list.push(sample("u/v.dat"));
        let path = std::env::temp_dir().join(format!("digs-pendingadds-test-{}", std::process::id()));
        list.save(&path).unwrap();
        let reloaded = PendingAddList::load(&path).unwrap();
        let entry = reloaded.find("u/v.dat").unwrap();
        assert_eq!(entry.size, 100);
        assert_eq!(libdigs::decode_dn(&entry.submitter), "/O=Grid/OU=ex/CN=Jane Doe");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn promotion_removes_entry() {
        let mut list = PendingAddList::new();
        list.push(sample("u/v.dat"));
        list.remove("u/v.dat");
        assert!(list.is_empty());
    }
}
