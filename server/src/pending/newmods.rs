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

//! `newmods`: `<lfn> <host> <md5> <size> <timestamp-rest-of-line>`. A client has
//! uploaded a replacement into the inbox of `host` and issued a `modify` message;
//! the background loop matches this record against the promoted inbox entry

use super::{read_lines_tolerant, write_lines};
use crate::util::error::SkyResult;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewModification {
    pub lfn: String,
    pub host: String,
    pub md5: String,
    pub size: u64,
    pub timestamp: i64,
}

#[derive(Default)]
pub struct NewModificationList {
    entries: Vec<NewModification>,
}

impl NewModificationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> SkyResult<Self> {
        let mut list = Self::new();
        for line in read_lines_tolerant(path)? {
            let parts: Vec<&str> = line.splitn(5, ' ').collect();
            if let [lfn, host, md5, size, timestamp] = parts[..] {
                match (size.parse(), timestamp.parse()) {
                    (Ok(size), Ok(timestamp)) => list.entries.push(NewModification {
                        lfn: lfn.to_owned(),
                        host: host.to_owned(),
                        md5: md5.to_owned(),
                        size,
                        timestamp,
                    }),
                    _ => log::warn!("skipping malformed newmods line: {line}"),
                }
            } else {
                log::warn!("skipping malformed newmods line: {line}");
            }
        }
        Ok(list)
    }

    pub fn save(&self, path: &Path) -> SkyResult<()> {
        write_lines(
            path,
            self.entries
                .iter()
                .map(|e| format!("{} {} {} {} {}", e.lfn, e.host, e.md5, e.size, e.timestamp)),
        )
    }

    pub fn push(&mut self, entry: NewModification) {
        self.entries.push(entry);
    }

    pub fn find(&self, lfn: &str, host: &str) -> Option<&NewModification> {
        self.entries.iter().find(|e| e.lfn == lfn && e.host == host)
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
    fn round_trip_preserves_fields() {
        let mut list = NewModificationList::new();
        list.push(NewModification {
            lfn: "u/v.dat".to_owned(),
            host: "hA".to_owned(),
            md5: "00112233445566778899AABBCCDDEEFF".to_owned(),
            size: 4096,
            timestamp: 1_700_000_500,
        });
        let path = std::env::temp_dir().join(format!("digs-newmods-test-{}", std::process::id()));
        list.save(&path).unwrap();
        let reloaded = NewModificationList::load(&path).unwrap();
        let entry = reloaded.find("u/v.dat", "hA").unwrap();
        assert_eq!(entry.size, 4096);
        let _ = std::fs::remove_file(&path);
    }
}
