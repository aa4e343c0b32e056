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

//! The group-mapfile: `"DN-with-optional-quotes" group1,group2,…` per line, consulted
//! for authorization whenever no per-request group override is present

use crate::util::error::SkyResult;
use std::collections::HashMap;
use std::io;
use std::path::Path;

#[derive(Default, Debug, Clone)]
pub struct GroupMap {
    dn_to_groups: HashMap<String, Vec<String>>,
}

impl GroupMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> SkyResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };
        let mut map = Self::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                Some((dn, groups)) => {
                    map.dn_to_groups.insert(dn, groups);
                }
                None => log::warn!("skipping malformed group-mapfile line: {line}"),
            }
        }
        Ok(map)
    }

    /// Insert or replace the group list for a DN
    pub fn insert(&mut self, dn: impl Into<String>, groups: Vec<String>) {
        self.dn_to_groups.insert(dn.into(), groups);
    }

    /// Groups `dn` belongs to, empty if the DN has no entry
    pub fn groups_for(&self, dn: &str) -> &[String] {
        self.dn_to_groups.get(dn).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_member(&self, dn: &str, group: &str) -> bool {
        self.groups_for(dn).iter().any(|g| g == group)
    }
}

/// Parse one line. The DN's quotes are optional: a DN containing spaces is normally
/// quoted so the unquoted group list can be split on whitespace, but a single-token DN
/// may appear bare
fn parse_line(line: &str) -> Option<(String, Vec<String>)> {
    let (dn, groups_part) = if let Some(rest) = line.strip_prefix('"') {
        let end = rest.find('"')?;
        (rest[..end].to_owned(), rest[end + 1..].trim())
    } else {
        let (dn, rest) = line.split_once(char::is_whitespace)?;
        (dn.to_owned(), rest.trim())
    };
    let groups = groups_part
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_owned)
        .collect();
    Some((dn, groups))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_dn_with_multiple_groups() {
        let (dn, groups) = parse_line(r#""/O=Grid/OU=ex/CN=Jane Doe" ukq,admin"#).unwrap();
        assert_eq!(dn, "/O=Grid/OU=ex/CN=Jane Doe");
        assert_eq!(groups, vec!["ukq".to_owned(), "admin".to_owned()]);
    }

    #[test]
    fn parses_unquoted_single_token_dn() {
        let (dn, groups) = parse_line("simple-dn ukq,admin").unwrap();
        assert_eq!(dn, "simple-dn");
        assert_eq!(groups, vec!["ukq".to_owned(), "admin".to_owned()]);
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let map = GroupMap::load(Path::new("/tmp/digs-groupmap-definitely-missing")).unwrap();
        assert!(map.groups_for("anyone").is_empty());
    }

    #[test]
    fn is_member_reflects_parsed_groups() {
        let mut map = GroupMap::new();
        map.dn_to_groups.insert("dn1".to_owned(), vec!["admin".to_owned()]);
        assert!(map.is_member("dn1", "admin"));
        assert!(!map.is_member("dn1", "other"));
    }
}
