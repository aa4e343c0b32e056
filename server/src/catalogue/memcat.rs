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

//! A reference [`Catalogue`] backed by concurrent hash maps, persisted to a flat text
//! dump on every sweep. Wire/on-disk compatibility with an external catalogue service
//! is explicitly out of scope, so the dump format here is whatever is convenient for
//! this process to reload, not a port of any existing bucketing scheme

use super::{Catalogue, FileListing};
use crate::util::error::SkyResult;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::fs;
use std::io;
use std::path::Path;

#[derive(Default)]
pub struct MemCatalogue {
    /// lfn -> set of hosts holding a replica
    replicas: DashMap<String, DashSet<String>>,
    /// (lfn, attr name) -> value
    attrs: DashMap<(String, String), String>,
}

impl MemCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a previously-[`dump`](Self::dump)ed catalogue from `path`. A missing file
    /// is treated as an empty catalogue
    pub fn load(path: &Path) -> SkyResult<Self> {
        let cat = Self::new();
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(cat),
            Err(e) => return Err(e.into()),
        };
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix("R ") {
                let mut parts = rest.splitn(2, ' ');
                if let (Some(lfn), Some(host)) = (parts.next(), parts.next()) {
                    cat.replicas
                        .entry(lfn.to_owned())
                        .or_default()
                        .insert(host.to_owned());
                }
            } else if let Some(rest) = line.strip_prefix("A ") {
                let mut parts = rest.splitn(3, ' ');
                if let (Some(lfn), Some(name), Some(value)) =
                    (parts.next(), parts.next(), parts.next())
                {
                    cat.attrs
                        .insert((lfn.to_owned(), name.to_owned()), value.to_owned());
                }
            } else {
                log::warn!("skipping malformed catalogue dump line: {line}");
            }
        }
        Ok(cat)
    }

    /// Flush the full in-memory catalogue to `path`
    pub fn dump(&self, path: &Path) -> SkyResult<()> {
        let mut out = String::new();
        for entry in self.replicas.iter() {
            for host in entry.value().iter() {
                out.push_str("R ");
                out.push_str(entry.key());
                out.push(' ');
                out.push_str(host.key());
                out.push('\n');
            }
        }
        for entry in self.attrs.iter() {
            let (lfn, name) = entry.key();
            out.push_str(&format!("A {lfn} {name} {}\n", entry.value()));
        }
        fs::write(path, out)?;
        Ok(())
    }
}

#[async_trait]
impl Catalogue for MemCatalogue {
    async fn create(&self, lfn: &str, host: &str) -> SkyResult<()> {
        self.replicas
            .entry(lfn.to_owned())
            .or_default()
            .insert(host.to_owned());
        Ok(())
    }

    async fn add(&self, lfn: &str, host: &str) -> SkyResult<()> {
        self.create(lfn, host).await
    }

    async fn delete(&self, lfn: &str, host: &str) -> SkyResult<()> {
        if let Some(set) = self.replicas.get(lfn) {
            set.remove(host);
        }
        Ok(())
    }

    async fn delete_all_at(&self, host: &str) -> SkyResult<()> {
        for entry in self.replicas.iter() {
            entry.value().remove(host);
        }
        Ok(())
    }

    async fn exists(&self, lfn: &str) -> SkyResult<bool> {
        Ok(self.replicas.contains_key(lfn))
    }

    async fn list_files(&self, pattern: &str) -> SkyResult<Vec<FileListing>> {
        let prefix = pattern.trim_end_matches('*');
        let mut out = Vec::new();
        for entry in self.replicas.iter() {
            if pattern == "*" || entry.key().starts_with(prefix) {
                let hosts = entry.value().iter().map(|h| h.key().clone()).collect();
                out.push(FileListing {
                    lfn: entry.key().clone(),
                    hosts,
                });
            }
        }
        out.sort_by(|a, b| a.lfn.cmp(&b.lfn));
        Ok(out)
    }

    async fn list_at(&self, host: &str) -> SkyResult<Vec<String>> {
        let mut out = Vec::new();
        for entry in self.replicas.iter() {
            if entry.value().contains(host) {
                out.push(entry.key().clone());
            }
        }
        Ok(out)
    }

    async fn locations_of(&self, lfn: &str, include_dead_disabled: bool) -> SkyResult<Vec<String>> {
        // dead/disabled filtering is the node registry's job; the catalogue alone
        // cannot know node state, so it always returns the raw replica set and the
        // caller is responsible for filtering when `include_dead_disabled` is false
        let _ = include_dead_disabled;
        Ok(self
            .replicas
            .get(lfn)
            .map(|set| set.iter().map(|h| h.key().clone()).collect())
            .unwrap_or_default())
    }

    async fn get_attr(&self, lfn: &str, name: &str) -> SkyResult<Option<String>> {
        Ok(self.attrs.get(&(lfn.to_owned(), name.to_owned())).map(|v| v.clone()))
    }

    async fn set_attr(&self, lfn: &str, name: &str, value: &str) -> SkyResult<()> {
        self.attrs
            .insert((lfn.to_owned(), name.to_owned()), value.to_owned());
        Ok(())
    }

    async fn remove_attr(&self, lfn: &str, name: &str) -> SkyResult<()> {
        self.attrs.remove(&(lfn.to_owned(), name.to_owned()));
        Ok(())
    }

    async fn attr_search(&self, name: &str) -> SkyResult<Vec<(String, String)>> {
        let mut out = Vec::new();
        for entry in self.attrs.iter() {
            let (lfn, attr_name) = entry.key();
            if attr_name == name {
                out.push((lfn.clone(), entry.value().clone()));
            }
        }
        Ok(out)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::attr;

    #[tokio::test]
    async fn create_then_add_is_idempotent() {
        let cat = MemCatalogue::new();
        cat.create("a/b.dat", "hA").await.unwrap();
        cat.add("a/b.dat", "hA").await.unwrap();
        let hosts = cat.locations_of("a/b.dat", true).await.unwrap();
        assert_eq!(hosts, vec!["hA".to_owned()]);
    }

    #[tokio::test]
    async fn attribute_round_trips() {
        let cat = MemCatalogue::new();
        cat.create("a/b.dat", "hA").await.unwrap();
        cat.set_attr("a/b.dat", attr::MD5SUM, "ABCDEF").await.unwrap();
        assert_eq!(
            cat.get_attr("a/b.dat", attr::MD5SUM).await.unwrap(),
            Some("ABCDEF".to_owned())
        );
    }

    #[tokio::test]
    async fn delete_all_at_clears_every_lfn() {
        let cat = MemCatalogue::new();
        cat.create("a", "hA").await.unwrap();
        cat.create("b", "hA").await.unwrap();
        cat.add("b", "hB").await.unwrap();
        cat.delete_all_at("hA").await.unwrap();
        assert_eq!(cat.locations_of("a", true).await.unwrap().len(), 0);
        assert_eq!(cat.locations_of("b", true).await.unwrap(), vec!["hB".to_owned()]);
    }

    #[tokio::test]
    async fn dump_and_load_round_trip() {
        let cat = MemCatalogue::new();
        cat.create("a/b.dat", "hA").await.unwrap();
        cat.set_attr("a/b.dat", attr::GROUP, "ukq").await.unwrap();
        let dir = std::env::temp_dir().join(format!("digs-memcat-test-{}", std::process::id()));
        cat.dump(&dir).unwrap();
        let reloaded = MemCatalogue::load(&dir).unwrap();
        assert_eq!(
            reloaded.locations_of("a/b.dat", true).await.unwrap(),
            vec!["hA".to_owned()]
        );
        assert_eq!(
            reloaded.get_attr("a/b.dat", attr::GROUP).await.unwrap(),
            Some("ukq".to_owned())
        );
        let _ = std::fs::remove_file(&dir);
    }
}
