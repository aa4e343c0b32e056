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

//! The node registry: the master table of storage elements plus the three
//! lifecycle sets (dead/disabled/retiring) and the ordered site-preference list

use crate::notify::NotifySink;
use crate::util::error::SkyResult;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Consecutive ping failures before we notify the operator about a dead host
pub const DEAD_NOTIFY_THRESHOLD: u32 = 3;

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub site: String,
    pub path: String,
    pub inbox: Option<String>,
    pub num_disks: u32,
    pub disk_quota: Vec<u64>,
    pub free_space: Vec<u64>,
    pub extra_rsl: Option<String>,
    pub extra_jss_contact: Option<String>,
    pub job_timeout: u64,
    pub ftp_timeout: u64,
    pub copy_timeout: u64,
    pub driver_kind: String,
    pub properties: std::collections::HashMap<String, String>,
    /// consecutive failed pings; reset to 0 on a successful ping
    pub dead_counter: u32,
}

impl Node {
    pub fn new(name: impl Into<String>, site: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            site: site.into(),
            path: path.into(),
            inbox: None,
            num_disks: 1,
            disk_quota: vec![u64::MAX],
            free_space: vec![0],
            extra_rsl: None,
            extra_jss_contact: None,
            job_timeout: 3600,
            ftp_timeout: 3600,
            copy_timeout: 3600,
            driver_kind: "local".to_owned(),
            properties: Default::default(),
            dead_counter: 0,
        }
    }

    /// Total free space across all disks, in kB
    pub fn total_free(&self) -> u64 {
        self.free_space.iter().sum()
    }

    /// The disk with the most free space and its index, used by `chooseDataDisk`
    pub fn best_disk(&self) -> Option<(usize, u64)> {
        self.free_space
            .iter()
            .copied()
            .enumerate()
            .max_by_key(|(_, free)| *free)
    }
}

/// Render a disk index the way `chooseDataDisk` names it on disk: `0` is `data`,
/// every other index is `data<N>`
pub fn disk_name(index: usize) -> String {
    if index == 0 {
        "data".to_owned()
    } else {
        format!("data{index}")
    }
}

/// Parse a disk name back into its index, the inverse of [`disk_name`]
pub fn disk_index(name: &str) -> Option<usize> {
    if name == "data" {
        Some(0)
    } else {
        name.strip_prefix("data").and_then(|n| n.parse().ok())
    }
}

#[derive(Default)]
pub struct NodeRegistry {
    nodes: Vec<Node>,
    /// ordered indices into `nodes`, mirrors the source's `nodeList_t` preference list
    preference: Vec<usize>,
    dead: HashSet<usize>,
    disabled: HashSet<usize>,
    retiring: HashSet<usize>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_name(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn get(&self, idx: usize) -> Option<&Node> {
        self.nodes.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Node> {
        self.nodes.get_mut(idx)
    }

    pub fn name(&self, idx: usize) -> Option<&str> {
        self.nodes.get(idx).map(|n| n.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Node)> {
        self.nodes.iter().enumerate()
    }

    pub fn preference_order(&self) -> &[usize] {
        &self.preference
    }

    pub fn set_free_space(&mut self, idx: usize, disk: usize, kb: u64) {
        if let Some(node) = self.nodes.get_mut(idx) {
            if let Some(slot) = node.free_space.get_mut(disk) {
                *slot = kb;
            }
        }
    }

    /// Add a new node to the end of the table and to the back of the preference list.
    /// Returns its index
    pub fn add(&mut self, node: Node) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(node);
        self.preference.push(idx);
        idx
    }

    /// Remove a node. Every stored index above `idx` shifts down by one, so the
    /// preference list and the three state sets are all remapped consistently here —
    /// the one invariant the source's manual array surgery could silently violate
    pub fn remove(&mut self, idx: usize) -> Option<Node> {
        if idx >= self.nodes.len() {
            return None;
        }
        let removed = self.nodes.remove(idx);
        let remap = |set: &mut HashSet<usize>| {
            *set = set
                .iter()
                .filter(|&&i| i != idx)
                .map(|&i| if i > idx { i - 1 } else { i })
                .collect();
        };
        remap(&mut self.dead);
        remap(&mut self.disabled);
        remap(&mut self.retiring);
        self.preference.retain(|&i| i != idx);
        for i in self.preference.iter_mut() {
            if *i > idx {
                *i -= 1;
            }
        }
        Some(removed)
    }

    pub fn is_dead(&self, idx: usize) -> bool {
        self.dead.contains(&idx)
    }

    pub fn is_disabled(&self, idx: usize) -> bool {
        self.disabled.contains(&idx)
    }

    pub fn is_retiring(&self, idx: usize) -> bool {
        self.retiring.contains(&idx)
    }

    pub fn set_disabled(&mut self, idx: usize, disabled: bool) {
        if disabled {
            self.disabled.insert(idx);
        } else {
            self.disabled.remove(&idx);
        }
    }

    pub fn set_retiring(&mut self, idx: usize, retiring: bool) {
        if retiring {
            self.retiring.insert(idx);
        } else {
            self.retiring.remove(&idx);
        }
    }

    pub fn dead_hosts(&self) -> impl Iterator<Item = usize> + '_ {
        self.dead.iter().copied()
    }

    pub fn disabled_hosts(&self) -> impl Iterator<Item = usize> + '_ {
        self.disabled.iter().copied()
    }

    pub fn retiring_hosts(&self) -> impl Iterator<Item = usize> + '_ {
        self.retiring.iter().copied()
    }

    /// Record a ping failure. Returns `true` exactly once, the sweep the host crosses
    /// the notify threshold, so the caller can fire a single operator notification
    pub fn record_ping_failure(&mut self, idx: usize, notify: &dyn NotifySink, admin: &str) {
        let was_alive = !self.dead.contains(&idx);
        self.dead.insert(idx);
        if let Some(node) = self.nodes.get_mut(idx) {
            node.dead_counter += 1;
            if was_alive {
                log::warn!("node '{}' failed to respond to ping, marking dead", node.name);
            }
            if node.dead_counter == DEAD_NOTIFY_THRESHOLD {
                notify.notify(
                    admin,
                    &format!("node {} is down", node.name),
                    &format!(
                        "node '{}' has failed {} consecutive pings and is now marked dead",
                        node.name, node.dead_counter
                    ),
                );
            }
        }
    }

    /// Record a ping success. Returns `true` if the node transitioned `DEAD -> ALIVE`,
    /// the signal the sweep uses to trigger a pending-op drain for this host
    pub fn record_ping_success(&mut self, idx: usize) -> bool {
        if let Some(node) = self.nodes.get_mut(idx) {
            node.dead_counter = 0;
        }
        self.dead.remove(&idx)
    }

    /// Bootstrap from the four on-disk lists under `dir`: `mainnodelist.conf` plus the
    /// sibling dead/disabled/retiring files. Each is a newline-separated list of
    /// node names; `mainnodelist.conf` additionally carries `site path numDisks
    /// quotaKb[,quotaKb...]` after the name
    pub fn load(dir: &Path) -> SkyResult<Self> {
        let mut reg = Self::new();
        let main = read_lines_tolerant(&dir.join("mainnodelist.conf"))?;
        for line in main {
            let mut parts = line.split_whitespace();
            let (Some(name), Some(site), Some(path), Some(numdisks)) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                log::warn!("skipping malformed mainnodelist.conf line: {line}");
                continue;
            };
            let num_disks: u32 = numdisks.parse().unwrap_or(1);
            let mut node = Node::new(name, site, path);
            node.num_disks = num_disks;
            node.disk_quota = parts
                .next()
                .map(|q| q.split(',').filter_map(|s| s.parse().ok()).collect())
                .unwrap_or_else(|| vec![u64::MAX; num_disks.max(1) as usize]);
            node.free_space = vec![0; node.disk_quota.len().max(1)];
            reg.add(node);
        }
        for name in read_lines_tolerant(&dir.join("deadnodes"))? {
            if let Some(idx) = reg.by_name(&name) {
                reg.dead.insert(idx);
            }
        }
        for name in read_lines_tolerant(&dir.join("disablednodes"))? {
            if let Some(idx) = reg.by_name(&name) {
                reg.disabled.insert(idx);
            }
        }
        for name in read_lines_tolerant(&dir.join("retiringnodes"))? {
            if let Some(idx) = reg.by_name(&name) {
                reg.retiring.insert(idx);
            }
        }
        let prefs = read_lines_tolerant(&dir.join("nodeprefs.conf"))?;
        if !prefs.is_empty() {
            let mut ordered = Vec::new();
            for name in &prefs {
                if let Some(idx) = reg.by_name(name) {
                    ordered.push(idx);
                }
            }
            for (idx, _) in reg.nodes.iter().enumerate() {
                if !ordered.contains(&idx) {
                    ordered.push(idx);
                }
            }
            reg.preference = ordered;
        }
        Ok(reg)
    }

    /// Persist the four lists back under `dir`, the last step of every sweep
    pub fn save(&self, dir: &Path) -> SkyResult<()> {
        let mut main = String::new();
        for node in &self.nodes {
            let quota = node
                .disk_quota
                .iter()
                .map(|q| q.to_string())
                .collect::<Vec<_>>()
                .join(",");
            main.push_str(&format!(
                "{} {} {} {} {}\n",
                node.name, node.site, node.path, node.num_disks, quota
            ));
        }
        fs::write(dir.join("mainnodelist.conf"), main)?;
        write_names(dir.join("deadnodes"), self.dead_hosts().map(|i| self.nodes[i].name.clone()))?;
        write_names(
            dir.join("disablednodes"),
            self.disabled_hosts().map(|i| self.nodes[i].name.clone()),
        )?;
        write_names(
            dir.join("retiringnodes"),
            self.retiring_hosts().map(|i| self.nodes[i].name.clone()),
        )?;
        let prefs = self
            .preference
            .iter()
            .map(|&i| self.nodes[i].name.clone())
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(dir.join("nodeprefs.conf"), prefs)?;
        Ok(())
    }
}

/// Whether a replica of some lfn sitting on `host` can be deleted without dropping the
/// file below its configured replication count: either the file already spans more
/// sites than it needs, or `host`'s site holds at least one other replica, and `host`
/// itself isn't already on its way out (dead/disabled/retiring hosts are handled by
/// the drain/resurrection paths instead, never by space reclamation)
pub fn can_safely_delete(
    nodes: &NodeRegistry,
    replica_hosts: &[String],
    replcount: usize,
    host: &str,
) -> bool {
    let Some(host_idx) = nodes.by_name(host) else {
        return false;
    };
    if nodes.is_dead(host_idx) || nodes.is_disabled(host_idx) || nodes.is_retiring(host_idx) {
        return false;
    }
    let Some(host_node) = nodes.get(host_idx) else {
        return false;
    };
    let sites: HashSet<&str> = replica_hosts
        .iter()
        .filter_map(|h| nodes.by_name(h).and_then(|i| nodes.get(i)))
        .map(|n| n.site.as_str())
        .collect();
    if sites.len() > replcount {
        return true;
    }
    replica_hosts
        .iter()
        .filter(|h| h.as_str() != host)
        .filter_map(|h| nodes.by_name(h).and_then(|i| nodes.get(i)))
        .any(|n| n.site == host_node.site)
}

fn write_names(path: PathBuf, names: impl Iterator<Item = String>) -> SkyResult<()> {
    let joined = names.collect::<Vec<_>>().join("\n");
    fs::write(path, joined)?;
    Ok(())
}

fn read_lines_tolerant(path: &Path) -> SkyResult<Vec<String>> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::test_util::RecordingNotifier;

    #[test]
    fn disk_name_matches_choose_data_disk_convention() {
        assert_eq!(disk_name(0), "data");
        assert_eq!(disk_name(1), "data1");
        assert_eq!(disk_name(3), "data3");
    }

    #[test]
    fn disk_index_is_the_inverse_of_disk_name() {
        assert_eq!(disk_index("data"), Some(0));
        assert_eq!(disk_index("data3"), Some(3));
        assert_eq!(disk_index("bogus"), None);
    }

    #[test]
    fn remove_remaps_state_sets() {
        let mut reg = NodeRegistry::new();
        let a = reg.add(Node::new("a", "site1", "/a"));
        let b = reg.add(Node::new("b", "site2", "/b"));
        let c = reg.add(Node::new("c", "site1", "/c"));
        reg.set_disabled(b, true);
        reg.set_retiring(c, true);
        reg.remove(a);
        // b and c shifted down by one
        assert!(!reg.is_disabled(b));
        assert!(reg.is_disabled(b - 1));
        assert!(reg.is_retiring(c - 1));
    }

    #[test]
    fn third_consecutive_ping_failure_notifies_once() {
        let mut reg = NodeRegistry::new();
        let n = reg.add(Node::new("a", "site1", "/a"));
        let notifier = RecordingNotifier::default();
        for _ in 0..5 {
            reg.record_ping_failure(n, &notifier, "admin@example.org");
        }
        assert_eq!(notifier.sent.lock().len(), 1);
    }

    #[test]
    fn ping_success_clears_dead_and_resets_counter() {
        let mut reg = NodeRegistry::new();
        let n = reg.add(Node::new("a", "site1", "/a"));
        let notifier = RecordingNotifier::default();
        reg.record_ping_failure(n, &notifier, "admin@example.org");
        assert!(reg.is_dead(n));
        assert!(reg.record_ping_success(n));
        assert!(!reg.is_dead(n));
        assert_eq!(reg.get(n).unwrap().dead_counter, 0);
    }

    #[test]
    fn can_safely_delete_when_site_has_spare_replica() {
        let mut reg = NodeRegistry::new();
        reg.add(Node::new("hA", "site1", "/a"));
        reg.add(Node::new("hB", "site1", "/b"));
        reg.add(Node::new("hC", "site2", "/c"));
        let replicas = vec!["hA".to_owned(), "hB".to_owned(), "hC".to_owned()];
        // site1 holds two replicas (hA, hB): deleting hA's copy still leaves one at site1
        assert!(can_safely_delete(&reg, &replicas, 2, "hA"));
    }

    #[test]
    fn cannot_safely_delete_sole_replica_at_site_when_at_replcount() {
        let mut reg = NodeRegistry::new();
        reg.add(Node::new("hA", "site1", "/a"));
        reg.add(Node::new("hC", "site2", "/c"));
        let replicas = vec!["hA".to_owned(), "hC".to_owned()];
        assert!(!can_safely_delete(&reg, &replicas, 2, "hA"));
    }

    #[test]
    fn can_safely_delete_when_more_sites_than_replcount() {
        let mut reg = NodeRegistry::new();
        reg.add(Node::new("hA", "site1", "/a"));
        reg.add(Node::new("hC", "site2", "/c"));
        reg.add(Node::new("hD", "site3", "/d"));
        let replicas = vec!["hA".to_owned(), "hC".to_owned(), "hD".to_owned()];
        assert!(can_safely_delete(&reg, &replicas, 2, "hA"));
    }

    #[test]
    fn cannot_safely_delete_from_a_dead_host() {
        let mut reg = NodeRegistry::new();
        let a = reg.add(Node::new("hA", "site1", "/a"));
        reg.add(Node::new("hB", "site1", "/b"));
        reg.set_disabled(a, true);
        let replicas = vec!["hA".to_owned(), "hB".to_owned()];
        assert!(!can_safely_delete(&reg, &replicas, 1, "hA"));
    }
}
