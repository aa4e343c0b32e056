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

//! Catalogue-vs-storage reconciliation for a single host: reads the physical disks
//! through its driver, compares what's actually there against what the catalogue
//! claims, and resolves every mismatch through a [`VerificationPrompt`] so the engine
//! itself never touches stdin/stdout. Forced-default mode applies the "obvious" fix
//! silently; a real terminal-backed prompt (see [`TerminalPrompt`]) drives the
//! interactive CLI front-end

use crate::catalogue::{attr, Catalogue};
use crate::drivers::StorageDriver;
use crate::state::ControlState;
use crate::util::error::SkyResult;
use std::collections::{HashMap, HashSet};

/// Attribute used when none was recorded and the operator hasn't said otherwise
pub const UNKNOWN_GROUP: &str = "ukq";
/// Attribute used when a physical file's submitter can't be recovered
pub const UNKNOWN_SUBMITTER: &str = "<unknown>";
/// Permission assumed for a file verification finds with no recorded permissions
pub const DEFAULT_PERMISSIONS: &str = "private";

/// The five per-replica attributes verification checks for completeness
const CHECKED_ATTRS: [(&str, &str); 5] = [
    ("group", attr::GROUP),
    ("permissions", attr::PERMISSIONS),
    ("submitter", attr::SUBMITTER),
    ("md5sum", attr::MD5SUM),
    ("size", attr::SIZE),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingAction {
    Add,
    Delete,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrongDiskAction {
    Fix,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeAction {
    /// Fill missing fields with defaults only; md5sum/size are left unset
    PopulateDefaults,
    /// Defaults for group/permissions/submitter, md5sum and size read off the real file
    ComputeFromDisk,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleAction {
    Delete,
    Skip,
}

/// How the engine asks for a decision it can't make silently. The test harness
/// supplies a scripted implementation; a CLI front-end would supply one backed by a
/// terminal prompt (see [`TerminalPrompt`])
pub trait VerificationPrompt: Send + Sync {
    /// A physical file on `disk` with no catalogue replica at this host at all
    fn missing_from_catalogue(&self, lfn: &str, disk: &str) -> MissingAction;
    /// The catalogue's `<host>-dir` attribute names a disk other than where the file
    /// physically sits
    fn wrong_disk(&self, lfn: &str, recorded: &str, actual: &str) -> WrongDiskAction;
    /// One or more of the five per-replica attributes is absent
    fn missing_attributes(&self, lfn: &str, missing: &[&'static str]) -> AttributeAction;
    /// The same lfn is physically present on more than one disk of this host.
    /// `candidates` is `(disk, length)` per copy; returns the index to keep
    fn duplicate_across_disks(&self, lfn: &str, candidates: &[(String, u64)]) -> usize;
    /// A catalogue replica at this host with no matching physical file found
    fn stale_catalogue_entry(&self, lfn: &str) -> StaleAction;
}

/// Applies the "obvious" fix for every finding without asking a human: add what's
/// missing, fix the disk attribute, compute attributes from the file on disk, keep
/// the largest copy of a duplicate, and drop stale catalogue entries
pub struct ForcedDefaultPrompt;

impl VerificationPrompt for ForcedDefaultPrompt {
    fn missing_from_catalogue(&self, _lfn: &str, _disk: &str) -> MissingAction {
        MissingAction::Add
    }
    fn wrong_disk(&self, _lfn: &str, _recorded: &str, _actual: &str) -> WrongDiskAction {
        WrongDiskAction::Fix
    }
    fn missing_attributes(&self, _lfn: &str, _missing: &[&'static str]) -> AttributeAction {
        AttributeAction::ComputeFromDisk
    }
    fn duplicate_across_disks(&self, _lfn: &str, candidates: &[(String, u64)]) -> usize {
        candidates
            .iter()
            .enumerate()
            .max_by_key(|(_, (_, len))| *len)
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
    fn stale_catalogue_entry(&self, _lfn: &str) -> StaleAction {
        StaleAction::Delete
    }
}

/// Reads decisions from stdin/stdout, one line per finding. This is the only piece
/// of §4.8 that touches a terminal; the reconciliation engine never does
pub struct TerminalPrompt;

impl TerminalPrompt {
    fn ask(prompt: &str, options: &str) -> String {
        use std::io::Write;
        print!("{prompt} [{options}] ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        line.trim().to_lowercase()
    }
}

impl VerificationPrompt for TerminalPrompt {
    fn missing_from_catalogue(&self, lfn: &str, disk: &str) -> MissingAction {
        match Self::ask(&format!("{lfn} on {disk} has no catalogue entry"), "add/delete/skip").as_str() {
            "add" | "a" => MissingAction::Add,
            "delete" | "d" => MissingAction::Delete,
            _ => MissingAction::Skip,
        }
    }
    fn wrong_disk(&self, lfn: &str, recorded: &str, actual: &str) -> WrongDiskAction {
        match Self::ask(&format!("{lfn} catalogued on {recorded} but found on {actual}"), "fix/skip").as_str() {
            "fix" | "f" => WrongDiskAction::Fix,
            _ => WrongDiskAction::Skip,
        }
    }
    fn missing_attributes(&self, lfn: &str, missing: &[&'static str]) -> AttributeAction {
        match Self::ask(&format!("{lfn} is missing {missing:?}"), "defaults/compute/skip").as_str() {
            "defaults" | "d" => AttributeAction::PopulateDefaults,
            "compute" | "c" => AttributeAction::ComputeFromDisk,
            _ => AttributeAction::Skip,
        }
    }
    fn duplicate_across_disks(&self, lfn: &str, candidates: &[(String, u64)]) -> usize {
        let listing: Vec<String> = candidates.iter().map(|(d, l)| format!("{d}({l} bytes)")).collect();
        let options = listing.join(", ");
        loop {
            let answer = Self::ask(&format!("{lfn} present on multiple disks: {options}, which to keep?"), "disk name");
            if let Some(idx) = candidates.iter().position(|(d, _)| *d == answer) {
                return idx;
            }
        }
    }
    fn stale_catalogue_entry(&self, lfn: &str) -> StaleAction {
        match Self::ask(&format!("{lfn} is in the catalogue at this host but not found on disk"), "delete/skip").as_str() {
            "delete" | "d" => StaleAction::Delete,
            _ => StaleAction::Skip,
        }
    }
}

/// A tally of what a verification pass actually did, for logging and tests
#[derive(Debug, Default, Clone)]
pub struct VerificationReport {
    pub added_to_catalogue: Vec<String>,
    pub deleted_physical: Vec<String>,
    pub fixed_disk_attr: Vec<String>,
    pub populated_attributes: Vec<String>,
    pub removed_duplicates: Vec<String>,
    pub removed_stale: Vec<String>,
}

/// Split a `scan_node`-relative path (`"data1/a/b.dat"`) into its disk name and lfn
fn split_disk_and_lfn(relpath: &str) -> Option<(String, String)> {
    let (disk, lfn) = relpath.split_once('/')?;
    if lfn.is_empty() {
        return None;
    }
    Some((disk.to_owned(), lfn.to_owned()))
}

async fn populate_attributes(
    catalogue: &dyn Catalogue,
    driver: &dyn StorageDriver,
    lfn: &str,
    disk: &str,
    missing: &[&'static str],
    compute_from_disk: bool,
) -> SkyResult<()> {
    for name in missing {
        match *name {
            "group" => catalogue.set_attr(lfn, attr::GROUP, UNKNOWN_GROUP).await?,
            "permissions" => catalogue.set_attr(lfn, attr::PERMISSIONS, DEFAULT_PERMISSIONS).await?,
            "submitter" => catalogue.set_attr(lfn, attr::SUBMITTER, UNKNOWN_SUBMITTER).await?,
            "md5sum" if compute_from_disk => {
                let path = format!("{disk}/{lfn}");
                let sum = driver.get_checksum(&path).await?;
                catalogue.set_attr(lfn, attr::MD5SUM, &sum).await?;
            }
            "size" if compute_from_disk => {
                let path = format!("{disk}/{lfn}");
                let len = driver.get_length(&path).await?;
                catalogue.set_attr(lfn, attr::SIZE, &len.to_string()).await?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Run one reconciliation pass against `host`, per §4.8: load the catalogue's
/// replica set, scan the physical disks, resolve every mismatch through `prompt`,
/// then treat any catalogue replica that was never matched by a physical file as
/// stale.
pub async fn verify_node(state: &ControlState, host: &str, prompt: &dyn VerificationPrompt) -> SkyResult<VerificationReport> {
    {
        let nodes = state.nodes.lock();
        if nodes.by_name(host).is_none() {
            return Err(crate::util::error::Error::Local(format!("no such node '{host}'")));
        }
    }
    let Some(driver) = state.drivers.get(host) else {
        return Err(crate::util::error::Error::Local(format!("no driver registered for node '{host}'")));
    };

    let catalogue_replicas: HashSet<String> = state.catalogue.list_at(host).await?.into_iter().collect();
    let mut matched: HashSet<String> = HashSet::new();
    let mut report = VerificationReport::default();

    let mut by_lfn: HashMap<String, Vec<String>> = HashMap::new();
    for relpath in driver.scan_node().await? {
        if let Some((disk, lfn)) = split_disk_and_lfn(&relpath) {
            by_lfn.entry(lfn).or_default().push(disk);
        }
    }

    for (lfn, mut disks) in by_lfn {
        if catalogue_replicas.contains(&lfn) {
            matched.insert(lfn.clone());
        }

        let chosen_disk = if disks.len() > 1 {
            let mut sized = Vec::with_capacity(disks.len());
            for disk in disks.drain(..) {
                let len = driver.get_length(&format!("{disk}/{lfn}")).await.unwrap_or(0);
                sized.push((disk, len));
            }
            let keep_idx = prompt.duplicate_across_disks(&lfn, &sized);
            let keep_disk = sized[keep_idx].0.clone();
            for (disk, _) in sized.iter().filter(|(d, _)| *d != keep_disk) {
                if driver.rm(&format!("{disk}/{lfn}")).await.is_ok() {
                    report.removed_duplicates.push(format!("{host}:{disk}/{lfn}"));
                }
            }
            keep_disk
        } else {
            disks.remove(0)
        };

        if !catalogue_replicas.contains(&lfn) {
            match prompt.missing_from_catalogue(&lfn, &chosen_disk) {
                MissingAction::Add => {
                    state.catalogue.create(&lfn, host).await?;
                    state.catalogue.set_attr(&lfn, &attr::dir(host), &chosen_disk).await?;
                    let missing: Vec<&'static str> = CHECKED_ATTRS.iter().map(|(n, _)| *n).collect();
                    populate_attributes(state.catalogue.as_ref(), driver.as_ref(), &lfn, &chosen_disk, &missing, true)
                        .await?;
                    report.added_to_catalogue.push(lfn.clone());
                }
                MissingAction::Delete => {
                    if driver.rm(&format!("{chosen_disk}/{lfn}")).await.is_ok() {
                        report.deleted_physical.push(lfn.clone());
                    }
                }
                MissingAction::Skip => {}
            }
            continue;
        }

        let recorded_disk = state.catalogue.get_attr(&lfn, &attr::dir(host)).await?;
        match recorded_disk.as_deref() {
            Some(rd) if rd != chosen_disk => match prompt.wrong_disk(&lfn, rd, &chosen_disk) {
                WrongDiskAction::Fix => {
                    state.catalogue.set_attr(&lfn, &attr::dir(host), &chosen_disk).await?;
                    report.fixed_disk_attr.push(lfn.clone());
                }
                WrongDiskAction::Skip => {}
            },
            None => {
                state.catalogue.set_attr(&lfn, &attr::dir(host), &chosen_disk).await?;
                report.fixed_disk_attr.push(lfn.clone());
            }
            _ => {}
        }

        let mut missing = Vec::new();
        for (name, attr_name) in CHECKED_ATTRS {
            if state.catalogue.get_attr(&lfn, attr_name).await?.is_none() {
                missing.push(name);
            }
        }
        if !missing.is_empty() {
            match prompt.missing_attributes(&lfn, &missing) {
                AttributeAction::Skip => {}
                action => {
                    let compute = matches!(action, AttributeAction::ComputeFromDisk);
                    populate_attributes(state.catalogue.as_ref(), driver.as_ref(), &lfn, &chosen_disk, &missing, compute)
                        .await?;
                    report.populated_attributes.push(lfn.clone());
                }
            }
        }
    }

    for lfn in catalogue_replicas {
        if !matched.contains(&lfn) {
            match prompt.stale_catalogue_entry(&lfn) {
                StaleAction::Delete => {
                    state.catalogue.delete(&lfn, host).await?;
                    report.removed_stale.push(lfn);
                }
                StaleAction::Skip => {}
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::memcat::MemCatalogue;
    use crate::drivers::local::LocalDriver;
    use crate::drivers::DriverRegistry;
    use crate::nodes::{Node, NodeRegistry};
    use crate::notify::LogNotifier;
    use crate::pending::adds::PendingAddList;
    use crate::pending::dels::PendingDeleteList;
    use crate::pending::mods::PendingModificationList;
    use crate::pending::newmods::NewModificationList;
    use crate::pending::permissions::PendingPermissionList;
    use crate::replication::ReplicationQueue;
    use crate::state::SweepCursors;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("digs-verify-test-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn state_with_node(working_dir: PathBuf, node_root: PathBuf) -> ControlState {
        let mut nodes = NodeRegistry::new();
        let mut node = Node::new("hD", "site1", node_root.to_string_lossy().to_string());
        node.driver_kind = "hD".to_owned();
        nodes.add(node);
        let mut drivers = DriverRegistry::new();
        drivers.register("hD", Arc::new(LocalDriver::new(node_root, None)) as Arc<dyn crate::drivers::StorageDriver>);
        ControlState {
            working_dir,
            nodes: Mutex::new(nodes),
            catalogue: Arc::new(MemCatalogue::new()),
            drivers,
            pending_adds: Mutex::new(PendingAddList::default()),
            pending_dels: Mutex::new(PendingDeleteList::default()),
            pending_mods: Mutex::new(PendingModificationList::default()),
            new_mods: Mutex::new(NewModificationList::default()),
            pending_permissions: Mutex::new(PendingPermissionList::default()),
            replication: Mutex::new(ReplicationQueue::new()),
            cursors: Mutex::new(SweepCursors::default()),
            group_map: Default::default(),
            notifier: Arc::new(LogNotifier),
            disk_panic_notified: Mutex::new(false),
            check_list: Mutex::new(std::collections::HashSet::new()),
            sweep_iteration: Mutex::new(0),
        }
    }

    #[tokio::test]
    async fn forced_default_adopts_untracked_physical_file() {
        let working_dir = scratch_dir("adopt-wd");
        let node_root = scratch_dir("adopt-node");
        std::fs::create_dir_all(node_root.join("data1/x")).unwrap();
        std::fs::write(node_root.join("data1/x/y.dat"), b"hello world").unwrap();
        let state = state_with_node(working_dir, node_root);

        let report = verify_node(&state, "hD", &ForcedDefaultPrompt).await.unwrap();
        assert_eq!(report.added_to_catalogue, vec!["x/y.dat".to_owned()]);

        assert_eq!(
            state.catalogue.locations_of("x/y.dat", true).await.unwrap(),
            vec!["hD".to_owned()]
        );
        assert_eq!(
            state.catalogue.get_attr("x/y.dat", &attr::dir("hD")).await.unwrap(),
            Some("data1".to_owned())
        );
        assert_eq!(state.catalogue.get_attr("x/y.dat", attr::GROUP).await.unwrap(), Some(UNKNOWN_GROUP.to_owned()));
        assert_eq!(
            state.catalogue.get_attr("x/y.dat", attr::PERMISSIONS).await.unwrap(),
            Some(DEFAULT_PERMISSIONS.to_owned())
        );
        assert_eq!(
            state.catalogue.get_attr("x/y.dat", attr::SUBMITTER).await.unwrap(),
            Some(UNKNOWN_SUBMITTER.to_owned())
        );
        assert_eq!(state.catalogue.get_attr("x/y.dat", attr::SIZE).await.unwrap(), Some("11".to_owned()));
        assert!(state.catalogue.get_attr("x/y.dat", attr::MD5SUM).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn forced_default_drops_stale_catalogue_entry() {
        let working_dir = scratch_dir("stale-wd");
        let node_root = scratch_dir("stale-node");
        let state = state_with_node(working_dir, node_root);
        state.catalogue.create("gone/forever.dat", "hD").await.unwrap();

        let report = verify_node(&state, "hD", &ForcedDefaultPrompt).await.unwrap();
        assert_eq!(report.removed_stale, vec!["gone/forever.dat".to_owned()]);
        assert!(state.catalogue.locations_of("gone/forever.dat", true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn forced_default_fixes_wrong_disk_attribute() {
        let working_dir = scratch_dir("wrongdisk-wd");
        let node_root = scratch_dir("wrongdisk-node");
        std::fs::create_dir_all(node_root.join("data2")).unwrap();
        std::fs::write(node_root.join("data2/f.dat"), b"x").unwrap();
        let state = state_with_node(working_dir, node_root);
        state.catalogue.create("f.dat", "hD").await.unwrap();
        state.catalogue.set_attr("f.dat", &attr::dir("hD"), "data1").await.unwrap();
        state.catalogue.set_attr("f.dat", attr::GROUP, "g").await.unwrap();
        state.catalogue.set_attr("f.dat", attr::PERMISSIONS, "public").await.unwrap();
        state.catalogue.set_attr("f.dat", attr::SUBMITTER, "s").await.unwrap();
        state.catalogue.set_attr("f.dat", attr::MD5SUM, "ABC").await.unwrap();
        state.catalogue.set_attr("f.dat", attr::SIZE, "1").await.unwrap();

        let report = verify_node(&state, "hD", &ForcedDefaultPrompt).await.unwrap();
        assert_eq!(report.fixed_disk_attr, vec!["f.dat".to_owned()]);
        assert_eq!(
            state.catalogue.get_attr("f.dat", &attr::dir("hD")).await.unwrap(),
            Some("data2".to_owned())
        );
    }

    #[tokio::test]
    async fn forced_default_keeps_larger_duplicate() {
        let working_dir = scratch_dir("dup-wd");
        let node_root = scratch_dir("dup-node");
        std::fs::create_dir_all(node_root.join("data1")).unwrap();
        std::fs::create_dir_all(node_root.join("data2")).unwrap();
        std::fs::write(node_root.join("data1/f.dat"), b"short").unwrap();
        std::fs::write(node_root.join("data2/f.dat"), b"a much longer payload").unwrap();
        let state = state_with_node(working_dir, node_root.clone());

        let report = verify_node(&state, "hD", &ForcedDefaultPrompt).await.unwrap();
        assert_eq!(report.removed_duplicates, vec!["hD:data1/f.dat".to_owned()]);
        assert!(!node_root.join("data1/f.dat").exists());
        assert!(node_root.join("data2/f.dat").exists());
        assert_eq!(
            state.catalogue.get_attr("f.dat", &attr::dir("hD")).await.unwrap(),
            Some("data2".to_owned())
        );
    }

    struct ScriptedPrompt;
    impl VerificationPrompt for ScriptedPrompt {
        fn missing_from_catalogue(&self, _lfn: &str, _disk: &str) -> MissingAction {
            MissingAction::Skip
        }
        fn wrong_disk(&self, _lfn: &str, _recorded: &str, _actual: &str) -> WrongDiskAction {
            WrongDiskAction::Skip
        }
        fn missing_attributes(&self, _lfn: &str, _missing: &[&'static str]) -> AttributeAction {
            AttributeAction::Skip
        }
        fn duplicate_across_disks(&self, _lfn: &str, _candidates: &[(String, u64)]) -> usize {
            0
        }
        fn stale_catalogue_entry(&self, _lfn: &str) -> StaleAction {
            StaleAction::Skip
        }
    }

    #[tokio::test]
    async fn scripted_prompt_can_decline_every_fix() {
        let working_dir = scratch_dir("decline-wd");
        let node_root = scratch_dir("decline-node");
        std::fs::create_dir_all(node_root.join("data1")).unwrap();
        std::fs::write(node_root.join("data1/f.dat"), b"x").unwrap();
        let state = state_with_node(working_dir, node_root);

        let report = verify_node(&state, "hD", &ScriptedPrompt).await.unwrap();
        assert!(report.added_to_catalogue.is_empty());
        assert!(state.catalogue.locations_of("f.dat", true).await.unwrap().is_empty());
    }
}
