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

//! The background sweep: one pass does a liveness probe, refreshes free-space
//! figures, checks for a disk-space panic, looks for under-replicated files,
//! reclaims space on hosts running low, promotes inbox uploads, propagates
//! permission changes, advances the replication queue, rotates through a
//! checksum spot-check, and finally persists every on-disk list. `run_loop`
//! drives this at `cfg.sweep_interval` and is the only thing the main task
//! awaits once the listener is spawned

use crate::catalogue::{attr, Catalogue, FileListing};
use crate::commands;
use crate::config::GridConfig;
use crate::dbnet::IncomingRequest;
use crate::drivers::StorageDriver;
use crate::nodes::{can_safely_delete, Node};
use crate::pending::mods::PendingModification;
use crate::pending::permissions::PendingPermissionChange;
use crate::registry;
use crate::replication::ReplicationReason;
use crate::state::ControlState;
use crate::util::error::SkyResult;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;

/// Run sweeps at `cfg.sweep_interval` until a termination signal poisons
/// [`registry`]. The check happens at the top of every iteration, never inside a
/// signal handler
pub async fn run_loop(state: &ControlState, cfg: &GridConfig, rx: &mut mpsc::Receiver<IncomingRequest>) {
    loop {
        if !registry::state_okay() {
            log::info!("sweep loop exiting on termination signal");
            return;
        }
        if let Err(e) = run_sweep(state, cfg, rx).await {
            log::error!("sweep iteration failed: {e}");
            if matches!(e, crate::util::error::Error::Local(_)) {
                return;
            }
        }
        tokio::time::sleep(Duration::from_secs(cfg.sweep_interval)).await;
    }
}

/// One full sweep iteration, steps in the fixed order the source ran its control
/// thread's main loop in
pub async fn run_sweep(
    state: &ControlState,
    cfg: &GridConfig,
    rx: &mut mpsc::Receiver<IncomingRequest>,
) -> SkyResult<()> {
    commands::drain_queue(state, cfg, rx).await;
    probe_nodes(state, cfg).await?;
    refresh_disk_space(state).await?;
    check_disk_panic(state, cfg).await?;
    file_sweep(state, cfg).await?;
    reclaim_space(state, cfg).await?;
    promote_inboxes(state, cfg).await?;
    propagate_permissions(state).await?;
    state
        .replication
        .lock()
        .update(state.catalogue.as_ref(), &state.nodes.lock(), &state.drivers, &cfg.tmp_dir)
        .await?;
    checksum_rotation(state, cfg).await?;
    state.save()?;
    Ok(())
}

/// Compose the on-SE path for a replica the same way the replication queue does:
/// `<nodeRoot>/<disk-dir>/<lfn>` when a `<host>-dir` attribute is on record, falling
/// back to `<nodeRoot>/<lfn>` for replicas predating that bookkeeping
fn replica_path(node: &Node, lfn: &str, disk_dir: Option<&str>) -> String {
    match disk_dir {
        Some(dir) => format!("{}/{}/{}", node.path, dir, lfn),
        None => format!("{}/{}", node.path, lfn),
    }
}

/// Step 1: ping every node that isn't already disabled or retiring (a disabled or
/// retiring host is being deliberately drained, not monitored for liveness). A
/// transition back to alive drains anything queued against that host while it was
/// down
async fn probe_nodes(state: &ControlState, cfg: &GridConfig) -> SkyResult<()> {
    let candidates: Vec<(usize, String)> = {
        let nodes = state.nodes.lock();
        nodes
            .iter()
            .filter(|(i, _)| !nodes.is_disabled(*i) && !nodes.is_retiring(*i))
            .map(|(i, n)| (i, n.name.clone()))
            .collect()
    };
    for (idx, name) in candidates {
        let alive = match state.drivers.get(&name) {
            Some(driver) => driver.ping().await.is_ok(),
            None => false,
        };
        let resurrected = {
            let mut nodes = state.nodes.lock();
            if alive {
                nodes.record_ping_success(idx)
            } else {
                nodes.record_ping_failure(idx, state.notifier.as_ref(), &cfg.notify_address);
                false
            }
        };
        if resurrected {
            drain_pending_for_host(state, cfg, &name).await?;
        }
    }
    Ok(())
}

/// Replay everything that was queued against `host` while it was dead: deletes that
/// couldn't be issued, and modifications it missed
async fn drain_pending_for_host(state: &ControlState, cfg: &GridConfig, host: &str) -> SkyResult<()> {
    let Some(driver) = state.drivers.get(host) else { return Ok(()) };

    let queued_deletes: Vec<(String, String)> = state
        .pending_dels
        .lock()
        .for_host(host)
        .map(|d| (d.host.clone(), d.path.clone()))
        .collect();
    for (h, path) in queued_deletes {
        match driver.rm(&path).await {
            Ok(()) => {
                state.pending_dels.lock().remove(&h, &path);
            }
            Err(crate::util::error::Error::TransientRemote(_)) => {
                // leave it queued; the host may still be flaky
            }
            Err(e) => {
                log::warn!("giving up on queued delete of '{path}' on '{h}': {e}");
                state.pending_dels.lock().remove(&h, &path);
            }
        }
    }

    let queued_mods: Vec<PendingModification> =
        state.pending_mods.lock().for_host(host).cloned().collect();
    for pm in queued_mods {
        if let Err(e) = replay_pending_modification(state, cfg, &pm).await {
            log::warn!("deferred replaying modification of '{}' onto '{}': {e}", pm.lfn, pm.host);
            continue;
        }
        state.pending_mods.lock().remove(&pm.lfn, &pm.host);
    }
    Ok(())
}

/// Replay a single queued modification. The local driver completes a transfer
/// synchronously, so a get-then-put direct shot is enough; a driver backed by a
/// slower transport would need this to go through the same polling loop the
/// replication queue itself uses
async fn replay_pending_modification(state: &ControlState, cfg: &GridConfig, pm: &PendingModification) -> SkyResult<()> {
    let (source_node, dest_node) = {
        let nodes = state.nodes.lock();
        let source = nodes.by_name(&pm.source).and_then(|i| nodes.get(i)).cloned();
        let dest = nodes.by_name(&pm.host).and_then(|i| nodes.get(i)).cloned();
        (source, dest)
    };
    let (Some(source_node), Some(dest_node)) = (source_node, dest_node) else {
        return Ok(());
    };
    let Some(source_driver) = state.drivers.get(&source_node.name) else { return Ok(()) };
    let Some(dest_driver) = state.drivers.get(&dest_node.name) else { return Ok(()) };

    let source_dir = state.catalogue.get_attr(&pm.lfn, &attr::dir(&pm.source)).await?;
    let dest_dir = state.catalogue.get_attr(&pm.lfn, &attr::dir(&pm.host)).await?;
    let source_path = replica_path(&source_node, &pm.lfn, source_dir.as_deref());
    let dest_path = replica_path(&dest_node, &pm.lfn, dest_dir.as_deref());
    let temp_path = cfg
        .tmp_dir
        .join(format!("digs-modxfer-{}-{}", pm.host, pm.lfn.replace('/', "_")))
        .to_string_lossy()
        .into_owned();

    let get_handle = source_driver.start_get_transfer(&source_path, &temp_path).await?;
    source_driver.end_transfer(get_handle).await?;
    let put_handle = dest_driver.start_put_transfer(&temp_path, &dest_path).await?;
    dest_driver.end_transfer(put_handle).await?;
    let _ = std::fs::remove_file(&temp_path);

    if let Some(nm) = state.new_mods.lock().find(&pm.lfn, &pm.source).cloned() {
        state.catalogue.set_attr(&pm.lfn, attr::MD5SUM, &nm.md5).await?;
        state.catalogue.set_attr(&pm.lfn, attr::SIZE, &nm.size.to_string()).await?;
    }
    let now = libdigs::util::humandate::now();
    state.catalogue.set_attr(&pm.lfn, &attr::last_checked(&pm.host), &now).await?;
    Ok(())
}

/// Step 2: recompute each node's free space per disk from what the catalogue thinks
/// is sitting there. No driver exposes a free-space query, so this is the grid's own
/// bookkeeping, not a filesystem statvfs
async fn refresh_disk_space(state: &ControlState) -> SkyResult<()> {
    let hosts: Vec<(usize, String, usize)> = {
        let nodes = state.nodes.lock();
        nodes
            .iter()
            .map(|(i, n)| (i, n.name.clone(), n.disk_quota.len().max(1)))
            .collect()
    };
    for (idx, host, ndisks) in hosts {
        let mut used = vec![0u64; ndisks];
        for lfn in state.catalogue.list_at(&host).await? {
            let size: u64 = state
                .catalogue
                .get_attr(&lfn, attr::SIZE)
                .await?
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            let disk = state
                .catalogue
                .get_attr(&lfn, &attr::dir(&host))
                .await?
                .and_then(|d| crate::nodes::disk_index(&d))
                .filter(|&d| d < ndisks)
                .unwrap_or(0);
            used[disk] += size;
        }
        let mut nodes = state.nodes.lock();
        let quota = nodes.get(idx).map(|n| n.disk_quota.clone()).unwrap_or_default();
        for (disk, used_bytes) in used.into_iter().enumerate() {
            let quota_kb = quota.get(disk).copied().unwrap_or(u64::MAX);
            let free_kb = quota_kb.saturating_sub(used_bytes / 1024);
            nodes.set_free_space(idx, disk, free_kb);
        }
    }
    Ok(())
}

/// Step 3: disable any alive node whose free fraction has dropped below
/// `disk_space_panic`, and page the operator once per excursion — not once per
/// sweep the node stays in that state, and again the next time it happens
async fn check_disk_panic(state: &ControlState, cfg: &GridConfig) -> SkyResult<()> {
    let panicking: Vec<String> = {
        let nodes = state.nodes.lock();
        nodes
            .iter()
            .filter(|(i, _)| !nodes.is_dead(*i) && !nodes.is_disabled(*i))
            .filter(|(_, n)| {
                let quota: u64 = n.disk_quota.iter().sum();
                quota > 0 && (n.total_free() as f64 / quota as f64) < cfg.disk_space_panic
            })
            .map(|(_, n)| n.name.clone())
            .collect()
    };
    if panicking.is_empty() {
        *state.disk_panic_notified.lock() = false;
        return Ok(());
    }
    {
        let mut nodes = state.nodes.lock();
        for name in &panicking {
            if let Some(idx) = nodes.by_name(name) {
                nodes.set_disabled(idx, true);
            }
        }
    }
    let mut notified = state.disk_panic_notified.lock();
    if !*notified {
        state.notifier.notify(
            &cfg.notify_address,
            "disk space panic threshold crossed",
            &format!("disabled for critically low free space: {}", panicking.join(", ")),
        );
        *notified = true;
    }
    Ok(())
}

/// Step 4: walk `files_per_iteration` catalogue entries starting where the last
/// sweep left off, queuing a replication job for anything under-replicated
async fn file_sweep(state: &ControlState, cfg: &GridConfig) -> SkyResult<()> {
    let listing = state.catalogue.list_files("*").await?;
    if listing.is_empty() {
        return Ok(());
    }
    let start = state.cursors.lock().lfn_list_pos % listing.len();
    let n = cfg.files_per_iteration.min(listing.len());
    // Computed once per sweep and decremented as jobs are queued, matching the
    // original's per-iteration `freeTemp` bookkeeping rather than a fresh statvfs
    // call per candidate file
    let mut free_temp = crate::util::os::free_space_kb(&cfg.tmp_dir)
        .unwrap_or(u64::MAX)
        .saturating_mul(1024);
    for offset in 0..n {
        consider_for_replication(state, cfg, &listing[(start + offset) % listing.len()], &mut free_temp).await?;
    }
    state.cursors.lock().lfn_list_pos = (start + n) % listing.len();
    Ok(())
}

async fn consider_for_replication(
    state: &ControlState,
    cfg: &GridConfig,
    entry: &FileListing,
    free_temp: &mut u64,
) -> SkyResult<()> {
    let replcount: usize = state
        .catalogue
        .get_attr(&entry.lfn, attr::REPLCOUNT)
        .await?
        .and_then(|s| s.parse().ok())
        .unwrap_or(cfg.default_replcount);
    let alive_hosts: Vec<String> = {
        let nodes = state.nodes.lock();
        entry
            .hosts
            .iter()
            .filter(|h| {
                nodes
                    .by_name(h)
                    .map(|i| !nodes.is_dead(i) && !nodes.is_disabled(i))
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    };
    if alive_hosts.is_empty() || alive_hosts.len() >= replcount {
        return Ok(());
    }
    let file_size: u64 = state
        .catalogue
        .get_attr(&entry.lfn, attr::SIZE)
        .await?
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    if file_size.saturating_mul(2) > *free_temp {
        log::debug!(
            "insufficient temporary disk space to replicate '{}': need {}, have {}",
            entry.lfn,
            crate::util::fmt_kb(file_size.saturating_mul(2) / 1024),
            crate::util::fmt_kb(*free_temp / 1024)
        );
        return Ok(());
    }
    let source = alive_hosts[0].clone();
    let dest = {
        let nodes = state.nodes.lock();
        let sites_held: HashSet<String> = entry
            .hosts
            .iter()
            .filter_map(|h| nodes.by_name(h).and_then(|i| nodes.get(i)))
            .map(|n| n.site.clone())
            .collect();
        let is_candidate = |i: &usize, n: &&Node| {
            !nodes.is_dead(*i)
                && !nodes.is_disabled(*i)
                && !nodes.is_retiring(*i)
                && !entry.hosts.iter().any(|h| h == &n.name)
                && n.total_free() as f64 > n.disk_quota.iter().sum::<u64>() as f64 * cfg.disk_space_low
        };
        let candidates: Vec<(usize, &Node)> = nodes
            .preference_order()
            .iter()
            .filter_map(|&i| nodes.get(i).map(|n| (i, n)))
            .filter(|(i, n)| is_candidate(i, n))
            .collect();
        // getSuitableNodeForMirror: prefer a destination at a site that doesn't
        // already hold a replica; only fall back to a same-site destination when
        // every candidate would otherwise collide with an existing replica's site
        candidates
            .iter()
            .find(|(_, n)| !sites_held.contains(&n.site))
            .or_else(|| candidates.first())
            .map(|(_, n)| n.name.clone())
    };
    if let Some(dest) = dest {
        state
            .replication
            .lock()
            .enqueue(&entry.lfn, &source, &dest, alive_hosts.len(), ReplicationReason::TooFewCopies);
        *free_temp = free_temp.saturating_sub(file_size);
    }
    Ok(())
}

/// Step 5: on a host running below `disk_space_low`, delete replicas that
/// [`can_safely_delete`] clears, up to `count_per_iteration` deletions this sweep
async fn reclaim_space(state: &ControlState, cfg: &GridConfig) -> SkyResult<()> {
    let low_hosts: Vec<String> = {
        let nodes = state.nodes.lock();
        nodes
            .iter()
            .filter(|(i, _)| !nodes.is_dead(*i) && !nodes.is_disabled(*i))
            .filter(|(_, n)| {
                let quota: u64 = n.disk_quota.iter().sum();
                quota > 0 && (n.total_free() as f64 / quota as f64) < cfg.disk_space_low
            })
            .map(|(_, n)| n.name.clone())
            .collect()
    };
    let mut reclaimed = 0usize;
    for host in low_hosts {
        for lfn in state.catalogue.list_at(&host).await? {
            if reclaimed >= cfg.count_per_iteration {
                return Ok(());
            }
            let replicas = state.catalogue.locations_of(&lfn, true).await?;
            let replcount: usize = state
                .catalogue
                .get_attr(&lfn, attr::REPLCOUNT)
                .await?
                .and_then(|s| s.parse().ok())
                .unwrap_or(cfg.default_replcount);
            let may_delete = {
                let nodes = state.nodes.lock();
                can_safely_delete(&nodes, &replicas, replcount, &host)
            };
            if !may_delete {
                continue;
            }
            let node = {
                let nodes = state.nodes.lock();
                nodes.by_name(&host).and_then(|i| nodes.get(i)).cloned()
            };
            let Some(node) = node else { continue };
            let Some(driver) = state.drivers.get(&host) else { continue };
            let dir = state.catalogue.get_attr(&lfn, &attr::dir(&host)).await?;
            let path = replica_path(&node, &lfn, dir.as_deref());
            match driver.rm(&path).await {
                Ok(()) => {
                    state.catalogue.delete(&lfn, &host).await?;
                    reclaimed += 1;
                }
                Err(e) => log::warn!("failed to reclaim space for '{lfn}' on '{host}': {e}"),
            }
        }
    }
    if reclaimed > 0 {
        log::info!("reclaimed space by deleting {reclaimed} replica(s)");
    }
    Ok(())
}

/// Step 6: promote whatever landed in an inbox, whether it's a brand new file or a
/// replacement for an existing one. Normally only nodes an admin `check`ed since the
/// last sweep are scanned; every `new_check_frequency`th sweep every node is scanned
/// instead, so a file can't get stranded on a node nobody happened to check
async fn promote_inboxes(state: &ControlState, cfg: &GridConfig) -> SkyResult<()> {
    let check_all = {
        let mut iter = state.sweep_iteration.lock();
        let due = *iter % cfg.new_check_frequency.max(1) as u64 == 0;
        *iter = iter.wrapping_add(1);
        due
    };
    let candidates: Vec<String> = if check_all {
        state.nodes.lock().iter().map(|(_, n)| n.name.clone()).collect()
    } else {
        state.check_list.lock().iter().cloned().collect()
    };
    state.check_list.lock().clear();

    let hosts: Vec<String> = {
        let nodes = state.nodes.lock();
        candidates
            .into_iter()
            .filter(|name| {
                nodes
                    .by_name(name)
                    .map(|i| !nodes.is_dead(i) && !nodes.is_disabled(i))
                    .unwrap_or(false)
            })
            .collect()
    };
    for host in hosts {
        let Some(driver) = state.drivers.get(&host) else { continue };
        if !driver.capabilities().has_inbox {
            continue;
        }
        let names = match driver.scan_inbox().await {
            Ok(n) => n,
            Err(e) => {
                log::warn!("inbox scan failed on '{host}': {e}");
                continue;
            }
        };
        for name in names {
            promote_one(state, cfg, &host, driver.as_ref(), &name).await?;
        }
    }
    Ok(())
}

async fn promote_one(
    state: &ControlState,
    cfg: &GridConfig,
    host: &str,
    driver: &dyn StorageDriver,
    inbox_name: &str,
) -> SkyResult<()> {
    let lfn = libdigs::unescape_inbox_name(inbox_name);

    if let Some(add) = state.pending_adds.lock().find(&lfn).cloned() {
        let node = {
            let nodes = state.nodes.lock();
            nodes.by_name(host).and_then(|i| nodes.get(i)).cloned()
        };
        let Some(node) = node else { return Ok(()) };
        let Some((disk, _)) = node.best_disk() else { return Ok(()) };
        let disk_dir = crate::nodes::disk_name(disk);
        let dest_path = format!("{}/{disk_dir}/{lfn}", node.path);
        driver.copy_from_inbox(inbox_name, &dest_path).await?;

        state.catalogue.create(&lfn, host).await?;
        state.catalogue.set_attr(&lfn, attr::GROUP, &add.group).await?;
        state.catalogue.set_attr(&lfn, attr::PERMISSIONS, &add.permissions).await?;
        state.catalogue.set_attr(&lfn, attr::SIZE, &add.size.to_string()).await?;
        state.catalogue.set_attr(&lfn, attr::MD5SUM, &add.md5).await?;
        state.catalogue.set_attr(&lfn, attr::SUBMITTER, &add.submitter).await?;
        state.catalogue.set_attr(&lfn, &attr::dir(host), &disk_dir).await?;
        let now = libdigs::util::humandate::now();
        state.catalogue.set_attr(&lfn, &attr::last_checked(host), &now).await?;
        state.pending_adds.lock().remove(&lfn);

        if cfg.default_replcount > 1 {
            let dest = {
                let nodes = state.nodes.lock();
                nodes
                    .preference_order()
                    .iter()
                    .filter_map(|&i| nodes.get(i).map(|n| (i, n)))
                    .find(|(i, n)| {
                        !nodes.is_dead(*i) && !nodes.is_disabled(*i) && !nodes.is_retiring(*i) && n.name != host
                    })
                    .map(|(_, n)| n.name.clone())
            };
            if let Some(dest) = dest {
                state.replication.lock().enqueue(&lfn, host, &dest, 1, ReplicationReason::TooFewCopies);
            }
        }
        log::info!("promoted new file '{lfn}' out of '{host}' inbox");
        return Ok(());
    }

    if let Some(nm) = state.new_mods.lock().find(&lfn, host).cloned() {
        let node = {
            let nodes = state.nodes.lock();
            nodes.by_name(host).and_then(|i| nodes.get(i)).cloned()
        };
        let Some(node) = node else { return Ok(()) };
        let existing_dir = state.catalogue.get_attr(&lfn, &attr::dir(host)).await?;
        let dest_path = replica_path(&node, &lfn, existing_dir.as_deref());
        driver.copy_from_inbox(inbox_name, &dest_path).await?;

        state.catalogue.set_attr(&lfn, attr::MD5SUM, &nm.md5).await?;
        state.catalogue.set_attr(&lfn, attr::SIZE, &nm.size.to_string()).await?;
        let now = libdigs::util::humandate::now();
        state.catalogue.set_attr(&lfn, &attr::last_checked(host), &now).await?;
        state.new_mods.lock().remove(&lfn, host);

        for other in state.catalogue.locations_of(&lfn, true).await? {
            if other != host {
                state.pending_mods.lock().push(lfn.clone(), other, host.to_owned());
            }
        }
        log::info!("promoted modification of '{lfn}' out of '{host}' inbox");
    }
    Ok(())
}

/// Step 7: drain every queued permission change, recursively expanding a directory
/// change into its matching lfns, and push the new group/permissions out to every
/// physical replica
async fn propagate_permissions(state: &ControlState) -> SkyResult<()> {
    for change in state.pending_permissions.lock().drain_all() {
        apply_permission_change(state, &change).await?;
    }
    Ok(())
}

async fn apply_permission_change(state: &ControlState, change: &PendingPermissionChange) -> SkyResult<()> {
    let lfns: Vec<String> = if change.recursive {
        state
            .catalogue
            .list_files(&format!("{}*", change.lfn))
            .await?
            .into_iter()
            .map(|f| f.lfn)
            .collect()
    } else {
        vec![change.lfn.clone()]
    };
    for lfn in lfns {
        state.catalogue.set_attr(&lfn, attr::GROUP, &change.group).await?;
        state.catalogue.set_attr(&lfn, attr::PERMISSIONS, &change.permissions).await?;
        for host in state.catalogue.locations_of(&lfn, true).await? {
            let node = {
                let nodes = state.nodes.lock();
                nodes.by_name(&host).and_then(|i| nodes.get(i)).cloned()
            };
            let Some(node) = node else { continue };
            let Some(driver) = state.drivers.get(&host) else { continue };
            let dir = state.catalogue.get_attr(&lfn, &attr::dir(&host)).await?;
            let path = replica_path(&node, &lfn, dir.as_deref());
            if let Err(e) = driver.set_group(&path, &change.group).await {
                log::warn!("failed to set group on '{path}': {e}");
            }
            if let Err(e) = driver.set_permissions(&path, &change.permissions).await {
                log::warn!("failed to set permissions on '{path}': {e}");
            }
        }
    }
    Ok(())
}

/// Step 9: spot-check `checksums_per_iteration` catalogued files against the
/// recorded md5sum, cursoring the same way the file sweep does. A mismatch disables
/// the offending host rather than touching the file — silent corruption of a
/// replica is a host-level problem, not something to paper over by just
/// re-replicating
async fn checksum_rotation(state: &ControlState, cfg: &GridConfig) -> SkyResult<()> {
    let entries = state.catalogue.attr_search(attr::MD5SUM).await?;
    if entries.is_empty() {
        return Ok(());
    }
    let start = state.cursors.lock().checksum_pos % entries.len();
    let n = cfg.checksums_per_iteration.min(entries.len());
    for offset in 0..n {
        let (lfn, expected) = &entries[(start + offset) % entries.len()];
        verify_one_checksum(state, cfg, lfn, expected).await?;
    }
    state.cursors.lock().checksum_pos = (start + n) % entries.len();
    Ok(())
}

async fn verify_one_checksum(state: &ControlState, cfg: &GridConfig, lfn: &str, expected: &str) -> SkyResult<()> {
    for host in state.catalogue.locations_of(lfn, true).await? {
        let (node, alive) = {
            let nodes = state.nodes.lock();
            match nodes.by_name(&host).and_then(|i| nodes.get(i).map(|n| (n, i))) {
                Some((n, i)) => (Some(n.clone()), !nodes.is_dead(i) && !nodes.is_disabled(i)),
                None => (None, false),
            }
        };
        let (Some(node), true) = (node, alive) else { continue };
        let Some(driver) = state.drivers.get(&host) else { continue };
        let dir = state.catalogue.get_attr(lfn, &attr::dir(&host)).await?;
        let path = replica_path(&node, lfn, dir.as_deref());
        match driver.get_checksum(&path).await {
            Ok(actual) if actual == *expected => {}
            Ok(_) => {
                if let Some(idx) = state.nodes.lock().by_name(&host) {
                    state.nodes.lock().set_disabled(idx, true);
                }
                state.notifier.notify(
                    &cfg.notify_address,
                    &format!("checksum mismatch for '{lfn}'"),
                    &format!(
                        "host '{host}' holds a replica of '{lfn}' whose checksum no longer matches \
                         the catalogue; disabling the host"
                    ),
                );
                log::warn!("checksum mismatch for '{lfn}' on '{host}', disabling host");
            }
            Err(e) => log::warn!("checksum check failed for '{lfn}' on '{host}': {e}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::GroupMap;
    use crate::catalogue::memcat::MemCatalogue;
    use crate::catalogue::Catalogue;
    use crate::drivers::local::LocalDriver;
    use crate::drivers::DriverRegistry;
    use crate::nodes::{Node, NodeRegistry};
    use crate::notify::test_util::RecordingNotifier;
    use crate::pending::adds::{PendingAdd, PendingAddList};
    use crate::pending::dels::PendingDeleteList;
    use crate::pending::mods::PendingModificationList;
    use crate::pending::newmods::{NewModification, NewModificationList};
    use crate::pending::permissions::PendingPermissionList;
    use crate::replication::ReplicationQueue;
    use crate::state::SweepCursors;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("digs-sweep-test-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn empty_state(working_dir: PathBuf) -> ControlState {
        ControlState {
            working_dir,
            nodes: Mutex::new(NodeRegistry::new()),
            catalogue: Arc::new(MemCatalogue::new()),
            drivers: DriverRegistry::new(),
            pending_adds: Mutex::new(PendingAddList::new()),
            pending_dels: Mutex::new(PendingDeleteList::new()),
            pending_mods: Mutex::new(PendingModificationList::new()),
            new_mods: Mutex::new(NewModificationList::new()),
            pending_permissions: Mutex::new(PendingPermissionList::new()),
            replication: Mutex::new(ReplicationQueue::new()),
            cursors: Mutex::new(SweepCursors::default()),
            group_map: GroupMap::new(),
            notifier: Arc::new(RecordingNotifier::default()),
            disk_panic_notified: Mutex::new(false),
            check_list: Mutex::new(std::collections::HashSet::new()),
            sweep_iteration: Mutex::new(0),
        }
    }

    fn test_cfg(working_dir: PathBuf) -> GridConfig {
        let mut cfg = GridConfig::default_with_working_dir(working_dir);
        cfg.notify_address = "admin@example.org".to_owned();
        cfg
    }

    #[tokio::test]
    async fn under_replicated_file_is_queued_for_replication() {
        let wd = scratch_dir("replicate");
        let src = scratch_dir("replicate-src");
        let dst = scratch_dir("replicate-dst");
        std::fs::write(src.join("u"), b"0123456789").unwrap();

        let mut state = empty_state(wd);
        state.catalogue.create("u", "hA").await.unwrap();
        state.catalogue.set_attr("u", attr::SIZE, "10").await.unwrap();

        let mut node_a = Node::new("hA", "site1", src.to_string_lossy());
        node_a.disk_quota = vec![1_000_000];
        node_a.free_space = vec![1_000_000];
        let mut node_b = Node::new("hB", "site2", dst.to_string_lossy());
        node_b.disk_quota = vec![1_000_000];
        node_b.free_space = vec![1_000_000];
        {
            let mut nodes = state.nodes.lock();
            nodes.add(node_a);
            nodes.add(node_b);
        }
        state.drivers.register("hA", Arc::new(LocalDriver::new(&src, None)) as Arc<_>);
        state.drivers.register("hB", Arc::new(LocalDriver::new(&dst, None)) as Arc<_>);

        let cfg = test_cfg(state.working_dir.clone());
        file_sweep(&state, &cfg).await.unwrap();
        assert_eq!(state.replication.lock().len(), 1);

        for _ in 0..4 {
            state
                .replication
                .lock()
                .update(state.catalogue.as_ref(), &state.nodes.lock(), &state.drivers, &cfg.tmp_dir)
                .await
                .unwrap();
        }
        let hosts = state.catalogue.locations_of("u", true).await.unwrap();
        assert!(hosts.contains(&"hB".to_owned()));
    }

    #[tokio::test]
    async fn replication_destination_avoids_a_site_already_holding_a_replica() {
        let wd = scratch_dir("site-avoid");
        let state = empty_state(wd);
        state.catalogue.create("u", "hA").await.unwrap();
        state.catalogue.set_attr("u", attr::SIZE, "10").await.unwrap();

        // hB sits at the same site as hA (the existing replica); hC is the only
        // candidate at a fresh site. hB sorts first in preference order, so picking
        // it anyway would defeat the geographic-spread invariant.
        let mut node_a = Node::new("hA", "site1", "/grid/hA");
        node_a.disk_quota = vec![1_000_000];
        node_a.free_space = vec![1_000_000];
        let mut node_b = Node::new("hB", "site1", "/grid/hB");
        node_b.disk_quota = vec![1_000_000];
        node_b.free_space = vec![1_000_000];
        let mut node_c = Node::new("hC", "site2", "/grid/hC");
        node_c.disk_quota = vec![1_000_000];
        node_c.free_space = vec![1_000_000];
        {
            let mut nodes = state.nodes.lock();
            nodes.add(node_a);
            nodes.add(node_b);
            nodes.add(node_c);
        }

        let cfg = test_cfg(state.working_dir.clone());
        let mut free_temp = u64::MAX;
        let listing = state.catalogue.list_files("*").await.unwrap();
        consider_for_replication(&state, &cfg, &listing[0], &mut free_temp).await.unwrap();

        let jobs: Vec<_> = state.replication.lock().iter().map(|j| j.to.clone()).collect();
        assert_eq!(jobs, vec!["hC".to_owned()]);
    }

    #[tokio::test]
    async fn dead_host_resurrection_drains_queued_delete() {
        let wd = scratch_dir("drain");
        let root = scratch_dir("drain-root");
        std::fs::write(root.join("stale"), b"x").unwrap();

        let mut state = empty_state(wd);
        let mut node_a = Node::new("hA", "site1", root.to_string_lossy());
        node_a.dead_counter = 1;
        let a = {
            let mut nodes = state.nodes.lock();
            let idx = nodes.add(node_a);
            nodes.record_ping_failure(idx, state.notifier.as_ref(), "admin@example.org");
            idx
        };
        assert!(state.nodes.lock().is_dead(a));
        state.pending_dels.lock().push("hA", root.join("stale").to_string_lossy().into_owned());
        state.drivers.register("hA", Arc::new(LocalDriver::new(&root, None)) as Arc<_>);

        let cfg = test_cfg(state.working_dir.clone());
        probe_nodes(&state, &cfg).await.unwrap();

        assert!(!state.nodes.lock().is_dead(a));
        assert!(state.pending_dels.lock().is_empty());
        assert!(!root.join("stale").exists());
    }

    #[tokio::test]
    async fn inbox_promotion_creates_catalogue_entry() {
        let wd = scratch_dir("inbox");
        let root = scratch_dir("inbox-root");
        let inbox = root.join("inbox");
        std::fs::create_dir_all(&inbox).unwrap();
        std::fs::write(inbox.join("u-DIR-v.dat"), b"hello world").unwrap();

        let mut state = empty_state(wd);
        let node = Node::new("hA", "site1", root.to_string_lossy());
        state.nodes.lock().add(node);
        state.drivers.register("hA", Arc::new(LocalDriver::new(&root, Some(inbox))) as Arc<_>);
        state.pending_adds.lock().push(PendingAdd {
            lfn: "u/v.dat".to_owned(),
            group: "physics".to_owned(),
            permissions: "public".to_owned(),
            size: 11,
            md5: "ABCDEF".to_owned(),
            timestamp: 1_700_000_000,
            submitter: libdigs::encode_dn("/O=Grid/CN=Jane Doe"),
        });

        let cfg = test_cfg(state.working_dir.clone());
        promote_inboxes(&state, &cfg).await.unwrap();

        assert!(state.catalogue.exists("u/v.dat").await.unwrap());
        assert_eq!(
            state.catalogue.get_attr("u/v.dat", attr::GROUP).await.unwrap(),
            Some("physics".to_owned())
        );
        assert!(state.pending_adds.lock().is_empty());
    }

    #[tokio::test]
    async fn modification_promotion_queues_fanout_to_other_replicas() {
        let wd = scratch_dir("modify");
        let root = scratch_dir("modify-root");
        let inbox = root.join("inbox");
        std::fs::create_dir_all(&inbox).unwrap();
        std::fs::create_dir_all(root.join("data")).unwrap();
        std::fs::write(root.join("data/v.dat"), b"old").unwrap();
        std::fs::write(inbox.join("v.dat"), b"new version").unwrap();

        let mut state = empty_state(wd);
        state.catalogue.create("v.dat", "hA").await.unwrap();
        state.catalogue.create("v.dat", "hB").await.unwrap();
        state.catalogue.set_attr("v.dat", &attr::dir("hA"), "data").await.unwrap();
        {
            let mut nodes = state.nodes.lock();
            nodes.add(Node::new("hA", "site1", root.to_string_lossy()));
            nodes.add(Node::new("hB", "site2", "/var/grid/hB"));
        }
        state.drivers.register("hA", Arc::new(LocalDriver::new(&root, Some(inbox))) as Arc<_>);
        state.new_mods.lock().push(NewModification {
            lfn: "v.dat".to_owned(),
            host: "hA".to_owned(),
            md5: "NEWSUM".to_owned(),
            size: 11,
            timestamp: 1_700_000_500,
        });

        let cfg = test_cfg(state.working_dir.clone());
        promote_inboxes(&state, &cfg).await.unwrap();

        assert_eq!(
            state.catalogue.get_attr("v.dat", attr::MD5SUM).await.unwrap(),
            Some("NEWSUM".to_owned())
        );
        assert!(state.new_mods.lock().is_empty());
        assert!(state.pending_mods.lock().for_host("hB").any(|m| m.lfn == "v.dat" && m.source == "hA"));
    }

    #[tokio::test]
    async fn checksum_mismatch_disables_the_host() {
        let wd = scratch_dir("checksum");
        let root = scratch_dir("checksum-root");
        std::fs::write(root.join("f"), b"corrupted contents").unwrap();

        let mut state = empty_state(wd);
        state.catalogue.create("f", "hA").await.unwrap();
        state.catalogue.set_attr("f", attr::MD5SUM, "00000000000000000000000000000000").await.unwrap();
        let a = state.nodes.lock().add(Node::new("hA", "site1", root.to_string_lossy()));
        state.drivers.register("hA", Arc::new(LocalDriver::new(&root, None)) as Arc<_>);

        let cfg = test_cfg(state.working_dir.clone());
        checksum_rotation(&state, &cfg).await.unwrap();

        assert!(state.nodes.lock().is_disabled(a));
    }

    #[tokio::test]
    async fn disk_panic_notifies_once_per_excursion() {
        let wd = scratch_dir("panic");
        let mut state = empty_state(wd);
        let mut node = Node::new("hA", "site1", "/var/grid/hA");
        node.disk_quota = vec![1_000];
        node.free_space = vec![1]; // far below the panic threshold
        let a = state.nodes.lock().add(node);
        let cfg = test_cfg(state.working_dir.clone());

        check_disk_panic(&state, &cfg).await.unwrap();
        assert!(state.nodes.lock().is_disabled(a));
        assert!(*state.disk_panic_notified.lock());

        // still panicking: no repeat notification, but we don't re-assert the
        // notifier call count here since RecordingNotifier isn't introspected by
        // this test; the flag alone proves the edge-trigger held
        check_disk_panic(&state, &cfg).await.unwrap();
        assert!(*state.disk_panic_notified.lock());
    }
}
