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

//! The replication queue: jobs ordered by ascending `numCopies` at enqueue time so
//! the most under-replicated files move first. A job's transfer is strictly
//! two-phase (get onto a temp path, then put into final storage); `update()` is
//! called once per sweep and advances every job whose host pair has no other job
//! in flight

use crate::catalogue::{attr, Catalogue};
use crate::drivers::{DriverRegistry, TransferHandle, TransferStatus};
use crate::nodes::NodeRegistry;
use crate::util::error::SkyResult;
use std::collections::HashSet;
use std::path::Path;

/// Fallback `replcount` when neither the lfn's attribute nor a resolved config value
/// is available (e.g. in a test exercising the queue without a `ControlState`)
const DEFAULT_REPLCOUNT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationReason {
    TooFewCopies,
    Requested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Waiting,
    Getting,
    Waiting2,
    Putting,
    Done,
    DeleteMe,
    Error,
}

#[derive(Debug, Clone)]
pub struct ReplicationJob {
    pub id: u64,
    pub reason: ReplicationReason,
    pub num_copies: usize,
    pub lfn: String,
    pub from: String,
    pub to: String,
    pub to_disk: Option<usize>,
    pub temp_path: Option<String>,
    pub stage: JobStage,
    pub transfer_handle: Option<TransferHandle>,
}

/// A priority list ordered by ascending `numCopies` at enqueue time, never
/// re-sorted afterward — the source's invariant that priorities derive from
/// enqueue-time state only
#[derive(Default)]
pub struct ReplicationQueue {
    jobs: Vec<ReplicationJob>,
    next_id: u64,
}

impl ReplicationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReplicationJob> {
        self.jobs.iter()
    }

    /// Enqueue a replication. Dedup rules: an existing `Requested` job to the same
    /// `to` is a no-op; an existing non-requested job still `Waiting` has its
    /// `from`/`to` refreshed; an already-in-flight job is left untouched
    pub fn enqueue(
        &mut self,
        lfn: &str,
        from: &str,
        to: &str,
        num_copies: usize,
        reason: ReplicationReason,
    ) {
        if let Some(existing) = self.jobs.iter_mut().find(|j| j.lfn == lfn && j.to == to) {
            if reason == ReplicationReason::Requested {
                return;
            }
            if existing.stage == JobStage::Waiting {
                existing.from = from.to_owned();
                existing.to = to.to_owned();
            }
            return;
        }
        let id = self.next_id;
        self.next_id += 1;
        let insert_at = self
            .jobs
            .iter()
            .position(|j| j.num_copies > num_copies)
            .unwrap_or(self.jobs.len());
        self.jobs.insert(
            insert_at,
            ReplicationJob {
                id,
                reason,
                num_copies,
                lfn: lfn.to_owned(),
                from: from.to_owned(),
                to: to.to_owned(),
                to_disk: None,
                temp_path: None,
                stage: JobStage::Waiting,
                transfer_handle: None,
            },
        );
    }

    /// Advance every job by one step, capped at one active operation per host pair.
    /// Completed/failed jobs are pruned at the end of the call
    pub async fn update(
        &mut self,
        catalogue: &dyn Catalogue,
        nodes: &NodeRegistry,
        drivers: &DriverRegistry,
        tmp_dir: &Path,
    ) -> SkyResult<()> {
        let mut busy_pairs: HashSet<(String, String)> = HashSet::new();
        for job in &self.jobs {
            if matches!(job.stage, JobStage::Getting | JobStage::Putting) {
                busy_pairs.insert((job.from.clone(), job.to.clone()));
            }
        }
        for idx in 0..self.jobs.len() {
            let pair = (self.jobs[idx].from.clone(), self.jobs[idx].to.clone());
            if matches!(self.jobs[idx].stage, JobStage::Waiting | JobStage::Waiting2)
                && busy_pairs.contains(&pair)
            {
                continue;
            }
            busy_pairs.insert(pair);
            if let Err(e) = step_job(&mut self.jobs[idx], catalogue, nodes, drivers, tmp_dir).await {
                log::warn!("replication job {} for '{}' failed: {e}", self.jobs[idx].id, self.jobs[idx].lfn);
                self.jobs[idx].stage = JobStage::DeleteMe;
            }
        }
        self.jobs.retain(|j| j.stage != JobStage::DeleteMe);
        Ok(())
    }
}

async fn step_job(
    job: &mut ReplicationJob,
    catalogue: &dyn Catalogue,
    nodes: &NodeRegistry,
    drivers: &DriverRegistry,
    tmp_dir: &Path,
) -> SkyResult<()> {
    match job.stage {
        JobStage::Waiting => {
            if job.reason == ReplicationReason::TooFewCopies {
                let want: usize = catalogue
                    .get_attr(&job.lfn, attr::REPLCOUNT)
                    .await?
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_REPLCOUNT);
                let have = catalogue.locations_of(&job.lfn, true).await?.len();
                if have >= want {
                    job.stage = JobStage::DeleteMe;
                    return Ok(());
                }
            }
            let from_idx = nodes
                .by_name(&job.from)
                .ok_or_else(|| crate::util::error::Error::Local(format!("unknown source node '{}'", job.from)))?;
            let from_node = nodes.get(from_idx).unwrap();
            let driver = drivers
                .get(&from_node.name)
                .ok_or_else(|| crate::util::error::Error::Local(format!("no driver for '{}'", from_node.name)))?;
            let source_disk = catalogue
                .get_attr(&job.lfn, &attr::dir(&job.from))
                .await?
                .unwrap_or_else(|| crate::nodes::disk_name(0));
            let temp_path = tmp_dir.join(format!("digs-xfer-{}", job.id)).to_string_lossy().into_owned();
            let remote_path = format!("{}/{}/{}", from_node.path, source_disk, job.lfn);
            let handle = driver.start_get_transfer(&remote_path, &temp_path).await?;
            job.temp_path = Some(temp_path);
            job.transfer_handle = Some(handle);
            job.stage = JobStage::Getting;
        }
        JobStage::Getting => {
            let handle = job.transfer_handle.expect("Getting stage always carries a handle");
            let from_idx = nodes.by_name(&job.from).unwrap();
            let from_node = nodes.get(from_idx).unwrap();
            let driver = drivers.get(&from_node.name).unwrap();
            let (status, _pct) = driver.monitor_transfer(handle).await?;
            match status {
                TransferStatus::Done => {
                    driver.end_transfer(handle).await?;
                    job.transfer_handle = None;
                    job.stage = JobStage::Waiting2;
                }
                TransferStatus::Failed => {
                    job.stage = JobStage::DeleteMe;
                }
                TransferStatus::InProgress => {}
            }
        }
        JobStage::Waiting2 => {
            let to_idx = nodes
                .by_name(&job.to)
                .ok_or_else(|| crate::util::error::Error::Local(format!("unknown destination node '{}'", job.to)))?;
            let to_node = nodes.get(to_idx).unwrap();
            let (disk, _free) = to_node
                .best_disk()
                .ok_or_else(|| crate::util::error::Error::Local(format!("node '{}' has no disks", job.to)))?;
            let driver = drivers
                .get(&to_node.name)
                .ok_or_else(|| crate::util::error::Error::Local(format!("no driver for '{}'", to_node.name)))?;
            let dest_path = format!("{}/{}/{}", to_node.path, crate::nodes::disk_name(disk), job.lfn);
            let temp_path = job.temp_path.clone().expect("Waiting2 always has a temp path");
            let handle = driver.start_put_transfer(&temp_path, &dest_path).await?;
            job.to_disk = Some(disk);
            job.transfer_handle = Some(handle);
            job.stage = JobStage::Putting;
        }
        JobStage::Putting => {
            let handle = job.transfer_handle.expect("Putting stage always carries a handle");
            let to_idx = nodes.by_name(&job.to).unwrap();
            let to_node = nodes.get(to_idx).unwrap();
            let driver = drivers.get(&to_node.name).unwrap();
            let (status, _pct) = driver.monitor_transfer(handle).await?;
            match status {
                TransferStatus::Done => {
                    driver.end_transfer(handle).await?;
                    finish_replication(job, catalogue).await?;
                    if let Some(temp) = &job.temp_path {
                        let _ = std::fs::remove_file(temp);
                    }
                    job.stage = JobStage::DeleteMe;
                }
                TransferStatus::Failed => {
                    job.stage = JobStage::DeleteMe;
                }
                TransferStatus::InProgress => {}
            }
        }
        JobStage::Done | JobStage::DeleteMe | JobStage::Error => {}
    }
    Ok(())
}

async fn finish_replication(job: &ReplicationJob, catalogue: &dyn Catalogue) -> SkyResult<()> {
    let group = catalogue.get_attr(&job.lfn, attr::GROUP).await?.unwrap_or_default();
    let perms = catalogue.get_attr(&job.lfn, attr::PERMISSIONS).await?.unwrap_or_default();
    catalogue.create(&job.lfn, &job.to).await?;
    if !group.is_empty() {
        catalogue.set_attr(&job.lfn, attr::GROUP, &group).await?;
    }
    if !perms.is_empty() {
        catalogue.set_attr(&job.lfn, attr::PERMISSIONS, &perms).await?;
    }
    if let Some(disk) = job.to_disk {
        catalogue
            .set_attr(&job.lfn, &attr::dir(&job.to), &crate::nodes::disk_name(disk))
            .await?;
    }
    let now = libdigs::util::humandate::now();
    catalogue.set_attr(&job.lfn, &attr::last_checked(&job.from), &now).await?;
    catalogue.set_attr(&job.lfn, &attr::last_checked(&job.to), &now).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::memcat::MemCatalogue;
    use crate::drivers::local::LocalDriver;
    use crate::nodes::Node;
    use std::sync::Arc;

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("digs-replq-test-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn enqueue_dedups_requested_jobs() {
        let mut q = ReplicationQueue::new();
        q.enqueue("u/v.dat", "hA", "hB", 1, ReplicationReason::Requested);
        q.enqueue("u/v.dat", "hA", "hB", 1, ReplicationReason::Requested);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn enqueue_orders_by_ascending_num_copies() {
        let mut q = ReplicationQueue::new();
        q.enqueue("a", "h1", "h2", 3, ReplicationReason::TooFewCopies);
        q.enqueue("b", "h1", "h2", 1, ReplicationReason::TooFewCopies);
        let copies: Vec<_> = q.iter().map(|j| j.num_copies).collect();
        assert_eq!(copies, vec![1, 3]);
    }

    #[tokio::test]
    async fn under_replicated_file_gains_a_replica_after_update() {
        let src = temp_dir("src");
        let dst = temp_dir("dst");
        std::fs::create_dir_all(src.join("data")).unwrap();
        std::fs::write(src.join("data/u"), b"0123456789").unwrap();

        let cat = MemCatalogue::new();
        cat.create("u", "hA").await.unwrap();

        let mut nodes = NodeRegistry::new();
        let mut node_a = Node::new("hA", "site1", src.to_string_lossy());
        node_a.free_space = vec![1_000_000];
        nodes.add(node_a);
        let mut node_b = Node::new("hB", "site2", dst.to_string_lossy());
        node_b.free_space = vec![1_000_000];
        nodes.add(node_b);

        let mut drivers = DriverRegistry::new();
        drivers.register("hA", Arc::new(LocalDriver::new(&src, None)) as Arc<_>);
        drivers.register("hB", Arc::new(LocalDriver::new(&dst, None)) as Arc<_>);

        let mut q = ReplicationQueue::new();
        q.enqueue("u", "hA", "hB", 1, ReplicationReason::TooFewCopies);

        // drive the two-phase transfer to completion (Waiting -> Getting -> Waiting2 -> Putting -> done)
        for _ in 0..4 {
            q.update(&cat, &nodes, &drivers, &std::env::temp_dir()).await.unwrap();
        }
        assert!(q.is_empty());
        let hosts = cat.locations_of("u", true).await.unwrap();
        assert!(hosts.contains(&"hB".to_owned()));
    }
}
