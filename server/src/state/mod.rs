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

//! `ControlState` repackages the module-level globals of the original daemon (node
//! table, state sets, queues, cursors) as a single value owned by the main loop.
//! Ancillary threads only ever reach it through the message queue or a transfer
//! handle's status cell — never a direct mutable reference

use crate::auth::groupmap::GroupMap;
use crate::catalogue::memcat::MemCatalogue;
use crate::catalogue::Catalogue;
use crate::drivers::DriverRegistry;
use crate::nodes::NodeRegistry;
use crate::notify::NotifySink;
use crate::pending::adds::PendingAddList;
use crate::pending::dels::PendingDeleteList;
use crate::pending::mods::PendingModificationList;
use crate::pending::newmods::NewModificationList;
use crate::pending::permissions::PendingPermissionList;
use crate::replication::ReplicationQueue;
use crate::util::error::SkyResult;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Persisted cursors for the file sweep and checksum rotation, loaded/saved as part
/// of `control-thread-state`
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepCursors {
    pub lfn_list_pos: usize,
    pub checksum_pos: usize,
}

impl SweepCursors {
    pub fn load(path: &Path) -> SkyResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let mut parts = contents.split_whitespace();
                let lfn_list_pos = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
                let checksum_pos = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
                Ok(Self {
                    lfn_list_pos,
                    checksum_pos,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> SkyResult<()> {
        std::fs::write(path, format!("{} {}\n", self.lfn_list_pos, self.checksum_pos))?;
        Ok(())
    }
}

/// Everything the main loop owns. External mutators (the listener, transfer
/// monitors) only ever reach in through the message queue or a handle's status
/// cell, never by holding a reference to this struct itself
pub struct ControlState {
    pub working_dir: PathBuf,
    pub nodes: Mutex<NodeRegistry>,
    pub catalogue: Arc<dyn Catalogue>,
    pub drivers: DriverRegistry,
    pub pending_adds: Mutex<PendingAddList>,
    pub pending_dels: Mutex<PendingDeleteList>,
    pub pending_mods: Mutex<PendingModificationList>,
    pub new_mods: Mutex<NewModificationList>,
    pub pending_permissions: Mutex<PendingPermissionList>,
    pub replication: Mutex<ReplicationQueue>,
    pub cursors: Mutex<SweepCursors>,
    pub group_map: GroupMap,
    pub notifier: Arc<dyn NotifySink>,
    /// Whether the low-disk-space panic notification has already fired; cleared once
    /// free space recovers above the panic threshold so the operator is paged again
    /// on the next excursion rather than once per process lifetime
    pub disk_panic_notified: Mutex<bool>,
    /// Nodes an admin `check` message asked to be scanned for new inbox uploads on
    /// the next sweep. Drained every sweep regardless of whether it drove the scan
    /// or a full all-nodes pass did
    pub check_list: Mutex<HashSet<String>>,
    /// Counts sweep iterations so inbox promotion can fall back to scanning every
    /// node's inbox every `new_check_frequency`th sweep, not just the checked-in
    /// ones. Not persisted across restarts, matching the source's in-memory counter
    pub sweep_iteration: Mutex<u64>,
}

impl ControlState {
    /// Bootstrap every on-disk list under `working_dir`; a missing file is an empty
    /// collection, matching every individual loader's own tolerance
    pub fn load(working_dir: PathBuf, notifier: Arc<dyn NotifySink>) -> SkyResult<Self> {
        let nodes = NodeRegistry::load(&working_dir)?;
        let catalogue: Arc<dyn Catalogue> = Arc::new(MemCatalogue::load(&working_dir.join("catalogue.dump"))?);
        let pending_adds = PendingAddList::load(&working_dir.join("pendingadds"))?;
        let pending_dels = PendingDeleteList::load(&working_dir.join("pendingdels"))?;
        let pending_mods = PendingModificationList::load(&working_dir.join("pendingmods"))?;
        let new_mods = NewModificationList::load(&working_dir.join("newmods"))?;
        let pending_permissions = PendingPermissionList::load(&working_dir.join("pendingpermissions"))?;
        let cursors = SweepCursors::load(&working_dir.join("control-thread-state"))?;
        let group_map = GroupMap::load(&working_dir.join("group-mapfile")).unwrap_or_default();
        Ok(Self {
            working_dir,
            nodes: Mutex::new(nodes),
            catalogue,
            drivers: DriverRegistry::new(),
            pending_adds: Mutex::new(pending_adds),
            pending_dels: Mutex::new(pending_dels),
            pending_mods: Mutex::new(pending_mods),
            new_mods: Mutex::new(new_mods),
            pending_permissions: Mutex::new(pending_permissions),
            replication: Mutex::new(ReplicationQueue::new()),
            cursors: Mutex::new(cursors),
            group_map,
            notifier,
            disk_panic_notified: Mutex::new(false),
            check_list: Mutex::new(HashSet::new()),
            sweep_iteration: Mutex::new(0),
        })
    }

    /// Persist every list and the catalogue dump, the final step of every sweep
    pub fn save(&self) -> SkyResult<()> {
        self.nodes.lock().save(&self.working_dir)?;
        self.pending_adds.lock().save(&self.working_dir.join("pendingadds"))?;
        self.pending_dels.lock().save(&self.working_dir.join("pendingdels"))?;
        self.pending_mods.lock().save(&self.working_dir.join("pendingmods"))?;
        self.new_mods.lock().save(&self.working_dir.join("newmods"))?;
        self.pending_permissions
            .lock()
            .save(&self.working_dir.join("pendingpermissions"))?;
        self.cursors.lock().save(&self.working_dir.join("control-thread-state"))?;
        if let Some(memcat) = self.catalogue.as_any().downcast_ref::<MemCatalogue>() {
            memcat.dump(&self.working_dir.join("catalogue.dump"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;

    #[test]
    fn load_on_empty_directory_yields_empty_state() {
        let dir = std::env::temp_dir().join(format!("digs-state-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let state = ControlState::load(dir.clone(), Arc::new(LogNotifier)).unwrap();
        assert_eq!(state.nodes.lock().len(), 0);
        assert!(state.pending_adds.lock().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
