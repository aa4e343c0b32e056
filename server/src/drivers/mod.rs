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

//! The storage-element driver vtable. The dispatcher only routes calls; it never
//! holds a lock across a transfer, and a transfer handle is opaque to every caller
//! but the driver that issued it

pub mod local;

use crate::util::error::SkyResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Status of an in-flight asynchronous transfer, as reported by `monitor_transfer`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    InProgress,
    Done,
    Failed,
}

/// An opaque handle to an in-flight transfer. The main loop polls it via
/// [`StorageDriver::monitor_transfer`]; it never inspects the value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferHandle(pub u64);

/// The uniform capability interface over a storage back-end. Every call is routed
/// through here; the dispatcher is purely a lookup by node name, never a place
/// that itself blocks
#[async_trait]
pub trait StorageDriver: Send + Sync {
    // -- instant operations --
    async fn get_length(&self, path: &str) -> SkyResult<u64>;
    async fn get_checksum(&self, path: &str) -> SkyResult<String>;
    async fn does_exist(&self, path: &str) -> SkyResult<bool>;
    async fn is_directory(&self, path: &str) -> SkyResult<bool>;
    async fn get_owner(&self, path: &str) -> SkyResult<String>;
    async fn get_group(&self, path: &str) -> SkyResult<String>;
    async fn get_permissions(&self, path: &str) -> SkyResult<String>;
    async fn get_modification_time(&self, path: &str) -> SkyResult<i64>;
    async fn set_owner(&self, path: &str, owner: &str) -> SkyResult<()>;
    async fn set_group(&self, path: &str, group: &str) -> SkyResult<()>;
    async fn set_permissions(&self, path: &str, perms: &str) -> SkyResult<()>;
    async fn mkdir(&self, path: &str) -> SkyResult<()>;
    /// Succeeds if the target already exists, per the contract in the driver vtable
    async fn mkdir_tree(&self, path: &str) -> SkyResult<()>;
    async fn mv(&self, from: &str, to: &str) -> SkyResult<()>;
    /// An error on a nonexistent file, per the driver vtable contract
    async fn rm(&self, path: &str) -> SkyResult<()>;
    async fn rmdir(&self, path: &str) -> SkyResult<()>;
    async fn rmr(&self, path: &str) -> SkyResult<()>;
    /// Every data path under the node's configured root, relative to it
    async fn scan_node(&self) -> SkyResult<Vec<String>>;
    /// Names currently in the inbox. Files ending in `-QCDGRIDLOCKED` are hidden
    async fn scan_inbox(&self) -> SkyResult<Vec<String>>;
    async fn ping(&self) -> SkyResult<()>;
    async fn housekeeping(&self) -> SkyResult<()>;
    async fn copy_from_inbox(&self, inbox_name: &str, dest_path: &str) -> SkyResult<()>;

    // -- asynchronous transfers --
    async fn start_get_transfer(&self, remote_path: &str, local_path: &str) -> SkyResult<TransferHandle>;
    async fn start_put_transfer(&self, local_path: &str, remote_path: &str) -> SkyResult<TransferHandle>;
    async fn start_copy_to_inbox(&self, local_path: &str, inbox_name: &str) -> SkyResult<TransferHandle>;
    async fn monitor_transfer(&self, handle: TransferHandle) -> SkyResult<(TransferStatus, u8)>;
    async fn end_transfer(&self, handle: TransferHandle) -> SkyResult<()>;
    async fn cancel_transfer(&self, handle: TransferHandle) -> SkyResult<()>;

    /// A discriminated tag for per-driver features, consulted instead of any
    /// per-driver inheritance hierarchy
    fn capabilities(&self) -> DriverCapabilities;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DriverCapabilities {
    pub supports_add_scan: bool,
    pub has_inbox: bool,
    pub gpfs: bool,
}

/// Keyed by node name, one driver instance per storage element: a driver instance is
/// bound to a single SE's root and inbox (`scan_node`/`scan_inbox`/`ping` all read
/// through that binding), so two nodes that happen to share a `driverKind` still get
/// independent instances. `driverKind` only selects which driver *implementation* to
/// construct at registration time, never which instance to route a call to
#[derive(Default, Clone)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn StorageDriver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, node_name: impl Into<String>, driver: Arc<dyn StorageDriver>) {
        self.drivers.insert(node_name.into(), driver);
    }

    pub fn get(&self, node_name: &str) -> Option<Arc<dyn StorageDriver>> {
        self.drivers.get(node_name).cloned()
    }
}
