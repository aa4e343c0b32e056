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

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

pub const DEFAULT_IPV4: IpAddr = IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0));
pub const DEFAULT_PORT: u16 = 51000;
pub const DEFAULT_MAXCON: usize = 512;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_FILES_PER_ITERATION: usize = 200;
pub const DEFAULT_COUNT_PER_ITERATION: usize = 50;
pub const DEFAULT_CHECKSUMS_PER_ITERATION: usize = 20;
pub const DEFAULT_DISK_SPACE_LOW: f64 = 0.10;
pub const DEFAULT_DISK_SPACE_PANIC: f64 = 0.03;
pub const DEFAULT_REPLCOUNT: usize = 2;
pub const DEFAULT_ADMIN_GROUP: &str = "grid-admin";
pub const DEFAULT_GROUP_MODE: bool = false;
pub const DEFAULT_NEW_CHECK_FREQUENCY: u32 = 5;

/// TLS material for the mutual-TLS listener: a server certificate chain and key, plus
/// the CA bundle used to verify client certificates
#[derive(Debug, PartialEq, Clone)]
pub struct TlsOpts {
    pub key: PathBuf,
    pub chain: PathBuf,
    pub ca_file: PathBuf,
    pub passfile: Option<PathBuf>,
}

impl TlsOpts {
    pub const fn new(key: PathBuf, chain: PathBuf, ca_file: PathBuf, passfile: Option<PathBuf>) -> Self {
        Self {
            key,
            chain,
            ca_file,
            passfile,
        }
    }
}

/// The fully resolved configuration for a control-plane node, after layering compiled
/// defaults, an optional YAML file, environment variables and CLI flags
#[derive(Debug, PartialEq, Clone)]
pub struct GridConfig {
    /// Directory holding the catalogue dump, node lists, pending-operation journals and
    /// sweep cursor state
    pub working_dir: PathBuf,
    /// Scratch directory for the get-then-put leg of a replica transfer. The file
    /// sweep checks free space here before enqueueing a replication, not on `working_dir`
    pub tmp_dir: PathBuf,
    /// Listen address for the control connection
    pub host: IpAddr,
    pub port: u16,
    /// Maximum number of concurrently accepted connections
    pub maxcon: usize,
    /// TLS material. A node cannot start without it: the transport is mutual TLS always
    pub tls: TlsOpts,
    /// How often the background sweep loop runs, in seconds
    pub sweep_interval: u64,
    /// Number of catalogue entries to examine per sweep iteration when looking for
    /// under-replicated files
    pub files_per_iteration: usize,
    /// Number of pending-delete/space-reclamation entries to process per sweep iteration
    pub count_per_iteration: usize,
    /// Number of files to checksum-verify per sweep iteration
    pub checksums_per_iteration: usize,
    /// Inbox promotion normally only scans nodes on the check list; every Nth sweep
    /// it scans every node instead, so a file can't get stranded on a node nobody
    /// `check`ed
    pub new_check_frequency: u32,
    /// Fraction of a disk's capacity below which new replicas stop being placed there
    pub disk_space_low: f64,
    /// Fraction of a disk's capacity below which the node is disabled and an alert is sent
    pub disk_space_panic: f64,
    /// Default replica count for newly submitted files that don't specify one
    pub default_replcount: usize,
    /// Group name whose members may run administrative commands
    pub admin_group: String,
    /// Groups whose members are allowed to publish new files
    pub allowed_publisher_groups: Vec<String>,
    /// When set, `delete`/`modify`/`replcount` authorize on owning-group membership
    /// instead of matching the original submitter
    pub group_mode: bool,
    /// Address notifications (dead nodes, low disk space, checksum mismatches) are sent to
    pub notify_address: String,
    /// Path to the DN-to-group mapping file consumed by the authorization layer
    pub group_mapfile: PathBuf,
}

impl GridConfig {
    pub fn default_with_working_dir(working_dir: PathBuf) -> Self {
        Self {
            working_dir: working_dir.clone(),
            tmp_dir: std::env::temp_dir(),
            host: DEFAULT_IPV4,
            port: DEFAULT_PORT,
            maxcon: DEFAULT_MAXCON,
            tls: TlsOpts::new(
                working_dir.join("tls/key.pem"),
                working_dir.join("tls/chain.pem"),
                working_dir.join("tls/ca.pem"),
                None,
            ),
            sweep_interval: DEFAULT_SWEEP_INTERVAL_SECS,
            files_per_iteration: DEFAULT_FILES_PER_ITERATION,
            count_per_iteration: DEFAULT_COUNT_PER_ITERATION,
            checksums_per_iteration: DEFAULT_CHECKSUMS_PER_ITERATION,
            new_check_frequency: DEFAULT_NEW_CHECK_FREQUENCY,
            disk_space_low: DEFAULT_DISK_SPACE_LOW,
            disk_space_panic: DEFAULT_DISK_SPACE_PANIC,
            default_replcount: DEFAULT_REPLCOUNT,
            admin_group: DEFAULT_ADMIN_GROUP.to_owned(),
            allowed_publisher_groups: Vec::new(),
            group_mode: DEFAULT_GROUP_MODE,
            notify_address: String::new(),
            group_mapfile: working_dir.join("groupmap.conf"),
        }
    }
}
