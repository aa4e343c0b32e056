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

//! The on-disk YAML representation of a [`GridConfig`](super::GridConfig). Every key is
//! optional: a file that only overrides `server.port` is valid, and every other field
//! keeps whatever the next-lower precedence layer set it to

use serde::Deserialize;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Deserialize, Debug, PartialEq, Default)]
pub struct Config {
    pub server: Option<ConfigKeyServer>,
    pub tls: Option<ConfigKeyTls>,
    pub sweep: Option<ConfigKeySweep>,
    pub replication: Option<ConfigKeyReplication>,
    pub auth: Option<ConfigKeyAuth>,
    pub notify: Option<ConfigKeyNotify>,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct ConfigKeyServer {
    pub working_dir: Option<PathBuf>,
    pub tmp_dir: Option<PathBuf>,
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
    pub maxcon: Option<usize>,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct ConfigKeyTls {
    pub key: PathBuf,
    pub chain: PathBuf,
    pub ca_file: PathBuf,
    pub passfile: Option<PathBuf>,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct ConfigKeySweep {
    pub interval: Option<u64>,
    pub files_per_iteration: Option<usize>,
    pub count_per_iteration: Option<usize>,
    pub checksums_per_iteration: Option<usize>,
    pub new_check_frequency: Option<u32>,
    pub disk_space_low: Option<f64>,
    pub disk_space_panic: Option<f64>,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct ConfigKeyReplication {
    pub default_replcount: Option<usize>,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct ConfigKeyAuth {
    pub admin_group: Option<String>,
    pub allowed_publisher_groups: Option<Vec<String>>,
    pub group_mapfile: Option<PathBuf>,
    pub group_mode: Option<bool>,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct ConfigKeyNotify {
    pub address: Option<String>,
}
