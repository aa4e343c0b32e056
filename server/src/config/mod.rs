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

//! Layered configuration: compiled defaults, an optional YAML file, `QCDGRID_*`
//! environment variables and CLI flags, applied in that order so each later source
//! only overrides the keys it actually sets

mod cfgcli;
mod cfgenv;
mod cfgfile;
mod definitions;
mod feedback;
#[cfg(test)]
mod tests;

use self::feedback::{ErrorStack, WarningStack};
#[cfg(unix)]
use crate::util::os::ResourceLimit;
pub use cfgcli::{CliArgs, Command};
pub use definitions::*;
pub use feedback::ConfigError;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

type StaticStr = &'static str;

/// Accumulates a [`GridConfig`] plus any errors/warnings produced while layering a
/// single configuration source onto it
pub struct Configset {
    did_mutate: bool,
    cfg: GridConfig,
    estack: ErrorStack,
    wstack: WarningStack,
}

impl Configset {
    fn new(source: StaticStr, cfg: GridConfig) -> Self {
        Self {
            did_mutate: false,
            cfg,
            estack: ErrorStack::new(source),
            wstack: WarningStack::new(source),
        }
    }
    pub fn new_defaults(working_dir: PathBuf) -> Self {
        Self::new("Compiled defaults", GridConfig::default_with_working_dir(working_dir))
    }
    pub fn new_env(base: GridConfig) -> Self {
        Self::new("Environment", base)
    }
    pub fn new_cli(base: GridConfig) -> Self {
        Self::new("CLI arguments", base)
    }
    pub fn new_file(base: GridConfig) -> Self {
        Self::new("Configuration file", base)
    }
    fn mutated(&mut self) {
        self.did_mutate = true;
    }
    fn epush(&mut self, field_key: StaticStr, expected: StaticStr) {
        self.estack
            .push(format!("Bad value for `{field_key}`. Expected {expected}"));
    }
    pub fn is_okay(&self) -> bool {
        self.estack.is_empty()
    }
    pub fn is_mutated(&self) -> bool {
        self.did_mutate
    }
    pub fn into_parts(self) -> (GridConfig, ErrorStack, WarningStack) {
        (self.cfg, self.estack, self.wstack)
    }
    /// Parse `raw` into `T` using `parser`, pushing a diagnostic under `key` on failure.
    /// Returns `None` both when `raw` is absent and when it failed to parse
    fn parse_opt<T>(
        &mut self,
        raw: Option<String>,
        key: StaticStr,
        expected: StaticStr,
        parser: impl FnOnce(&str) -> Option<T>,
    ) -> Option<T> {
        match raw {
            None => None,
            Some(s) => match parser(&s) {
                Some(v) => {
                    self.mutated();
                    Some(v)
                }
                None => {
                    self.epush(key, expected);
                    None
                }
            },
        }
    }
}

// server settings
impl Configset {
    pub fn storage_settings(&mut self, working_dir: Option<String>, tmp_dir: Option<String>) {
        if let Some(v) = self.parse_opt(working_dir, "working_dir", "a filesystem path", |s| {
            Some(PathBuf::from(s))
        }) {
            self.cfg.working_dir = v;
        }
        if let Some(v) = self.parse_opt(tmp_dir, "tmp_dir", "a filesystem path", |s| Some(PathBuf::from(s))) {
            self.cfg.tmp_dir = v;
        }
    }
    pub fn server_tcp(&mut self, host: Option<String>, port: Option<String>) {
        if let Some(v) = self.parse_opt(host, "host", "an IPv4/IPv6 address", |s| s.parse::<IpAddr>().ok()) {
            self.cfg.host = v;
        }
        if let Some(v) = self.parse_opt(port, "port", "a 16-bit positive integer", |s| s.parse::<u16>().ok()) {
            self.cfg.port = v;
        }
    }
    pub fn server_maxcon(&mut self, maxcon: Option<String>) {
        if let Some(v) = self.parse_opt(maxcon, "maxcon", "a positive integer greater than zero", |s| {
            s.parse::<usize>().ok().filter(|v| *v > 0)
        }) {
            self.cfg.maxcon = v;
        }
    }
}

// TLS settings
impl Configset {
    pub fn tls_settings(
        &mut self,
        key: Option<String>,
        chain: Option<String>,
        ca_file: Option<String>,
        passfile: Option<String>,
    ) {
        if let Some(v) = self.parse_opt(key, "tls.key", "path to private key file", |s| Some(PathBuf::from(s))) {
            self.cfg.tls.key = v;
        }
        if let Some(v) = self.parse_opt(chain, "tls.chain", "path to certificate chain file", |s| {
            Some(PathBuf::from(s))
        }) {
            self.cfg.tls.chain = v;
        }
        if let Some(v) = self.parse_opt(ca_file, "tls.ca_file", "path to client CA bundle", |s| {
            Some(PathBuf::from(s))
        }) {
            self.cfg.tls.ca_file = v;
        }
        if let Some(v) = self.parse_opt(passfile, "tls.passfile", "path to private key passphrase file", |s| {
            Some(PathBuf::from(s))
        }) {
            self.cfg.tls.passfile = Some(v);
        }
    }
}

// sweep settings
impl Configset {
    pub fn sweep_settings(
        &mut self,
        interval: Option<String>,
        files_per_iteration: Option<String>,
        count_per_iteration: Option<String>,
        checksums_per_iteration: Option<String>,
        new_check_frequency: Option<String>,
    ) {
        if let Some(v) = self.parse_opt(interval, "sweep.interval", "a positive integer of seconds", |s| {
            s.parse::<u64>().ok().filter(|v| *v > 0)
        }) {
            self.cfg.sweep_interval = v;
        }
        if let Some(v) = self.parse_opt(
            files_per_iteration,
            "sweep.files_per_iteration",
            "a positive integer",
            |s| s.parse::<usize>().ok().filter(|v| *v > 0),
        ) {
            self.cfg.files_per_iteration = v;
        }
        if let Some(v) = self.parse_opt(
            count_per_iteration,
            "sweep.count_per_iteration",
            "a positive integer",
            |s| s.parse::<usize>().ok().filter(|v| *v > 0),
        ) {
            self.cfg.count_per_iteration = v;
        }
        if let Some(v) = self.parse_opt(
            checksums_per_iteration,
            "sweep.checksums_per_iteration",
            "a positive integer",
            |s| s.parse::<usize>().ok().filter(|v| *v > 0),
        ) {
            self.cfg.checksums_per_iteration = v;
        }
        if let Some(v) = self.parse_opt(
            new_check_frequency,
            "sweep.new_check_frequency",
            "a positive integer",
            |s| s.parse::<u32>().ok().filter(|v| *v > 0),
        ) {
            self.cfg.new_check_frequency = v;
        }
    }
    pub fn disk_threshold_settings(&mut self, low: Option<String>, panic: Option<String>) {
        if let Some(v) = self.parse_opt(low, "sweep.disk_space_low", "a fraction between 0 and 1", |s| {
            s.parse::<f64>().ok().filter(|v| (0.0..1.0).contains(v))
        }) {
            self.cfg.disk_space_low = v;
        }
        if let Some(v) = self.parse_opt(panic, "sweep.disk_space_panic", "a fraction between 0 and 1", |s| {
            s.parse::<f64>().ok().filter(|v| (0.0..1.0).contains(v))
        }) {
            self.cfg.disk_space_panic = v;
        }
        if self.cfg.disk_space_panic > self.cfg.disk_space_low {
            self.wstack.push(
                "`disk_space_panic` is greater than `disk_space_low`; the panic threshold should usually be the tighter one",
            );
        }
    }
}

// replication settings
impl Configset {
    pub fn replication_settings(&mut self, default_replcount: Option<String>) {
        if let Some(v) = self.parse_opt(
            default_replcount,
            "replication.default_replcount",
            "a positive integer",
            |s| s.parse::<usize>().ok().filter(|v| *v > 0),
        ) {
            self.cfg.default_replcount = v;
        }
    }
}

// auth settings
impl Configset {
    pub fn auth_settings(
        &mut self,
        admin_group: Option<String>,
        allowed_publisher_groups: Option<String>,
        group_mapfile: Option<String>,
        group_mode: Option<String>,
    ) {
        if let Some(v) = self.parse_opt(admin_group, "auth.admin_group", "a group name", |s| {
            Some(s.to_owned())
        }) {
            self.cfg.admin_group = v;
        }
        if let Some(v) = self.parse_opt(
            allowed_publisher_groups,
            "auth.allowed_publisher_groups",
            "a comma-separated list of group names",
            |s| Some(s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()),
        ) {
            self.cfg.allowed_publisher_groups = v;
        }
        if let Some(v) = self.parse_opt(group_mapfile, "auth.group_mapfile", "a filesystem path", |s| {
            Some(PathBuf::from(s))
        }) {
            self.cfg.group_mapfile = v;
        }
        if let Some(v) = self.parse_opt(group_mode, "auth.group_mode", "`true` or `false`", |s| {
            s.parse::<bool>().ok()
        }) {
            self.cfg.group_mode = v;
        }
    }
}

// notification settings
impl Configset {
    pub fn notify_settings(&mut self, address: Option<String>) {
        if let Some(v) = self.parse_opt(address, "notify.address", "an address string", |s| Some(s.to_owned())) {
            self.cfg.notify_address = v;
        }
    }
}

/// Apply the typed YAML file representation directly onto a configset. Unlike the
/// string-keyed env/CLI layers, the file's values are already typed by serde, so there's
/// no parsing to fail
fn apply_file(set: &mut Configset, file: cfgfile::Config) {
    if let Some(server) = file.server {
        if let Some(v) = server.working_dir {
            set.cfg.working_dir = v;
            set.mutated();
        }
        if let Some(v) = server.tmp_dir {
            set.cfg.tmp_dir = v;
            set.mutated();
        }
        if let Some(v) = server.host {
            set.cfg.host = v;
            set.mutated();
        }
        if let Some(v) = server.port {
            set.cfg.port = v;
            set.mutated();
        }
        if let Some(v) = server.maxcon {
            set.cfg.maxcon = v;
            set.mutated();
        }
    }
    if let Some(tls) = file.tls {
        set.cfg.tls = TlsOpts::new(tls.key, tls.chain, tls.ca_file, tls.passfile);
        set.mutated();
    }
    if let Some(sweep) = file.sweep {
        if let Some(v) = sweep.interval {
            set.cfg.sweep_interval = v;
            set.mutated();
        }
        if let Some(v) = sweep.files_per_iteration {
            set.cfg.files_per_iteration = v;
            set.mutated();
        }
        if let Some(v) = sweep.count_per_iteration {
            set.cfg.count_per_iteration = v;
            set.mutated();
        }
        if let Some(v) = sweep.checksums_per_iteration {
            set.cfg.checksums_per_iteration = v;
            set.mutated();
        }
        if let Some(v) = sweep.new_check_frequency {
            set.cfg.new_check_frequency = v;
            set.mutated();
        }
        if let Some(v) = sweep.disk_space_low {
            set.cfg.disk_space_low = v;
            set.mutated();
        }
        if let Some(v) = sweep.disk_space_panic {
            set.cfg.disk_space_panic = v;
            set.mutated();
        }
    }
    if let Some(repl) = file.replication {
        if let Some(v) = repl.default_replcount {
            set.cfg.default_replcount = v;
            set.mutated();
        }
    }
    if let Some(auth) = file.auth {
        if let Some(v) = auth.admin_group {
            set.cfg.admin_group = v;
            set.mutated();
        }
        if let Some(v) = auth.allowed_publisher_groups {
            set.cfg.allowed_publisher_groups = v;
            set.mutated();
        }
        if let Some(v) = auth.group_mapfile {
            set.cfg.group_mapfile = v;
            set.mutated();
        }
        if let Some(v) = auth.group_mode {
            set.cfg.group_mode = v;
            set.mutated();
        }
    }
    if let Some(notify) = file.notify {
        if let Some(v) = notify.address {
            set.cfg.notify_address = v;
            set.mutated();
        }
    }
}

fn load_file(path: &Path) -> Result<cfgfile::Config, ConfigError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&raw)?)
}

/// Resolve the final [`GridConfig`] by layering, in increasing precedence: compiled
/// defaults, an optional YAML file, `QCDGRID_*` environment variables, then CLI flags.
/// `cli` has already been parsed by `clap`; `working_dir_hint` seeds the defaults before
/// any layer has had a chance to relocate the working directory
pub fn get_config(cli: CliArgs, working_dir_hint: PathBuf) -> Result<(GridConfig, WarningStack), ConfigError> {
    let mut set = Configset::new_defaults(working_dir_hint);

    if let Some(path) = cli.config_file.clone() {
        let file = load_file(&path)?;
        apply_file(&mut set, file);
    }

    let env_set = cfgenv::parse_env_config(set.cfg);
    let (env_cfg, env_estack, env_wstack) = env_set.into_parts();
    if !env_estack.is_empty() {
        return Err(ConfigError::CfgError(env_estack));
    }
    set.cfg = env_cfg;
    for w in env_wstack.iter() {
        set.wstack.push(w.clone());
    }

    let cli_set = cfgcli::parse_cli_args(cli, set.cfg);
    let (final_cfg, cli_estack, cli_wstack) = cli_set.into_parts();
    if !cli_estack.is_empty() {
        return Err(ConfigError::CfgError(cli_estack));
    }
    set.cfg = final_cfg;
    for w in cli_wstack.iter() {
        set.wstack.push(w.clone());
    }

    #[cfg(unix)]
    if let Ok(limit) = ResourceLimit::get() {
        if limit.is_over_limit(set.cfg.maxcon) {
            return Err(ConfigError::MaxconExceedsUlimit { maxcon: set.cfg.maxcon });
        }
    }

    Ok((set.cfg, set.wstack))
}
