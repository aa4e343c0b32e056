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

//! CLI flags, the highest-precedence configuration source. Every flag is optional: the
//! flag is only applied if the operator actually passed it

use super::{Configset, GridConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Operator-invoked maintenance actions that bypass the sweep loop entirely
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Reconcile one node's catalogue entries against what is actually on disk
    Verify {
        /// Name of the node to verify, as it appears in the node table
        host: String,
        /// Apply every default resolution without prompting on a terminal
        #[arg(long)]
        forced_default: bool,
    },
}

#[derive(Parser, Debug, Clone)]
#[command(name = "digsd", about = "Wide-area data grid control-plane node")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Command>,
    /// Path to a YAML configuration file
    #[arg(short = 'c', long = "config")]
    pub config_file: Option<PathBuf>,
    /// Directory holding catalogue/node/journal state
    #[arg(long)]
    pub working_dir: Option<String>,
    /// Scratch directory for replica transfers, checked for free space before a
    /// replication job is enqueued
    #[arg(long)]
    pub tmp_dir: Option<String>,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<String>,
    #[arg(long)]
    pub maxcon: Option<String>,
    #[arg(long)]
    pub tls_key: Option<String>,
    #[arg(long)]
    pub tls_chain: Option<String>,
    #[arg(long)]
    pub tls_ca: Option<String>,
    #[arg(long)]
    pub tls_passfile: Option<String>,
    #[arg(long)]
    pub sweep_interval: Option<String>,
    #[arg(long)]
    pub files_per_iteration: Option<String>,
    #[arg(long)]
    pub count_per_iteration: Option<String>,
    #[arg(long)]
    pub checksums_per_iteration: Option<String>,
    #[arg(long)]
    pub new_check_frequency: Option<String>,
    #[arg(long)]
    pub disk_space_low: Option<String>,
    #[arg(long)]
    pub disk_space_panic: Option<String>,
    #[arg(long)]
    pub default_replcount: Option<String>,
    #[arg(long)]
    pub admin_group: Option<String>,
    #[arg(long)]
    pub allowed_publisher_groups: Option<String>,
    #[arg(long)]
    pub group_mapfile: Option<String>,
    #[arg(long)]
    pub group_mode: Option<String>,
    #[arg(long)]
    pub notify_address: Option<String>,
}

pub(super) fn parse_cli_args(cli: CliArgs, base: GridConfig) -> Configset {
    let mut set = Configset::new_cli(base);
    set.storage_settings(cli.working_dir, cli.tmp_dir);
    set.server_tcp(cli.host, cli.port);
    set.server_maxcon(cli.maxcon);
    set.tls_settings(cli.tls_key, cli.tls_chain, cli.tls_ca, cli.tls_passfile);
    set.sweep_settings(
        cli.sweep_interval,
        cli.files_per_iteration,
        cli.count_per_iteration,
        cli.checksums_per_iteration,
        cli.new_check_frequency,
    );
    set.disk_threshold_settings(cli.disk_space_low, cli.disk_space_panic);
    set.replication_settings(cli.default_replcount);
    set.auth_settings(
        cli.admin_group,
        cli.allowed_publisher_groups,
        cli.group_mapfile,
        cli.group_mode,
    );
    set.notify_settings(cli.notify_address);
    set
}
