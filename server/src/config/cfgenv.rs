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

//! `QCDGRID_*` environment variables, layered above the compiled defaults and the YAML
//! file but below CLI flags

use super::{Configset, GridConfig};
use std::env;

fn var(name: &str) -> Option<String> {
    env::var(name).ok()
}

pub(super) fn parse_env_config(base: GridConfig) -> Configset {
    let mut set = Configset::new_env(base);
    set.storage_settings(var("QCDGRID_WORKING_DIR"), var("QCDGRID_TMP_DIR"));
    set.server_tcp(var("QCDGRID_HOST"), var("QCDGRID_PORT"));
    set.server_maxcon(var("QCDGRID_MAXCON"));
    set.tls_settings(
        var("QCDGRID_TLS_KEY"),
        var("QCDGRID_TLS_CHAIN"),
        var("QCDGRID_TLS_CA"),
        var("QCDGRID_TLS_PASSFILE"),
    );
    set.sweep_settings(
        var("QCDGRID_SWEEP_INTERVAL"),
        var("QCDGRID_FILES_PER_ITERATION"),
        var("QCDGRID_COUNT_PER_ITERATION"),
        var("QCDGRID_CHECKSUMS_PER_ITERATION"),
        var("QCDGRID_NEW_CHECK_FREQUENCY"),
    );
    set.disk_threshold_settings(var("QCDGRID_DISK_SPACE_LOW"), var("QCDGRID_DISK_SPACE_PANIC"));
    set.replication_settings(var("QCDGRID_DEFAULT_REPLCOUNT"));
    set.auth_settings(
        var("QCDGRID_ADMIN_GROUP"),
        var("QCDGRID_ALLOWED_PUBLISHER_GROUPS"),
        var("QCDGRID_GROUP_MAPFILE"),
        var("QCDGRID_GROUP_MODE"),
    );
    set.notify_settings(var("QCDGRID_NOTIFY_ADDRESS"));
    set
}
