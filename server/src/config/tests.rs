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

use super::{Configset, DEFAULT_PORT};
use std::path::PathBuf;

fn wd() -> PathBuf {
    std::env::temp_dir().join(format!("digs-cfg-test-{}", std::process::id()))
}

#[test]
fn defaults_have_no_errors_and_standard_port() {
    let set = Configset::new_defaults(wd());
    assert!(set.is_okay());
    assert_eq!(set.cfg.port, DEFAULT_PORT);
    assert!(!set.is_mutated());
}

#[test]
fn server_tcp_parses_valid_values() {
    let mut set = Configset::new_defaults(wd());
    set.server_tcp(Some("10.0.0.1".to_owned()), Some("51001".to_owned()));
    assert!(set.is_okay());
    assert!(set.is_mutated());
    assert_eq!(set.cfg.port, 51001);
}

#[test]
fn server_tcp_rejects_bad_port() {
    let mut set = Configset::new_defaults(wd());
    set.server_tcp(None, Some("not-a-port".to_owned()));
    assert!(!set.is_okay());
}

#[test]
fn maxcon_zero_is_rejected() {
    let mut set = Configset::new_defaults(wd());
    set.server_maxcon(Some("0".to_owned()));
    assert!(!set.is_okay());
}

#[test]
fn disk_threshold_warns_when_panic_above_low() {
    let mut set = Configset::new_defaults(wd());
    set.disk_threshold_settings(Some("0.05".to_owned()), Some("0.20".to_owned()));
    assert!(set.is_okay());
    assert!(!set.wstack.is_empty());
}

#[test]
fn auth_settings_parses_group_list() {
    let mut set = Configset::new_defaults(wd());
    set.auth_settings(
        Some("grid-admin".to_owned()),
        Some("physics, biology,chemistry".to_owned()),
        None,
        None,
    );
    assert!(set.is_okay());
    assert_eq!(
        set.cfg.allowed_publisher_groups,
        vec!["physics".to_owned(), "biology".to_owned(), "chemistry".to_owned()]
    );
}

#[test]
fn auth_settings_parses_group_mode() {
    let mut set = Configset::new_defaults(wd());
    assert!(!set.cfg.group_mode);
    set.auth_settings(None, None, None, Some("true".to_owned()));
    assert!(set.is_okay());
    assert!(set.cfg.group_mode);
}

#[test]
fn auth_settings_rejects_bad_group_mode() {
    let mut set = Configset::new_defaults(wd());
    set.auth_settings(None, None, None, Some("sometimes".to_owned()));
    assert!(!set.is_okay());
}

#[test]
fn yaml_file_layer_overrides_only_named_keys() {
    let yaml = "server:\n  port: 51010\n";
    let file: super::cfgfile::Config = serde_yaml::from_str(yaml).unwrap();
    let mut set = Configset::new_defaults(wd());
    super::apply_file(&mut set, file);
    assert_eq!(set.cfg.port, 51010);
    assert_eq!(set.cfg.host, super::DEFAULT_IPV4);
}
