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

//! Command dispatch: every accepted request is drained from the queue on the main
//! loop thread and handled here, against the catalogue and the pending-op journals.
//! Authorization runs here too, not on the accept thread, because the predicates in
//! [`crate::auth::AuthContext`] need facts (submitter, group, lock owner) that only
//! the main loop can fetch without racing a concurrent mutation

use crate::auth::AuthContext;
use crate::catalogue::attr;
use crate::config::GridConfig;
use crate::dbnet::{
    pad_response, IncomingRequest, ParsedCommand, RESPONSE_WIDTH, RESP_BAD_COMMAND,
    RESP_INSUFFICIENT_PRIVILEGES, RESP_INTERNAL_ERROR, RESP_NOT_FOUND, RESP_OK,
};
use crate::nodes::Node;
use crate::pending::adds::PendingAdd;
use crate::pending::newmods::NewModification;
use crate::pending::permissions::PendingPermissionChange;
use crate::replication::ReplicationReason;
use crate::state::ControlState;

/// Drain and handle every request currently sitting in the queue, the first step of
/// every sweep. Never blocks: `try_recv` stops as soon as the channel is empty
pub async fn drain_queue(state: &ControlState, cfg: &GridConfig, rx: &mut tokio::sync::mpsc::Receiver<IncomingRequest>) {
    while let Ok(request) = rx.try_recv() {
        let response = handle(state, cfg, &request.command, &request.sender_dn).await;
        let _ = request.reply.send(response);
    }
}

async fn lfn_facts(state: &ControlState, lfn: &str) -> (String, String, Option<String>) {
    let submitter = state
        .catalogue
        .get_attr(lfn, attr::SUBMITTER)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();
    let group = state
        .catalogue
        .get_attr(lfn, attr::GROUP)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();
    let locked_by = state.catalogue.get_attr(lfn, attr::LOCKEDBY).await.ok().flatten();
    (submitter, group, locked_by)
}

fn has_pending_mod(state: &ControlState, lfn: &str) -> bool {
    state.pending_mods.lock().has_pending_for_lfn(lfn)
}

async fn handle(state: &ControlState, cfg: &GridConfig, command: &ParsedCommand, sender_dn: &str) -> [u8; RESPONSE_WIDTH] {
    let auth = AuthContext::new(
        sender_dn,
        &state.group_map,
        &cfg.admin_group,
        &cfg.allowed_publisher_groups,
        cfg.group_mode,
    );
    let result = match command.name.as_str() {
        "ping" => Ok(RESP_OK.to_owned()),
        "add" => cmd_add(state, &auth, command).await,
        "touch" | "touchdir" => cmd_touch(state, &command.name, command).await,
        "check" => cmd_check(state, command).await,
        "remove" | "disable" | "enable" | "retire" | "unretire" => {
            cmd_node_lifecycle(state, &auth, &command.name, command).await
        }
        "delete" => cmd_delete(state, &auth, &command.args[0]).await,
        "rmdir" => cmd_rmdir(state, &auth, &command.args[0]).await,
        "putFile" => cmd_put_file(state, &auth, command).await,
        "chmod" => cmd_chmod(state, &auth, command).await,
        "lock" | "unlock" => cmd_lock(state, &auth, &command.name, &command.args[0]).await,
        "lockdir" | "unlockdir" => cmd_lockdir(state, &auth, &command.name, &command.args[0]).await,
        "replcount" | "replcountdir" => cmd_replcount(state, &auth, &command.name, command).await,
        "modify" => cmd_modify(state, &auth, command).await,
        _ => Err(RESP_BAD_COMMAND.to_owned()),
    };
    match result {
        Ok(msg) => pad_response(&msg),
        Err(msg) => pad_response(&msg),
    }
}

/// Admin-only: register a new storage node. The grid learns about files that land
/// on it later, through inbox promotion, not through this message
async fn cmd_add(state: &ControlState, auth: &AuthContext<'_>, command: &ParsedCommand) -> Result<String, String> {
    if !auth.authorize_admin_only() {
        return Err(RESP_INSUFFICIENT_PRIVILEGES.to_owned());
    }
    let [name, site, path] = &command.args[..] else {
        return Err(RESP_BAD_COMMAND.to_owned());
    };
    state.nodes.lock().add(Node::new(name, site, path));
    Ok(RESP_OK.to_owned())
}

/// `touch`/`touchdir`: the submitter wants a replica of `target` at `dest`. If it's
/// already there this is a no-op; otherwise a live source is picked and a
/// `Requested` replication is enqueued so the next sweep carries it across
async fn cmd_touch(state: &ControlState, action: &str, command: &ParsedCommand) -> Result<String, String> {
    let [target, dest] = &command.args[..] else {
        return Err(RESP_BAD_COMMAND.to_owned());
    };
    if state.nodes.lock().by_name(dest).is_none() {
        return Err(RESP_NOT_FOUND.to_owned());
    }
    let lfns: Vec<String> = if action == "touchdir" {
        let pattern = format!("{}*", target.trim_end_matches('*'));
        state
            .catalogue
            .list_files(&pattern)
            .await
            .map_err(|_| RESP_INTERNAL_ERROR.to_owned())?
            .into_iter()
            .map(|e| e.lfn)
            .collect()
    } else {
        vec![target.clone()]
    };
    for lfn in lfns {
        want_file_at(state, &lfn, dest).await?;
    }
    Ok(RESP_OK.to_owned())
}

/// `iLikeThisFile`/`touchDirectory`: if `lfn` isn't already at `dest`, find a live
/// replica elsewhere and enqueue a requested transfer
async fn want_file_at(state: &ControlState, lfn: &str, dest: &str) -> Result<(), String> {
    let locations = state
        .catalogue
        .locations_of(lfn, true)
        .await
        .map_err(|_| RESP_INTERNAL_ERROR.to_owned())?;
    if locations.is_empty() {
        return Err(RESP_NOT_FOUND.to_owned());
    }
    if locations.iter().any(|h| h == dest) {
        return Ok(());
    }
    let replcount: usize = state
        .catalogue
        .get_attr(lfn, attr::REPLCOUNT)
        .await
        .ok()
        .flatten()
        .and_then(|s| s.parse().ok())
        .unwrap_or(locations.len());
    let source = {
        let nodes = state.nodes.lock();
        locations
            .iter()
            .find(|h| {
                nodes
                    .by_name(h)
                    .map(|i| !nodes.is_dead(i) && !nodes.is_disabled(i))
                    .unwrap_or(false)
            })
            .cloned()
    };
    let Some(source) = source else {
        return Err(RESP_NOT_FOUND.to_owned());
    };
    state
        .replication
        .lock()
        .enqueue(lfn, &source, dest, replcount, ReplicationReason::Requested);
    Ok(())
}

/// `check`: add a node to the check list consulted by the next inbox-promotion pass
async fn cmd_check(state: &ControlState, command: &ParsedCommand) -> Result<String, String> {
    let name = command.args.first().map(String::as_str).unwrap_or("");
    if state.nodes.lock().by_name(name).is_none() {
        return Err(RESP_NOT_FOUND.to_owned());
    }
    state.check_list.lock().insert(name.to_owned());
    Ok(RESP_OK.to_owned())
}

async fn cmd_node_lifecycle(
    state: &ControlState,
    auth: &AuthContext<'_>,
    action: &str,
    command: &ParsedCommand,
) -> Result<String, String> {
    if !auth.authorize_admin_only() {
        return Err(RESP_INSUFFICIENT_PRIVILEGES.to_owned());
    }
    let name = &command.args[0];
    if action == "remove" {
        let exists = state.nodes.lock().by_name(name).is_some();
        if !exists {
            return Err(RESP_NOT_FOUND.to_owned());
        }
        // catalogue entries are dropped before the node table entry itself, so a
        // crash between the two leaves a removed-but-still-catalogued host rather
        // than a phantom node with no way to clear its replicas
        state
            .catalogue
            .delete_all_at(name)
            .await
            .map_err(|_| RESP_INTERNAL_ERROR.to_owned())?;
        let mut nodes = state.nodes.lock();
        if let Some(idx) = nodes.by_name(name) {
            nodes.remove(idx);
        }
        return Ok(RESP_OK.to_owned());
    }
    let mut nodes = state.nodes.lock();
    let Some(idx) = nodes.by_name(name) else {
        return Err(RESP_NOT_FOUND.to_owned());
    };
    match action {
        "disable" => nodes.set_disabled(idx, true),
        "enable" => nodes.set_disabled(idx, false),
        "retire" => nodes.set_retiring(idx, true),
        "unretire" => nodes.set_retiring(idx, false),
        _ => unreachable!(),
    }
    Ok(RESP_OK.to_owned())
}

async fn cmd_delete(state: &ControlState, auth: &AuthContext<'_>, lfn: &str) -> Result<String, String> {
    let (submitter, group, locked_by) = lfn_facts(state, lfn).await;
    if !auth.authorize_delete(&submitter, &group, locked_by.as_deref()) {
        return Err(RESP_INSUFFICIENT_PRIVILEGES.to_owned());
    }
    let hosts = state
        .catalogue
        .locations_of(lfn, true)
        .await
        .map_err(|_| RESP_INTERNAL_ERROR.to_owned())?;
    for host in hosts {
        if let Some(dir) = state.catalogue.get_attr(lfn, &attr::dir(&host)).await.ok().flatten() {
            state.pending_dels.lock().push(host.clone(), dir);
        }
        let _ = state.catalogue.delete(lfn, &host).await;
    }
    Ok(RESP_OK.to_owned())
}

/// `rmdir` has no directory-level rule of its own: it applies [`cmd_delete`]'s
/// per-file authorization to every lfn under the prefix
async fn cmd_rmdir(state: &ControlState, auth: &AuthContext<'_>, prefix: &str) -> Result<String, String> {
    let pattern = format!("{}*", prefix.trim_end_matches('*'));
    let listing = state
        .catalogue
        .list_files(&pattern)
        .await
        .map_err(|_| RESP_INTERNAL_ERROR.to_owned())?;
    for entry in listing {
        cmd_delete(state, auth, &entry.lfn).await?;
    }
    Ok(RESP_OK.to_owned())
}

async fn cmd_put_file(state: &ControlState, auth: &AuthContext<'_>, command: &ParsedCommand) -> Result<String, String> {
    let [lfn, group, perm, size, md5, timestamp, submitter] = &command.args[..] else {
        return Err(RESP_BAD_COMMAND.to_owned());
    };
    if !auth.authorize_put_file(group) {
        return Err(RESP_INSUFFICIENT_PRIVILEGES.to_owned());
    }
    let size: u64 = size.parse().map_err(|_| RESP_BAD_COMMAND.to_owned())?;
    let timestamp: i64 = timestamp.parse().unwrap_or_else(|_| unix_now());
    state.pending_adds.lock().push(PendingAdd {
        lfn: lfn.clone(),
        group: group.clone(),
        permissions: perm.clone(),
        size,
        md5: md5.clone(),
        timestamp,
        submitter: submitter.clone(),
    });
    Ok(RESP_OK.to_owned())
}

async fn cmd_chmod(state: &ControlState, auth: &AuthContext<'_>, command: &ParsedCommand) -> Result<String, String> {
    let [lfn, group, perm, recursive] = &command.args[..] else {
        return Err(RESP_BAD_COMMAND.to_owned());
    };
    if !auth.authorize_chmod(group) {
        return Err(RESP_INSUFFICIENT_PRIVILEGES.to_owned());
    }
    state.pending_permissions.lock().push(PendingPermissionChange {
        recursive: recursive == "true",
        group: group.clone(),
        lfn: lfn.clone(),
        permissions: perm.clone(),
    });
    Ok(RESP_OK.to_owned())
}

async fn cmd_lock(state: &ControlState, auth: &AuthContext<'_>, action: &str, lfn: &str) -> Result<String, String> {
    let (_, _, locked_by) = lfn_facts(state, lfn).await;
    let pending_mod = has_pending_mod(state, lfn);
    if !auth.authorize_lock(pending_mod, locked_by.as_deref()) {
        return Err(RESP_INSUFFICIENT_PRIVILEGES.to_owned());
    }
    let result = if action == "lock" {
        state.catalogue.set_attr(lfn, attr::LOCKEDBY, auth.sender_dn).await
    } else {
        state.catalogue.remove_attr(lfn, attr::LOCKEDBY).await
    };
    result.map(|_| RESP_OK.to_owned()).map_err(|_| RESP_INTERNAL_ERROR.to_owned())
}

async fn cmd_lockdir(state: &ControlState, auth: &AuthContext<'_>, action: &str, prefix: &str) -> Result<String, String> {
    let pattern = format!("{}*", prefix.trim_end_matches('*'));
    let listing = state
        .catalogue
        .list_files(&pattern)
        .await
        .map_err(|_| RESP_INTERNAL_ERROR.to_owned())?;
    let single_action = if action == "lockdir" { "lock" } else { "unlock" };
    for entry in listing {
        cmd_lock(state, auth, single_action, &entry.lfn).await?;
    }
    Ok(RESP_OK.to_owned())
}

async fn cmd_replcount(
    state: &ControlState,
    auth: &AuthContext<'_>,
    action: &str,
    command: &ParsedCommand,
) -> Result<String, String> {
    let lfn = &command.args[0];
    let count = &command.args[1];
    let pending_mod = has_pending_mod(state, lfn);
    let (submitter, group, locked_by) = lfn_facts(state, lfn).await;
    if !auth.authorize_replcount(pending_mod, &submitter, &group, locked_by.as_deref()) {
        return Err(RESP_INSUFFICIENT_PRIVILEGES.to_owned());
    }
    if action == "replcount" {
        state
            .catalogue
            .set_attr(lfn, attr::REPLCOUNT, count)
            .await
            .map_err(|_| RESP_INTERNAL_ERROR.to_owned())?;
    } else {
        let pattern = format!("{}*", lfn.trim_end_matches('*'));
        let listing = state
            .catalogue
            .list_files(&pattern)
            .await
            .map_err(|_| RESP_INTERNAL_ERROR.to_owned())?;
        for entry in listing {
            state
                .catalogue
                .set_attr(&entry.lfn, attr::REPLCOUNT, count)
                .await
                .map_err(|_| RESP_INTERNAL_ERROR.to_owned())?;
        }
    }
    Ok(RESP_OK.to_owned())
}

async fn cmd_modify(state: &ControlState, auth: &AuthContext<'_>, command: &ParsedCommand) -> Result<String, String> {
    let [lfn, host, md5, size, timestamp] = &command.args[..] else {
        return Err(RESP_BAD_COMMAND.to_owned());
    };
    let pending_mod = has_pending_mod(state, lfn);
    let (submitter, group, locked_by) = lfn_facts(state, lfn).await;
    if !auth.authorize_modify(pending_mod, &submitter, &group, locked_by.as_deref()) {
        return Err(RESP_INSUFFICIENT_PRIVILEGES.to_owned());
    }
    let size: u64 = size.parse().map_err(|_| RESP_BAD_COMMAND.to_owned())?;
    let timestamp: i64 = timestamp.parse().unwrap_or_else(|_| unix_now());
    state.new_mods.lock().push(NewModification {
        lfn: lfn.clone(),
        host: host.clone(),
        md5: md5.clone(),
        size,
        timestamp,
    });
    Ok(RESP_OK.to_owned())
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::memcat::MemCatalogue;
    use crate::catalogue::Catalogue;
    use crate::drivers::DriverRegistry;
    use crate::notify::LogNotifier;
    use crate::auth::GroupMap;
    use crate::pending::adds::PendingAddList;
    use crate::pending::dels::PendingDeleteList;
    use crate::pending::mods::PendingModificationList;
    use crate::pending::newmods::NewModificationList;
    use crate::pending::permissions::PendingPermissionList;
    use crate::replication::ReplicationQueue;
    use crate::state::SweepCursors;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn test_state() -> ControlState {
        let mut group_map = GroupMap::new();
        group_map.insert("/O=Grid/CN=Admin", vec!["grid-admin".to_owned()]);
        group_map.insert("/O=Grid/CN=Dana", vec!["physics".to_owned()]);
        ControlState {
            working_dir: PathBuf::from("/tmp"),
            nodes: Mutex::new(Default::default()),
            catalogue: Arc::new(MemCatalogue::new()),
            drivers: DriverRegistry::new(),
            pending_adds: Mutex::new(PendingAddList::new()),
            pending_dels: Mutex::new(PendingDeleteList::new()),
            pending_mods: Mutex::new(PendingModificationList::new()),
            new_mods: Mutex::new(NewModificationList::new()),
            pending_permissions: Mutex::new(PendingPermissionList::new()),
            replication: Mutex::new(ReplicationQueue::new()),
            cursors: Mutex::new(SweepCursors::default()),
            group_map,
            notifier: Arc::new(LogNotifier),
            disk_panic_notified: Mutex::new(false),
            check_list: Mutex::new(std::collections::HashSet::new()),
            sweep_iteration: Mutex::new(0),
        }
    }

    fn test_cfg() -> GridConfig {
        let mut cfg = GridConfig::default_with_working_dir(PathBuf::from("/tmp"));
        cfg.allowed_publisher_groups = vec!["physics".to_owned()];
        cfg
    }

    #[tokio::test]
    async fn ping_is_always_ok() {
        let state = test_state();
        let cfg = test_cfg();
        let command = ParsedCommand { name: "ping".to_owned(), args: vec![] };
        let resp = handle(&state, &cfg, &command, "/O=Grid/CN=Anyone").await;
        assert_eq!(&resp[..2], b"OK");
    }

    #[tokio::test]
    async fn add_requires_admin() {
        let state = test_state();
        let cfg = test_cfg();
        let command = ParsedCommand {
            name: "add".to_owned(),
            args: vec!["hostA".to_owned(), "site1".to_owned(), "/var/grid/hostA".to_owned()],
        };
        let resp = handle(&state, &cfg, &command, "/O=Grid/CN=Dana").await;
        assert_eq!(&resp[..RESP_INSUFFICIENT_PRIVILEGES.len()], RESP_INSUFFICIENT_PRIVILEGES.as_bytes());
        assert!(state.nodes.lock().by_name("hostA").is_none());
        let resp = handle(&state, &cfg, &command, "/O=Grid/CN=Admin").await;
        assert_eq!(&resp[..2], b"OK");
        assert!(state.nodes.lock().by_name("hostA").is_some());
    }

    #[tokio::test]
    async fn touch_requests_replication_from_a_live_source() {
        let state = test_state();
        let cfg = test_cfg();
        state.nodes.lock().add(crate::nodes::Node::new("hostA", "site1", "/var/grid/hostA"));
        state.nodes.lock().add(crate::nodes::Node::new("hostB", "site2", "/var/grid/hostB"));
        state.catalogue.create("u/v.dat", "hostA").await.unwrap();

        let command = ParsedCommand {
            name: "touch".to_owned(),
            args: vec!["u/v.dat".to_owned(), "hostB".to_owned()],
        };
        let resp = handle(&state, &cfg, &command, "/O=Grid/CN=Dana").await;
        assert_eq!(&resp[..2], b"OK");
        assert_eq!(state.replication.lock().len(), 1);
    }

    #[tokio::test]
    async fn touch_is_a_no_op_when_already_at_destination() {
        let state = test_state();
        let cfg = test_cfg();
        state.nodes.lock().add(crate::nodes::Node::new("hostA", "site1", "/var/grid/hostA"));
        state.catalogue.create("u/v.dat", "hostA").await.unwrap();

        let command = ParsedCommand {
            name: "touch".to_owned(),
            args: vec!["u/v.dat".to_owned(), "hostA".to_owned()],
        };
        let resp = handle(&state, &cfg, &command, "/O=Grid/CN=Dana").await;
        assert_eq!(&resp[..2], b"OK");
        assert!(state.replication.lock().is_empty());
    }

    #[tokio::test]
    async fn touch_rejects_unknown_destination_node() {
        let state = test_state();
        let cfg = test_cfg();
        let command = ParsedCommand {
            name: "touch".to_owned(),
            args: vec!["u/v.dat".to_owned(), "nosuchhost".to_owned()],
        };
        let resp = handle(&state, &cfg, &command, "/O=Grid/CN=Dana").await;
        assert_eq!(&resp[..RESP_NOT_FOUND.len()], RESP_NOT_FOUND.as_bytes());
    }

    #[tokio::test]
    async fn check_adds_a_known_node_to_the_check_list() {
        let state = test_state();
        let cfg = test_cfg();
        state.nodes.lock().add(crate::nodes::Node::new("hostA", "site1", "/var/grid/hostA"));

        let command = ParsedCommand { name: "check".to_owned(), args: vec!["hostA".to_owned()] };
        let resp = handle(&state, &cfg, &command, "/O=Grid/CN=Dana").await;
        assert_eq!(&resp[..2], b"OK");
        assert!(state.check_list.lock().contains("hostA"));
    }

    #[tokio::test]
    async fn check_rejects_unknown_node() {
        let state = test_state();
        let cfg = test_cfg();
        let command = ParsedCommand { name: "check".to_owned(), args: vec!["nosuchhost".to_owned()] };
        let resp = handle(&state, &cfg, &command, "/O=Grid/CN=Dana").await;
        assert_eq!(&resp[..RESP_NOT_FOUND.len()], RESP_NOT_FOUND.as_bytes());
    }

    #[tokio::test]
    async fn put_file_requires_allowlisted_group_membership() {
        let state = test_state();
        let cfg = test_cfg();
        let command = ParsedCommand {
            name: "putFile".to_owned(),
            args: vec![
                "u/v.dat".to_owned(),
                "physics".to_owned(),
                "644".to_owned(),
                "1024".to_owned(),
                "abc123".to_owned(),
                "1700000000".to_owned(),
                "/O=Grid/CN=Dana".to_owned(),
            ],
        };
        let resp = handle(&state, &cfg, &command, "/O=Grid/CN=Dana").await;
        assert_eq!(&resp[..2], b"OK");
        assert_eq!(state.pending_adds.lock().len(), 1);
        let add = state.pending_adds.lock().find("u/v.dat").cloned().unwrap();
        assert_eq!(add.timestamp, 1_700_000_000);
        assert_eq!(add.submitter, "/O=Grid/CN=Dana");
    }

    #[tokio::test]
    async fn delete_rejected_when_locked_by_someone_else() {
        let state = test_state();
        let cfg = test_cfg();
        state.catalogue.create("u/v.dat", "hostA").await.unwrap();
        state
            .catalogue
            .set_attr("u/v.dat", attr::LOCKEDBY, "/O=Grid/CN=Someone")
            .await
            .unwrap();
        let command = ParsedCommand { name: "delete".to_owned(), args: vec!["u/v.dat".to_owned()] };
        let resp = handle(&state, &cfg, &command, "/O=Grid/CN=Dana").await;
        assert_eq!(
            &resp[..RESP_INSUFFICIENT_PRIVILEGES.len()],
            RESP_INSUFFICIENT_PRIVILEGES.as_bytes()
        );
    }

    #[tokio::test]
    async fn remove_purges_catalogue_entries_at_the_host() {
        let state = test_state();
        let cfg = test_cfg();
        state.nodes.lock().add(crate::nodes::Node::new("hostA", "site1", "/var/grid/hostA"));
        state.catalogue.create("u/v.dat", "hostA").await.unwrap();
        state.catalogue.create("w/x.dat", "hostA").await.unwrap();
        state.catalogue.add("w/x.dat", "hostB").await.unwrap();

        let command = ParsedCommand { name: "remove".to_owned(), args: vec!["hostA".to_owned()] };
        let resp = handle(&state, &cfg, &command, "/O=Grid/CN=Admin").await;
        assert_eq!(&resp[..2], b"OK");

        assert!(state.nodes.lock().by_name("hostA").is_none());
        assert!(state.catalogue.locations_of("u/v.dat", true).await.unwrap().is_empty());
        assert_eq!(
            state.catalogue.locations_of("w/x.dat", true).await.unwrap(),
            vec!["hostB".to_owned()]
        );
    }
}
