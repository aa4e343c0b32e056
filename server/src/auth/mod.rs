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

//! Authorization rules. There is no login step: identity comes from the client
//! certificate the mutual-TLS handshake already verified, rendered as the sender DN.
//! Every predicate here is a pure function over facts the caller has already looked up
//! (group membership, an lfn's `group`/`lockedby` attributes, whether pending mods
//! exist) so this module never touches the catalogue or does any I/O itself

pub mod groupmap;

pub use groupmap::GroupMap;

/// Everything a predicate needs to know about the caller: who they are and what they're
/// a member of, plus the grid-wide settings that gate a handful of commands
pub struct AuthContext<'a> {
    pub sender_dn: &'a str,
    pub group_map: &'a GroupMap,
    pub admin_group: &'a str,
    pub allowed_publisher_groups: &'a [String],
    /// Gates how `authorize_delete` resolves non-admin access: group membership when
    /// set, the original submitter when not
    pub group_mode: bool,
}

impl<'a> AuthContext<'a> {
    pub fn new(
        sender_dn: &'a str,
        group_map: &'a GroupMap,
        admin_group: &'a str,
        allowed_publisher_groups: &'a [String],
        group_mode: bool,
    ) -> Self {
        Self {
            sender_dn,
            group_map,
            admin_group,
            allowed_publisher_groups,
            group_mode,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.group_map.is_member(self.sender_dn, self.admin_group)
    }

    fn is_member_of(&self, group: &str) -> bool {
        self.group_map.is_member(self.sender_dn, group)
    }

    fn group_is_allowed_publisher(&self, group: &str) -> bool {
        self.allowed_publisher_groups.iter().any(|g| g == group)
    }

    /// `add`, `remove`, `disable`, `enable`, `retire`, `unretire`: admin only
    pub fn authorize_admin_only(&self) -> bool {
        self.is_admin()
    }

    /// `touchdir`, `touch`, `check`, `ping`: anyone with a valid client certificate
    pub fn authorize_anyone(&self) -> bool {
        true
    }

    /// `delete` (and, per-file, `rmdir`): admin, or, provided the file isn't locked by
    /// somebody else, the original submitter — or, when `group_mode` is on, a member of
    /// the owning group instead
    pub fn authorize_delete(&self, submitter: &str, group: &str, locked_by: Option<&str>) -> bool {
        if self.is_admin() {
            return true;
        }
        if let Some(owner) = locked_by {
            if owner != self.sender_dn {
                return false;
            }
        }
        if self.group_mode {
            self.is_member_of(group)
        } else {
            self.sender_dn == submitter
        }
    }

    /// `putFile`: admin, or a member of the target group provided that group is one of
    /// the configured allowed-publisher groups
    pub fn authorize_put_file(&self, group: &str) -> bool {
        self.is_admin() || (self.is_member_of(group) && self.group_is_allowed_publisher(group))
    }

    /// `chmod`: same rule as `putFile`, keyed on the file's current group
    pub fn authorize_chmod(&self, group: &str) -> bool {
        self.authorize_put_file(group)
    }

    /// `lock`/`unlock` (and, per-file, `lockdir`/`unlockdir`): admin, or nobody holds a
    /// pending modification against the file and the lock is either free or already held
    /// by the caller
    pub fn authorize_lock(&self, has_pending_mod: bool, locked_by: Option<&str>) -> bool {
        if self.is_admin() {
            return true;
        }
        if has_pending_mod {
            return false;
        }
        match locked_by {
            None => true,
            Some(owner) => owner == self.sender_dn,
        }
    }

    /// `modify`: admin, or no pending mod exists and the delete rule holds
    pub fn authorize_modify(
        &self,
        has_pending_mod: bool,
        submitter: &str,
        group: &str,
        locked_by: Option<&str>,
    ) -> bool {
        if self.is_admin() {
            return true;
        }
        !has_pending_mod && self.authorize_delete(submitter, group, locked_by)
    }

    /// `replcount`/`replcountdir`: same rule as `modify`
    pub fn authorize_replcount(
        &self,
        has_pending_mod: bool,
        submitter: &str,
        group: &str,
        locked_by: Option<&str>,
    ) -> bool {
        self.authorize_modify(has_pending_mod, submitter, group, locked_by)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with(dn: &str, groups: &[&str]) -> GroupMap {
        let mut m = GroupMap::new();
        m.insert(dn, groups.iter().map(|s| s.to_string()).collect());
        m
    }

    #[test]
    fn admin_bypasses_every_rule() {
        let gm = map_with("/O=Grid/CN=Alice", &["grid-admin"]);
        let publishers = Vec::new();
        let ctx = AuthContext::new("/O=Grid/CN=Alice", &gm, "grid-admin", &publishers, false);
        assert!(ctx.authorize_admin_only());
        assert!(ctx.authorize_delete("someone-else", "other-group", Some("yet-another")));
        assert!(ctx.authorize_put_file("any-group"));
    }

    #[test]
    fn delete_blocked_when_locked_by_someone_else() {
        let gm = map_with("/O=Grid/CN=Bob", &["physics"]);
        let publishers = Vec::new();
        let ctx = AuthContext::new("/O=Grid/CN=Bob", &gm, "grid-admin", &publishers, false);
        assert!(!ctx.authorize_delete("/O=Grid/CN=Bob", "physics", Some("/O=Grid/CN=Carol")));
        assert!(ctx.authorize_delete("/O=Grid/CN=Bob", "physics", None));
    }

    #[test]
    fn delete_by_submitter_fails_once_group_mode_is_on() {
        let gm = map_with("/O=Grid/CN=Bob", &[]);
        let publishers = Vec::new();
        let ctx = AuthContext::new("/O=Grid/CN=Bob", &gm, "grid-admin", &publishers, true);
        assert!(!ctx.authorize_delete("/O=Grid/CN=Bob", "physics", None));
    }

    #[test]
    fn delete_by_group_member_requires_group_mode() {
        let gm = map_with("/O=Grid/CN=Carol", &["physics"]);
        let publishers = Vec::new();
        let submitter_mode = AuthContext::new("/O=Grid/CN=Carol", &gm, "grid-admin", &publishers, false);
        assert!(!submitter_mode.authorize_delete("/O=Grid/CN=Dana", "physics", None));
        let group_mode = AuthContext::new("/O=Grid/CN=Carol", &gm, "grid-admin", &publishers, true);
        assert!(group_mode.authorize_delete("/O=Grid/CN=Dana", "physics", None));
    }

    #[test]
    fn put_file_requires_membership_and_allowlisting() {
        let gm = map_with("/O=Grid/CN=Dana", &["physics"]);
        let publishers = vec!["physics".to_owned()];
        let ctx = AuthContext::new("/O=Grid/CN=Dana", &gm, "grid-admin", &publishers, false);
        assert!(ctx.authorize_put_file("physics"));
        assert!(!ctx.authorize_put_file("biology"));
    }

    #[test]
    fn lock_rejected_with_pending_modification() {
        let gm = map_with("/O=Grid/CN=Eve", &[]);
        let publishers = Vec::new();
        let ctx = AuthContext::new("/O=Grid/CN=Eve", &gm, "grid-admin", &publishers, false);
        assert!(!ctx.authorize_lock(true, None));
        assert!(ctx.authorize_lock(false, None));
        assert!(ctx.authorize_lock(false, Some("/O=Grid/CN=Eve")));
        assert!(!ctx.authorize_lock(false, Some("/O=Grid/CN=Frank")));
    }
}
