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

//! The catalogue client: LFN <-> replica mapping plus per-LFN/per-replica attributes.
//! `Catalogue` is the interface every other component programs against; `memcat`
//! supplies the in-process reference implementation

pub mod memcat;

use crate::util::error::SkyResult;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileListing {
    pub lfn: String,
    pub hosts: Vec<String>,
}

/// The catalogue interface. All operations may fail; callers treat a failure as a
/// transient condition unless the error kind says otherwise, and retry on the next
/// sweep
#[async_trait]
pub trait Catalogue: Send + Sync {
    /// Register `lfn` for the first time at `host`. Idempotent with [`Catalogue::add`]:
    /// if the lfn already exists with no replicas, falls back to `add`
    async fn create(&self, lfn: &str, host: &str) -> SkyResult<()>;
    /// Add a replica of an already-catalogued lfn at `host`
    async fn add(&self, lfn: &str, host: &str) -> SkyResult<()>;
    /// Remove the (lfn, host) replica mapping. Does not touch attributes
    async fn delete(&self, lfn: &str, host: &str) -> SkyResult<()>;
    /// Remove every replica mapping at `host`, across all lfns
    async fn delete_all_at(&self, host: &str) -> SkyResult<()>;
    async fn exists(&self, lfn: &str) -> SkyResult<bool>;
    /// List every lfn matching `pattern` (`*` = everything) with its replica hosts.
    /// The result deduplicates lfns and collects every host per lfn
    async fn list_files(&self, pattern: &str) -> SkyResult<Vec<FileListing>>;
    async fn list_at(&self, host: &str) -> SkyResult<Vec<String>>;
    /// Hosts currently holding a replica of `lfn`. When `include_dead_disabled` is
    /// false, dead/disabled hosts are omitted from the result (retiring hosts are kept
    /// unless the caller filters them separately)
    async fn locations_of(&self, lfn: &str, include_dead_disabled: bool) -> SkyResult<Vec<String>>;
    async fn get_attr(&self, lfn: &str, name: &str) -> SkyResult<Option<String>>;
    /// Upsert semantics: writing the same value that's already there is a no-op success
    async fn set_attr(&self, lfn: &str, name: &str, value: &str) -> SkyResult<()>;
    async fn remove_attr(&self, lfn: &str, name: &str) -> SkyResult<()>;
    /// Every lfn that has attribute `name` set, with its value
    async fn attr_search(&self, name: &str) -> SkyResult<Vec<(String, String)>>;

    /// Downcast escape hatch used only by the persistence step of a sweep, which
    /// needs to call [`memcat::MemCatalogue::dump`] directly rather than through
    /// this interface (dumping isn't part of the abstract contract any external
    /// catalogue would implement)
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Well-known attribute names, collected so call sites never hand-type the string and
/// risk a typo diverging from the journal/protocol spelling
pub mod attr {
    pub const GROUP: &str = "group";
    pub const PERMISSIONS: &str = "permissions";
    pub const SIZE: &str = "size";
    pub const MD5SUM: &str = "md5sum";
    pub const SUBMITTER: &str = "submitter";
    pub const REPLCOUNT: &str = "replcount";
    pub const LOCKEDBY: &str = "lockedby";

    pub fn dir(host: &str) -> String {
        format!("{host}-dir")
    }

    pub fn last_checked(host: &str) -> String {
        format!("{host}-lastchecked")
    }
}
