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

//! A [`StorageDriver`] rooted at a local filesystem path, used both as the
//! reference implementation for a real "posix-like SE" driver kind and as the
//! fixture every C6/C7/C8 test exercises against, since no real remote SE is
//! available here

use super::{DriverCapabilities, StorageDriver, TransferHandle, TransferStatus};
use crate::util::error::{Error, SkyResult};
use async_trait::async_trait;
use openssl::hash::{Hasher, MessageDigest};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const INBOX_LOCK_SUFFIX: &str = "-QCDGRIDLOCKED";

pub struct LocalDriver {
    root: PathBuf,
    inbox: Option<PathBuf>,
    next_handle: AtomicU64,
    transfers: Mutex<HashMap<u64, TransferStatus>>,
}

impl LocalDriver {
    pub fn new(root: impl Into<PathBuf>, inbox: Option<PathBuf>) -> Self {
        Self {
            root: root.into(),
            inbox,
            next_handle: AtomicU64::new(1),
            transfers: Mutex::new(HashMap::new()),
        }
    }

    /// Callers already build full on-SE paths (the replication queue composes
    /// `<nodeRoot>/<disk>/<lfn>`), so an absolute `path` is used as-is; only a
    /// relative one is resolved against this driver's configured root
    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn issue_handle(&self, status: TransferStatus) -> TransferHandle {
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.transfers.lock().insert(id, status);
        TransferHandle(id)
    }
}

#[async_trait]
impl StorageDriver for LocalDriver {
    async fn get_length(&self, path: &str) -> SkyResult<u64> {
        Ok(std::fs::metadata(self.resolve(path))?.len())
    }

    async fn get_checksum(&self, path: &str) -> SkyResult<String> {
        let bytes = std::fs::read(self.resolve(path))?;
        let mut hasher = Hasher::new(MessageDigest::md5())
            .map_err(|e| Error::Local(format!("failed to init md5 hasher: {e}")))?;
        hasher
            .update(&bytes)
            .map_err(|e| Error::Local(format!("md5 update failed: {e}")))?;
        let digest = hasher
            .finish()
            .map_err(|e| Error::Local(format!("md5 finish failed: {e}")))?;
        Ok(digest.iter().map(|b| format!("{b:02X}")).collect())
    }

    async fn does_exist(&self, path: &str) -> SkyResult<bool> {
        Ok(self.resolve(path).exists())
    }

    async fn is_directory(&self, path: &str) -> SkyResult<bool> {
        Ok(self.resolve(path).is_dir())
    }

    async fn get_owner(&self, _path: &str) -> SkyResult<String> {
        Ok(String::new())
    }

    async fn get_group(&self, _path: &str) -> SkyResult<String> {
        Ok(String::new())
    }

    async fn get_permissions(&self, path: &str) -> SkyResult<String> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(self.resolve(path))?.permissions().mode();
            Ok(format!("{:o}", mode & 0o777))
        }
        #[cfg(not(unix))]
        {
            let _ = path;
            Ok("644".to_owned())
        }
    }

    async fn get_modification_time(&self, path: &str) -> SkyResult<i64> {
        let modified = std::fs::metadata(self.resolve(path))?.modified()?;
        Ok(modified
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0))
    }

    async fn set_owner(&self, _path: &str, _owner: &str) -> SkyResult<()> {
        Ok(())
    }

    async fn set_group(&self, _path: &str, _group: &str) -> SkyResult<()> {
        Ok(())
    }

    async fn set_permissions(&self, path: &str, perms: &str) -> SkyResult<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = u32::from_str_radix(perms, 8)
                .map_err(|_| Error::Protocol(format!("bad permission string '{perms}'")))?;
            std::fs::set_permissions(self.resolve(path), std::fs::Permissions::from_mode(mode))?;
        }
        #[cfg(not(unix))]
        {
            let _ = (path, perms);
        }
        Ok(())
    }

    async fn mkdir(&self, path: &str) -> SkyResult<()> {
        std::fs::create_dir(self.resolve(path))?;
        Ok(())
    }

    async fn mkdir_tree(&self, path: &str) -> SkyResult<()> {
        std::fs::create_dir_all(self.resolve(path))?;
        Ok(())
    }

    async fn mv(&self, from: &str, to: &str) -> SkyResult<()> {
        std::fs::rename(self.resolve(from), self.resolve(to))?;
        Ok(())
    }

    async fn rm(&self, path: &str) -> SkyResult<()> {
        std::fs::remove_file(self.resolve(path))
            .map_err(|e| Error::PermanentRemote(format!("rm {path}: {e}")))
    }

    async fn rmdir(&self, path: &str) -> SkyResult<()> {
        std::fs::remove_dir(self.resolve(path))?;
        Ok(())
    }

    async fn rmr(&self, path: &str) -> SkyResult<()> {
        std::fs::remove_dir_all(self.resolve(path))?;
        Ok(())
    }

    async fn scan_node(&self) -> SkyResult<Vec<String>> {
        let mut out = Vec::new();
        scan_dir_rel(&self.root, &self.root, &mut out)?;
        Ok(out)
    }

    async fn scan_inbox(&self) -> SkyResult<Vec<String>> {
        let Some(inbox) = &self.inbox else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        if inbox.exists() {
            for entry in std::fs::read_dir(inbox)? {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if !name.ends_with(INBOX_LOCK_SUFFIX) {
                    out.push(name);
                }
            }
        }
        Ok(out)
    }

    async fn ping(&self) -> SkyResult<()> {
        if self.root.exists() {
            Ok(())
        } else {
            Err(Error::TransientRemote(format!(
                "root {} does not exist",
                self.root.display()
            )))
        }
    }

    async fn housekeeping(&self) -> SkyResult<()> {
        Ok(())
    }

    async fn copy_from_inbox(&self, inbox_name: &str, dest_path: &str) -> SkyResult<()> {
        let Some(inbox) = &self.inbox else {
            return Err(Error::Local("driver has no inbox configured".into()));
        };
        let dest = self.resolve(dest_path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(inbox.join(inbox_name), &dest)?;
        std::fs::remove_file(inbox.join(inbox_name))?;
        Ok(())
    }

    async fn start_get_transfer(&self, remote_path: &str, local_path: &str) -> SkyResult<TransferHandle> {
        std::fs::copy(self.resolve(remote_path), local_path)?;
        Ok(self.issue_handle(TransferStatus::Done))
    }

    async fn start_put_transfer(&self, local_path: &str, remote_path: &str) -> SkyResult<TransferHandle> {
        let dest = self.resolve(remote_path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(local_path, &dest)?;
        Ok(self.issue_handle(TransferStatus::Done))
    }

    async fn start_copy_to_inbox(&self, local_path: &str, inbox_name: &str) -> SkyResult<TransferHandle> {
        let Some(inbox) = &self.inbox else {
            return Err(Error::Local("driver has no inbox configured".into()));
        };
        std::fs::create_dir_all(inbox)?;
        std::fs::copy(local_path, inbox.join(inbox_name))?;
        Ok(self.issue_handle(TransferStatus::Done))
    }

    async fn monitor_transfer(&self, handle: TransferHandle) -> SkyResult<(TransferStatus, u8)> {
        let status = self
            .transfers
            .lock()
            .get(&handle.0)
            .copied()
            .unwrap_or(TransferStatus::Failed);
        let pct = if status == TransferStatus::Done { 100 } else { 0 };
        Ok((status, pct))
    }

    async fn end_transfer(&self, handle: TransferHandle) -> SkyResult<()> {
        self.transfers.lock().remove(&handle.0);
        Ok(())
    }

    async fn cancel_transfer(&self, handle: TransferHandle) -> SkyResult<()> {
        self.transfers.lock().remove(&handle.0);
        Ok(())
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities {
            supports_add_scan: true,
            has_inbox: self.inbox.is_some(),
            gpfs: false,
        }
    }
}

fn scan_dir_rel(root: &Path, dir: &Path, out: &mut Vec<String>) -> SkyResult<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            scan_dir_rel(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_string_lossy().into_owned());
        }
    }
    Ok(())
}

/// Constructs the driver instance registered for one node at startup. `LocalDriver`
/// is the only implementation today, so every node is wired up through this
/// regardless of its configured `driverKind`
pub fn fallback_local(root: impl Into<PathBuf>, inbox: Option<PathBuf>) -> Arc<dyn StorageDriver> {
    Arc::new(LocalDriver::new(root, inbox))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile_like_dir::TempDir;

    mod tempfile_like_dir {
        use std::path::{Path, PathBuf};

        /// A minimal scoped temp directory, avoiding a dependency on the `tempfile`
        /// crate for this one test helper
        pub struct TempDir(PathBuf);

        impl TempDir {
            pub fn new(tag: &str) -> Self {
                let suffix: u64 = rand::random();
                let dir = std::env::temp_dir().join(format!(
                    "digs-local-driver-test-{tag}-{}-{suffix}",
                    std::process::id(),
                ));
                std::fs::create_dir_all(&dir).unwrap();
                Self(dir)
            }
        }

        impl Drop for TempDir {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.0);
            }
        }

        impl AsRef<Path> for TempDir {
            fn as_ref(&self) -> &Path {
                &self.0
            }
        }
    }

    #[tokio::test]
    async fn checksum_matches_manual_md5() {
        let dir = TempDir::new("checksum");
        std::fs::write(dir.as_ref().join("f"), b"hello world").unwrap();
        let driver = LocalDriver::new(dir.as_ref(), None);
        let sum = driver.get_checksum("f").await.unwrap();
        assert_eq!(sum.len(), 32);
        assert_eq!(sum, sum.to_uppercase());
    }

    #[tokio::test]
    async fn copy_from_inbox_removes_source() {
        let dir = TempDir::new("inbox");
        let inbox = dir.as_ref().join("inbox");
        std::fs::create_dir_all(&inbox).unwrap();
        std::fs::write(inbox.join("a-DIR-b.dat"), b"payload").unwrap();
        let driver = LocalDriver::new(dir.as_ref(), Some(inbox.clone()));
        driver
            .copy_from_inbox("a-DIR-b.dat", "data/a/b.dat")
            .await
            .unwrap();
        assert!(!inbox.join("a-DIR-b.dat").exists());
        assert!(dir.as_ref().join("data/a/b.dat").exists());
    }

    #[tokio::test]
    async fn scan_inbox_hides_locked_files() {
        let dir = TempDir::new("scan");
        let inbox = dir.as_ref().join("inbox");
        std::fs::create_dir_all(&inbox).unwrap();
        std::fs::write(inbox.join("visible.dat"), b"x").unwrap();
        std::fs::write(inbox.join("locked.dat-QCDGRIDLOCKED"), b"x").unwrap();
        let driver = LocalDriver::new(dir.as_ref(), Some(inbox));
        let names = driver.scan_inbox().await.unwrap();
        assert_eq!(names, vec!["visible.dat".to_owned()]);
    }
}
