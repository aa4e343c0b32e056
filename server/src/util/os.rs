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

#[cfg(unix)]
pub use unix::*;
#[cfg(not(unix))]
pub use fallback::*;

#[cfg(unix)]
mod unix {
    use libc::{rlimit, RLIMIT_NOFILE};
    use std::ffi::CString;
    use std::io::Error as IoError;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    #[derive(Debug)]
    pub struct ResourceLimit {
        cur: u64,
        max: u64,
    }

    impl ResourceLimit {
        const fn new(cur: u64, max: u64) -> Self {
            Self { cur, max }
        }
        pub const fn is_over_limit(&self, expected: usize) -> bool {
            expected as u64 > self.cur
        }
        /// Returns the maximum number of open files
        pub fn get() -> Result<Self, IoError> {
            unsafe {
                let rlim = rlimit {
                    rlim_cur: 0,
                    rlim_max: 0,
                };
                let ret = libc::getrlimit(RLIMIT_NOFILE, &rlim as *const _ as *mut _);
                if ret != 0 {
                    Err(IoError::last_os_error())
                } else {
                    Ok(ResourceLimit::new(rlim.rlim_cur, rlim.rlim_max))
                }
            }
        }
    }

    #[test]
    fn test_ulimit() {
        let _ = ResourceLimit::get().unwrap();
    }

    /// Free space on the filesystem holding `path`, in kB. Used to gate replica
    /// transfers on the scratch directory having room for the get-then-put leg
    pub fn free_space_kb(path: &Path) -> Result<u64, IoError> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| IoError::new(std::io::ErrorKind::InvalidInput, e))?;
        unsafe {
            let mut stat: libc::statvfs = std::mem::zeroed();
            let ret = libc::statvfs(c_path.as_ptr(), &mut stat);
            if ret != 0 {
                Err(IoError::last_os_error())
            } else {
                Ok((stat.f_bavail as u64 * stat.f_frsize as u64) / 1024)
            }
        }
    }

    #[test]
    fn test_free_space_kb() {
        let dir = std::env::temp_dir();
        assert!(free_space_kb(&dir).unwrap() > 0);
    }
}

#[cfg(not(unix))]
mod fallback {
    use std::io::Error as IoError;
    use std::path::Path;

    /// No portable free-space query outside unix; callers treat this as
    /// "unbounded" rather than blocking replication on platforms without statvfs
    pub fn free_space_kb(_path: &Path) -> Result<u64, IoError> {
        Ok(u64::MAX)
    }
}
