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

//! The core library for the grid control plane
//!
//! This contains small pieces that are shared by the control daemon and would be
//! shared by any future client tooling: the generic result type, version/identity
//! constants, and the inbox filename escaping scheme (§6 of the design).

pub mod util;

use std::error::Error;

/// A generic result type used at module boundaries where a dedicated error enum
/// would be overkill
pub type TResult<T> = Result<T, Box<dyn Error>>;

/// The size of the read buffer used per client connection, in bytes
pub const BUF_CAP: usize = 8 * 1024; // 8 KB per-connection

/// The user-facing version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The project URL, printed at startup
pub const URL: &str = "https://github.com/example/digs";

/// The escape token used when a client uploads a file into an SE's inbox.
///
/// A client uploading LFN `a/b/c` writes to inbox name `a-DIR-b-DIR-c`; promotion
/// reverses the substitution. The token is deliberately unlikely to occur in a real
/// path component.
pub const INBOX_DIR_ESCAPE: &str = "-DIR-";

/// Escape an LFN into an inbox-safe filename (see [`INBOX_DIR_ESCAPE`])
pub fn escape_lfn_for_inbox(lfn: &str) -> String {
    lfn.replace('/', INBOX_DIR_ESCAPE)
}

/// Reverse [`escape_lfn_for_inbox`]. This is a bijection as long as the original LFN
/// never contains the escape token itself
pub fn unescape_inbox_name(name: &str) -> String {
    name.replace(INBOX_DIR_ESCAPE, "/")
}

/// Encode a certificate subject DN for storage in a single whitespace-delimited
/// journal/attribute field by replacing spaces with `+`, mirroring how submitter DNs
/// are stored in the `submitter` attribute and in `pendingadds`
pub fn encode_dn(dn: &str) -> String {
    dn.replace(' ', "+")
}

/// Reverse [`encode_dn`]
pub fn decode_dn(encoded: &str) -> String {
    encoded.replace('+', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbox_escape_is_a_bijection() {
        for lfn in ["a/b/c", "single", "a/b/c/d/e", "x"] {
            assert_eq!(unescape_inbox_name(&escape_lfn_for_inbox(lfn)), lfn);
        }
    }

    #[test]
    fn dn_roundtrip() {
        let dn = "/O=Grid/OU=example/CN=Jane Doe";
        assert_eq!(decode_dn(&encode_dn(dn)), dn);
    }
}
