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

use openssl::{error::ErrorStack as SslErrorStack, ssl::Error as SslError};
use std::{fmt, io::Error as IoError};

pub type SkyResult<T> = Result<T, Error>;

/// The error kinds a control-thread operation can fail with. These map directly onto
/// the retry/notify/abort policy described for the background loop: callers match on
/// the kind, not the message, to decide whether to retry next sweep, disable a host,
/// or exit
#[derive(Debug)]
pub enum Error {
    /// A remote (SE driver or catalogue) call failed in a way that may succeed on retry
    TransientRemote(String),
    /// A remote call failed in a way that will not succeed on retry (missing file, auth
    /// denied); the caller should fail the pending-op and surface it to the operator
    PermanentRemote(String),
    /// The catalogue handle itself needs to be reopened
    CatalogueTransient(String),
    /// Unrecoverable local failure (disk full on the working directory, OOM in
    /// bookkeeping structures); triggers a clean exit
    Local(String),
    /// A malformed request line or unparseable journal entry
    Protocol(String),
    /// An internal consistency check failed (e.g. a host claims a file its catalogue
    /// entry doesn't know about); surfaced to verification rather than acted on directly
    Invariant(String),
    IoError(IoError),
    IoErrorExtra(IoError, String),
    TlsError(SslError),
}

impl Error {
    pub fn ioerror_extra(ioe: IoError, extra: impl ToString) -> Self {
        Self::IoErrorExtra(ioe, extra.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransientRemote(e) => write!(f, "transient remote error: {e}"),
            Self::PermanentRemote(e) => write!(f, "permanent remote error: {e}"),
            Self::CatalogueTransient(e) => write!(f, "catalogue handle needs reopening: {e}"),
            Self::Local(e) => write!(f, "local failure: {e}"),
            Self::Protocol(e) => write!(f, "protocol error: {e}"),
            Self::Invariant(e) => write!(f, "invariant violation: {e}"),
            Self::IoError(nerr) => write!(f, "I/O error: {nerr}"),
            Self::IoErrorExtra(ioe, extra) => write!(f, "I/O error while {extra}: {ioe}"),
            Self::TlsError(terr) => write!(f, "TLS error: {terr}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<IoError> for Error {
    fn from(ioe: IoError) -> Self {
        Self::IoError(ioe)
    }
}

impl From<SslError> for Error {
    fn from(sslerr: SslError) -> Self {
        Self::TlsError(sslerr)
    }
}

impl From<SslErrorStack> for Error {
    fn from(estack: SslErrorStack) -> Self {
        Self::TlsError(estack.into())
    }
}
