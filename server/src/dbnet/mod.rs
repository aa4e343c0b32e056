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

//! The control connection: one line of ASCII in, one fixed-width 32-byte response out.
//! The accept loop runs on its own tasks and only ever does syntax-level validation
//! (command name + arg count); a well-formed request is handed to the main loop over a
//! channel so that handlers, which may need to touch the catalogue or node registry,
//! never block on network I/O

mod connection;
mod listener;
mod tls;

pub use listener::serve;

use tokio::sync::oneshot;

/// Response frame width: `"OK"` or a short error string, right-padded with spaces
pub const RESPONSE_WIDTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
}

/// A syntactically valid command that has been handed off to the main loop, along with
/// the authenticated sender DN and the channel to deliver the response on
pub struct IncomingRequest {
    pub command: ParsedCommand,
    pub sender_dn: String,
    pub reply: oneshot::Sender<[u8; RESPONSE_WIDTH]>,
}

/// Pad (or, in the pathological case, truncate) `s` to exactly [`RESPONSE_WIDTH`] bytes
pub fn pad_response(s: &str) -> [u8; RESPONSE_WIDTH] {
    let mut buf = [b' '; RESPONSE_WIDTH];
    let bytes = s.as_bytes();
    let n = bytes.len().min(RESPONSE_WIDTH);
    buf[..n].copy_from_slice(&bytes[..n]);
    buf
}

pub const RESP_OK: &str = "OK";
pub const RESP_INSUFFICIENT_PRIVILEGES: &str = "Insufficient privileges";
pub const RESP_BAD_COMMAND: &str = "Bad command";
pub const RESP_NOT_FOUND: &str = "Not found";
pub const RESP_INTERNAL_ERROR: &str = "Internal error";

/// Minimum/maximum argument count for every recognized command
fn argc_bounds(name: &str) -> Option<(usize, usize)> {
    Some(match name {
        "add" => (3, 3),
        "ping" => (0, 0),
        "touchdir" | "touch" => (2, 2),
        "check" => (1, 1),
        "remove" | "disable" | "enable" | "retire" | "unretire" => (1, 1),
        "delete" | "rmdir" => (1, 1),
        "putFile" => (7, 7),
        "chmod" => (4, 4),
        "lock" | "unlock" | "lockdir" | "unlockdir" => (1, 1),
        "replcount" | "replcountdir" => (2, 2),
        "modify" => (5, 5),
        _ => return None,
    })
}

/// Parse a single request line: CR/LF already stripped, first token is the command
/// name, the rest are positional arguments
pub fn parse_line(line: &str) -> Result<ParsedCommand, &'static str> {
    let mut tokens = line.split(' ').filter(|t| !t.is_empty());
    let name = tokens.next().ok_or("empty request")?.to_owned();
    let args: Vec<String> = tokens.map(str::to_owned).collect();
    let (min, max) = argc_bounds(&name).ok_or("unknown command")?;
    if args.len() < min || args.len() > max {
        return Err("wrong number of arguments");
    }
    Ok(ParsedCommand { name, args })
}

/// Render an X509 subject name into the grid's single-line DN form, e.g.
/// `/O=Grid/OU=Physics/CN=Jane Doe`. Entries are emitted in the order the certificate
/// carries them, which is the conventional most-general-to-most-specific order
pub(crate) fn render_subject_dn(subject: &openssl::x509::X509NameRef) -> String {
    let mut out = String::new();
    for entry in subject.entries() {
        let short_name = entry.object().nid().short_name().unwrap_or("?");
        let value = entry.data().as_utf8().map(|s| s.to_string()).unwrap_or_default();
        out.push('/');
        out.push_str(short_name);
        out.push('=');
        out.push_str(&value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_line_rejects_unknown_command() {
        assert!(parse_line("frobnicate a").is_err());
    }

    #[test]
    fn parse_line_rejects_wrong_argc() {
        assert!(parse_line("add a b").is_err());
        assert!(parse_line("ping").is_ok());
    }

    #[test]
    fn parse_line_accepts_well_formed_request() {
        let cmd = parse_line("delete /u/v.dat").unwrap();
        assert_eq!(cmd.name, "delete");
        assert_eq!(cmd.args, vec!["/u/v.dat".to_owned()]);
    }

    #[test]
    fn pad_response_pads_to_fixed_width() {
        let padded = pad_response("OK");
        assert_eq!(padded.len(), RESPONSE_WIDTH);
        assert_eq!(&padded[..2], b"OK");
        assert!(padded[2..].iter().all(|b| *b == b' '));
    }
}
