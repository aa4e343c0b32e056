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

//! One request per connection: read a single line, hand it to the main loop, write back
//! exactly [`super::RESPONSE_WIDTH`] bytes, close. There is no pipelining and no
//! keep-alive; every command round-trips through a fresh TLS handshake

use super::{pad_response, parse_line, IncomingRequest, RESP_BAD_COMMAND, RESP_INTERNAL_ERROR};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio_openssl::SslStream;

const MAX_LINE_LEN: usize = 8192;

pub struct ConnectionHandler {
    stream: SslStream<TcpStream>,
    sender_dn: String,
    request_tx: mpsc::Sender<IncomingRequest>,
    // the permit acquired (and forgotten) on accept is returned here on drop, so it
    // covers an early return or panic inside `run` the same as normal completion
    _climit: Arc<Semaphore>,
    _terminate_tx: mpsc::Sender<()>,
}

impl ConnectionHandler {
    pub fn new(
        stream: SslStream<TcpStream>,
        sender_dn: String,
        request_tx: mpsc::Sender<IncomingRequest>,
        climit: Arc<Semaphore>,
        terminate_tx: mpsc::Sender<()>,
    ) -> Self {
        Self {
            stream,
            sender_dn,
            request_tx,
            _climit: climit,
            _terminate_tx: terminate_tx,
        }
    }

    pub async fn run(&mut self) {
        let response = match self.read_line().await {
            Ok(line) => self.dispatch(&line).await,
            Err(_) => pad_response(RESP_BAD_COMMAND),
        };
        if let Err(e) = self.stream.write_all(&response).await {
            log::warn!("failed to write response to {}: {}", self.sender_dn, e);
        }
        let _ = self.stream.shutdown().await;
    }

    async fn read_line(&mut self) -> std::io::Result<String> {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            if buf.len() > MAX_LINE_LEN {
                return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "request line too long"));
            }
            let n = self.stream.read(&mut byte).await?;
            if n == 0 {
                break;
            }
            if byte[0] == b'\n' {
                break;
            }
            if byte[0] != b'\r' {
                buf.push(byte[0]);
            }
        }
        String::from_utf8(buf).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    async fn dispatch(&self, line: &str) -> [u8; super::RESPONSE_WIDTH] {
        let command = match parse_line(line) {
            Ok(command) => command,
            Err(_) => return pad_response(RESP_BAD_COMMAND),
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = IncomingRequest {
            command,
            sender_dn: self.sender_dn.clone(),
            reply: reply_tx,
        };
        if self.request_tx.send(request).await.is_err() {
            return pad_response(RESP_INTERNAL_ERROR);
        }
        reply_rx.await.unwrap_or_else(|_| pad_response(RESP_INTERNAL_ERROR))
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        // return the permit forgotten on accept; runs on an early return or panic
        // inside `run` too, not just the normal completion path
        self._climit.add_permits(1);
    }
}
