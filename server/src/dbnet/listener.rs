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

use super::connection::ConnectionHandler;
use super::tls::{AcceptBackoff, SslListener};
use super::{tls, IncomingRequest};
use crate::config::GridConfig;
use crate::util::error::{Error, SkyResult};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Semaphore};

/// Everything the accept loop needs: the bound socket, a concurrency cap, the
/// shutdown broadcaster, and the channel requests are handed to the main loop on
pub struct BaseListener {
    listener: TcpListener,
    climit: Arc<Semaphore>,
    signal: broadcast::Sender<()>,
    terminate_tx: mpsc::Sender<()>,
    terminate_rx: mpsc::Receiver<()>,
}

impl BaseListener {
    pub async fn init(cfg: &GridConfig, signal: broadcast::Sender<()>) -> SkyResult<Self> {
        let (terminate_tx, terminate_rx) = mpsc::channel(1);
        let listener = TcpListener::bind((cfg.host, cfg.port))
            .await
            .map_err(|e| Error::ioerror_extra(e, format!("binding to port {}", cfg.port)))?;
        Ok(Self {
            listener,
            climit: Arc::new(Semaphore::new(cfg.maxcon)),
            signal,
            terminate_tx,
            terminate_rx,
        })
    }

    /// Drop our side of the shutdown channels and wait for every spawned connection
    /// task (each holding a clone of `terminate_tx`) to finish
    pub async fn release_self(self) {
        let Self {
            mut terminate_rx,
            terminate_tx,
            signal,
            ..
        } = self;
        drop(signal);
        drop(terminate_tx);
        let _ = terminate_rx.recv().await;
    }
}

async fn accept_with_backoff(base: &BaseListener) -> SkyResult<tokio::net::TcpStream> {
    let mut backoff = AcceptBackoff::new();
    loop {
        match base.listener.accept().await {
            Ok((stream, _)) => return Ok(stream),
            Err(e) => {
                if backoff.exhausted() {
                    return Err(e.into());
                }
            }
        }
        backoff.wait().await;
    }
}

/// Bind the control port and run the accept loop until the process is asked to shut
/// down. Every accepted connection completes the mutual-TLS handshake, has its peer
/// DN extracted, and is handed off to its own [`ConnectionHandler`] task; well-formed
/// requests flow back to the main loop over `request_tx`
pub async fn serve(
    cfg: &GridConfig,
    request_tx: mpsc::Sender<IncomingRequest>,
    signal: broadcast::Sender<()>,
) -> SkyResult<()> {
    let base = BaseListener::init(cfg, signal.clone()).await?;
    let ssl = Arc::new(SslListener::new_pem_based_ssl_connection(&cfg.tls)?);
    let mut shutdown = signal.subscribe();
    log::info!("control-plane listener bound on {}:{}", cfg.host, cfg.port);
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                log::info!("listener received shutdown signal");
                break;
            }
            accepted = accept_with_backoff(&base) => {
                let tcp_stream = accepted?;
                base.climit.acquire().await.unwrap().forget();
                let request_tx = request_tx.clone();
                let terminate_tx = base.terminate_tx.clone();
                let climit = base.climit.clone();
                let ssl = ssl.clone();
                tokio::spawn(async move {
                    let peer_addr = tcp_stream.peer_addr().ok();
                    let stream = match ssl.accept(tcp_stream).await {
                        Ok(s) => s,
                        Err(e) => {
                            log::warn!("TLS handshake failed for {peer_addr:?}: {e}");
                            return;
                        }
                    };
                    let sender_dn = match tls::peer_dn(&stream) {
                        Ok(dn) => dn,
                        Err(e) => {
                            log::warn!("rejecting connection from {peer_addr:?}: {e}");
                            return;
                        }
                    };
                    let mut handler = ConnectionHandler::new(stream, sender_dn, request_tx, climit, terminate_tx);
                    handler.run().await;
                });
            }
        }
    }
    base.release_self().await;
    Ok(())
}
