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

//! Orchestrates the listener and the sweep loop against one shutdown signal: the
//! control connection accept loop, and the background sweep that drains it. Both are
//! raced against a termination signal so that a `SIGTERM`/`SIGINT`/`SIGHUP`/`SIGQUIT`
//! (or Ctrl+C on any platform) brings both down together rather than leaving one
//! running headless

use crate::config::GridConfig;
use crate::dbnet;
use crate::registry;
use crate::state::ControlState;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

#[cfg(unix)]
use core::{future::Future, pin::Pin, task::Context, task::Poll};
#[cfg(unix)]
use tokio::signal::unix::{signal as fnsignal, Signal, SignalKind};

#[cfg(unix)]
/// Binds a single unix signal kind and exposes it as a future that resolves once
pub struct UnixTerminationSignal {
    sig: Signal,
}

#[cfg(unix)]
impl UnixTerminationSignal {
    pub fn init(kind: SignalKind) -> Result<Self, String> {
        let sig = fnsignal(kind).map_err(|e| format!("Failed to bind to signal with: {}", e))?;
        Ok(Self { sig })
    }
}

#[cfg(unix)]
impl Future for UnixTerminationSignal {
    type Output = Option<()>;
    fn poll(mut self: Pin<&mut Self>, ctx: &mut Context<'_>) -> Poll<Self::Output> {
        self.sig.poll_recv(ctx)
    }
}

/// Run the control-plane listener and the sweep loop until a termination signal fires,
/// then fan out shutdown to both and wait for the listener to finish draining its
/// in-flight connections
pub async fn run(state: Arc<ControlState>, cfg: GridConfig) -> Result<(), String> {
    let (signal, _) = broadcast::channel(1);
    let (request_tx, mut request_rx) = mpsc::channel::<dbnet::IncomingRequest>(256);

    let listener_signal = signal.clone();
    let listener_cfg = cfg.clone();
    let listener_handle = tokio::spawn(async move { dbnet::serve(&listener_cfg, request_tx, listener_signal).await });

    // Deliberately not raced against the shutdown signal with `select!`: a signal
    // fires while a sweep may be mid-flight (awaiting a driver RPC), and §5 requires
    // that sweep run to completion rather than be dropped. `run_loop` already checks
    // `registry::state_okay()` at the top of every iteration and returns on its own
    // once `registry::poison()` below has been called
    let sweep_state = state.clone();
    let sweep_cfg = cfg.clone();
    let sweep_handle = tokio::spawn(async move {
        crate::sweep::run_loop(&sweep_state, &sweep_cfg, &mut request_rx).await;
    });

    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        log::info!("received interrupt, signalling shutdown");
    }
    #[cfg(unix)]
    {
        let sigterm = UnixTerminationSignal::init(SignalKind::terminate())
            .map_err(|e| format!("failed to install SIGTERM handler: {e}"))?;
        let sigint = UnixTerminationSignal::init(SignalKind::interrupt())
            .map_err(|e| format!("failed to install SIGINT handler: {e}"))?;
        let sighup = UnixTerminationSignal::init(SignalKind::hangup())
            .map_err(|e| format!("failed to install SIGHUP handler: {e}"))?;
        let sigquit = UnixTerminationSignal::init(SignalKind::quit())
            .map_err(|e| format!("failed to install SIGQUIT handler: {e}"))?;
        tokio::select! {
            _ = ctrl_c => { log::info!("received Ctrl+C, signalling shutdown"); }
            _ = sigterm => { log::info!("received SIGTERM, signalling shutdown"); }
            _ = sigint => { log::info!("received SIGINT, signalling shutdown"); }
            _ = sighup => { log::info!("received SIGHUP, signalling shutdown"); }
            _ = sigquit => { log::info!("received SIGQUIT, signalling shutdown"); }
        }
    }

    registry::poison();
    let _ = signal.send(());
    drop(signal);

    let _ = sweep_handle.await;
    match listener_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::error!("listener exited with error: {e}"),
        Err(e) => log::error!("listener task panicked: {e}"),
    }

    if let Err(e) = state.save() {
        log::error!("failed to persist state on shutdown: {e}");
    }

    Ok(())
}
