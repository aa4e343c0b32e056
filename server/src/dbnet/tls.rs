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

//! Every control connection is mutual TLS: the client must present a certificate
//! signed by the configured CA, and the DN on that certificate is the only notion of
//! identity the grid has. There is no separate login exchange

use crate::config::TlsOpts;
use crate::util::error::{Error, SkyResult};
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::ssl::{Ssl, SslAcceptor, SslFiletype, SslMethod, SslVerifyMode};
use std::fs;
use std::pin::Pin;
use tokio::net::TcpStream;
use tokio::time::{self, Duration};
use tokio_openssl::SslStream;

pub struct SslListener {
    acceptor: SslAcceptor,
}

impl SslListener {
    pub fn new_pem_based_ssl_connection(opts: &TlsOpts) -> SkyResult<Self> {
        let mut acceptor_builder = SslAcceptor::mozilla_intermediate(SslMethod::tls())?;
        acceptor_builder.set_certificate_chain_file(&opts.chain)?;
        match &opts.passfile {
            Some(passfile) => {
                let tls_private_key = fs::read(&opts.key)
                    .map_err(|e| Error::ioerror_extra(e, "reading TLS private key file"))?;
                let tls_keyfile_stream = fs::read(passfile)
                    .map_err(|e| Error::ioerror_extra(e, "reading TLS private key passphrase file"))?;
                let pkey = Rsa::private_key_from_pem_passphrase(&tls_private_key, &tls_keyfile_stream)?;
                let pkey = PKey::from_rsa(pkey)?;
                acceptor_builder.set_private_key(&pkey)?;
            }
            None => {
                acceptor_builder.set_private_key_file(&opts.key, SslFiletype::PEM)?;
            }
        }
        // every peer must present a certificate signed by our CA; that certificate's
        // subject DN is the caller's entire identity
        acceptor_builder.set_ca_file(&opts.ca_file)?;
        acceptor_builder.set_verify(SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT);
        Ok(SslListener {
            acceptor: acceptor_builder.build(),
        })
    }

    pub async fn accept(&self, stream: TcpStream) -> SkyResult<SslStream<TcpStream>> {
        let ssl = Ssl::new(self.acceptor.context())?;
        let mut stream = SslStream::new(ssl, stream)?;
        Pin::new(&mut stream).accept().await?;
        Ok(stream)
    }
}

/// Exponential backoff around `TcpListener::accept`, capped at 64 seconds between tries
pub struct AcceptBackoff {
    secs: u64,
}

impl AcceptBackoff {
    pub fn new() -> Self {
        Self { secs: 1 }
    }

    pub fn exhausted(&self) -> bool {
        self.secs > 64
    }

    pub async fn wait(&mut self) {
        time::sleep(Duration::from_secs(self.secs)).await;
        self.secs *= 2;
    }
}

/// Render the peer certificate's subject as the grid's single-line DN, failing the
/// connection if the handshake somehow produced no certificate (shouldn't happen with
/// `FAIL_IF_NO_PEER_CERT`, but the accessor is still fallible)
pub fn peer_dn(stream: &SslStream<TcpStream>) -> SkyResult<String> {
    let cert = stream
        .ssl()
        .peer_certificate()
        .ok_or_else(|| Error::Protocol("client presented no certificate".into()))?;
    Ok(super::render_subject_dn(cert.subject_name()))
}
