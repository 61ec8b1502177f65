//! External collaborator seams: the Route Decision Engine and the TCP
//! connector. Both are deliberately out of CORE's scope (spec: "configuration
//! loading... the TCP listener and outbound connector; the Route Decision
//! Engine... process supervision; logging"); this module only defines the
//! traits the driver calls through.

// SPDX-License-Identifier: AGPL-3.0-or-later

use std::net::Ipv4Addr;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::packet::Update;

/// Consumes decoded UPDATE messages. The core calls this whenever an FSM in
/// `established` surfaces one; the return value is ignored by the core,
/// matching the spec's "process_update... return value ignored".
#[async_trait]
pub trait RouteDecisionEngine: Send + Sync {
    async fn process_update(&self, server_asn: u32, update: Update);
}

/// An RDE that does nothing, for tests and for `bgpd` configurations that
/// run the protocol engine without downstream route processing.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullRde;

#[async_trait]
impl RouteDecisionEngine for NullRde {
    async fn process_update(&self, _server_asn: u32, _update: Update) {}
}

/// Establishes outbound TCP connections to configured peers.
#[async_trait]
pub trait TcpConnector: Send + Sync {
    async fn connect(&self, host: Ipv4Addr, port: u16) -> std::io::Result<TcpStream>;
}

/// A connector that dials real sockets via `tokio::net::TcpStream`.
#[derive(Copy, Clone, Debug, Default)]
pub struct RealTcpConnector;

#[async_trait]
impl TcpConnector for RealTcpConnector {
    async fn connect(&self, host: Ipv4Addr, port: u16) -> std::io::Result<TcpStream> {
        TcpStream::connect((host, port)).await
    }
}
