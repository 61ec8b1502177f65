//! Peer and server configuration surface consumed by the core (RFC 4271
//! Section 8, and the defaults a real deployment in this lineage ships).
//!
//! This module only holds data and its defaults; loading it from YAML and
//! validating it against the running environment is `bgpd`'s job.

// SPDX-License-Identifier: AGPL-3.0-or-later

use std::net::Ipv4Addr;

use crate::packet::cidr::Cidr4;

/// Whether a peer session actively dials out or waits for the peer to
/// connect.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "impl-serde", serde(rename_all = "snake_case"))]
pub enum Mode {
    Active,
    Passive,
}

/// DelayOpen timer configuration (RFC 4271 Section 8, optional session
/// attribute). Disabled means the OPEN is sent as soon as TCP connects.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DelayOpen {
    pub enabled: bool,
    pub seconds: u16,
}

impl Default for DelayOpen {
    fn default() -> Self {
        Self {
            enabled: true,
            seconds: 5,
        }
    }
}

/// Configuration for a single configured neighbor, immutable for the
/// lifetime of a session.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "impl-serde", serde(default))]
pub struct PeerConfig {
    pub asn: u32,
    pub bgp_id: Ipv4Addr,
    pub host: Ipv4Addr,
    pub port: u16,
    pub mode: Mode,
    pub automatic: bool,
    pub connect_retry_seconds: u16,
    pub hold_time_seconds: u16,
    pub keep_alive_seconds: u16,
    pub delay_open: DelayOpen,
    pub as_origination_seconds: u16,
    pub route_advertisement_seconds: u16,
    pub notification_without_open: bool,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            asn: 23456,
            bgp_id: Ipv4Addr::UNSPECIFIED,
            host: Ipv4Addr::UNSPECIFIED,
            port: 179,
            mode: Mode::Active,
            automatic: true,
            connect_retry_seconds: 120,
            hold_time_seconds: 90,
            keep_alive_seconds: 30,
            delay_open: DelayOpen::default(),
            as_origination_seconds: 15,
            route_advertisement_seconds: 30,
            notification_without_open: true,
        }
    }
}

impl PeerConfig {
    #[must_use]
    pub fn is_internal(&self, local_asn: u32) -> bool {
        self.asn == local_asn
    }
}

/// Top-level configuration for a speaker: its own identity plus every
/// configured neighbor.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "impl-serde", serde(default))]
pub struct ServerConfig {
    pub asn: u32,
    pub bgp_id: Ipv4Addr,
    pub port: u16,
    pub networks: Vec<Cidr4>,
    pub peers: Vec<PeerConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            asn: 0,
            bgp_id: Ipv4Addr::UNSPECIFIED,
            port: 179,
            networks: Vec::new(),
            peers: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_defaults_match_rfc() {
        let cfg = PeerConfig::default();
        assert_eq!(cfg.asn, 23456);
        assert_eq!(cfg.port, 179);
        assert_eq!(cfg.connect_retry_seconds, 120);
        assert_eq!(cfg.hold_time_seconds, 90);
        assert_eq!(cfg.keep_alive_seconds, 30);
        assert!(cfg.delay_open.enabled);
        assert_eq!(cfg.delay_open.seconds, 5);
        assert!(cfg.notification_without_open);
        assert!(cfg.automatic);
    }

    #[test]
    fn test_is_internal() {
        let mut cfg = PeerConfig {
            asn: 65000,
            ..Default::default()
        };
        assert!(cfg.is_internal(65000));
        cfg.asn = 65001;
        assert!(!cfg.is_internal(65000));
    }
}
