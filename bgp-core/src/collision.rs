//! Connection-collision arbitration (RFC 4271 Section 6.8, Section 8).
//!
//! When two TCP connections exist between the same peer pair at once, the
//! higher BGP-ID wins. This module is the pure decision function; the
//! registry lookups and the actual cross-task call between `Session` and
//! `Listener` live in [`crate::session`]/[`crate::listener`].

// SPDX-License-Identifier: AGPL-3.0-or-later

use std::net::Ipv4Addr;

use crate::fsm::State;

/// Result handed back to the connection that asked "should I keep running?"
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// No collision (the peer FSM is not far enough along to conflict), or
    /// this connection is the designated winner: keep it.
    Ok,
    /// This connection lost the collision and must be torn down. The loser
    /// is never told to emit anything itself -- the *other* FSM is the one
    /// that receives `ErrorOpenCollisionDump` and sends the Cease notice.
    Collision,
    /// This connection won; the losing FSM must be told to dump (see
    /// `Outcome::Collision` on the other side). "Close" names the effect on
    /// the loser from this winner's point of view, matching the winner’s
    /// own view that the old connection is the one going away.
    Close,
}

/// Decide what should happen to the caller's own connection, given that the
/// peer's *other* connection already has an FSM in `existing_state`, per RFC
/// 4271 Section 6.8: the connection initiated by the side with the
/// higher-valued BGP Identifier is preserved, the other is closed.
///
/// `locally_initiated` says which connection the caller is asking about:
/// `true` for the outbound connection (initiated by this system), `false`
/// for the inbound one (initiated by the peer). The same `(local_bgp_id,
/// peer_bgp_id)` pair fed in from the outbound and the inbound side
/// necessarily yields opposite outcomes once both sides are in
/// `open_sent`/`open_confirm` -- this flag is what tells `resolve` which of
/// the two it is currently being asked about.
///
/// `local_bgp_id`/`peer_bgp_id` are compared as unsigned 32-bit integers in
/// network byte order, which is simply their natural `Ord` on `Ipv4Addr`'s
/// big-endian octet representation.
#[must_use]
pub fn resolve(existing_state: State, local_bgp_id: Ipv4Addr, peer_bgp_id: Ipv4Addr, locally_initiated: bool) -> Outcome {
    match existing_state {
        State::Established => Outcome::Collision,
        State::OpenSent | State::OpenConfirm => {
            let local_wins = bgp_id_as_u32(local_bgp_id) > bgp_id_as_u32(peer_bgp_id);
            if locally_initiated == local_wins {
                Outcome::Close
            } else {
                Outcome::Collision
            }
        }
        State::Idle | State::Connect | State::Active => Outcome::Ok,
    }
}

fn bgp_id_as_u32(id: Ipv4Addr) -> u32 {
    u32::from_be_bytes(id.octets())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL_WINS: (&str, &str) = ("172.16.1.5", "172.16.1.4");
    const PEER_WINS: (&str, &str) = ("172.16.1.3", "172.16.1.4");

    fn addr(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[test]
    fn test_established_always_rejects_new_connection() {
        let outcome = resolve(State::Established, addr(LOCAL_WINS.0), addr(LOCAL_WINS.1), true);
        assert_eq!(outcome, Outcome::Collision);
        let outcome = resolve(State::Established, addr(LOCAL_WINS.0), addr(LOCAL_WINS.1), false);
        assert_eq!(outcome, Outcome::Collision);
    }

    #[test]
    fn test_outbound_survives_when_local_bgp_id_higher() {
        for state in [State::OpenSent, State::OpenConfirm] {
            let outcome = resolve(state, addr(LOCAL_WINS.0), addr(LOCAL_WINS.1), true);
            assert_eq!(outcome, Outcome::Close, "state {state:?}");
        }
    }

    #[test]
    fn test_inbound_dies_when_local_bgp_id_higher() {
        for state in [State::OpenSent, State::OpenConfirm] {
            let outcome = resolve(state, addr(LOCAL_WINS.0), addr(LOCAL_WINS.1), false);
            assert_eq!(outcome, Outcome::Collision, "state {state:?}");
        }
    }

    #[test]
    fn test_outbound_dies_when_local_bgp_id_lower() {
        for state in [State::OpenSent, State::OpenConfirm] {
            let outcome = resolve(state, addr(PEER_WINS.0), addr(PEER_WINS.1), true);
            assert_eq!(outcome, Outcome::Collision, "state {state:?}");
        }
    }

    #[test]
    fn test_inbound_survives_when_local_bgp_id_lower() {
        for state in [State::OpenSent, State::OpenConfirm] {
            let outcome = resolve(state, addr(PEER_WINS.0), addr(PEER_WINS.1), false);
            assert_eq!(outcome, Outcome::Close, "state {state:?}");
        }
    }

    #[test]
    fn test_no_collision_before_open_sent() {
        for state in [State::Idle, State::Connect, State::Active] {
            let outcome = resolve(state, addr(LOCAL_WINS.0), addr(LOCAL_WINS.1), true);
            assert_eq!(outcome, Outcome::Ok, "state {state:?}");
        }
    }

    #[test]
    fn test_outbound_and_inbound_views_of_the_same_pair_are_opposite() {
        // For the same (local, peer) BGP-ID pair, the caller asking about its
        // outbound connection and the caller asking about its inbound one
        // must never agree on who dies.
        let a = addr("172.16.1.3");
        let b = addr("172.16.1.4");
        assert_eq!(resolve(State::OpenSent, a, b, true), Outcome::Collision);
        assert_eq!(resolve(State::OpenSent, a, b, false), Outcome::Close);
    }
}
