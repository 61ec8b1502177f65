//! BGP-4 peer session engine.
//!
//! This crate implements the pieces of RFC 4271 that do not depend on how a
//! particular daemon is wired up: the peer finite state machine, the wire
//! codec, connection-collision arbitration, and the two drivers
//! ([`session`] for outbound connections, [`listener`] for inbound ones)
//! that turn FSM effects into real socket and timer actions.
//!
//! Configuration loading, process supervision, and the route decision
//! engine's actual logic are left to the binary that embeds this crate; see
//! [`rde`] for the seams it plugs into.

// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod codec;
pub mod collision;
pub mod config;
pub mod fsm;
pub mod listener;
pub mod packet;
pub mod rde;
pub mod registry;
pub mod session;
pub mod timer;

pub use codec::Codec;
pub use fsm::{Effect, Event, Fsm, State};
pub use listener::Listener;
pub use session::Session;
