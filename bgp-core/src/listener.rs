//! Inbound peer driver (RFC 4271 Section 8; spec Section 4.4).
//!
//! `Listener` accepts TCP connections, matches each one against a configured
//! peer by source address, and drives a fresh [`Fsm`] the same way `Session`
//! does for an outbound connection. It registers itself in the listener-side
//! registry so a `Session` dialing the same peer can resolve a collision
//! against it, and performs the other half of that arbitration on its own
//! accept path.

// SPDX-License-Identifier: AGPL-3.0-or-later

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{tcp, TcpListener as TokioTcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep_until;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::codec::Codec;
use crate::collision;
use crate::config::{PeerConfig, ServerConfig};
use crate::fsm::{Effect, Event, Fsm, Mode, Origin, State, TcpOutcome, TimerName};
use crate::rde::RouteDecisionEngine;
use crate::registry::{PeerHandle, PeerRegistry};

type Reader = FramedRead<tcp::OwnedReadHalf, Codec>;
type Writer = FramedWrite<tcp::OwnedWriteHalf, Codec>;

/// Accepts inbound connections for every peer configured on a server.
pub struct Listener {
    server: ServerConfig,
    rde: Arc<dyn RouteDecisionEngine>,
    sessions: PeerRegistry,
    listeners: PeerRegistry,
}

impl Listener {
    #[must_use]
    pub fn new(
        server: ServerConfig,
        rde: Arc<dyn RouteDecisionEngine>,
        sessions: PeerRegistry,
        listeners: PeerRegistry,
    ) -> Self {
        Self {
            server,
            rde,
            sessions,
            listeners,
        }
    }

    /// Bind and accept connections until the bind itself fails.
    ///
    /// # Errors
    /// Returns the error from binding the listening socket.
    pub async fn run(self) -> std::io::Result<()> {
        let listener = TokioTcpListener::bind(("0.0.0.0", self.server.port)).await?;
        log::info!("listening for BGP connections on port {}", self.server.port);
        loop {
            let (stream, remote) = listener.accept().await?;
            let remote_ip = match remote.ip() {
                std::net::IpAddr::V4(v4) => v4,
                std::net::IpAddr::V6(_) => {
                    log::warn!("rejecting IPv6 peer {remote}: core only speaks IPv4 transport");
                    continue;
                }
            };
            let Some(peer) = self.server.peers.iter().find(|p| p.host == remote_ip).cloned() else {
                log::warn!("rejecting connection from unconfigured peer {remote_ip}");
                continue;
            };
            let conn = InboundConnection {
                server_asn: self.server.asn,
                local_bgp_id: self.server.bgp_id,
                peer,
                stream,
                rde: Arc::clone(&self.rde),
                sessions: self.sessions.clone(),
                listeners: self.listeners.clone(),
            };
            tokio::spawn(conn.run());
        }
    }
}

/// One accepted socket, driven through its own `Fsm` from the moment the
/// peer's identity is known until it reaches `idle` again.
struct InboundConnection {
    server_asn: u32,
    local_bgp_id: Ipv4Addr,
    peer: PeerConfig,
    stream: TcpStream,
    rde: Arc<dyn RouteDecisionEngine>,
    sessions: PeerRegistry,
    listeners: PeerRegistry,
}

impl InboundConnection {
    async fn run(self) {
        let peer_host = self.peer.host;
        let key = (self.server_asn, peer_host);
        let mut fsm = Fsm::new(self.server_asn, self.local_bgp_id, self.peer);

        let shared_state = Arc::new(Mutex::new(fsm.state()));
        let (dump_tx, mut dump_rx) = mpsc::channel(1);
        let handle = PeerHandle::new(Arc::clone(&shared_state), dump_tx);
        if self.listeners.register(key, handle).await.is_err() {
            log::warn!("duplicate inbound connection for {peer_host}, dropping");
            return;
        }

        let (rx_half, tx_half) = self.stream.into_split();
        let mut reader: Reader = FramedRead::new(rx_half, Codec::default());
        let mut writer: Writer = FramedWrite::new(tx_half, Codec::default());

        let effects = fsm.handle(Event::Start(Origin::Automatic, Mode::Passive));
        apply_effects(effects, &mut writer).await;
        let effects = fsm.handle(Event::TcpConnection(TcpOutcome::Confirmed));
        apply_effects(effects, &mut writer).await;
        *shared_state.lock().await = fsm.state();

        loop {
            let wake_at = fsm.running_timer_deadlines().map(|(_, d)| d).min();
            tokio::select! {
                () = sleep_until(wake_at.unwrap().into()), if wake_at.is_some() => {
                    let now = Instant::now();
                    let expired: Vec<TimerName> = fsm
                        .running_timer_deadlines()
                        .filter(|(_, d)| *d <= now)
                        .map(|(name, _)| name)
                        .collect();
                    for name in expired {
                        let effects = fsm.handle(Event::Timer(name));
                        apply_effects(effects, &mut writer).await;
                    }
                }
                frame = reader.next() => {
                    match frame {
                        Some(Ok(message)) => {
                            if let crate::packet::Message::Update(ref update) = message {
                                self.rde.process_update(self.server_asn, update.clone()).await;
                            }
                            let effects = fsm.handle(Event::Recv(message));
                            apply_effects(effects, &mut writer).await;
                        }
                        Some(Err(err)) => {
                            log::warn!("decode error from {peer_host}: {err}");
                            let notification = crate::packet::Message::Notification(err.into_notification());
                            let effects = fsm.handle(Event::Send(notification));
                            apply_effects(effects, &mut writer).await;
                            break;
                        }
                        None => {
                            log::debug!("connection from {peer_host} closed");
                            let _ = fsm.handle(Event::TcpConnection(TcpOutcome::Fails));
                            break;
                        }
                    }
                }
                Some(()) = dump_rx.recv() => {
                    let effects = fsm.handle(Event::ErrorOpenCollisionDump);
                    apply_effects(effects, &mut writer).await;
                    break;
                }
            }
            *shared_state.lock().await = fsm.state();

            if fsm.state() == State::OpenConfirm || fsm.state() == State::Established {
                if let Some(session) = self.sessions.get(&key).await {
                    let session_state = session.current_state().await;
                    let outcome = collision::resolve(session_state, self.local_bgp_id, fsm.peer().bgp_id, false);
                    match outcome {
                        collision::Outcome::Ok => {}
                        collision::Outcome::Close => {
                            let _ = session.dump().await;
                        }
                        collision::Outcome::Collision => {
                            let effects = fsm.handle(Event::ErrorOpenCollisionDump);
                            apply_effects(effects, &mut writer).await;
                            break;
                        }
                    }
                }
            }
            if fsm.state() == State::Idle {
                break;
            }
        }

        self.listeners.deregister(&key).await;
    }
}

async fn apply_effects(effects: Vec<Effect>, writer: &mut Writer) {
    for effect in effects {
        match effect {
            Effect::Send(message) => {
                if let Err(err) = writer.send(message).await {
                    log::warn!("write failed: {err}");
                }
            }
            Effect::TcpConnect | Effect::TcpReconnect => {
                // An inbound connection never dials out: a passive FSM that
                // reaches `connect`/`active` again is already done with this
                // socket, and a new inbound attempt is handled by a fresh
                // `InboundConnection` off the accept loop.
            }
            Effect::TcpDisconnect => {}
        }
    }
}
