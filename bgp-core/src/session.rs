//! Outbound peer driver (RFC 4271 Section 8; spec Section 4.3).
//!
//! `Session` owns a socket and pumps the pure [`Fsm`] with events derived
//! from it: TCP outcomes, decoded messages, and timer expiries. It applies
//! the FSM's effects (send a message, (re)connect, disconnect) and registers
//! itself so a `Listener` handling the same peer can resolve a connection
//! collision against it.

// SPDX-License-Identifier: AGPL-3.0-or-later

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{tcp, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep_until;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::codec::Codec;
use crate::collision;
use crate::config::PeerConfig;
use crate::fsm::{Effect, Event, Fsm, Mode as FsmMode, Origin, State, TcpOutcome, TimerName};
use crate::rde::{RouteDecisionEngine, TcpConnector};
use crate::registry::{PeerHandle, PeerRegistry};

/// An internal driver event: either something to feed the FSM, or plumbing
/// (a freshly connected socket) the FSM does not see directly.
enum DriverEvent {
    Fsm(Event),
    Connected(TcpStream),
}

type Reader = FramedRead<tcp::OwnedReadHalf, Codec>;
type Writer = FramedWrite<tcp::OwnedWriteHalf, Codec>;

/// The outbound session driver for one configured peer.
pub struct Session {
    server_asn: u32,
    fsm: Fsm,
    connector: Arc<dyn TcpConnector>,
    rde: Arc<dyn RouteDecisionEngine>,
    sessions: PeerRegistry,
    listeners: PeerRegistry,
}

impl Session {
    #[must_use]
    pub fn new(
        server_asn: u32,
        local_bgp_id: Ipv4Addr,
        peer: PeerConfig,
        connector: Arc<dyn TcpConnector>,
        rde: Arc<dyn RouteDecisionEngine>,
        sessions: PeerRegistry,
        listeners: PeerRegistry,
    ) -> Self {
        Self {
            server_asn,
            fsm: Fsm::new(server_asn, local_bgp_id, peer),
            connector,
            rde,
            sessions,
            listeners,
        }
    }

    /// Run the session driver until its peer is reconfigured out from under
    /// it. Returns only on an unrecoverable registry conflict.
    pub async fn run(mut self) {
        let peer_host = self.fsm.peer().host;
        let key = (self.server_asn, peer_host);

        let shared_state = Arc::new(Mutex::new(self.fsm.state()));
        let (dump_tx, mut dump_rx) = mpsc::channel(1);
        let handle = PeerHandle::new(Arc::clone(&shared_state), dump_tx);
        if self.sessions.register(key, handle).await.is_err() {
            log::error!("session for {peer_host} already registered, refusing to start a duplicate");
            return;
        }

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<DriverEvent>();
        let mut reader: Option<Reader> = None;
        let mut writer: Option<Writer> = None;

        if self.fsm.peer().automatic {
            let mode = fsm_mode(self.fsm.peer().mode);
            let effects = self.fsm.handle(Event::Start(Origin::Automatic, mode));
            self.apply_effects(effects, &event_tx, &mut writer).await;
        }
        *shared_state.lock().await = self.fsm.state();

        loop {
            let wake_at = self.next_timer_deadline();
            tokio::select! {
                () = sleep_until(wake_at.unwrap().into()), if wake_at.is_some() => {
                    let now = Instant::now();
                    for name in self.expired_timer_names(now) {
                        let effects = self.fsm.handle(Event::Timer(name));
                        self.apply_effects(effects, &event_tx, &mut writer).await;
                    }
                }
                frame = read_frame(&mut reader), if reader.is_some() => {
                    match frame {
                        Some(Ok(message)) => {
                            if let crate::packet::Message::Update(ref update) = message {
                                self.rde.process_update(self.server_asn, update.clone()).await;
                            }
                            let effects = self.fsm.handle(Event::Recv(message));
                            self.apply_effects(effects, &event_tx, &mut writer).await;
                        }
                        Some(Err(err)) => {
                            log::warn!("decode error from {peer_host}: {err}");
                            let notification = crate::packet::Message::Notification(err.into_notification());
                            let effects = self.fsm.handle(Event::Send(notification));
                            self.apply_effects(effects, &event_tx, &mut writer).await;
                        }
                        None => {
                            reader = None;
                            let effects = self.fsm.handle(Event::TcpConnection(TcpOutcome::Fails));
                            self.apply_effects(effects, &event_tx, &mut writer).await;
                        }
                    }
                }
                Some(()) = dump_rx.recv() => {
                    let effects = self.fsm.handle(Event::ErrorOpenCollisionDump);
                    self.apply_effects(effects, &event_tx, &mut writer).await;
                }
                Some(driver_event) = event_rx.recv() => {
                    match driver_event {
                        DriverEvent::Connected(stream) => {
                            let (rx_half, tx_half) = stream.into_split();
                            reader = Some(FramedRead::new(rx_half, Codec::default()));
                            writer = Some(FramedWrite::new(tx_half, Codec::default()));
                        }
                        DriverEvent::Fsm(ev) => {
                            let effects = self.fsm.handle(ev);
                            self.apply_effects(effects, &event_tx, &mut writer).await;
                        }
                    }
                }
            }
            *shared_state.lock().await = self.fsm.state();

            if self.fsm.state() == State::OpenSent || self.fsm.state() == State::OpenConfirm {
                self.check_outbound_collision(peer_host, &event_tx).await;
            }
        }
    }

    async fn apply_effects(
        &self,
        effects: Vec<Effect>,
        event_tx: &mpsc::UnboundedSender<DriverEvent>,
        writer: &mut Option<Writer>,
    ) {
        let peer_host = self.fsm.peer().host;
        let peer_port = self.fsm.peer().port;
        for effect in effects {
            match effect {
                Effect::Send(message) => {
                    if let Some(w) = writer.as_mut() {
                        if let Err(err) = w.send(message).await {
                            log::warn!("write to {peer_host} failed: {err}");
                        }
                    }
                }
                Effect::TcpConnect | Effect::TcpReconnect => {
                    let connector = Arc::clone(&self.connector);
                    let tx = event_tx.clone();
                    tokio::spawn(async move {
                        match connector.connect(peer_host, peer_port).await {
                            Ok(stream) => {
                                let _ = tx.send(DriverEvent::Connected(stream));
                                let _ = tx.send(DriverEvent::Fsm(Event::TcpConnection(TcpOutcome::Succeeds)));
                            }
                            Err(err) => {
                                log::debug!("connect to {peer_host}:{peer_port} failed: {err}");
                                let _ = tx.send(DriverEvent::Fsm(Event::TcpConnection(TcpOutcome::Fails)));
                            }
                        }
                    });
                }
                Effect::TcpDisconnect => {
                    *writer = None;
                }
            }
        }
    }

    /// Earliest deadline among the FSM's running timers, or `None` if none
    /// are running (the `select!` branch is then simply disabled).
    fn next_timer_deadline(&self) -> Option<Instant> {
        self.fsm.running_timer_deadlines().map(|(_, deadline)| deadline).min()
    }

    fn expired_timer_names(&self, now: Instant) -> Vec<TimerName> {
        self.fsm
            .running_timer_deadlines()
            .filter(|(_, deadline)| *deadline <= now)
            .map(|(name, _)| name)
            .collect()
    }

    async fn check_outbound_collision(&mut self, peer_host: Ipv4Addr, event_tx: &mpsc::UnboundedSender<DriverEvent>) {
        let key = (self.server_asn, peer_host);
        let Some(listener) = self.listeners.get(&key).await else {
            return;
        };
        let listener_state = listener.current_state().await;
        let outcome = collision::resolve(listener_state, self.fsm.local_bgp_id(), self.fsm.peer().bgp_id, true);
        match outcome {
            collision::Outcome::Ok => {}
            collision::Outcome::Collision => {
                let _ = event_tx.send(DriverEvent::Fsm(Event::ErrorOpenCollisionDump));
            }
            collision::Outcome::Close => {
                let _ = listener.dump().await;
            }
        }
    }
}

async fn read_frame(reader: &mut Option<Reader>) -> Option<Result<crate::packet::Message, crate::codec::DecodeError>> {
    match reader {
        Some(r) => r.next().await,
        None => std::future::pending().await,
    }
}

fn fsm_mode(mode: crate::config::Mode) -> FsmMode {
    match mode {
        crate::config::Mode::Active => FsmMode::Active,
        crate::config::Mode::Passive => FsmMode::Passive,
    }
}
