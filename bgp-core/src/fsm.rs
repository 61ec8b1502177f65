//! The BGP-4 peer finite state machine (RFC 4271 Section 8).
//!
//! `Fsm::handle` is a pure `(state, event) -> (state', effects)` function:
//! no socket, no clock, no logging. Effects are returned as data so that
//! `Session`, `Listener`, and tests all drive identical transition logic
//! (see the module-level docs on why this is kept separate from the actor
//! loop, unlike a typical hand-rolled session state machine).

// SPDX-License-Identifier: AGPL-3.0-or-later

use std::net::Ipv4Addr;

use crate::config::PeerConfig;
use crate::packet::{
    CeaseSubcode, FiniteStateMachineErrorSubcode, Message, Notification, NotificationErrorCode,
    Open, OpenMessageErrorSubcode,
};
use crate::timer::Timer;

/// The six BGP session states (RFC 4271 Section 8.2.1).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Connect,
    Active,
    OpenSent,
    OpenConfirm,
    Established,
}

/// Whether a start/stop event was requested by an operator or by automatic
/// session logic (affects whether the connect-retry counter resets).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Origin {
    Manual,
    Automatic,
}

/// Whether this FSM dials out or waits to be dialed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Active,
    Passive,
}

/// Outcome of a TCP connection attempt or accept, delivered by the driver.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TcpOutcome {
    Succeeds,
    Fails,
    Confirmed,
}

/// The four timers the FSM owns (RFC 4271 Section 4.4 / Section 8).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimerName {
    ConnectRetry,
    DelayOpen,
    HoldTime,
    KeepAlive,
}

/// An input to the FSM.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Start(Origin, Mode),
    Stop(Origin),
    TcpConnection(TcpOutcome),
    Recv(Message),
    /// An encoder-originated error notification the driver wants recorded,
    /// e.g. a NOTIFICATION the codec wants sent in response to a decode
    /// failure before tearing the connection down.
    Send(Message),
    Timer(TimerName),
    /// The collision arbiter decided this side must yield.
    ErrorOpenCollisionDump,
}

/// A side effect the driver must carry out.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    Send(Message),
    TcpConnect,
    TcpDisconnect,
    TcpReconnect,
}

/// Whether `msg` is a NOTIFICATION carrying `OpenMessageError` /
/// `UnsupportedVersionNumber`, the one failure RFC 4271 Section 4.2 exempts
/// from the connect-retry counter's usual increment-or-reset.
fn is_unsupported_version_notification(msg: &Message) -> bool {
    matches!(
        msg,
        Message::Notification(n)
            if n.error_code == NotificationErrorCode::OpenMessageError
                && n.error_subcode == OpenMessageErrorSubcode::UnsupportedVersionNumber as u8
    )
}

/// The BGP peer session state machine.
///
/// Owns everything RFC 4271 Section 8 attributes to "per-connection BGP
/// timers, timer intervals, and flags": the four timers, the connect-retry
/// counter, and the negotiated session parameters. Never performs I/O.
#[derive(Clone, Debug)]
pub struct Fsm {
    state: State,
    local_asn: u32,
    local_bgp_id: Ipv4Addr,
    peer: PeerConfig,
    internal: bool,
    connect_retry: Timer,
    delay_open: Timer,
    hold_time: Timer,
    keep_alive: Timer,
    connect_retry_counter: u32,
    negotiated_hold_time: u16,
}

impl Fsm {
    #[must_use]
    pub fn new(local_asn: u32, local_bgp_id: Ipv4Addr, peer: PeerConfig) -> Self {
        let delay_open_seconds = if peer.delay_open.enabled {
            peer.delay_open.seconds
        } else {
            0
        };
        Self {
            state: State::Idle,
            internal: peer.is_internal(local_asn),
            connect_retry: Timer::new("connect_retry", peer.connect_retry_seconds),
            delay_open: Timer::new("delay_open", delay_open_seconds),
            hold_time: Timer::new("hold_time", peer.hold_time_seconds),
            keep_alive: Timer::new("keep_alive", peer.keep_alive_seconds),
            connect_retry_counter: 0,
            negotiated_hold_time: peer.hold_time_seconds,
            local_asn,
            local_bgp_id,
            peer,
        }
    }

    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub const fn connect_retry_counter(&self) -> u32 {
        self.connect_retry_counter
    }

    #[must_use]
    pub const fn is_internal(&self) -> bool {
        self.internal
    }

    #[must_use]
    pub const fn negotiated_hold_time(&self) -> u16 {
        self.negotiated_hold_time
    }

    #[must_use]
    pub const fn peer(&self) -> &PeerConfig {
        &self.peer
    }

    #[must_use]
    pub const fn local_bgp_id(&self) -> Ipv4Addr {
        self.local_bgp_id
    }

    /// Deadlines of this FSM's currently-running timers, for a driver to
    /// decide how long it may sleep before it must call `handle` again.
    pub fn running_timer_deadlines(&self) -> impl Iterator<Item = (TimerName, std::time::Instant)> + '_ {
        [
            (TimerName::ConnectRetry, self.connect_retry.deadline()),
            (TimerName::DelayOpen, self.delay_open.deadline()),
            (TimerName::HoldTime, self.hold_time.deadline()),
            (TimerName::KeepAlive, self.keep_alive.deadline()),
        ]
        .into_iter()
        .filter_map(|(name, deadline)| deadline.map(|d| (name, d)))
    }

    fn local_open(&self) -> Message {
        Message::Open(Open::new(
            self.local_asn,
            self.peer.hold_time_seconds,
            self.local_bgp_id,
            crate::packet::capability::CapabilitiesBuilder::new()
                .mp_ipv4_unicast()
                .route_refresh()
                .four_octet_as_number_if_needed(self.local_asn)
                .build(),
        ))
    }

    fn cease(&self, subcode: CeaseSubcode) -> Message {
        Message::Notification(Notification::without_data(
            NotificationErrorCode::Cease,
            subcode as u8,
        ))
    }

    fn fsm_error(&self, subcode: FiniteStateMachineErrorSubcode) -> Message {
        Message::Notification(Notification::without_data(
            NotificationErrorCode::FiniteStateMachineError,
            subcode as u8,
        ))
    }

    /// Reset to `idle`, stop every timer, and bump the connect-retry counter
    /// unless the transition was a manual/administrative one.
    fn to_idle(&mut self, origin: Origin) {
        self.to_idle_preserving_counter();
        match origin {
            Origin::Manual => self.connect_retry_counter = 0,
            Origin::Automatic => self.connect_retry_counter += 1,
        }
    }

    /// Reset to `idle` and stop every timer without touching the
    /// connect-retry counter, for transitions (e.g. an unsupported BGP
    /// version number) that RFC 4271 Section 4.2 exempts from both the
    /// increment and the manual-stop reset.
    fn to_idle_preserving_counter(&mut self) {
        self.state = State::Idle;
        self.connect_retry.stop();
        self.delay_open.stop();
        self.hold_time.stop();
        self.keep_alive.stop();
    }

    /// Negotiate hold-time/keep-alive from a received OPEN and start both
    /// timers (RFC 4271 Section 4.4): `effective = min(local, peer)`; zero
    /// disables both.
    fn negotiate_hold_time(&mut self, peer_hold_time: u16) {
        let effective = self.peer.hold_time_seconds.min(peer_hold_time);
        self.negotiated_hold_time = effective;
        self.hold_time.reconfigure(effective);
        self.keep_alive.reconfigure(effective / 3);
        if effective > 0 {
            self.hold_time.start();
            self.keep_alive.start();
        } else {
            self.hold_time.stop();
            self.keep_alive.stop();
        }
    }

    /// The collision-mechanics shared by `connect` and `active` when an OPEN
    /// arrives while delay-open is running: move to `open_confirm`.
    fn accept_open_during_delay(&mut self, open: &Open) -> Vec<Effect> {
        self.connect_retry.stop();
        self.delay_open.stop();
        self.internal = open.resolved_asn() == self.local_asn;
        self.keep_alive.start();
        if open.hold_time > 0 {
            self.hold_time.reconfigure(open.hold_time);
            self.hold_time.start();
        } else {
            self.hold_time.stop();
        }
        self.state = State::OpenConfirm;
        vec![Effect::Send(self.local_open()), Effect::Send(Message::Keepalive)]
    }

    /// Drive the FSM with one event, returning the effects the caller must
    /// apply. This is the entire transition table of RFC 4271 Section 8.2.2,
    /// as sharpened by the collision/open-collision-dump resolution this
    /// core selects (see `collision` module).
    #[allow(clippy::too_many_lines)]
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        // A driver-originated NOTIFICATION (e.g. a codec decode failure) is
        // always a hard stop: the message has already been chosen by the
        // caller, so there is nothing left for a per-state arm to decide.
        if let Event::Send(msg) = event {
            if self.state == State::Idle {
                return vec![];
            }
            if is_unsupported_version_notification(&msg) {
                self.to_idle_preserving_counter();
            } else {
                self.to_idle(Origin::Automatic);
            }
            return vec![Effect::Send(msg), Effect::TcpDisconnect];
        }
        match self.state {
            State::Idle => self.handle_idle(event),
            State::Connect => self.handle_connect(event),
            State::Active => self.handle_active(event),
            State::OpenSent => self.handle_open_sent(event),
            State::OpenConfirm => self.handle_open_confirm(event),
            State::Established => self.handle_established(event),
        }
    }

    fn handle_idle(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Start(_, Mode::Active) => {
                self.state = State::Connect;
                self.connect_retry_counter = 0;
                self.connect_retry.start();
                vec![Effect::TcpConnect]
            }
            Event::Start(_, Mode::Passive) => {
                self.state = State::Active;
                self.connect_retry_counter = 0;
                self.connect_retry.start();
                vec![]
            }
            _ => vec![],
        }
    }

    fn handle_connect(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Timer(TimerName::ConnectRetry) => {
                self.connect_retry.start();
                self.delay_open.stop();
                vec![Effect::TcpReconnect]
            }
            Event::TcpConnection(TcpOutcome::Succeeds) => {
                if self.delay_open.is_enabled() {
                    self.connect_retry.stop();
                    self.delay_open.start();
                    vec![]
                } else {
                    self.state = State::OpenSent;
                    self.hold_time.start();
                    vec![Effect::Send(self.local_open())]
                }
            }
            Event::Timer(TimerName::DelayOpen) => {
                self.state = State::OpenSent;
                self.hold_time.start();
                vec![Effect::Send(self.local_open())]
            }
            Event::TcpConnection(TcpOutcome::Fails) => {
                if self.delay_open.is_running() {
                    self.state = State::Active;
                    self.connect_retry.start();
                } else {
                    self.to_idle(Origin::Automatic);
                }
                vec![]
            }
            Event::Recv(Message::Open(open)) if self.delay_open.is_running() => {
                self.accept_open_during_delay(&open)
            }
            Event::Recv(Message::Notification(n))
                if n.error_code == NotificationErrorCode::OpenMessageError
                    && n.error_subcode == OpenMessageErrorSubcode::UnsupportedVersionNumber as u8 =>
            {
                self.to_idle_preserving_counter();
                vec![]
            }
            _ => {
                self.to_idle(Origin::Automatic);
                vec![]
            }
        }
    }

    fn handle_active(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Timer(TimerName::ConnectRetry) => {
                self.state = State::Connect;
                self.connect_retry.start();
                vec![]
            }
            Event::Timer(TimerName::DelayOpen) => {
                self.state = State::OpenSent;
                self.hold_time.start();
                vec![Effect::Send(self.local_open())]
            }
            // `Confirmed` is the passive-side counterpart of `Succeeds`: the
            // peer has connected to us while we were waiting in `active`.
            Event::TcpConnection(TcpOutcome::Succeeds | TcpOutcome::Confirmed) => {
                self.connect_retry.stop();
                if self.delay_open.is_enabled() {
                    self.delay_open.start();
                    vec![]
                } else {
                    self.state = State::OpenSent;
                    self.hold_time.start();
                    vec![Effect::Send(self.local_open())]
                }
            }
            Event::TcpConnection(TcpOutcome::Fails) => {
                self.to_idle(Origin::Automatic);
                self.connect_retry.start();
                vec![]
            }
            Event::Recv(Message::Open(open)) if self.delay_open.is_running() => {
                self.accept_open_during_delay(&open)
            }
            Event::Stop(Origin::Manual) => {
                self.to_idle(Origin::Manual);
                let mut effects = Vec::new();
                if self.peer.notification_without_open {
                    effects.push(Effect::Send(self.cease(CeaseSubcode::AdministrativeShutdown)));
                }
                effects.push(Effect::TcpDisconnect);
                effects
            }
            _ => {
                self.to_idle(Origin::Automatic);
                vec![]
            }
        }
    }

    fn handle_open_sent(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Timer(TimerName::HoldTime) => {
                self.to_idle(Origin::Automatic);
                vec![
                    Effect::Send(Message::Notification(Notification::without_data(
                        NotificationErrorCode::HoldTimerExpired,
                        0,
                    ))),
                    Effect::TcpDisconnect,
                ]
            }
            Event::TcpConnection(TcpOutcome::Fails) => {
                self.state = State::Active;
                self.connect_retry.start();
                vec![]
            }
            Event::Recv(Message::Open(open)) => {
                self.internal = open.resolved_asn() == self.local_asn;
                if open.hold_time > 0 {
                    self.negotiate_hold_time(open.hold_time);
                } else {
                    self.negotiated_hold_time = 0;
                    self.hold_time.stop();
                    self.keep_alive.stop();
                }
                self.state = State::OpenConfirm;
                vec![Effect::Send(Message::Keepalive)]
            }
            Event::Recv(Message::Notification(n))
                if n.error_code == NotificationErrorCode::OpenMessageError
                    && n.error_subcode == OpenMessageErrorSubcode::UnsupportedVersionNumber as u8 =>
            {
                self.to_idle_preserving_counter();
                vec![]
            }
            _ => {
                self.to_idle(Origin::Automatic);
                vec![
                    Effect::Send(self.fsm_error(FiniteStateMachineErrorSubcode::UnexpectedMessageInOpenSent)),
                    Effect::TcpDisconnect,
                ]
            }
        }
    }

    fn handle_open_confirm(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Timer(TimerName::HoldTime) => {
                self.to_idle(Origin::Automatic);
                vec![
                    Effect::Send(Message::Notification(Notification::without_data(
                        NotificationErrorCode::HoldTimerExpired,
                        0,
                    ))),
                    Effect::TcpDisconnect,
                ]
            }
            Event::Timer(TimerName::KeepAlive) => {
                self.keep_alive.start();
                vec![Effect::Send(Message::Keepalive)]
            }
            Event::Recv(Message::Keepalive) => {
                self.state = State::Established;
                self.hold_time.start();
                vec![]
            }
            Event::Recv(Message::Notification(_)) => {
                self.to_idle(Origin::Automatic);
                vec![Effect::TcpDisconnect]
            }
            Event::Recv(Message::Open(_)) => {
                self.to_idle(Origin::Automatic);
                vec![Effect::Send(self.cease(CeaseSubcode::ConnectionCollisionResolution))]
            }
            Event::ErrorOpenCollisionDump => {
                self.to_idle(Origin::Automatic);
                vec![
                    Effect::Send(self.cease(CeaseSubcode::ConnectionCollisionResolution)),
                    Effect::TcpDisconnect,
                ]
            }
            _ => {
                self.to_idle(Origin::Automatic);
                vec![
                    Effect::Send(self.fsm_error(FiniteStateMachineErrorSubcode::UnexpectedMessageInOpenConfirm)),
                    Effect::TcpDisconnect,
                ]
            }
        }
    }

    fn handle_established(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Timer(TimerName::HoldTime) => {
                self.to_idle(Origin::Automatic);
                vec![
                    Effect::Send(Message::Notification(Notification::without_data(
                        NotificationErrorCode::HoldTimerExpired,
                        0,
                    ))),
                    Effect::TcpDisconnect,
                ]
            }
            Event::Timer(TimerName::KeepAlive) => {
                if self.negotiated_hold_time > 0 {
                    self.keep_alive.start();
                    vec![Effect::Send(Message::Keepalive)]
                } else {
                    vec![]
                }
            }
            Event::Recv(Message::Keepalive) => {
                self.hold_time.start();
                vec![]
            }
            Event::Recv(Message::Update(_)) => {
                self.hold_time.start();
                vec![]
            }
            Event::Recv(Message::Open(_)) => {
                self.to_idle(Origin::Automatic);
                vec![Effect::Send(self.cease(CeaseSubcode::ConnectionCollisionResolution))]
            }
            Event::Recv(Message::Notification(_)) => {
                self.to_idle(Origin::Automatic);
                vec![Effect::TcpDisconnect]
            }
            Event::Stop(Origin::Manual) => {
                self.to_idle(Origin::Manual);
                let mut effects = Vec::new();
                if self.peer.notification_without_open {
                    effects.push(Effect::Send(self.cease(CeaseSubcode::AdministrativeShutdown)));
                }
                effects.push(Effect::TcpDisconnect);
                effects
            }
            _ => {
                self.to_idle(Origin::Automatic);
                vec![
                    Effect::Send(self.fsm_error(FiniteStateMachineErrorSubcode::UnexpectedMessageInEstablished)),
                    Effect::TcpDisconnect,
                ]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DelayOpen, PeerConfig};
    use std::net::Ipv4Addr;

    fn peer(asn: u32, host: Ipv4Addr, bgp_id: Ipv4Addr) -> PeerConfig {
        PeerConfig {
            asn,
            bgp_id,
            host,
            hold_time_seconds: 90,
            delay_open: DelayOpen {
                enabled: true,
                seconds: 5,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_active_startup_clean_establishment() {
        let mut fsm = Fsm::new(
            65000,
            Ipv4Addr::new(172, 16, 1, 3),
            peer(65001, Ipv4Addr::new(172, 16, 1, 4), Ipv4Addr::new(172, 16, 1, 4)),
        );
        let effects = fsm.handle(Event::Start(Origin::Automatic, Mode::Active));
        assert_eq!(fsm.state(), State::Connect);
        assert_eq!(effects, vec![Effect::TcpConnect]);

        let effects = fsm.handle(Event::TcpConnection(TcpOutcome::Succeeds));
        assert_eq!(fsm.state(), State::Connect);
        assert!(effects.is_empty());
        assert!(fsm.delay_open.is_running());

        let effects = fsm.handle(Event::Timer(TimerName::DelayOpen));
        assert_eq!(fsm.state(), State::OpenSent);
        assert_eq!(effects.len(), 1);
        assert!(matches!(effects[0], Effect::Send(Message::Open(_))));

        let open = Open::new(
            65001,
            60,
            Ipv4Addr::new(172, 16, 1, 4),
            crate::packet::capability::Capabilities::default(),
        );
        let effects = fsm.handle(Event::Recv(Message::Open(open)));
        assert_eq!(fsm.state(), State::OpenConfirm);
        assert_eq!(fsm.negotiated_hold_time(), 60);
        assert_eq!(effects, vec![Effect::Send(Message::Keepalive)]);

        let effects = fsm.handle(Event::Recv(Message::Keepalive));
        assert_eq!(fsm.state(), State::Established);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_hold_timer_expiry_from_established() {
        let mut fsm = Fsm::new(
            65000,
            Ipv4Addr::new(172, 16, 1, 3),
            peer(65001, Ipv4Addr::new(172, 16, 1, 4), Ipv4Addr::new(172, 16, 1, 4)),
        );
        fsm.state = State::Established;
        let before = fsm.connect_retry_counter();
        let effects = fsm.handle(Event::Timer(TimerName::HoldTime));
        assert_eq!(fsm.state(), State::Idle);
        assert_eq!(fsm.connect_retry_counter(), before + 1);
        assert_eq!(
            effects,
            vec![
                Effect::Send(Message::Notification(Notification::without_data(
                    NotificationErrorCode::HoldTimerExpired,
                    0,
                ))),
                Effect::TcpDisconnect,
            ]
        );
    }

    #[test]
    fn test_unsupported_version_in_open_sent_does_not_increment_counter() {
        let mut fsm = Fsm::new(
            65000,
            Ipv4Addr::new(172, 16, 1, 3),
            peer(65001, Ipv4Addr::new(172, 16, 1, 4), Ipv4Addr::new(172, 16, 1, 4)),
        );
        fsm.state = State::OpenSent;
        let before = fsm.connect_retry_counter();
        let notif = Notification::new(
            NotificationErrorCode::OpenMessageError,
            OpenMessageErrorSubcode::UnsupportedVersionNumber as u8,
            bytes::Bytes::copy_from_slice(&[4]),
        );
        fsm.handle(Event::Recv(Message::Notification(notif)));
        assert_eq!(fsm.state(), State::Idle);
        assert_eq!(fsm.connect_retry_counter(), before);
    }

    #[test]
    fn test_codec_rejected_unsupported_version_does_not_touch_counter() {
        // Scenario 5: the codec itself rejects a peer OPEN with an
        // unsupported version before the FSM ever sees an OPEN, routing the
        // resulting NOTIFICATION in as `Event::Send` rather than `Event::Recv`.
        let mut fsm = Fsm::new(
            65000,
            Ipv4Addr::new(172, 16, 1, 3),
            peer(65001, Ipv4Addr::new(172, 16, 1, 4), Ipv4Addr::new(172, 16, 1, 4)),
        );
        fsm.state = State::OpenSent;
        fsm.connect_retry_counter = 2;
        let notif = Notification::new(
            NotificationErrorCode::OpenMessageError,
            OpenMessageErrorSubcode::UnsupportedVersionNumber as u8,
            bytes::Bytes::copy_from_slice(&[4]),
        );
        let effects = fsm.handle(Event::Send(Message::Notification(notif)));
        assert_eq!(fsm.state(), State::Idle);
        assert_eq!(fsm.connect_retry_counter(), 2);
        assert!(effects.iter().any(|e| matches!(e, Effect::TcpDisconnect)));
    }

    #[test]
    fn test_manual_stop_from_established_resets_counter() {
        let mut fsm = Fsm::new(
            65000,
            Ipv4Addr::new(172, 16, 1, 3),
            peer(65001, Ipv4Addr::new(172, 16, 1, 4), Ipv4Addr::new(172, 16, 1, 4)),
        );
        fsm.state = State::Established;
        fsm.connect_retry_counter = 3;
        let effects = fsm.handle(Event::Stop(Origin::Manual));
        assert_eq!(fsm.state(), State::Idle);
        assert_eq!(fsm.connect_retry_counter(), 0);
        assert!(effects.iter().any(|e| matches!(e, Effect::TcpDisconnect)));
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::Send(Message::Notification(n)) if n.error_code == NotificationErrorCode::Cease
        )));
    }

    #[test]
    fn test_collision_dump_in_open_confirm() {
        let mut fsm = Fsm::new(
            65000,
            Ipv4Addr::new(172, 16, 1, 5),
            peer(65001, Ipv4Addr::new(172, 16, 1, 4), Ipv4Addr::new(172, 16, 1, 4)),
        );
        fsm.state = State::OpenConfirm;
        let effects = fsm.handle(Event::ErrorOpenCollisionDump);
        assert_eq!(fsm.state(), State::Idle);
        assert_eq!(effects.len(), 2);
        assert!(matches!(effects[1], Effect::TcpDisconnect));
    }

    #[test]
    fn test_every_event_in_every_state_terminates() {
        // Property: handle() never panics for any (state, event) pair.
        let states = [
            State::Idle,
            State::Connect,
            State::Active,
            State::OpenSent,
            State::OpenConfirm,
            State::Established,
        ];
        let events = || {
            vec![
                Event::Start(Origin::Automatic, Mode::Active),
                Event::Start(Origin::Automatic, Mode::Passive),
                Event::Stop(Origin::Manual),
                Event::TcpConnection(TcpOutcome::Succeeds),
                Event::TcpConnection(TcpOutcome::Fails),
                Event::TcpConnection(TcpOutcome::Confirmed),
                Event::Recv(Message::Keepalive),
                Event::Timer(TimerName::ConnectRetry),
                Event::Timer(TimerName::DelayOpen),
                Event::Timer(TimerName::HoldTime),
                Event::Timer(TimerName::KeepAlive),
                Event::ErrorOpenCollisionDump,
            ]
        };
        for state in states {
            for event in events() {
                let mut fsm = Fsm::new(
                    65000,
                    Ipv4Addr::new(172, 16, 1, 3),
                    peer(65001, Ipv4Addr::new(172, 16, 1, 4), Ipv4Addr::new(172, 16, 1, 4)),
                );
                fsm.state = state;
                let _ = fsm.handle(event);
            }
        }
    }
}
