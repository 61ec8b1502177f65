//! Shared test helpers for wire-format round-trip tests.

// SPDX-License-Identifier: AGPL-3.0-or-later

use super::*;
use bytes::{BufMut, Bytes, BytesMut};

fn convert_one_hex_digit(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => panic!("invalid hex character: {}", c as char),
    }
}

/// Parse a hex dump into `Bytes`, ignoring whitespace and `:`/`.` separators
/// so Wireshark-style dumps can be pasted in verbatim.
pub fn hex_to_bytes(hex: &str) -> Bytes {
    let hex = hex.as_bytes();
    const SKIP: &[u8] = b" \t\n\r:.";
    let mut octets = BytesMut::with_capacity(hex.len() / 2);
    let mut i = 0;
    while i < hex.len() {
        let c = hex[i];
        if SKIP.contains(&c) {
            i += 1;
            continue;
        }
        let hi = convert_one_hex_digit(c) << 4;
        assert!(i + 1 < hex.len(), "odd number of hex digits");
        let lo = convert_one_hex_digit(hex[i + 1]);
        octets.put_u8(hi | lo);
        i += 2;
    }
    octets.freeze()
}

#[test]
fn test_sanity_hex_to_bytes() {
    assert_eq!(hex_to_bytes("00"), Bytes::from_static(&[0x00]));
    assert_eq!(hex_to_bytes("ff 00\tff"), Bytes::from_static(&[0xff, 0x00, 0xff]));
}

#[test]
fn test_keepalive_round_trips() {
    use crate::codec::Codec;
    use tokio_util::codec::{Decoder, Encoder};

    let data = hex_to_bytes("ffffffffffffffffffffffffffffffff001304");
    let mut src = data.clone().into();
    let mut codec = Codec::default();
    let msg = codec.decode(&mut src).unwrap().unwrap();
    assert_eq!(msg, Message::Keepalive);
    let mut out = BytesMut::new();
    codec.encode(Message::Keepalive, &mut out).unwrap();
    assert_eq!(out.freeze(), data);
}

#[test]
fn test_open_message_wsh() {
    use crate::codec::Codec;
    use tokio_util::codec::{Decoder, Encoder};

    // Dumped from a real BGP session.
    let data = hex_to_bytes("ffffffffffffffffffffffffffffffff 001d 01 04 fd7d 0078 ac1706a5 00");
    let mut src = data.clone().into();
    let mut codec = Codec::default();
    let msg = codec.decode(&mut src).unwrap().unwrap();
    let open = match msg {
        Message::Open(open) => open,
        _ => panic!("unexpected message type"),
    };
    assert_eq!(open.version, 4);
    assert_eq!(open.asn, 64893);
    assert_eq!(open.hold_time, 120);
    assert_eq!(open.bgp_id, std::net::Ipv4Addr::new(172, 23, 6, 165));
    assert_eq!(open.opt_params.len(), 0);
    let mut out = BytesMut::new();
    codec.encode(Message::Open(open), &mut out).unwrap();
    assert_eq!(out.freeze(), data);
}

#[test]
fn test_open_round_trips_with_capabilities() {
    use crate::codec::Codec;
    use tokio_util::codec::{Decoder, Encoder};

    let open = Open::new(
        65000,
        90,
        std::net::Ipv4Addr::new(172, 16, 1, 3),
        capability::CapabilitiesBuilder::new()
            .mp_ipv4_unicast()
            .route_refresh()
            .four_octet_as_number_if_needed(65000)
            .build(),
    );
    let mut buf = BytesMut::new();
    let mut codec = Codec::default();
    codec.encode(Message::Open(open.clone()), &mut buf).unwrap();

    let decoded = codec.decode(&mut buf).unwrap().unwrap();
    let Message::Open(decoded) = decoded else {
        panic!("unexpected message type")
    };
    assert_eq!(decoded, open);
    assert_eq!(decoded.resolved_asn(), 65000);
    assert!(decoded.capabilities().unwrap().has_route_refresh());
}

#[test]
fn test_notification_message_wsh() {
    use crate::codec::Codec;
    use tokio_util::codec::{Decoder, Encoder};

    let data = hex_to_bytes("ffffffffffffffffffffffffffffffff 0015 03 06 02");
    let mut src = data.clone().into();
    let mut codec = Codec::default();
    let msg = codec.decode(&mut src).unwrap().unwrap();
    let notif = match msg {
        Message::Notification(notif) => notif,
        _ => panic!("unexpected message type"),
    };
    assert_eq!(notif.error_code, NotificationErrorCode::Cease);
    assert_eq!(notif.error_subcode, CeaseSubcode::AdministrativeShutdown as u8);
    assert_eq!(notif.data, Bytes::from_static(&[]));
    let mut out = BytesMut::new();
    codec.encode(Message::Notification(notif), &mut out).unwrap();
    assert_eq!(out.freeze(), data);
}
