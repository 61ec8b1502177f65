//! BGP message framing (RFC 4271 Section 4.1) as a `tokio_util` codec.
//!
//! [`Codec`] wraps the wire types in [`crate::packet`] with the framing
//! rules a raw `Component` impl cannot express on its own: marker and length
//! validation, the message-type dispatch, and the negotiated length ceiling
//! (4096 bytes normally, 65535 with the Extended Message capability, RFC
//! 8654).

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::packet::{
    Component, Error as PacketError, FiniteStateMachineErrorSubcode, Message,
    MessageHeaderErrorSubcode, MessageType, Notification, NotificationErrorCode, Open,
    Update, BGP_VERSION, MARKER,
};
use bytes::{Buf, BufMut};
use num_traits::FromPrimitive;
use tokio_util::codec::{Decoder, Encoder};

/// Default maximum BGP message length (RFC 4271 Section 4.1).
pub const DEFAULT_MAX_LEN: usize = 4096;

/// Maximum message length once both sides have negotiated the Extended
/// Message capability (RFC 8654 Section 2).
pub const EXTENDED_MAX_LEN: usize = 65535;

const HEADER_LEN: usize = 19;

/// Streaming encoder/decoder for BGP messages.
///
/// A fresh session starts with the default 4096-byte ceiling; call
/// [`Codec::set_extended_message`] once the peer's OPEN capabilities are
/// known, mirroring the way the FSM snapshot feeds capability state back
/// into decoding (spec: "the codec consults the FSM snapshot for negotiated
/// capabilities").
#[derive(Copy, Clone, Debug)]
pub struct Codec {
    max_len: usize,
}

impl Default for Codec {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_MAX_LEN,
        }
    }
}

impl Codec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise (or lower) the message length ceiling once Extended Message
    /// capability negotiation is known.
    pub fn set_extended_message(&mut self, enabled: bool) {
        self.max_len = if enabled { EXTENDED_MAX_LEN } else { DEFAULT_MAX_LEN };
    }
}

impl Decoder for Codec {
    type Item = Message;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut bytes::BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }
        let length = u16::from_be_bytes([src[16], src[17]]) as usize;
        if length < HEADER_LEN || length > self.max_len {
            return Err(DecodeError::notification(
                NotificationErrorCode::MessageHeaderError,
                MessageHeaderErrorSubcode::BadMessageLength as u8,
                bytes::Bytes::copy_from_slice(&src[16..18]),
            ));
        }
        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }

        let marker = src.copy_to_bytes(16);
        if *marker != MARKER {
            return Err(DecodeError::notification(
                NotificationErrorCode::MessageHeaderError,
                MessageHeaderErrorSubcode::ConnectionNotSynchronized as u8,
                bytes::Bytes::new(),
            ));
        }
        let _total_len = src.get_u16();
        let msg_type = src.get_u8();
        let body_len = length - HEADER_LEN;
        let mut body = src.split_to(body_len).into();

        let message = match MessageType::from_u8(msg_type) {
            Some(MessageType::Open) => {
                let open = Open::from_bytes(&mut body).map_err(DecodeError::from_packet)?;
                if open.version != BGP_VERSION {
                    return Err(DecodeError::notification(
                        NotificationErrorCode::OpenMessageError,
                        crate::packet::OpenMessageErrorSubcode::UnsupportedVersionNumber as u8,
                        bytes::Bytes::copy_from_slice(&[BGP_VERSION]),
                    ));
                }
                if open.bgp_id.is_unspecified() {
                    return Err(DecodeError::notification(
                        NotificationErrorCode::OpenMessageError,
                        crate::packet::OpenMessageErrorSubcode::BadBgpIdentifier as u8,
                        bytes::Bytes::new(),
                    ));
                }
                Message::Open(open)
            }
            Some(MessageType::Update) => {
                Message::Update(Update::from_bytes(&mut body).map_err(DecodeError::from_packet)?)
            }
            Some(MessageType::Notification) => Message::Notification(
                Notification::from_bytes(&mut body).map_err(DecodeError::from_packet)?,
            ),
            Some(MessageType::Keepalive) => Message::Keepalive,
            None => {
                return Err(DecodeError::notification(
                    NotificationErrorCode::MessageHeaderError,
                    MessageHeaderErrorSubcode::BadMessageType as u8,
                    bytes::Bytes::copy_from_slice(&[msg_type]),
                ))
            }
        };

        if body.has_remaining() {
            log::debug!("{} trailing bytes after decoding {msg_type}", body.remaining());
            return Err(DecodeError::notification(
                NotificationErrorCode::MessageHeaderError,
                MessageHeaderErrorSubcode::BadMessageLength as u8,
                bytes::Bytes::new(),
            ));
        }
        Ok(Some(message))
    }
}

impl Encoder<Message> for Codec {
    type Error = std::io::Error;

    fn encode(&mut self, item: Message, dst: &mut bytes::BytesMut) -> Result<(), Self::Error> {
        dst.put_slice(&MARKER);
        let len_pos = dst.len();
        dst.put_u16(0); // placeholder
        let body_len = match item {
            Message::Open(open) => {
                dst.put_u8(MessageType::Open as u8);
                open.to_bytes(dst)
            }
            Message::Update(update) => {
                dst.put_u8(MessageType::Update as u8);
                update.to_bytes(dst)
            }
            Message::Notification(notification) => {
                dst.put_u8(MessageType::Notification as u8);
                notification.to_bytes(dst)
            }
            Message::Keepalive => {
                dst.put_u8(MessageType::Keepalive as u8);
                0
            }
        };
        let total_len = HEADER_LEN + body_len;
        let total_len = u16::try_from(total_len).expect("message length overflow");
        dst[len_pos..len_pos + 2].copy_from_slice(&total_len.to_be_bytes());
        Ok(())
    }
}

/// A decode failure that maps directly onto the NOTIFICATION the caller
/// must send back to the peer (RFC 4271 Section 6.1/6.2/6.3).
#[derive(Debug, thiserror::Error)]
#[error("{error_code:?}/{error_subcode}: {source}")]
pub struct DecodeError {
    pub error_code: NotificationErrorCode,
    pub error_subcode: u8,
    pub data: bytes::Bytes,
    #[source]
    source: DecodeErrorSource,
}

#[derive(Debug, thiserror::Error)]
enum DecodeErrorSource {
    #[error(transparent)]
    Packet(#[from] PacketError),
    #[error("framing violation")]
    Framing,
}

impl DecodeError {
    fn notification(error_code: NotificationErrorCode, error_subcode: u8, data: bytes::Bytes) -> Self {
        Self {
            error_code,
            error_subcode,
            data,
            source: DecodeErrorSource::Framing,
        }
    }

    fn from_packet(err: PacketError) -> Self {
        let (error_code, error_subcode, data) = match &err {
            PacketError::Marker => (
                NotificationErrorCode::MessageHeaderError,
                MessageHeaderErrorSubcode::ConnectionNotSynchronized as u8,
                bytes::Bytes::new(),
            ),
            PacketError::MessageType(_) => (
                NotificationErrorCode::MessageHeaderError,
                MessageHeaderErrorSubcode::BadMessageType as u8,
                bytes::Bytes::new(),
            ),
            PacketError::InternalLength(name, _) if *name == "NEXT_HOP" => (
                NotificationErrorCode::UpdateMessageError,
                crate::packet::UpdateMessageErrorSubcode::InvalidNextHopAttribute as u8,
                bytes::Bytes::copy_from_slice(&[crate::packet::path::Type::NextHop as u8]),
            ),
            PacketError::MissingWellKnownAttribute(type_) => (
                NotificationErrorCode::UpdateMessageError,
                crate::packet::UpdateMessageErrorSubcode::MissingWellKnownAttribute as u8,
                bytes::Bytes::copy_from_slice(&[*type_]),
            ),
            PacketError::InternalLength(..) | PacketError::InternalType(..) | PacketError::Io(_) => (
                NotificationErrorCode::UpdateMessageError,
                crate::packet::UpdateMessageErrorSubcode::MalformedAttributeList as u8,
                bytes::Bytes::new(),
            ),
        };
        Self {
            error_code,
            error_subcode,
            data,
            source: DecodeErrorSource::Packet(err),
        }
    }

    /// Turn this decode failure into the NOTIFICATION the session must send.
    #[must_use]
    pub fn into_notification(self) -> Notification {
        Notification::new(self.error_code, self.error_subcode, self.data)
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        Self::from_packet(PacketError::Io(err))
    }
}

/// An event delivered to the FSM for an unexpected message arriving in a
/// state that does not accept it (RFC 4271 Section 8).
#[must_use]
pub fn unexpected_message_subcode(state_name: &str) -> FiniteStateMachineErrorSubcode {
    match state_name {
        "open_sent" => FiniteStateMachineErrorSubcode::UnexpectedMessageInOpenSent,
        "open_confirm" => FiniteStateMachineErrorSubcode::UnexpectedMessageInOpenConfirm,
        _ => FiniteStateMachineErrorSubcode::UnexpectedMessageInEstablished,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::tests::hex_to_bytes;

    #[test]
    fn test_rejects_bad_marker() {
        let mut src = hex_to_bytes("00000000000000000000000000000000 0013 04").into();
        let mut codec = Codec::default();
        let err = codec.decode(&mut src).unwrap_err();
        assert_eq!(err.error_code, NotificationErrorCode::MessageHeaderError);
        assert_eq!(
            err.error_subcode,
            MessageHeaderErrorSubcode::ConnectionNotSynchronized as u8
        );
    }

    #[test]
    fn test_rejects_short_length() {
        let mut src = hex_to_bytes("ffffffffffffffffffffffffffffffff 0005 04").into();
        let mut codec = Codec::default();
        let err = codec.decode(&mut src).unwrap_err();
        assert_eq!(err.error_code, NotificationErrorCode::MessageHeaderError);
        assert_eq!(err.error_subcode, MessageHeaderErrorSubcode::BadMessageLength as u8);
    }

    #[test]
    fn test_rejects_length_over_default_ceiling_until_extended() {
        // An otherwise-valid KEEPALIVE padded out past the default ceiling.
        let body = vec![0u8; 4100 - HEADER_LEN];
        let mut bytes = bytes::BytesMut::new();
        bytes.put_slice(&MARKER);
        bytes.put_u16(4100);
        bytes.put_u8(MessageType::Keepalive as u8);
        bytes.put_slice(&body);
        let mut codec = Codec::default();
        let err = codec.decode(&mut bytes.clone()).unwrap_err();
        assert_eq!(err.error_subcode, MessageHeaderErrorSubcode::BadMessageLength as u8);

        codec.set_extended_message(true);
        // Past the length gate, but a KEEPALIVE must have an empty body, so it
        // still fails -- just for a different reason than the length ceiling.
        let err = codec.decode(&mut bytes).unwrap_err();
        assert_eq!(err.error_subcode, MessageHeaderErrorSubcode::BadMessageLength as u8);
        assert!(err.data.is_empty());
    }

    #[test]
    fn test_rejects_unsupported_version() {
        let mut src = hex_to_bytes("ffffffffffffffffffffffffffffffff 001d 01 03 fd7d 0078 ac1706a5 00").into();
        let mut codec = Codec::default();
        let err = codec.decode(&mut src).unwrap_err();
        assert_eq!(err.error_code, NotificationErrorCode::OpenMessageError);
        assert_eq!(err.data.as_ref(), &[BGP_VERSION]);
    }

    #[test]
    fn test_rejects_zero_bgp_identifier() {
        let mut src = hex_to_bytes("ffffffffffffffffffffffffffffffff 001d 01 04 fd7d 0078 00000000 00").into();
        let mut codec = Codec::default();
        let err = codec.decode(&mut src).unwrap_err();
        assert_eq!(err.error_code, NotificationErrorCode::OpenMessageError);
        assert_eq!(
            err.error_subcode,
            crate::packet::OpenMessageErrorSubcode::BadBgpIdentifier as u8
        );
    }
}
