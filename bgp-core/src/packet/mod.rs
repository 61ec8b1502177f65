//! BGP-4 wire format (RFC 4271) — message bodies, path attributes, NLRI and
//! capability encoding.
//!
//! Types here describe the data carried by a BGP message, not the framing
//! around it (see [`crate::codec`] for that). Every component implements
//! [`endec::Component`], a small from_bytes/to_bytes/encoded_len trait that
//! keeps encode and decode next to each other instead of split across a
//! `Codec` impl.

// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod capability;
pub mod cidr;
pub(crate) mod endec;
pub mod path;
pub mod route;
#[cfg(test)]
pub(crate) mod tests;

pub use endec::Component;

use bytes::{Buf, BufMut};
use capability::{Capabilities, OptionalParameterValue, OptionalParameters};
use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use path::PathAttributes;
use route::Routes;
use std::net::Ipv4Addr;

/// 16-octet all-ones marker that opens every BGP message (RFC 4271 4.1).
pub const MARKER: [u8; 16] = [0xff; 16];

/// The only BGP version this engine speaks.
pub const BGP_VERSION: u8 = 4;

/// Reserved ASN used in the 2-octet `My Autonomous System` field of OPEN
/// when the real ASN does not fit in 16 bits (RFC 6793 Section 4).
pub const AS_TRANS: u16 = 23456;

/// Errors raised while decoding or encoding a BGP message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid or missing marker")]
    Marker,
    #[error("invalid message type {0}")]
    MessageType(u8),
    #[error("invalid internal length at {0} ({1:?})")]
    InternalLength(&'static str, std::cmp::Ordering),
    #[error("invalid {0} type of {1}")]
    InternalType(&'static str, u16),
    #[error("missing mandatory well-known attribute type {0}")]
    MissingWellKnownAttribute(u8),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum MessageType {
    Open = 1,
    Update = 2,
    Notification = 3,
    Keepalive = 4,
}

/// A decoded BGP message body, without the 19-octet header.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Open(Open),
    Update(Update),
    Notification(Notification),
    Keepalive,
}

impl Message {
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::Open(_) => MessageType::Open,
            Self::Update(_) => MessageType::Update,
            Self::Notification(_) => MessageType::Notification,
            Self::Keepalive => MessageType::Keepalive,
        }
    }
}

/// BGP OPEN message (RFC 4271 Section 4.2).
#[derive(Clone, Debug, PartialEq)]
pub struct Open {
    pub version: u8,
    pub asn: u16,
    pub hold_time: u16,
    pub bgp_id: Ipv4Addr,
    pub opt_params: OptionalParameters,
}

impl Component for Open {
    fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, Error> {
        if src.remaining() < 10 {
            return Err(Error::InternalLength("OPEN", std::cmp::Ordering::Less));
        }
        let version = src.get_u8();
        let asn = src.get_u16();
        let hold_time = src.get_u16();
        let bgp_id = Ipv4Addr::from(src.get_u32());
        let opt_params = OptionalParameters::from_bytes(src)?;
        Ok(Self {
            version,
            asn,
            hold_time,
            bgp_id,
            opt_params,
        })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        len += self.version.to_bytes(dst);
        len += self.asn.to_bytes(dst);
        len += self.hold_time.to_bytes(dst);
        len += self.bgp_id.to_bytes(dst);
        len += self.opt_params.to_bytes(dst);
        len
    }

    fn encoded_len(&self) -> usize {
        1 + 2 + 2 + 4 + self.opt_params.encoded_len()
    }
}

impl Open {
    /// Build an OPEN advertising `capabilities`, falling back to
    /// [`AS_TRANS`] in the legacy 2-octet ASN field when `asn` does not fit.
    #[must_use]
    pub fn new(asn: u32, hold_time: u16, bgp_id: Ipv4Addr, capabilities: Capabilities) -> Self {
        let legacy_asn = if asn > u32::from(u16::MAX) {
            AS_TRANS
        } else {
            u16::try_from(asn).expect("checked above")
        };
        Self {
            version: BGP_VERSION,
            asn: legacy_asn,
            hold_time,
            bgp_id,
            opt_params: vec![OptionalParameterValue::Capabilities(capabilities)].into(),
        }
    }

    /// The negotiated ASN: the four-octet capability value if advertised,
    /// otherwise the legacy field (including [`AS_TRANS`] verbatim, which
    /// the caller must resolve via the four-octet capability of the *other*
    /// side, per RFC 6793 Section 4.2.3).
    #[must_use]
    pub fn resolved_asn(&self) -> u32 {
        self.capabilities()
            .and_then(Capabilities::four_octet_asn)
            .unwrap_or(u32::from(self.asn))
    }

    /// Extract the capability list, if the OPEN carried one.
    #[must_use]
    pub fn capabilities(&self) -> Option<&Capabilities> {
        self.opt_params.iter().find_map(|p| match p {
            OptionalParameterValue::Capabilities(cap) => Some(cap),
        })
    }
}

/// BGP UPDATE message (RFC 4271 Section 4.3).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Update {
    pub withdrawn_routes: Routes,
    pub path_attributes: PathAttributes,
    pub nlri: Routes,
}

impl Component for Update {
    fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, Error> {
        let withdrawn_len = src.get_u16() as usize;
        if src.remaining() < withdrawn_len {
            return Err(Error::InternalLength(
                "withdrawn routes",
                std::cmp::Ordering::Less,
            ));
        }
        let mut wdr_buf = src.split_to(withdrawn_len);
        let withdrawn_routes = Routes::from_bytes(&mut wdr_buf)?;
        let tpa_len = src.get_u16() as usize;
        if src.remaining() < tpa_len {
            return Err(Error::InternalLength(
                "total path attributes",
                std::cmp::Ordering::Less,
            ));
        }
        let mut tpa_buf = src.split_to(tpa_len);
        let path_attributes = PathAttributes::from_bytes(&mut tpa_buf)?;
        let nlri = Routes::from_bytes(src)?;

        if !nlri.is_empty() {
            let has = |want: fn(&path::Data) -> bool| path_attributes.iter().any(|v| want(&v.data));
            if !has(|d| matches!(d, path::Data::Origin(_))) {
                return Err(Error::MissingWellKnownAttribute(path::Type::Origin as u8));
            }
            if !has(|d| matches!(d, path::Data::AsPath(_))) {
                return Err(Error::MissingWellKnownAttribute(path::Type::AsPath as u8));
            }
            if !has(|d| matches!(d, path::Data::NextHop(_))) {
                return Err(Error::MissingWellKnownAttribute(path::Type::NextHop as u8));
            }
        }

        Ok(Self {
            withdrawn_routes,
            path_attributes,
            nlri,
        })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        let wdr_len_pos = dst.len();
        dst.put_u16(0); // placeholder
        len += 2;
        let wdr_len = self.withdrawn_routes.to_bytes(dst);
        len += wdr_len;
        dst[wdr_len_pos..wdr_len_pos + 2]
            .copy_from_slice(&u16::try_from(wdr_len).expect("withdrawn routes overflow").to_be_bytes());

        let tpa_len_pos = dst.len();
        dst.put_u16(0); // placeholder
        len += 2;
        let tpa_len = self.path_attributes.to_bytes(dst);
        len += tpa_len;
        dst[tpa_len_pos..tpa_len_pos + 2]
            .copy_from_slice(&u16::try_from(tpa_len).expect("path attributes overflow").to_be_bytes());

        len += self.nlri.to_bytes(dst);
        len
    }

    fn encoded_len(&self) -> usize {
        2 + self.withdrawn_routes.encoded_len()
            + 2
            + self.path_attributes.encoded_len()
            + self.nlri.encoded_len()
    }
}

/// BGP NOTIFICATION message (RFC 4271 Section 4.5).
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub error_code: NotificationErrorCode,
    pub error_subcode: u8,
    pub data: bytes::Bytes,
}

impl Component for Notification {
    fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, Error> {
        let error_code = src.get_u8();
        let error_subcode = src.get_u8();
        let data = src.copy_to_bytes(src.remaining());
        Ok(Self {
            error_code: NotificationErrorCode::from_u8(error_code)
                .ok_or(Error::InternalType("error_code", u16::from(error_code)))?,
            error_subcode,
            data,
        })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = (self.error_code as u8).to_bytes(dst);
        len += self.error_subcode.to_bytes(dst);
        len += self.data.len();
        dst.put_slice(&self.data);
        len
    }

    fn encoded_len(&self) -> usize {
        2 + self.data.len()
    }
}

impl Notification {
    #[must_use]
    pub const fn new(error_code: NotificationErrorCode, error_subcode: u8, data: bytes::Bytes) -> Self {
        Self {
            error_code,
            error_subcode,
            data,
        }
    }

    /// Build a notification with no data field, for subcodes that carry none.
    #[must_use]
    pub fn without_data(error_code: NotificationErrorCode, error_subcode: u8) -> Self {
        Self::new(error_code, error_subcode, bytes::Bytes::new())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum NotificationErrorCode {
    MessageHeaderError = 1,
    OpenMessageError = 2,
    UpdateMessageError = 3,
    HoldTimerExpired = 4,
    FiniteStateMachineError = 5,
    Cease = 6,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum MessageHeaderErrorSubcode {
    ConnectionNotSynchronized = 1,
    BadMessageLength = 2,
    BadMessageType = 3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum OpenMessageErrorSubcode {
    UnsupportedVersionNumber = 1,
    BadPeerAs = 2,
    BadBgpIdentifier = 3,
    UnsupportedOptionalParameter = 4,
    UnacceptableHoldTime = 6,
    UnsupportedCapability = 7,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum UpdateMessageErrorSubcode {
    MalformedAttributeList = 1,
    UnrecognizedWellKnownAttribute = 2,
    MissingWellKnownAttribute = 3,
    AttributeFlagsError = 4,
    AttributeLengthError = 5,
    InvalidOriginAttribute = 6,
    AsRoutingLoop = 7,
    InvalidNextHopAttribute = 8,
    OptionalAttributeError = 9,
    InvalidNetworkField = 10,
    MalformedAsPath = 11,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum FiniteStateMachineErrorSubcode {
    UnexpectedMessageInOpenSent = 1,
    UnexpectedMessageInOpenConfirm = 2,
    UnexpectedMessageInEstablished = 3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum CeaseSubcode {
    MaximumNumberOfPrefixesReached = 1,
    AdministrativeShutdown = 2,
    PeerDeconfigured = 3,
    AdministrativeReset = 4,
    ConnectionRejected = 5,
    OtherConfigurationChange = 6,
    ConnectionCollisionResolution = 7,
    OutOfResources = 8,
}
