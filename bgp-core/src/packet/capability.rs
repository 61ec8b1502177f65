//! BGP OPEN message optional parameters and the capability parameter
//!
//! RFC 4271 Section 4.2 specifies the optional parameters that may be
//! included in the BGP OPEN message. The only optional parameter in
//! widespread use is the capability parameter (RFC 3392/5492), so both are
//! implemented in this module.

// SPDX-License-Identifier: AGPL-3.0-or-later

use super::endec::{check_remaining_len, Component};
use bytes::{Buf, BufMut, Bytes};
use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use std::ops::Deref;

/// A list of BGP optional parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptionalParameters(pub Vec<OptionalParameterValue>);

impl Component for OptionalParameters {
    fn from_bytes(src: &mut Bytes) -> Result<Self, super::Error> {
        // RFC 4271 4.2 Optional Parameters Length
        let len = src.get_u8() as usize;
        check_remaining_len!(src, len, "optional parameter length");
        let mut opt_params = Vec::new();
        // RFC 4271 4.2 Optional Parameters
        while src.has_remaining() {
            opt_params.push(OptionalParameterValue::from_bytes(src)?);
        }
        Ok(Self(opt_params))
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        let length_pos = dst.len();
        dst.put_u8(0); // Placeholder for length
        for param in self.0 {
            len += param.to_bytes(dst);
        }
        dst[length_pos] = u8::try_from(len).expect("optional parameters length overflow");
        len + 1
    }

    fn encoded_len(&self) -> usize {
        self.0.iter().map(Component::encoded_len).sum::<usize>() + 1
    }
}

impl From<Vec<OptionalParameterValue>> for OptionalParameters {
    fn from(params: Vec<OptionalParameterValue>) -> Self {
        Self(params)
    }
}

impl Deref for OptionalParameters {
    type Target = Vec<OptionalParameterValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// BGP optional parameter (RFC 4271 4.2)
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum OptionalParameterValue {
    Capabilities(Capabilities),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[non_exhaustive]
#[repr(u8)]
pub enum OptionalParameterType {
    Capabilities = 2,
}

impl Component for OptionalParameterValue {
    fn from_bytes(src: &mut Bytes) -> Result<Self, super::Error> {
        let param_type = src.get_u8();
        let param_len = src.get_u8() as usize;
        check_remaining_len!(src, param_len, "optional parameter");
        match OptionalParameterType::from_u8(param_type) {
            Some(OptionalParameterType::Capabilities) => {
                Ok(Self::Capabilities(Capabilities::from_bytes(src)?))
            }
            _ => Err(super::Error::InternalType(
                "optional parameter",
                u16::from(param_type),
            )),
        }
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let type_pos = dst.len();
        dst.put_u8(0);
        let len_pos = dst.len();
        dst.put_u8(0);
        match self {
            OptionalParameterValue::Capabilities(cap) => {
                let len = cap.to_bytes(dst);
                dst[type_pos] = OptionalParameterType::Capabilities as u8;
                dst[len_pos] = u8::try_from(len).expect("capabilities length overflow");
                len + 2
            }
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            OptionalParameterValue::Capabilities(cap) => cap.encoded_len() + 2,
        }
    }
}

/// BGP capability list (RFC 3392/5492). A speaker must accept multiple
/// instances of the same capability code, so this is a `Vec`, not a set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Capabilities(pub Vec<Value>);

impl Component for Capabilities {
    fn from_bytes(src: &mut Bytes) -> Result<Self, super::Error> {
        let mut cap = Vec::new();
        while src.has_remaining() {
            let code = src.get_u8();
            let len = src.get_u8() as usize;
            check_remaining_len!(src, len, "capability");
            let mut value_src = src.split_to(len);
            log::trace!("capability code {code}, length {len}");
            let value = match Type::from_u8(code) {
                Some(Type::MultiProtocol) => {
                    Value::MultiProtocol(MultiProtocol::from_bytes(&mut value_src)?)
                }
                Some(Type::RouteRefresh) => Value::RouteRefresh,
                Some(Type::ExtendedMessage) => Value::ExtendedMessage,
                Some(Type::GracefulRestart) => {
                    Value::GracefulRestart(value_src.copy_to_bytes(value_src.remaining()))
                }
                Some(Type::FourOctetAsNumber) => {
                    Value::FourOctetAsNumber(FourOctetAsNumber {
                        asn: value_src.get_u32(),
                    })
                }
                Some(Type::EnhancedRouteRefresh) => Value::EnhancedRouteRefresh,
                None => Value::Unsupported(code, value_src.copy_to_bytes(value_src.remaining())),
            };
            cap.push(value);
        }
        Ok(Self(cap))
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        for value in self.0 {
            dst.put_u8((&value).into());
            let len_pos = dst.len();
            dst.put_u8(0);
            let value_len = match value {
                Value::MultiProtocol(mp) => mp.to_bytes(dst),
                Value::RouteRefresh | Value::ExtendedMessage | Value::EnhancedRouteRefresh => 0,
                Value::GracefulRestart(data) => {
                    let len = data.len();
                    dst.put_slice(&data);
                    len
                }
                Value::FourOctetAsNumber(four) => four.asn.to_bytes(dst),
                Value::Unsupported(_, data) => {
                    let len = data.len();
                    dst.put_slice(&data);
                    len
                }
            };
            dst[len_pos] = u8::try_from(value_len).expect("capability length overflow");
            len += value_len + 2;
        }
        len
    }

    fn encoded_len(&self) -> usize {
        self.0
            .iter()
            .map(|v| {
                let len = match v {
                    Value::MultiProtocol(mp) => mp.encoded_len(),
                    Value::RouteRefresh | Value::ExtendedMessage | Value::EnhancedRouteRefresh => {
                        0
                    }
                    Value::GracefulRestart(data) | Value::Unsupported(_, data) => data.len(),
                    Value::FourOctetAsNumber(_) => 4,
                };
                len + 2
            })
            .sum()
    }
}

impl From<Vec<Value>> for Capabilities {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl Deref for Capabilities {
    type Target = Vec<Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Capabilities {
    /// Check if a specific capability is present.
    #[must_use]
    pub fn has(&self, cap: &Value) -> bool {
        self.0.iter().any(|v| *v == *cap)
    }

    /// Check if the IPv4/unicast multiprotocol capability is present.
    #[must_use]
    pub fn has_mp_ipv4_unicast(&self) -> bool {
        self.has(&Value::MultiProtocol(MultiProtocol {
            afi: Afi::Ipv4,
            safi: Safi::Unicast,
        }))
    }

    /// Check if the route refresh capability is present.
    #[must_use]
    pub fn has_route_refresh(&self) -> bool {
        self.has(&Value::RouteRefresh)
    }

    /// Check if the extended message capability is present.
    #[must_use]
    pub fn has_extended_message(&self) -> bool {
        self.has(&Value::ExtendedMessage)
    }

    /// Find the advertised four-octet ASN, if any.
    #[must_use]
    pub fn four_octet_asn(&self) -> Option<u32> {
        self.0.iter().find_map(|v| match v {
            Value::FourOctetAsNumber(four) => Some(four.asn),
            _ => None,
        })
    }

    /// Get the raw value of an unsupported capability code, collected so the
    /// caller can assemble an optional NOTIFICATION response.
    #[must_use]
    pub fn get_unsupported(&self, code: u8) -> Option<&Bytes> {
        self.0.iter().find_map(|v| match v {
            Value::Unsupported(c, data) if *c == code => Some(data),
            _ => None,
        })
    }

    /// Codes of every capability this side could not interpret.
    #[must_use]
    pub fn unsupported_codes(&self) -> Vec<u8> {
        self.0
            .iter()
            .filter_map(|v| match v {
                Value::Unsupported(c, _) => Some(*c),
                _ => None,
            })
            .collect()
    }
}

/// BGP capability (RFC 3392/5492).
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Value {
    /// Multi-protocol capability (RFC 2858), code 1.
    MultiProtocol(MultiProtocol),
    /// Route refresh capability (RFC 2918), code 2.
    RouteRefresh,
    /// Extended message capability (RFC 8654), code 6.
    ExtendedMessage,
    /// Graceful restart capability (RFC 4724), code 64. The value is kept
    /// opaque: this core does not implement graceful-restart state
    /// preservation, only lossless decode/re-encode of the capability.
    GracefulRestart(Bytes),
    /// Four-octet AS number capability (RFC 6793), code 65.
    FourOctetAsNumber(FourOctetAsNumber),
    /// Enhanced route refresh capability (RFC 7313), code 70.
    EnhancedRouteRefresh,
    /// Any other capability code, kept verbatim so it can be echoed or
    /// reported in a NOTIFICATION.
    Unsupported(u8, Bytes),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[non_exhaustive]
#[repr(u8)]
pub enum Type {
    MultiProtocol = 1,
    RouteRefresh = 2,
    ExtendedMessage = 6,
    GracefulRestart = 64,
    FourOctetAsNumber = 65,
    EnhancedRouteRefresh = 70,
}

impl From<&Value> for u8 {
    fn from(cap: &Value) -> Self {
        match cap {
            Value::MultiProtocol(_) => Type::MultiProtocol as u8,
            Value::RouteRefresh => Type::RouteRefresh as u8,
            Value::ExtendedMessage => Type::ExtendedMessage as u8,
            Value::GracefulRestart(_) => Type::GracefulRestart as u8,
            Value::FourOctetAsNumber(_) => Type::FourOctetAsNumber as u8,
            Value::EnhancedRouteRefresh => Type::EnhancedRouteRefresh as u8,
            Value::Unsupported(code, _) => *code,
        }
    }
}

/// Multi-protocol capability value field (RFC 2858 Section 7).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MultiProtocol {
    pub afi: Afi,
    pub safi: Safi,
}

impl Component for MultiProtocol {
    fn from_bytes(src: &mut Bytes) -> Result<Self, super::Error> {
        let afi_raw = src.get_u16();
        let afi = Afi::from_u16(afi_raw)
            .ok_or(super::Error::InternalType("MultiProtocol AFI", afi_raw))?;
        let _ = src.get_u8(); // Reserved
        let safi_raw = src.get_u8();
        let safi = Safi::from_u16(u16::from(safi_raw))
            .ok_or(super::Error::InternalType("MultiProtocol SAFI", u16::from(safi_raw)))?;
        Ok(Self { afi, safi })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        dst.put_u16(self.afi as u16);
        dst.put_u8(0); // Reserved
        dst.put_u8(self.safi as u8);
        self.encoded_len()
    }

    fn encoded_len(&self) -> usize {
        4
    }
}

/// Address family identifier (IANA registry).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[non_exhaustive]
#[repr(u16)]
pub enum Afi {
    Ipv4 = 1,
    Ipv6 = 2,
}

/// Subsequent address family identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[non_exhaustive]
#[repr(u16)]
pub enum Safi {
    Unicast = 1,
    Multicast = 2,
    MplsLabel = 4,
}

/// Four-octet AS number capability value field (RFC 6793).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FourOctetAsNumber {
    pub asn: u32,
}

/// Builder for BGP capabilities, mirroring the "chain calls, `.build()` at
/// the end" style used to assemble OPEN parameters for a session.
#[derive(Debug, Default)]
pub struct CapabilitiesBuilder {
    data: Vec<Value>,
}

impl CapabilitiesBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn multi_protocol(mut self, afi: Afi, safi: Safi) -> Self {
        self.data.push(Value::MultiProtocol(MultiProtocol { afi, safi }));
        self
    }

    #[must_use]
    pub fn mp_ipv4_unicast(self) -> Self {
        self.multi_protocol(Afi::Ipv4, Safi::Unicast)
    }

    #[must_use]
    pub fn route_refresh(mut self) -> Self {
        self.data.push(Value::RouteRefresh);
        self
    }

    #[must_use]
    pub fn extended_message(mut self) -> Self {
        self.data.push(Value::ExtendedMessage);
        self
    }

    #[must_use]
    pub fn four_octet_as_number(mut self, asn: u32) -> Self {
        self.data.push(Value::FourOctetAsNumber(FourOctetAsNumber { asn }));
        self
    }

    /// Only advertise the four-octet ASN capability if it is actually needed.
    #[must_use]
    pub fn four_octet_as_number_if_needed(self, asn: u32) -> Self {
        if asn > u32::from(u16::MAX) {
            self.four_octet_as_number(asn)
        } else {
            self
        }
    }

    #[must_use]
    pub fn build(self) -> Capabilities {
        Capabilities(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_builder() {
        let cap = CapabilitiesBuilder::new()
            .mp_ipv4_unicast()
            .route_refresh()
            .four_octet_as_number(65536)
            .build();
        assert_eq!(cap.0.len(), 3);
        assert!(cap.has_mp_ipv4_unicast());
        assert!(cap.has_route_refresh());
        assert_eq!(cap.four_octet_asn(), Some(65536));
    }

    #[test]
    fn test_four_octet_as_number_if_needed() {
        assert!(CapabilitiesBuilder::new()
            .four_octet_as_number_if_needed(65000)
            .build()
            .0
            .is_empty());
        assert_eq!(
            CapabilitiesBuilder::new()
                .four_octet_as_number_if_needed(70000)
                .build()
                .four_octet_asn(),
            Some(70000)
        );
    }

    #[test]
    fn test_unsupported_capability_round_trips() {
        let mut src = crate::packet::tests::hex_to_bytes("ff 04 01 02 03 04");
        let caps = Capabilities::from_bytes(&mut src).unwrap();
        assert_eq!(caps.get_unsupported(0xff).unwrap().as_ref(), &[1, 2, 3, 4]);
        assert_eq!(caps.unsupported_codes(), vec![0xff]);
    }
}
