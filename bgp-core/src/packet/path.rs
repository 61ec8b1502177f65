//! BGP path attributes (RFC 4271 Section 4.3, RFC 4760 multiprotocol, RFC
//! 1997 communities).

// SPDX-License-Identifier: AGPL-3.0-or-later

use super::capability::{Afi, Safi};
use super::endec::{check_remaining_len, Component};
use super::route::Routes;
use bytes::{Buf, BufMut, Bytes};
use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::ops::Deref;

/// Ordered list of path attributes attached to an UPDATE message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathAttributes(pub Vec<Value>);

impl Component for PathAttributes {
    fn from_bytes(src: &mut Bytes) -> Result<Self, super::Error> {
        let mut attributes = Vec::new();
        while src.has_remaining() {
            attributes.push(Value::from_bytes(src)?);
        }
        Ok(Self(attributes))
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        for attribute in self.0 {
            len += attribute.to_bytes(dst);
        }
        len
    }

    fn encoded_len(&self) -> usize {
        self.0.iter().map(Value::encoded_len).sum()
    }
}

impl Deref for PathAttributes {
    type Target = Vec<Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A single path attribute: flags octet, type octet, and its decoded value.
#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    pub flags: Flags,
    pub data: Data,
}

impl Component for Value {
    fn from_bytes(src: &mut Bytes) -> Result<Self, super::Error> {
        let flags = Flags(src.get_u8());
        let type_ = src.get_u8();
        let len = if flags.is_extended_length() {
            src.get_u16() as usize
        } else {
            src.get_u8() as usize
        };
        if src.remaining() < len {
            return Err(super::Error::InternalLength(
                "path attribute",
                std::cmp::Ordering::Less,
            ));
        }
        let mut src = src.split_to(len);
        let data = match Type::from_u8(type_) {
            Some(Type::Origin) => Data::Origin(Origin::from_bytes(&mut src)?),
            Some(Type::AsPath) => Data::AsPath(AsPath::from_bytes(&mut src)?),
            Some(Type::NextHop) => {
                // Named distinctly from the generic IPv4-address guard in
                // `endec` so the codec can raise `InvalidNextHopAttribute`
                // instead of a generic malformed-attribute-list error.
                check_remaining_len!(src, 4, "NEXT_HOP");
                Data::NextHop(Ipv4Addr::from_bytes(&mut src)?)
            }
            Some(Type::MultiExitDisc) => Data::MultiExitDisc(src.get_u32()),
            Some(Type::LocalPref) => Data::LocalPref(src.get_u32()),
            Some(Type::AtomicAggregate) => Data::AtomicAggregate,
            Some(Type::Aggregator) => Data::Aggregator(Aggregator::from_bytes(&mut src)?),
            Some(Type::Communities) => Data::Communities(Communities::from_bytes(&mut src)?),
            Some(Type::MpReachNlri) => Data::MpReachNlri(MpReachNlri::from_bytes(&mut src)?),
            Some(Type::MpUnreachNlri) => Data::MpUnreachNlri(MpUnreachNlri::from_bytes(&mut src)?),
            Some(Type::As4Path) => Data::As4Path(AsPath::from_bytes(&mut src)?),
            None => Data::Unsupported(type_, src),
        };
        Ok(Self { flags, data })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        dst.put_u8(self.flags.0);
        len += 1;
        dst.put_u8(u8::from(&self.data));
        len += 1;
        let len_pos = dst.len();
        let two_byte_len = if self.flags.is_extended_length() {
            dst.put_u16(0); // placeholder
            len += 2;
            true
        } else {
            dst.put_u8(0); // placeholder
            len += 1;
            false
        };
        let data_len = match self.data {
            Data::Origin(origin) => origin.to_bytes(dst),
            Data::AsPath(as_path) | Data::As4Path(as_path) => as_path.to_bytes(dst),
            Data::NextHop(next_hop) => next_hop.to_bytes(dst),
            Data::MultiExitDisc(med) => med.to_bytes(dst),
            Data::LocalPref(local_pref) => local_pref.to_bytes(dst),
            Data::AtomicAggregate => 0,
            Data::Aggregator(agg) => agg.to_bytes(dst),
            Data::Communities(communities) => communities.to_bytes(dst),
            Data::MpReachNlri(mp_reach_nlri) => mp_reach_nlri.to_bytes(dst),
            Data::MpUnreachNlri(mp_unreach_nlri) => mp_unreach_nlri.to_bytes(dst),
            Data::Unsupported(_, data) => {
                let len = data.len();
                dst.put_slice(&data);
                len
            }
        };
        if two_byte_len {
            dst[len_pos..len_pos + 2].copy_from_slice(
                &u16::try_from(data_len)
                    .expect("path attribute length overflow")
                    .to_be_bytes(),
            );
        } else {
            dst[len_pos] = u8::try_from(data_len).expect("path attribute length overflow");
        }
        len + data_len
    }

    fn encoded_len(&self) -> usize {
        1 + 1
            + if self.flags.is_extended_length() { 2 } else { 1 }
            + match &self.data {
                Data::Origin(origin) => origin.encoded_len(),
                Data::AsPath(as_path) | Data::As4Path(as_path) => as_path.encoded_len(),
                Data::NextHop(next_hop) => next_hop.encoded_len(),
                Data::MultiExitDisc(_) | Data::LocalPref(_) => 4,
                Data::AtomicAggregate => 0,
                Data::Aggregator(agg) => agg.encoded_len(),
                Data::Communities(communities) => communities.encoded_len(),
                Data::MpReachNlri(mp_reach_nlri) => mp_reach_nlri.encoded_len(),
                Data::MpUnreachNlri(mp_unreach_nlri) => mp_unreach_nlri.encoded_len(),
                Data::Unsupported(_, data) => data.len(),
            }
    }
}

/// Path attribute flags octet (RFC 4271 Section 4.3).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Flags(pub u8);

impl Flags {
    pub const WELL_KNOWN_COMPLETE: Flags = Flags(0b0100_0000);
    pub const OPTIONAL_TRANSITIVE_COMPLETE: Flags = Flags(0b1100_0000);
    pub const OPTIONAL_TRANSITIVE_EXTENDED: Flags = Flags(0b1001_0000);

    #[must_use]
    pub const fn is_optional(self) -> bool {
        self.0 & 0x80 != 0
    }

    #[must_use]
    pub const fn is_transitive(self) -> bool {
        self.0 & 0x40 != 0
    }

    #[must_use]
    pub const fn is_partial(self) -> bool {
        self.0 & 0x20 != 0
    }

    #[must_use]
    pub const fn is_extended_length(self) -> bool {
        self.0 & 0x10 != 0
    }
}

/// Decoded value of a path attribute.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Data {
    Origin(Origin),
    AsPath(AsPath),
    /// BGP next hop (RFC 4271 Section 5.1.3)
    NextHop(Ipv4Addr),
    MultiExitDisc(u32),
    LocalPref(u32),
    AtomicAggregate,
    Aggregator(Aggregator),
    /// RFC 1997
    Communities(Communities),
    /// RFC 4760
    MpReachNlri(MpReachNlri),
    /// RFC 4760
    MpUnreachNlri(MpUnreachNlri),
    /// RFC 4893/6793
    As4Path(AsPath),
    Unsupported(u8, Bytes),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[non_exhaustive]
#[repr(u8)]
pub enum Type {
    Origin = 1,
    AsPath = 2,
    NextHop = 3,
    MultiExitDisc = 4,
    LocalPref = 5,
    AtomicAggregate = 6,
    Aggregator = 7,
    Communities = 8,
    MpReachNlri = 14,
    MpUnreachNlri = 15,
    As4Path = 17,
}

impl From<&Data> for u8 {
    fn from(data: &Data) -> u8 {
        match data {
            Data::Origin(_) => Type::Origin as u8,
            Data::AsPath(_) => Type::AsPath as u8,
            Data::NextHop(_) => Type::NextHop as u8,
            Data::MultiExitDisc(_) => Type::MultiExitDisc as u8,
            Data::LocalPref(_) => Type::LocalPref as u8,
            Data::AtomicAggregate => Type::AtomicAggregate as u8,
            Data::Aggregator(_) => Type::Aggregator as u8,
            Data::Communities(_) => Type::Communities as u8,
            Data::MpReachNlri(_) => Type::MpReachNlri as u8,
            Data::MpUnreachNlri(_) => Type::MpUnreachNlri as u8,
            Data::As4Path(_) => Type::As4Path as u8,
            Data::Unsupported(type_, _) => *type_,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum Origin {
    Igp = 0,
    Egp = 1,
    Incomplete = 2,
}

impl Component for Origin {
    fn from_bytes(src: &mut Bytes) -> Result<Self, super::Error> {
        let value = src.get_u8();
        Self::from_u8(value).ok_or(super::Error::InternalType("origin", u16::from(value)))
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        dst.put_u8(self as u8);
        1
    }

    fn encoded_len(&self) -> usize {
        1
    }
}

/// AS_PATH / AS4_PATH segment list (RFC 4271 Section 5.1.2, RFC 6793).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AsPath(pub Vec<AsSegment>);

impl Component for AsPath {
    fn from_bytes(src: &mut Bytes) -> Result<Self, super::Error> {
        let mut segments = Vec::new();
        while src.has_remaining() {
            segments.push(AsSegment::from_bytes(src)?);
        }
        Ok(Self(segments))
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        for segment in self.0 {
            len += segment.to_bytes(dst);
        }
        len
    }

    fn encoded_len(&self) -> usize {
        self.0.iter().map(AsSegment::encoded_len).sum()
    }
}

impl Deref for AsPath {
    type Target = Vec<AsSegment>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// One AS_PATH segment. The wire width of each ASN (2 or 4 octets) is
/// inferred from the segment's byte length on decode since RFC 6793 does not
/// add a new attribute type for 4-octet AS_PATH, only AS4_PATH alongside it.
#[derive(Clone, Debug, PartialEq)]
pub struct AsSegment {
    pub type_: AsSegmentType,
    pub asns: Vec<u32>,
    pub as4: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum AsSegmentType {
    AsSet = 1,
    AsSequence = 2,
    ConfedSequence = 3,
    ConfedSet = 4,
}

impl Component for AsSegment {
    fn from_bytes(src: &mut Bytes) -> Result<Self, super::Error> {
        let type_ = src.get_u8();
        let len = src.get_u8() as usize;
        if len == 0 {
            return Ok(Self {
                type_: AsSegmentType::from_u8(type_)
                    .ok_or(super::Error::InternalType("AS segment type", u16::from(type_)))?,
                asns: Vec::new(),
                as4: false,
            });
        }
        let remaining_len = src.remaining();
        let per_asn_len = remaining_len / len;
        let mut asns = Vec::with_capacity(len);
        let as4 = match per_asn_len {
            2 => {
                for _ in 0..len {
                    asns.push(u32::from(src.get_u16()));
                }
                false
            }
            4 => {
                for _ in 0..len {
                    asns.push(src.get_u32());
                }
                true
            }
            _ => {
                return Err(super::Error::InternalLength(
                    "AS segment",
                    std::cmp::Ordering::Equal,
                ))
            }
        };
        Ok(Self {
            type_: AsSegmentType::from_u8(type_)
                .ok_or(super::Error::InternalType("AS segment type", u16::from(type_)))?,
            asns,
            as4,
        })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let encoded_len = self.encoded_len();
        dst.put_u8(self.type_ as u8);
        dst.put_u8(u8::try_from(self.asns.len()).expect("AS segment length overflow"));
        for asn in self.asns {
            if self.as4 {
                dst.put_u32(asn);
            } else {
                dst.put_u16(u16::try_from(asn).expect("4-octet ASN in 2-octet AS path"));
            }
        }
        encoded_len
    }

    fn encoded_len(&self) -> usize {
        2 + self.asns.len() * if self.as4 { 4 } else { 2 }
    }
}

/// AGGREGATOR (RFC 4271 Section 5.1.7). Only the 2-octet ASN form is
/// implemented; AS4_AGGREGATOR is out of scope.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Aggregator {
    pub asn: u16,
    pub ip: Ipv4Addr,
}

impl Component for Aggregator {
    fn from_bytes(src: &mut Bytes) -> Result<Self, super::Error> {
        let asn = src.get_u16();
        let ip = Ipv4Addr::from_bytes(src)?;
        Ok(Self { asn, ip })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        dst.put_u16(self.asn);
        self.ip.to_bytes(dst) + 2
    }

    fn encoded_len(&self) -> usize {
        6
    }
}

/// COMMUNITIES (RFC 1997): opaque 32-bit tags, the high 16 bits conventionally
/// an ASN and the low 16 a locally-significant value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Communities(pub Vec<u32>);

impl Component for Communities {
    fn from_bytes(src: &mut Bytes) -> Result<Self, super::Error> {
        let mut values = Vec::new();
        while src.has_remaining() {
            values.push(src.get_u32());
        }
        Ok(Self(values))
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        for value in &self.0 {
            dst.put_u32(*value);
        }
        self.0.len() * 4
    }

    fn encoded_len(&self) -> usize {
        self.0.len() * 4
    }
}

impl Deref for Communities {
    type Target = Vec<u32>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// MP_REACH_NLRI (RFC 4760 Section 3).
#[derive(Clone, Debug, PartialEq)]
pub struct MpReachNlri {
    pub afi: Afi,
    pub safi: Safi,
    pub next_hop: MpNextHop,
    pub nlri: Routes,
}

impl Component for MpReachNlri {
    fn from_bytes(src: &mut Bytes) -> Result<Self, super::Error> {
        let afi_raw = src.get_u16();
        let afi = Afi::from_u16(afi_raw)
            .ok_or(super::Error::InternalType("MP_REACH_NLRI AFI", afi_raw))?;
        let safi_raw = src.get_u8();
        let safi = Safi::from_u16(u16::from(safi_raw))
            .ok_or(super::Error::InternalType("MP_REACH_NLRI SAFI", u16::from(safi_raw)))?;
        let nh_len = src.get_u8() as usize;
        if src.remaining() < nh_len {
            return Err(super::Error::InternalLength(
                "MP_REACH_NLRI next hop",
                std::cmp::Ordering::Less,
            ));
        }
        let mut nh_src = src.split_to(nh_len);
        let next_hop = MpNextHop::from_bytes(&mut nh_src)?;
        let _ = src.get_u8(); // SNPA count, reserved in practice
        let nlri = Routes::from_bytes(src)?;
        Ok(Self {
            afi,
            safi,
            next_hop,
            nlri,
        })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        dst.put_u16(self.afi as u16);
        len += 2;
        dst.put_u8(u8::try_from(self.safi as u16).expect("SAFI out of range"));
        len += 1;
        dst.put_u8(u8::try_from(self.next_hop.encoded_len()).expect("next hop length overflow"));
        len += 1;
        len += self.next_hop.to_bytes(dst);
        dst.put_u8(0); // SNPA count
        len += 1;
        len += self.nlri.to_bytes(dst);
        len
    }

    fn encoded_len(&self) -> usize {
        2 + 1 + 1 + self.next_hop.encoded_len() + 1 + self.nlri.encoded_len()
    }
}

/// MP_REACH_NLRI next hop, either a single address or an IPv6 address paired
/// with its link-local form (RFC 2545).
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MpNextHop {
    Single(IpAddr),
    V6AndLL(Ipv6Addr, Ipv6Addr),
}

impl Component for MpNextHop {
    fn from_bytes(src: &mut Bytes) -> Result<Self, super::Error> {
        match src.remaining() {
            4 => Ok(Self::Single(IpAddr::V4(Ipv4Addr::from_bytes(src)?))),
            16 => Ok(Self::Single(IpAddr::V6(Ipv6Addr::from_bytes(src)?))),
            32 => {
                let local = Ipv6Addr::from_bytes(src)?;
                let ll = Ipv6Addr::from_bytes(src)?;
                Ok(Self::V6AndLL(local, ll))
            }
            _ => Err(super::Error::InternalLength(
                "MP_REACH_NLRI next hop",
                std::cmp::Ordering::Equal,
            )),
        }
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        match self {
            Self::Single(IpAddr::V4(addr)) => addr.to_bytes(dst),
            Self::Single(IpAddr::V6(addr)) => addr.to_bytes(dst),
            Self::V6AndLL(local, ll) => local.to_bytes(dst) + ll.to_bytes(dst),
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            Self::Single(IpAddr::V4(_)) => 4,
            Self::Single(IpAddr::V6(_)) => 16,
            Self::V6AndLL(_, _) => 32,
        }
    }
}

impl From<IpAddr> for MpNextHop {
    fn from(ip: IpAddr) -> Self {
        Self::Single(ip)
    }
}

/// MP_UNREACH_NLRI (RFC 4760 Section 4).
#[derive(Clone, Debug, PartialEq)]
pub struct MpUnreachNlri {
    pub afi: Afi,
    pub safi: Safi,
    pub withdrawn_routes: Routes,
}

impl Component for MpUnreachNlri {
    fn from_bytes(src: &mut Bytes) -> Result<Self, super::Error> {
        let afi_raw = src.get_u16();
        let afi = Afi::from_u16(afi_raw)
            .ok_or(super::Error::InternalType("MP_UNREACH_NLRI AFI", afi_raw))?;
        let safi_raw = src.get_u8();
        let safi = Safi::from_u16(u16::from(safi_raw))
            .ok_or(super::Error::InternalType("MP_UNREACH_NLRI SAFI", u16::from(safi_raw)))?;
        let withdrawn_routes = Routes::from_bytes(src)?;
        Ok(Self {
            afi,
            safi,
            withdrawn_routes,
        })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        dst.put_u16(self.afi as u16);
        len += 2;
        dst.put_u8(u8::try_from(self.safi as u16).expect("SAFI out of range"));
        len += 1;
        len += self.withdrawn_routes.to_bytes(dst);
        len
    }

    fn encoded_len(&self) -> usize {
        3 + self.withdrawn_routes.encoded_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::tests::hex_to_bytes;

    #[test]
    fn test_origin() {
        let mut src = hex_to_bytes("40 01 01 00");
        let pa = Value::from_bytes(&mut src).unwrap();
        assert_eq!(
            pa,
            Value {
                flags: Flags(0x40),
                data: Data::Origin(Origin::Igp),
            }
        );
    }

    #[test]
    fn test_as2_aspath() {
        let mut src = hex_to_bytes("40 0204 0201 fd7d");
        let pa = Value::from_bytes(&mut src).unwrap();
        assert_eq!(
            pa,
            Value {
                flags: Flags(0x40),
                data: Data::AsPath(AsPath(vec![AsSegment {
                    type_: AsSegmentType::AsSequence,
                    asns: vec![0xfd7d],
                    as4: false
                }])),
            }
        );
    }

    #[test]
    fn test_as4_aspath() {
        let mut src = hex_to_bytes("40 02 0e 0203 fcde39d1 fcde3880 fcde3122");
        let pa = Value::from_bytes(&mut src).unwrap();
        assert_eq!(
            pa,
            Value {
                flags: Flags(0x40),
                data: Data::AsPath(AsPath(vec![AsSegment {
                    type_: AsSegmentType::AsSequence,
                    asns: vec![0xfcde39d1, 0xfcde3880, 0xfcde3122],
                    as4: true
                }])),
            }
        );
    }

    #[test]
    fn test_next_hop() {
        let mut src = hex_to_bytes("40 03 04 7f000001");
        let pa = Value::from_bytes(&mut src).unwrap();
        assert_eq!(
            pa,
            Value {
                flags: Flags(0x40),
                data: Data::NextHop(Ipv4Addr::new(127, 0, 0, 1)),
            }
        );
    }

    #[test]
    fn test_communities_round_trip() {
        let mut src = hex_to_bytes("c0 08 08 fbff 0004 fbff 0018");
        let pa = Value::from_bytes(&mut src).unwrap();
        assert_eq!(
            pa,
            Value {
                flags: Flags(0xc0),
                data: Data::Communities(Communities(vec![0xfbff_0004, 0xfbff_0018])),
            }
        );
        let mut out = bytes::BytesMut::new();
        pa.to_bytes(&mut out);
        assert_eq!(out.freeze(), hex_to_bytes("c0 08 08 fbff 0004 fbff 0018"));
    }

    #[test]
    fn test_as4path() {
        let mut src = hex_to_bytes("c0 11 06 0201 0000fd7d");
        let pa = Value::from_bytes(&mut src).unwrap();
        assert_eq!(
            pa,
            Value {
                flags: Flags(0xc0),
                data: Data::As4Path(AsPath(vec![AsSegment {
                    type_: AsSegmentType::AsSequence,
                    asns: vec![0xfd7d],
                    as4: true
                }])),
            }
        );
    }
}
