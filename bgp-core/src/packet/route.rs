//! BGP NLRI / withdrawn-routes encoding (RFC 4271 Section 4.3)
//!
//! These structures do not carry the address family of the route; that is
//! implied by context (the top-level UPDATE body vs. MP_REACH_NLRI/
//! MP_UNREACH_NLRI), exactly as on the wire.

// SPDX-License-Identifier: AGPL-3.0-or-later

use super::cidr::{Cidr, Cidr4, Cidr6};
use super::endec::Component;
use bytes::{Buf, BufMut, Bytes};
use std::ops::Deref;

/// Compute the number of prefix octets from the prefix length.
fn n_prefix_octets(prefix_len: u8) -> usize {
    #[allow(clippy::verbose_bit_mask)]
    let result = if prefix_len & 0x07 == 0 {
        prefix_len >> 3
    } else {
        (prefix_len >> 3) + 1
    };
    usize::from(result)
}

/// A single prefix: a bit length and the minimal number of octets to hold it.
#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    pub prefix_len: u8,
    pub prefix: Bytes,
}

/// A compact list of prefixes without a surrounding length field (the caller
/// owns the length field, since withdrawn-routes and NLRI share this format
/// but are framed differently).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Routes(pub Vec<Value>);

impl Component for Routes {
    fn from_bytes(src: &mut Bytes) -> Result<Self, super::Error> {
        let mut routes = Vec::new();
        while src.has_remaining() {
            let prefix_len = src.get_u8();
            let n = n_prefix_octets(prefix_len);
            if src.remaining() < n {
                return Err(super::Error::InternalLength(
                    "NLRI prefix",
                    std::cmp::Ordering::Less,
                ));
            }
            let prefix = src.split_to(n);
            routes.push(Value { prefix_len, prefix });
        }
        Ok(Self(routes))
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        for route in self.0 {
            dst.put_u8(route.prefix_len);
            dst.put_slice(&route.prefix);
            len += 1 + route.prefix.len();
        }
        len
    }

    fn encoded_len(&self) -> usize {
        Self::slice_encoded_len(&self.0)
    }
}

impl Deref for Routes {
    type Target = Vec<Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Routes {
    fn slice_encoded_len(routes: &[Value]) -> usize {
        routes.iter().map(|r| 1 + r.prefix.len()).sum()
    }
}

impl<I, T> From<I> for Routes
where
    I: IntoIterator<Item = T>,
    T: Into<Value>,
{
    fn from(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Cidr4> for Value {
    fn from(cidr: Cidr4) -> Self {
        let prefix_len = cidr.prefix_len;
        let n = n_prefix_octets(prefix_len);
        let prefix = Bytes::copy_from_slice(&cidr.addr.octets()[..n]);
        Self { prefix_len, prefix }
    }
}

impl From<Cidr6> for Value {
    fn from(cidr: Cidr6) -> Self {
        let prefix_len = cidr.prefix_len;
        let n = n_prefix_octets(prefix_len);
        let prefix = Bytes::copy_from_slice(&cidr.addr.octets()[..n]);
        Self { prefix_len, prefix }
    }
}

impl From<Cidr> for Value {
    fn from(cidr: Cidr) -> Self {
        match cidr {
            Cidr::V4(cidr) => cidr.into(),
            Cidr::V6(cidr) => cidr.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::tests::hex_to_bytes;

    #[test]
    fn test_convert_cidr_to_route_on_boundary() {
        let cidr4 = Cidr4::new("127.0.0.0".parse().unwrap(), 8);
        let route4 = Value::from(cidr4);
        assert_eq!(route4.prefix, hex_to_bytes("7f"));
        assert_eq!(route4.prefix_len, 8);
    }

    #[test]
    fn test_convert_cidr_to_route_off_boundary() {
        let cidr4 = Cidr4::new("172.24.0.0".parse().unwrap(), 12);
        let route4 = Value::from(cidr4);
        assert_eq!(route4.prefix, hex_to_bytes("ac18"));
        assert_eq!(route4.prefix_len, 12);
    }

    #[test]
    fn test_routes_round_trip() {
        let mut bytes = hex_to_bytes("20 c0a80000 18 0a0000");
        let routes = Routes::from_bytes(&mut bytes).unwrap();
        assert_eq!(routes.0.len(), 2);
        assert_eq!(routes.0[0].prefix_len, 32);
        assert_eq!(routes.0[1].prefix_len, 24);
        let mut out = bytes::BytesMut::new();
        routes.to_bytes(&mut out);
        assert_eq!(out.freeze(), hex_to_bytes("20 c0a80000 18 0a0000"));
    }

    #[test]
    fn test_truncated_prefix_is_rejected() {
        let mut bytes = hex_to_bytes("20 c0a8");
        assert!(Routes::from_bytes(&mut bytes).is_err());
    }
}
