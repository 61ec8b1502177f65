//! Low-level byte encoding helpers shared by every wire type.

// SPDX-License-Identifier: AGPL-3.0-or-later

use super::Error;
use bytes::{Buf, BufMut};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Check that the remaining buffer length matches the expected length.
macro_rules! check_remaining_len {
    ($src:expr, $len:expr, $name:expr) => {
        match $src.remaining().cmp(&$len) {
            std::cmp::Ordering::Equal => {}
            cmp => return Err($crate::packet::Error::InternalLength($name, cmp)),
        }
    };
}
pub(crate) use check_remaining_len;

/// A BGP wire component with a fixed length or a length implied by context.
pub trait Component {
    /// Decode the component from a buffer.
    fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, Error>
    where
        Self: Sized;

    /// Encode the component into a buffer. Returns the number of bytes written.
    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize;

    /// Find out the length of the component, preferably without encoding it.
    fn encoded_len(&self) -> usize;
}

impl Component for Ipv4Addr {
    fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, Error> {
        if src.remaining() < 4 {
            return Err(Error::InternalLength("IPv4 address", std::cmp::Ordering::Less));
        }
        Ok(Self::from(src.get_u32()))
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        dst.put_u32(self.into());
        4
    }

    fn encoded_len(&self) -> usize {
        4
    }
}

impl Component for Ipv6Addr {
    fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, Error> {
        if src.remaining() < 16 {
            return Err(Error::InternalLength("IPv6 address", std::cmp::Ordering::Less));
        }
        let mut octets = [0; 16];
        src.copy_to_slice(&mut octets);
        Ok(Self::from(octets))
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        dst.put_slice(&self.octets());
        16
    }

    fn encoded_len(&self) -> usize {
        16
    }
}

macro_rules! impl_component_for_intn {
    ($typ:ty, $getter:ident, $putter:ident, $n:expr) => {
        impl Component for $typ {
            fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, Error> {
                Ok(src.$getter())
            }

            fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
                dst.$putter(self);
                $n
            }

            fn encoded_len(&self) -> usize {
                $n
            }
        }
    };
}

impl_component_for_intn!(u8, get_u8, put_u8, 1);
impl_component_for_intn!(u16, get_u16, put_u16, 2);
impl_component_for_intn!(u32, get_u32, put_u32, 4);
