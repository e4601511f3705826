use std::borrow::Cow;

use bytes::BytesMut;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::buf::BufExt;
use crate::decoding::Decode;
use crate::{Malformed, ProtocolError, ShortRead};

/// The transport the SMTP client reached the MTA over.
#[allow(missing_docs)]
#[derive(Copy, Clone, PartialEq, Eq, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Family {
    Unknown = b'U',
    Unix = b'L',
    Inet = b'4',
    Inet6 = b'6',
}

/// Connection information about the SMTP client.
#[derive(Clone, PartialEq, Debug)]
pub struct Connect {
    hostname: BytesMut,
    /// The address family of the SMTP client's connection.
    pub family: Family,
    /// The client's source port; absent when the family is unknown.
    pub port: Option<u16>,
    address: BytesMut,
}

impl Connect {
    /// The resolved hostname of the SMTP client.
    #[must_use]
    pub fn hostname(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.hostname)
    }

    /// The client's address: an IP address, or a socket path for unix.
    #[must_use]
    pub fn address(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.address)
    }
}

impl Decode for Connect {
    const CODE: u8 = b'C';

    fn decode(mut buffer: BytesMut) -> Result<Self, ProtocolError> {
        let Some(hostname) = buffer.take_nul_str() else {
            return Err(Malformed::new("Connect", "hostname not NUL-terminated", buffer).into());
        };

        let Some(family) = buffer.take_u8() else {
            return Err(ShortRead::new("Connect", "family byte missing", 1, 0).into());
        };
        let family = Family::try_from(family).map_err(|_| {
            Malformed::new(
                "Connect",
                "unknown address family",
                BytesMut::from_iter([family]),
            )
        })?;

        // Family 'U' carries neither port nor address.
        let port = match family {
            Family::Unknown => None,
            _ => {
                let got = buffer.len();
                let Some(port) = buffer.take_u16_be() else {
                    return Err(ShortRead::new("Connect", "port missing", 2, got).into());
                };
                Some(port)
            }
        };

        let address = match buffer.last() {
            Some(0) => buffer.split_to(buffer.len() - 1),
            _ => buffer,
        };

        Ok(Self {
            hostname,
            family,
            port,
            address,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    fn wire_payload() -> BytesMut {
        let mut raw = Vec::new();
        raw.extend(b"mail.example.org");
        raw.push(0);
        raw.push(b'4');
        raw.extend(4321u16.to_be_bytes());
        raw.extend(b"192.0.2.7");
        raw.push(0);

        BytesMut::from_iter(raw)
    }

    #[test]
    fn test_decode_connect() {
        let connect = Connect::decode(wire_payload()).expect("decoding connect failed");

        assert_eq!("mail.example.org", connect.hostname());
        assert_eq!(Family::Inet, connect.family);
        assert_eq!(Some(4321), connect.port);
        assert_eq!("192.0.2.7", connect.address());
    }

    #[test]
    fn test_decode_unknown_family_has_no_port() {
        let connect = Connect::decode(BytesMut::from("somewhere\0U"))
            .expect("decoding unknown-family connect failed");

        assert_eq!(Family::Unknown, connect.family);
        assert_eq!(None, connect.port);
        assert_eq!("", connect.address());
    }

    #[test]
    fn test_decode_truncated_port() {
        let res = Connect::decode(BytesMut::from("host\0\x34\x01"));

        assert_matches!(res, Err(ProtocolError::ShortRead(_)));
    }

    #[test]
    fn test_decode_bogus_family() {
        let res = Connect::decode(BytesMut::from("host\0Z\x00\x01addr\0"));

        assert_matches!(res, Err(ProtocolError::Malformed(_)));
    }
}
