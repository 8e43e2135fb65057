use std::fmt::{self, Display, Formatter};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::Error;
use crate::type_info::{PgType, PgTypeInfo};
use crate::types::{type_mismatch, IsNull, PgValue};
use crate::value::{PgValueFormat, PgValueRef};

// address families per src/include/utils/inet.h
const PGSQL_AF_INET: u8 = 2;
const PGSQL_AF_INET6: u8 = 3;

/// An `inet` or `cidr` value: an IP address with a network prefix.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PgInet {
    pub addr: IpAddr,
    pub prefix: u8,
    pub is_cidr: bool,
}

impl PgInet {
    pub fn new(addr: IpAddr) -> Self {
        let prefix = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };

        PgInet {
            addr,
            prefix,
            is_cidr: false,
        }
    }
}

impl Display for PgInet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let full = match self.addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };

        if self.is_cidr || self.prefix != full {
            write!(f, "{}/{}", self.addr, self.prefix)
        } else {
            write!(f, "{}", self.addr)
        }
    }
}

impl FromStr for PgInet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (
                addr,
                Some(prefix.parse::<u8>().map_err(Error::decode)?),
            ),
            None => (s, None),
        };

        let addr: IpAddr = addr.parse().map_err(Error::decode)?;

        let full = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };

        Ok(PgInet {
            addr,
            prefix: prefix.unwrap_or(full),
            is_cidr: false,
        })
    }
}

pub(crate) fn decode(value: &PgValueRef<'_>) -> Result<PgValue, Error> {
    match (&value.type_info.0, value.format) {
        (PgType::Macaddr, PgValueFormat::Binary) => {
            let buf = value.as_bytes()?;

            let mac: [u8; 6] = buf
                .try_into()
                .map_err(|_| Error::Decode("macaddr must be 6 bytes".into()))?;

            Ok(PgValue::Macaddr(mac))
        }

        (PgType::Macaddr, PgValueFormat::Text) => {
            let s = value.as_str()?;
            let mut mac = [0u8; 6];
            let mut parts = s.split(':');

            for byte in &mut mac {
                *byte = u8::from_str_radix(
                    parts
                        .next()
                        .ok_or_else(|| Error::Decode(format!("malformed macaddr {s:?}").into()))?,
                    16,
                )
                .map_err(Error::decode)?;
            }

            Ok(PgValue::Macaddr(mac))
        }

        (_, PgValueFormat::Binary) => {
            let buf = value.as_bytes()?;

            if buf.len() < 4 {
                return Err(Error::Decode("inet value is too short".into()));
            }

            let family = buf[0];
            let prefix = buf[1];
            let is_cidr = buf[2] != 0;
            let len = buf[3] as usize;

            if buf.len() < 4 + len {
                return Err(Error::Decode("inet address truncated".into()));
            }

            let addr = match (family, len) {
                (PGSQL_AF_INET, 4) => {
                    let octets: [u8; 4] = buf[4..8].try_into().unwrap();
                    IpAddr::V4(Ipv4Addr::from(octets))
                }

                (PGSQL_AF_INET6, 16) => {
                    let octets: [u8; 16] = buf[4..20].try_into().unwrap();
                    IpAddr::V6(Ipv6Addr::from(octets))
                }

                (family, len) => {
                    return Err(Error::Decode(
                        format!("unknown inet family {family} with length {len}").into(),
                    ));
                }
            };

            Ok(PgValue::Inet(PgInet {
                addr,
                prefix,
                is_cidr,
            }))
        }

        (_, PgValueFormat::Text) => {
            let mut inet: PgInet = value.as_str()?.parse()?;
            inet.is_cidr = matches!(value.type_info.0, PgType::Cidr);

            Ok(PgValue::Inet(inet))
        }
    }
}

pub(crate) fn encode(expected: &PgType, value: &PgValue, buf: &mut Vec<u8>) -> Result<IsNull, Error> {
    match (expected, value) {
        (PgType::Macaddr, PgValue::Macaddr(mac)) => {
            buf.extend_from_slice(mac);
        }

        (PgType::Inet | PgType::Cidr, PgValue::Inet(inet)) => {
            let is_cidr = matches!(expected, PgType::Cidr);

            match inet.addr {
                IpAddr::V4(addr) => {
                    buf.extend_from_slice(&[PGSQL_AF_INET, inet.prefix, is_cidr as u8, 4]);
                    buf.extend_from_slice(&addr.octets());
                }

                IpAddr::V6(addr) => {
                    buf.extend_from_slice(&[PGSQL_AF_INET6, inet.prefix, is_cidr as u8, 16]);
                    buf.extend_from_slice(&addr.octets());
                }
            }
        }

        // a bare string parses as an address
        (PgType::Inet | PgType::Cidr, PgValue::Text(s)) => {
            let inet: PgInet = s.parse()?;
            return encode(expected, &PgValue::Inet(inet), buf);
        }

        (expected, value) => return Err(type_mismatch(&PgTypeInfo(expected.clone()), value)),
    }

    Ok(IsNull::No)
}

pub(crate) fn macaddr_to_text(mac: &[u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inet_binary_round_trip() {
        let inet = PgInet {
            addr: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)),
            prefix: 24,
            is_cidr: false,
        };

        let mut buf = Vec::new();
        encode(&PgType::Inet, &PgValue::Inet(inet), &mut buf).unwrap();
        assert_eq!(&buf[..4], &[2, 24, 0, 4]);

        let value = PgValueRef::new(Some(&buf), PgValueFormat::Binary, PgTypeInfo(PgType::Inet));
        assert_eq!(decode(&value).unwrap(), PgValue::Inet(inet));
    }

    #[test]
    fn inet_text_round_trip() {
        let inet: PgInet = "::1/64".parse().unwrap();
        assert_eq!(inet.prefix, 64);
        assert_eq!(inet.to_string(), "::1/64");

        let host: PgInet = "10.0.0.1".parse().unwrap();
        assert_eq!(host.prefix, 32);
        assert_eq!(host.to_string(), "10.0.0.1");
    }

    #[test]
    fn macaddr_round_trip() {
        let value = PgValueRef::new(
            Some(b"08:00:2b:01:02:03"),
            PgValueFormat::Text,
            PgTypeInfo(PgType::Macaddr),
        );

        match decode(&value).unwrap() {
            PgValue::Macaddr(mac) => {
                assert_eq!(macaddr_to_text(&mac), "08:00:2b:01:02:03");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
