//! Byte-slice reading helpers shared by the MRT message parsers.

use crate::elem::NetworkPrefix;
use crate::error::ParserError;
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Address family of a wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Afi {
    Ipv4,
    Ipv6,
}

impl TryFrom<u16> for Afi {
    type Error = ParserError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Afi::Ipv4),
            2 => Ok(Afi::Ipv6),
            v => Err(ParserError::ParseError(format!("unknown AFI: {}", v))),
        }
    }
}

/// Encoding width of AS numbers in the surrounding message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsnLength {
    Bits16,
    Bits32,
}

#[cold]
fn eof(name: &'static str, expected: usize, found: usize) -> ParserError {
    ParserError::TruncatedMsg(format!(
        "unexpected end of input reading {}: want {} bytes, have {}",
        name, expected, found
    ))
}

/// Cursor-style reads over a shrinking byte slice.
pub(crate) trait ReadUtils: Sized {
    fn remaining(&self) -> usize;
    fn advance(&mut self, n: usize) -> Result<(), ParserError>;
    fn split_to(&mut self, n: usize) -> Result<Self, ParserError>;
    fn read_u8(&mut self) -> Result<u8, ParserError>;
    fn read_u16(&mut self) -> Result<u16, ParserError>;
    fn read_u32(&mut self) -> Result<u32, ParserError>;
    fn read_exact(&mut self, buffer: &mut [u8]) -> Result<(), ParserError>;

    #[inline(always)]
    fn require_n_remaining(&self, n: usize, target: &'static str) -> Result<(), ParserError> {
        if self.remaining() >= n {
            return Ok(());
        }
        Err(eof(target, n, self.remaining()))
    }

    fn read_n_bytes(&mut self, n: usize) -> Result<Vec<u8>, ParserError> {
        self.require_n_remaining(n, "raw bytes")?;
        let mut buffer = vec![0; n];
        self.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn read_address(&mut self, afi: Afi) -> Result<IpAddr, ParserError> {
        match afi {
            Afi::Ipv4 => self.read_ipv4_address().map(IpAddr::V4),
            Afi::Ipv6 => self.read_ipv6_address().map(IpAddr::V6),
        }
    }

    fn read_ipv4_address(&mut self) -> Result<Ipv4Addr, ParserError> {
        self.require_n_remaining(4, "IPv4 address")?;
        Ok(Ipv4Addr::from(self.read_u32()?))
    }

    fn read_ipv6_address(&mut self) -> Result<Ipv6Addr, ParserError> {
        self.require_n_remaining(16, "IPv6 address")?;
        let mut buffer = [0; 16];
        self.read_exact(&mut buffer)?;
        Ok(Ipv6Addr::from(buffer))
    }

    #[inline]
    fn read_asn(&mut self, as_length: AsnLength) -> Result<u32, ParserError> {
        match as_length {
            AsnLength::Bits16 => self.read_u16().map(u32::from),
            AsnLength::Bits32 => self.read_u32(),
        }
    }

    /// Read one NLRI-encoded prefix: optional 4-byte path id, a bit length,
    /// then just enough address bytes to cover it.
    fn read_nlri_prefix(&mut self, afi: Afi, add_path: bool) -> Result<NetworkPrefix, ParserError> {
        let path_id = if add_path { self.read_u32()? } else { 0 };

        let bit_len = self.read_u8()?;
        let byte_len = (bit_len as usize + 7) / 8;

        let prefix = match afi {
            Afi::Ipv4 => {
                if bit_len > 32 {
                    return Err(ParserError::ParseError(format!(
                        "invalid IPv4 prefix length: {}",
                        bit_len
                    )));
                }
                let mut buff = [0; 4];
                self.read_exact(&mut buff[..byte_len])?;
                match Ipv4Net::new(Ipv4Addr::from(buff), bit_len) {
                    Ok(v) => IpNet::V4(v),
                    Err(_) => unreachable!("bit length has already been checked"),
                }
            }
            Afi::Ipv6 => {
                if bit_len > 128 {
                    return Err(ParserError::ParseError(format!(
                        "invalid IPv6 prefix length: {}",
                        bit_len
                    )));
                }
                let mut buff = [0; 16];
                self.read_exact(&mut buff[..byte_len])?;
                match Ipv6Net::new(Ipv6Addr::from(buff), bit_len) {
                    Ok(v) => IpNet::V6(v),
                    Err(_) => unreachable!("bit length has already been checked"),
                }
            }
        };

        Ok(NetworkPrefix::new(prefix, path_id))
    }
}

impl ReadUtils for &'_ [u8] {
    #[inline]
    fn remaining(&self) -> usize {
        self.len()
    }

    #[inline]
    fn advance(&mut self, n: usize) -> Result<(), ParserError> {
        if self.len() >= n {
            *self = &self[n..];
            return Ok(());
        }
        Err(eof("advance", n, self.len()))
    }

    #[inline]
    fn split_to(&mut self, n: usize) -> Result<Self, ParserError> {
        if self.len() >= n {
            let (a, b) = self.split_at(n);
            *self = b;
            return Ok(a);
        }
        Err(eof("split_to", n, self.len()))
    }

    #[inline(always)]
    fn read_u8(&mut self) -> Result<u8, ParserError> {
        if !self.is_empty() {
            let value = self[0];
            *self = &self[1..];
            return Ok(value);
        }
        Err(eof("read_u8", 1, 0))
    }

    #[inline(always)]
    fn read_u16(&mut self) -> Result<u16, ParserError> {
        if self.len() >= 2 {
            let (bytes, remaining) = self.split_at(2);
            *self = remaining;
            return Ok(u16::from_be_bytes(bytes.try_into().unwrap()));
        }
        Err(eof("read_u16", 2, self.len()))
    }

    #[inline(always)]
    fn read_u32(&mut self) -> Result<u32, ParserError> {
        if self.len() >= 4 {
            let (bytes, remaining) = self.split_at(4);
            *self = remaining;
            return Ok(u32::from_be_bytes(bytes.try_into().unwrap()));
        }
        Err(eof("read_u32", 4, self.len()))
    }

    #[inline]
    fn read_exact(&mut self, buffer: &mut [u8]) -> Result<(), ParserError> {
        let n = buffer.len();
        if self.len() >= n {
            buffer.copy_from_slice(&self[..n]);
            *self = &self[n..];
            return Ok(());
        }
        Err(eof("read_exact", n, self.len()))
    }
}
