//! Fixed-width little-endian reading and writing shared by the account and
//! instruction codecs.
//!
//! Every account in the protocol is `discriminator (8) || body`, where the
//! body is a flat sequence of fixed-width fields. There are no length
//! prefixes, so a record's size is known before any field is read.

use solana_sdk::pubkey::Pubkey;

use crate::discriminator::Discriminator;
use crate::error::DecodeError;

pub const DISCRIMINATOR_LEN: usize = 8;
pub const PUBKEY_LEN: usize = 32;

/// A fixed-layout account record.
///
/// Implementors describe their body; [`AccountLayout::decode`] validates
/// length and discriminator before any field is touched.
pub trait AccountLayout: Sized {
    /// Human-readable name used in error messages.
    const KIND: &'static str;
    const DISCRIMINATOR: Discriminator;
    /// Body length, excluding the discriminator.
    const LEN: usize;
    const SIZE: usize = DISCRIMINATOR_LEN + Self::LEN;

    /// Parse a body that is exactly [`Self::LEN`] bytes long.
    fn read_body(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError>;

    fn write_body(&self, writer: &mut ByteWriter);

    fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < Self::SIZE {
            return Err(DecodeError::TooShort {
                kind: Self::KIND,
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        let mut actual = [0u8; DISCRIMINATOR_LEN];
        actual.copy_from_slice(&data[..DISCRIMINATOR_LEN]);
        if actual != Self::DISCRIMINATOR {
            return Err(DecodeError::WrongDiscriminator {
                kind: Self::KIND,
                expected: Self::DISCRIMINATOR,
                actual,
            });
        }
        let mut reader = ByteReader::new(&data[DISCRIMINATOR_LEN..Self::SIZE]);
        Self::read_body(&mut reader)
    }

    fn encode(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(Self::SIZE);
        writer.bytes(&Self::DISCRIMINATOR);
        self.write_body(&mut writer);
        writer.into_inner()
    }
}

/// Sequential reader over a body whose length has already been checked.
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.offset..self.offset + N]);
        self.offset += N;
        out
    }

    pub fn u8(&mut self) -> u8 {
        let [b] = self.array::<1>();
        b
    }

    pub fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.array())
    }

    pub fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.array())
    }

    pub fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.array())
    }

    pub fn pubkey(&mut self) -> Pubkey {
        Pubkey::new_from_array(self.array())
    }
}

/// Append-only little-endian writer for account bodies and instruction data.
#[derive(Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.u8(value as u8)
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub fn pubkey(&mut self, key: &Pubkey) -> &mut Self {
        self.bytes(key.as_ref())
    }

    /// Borsh `Option<T>`: a `0` tag, or `1` followed by the value.
    pub fn option<T>(&mut self, value: Option<T>, write: impl FnOnce(&mut Self, T)) -> &mut Self {
        match value {
            Some(v) => {
                self.u8(1);
                write(self, v);
            }
            None => {
                self.u8(0);
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_decodes_little_endian() {
        let data = [1u8, 0, 2, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.u16(), 1);
        assert_eq!(r.u32(), 2);
        assert_eq!(r.u64(), 3);
        assert_eq!(r.offset(), data.len());
    }

    #[test]
    fn option_uses_borsh_tags() {
        let mut w = ByteWriter::default();
        w.option(Some(7u32), |w, v| {
            w.u32(v);
        });
        w.option(None::<u64>, |w, v| {
            w.u64(v);
        });
        assert_eq!(w.into_inner(), vec![1, 7, 0, 0, 0, 0]);
    }
}
