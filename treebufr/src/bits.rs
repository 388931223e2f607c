use crate::errors::{Error, Result};
use byteorder::{BigEndian, ByteOrder};

/// All-ones value of an `nbits`-wide field, the format's missing marker.
#[inline]
pub const fn all_ones(nbits: usize) -> u64 {
    if nbits >= 64 {
        u64::MAX
    } else {
        (1u64 << nbits) - 1
    }
}

/// Most-significant-bit-first cursor over a Data section payload.
///
/// Positions are absolute bit offsets from the start of the slice. One reader
/// is created per message decode.
#[derive(Debug, Clone, Copy)]
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BitReader { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len_bits(&self) -> usize {
        self.data.len() * 8
    }

    pub fn remaining_bits(&self) -> usize {
        self.len_bits() - self.pos
    }

    fn ensure(&self, nbits: usize) -> Result<()> {
        if nbits > self.remaining_bits() {
            return Err(Error::OutOfBits {
                wanted: nbits,
                position: self.pos,
                available: self.remaining_bits(),
            });
        }
        Ok(())
    }

    /// Read the next `nbits` (0..=64) as an unsigned integer.
    ///
    /// # Panics
    ///
    /// Panics if `nbits > 64`.
    #[inline]
    pub fn read_unsigned(&mut self, nbits: usize) -> Result<u64> {
        assert!(nbits <= 64, "cannot read {} bits into a u64", nbits);
        if nbits == 0 {
            return Ok(0);
        }
        self.ensure(nbits)?;

        let byte = self.pos / 8;
        let offset = self.pos % 8;

        let value = if offset + nbits <= 64 && byte + 8 <= self.data.len() {
            let window = BigEndian::read_u64(&self.data[byte..byte + 8]);
            (window << offset) >> (64 - nbits)
        } else {
            let end = self.pos + nbits;
            let last = end.div_ceil(8);
            let acc = self.data[byte..last]
                .iter()
                .fold(0u128, |acc, b| (acc << 8) | *b as u128);
            let trailing = last * 8 - end;
            ((acc >> trailing) & ((1u128 << nbits) - 1)) as u64
        };

        self.pos += nbits;
        Ok(value)
    }

    /// Read a sign-and-magnitude integer: the top bit is the sign, the rest
    /// the magnitude.
    pub fn read_signed(&mut self, nbits: usize) -> Result<i64> {
        let raw = self.read_unsigned(nbits)?;
        if nbits == 0 {
            return Ok(0);
        }
        let sign = 1u64 << (nbits - 1);
        let magnitude = (raw & !sign) as i64;
        Ok(if raw & sign != 0 { -magnitude } else { magnitude })
    }

    pub fn read_bytes(&mut self, nbytes: usize) -> Result<Vec<u8>> {
        self.ensure(nbytes * 8)?;
        if self.pos % 8 == 0 {
            let start = self.pos / 8;
            self.pos += nbytes * 8;
            return Ok(self.data[start..start + nbytes].to_vec());
        }

        let mut bytes = Vec::with_capacity(nbytes);
        for _ in 0..nbytes {
            bytes.push(self.read_unsigned(8)? as u8);
        }
        Ok(bytes)
    }

    pub fn skip(&mut self, nbits: usize) -> Result<()> {
        self.ensure(nbits)?;
        self.pos += nbits;
        Ok(())
    }

    /// Move to an absolute bit offset; the target need not be byte aligned.
    pub fn seek_to_bit(&mut self, offset: usize) -> Result<()> {
        if offset > self.len_bits() {
            return Err(Error::OutOfBits {
                wanted: offset - self.pos.min(offset),
                position: self.pos,
                available: self.remaining_bits(),
            });
        }
        self.pos = offset;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pack(fields: &[(u64, usize)]) -> Vec<u8> {
        let mut out = vec![];
        let mut acc = 0u8;
        let mut used = 0;
        for &(value, width) in fields {
            for i in (0..width).rev() {
                acc = (acc << 1) | ((value >> i) & 1) as u8;
                used += 1;
                if used == 8 {
                    out.push(acc);
                    acc = 0;
                    used = 0;
                }
            }
        }
        if used > 0 {
            out.push(acc << (8 - used));
        }
        out
    }

    #[test]
    fn test_read_unaligned() {
        let data = [0b1011_0011, 0b0101_1100, 0xFF];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_unsigned(3).unwrap(), 0b101);
        assert_eq!(reader.read_unsigned(7).unwrap(), 0b1001101);
        assert_eq!(reader.position(), 10);
        assert_eq!(reader.read_unsigned(14).unwrap(), 0b01_1100_1111_1111);
        assert!(matches!(reader.read_unsigned(1), Err(Error::OutOfBits { .. })));
    }

    #[test]
    fn test_read_signed_is_sign_magnitude() {
        let data = pack(&[(0b1_0101, 5), (0b0_0101, 5)]);
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_signed(5).unwrap(), -5);
        assert_eq!(reader.read_signed(5).unwrap(), 5);
    }

    #[test]
    fn test_seek_and_read_bytes() {
        let data = pack(&[(0b101, 3), (b'H' as u64, 8), (b'i' as u64, 8)]);
        let mut reader = BitReader::new(&data);
        reader.seek_to_bit(3).unwrap();
        assert_eq!(reader.read_bytes(2).unwrap(), b"Hi");
        reader.seek_to_bit(0).unwrap();
        assert_eq!(reader.read_unsigned(3).unwrap(), 0b101);
        assert!(reader.seek_to_bit(data.len() * 8 + 1).is_err());
    }

    #[test]
    #[should_panic]
    fn test_width_over_64_panics() {
        let data = [0u8; 16];
        let _ = BitReader::new(&data).read_unsigned(65);
    }

    proptest! {
        #[test]
        fn read_back_arbitrary_fields(
            fields in prop::collection::vec((any::<u64>(), 1usize..=64), 1..24)
        ) {
            let fields: Vec<(u64, usize)> =
                fields.into_iter().map(|(v, w)| (v & all_ones(w), w)).collect();
            let data = pack(&fields);
            let mut reader = BitReader::new(&data);
            for &(value, width) in &fields {
                prop_assert_eq!(reader.read_unsigned(width).unwrap(), value);
            }
        }
    }
}
