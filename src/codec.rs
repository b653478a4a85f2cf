use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
}

/// Packs small fields into a single 32-bit word, fixed-width (`uq`) or
/// Exp-Golomb order 0 (`ue`). Fields are appended most-significant-first;
/// `finish` bit-reverses the word so the reader consumes them in write
/// order from the least-significant end.
#[derive(Debug, Default)]
pub struct BitWriter {
    acc: u32,
    bits: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_raw(&mut self, value: u32, bits: u32) {
        self.acc = (self.acc << bits) | value;
        self.bits += bits;
    }

    /// Fixed-width field. The value is appended bit-reversed within its
    /// width: `finish()` reverses the whole word, which restores both the
    /// field order and the bit order inside each field for the reader.
    pub fn write_uq(&mut self, value: u32, bits: u32) {
        debug_assert!(bits < 32 && value < (1 << bits));
        let mut v = value;
        let mut rev = 0;
        for _ in 0..bits {
            rev = (rev << 1) | (v & 1);
            v >>= 1;
        }
        self.push_raw(rev, bits);
    }

    pub fn write_ue(&mut self, value: u32) {
        let v = value + 1;
        let prefix = 31 - v.leading_zeros();
        self.acc <<= prefix;
        self.bits += prefix;
        // The reader reassembles the suffix most-significant-bit first, so
        // UE suffixes go in unreversed.
        self.push_raw(v, prefix + 1);
    }

    pub fn bit_len(&self) -> u32 {
        self.bits
    }

    pub fn finish(self) -> u32 {
        debug_assert!(self.bits <= 32);
        let mut v = self.acc;
        let mut out = 0;
        for _ in 0..self.bits {
            out = (out << 1) | (v & 1);
            v >>= 1;
        }
        out
    }
}

/// Consumes fields from a finished accumulator word, least-significant-first.
///
/// An exhausted accumulator reads as zero everywhere; `read_ue` treats a
/// zero accumulator as the end-of-fields sentinel and returns 0 rather
/// than scanning for a prefix bit that cannot arrive.
#[derive(Debug, Clone, Copy)]
pub struct BitReader {
    acc: u32,
}

impl BitReader {
    pub fn new(word: u32) -> Self {
        Self { acc: word }
    }

    pub fn read_uq(&mut self, bits: u32) -> u32 {
        debug_assert!(bits < 32);
        let r = self.acc & ((1 << bits) - 1);
        self.acc >>= bits;
        r
    }

    pub fn peek_uq(&self, bits: u32) -> u32 {
        debug_assert!(bits < 32);
        self.acc & ((1 << bits) - 1)
    }

    fn read_bit(&mut self) -> u32 {
        let b = self.acc & 1;
        self.acc >>= 1;
        b
    }

    pub fn read_ue(&mut self) -> u32 {
        if self.acc == 0 {
            return 0;
        }
        let mut zeroes = 0;
        while self.read_bit() == 0 {
            zeroes += 1;
            if self.acc == 0 {
                return 0;
            }
        }
        let mut ret = 1u32 << zeroes;
        for i in (0..zeroes).rev() {
            ret |= self.read_bit() << i;
        }
        ret - 1
    }
}

/// Bounds-checked cursor over an inbound packet body. Every read validates
/// the remaining length first; a failed read aborts the packet parse.
#[derive(Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, CodecError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, CodecError> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.array()?))
    }
}
