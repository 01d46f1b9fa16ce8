use crate::errors::{Error, Result};

/// Big-endian bit cursor over a data section.
///
/// Byte-aligned reads of common widths take the fast paths; everything else
/// goes through a widened accumulator so reads crossing byte boundaries stay
/// exact up to 64 bits.
#[derive(Debug, Clone, Copy)]
pub struct BitInput<'a> {
    data: &'a [u8],
    offset: usize,
    consumed: usize,
}

impl<'a> BitInput<'a> {
    pub fn new(input: &'a [u8]) -> BitInput<'a> {
        BitInput {
            data: input,
            offset: 0,
            consumed: 0,
        }
    }

    /// Cursor positioned `bit_offset` bits into `input`. Reads report
    /// positions relative to the start of `input`.
    pub fn at(input: &'a [u8], bit_offset: usize) -> BitInput<'a> {
        let byte = (bit_offset / 8).min(input.len());
        BitInput {
            data: &input[byte..],
            offset: bit_offset % 8,
            consumed: bit_offset,
        }
    }

    /// Total bits consumed since the start of the underlying input.
    pub fn position(&self) -> usize {
        self.consumed
    }

    #[inline]
    pub fn take_bits(&mut self, nbits: usize) -> Result<u64> {
        if nbits == 0 {
            return Ok(0);
        }
        if nbits > 64 {
            return Err(Error::ParseError(
                "Cannot read more than 64 bits".to_string(),
            ));
        }

        let value = if self.offset == 0 {
            self.take_bits_aligned(nbits)?
        } else {
            self.take_bits_unaligned(nbits)?
        };
        self.consumed += nbits;
        Ok(value)
    }

    #[inline]
    pub fn take_bytes(&mut self, nbytes: usize) -> Result<Vec<u8>> {
        if nbytes == 0 {
            return Ok(Vec::new());
        }

        // Fast path: byte-aligned reads
        if self.offset == 0 {
            if self.data.len() < nbytes {
                return Err(Error::ParseError("Not enough data for string".to_string()));
            }
            let bytes = self.data[..nbytes].to_vec();
            self.data = &self.data[nbytes..];
            self.consumed += nbytes * 8;
            return Ok(bytes);
        }

        let mut bytes = Vec::with_capacity(nbytes);
        for _ in 0..nbytes {
            bytes.push(self.take_bits(8)? as u8);
        }
        Ok(bytes)
    }

    #[inline]
    pub fn take_string(&mut self, nbytes: usize) -> Result<String> {
        let bytes = self.take_bytes(nbytes)?;
        String::from_utf8(bytes).map_err(|_| Error::ParseError("Invalid UTF-8 string".to_string()))
    }

    /// Fast paths for byte-aligned reads of common widths.
    #[inline]
    fn take_bits_aligned(&mut self, nbits: usize) -> Result<u64> {
        let byte_data = self.data;

        match nbits {
            8 => {
                if byte_data.is_empty() {
                    return Err(Error::ParseError("Not enough data".to_string()));
                }
                self.data = &self.data[1..];
                Ok(byte_data[0] as u64)
            }
            16 => {
                if byte_data.len() < 2 {
                    return Err(Error::ParseError("Not enough data".to_string()));
                }
                let value = u16::from_be_bytes([byte_data[0], byte_data[1]]) as u64;
                self.data = &self.data[2..];
                Ok(value)
            }
            24 => {
                if byte_data.len() < 3 {
                    return Err(Error::ParseError("Not enough data".to_string()));
                }
                let value = ((byte_data[0] as u64) << 16)
                    | ((byte_data[1] as u64) << 8)
                    | (byte_data[2] as u64);
                self.data = &self.data[3..];
                Ok(value)
            }
            32 => {
                if byte_data.len() < 4 {
                    return Err(Error::ParseError("Not enough data".to_string()));
                }
                let value =
                    u32::from_be_bytes([byte_data[0], byte_data[1], byte_data[2], byte_data[3]])
                        as u64;
                self.data = &self.data[4..];
                Ok(value)
            }
            _ => {
                let nbytes = nbits.div_ceil(8);
                if byte_data.len() < nbytes {
                    return Err(Error::ParseError("Not enough data".to_string()));
                }

                let mut value: u64 = 0;
                let full_bytes = nbits / 8;
                for b in &byte_data[..full_bytes] {
                    value = (value << 8) | (*b as u64);
                }

                let remaining_bits = nbits % 8;
                if remaining_bits > 0 {
                    let last_byte = byte_data[full_bytes];
                    let shift = 8 - remaining_bits;
                    let mask = ((1u16 << remaining_bits) - 1) as u8;
                    value = (value << remaining_bits) | (((last_byte >> shift) & mask) as u64);
                    self.data = &self.data[full_bytes..];
                    self.offset = remaining_bits;
                } else {
                    self.data = &self.data[full_bytes..];
                }
                Ok(value)
            }
        }
    }

    /// General unaligned path: accumulate every touched byte into a widened
    /// buffer, then shift the wanted bits down. A read can span up to nine
    /// bytes (7 bits of lead-in plus 64 bits of payload).
    #[inline]
    fn take_bits_unaligned(&mut self, nbits: usize) -> Result<u64> {
        let total_bits = self.offset + nbits;
        let bytes_needed = total_bits.div_ceil(8);
        if self.data.len() < bytes_needed {
            return Err(Error::ParseError("Not enough data".to_string()));
        }

        let mut acc: u128 = 0;
        for b in &self.data[..bytes_needed] {
            acc = (acc << 8) | (*b as u128);
        }

        let shift = bytes_needed * 8 - total_bits;
        let mask = if nbits == 64 {
            u64::MAX
        } else {
            (1u64 << nbits) - 1
        };
        let value = ((acc >> shift) as u64) & mask;

        self.data = &self.data[total_bits / 8..];
        self.offset = total_bits % 8;
        Ok(value)
    }
}
