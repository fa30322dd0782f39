use crate::error::{ProtocolError, Result};

/// Bounds-checked big-endian reader over a frame payload.
pub(crate) struct PayloadReader<'a> {
    buf: &'a [u8],
}

impl<'a> PayloadReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(ProtocolError::Truncated {
                needed: n,
                available: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn i32(&mut self) -> Result<i32> {
        let bytes = self.take(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a `u32` size prefix followed by exactly that many bytes, which
    /// must be the rest of the payload.
    pub(crate) fn sized_tail(&mut self) -> Result<&'a [u8]> {
        let declared = self.u32()? as usize;
        if self.buf.len() > declared {
            return Err(ProtocolError::LengthMismatch {
                declared,
                actual: self.buf.len(),
            });
        }
        self.take(declared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_signed_and_unsigned() {
        let mut reader = PayloadReader::new(&[0xFF, 0xFF, 0xFF, 0xFE, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(reader.i32().unwrap(), -2);
        assert_eq!(reader.u32().unwrap(), 256);
        assert!(reader.u32().is_err());
    }

    #[test]
    fn test_sized_tail_checks_both_directions() {
        let short = [0, 0, 0, 5, 1, 2];
        assert!(matches!(
            PayloadReader::new(&short).sized_tail(),
            Err(ProtocolError::Truncated {
                needed: 5,
                available: 2
            })
        ));

        let long = [0, 0, 0, 1, 1, 2];
        assert!(matches!(
            PayloadReader::new(&long).sized_tail(),
            Err(ProtocolError::LengthMismatch {
                declared: 1,
                actual: 2
            })
        ));

        let exact = [0, 0, 0, 2, 7, 8];
        assert_eq!(PayloadReader::new(&exact).sized_tail().unwrap(), &[7, 8]);
    }
}
