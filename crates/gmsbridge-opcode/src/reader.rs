//! Offset-tracking reader over an opcode byte stream.

use std::io::{ErrorKind, Read};

use gmsbridge_error::{BridgeError, Result};

use crate::field::field_payload_len;

/// Reads the primitive items of an opcode file and remembers how far it got,
/// so every framing error can name the byte offset it happened at.
#[derive(Debug)]
pub(crate) struct StreamReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> StreamReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    fn read_array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        match self.inner.read_exact(&mut buf) {
            Ok(()) => {
                self.offset += N as u64;
                Ok(buf)
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(BridgeError::malformed(
                self.offset,
                format!("truncated stream while reading {what}"),
            )),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    pub(crate) fn read_u8(&mut self, what: &str) -> Result<u8> {
        let [b] = self.read_array::<1>(what)?;
        Ok(b)
    }

    pub(crate) fn read_u32_le(&mut self, what: &str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array::<4>(what)?))
    }

    pub(crate) fn read_f64_le(&mut self, what: &str) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_array::<8>(what)?))
    }

    /// Read one variable-width field (see [`crate::field`]).
    pub(crate) fn read_field(&mut self, what: &str) -> Result<u32> {
        let at = self.offset;
        let selector = self.read_u8(what)?;
        match field_payload_len(selector) {
            Some(1) => Ok(u32::from(self.read_u8(what)?)),
            Some(2) => Ok(u32::from(u16::from_le_bytes(self.read_array::<2>(what)?))),
            Some(_) => self.read_u32_le(what),
            None => Err(BridgeError::malformed(
                at,
                format!("unexpected field width selector {selector} in {what}"),
            )),
        }
    }

    /// Skip `n` bytes.
    pub(crate) fn skip(&mut self, n: usize, what: &str) -> Result<()> {
        for _ in 0..n {
            self.read_u8(what)?;
        }
        Ok(())
    }

    /// Drain the rest of the stream as doubles.
    ///
    /// Returns the complete trailing values and the length of a final partial
    /// word, if any.
    pub(crate) fn read_trailing_doubles(&mut self) -> Result<(Vec<f64>, usize)> {
        let mut rest = Vec::new();
        self.inner.read_to_end(&mut rest)?;
        self.offset += rest.len() as u64;
        let chunks = rest.chunks_exact(8);
        let partial = chunks.remainder().len();
        let values = chunks
            .map(|c| {
                let mut word = [0u8; 8];
                word.copy_from_slice(c);
                f64::from_le_bytes(word)
            })
            .collect();
        Ok((values, partial))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_offsets() {
        let bytes = [7u8, 1, 0x34, 0x12, 0, 0, 0, 0];
        let mut r = StreamReader::new(&bytes[..]);
        assert_eq!(r.read_u8("opcode").unwrap(), 7);
        assert_eq!(r.read_field("operand").unwrap(), 0x1234);
        assert_eq!(r.offset(), 4);
        assert_eq!(r.read_u32_le("word").unwrap(), 0);
        assert_eq!(r.offset(), 8);
    }

    #[test]
    fn truncated_read_is_malformed() {
        let bytes = [2u8, 0xFF, 0xFF];
        let mut r = StreamReader::new(&bytes[..]);
        let err = r.read_field("operand").unwrap_err();
        assert!(matches!(err, BridgeError::MalformedStream { offset: 1, .. }));
    }

    #[test]
    fn bad_selector_reports_its_offset() {
        let bytes = [0u8, 9, 5, 1];
        let mut r = StreamReader::new(&bytes[..]);
        assert_eq!(r.read_field("first").unwrap(), 9);
        let err = r.read_field("second").unwrap_err();
        assert!(matches!(err, BridgeError::MalformedStream { offset: 2, .. }));
    }

    #[test]
    fn trailing_doubles_with_partial_word() {
        let mut bytes = 1.5f64.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        let mut r = StreamReader::new(&bytes[..]);
        let (values, partial) = r.read_trailing_doubles().unwrap();
        assert_eq!(values, vec![1.5]);
        assert_eq!(partial, 3);
    }
}
