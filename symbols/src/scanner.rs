//! Provides the `Scanner` type, a cursor over the bytes of a mangled symbol.

use std::fmt;

use crate::error::{Error, Result};

/// The `Scanner` keeps track of how far into the original input the demangler
/// has read. It only does cursor arithmetic: it never allocates and never
/// interprets what it reads.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Scanner<'a> {
    pos: usize,
    input: &'a [u8],
}

impl<'a> Scanner<'a> {
    /// Construct a new `Scanner` (with `position == 0`) from the given input.
    #[inline]
    pub fn new(input: &'a [u8]) -> Scanner<'a> {
        Scanner { pos: 0, input }
    }

    /// Return true if every byte has been consumed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Everything after the current position.
    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos.min(self.input.len())..]
    }

    /// Peek at the next byte without advancing.
    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Pop the next byte, failing with [`Error::TruncatedInput`] at the end.
    #[inline]
    pub fn consume(&mut self) -> Result<u8> {
        let byte = self.peek().ok_or(Error::TruncatedInput)?;
        self.pos += 1;
        Ok(byte)
    }

    /// Step back over the last consumed byte.
    #[inline]
    pub fn backtrack(&mut self) -> Result<()> {
        self.backtrack_by(1)
    }

    /// Step back over the last `count` consumed bytes.
    pub fn backtrack_by(&mut self, count: usize) -> Result<()> {
        if count > self.pos {
            return Err(Error::Structural);
        }

        self.pos -= count;
        Ok(())
    }

    /// Advance over `byte` if it is the next one.
    #[inline]
    pub fn next_if(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume exactly `len` bytes.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(Error::Overflow)?;
        let slice = self.input.get(self.pos..end).ok_or(Error::TruncatedInput)?;
        self.pos = end;
        Ok(slice)
    }

    /// Consume everything left.
    pub fn take_remaining(&mut self) -> &'a [u8] {
        let rest = self.remaining();
        self.pos = self.input.len();
        rest
    }

    /// Consume a little endian 32-bit value, as found after symbolic
    /// reference control bytes.
    pub fn read_u32_le(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl<'a> fmt::Debug for Scanner<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Scanner {{ pos: {}, remaining: \"{}\" }}",
            self.pos,
            String::from_utf8_lossy(self.remaining())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor() {
        let mut scanner = Scanner::new(b"$s4main");
        assert_eq!(scanner.take(2), Ok(&b"$s"[..]));
        assert_eq!(scanner.peek(), Some(b'4'));
        assert_eq!(scanner.consume(), Ok(b'4'));
        assert!(scanner.backtrack().is_ok());
        assert_eq!(scanner.remaining(), b"4main");
        assert_eq!(scanner.take(5), Ok(&b"4main"[..]));
        assert!(scanner.is_empty());
        assert_eq!(scanner.consume(), Err(Error::TruncatedInput));
    }

    #[test]
    fn bounds() {
        let mut scanner = Scanner::new(b"\x01\x02\x00\x00");
        assert_eq!(scanner.backtrack(), Err(Error::Structural));
        assert_eq!(scanner.read_u32_le(), Ok(0x0201));
        assert_eq!(scanner.take(1), Err(Error::TruncatedInput));
    }
}
