use std::mem::size_of;

use bytes::{Buf, BytesMut};

/// Bounds-checked splitting operations the payload decoders are built from.
///
/// Everything returns `Option` instead of panicking; the decoders turn a
/// `None` into the appropriate protocol error.
pub(crate) trait BufExt {
    /// Split off the bytes up to the next NUL, consuming the delimiter.
    fn take_nul_str(&mut self) -> Option<BytesMut>;

    /// Consume one leading byte.
    fn take_u8(&mut self) -> Option<u8>;

    /// Consume two leading bytes as a big-endian integer.
    fn take_u16_be(&mut self) -> Option<u16>;

    /// Consume four leading bytes as a big-endian integer.
    fn take_u32_be(&mut self) -> Option<u32>;
}

impl BufExt for BytesMut {
    fn take_nul_str(&mut self) -> Option<BytesMut> {
        let end = self.iter().position(|&b| b == 0)?;
        let split = self.split_to(end);
        self.advance(1);
        Some(split)
    }

    fn take_u8(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        Some(self.get_u8())
    }

    fn take_u16_be(&mut self) -> Option<u16> {
        if self.len() < size_of::<u16>() {
            return None;
        }
        Some(self.get_u16())
    }

    fn take_u32_be(&mut self) -> Option<u32> {
        if self.len() < size_of::<u32>() {
            return None;
        }
        Some(self.get_u32())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_take_nul_str() {
        let mut buffer = BytesMut::from("one\0two\0rest");

        assert_eq!(buffer.take_nul_str(), Some(BytesMut::from("one")));
        assert_eq!(buffer.take_nul_str(), Some(BytesMut::from("two")));
        assert_eq!(buffer.take_nul_str(), None);
        assert_eq!(&buffer[..], b"rest");
    }

    #[test]
    fn test_take_integers() {
        let mut buffer = BytesMut::from_iter([1u8, 0, 42, 0, 0, 0, 7]);

        assert_eq!(buffer.take_u8(), Some(1));
        assert_eq!(buffer.take_u16_be(), Some(42));
        assert_eq!(buffer.take_u32_be(), Some(7));
        assert_eq!(buffer.take_u8(), None);
    }
}
