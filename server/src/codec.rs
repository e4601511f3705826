use asynchronous_codec::{Decoder, Encoder};
use bytes::{Buf, BufMut, BytesMut};

use ironmilter_proto::decoding::MtaEvent;
use ironmilter_proto::encoding::{Encode, MilterReply};
use ironmilter_proto::ProtocolError;

/// Default ceiling on a single frame: the largest body chunk an MTA sends
/// plus slack for the command byte and envelope fields.
pub const DEFAULT_MAX_FRAME: usize = 65_535 + 128;

/// Length-prefix framing: `u32_be length | u8 command | payload`.
///
/// The length counts the command byte plus the payload.
#[derive(Debug, Clone)]
pub(crate) struct FrameCodec {
    max_frame: usize,
}

impl FrameCodec {
    pub(crate) fn new(max_frame: usize) -> Self {
        Self { max_frame }
    }
}

impl Decoder for FrameCodec {
    type Item = MtaEvent;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 4 {
            // Length marker not complete yet.
            return Ok(None);
        }

        let mut length_bytes = [0u8; 4];
        length_bytes.copy_from_slice(&src[..4]);
        let length = u32::from_be_bytes(length_bytes) as usize;

        // Refuse before buffering, or a hostile peer picks our allocation size.
        if length > self.max_frame {
            return Err(ProtocolError::FrameTooLarge(length));
        }

        if src.len() < 4 + length {
            src.reserve(4 + length - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(4 + length);
        frame.advance(4);

        Ok(Some(MtaEvent::decode(frame)?))
    }
}

impl Encoder for FrameCodec {
    type Item<'a> = &'a MilterReply;
    type Error = ProtocolError;

    fn encode(&mut self, item: &MilterReply, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let frame_len = item
            .encoded_len()
            .checked_add(1)
            .ok_or(ProtocolError::FrameTooLarge(usize::MAX))?;
        if frame_len > self.max_frame {
            return Err(ProtocolError::FrameTooLarge(frame_len));
        }

        dst.reserve(4 + frame_len);
        // The length check keeps this cast in range.
        dst.put_u32(frame_len as u32);
        dst.put_u8(item.code());
        item.encode(dst);

        Ok(())
    }
}
