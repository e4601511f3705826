use bytes::{BufMut, BytesMut};
use itertools::Itertools;

const STAGE_COUNT: usize = 9;

/// A protocol stage macros can be requested for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(usize)]
pub enum MacroStage {
    /// `SMFIM_CONNECT`
    Connect = 0,
    /// `SMFIM_HELO`
    Helo = 1,
    /// `SMFIM_ENVFROM`
    MailFrom = 2,
    /// `SMFIM_ENVRCPT`
    RcptTo = 3,
    /// `SMFIM_DATA`
    Data = 4,
    /// `SMFIM_EOM`
    EndOfMessage = 5,
    /// `SMFIM_EOH`
    EndOfHeaders = 6,
    /// Macros accompanying individual headers
    Header = 7,
    /// Macros accompanying body chunks
    Body = 8,
}

/// Per-stage macro requests attached to the milter's options reply.
///
/// The version-6 options payload may carry, per stage, the list of macro
/// names the MTA should send. Stages without requests are omitted; the MTA
/// keeps its configured defaults for those.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MacroStages {
    stages: [Vec<String>; STAGE_COUNT],
}

impl MacroStages {
    /// Request `symbols` for `stage`, in addition to earlier requests.
    pub fn request<S: ToString>(&mut self, stage: MacroStage, symbols: &[S]) {
        self.stages[stage as usize].extend(symbols.iter().map(ToString::to_string));
    }

    /// Whether any stage has requests.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.iter().all(Vec::is_empty)
    }

    // Wire form per stage: u32 stage id, space-joined symbol list, NUL.
    pub(crate) fn write(&self, buffer: &mut BytesMut) {
        for (index, slot) in self.stages.iter().enumerate() {
            if slot.is_empty() {
                continue;
            }

            buffer.put_u32(index as u32);
            buffer.extend_from_slice(slot.iter().join(" ").as_bytes());
            buffer.put_u8(0);
        }
    }

    pub(crate) fn encoded_len(&self) -> usize {
        let mut total = 0;
        for slot in &self.stages {
            if slot.is_empty() {
                continue;
            }

            total += 4;
            // One byte per symbol for the space separator, except the last,
            // which takes the terminating NUL instead.
            for symbol in slot {
                total += symbol.len() + 1;
            }
        }

        total
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_write_requested_stages() {
        let mut stages = MacroStages::default();
        stages.request(MacroStage::Connect, &["j", "{client_addr}"]);
        stages.request(MacroStage::RcptTo, &["{rcpt_addr}"]);

        let mut buffer = BytesMut::new();
        stages.write(&mut buffer);

        let expected: &[u8] =
            b"\x00\x00\x00\x00j {client_addr}\x00\x00\x00\x00\x03{rcpt_addr}\x00";
        assert_eq!(BytesMut::from(expected), buffer);
        assert_eq!(stages.encoded_len(), buffer.len());
    }

    #[test]
    fn test_empty_stages_write_nothing() {
        let stages = MacroStages::default();

        let mut buffer = BytesMut::new();
        stages.write(&mut buffer);

        assert!(buffer.is_empty());
        assert_eq!(0, stages.encoded_len());
        assert!(stages.is_empty());
    }
}
