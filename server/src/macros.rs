use bytes::BytesMut;

use ironmilter_proto::events::DefineMacro;

// Slot order mirrors the protocol stages; lookups walk it back to front so
// later stages shadow earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Connect = 0,
    Helo = 1,
    Mail = 2,
    Rcpt = 3,
    Data = 4,
    Header = 5,
    Eoh = 6,
    Body = 7,
    Eom = 8,
    // Stage codes this table postdates; message-scoped.
    Other = 9,
}

const SCOPE_COUNT: usize = 10;

impl Scope {
    fn from_code(code: u8) -> Self {
        match code {
            b'C' => Self::Connect,
            b'H' => Self::Helo,
            b'M' => Self::Mail,
            b'R' => Self::Rcpt,
            b'T' => Self::Data,
            b'L' => Self::Header,
            b'N' => Self::Eoh,
            b'B' => Self::Body,
            b'E' => Self::Eom,
            _ => Self::Other,
        }
    }

}

/// The most recent macro definitions, one slot per protocol stage.
///
/// A definition frame replaces its stage's slot wholesale. Message-scope
/// slots are dropped at end-of-message and on abort; connect and helo
/// scope lives as long as the SMTP connection.
#[derive(Debug, Default)]
pub(crate) struct MacroStore {
    slots: [Vec<(BytesMut, BytesMut)>; SCOPE_COUNT],
}

impl MacroStore {
    /// Absorb a definition frame.
    pub(crate) fn define(&mut self, frame: DefineMacro) {
        let scope = Scope::from_code(frame.stage());
        self.slots[scope as usize] = frame.into_pairs();
    }

    /// Look `name` up, newest stage first.
    pub(crate) fn get(&self, name: &[u8]) -> Option<&[u8]> {
        self.slots.iter().rev().find_map(|slot| {
            slot.iter()
                .rev()
                .find(|(defined, _)| defined == name)
                .map(|(_, value)| &value[..])
        })
    }

    /// Drop message-scope definitions; connection scope persists.
    pub(crate) fn reset_message(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if index > Scope::Helo as usize {
                slot.clear();
            }
        }
    }

    /// Drop everything, for a connection released for reuse.
    pub(crate) fn reset_connection(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use ironmilter_proto::decoding::Decode;
    use pretty_assertions::assert_eq;

    use super::*;

    fn definition(raw: &str) -> DefineMacro {
        DefineMacro::decode(BytesMut::from(raw)).expect("building macro definition failed")
    }

    #[test]
    fn test_later_stages_shadow_earlier() {
        let mut store = MacroStore::default();
        store.define(definition("Cj\0connect-host\0"));
        store.define(definition("Mj\0mail-host\0{mail_addr}\0<a@b>\0"));

        assert_eq!(Some(&b"mail-host"[..]), store.get(b"j"));
        assert_eq!(Some(&b"<a@b>"[..]), store.get(b"{mail_addr}"));
        assert_eq!(None, store.get(b"{rcpt_addr}"));
    }

    #[test]
    fn test_definition_replaces_stage_wholesale() {
        let mut store = MacroStore::default();
        store.define(definition("M{mail_addr}\0<a@b>\0"));
        store.define(definition("M{mail_mailer}\0esmtp\0"));

        assert_eq!(None, store.get(b"{mail_addr}"));
        assert_eq!(Some(&b"esmtp"[..]), store.get(b"{mail_mailer}"));
    }

    #[test]
    fn test_message_reset_keeps_connection_scope() {
        let mut store = MacroStore::default();
        store.define(definition("Cj\0mx.example.org\0"));
        store.define(definition("H{tls_version}\0TLSv1.3\0"));
        store.define(definition("M{mail_addr}\0<a@b>\0"));

        store.reset_message();

        assert_eq!(Some(&b"mx.example.org"[..]), store.get(b"j"));
        assert_eq!(Some(&b"TLSv1.3"[..]), store.get(b"{tls_version}"));
        assert_eq!(None, store.get(b"{mail_addr}"));
    }

    #[test]
    fn test_connection_reset_drops_everything() {
        let mut store = MacroStore::default();
        store.define(definition("Cj\0mx.example.org\0"));

        store.reset_connection();

        assert_eq!(None, store.get(b"j"));
    }
}
