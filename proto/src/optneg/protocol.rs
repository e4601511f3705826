use crate::events::EventKind;

bitflags::bitflags! {
    /// Protocol flags shaping how the conversation is conducted.
    ///
    /// `NO_*` bits ask the MTA not to deliver an event at all; `NR_*` bits
    /// tell it not to wait for a reply to one. The remaining bits switch
    /// individual features on.
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub struct Protocol: u32 {
        /// Do not send connection information
        #[doc(alias = "SMFIP_NOCONNECT")]
        const NO_CONNECT = 0x0000_0001;
        /// Do not send HELO
        #[doc(alias = "SMFIP_NOHELO")]
        const NO_HELO = 0x0000_0002;
        /// Do not send MAIL FROM
        #[doc(alias = "SMFIP_NOMAIL")]
        const NO_MAIL = 0x0000_0004;
        /// Do not send RCPT TO
        #[doc(alias = "SMFIP_NORCPT")]
        const NO_RCPT = 0x0000_0008;
        /// Do not send body chunks
        #[doc(alias = "SMFIP_NOBODY")]
        const NO_BODY = 0x0000_0010;
        /// Do not send headers
        #[doc(alias = "SMFIP_NOHDRS")]
        const NO_HDRS = 0x0000_0020;
        /// Do not send end-of-headers
        #[doc(alias = "SMFIP_NOEOH")]
        const NO_EOH = 0x0000_0040;
        /// No reply expected for headers
        #[doc(alias = "SMFIP_NR_HDR")]
        const NR_HDR = 0x0000_0080;
        /// Do not send unknown SMTP commands
        #[doc(alias = "SMFIP_NOUNKNOWN")]
        const NO_UNKNOWN = 0x0000_0100;
        /// Do not send DATA
        #[doc(alias = "SMFIP_NODATA")]
        const NO_DATA = 0x0000_0200;
        /// The MTA understands `Skip` replies to body chunks
        #[doc(alias = "SMFIP_SKIP")]
        const SKIP = 0x0000_0400;
        /// Also deliver recipients the MTA already rejected
        #[doc(alias = "SMFIP_RCPT_REJ")]
        const RCPT_REJ = 0x0000_0800;
        /// No reply expected for connection information
        #[doc(alias = "SMFIP_NR_CONN")]
        const NR_CONN = 0x0000_1000;
        /// No reply expected for HELO
        #[doc(alias = "SMFIP_NR_HELO")]
        const NR_HELO = 0x0000_2000;
        /// No reply expected for MAIL FROM
        #[doc(alias = "SMFIP_NR_MAIL")]
        const NR_MAIL = 0x0000_4000;
        /// No reply expected for RCPT TO
        #[doc(alias = "SMFIP_NR_RCPT")]
        const NR_RCPT = 0x0000_8000;
        /// No reply expected for DATA
        #[doc(alias = "SMFIP_NR_DATA")]
        const NR_DATA = 0x0001_0000;
        /// No reply expected for unknown SMTP commands
        #[doc(alias = "SMFIP_NR_UNKN")]
        const NR_UNKNOWN = 0x0002_0000;
        /// No reply expected for end-of-headers
        #[doc(alias = "SMFIP_NR_EOH")]
        const NR_EOH = 0x0004_0000;
        /// No reply expected for body chunks
        #[doc(alias = "SMFIP_NR_BODY")]
        const NR_BODY = 0x0008_0000;
        /// Header values keep their leading space
        #[doc(alias = "SMFIP_HDR_LEADSPC")]
        const HDR_LEADSPC = 0x0010_0000;
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Self::empty()
    }
}

impl Protocol {
    /// The `NO_*` bit that stops delivery of `kind`, if one exists.
    #[must_use]
    pub fn no_send_bit(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::Connect => Some(Self::NO_CONNECT),
            EventKind::Helo => Some(Self::NO_HELO),
            EventKind::Mail => Some(Self::NO_MAIL),
            EventKind::Recipient => Some(Self::NO_RCPT),
            EventKind::Data => Some(Self::NO_DATA),
            EventKind::Header => Some(Self::NO_HDRS),
            EventKind::EndOfHeaders => Some(Self::NO_EOH),
            EventKind::Body => Some(Self::NO_BODY),
            EventKind::Unknown => Some(Self::NO_UNKNOWN),
            _ => None,
        }
    }

    /// The `NR_*` bit that waives the reply to `kind`, if one exists.
    #[must_use]
    pub fn no_reply_bit(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::Connect => Some(Self::NR_CONN),
            EventKind::Helo => Some(Self::NR_HELO),
            EventKind::Mail => Some(Self::NR_MAIL),
            EventKind::Recipient => Some(Self::NR_RCPT),
            EventKind::Data => Some(Self::NR_DATA),
            EventKind::Header => Some(Self::NR_HDR),
            EventKind::EndOfHeaders => Some(Self::NR_EOH),
            EventKind::Body => Some(Self::NR_BODY),
            EventKind::Unknown => Some(Self::NR_UNKNOWN),
            _ => None,
        }
    }

    /// Whether these flags suppress delivery of `kind` entirely.
    #[must_use]
    pub fn suppresses(&self, kind: EventKind) -> bool {
        Self::no_send_bit(kind).is_some_and(|bit| self.contains(bit))
    }

    /// Whether these flags waive the reply to `kind`.
    #[must_use]
    pub fn waives_reply(&self, kind: EventKind) -> bool {
        Self::no_reply_bit(kind).is_some_and(|bit| self.contains(bit))
    }

    /// The bits expressible in protocol `version`.
    ///
    /// Version 2 only knows the original seven `NO_*` bits.
    #[must_use]
    pub fn version_mask(version: u32) -> Self {
        if version >= 6 {
            Self::all()
        } else {
            Self::from_bits_retain(0x7f)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suppression_lookup() {
        let flags = Protocol::NO_DATA | Protocol::NR_BODY;

        assert!(flags.suppresses(EventKind::Data));
        assert!(!flags.suppresses(EventKind::Body));
        assert!(flags.waives_reply(EventKind::Body));
        assert!(!flags.waives_reply(EventKind::Data));
    }

    #[test]
    fn test_control_events_have_no_bits() {
        assert_eq!(None, Protocol::no_send_bit(EventKind::EndOfMessage));
        assert_eq!(None, Protocol::no_reply_bit(EventKind::Abort));
    }

    #[test]
    fn test_version_mask_clamps_old_versions() {
        assert_eq!(0x7f, Protocol::version_mask(2).bits());
        assert!(Protocol::version_mask(6).contains(Protocol::SKIP));
    }
}
