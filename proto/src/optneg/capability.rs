bitflags::bitflags! {
    /// What a milter may do to a message.
    ///
    /// Sendmail docs call these "actions". The MTA offers a set in its
    /// options frame; the milter answers with the subset it intends to use.
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub struct Capability: u32 {
        /// Add headers
        #[doc(alias = "SMFIF_ADDHDRS")]
        const ADDHDR = 0x0000_0001;
        /// Replace the message body
        #[doc(alias = "SMFIF_CHGBODY")]
        const CHGBODY = 0x0000_0002;
        /// Add envelope recipients
        #[doc(alias = "SMFIF_ADDRCPT")]
        const ADDRCPT = 0x0000_0004;
        /// Delete envelope recipients
        #[doc(alias = "SMFIF_DELRCPT")]
        const DELRCPT = 0x0000_0008;
        /// Change or delete headers
        #[doc(alias = "SMFIF_CHGHDRS")]
        const CHGHDR = 0x0000_0010;
        /// Quarantine the message
        #[doc(alias = "SMFIF_QUARANTINE")]
        const QUARANTINE = 0x0000_0020;
        /// Change the envelope sender
        #[doc(alias = "SMFIF_CHGFROM")]
        const CHGFROM = 0x0000_0040;
        /// Add envelope recipients carrying ESMTP arguments
        #[doc(alias = "SMFIF_ADDRCPT_PAR")]
        const ADDRCPT_PAR = 0x0000_0080;
        /// Request per-stage macro lists
        #[doc(alias = "SMFIF_SETSYMLIST")]
        const SETSYMLIST = 0x0000_0100;
    }
}

impl Default for Capability {
    /// Everything; negotiation intersects this down.
    fn default() -> Self {
        Capability::all()
    }
}

impl Capability {
    /// The bits expressible in protocol `version`.
    ///
    /// Version 2 predates the envelope-rewriting and macro-list bits.
    #[must_use]
    pub fn version_mask(version: u32) -> Self {
        if version >= 6 {
            Self::all()
        } else {
            Self::ADDHDR
                .union(Self::CHGBODY)
                .union(Self::ADDRCPT)
                .union(Self::DELRCPT)
                .union(Self::CHGHDR)
                .union(Self::QUARANTINE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_bits_roundtrip() {
        let bits = Capability::from_bits(0x0000_01ff);

        assert_eq!(Some(Capability::all()), bits);
    }

    #[test]
    fn test_version_mask_clamps_old_versions() {
        let old = Capability::version_mask(2);

        assert_eq!(0x3f, old.bits());
        assert!(!old.contains(Capability::CHGFROM));
        assert!(Capability::version_mask(6).contains(Capability::SETSYMLIST));
    }
}
