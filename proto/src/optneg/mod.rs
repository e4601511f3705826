//! The options handshake: versions, capability masks and event selection.
//!
//! The first frame of every connection is the MTA's [`Options`] offer. The
//! milter answers with the subset it intends to use, computed by
//! [`MilterOptions::negotiate`], and both sides hold to the agreed
//! [`Negotiated`] sets for the rest of the conversation.

mod capability;
mod protocol;
mod stages;

use bytes::{BufMut, BytesMut};
use thiserror::Error;

use crate::buf::BufExt;
use crate::decoding::Decode;
use crate::encoding::Encode;
use crate::{ProtocolError, ShortRead};

pub use capability::Capability;
pub use protocol::Protocol;
pub use stages::{MacroStage, MacroStages};

/// The oldest protocol version this library will talk.
pub const MIN_VERSION: u32 = 2;
/// The newest protocol version this library will talk.
pub const MAX_VERSION: u32 = 6;

/// The options frame exchanged at the start of every connection.
///
/// Inbound it is the MTA's offer; outbound it is the milter's reply,
/// optionally extended with per-stage [`MacroStages`] requests.
#[doc(alias = "SMFIC_OPTNEG")]
#[derive(Clone, PartialEq, Debug)]
pub struct Options {
    /// The milter protocol version spoken.
    pub version: u32,
    /// Which modification actions may be used.
    pub actions: Capability,
    /// Event suppression, reply waivers and feature flags.
    pub protocol: Protocol,
    /// Macro lists requested per stage (outbound only).
    pub macro_stages: MacroStages,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            version: MAX_VERSION,
            actions: Capability::default(),
            protocol: Protocol::default(),
            macro_stages: MacroStages::default(),
        }
    }
}

impl Options {
    const CODE: u8 = b'O';
    const FIXED_SIZE: usize = 4 + 4 + 4;
}

impl Decode for Options {
    const CODE: u8 = Self::CODE;

    fn decode(mut buffer: BytesMut) -> Result<Self, ProtocolError> {
        let got = buffer.len();
        let (Some(version), Some(actions), Some(protocol)) = (
            buffer.take_u32_be(),
            buffer.take_u32_be(),
            buffer.take_u32_be(),
        ) else {
            return Err(ShortRead::new(
                "Options",
                "version, action and protocol words required",
                Self::FIXED_SIZE,
                got,
            )
            .into());
        };

        // Trailing bytes would be macro requests; an MTA does not send any.
        Ok(Self {
            version,
            actions: Capability::from_bits_retain(actions),
            protocol: Protocol::from_bits_retain(protocol),
            macro_stages: MacroStages::default(),
        })
    }
}

impl Encode for Options {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u32(self.version);
        buffer.put_u32(self.actions.bits());
        buffer.put_u32(self.protocol.bits());

        self.macro_stages.write(buffer);
    }

    fn encoded_len(&self) -> usize {
        Self::FIXED_SIZE + self.macro_stages.encoded_len()
    }

    fn code(&self) -> u8 {
        Self::CODE
    }
}

/// Why the options handshake failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NegotiationError {
    /// The MTA speaks an older protocol than this library supports.
    #[error("MTA offered milter protocol version {offered}, minimum supported is {MIN_VERSION}")]
    UnsupportedVersion {
        /// The version the MTA offered.
        offered: u32,
    },
    /// The MTA did not grant an action the milter cannot work without.
    #[error("MTA did not grant required actions {missing:?}")]
    MissingActions {
        /// Required actions absent from the MTA's offer.
        missing: Capability,
    },
}

/// The agreed outcome of the handshake, kept for the whole connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    /// The protocol version both sides speak.
    pub version: u32,
    /// Actions the milter may use; every send is gated on this set.
    pub actions: Capability,
    /// The protocol flags in effect.
    pub protocol: Protocol,
}

bitflags::bitflags! {
    /// The set of data events, for negotiation preferences.
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub struct Events: u16 {
        /// Connection information
        const CONNECT = 1 << 0;
        /// HELO/EHLO
        const HELO = 1 << 1;
        /// MAIL FROM
        const MAIL = 1 << 2;
        /// RCPT TO
        const RCPT = 1 << 3;
        /// DATA
        const DATA = 1 << 4;
        /// Individual headers
        const HEADER = 1 << 5;
        /// End of headers
        const EOH = 1 << 6;
        /// Body chunks
        const BODY = 1 << 7;
        /// Unknown SMTP commands
        const UNKNOWN = 1 << 8;
    }
}

impl Default for Events {
    fn default() -> Self {
        Self::all()
    }
}

const EVENT_TABLE: [(Events, Protocol, Protocol); 9] = [
    (Events::CONNECT, Protocol::NO_CONNECT, Protocol::NR_CONN),
    (Events::HELO, Protocol::NO_HELO, Protocol::NR_HELO),
    (Events::MAIL, Protocol::NO_MAIL, Protocol::NR_MAIL),
    (Events::RCPT, Protocol::NO_RCPT, Protocol::NR_RCPT),
    (Events::DATA, Protocol::NO_DATA, Protocol::NR_DATA),
    (Events::HEADER, Protocol::NO_HDRS, Protocol::NR_HDR),
    (Events::EOH, Protocol::NO_EOH, Protocol::NR_EOH),
    (Events::BODY, Protocol::NO_BODY, Protocol::NR_BODY),
    (Events::UNKNOWN, Protocol::NO_UNKNOWN, Protocol::NR_UNKNOWN),
];

/// What a milter requires and tolerates, fed into the handshake.
#[derive(Debug, Clone)]
pub struct MilterOptions {
    /// Actions the milter cannot work without; negotiation fails when the
    /// MTA withholds any of them.
    pub required_actions: Capability,
    /// Actions the milter uses when available.
    pub optional_actions: Capability,
    /// Events the milter wants delivered; declare the events your handlers
    /// cover. Everything else is suppressed via its `NO_*` bit, so the
    /// empty default asks the MTA to send nothing beyond the mandatory
    /// events.
    pub events: Events,
    /// Events whose reply the MTA need not wait for (`NR_*` bits).
    pub no_reply: Events,
    /// Whether the milter understands `Skip` replies to body chunks.
    pub skip: bool,
    /// Whether already-rejected recipients should be delivered too.
    pub rejected_recipients: bool,
    /// Whether header values should keep their leading space.
    pub leading_space: bool,
    /// Macro lists to request per stage.
    pub macro_stages: MacroStages,
}

impl Default for MilterOptions {
    fn default() -> Self {
        Self {
            required_actions: Capability::empty(),
            optional_actions: Capability::all(),
            events: Events::empty(),
            no_reply: Events::empty(),
            skip: true,
            rejected_recipients: false,
            leading_space: false,
            macro_stages: MacroStages::default(),
        }
    }
}

impl MilterOptions {
    /// Run the handshake against the MTA's offer.
    ///
    /// Clamps the version into the supported range, verifies the required
    /// actions, intersects the optional ones, and derives the protocol
    /// flags from the event preferences. Reply waivers and feature flags
    /// only take effect when the MTA offered them; suppression requests are
    /// ours alone to make.
    ///
    /// Returns the options reply to put on the wire together with the
    /// [`Negotiated`] sets to keep.
    ///
    /// # Errors
    /// [`NegotiationError`] when the offered version is too old or a
    /// required action was not granted.
    pub fn negotiate(&self, offer: &Options) -> Result<(Options, Negotiated), NegotiationError> {
        if offer.version < MIN_VERSION {
            return Err(NegotiationError::UnsupportedVersion {
                offered: offer.version,
            });
        }
        let version = offer.version.min(MAX_VERSION);

        let granted = offer.actions & Capability::version_mask(version);
        if !granted.contains(self.required_actions) {
            return Err(NegotiationError::MissingActions {
                missing: self.required_actions - granted,
            });
        }
        let actions = (self.required_actions | self.optional_actions) & granted;

        let mut protocol = Protocol::empty();
        for (event, no_send, no_reply) in EVENT_TABLE {
            if !self.events.contains(event) {
                protocol |= no_send;
            } else if self.no_reply.contains(event) {
                protocol |= no_reply & offer.protocol;
            }
        }

        let mut features = Protocol::empty();
        if self.skip {
            features |= Protocol::SKIP;
        }
        if self.rejected_recipients {
            features |= Protocol::RCPT_REJ;
        }
        if self.leading_space {
            features |= Protocol::HDR_LEADSPC;
        }
        protocol |= features & offer.protocol;
        let protocol = protocol & Protocol::version_mask(version);

        let negotiated = Negotiated {
            version,
            actions,
            protocol,
        };
        let reply = Options {
            version,
            actions,
            protocol,
            macro_stages: self.macro_stages.clone(),
        };

        Ok((reply, negotiated))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    fn offer(version: u32, actions: u32, protocol: u32) -> Options {
        Options {
            version,
            actions: Capability::from_bits_retain(actions),
            protocol: Protocol::from_bits_retain(protocol),
            macro_stages: MacroStages::default(),
        }
    }

    #[test]
    fn test_decode_options() {
        let mut raw = BytesMut::new();
        raw.extend_from_slice(&6u32.to_be_bytes());
        raw.extend_from_slice(&0x1ffu32.to_be_bytes());
        raw.extend_from_slice(&0x1f_ffffu32.to_be_bytes());

        let options = Options::decode(raw).expect("decoding options failed");

        assert_eq!(6, options.version);
        assert_eq!(Capability::all(), options.actions);
        assert_eq!(Protocol::all(), options.protocol);
    }

    #[test]
    fn test_decode_options_short() {
        let res = Options::decode(BytesMut::from_iter([0, 0, 0, 6, 0, 0]));

        assert_matches!(res, Err(ProtocolError::ShortRead(_)));
    }

    #[test]
    fn test_encode_options_fixed_part() {
        let options = Options::default();

        let mut buffer = BytesMut::new();
        options.encode(&mut buffer);

        let mut expected = BytesMut::new();
        expected.extend_from_slice(&MAX_VERSION.to_be_bytes());
        expected.extend_from_slice(&Capability::all().bits().to_be_bytes());
        expected.extend_from_slice(&0u32.to_be_bytes());

        assert_eq!(expected, buffer);
        assert_eq!(options.encoded_len(), buffer.len());
        assert_eq!(b'O', Encode::code(&options));
    }

    #[test]
    fn test_negotiate_clamps_version() {
        let opts = MilterOptions::default();

        let (reply, negotiated) = opts
            .negotiate(&offer(8, 0x1ff, 0x1f_ffff))
            .expect("negotiation failed");

        assert_eq!(MAX_VERSION, reply.version);
        assert_eq!(MAX_VERSION, negotiated.version);
    }

    #[test]
    fn test_negotiate_rejects_old_version() {
        let res = MilterOptions::default().negotiate(&offer(1, 0x1ff, 0));

        assert_matches!(
            res,
            Err(NegotiationError::UnsupportedVersion { offered: 1 })
        );
    }

    #[test]
    fn test_negotiate_requires_granted_actions() {
        let opts = MilterOptions {
            required_actions: Capability::CHGFROM,
            ..MilterOptions::default()
        };

        let res = opts.negotiate(&offer(6, Capability::ADDHDR.bits(), 0));

        assert_matches!(
            res,
            Err(NegotiationError::MissingActions { missing }) if missing == Capability::CHGFROM
        );
    }

    #[test]
    fn test_negotiate_effective_actions_bounds() {
        // Effective actions stay inside the offer and cover the required set.
        let opts = MilterOptions {
            required_actions: Capability::ADDHDR,
            optional_actions: Capability::QUARANTINE | Capability::CHGBODY,
            ..MilterOptions::default()
        };
        let mta = offer(6, (Capability::ADDHDR | Capability::QUARANTINE).bits(), 0);

        let (_, negotiated) = opts.negotiate(&mta).expect("negotiation failed");

        assert!(mta.actions.contains(negotiated.actions));
        assert!(negotiated.actions.contains(Capability::ADDHDR));
        assert_eq!(
            Capability::ADDHDR | Capability::QUARANTINE,
            negotiated.actions
        );
    }

    #[test]
    fn test_negotiate_unhandled_events_become_no_bits() {
        // The default declares no handled events, so everything
        // suppressible gets its NO_* bit.
        let opts = MilterOptions {
            skip: false,
            ..MilterOptions::default()
        };

        let (reply, _) = opts
            .negotiate(&offer(6, 0x1ff, 0))
            .expect("negotiation failed");

        let all_no = Protocol::NO_CONNECT
            | Protocol::NO_HELO
            | Protocol::NO_MAIL
            | Protocol::NO_RCPT
            | Protocol::NO_DATA
            | Protocol::NO_HDRS
            | Protocol::NO_EOH
            | Protocol::NO_BODY
            | Protocol::NO_UNKNOWN;
        assert_eq!(all_no, reply.protocol);
    }

    #[test]
    fn test_negotiate_features_need_the_offer() {
        let opts = MilterOptions {
            events: Events::all(),
            no_reply: Events::HEADER,
            ..MilterOptions::default()
        };

        // MTA offers neither SKIP nor NR_HDR: both stay off.
        let (_, bare) = opts.negotiate(&offer(6, 0x1ff, 0)).expect("negotiation");
        assert!(!bare.protocol.contains(Protocol::SKIP));
        assert!(!bare.protocol.contains(Protocol::NR_HDR));

        // Offered: both agreed.
        let (_, full) = opts
            .negotiate(&offer(6, 0x1ff, (Protocol::SKIP | Protocol::NR_HDR).bits()))
            .expect("negotiation");
        assert!(full.protocol.contains(Protocol::SKIP));
        assert!(full.protocol.contains(Protocol::NR_HDR));
    }

    #[test]
    fn test_negotiate_version_2_masks_capabilities() {
        let opts = MilterOptions::default();

        let (reply, negotiated) = opts
            .negotiate(&offer(2, 0x1ff, 0x1f_ffff))
            .expect("negotiation failed");

        assert_eq!(2, negotiated.version);
        assert_eq!(Capability::version_mask(2), negotiated.actions);
        assert!(!reply.protocol.contains(Protocol::SKIP));
    }
}
