use ironmilter_proto::events::EventKind;
use ironmilter_proto::optneg::Protocol;

/// Where a session stands on the conversation automaton.
///
/// Phases are named after the last processed event; the transition table
/// decides which events may follow. Macro definitions are absorbed before
/// the table is consulted and never move the automaton.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Awaiting the MTA's options offer.
    Negotiate,
    /// Options exchanged; awaiting connection information.
    Options,
    Connect,
    Helo,
    Mail,
    Rcpt,
    Data,
    Header,
    Eoh,
    Body,
    Eom,
    /// Released by a quit-nc; only a fresh connect (or quit) may follow.
    Reuse,
}

// Events that can be turned off during negotiation, and may therefore have
// to be skipped over when checking legality.
const SUPPRESSIBLE: [EventKind; 9] = [
    EventKind::Connect,
    EventKind::Helo,
    EventKind::Mail,
    EventKind::Recipient,
    EventKind::Data,
    EventKind::Header,
    EventKind::EndOfHeaders,
    EventKind::Body,
    EventKind::Unknown,
];

impl Phase {
    /// Events acceptable right after this phase, with nothing suppressed.
    fn allows(self, kind: EventKind) -> bool {
        use EventKind::{
            Abort, Body, Connect, Data, Disconnect, EndOfHeaders, EndOfMessage, Header, Helo,
            Mail, Options, Quit, Recipient, Unknown,
        };

        match self {
            Self::Negotiate => matches!(kind, Options),
            Self::Options => matches!(kind, Connect),
            Self::Connect => matches!(kind, Helo | Abort | Quit | Disconnect),
            Self::Helo => matches!(kind, Mail | Abort | Quit | Disconnect | Unknown),
            Self::Mail => matches!(kind, Recipient | Abort | Quit),
            Self::Rcpt => matches!(kind, Recipient | Data | Abort | Quit),
            Self::Data | Self::Header => matches!(kind, Header | EndOfHeaders | Abort | Quit),
            Self::Eoh | Self::Body => matches!(kind, Body | EndOfMessage | Abort | Quit),
            Self::Eom => matches!(kind, Mail | Abort | Quit | Disconnect),
            Self::Reuse => matches!(kind, Connect | Quit),
        }
    }

    /// The phase after processing `kind`.
    #[must_use]
    pub(crate) fn advance(self, kind: EventKind) -> Self {
        match kind {
            EventKind::Options => Self::Options,
            EventKind::Connect => Self::Connect,
            EventKind::Helo => Self::Helo,
            EventKind::Mail => Self::Mail,
            EventKind::Recipient => Self::Rcpt,
            EventKind::Data => Self::Data,
            EventKind::Header => Self::Header,
            EventKind::EndOfHeaders => Self::Eoh,
            EventKind::Body => Self::Body,
            EventKind::EndOfMessage => Self::Eom,
            // An aborted transaction is ready for the next MAIL FROM.
            EventKind::Abort => Self::Helo,
            EventKind::Disconnect => Self::Reuse,
            EventKind::Quit | EventKind::DefineMacro | EventKind::Unknown => self,
        }
    }

    /// Whether `kind` may arrive now, given the events `negotiated` turned
    /// off.
    ///
    /// A suppressed event never arrives, so its successors become
    /// acceptable in its place: with `NO_DATA` agreed, a header may directly
    /// follow the last recipient. The check walks forward across suppressed
    /// stages only.
    #[must_use]
    pub(crate) fn permits(self, kind: EventKind, negotiated: Protocol) -> bool {
        let mut reachable = vec![self];
        let mut cursor = 0;

        while cursor < reachable.len() {
            let phase = reachable[cursor];
            cursor += 1;

            if phase.allows(kind) {
                return true;
            }

            for skipped in SUPPRESSIBLE {
                if phase.allows(skipped) && negotiated.suppresses(skipped) {
                    let next = phase.advance(skipped);
                    if !reachable.contains(&next) {
                        reachable.push(next);
                    }
                }
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Phase::Negotiate, EventKind::Options)]
    #[case(Phase::Options, EventKind::Connect)]
    #[case(Phase::Connect, EventKind::Helo)]
    #[case(Phase::Helo, EventKind::Mail)]
    #[case(Phase::Mail, EventKind::Recipient)]
    #[case(Phase::Rcpt, EventKind::Recipient)]
    #[case(Phase::Rcpt, EventKind::Data)]
    #[case(Phase::Data, EventKind::Header)]
    #[case(Phase::Header, EventKind::EndOfHeaders)]
    #[case(Phase::Eoh, EventKind::Body)]
    #[case(Phase::Body, EventKind::Body)]
    #[case(Phase::Body, EventKind::EndOfMessage)]
    #[case(Phase::Eom, EventKind::Mail)]
    #[case(Phase::Eom, EventKind::Disconnect)]
    #[case(Phase::Reuse, EventKind::Connect)]
    fn test_legal_transitions(#[case] phase: Phase, #[case] kind: EventKind) {
        assert!(phase.permits(kind, Protocol::empty()));
    }

    #[rstest]
    #[case(Phase::Negotiate, EventKind::Connect)]
    #[case(Phase::Options, EventKind::Mail)]
    #[case(Phase::Mail, EventKind::Body)]
    #[case(Phase::Mail, EventKind::EndOfMessage)]
    #[case(Phase::Rcpt, EventKind::Connect)]
    #[case(Phase::Body, EventKind::Recipient)]
    #[case(Phase::Eom, EventKind::Body)]
    #[case(Phase::Reuse, EventKind::Mail)]
    fn test_illegal_transitions(#[case] phase: Phase, #[case] kind: EventKind) {
        assert!(!phase.permits(kind, Protocol::empty()));
    }

    #[test]
    fn test_suppressed_stage_is_skipped() {
        // With DATA turned off, headers follow the recipients directly.
        assert!(Phase::Rcpt.permits(EventKind::Header, Protocol::NO_DATA));
        assert!(!Phase::Rcpt.permits(EventKind::Header, Protocol::empty()));
    }

    #[test]
    fn test_suppression_chains() {
        // No recipients, no DATA, no headers: end-of-headers right after MAIL.
        let flags = Protocol::NO_RCPT | Protocol::NO_DATA | Protocol::NO_HDRS;

        assert!(Phase::Mail.permits(EventKind::EndOfHeaders, flags));
        assert!(!Phase::Mail.permits(EventKind::EndOfHeaders, Protocol::NO_RCPT));
    }

    #[test]
    fn test_suppression_opens_successors_only() {
        assert!(!Phase::Rcpt.permits(EventKind::Mail, Protocol::NO_DATA));
    }

    #[test]
    fn test_advance_follows_events() {
        assert_eq!(Phase::Mail, Phase::Helo.advance(EventKind::Mail));
        assert_eq!(Phase::Helo, Phase::Body.advance(EventKind::Abort));
        assert_eq!(Phase::Reuse, Phase::Eom.advance(EventKind::Disconnect));
        assert_eq!(Phase::Header, Phase::Header.advance(EventKind::Header));
    }
}
