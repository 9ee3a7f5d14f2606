use bytes::{Buf, BufMut};

use crate::{Error, message_type::MessageType};

/// Flag bitmap carried by every record header: the three
/// direction bits plus one presence bit per optional attribute the record's
/// `MessageType` may carry. The presence bits are advisory only — this
/// crate always trusts the tagged-attribute list itself, so callers may
/// leave them clear; they exist for symmetry with the reference netlink
/// parsers, which use them to skip attribute parsing entirely when unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(pub u16);

impl Flags {
    pub const REQUEST: u16 = 1 << 0;
    pub const RESPONSE: u16 = 1 << 1;
    pub const NOTIFICATION: u16 = 1 << 2;

    pub fn request() -> Self {
        Self(Self::REQUEST)
    }

    pub fn response() -> Self {
        Self(Self::RESPONSE)
    }

    pub fn notification() -> Self {
        Self(Self::NOTIFICATION)
    }

    pub fn is_request(self) -> bool {
        self.0 & Self::REQUEST != 0
    }

    pub fn is_response(self) -> bool {
        self.0 & Self::RESPONSE != 0
    }

    pub fn is_notification(self) -> bool {
        self.0 & Self::NOTIFICATION != 0
    }

    pub fn with_bit(mut self, bit: u16) -> Self {
        self.0 |= bit;
        self
    }
}

/// The fixed-size header prefixing every kernel control-channel record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub sequence_number: u32,
    pub source_ipcp_id: u16,
    pub destination_ipcp_id: u16,
    pub destination_port: u32,
    pub message_type: MessageType,
    pub flags: Flags,
}

pub(crate) const HEADER_LEN: usize = 4 + 2 + 2 + 4 + 2 + 2;

impl Header {
    pub(crate) fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.sequence_number);
        buf.put_u16(self.source_ipcp_id);
        buf.put_u16(self.destination_ipcp_id);
        buf.put_u32(self.destination_port);
        buf.put_u16(self.message_type.into());
        buf.put_u16(self.flags.0);
    }

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        if buf.remaining() < HEADER_LEN {
            return Err(Error::MalformedRecord);
        }

        let sequence_number = buf.get_u32();
        let source_ipcp_id = buf.get_u16();
        let destination_ipcp_id = buf.get_u16();
        let destination_port = buf.get_u32();
        let message_type_tag = buf.get_u16();
        let message_type = MessageType::try_from(message_type_tag)
            .map_err(|_| Error::UnknownMessageType(message_type_tag))?;
        let flags = Flags(buf.get_u16());

        Ok(Self {
            sequence_number,
            source_ipcp_id,
            destination_ipcp_id,
            destination_port,
            message_type,
            flags,
        })
    }
}
