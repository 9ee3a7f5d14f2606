use bytes::{Buf, BufMut, BytesMut};

use crate::{
    Error,
    attrs::Attributes,
    header::{HEADER_LEN, Header},
};

/// One length-delimited record on the kernel control-channel stream: a
/// 4-byte length prefix, the fixed header, then the message-type-specific
/// tagged-attribute block.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub header: Header,
    pub attrs: Attributes,
}

impl Record {
    pub fn encode(&self, buf: &mut BytesMut) {
        let mut body = BytesMut::with_capacity(HEADER_LEN + 64);
        self.header.encode(&mut body);
        self.attrs.encode(&mut body);

        buf.put_u32(body.len() as u32);
        buf.put_slice(&body);
    }

    /// Decode exactly one record from `buf`, advancing it past the record.
    /// Returns `Ok(None)` if `buf` does not yet hold a full record (the
    /// caller should read more bytes and retry) — this is what lets the
    /// background reader task treat the stream as an unbounded byte pipe.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, Error> {
        if buf.len() < 4 {
            return Ok(None);
        }

        let len = u32::from_be_bytes(buf[0..4].try_into().unwrap()) as usize;
        if buf.len() < 4 + len {
            return Ok(None);
        }

        buf.advance(4);
        let mut body = buf.split_to(len);
        let header = Header::decode(&mut body)?;
        let attrs = Attributes::decode(&body)?;

        Ok(Some(Self { header, attrs }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{attrs::Tag, header::Flags, message_type::MessageType};

    #[test]
    fn round_trips_a_record_across_a_partial_buffer() {
        let mut attrs = Attributes::new();
        attrs.push_u32(Tag::PortId, 7);
        attrs.push_string(Tag::ApplicationName, "app1@src");

        let record = Record {
            header: Header {
                sequence_number: 17,
                source_ipcp_id: 1,
                destination_ipcp_id: 0,
                destination_port: 0,
                message_type: MessageType::AllocateFlow,
                flags: Flags::request(),
            },
            attrs,
        };

        let mut wire = BytesMut::new();
        record.encode(&mut wire);

        // Feed it back one byte at a time to prove partial buffers are
        // handled (decode returns None until the full record has arrived).
        let mut feed = BytesMut::new();
        let mut decoded = None;
        for byte in wire.iter() {
            feed.put_u8(*byte);
            if let Some(r) = Record::decode(&mut feed).unwrap() {
                decoded = Some(r);
                break;
            }
        }

        let decoded = decoded.unwrap();
        assert_eq!(decoded.header.sequence_number, 17);
        assert_eq!(decoded.attrs.get_u32(Tag::PortId), Some(7));
        assert_eq!(
            decoded.attrs.get_string(Tag::ApplicationName).as_deref(),
            Some("app1@src")
        );
        assert!(feed.is_empty());
    }
}
