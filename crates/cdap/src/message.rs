use bytes::{Buf, BufMut, BytesMut};

use crate::{
    Error,
    opcode::{AuthType, Flags, Opcode},
    value::ObjectValue,
};

/// A CDAP message.
///
/// Every attribute but `opcode` and `invoke_id` is optional; which ones are
/// required for a given opcode is the validator's job (`crate::validator`),
/// not this type's.
#[derive(Debug, Clone, PartialEq)]
pub struct CdapMessage {
    pub opcode: Opcode,
    pub invoke_id: u32,
    pub abs_syntax: Option<i32>,
    pub auth_mech: Option<AuthType>,
    pub auth_value: Option<Vec<u8>>,
    pub src_ap_name: Option<String>,
    pub src_ap_inst: Option<String>,
    pub src_ae_name: Option<String>,
    pub src_ae_inst: Option<String>,
    pub dest_ap_name: Option<String>,
    pub dest_ap_inst: Option<String>,
    pub dest_ae_name: Option<String>,
    pub dest_ae_inst: Option<String>,
    pub filter: Option<Vec<u8>>,
    pub flags: Flags,
    pub obj_class: Option<String>,
    pub obj_name: Option<String>,
    pub obj_inst: Option<i64>,
    pub obj_value: Option<ObjectValue>,
    pub scope: Option<i32>,
    pub result: Option<i32>,
    pub result_reason: Option<String>,
    pub rib_version: Option<i32>,
}

impl CdapMessage {
    /// A message with only the mandatory fields filled in; callers set the
    /// rest.
    pub fn new(opcode: Opcode, invoke_id: u32) -> Self {
        Self {
            opcode,
            invoke_id,
            abs_syntax: None,
            auth_mech: None,
            auth_value: None,
            src_ap_name: None,
            src_ap_inst: None,
            src_ae_name: None,
            src_ae_inst: None,
            dest_ap_name: None,
            dest_ap_inst: None,
            dest_ae_name: None,
            dest_ae_inst: None,
            filter: None,
            flags: Flags::None,
            obj_class: None,
            obj_name: None,
            obj_inst: None,
            obj_value: None,
            scope: None,
            result: None,
            result_reason: None,
            rib_version: None,
        }
    }
}

/// Tag catalog for the field-tagged attribute framing.
///
/// Unlike `kctl::Tag` this catalog is shared by every opcode — a CDAP
/// message's required-field set is opcode-dependent, not tag-dependent, so
/// one flat namespace is enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
enum Tag {
    AbsSyntax = 1,
    AuthMech = 2,
    AuthValue = 3,
    SrcApName = 4,
    SrcApInst = 5,
    SrcAeName = 6,
    SrcAeInst = 7,
    DestApName = 8,
    DestApInst = 9,
    DestAeName = 10,
    DestAeInst = 11,
    Filter = 12,
    Flags = 13,
    ObjClass = 14,
    ObjName = 15,
    ObjInst = 16,
    ObjValue = 17,
    Scope = 18,
    Result = 19,
    ResultReason = 20,
    RibVersion = 21,
}

fn put_string(buf: &mut BytesMut, tag: Tag, value: &str) {
    buf.put_u16(tag as u16);
    buf.put_u16(value.len() as u16);
    buf.put_slice(value.as_bytes());
}

fn put_bytes(buf: &mut BytesMut, tag: Tag, value: &[u8]) {
    buf.put_u16(tag as u16);
    buf.put_u16(value.len() as u16);
    buf.put_slice(value);
}

fn put_u16(buf: &mut BytesMut, tag: Tag, value: u16) {
    buf.put_u16(tag as u16);
    buf.put_u16(2);
    buf.put_u16(value);
}

fn put_i32(buf: &mut BytesMut, tag: Tag, value: i32) {
    buf.put_u16(tag as u16);
    buf.put_u16(4);
    buf.put_i32(value);
}

fn put_i64(buf: &mut BytesMut, tag: Tag, value: i64) {
    buf.put_u16(tag as u16);
    buf.put_u16(8);
    buf.put_i64(value);
}

/// Encode a CDAP message to its field-tagged wire form.
///
/// Header: `opcode: u16, invoke_id: u32, attribute_count: u16`, followed by
/// `attribute_count` (tag: u16, length: u16, value) triplets.
pub fn encode(msg: &CdapMessage, buf: &mut BytesMut) {
    buf.clear();
    buf.put_u16(msg.opcode.into());
    buf.put_u32(msg.invoke_id);

    let count_index = buf.len();
    buf.put_u16(0);
    let mut count = 0u16;

    macro_rules! attr {
        ($block:block) => {{
            $block
            count += 1;
        }};
    }

    if let Some(v) = msg.abs_syntax {
        attr!({ put_i32(buf, Tag::AbsSyntax, v) });
    }
    if let Some(v) = msg.auth_mech {
        attr!({ put_u16(buf, Tag::AuthMech, v.into()) });
    }
    if let Some(v) = &msg.auth_value {
        attr!({ put_bytes(buf, Tag::AuthValue, v) });
    }
    if let Some(v) = &msg.src_ap_name {
        attr!({ put_string(buf, Tag::SrcApName, v) });
    }
    if let Some(v) = &msg.src_ap_inst {
        attr!({ put_string(buf, Tag::SrcApInst, v) });
    }
    if let Some(v) = &msg.src_ae_name {
        attr!({ put_string(buf, Tag::SrcAeName, v) });
    }
    if let Some(v) = &msg.src_ae_inst {
        attr!({ put_string(buf, Tag::SrcAeInst, v) });
    }
    if let Some(v) = &msg.dest_ap_name {
        attr!({ put_string(buf, Tag::DestApName, v) });
    }
    if let Some(v) = &msg.dest_ap_inst {
        attr!({ put_string(buf, Tag::DestApInst, v) });
    }
    if let Some(v) = &msg.dest_ae_name {
        attr!({ put_string(buf, Tag::DestAeName, v) });
    }
    if let Some(v) = &msg.dest_ae_inst {
        attr!({ put_string(buf, Tag::DestAeInst, v) });
    }
    if let Some(v) = &msg.filter {
        attr!({ put_bytes(buf, Tag::Filter, v) });
    }
    if !matches!(msg.flags, Flags::None) {
        attr!({ put_u16(buf, Tag::Flags, msg.flags.into()) });
    }
    if let Some(v) = &msg.obj_class {
        attr!({ put_string(buf, Tag::ObjClass, v) });
    }
    if let Some(v) = &msg.obj_name {
        attr!({ put_string(buf, Tag::ObjName, v) });
    }
    if let Some(v) = msg.obj_inst {
        attr!({ put_i64(buf, Tag::ObjInst, v) });
    }
    if let Some(v) = &msg.obj_value {
        attr!({
            buf.put_u16(Tag::ObjValue as u16);
            let len_index = buf.len();
            buf.put_u16(0);
            let start = buf.len();
            v.encode(buf);
            let len = (buf.len() - start) as u16;
            buf[len_index..len_index + 2].copy_from_slice(&len.to_be_bytes());
        });
    }
    if let Some(v) = msg.scope {
        attr!({ put_i32(buf, Tag::Scope, v) });
    }
    if let Some(v) = msg.result {
        attr!({ put_i32(buf, Tag::Result, v) });
    }
    if let Some(v) = &msg.result_reason {
        attr!({ put_string(buf, Tag::ResultReason, v) });
    }
    if let Some(v) = msg.rib_version {
        attr!({ put_i32(buf, Tag::RibVersion, v) });
    }

    buf[count_index..count_index + 2].copy_from_slice(&count.to_be_bytes());
}

/// Decode a CDAP message from its field-tagged wire form.
///
/// Tags this crate's catalog does not recognize are skipped by length,
/// the same forward-compatibility rule the kernel control channel uses.
pub fn decode(bytes: &[u8]) -> Result<CdapMessage, Error> {
    let mut buf = bytes;
    if buf.remaining() < 8 {
        return Err(Error::MalformedMessage);
    }

    let opcode_tag = buf.get_u16();
    let opcode = Opcode::try_from(opcode_tag).map_err(|_| Error::UnknownOpcode(opcode_tag))?;
    let invoke_id = buf.get_u32();
    let count = buf.get_u16();

    let mut msg = CdapMessage::new(opcode, invoke_id);

    for _ in 0..count {
        if buf.remaining() < 4 {
            return Err(Error::MalformedMessage);
        }

        let tag = buf.get_u16();
        let len = buf.get_u16() as usize;
        if buf.remaining() < len {
            return Err(Error::MalformedMessage);
        }

        let (field, rest) = buf.split_at(len);
        buf = rest;
        apply_tag(&mut msg, tag, field)?;
    }

    Ok(msg)
}

fn apply_tag(msg: &mut CdapMessage, tag: u16, mut field: &[u8]) -> Result<(), Error> {
    match tag {
        t if t == Tag::AbsSyntax as u16 => msg.abs_syntax = Some(read_i32(&mut field)?),
        t if t == Tag::AuthMech as u16 => {
            let raw = read_u16(&mut field)?;
            msg.auth_mech =
                Some(AuthType::try_from(raw).map_err(|_| Error::InvalidField("auth_mech"))?)
        }
        t if t == Tag::AuthValue as u16 => msg.auth_value = Some(field.to_vec()),
        t if t == Tag::SrcApName as u16 => msg.src_ap_name = Some(read_string(field)?),
        t if t == Tag::SrcApInst as u16 => msg.src_ap_inst = Some(read_string(field)?),
        t if t == Tag::SrcAeName as u16 => msg.src_ae_name = Some(read_string(field)?),
        t if t == Tag::SrcAeInst as u16 => msg.src_ae_inst = Some(read_string(field)?),
        t if t == Tag::DestApName as u16 => msg.dest_ap_name = Some(read_string(field)?),
        t if t == Tag::DestApInst as u16 => msg.dest_ap_inst = Some(read_string(field)?),
        t if t == Tag::DestAeName as u16 => msg.dest_ae_name = Some(read_string(field)?),
        t if t == Tag::DestAeInst as u16 => msg.dest_ae_inst = Some(read_string(field)?),
        t if t == Tag::Filter as u16 => msg.filter = Some(field.to_vec()),
        t if t == Tag::Flags as u16 => {
            let raw = read_u16(&mut field)?;
            msg.flags = Flags::try_from(raw).map_err(|_| Error::InvalidField("flags"))?
        }
        t if t == Tag::ObjClass as u16 => msg.obj_class = Some(read_string(field)?),
        t if t == Tag::ObjName as u16 => msg.obj_name = Some(read_string(field)?),
        t if t == Tag::ObjInst as u16 => msg.obj_inst = Some(read_i64(&mut field)?),
        t if t == Tag::ObjValue as u16 => msg.obj_value = Some(ObjectValue::decode(&mut field)?),
        t if t == Tag::Scope as u16 => msg.scope = Some(read_i32(&mut field)?),
        t if t == Tag::Result as u16 => msg.result = Some(read_i32(&mut field)?),
        t if t == Tag::ResultReason as u16 => msg.result_reason = Some(read_string(field)?),
        t if t == Tag::RibVersion as u16 => msg.rib_version = Some(read_i32(&mut field)?),
        _ => {} // unknown tag: skip
    }

    Ok(())
}

fn read_i32(field: &mut &[u8]) -> Result<i32, Error> {
    if field.remaining() < 4 {
        return Err(Error::MalformedMessage);
    }
    Ok(field.get_i32())
}

fn read_i64(field: &mut &[u8]) -> Result<i64, Error> {
    if field.remaining() < 8 {
        return Err(Error::MalformedMessage);
    }
    Ok(field.get_i64())
}

fn read_u16(field: &mut &[u8]) -> Result<u16, Error> {
    if field.remaining() < 2 {
        return Err(Error::MalformedMessage);
    }
    Ok(field.get_u16())
}

fn read_string(field: &[u8]) -> Result<String, Error> {
    String::from_utf8(field.to_vec()).map_err(|_| Error::MalformedMessage)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_connect(invoke_id: u32) -> CdapMessage {
        let mut m = CdapMessage::new(Opcode::MConnect, invoke_id);
        m.abs_syntax = Some(1);
        m.auth_mech = Some(AuthType::Passwd);
        m.auth_value = Some(b"secret".to_vec());
        m.src_ap_name = Some("ipcp-a".to_string());
        m.dest_ap_name = Some("ipcp-b".to_string());
        m
    }

    #[test]
    fn round_trips_m_connect() {
        let msg = sample_connect(7);
        let mut buf = BytesMut::new();
        encode(&msg, &mut buf);
        let decoded = decode(&buf).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn round_trips_m_create_r_with_result_and_object_value() {
        let mut msg = CdapMessage::new(Opcode::MCreateR, 9);
        msg.result = Some(5);
        msg.result_reason = Some("already exists".to_string());
        msg.obj_class = Some("flow".to_string());
        msg.obj_name = Some("/dif/resourceallocation/flowallocator/flows/1".to_string());
        msg.obj_value = Some(ObjectValue::I32(42));

        let mut buf = BytesMut::new();
        encode(&msg, &mut buf);
        let decoded = decode(&buf).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn unknown_tags_are_skipped() {
        let msg = sample_connect(3);
        let mut buf = BytesMut::new();
        encode(&msg, &mut buf);

        // Splice an attribute with an unrecognized tag (9001) right before
        // the trailing attributes finish.
        let mut spliced = BytesMut::new();
        spliced.put_u16(Opcode::MConnect.into());
        spliced.put_u32(3);
        spliced.put_u16(1); // attribute_count = 1
        spliced.put_u16(9001);
        spliced.put_u16(3);
        spliced.put_slice(b"abc");

        let decoded = decode(&spliced).unwrap();
        assert_eq!(decoded.opcode, Opcode::MConnect);
        assert_eq!(decoded.invoke_id, 3);
        assert!(decoded.src_ap_name.is_none());
    }
}
