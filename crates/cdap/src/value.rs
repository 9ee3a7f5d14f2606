use bytes::{Buf, BufMut};

use crate::Error;

/// A CDAP object value: a discriminated union of the scalar and byte-string
/// shapes the RIB stores objects as.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectValue {
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    Float(f32),
    Double(f64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum ValueTag {
    I32 = 0,
    I64 = 1,
    U32 = 2,
    U64 = 3,
    Float = 4,
    Double = 5,
    Bool = 6,
    String = 7,
    Bytes = 8,
}

impl TryFrom<u8> for ValueTag {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self, Error> {
        Ok(match tag {
            0 => Self::I32,
            1 => Self::I64,
            2 => Self::U32,
            3 => Self::U64,
            4 => Self::Float,
            5 => Self::Double,
            6 => Self::Bool,
            7 => Self::String,
            8 => Self::Bytes,
            _ => return Err(Error::InvalidField("object_value.tag")),
        })
    }
}

impl ObjectValue {
    pub(crate) fn encode(&self, buf: &mut impl BufMut) {
        match self {
            Self::I32(v) => {
                buf.put_u8(ValueTag::I32 as u8);
                buf.put_i32(*v);
            }
            Self::I64(v) => {
                buf.put_u8(ValueTag::I64 as u8);
                buf.put_i64(*v);
            }
            Self::U32(v) => {
                buf.put_u8(ValueTag::U32 as u8);
                buf.put_u32(*v);
            }
            Self::U64(v) => {
                buf.put_u8(ValueTag::U64 as u8);
                buf.put_u64(*v);
            }
            Self::Float(v) => {
                buf.put_u8(ValueTag::Float as u8);
                buf.put_f32(*v);
            }
            Self::Double(v) => {
                buf.put_u8(ValueTag::Double as u8);
                buf.put_f64(*v);
            }
            Self::Bool(v) => {
                buf.put_u8(ValueTag::Bool as u8);
                buf.put_u8(if *v { 1 } else { 0 });
            }
            Self::String(v) => {
                buf.put_u8(ValueTag::String as u8);
                buf.put_u16(v.len() as u16);
                buf.put_slice(v.as_bytes());
            }
            Self::Bytes(v) => {
                buf.put_u8(ValueTag::Bytes as u8);
                buf.put_u16(v.len() as u16);
                buf.put_slice(v);
            }
        }
    }

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        if !buf.has_remaining() {
            return Err(Error::MalformedMessage);
        }

        let tag = ValueTag::try_from(buf.get_u8())?;
        Ok(match tag {
            ValueTag::I32 => {
                require(buf, 4)?;
                Self::I32(buf.get_i32())
            }
            ValueTag::I64 => {
                require(buf, 8)?;
                Self::I64(buf.get_i64())
            }
            ValueTag::U32 => {
                require(buf, 4)?;
                Self::U32(buf.get_u32())
            }
            ValueTag::U64 => {
                require(buf, 8)?;
                Self::U64(buf.get_u64())
            }
            ValueTag::Float => {
                require(buf, 4)?;
                Self::Float(buf.get_f32())
            }
            ValueTag::Double => {
                require(buf, 8)?;
                Self::Double(buf.get_f64())
            }
            ValueTag::Bool => {
                require(buf, 1)?;
                Self::Bool(buf.get_u8() != 0)
            }
            ValueTag::String => {
                require(buf, 2)?;
                let len = buf.get_u16() as usize;
                require(buf, len)?;
                let mut raw = vec![0u8; len];
                buf.copy_to_slice(&mut raw);
                Self::String(String::from_utf8(raw).map_err(|_| Error::MalformedMessage)?)
            }
            ValueTag::Bytes => {
                require(buf, 2)?;
                let len = buf.get_u16() as usize;
                require(buf, len)?;
                let mut raw = vec![0u8; len];
                buf.copy_to_slice(&mut raw);
                Self::Bytes(raw)
            }
        })
    }
}

fn require(buf: &impl Buf, n: usize) -> Result<(), Error> {
    if buf.remaining() < n {
        Err(Error::MalformedMessage)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn round_trips_every_variant() {
        let values = vec![
            ObjectValue::I32(-7),
            ObjectValue::I64(-7_000_000_000),
            ObjectValue::U32(7),
            ObjectValue::U64(7_000_000_000),
            ObjectValue::Float(1.5),
            ObjectValue::Double(1.5e10),
            ObjectValue::Bool(true),
            ObjectValue::String("flow-object".to_string()),
            ObjectValue::Bytes(vec![1, 2, 3]),
        ];

        for value in values {
            let mut buf = BytesMut::new();
            value.encode(&mut buf);
            let mut cursor = &buf[..];
            let decoded = ObjectValue::decode(&mut cursor).unwrap();
            assert_eq!(decoded, value);
        }
    }
}
