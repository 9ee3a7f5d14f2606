use cdap::ObjectValue;
use kctl::{Attributes, Tag};

use crate::{
    error::Error,
    model::{Apni, ConnectionPolicies, FlowSpec},
    wire::{
        decode_apni, decode_connection_policies, decode_flow_spec, encode_apni, encode_connection_policies,
        encode_flow_spec,
    },
};

/// The flow RIB object carried by the flow allocator's `M_CREATE`
/// request and (once a remote CEP-id is known) `M_CREATE_R` response.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowObject {
    pub source_apni: Apni,
    pub dest_apni: Apni,
    pub source_port_id: u32,
    pub source_cep_id: u32,
    pub dest_cep_id: Option<u32>,
    pub flow_spec: FlowSpec,
    pub policies: ConnectionPolicies,
    pub hop_count: u32,
}

impl FlowObject {
    pub fn to_object_value(&self) -> ObjectValue {
        let mut attrs = Attributes::new();
        attrs.push_nested(Tag::SourceApni, &encode_apni(&self.source_apni));
        attrs.push_nested(Tag::DestApni, &encode_apni(&self.dest_apni));
        attrs.push_u32(Tag::SourcePortId, self.source_port_id);
        attrs.push_u32(Tag::SourceCepId, self.source_cep_id);
        if let Some(dest_cep_id) = self.dest_cep_id {
            attrs.push_u32(Tag::DestCepId, dest_cep_id);
        }
        attrs.push_nested(Tag::FlowSpec, &encode_flow_spec(&self.flow_spec));
        attrs.push_nested(Tag::ConnectionPolicies, &encode_connection_policies(&self.policies));
        attrs.push_u32(Tag::HopCount, self.hop_count);

        let mut buf = bytes::BytesMut::new();
        attrs.encode(&mut buf);
        ObjectValue::Bytes(buf.to_vec())
    }

    pub fn from_object_value(value: &ObjectValue) -> Result<Self, Error> {
        let bytes = match value {
            ObjectValue::Bytes(b) => b,
            _ => return Err(Error::InvalidField("obj_value")),
        };

        let attrs = Attributes::decode(bytes)?;

        let source_apni = attrs
            .get_nested(Tag::SourceApni)
            .ok_or(Error::RequiredFieldMissing("source_apni"))
            .and_then(|nested| decode_apni(&nested))?;
        let dest_apni = attrs
            .get_nested(Tag::DestApni)
            .ok_or(Error::RequiredFieldMissing("dest_apni"))
            .and_then(|nested| decode_apni(&nested))?;

        Ok(Self {
            source_apni,
            dest_apni,
            source_port_id: attrs
                .get_u32(Tag::SourcePortId)
                .ok_or(Error::RequiredFieldMissing("source_port_id"))?,
            source_cep_id: attrs
                .get_u32(Tag::SourceCepId)
                .ok_or(Error::RequiredFieldMissing("source_cep_id"))?,
            dest_cep_id: attrs.get_u32(Tag::DestCepId),
            flow_spec: attrs
                .get_nested(Tag::FlowSpec)
                .map(|nested| decode_flow_spec(&nested))
                .unwrap_or_default(),
            policies: attrs
                .get_nested(Tag::ConnectionPolicies)
                .map(|nested| decode_connection_policies(&nested))
                .unwrap_or_default(),
            hop_count: attrs.get_u32(Tag::HopCount).unwrap_or(0),
        })
    }
}
