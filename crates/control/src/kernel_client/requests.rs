use kctl::{Attributes, MessageType, Tag};

use crate::{
    error::Error,
    kernel_client::client::KernelClient,
    model::{Apni, Connection, DifConfiguration, PduftEntry, PduftMode},
    wire::{encode_connection_policies, encode_dif_configuration},
};

fn apni_attrs(apni: &Apni) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.push_string(Tag::ApplicationName, &apni.process_name);
    attrs
}

fn result_code(record: &kctl::Record) -> Result<(), Error> {
    match record.attrs.get_i32(Tag::Result) {
        Some(0) => Ok(()),
        Some(_) => Err(Error::OperationNotAllowed),
        None => Err(Error::MalformedMessage),
    }
}

impl KernelClient {
    pub async fn assign_to_dif(&self, ipcp_id: u16, dif_name: &str) -> Result<(), Error> {
        let mut attrs = Attributes::new();
        attrs.push_string(Tag::DifName, dif_name);
        let record = self.request(ipcp_id, 0, MessageType::AssignToDif, attrs).await?;
        result_code(&record)
    }

    pub async fn update_dif_config(&self, ipcp_id: u16, config: &DifConfiguration) -> Result<(), Error> {
        let attrs = encode_dif_configuration(config);
        let record = self.request(ipcp_id, 0, MessageType::UpdateDifConfig, attrs).await?;
        result_code(&record)
    }

    /// Create an EFCP connection as initiator; returns the source CEP-id
    /// the kernel bound.
    pub async fn create_connection(&self, ipcp_id: u16, connection: &Connection) -> Result<u32, Error> {
        let mut attrs = Attributes::new();
        attrs.push_u32(Tag::PortId, connection.port_id);
        attrs.push_u32(Tag::SourceAddress, connection.source_address);
        attrs.push_u32(Tag::DestAddress, connection.dest_address);
        attrs.push_u32(Tag::QosId, connection.qos_id);
        attrs.push_nested(Tag::ConnectionPolicies, &encode_connection_policies(&connection.policies));

        let record = self
            .request(ipcp_id, connection.port_id, MessageType::CreateConnection, attrs)
            .await?;

        record.attrs.get_u32(Tag::SourceCepId).ok_or(Error::MalformedMessage)
    }

    /// Acknowledge an EFCP connection creation request arrived from a peer.
    pub async fn create_connection_arrived(&self, ipcp_id: u16, connection: &Connection) -> Result<u32, Error> {
        let mut attrs = Attributes::new();
        attrs.push_u32(Tag::PortId, connection.port_id);
        attrs.push_u32(Tag::SourceAddress, connection.source_address);
        attrs.push_u32(Tag::DestAddress, connection.dest_address);
        attrs.push_u32(Tag::DestCepId, connection.dest_cep_id.unwrap_or(0));
        attrs.push_nested(Tag::ConnectionPolicies, &encode_connection_policies(&connection.policies));

        let record = self
            .request(
                ipcp_id,
                connection.port_id,
                MessageType::CreateConnectionArrived,
                attrs,
            )
            .await?;

        record.attrs.get_u32(Tag::SourceCepId).ok_or(Error::MalformedMessage)
    }

    /// Bind the peer's destination CEP-id and flow-user IPCP to an
    /// already-created connection.
    pub async fn update_connection(
        &self,
        ipcp_id: u16,
        port_id: u32,
        dest_cep_id: u32,
        flow_user_ipcp_id: u16,
    ) -> Result<(), Error> {
        let mut attrs = Attributes::new();
        attrs.push_u32(Tag::PortId, port_id);
        attrs.push_u32(Tag::DestCepId, dest_cep_id);
        attrs.push_u16(Tag::FlowUserIpcpId, flow_user_ipcp_id);
        let record = self.request(ipcp_id, port_id, MessageType::UpdateConnection, attrs).await?;
        result_code(&record)
    }

    pub async fn destroy_connection(&self, ipcp_id: u16, port_id: u32, cep_id: u32) -> Result<(), Error> {
        let mut attrs = Attributes::new();
        attrs.push_u32(Tag::PortId, port_id);
        attrs.push_u32(Tag::CepId, cep_id);
        let record = self.request(ipcp_id, port_id, MessageType::DestroyConnection, attrs).await?;
        result_code(&record)
    }

    /// Fire-and-forget: no response is ever sent for this message type.
    pub fn modify_pduft(&self, ipcp_id: u16, mode: PduftMode, entries: &[PduftEntry]) -> Result<(), Error> {
        let mut attrs = Attributes::new();
        attrs.push_u16(Tag::Mode, mode as u16);
        for entry in entries {
            let mut nested = Attributes::new();
            nested.push_u32(Tag::Address, entry.address);
            nested.push_u32(Tag::QosId, entry.qos_id);
            for port_id in &entry.port_ids {
                nested.push_u32(Tag::PortId, *port_id);
            }
            attrs.push_nested(Tag::PduftEntry, &nested);
        }
        self.notify(ipcp_id, 0, MessageType::ModifyPduft, attrs)
    }

    pub async fn dump_pduft(&self, ipcp_id: u16) -> Result<Vec<PduftEntry>, Error> {
        let record = self
            .request(ipcp_id, 0, MessageType::DumpPduft, Attributes::new())
            .await?;

        Ok(record
            .attrs
            .get_all_nested(Tag::PduftEntry)
            .map(|nested| PduftEntry {
                address: nested.get_u32(Tag::Address).unwrap_or(0),
                qos_id: nested.get_u32(Tag::QosId).unwrap_or(0),
                port_ids: nested.get_all_bytes(Tag::PortId).map(decode_u32).collect(),
            })
            .collect())
    }

    pub async fn register_application(&self, ipcp_id: u16, application: &Apni) -> Result<(), Error> {
        let attrs = apni_attrs(application);
        let record = self
            .request(ipcp_id, 0, MessageType::RegisterApplication, attrs)
            .await?;
        result_code(&record)
    }

    pub async fn unregister_application(&self, ipcp_id: u16, application: &Apni) -> Result<(), Error> {
        let attrs = apni_attrs(application);
        let record = self
            .request(ipcp_id, 0, MessageType::UnregisterApplication, attrs)
            .await?;
        result_code(&record)
    }

    /// Allocate a flow through the kernel; returns the assigned port-id.
    pub async fn allocate_flow(&self, ipcp_id: u16, source: &Apni, destination: &Apni) -> Result<u32, Error> {
        let mut attrs = Attributes::new();
        attrs.push_nested(Tag::SourceApni, &apni_attrs(source));
        attrs.push_nested(Tag::DestApni, &apni_attrs(destination));
        let record = self.request(ipcp_id, 0, MessageType::AllocateFlow, attrs).await?;
        record.attrs.get_u32(Tag::PortId).ok_or(Error::MalformedMessage)
    }

    pub async fn deallocate_flow(&self, ipcp_id: u16, port_id: u32) -> Result<(), Error> {
        let mut attrs = Attributes::new();
        attrs.push_u32(Tag::PortId, port_id);
        let record = self.request(ipcp_id, port_id, MessageType::DeallocateFlow, attrs).await?;
        result_code(&record)
    }

    pub async fn read_management_sdu(&self, ipcp_id: u16) -> Result<(Vec<u8>, u32), Error> {
        let record = self
            .request(ipcp_id, 0, MessageType::ReadManagementSdu, Attributes::new())
            .await?;

        let bytes = record.attrs.get_bytes(Tag::Bytes).ok_or(Error::MalformedMessage)?.to_vec();
        let port_id = record.attrs.get_u32(Tag::PortId).ok_or(Error::MalformedMessage)?;
        Ok((bytes, port_id))
    }

    pub async fn write_management_sdu(&self, ipcp_id: u16, port_id: u32, bytes: &[u8]) -> Result<(), Error> {
        let mut attrs = Attributes::new();
        attrs.push_u32(Tag::PortId, port_id);
        attrs.push_bytes(Tag::Bytes, bytes);
        let record = self.request(ipcp_id, port_id, MessageType::WriteManagementSdu, attrs).await?;
        result_code(&record)
    }
}

fn decode_u32(bytes: &[u8]) -> u32 {
    let mut array = [0u8; 4];
    let len = bytes.len().min(4);
    array[..len].copy_from_slice(&bytes[..len]);
    u32::from_be_bytes(array)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::BytesMut;
    use kctl::{Flags, Header, Record};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    use super::*;
    use crate::model::PduftEntry;

    async fn read_one_record(peer: &mut DuplexStream) -> Record {
        let mut buf = BytesMut::with_capacity(256);
        loop {
            if let Ok(Some(record)) = Record::decode(&mut buf) {
                return record;
            }
            let mut chunk = [0u8; 256];
            let n = peer.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    async fn write_response(peer: &mut DuplexStream, request: &Header, attrs: Attributes) {
        let record = Record {
            header: Header {
                sequence_number: request.sequence_number,
                source_ipcp_id: request.destination_ipcp_id,
                destination_ipcp_id: request.source_ipcp_id,
                destination_port: request.destination_port,
                message_type: request.message_type,
                flags: Flags::response(),
            },
            attrs,
        };
        let mut wire = BytesMut::new();
        record.encode(&mut wire);
        peer.write_all(&wire).await.unwrap();
    }

    #[tokio::test]
    async fn dump_pduft_decodes_nested_entries() {
        let (client_side, mut peer) = tokio::io::duplex(4096);
        let client = KernelClient::spawn(1, client_side, Duration::from_secs(5));

        let handle = tokio::spawn(async move { client.dump_pduft(1).await });

        let sent = read_one_record(&mut peer).await;
        let mut reply = Attributes::new();
        let mut entry = Attributes::new();
        entry.push_u32(Tag::Address, 3);
        entry.push_u32(Tag::QosId, 0);
        entry.push_bytes(Tag::PortId, &7u32.to_be_bytes());
        reply.push_nested(Tag::PduftEntry, &entry);
        write_response(&mut peer, &sent.header, reply).await;

        let entries = handle.await.unwrap().unwrap();
        assert_eq!(
            entries,
            vec![PduftEntry {
                address: 3,
                qos_id: 0,
                port_ids: vec![7],
            }]
        );
    }

    #[tokio::test]
    async fn allocate_flow_returns_assigned_port_id() {
        let (client_side, mut peer) = tokio::io::duplex(4096);
        let client = KernelClient::spawn(1, client_side, Duration::from_secs(5));

        let source = Apni::new("app1").with_process_instance("1");
        let destination = Apni::new("app2").with_process_instance("1");
        let handle = {
            let source = source.clone();
            let destination = destination.clone();
            tokio::spawn(async move { client.allocate_flow(1, &source, &destination).await })
        };

        let sent = read_one_record(&mut peer).await;
        assert!(sent.attrs.get_nested(Tag::SourceApni).is_some());
        assert!(sent.attrs.get_nested(Tag::DestApni).is_some());

        let mut reply = Attributes::new();
        reply.push_u32(Tag::PortId, 42);
        write_response(&mut peer, &sent.header, reply).await;

        assert_eq!(handle.await.unwrap().unwrap(), 42);
    }
}
