//! Concrete objects for the well-known RIB paths enumerated in §4.7.
//! Flow-allocator flow objects and the enrollment-information object are
//! not here: both require a kernel round-trip (reserving a port-id, an
//! outbound CDAP exchange) that does not fit the synchronous
//! `RibObject` contract, so the event loop routes those object names
//! directly to `FlowAllocator`/`EnrollmentController` instead of through
//! `Rib::dispatch`.

use cdap::ObjectValue;
use kctl::{Attributes, Tag};

use crate::{
    error::Error,
    model::{Neighbor, PduftEntry, directory::DirectoryForwardingTable},
    rib::object::RibObject,
    wire,
};

pub const OPERATIONAL_STATUS_CLASS: &str = "operationstatus";
pub const OPERATIONAL_STATUS_NAME: &str = "/daf/management/operationalStatus";

pub const WHATEVERCAST_NAMES_CLASS: &str = "whatevercastname";
pub const WHATEVERCAST_NAMES_NAME: &str = "/daf/management/naming/whatevercastnames";

pub const NEIGHBORS_CLASS: &str = "neighbor";
pub const NEIGHBORS_NAME: &str = "/dif/management/neighbors";

pub const PDUFT_CLASS: &str = "pduforwardingtableentry";
pub const PDUFT_NAME: &str = "/dif/resourceallocation/pduforwardingtable";

pub const DIRECTORY_CLASS: &str = "directoryforwardingtableentry";
pub const DIRECTORY_NAME: &str = "/dif/management/directoryforwardingtableentries";

/// Whether this IPCP's components consider it running. Supports
/// `on_start`/`on_stop` as the literal on/off switch; reads return the
/// current flag.
#[derive(Debug, Default)]
pub struct OperationalStatusObject {
    up: bool,
}

impl OperationalStatusObject {
    pub fn new() -> Self {
        Self { up: false }
    }

    pub fn is_up(&self) -> bool {
        self.up
    }
}

impl RibObject for OperationalStatusObject {
    fn on_read(&self) -> Result<ObjectValue, Error> {
        Ok(ObjectValue::Bool(self.up))
    }

    fn on_start(&mut self) -> Result<(), Error> {
        self.up = true;
        Ok(())
    }

    fn on_stop(&mut self) -> Result<(), Error> {
        self.up = false;
        Ok(())
    }
}

/// The set of application-process names this IPCP answers to as an alias
/// (whatevercast name). Read-only from the CDAP side; populated locally by
/// the IPCP factory/configuration.
#[derive(Debug, Default)]
pub struct WhatevercastNamesObject {
    names: Vec<String>,
}

impl WhatevercastNamesObject {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }
}

impl RibObject for WhatevercastNamesObject {
    fn on_read(&self) -> Result<ObjectValue, Error> {
        let mut attrs = Attributes::new();
        for name in &self.names {
            attrs.push_string(Tag::ApplicationName, name);
        }
        let mut buf = bytes::BytesMut::new();
        attrs.encode(&mut buf);
        Ok(ObjectValue::Bytes(buf.to_vec()))
    }
}

/// A read-only snapshot of the neighbor table, refreshed by enrollment and
/// neighbor maintenance every time the set changes.
#[derive(Debug, Default)]
pub struct NeighborsObject {
    neighbors: Vec<Neighbor>,
}

impl NeighborsObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh(&mut self, neighbors: Vec<Neighbor>) {
        self.neighbors = neighbors;
    }
}

impl RibObject for NeighborsObject {
    fn on_read(&self) -> Result<ObjectValue, Error> {
        let mut attrs = Attributes::new();
        for neighbor in &self.neighbors {
            attrs.push_nested(Tag::Neighbor, &wire::encode_neighbor(neighbor));
        }
        let mut buf = bytes::BytesMut::new();
        attrs.encode(&mut buf);
        Ok(ObjectValue::Bytes(buf.to_vec()))
    }
}

/// A read-only snapshot of the PDU forwarding table the resource allocator
/// last programmed into the kernel.
#[derive(Debug, Default)]
pub struct PduftObject {
    entries: Vec<PduftEntry>,
}

impl PduftObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh(&mut self, entries: Vec<PduftEntry>) {
        self.entries = entries;
    }
}

impl RibObject for PduftObject {
    fn on_read(&self) -> Result<ObjectValue, Error> {
        let mut attrs = Attributes::new();
        for entry in &self.entries {
            let mut nested = Attributes::new();
            nested.push_u32(Tag::Address, entry.address);
            nested.push_u32(Tag::QosId, entry.qos_id);
            for port_id in &entry.port_ids {
                nested.push_u32(Tag::PortId, *port_id);
            }
            attrs.push_nested(Tag::PduftEntry, &nested);
        }
        let mut buf = bytes::BytesMut::new();
        attrs.encode(&mut buf);
        Ok(ObjectValue::Bytes(buf.to_vec()))
    }
}

/// A read-only mirror of the directory forwarding table. The canonical
/// store stays on `Ipcp` itself; this object exists only so the table can
/// be read over CDAP without a bespoke opcode.
#[derive(Debug, Default)]
pub struct DirectoryForwardingTableObject {
    snapshot: Vec<(String, u32)>,
}

impl DirectoryForwardingTableObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh(&mut self, table: &DirectoryForwardingTable) {
        self.snapshot = table.iter().map(|(k, v)| (k.to_string(), v)).collect();
    }
}

impl RibObject for DirectoryForwardingTableObject {
    fn on_read(&self) -> Result<ObjectValue, Error> {
        let mut attrs = Attributes::new();
        for (key, address) in &self.snapshot {
            attrs.push_string(Tag::ApplicationName, key);
            attrs.push_u32(Tag::Address, *address);
        }
        let mut buf = bytes::BytesMut::new();
        attrs.encode(&mut buf);
        Ok(ObjectValue::Bytes(buf.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operational_status_starts_down_and_toggles() {
        let mut object = OperationalStatusObject::new();
        assert_eq!(object.on_read().unwrap(), ObjectValue::Bool(false));
        object.on_start().unwrap();
        assert_eq!(object.on_read().unwrap(), ObjectValue::Bool(true));
        object.on_stop().unwrap();
        assert_eq!(object.on_read().unwrap(), ObjectValue::Bool(false));
    }

    #[test]
    fn pduft_object_reads_back_as_nested_entries() {
        let mut object = PduftObject::new();
        object.refresh(vec![PduftEntry {
            address: 7,
            qos_id: 1,
            port_ids: vec![3, 4],
        }]);

        let value = object.on_read().unwrap();
        let ObjectValue::Bytes(bytes) = value else {
            panic!("expected bytes");
        };
        let attrs = Attributes::decode(&bytes).unwrap();
        let nested: Vec<_> = attrs.get_all_nested(Tag::PduftEntry).collect();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].get_u32(Tag::Address), Some(7));
        assert_eq!(nested[0].get_all_bytes(Tag::PortId).count(), 2);
    }

    #[test]
    fn directory_mirror_reflects_refresh() {
        use crate::model::apni::Apni;

        let mut table = DirectoryForwardingTable::new();
        table.insert(&Apni::new("app"), 9);

        let mut object = DirectoryForwardingTableObject::new();
        object.refresh(&table);

        let value = object.on_read().unwrap();
        let ObjectValue::Bytes(bytes) = value else {
            panic!("expected bytes");
        };
        let attrs = Attributes::decode(&bytes).unwrap();
        assert_eq!(attrs.get_u32(Tag::Address), Some(9));
    }
}
