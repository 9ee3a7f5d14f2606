use bytes::{Buf, BufMut, BytesMut};

use crate::Error;

/// Attribute tag catalog: one entry per field mentioned across
/// §3-§4, covering both scalar attributes and the nested attribute blocks
/// (APNI, flow spec, QoS cube, DIF configuration, neighbor record, RIB
/// object, connection record, PDU-forwarding-table entry). A nested block
/// is just an attribute whose value is itself an encoded attribute list —
/// `Attributes::encode`/`decode` are used recursively for those.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Tag {
    // Scalar / identifier attributes.
    Result = 1,
    PortId = 2,
    CepId = 3,
    SourceCepId = 4,
    DestCepId = 5,
    Address = 6,
    SourceAddress = 7,
    DestAddress = 8,
    QosId = 9,
    Mode = 10,
    Lifetime = 11,
    Bytes = 12,
    ApplicationName = 13,
    DifName = 14,
    FlowUserIpcpId = 15,
    HopCount = 16,

    // Nested blocks.
    Apni = 100,
    SourceApni = 101,
    DestApni = 102,
    FlowSpec = 103,
    QosCube = 104,
    QosCubeSet = 105,
    DifConfig = 106,
    DifInfo = 107,
    Neighbor = 108,
    NeighborList = 109,
    RibObject = 110,
    Connection = 111,
    ConnectionPolicies = 112,
    PduftEntry = 113,
    PduftEntryList = 114,
    PolicyParameter = 115,
    PolicyParameterList = 116,

    // APNI component fields, used inside `Apni`/`SourceApni`/`DestApni`
    // nested blocks.
    ProcessName = 117,
    ProcessInstance = 118,
    EntityName = 119,
    EntityInstance = 120,

    // Flow-spec fields, used inside a `FlowSpec` nested block.
    AvgBandwidth = 121,
    AvgSduBandwidth = 122,
    PeakDurationMs = 123,
    DelayMs = 124,
    JitterMs = 125,
    MaxAllowableGap = 126,
    MaxSduSize = 127,
    OrderedDelivery = 128,
    PartialDelivery = 129,
    UndetectedBer = 130,

    // Flow-object fields carried by a flow-allocator `M_CREATE`/`M_CREATE_R`.
    SourcePortId = 131,
    FlowState = 132,

    // Neighbor-record fields, used inside a `Neighbor`/`NeighborList` block.
    SupportingDifName = 133,
    SupportingDifList = 134,
    NeighborEnrolled = 135,
    NeighborRtt = 136,
    NeighborLastHeard = 137,
    NeighborAttempts = 138,

    // Enrollment-information-request fields.
    EnrollmentInfo = 139,

    // Routing-table / PDUFT-generator input fields.
    RoutingEntry = 140,
    RoutingTable = 141,
    NextHopAddress = 142,
    NextHopList = 143,

    // Policy-set fields.
    PolicySetName = 144,
    PolicySetVersion = 145,
    PolicySetList = 146,
    PolicyParameterName = 147,
    PolicyParameterValue = 148,

    // Connection-policies fields, used inside a `ConnectionPolicies`
    // nested block.
    DtcpPresent = 149,
    FlowControl = 150,
    RetransmissionControl = 151,
    WindowBased = 152,
    RateBased = 153,
    InitialCredit = 154,
    MaxRetxTimeMs = 155,
    DataRateLimitBps = 156,

    // DIF-configuration nested blocks and their fields.
    DataTransferConstants = 157,
    LinkStateRouting = 158,
    PduftGeneratorPolicy = 159,
    QosCubeName = 160,

    QosIdWidth = 161,
    PortIdWidth = 162,
    CepIdWidth = 163,
    SequenceNumberWidth = 164,
    AddressWidth = 165,
    LengthWidth = 166,
    MaxPduSize = 167,
    MaxPduLifetimeMs = 168,
    DifIntegrity = 169,

    ObjectMaximumAgeMs = 170,
    WaitUntilReadCdapMs = 171,
    WaitUntilErrorMs = 172,
    WaitUntilPduftComputationMs = 173,

    // Enrollment-information-request fields, used inside an
    // `EnrollmentInfo` nested block.
    EnrollmentAddress = 174,
}

/// An ordered multimap of (tag, raw bytes) — the decoded form of one
/// record's or one nested block's attribute list. Repeated tags are kept in
/// order, since several attributes (PDU forwarding table entries, neighbor
/// lists, port-id lists) are naturally represented as repetition of the
/// same tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(Vec<(u16, Vec<u8>)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, tag: Tag, value: &[u8]) {
        self.0.push((tag as u16, value.to_vec()));
    }

    pub fn push_u32(&mut self, tag: Tag, value: u32) {
        self.0.push((tag as u16, value.to_be_bytes().to_vec()));
    }

    pub fn push_u16(&mut self, tag: Tag, value: u16) {
        self.0.push((tag as u16, value.to_be_bytes().to_vec()));
    }

    pub fn push_i32(&mut self, tag: Tag, value: i32) {
        self.0.push((tag as u16, value.to_be_bytes().to_vec()));
    }

    pub fn push_string(&mut self, tag: Tag, value: &str) {
        self.0.push((tag as u16, value.as_bytes().to_vec()));
    }

    pub fn push_i64(&mut self, tag: Tag, value: i64) {
        self.0.push((tag as u16, value.to_be_bytes().to_vec()));
    }

    pub fn push_u64(&mut self, tag: Tag, value: u64) {
        self.0.push((tag as u16, value.to_be_bytes().to_vec()));
    }

    pub fn push_f64(&mut self, tag: Tag, value: f64) {
        self.0.push((tag as u16, value.to_be_bytes().to_vec()));
    }

    pub fn push_bool(&mut self, tag: Tag, value: bool) {
        self.0.push((tag as u16, vec![value as u8]));
    }

    pub fn push_nested(&mut self, tag: Tag, nested: &Attributes) {
        let mut buf = BytesMut::new();
        nested.encode(&mut buf);
        self.0.push((tag as u16, buf.to_vec()));
    }

    pub fn get_bytes(&self, tag: Tag) -> Option<&[u8]> {
        self.0
            .iter()
            .find(|(t, _)| *t == tag as u16)
            .map(|(_, v)| v.as_slice())
    }

    pub fn get_all_bytes<'a>(&'a self, tag: Tag) -> impl Iterator<Item = &'a [u8]> {
        self.0
            .iter()
            .filter(move |(t, _)| *t == tag as u16)
            .map(|(_, v)| v.as_slice())
    }

    pub fn get_u32(&self, tag: Tag) -> Option<u32> {
        self.get_bytes(tag)
            .filter(|v| v.len() == 4)
            .map(|v| u32::from_be_bytes(v.try_into().unwrap()))
    }

    pub fn get_u16(&self, tag: Tag) -> Option<u16> {
        self.get_bytes(tag)
            .filter(|v| v.len() == 2)
            .map(|v| u16::from_be_bytes(v.try_into().unwrap()))
    }

    pub fn get_i32(&self, tag: Tag) -> Option<i32> {
        self.get_bytes(tag)
            .filter(|v| v.len() == 4)
            .map(|v| i32::from_be_bytes(v.try_into().unwrap()))
    }

    pub fn get_string(&self, tag: Tag) -> Option<String> {
        self.get_bytes(tag)
            .and_then(|v| String::from_utf8(v.to_vec()).ok())
    }

    pub fn get_i64(&self, tag: Tag) -> Option<i64> {
        self.get_bytes(tag)
            .filter(|v| v.len() == 8)
            .map(|v| i64::from_be_bytes(v.try_into().unwrap()))
    }

    pub fn get_u64(&self, tag: Tag) -> Option<u64> {
        self.get_bytes(tag)
            .filter(|v| v.len() == 8)
            .map(|v| u64::from_be_bytes(v.try_into().unwrap()))
    }

    pub fn get_f64(&self, tag: Tag) -> Option<f64> {
        self.get_bytes(tag)
            .filter(|v| v.len() == 8)
            .map(|v| f64::from_be_bytes(v.try_into().unwrap()))
    }

    pub fn get_bool(&self, tag: Tag) -> Option<bool> {
        self.get_bytes(tag).and_then(|v| v.first()).map(|b| *b != 0)
    }

    pub fn get_nested(&self, tag: Tag) -> Option<Attributes> {
        self.get_bytes(tag).and_then(|v| Attributes::decode(v).ok())
    }

    pub fn get_all_nested<'a>(&'a self, tag: Tag) -> impl Iterator<Item = Attributes> + 'a {
        self.get_all_bytes(tag)
            .filter_map(|v| Attributes::decode(v).ok())
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.0.len() as u16);
        for (tag, value) in &self.0 {
            buf.put_u16(*tag);
            buf.put_u16(value.len() as u16);
            buf.put_slice(value);
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut buf = bytes;
        if buf.remaining() < 2 {
            return Err(Error::MalformedRecord);
        }

        let count = buf.get_u16();
        let mut attrs = Vec::with_capacity(count as usize);

        for _ in 0..count {
            if buf.remaining() < 4 {
                return Err(Error::MalformedRecord);
            }

            let tag = buf.get_u16();
            let len = buf.get_u16() as usize;
            if buf.remaining() < len {
                return Err(Error::MalformedRecord);
            }

            let (value, rest) = buf.split_at(len);
            buf = rest;
            attrs.push((tag, value.to_vec()));
        }

        Ok(Self(attrs))
    }
}
