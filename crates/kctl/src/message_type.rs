use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Closed enum of every kernel control-channel request/response/notification
/// kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum MessageType {
    AssignToDif = 1,
    UpdateDifConfig = 2,
    CreateConnection = 3,
    CreateConnectionArrived = 4,
    UpdateConnection = 5,
    DestroyConnection = 6,
    ModifyPduft = 7,
    DumpPduft = 8,
    RegisterApplication = 9,
    UnregisterApplication = 10,
    AllocateFlow = 11,
    DeallocateFlow = 12,
    AllocateFlowArrived = 13,
    ReadManagementSdu = 14,
    WriteManagementSdu = 15,
}

impl MessageType {
    /// Whether this message type is ever sent fire-and-forget (no response
    /// expected — "modify PDU forwarding table" has no response kind).
    pub fn is_fire_and_forget(self) -> bool {
        matches!(self, Self::ModifyPduft)
    }
}
