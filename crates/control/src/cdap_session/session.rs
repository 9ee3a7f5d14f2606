use ahash::HashMap;
use bytes::BytesMut;
use cdap::{CdapMessage, Opcode};
use tokio::sync::oneshot;

use crate::{
    cdap_session::{descriptor::SessionDescriptor, invoke_id::InvokeIdManager, state::CdapSessionState},
    error::Error,
};

/// One CDAP session, layered over one N-1 flow between a local IPCP and a
/// neighbor (or an application). Owns invoke-id allocation, the negotiated
/// session descriptor, and request/response matching for everything sent
/// on it.
pub struct CdapSession {
    state: CdapSessionState,
    descriptor: SessionDescriptor,
    invoke_ids: InvokeIdManager,
    pending: HashMap<u32, oneshot::Sender<CdapMessage>>,
}

impl CdapSession {
    pub fn new() -> Self {
        Self {
            state: CdapSessionState::Null,
            descriptor: SessionDescriptor::default(),
            invoke_ids: InvokeIdManager::new(),
            pending: HashMap::default(),
        }
    }

    pub fn state(&self) -> CdapSessionState {
        self.state
    }

    pub fn descriptor(&self) -> &SessionDescriptor {
        &self.descriptor
    }

    /// Assign an invoke-id to an outgoing request and encode it. Returns
    /// the wire bytes and, for a non-response message, a receiver that
    /// resolves when the paired response arrives via `on_received`.
    ///
    /// Rejects messages the session state machine does not allow in the
    /// current state (only `M_CONNECT` from `Null`; any message from
    /// `Established`; only `M_RELEASE_R` from `AwaitingRelease`) without
    /// mutating any session state.
    pub fn encode_next(
        &mut self,
        mut message: CdapMessage,
    ) -> Result<(Vec<u8>, Option<oneshot::Receiver<CdapMessage>>), Error> {
        self.check_transition_allowed(message.opcode)?;

        let receiver = if message.opcode.is_response() {
            None
        } else {
            let invoke_id = self.invoke_ids.allocate()?;
            message.invoke_id = invoke_id;
            let (tx, rx) = oneshot::channel();
            self.pending.insert(invoke_id, tx);
            Some(rx)
        };

        self.apply_transition(message.opcode);
        let mut buf = BytesMut::new();
        cdap::encode(&message, &mut buf);
        Ok((buf.to_vec(), receiver))
    }

    /// Record that a message was handed off to the transport, applying the
    /// session state transition it causes.
    pub fn on_sent(&mut self, message: &CdapMessage) {
        self.apply_transition(message.opcode);
    }

    /// Decode an incoming message, update session state and the session
    /// descriptor, and resolve a matching pending request if this is a
    /// response. Always returns the decoded message for the caller (the
    /// RIB dispatcher) to act on.
    pub fn on_received(&mut self, bytes: &[u8]) -> Result<CdapMessage, Error> {
        let message = cdap::decode(bytes)?;
        cdap::Validator::validate(&message)?;
        self.check_transition_allowed(message.opcode)?;

        if matches!(message.opcode, Opcode::MConnect | Opcode::MConnectR) {
            self.descriptor = descriptor_from(&message);
        }

        self.apply_transition(message.opcode);

        if message.opcode.is_response() {
            if let Some(tx) = self.pending.remove(&message.invoke_id) {
                let _ = tx.send(message.clone());
            }
            self.invoke_ids.free(message.invoke_id);
        }

        Ok(message)
    }

    /// Tear the session down: fail every outstanding request and return to
    /// `Null`. Called when the underlying N-1 flow's channel closes.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.invoke_ids = InvokeIdManager::new();
        self.state = CdapSessionState::Null;
    }

    /// The session state machine: `Null` only admits `M_CONNECT`,
    /// `AwaitingConnect` only admits `M_CONNECT_R`, `Established` admits
    /// anything, `AwaitingRelease` only admits `M_RELEASE_R`.
    fn check_transition_allowed(&self, opcode: Opcode) -> Result<(), Error> {
        let allowed = match self.state {
            CdapSessionState::Null => opcode == Opcode::MConnect,
            CdapSessionState::AwaitingConnect => opcode == Opcode::MConnectR,
            CdapSessionState::Established => true,
            CdapSessionState::AwaitingRelease => opcode == Opcode::MReleaseR,
        };

        if allowed {
            Ok(())
        } else {
            Err(Error::InvalidStateTransition("message not allowed in current CDAP session state"))
        }
    }

    fn apply_transition(&mut self, opcode: Opcode) {
        match opcode {
            Opcode::MConnect => self.state = CdapSessionState::AwaitingConnect,
            Opcode::MConnectR => self.state = CdapSessionState::Established,
            Opcode::MRelease => self.state = CdapSessionState::AwaitingRelease,
            Opcode::MReleaseR => self.state = CdapSessionState::Null,
            _ => {}
        }
    }
}

impl Default for CdapSession {
    fn default() -> Self {
        Self::new()
    }
}

fn descriptor_from(message: &CdapMessage) -> SessionDescriptor {
    SessionDescriptor {
        abs_syntax: message.abs_syntax.unwrap_or(0),
        auth_mech: message.auth_mech,
        src_ap_name: message.src_ap_name.clone().unwrap_or_default(),
        src_ap_inst: message.src_ap_inst.clone().unwrap_or_default(),
        src_ae_name: message.src_ae_name.clone().unwrap_or_default(),
        src_ae_inst: message.src_ae_inst.clone().unwrap_or_default(),
        dest_ap_name: message.dest_ap_name.clone().unwrap_or_default(),
        dest_ap_inst: message.dest_ap_inst.clone().unwrap_or_default(),
        dest_ae_name: message.dest_ae_name.clone().unwrap_or_default(),
        dest_ae_inst: message.dest_ae_inst.clone().unwrap_or_default(),
        version: message.rib_version.unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use cdap::{CdapMessage, Flags, Opcode};

    use super::*;

    fn connect() -> CdapMessage {
        let mut m = CdapMessage::new(Opcode::MConnect, 0);
        m.flags = Flags::None;
        m.abs_syntax = Some(1);
        m.src_ap_name = Some("a".into());
        m.dest_ap_name = Some("b".into());
        m
    }

    #[test]
    fn connect_round_trip_establishes_the_session() {
        let mut initiator = CdapSession::new();
        let (bytes, rx) = initiator.encode_next(connect()).unwrap();
        assert_eq!(initiator.state(), CdapSessionState::AwaitingConnect);
        let mut rx = rx.unwrap();

        let mut responder = CdapSession::new();
        let request = responder.on_received(&bytes).unwrap();
        assert_eq!(responder.state(), CdapSessionState::AwaitingConnect);
        assert_eq!(responder.descriptor().src_ap_name, "a");

        let reply = cdap::reply_skeleton(&request);
        responder.on_sent(&reply);
        assert_eq!(responder.state(), CdapSessionState::Established);

        let mut reply_buf = BytesMut::new();
        cdap::encode(&reply, &mut reply_buf);
        initiator.on_received(&reply_buf).unwrap();
        assert_eq!(initiator.state(), CdapSessionState::Established);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn reset_drops_pending_requests() {
        let mut session = CdapSession::new();
        let (_, rx) = session.encode_next(connect()).unwrap();
        let mut rx = rx.unwrap();
        session.reset();
        assert_eq!(session.state(), CdapSessionState::Null);
        assert!(rx.try_recv().is_err());
    }
}
