use std::sync::Arc;

use ahash::HashMap;
use control::{
    cdap_session::CdapSessionManager,
    enrollment::EnrollmentController,
    event_loop::{Event, TimerId},
    flow_allocator::FlowAllocator,
    kernel_client::KernelClient,
    resource_allocator::ResourceAllocator,
    rib::{
        DIRECTORY_CLASS, DIRECTORY_NAME, DirectoryForwardingTableObject, NEIGHBORS_CLASS, NEIGHBORS_NAME,
        NeighborsObject, OPERATIONAL_STATUS_CLASS, OPERATIONAL_STATUS_NAME, OperationalStatusObject, PDUFT_CLASS,
        PDUFT_NAME, PduftObject, Rib, WHATEVERCAST_NAMES_CLASS, WHATEVERCAST_NAMES_NAME, WhatevercastNamesObject,
    },
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::ipcp_factory::IpcpFactory;

/// Retries a locally initiated `M_CREATE` this many times on a transient
/// failure before giving up (§4.4).
const MAX_CREATE_FLOW_RETRIES: u32 = 3;

/// A deallocation waiting out `max_pdu_lifetime_ms` before the EFCP
/// connection and port-id are actually released (§4.4), keyed by the
/// `EventLoop` timer scheduled to fire when that wait is over.
pub struct PendingTeardown {
    pub ipcp_id: u16,
    pub port_id: u32,
}

/// The explicit context object Design Notes §9 prescribes in place of the
/// `rinaManager` / `ipcProcessFactory` / `kernelIPCProcess` /
/// `extendedIPCManager` singletons. One instance per OS process.
///
/// The event loop itself is not here: §5 models it as single-threaded per
/// IPCP, so it is owned outright by whichever task drives it
/// (`run_event_loop`) rather than shared behind a lock. Every other
/// component reaches it only by cloning `event_sender` and enqueuing —
/// never by waiting on it.
///
/// `flow_allocator`, `enrollment` and `resource_allocator` hold no
/// per-IPCP state of their own (see their own doc comments); one instance
/// of each covers every IPCP this node hosts. `ribs` is the exception —
/// one RIB tree per IPCP, built lazily with its well-known objects (§4.7)
/// registered on first use.
pub struct NodeContext {
    pub kernel: Arc<KernelClient>,
    pub sessions: Mutex<CdapSessionManager>,
    pub ipcps: IpcpFactory,
    pub flow_allocator: FlowAllocator,
    pub enrollment: EnrollmentController,
    pub resource_allocator: ResourceAllocator,
    ribs: Mutex<HashMap<u16, Rib>>,
    pending_teardowns: Mutex<HashMap<TimerId, PendingTeardown>>,
    pub event_sender: mpsc::Sender<Event>,
}

impl NodeContext {
    pub fn new(kernel: Arc<KernelClient>, event_sender: mpsc::Sender<Event>) -> Self {
        Self {
            kernel,
            sessions: Mutex::new(CdapSessionManager::new()),
            ipcps: IpcpFactory::new(),
            flow_allocator: FlowAllocator::new(MAX_CREATE_FLOW_RETRIES),
            enrollment: EnrollmentController::new(),
            resource_allocator: ResourceAllocator::default(),
            ribs: Mutex::new(HashMap::default()),
            pending_teardowns: Mutex::new(HashMap::default()),
            event_sender,
        }
    }

    /// Record a scheduled MPL-wait teardown, to be completed once
    /// `timer_id` fires (`Event::TimerExpired`).
    pub fn register_pending_teardown(&self, timer_id: TimerId, teardown: PendingTeardown) {
        self.pending_teardowns.lock().insert(timer_id, teardown);
    }

    /// Take the teardown scheduled under `timer_id`, if any. `None` means
    /// this timer belongs to something other than a deallocation wait.
    pub fn take_pending_teardown(&self, timer_id: TimerId) -> Option<PendingTeardown> {
        self.pending_teardowns.lock().remove(&timer_id)
    }

    /// Run `f` against `ipcp_id`'s RIB, building it with its well-known
    /// objects registered the first time this IPCP's RIB is touched.
    pub fn with_rib<T>(&self, ipcp_id: u16, f: impl FnOnce(&mut Rib) -> T) -> T {
        let mut ribs = self.ribs.lock();
        let rib = ribs.entry(ipcp_id).or_insert_with(well_known_rib);
        f(rib)
    }

    pub fn drop_rib(&self, ipcp_id: u16) {
        self.ribs.lock().remove(&ipcp_id);
    }
}

fn well_known_rib() -> Rib {
    let mut rib = Rib::new();
    let _ = rib.register(OPERATIONAL_STATUS_CLASS, OPERATIONAL_STATUS_NAME, Box::new(OperationalStatusObject::new()));
    let _ = rib.register(
        WHATEVERCAST_NAMES_CLASS,
        WHATEVERCAST_NAMES_NAME,
        Box::new(WhatevercastNamesObject::new(Vec::new())),
    );
    let _ = rib.register(NEIGHBORS_CLASS, NEIGHBORS_NAME, Box::new(NeighborsObject::new()));
    let _ = rib.register(PDUFT_CLASS, PDUFT_NAME, Box::new(PduftObject::new()));
    let _ = rib.register(
        DIRECTORY_CLASS,
        DIRECTORY_NAME,
        Box::new(DirectoryForwardingTableObject::new()),
    );
    rib
}
