use ahash::HashMap;
use control::{
    Error,
    model::{Apni, Ipcp},
};
use parking_lot::{Mutex, MutexGuard};

/// Creates and destroys `Ipcp` instances hosted by this node, behind a
/// single mutex (§5: "The IPC-Manager-side `IPCProcessFactory` uses a mutex
/// for the IPCP registry").
#[derive(Default)]
pub struct IpcpFactory {
    registry: Mutex<HashMap<u16, Ipcp>>,
}

impl IpcpFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, ipcp_id: u16, name: Apni) -> Result<(), Error> {
        let mut registry = self.registry.lock();
        if registry.contains_key(&ipcp_id) {
            return Err(Error::AlreadyRegistered);
        }
        registry.insert(ipcp_id, Ipcp::new(ipcp_id, name));
        Ok(())
    }

    pub fn destroy(&self, ipcp_id: u16) -> Option<Ipcp> {
        self.registry.lock().remove(&ipcp_id)
    }

    pub fn lock(&self) -> MutexGuard<'_, HashMap<u16, Ipcp>> {
        self.registry.lock()
    }

    /// A snapshot of the currently hosted IPCP ids, for producers that
    /// need to fan out per-IPCP work without holding the registry lock.
    pub fn ids(&self) -> Vec<u16> {
        self.registry.lock().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creating_the_same_ipcp_id_twice_fails() {
        let factory = IpcpFactory::new();
        factory.create(1, Apni::new("a")).unwrap();
        assert_eq!(factory.create(1, Apni::new("b")), Err(Error::AlreadyRegistered));
    }

    #[test]
    fn destroy_removes_from_the_registry() {
        let factory = IpcpFactory::new();
        factory.create(1, Apni::new("a")).unwrap();
        assert!(factory.destroy(1).is_some());
        assert!(factory.lock().get(&1).is_none());
    }
}
