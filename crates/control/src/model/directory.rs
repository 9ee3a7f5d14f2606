use ahash::HashMap;

use crate::model::apni::Apni;

/// The directory forwarding table: maps an application's canonical APNI
/// key to the address of the IPCP it is known to be registered at.
///
/// Populated by the enrollment/directory-distribution machinery (out of
/// scope here beyond the data it produces) and consulted by the flow
/// allocator's step 2 ("Resolve the destination APNI to a destination
/// address"). Exposed at the well-known RIB path
/// `/dif/management/directoryforwardingtableentries`.
#[derive(Debug, Clone, Default)]
pub struct DirectoryForwardingTable {
    entries: HashMap<String, u32>,
}

impl DirectoryForwardingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, application: &Apni, address: u32) {
        self.entries.insert(application.canonical_key(), address);
    }

    pub fn remove(&mut self, application: &Apni) {
        self.entries.remove(&application.canonical_key());
    }

    pub fn resolve(&self, application: &Apni) -> Option<u32> {
        self.entries.get(&application.canonical_key()).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_a_registered_application() {
        let mut table = DirectoryForwardingTable::new();
        let app = Apni::new("app2").with_entity_name("dst");
        table.insert(&app, 2);
        assert_eq!(table.resolve(&app), Some(2));
    }

    #[test]
    fn unregistered_application_is_unresolvable() {
        let table = DirectoryForwardingTable::new();
        assert_eq!(table.resolve(&Apni::new("unknown")), None);
    }
}
