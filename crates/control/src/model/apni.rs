use std::fmt;

/// Application Process Naming Information.
///
/// `process_name` is mandatory and non-empty; the other three components
/// are optional and may be empty. Equality is componentwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Apni {
    pub process_name: String,
    pub process_instance: String,
    pub entity_name: String,
    pub entity_instance: String,
}

impl Apni {
    /// Builds an APNI. `process_name` must be non-empty; the rest default
    /// to empty strings when omitted.
    pub fn new(process_name: impl Into<String>) -> Self {
        Self {
            process_name: process_name.into(),
            process_instance: String::new(),
            entity_name: String::new(),
            entity_instance: String::new(),
        }
    }

    pub fn with_process_instance(mut self, instance: impl Into<String>) -> Self {
        self.process_instance = instance.into();
        self
    }

    pub fn with_entity_name(mut self, name: impl Into<String>) -> Self {
        self.entity_name = name.into();
        self
    }

    pub fn with_entity_instance(mut self, instance: impl Into<String>) -> Self {
        self.entity_instance = instance.into();
        self
    }

    pub fn is_valid(&self) -> bool {
        !self.process_name.is_empty()
    }

    /// The canonical encoded form used as a map key. `@`/`:` cannot appear
    /// in a component, so this is injective over well-formed APNIs.
    pub fn canonical_key(&self) -> String {
        format!(
            "{}:{}@{}:{}",
            self.process_name, self.process_instance, self.entity_name, self.entity_instance
        )
    }
}

impl fmt::Display for Apni {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_key_is_componentwise_distinct() {
        let a = Apni::new("app1").with_entity_name("src");
        let b = Apni::new("app1").with_entity_name("dst");
        assert_ne!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn empty_process_name_is_invalid() {
        assert!(!Apni::new("").is_valid());
    }
}
