/// A single `(name, value)` policy parameter.
///
/// Reused as-is by `DifConfiguration`, `ConnectionPolicies` and
/// `PolicySet` rather than redeclared per owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyParameter {
    pub name: String,
    pub value: String,
}

impl PolicyParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A named, versioned policy with its parameter bag. Policy-set bodies are
/// out of scope; only the (name, version, parameters)
/// shape is modeled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySet {
    pub name: String,
    pub version: String,
    pub parameters: Vec<PolicyParameter>,
}

impl PolicySet {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            parameters: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}
