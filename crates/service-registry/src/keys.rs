/// Key layout for one registry namespace inside a shared store.
///
/// Different prefixes let several registries live in the same store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Root under which every key of this registry lives.
    pub fn namespace(&self) -> String {
        format!("{}services:", self.prefix)
    }

    pub fn record(&self, service_id: &str) -> String {
        format!("{}services:{}", self.prefix, service_id)
    }

    pub fn all(&self) -> String {
        format!("{}services:all", self.prefix)
    }

    pub fn by_type(&self, service_type: &str) -> String {
        format!("{}services:type:{}", self.prefix, service_type)
    }
}
