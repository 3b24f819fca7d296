use std::fmt;

use crate::models::ResourceKind;

/// Cache identity: the resource kind plus the query parameters that change the
/// result (date, id, season). Never a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    resource: ResourceKind,
    /// Sorted by name so parameter order never produces two keys
    params: Vec<(&'static str, String)>,
}

impl CacheKey {
    pub fn new(resource: ResourceKind) -> Self {
        CacheKey {
            resource,
            params: Vec::new(),
        }
    }

    pub fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.params.binary_search_by(|(n, _)| n.cmp(&name)) {
            Ok(i) => self.params[i].1 = value,
            Err(i) => self.params.insert(i, (name, value)),
        }
        self
    }

    #[cfg(test)]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource)?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{name}={value}")?;
        }
        Ok(())
    }
}
