//! Principals: the identities on whose behalf operations are attempted

use serde::{Deserialize, Serialize};
use std::fmt;

/// An identified user/owner within the simulation
///
/// Processes carry the principal they run as; channels may carry the
/// principal that owns them. Whether a given principal is privileged is
/// decided by the access policy, not by the identifier itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Creates a principal from its name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the principal name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PrincipalId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_equality() {
        assert_eq!(PrincipalId::new("user1"), PrincipalId::from("user1"));
        assert_ne!(PrincipalId::new("user1"), PrincipalId::new("user2"));
    }

    #[test]
    fn test_principal_display() {
        assert_eq!(format!("{}", PrincipalId::new("admin")), "admin");
    }
}
