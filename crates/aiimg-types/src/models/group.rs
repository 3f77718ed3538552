//! Rate-limit group identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the admission-control group a request belongs to.
///
/// Chat groups share one budget; outside a group the session, and failing
/// that the sender, is the unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey(String);

impl GroupKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive `group:<gid>`, `session:<sid>` or `private:<sender>`.
    /// Blank identifiers count as absent.
    pub fn derive(group_id: Option<&str>, session_id: Option<&str>, sender_id: Option<&str>) -> Self {
        fn present(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|s| !s.is_empty())
        }

        if let Some(gid) = present(group_id) {
            return Self(format!("group:{}", gid));
        }
        if let Some(sid) = present(session_id) {
            return Self(format!("session:{}", sid));
        }
        Self(format!("private:{}", present(sender_id).unwrap_or("unknown")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_prefers_group_then_session_then_sender() {
        assert_eq!(GroupKey::derive(Some("42"), Some("s"), Some("u")).as_str(), "group:42");
        assert_eq!(GroupKey::derive(Some(""), Some("s1"), Some("u")).as_str(), "session:s1");
        assert_eq!(GroupKey::derive(None, None, Some("u7")).as_str(), "private:u7");
        assert_eq!(GroupKey::derive(None, None, None).as_str(), "private:unknown");
    }
}
