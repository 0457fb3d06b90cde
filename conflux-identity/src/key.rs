use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Identifies one segment's work within one query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    user: Arc<str>,
    segment_id: u32,
    transaction_id: Arc<str>,
    server_name: Arc<str>,
}

impl SessionKey {
    pub fn new(
        user: impl Into<Arc<str>>,
        segment_id: u32,
        transaction_id: impl Into<Arc<str>>,
        server_name: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            user: user.into(),
            segment_id,
            transaction_id: transaction_id.into(),
            server_name: server_name.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn segment_id(&self) -> u32 {
        self.segment_id
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }
}

impl Display for SessionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Session = {}:{}:{}:{}",
            self.user, self.transaction_id, self.segment_id, self.server_name
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn compared_by_value() {
        let a = SessionKey::new("alice", 0, "XID-1", "default");
        let b = SessionKey::new(String::from("alice"), 0, "XID-1", "default");
        let c = SessionKey::new("alice", 1, "XID-1", "default");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(HashSet::from([a, b, c]).len(), 2);
    }

    #[test]
    fn display() {
        let key = SessionKey::new("alice", 3, "XID-1", "hdfs");
        assert_eq!(key.to_string(), "Session = alice:XID-1:3:hdfs");
    }
}
