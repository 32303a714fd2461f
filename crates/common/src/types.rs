use serde::{Deserialize, Serialize};

/// External identifier of an order aggregate.
///
/// Assigned upstream and immutable once assigned. It is the only key used for
/// store lookups and cache entries, so it is kept as an opaque string rather
/// than parsed into a UUID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderUid(String);

impl OrderUid {
    /// Creates an order UID from any string-like value.
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    /// Returns the UID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the UID is empty or only whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for OrderUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OrderUid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderUid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<OrderUid> for String {
    fn from(uid: OrderUid) -> Self {
        uid.0
    }
}

impl AsRef<str> for OrderUid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_detection() {
        assert!(OrderUid::default().is_blank());
        assert!(OrderUid::new("   ").is_blank());
        assert!(!OrderUid::new("b563feb7b2b84b6test").is_blank());
    }

    #[test]
    fn serializes_as_plain_string() {
        let uid = OrderUid::new("uid-1");
        let json = serde_json::to_string(&uid).unwrap();
        assert_eq!(json, "\"uid-1\"");

        let back: OrderUid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uid);
    }
}
